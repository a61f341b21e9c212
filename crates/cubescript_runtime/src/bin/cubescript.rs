//! cubescript CLI entry point.

use cubescript_runtime::{Repl, load_from_file, save_to_file};
use cubescript_stdlib::{exec_config, write_config};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

/// CLI configuration parsed from arguments.
#[derive(Default)]
struct CliConfig {
    files: Vec<PathBuf>,
    exec: Vec<String>,
    config: Option<PathBuf>,
    save: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    restore: Option<PathBuf>,
    batch_mode: bool,
    no_banner: bool,
    show_help: bool,
    show_version: bool,
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let args: Vec<String> = env::args().collect();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31merror: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut config = CliConfig::default();

    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "-b" | "--batch" => config.batch_mode = true,
            "--no-banner" => config.no_banner = true,
            "-e" | "--exec" => config.exec.push(value(arg.as_str())?),
            "--config" => config.config = Some(value(arg.as_str())?.into()),
            "--save" => config.save = Some(value(arg.as_str())?.into()),
            "--snapshot" => config.snapshot = Some(value(arg.as_str())?.into()),
            "--restore" => config.restore = Some(value(arg.as_str())?.into()),
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("unknown option: {flag}").into());
            }
            path => config.files.push(PathBuf::from(path)),
        }
    }

    Ok(config)
}

fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_args(args)?;

    if config.show_help {
        print_help();
        return Ok(());
    }

    if config.show_version {
        println!("cubescript {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut repl = Repl::new()?;

    if let Some(path) = &config.config {
        exec_config(repl.vm_mut(), path);
        repl.flush();
    }
    if let Some(path) = &config.restore {
        load_from_file(repl.vm_mut(), path)?;
    }

    for file in &config.files {
        repl.eval_file(file)?;
    }
    for line in &config.exec {
        let value = repl.eval(line);
        if !value.is_null() {
            println!("{}", value.get_str());
        }
    }

    // Scripts or one-liners without -b still end the run; only a bare
    // invocation is interactive.
    let interactive =
        !config.batch_mode && config.files.is_empty() && config.exec.is_empty();
    if interactive {
        if config.no_banner {
            repl = repl.without_banner();
        }
        repl.run()?;
    }

    if let Some(path) = &config.save {
        write_config(repl.vm(), path)?;
    }
    if let Some(path) = &config.snapshot {
        save_to_file(repl.vm(), path)?;
    }
    Ok(())
}

fn print_help() {
    println!(
        "\x1b[1mcubescript\x1b[0m - Console command language

\x1b[1mUSAGE:\x1b[0m
    cubescript [OPTIONS] [FILES...]

\x1b[1mARGUMENTS:\x1b[0m
    [FILES...]    Script files to execute in order

\x1b[1mOPTIONS:\x1b[0m
    -h, --help           Print help information
    -V, --version        Print version information
    -e, --exec <CODE>    Execute CODE and print its result (repeatable)
    -b, --batch          Never start the REPL
        --config <FILE>  Execute FILE first if it exists
        --save <FILE>    Write persistent state with writecfg at exit
        --snapshot <FILE> Save a binary snapshot of persistent state at exit
        --restore <FILE> Restore a binary snapshot after --config
        --no-banner      Start the REPL without the banner

The REPL starts when no files or -e code are given.
Set RUST_LOG=debug for engine logging.

\x1b[1mEXAMPLES:\x1b[0m
    cubescript                               Start interactive REPL
    cubescript autoexec.cfg                  Run a script
    cubescript -e \"echo (+ 1 2)\"             Run a one-liner
    cubescript --config config.cfg --save config.cfg
                                             Edit settings interactively and keep them"
    );
}
