//! `writecfg` text and binary snapshots.

use std::fs;

use cubescript_language::Vm;
use cubescript_runtime::{Snapshot, load_from_file, save_to_file};
use cubescript_stdlib::{exec_config, standard_vm, write_config};

const DEFINITIONS: &str = "\
defvarp volume 0 5 10
deffvarp sensitivity 0.1 3.0 20
defsvarp playername \"unnamed\"
defvarp crosshaircolor 0 0xFFFFFF 0xFFFFFF
";

fn game_vm() -> Vm {
    let mut vm = standard_vm().unwrap();
    vm.execute(DEFINITIONS);
    vm
}

fn play_session(vm: &mut Vm) {
    vm.execute(
        "volume 8
        sensitivity 2.25
        playername [Dr. \"Q\"]
        persistidents 1
        greet = [echo hello $playername]
        tricky = \"unbalanced ] bracket\"
        persistidents 0
        scratch = [not saved]",
    );
}

#[test]
fn writecfg_output_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.cfg");

    let mut vm = game_vm();
    play_session(&mut vm);
    write_config(&vm, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("volume 8\n"));
    assert!(text.contains("greet = [echo hello $playername]\n"));
    assert!(!text.contains("scratch"));

    let mut restored = game_vm();
    assert!(exec_config(&mut restored, &path));
    assert!(restored.take_diagnostics().is_empty());
    assert_eq!(restored.get_var("volume"), Some(8));
    assert_eq!(restored.get_fvar("sensitivity"), Some(2.25));
    assert_eq!(restored.get_svar("playername").as_deref(), Some("Dr. \"Q\""));
    assert_eq!(restored.get_alias("tricky"), "unbalanced ] bracket");
    assert!(!restored.ident_exists("scratch"));

    restored.execute("greet");
    assert_eq!(restored.take_output(), vec!["hello Dr. \"Q\""]);
}

#[test]
fn writecfg_is_stable_across_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.cfg");
    let second = dir.path().join("second.cfg");

    let mut vm = game_vm();
    play_session(&mut vm);
    write_config(&vm, &first).unwrap();

    let mut restored = game_vm();
    assert!(exec_config(&mut restored, &first));
    write_config(&restored, &second).unwrap();

    assert_eq!(
        fs::read_to_string(&first).unwrap(),
        fs::read_to_string(&second).unwrap()
    );
}

#[test]
fn snapshot_matches_writecfg_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.bin");

    let mut vm = game_vm();
    play_session(&mut vm);
    save_to_file(&vm, &path).unwrap();

    let mut restored = game_vm();
    load_from_file(&mut restored, &path).unwrap();
    assert_eq!(Snapshot::capture(&restored), Snapshot::capture(&vm));
    assert_eq!(
        cubescript_stdlib::config_text(&restored),
        cubescript_stdlib::config_text(&vm)
    );
}

#[test]
fn corrupt_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.bin");
    fs::write(&path, b"not messagepack at all").unwrap();

    let mut vm = game_vm();
    assert!(load_from_file(&mut vm, &path).is_err());
    assert_eq!(vm.get_var("volume"), Some(5));
}
