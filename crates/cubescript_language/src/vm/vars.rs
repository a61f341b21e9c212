//! Variables, aliases by name, overrides and printing.

use cubescript_foundation::{Error, ErrorKind, check_number, format_float};
use log::debug;

use crate::ident::{Ident, IdentFlags, IdentId, IdentKind};
use crate::opcode::Ret;
use crate::value::Value;

use super::{MAX_TRIGGERS, Vm, coerce_lookup};

impl Vm {
    // =========================================================================
    // Reads
    // =========================================================================

    /// The current value of an alias, or null.
    pub(crate) fn alias_value(&self, id: IdentId) -> Value {
        self.registry
            .ident(id)
            .as_alias()
            .map_or(Value::Null, |a| a.value.clone())
    }

    pub(crate) fn int_var(&self, id: IdentId) -> i64 {
        match &self.registry.ident(id).kind {
            IdentKind::Int(v) => v.storage.get(),
            _ => 0,
        }
    }

    pub(crate) fn float_var(&self, id: IdentId) -> f64 {
        match &self.registry.ident(id).kind {
            IdentKind::Float(v) => v.storage.get(),
            _ => 0.0,
        }
    }

    pub(crate) fn str_var(&self, id: IdentId) -> String {
        match &self.registry.ident(id).kind {
            IdentKind::Str(v) => v.storage.borrow().clone(),
            _ => String::new(),
        }
    }

    /// Resolves a `$name` whose name was computed at run time.
    pub(crate) fn lookup_by_name(&mut self, name: &str, ret: Ret, fragment: bool) -> Value {
        if let Some(id) = self.registry.lookup(name) {
            let ident = self.registry.ident(id);
            match &ident.kind {
                IdentKind::Alias(alias) if !ident.has(IdentFlags::UNKNOWN) => {
                    let raw = if self.is_bound(id) {
                        alias.value.clone()
                    } else {
                        Value::Null
                    };
                    return coerce_lookup(&raw, ret, fragment);
                }
                IdentKind::Alias(_) => {}
                IdentKind::Str(v) => {
                    let raw = Value::str(&v.storage.borrow());
                    return coerce_lookup(&raw, ret, fragment);
                }
                IdentKind::Int(v) => return coerce_lookup(&Value::Int(v.storage.get()), ret, fragment),
                IdentKind::Float(v) => {
                    return coerce_lookup(&Value::Float(v.storage.get()), ret, fragment);
                }
                IdentKind::Command(_) => {
                    return self.call_command(id, Vec::new(), true).forced(ret);
                }
            }
        }
        self.report(Error::unknown_alias(name));
        coerce_lookup(&Value::Null, ret, fragment)
    }

    /// Looks up `name` for writing, creating an unknown alias if needed and
    /// binding it in the current call if it is an unbound argument.
    pub fn write_ident(&mut self, name: &str) -> IdentId {
        match self.registry.new_ident(name, IdentFlags::UNKNOWN) {
            Ok(id) => {
                if id.is_arg() {
                    self.bind_unused_arg(id);
                }
                id
            }
            Err(err) => {
                self.report(err);
                self.registry.dummy()
            }
        }
    }

    /// Looks up `name`, hiding argument aliases the current call has not
    /// bound.
    #[must_use]
    pub fn read_ident(&self, name: &str) -> Option<IdentId> {
        self.registry.lookup(name).filter(|&id| self.is_bound(id))
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn ident_exists(&self, name: &str) -> bool {
        self.registry.lookup(name).is_some()
    }

    /// The text of the alias `name`, or an empty string.
    #[must_use]
    pub fn get_alias(&self, name: &str) -> String {
        self.read_ident(name)
            .and_then(|id| self.registry.ident(id).as_alias())
            .map(|a| a.value.get_str().into_owned())
            .unwrap_or_default()
    }

    /// The value of the integer variable `name`.
    #[must_use]
    pub fn get_var(&self, name: &str) -> Option<i64> {
        match &self.registry.get_by_name(name)?.kind {
            IdentKind::Int(v) => Some(v.storage.get()),
            _ => None,
        }
    }

    /// The value of the float variable `name`.
    #[must_use]
    pub fn get_fvar(&self, name: &str) -> Option<f64> {
        match &self.registry.get_by_name(name)?.kind {
            IdentKind::Float(v) => Some(v.storage.get()),
            _ => None,
        }
    }

    /// The value of the string variable `name`.
    #[must_use]
    pub fn get_svar(&self, name: &str) -> Option<String> {
        match &self.registry.get_by_name(name)?.kind {
            IdentKind::Str(v) => Some(v.storage.borrow().clone()),
            _ => None,
        }
    }

    /// Lower bound of an integer variable, 0 if there is none.
    #[must_use]
    pub fn get_var_min(&self, name: &str) -> i64 {
        self.int_bounds(name).0
    }

    /// Upper bound of an integer variable, 0 if there is none.
    #[must_use]
    pub fn get_var_max(&self, name: &str) -> i64 {
        self.int_bounds(name).1
    }

    /// Lower bound of a float variable, 0 if there is none.
    #[must_use]
    pub fn get_fvar_min(&self, name: &str) -> f64 {
        self.float_bounds(name).0
    }

    /// Upper bound of a float variable, 0 if there is none.
    #[must_use]
    pub fn get_fvar_max(&self, name: &str) -> f64 {
        self.float_bounds(name).1
    }

    fn int_bounds(&self, name: &str) -> (i64, i64) {
        match self.registry.get_by_name(name).map(|i| &i.kind) {
            Some(IdentKind::Int(v)) => (v.min, v.max),
            _ => (0, 0),
        }
    }

    fn float_bounds(&self, name: &str) -> (f64, f64) {
        match self.registry.get_by_name(name).map(|i| &i.kind) {
            Some(IdentKind::Float(v)) => (v.min, v.max),
            _ => (0.0, 0.0),
        }
    }

    // =========================================================================
    // Host writes
    // =========================================================================

    /// Sets an integer variable from host code, bypassing override and
    /// read-only rules.
    pub fn set_var(&mut self, name: &str, value: i64, notify: bool, clamp: bool) {
        let Some(id) = self.registry.lookup(name) else {
            return;
        };
        if let IdentKind::Int(v) = &self.registry.ident(id).kind {
            let value = if clamp { value.clamp(v.min, v.max.max(v.min)) } else { value };
            v.storage.set(value);
        } else {
            return;
        }
        if notify {
            self.notify_change(id);
        }
    }

    /// Sets a float variable from host code.
    pub fn set_fvar(&mut self, name: &str, value: f64, notify: bool, clamp: bool) {
        let Some(id) = self.registry.lookup(name) else {
            return;
        };
        if let IdentKind::Float(v) = &self.registry.ident(id).kind {
            let value = if clamp { value.clamp(v.min, v.max.max(v.min)) } else { value };
            v.storage.set(value);
        } else {
            return;
        }
        if notify {
            self.notify_change(id);
        }
    }

    /// Sets a string variable from host code.
    pub fn set_svar(&mut self, name: &str, value: &str, notify: bool) {
        let Some(id) = self.registry.lookup(name) else {
            return;
        };
        if let IdentKind::Str(v) = &self.registry.ident(id).kind {
            *v.storage.borrow_mut() = value.to_string();
        } else {
            return;
        }
        if notify {
            self.notify_change(id);
        }
    }

    /// Runs the change callback of `name` as if a script had written it.
    pub fn touch_var(&mut self, name: &str) {
        if let Some(id) = self.registry.lookup(name) {
            self.notify_change(id);
        }
    }

    fn notify_change(&mut self, id: IdentId) {
        let callback = match &self.registry.ident(id).kind {
            IdentKind::Int(v) => v.on_change.clone(),
            IdentKind::Float(v) => v.on_change.clone(),
            IdentKind::Str(v) => v.on_change.clone(),
            _ => None,
        };
        if let Some(callback) = callback {
            callback(self);
        }
    }

    // =========================================================================
    // Script writes
    // =========================================================================

    /// Assigns `value` to whatever `name` names: aliases are set, variables
    /// are written through the checked setters, and unknown names become
    /// new aliases.
    pub fn set_alias(&mut self, name: &str, value: Value) {
        let Some(id) = self.registry.lookup(name) else {
            if check_number(name) {
                self.report(Error::new(ErrorKind::AliasNumber(name.to_string())));
                return;
            }
            let flags = self.ident_flags;
            if let Err(err) = self.registry.define(Ident::alias(name, value, flags)) {
                self.report(err);
            }
            return;
        };
        match &self.registry.ident(id).kind {
            IdentKind::Alias(_) if id.is_arg() => self.set_arg(id, value),
            IdentKind::Alias(_) => self.assign_alias(id, value),
            IdentKind::Int(_) => self.set_int_checked(id, value.get_int()),
            IdentKind::Float(_) => self.set_float_checked(id, value.get_float()),
            IdentKind::Str(_) => self.set_str_checked(id, &value.get_str()),
            IdentKind::Command(_) => {
                self.report(Error::new(ErrorKind::RedefineBuiltin(name.to_string())));
            }
        }
    }

    /// Decides whether a script write to a variable goes ahead, and keeps
    /// the override bookkeeping.
    fn begin_write(&mut self, id: IdentId) -> bool {
        let ident = self.registry.ident(id);
        let name = ident.name().to_string();
        if ident.has(IdentFlags::READ_ONLY) {
            self.report(Error::read_only(name));
            return false;
        }
        let overriding = self.ident_flags.contains(IdentFlags::OVERRIDDEN);
        let overridable = ident.has(IdentFlags::OVERRIDE);
        if overridable && !overriding && !self.config.allow_editing {
            return false;
        }
        if overriding || overridable {
            if ident.has(IdentFlags::PERSIST) {
                self.report(Error::new(ErrorKind::PersistentOverride(name)));
                return false;
            }
            if !ident.has(IdentFlags::OVERRIDDEN) {
                let ident = self.registry.ident_mut(id);
                match &mut ident.kind {
                    IdentKind::Int(v) => v.saved = v.storage.get(),
                    IdentKind::Float(v) => v.saved = v.storage.get(),
                    IdentKind::Str(v) => v.saved = v.storage.borrow().clone(),
                    _ => {}
                }
                ident.flags.insert(IdentFlags::OVERRIDDEN);
            }
        } else if ident.has(IdentFlags::OVERRIDDEN) {
            self.registry
                .ident_mut(id)
                .flags
                .remove(IdentFlags::OVERRIDDEN);
        }
        true
    }

    fn finish_write(&mut self, id: IdentId) {
        self.notify_change(id);
        let overridable = self.registry.ident(id).has(IdentFlags::OVERRIDE);
        if overridable && !self.ident_flags.contains(IdentFlags::OVERRIDDEN) {
            if self.triggers.len() >= MAX_TRIGGERS {
                self.triggers.pop_front();
            }
            self.triggers.push_back(id);
        }
    }

    /// Writes an integer variable from a script: read-only and override
    /// rules apply, and the value is clamped with a diagnostic.
    pub fn set_int_checked(&mut self, id: IdentId, value: i64) {
        if !self.begin_write(id) {
            return;
        }
        let ident = self.registry.ident(id);
        let IdentKind::Int(var) = &ident.kind else {
            return;
        };
        let (min, max) = (var.min, var.max);
        let mut value = value;
        if value < min || value > max {
            let (lo, hi) = if !ident.has(IdentFlags::HEX) {
                (min.to_string(), max.to_string())
            } else if min <= 255 {
                (min.to_string(), format!("0x{max:X}"))
            } else {
                (format!("0x{min:X}"), format!("0x{max:X}"))
            };
            let name = ident.name().to_string();
            value = value.clamp(min, max);
            self.report(Error::new(ErrorKind::OutOfRange { name, min: lo, max: hi }));
        }
        if let IdentKind::Int(var) = &self.registry.ident(id).kind {
            var.storage.set(value);
        }
        self.finish_write(id);
    }

    /// Writes a float variable from a script.
    pub fn set_float_checked(&mut self, id: IdentId, value: f64) {
        if !self.begin_write(id) {
            return;
        }
        let ident = self.registry.ident(id);
        let IdentKind::Float(var) = &ident.kind else {
            return;
        };
        let (min, max) = (var.min, var.max);
        let mut value = value;
        if value < min || value > max {
            let name = ident.name().to_string();
            value = value.clamp(min, max);
            self.report(Error::new(ErrorKind::OutOfRange {
                name,
                min: format_float(min),
                max: format_float(max),
            }));
        }
        if let IdentKind::Float(var) = &self.registry.ident(id).kind {
            var.storage.set(value);
        }
        self.finish_write(id);
    }

    /// Writes a string variable from a script.
    pub fn set_str_checked(&mut self, id: IdentId, value: &str) {
        if !self.begin_write(id) {
            return;
        }
        if let IdentKind::Str(var) = &self.registry.ident(id).kind {
            *var.storage.borrow_mut() = value.to_string();
        }
        self.finish_write(id);
    }

    /// Overridable variables written outside override mode, oldest first.
    pub fn take_triggers(&mut self) -> Vec<IdentId> {
        self.triggers.drain(..).collect()
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    /// Restores the value an identifier had before it was overridden.
    pub fn clear_override(&mut self, id: IdentId) {
        let ident = self.registry.ident_mut(id);
        if !ident.has(IdentFlags::OVERRIDDEN) {
            return;
        }
        let changed = match &mut ident.kind {
            IdentKind::Alias(alias) => {
                if !matches!(&alias.value, Value::Str(s) if s.is_empty()) {
                    alias.value = Value::empty_str();
                    alias.code = None;
                }
                false
            }
            IdentKind::Int(v) => {
                v.storage.set(v.saved);
                true
            }
            IdentKind::Float(v) => {
                v.storage.set(v.saved);
                true
            }
            IdentKind::Str(v) => {
                *v.storage.borrow_mut() = std::mem::take(&mut v.saved);
                true
            }
            IdentKind::Command(_) => false,
        };
        ident.flags.remove(IdentFlags::OVERRIDDEN);
        if changed {
            self.notify_change(id);
        }
    }

    /// Clears every override.
    pub fn clear_overrides(&mut self) {
        let overridden: Vec<IdentId> = self
            .registry
            .iter()
            .filter(|i| i.has(IdentFlags::OVERRIDDEN))
            .map(Ident::id)
            .collect();
        debug!("clearing {} overrides", overridden.len());
        for id in overridden {
            self.clear_override(id);
        }
    }

    /// Clears the override of `name`, as the `resetvar` command does.
    pub fn reset_var(&mut self, name: &str) {
        let Some(id) = self.registry.lookup(name) else {
            return;
        };
        if self.registry.ident(id).has(IdentFlags::READ_ONLY) {
            self.report(Error::read_only(name));
        } else {
            self.clear_override(id);
        }
    }

    // =========================================================================
    // Printing
    // =========================================================================

    /// The line printed for a variable named on its own.
    #[must_use]
    pub fn format_var(&self, id: IdentId) -> Option<String> {
        let ident = self.registry.ident(id);
        let name = ident.name();
        Some(match &ident.kind {
            IdentKind::Int(v) => {
                let i = v.storage.get();
                if i < 0 || !ident.has(IdentFlags::HEX) {
                    format!("{name} = {i}")
                } else if v.max == 0xFF_FFFF {
                    let (r, g, b) = ((i >> 16) & 0xFF, (i >> 8) & 0xFF, i & 0xFF);
                    format!("{name} = 0x{i:06X} ({r}, {g}, {b})")
                } else {
                    format!("{name} = 0x{i:X}")
                }
            }
            IdentKind::Float(v) => format!("{name} = {}", format_float(v.storage.get())),
            IdentKind::Str(v) => {
                let s = v.storage.borrow();
                if s.contains('"') {
                    format!("{name} = [{s}]")
                } else {
                    format!("{name} = \"{s}\"")
                }
            }
            _ => return None,
        })
    }

    /// Prints a variable to the output buffer.
    pub fn print_var(&mut self, id: IdentId) {
        if let Some(line) = self.format_var(id) {
            self.print(line);
        }
    }
}
