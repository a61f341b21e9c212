//! Alias bindings and call frames.
//!
//! Every alias keeps a stack of shadowed values. Argument aliases are bound
//! lazily: a call link records which of `arg1`..`arg25` it has pushed, so
//! only those are popped when the call returns.

use crate::MAX_ARGS;
use crate::ident::{IdentFlags, IdentId, Registry};
use crate::value::Value;

use super::Vm;

/// One active alias call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CallLink {
    /// The alias being run. `None` for the top level.
    pub(crate) id: Option<IdentId>,
    /// Argument aliases bound by this call, one bit per slot.
    pub(crate) used: u32,
    /// Pushed by `doargs` to expose the caller's arguments.
    pub(crate) undo: bool,
}

impl CallLink {
    /// The top-level frame, where every argument alias counts as bound.
    pub(crate) fn top_level() -> Self {
        Self {
            id: None,
            used: all_args(),
            undo: false,
        }
    }
}

/// Mask with the first `n` argument bits set.
pub(crate) fn arg_mask(n: usize) -> u32 {
    if n >= 32 { u32::MAX } else { (1u32 << n) - 1 }
}

fn all_args() -> u32 {
    arg_mask(MAX_ARGS)
}

/// Argument aliases whose bit is set in `mask`.
fn args_in(mask: u32) -> impl Iterator<Item = IdentId> {
    (0..MAX_ARGS)
        .filter(move |i| mask & (1 << i) != 0)
        .map(Registry::arg)
}

/// State saved by [`Vm::suspend_call_args`].
#[derive(Debug, Default)]
pub(crate) struct Suspended {
    frame: Option<SuspendedFrame>,
}

#[derive(Debug)]
struct SuspendedFrame {
    /// Index of the link whose arguments became visible.
    caller: usize,
    /// Depth of the link stack with the undo link on top.
    height: usize,
    /// The callee's bindings, to put back on resume.
    saved: Vec<(IdentId, Value)>,
}

impl Vm {
    fn top_link(&self) -> &CallLink {
        // The top-level link is never popped.
        &self.links[self.links.len() - 1]
    }

    fn top_link_mut(&mut self) -> &mut CallLink {
        let last = self.links.len() - 1;
        &mut self.links[last]
    }

    /// Returns true unless `id` is an argument alias the current call has
    /// not bound.
    #[must_use]
    pub fn is_bound(&self, id: IdentId) -> bool {
        !id.is_arg() || self.top_link().used & id.arg_bit() != 0
    }

    /// Shadows the alias `id` with `value`. The alias stops counting as
    /// unknown.
    pub fn push_binding(&mut self, id: IdentId, value: Value) {
        let ident = self.registry.ident_mut(id);
        if let Some(alias) = ident.as_alias_mut() {
            let prev = std::mem::replace(&mut alias.value, value);
            alias.stack.push(prev);
            alias.code = None;
            ident.flags.remove(IdentFlags::UNKNOWN);
        }
    }

    /// Replaces the innermost binding of `id` without pushing.
    pub fn set_binding(&mut self, id: IdentId, value: Value) {
        if let Some(alias) = self.registry.ident_mut(id).as_alias_mut() {
            alias.value = value;
            alias.code = None;
        }
    }

    /// Restores the value `id` had before the last [`Vm::push_binding`].
    pub fn pop_binding(&mut self, id: IdentId) {
        if let Some(alias) = self.registry.ident_mut(id).as_alias_mut() {
            debug_assert!(!alias.stack.is_empty(), "pop without matching push");
            if let Some(prev) = alias.stack.pop() {
                alias.value = prev;
                alias.code = None;
            }
        }
    }

    /// Binds an unbound argument alias to null in the current call.
    pub(crate) fn bind_unused_arg(&mut self, id: IdentId) {
        if !self.is_bound(id) {
            self.push_binding(id, Value::Null);
            self.top_link_mut().used |= id.arg_bit();
        }
    }

    /// Assigns an argument alias, binding it in the current call on first
    /// use.
    pub(crate) fn set_arg(&mut self, id: IdentId, value: Value) {
        if self.is_bound(id) {
            self.set_binding(id, value);
        } else {
            self.push_binding(id, value);
            self.top_link_mut().used |= id.arg_bit();
        }
    }

    /// Assigns a global alias, applying the current identifier flags.
    pub(crate) fn assign_alias(&mut self, id: IdentId, value: Value) {
        let flags = self.ident_flags;
        let ident = self.registry.ident_mut(id);
        if let Some(alias) = ident.as_alias_mut() {
            alias.value = value;
            alias.code = None;
            ident.flags = (ident.flags & flags) | flags;
        }
    }

    /// Binds each identifier (or name) in `targets` to null for a `local`
    /// scope. Argument aliases are skipped. Returns what must be unbound.
    pub(crate) fn bind_locals(&mut self, targets: &[Value]) -> Vec<IdentId> {
        let mut bound = Vec::with_capacity(targets.len());
        for target in targets {
            let id = match target {
                Value::Ident(id) => *id,
                other => self.force_ident(other),
            };
            let ident = self.registry.ident(id);
            if id.is_arg() || ident.as_alias().is_none() {
                continue;
            }
            self.push_binding(id, Value::Null);
            bound.push(id);
        }
        bound
    }

    pub(crate) fn unbind_locals(&mut self, bound: &[IdentId]) {
        for &id in bound.iter().rev() {
            self.pop_binding(id);
        }
    }

    /// Resolves a value to an identifier: names create unknown aliases,
    /// anything else is the dummy.
    pub(crate) fn force_ident(&mut self, value: &Value) -> IdentId {
        match value {
            Value::Ident(id) => *id,
            Value::Str(name) | Value::Macro(name) => {
                match self.registry.new_ident(name, IdentFlags::UNKNOWN) {
                    Ok(id) => id,
                    Err(err) => {
                        self.report(err);
                        self.registry.dummy()
                    }
                }
            }
            _ => self.registry.dummy(),
        }
    }

    // =========================================================================
    // Call frames
    // =========================================================================

    /// Pushes the frame of an alias call that bound the first `argc`
    /// argument aliases.
    pub(crate) fn enter_call(&mut self, id: IdentId, argc: usize) {
        self.links.push(CallLink {
            id: Some(id),
            used: arg_mask(argc),
            undo: false,
        });
    }

    /// Pops the innermost call frame and unbinds every argument alias it
    /// bound.
    pub(crate) fn leave_call(&mut self) {
        if self.links.len() <= 1 {
            return;
        }
        if let Some(link) = self.links.pop() {
            for id in args_in(link.used) {
                self.pop_binding(id);
            }
        }
    }

    /// Exposes the calling frame's arguments, as `doargs` does. Nested
    /// suspensions walk past the frames they already suspended.
    pub(crate) fn suspend_call_args(&mut self) -> Suspended {
        let mut undos = 0usize;
        let mut target = None;
        for i in (1..self.links.len()).rev() {
            if self.links[i].undo {
                undos += 1;
            } else if undos > 0 {
                undos -= 1;
            } else {
                target = Some(i);
                break;
            }
        }
        let Some(target) = target else {
            return Suspended::default();
        };

        let caller = target - 1;
        let top = self.top_link().clone();
        let mut saved = Vec::new();
        for id in args_in(top.used) {
            saved.push((id, self.undo_arg(id)));
        }
        self.links.push(CallLink {
            id: top.id,
            used: self.links[caller].used,
            undo: true,
        });
        Suspended {
            frame: Some(SuspendedFrame {
                caller,
                height: self.links.len(),
                saved,
            }),
        }
    }

    /// Reverses [`Vm::suspend_call_args`]. Arguments first bound while
    /// suspended stay bound and now belong to the caller.
    pub(crate) fn resume_call_args(&mut self, suspended: Suspended) {
        let Some(frame) = suspended.frame else {
            return;
        };
        if self.links.len() != frame.height {
            return;
        }
        if let Some(undo) = self.links.pop() {
            self.links[frame.caller].used |= undo.used;
        }
        for (id, value) in frame.saved {
            self.redo_arg(id, value);
        }
    }

    fn undo_arg(&mut self, id: IdentId) -> Value {
        match self.registry.ident_mut(id).as_alias_mut() {
            Some(alias) => {
                let prev = alias.stack.pop().unwrap_or_default();
                alias.code = None;
                std::mem::replace(&mut alias.value, prev)
            }
            None => Value::Null,
        }
    }

    fn redo_arg(&mut self, id: IdentId, value: Value) {
        if let Some(alias) = self.registry.ident_mut(id).as_alias_mut() {
            let outer = std::mem::replace(&mut alias.value, value);
            alias.stack.push(outer);
            alias.code = None;
        }
    }
}
