//! Loop variables.
//!
//! A loop binds its variable once, on the first iteration, rewrites that
//! binding on later iterations and unbinds it when the loop ends. A loop
//! that never iterates leaves the variable alone.

use cubescript_language::{IdentId, Value, Vm};

pub(crate) struct LoopVar {
    id: IdentId,
    bound: bool,
}

impl LoopVar {
    /// Returns `None` unless `value` names an alias.
    pub(crate) fn new(vm: &Vm, value: &Value) -> Option<Self> {
        let id = value.as_ident()?;
        vm.registry().ident(id).as_alias()?;
        Some(Self { id, bound: false })
    }

    pub(crate) fn set(&mut self, vm: &mut Vm, value: Value) {
        if self.bound {
            vm.set_binding(self.id, value);
        } else {
            vm.push_binding(self.id, value);
            self.bound = true;
        }
    }

    pub(crate) fn finish(self, vm: &mut Vm) {
        if self.bound {
            vm.pop_binding(self.id);
        }
    }
}
