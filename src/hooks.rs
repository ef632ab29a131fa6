/*!
hooks.rs - execution hook manager (§3, §4.3).

Hooks fire at opcode boundaries: before fetch (pre-exec) or after execute
(post-exec), keyed by `(pc, kind, is_post)`. Callers register hooks in any
order; `prepare()` sorts and freezes them into a lookup table and rejects
duplicate `(pc, kind, is_post, id)` tuples. Looking up before `prepare()`
is a programming error and returns `EmuError::HooksNotPrepared`.

Per §3, a hook is `{ pc, type, is_post, id, name, callback, private_data }`;
`callback` may mutate machine state (registers, memory) and observe its own
`private_data`, which is opaque to the hook manager itself — this mirrors
the original `void (*callback)(..., void *private_data)` shape without the
`unsafe` a raw pointer would need, using `Box<dyn Any>` for the opaque slot
and a `HookInfo` snapshot (rather than `&Hook` itself) as the descriptor a
callback observes, so the callback doesn't need to alias the hook it lives
inside of.

The original C core (`em.h`'s `struct hook`) scans hooks linearly with a
`TODO: binary search` left in place. This crate resolves that open
question with a `BTreeMap` built once in `prepare()`, giving the same
externally observable ordering without porting the linear scan.
*/

use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Range;

use crate::cpu::Regs;
use crate::error::{EmuError, EmuResult};
use crate::memory::Memory;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HookKind {
    Exec,
    Load,
    Store,
}

/// A snapshot of a hook's identity, passed to its callback instead of
/// `&Hook` so the callback can't alias the `Hook` it's stored inside of.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HookInfo {
    pub pc: u16,
    pub kind: HookKind,
    pub is_post: bool,
    pub id: i32,
    pub name: &'static str,
}

pub type HookCallback = dyn FnMut(&mut Regs, &mut Memory, &HookInfo, &mut dyn Any) + 'static;

pub struct Hook {
    pub pc: u16,
    pub kind: HookKind,
    pub is_post: bool,
    pub id: i32,
    pub name: &'static str,
    pub callback: Option<Box<HookCallback>>,
    pub private_data: Box<dyn Any>,
}

impl Hook {
    /// A hook with no callback; fires as a pure marker (still observable
    /// via `HookTable::lookup`, but `fire` does nothing for it).
    pub fn new(pc: u16, kind: HookKind, is_post: bool, id: i32, name: &'static str) -> Self {
        Self {
            pc,
            kind,
            is_post,
            id,
            name,
            callback: None,
            private_data: Box::new(()),
        }
    }

    pub fn with_callback(
        mut self,
        callback: impl FnMut(&mut Regs, &mut Memory, &HookInfo, &mut dyn Any) + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn with_private_data(mut self, data: impl Any) -> Self {
        self.private_data = Box::new(data);
        self
    }

    fn info(&self) -> HookInfo {
        HookInfo {
            pc: self.pc,
            kind: self.kind,
            is_post: self.is_post,
            id: self.id,
            name: self.name,
        }
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("pc", &self.pc)
            .field("kind", &self.kind)
            .field("is_post", &self.is_post)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[derive(Default)]
pub struct HookTable {
    hooks: Vec<Hook>,
    index: Option<BTreeMap<(u16, HookKind, bool), Range<usize>>>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Takes effect only after the next `prepare()` call.
    pub fn register(&mut self, hook: Hook) {
        self.index = None;
        self.hooks.push(hook);
    }

    /// Sort hooks by `(pc, kind, is_post, id)` and build the lookup index,
    /// rejecting duplicate tuples.
    pub fn prepare(&mut self) -> EmuResult<()> {
        self.hooks
            .sort_by_key(|h| (h.pc, h.kind, h.is_post, h.id));

        for pair in self.hooks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.pc == b.pc && a.kind == b.kind && a.is_post == b.is_post && a.id == b.id {
                return Err(EmuError::DuplicateHook {
                    pc: b.pc,
                    kind: b.kind,
                    post: b.is_post,
                    id: b.id,
                });
            }
        }

        let mut index = BTreeMap::new();
        let mut start = 0;
        while start < self.hooks.len() {
            let h = &self.hooks[start];
            let key = (h.pc, h.kind, h.is_post);
            let mut end = start + 1;
            while end < self.hooks.len() {
                let n = &self.hooks[end];
                if (n.pc, n.kind, n.is_post) != key {
                    break;
                }
                end += 1;
            }
            index.insert(key, start..end);
            start = end;
        }
        self.index = Some(index);
        Ok(())
    }

    /// Returns the hooks registered for `(pc, kind, is_post)`, in id order.
    /// Errors with `HooksNotPrepared` if `prepare()` has not run since the
    /// last `register()` call.
    pub fn lookup(&self, pc: u16, kind: HookKind, is_post: bool) -> EmuResult<&[Hook]> {
        let index = self.index.as_ref().ok_or(EmuError::HooksNotPrepared)?;
        Ok(match index.get(&(pc, kind, is_post)) {
            Some(range) => &self.hooks[range.clone()],
            None => &[],
        })
    }

    /// Invoke every callback registered for `(pc, kind, is_post)`, in id
    /// order, passing each its own `private_data`. Hooks with no callback
    /// (pure markers) are skipped. Errors with `HooksNotPrepared` if
    /// `prepare()` has not run since the last `register()` call.
    pub fn fire(
        &mut self,
        pc: u16,
        kind: HookKind,
        is_post: bool,
        regs: &mut Regs,
        mem: &mut Memory,
    ) -> EmuResult<()> {
        let index = self.index.as_ref().ok_or(EmuError::HooksNotPrepared)?;
        let Some(range) = index.get(&(pc, kind, is_post)).cloned() else {
            return Ok(());
        };
        for hook in &mut self.hooks[range] {
            let info = hook.info();
            let Some(callback) = hook.callback.as_mut() else {
                continue;
            };
            log::debug!(
                "hook fired: pc=${pc:04X} kind={kind:?} post={is_post} name={}",
                info.name
            );
            callback(regs, mem, &info, hook.private_data.as_mut());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(pc: u16, kind: HookKind, is_post: bool, id: i32) -> Hook {
        Hook::new(pc, kind, is_post, id, "test")
    }

    fn test_regs_mem() -> (Regs, Memory) {
        use crate::rom::{BASIC_SIZE, CHARGEN_SIZE, KERNAL_SIZE, RomSet};
        (
            Regs::new(),
            Memory::new(RomSet::from_bytes(&[0; CHARGEN_SIZE], &[0; BASIC_SIZE], &[0; KERNAL_SIZE]).unwrap()),
        )
    }

    #[test]
    fn lookup_before_prepare_errors() {
        let table = HookTable::new();
        let err = table.lookup(0x1000, HookKind::Exec, false).unwrap_err();
        assert!(matches!(err, EmuError::HooksNotPrepared));
    }

    #[test]
    fn unregistered_pc_returns_empty_span() {
        let mut table = HookTable::new();
        table.register(hook(0x1000, HookKind::Exec, false, 1));
        table.prepare().unwrap();
        let hooks = table.lookup(0x2000, HookKind::Exec, false).unwrap();
        assert!(hooks.is_empty());
    }

    #[test]
    fn duplicate_tuple_is_rejected() {
        let mut table = HookTable::new();
        table.register(hook(0x1000, HookKind::Exec, false, 1));
        table.register(hook(0x1000, HookKind::Exec, false, 1));
        let err = table.prepare().unwrap_err();
        assert!(matches!(err, EmuError::DuplicateHook { .. }));
    }

    #[test]
    fn insertion_order_tied_by_id() {
        let mut table = HookTable::new();
        table.register(hook(0x1000, HookKind::Exec, false, 5));
        table.register(hook(0x1000, HookKind::Exec, false, 2));
        table.prepare().unwrap();
        let hooks = table.lookup(0x1000, HookKind::Exec, false).unwrap();
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].id, 2);
        assert_eq!(hooks[1].id, 5);
    }

    #[test]
    fn different_kinds_and_phases_are_independent() {
        let mut table = HookTable::new();
        table.register(hook(0x1000, HookKind::Exec, false, 1));
        table.register(hook(0x1000, HookKind::Exec, true, 1));
        table.register(hook(0x1000, HookKind::Load, false, 1));
        table.prepare().unwrap();
        assert_eq!(table.lookup(0x1000, HookKind::Exec, false).unwrap().len(), 1);
        assert_eq!(table.lookup(0x1000, HookKind::Exec, true).unwrap().len(), 1);
        assert_eq!(table.lookup(0x1000, HookKind::Load, false).unwrap().len(), 1);
        assert_eq!(table.lookup(0x1000, HookKind::Store, false).unwrap().len(), 0);
    }

    #[test]
    fn fire_invokes_callback_and_can_mutate_registers() {
        let mut table = HookTable::new();
        table.register(
            Hook::new(0x1000, HookKind::Exec, false, 1, "poke-a").with_callback(
                |regs, _mem, info, _data| {
                    regs.a = 0x42;
                    assert_eq!(info.pc, 0x1000);
                },
            ),
        );
        table.prepare().unwrap();
        let (mut regs, mut mem) = test_regs_mem();
        table.fire(0x1000, HookKind::Exec, false, &mut regs, &mut mem).unwrap();
        assert_eq!(regs.a, 0x42);
    }

    #[test]
    fn fire_gives_each_hook_its_own_private_data() {
        let mut table = HookTable::new();
        table.register(
            Hook::new(0x2000, HookKind::Exec, false, 1, "counter")
                .with_private_data(0u32)
                .with_callback(|regs, _mem, _info, data| {
                    let count = data.downcast_mut::<u32>().unwrap();
                    *count += 1;
                    regs.x = *count as u8;
                }),
        );
        table.prepare().unwrap();
        let (mut regs, mut mem) = test_regs_mem();
        table.fire(0x2000, HookKind::Exec, false, &mut regs, &mut mem).unwrap();
        table.fire(0x2000, HookKind::Exec, false, &mut regs, &mut mem).unwrap();
        assert_eq!(regs.x, 2);
    }

    #[test]
    fn fire_before_prepare_errors() {
        let mut table = HookTable::new();
        let (mut regs, mut mem) = test_regs_mem();
        let err = table
            .fire(0x1000, HookKind::Exec, false, &mut regs, &mut mem)
            .unwrap_err();
        assert!(matches!(err, EmuError::HooksNotPrepared));
    }

    #[test]
    fn fire_skips_hooks_with_no_callback() {
        let mut table = HookTable::new();
        table.register(hook(0x1000, HookKind::Exec, false, 1));
        table.prepare().unwrap();
        let (mut regs, mut mem) = test_regs_mem();
        table
            .fire(0x1000, HookKind::Exec, false, &mut regs, &mut mem)
            .unwrap();
    }
}
