use grid::GridPos;

use crate::catalog::TemplateId;
use crate::entity::TileEntity;

/// Dense table of entity slots with free-list reuse.
///
/// Deactivated slots go on the free stack and are handed out before the
/// table grows, so slot indices name table positions, not logical entities.
pub struct EntityTable {
    slots: Vec<TileEntity>,
    free: Vec<u32>,
    capacity: usize,
}

impl EntityTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots ever allocated, including currently inactive ones.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn active_len(&self) -> usize {
        self.slots.iter().filter(|e| e.active).count()
    }

    /// Claim a slot for a new instance: a freed slot if one exists, else a
    /// fresh one. None once the table is at capacity — callers treat that as
    /// a no-op, not an error.
    pub(crate) fn alloc(&mut self, build: impl FnOnce(u32) -> TileEntity) -> Option<u32> {
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            debug_assert!(!slot.active);
            *slot = build(idx);
            Some(idx)
        } else if self.slots.len() < self.capacity {
            let idx = self.slots.len() as u32;
            self.slots.push(build(idx));
            Some(idx)
        } else {
            None
        }
    }

    /// Return a deactivated slot to the free stack.
    pub(crate) fn release(&mut self, slot: u32) {
        debug_assert!(!self.slots[slot as usize].active);
        self.free.push(slot);
    }

    pub fn get(&self, slot: u32) -> Option<&TileEntity> {
        self.slots.get(slot as usize)
    }

    pub fn get_mut(&mut self, slot: u32) -> Option<&mut TileEntity> {
        self.slots.get_mut(slot as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TileEntity> {
        self.slots.iter()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &TileEntity> {
        self.slots.iter().filter(|e| e.active)
    }

    /// Find the active instance of `template` anchored at `anchor`.
    pub fn find_at(&self, template: TemplateId, anchor: GridPos) -> Option<u32> {
        self.slots
            .iter()
            .find(|e| e.matches(template, anchor))
            .map(|e| e.slot)
    }

    pub(crate) fn reset_net_windows(&mut self) {
        for ent in &mut self.slots {
            ent.net_window_sends = 0;
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}
