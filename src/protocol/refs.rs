//! Per-session reference table
//!
//! Every composite written or read during one top-level value takes the next
//! slot, starting at 0. The encoder looks slots up by composite identity; the
//! decoder resolves them by index.

use std::collections::HashMap;

use crate::model::Value;

/// Ordered composite slots with identity lookup
#[derive(Debug, Default)]
pub struct ReferenceTable {
    slots: Vec<Value>,
    index: HashMap<usize, u32>,
}

impl ReferenceTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot already assigned to this composite
    #[must_use]
    pub fn lookup(&self, value: &Value) -> Option<u32> {
        let addr = value.composite_addr()?;
        self.index.get(&addr).copied()
    }

    /// Assign the next slot; the table holds a handle so the address stays live
    ///
    /// Returns `None` once the slot count leaves the 32-bit wire range.
    pub fn insert(&mut self, value: Value) -> Option<u32> {
        let id = u32::try_from(self.slots.len()).ok()?;
        if let Some(addr) = value.composite_addr() {
            self.index.entry(addr).or_insert(id);
        }
        self.slots.push(value);
        Some(id)
    }

    /// Value assigned to a slot
    #[must_use]
    pub fn resolve(&self, id: u32) -> Option<&Value> {
        self.slots.get(usize::try_from(id).ok()?)
    }

    /// Number of assigned slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forget every slot
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }
}
