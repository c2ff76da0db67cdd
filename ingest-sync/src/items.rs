//! Item model
//!
//! Ordered list of the programme items on the source tape.
//!
//! **Invariants:**
//! - Item ids are unique
//! - `index` equals vector position (contiguous 0..N-1)
//! - All enabled items precede all disabled items
//!
//! Every transform re-derives indices and re-checks the invariant. A transform
//! whose precondition fails leaves the list untouched.

use crate::error::{Error, Result};
use ingest_common::api::{check_item_order, ClipMark, Item};
use std::collections::HashMap;

/// Presentation-ordered item list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemList {
    items: Vec<Item>,
}

impl ItemList {
    /// Create new empty item list
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Replace the whole list (authoritative reload)
    ///
    /// On validation failure the current list is kept.
    pub fn replace(&mut self, items: Vec<Item>) -> Result<()> {
        check_item_order(&items)?;
        self.items = items;
        Ok(())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: i64) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Current index of an item
    pub fn position(&self, id: i64) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Number of enabled items (the enabled run at the head of the list)
    pub fn enabled_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_disabled).count()
    }

    pub fn check_invariant(&self) -> Result<()> {
        check_item_order(&self.items).map_err(|e| Error::InvalidState(e.to_string()))
    }

    fn require(&self, id: i64) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| Error::Rejected(format!("item {} is not in the list", id)))
    }

    // ========================================
    // Preconditions (return the current index)
    // ========================================

    pub fn check_move_up(&self, id: i64) -> Result<usize> {
        let index = self.require(id)?;
        if self.items[index].is_disabled {
            return Err(Error::Rejected(format!("item {} is disabled", id)));
        }
        if index == 0 {
            return Err(Error::Rejected(format!("item {} is already first", id)));
        }
        Ok(index)
    }

    pub fn check_move_down(&self, id: i64) -> Result<usize> {
        let index = self.require(id)?;
        if self.items[index].is_disabled {
            return Err(Error::Rejected(format!("item {} is disabled", id)));
        }
        match self.items.get(index + 1) {
            Some(next) if !next.is_disabled => Ok(index),
            _ => Err(Error::Rejected(format!("item {} is the last enabled item", id))),
        }
    }

    pub fn check_enable(&self, id: i64) -> Result<usize> {
        let index = self.require(id)?;
        if !self.items[index].is_disabled {
            return Err(Error::Rejected(format!("item {} is not disabled", id)));
        }
        Ok(index)
    }

    pub fn check_disable(&self, id: i64) -> Result<usize> {
        let index = self.require(id)?;
        if self.items[index].is_disabled {
            return Err(Error::Rejected(format!("item {} is already disabled", id)));
        }
        Ok(index)
    }

    // ========================================
    // Transforms
    // ========================================

    /// Move an item one place towards the head
    ///
    /// The clip timing pair belongs to the slot, so the two items swap places
    /// and exchange their start/duration values.
    pub fn move_up(&mut self, id: i64) -> Result<()> {
        let index = self.check_move_up(id)?;
        self.swap_adjacent(index - 1);
        self.reindex();
        self.check_invariant()
    }

    /// Move an item one place towards the tail of the enabled run
    pub fn move_down(&mut self, id: i64) -> Result<()> {
        let index = self.check_move_down(id)?;
        self.swap_adjacent(index);
        self.reindex();
        self.check_invariant()
    }

    /// Disable an item: it becomes the first item of the disabled run
    ///
    /// The item carries its timing pair with it; only the clip-marks reload
    /// changes marks.
    pub fn disable(&mut self, id: i64) -> Result<()> {
        let index = self.check_disable(id)?;
        let mut item = self.items.remove(index);
        item.is_disabled = true;
        let target = self.enabled_count();
        self.items.insert(target, item);
        self.reindex();
        self.check_invariant()
    }

    /// Enable an item: it becomes the last item of the enabled run
    pub fn enable(&mut self, id: i64) -> Result<()> {
        let index = self.check_enable(id)?;
        let mut item = self.items.remove(index);
        item.is_disabled = false;
        let target = self.enabled_count();
        self.items.insert(target, item);
        self.reindex();
        self.check_invariant()
    }

    /// Apply clip marks by item id
    ///
    /// All marks are checked before any is applied; a mark for an unknown
    /// item means the local list is out of date and nothing changes.
    pub fn apply_clip_marks(&mut self, marks: &[ClipMark]) -> Result<usize> {
        let positions: HashMap<i64, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id, pos))
            .collect();

        let mut targets = Vec::with_capacity(marks.len());
        for mark in marks {
            let pos = positions.get(&mark.id).ok_or_else(|| {
                Error::InvalidState(format!("clip mark for unknown item {}", mark.id))
            })?;
            targets.push((*pos, mark));
        }

        for (pos, mark) in &targets {
            let item = &mut self.items[*pos];
            item.item_start_position = mark.item_start_position;
            item.item_duration = mark.item_duration;
        }
        Ok(targets.len())
    }

    /// Swap items at `upper` and `upper + 1`, keeping timings with the slots
    fn swap_adjacent(&mut self, upper: usize) {
        self.items.swap(upper, upper + 1);
        let (head, tail) = self.items.split_at_mut(upper + 1);
        let a = &mut head[upper];
        let b = &mut tail[0];
        std::mem::swap(&mut a.item_start_position, &mut b.item_start_position);
        std::mem::swap(&mut a.item_duration, &mut b.item_duration);
    }

    fn reindex(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.index = index;
        }
    }
}
