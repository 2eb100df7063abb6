use alloc::vec::Vec;

use crate::param::NLAYER;

/// The four priority-level queues as one owning object.
///
/// Entries are process-table slot indices. A slot appears in at most one
/// queue at a time, and each queue owns its own length; every mutation goes
/// through `insert`/`remove` (or `promote`/`demote`, which pair them) so the
/// single-membership invariant cannot be broken piecemeal.
///
/// Insertion order within a level is preserved: new entries go to the tail
/// and removal shifts the remainder left, which is what gives the scheduler
/// its round-robin/FIFO fairness.
#[derive(Debug, Default)]
pub struct LevelQueueSet {
    levels: [Vec<usize>; NLAYER],
}

impl LevelQueueSet {
    pub const fn new() -> Self {
        Self {
            levels: [const { Vec::new() }; NLAYER],
        }
    }

    pub fn len(&self, level: usize) -> usize {
        self.levels[level].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(Vec::is_empty)
    }

    /// Slot index at `index` within `level`.
    pub fn get(&self, level: usize, index: usize) -> usize {
        self.levels[level][index]
    }

    /// The level currently holding `slot`, if any.
    pub fn level_of(&self, slot: usize) -> Option<usize> {
        self.levels
            .iter()
            .position(|queue| queue.contains(&slot))
    }

    /// Position of `slot` within `level`, if present.
    pub fn position(&self, level: usize, slot: usize) -> Option<usize> {
        self.levels[level].iter().position(|&s| s == slot)
    }

    /// Appends `slot` to the tail of `level`.
    pub fn insert(&mut self, level: usize, slot: usize) {
        assert!(
            self.level_of(slot).is_none(),
            "queue insert: slot {slot} already queued"
        );
        self.levels[level].push(slot);
    }

    /// Removes `slot` from `level`, shifting later entries left.
    /// Returns the position it was removed from.
    pub fn remove(&mut self, level: usize, slot: usize) -> usize {
        let index = self
            .position(level, slot)
            .unwrap_or_else(|| panic!("queue remove: slot {slot} not at level {level}"));
        self.levels[level].remove(index);
        index
    }

    /// Moves `slot` one level up, to the tail of the higher queue.
    /// Returns the new level.
    pub fn promote(&mut self, level: usize, slot: usize) -> usize {
        assert!(level < NLAYER - 1, "promote from top level");
        self.remove(level, slot);
        self.levels[level + 1].push(slot);
        level + 1
    }

    /// Moves `slot` one level down, to the tail of the lower queue.
    /// Returns the new level.
    pub fn demote(&mut self, level: usize, slot: usize) -> usize {
        assert!(level > 0, "demote from bottom level");
        self.remove(level, slot);
        self.levels[level - 1].push(slot);
        level - 1
    }
}
