//! Bounded undo/redo over whole-image snapshots.

use std::collections::VecDeque;
use std::mem;

use image::RgbImage;

/// Undo and redo stacks of previous `current` images.
///
/// Each entry is a full snapshot, so the undo stack is capped at `limit`
/// entries and drops the oldest when it overflows. A limit of 0 keeps no
/// history at all. Undo and redo together never hold more than `limit`
/// snapshots.
#[derive(Debug, Clone)]
pub struct EditHistory {
    undo_stack: VecDeque<RgbImage>,
    redo_stack: Vec<RgbImage>,
    limit: usize,
}

impl EditHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            limit,
        }
    }

    /// Remember `previous` as the state before a new edit.
    ///
    /// A new edit invalidates everything that was undone.
    pub fn record(&mut self, previous: RgbImage) {
        self.redo_stack.clear();
        if self.limit == 0 {
            return;
        }
        if self.undo_stack.len() == self.limit {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(previous);
    }

    /// Step `current` back one edit. Returns false when there is nothing to undo.
    pub fn undo(&mut self, current: &mut RgbImage) -> bool {
        match self.undo_stack.pop_back() {
            Some(previous) => {
                let undone = mem::replace(current, previous);
                self.redo_stack.push(undone);
                true
            }
            None => false,
        }
    }

    /// Re-apply the last undone edit. Returns false when there is nothing to redo.
    pub fn redo(&mut self, current: &mut RgbImage) -> bool {
        match self.redo_stack.pop() {
            Some(next) => {
                let previous = mem::replace(current, next);
                self.undo_stack.push_back(previous);
                if self.undo_stack.len() > self.limit {
                    self.undo_stack.pop_front();
                }
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(v: u8) -> RgbImage {
        RgbImage::from_pixel(1, 1, Rgb([v, v, v]))
    }

    fn value(img: &RgbImage) -> u8 {
        img.get_pixel(0, 0).0[0]
    }

    #[test]
    fn test_undo_then_redo() {
        let mut history = EditHistory::new(10);
        let mut current = solid(0);

        for v in 1..=3 {
            history.record(std::mem::replace(&mut current, solid(v)));
        }
        assert_eq!(value(&current), 3);

        assert!(history.undo(&mut current));
        assert!(history.undo(&mut current));
        assert_eq!(value(&current), 1);

        assert!(history.redo(&mut current));
        assert_eq!(value(&current), 2);
        assert!(history.can_redo());
    }

    #[test]
    fn test_empty_history() {
        let mut history = EditHistory::new(10);
        let mut current = solid(7);

        assert!(!history.undo(&mut current));
        assert!(!history.redo(&mut current));
        assert_eq!(value(&current), 7);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut history = EditHistory::new(10);
        let mut current = solid(0);
        history.record(std::mem::replace(&mut current, solid(1)));
        history.undo(&mut current);
        assert!(history.can_redo());

        history.record(std::mem::replace(&mut current, solid(5)));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = EditHistory::new(2);
        let mut current = solid(0);
        for v in 1..=4 {
            history.record(std::mem::replace(&mut current, solid(v)));
        }
        assert_eq!(history.undo_depth(), 2);

        history.undo(&mut current);
        history.undo(&mut current);
        assert_eq!(value(&current), 2);
        assert!(!history.undo(&mut current));
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let mut history = EditHistory::new(0);
        let mut current = solid(0);
        history.record(std::mem::replace(&mut current, solid(1)));
        assert!(!history.can_undo());
    }
}
