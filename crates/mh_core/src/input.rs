//! Keyboard state with both level-triggered and edge-triggered queries.
//!
//! - **Level-triggered (held):** `is_held(key)` is true every frame the key is
//!   physically down. Movement reads this.
//!
//! - **Edge-triggered (just_pressed / just_released):** true only during the
//!   frame the transition happened. Cleared by `end_frame()`, which the main
//!   loop calls only after at least one fixed simulation step has consumed
//!   them, so a press is never lost on a frame that ran zero steps.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Escape,
    Space,
    F3,
    F4,
    F5,
    W,
    A,
    S,
    D,
    R,
}

pub struct InputState {
    held: HashSet<Key>,
    just_pressed: HashSet<Key>,
    just_released: HashSet<Key>,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if self.held.remove(&key) {
            self.just_released.insert(key);
        }
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn is_just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn is_just_released(&self, key: Key) -> bool {
        self.just_released.contains(&key)
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_down_sets_held_and_just_pressed() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        assert!(input.is_held(Key::A));
        assert!(input.is_just_pressed(Key::A));
    }

    #[test]
    fn test_key_up_clears_held_sets_just_released() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        input.key_up(Key::A);
        assert!(!input.is_held(Key::A));
        assert!(input.is_just_released(Key::A));
    }

    #[test]
    fn test_key_down_repeat_does_not_double_just_pressed() {
        let mut input = InputState::new();
        input.key_down(Key::Up);
        input.end_frame();
        // OS key-repeat delivers more key_down events while held; those must
        // not re-arm the edge.
        input.key_down(Key::Up);
        assert!(input.is_held(Key::Up));
        assert!(!input.is_just_pressed(Key::Up));
    }

    #[test]
    fn test_key_up_without_down_is_no_op() {
        let mut input = InputState::new();
        input.key_up(Key::A);
        assert!(!input.is_just_released(Key::A));
        assert!(!input.is_held(Key::A));
    }

    #[test]
    fn test_end_frame_clears_transient_state() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        input.key_down(Key::Space);
        input.end_frame();
        assert!(!input.is_just_pressed(Key::A));
        assert!(!input.is_just_pressed(Key::Space));
        // Held state persists across frames.
        assert!(input.is_held(Key::A));
        assert!(input.is_held(Key::Space));
    }

    #[test]
    fn test_end_frame_clears_just_released() {
        let mut input = InputState::new();
        input.key_down(Key::R);
        input.key_up(Key::R);
        assert!(input.is_just_released(Key::R));
        input.end_frame();
        assert!(!input.is_just_released(Key::R));
    }

    #[test]
    fn test_multiple_keys_independent() {
        let mut input = InputState::new();
        input.key_down(Key::A);
        input.key_down(Key::D);
        assert!(input.is_held(Key::A));
        assert!(input.is_held(Key::D));

        input.key_up(Key::A);
        assert!(!input.is_held(Key::A));
        assert!(input.is_just_released(Key::A));
        assert!(input.is_held(Key::D));
        assert!(!input.is_just_released(Key::D));
    }

    #[test]
    fn test_default_state_is_empty() {
        let input = InputState::new();
        assert!(!input.is_held(Key::A));
        assert!(!input.is_held(Key::Space));
        assert!(!input.is_just_pressed(Key::A));
        assert!(!input.is_just_released(Key::A));
    }
}
