use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Forward,
    Backward,
    Left,
    Right,
    Horn,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Forward,
        Action::Backward,
        Action::Left,
        Action::Right,
        Action::Horn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::Backward => "backward",
            Action::Left => "left",
            Action::Right => "right",
            Action::Horn => "horn",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Action::Forward => 1,
            Action::Backward => 2,
            Action::Left => 4,
            Action::Right => 8,
            Action::Horn => 16,
        }
    }
}

/// Held driving inputs for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl ControlInput {
    pub const NONE: ControlInput = ControlInput {
        forward: false,
        backward: false,
        left: false,
        right: false,
    };

    fn from_bits(bits: u8) -> Self {
        Self {
            forward: bits & Action::Forward.bit() != 0,
            backward: bits & Action::Backward.bit() != 0,
            left: bits & Action::Left.bit() != 0,
            right: bits & Action::Right.bit() != 0,
        }
    }

    pub fn is_coasting(&self) -> bool {
        !self.forward && !self.backward
    }
}

/// Physical key codes (DOM `KeyboardEvent.code` names) per action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub forward: String,
    pub backward: String,
    pub left: String,
    pub right: String,
    pub horn: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: default_code(Action::Forward).to_string(),
            backward: default_code(Action::Backward).to_string(),
            left: default_code(Action::Left).to_string(),
            right: default_code(Action::Right).to_string(),
            horn: default_code(Action::Horn).to_string(),
        }
    }
}

pub fn default_code(action: Action) -> &'static str {
    match action {
        Action::Forward => "KeyW",
        Action::Backward => "KeyS",
        Action::Left => "KeyA",
        Action::Right => "KeyD",
        Action::Horn => "Space",
    }
}

impl KeyBindings {
    pub fn code_for(&self, action: Action) -> &str {
        match action {
            Action::Forward => &self.forward,
            Action::Backward => &self.backward,
            Action::Left => &self.left,
            Action::Right => &self.right,
            Action::Horn => &self.horn,
        }
    }

    fn code_for_mut(&mut self, action: Action) -> &mut String {
        match action {
            Action::Forward => &mut self.forward,
            Action::Backward => &mut self.backward,
            Action::Left => &mut self.left,
            Action::Right => &mut self.right,
            Action::Horn => &mut self.horn,
        }
    }

    pub fn action_for(&self, code: &str) -> Option<Action> {
        Action::ALL
            .into_iter()
            .find(|&action| self.code_for(action) == code)
    }

    /// Trims every binding and restores the default key for blank ones.
    pub fn with_defaults_for_blank(mut self) -> Self {
        for action in Action::ALL {
            let slot = self.code_for_mut(action);
            let trimmed = slot.trim();
            *slot = if trimmed.is_empty() {
                default_code(action).to_string()
            } else {
                trimmed.to_string()
            };
        }
        self
    }

    /// First pair of actions sharing one key, if any.
    pub fn duplicate(&self) -> Option<(Action, Action, &str)> {
        for (i, &first) in Action::ALL.iter().enumerate() {
            for &second in &Action::ALL[i + 1..] {
                if self.code_for(first) == self.code_for(second) {
                    return Some((first, second, self.code_for(first)));
                }
            }
        }
        None
    }
}

pub trait InputSource {
    fn snapshot(&self) -> ControlInput;

    /// Horn press edges since the previous call.
    fn take_horn_presses(&self) -> u32 {
        0
    }
}

impl InputSource for ControlInput {
    fn snapshot(&self) -> ControlInput {
        *self
    }
}

/// Press/release latch written by the key event source and read once per
/// frame. All held flags live in one atomic word so a snapshot never mixes
/// two event epochs.
#[derive(Debug, Default)]
pub struct InputLatch {
    held: AtomicU8,
    horn_presses: AtomicU32,
}

impl InputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, action: Action) {
        let previous = self.held.fetch_or(action.bit(), Ordering::SeqCst);
        if action == Action::Horn && previous & Action::Horn.bit() == 0 {
            self.horn_presses.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn release(&self, action: Action) {
        self.held.fetch_and(!action.bit(), Ordering::SeqCst);
    }

    /// Routes a key edge through `bindings`. Returns the matched action.
    pub fn handle_key(&self, code: &str, pressed: bool, bindings: &KeyBindings) -> Option<Action> {
        let action = bindings.action_for(code)?;
        if pressed {
            self.press(action);
        } else {
            self.release(action);
        }
        Some(action)
    }

    pub fn release_all(&self) {
        self.held.store(0, Ordering::SeqCst);
    }

    /// Releases every action and drops uncounted horn presses.
    pub fn reset(&self) {
        self.release_all();
        self.horn_presses.store(0, Ordering::SeqCst);
    }

    pub fn is_held(&self, action: Action) -> bool {
        self.held.load(Ordering::SeqCst) & action.bit() != 0
    }
}

impl InputSource for InputLatch {
    fn snapshot(&self) -> ControlInput {
        ControlInput::from_bits(self.held.load(Ordering::SeqCst))
    }

    fn take_horn_presses(&self) -> u32 {
        self.horn_presses.swap(0, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_resolve_wasd_and_space() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.action_for("KeyW"), Some(Action::Forward));
        assert_eq!(bindings.action_for("KeyS"), Some(Action::Backward));
        assert_eq!(bindings.action_for("KeyA"), Some(Action::Left));
        assert_eq!(bindings.action_for("KeyD"), Some(Action::Right));
        assert_eq!(bindings.action_for("Space"), Some(Action::Horn));
        assert_eq!(bindings.action_for("KeyQ"), None);
    }

    #[test]
    fn blank_bindings_fall_back_to_defaults() {
        let bindings = KeyBindings {
            forward: "  ArrowUp ".to_string(),
            backward: "   ".to_string(),
            ..KeyBindings::default()
        }
        .with_defaults_for_blank();

        assert_eq!(bindings.forward, "ArrowUp");
        assert_eq!(bindings.backward, "KeyS");
    }

    #[test]
    fn duplicate_detects_shared_key() {
        let bindings = KeyBindings {
            left: "KeyW".to_string(),
            ..KeyBindings::default()
        };
        let (first, second, code) = bindings.duplicate().unwrap();
        assert_eq!((first, second, code), (Action::Forward, Action::Left, "KeyW"));
        assert!(KeyBindings::default().duplicate().is_none());
    }

    #[test]
    fn latch_snapshot_tracks_press_and_release() {
        let latch = InputLatch::new();
        let bindings = KeyBindings::default();

        assert_eq!(latch.handle_key("KeyW", true, &bindings), Some(Action::Forward));
        latch.handle_key("KeyA", true, &bindings);
        let snapshot = latch.snapshot();
        assert!(snapshot.forward && snapshot.left);
        assert!(!snapshot.backward && !snapshot.right);

        latch.handle_key("KeyW", false, &bindings);
        let snapshot = latch.snapshot();
        assert!(!snapshot.forward && snapshot.left);

        assert_eq!(latch.handle_key("KeyZ", true, &bindings), None);
        latch.release_all();
        assert_eq!(latch.snapshot(), ControlInput::NONE);
    }

    #[test]
    fn reset_clears_held_keys_and_pending_horn() {
        let latch = InputLatch::new();
        latch.press(Action::Forward);
        latch.press(Action::Horn);

        latch.reset();
        assert_eq!(latch.snapshot(), ControlInput::NONE);
        assert_eq!(latch.take_horn_presses(), 0);
    }

    #[test]
    fn horn_counts_press_edges_not_repeats() {
        let latch = InputLatch::new();
        latch.press(Action::Horn);
        latch.press(Action::Horn); // key repeat while held
        latch.release(Action::Horn);
        latch.press(Action::Horn);

        assert_eq!(latch.take_horn_presses(), 2);
        assert_eq!(latch.take_horn_presses(), 0);
        assert!(latch.is_held(Action::Horn));
    }
}
