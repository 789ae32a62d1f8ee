use macroquad::prelude::KeyCode;

/// DOM `KeyboardEvent.code` name for a macroquad key, the naming used by
/// stored key bindings.
pub fn code_name(key: KeyCode) -> Option<&'static str> {
    let name = match key {
        KeyCode::A => "KeyA",
        KeyCode::B => "KeyB",
        KeyCode::C => "KeyC",
        KeyCode::D => "KeyD",
        KeyCode::E => "KeyE",
        KeyCode::F => "KeyF",
        KeyCode::G => "KeyG",
        KeyCode::H => "KeyH",
        KeyCode::I => "KeyI",
        KeyCode::J => "KeyJ",
        KeyCode::K => "KeyK",
        KeyCode::L => "KeyL",
        KeyCode::M => "KeyM",
        KeyCode::N => "KeyN",
        KeyCode::O => "KeyO",
        KeyCode::P => "KeyP",
        KeyCode::Q => "KeyQ",
        KeyCode::R => "KeyR",
        KeyCode::S => "KeyS",
        KeyCode::T => "KeyT",
        KeyCode::U => "KeyU",
        KeyCode::V => "KeyV",
        KeyCode::W => "KeyW",
        KeyCode::X => "KeyX",
        KeyCode::Y => "KeyY",
        KeyCode::Z => "KeyZ",
        KeyCode::Key0 => "Digit0",
        KeyCode::Key1 => "Digit1",
        KeyCode::Key2 => "Digit2",
        KeyCode::Key3 => "Digit3",
        KeyCode::Key4 => "Digit4",
        KeyCode::Key5 => "Digit5",
        KeyCode::Key6 => "Digit6",
        KeyCode::Key7 => "Digit7",
        KeyCode::Key8 => "Digit8",
        KeyCode::Key9 => "Digit9",
        KeyCode::Up => "ArrowUp",
        KeyCode::Down => "ArrowDown",
        KeyCode::Left => "ArrowLeft",
        KeyCode::Right => "ArrowRight",
        KeyCode::Space => "Space",
        KeyCode::Enter => "Enter",
        KeyCode::Escape => "Escape",
        KeyCode::Tab => "Tab",
        KeyCode::Backspace => "Backspace",
        KeyCode::LeftShift => "ShiftLeft",
        KeyCode::RightShift => "ShiftRight",
        KeyCode::LeftControl => "ControlLeft",
        KeyCode::RightControl => "ControlRight",
        KeyCode::LeftAlt => "AltLeft",
        KeyCode::RightAlt => "AltRight",
        KeyCode::Minus => "Minus",
        KeyCode::Equal => "Equal",
        KeyCode::Comma => "Comma",
        KeyCode::Period => "Period",
        KeyCode::Slash => "Slash",
        KeyCode::Semicolon => "Semicolon",
        KeyCode::Apostrophe => "Quote",
        KeyCode::LeftBracket => "BracketLeft",
        KeyCode::RightBracket => "BracketRight",
        KeyCode::Backslash => "Backslash",
        KeyCode::GraveAccent => "Backquote",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use streetrider_core::{Action, KeyBindings};

    #[test]
    fn default_bindings_are_reachable() {
        let bindings = KeyBindings::default();
        for (key, action) in [
            (KeyCode::W, Action::Forward),
            (KeyCode::S, Action::Backward),
            (KeyCode::A, Action::Left),
            (KeyCode::D, Action::Right),
            (KeyCode::Space, Action::Horn),
        ] {
            let code = code_name(key).unwrap();
            assert_eq!(bindings.action_for(code), Some(action));
        }
    }

    #[test]
    fn arrows_use_dom_names() {
        assert_eq!(code_name(KeyCode::Up), Some("ArrowUp"));
        assert_eq!(code_name(KeyCode::Key1), Some("Digit1"));
        assert_eq!(code_name(KeyCode::F1), None);
    }
}
