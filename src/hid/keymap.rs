//! HID usage code → logical key translation (US layout, shift-aware).
//!
//! Covers what a boot-protocol keyboard actually sends: letters, digits,
//! punctuation, space, Enter/Escape/Backspace/Tab and the navigation
//! cluster. Everything else (modifiers, function keys, keypad) maps to
//! `None` and produces no event.

use crate::input::event::Key;

/// Translate one HID keyboard usage code.
///
/// `shift` selects the shifted glyph for printable keys; named keys
/// ignore it. Total over all inputs, never panics.
pub fn translate(keycode: u8, shift: bool) -> Option<Key> {
    let key = match keycode {
        // Letters: 0x04..=0x1D is 'a'..='z' in usage order.
        0x04..=0x1D => {
            let base = b'a' + (keycode - 0x04);
            Key::Char(if shift { base.to_ascii_uppercase() } else { base } as char)
        }
        // Digits 1-9 then 0, with their US-layout shifted symbols.
        0x1E..=0x27 => Key::Char(digit_glyph(keycode, shift)),
        0x28 => Key::Enter,
        0x29 => Key::Escape,
        0x2A => Key::Backspace,
        0x2B => Key::Tab,
        0x2C => Key::Char(' '),
        0x2D => Key::Char(if shift { '_' } else { '-' }),
        0x2E => Key::Char(if shift { '+' } else { '=' }),
        0x2F => Key::Char(if shift { '{' } else { '[' }),
        0x30 => Key::Char(if shift { '}' } else { ']' }),
        0x31 => Key::Char(if shift { '|' } else { '\\' }),
        0x32 => Key::Char(if shift { '~' } else { '#' }),
        0x33 => Key::Char(if shift { ':' } else { ';' }),
        0x34 => Key::Char(if shift { '"' } else { '\'' }),
        0x35 => Key::Char(if shift { '~' } else { '`' }),
        0x36 => Key::Char(if shift { '<' } else { ',' }),
        0x37 => Key::Char(if shift { '>' } else { '.' }),
        0x38 => Key::Char(if shift { '?' } else { '/' }),
        // Navigation cluster, standard HID usage order.
        0x4A => Key::Home,
        0x4B => Key::PageUp,
        0x4C => Key::Delete,
        0x4D => Key::End,
        0x4E => Key::PageDown,
        0x4F => Key::Right,
        0x50 => Key::Left,
        0x51 => Key::Down,
        0x52 => Key::Up,
        _ => return None,
    };
    Some(key)
}

/// 0x1E..=0x26 are '1'..='9'; 0x27 is '0'.
fn digit_glyph(keycode: u8, shift: bool) -> char {
    const SHIFTED: [char; 10] = ['!', '@', '#', '$', '%', '^', '&', '*', '(', ')'];
    let index = (keycode - 0x1E) as usize;
    if shift {
        SHIFTED[index]
    } else if keycode == 0x27 {
        '0'
    } else {
        (b'1' + (keycode - 0x1E)) as char
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_follow_shift() {
        assert_eq!(translate(0x04, false), Some(Key::Char('a')));
        assert_eq!(translate(0x04, true), Some(Key::Char('A')));
        assert_eq!(translate(0x1D, false), Some(Key::Char('z')));
        assert_eq!(translate(0x1D, true), Some(Key::Char('Z')));
    }

    #[test]
    fn digits_and_their_symbols() {
        assert_eq!(translate(0x1E, false), Some(Key::Char('1')));
        assert_eq!(translate(0x1E, true), Some(Key::Char('!')));
        assert_eq!(translate(0x26, false), Some(Key::Char('9')));
        assert_eq!(translate(0x26, true), Some(Key::Char('(')));
        assert_eq!(translate(0x27, false), Some(Key::Char('0')));
        assert_eq!(translate(0x27, true), Some(Key::Char(')')));
    }

    #[test]
    fn named_keys_ignore_shift() {
        for shift in [false, true] {
            assert_eq!(translate(0x28, shift), Some(Key::Enter));
            assert_eq!(translate(0x29, shift), Some(Key::Escape));
            assert_eq!(translate(0x2A, shift), Some(Key::Backspace));
            assert_eq!(translate(0x2B, shift), Some(Key::Tab));
        }
    }

    #[test]
    fn space_and_punctuation() {
        assert_eq!(translate(0x2C, true), Some(Key::Char(' ')));
        assert_eq!(translate(0x2D, false), Some(Key::Char('-')));
        assert_eq!(translate(0x2D, true), Some(Key::Char('_')));
        assert_eq!(translate(0x33, false), Some(Key::Char(';')));
        assert_eq!(translate(0x33, true), Some(Key::Char(':')));
        assert_eq!(translate(0x38, true), Some(Key::Char('?')));
    }

    #[test]
    fn navigation_cluster() {
        assert_eq!(translate(0x4A, false), Some(Key::Home));
        assert_eq!(translate(0x4B, false), Some(Key::PageUp));
        assert_eq!(translate(0x4C, false), Some(Key::Delete));
        assert_eq!(translate(0x4D, false), Some(Key::End));
        assert_eq!(translate(0x4E, false), Some(Key::PageDown));
        assert_eq!(translate(0x4F, false), Some(Key::Right));
        assert_eq!(translate(0x50, false), Some(Key::Left));
        assert_eq!(translate(0x51, false), Some(Key::Down));
        assert_eq!(translate(0x52, false), Some(Key::Up));
    }

    #[test]
    fn unmapped_usages_translate_to_nothing() {
        // No-key, rollover, F-keys, keypad, modifiers.
        for keycode in [0x00u8, 0x01, 0x3A, 0x45, 0x54, 0x63, 0xE0, 0xE5, 0xFF] {
            assert_eq!(translate(keycode, false), None, "{keycode:#04x}");
            assert_eq!(translate(keycode, true), None, "{keycode:#04x}");
        }
    }

    #[test]
    fn total_over_the_whole_input_space() {
        // Exercise all 256 x 2 inputs; must never panic.
        for keycode in 0..=255u8 {
            for shift in [false, true] {
                let _ = translate(keycode, shift);
            }
        }
    }
}
