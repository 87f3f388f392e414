//! Key-event translation: what a shell expects to read for a given keypress.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Bracketed-paste framing markers.
pub const PASTE_START: &[u8] = b"\x1b[200~";
pub const PASTE_END: &[u8] = b"\x1b[201~";

/// Translate a key event into the byte sequence a shell expects.
/// Returns `None` for keys that have no terminal encoding.
pub fn encode_key(key: &KeyEvent) -> Option<Vec<u8>> {
    match key.code {
        KeyCode::Char(c) => {
            let mut bytes = Vec::new();
            if key.modifiers.contains(KeyModifiers::ALT) {
                bytes.push(0x1b);
            }
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                let lower = c.to_ascii_lowercase();
                if lower.is_ascii_lowercase() {
                    bytes.push((lower as u8 - b'a') + 1);
                } else {
                    return None;
                }
            } else {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Some(bytes)
        }
        KeyCode::Enter => Some(vec![b'\r']),
        KeyCode::Tab => Some(vec![b'\t']),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Esc => Some(vec![0x1b]),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        KeyCode::Home => Some(b"\x1b[H".to_vec()),
        KeyCode::End => Some(b"\x1b[F".to_vec()),
        KeyCode::PageUp => Some(b"\x1b[5~".to_vec()),
        KeyCode::PageDown => Some(b"\x1b[6~".to_vec()),
        KeyCode::Delete => Some(b"\x1b[3~".to_vec()),
        KeyCode::Insert => Some(b"\x1b[2~".to_vec()),
        _ => None,
    }
}

/// Encode pasted text for the shell. CRLF is normalized to LF first; when
/// bracketed-paste mode is active the payload is framed so the receiving
/// program can tell paste from typed input.
pub fn encode_paste(text: &str, bracketed: bool) -> Vec<u8> {
    let normalized = text.replace("\r\n", "\n");
    if !bracketed {
        return normalized.into_bytes();
    }
    let mut bytes = Vec::with_capacity(normalized.len() + PASTE_START.len() + PASTE_END.len());
    bytes.extend_from_slice(PASTE_START);
    bytes.extend_from_slice(normalized.as_bytes());
    bytes.extend_from_slice(PASTE_END);
    bytes
}

/// Focus in/out report, emitted only while focus tracking is enabled.
pub fn encode_focus(focused: bool, tracking: bool) -> Option<Vec<u8>> {
    if !tracking {
        return None;
    }
    Some(if focused {
        b"\x1b[I".to_vec()
    } else {
        b"\x1b[O".to_vec()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn ctrl_letter_maps_to_control_byte() {
        let bytes = encode_key(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)).unwrap();
        assert_eq!(bytes, vec![0x03]);
    }

    #[test]
    fn alt_letter_is_escape_prefixed() {
        let bytes = encode_key(&key(KeyCode::Char('b'), KeyModifiers::ALT)).unwrap();
        assert_eq!(bytes, vec![0x1b, b'b']);
    }

    #[test]
    fn arrows_use_csi_sequences() {
        assert_eq!(
            encode_key(&key(KeyCode::Up, KeyModifiers::NONE)).unwrap(),
            b"\x1b[A"
        );
        assert_eq!(
            encode_key(&key(KeyCode::Delete, KeyModifiers::NONE)).unwrap(),
            b"\x1b[3~"
        );
    }

    #[test]
    fn utf8_char_passes_through() {
        let bytes = encode_key(&key(KeyCode::Char('é'), KeyModifiers::NONE)).unwrap();
        assert_eq!(bytes, "é".as_bytes());
    }

    #[test]
    fn paste_wraps_when_bracketed() {
        let bytes = encode_paste("ls\r\n", true);
        assert_eq!(bytes, b"\x1b[200~ls\n\x1b[201~");
        assert_eq!(encode_paste("ls\r\n", false), b"ls\n");
    }
}
