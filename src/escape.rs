//! String escaping for SQL literals
//!
//! Two escapers matching the server's literal syntax:
//! * [`escape_backslashes`]: the default mode, special bytes are prefixed
//!   with a backslash
//! * [`escape_quotes`]: for sessions running with `NO_BACKSLASH_ESCAPES`,
//!   where only the quote character is doubled
//!
//! Both operate on bytes. In UTF-8 and `utf8mb4` every byte of a multi-byte
//! sequence is >= 0x80, so no continuation byte is ever mistaken for a
//! special character and the output stays valid UTF-8.
//!
//! Both write into a caller-provided buffer and return the number of bytes
//! written, or `None` if the buffer is too small. A buffer of
//! `2 * from.len()` bytes is always sufficient.

/// Escape with backslashes (default server mode)
pub fn escape_backslashes(to: &mut [u8], from: &[u8]) -> Option<usize> {
    let mut written = 0;
    for &byte in from {
        let escaped = match byte {
            0 => Some(b'0'),
            b'\n' => Some(b'n'),
            b'\r' => Some(b'r'),
            b'\\' => Some(b'\\'),
            b'\'' => Some(b'\''),
            b'"' => Some(b'"'),
            0x1a => Some(b'Z'),
            _ => None,
        };
        match escaped {
            Some(c) => {
                put(to, &mut written, b'\\')?;
                put(to, &mut written, c)?;
            }
            None => put(to, &mut written, byte)?,
        }
    }
    Some(written)
}

/// Escape by doubling single quotes (`NO_BACKSLASH_ESCAPES` mode)
pub fn escape_quotes(to: &mut [u8], from: &[u8]) -> Option<usize> {
    let mut written = 0;
    for &byte in from {
        if byte == b'\'' {
            put(to, &mut written, b'\'')?;
        }
        put(to, &mut written, byte)?;
    }
    Some(written)
}

fn put(to: &mut [u8], pos: &mut usize, byte: u8) -> Option<()> {
    *to.get_mut(*pos)? = byte;
    *pos += 1;
    Some(())
}
