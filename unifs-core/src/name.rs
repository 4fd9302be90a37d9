use core::fmt;
use core::str;

use crate::{NAME_MAX, NAME_SIZE, SEPARATOR};

/// The name field of an entry record: a bounded, zero-padded byte buffer.
///
/// Names longer than [`NAME_MAX`] bytes are cut at the last character
/// boundary that fits, and the cut is remembered so callers can report it.
/// Collisions between names that only differ after the cut are not detected.
/// The cut can also change the kind a reader sees: a directory may lose its
/// trailing `/`, or a file name may end right after one.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct EntryName {
    field: [u8; NAME_SIZE],
    len: usize,
    truncated: bool,
}

impl EntryName {
    pub fn new(name: &str) -> EntryName {
        let mut len = name.len();
        let truncated = len > NAME_MAX;
        if truncated {
            len = NAME_MAX;
            while !name.is_char_boundary(len) {
                len -= 1;
            }
        }

        let mut field = [0; NAME_SIZE];
        field[..len].copy_from_slice(&name.as_bytes()[..len]);
        EntryName {
            field,
            len,
            truncated,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.field[..self.len]
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from a &str, cut on a char boundary
        str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    /// The zero-padded field as it is stored in the entry table
    pub fn field(&self) -> [u8; NAME_SIZE] {
        self.field
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn is_dir(&self) -> bool {
        self.as_str().ends_with(SEPARATOR)
    }
}

impl fmt::Debug for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryName")
            .field("name", &self.as_str())
            .field("truncated", &self.truncated)
            .finish()
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
