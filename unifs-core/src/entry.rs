//! The packed structs represent the on-disk format of a UNIFS image
use core::fmt::Display;
use core::str;

use bytemuck::{Pod, Zeroable};

use crate::{EntryName, Error, Span, NAME_SIZE, SEPARATOR};

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Entry {
    /// Relative path, zero-padded; directories end with a `/`
    pub name: [u8; NAME_SIZE],
    /// Offset of file data from the start of the image
    pub offset: u64,
    /// Size in bytes of the file data
    pub size: u64,
}

impl Display for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (offset, size) = (self.offset, self.size);
        write!(
            f,
            "name={:?} offset={} size={}",
            alloc::string::String::from_utf8_lossy(self.name_bytes()),
            offset,
            size,
        )
    }
}

impl Entry {
    /// Encode a file record occupying `span` of the image
    pub fn file(name: &EntryName, span: Span) -> Entry {
        Entry {
            name: name.field(),
            offset: span.offset,
            size: span.size,
        }
    }

    /// Encode a directory record, which never owns any data
    pub fn directory(name: &EntryName) -> Entry {
        Entry::file(name, Span::EMPTY)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn span(&self) -> Span {
        Span {
            offset: self.offset,
            size: self.size,
        }
    }

    /// Retrieve the name, ending at the first NUL or at the end of the field
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.name.len());
        &self.name[..end]
    }

    pub fn name(&self) -> Result<&str, Error> {
        Ok(str::from_utf8(self.name_bytes())?)
    }

    pub fn is_dir(&self) -> bool {
        self.name_bytes().last() == Some(&(SEPARATOR as u8))
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Entry;
    use crate::{EntryName, Span, ENTRY_SIZE};

    #[test]
    fn record_layout() {
        let entry = Entry::file(
            &EntryName::new("a.txt"),
            Span {
                offset: 0x0102,
                size: 7,
            },
        );
        let bytes = entry.as_bytes();
        assert_eq!(bytes.len(), ENTRY_SIZE);
        assert_eq!(&bytes[..5], b"a.txt");
        assert!(bytes[5..64].iter().all(|&b| b == 0));
        assert_eq!(&bytes[64..72], &0x0102u64.to_le_bytes());
        assert_eq!(&bytes[72..80], &7u64.to_le_bytes());
    }

    #[test]
    fn directory_has_no_data() {
        let entry = Entry::directory(&EntryName::new("sub/"));
        assert!(entry.is_dir());
        assert_eq!(entry.offset(), 0);
        assert_eq!(entry.size(), 0);
    }

    #[test]
    fn unterminated_name_uses_whole_field() {
        let mut entry = Entry::directory(&EntryName::new(""));
        entry.name = [b'q'; 64];
        assert_eq!(entry.name_bytes().len(), 64);
        assert!(entry.name().is_ok());
    }

    #[test]
    fn invalid_utf8_name() {
        let mut entry = Entry::directory(&EntryName::new(""));
        entry.name[0] = 0xff;
        assert!(entry.name().is_err());
        assert_eq!(entry.name_bytes(), &[0xff]);
    }
}
