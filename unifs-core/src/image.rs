use core::slice::Iter;

use crate::{Entry, Error, Header, ImageSrc, HEADER_SIZE, SEPARATOR};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// How many leading bytes are inspected when guessing if a file is text
const TEXT_PROBE_LEN: usize = 256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileKind {
    Directory,
    Elf,
    Text,
    Binary,
}

/// Result of resolving one path component inside a directory
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    File(&'a Entry),
    Dir(&'a Entry),
}

impl<'a> Node<'a> {
    pub fn entry(&self) -> &'a Entry {
        match *self {
            Node::File(entry) | Node::Dir(entry) => entry,
        }
    }
}

/// A complete image held in memory, the way a kernel sees it after the boot
/// loader hands over the module.
///
/// Nothing is copied: the header and entry table are cast in place and file
/// data is returned as slices of the image. All lookups are linear scans of
/// the entry table.
#[derive(Clone, Copy, Debug)]
pub struct ImageBuf<'a> {
    data: &'a [u8],
    header: &'a Header,
    entries: &'a [Entry],
}

impl<'a> ImageBuf<'a> {
    pub fn new(data: &'a [u8]) -> Result<ImageBuf<'a>, Error> {
        let header = Header::parse(data)?;
        let entries = header.entries(&data[HEADER_SIZE..])?;
        Ok(ImageBuf {
            data,
            header,
            entries,
        })
    }

    pub fn header(&self) -> Header {
        *self.header
    }

    pub fn entries(&self) -> Iter<'a, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by its exact stored name. Directories are only found
    /// with their trailing `/`.
    pub fn find(&self, name: &str) -> Option<&'a Entry> {
        self.entries
            .iter()
            .find(|entry| entry.name_bytes() == name.as_bytes())
    }

    /// Contents of a file entry
    pub fn data(&self, entry: &Entry) -> Result<&'a [u8], Error> {
        let out_of_bounds = Error::OutOfBounds {
            offset: entry.offset(),
            size: entry.size(),
            len: self.data.len() as u64,
        };
        let start = usize::try_from(entry.offset())?;
        let end = usize::try_from(entry.span().end()?)?;
        self.data.get(start..end).ok_or(out_of_bounds)
    }

    /// Contents of the file called `name`, if there is one
    pub fn read(&self, name: &str) -> Result<Option<&'a [u8]>, Error> {
        match self.find(name) {
            Some(entry) if !entry.is_dir() => self.data(entry).map(Some),
            _ => Ok(None),
        }
    }

    /// Direct children of `dir`, which is either `""` for the root or a
    /// directory name ending with `/`
    pub fn read_dir(&self, dir: &'a str) -> ReadDir<'a> {
        ReadDir {
            prefix: dir,
            entries: self.entries.iter(),
        }
    }

    /// Resolve a single path component inside `dir`. Files win over
    /// directories of the same name.
    pub fn lookup(&self, dir: &str, component: &str) -> Option<Node<'a>> {
        if component.is_empty() || component.contains(SEPARATOR) {
            return None;
        }

        let matches = |entry: &&Entry, dir_marker: bool| {
            let name = entry.name_bytes();
            let expected_len = dir.len() + component.len() + usize::from(dir_marker);
            name.len() == expected_len
                && name.starts_with(dir.as_bytes())
                && name[dir.len()..].starts_with(component.as_bytes())
                && (!dir_marker || name.last() == Some(&(SEPARATOR as u8)))
        };

        if let Some(file) = self.entries.iter().find(|entry| matches(entry, false)) {
            return Some(Node::File(file));
        }
        self.entries
            .iter()
            .find(|entry| matches(entry, true))
            .map(Node::Dir)
    }

    /// Guess what a file holds from its first bytes
    pub fn file_kind(&self, entry: &Entry) -> Result<FileKind, Error> {
        if entry.is_dir() {
            return Ok(FileKind::Directory);
        }

        let data = self.data(entry)?;
        if data.starts_with(&ELF_MAGIC) {
            Ok(FileKind::Elf)
        } else if is_text(data) {
            Ok(FileKind::Text)
        } else {
            Ok(FileKind::Binary)
        }
    }
}

fn is_text(data: &[u8]) -> bool {
    data.iter()
        .take(TEXT_PROBE_LEN)
        .all(|&c| match c {
            b'\n' | b'\r' | b'\t' => true,
            0..=31 | 127..=159 => false,
            _ => true,
        })
}

impl ImageSrc for ImageBuf<'_> {
    type Err = Error;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        let start = usize::try_from(offset)?;
        let len = self.data.len();
        if start >= len {
            return Ok(0);
        }
        let end = start.checked_add(buf.len()).ok_or(Error::Overflow)?.min(len);
        let count = end - start;
        buf[..count].copy_from_slice(&self.data[start..end]);
        Ok(count)
    }
}

/// A child of a directory, as yielded by [`ImageBuf::read_dir`]
#[derive(Clone, Copy, Debug)]
pub struct DirEntry<'a> {
    /// Final path component without the trailing `/`
    pub name: &'a str,
    pub entry: &'a Entry,
}

impl DirEntry<'_> {
    pub fn is_dir(&self) -> bool {
        self.entry.is_dir()
    }
}

/// Iterator over the direct children of a directory prefix. Entries whose
/// names are not valid UTF-8 are skipped.
#[derive(Clone, Debug)]
pub struct ReadDir<'a> {
    prefix: &'a str,
    entries: Iter<'a, Entry>,
}

impl<'a> Iterator for ReadDir<'a> {
    type Item = DirEntry<'a>;

    fn next(&mut self) -> Option<DirEntry<'a>> {
        for entry in self.entries.by_ref() {
            let Ok(name) = entry.name() else {
                continue;
            };
            let Some(sub) = name.strip_prefix(self.prefix) else {
                continue;
            };
            let child = sub.strip_suffix(SEPARATOR).unwrap_or(sub);
            if child.is_empty() || child.contains(SEPARATOR) {
                continue;
            }
            return Some(DirEntry { name: child, entry });
        }
        None
    }
}
