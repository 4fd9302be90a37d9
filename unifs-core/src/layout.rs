use crate::{Error, ENTRY_SIZE, HEADER_SIZE};

/// Region of the image owned by one entry
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Span {
    pub offset: u64,
    pub size: u64,
}

impl Span {
    /// Directories own nothing
    pub const EMPTY: Span = Span { offset: 0, size: 0 };

    pub fn end(&self) -> Result<u64, Error> {
        self.offset.checked_add(self.size).ok_or(Error::Overflow)
    }
}

/// Assigns data offsets to entries in emission order.
///
/// The cursor starts right after the entry table and every file advances it
/// by its size, so file data is contiguous with no gaps or overlaps and the
/// final cursor is the size of the whole image.
#[derive(Clone, Debug)]
pub struct Layout {
    count: u64,
    cursor: u64,
}

impl Layout {
    /// Start a layout for an image holding `count` entries
    pub fn new(count: u64) -> Result<Layout, Error> {
        let cursor = count
            .checked_mul(ENTRY_SIZE as u64)
            .and_then(|table| table.checked_add(HEADER_SIZE as u64))
            .ok_or(Error::Overflow)?;
        Ok(Layout { count, cursor })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Offset of the data blob
    pub fn data_offset(&self) -> u64 {
        HEADER_SIZE as u64 + self.count * ENTRY_SIZE as u64
    }

    /// Claim the next `size` bytes of the data blob
    pub fn place_file(&mut self, size: u64) -> Result<Span, Error> {
        let span = Span {
            offset: self.cursor,
            size,
        };
        self.cursor = span.end()?;
        Ok(span)
    }

    pub fn place_dir(&self) -> Span {
        Span::EMPTY
    }

    /// Size of the image once every placed entry is written
    pub fn total_size(&self) -> u64 {
        self.cursor
    }
}
