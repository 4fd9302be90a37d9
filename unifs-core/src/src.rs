use alloc::vec::Vec;

use crate::{Entry, Error, Header, ENTRY_SIZE, HEADER_SIZE};

const ENTRIES_PER_READ: usize = 64;

/// Positioned access to an image, wherever it is stored.
pub trait ImageSrc {
    type Err: From<Error>;

    /// Fill `buf` with image bytes starting at `offset`, returning how many
    /// bytes were read
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Err>;

    fn read_header(&mut self) -> Result<Header, Self::Err> {
        let mut header_data = [0; HEADER_SIZE];
        let count = self.read_at(0, &mut header_data)?;
        Ok(*Header::parse(&header_data[..count])?)
    }

    /// Read the entry table in chunks, so a corrupt count fails on the first
    /// short read instead of sizing one huge buffer
    fn read_entries(&mut self) -> Result<Vec<Entry>, Self::Err> {
        let header = self.read_header()?;
        let end = header.total_size()?;

        let mut entries = Vec::new();
        let mut chunk = [0; ENTRY_SIZE * ENTRIES_PER_READ];
        let mut offset = HEADER_SIZE as u64;
        while offset < end {
            let want = usize::try_from(end - offset).map_or(chunk.len(), |rem| rem.min(chunk.len()));
            let count = self.read_at(offset, &mut chunk[..want])?;
            if count < want {
                return Err(Error::OutOfBounds {
                    offset: HEADER_SIZE as u64,
                    size: header.entries_size()?,
                    len: offset + count as u64,
                }
                .into());
            }
            let chunk_entries: &[Entry] = bytemuck::try_cast_slice(&chunk[..want]).map_err(Error::from)?;
            entries.extend_from_slice(chunk_entries);
            offset += want as u64;
        }
        Ok(entries)
    }

    /// Read from this src at a given entry's data with a given offset within
    /// that entry
    fn read_entry(&mut self, entry: &Entry, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Err> {
        if offset >= entry.size() {
            return Ok(0);
        }

        let remaining = entry.size() - offset;
        let end = usize::try_from(remaining).map_or(buf.len(), |rem| rem.min(buf.len()));

        let position = entry.offset().checked_add(offset).ok_or(Error::Overflow)?;
        self.read_at(position, &mut buf[..end])
    }
}
