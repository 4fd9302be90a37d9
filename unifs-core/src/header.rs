//! The packed structs represent the on-disk format of a UNIFS image

use bytemuck::{Pod, PodCastError, Zeroable};

use crate::{Entry, Error, ENTRY_SIZE, HEADER_SIZE, MAGIC};

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C, packed)]
pub struct Header {
    /// Always `UNIFS v1`
    pub magic: [u8; 8],
    /// Count of Entry structs, which starts immediately after header struct
    pub count: u64,
}

impl Header {
    pub fn new(count: u64) -> Header {
        Header {
            magic: MAGIC,
            count,
        }
    }

    /// Parse header from raw image data, checking the magic
    pub fn parse(data: &[u8]) -> Result<&Header, Error> {
        let header = Header::parse_unchecked(data)?;
        if header.magic != MAGIC {
            return Err(Error::InvalidMagic(header.magic));
        }
        Ok(header)
    }

    /// Parse header from raw image data without looking at the magic
    pub fn parse_unchecked(data: &[u8]) -> Result<&Header, Error> {
        let data = data
            .get(..HEADER_SIZE)
            .ok_or(Error::Cast(PodCastError::SizeMismatch))?;
        Ok(bytemuck::try_from_bytes(data)?)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Retrieve the size of the entry table
    pub fn entries_size(&self) -> Result<u64, Error> {
        self.count
            .checked_mul(ENTRY_SIZE as u64)
            .ok_or(Error::Overflow)
    }

    /// Retrieve the size of the Header and its entries, which is also the
    /// offset of the data blob
    pub fn total_size(&self) -> Result<u64, Error> {
        self.entries_size()?
            .checked_add(HEADER_SIZE as u64)
            .ok_or(Error::Overflow)
    }

    /// Parse entries from the raw table data following the header
    pub fn entries<'a>(&self, data: &'a [u8]) -> Result<&'a [Entry], Error> {
        let entries_size = usize::try_from(self.entries_size()?)?;

        let entries_data = data
            .get(..entries_size)
            .ok_or(Error::Cast(PodCastError::SizeMismatch))?;

        Ok(bytemuck::try_cast_slice(entries_data)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
