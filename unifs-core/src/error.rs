use alloc::format;
use alloc::string::ToString;
use core::error;
use core::fmt::{Display, Formatter, Result};
use core::str::Utf8Error;

use bytemuck::PodCastError;

#[derive(Debug)]
pub enum Error {
    Cast(PodCastError),
    InvalidMagic([u8; 8]),
    InvalidName(Utf8Error),
    OutOfBounds { offset: u64, size: u64, len: u64 },
    Overflow,
    TryFromInt(core::num::TryFromIntError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result {
        use Error::*;

        let msg = match self {
            Cast(err) => format!("Cast: {:?}", err),
            InvalidMagic(magic) => format!("Invalid magic: {:02x?}", magic),
            InvalidName(err) => format!("Invalid entry name: {}", err),
            OutOfBounds { offset, size, len } => format!(
                "Entry data out of bounds: {} bytes at {} in an image of {} bytes",
                size, offset, len
            ),
            Overflow => "Overflow".to_string(),
            TryFromInt(err) => format!("TryFromInt: {}", err),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::InvalidName(e) => Some(e),
            Self::TryFromInt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PodCastError> for Error {
    fn from(err: PodCastError) -> Error {
        Error::Cast(err)
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Error {
        Error::InvalidName(err)
    }
}

impl From<core::num::TryFromIntError> for Error {
    fn from(err: core::num::TryFromIntError) -> Error {
        Error::TryFromInt(err)
    }
}
