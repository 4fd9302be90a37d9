#![no_std]
extern crate alloc;

use core::mem;

pub use crate::entry::Entry;
pub use crate::error::Error;
pub use crate::header::Header;
pub use crate::image::{DirEntry, FileKind, ImageBuf, Node, ReadDir};
pub use crate::layout::{Layout, Span};
pub use crate::name::EntryName;
pub use crate::src::ImageSrc;

mod entry;
mod error;
mod header;
mod image;
mod layout;
mod name;
mod src;

/// Signature at the start of every image
pub const MAGIC: [u8; 8] = *b"UNIFS v1";

pub const HEADER_SIZE: usize = mem::size_of::<Header>();
pub const ENTRY_SIZE: usize = mem::size_of::<Entry>();

/// Width of the name field of an entry record
pub const NAME_SIZE: usize = 64;
/// Longest name that will be written; the last byte of the field stays free
pub const NAME_MAX: usize = NAME_SIZE - 1;

/// Separator between path components, also marks directory entries when trailing
pub const SEPARATOR: char = '/';
