mod bin;
mod builder;
mod collect;
pub mod ext;
mod package;

pub use bin::*;
pub use builder::ImageBuilder;
pub use collect::{Collector, SourceEntry, SourceKind};
pub use package::ImageFile;

use std::io;
use std::path::PathBuf;

const READ_WRITE_BUF_SIZE: usize = 4 * 1024 * 1024;

#[derive(thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] unifs_core::Error),

    #[error("{context} '{}'", .path.display())]
    Io {
        source: io::Error,
        path: PathBuf,
        context: &'static str,
    },

    #[error("Invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Duplicate entry name {0:?}")]
    DuplicateName(String),

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Unsupported file type at '{}'", .0.display())]
    UnsupportedFileType(PathBuf),

    #[error("Size of '{}' changed during build: expected {expected}, got {actual}", .path.display())]
    LengthMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid path component {component:?} in entry {entry:?}")]
    InvalidPathComponent { entry: String, component: String },

    #[error("Image does not match source: {0}")]
    Mismatch(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::error::Error as _;

        writeln!(f, "{self}")?;

        let mut source = self.source();
        while let Some(err) = source {
            writeln!(f, "\tCaused by: {err}")?;
            source = err.source();
        }

        Ok(())
    }
}

/// Build a closure for `map_err` that wraps an [`io::Error`] with the path
/// being worked on and a short description of the operation.
#[macro_export]
macro_rules! wrap_io_err {
    ($path:expr, $context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: ::std::path::Path::new(&$path).to_path_buf(),
            context: $context,
        }
    };
}
