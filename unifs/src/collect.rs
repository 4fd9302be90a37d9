//! Enumerate a source directory into image entries.
use std::io;
use std::path::{Path, PathBuf};

use unifs_core::SEPARATOR;
use walkdir::WalkDir;

use crate::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SourceKind {
    Directory,
    /// Regular file and the size it had when it was collected
    File { path: PathBuf, size: u64 },
}

/// One entry of the source tree, named relative to the root with `/`
/// separators. Directory names carry a trailing `/`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceEntry {
    pub name: String,
    pub kind: SourceKind,
}

impl SourceEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == SourceKind::Directory
    }
}

/// Lazy depth-first walk of a source tree.
///
/// Every directory is yielded before its contents and siblings are visited in
/// file name order, so the same tree always produces the same sequence.
/// Symbolic links are followed. The first error ends the walk as far as the
/// image builder is concerned: it never skips unreadable entries.
pub struct Collector {
    root: PathBuf,
    walk: walkdir::IntoIter,
}

impl Collector {
    pub fn new(root: impl AsRef<Path>) -> Collector {
        let root = root.as_ref().to_path_buf();
        let walk = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        Collector { root, walk }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_name(&self, path: &Path) -> Result<String, Error> {
        let relative = path.strip_prefix(&self.root).map_err(|_| Error::InvalidName {
            name: path.display().to_string(),
            reason: "outside of the source root",
        })?;

        let mut name = String::new();
        for component in relative.components() {
            let component = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| Error::NonUtf8Path(path.to_path_buf()))?;
            if !name.is_empty() {
                name.push(SEPARATOR);
            }
            name.push_str(component);
        }
        Ok(name)
    }

    fn source_entry(&self, entry: walkdir::DirEntry) -> Result<SourceEntry, Error> {
        let path = entry.path();
        let mut name = self.relative_name(path)?;
        let file_type = entry.file_type();

        let kind = if file_type.is_dir() {
            name.push(SEPARATOR);
            SourceKind::Directory
        } else if file_type.is_file() {
            let metadata = entry
                .metadata()
                .map_err(|err| Error::Io {
                    path: path.to_path_buf(),
                    source: io::Error::from(err),
                    context: "Reading metadata of",
                })?;
            SourceKind::File {
                path: path.to_path_buf(),
                size: metadata.len(),
            }
        } else {
            return Err(Error::UnsupportedFileType(path.to_path_buf()));
        };

        Ok(SourceEntry { name, kind })
    }
}

impl Iterator for Collector {
    type Item = Result<SourceEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.walk.next()?;
        Some(match next {
            Ok(entry) => self.source_entry(entry),
            Err(err) => {
                let path = err.path().unwrap_or(&self.root).to_path_buf();
                Err(Error::Io {
                    path,
                    source: io::Error::from(err),
                    context: "Walking source tree at",
                })
            }
        })
    }
}
