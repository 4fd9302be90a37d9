use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use unifs_core::{Entry, EntryName, Header, Layout, SEPARATOR};

use crate::{wrap_io_err, Collector, Error, SourceKind, READ_WRITE_BUF_SIZE};

#[derive(Debug)]
struct BuilderEntry {
    /// Name stored in the image, `/` terminated for directories
    name: String,
    kind: BuilderEntryKind,
}

impl BuilderEntry {
    fn size(&self) -> u64 {
        match &self.kind {
            BuilderEntryKind::Directory => 0,
            BuilderEntryKind::File { size, .. } => *size,
            BuilderEntryKind::Buffer(data) => data.len() as u64,
        }
    }
}

enum BuilderEntryKind {
    Directory,

    /// Regular file on the build system; `size` is what the layout reserves
    File { path: PathBuf, size: u64 },

    /// File contents held in memory
    Buffer(Vec<u8>),
}

impl fmt::Debug for BuilderEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use BuilderEntryKind::*;
        write!(f, "BuilderEntryKind::{}", match self {
            Directory => String::from("Directory"),
            File { path, size } => format!("File({:?}, {})", path, size),
            Buffer(data) => format!("Buffer({} bytes)", data.len()),
        })
    }
}

/// Check that `name` is a plain relative path made of normal components.
/// A single trailing separator is allowed and marks a directory.
fn check_name(name: &str) -> Result<(), Error> {
    let invalid = |reason| Error::InvalidName {
        name: name.to_string(),
        reason,
    };

    let trimmed = name.strip_suffix(SEPARATOR).unwrap_or(name);
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    if trimmed.contains('\0') {
        return Err(invalid("contains a NUL byte"));
    }
    for component in trimmed.split(SEPARATOR) {
        match component {
            "" => return Err(invalid("empty path component")),
            "." | ".." => return Err(invalid("relative path component")),
            _ => {}
        }
    }
    Ok(())
}

/// Builder pattern for constructing UNIFS images. Holds an ordered list of
/// entries and consumes itself to write an image.
///
/// Entries are written in the order they were added. Every name must be
/// unique; [`ImageBuilder::dir`] appends the trailing `/` when it is missing.
///
/// # Example
/// ```
/// use std::io::Cursor;
///
/// use unifs::ImageBuilder;
/// use unifs_core::ImageBuf;
///
/// let mut builder = ImageBuilder::new();
/// builder
///     .dir("etc").unwrap()
///     .bytes(b"uniOS\n".to_vec(), "etc/hostname").unwrap();
///
/// let mut image = Cursor::new(Vec::new());
/// builder.write_image(&mut image).unwrap();
///
/// let image = image.into_inner();
/// let image = ImageBuf::new(&image).unwrap();
/// assert_eq!(image.read("etc/hostname").unwrap(), Some(&b"uniOS\n"[..]));
/// ```
#[derive(Debug, Default)]
pub struct ImageBuilder {
    entries: Vec<BuilderEntry>,
    names: HashSet<String>,
}

impl ImageBuilder {
    pub fn new() -> ImageBuilder {
        ImageBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: String, kind: BuilderEntryKind) -> Result<&mut ImageBuilder, Error> {
        check_name(&name)?;
        if !self.names.insert(name.clone()) {
            return Err(Error::DuplicateName(name));
        }
        self.entries.push(BuilderEntry { name, kind });
        Ok(self)
    }

    /// Add an empty directory entry
    pub fn dir(&mut self, name: impl Into<String>) -> Result<&mut ImageBuilder, Error> {
        let mut name = name.into();
        if !name.ends_with(SEPARATOR) {
            name.push(SEPARATOR);
        }
        self.push(name, BuilderEntryKind::Directory)
    }

    /// Add a regular file to this builder. `source` is the position of the
    /// file on the build system; its size is taken now and must not change
    /// before the image is written.
    pub fn file(
        &mut self,
        source: impl AsRef<Path>,
        name: impl Into<String>,
    ) -> Result<&mut ImageBuilder, Error> {
        let path = source.as_ref().to_path_buf();
        let metadata = path
            .metadata()
            .map_err(wrap_io_err!(path, "Reading metadata of"))?;
        if !metadata.is_file() {
            return Err(Error::UnsupportedFileType(path));
        }
        let size = metadata.len();
        self.push(name.into(), BuilderEntryKind::File { path, size })
    }

    /// Add a file whose contents are already in memory
    pub fn bytes(
        &mut self,
        data: impl Into<Vec<u8>>,
        name: impl Into<String>,
    ) -> Result<&mut ImageBuilder, Error> {
        self.push(name.into(), BuilderEntryKind::Buffer(data.into()))
    }

    /// Walk a directory and replicate its relative structure in this builder,
    /// directories included.
    pub fn tree(&mut self, root: impl AsRef<Path>) -> Result<&mut ImageBuilder, Error> {
        for source_entry in Collector::new(root) {
            let source_entry = source_entry?;
            let kind = match source_entry.kind {
                SourceKind::Directory => BuilderEntryKind::Directory,
                SourceKind::File { path, size } => BuilderEntryKind::File { path, size },
            };
            self.push(source_entry.name, kind)?;
        }
        Ok(self)
    }

    /// Lay out the entry table: one record per entry, in insertion order,
    /// with file data packed right after the table.
    pub fn entries(&self) -> Result<Vec<Entry>, Error> {
        let mut layout = Layout::new(self.entries.len() as u64)?;
        let mut entries = Vec::with_capacity(self.entries.len());

        for builder_entry in &self.entries {
            let name = EntryName::new(&builder_entry.name);
            if name.is_truncated() {
                let is_dir = matches!(builder_entry.kind, BuilderEntryKind::Directory);
                if name.is_dir() == is_dir {
                    warn!("Name {} truncated to {}", builder_entry.name, name);
                } else {
                    warn!(
                        "Name {} truncated to {}, which reads back as a {}",
                        builder_entry.name,
                        name,
                        if name.is_dir() { "directory" } else { "file" }
                    );
                }
            }

            let entry = match builder_entry.kind {
                BuilderEntryKind::Directory => Entry::directory(&name),
                _ => Entry::file(&name, layout.place_file(builder_entry.size())?),
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Consume this `ImageBuilder`, writing the header, the entry table and
    /// all file data to `writer` in a single pass. Returns the number of
    /// bytes written.
    pub fn write_image<W: Write>(self, writer: &mut W) -> Result<u64, Error> {
        self.write_to(writer, Path::new("<image>"))
    }

    /// [`ImageBuilder::write_image`], naming `target` in output errors
    pub(crate) fn write_to<W: Write>(self, writer: &mut W, target: &Path) -> Result<u64, Error> {
        let entries = self.entries()?;
        let header = Header::new(entries.len() as u64);

        writer
            .write_all(header.as_bytes())
            .map_err(wrap_io_err!(target, "Writing header to"))?;
        for entry in &entries {
            writer
                .write_all(entry.as_bytes())
                .map_err(wrap_io_err!(target, "Writing entry table to"))?;
        }
        let mut written = header.total_size()?;

        let mut buf = vec![0; READ_WRITE_BUF_SIZE];
        for (builder_entry, entry) in self.entries.iter().zip(&entries) {
            let copied = match &builder_entry.kind {
                BuilderEntryKind::Directory => continue,
                BuilderEntryKind::File { path, .. } => {
                    let source = File::open(path)
                        .map_err(wrap_io_err!(path, "Opening source file"))?;
                    // Never copy more than was laid out, even if the file grew
                    let limit = entry.size().saturating_add(1);
                    copy(source.take(limit), writer, &mut buf).map_err(|err| match err {
                        CopyError::Read(source) => Error::Io {
                            source,
                            path: path.clone(),
                            context: "Reading source file",
                        },
                        CopyError::Write(source) => Error::Io {
                            source,
                            path: target.to_path_buf(),
                            context: "Writing file data to",
                        },
                    })?
                }
                BuilderEntryKind::Buffer(data) => {
                    writer
                        .write_all(data)
                        .map_err(wrap_io_err!(target, "Writing file data to"))?;
                    data.len() as u64
                }
            };

            if copied != entry.size() {
                let path = match &builder_entry.kind {
                    BuilderEntryKind::File { path, .. } => path.clone(),
                    _ => PathBuf::from(&builder_entry.name),
                };
                return Err(Error::LengthMismatch {
                    path,
                    expected: entry.size(),
                    actual: copied,
                });
            }
            debug!("{} ({} bytes at {})", builder_entry.name, copied, entry.offset());
            written += copied;
        }
        Ok(written)
    }
}

enum CopyError {
    Read(io::Error),
    Write(io::Error),
}

fn copy<R: Read, W: Write>(mut read: R, write: &mut W, buf: &mut [u8]) -> Result<u64, CopyError> {
    let mut total = 0;
    loop {
        let count = match read.read(buf) {
            Ok(0) => break,
            Ok(count) => count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(CopyError::Read(err)),
        };
        write.write_all(&buf[..count]).map_err(CopyError::Write)?;
        total += count as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use unifs_core::{ImageBuf, ENTRY_SIZE, HEADER_SIZE};

    use super::{check_name, ImageBuilder};
    use crate::Error;

    #[test]
    fn names_must_be_plain_relative_paths() {
        assert!(check_name("a.txt").is_ok());
        assert!(check_name("sub/").is_ok());
        assert!(check_name("sub/b.txt").is_ok());
        for bad in ["", "/", "/etc", "a//b", "../x", "a/./b", "sub//", "nul\0"] {
            assert!(check_name(bad).is_err(), "{:?} accepted", bad);
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut builder = ImageBuilder::new();
        builder.bytes(b"one".to_vec(), "x").unwrap();
        assert!(matches!(builder.bytes(b"two".to_vec(), "x"), Err(Error::DuplicateName(_))));
        builder.dir("d").unwrap();
        assert!(matches!(builder.dir("d/"), Err(Error::DuplicateName(_))));
    }

    #[test]
    fn buffers_round_trip_in_order() {
        let mut builder = ImageBuilder::new();
        builder
            .bytes(b"first".to_vec(), "b")
            .unwrap()
            .dir("d")
            .unwrap()
            .bytes(Vec::new(), "d/empty")
            .unwrap()
            .bytes(b"second".to_vec(), "a")
            .unwrap();

        let mut out = Cursor::new(Vec::new());
        let written = builder.write_image(&mut out).unwrap();
        let data = out.into_inner();
        assert_eq!(written, data.len() as u64);
        assert_eq!(data.len(), HEADER_SIZE + 4 * ENTRY_SIZE + 11);

        let image = ImageBuf::new(&data).unwrap();
        let names: Vec<_> = image.entries().map(|e| e.name().unwrap()).collect();
        assert_eq!(names, ["b", "d/", "d/empty", "a"]);
        assert_eq!(image.read("b").unwrap(), Some(&b"first"[..]));
        assert_eq!(image.read("d/empty").unwrap(), Some(&b""[..]));
        assert_eq!(image.read("a").unwrap(), Some(&b"second"[..]));
        assert_eq!(&data[HEADER_SIZE + 4 * ENTRY_SIZE..], b"firstsecond");
    }

    #[test]
    fn long_name_is_truncated_not_fatal() {
        let long = "n".repeat(70);
        let mut builder = ImageBuilder::new();
        builder.bytes(b"x".to_vec(), long.as_str()).unwrap();

        let entries = builder.entries().unwrap();
        let record = entries[0].as_bytes();
        assert_eq!(&record[..63], &long.as_bytes()[..63]);
        assert_eq!(record[63], 0);
    }

    #[test]
    fn missing_file_fails_when_added() {
        let tmp = tempfile::tempdir().unwrap();
        let mut builder = ImageBuilder::new();
        match builder.file(tmp.path().join("nope"), "nope") {
            Err(Error::Io { path, .. }) => assert_eq!(path, tmp.path().join("nope")),
            other => panic!("expected io error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn file_changed_during_build() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("grows");
        std::fs::write(&path, b"abc").unwrap();

        let mut builder = ImageBuilder::new();
        builder.file(&path, "grows").unwrap();
        std::fs::write(&path, b"abcdef").unwrap();

        let mut out = Vec::new();
        match builder.write_image(&mut out) {
            Err(Error::LengthMismatch { expected, actual, .. }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 4);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }
}
