use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use unifs_core::{Entry, Header, ImageSrc, Span, HEADER_SIZE};

use crate::{wrap_io_err, Error};

/// An image file on disk, read through positioned reads
#[derive(Debug)]
pub struct ImageFile {
    path: PathBuf,
    src: BufReader<File>,
    len: u64,
    header: Header,
}

impl ImageFile {
    pub fn new(path: impl AsRef<Path>) -> Result<ImageFile, Error> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(wrap_io_err!(path, "Opening image"))?;
        let len = file
            .metadata()
            .map_err(wrap_io_err!(path, "Reading metadata of"))?
            .len();

        let mut new = ImageFile {
            path,
            src: BufReader::new(file),
            len,
            header: Header::new(0),
        };

        new.header = new.read_header()?;
        new.check_span(Span {
            offset: HEADER_SIZE as u64,
            size: new.header.entries_size()?,
        })?;
        Ok(new)
    }

    /// Fail unless `span` lies inside the file, so sizes taken from the
    /// image are never trusted for allocations
    fn check_span(&self, span: Span) -> Result<(), Error> {
        if span.end()? > self.len {
            return Err(Error::Core(unifs_core::Error::OutOfBounds {
                offset: span.offset,
                size: span.size,
                len: self.len,
            }));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> Header {
        self.header
    }

    /// Size of the image file when it was opened
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Read the whole contents of a file entry
    pub fn read_data(&mut self, entry: &Entry) -> Result<Vec<u8>, Error> {
        self.check_span(entry.span())?;
        let size = usize::try_from(entry.size()).map_err(unifs_core::Error::from)?;
        let mut data = vec![0; size];
        let count = self.read_entry(entry, 0, &mut data)?;
        if count != size {
            return Err(Error::Core(unifs_core::Error::OutOfBounds {
                offset: entry.offset(),
                size: entry.size(),
                len: entry.offset() + count as u64,
            }));
        }
        Ok(data)
    }
}

impl ImageSrc for ImageFile {
    type Err = Error;

    /// Short reads only happen at the end of the file
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Err> {
        self.src
            .seek(SeekFrom::Start(offset))
            .map_err(wrap_io_err!(self.path, "Seeking in image"))?;

        let mut total = 0;
        while total < buf.len() {
            let count = self
                .src
                .read(&mut buf[total..])
                .map_err(wrap_io_err!(self.path, "Reading image"))?;
            if count == 0 {
                break;
            }
            total += count;
        }
        Ok(total)
    }
}
