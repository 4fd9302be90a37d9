use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use unifs_core::{EntryName, FileKind, ImageBuf, ImageSrc, Layout};

use crate::ext::EntryExt;
use crate::{wrap_io_err, Collector, Error, ImageBuilder, ImageFile, SourceKind};

/// Hidden sibling of `target` that the image is written to before it is
/// renamed into place
fn temp_path(target: &Path) -> Result<PathBuf, Error> {
    let file_name = target.file_name().ok_or_else(|| Error::InvalidName {
        name: target.display().to_string(),
        reason: "output has no file name",
    })?;
    let tmp_name = format!(".unifs.{}", Path::new(file_name).display());
    Ok(target.with_file_name(tmp_name))
}

fn write_temp(builder: ImageBuilder, tmp_path: &Path, image_path: &Path) -> Result<u64, Error> {
    let file = fs::File::create(tmp_path).map_err(wrap_io_err!(tmp_path, "Creating image"))?;
    let mut writer = BufWriter::new(file);
    let size = builder.write_to(&mut writer, image_path)?;
    let file = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .map_err(wrap_io_err!(image_path, "Flushing image"))?;
    file.sync_all()
        .map_err(wrap_io_err!(image_path, "Syncing image"))?;
    Ok(size)
}

/// Pack `source_dir` into a new image at `image_path`, replacing any file
/// already there. Returns the size of the image.
///
/// The image is assembled in a temporary file next to `image_path`, so a
/// failed build never leaves a partial image behind.
pub fn create(source_dir: impl AsRef<Path>, image_path: impl AsRef<Path>) -> Result<u64, Error> {
    let source_dir = source_dir.as_ref();
    let image_path = image_path.as_ref();

    let mut builder = ImageBuilder::new();
    builder.tree(source_dir)?;
    let count = builder.len();

    let tmp_path = temp_path(image_path)?;
    let size = match write_temp(builder, &tmp_path, image_path) {
        Ok(size) => size,
        Err(err) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
    };
    fs::rename(&tmp_path, image_path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        Error::Io {
            source,
            path: image_path.to_path_buf(),
            context: "Renaming temporary image to",
        }
    })?;

    info!("Created {} with {} entries ({} bytes)", image_path.display(), count, size);
    Ok(size)
}

/// Print one line per entry: kind, offset, size and name
pub fn list(image_path: impl AsRef<Path>) -> Result<(), Error> {
    let image_path = image_path.as_ref();
    let data = fs::read(image_path).map_err(wrap_io_err!(image_path, "Reading image"))?;
    let image = ImageBuf::new(&data)?;

    for entry in image.entries() {
        let kind = match image.file_kind(entry)? {
            FileKind::Directory => "dir",
            FileKind::Elf => "elf",
            FileKind::Text => "text",
            FileKind::Binary => "bin",
        };
        println!(
            "{:<4} {:>10} {:>10} {}",
            kind,
            entry.offset(),
            entry.size(),
            String::from_utf8_lossy(entry.name_bytes())
        );
    }

    Ok(())
}

/// Recreate the tree stored in an image below `base_dir`
pub fn extract(image_path: impl AsRef<Path>, base_dir: impl AsRef<Path>) -> Result<(), Error> {
    let base_dir = base_dir.as_ref();
    let mut image = ImageFile::new(image_path)?;

    for entry in image.read_entries()? {
        let target = base_dir.join(entry.check_path()?);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(wrap_io_err!(target, "Creating directory"))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(wrap_io_err!(parent, "Creating directory"))?;
        }
        let data = image.read_data(&entry)?;
        let mut file = fs::File::create(&target).map_err(wrap_io_err!(target, "Creating file"))?;
        file.write_all(&data)
            .map_err(wrap_io_err!(target, "Writing file"))?;
    }

    Ok(())
}

/// Check that an image holds exactly what `create` would produce from
/// `source_dir`: same entries in the same order, a contiguous layout ending
/// at the end of the image and identical file contents.
pub fn verify(image_path: impl AsRef<Path>, source_dir: impl AsRef<Path>) -> Result<(), Error> {
    let mut image = ImageFile::new(image_path)?;
    let entries = image.read_entries()?;
    let sources = Collector::new(source_dir).collect::<Result<Vec<_>, _>>()?;

    if entries.len() != sources.len() {
        return Err(Error::Mismatch(format!(
            "image has {} entries, source has {}",
            entries.len(),
            sources.len()
        )));
    }

    let mut layout = Layout::new(sources.len() as u64)?;
    for (entry, source) in entries.iter().zip(&sources) {
        let name = EntryName::new(&source.name);
        if entry.name_bytes() != name.as_bytes() {
            return Err(Error::Mismatch(format!(
                "expected entry {:?}, found {:?}",
                name.as_str(),
                String::from_utf8_lossy(entry.name_bytes())
            )));
        }

        let expected = match &source.kind {
            SourceKind::Directory => layout.place_dir(),
            SourceKind::File { size, .. } => layout.place_file(*size)?,
        };
        let actual = entry.span();
        if actual != expected {
            return Err(Error::Mismatch(format!(
                "{}: expected {} bytes at {}, found {} bytes at {}",
                name, expected.size, expected.offset, actual.size, actual.offset
            )));
        }

        if let SourceKind::File { path, .. } = &source.kind {
            let expected = fs::read(path).map_err(wrap_io_err!(path, "Reading source file"))?;
            if image.read_data(entry)? != expected {
                return Err(Error::Mismatch(format!("{}: contents differ", name)));
            }
        }
    }

    if image.len() != layout.total_size() {
        return Err(Error::Mismatch(format!(
            "image is {} bytes, expected {}",
            image.len(),
            layout.total_size()
        )));
    }

    Ok(())
}
