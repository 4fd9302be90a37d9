use std::convert::TryInto;
use std::fs;
use std::io;
use std::sync::{Mutex, OnceLock};

use log::{Level, LevelFilter, Log, Metadata, Record};

use unifs::{Error, ImageBuilder};
use unifs_core::{ImageBuf, ENTRY_SIZE, HEADER_SIZE};

fn eprint_grp(label: &str, group: &[u8]) {
    eprintln!("{:>16}: {:02x?}", label, group);
}

fn eprint_u64(label: &str, group: &[u8]) {
    let grp_array = group.try_into()
        .expect("Wrong number of bytes to eprint_u64");
    eprintln!("{:>16}: {} ({:02x?})", label, u64::from_le_bytes(grp_array), group);
}

// Separate header and entry bytes and write the groups to stderr, which
// shows up when a test fails.
fn format_print_image(image: &[u8], entry_count: usize) {
    eprintln!("Header");
    eprint_grp("Magic", &image[..8]);
    eprint_u64("Count", &image[8..16]);

    for indx in 0..entry_count {
        let base = HEADER_SIZE + ENTRY_SIZE * indx;
        eprintln!("Entry[{}]", indx);
        eprint_grp("Name", &image[base..base + 64]);
        eprint_u64("Offset", &image[base + 64..base + 72]);
        eprint_u64("Size", &image[base + 72..base + 80]);
    }

    eprintln!("Data\n{:02x?}", &image[HEADER_SIZE + ENTRY_SIZE * entry_count..]);
}

struct CaptureLogger;

static LOGS: OnceLock<Mutex<Vec<String>>> = OnceLock::new();
static LOGGER: CaptureLogger = CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(logs) = LOGS.get() {
            let mut guard = logs.lock().expect("log lock");
            guard.push(format!("{}", record.args()));
        }
    }

    fn flush(&self) {}
}

fn init_logger() -> &'static Mutex<Vec<String>> {
    let logs = LOGS.get_or_init(|| Mutex::new(Vec::new()));
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Warn);
    logs
}

/// Warnings logged so far that mention `name`
fn warnings_for(logs: &Mutex<Vec<String>>, name: &str) -> Vec<String> {
    logs.lock()
        .expect("log lock")
        .iter()
        .filter(|line| line.contains(name))
        .cloned()
        .collect()
}

fn u64_at(image: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(image[at..at + 8].try_into().unwrap())
}

fn build(builder: ImageBuilder) -> Result<Vec<u8>, Error> {
    let mut dest = io::Cursor::new(Vec::new());
    let written = builder.write_image(&mut dest)?;
    let image = dest.into_inner();
    assert_eq!(written, image.len() as u64);
    Ok(image)
}

#[test]
fn empty_tree_is_header_only() -> Result<(), Error> {
    let tmp = tempfile::tempdir().unwrap();

    let mut builder = ImageBuilder::new();
    builder.tree(tmp.path())?;
    let image = build(builder)?;

    let mut expected = b"UNIFS v1".to_vec();
    expected.extend_from_slice(&0u64.to_le_bytes());
    assert_eq!(image, expected);
    Ok(())
}

#[test]
fn hierarchical_scenario() -> Result<(), Error> {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), b"hi").unwrap();
    fs::create_dir(tmp.path().join("sub")).unwrap();
    fs::write(tmp.path().join("sub/b.txt"), b"world").unwrap();

    let mut builder = ImageBuilder::new();
    builder.tree(tmp.path())?;
    let image = build(builder)?;
    format_print_image(&image, 3);

    let mut header = b"UNIFS v1".to_vec();
    header.extend_from_slice(&3u64.to_le_bytes());
    assert_eq!(&image[..HEADER_SIZE], &header[..]);

    let data_offset = (HEADER_SIZE + 3 * ENTRY_SIZE) as u64;
    assert_eq!(&image[data_offset as usize..], b"hiworld");

    let parsed = ImageBuf::new(&image)?;
    let rows: Vec<_> = parsed
        .entries()
        .map(|entry| (entry.name().unwrap().to_string(), entry.offset(), entry.size()))
        .collect();
    assert_eq!(
        rows,
        [
            ("a.txt".to_string(), data_offset, 2),
            ("sub/".to_string(), 0, 0),
            ("sub/b.txt".to_string(), data_offset + 2, 5),
        ]
    );
    Ok(())
}

#[test]
fn offsets_are_contiguous() -> Result<(), Error> {
    let tmp = tempfile::tempdir().unwrap();
    for (indx, dir) in ["x", "x/y", "z"].iter().enumerate() {
        fs::create_dir_all(tmp.path().join(dir)).unwrap();
        fs::write(tmp.path().join(dir).join("file"), vec![indx as u8; indx * 7 + 1]).unwrap();
    }
    fs::write(tmp.path().join("empty"), b"").unwrap();

    let mut builder = ImageBuilder::new();
    builder.tree(tmp.path())?;
    let count = builder.len();
    let image = build(builder)?;

    assert_eq!(u64_at(&image, 8), count as u64);

    let parsed = ImageBuf::new(&image)?;
    assert_eq!(parsed.len(), count);

    let mut cursor = (HEADER_SIZE + count * ENTRY_SIZE) as u64;
    for entry in parsed.entries().filter(|entry| !entry.is_dir()) {
        assert_eq!(entry.offset(), cursor, "gap before {}", entry);
        cursor += entry.size();
    }
    assert_eq!(cursor, image.len() as u64);
    Ok(())
}

#[test]
fn long_names_are_truncated() -> Result<(), Error> {
    let logs = init_logger();
    let long = "L".repeat(70);
    let mut builder = ImageBuilder::new();
    builder.bytes(&b"payload"[..], long.clone())?;
    let image = build(builder)?;
    format_print_image(&image, 1);

    let name_field = &image[HEADER_SIZE..HEADER_SIZE + 64];
    assert_eq!(&name_field[..63], &long.as_bytes()[..63]);
    assert_eq!(name_field[63], 0);

    let parsed = ImageBuf::new(&image)?;
    assert_eq!(parsed.read(&long[..63])?, Some(&b"payload"[..]));

    let warnings = warnings_for(logs, &long);
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(!warnings[0].contains("reads back"), "{}", warnings[0]);
    Ok(())
}

#[test]
fn truncation_that_changes_kind_is_reported() -> Result<(), Error> {
    let logs = init_logger();
    let long_dir = format!("{}/", "D".repeat(63));
    let long_file = format!("{}/tail", "F".repeat(62));

    let mut builder = ImageBuilder::new();
    builder
        .dir(long_dir.as_str())?
        .bytes(&b"data"[..], long_file.as_str())?;
    let image = build(builder)?;
    let parsed = ImageBuf::new(&image)?;

    let dir = parsed.find(&long_dir[..63]).expect("directory record");
    assert!(!dir.is_dir());
    assert_eq!(dir.size(), 0);
    let file = parsed.find(&long_file[..63]).expect("file record");
    assert!(file.is_dir());
    assert_eq!(file.size(), 4);

    let warnings = warnings_for(logs, &long_dir);
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].ends_with("reads back as a file"), "{}", warnings[0]);

    let warnings = warnings_for(logs, &long_file);
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].ends_with("reads back as a directory"), "{}", warnings[0]);
    Ok(())
}

#[test]
fn round_trip_from_files() -> Result<(), Error> {
    let tmp = tempfile::tempdir().unwrap();
    let contents: [(&str, &[u8]); 3] = [
        ("init", b"\x7fELF\x02\x01\x01"),
        ("etc/motd", b"welcome to uniOS\n"),
        ("etc/rc/boot.sh", b"#!/bin/sh\necho boot\n"),
    ];
    for (name, data) in contents.iter() {
        let path = tmp.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    let mut builder = ImageBuilder::new();
    builder.tree(tmp.path())?;
    let image = build(builder)?;
    let parsed = ImageBuf::new(&image)?;

    for (name, data) in contents.iter() {
        let entry = parsed.find(name).expect("entry missing");
        assert_eq!(entry.size(), data.len() as u64);
        assert_eq!(parsed.data(entry)?, *data);
    }
    assert!(parsed.find("etc/").unwrap().is_dir());
    assert!(parsed.find("etc/rc/").unwrap().is_dir());
    Ok(())
}
