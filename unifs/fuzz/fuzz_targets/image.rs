#![no_main]
#[macro_use] extern crate libfuzzer_sys;

use unifs_core::{ImageBuf, ImageSrc};

fuzz_target!(|data: &[u8]| {
    let mut image = match ImageBuf::new(data) {
        Ok(image) => image,
        Err(_) => return,
    };

    for entry in image.entries() {
        let _ = image.data(entry);
        let _ = image.file_kind(entry);

        let name = match entry.name() {
            Ok(name) => name,
            Err(_) => continue,
        };
        assert!(image.find(name).is_some());
        for child in image.read_dir(name) {
            let _ = image.lookup(name, child.name);
        }
    }

    let mut buf = [0; 64];
    if let Some(entry) = image.entries().next() {
        let _ = image.read_entry(entry, 0, &mut buf);
    }
});
