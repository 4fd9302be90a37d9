//! Extension traits for base types defined in `unifs-core`.
use std::path::{Component, Path};

use unifs_core::Entry;

use crate::Error;

pub trait EntryExt {
    fn check_path(&self) -> Result<&Path, Error>;
}

impl EntryExt for Entry {
    /// Iterate the components of the name and ensure that there are no
    /// non-normal components, so the entry cannot escape the directory it is
    /// extracted into.
    fn check_path(&self) -> Result<&Path, Error> {
        let name = self.name()?;
        let path = Path::new(name);
        if name.is_empty() {
            return Err(Error::InvalidPathComponent {
                entry: String::new(),
                component: String::new(),
            });
        }
        for component in path.components() {
            match component {
                Component::Normal(_) => {}
                invalid => {
                    let bad_component: &Path = invalid.as_ref();
                    return Err(Error::InvalidPathComponent {
                        entry: name.to_string(),
                        component: bad_component.display().to_string(),
                    });
                }
            }
        }
        Ok(path)
    }
}
