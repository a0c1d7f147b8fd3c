//! Class-path archives.
//!
//! Jars and class directories are indexed eagerly (entry names only) and
//! their bytes are served through [`ClassBytes`], so the binder performs
//! no I/O of its own. Entries later on the path never shadow earlier
//! ones, and platform ("boot") entries are searched before the regular
//! class path, matching the usual tool behavior.

use quill_model::ClassBytes;
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Where a class's bytes live.
#[derive(Clone, Debug)]
enum Location {
    /// Archive index on the path, entry name inside it.
    Jar(usize, String),
    /// A `.class` file on disk.
    File(PathBuf),
}

/// An indexed class path.
pub struct ClassPathIndex {
    jars: Vec<PathBuf>,
    locations: HashMap<String, Location>,
    packages: BTreeSet<String>,
}

impl ClassPathIndex {
    /// Indexes `platform` entries followed by `classpath` entries; the
    /// first occurrence of a binary name wins.
    pub fn open(
        platform: &[PathBuf],
        classpath: &[PathBuf],
    ) -> Result<ClassPathIndex, ClasspathError> {
        let mut index = ClassPathIndex {
            jars: Vec::new(),
            locations: HashMap::new(),
            packages: BTreeSet::new(),
        };
        for path in platform.iter().chain(classpath) {
            if path.is_dir() {
                index.add_class_dir(path)?;
            } else {
                index.add_jar(path)?;
            }
        }
        debug!(
            classes = index.locations.len(),
            packages = index.packages.len(),
            "class path indexed"
        );
        Ok(index)
    }

    fn add_jar(&mut self, path: &Path) -> Result<(), ClasspathError> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let jar_index = self.jars.len();
        self.jars.push(path.to_path_buf());
        for i in 0..archive.len() {
            let entry = archive.by_index(i)?;
            if !entry.is_file() {
                continue;
            }
            let name = entry.name().to_owned();
            let Some(binary) = name.strip_suffix(".class") else {
                continue;
            };
            if name.starts_with("META-INF/") || is_ignored_class(binary) {
                continue;
            }
            self.insert(binary.to_string(), Location::Jar(jar_index, name));
        }
        Ok(())
    }

    fn add_class_dir(&mut self, dir: &Path) -> Result<(), ClasspathError> {
        for entry in walkdir::WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension() != Some(OsStr::new("class")) {
                continue;
            }
            let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
            let binary = relative
                .with_extension("")
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            if is_ignored_class(&binary) {
                continue;
            }
            self.insert(binary, Location::File(entry.into_path()));
        }
        Ok(())
    }

    fn insert(&mut self, binary: String, location: Location) {
        if let Some((package, _)) = binary.rsplit_once('/') {
            self.packages.insert(package.to_string());
        }
        self.locations.entry(binary).or_insert(location);
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    fn read(&self, location: &Location) -> Result<Vec<u8>, ClasspathError> {
        match location {
            Location::File(path) => Ok(std::fs::read(path)?),
            Location::Jar(jar, entry_name) => {
                let file = std::fs::File::open(&self.jars[*jar])?;
                let mut archive = zip::ZipArchive::new(file)?;
                let mut entry = archive.by_name(entry_name)?;
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

fn is_ignored_class(binary: &str) -> bool {
    binary == "module-info"
        || binary == "package-info"
        || binary.ends_with("/package-info")
        || binary.ends_with("/module-info")
}

impl ClassBytes for ClassPathIndex {
    fn class_bytes(&self, binary_name: &str) -> Option<Vec<u8>> {
        let location = self.locations.get(binary_name)?;
        match self.read(location) {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                tracing::warn!(class = binary_name, %error, "failed to read class bytes");
                None
            }
        }
    }

    fn has_class(&self, binary_name: &str) -> bool {
        self.locations.contains_key(binary_name)
    }

    fn has_package(&self, package: &str) -> bool {
        self.packages.contains(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::TempDir;

    fn minimal_class(binary: &str) -> Vec<u8> {
        quill_classfile::write_class(&quill_classfile::ClassFile {
            minor_version: 0,
            major_version: 52,
            access: 0x0021,
            name: binary.to_string(),
            super_name: Some("java/lang/Object".to_string()),
            ..Default::default()
        })
    }

    fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut jar = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, bytes) in entries {
            jar.start_file(*name, options).unwrap();
            jar.write_all(bytes).unwrap();
        }
        jar.finish().unwrap();
    }

    #[test]
    fn indexes_jar_entries() {
        let tmp = TempDir::new().unwrap();
        let jar = tmp.path().join("dep.jar");
        write_jar(
            &jar,
            &[
                ("com/example/Foo.class", minimal_class("com/example/Foo")),
                ("com/example/package-info.class", minimal_class("com/example/package-info")),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec()),
            ],
        );

        let index = ClassPathIndex::open(&[], &[jar]).unwrap();
        assert!(index.has_class("com/example/Foo"));
        assert!(!index.has_class("com/example/package-info"));
        assert!(index.has_package("com/example"));
        assert!(!index.has_package("com/missing"));

        let bytes = index.class_bytes("com/example/Foo").unwrap();
        let decoded = quill_classfile::read_class(&bytes).unwrap();
        assert_eq!(decoded.name, "com/example/Foo");
    }

    #[test]
    fn indexes_class_directories() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("classes");
        std::fs::create_dir_all(dir.join("p/q")).unwrap();
        std::fs::write(dir.join("p/q/Bar.class"), minimal_class("p/q/Bar")).unwrap();

        let index = ClassPathIndex::open(&[], &[dir]).unwrap();
        assert!(index.has_class("p/q/Bar"));
        assert!(index.has_package("p/q"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn earlier_entries_shadow_later_ones() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first.jar");
        let second = tmp.path().join("second.jar");
        // Same binary name, different superclass so we can tell them apart.
        let mut early = quill_classfile::ClassFile {
            minor_version: 0,
            major_version: 52,
            access: 0x0021,
            name: "p/Dup".to_string(),
            super_name: Some("p/First".to_string()),
            ..Default::default()
        };
        write_jar(&first, &[("p/Dup.class", quill_classfile::write_class(&early))]);
        early.super_name = Some("p/Second".to_string());
        write_jar(&second, &[("p/Dup.class", quill_classfile::write_class(&early))]);

        let index = ClassPathIndex::open(&[], &[first, second]).unwrap();
        let decoded = quill_classfile::read_class(&index.class_bytes("p/Dup").unwrap()).unwrap();
        assert_eq!(decoded.super_name.as_deref(), Some("p/First"));
    }
}
