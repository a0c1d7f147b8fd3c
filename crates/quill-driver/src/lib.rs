//! The compilation driver.
//!
//! `compile` runs the whole pipeline: bind the units, gate on the
//! diagnostic sink, lower to bytes. `write_jar` emits the result as a
//! reproducible archive: entries sorted by name, stored uncompressed,
//! with fixed timestamps. No partial archive is ever written on failure.

use quill_binder::{bind, BinderError, Diagnostic};
use quill_lower::lower_program;
use quill_model::tree::CompUnit;
use quill_model::ClassBytes;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Emission knobs.
#[derive(Clone, Copy, Debug)]
pub struct EmitOptions {
    /// Class-file major version; 52 (Java 8) unless overridden.
    pub major_version: u16,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            major_version: quill_classfile::DEFAULT_MAJOR_VERSION,
        }
    }
}

impl EmitOptions {
    /// Maps a platform release number (8, 11, 17, …) onto its class-file
    /// major version.
    pub fn for_release(release: u16) -> Self {
        Self {
            major_version: release + 44,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    /// Binding reported problems; nothing was emitted.
    #[error("compilation failed with {} diagnostic(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),
    #[error(transparent)]
    Binder(#[from] BinderError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Compiles `units` against `classpath` into class-file bytes, keyed by
/// binary name.
pub fn compile(
    units: &[CompUnit],
    classpath: &dyn ClassBytes,
    options: &EmitOptions,
) -> Result<BTreeMap<String, Vec<u8>>, CompileError> {
    let bound = bind(units, classpath)?;
    if !bound.diagnostics.is_empty() {
        debug!(
            diagnostics = bound.diagnostics.len(),
            "binding failed; skipping emission"
        );
        return Err(CompileError::Diagnostics(bound.diagnostics));
    }
    let classes = lower_program(&bound, options.major_version)?;
    info!(classes = classes.len(), "compiled");
    Ok(classes)
}

/// Writes a header jar: one `<binary name>.class` entry per class, in
/// lexicographic order, stored, with epoch timestamps, so identical
/// inputs produce identical archives.
pub fn write_jar(path: &Path, classes: &BTreeMap<String, Vec<u8>>) -> Result<(), CompileError> {
    let file = std::fs::File::create(path)?;
    let mut jar = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default());
    for (binary_name, bytes) in classes {
        jar.start_file(format!("{binary_name}.class"), options)?;
        jar.write_all(bytes)?;
    }
    jar.finish()?;
    debug!(entries = classes.len(), path = %path.display(), "wrote archive");
    Ok(())
}
