//! Build stages. Each stage owns one output directory, computes the exact
//! set of artifacts it is about to produce, deletes only those, and runs
//! its units concurrently with a collect-then-report failure policy: every
//! broken unit is visible in one pass.

pub mod compile;
pub mod link;
pub mod mainprog;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::error;

use crate::errors::{BuildError, CompileError, ValidationError};
use crate::toolchain::Toolchain;

/// Wall-clock duration of one completed stage. Diagnostics only; never
/// consulted for scheduling.
#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: &'static str,
    pub duration: Duration,
}

/// One translation unit: compile `source` into `object` with `flags`.
#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub source: PathBuf,
    pub object: PathBuf,
    pub flags: Vec<String>,
}

/// Resolve a subset selection against the known plugin set. An empty
/// request means all known plugins. Every unresolved name is enumerated
/// before any work happens.
pub fn select_plugins(known: &[String], requested: &[String]) -> Result<Vec<String>, ValidationError> {
    if requested.is_empty() {
        return Ok(known.to_vec());
    }
    let unknown: Vec<String> = requested
        .iter()
        .filter(|name| !known.contains(name))
        .cloned()
        .collect();
    if unknown.is_empty() {
        Ok(requested.to_vec())
    } else {
        Err(ValidationError::UnknownPlugins { names: unknown })
    }
}

/// Every source must exist before a single subprocess is spawned; all
/// missing paths are reported together.
pub(crate) fn check_sources_exist(units: &[CompileUnit]) -> Result<(), BuildError> {
    let missing: Vec<PathBuf> = units
        .iter()
        .filter(|u| !u.source.is_file())
        .map(|u| u.source.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingSources { paths: missing }.into())
    }
}

/// Delete exactly the outputs about to be regenerated. Never wipes a
/// directory: sibling artifacts may belong to other plugins or still be
/// mapped by a running host.
pub(crate) fn remove_exact_outputs(paths: impl IntoIterator<Item = PathBuf>) -> Result<(), BuildError> {
    for path in paths {
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::io(path, e)),
        }
    }
    Ok(())
}

/// Compile every unit concurrently. Waits for all in-flight compiles even
/// after a failure, then reports every failed unit at once.
pub(crate) fn compile_concurrently(
    toolchain: &dyn Toolchain,
    units: &[CompileUnit],
) -> Result<(), BuildError> {
    let failures: Mutex<Vec<CompileError>> = Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for unit in units {
            let failures = &failures;
            scope.spawn(move || {
                if let Err(e) = toolchain.compile_unit(&unit.source, &unit.object, &unit.flags) {
                    error!(source = %unit.source.display(), error = %e, "compile failed");
                    failures.lock().push(CompileError {
                        source_file: unit.source.clone(),
                    });
                }
            });
        }
    });
    let mut failures = failures.into_inner();
    if failures.is_empty() {
        Ok(())
    } else {
        failures.sort_by(|a, b| a.source_file.cmp(&b.source_file));
        Err(BuildError::Compile(failures))
    }
}

pub(crate) fn ensure_dir(path: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(path).map_err(|e| BuildError::io(path, e))
}

/// All `.o` files directly inside a stage directory, sorted.
pub(crate) fn objects_in(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut objects = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| BuildError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::io(dir, e))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "o") && path.is_file() {
            objects.push(path);
        }
    }
    objects.sort();
    Ok(objects)
}
