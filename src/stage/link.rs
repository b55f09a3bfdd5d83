//! Link stage: each selected plugin's objects plus all shared objects
//! become one versioned loadable module, `<name>.so.<version>`. Writing a
//! new version next to the old one is what lets a running host keep the old
//! module mapped while the new link is in flight, then repoint its call
//! table once the link succeeds.

use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{error, info};

use super::{ensure_dir, objects_in, remove_exact_outputs, select_plugins};
use crate::context::BuildContext;
use crate::errors::{BuildError, LinkError, ValidationError};
use crate::toolchain::Toolchain;

const DEFAULT_VERSION: u32 = 0;

#[derive(Debug)]
struct LinkJob {
    plugin: String,
    objects: Vec<PathBuf>,
    artifact: PathBuf,
}

/// Pair each requested plugin with its version. The version list, when
/// given, must be parallel to the request; omitted entirely it defaults
/// every plugin to version 0.
fn resolve_versions(
    requested: &[String],
    versions: Option<&[u32]>,
    selected: &[String],
) -> Result<Vec<u32>, ValidationError> {
    match versions {
        None => Ok(vec![DEFAULT_VERSION; selected.len()]),
        Some(versions) => {
            if versions.len() == requested.len() && requested.len() == selected.len() {
                Ok(versions.to_vec())
            } else {
                Err(ValidationError::VersionParity {
                    named: requested.len(),
                    versions: versions.len(),
                })
            }
        }
    }
}

/// Link the selected plugins (empty = all known). All validation — unknown
/// names, version parity, missing object directories — happens before any
/// linker subprocess runs. Cleanup is scoped to exactly the artifacts about
/// to be produced; other plugins' versioned artifacts are never touched.
pub fn link_plugins(
    ctx: &BuildContext,
    toolchain: &dyn Toolchain,
    known: &[String],
    requested: &[String],
    versions: Option<&[u32]>,
) -> Result<(), BuildError> {
    let selected = select_plugins(known, requested)?;
    let versions = resolve_versions(requested, versions, &selected)?;

    let shared_objects = objects_in(&ctx.shared_objects_dir())?;
    let mut jobs = Vec::with_capacity(selected.len());
    for (plugin, version) in selected.iter().zip(&versions) {
        let mut objects = objects_in(&ctx.plugin_objects_dir(plugin))?;
        objects.extend(shared_objects.iter().cloned());
        jobs.push(LinkJob {
            plugin: plugin.clone(),
            objects,
            artifact: ctx.plugin_artifact(plugin, *version),
        });
    }

    ensure_dir(&ctx.link_dir())?;
    remove_exact_outputs(jobs.iter().map(|j| j.artifact.clone()))?;

    let flags = vec!["-fPIC".to_string(), "-shared".to_string()];
    let failures: Mutex<Vec<LinkError>> = Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for job in &jobs {
            let failures = &failures;
            let flags = &flags;
            scope.spawn(move || {
                info!(
                    plugin = %job.plugin,
                    artifact = %job.artifact.display(),
                    "linking plugin"
                );
                if let Err(e) = toolchain.link_units(&job.objects, &job.artifact, flags) {
                    error!(artifact = %job.artifact.display(), error = %e, "link failed");
                    failures.lock().push(LinkError {
                        artifact: job.artifact.clone(),
                    });
                }
            });
        }
    });

    let mut failures = failures.into_inner();
    if failures.is_empty() {
        Ok(())
    } else {
        failures.sort_by(|a, b| a.artifact.cmp(&b.artifact));
        Err(BuildError::Link(failures))
    }
}
