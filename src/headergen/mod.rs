//! Header generation. Consumes every plugin descriptor and rewrites the
//! generated-output directory from scratch: one ABI header per plugin, the
//! whole-program id enum and registry, and the id ledger.
//!
//! The registry never contains precomputed offsets. It emits `offsetof`,
//! `alignof` and `sizeof` expressions over the very struct declared in the
//! same generation pass, so the metadata the host reads and the layout the
//! toolchain compiles are derived from one source and cannot drift.

mod calltable;
mod ids;
mod registry;

pub use calltable::{pascal_case, procs_struct_name};
pub use ids::{load_ledger, verify_ledger, IdLedger};

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::info;
use walkdir::WalkDir;

use crate::context::BuildContext;
use crate::descriptor::PluginDescriptor;
use crate::errors::{BuildError, ValidationError};

/// Everything the registry records about one plugin. Ordinals follow
/// sorted-name order; `procedures` preserves descriptor declaration order.
#[derive(Debug, Clone)]
pub struct PluginRegistryEntry {
    pub name: String,
    pub ordinal: usize,
    pub procs_struct_name: String,
    pub procedures: Vec<String>,
    pub artifact_template: String,
    pub watch_files: Vec<PathBuf>,
    pub header_path: PathBuf,
}

/// Output of one generation run.
#[derive(Debug)]
pub struct GeneratedOutput {
    pub entries: Vec<PluginRegistryEntry>,
}

fn validate_descriptors(descriptors: &[PluginDescriptor]) -> Result<(), ValidationError> {
    for descriptor in descriptors {
        let mut seen = HashSet::new();
        for proc in &descriptor.procedures {
            if !seen.insert(proc.name.as_str()) {
                // Accepting this would alias two pointer fields.
                return Err(ValidationError::DuplicateProcedure {
                    plugin: descriptor.name.clone(),
                    procedure: proc.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Recursive file list of the plugin's source directory, relative to the
/// project root and sorted, so generated artifacts are identical across
/// checkouts.
fn watch_files(ctx: &BuildContext, plugin: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(ctx.plugin_src_dir(plugin))
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(&ctx.project_root)
                .unwrap_or(e.path())
                .to_path_buf()
        })
        .collect();
    files.sort();
    files
}

/// Generate all headers and the registry. Ordinal ids follow sorted-name
/// order regardless of the order descriptors are passed in. The whole
/// batch fails before anything is written if any descriptor is invalid; on
/// success the output directory is wiped and fully rewritten.
pub fn generate(
    ctx: &BuildContext,
    descriptors: &[PluginDescriptor],
) -> Result<GeneratedOutput, BuildError> {
    validate_descriptors(descriptors)?;
    let mut descriptors: Vec<&PluginDescriptor> = descriptors.iter().collect();
    descriptors.sort_by(|a, b| a.name.cmp(&b.name));

    let out_dir = ctx.generated_dir();
    if out_dir.exists() {
        fs::remove_dir_all(&out_dir).map_err(|e| BuildError::io(&out_dir, e))?;
    }
    fs::create_dir_all(&out_dir).map_err(|e| BuildError::io(&out_dir, e))?;

    let mut entries = Vec::with_capacity(descriptors.len());
    for (ordinal, descriptor) in descriptors.iter().enumerate() {
        let plugin_dir = out_dir.join(&descriptor.name);
        fs::create_dir_all(&plugin_dir).map_err(|e| BuildError::io(&plugin_dir, e))?;
        let header_path = plugin_dir.join(format!("plugin_{}.hpp", descriptor.name));
        let header = calltable::render_header(descriptor);
        fs::write(&header_path, header).map_err(|e| BuildError::io(&header_path, e))?;

        entries.push(PluginRegistryEntry {
            name: descriptor.name.clone(),
            ordinal,
            procs_struct_name: procs_struct_name(&descriptor.name),
            procedures: descriptor.procedures.iter().map(|p| p.name.clone()).collect(),
            artifact_template: ctx.plugin_artifact_template(&descriptor.name),
            watch_files: watch_files(ctx, &descriptor.name),
            header_path,
        });
    }

    let ids_path = out_dir.join("plugin_ids.hpp");
    fs::write(&ids_path, ids::render_ids(&entries)).map_err(|e| BuildError::io(&ids_path, e))?;

    let infos_path = out_dir.join("plugin_infos.hpp");
    fs::write(&infos_path, registry::render_registry(&entries))
        .map_err(|e| BuildError::io(&infos_path, e))?;

    ids::write_ledger(ctx, &entries)?;

    info!(
        plugins = entries.len(),
        dir = %out_dir.display(),
        "generated plugin headers"
    );
    Ok(GeneratedOutput { entries })
}
