//! The two compile pools: shared sources (compiled once, linked into every
//! plugin) and per-plugin sources. The pools are independent of each other;
//! within a pool every unit compiles concurrently.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{
    check_sources_exist, compile_concurrently, ensure_dir, remove_exact_outputs, select_plugins,
    CompileUnit,
};
use crate::context::{object_filename, BuildContext};
use crate::descriptor::PluginDescriptor;
use crate::errors::BuildError;
use crate::toolchain::Toolchain;

/// Include flags for one shared source. Sources living under `libs/` get
/// their own directory on the include path; project sources see `libs/` as
/// system headers so library warnings stay quiet under `-Werror`.
fn shared_include_flags(ctx: &BuildContext, relative: &str) -> Vec<String> {
    let libs_dir = ctx.project_root.join("libs");
    if let Some(rest) = relative.strip_prefix("libs/") {
        let subdir = Path::new(rest)
            .parent()
            .map(|p| libs_dir.join(p))
            .unwrap_or_else(|| libs_dir.clone());
        vec!["-I".to_string(), subdir.display().to_string()]
    } else {
        vec!["-isystem".to_string(), libs_dir.display().to_string()]
    }
}

/// Units for the shared pool: the union of every descriptor's
/// `other_source_files`, deduplicated so a source referenced by several
/// plugins is compiled exactly once.
pub fn shared_units(ctx: &BuildContext, descriptors: &[PluginDescriptor]) -> Vec<CompileUnit> {
    let out_dir = ctx.shared_objects_dir();
    let mut seen = HashSet::new();
    let mut units = Vec::new();
    for descriptor in descriptors {
        for relative in &descriptor.other_source_files {
            if !seen.insert(relative.clone()) {
                continue;
            }
            let source = ctx.project_root.join(relative);
            let mut flags = vec!["-fPIC".to_string()];
            flags.extend(ctx.config.optimization_flags());
            flags.extend(shared_include_flags(ctx, relative));
            units.push(CompileUnit {
                object: out_dir.join(object_filename(Path::new(relative))),
                source,
                flags,
            });
        }
    }
    units
}

/// Units for one plugin's sources. Warning flags apply here, minus
/// `-Wmissing-declarations`: plugin entry points are declared only by the
/// generated header, which the plugin itself does not include.
fn plugin_units(ctx: &BuildContext, descriptor: &PluginDescriptor) -> Vec<CompileUnit> {
    let out_dir = ctx.plugin_objects_dir(&descriptor.name);
    let mut base_flags = vec!["-fPIC".to_string()];
    base_flags.extend(ctx.config.optimization_flags());
    base_flags.extend(
        ctx.config
            .warning_flags()
            .into_iter()
            .filter(|f| f != "-Wmissing-declarations"),
    );
    base_flags.push("-isystem".to_string());
    base_flags.push(ctx.project_root.join("libs").display().to_string());

    descriptor
        .plugin_source_files
        .iter()
        .map(|relative| CompileUnit {
            source: ctx.plugin_src_dir(&descriptor.name).join(relative),
            object: out_dir.join(object_filename(Path::new(relative))),
            flags: base_flags.clone(),
        })
        .collect()
}

fn run_pool(
    toolchain: &dyn Toolchain,
    units: &[CompileUnit],
    dirs: &[PathBuf],
) -> Result<(), BuildError> {
    check_sources_exist(units)?;
    for dir in dirs {
        ensure_dir(dir)?;
    }
    remove_exact_outputs(units.iter().map(|u| u.object.clone()))?;
    compile_concurrently(toolchain, units)
}

/// Compile the shared pool.
pub fn compile_shared(
    ctx: &BuildContext,
    toolchain: &dyn Toolchain,
    descriptors: &[PluginDescriptor],
) -> Result<(), BuildError> {
    let units = shared_units(ctx, descriptors);
    info!(units = units.len(), "compiling shared sources");
    run_pool(toolchain, &units, &[ctx.shared_objects_dir()])
}

/// Compile per-plugin sources for the selected subset (empty = all).
/// Unknown names fail before any compilation work starts.
pub fn compile_plugins(
    ctx: &BuildContext,
    toolchain: &dyn Toolchain,
    descriptors: &[PluginDescriptor],
    selection: &[String],
) -> Result<(), BuildError> {
    let known: Vec<String> = descriptors.iter().map(|d| d.name.clone()).collect();
    let selected = select_plugins(&known, selection)?;

    let mut units = Vec::new();
    let mut dirs = Vec::new();
    for descriptor in descriptors.iter().filter(|d| selected.contains(&d.name)) {
        dirs.push(ctx.plugin_objects_dir(&descriptor.name));
        units.extend(plugin_units(ctx, descriptor));
    }
    info!(
        plugins = selected.len(),
        units = units.len(),
        "compiling plugin sources"
    );
    run_pool(toolchain, &units, &dirs)
}
