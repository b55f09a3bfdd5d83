//! Host program build. Depends only on the generated headers, never on the
//! plugin compile/link chain, so the orchestrator schedules it concurrently
//! with that chain. The host's rendering and game logic are opaque here: we
//! just compile every translation unit under its source dir and link the
//! executable.

use std::path::PathBuf;

use tracing::info;
use walkdir::WalkDir;

use super::{check_sources_exist, compile_concurrently, ensure_dir, remove_exact_outputs, CompileUnit};
use crate::context::{object_filename, BuildContext};
use crate::errors::{BuildError, LinkError};
use crate::toolchain::Toolchain;

fn host_sources(ctx: &BuildContext) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = WalkDir::new(&ctx.main_src_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| p.extension().is_some_and(|ext| ext == "cpp"))
        .collect();
    sources.sort();
    sources
}

fn host_units(ctx: &BuildContext) -> Vec<CompileUnit> {
    let objects_dir = ctx.main_program_dir().join("intermediate_objects");
    let mut flags = ctx.config.optimization_flags();
    flags.extend(ctx.config.warning_flags());
    flags.push("-isystem".to_string());
    flags.push(ctx.project_root.join("libs").display().to_string());
    flags.push("-I".to_string());
    flags.push(ctx.generated_dir().display().to_string());

    host_sources(ctx)
        .into_iter()
        .map(|source| {
            let relative = source.strip_prefix(&ctx.project_root).unwrap_or(&source);
            CompileUnit {
                object: objects_dir.join(object_filename(relative)),
                source,
                flags: flags.clone(),
            }
        })
        .collect()
}

/// Executable path produced by this stage.
pub fn executable_path(ctx: &BuildContext) -> PathBuf {
    ctx.main_program_dir().join("main")
}

/// Compile and link the host program. Same unit policy as the plugin
/// pools: all compiles run concurrently, all failures reported together.
pub fn build_main_program(ctx: &BuildContext, toolchain: &dyn Toolchain) -> Result<(), BuildError> {
    let units = host_units(ctx);
    info!(units = units.len(), "building main program");
    check_sources_exist(&units)?;
    ensure_dir(&ctx.main_program_dir().join("intermediate_objects"))?;
    remove_exact_outputs(units.iter().map(|u| u.object.clone()))?;
    compile_concurrently(toolchain, &units)?;

    let objects: Vec<PathBuf> = units.iter().map(|u| u.object.clone()).collect();
    let artifact = executable_path(ctx);
    remove_exact_outputs([artifact.clone()])?;
    // The host dlopens plugin modules at runtime.
    let flags = vec!["-ldl".to_string()];
    toolchain
        .link_units(&objects, &artifact, &flags)
        .map_err(|_| BuildError::Link(vec![LinkError { artifact }]))
}
