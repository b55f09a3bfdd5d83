//! Pipeline orchestration. One invocation walks the stage graph
//!
//! ```text
//! marker scan -> load descriptors -> generate headers
//!                                        |-> compile shared   --+
//!                                        |-> compile plugins  --+-> link plugins
//!                                        `-> main program (independent branch)
//! ```
//!
//! terminal on the first unrecovered failure: stages that have not started
//! yet are abandoned, artifacts of completed stages stay as they are. Stage
//! durations are recorded for diagnostics and nothing else.

use std::time::Instant;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::context::BuildContext;
use crate::descriptor::{self, PluginDescriptor};
use crate::errors::BuildError;
use crate::headergen::{self, GeneratedOutput};
use crate::marker;
use crate::stage::{compile, link, mainprog, StageTiming};
use crate::toolchain::Toolchain;

/// Diagnostics from one completed (or failed) invocation.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub timings: Vec<StageTiming>,
}

impl PipelineReport {
    fn record(&mut self, stage: &'static str, started: Instant) {
        let duration = started.elapsed();
        info!(stage, ?duration, "stage finished");
        self.timings.push(StageTiming { stage, duration });
    }
}

fn load_descriptors(ctx: &BuildContext) -> Result<Vec<PluginDescriptor>, BuildError> {
    let names = descriptor::discover_plugins(ctx)?;
    let descriptors = descriptor::load_all(ctx, &names)?;
    Ok(descriptors)
}

/// Header generation alone: descriptors in, headers plus registry out.
pub fn run_generate(ctx: &BuildContext) -> Result<GeneratedOutput, BuildError> {
    marker::check(ctx)?;
    let descriptors = load_descriptors(ctx)?;
    headergen::generate(ctx, &descriptors)
}

/// Compile entry point. With no selection both pools run concurrently;
/// with a subset only the named plugins' sources are recompiled (the
/// hot-reload path — shared objects from the last full build still stand).
pub fn run_compile(
    ctx: &BuildContext,
    toolchain: &dyn Toolchain,
    selection: &[String],
) -> Result<PipelineReport, BuildError> {
    marker::check(ctx)?;
    let mut report = PipelineReport::default();

    let started = Instant::now();
    let descriptors = load_descriptors(ctx)?;
    let names: Vec<String> = descriptors.iter().map(|d| d.name.clone()).collect();
    headergen::verify_ledger(ctx, &names)?;
    report.record("load descriptors", started);

    if selection.is_empty() {
        let started = Instant::now();
        run_compile_pools(ctx, toolchain, &descriptors, &[])?;
        report.record("compile shared + plugins", started);
    } else {
        let started = Instant::now();
        compile::compile_plugins(ctx, toolchain, &descriptors, selection)?;
        report.record("compile plugins", started);
    }
    Ok(report)
}

/// Link entry point for full and subset (hot-reload) relinks.
pub fn run_link(
    ctx: &BuildContext,
    toolchain: &dyn Toolchain,
    selection: &[String],
    versions: Option<&[u32]>,
) -> Result<PipelineReport, BuildError> {
    marker::check(ctx)?;
    let mut report = PipelineReport::default();

    let started = Instant::now();
    let known = descriptor::discover_plugins(ctx)?;
    headergen::verify_ledger(ctx, &known)?;
    link::link_plugins(ctx, toolchain, &known, selection, versions)?;
    report.record("link plugins", started);
    Ok(report)
}

/// The two compile pools are mutually independent; run them concurrently.
/// When both fail their unit reports are merged, so a single pass still
/// names every broken translation unit.
fn run_compile_pools(
    ctx: &BuildContext,
    toolchain: &dyn Toolchain,
    descriptors: &[PluginDescriptor],
    selection: &[String],
) -> Result<(), BuildError> {
    let (shared, plugins) = std::thread::scope(|scope| {
        let shared = scope.spawn(|| compile::compile_shared(ctx, toolchain, descriptors));
        let plugins = scope.spawn(|| compile::compile_plugins(ctx, toolchain, descriptors, selection));
        (
            shared.join().expect("shared compile pool panicked"),
            plugins.join().expect("plugin compile pool panicked"),
        )
    });
    match (shared, plugins) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(BuildError::Compile(mut failures)), Err(BuildError::Compile(more))) => {
            failures.extend(more);
            failures.sort_by(|a, b| a.source_file.cmp(&b.source_file));
            Err(BuildError::Compile(failures))
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

/// Full build: everything from descriptors to linked plugins and the host
/// executable. The main-program branch depends only on header generation
/// and runs concurrently with the plugin compile/link chain.
pub fn run_full_build(
    ctx: &BuildContext,
    toolchain: &dyn Toolchain,
) -> Result<PipelineReport, BuildError> {
    marker::check(ctx)?;
    let mut report = PipelineReport::default();

    let started = Instant::now();
    let descriptors = load_descriptors(ctx)?;
    report.record("load descriptors", started);

    let started = Instant::now();
    headergen::generate(ctx, &descriptors)?;
    report.record("generate headers", started);

    let known: Vec<String> = descriptors.iter().map(|d| d.name.clone()).collect();
    let timings: Mutex<Vec<StageTiming>> = Mutex::new(Vec::new());
    let timed = |stage: &'static str, result: Result<(), BuildError>, started: Instant| {
        timings.lock().push(StageTiming {
            stage,
            duration: started.elapsed(),
        });
        result
    };

    let (chain_result, main_result) = std::thread::scope(|scope| {
        let chain = scope.spawn(|| {
            let started = Instant::now();
            run_compile_pools(ctx, toolchain, &descriptors, &[])?;
            timed("compile shared + plugins", Ok(()), started)?;

            let started = Instant::now();
            let result = link::link_plugins(ctx, toolchain, &known, &[], None);
            timed("link plugins", result, started)
        });
        let main = scope.spawn(|| {
            let started = Instant::now();
            let result = mainprog::build_main_program(ctx, toolchain);
            timed("main program", result, started)
        });
        (
            chain.join().expect("plugin chain panicked"),
            main.join().expect("main program branch panicked"),
        )
    });

    report.timings.extend(timings.into_inner());

    // Both branches ran to their own join points; report the plugin chain
    // first, but make sure a concurrent main-program failure is not lost.
    match (chain_result, main_result) {
        (Ok(()), Ok(())) => {
            info!("full build complete");
            Ok(report)
        }
        (Err(chain), Err(main)) => {
            error!(error = %main, "main program build also failed");
            Err(chain)
        }
        (Err(chain), Ok(())) => Err(chain),
        (Ok(()), Err(main)) => Err(main),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::errors::ValidationError;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    /// Toolchain double: writes empty artifacts, optionally failing chosen
    /// sources, and records what it was asked to do.
    #[derive(Default)]
    struct FakeToolchain {
        fail_sources: Vec<String>,
        compiled: Mutex<Vec<PathBuf>>,
        linked: Mutex<Vec<PathBuf>>,
    }

    impl Toolchain for FakeToolchain {
        fn compile_unit(
            &self,
            source: &Path,
            object: &Path,
            _flags: &[String],
        ) -> Result<(), crate::toolchain::ToolchainError> {
            self.compiled.lock().push(source.to_path_buf());
            let name = source.file_name().unwrap().to_string_lossy();
            if self.fail_sources.iter().any(|f| *f == name) {
                return Err(crate::toolchain::ToolchainError::NonzeroExit {
                    program: "fake".to_string(),
                    status: 1,
                });
            }
            fs::write(object, b"obj").unwrap();
            Ok(())
        }

        fn link_units(
            &self,
            _objects: &[PathBuf],
            artifact: &Path,
            _flags: &[String],
        ) -> Result<(), crate::toolchain::ToolchainError> {
            self.linked.lock().push(artifact.to_path_buf());
            fs::write(artifact, b"so").unwrap();
            Ok(())
        }
    }

    fn project() -> (tempfile::TempDir, BuildContext) {
        let dir = tempdir().unwrap();
        let ctx = BuildContext::new(dir.path(), BuildConfig::default());
        fs::create_dir_all(&ctx.main_src_dir).unwrap();
        fs::write(ctx.main_src_dir.join("main.cpp"), "int main() {}\n").unwrap();

        for name in ["audio", "fluid_sim"] {
            let plugin_dir = ctx.plugin_src_dir(name);
            fs::create_dir_all(&plugin_dir).unwrap();
            fs::write(plugin_dir.join(format!("{name}.cpp")), "// plugin\n").unwrap();
            fs::write(
                plugin_dir.join("plugin.toml"),
                format!(
                    r#"
                    plugin_source_files = ["{name}.cpp"]
                    other_source_files = ["shared/math.cpp"]

                    [[procedures]]
                    name = "tick"
                    return = "void"
                    args = []
                    "#
                ),
            )
            .unwrap();
        }
        fs::create_dir_all(ctx.project_root.join("shared")).unwrap();
        fs::write(ctx.project_root.join("shared/math.cpp"), "// shared\n").unwrap();
        (dir, ctx)
    }

    #[test]
    fn full_build_produces_headers_modules_and_executable() {
        let (_dir, ctx) = project();
        let toolchain = FakeToolchain::default();
        let report = run_full_build(&ctx, &toolchain).unwrap();

        assert!(ctx.generated_dir().join("plugin_infos.hpp").is_file());
        assert!(ctx.plugin_artifact("audio", 0).is_file());
        assert!(ctx.plugin_artifact("fluid_sim", 0).is_file());
        assert!(mainprog::executable_path(&ctx).is_file());

        let stages: Vec<_> = report.timings.iter().map(|t| t.stage).collect();
        assert!(stages.contains(&"load descriptors"));
        assert!(stages.contains(&"generate headers"));
        assert!(stages.contains(&"link plugins"));
        assert!(stages.contains(&"main program"));
    }

    #[test]
    fn shared_source_is_compiled_once_for_two_plugins() {
        let (_dir, ctx) = project();
        let toolchain = FakeToolchain::default();
        run_full_build(&ctx, &toolchain).unwrap();
        let shared_compiles = toolchain
            .compiled
            .lock()
            .iter()
            .filter(|p| p.ends_with("shared/math.cpp"))
            .count();
        assert_eq!(shared_compiles, 1);
    }

    #[test]
    fn marker_aborts_before_any_subprocess() {
        let (_dir, ctx) = project();
        fs::write(ctx.main_src_dir.join("wip.cpp"), "// NOBUILD\n").unwrap();
        let toolchain = FakeToolchain::default();
        let err = run_full_build(&ctx, &toolchain).unwrap_err();
        assert!(matches!(err, BuildError::Marker(_)));
        assert!(toolchain.compiled.lock().is_empty());
        assert!(toolchain.linked.lock().is_empty());
    }

    #[test]
    fn compile_failure_prevents_linking() {
        let (_dir, ctx) = project();
        let toolchain = FakeToolchain {
            fail_sources: vec!["audio.cpp".to_string()],
            ..FakeToolchain::default()
        };
        let err = run_full_build(&ctx, &toolchain).unwrap_err();
        assert!(matches!(err, BuildError::Compile(_)));
        assert!(toolchain
            .linked
            .lock()
            .iter()
            .all(|a| !a.to_string_lossy().contains(".so.")));
    }

    #[test]
    fn failures_from_both_compile_pools_are_reported_together() {
        let (_dir, ctx) = project();
        let toolchain = FakeToolchain {
            fail_sources: vec!["math.cpp".to_string(), "audio.cpp".to_string()],
            ..FakeToolchain::default()
        };
        let err = run_full_build(&ctx, &toolchain).unwrap_err();
        let BuildError::Compile(failures) = err else {
            panic!("expected a compile failure report");
        };
        let failed: Vec<String> = failures
            .iter()
            .map(|f| f.source_file.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(failed.contains(&"math.cpp".to_string()), "shared pool failure missing");
        assert!(failed.contains(&"audio.cpp".to_string()), "plugin pool failure missing");
    }

    #[test]
    fn subset_compile_after_plugin_set_change_hits_the_ledger() {
        let (_dir, ctx) = project();
        let toolchain = FakeToolchain::default();
        run_full_build(&ctx, &toolchain).unwrap();

        // A new plugin appears without a fresh generation run.
        let late = ctx.plugin_src_dir("late_addition");
        fs::create_dir_all(&late).unwrap();
        fs::write(late.join("late_addition.cpp"), "").unwrap();
        fs::write(
            late.join("plugin.toml"),
            "plugin_source_files = [\"late_addition.cpp\"]\nprocedures = []\n",
        )
        .unwrap();

        let err = run_compile(&ctx, &toolchain, &["audio".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Validation(ValidationError::LedgerMismatch { .. })
        ));
    }
}
