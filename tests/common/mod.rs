use std::fs;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;

use plugforge::toolchain::{Toolchain, ToolchainError};
use plugforge::{BuildConfig, BuildContext};

/// Toolchain double for the stage engines: produces empty artifact files,
/// fails any source or artifact whose file name is on a fail list, and
/// records every invocation.
#[derive(Default)]
pub struct FakeToolchain {
    pub fail_compile: Vec<String>,
    pub fail_link: Vec<String>,
    pub compiled: Mutex<Vec<PathBuf>>,
    pub linked: Mutex<Vec<PathBuf>>,
}

impl FakeToolchain {
    pub fn failing_compiles(names: &[&str]) -> Self {
        FakeToolchain {
            fail_compile: names.iter().map(|s| s.to_string()).collect(),
            ..FakeToolchain::default()
        }
    }

    pub fn failing_links(names: &[&str]) -> Self {
        FakeToolchain {
            fail_link: names.iter().map(|s| s.to_string()).collect(),
            ..FakeToolchain::default()
        }
    }

    pub fn compiled_sources(&self) -> Vec<PathBuf> {
        self.compiled.lock().clone()
    }

    pub fn linked_artifacts(&self) -> Vec<PathBuf> {
        self.linked.lock().clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().into_owned()
}

impl Toolchain for FakeToolchain {
    fn compile_unit(
        &self,
        source: &Path,
        object: &Path,
        _flags: &[String],
    ) -> Result<(), ToolchainError> {
        self.compiled.lock().push(source.to_path_buf());
        if self.fail_compile.contains(&file_name(source)) {
            return Err(ToolchainError::NonzeroExit {
                program: "fake-cc".to_string(),
                status: 1,
            });
        }
        fs::write(object, b"object").unwrap();
        Ok(())
    }

    fn link_units(
        &self,
        _objects: &[PathBuf],
        artifact: &Path,
        _flags: &[String],
    ) -> Result<(), ToolchainError> {
        self.linked.lock().push(artifact.to_path_buf());
        if self.fail_link.contains(&file_name(artifact)) {
            return Err(ToolchainError::NonzeroExit {
                program: "fake-ld".to_string(),
                status: 1,
            });
        }
        fs::write(artifact, b"module").unwrap();
        Ok(())
    }
}

/// Lay out a project with the given plugins, each exporting one `tick`
/// procedure and owning one source file.
pub fn project_with_plugins(plugins: &[&str]) -> (tempfile::TempDir, BuildContext) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = BuildContext::new(dir.path(), BuildConfig::default());
    fs::create_dir_all(&ctx.main_src_dir).unwrap();
    fs::write(ctx.main_src_dir.join("main.cpp"), "int main() {}\n").unwrap();

    for name in plugins {
        let plugin_dir = ctx.plugin_src_dir(name);
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join(format!("{name}.cpp")), "// plugin\n").unwrap();
        fs::write(
            plugin_dir.join("plugin.toml"),
            format!(
                "plugin_source_files = [\"{name}.cpp\"]\n\n\
                 [[procedures]]\n\
                 name = \"tick\"\n\
                 return = \"void\"\n\
                 args = []\n"
            ),
        )
        .unwrap();
    }
    (dir, ctx)
}
