//! Build tree layout. A [`BuildContext`] is constructed once per invocation
//! and threaded through every stage call, so tests can point the whole
//! pipeline at a temporary directory.

use std::path::{Path, PathBuf};

use crate::config::BuildConfig;

/// Paths and switches owned by one pipeline invocation. One build tree is
/// exclusively owned by one invocation; there is no cross-process locking.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Project root. All descriptor-relative paths resolve against this.
    pub project_root: PathBuf,
    /// Directory containing one subdirectory per plugin.
    pub plugins_dir: PathBuf,
    /// Host program source directory.
    pub main_src_dir: PathBuf,
    /// Root of all build outputs.
    pub build_dir: PathBuf,
    pub config: BuildConfig,
}

impl BuildContext {
    /// Conventional layout: `plugins_src/` and `src/` under the project
    /// root, outputs under `build/`.
    pub fn new(project_root: impl Into<PathBuf>, config: BuildConfig) -> Self {
        let project_root = project_root.into();
        BuildContext {
            plugins_dir: project_root.join("plugins_src"),
            main_src_dir: project_root.join("src"),
            build_dir: project_root.join("build"),
            project_root,
            config,
        }
    }

    /// Generated headers and the id ledger. Wiped and rewritten whole on
    /// every generation run.
    pub fn generated_dir(&self) -> PathBuf {
        self.build_dir.join("generated_headers")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.generated_dir().join("plugin_ids.json")
    }

    /// Objects compiled from sources shared across plugins.
    pub fn shared_objects_dir(&self) -> PathBuf {
        self.build_dir.join("shared_objects")
    }

    /// Per-plugin object subdirectories.
    pub fn plugin_objects_dir(&self, plugin: &str) -> PathBuf {
        self.build_dir.join("plugin_objects").join(plugin)
    }

    /// Linked plugin modules. Never wiped: versioned artifacts from earlier
    /// runs stay mapped in a running host.
    pub fn link_dir(&self) -> PathBuf {
        self.build_dir.join("plugins")
    }

    /// `name.so.<version>` artifact path.
    pub fn plugin_artifact(&self, plugin: &str, version: u32) -> PathBuf {
        self.link_dir().join(format!("{plugin}.so.{version}"))
    }

    /// Path template baked into the generated registry; the host formats
    /// the version in at load time.
    pub fn plugin_artifact_template(&self, plugin: &str) -> String {
        format!("{}/{plugin}.so.%u", self.link_dir().display())
    }

    /// Host program outputs.
    pub fn main_program_dir(&self) -> PathBuf {
        self.build_dir.join("main_program")
    }

    pub fn plugin_src_dir(&self, plugin: &str) -> PathBuf {
        self.plugins_dir.join(plugin)
    }

    pub fn descriptor_path(&self, plugin: &str) -> PathBuf {
        self.plugin_src_dir(plugin).join("plugin.toml")
    }

    /// Source trees scanned for the do-not-build marker.
    pub fn watched_trees(&self) -> Vec<PathBuf> {
        vec![self.plugins_dir.clone(), self.main_src_dir.clone()]
    }
}

/// Object filename for a source path: slashes flattened so one flat stage
/// directory can hold objects from nested trees without collision.
pub fn object_filename(source: &Path) -> String {
    let flat = source.to_string_lossy().replace(['/', '\\'], "_");
    format!("{flat}.o")
}
