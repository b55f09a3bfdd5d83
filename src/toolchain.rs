//! Narrow capability interface over the external compiler/linker. Stage
//! engines are written against [`Toolchain`] so orchestration logic can be
//! exercised with a fake that never spawns a process.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with status {status}")]
    NonzeroExit { program: String, status: i32 },
}

/// The two operations the pipeline needs from a toolchain. Diagnostics go
/// to the child's inherited stderr; callers only see success or failure.
pub trait Toolchain: Sync {
    fn compile_unit(
        &self,
        source: &Path,
        object: &Path,
        flags: &[String],
    ) -> Result<(), ToolchainError>;

    fn link_units(
        &self,
        objects: &[PathBuf],
        artifact: &Path,
        flags: &[String],
    ) -> Result<(), ToolchainError>;
}

/// Production toolchain: shells out to a GCC-compatible driver.
#[derive(Debug, Clone)]
pub struct GccToolchain {
    driver: String,
}

impl GccToolchain {
    pub fn new(driver: impl Into<String>) -> Self {
        GccToolchain {
            driver: driver.into(),
        }
    }

    fn run(&self, command: &mut Command) -> Result<(), ToolchainError> {
        debug!(command = ?command, "running toolchain");
        let status = command.status().map_err(|source| ToolchainError::Spawn {
            program: self.driver.clone(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(ToolchainError::NonzeroExit {
                program: self.driver.clone(),
                status: status.code().unwrap_or(-1),
            })
        }
    }
}

impl Default for GccToolchain {
    fn default() -> Self {
        GccToolchain::new("g++")
    }
}

impl Toolchain for GccToolchain {
    fn compile_unit(
        &self,
        source: &Path,
        object: &Path,
        flags: &[String],
    ) -> Result<(), ToolchainError> {
        let mut command = Command::new(&self.driver);
        command.arg("-c").arg(source).arg("-o").arg(object).args(flags);
        self.run(&mut command)
    }

    fn link_units(
        &self,
        objects: &[PathBuf],
        artifact: &Path,
        flags: &[String],
    ) -> Result<(), ToolchainError> {
        let mut command = Command::new(&self.driver);
        command.arg("-o").arg(artifact).args(objects).args(flags);
        self.run(&mut command)
    }
}
