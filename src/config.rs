//! Environment-style build switches. Read once per invocation; the stage
//! engines only see the flag lists this module computes.

use std::env;

/// Warning set applied to plugin translation units.
pub const WARNING_FLAGS: &[&str] = &[
    "-Werror",
    "-Wall",
    "-Wextra",
    "-Walloc-zero",
    "-Wcast-qual",
    "-Wconversion",
    "-Wduplicated-branches",
    "-Wduplicated-cond",
    "-Wfloat-equal",
    "-Wformat=2",
    "-Wformat-signedness",
    "-Winit-self",
    "-Wlogical-op",
    "-Wshadow",
    "-Wswitch",
    "-Wundef",
    "-Wunused-result",
    "-Wwrite-strings",
    "-Wsign-conversion",
    "-Wno-missing-field-initializers",
];

/// Build switches consumed by the pipeline. Semantics are opaque to the
/// orchestration logic; only [`BuildConfig::optimization_flags`] and friends
/// interpret them.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// Release optimization level instead of a debug build.
    pub release: bool,
    /// Include debug symbols even in a release build.
    pub debug_symbols: bool,
    /// Add profiling instrumentation to every compiled unit.
    pub profiling: bool,
    /// Proceed even when the NOBUILD marker is present in a watched tree.
    pub allow_nobuild: bool,
    /// Tune generated code for the build machine's architecture.
    pub native_arch: bool,
}

fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => value.trim() == "1",
        Err(_) => false,
    }
}

impl BuildConfig {
    /// Read the `PLUGFORGE_*` environment switches.
    pub fn from_env() -> Self {
        BuildConfig {
            release: env_flag("PLUGFORGE_RELEASE"),
            debug_symbols: env_flag("PLUGFORGE_DEBUG_SYMBOLS"),
            profiling: env_flag("PLUGFORGE_PROFILE"),
            allow_nobuild: env_flag("PLUGFORGE_ALLOW_NOBUILD"),
            native_arch: env_flag("PLUGFORGE_NATIVE_ARCH"),
        }
    }

    /// Optimization and symbol flags shared by every compile pool.
    pub fn optimization_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.release {
            flags.push("-O3".to_string());
            flags.push("-DNDEBUG".to_string());
            if self.debug_symbols {
                flags.push("-g3".to_string());
            }
        } else {
            flags.push("-g3".to_string());
        }
        if self.profiling {
            flags.push("-pg".to_string());
        }
        if self.native_arch {
            flags.push("-march=native".to_string());
        }
        flags
    }

    pub fn warning_flags(&self) -> Vec<String> {
        WARNING_FLAGS.iter().map(|f| f.to_string()).collect()
    }
}
