//! plugforge: plugin ABI metadata generation and staged build
//! orchestration for hot-swappable plugin modules.
//!
//! A project describes each plugin in a declarative `plugin.toml`. From
//! those descriptors plugforge generates per-plugin call-table headers and
//! a whole-program registry whose layout metadata is derived from the very
//! types it declares, then drives the compile and link stages that turn
//! plugin sources into versioned loadable modules a running host can swap
//! in without restarting.

pub mod config;
pub mod context;
pub mod descriptor;
pub mod errors;
pub mod headergen;
pub mod marker;
pub mod pipeline;
pub mod stage;
pub mod toolchain;

pub use config::BuildConfig;
pub use context::BuildContext;
pub use descriptor::{PluginDescriptor, Procedure};
pub use errors::BuildError;
pub use pipeline::{run_compile, run_full_build, run_generate, run_link, PipelineReport};
pub use toolchain::{GccToolchain, Toolchain};
