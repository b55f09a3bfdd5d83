use std::path::PathBuf;

use thiserror::Error;

use crate::marker::MarkerOccurrence;

/// A descriptor document was missing or malformed.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("plugin `{plugin}`: failed to read descriptor at {}: {source}", path.display())]
    Unreadable {
        plugin: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("plugin `{plugin}`: malformed descriptor: {source}")]
    Malformed {
        plugin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("plugin `{plugin}`: field `{field}`: {message}")]
    BadField {
        plugin: String,
        field: &'static str,
        message: String,
    },
}

/// A structurally valid input that violates a cross-cutting rule.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("plugin `{plugin}`: duplicate procedure name `{procedure}`")]
    DuplicateProcedure { plugin: String, procedure: String },
    #[error("no such plugin(s): {}", names.join(", "))]
    UnknownPlugins { names: Vec<String> },
    #[error("{named} plugin name(s) given but {versions} version(s)")]
    VersionParity { named: usize, versions: usize },
    #[error(
        "plugin set changed since last generation (ledger lists [{}], found [{}]); \
         run a full build to regenerate ids",
        ledger.join(", "),
        found.join(", ")
    )]
    LedgerMismatch {
        ledger: Vec<String>,
        found: Vec<String>,
    },
    #[error(
        "source file(s) do not exist or are not regular files: {}",
        paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    MissingSources { paths: Vec<PathBuf> },
}

/// One translation unit failed to compile.
#[derive(Debug, Error)]
#[error("failed to compile `{}`", source_file.display())]
pub struct CompileError {
    pub source_file: PathBuf,
}

/// One plugin failed to link.
#[derive(Debug, Error)]
#[error("failed to link `{}`", artifact.display())]
pub struct LinkError {
    pub artifact: PathBuf,
}

/// The do-not-build marker was found and no override was set.
#[derive(Debug, Error)]
#[error("found {} NOBUILD marker occurrence(s)", occurrences.len())]
pub struct MarkerError {
    pub occurrences: Vec<MarkerOccurrence>,
}

/// Top-level failure of a pipeline invocation. Carries the complete
/// enumeration of failing units where a stage ran concurrent work.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{} translation unit(s) failed to compile", .0.len())]
    Compile(Vec<CompileError>),
    #[error("{} plugin(s) failed to link", .0.len())]
    Link(Vec<LinkError>),
    #[error(transparent)]
    Marker(#[from] MarkerError),
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    /// Every failing file, artifact, or marker occurrence, one per line.
    /// Printed in full before the process exits nonzero. Empty for errors
    /// that are not aggregates.
    pub fn enumerate_failures(&self) -> Vec<String> {
        match self {
            BuildError::Compile(errors) => errors.iter().map(|e| e.to_string()).collect(),
            BuildError::Link(errors) => errors.iter().map(|e| e.to_string()).collect(),
            BuildError::Marker(err) => err.occurrences.iter().map(|o| o.to_string()).collect(),
            _ => Vec::new(),
        }
    }
}
