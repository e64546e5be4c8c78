//! Fatal build errors
//!
//! Every variant aborts the whole build. Orchestration code wraps these in
//! `anyhow` with extra context; callers that care about the kind recover it
//! with `downcast_ref::<BundleError>()`.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    /// The entry or a dependency could not be read from disk
    #[error("SourceReadError: cannot read `{}`: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The analyzer could not recognize or rewrite a module's import/export syntax
    #[error("SourceAnalysisError: {}:{line}:{column}: {message}", path.display())]
    SourceAnalysis {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// A static import chain leads back to one of its own ancestors
    #[error("CircularImport: {}", format_cycle(.cycle))]
    CircularImport { cycle: Vec<PathBuf> },

    /// The configured module limit was exceeded
    #[error("TooManyModules: more than {limit} modules discovered")]
    TooManyModules { limit: usize },
}

impl BundleError {
    pub fn source_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceRead {
            path: path.into(),
            source,
        }
    }

    pub fn is_source_read(&self) -> bool {
        matches!(self, Self::SourceRead { .. })
    }

    pub fn is_source_analysis(&self) -> bool {
        matches!(self, Self::SourceAnalysis { .. })
    }

    pub fn is_circular_import(&self) -> bool {
        matches!(self, Self::CircularImport { .. })
    }
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
