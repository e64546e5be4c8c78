//! Source analysis: turn one file into a [`ModuleRecord`]
//!
//! The graph builder only sees the [`SourceAnalyzer`] trait. The shipped
//! implementation, [`EsModuleAnalyzer`], reads ECMAScript modules and rewrites
//! their static imports and exports into the three-parameter calling
//! convention the bundle runtime provides.

mod rewriter;

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::trace;

use self::rewriter::{SyntaxError, rewrite_module};
use crate::{config::Config, error::BundleError};

/// One analyzed source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub source_path: PathBuf,
    /// Raw import specifiers in source order, duplicates preserved
    pub dependency_specifiers: Vec<String>,
    /// Module code expecting `require`, `module` and `exports` bindings
    pub transformed_body: String,
}

pub trait SourceAnalyzer {
    fn analyze(&self, path: &Path) -> Result<ModuleRecord, BundleError>;
}

impl<A: SourceAnalyzer + ?Sized> SourceAnalyzer for &A {
    fn analyze(&self, path: &Path) -> Result<ModuleRecord, BundleError> {
        (**self).analyze(path)
    }
}

impl<A: SourceAnalyzer + ?Sized> SourceAnalyzer for Box<A> {
    fn analyze(&self, path: &Path) -> Result<ModuleRecord, BundleError> {
        (**self).analyze(path)
    }
}

/// Analyzer for ECMAScript module sources
#[derive(Debug, Clone)]
pub struct EsModuleAnalyzer {
    strict: bool,
}

impl Default for EsModuleAnalyzer {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl EsModuleAnalyzer {
    pub fn new(config: &Config) -> Self {
        Self {
            strict: config.strict,
        }
    }

    /// Analyze source text that has already been read from `path`
    pub fn analyze_source(&self, path: &Path, source: &str) -> Result<ModuleRecord, BundleError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let rewrite = rewrite_module(source, self.strict)
            .map_err(|e| analysis_error(path, source, e))?;

        trace!(
            "Analyzed {}: specifiers {:?}",
            path.display(),
            rewrite.specifiers
        );

        Ok(ModuleRecord {
            source_path: path.to_path_buf(),
            dependency_specifiers: rewrite.specifiers,
            transformed_body: rewrite.body,
        })
    }
}

impl SourceAnalyzer for EsModuleAnalyzer {
    fn analyze(&self, path: &Path) -> Result<ModuleRecord, BundleError> {
        let source = fs::read_to_string(path).map_err(|e| BundleError::source_read(path, e))?;
        self.analyze_source(path, &source)
    }
}

fn analysis_error(path: &Path, source: &str, error: SyntaxError) -> BundleError {
    let (line, column) = line_col(source, error.offset);
    BundleError::SourceAnalysis {
        path: path.to_path_buf(),
        line,
        column,
        message: error.message,
    }
}

/// 1-based line and column (in characters) of a byte offset
fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(src.len());
    while !src.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &src[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, column)
}
