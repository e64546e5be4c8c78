use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::{
    analyzer::EsModuleAnalyzer, bundle_emitter::emit_bundle, config::Config,
    graph_builder::GraphBuilder, module_graph::ModuleGraph,
};

/// Drives one build: graph construction, emission and output
#[derive(Debug, Clone)]
pub struct BundleOrchestrator {
    config: Config,
}

impl BundleOrchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn build_graph(&self, entry: &Path) -> Result<ModuleGraph> {
        let analyzer = EsModuleAnalyzer::new(&self.config);
        let builder = GraphBuilder::new(analyzer, &self.config);
        let graph = builder
            .build(entry)
            .with_context(|| format!("Failed to bundle {}", entry.display()))?;
        debug!("Module graph has {} modules", graph.len());
        Ok(graph)
    }

    /// Build and emit without touching the output location
    pub fn bundle_to_string(&self, entry: &Path) -> Result<String> {
        let graph = self.build_graph(entry)?;
        emit_bundle(&graph).context("Failed to serialize the module table")
    }

    /// Bundle `entry` into `output`.
    ///
    /// The artifact is written to a temporary file next to `output` and
    /// renamed over it, so a failed build never leaves a partial or empty
    /// file behind and an earlier artifact survives untouched.
    pub fn bundle(&self, entry: &Path, output: &Path) -> Result<()> {
        let bundle = self.bundle_to_string(entry)?;
        write_atomically(output, bundle.as_bytes())?;

        info!(
            "Wrote bundle to {} ({} bytes, sha256 {})",
            output.display(),
            bundle.len(),
            content_digest(bundle.as_bytes())
        );
        Ok(())
    }
}

fn write_atomically(output: &Path, contents: &[u8]) -> Result<()> {
    let dir = output_dir(output);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut temp = NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    temp.write_all(contents)
        .and_then(|()| temp.flush())
        .with_context(|| format!("Failed to write temporary file {}", temp.path().display()))?;
    temp.persist(output)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write bundle to {}", output.display()))?;
    Ok(())
}

fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Lowercase hex SHA-256 of the emitted artifact
pub fn content_digest(contents: &[u8]) -> String {
    let digest = Sha256::digest(contents);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
