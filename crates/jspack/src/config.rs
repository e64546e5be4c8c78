//! Layered configuration
//!
//! Layers are applied lowest precedence first: built-in defaults, the user
//! config file, the project config file (or an explicit `--config` file),
//! `JSPACK_*` environment variables, and finally CLI flags applied by the
//! binary itself.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::dirs::{CONFIG_FILE_NAME, user_config_file};

pub const ENV_DEDUPE: &str = "JSPACK_DEDUPE";
pub const ENV_MAX_MODULES: &str = "JSPACK_MAX_MODULES";
pub const ENV_EXTENSIONS: &str = "JSPACK_EXTENSIONS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Extensions tried, in order, when a specifier does not name a file as written
    pub extensions: Vec<String>,
    /// Reuse one module id per canonical path instead of one per discovery
    pub dedupe: bool,
    /// Upper bound on the number of modules a single build may discover
    pub max_modules: usize,
    /// Prefix every transformed module body with `"use strict";`
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: vec!["js".into(), "mjs".into(), "cjs".into()],
            dedupe: false,
            max_modules: 10_000,
            strict: true,
        }
    }
}

/// One config file; every key is optional so files only override what they name
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigLayer {
    extensions: Option<Vec<String>>,
    dedupe: Option<bool>,
    max_modules: Option<usize>,
    strict: Option<bool>,
}

impl Config {
    /// Load the configuration for a build run from the current directory
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Self::load_with(user_config_file().as_deref(), &cwd, explicit, |key| {
            std::env::var(key).ok()
        })
    }

    /// Every layer below the CLI flags, with the user file, project directory
    /// and variable lookup supplied by the caller
    pub fn load_with(
        user_file: Option<&Path>,
        project_dir: &Path,
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::load_files(user_file, project_dir, explicit)?;
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the file layers only: user file, then the explicit file or the
    /// project file found in `project_dir`
    pub fn load_files(
        user_file: Option<&Path>,
        project_dir: &Path,
        explicit: Option<&Path>,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_file) = user_file
            && user_file.is_file()
        {
            config.merge(read_layer(user_file)?);
        }

        match explicit {
            Some(path) => config.merge(read_layer(path)?),
            None => {
                let project_file = project_config_file(project_dir);
                if project_file.is_file() {
                    config.merge(read_layer(&project_file)?);
                }
            }
        }

        Ok(config)
    }

    /// Apply `JSPACK_*` overrides through the given variable lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(ENV_DEDUPE) {
            self.dedupe = parse_bool(&value).with_context(|| format!("Invalid {ENV_DEDUPE}"))?;
        }
        if let Some(value) = lookup(ENV_MAX_MODULES) {
            self.max_modules = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {ENV_MAX_MODULES}: {value:?}"))?;
        }
        if let Some(value) = lookup(ENV_EXTENSIONS) {
            self.extensions = value
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_modules == 0 {
            bail!("max_modules must be at least 1");
        }
        if u32::try_from(self.max_modules).is_err() {
            bail!("max_modules must be at most {}", u32::MAX);
        }
        if let Some(bad) = self
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']))
        {
            bail!("Invalid extension {bad:?}: expected a bare extension such as \"js\"");
        }
        Ok(())
    }

    fn merge(&mut self, layer: ConfigLayer) {
        if let Some(extensions) = layer.extensions {
            self.extensions = extensions;
        }
        if let Some(dedupe) = layer.dedupe {
            self.dedupe = dedupe;
        }
        if let Some(max_modules) = layer.max_modules {
            self.max_modules = max_modules;
        }
        if let Some(strict) = layer.strict {
            self.strict = strict;
        }
    }
}

fn read_layer(path: &Path) -> Result<ConfigLayer> {
    debug!("Loading config from {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got {other:?}")),
    }
}

/// Location of the project-level config file inside `dir`
pub fn project_config_file(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}
