use std::{
    ffi::OsString,
    path::{Component, Path, PathBuf},
};

use log::{debug, trace};

use crate::config::Config;

/// Turns raw specifiers into concrete file paths
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    extensions: Vec<String>,
}

impl ModuleResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            extensions: config.extensions.clone(),
        }
    }

    /// Join `specifier` onto `base_dir` and pick the file it names.
    ///
    /// The join is purely lexical: every specifier, bare or absolute, is
    /// appended to the importing module's directory. When the joined path is
    /// not a file, `<path>.<ext>` and then `<path>/index.<ext>` are tried for
    /// each configured extension. If nothing exists the joined path is
    /// returned unchanged so the read failure names what the user wrote.
    pub fn resolve(&self, base_dir: &Path, specifier: &str) -> PathBuf {
        let joined = join_specifier(base_dir, specifier);
        if joined.is_file() {
            return joined;
        }

        let with_extension = self.extensions.iter().map(|ext| {
            let mut name = OsString::from(joined.as_os_str());
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        });
        let index_files = self
            .extensions
            .iter()
            .map(|ext| joined.join(format!("index.{ext}")));

        match with_extension.chain(index_files).find(|p| p.is_file()) {
            Some(found) => {
                trace!("Resolved {specifier:?} to {}", found.display());
                found
            }
            None => joined,
        }
    }
}

/// Lexical join of a specifier onto a directory, with `.` and `..` collapsed
pub fn join_specifier(base_dir: &Path, specifier: &str) -> PathBuf {
    let relative = specifier.trim_start_matches(['/', '\\']);
    normalize_path(&base_dir.join(relative))
}

/// Collapse `.` and `..` components without touching the file system
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Canonicalize a path, falling back to its absolute lexical form
pub fn canonicalize_path(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(e) => {
            debug!("Failed to canonicalize path {}: {}", path.display(), e);
            std::path::absolute(path).map_or_else(|_| path.to_path_buf(), |p| normalize_path(&p))
        }
    }
}
