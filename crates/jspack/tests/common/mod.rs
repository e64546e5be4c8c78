#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

/// Write `files` (relative path, contents) under `root`
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}

/// Location of a `node` binary, if one is installed
pub fn node() -> Option<PathBuf> {
    let found = Command::new("node")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success());
    if found {
        Some(PathBuf::from("node"))
    } else {
        eprintln!("node is not on PATH; skipping bundle execution");
        None
    }
}

/// Run a bundle file with node and return its trimmed stdout
pub fn run_bundle(node: &Path, bundle: &Path) -> String {
    let output = Command::new(node).arg(bundle).output().unwrap();
    assert!(
        output.status.success(),
        "bundle failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_owned()
}
