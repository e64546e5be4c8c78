#![allow(clippy::disallowed_methods)]

mod common;

use std::{fs, path::Path, process::Command};

use common::{node, run_bundle, write_tree};
use jspack::config::{ENV_DEDUPE, ENV_EXTENSIONS, ENV_MAX_MODULES};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// The binary with `home` as its home and config directory and no `JSPACK_*` variables
fn jspack(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_jspack"));
    cmd.env("HOME", home).env("XDG_CONFIG_HOME", home.join(".config"));
    for var in [ENV_DEDUPE, ENV_MAX_MODULES, ENV_EXTENSIONS, "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_cli_writes_runnable_bundle() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("src/main.js", "import { greet } from \"./greet\";\nconsole.log(greet(\"cli\"));\n"),
            ("src/greet.js", "export const greet = (name) => `hello ${name}`;\n"),
        ],
    );
    let output = temp.path().join("dist/app.js");

    let status = jspack(temp.path())
        .current_dir(temp.path())
        .args(["--entry", "src/main.js", "--output", "dist/app.js"])
        .status()
        .unwrap();
    assert!(status.success());
    assert!(output.is_file());

    let Some(node) = node() else { return };
    assert_eq!(run_bundle(&node, &output), "hello cli");
}

#[test]
fn test_cli_stdout() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("entry.js", "console.log(\"only\");\n")]);

    let output = jspack(temp.path())
        .current_dir(temp.path())
        .args(["-e", "entry.js", "--stdout"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("console.log(\"only\");"));
    assert!(stdout.trim_end().ends_with("});"));
}

#[test]
fn test_cli_failure_exits_nonzero_and_keeps_output() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("entry.js", "import \"./missing.js\";\n"), ("out.js", "previous")],
    );

    let output = jspack(temp.path())
        .current_dir(temp.path())
        .args(["-e", "entry.js", "-o", "out.js"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SourceReadError"), "stderr: {stderr}");
    assert_eq!(fs::read_to_string(temp.path().join("out.js")).unwrap(), "previous");
}

#[test]
fn test_cli_requires_a_destination() {
    let temp = TempDir::new().unwrap();
    let output = jspack(temp.path())
        .current_dir(temp.path())
        .args(["-e", "entry.js"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_cli_reads_project_config() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("jspack.toml", "max_modules = 1\n"),
            ("entry.js", "import \"./a.js\";\n"),
            ("a.js", ""),
        ],
    );

    let output = jspack(temp.path())
        .current_dir(temp.path())
        .args(["-e", "entry.js", "--stdout"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("TooManyModules"));

    let output = jspack(temp.path())
        .current_dir(temp.path())
        .args(["-e", "entry.js", "--stdout", "--max-modules", "5"])
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn test_cli_rejects_unknown_config_keys() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[("custom.toml", "minify = true\n"), ("entry.js", "")],
    );

    let output = jspack(temp.path())
        .current_dir(temp.path())
        .args(["-e", "entry.js", "--stdout", "--config", "custom.toml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_environment_overrides_config_files() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            ("jspack.toml", "max_modules = 1\nextensions = [\"js\"]\n"),
            ("entry.js", "import \"./a\";\n"),
            ("a.ts", "console.log(\"from ts\");\n"),
        ],
    );

    let output = jspack(temp.path())
        .current_dir(temp.path())
        .args(["-e", "entry.js", "--stdout"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let output = jspack(temp.path())
        .current_dir(temp.path())
        .env(ENV_MAX_MODULES, "2")
        .env(ENV_EXTENSIONS, "ts, js")
        .args(["-e", "entry.js", "--stdout"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8(output.stdout).unwrap().contains("from ts"));
}

#[test]
fn test_invalid_environment_value_is_an_error() {
    let temp = TempDir::new().unwrap();
    write_tree(temp.path(), &[("entry.js", "")]);

    let output = jspack(temp.path())
        .current_dir(temp.path())
        .env(ENV_MAX_MODULES, "lots")
        .args(["-e", "entry.js", "--stdout"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains(ENV_MAX_MODULES));
}

#[cfg(unix)]
#[test]
fn test_user_config_comes_from_the_isolated_home() {
    let temp = TempDir::new().unwrap();
    write_tree(
        temp.path(),
        &[
            (".config/jspack/jspack.toml", "max_modules = 1\n"),
            ("project/entry.js", "import \"./a.js\";\n"),
            ("project/a.js", ""),
        ],
    );

    let output = jspack(temp.path())
        .current_dir(temp.path().join("project"))
        .args(["-e", "entry.js", "--stdout"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("TooManyModules"));
}
