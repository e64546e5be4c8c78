//! Serializes a module graph into a single self-loading script
//!
//! The artifact is an immediately-invoked function whose only argument is the
//! module table `{ id: [function (require, module, exports) { ... }, {map}] }`.
//! The runtime prelude inside it resolves specifiers through the per-module
//! maps alone. It keeps no module cache: each `require` call runs the target
//! module again and hands back a fresh `exports` object.

use log::debug;

use crate::module_graph::{ModuleGraph, ModuleNode};

/// Loader parameterized only by the module table
const RUNTIME_PRELUDE: &str = r"(function (modules) {
  function require(id) {
    var entry = modules[id];
    var fn = entry[0];
    var mapping = entry[1];

    function localRequire(specifier) {
      return require(mapping[specifier]);
    }

    var module = { exports: {} };

    fn(localRequire, module, module.exports);

    return module.exports;
  }

  require(0);
})";

/// Emit the bundle text for `graph`.
///
/// Only serializing a specifier map can fail.
pub fn emit_bundle(graph: &ModuleGraph) -> serde_json::Result<String> {
    let body_len: usize = graph.nodes().iter().map(|n| n.transformed_body.len()).sum();
    let mut out = String::with_capacity(RUNTIME_PRELUDE.len() + body_len + 128 * graph.len());

    out.push_str(RUNTIME_PRELUDE);
    out.push_str("({\n");
    for node in graph.nodes() {
        write_module_entry(&mut out, node)?;
    }
    out.push_str("});\n");

    debug!(
        "Emitted bundle with {} modules ({} bytes)",
        graph.len(),
        out.len()
    );
    Ok(out)
}

fn write_module_entry(out: &mut String, node: &ModuleNode) -> serde_json::Result<()> {
    out.push_str("  ");
    out.push_str(&node.id.to_string());
    out.push_str(": [\n    function (require, module, exports) {\n");
    out.push_str(&node.transformed_body);
    out.push_str("\n    },\n    ");
    out.push_str(&serde_json::to_string(&node.specifier_map)?);
    out.push_str(",\n  ],\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::module_graph::ModuleId;

    fn node(id: u32, body: &str, deps: &[(&str, u32)]) -> ModuleNode {
        ModuleNode {
            id: ModuleId::new(id),
            source_path: PathBuf::from(format!("/secret/build/dir/{id}.js")),
            transformed_body: body.to_owned(),
            specifier_map: deps
                .iter()
                .map(|(s, t)| ((*s).to_owned(), ModuleId::new(*t)))
                .collect::<IndexMap<_, _>>(),
        }
    }

    #[test]
    fn test_module_table_layout() {
        let graph = ModuleGraph::from_nodes(vec![
            node(0, "console.log(require(\"./b.js\").value);", &[("./b.js", 1)]),
            node(1, "exports.value = 42;", &[]),
        ]);
        let bundle = emit_bundle(&graph).expect("emit");

        let expected_table = "({\n  0: [\n    function (require, module, exports) \
                              {\nconsole.log(require(\"./b.js\").value);\n    },\n    \
                              {\"./b.js\":1},\n  ],\n  1: [\n    function (require, module, \
                              exports) {\nexports.value = 42;\n    },\n    {},\n  ],\n});\n";
        assert!(bundle.starts_with(RUNTIME_PRELUDE));
        assert_eq!(&bundle[RUNTIME_PRELUDE.len()..], expected_table);
    }

    #[test]
    fn test_source_paths_are_not_emitted() {
        let graph = ModuleGraph::from_nodes(vec![node(0, "void 0;", &[])]);
        assert!(!emit_bundle(&graph).expect("emit").contains("/secret/build/dir"));
    }

    #[test]
    fn test_specifiers_are_json_escaped() {
        let graph = ModuleGraph::from_nodes(vec![
            node(0, "", &[("./we\"ird\\name.js", 1)]),
            node(1, "", &[]),
        ]);
        let bundle = emit_bundle(&graph).expect("emit");
        assert!(bundle.contains(r#"{"./we\"ird\\name.js":1}"#));
    }

    #[test]
    fn test_prelude_has_no_cache_and_boots_module_zero() {
        assert!(RUNTIME_PRELUDE.contains("var module = { exports: {} };"));
        assert!(RUNTIME_PRELUDE.contains("require(0);"));
        assert!(!RUNTIME_PRELUDE.contains("cache"));
    }

    #[test]
    fn test_emission_is_deterministic() {
        let graph = ModuleGraph::from_nodes(vec![
            node(0, "a", &[("./x", 1), ("./y", 2)]),
            node(1, "b", &[]),
            node(2, "c", &[]),
        ]);
        assert_eq!(
            emit_bundle(&graph).expect("emit"),
            emit_bundle(&graph).expect("emit")
        );
    }
}
