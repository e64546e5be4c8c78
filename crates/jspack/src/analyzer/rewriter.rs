//! Rewrites top-level ES module declarations into the `require` / `module` /
//! `exports` calling convention.
//!
//! The module is parsed with oxc and only its import and export statements
//! are touched, using their spans; every other byte is copied through
//! unchanged. The output is laid out as:
//!
//! 1. the optional `"use strict";` prologue,
//! 2. the `__esModule` marker and one getter per export, so importers
//!    observe live values,
//! 3. the hoisted `require` calls and import bindings, in source order,
//! 4. the module code with its import/export syntax removed.

use indexmap::IndexMap;
use log::trace;
use oxc::{
    allocator::Allocator,
    ast::ast::{
        BindingPattern, BindingPatternKind, Declaration, ExportAllDeclaration,
        ExportDefaultDeclaration, ExportDefaultDeclarationKind, ExportNamedDeclaration,
        ImportDeclaration, ImportDeclarationSpecifier, ModuleExportName, Statement,
    },
    diagnostics::OxcDiagnostic,
    parser::Parser,
    span::{GetSpan, SourceType, Span},
};
use rustc_hash::FxHashSet;

const ESMODULE_MARKER: &str = "Object.defineProperty(exports, \"__esModule\", { value: true });\n";

/// Result of rewriting one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Raw specifiers of every import and re-export, in source order, duplicates kept
    pub specifiers: Vec<String>,
    pub body: String,
}

/// A parse or rewrite failure at a byte offset of the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }

    fn from_diagnostic(diagnostic: &OxcDiagnostic) -> Self {
        let offset = diagnostic
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map_or(0, |label| label.offset());
        Self::new(offset, diagnostic.message.to_string())
    }
}

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Rewrite the module source `src`
pub fn rewrite_module(src: &str, strict: bool) -> Result<Rewrite, SyntaxError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, src, SourceType::mjs()).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(SyntaxError::from_diagnostic(error));
    }
    if parsed.panicked {
        return Err(SyntaxError::new(0, "unrecoverable parse error"));
    }

    let mut rewriter = Rewriter::new(src);
    if let Some(hashbang) = &parsed.program.hashbang {
        rewriter.remove_statement(hashbang.span);
    }
    for statement in parsed.program.body.iter() {
        rewriter.statement(statement)?;
    }
    Ok(rewriter.finish(strict))
}

struct Rewriter<'s> {
    src: &'s str,
    specifiers: Vec<String>,
    /// `require` calls and import bindings, emitted above the module code
    prologue: Vec<String>,
    edits: Vec<Edit>,
    /// Exported name -> expression read by its getter
    exports: IndexMap<String, String>,
    /// Names exported without a getter (`export default <expr>`)
    assigned_exports: FxHashSet<String>,
    temps: FxHashSet<String>,
}

impl<'s> Rewriter<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            specifiers: Vec::new(),
            prologue: Vec::new(),
            edits: Vec::new(),
            exports: IndexMap::new(),
            assigned_exports: FxHashSet::default(),
            temps: FxHashSet::default(),
        }
    }

    fn statement(&mut self, statement: &Statement<'_>) -> Result<(), SyntaxError> {
        match statement {
            Statement::ImportDeclaration(decl) => {
                self.import(decl);
                Ok(())
            }
            Statement::ExportNamedDeclaration(decl) => self.export_named(decl),
            Statement::ExportDefaultDeclaration(decl) => self.export_default(decl),
            Statement::ExportAllDeclaration(decl) => self.export_all(decl),
            _ => Ok(()),
        }
    }

    fn import(&mut self, decl: &ImportDeclaration<'_>) {
        let specifier = decl.source.value.to_string();
        let require = format!("require({})", js_string(&specifier));

        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();
        if let Some(bindings) = &decl.specifiers {
            for binding in bindings.iter() {
                match binding {
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                        default = Some(s.local.name.to_string());
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                        namespace = Some(s.local.name.to_string());
                    }
                    ImportDeclarationSpecifier::ImportSpecifier(s) => {
                        named.push((export_name(&s.imported), s.local.name.to_string()));
                    }
                }
            }
        }

        let text = match (default, namespace) {
            (None, None) if named.is_empty() => format!("{require};"),
            (None, Some(ns)) if named.is_empty() => format!("var {ns} = {require};"),
            (default, namespace) => {
                let tmp = self.temp_name(&specifier);
                let mut text = format!("var {tmp} = {require};");
                if let Some(local) = default {
                    text.push_str(&format!(" var {local} = {tmp}.default;"));
                }
                if let Some(ns) = namespace {
                    text.push_str(&format!(" var {ns} = {tmp};"));
                }
                for (imported, local) in &named {
                    text.push_str(&format!(" var {local} = {};", member(&tmp, imported)));
                }
                text
            }
        };

        self.specifiers.push(specifier);
        self.prologue.push(text);
        self.remove_statement(decl.span);
    }

    /// `export <declaration>`, `export { a, b as c }` and `export { a } from "s"`
    fn export_named(&mut self, decl: &ExportNamedDeclaration<'_>) -> Result<(), SyntaxError> {
        let start = decl.span.start as usize;

        if let Some(declaration) = &decl.declaration {
            let mut names = Vec::new();
            declared_names(declaration, &mut names);
            if names.is_empty() {
                return Err(SyntaxError::new(start, "unsupported exported declaration"));
            }
            for name in names {
                self.add_export(name.clone(), name, start)?;
            }
            self.edit(start, declaration.span().start as usize, String::new());
            return Ok(());
        }

        let entries: Vec<(String, String, usize)> = decl
            .specifiers
            .iter()
            .map(|s| {
                (
                    export_name(&s.local),
                    export_name(&s.exported),
                    s.span.start as usize,
                )
            })
            .collect();

        if let Some(source) = &decl.source {
            let specifier = source.value.to_string();
            let tmp = self.temp_name(&specifier);
            for (local, exported, offset) in entries {
                self.add_export(exported, member(&tmp, &local), offset)?;
            }
            self.prologue
                .push(format!("var {tmp} = require({});", js_string(&specifier)));
            self.specifiers.push(specifier);
        } else {
            for (local, exported, offset) in entries {
                if !is_identifier(&local) {
                    return Err(SyntaxError::new(
                        offset,
                        "string export names need a `from` clause",
                    ));
                }
                self.add_export(exported, local, offset)?;
            }
        }
        self.remove_statement(decl.span);
        Ok(())
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration<'_>) -> Result<(), SyntaxError> {
        let start = decl.span.start as usize;
        let declaration = decl.declaration.span();
        let (name, is_declaration) = match &decl.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                (function.id.as_ref().map(|id| id.name.to_string()), true)
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                (class.id.as_ref().map(|id| id.name.to_string()), true)
            }
            _ => (None, false),
        };

        if let Some(name) = name {
            self.add_export("default".to_owned(), name, start)?;
            self.edit(start, declaration.start as usize, String::new());
            return Ok(());
        }

        self.claim_export_name("default", start)?;
        self.assigned_exports.insert("default".to_owned());
        self.edit(
            start,
            declaration.start as usize,
            "exports.default = ".to_owned(),
        );
        if is_declaration {
            // an anonymous declaration is now an expression statement
            let end = declaration.end as usize;
            self.edit(end, end, ";".to_owned());
        }
        Ok(())
    }

    /// `export * from "s"` and `export * as ns from "s"`
    fn export_all(&mut self, decl: &ExportAllDeclaration<'_>) -> Result<(), SyntaxError> {
        let specifier = decl.source.value.to_string();
        let tmp = self.temp_name(&specifier);
        let require = format!("var {tmp} = require({});", js_string(&specifier));

        let text = match &decl.exported {
            Some(name) => {
                self.add_export(export_name(name), tmp, decl.span.start as usize)?;
                require
            }
            None => format!(
                "{require} Object.keys({tmp}).forEach(function (key) {{ if (key === \"default\" || \
                 key === \"__esModule\" || Object.prototype.hasOwnProperty.call(exports, key)) \
                 return; Object.defineProperty(exports, key, {{ enumerable: true, get: function \
                 () {{ return {tmp}[key]; }} }}); }});"
            ),
        };

        self.specifiers.push(specifier);
        self.prologue.push(text);
        self.remove_statement(decl.span);
        Ok(())
    }

    fn add_export(&mut self, name: String, expr: String, offset: usize) -> Result<(), SyntaxError> {
        self.claim_export_name(&name, offset)?;
        self.exports.insert(name, expr);
        Ok(())
    }

    fn claim_export_name(&self, name: &str, offset: usize) -> Result<(), SyntaxError> {
        if self.exports.contains_key(name) || self.assigned_exports.contains(name) {
            return Err(SyntaxError::new(
                offset,
                format!("duplicate export of `{name}`"),
            ));
        }
        Ok(())
    }

    /// Babel-style temporary named after the specifier's file stem
    fn temp_name(&mut self, specifier: &str) -> String {
        let stem = specifier
            .rsplit('/')
            .next()
            .and_then(|segment| segment.split('.').next())
            .unwrap_or_default();
        let mut base: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '$' { c } else { '_' })
            .collect();
        if base.is_empty() {
            base.push_str("dep");
        }
        base.insert(0, '_');

        let mut candidate = base.clone();
        let mut n = 2;
        while self.temps.contains(&candidate) || mentions_identifier(self.src, &candidate) {
            candidate = format!("{base}{n}");
            n += 1;
        }
        self.temps.insert(candidate.clone());
        candidate
    }

    /// Drop a whole statement together with the line break that ends it
    fn remove_statement(&mut self, span: Span) {
        let start = span.start as usize;
        let mut end = span.end as usize;
        let rest = &self.src[end..];
        if rest.starts_with("\r\n") {
            end += 2;
        } else if rest.starts_with('\n') {
            end += 1;
        }
        self.edit(start, end, String::new());
    }

    fn edit(&mut self, start: usize, end: usize, text: String) {
        trace!("Edit {start}..{end}: {text:?}");
        self.edits.push(Edit { start, end, text });
    }

    fn finish(mut self, strict: bool) -> Rewrite {
        trace!(
            "Rewrote module: {} specifiers, {} edits, {} getters",
            self.specifiers.len(),
            self.edits.len(),
            self.exports.len()
        );
        self.edits.sort_by_key(|edit| (edit.start, edit.end));

        let mut out = String::with_capacity(self.src.len() + 96 * self.exports.len());
        if strict {
            out.push_str("\"use strict\";\n");
        }
        if !self.exports.is_empty() || !self.assigned_exports.is_empty() {
            out.push_str(ESMODULE_MARKER);
        }
        for (name, expr) in &self.exports {
            out.push_str("Object.defineProperty(exports, ");
            out.push_str(&js_string(name));
            out.push_str(", { enumerable: true, get: function () { return ");
            out.push_str(expr);
            out.push_str("; } });\n");
        }
        for line in &self.prologue {
            out.push_str(line);
            out.push('\n');
        }

        let mut cursor = 0;
        for edit in &self.edits {
            out.push_str(&self.src[cursor..edit.start]);
            out.push_str(&edit.text);
            cursor = edit.end;
        }
        out.push_str(&self.src[cursor..]);

        Rewrite {
            specifiers: self.specifiers,
            body: out,
        }
    }
}

/// Every name an exported declaration binds
fn declared_names(declaration: &Declaration<'_>, names: &mut Vec<String>) {
    match declaration {
        Declaration::VariableDeclaration(variables) => {
            for declarator in variables.declarations.iter() {
                binding_names(&declarator.id, names);
            }
        }
        Declaration::FunctionDeclaration(function) => {
            names.extend(function.id.iter().map(|id| id.name.to_string()));
        }
        Declaration::ClassDeclaration(class) => {
            names.extend(class.id.iter().map(|id| id.name.to_string()));
        }
        _ => {}
    }
}

fn binding_names(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPatternKind::ObjectPattern(object) => {
            for property in object.properties.iter() {
                binding_names(&property.value, names);
            }
            if let Some(rest) = &object.rest {
                binding_names(&rest.argument, names);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                binding_names(element, names);
            }
            if let Some(rest) = &array.rest {
                binding_names(&rest.argument, names);
            }
        }
        BindingPatternKind::AssignmentPattern(assignment) => {
            binding_names(&assignment.left, names);
        }
    }
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(literal) => literal.value.to_string(),
    }
}

/// Whether `name` appears in `src` as a whole word. Strings and comments
/// count too, so a generated name never collides with anything in the source.
fn mentions_identifier(src: &str, name: &str) -> bool {
    src.match_indices(name).any(|(at, _)| {
        let before = src[..at].chars().next_back();
        let after = src[at + name.len()..].chars().next();
        !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
    })
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(is_identifier_char)
}

/// `obj.name`, or `obj["name"]` when `name` is not a valid identifier
fn member(obj: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{obj}.{name}")
    } else {
        format!("{obj}[{}]", js_string(name))
    }
}

/// A double-quoted JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
