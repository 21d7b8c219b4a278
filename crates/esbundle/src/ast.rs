//! Parsed ES module model
//!
//! This is the shape in which the external analyzer hands documents to the
//! bundler. It is deliberately coarse: top-level declarations and import/export
//! declarations are structured, while everything else is kept as [`Code`], a
//! sequence of verbatim text interleaved with the two things the linker must be
//! able to rewrite:
//!
//! - references to module-scope bindings ([`Fragment::Ref`]), which may be renamed
//!   when documents are merged, and
//! - dynamic `import()` expressions ([`Fragment::DynamicImport`]), whose specifier
//!   is re-targeted and whose promise chain gains a projection step.

use crate::types::{EdgeKind, FxIndexMap, FxIndexSet};

/// One source document as reported by the analyzer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedModule {
    /// Top-level statements in source order
    pub body: Vec<Stmt>,
    /// Names bound in nested scopes (parameters, block locals)
    ///
    /// Generated or renamed module-scope bindings never take one of these names,
    /// so they cannot be shadowed inside a function body.
    pub nested_bindings: FxIndexSet<String>,
}

/// Top-level statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Import(ImportDecl),
    Export(ExportDecl),
    Decl(Decl),
    /// Any other statement, rendered verbatim apart from its fragments
    Expr(Code),
}

/// `import d, * as ns, { a as b } from 'specifier'`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportDecl {
    pub specifier: String,
    pub default: Option<String>,
    pub namespace: Option<String>,
    pub named: Vec<ImportSpecifier>,
}

/// `imported as local` inside an import declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    pub imported: String,
    pub local: String,
}

/// One local name introduced by an import declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportBinding<'a> {
    Default { local: &'a str },
    Namespace { local: &'a str },
    Named { imported: &'a str, local: &'a str },
}

impl<'a> ImportBinding<'a> {
    pub const fn local(&self) -> &'a str {
        match *self {
            Self::Default { local } | Self::Namespace { local } | Self::Named { local, .. } => {
                local
            }
        }
    }
}

impl ImportDecl {
    /// Local bindings in declaration order: default, namespace, then named
    pub fn bindings(&self) -> Vec<ImportBinding<'_>> {
        let mut bindings = Vec::new();
        if let Some(local) = &self.default {
            bindings.push(ImportBinding::Default {
                local: local.as_str(),
            });
        }
        if let Some(local) = &self.namespace {
            bindings.push(ImportBinding::Namespace {
                local: local.as_str(),
            });
        }
        for spec in &self.named {
            if spec.imported == "default" {
                bindings.push(ImportBinding::Default { local: &spec.local });
            } else {
                bindings.push(ImportBinding::Named {
                    imported: &spec.imported,
                    local: &spec.local,
                });
            }
        }
        bindings
    }

    /// `import './x.js'` imports nothing and only runs the target
    pub fn is_side_effect_only(&self) -> bool {
        self.default.is_none() && self.namespace.is_none() && self.named.is_empty()
    }
}

/// Export declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportDecl {
    /// `export const x = ...`, `export function f() {}`
    Decl(Decl),
    /// `export default <expression>`
    Default(Code),
    /// `export default function f() {}`: the declaration keeps its own name
    DefaultDecl(Decl),
    /// `export { a, b as c }`
    Named(Vec<ExportSpecifier>),
    /// `export { a as b } from 'specifier'`
    From {
        specifier: String,
        names: Vec<ExportSpecifier>,
    },
}

/// `local as exported` inside an export list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSpecifier {
    pub local: String,
    pub exported: String,
}

/// Where an exported name gets its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportBinding {
    /// A top-level binding of the module, declared or imported
    Local(String),
    /// The value of `export default <expression>`
    DefaultExpression,
    /// Another module's export, passed through unchanged
    Reexport { specifier: String, imported: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
    Function,
    AsyncFunction,
    Class,
}

/// A named top-level declaration
///
/// `init` holds everything after the name: the initializer of a variable, or the
/// parameter list and body of a function, or the body of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub kind: DeclKind,
    pub name: String,
    pub init: Code,
}

/// Source text with rewritable holes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Code(pub Vec<Fragment>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    /// Reference to a module-scope binding (declared, imported or global)
    Ref(String),
    DynamicImport(DynamicImport),
}

/// `import('specifier')` followed by zero or more chained calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicImport {
    pub specifier: String,
    /// Chained member calls, each rendered as `.<code>`, e.g. `then(m => m.x)`
    pub continuation: Vec<Code>,
}

/// Outgoing edge of a document as declared in its source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub specifier: String,
    pub kind: EdgeKind,
}

impl Code {
    pub fn fragments(&self) -> &[Fragment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Visit every fragment, descending into dynamic-import continuations
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Fragment)) {
        for fragment in &self.0 {
            visit(fragment);
            if let Fragment::DynamicImport(dynamic) = fragment {
                for step in &dynamic.continuation {
                    step.walk(visit);
                }
            }
        }
    }
}

impl Stmt {
    /// Code fragments owned by this statement
    fn code(&self) -> Option<&Code> {
        match self {
            Self::Decl(decl)
            | Self::Export(ExportDecl::Decl(decl) | ExportDecl::DefaultDecl(decl)) => {
                Some(&decl.init)
            }
            Self::Export(ExportDecl::Default(code)) | Self::Expr(code) => Some(code),
            Self::Import(_) | Self::Export(ExportDecl::Named(_) | ExportDecl::From { .. }) => None,
        }
    }

    /// The top-level declaration introduced by this statement, if any
    pub fn declaration(&self) -> Option<&Decl> {
        match self {
            Self::Decl(decl)
            | Self::Export(ExportDecl::Decl(decl) | ExportDecl::DefaultDecl(decl)) => Some(decl),
            _ => None,
        }
    }
}

impl ParsedModule {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            body,
            nested_bindings: FxIndexSet::default(),
        }
    }

    /// Static import declarations in source order
    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::Import(import) => Some(import),
            _ => None,
        })
    }

    /// Names declared at module scope, in source order
    pub fn declared_names(&self) -> Vec<&str> {
        self.body
            .iter()
            .filter_map(Stmt::declaration)
            .map(|decl| decl.name.as_str())
            .collect()
    }

    /// Exported names mapped to where their value comes from
    ///
    /// `default` is a regular key here; it is present when the module has a
    /// default export in any form.
    pub fn exports(&self) -> FxIndexMap<String, ExportBinding> {
        let mut exports = FxIndexMap::default();
        for stmt in &self.body {
            let Stmt::Export(export) = stmt else {
                continue;
            };
            match export {
                ExportDecl::Decl(decl) => {
                    exports.insert(decl.name.clone(), ExportBinding::Local(decl.name.clone()));
                }
                ExportDecl::Default(_) => {
                    exports.insert("default".to_owned(), ExportBinding::DefaultExpression);
                }
                ExportDecl::DefaultDecl(decl) => {
                    exports.insert("default".to_owned(), ExportBinding::Local(decl.name.clone()));
                }
                ExportDecl::Named(specs) => {
                    for spec in specs {
                        exports.insert(
                            spec.exported.clone(),
                            ExportBinding::Local(spec.local.clone()),
                        );
                    }
                }
                ExportDecl::From { specifier, names } => {
                    for spec in names {
                        exports.insert(
                            spec.exported.clone(),
                            ExportBinding::Reexport {
                                specifier: specifier.clone(),
                                imported: spec.local.clone(),
                            },
                        );
                    }
                }
            }
        }
        exports
    }

    pub fn has_default_export(&self) -> bool {
        self.exports().contains_key("default")
    }

    /// Every name this module references through a [`Fragment::Ref`]
    pub fn referenced_names(&self) -> FxIndexSet<&str> {
        let mut names = FxIndexSet::default();
        for code in self.body.iter().filter_map(Stmt::code) {
            code.walk(&mut |fragment| {
                if let Fragment::Ref(name) = fragment {
                    names.insert(name.as_str());
                }
            });
        }
        names
    }

    /// Dynamic imports anywhere in the module, in source order
    pub fn dynamic_imports(&self) -> Vec<&DynamicImport> {
        let mut imports = Vec::new();
        for code in self.body.iter().filter_map(Stmt::code) {
            code.walk(&mut |fragment| {
                if let Fragment::DynamicImport(dynamic) = fragment {
                    imports.push(dynamic);
                }
            });
        }
        imports
    }

    /// Outgoing edges in source order, each (specifier, kind) pair listed once
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut deps: FxIndexSet<Dependency> = FxIndexSet::default();
        for stmt in &self.body {
            match stmt {
                Stmt::Import(import) => {
                    deps.insert(Dependency {
                        specifier: import.specifier.clone(),
                        kind: EdgeKind::Eager,
                    });
                }
                Stmt::Export(ExportDecl::From { specifier, .. }) => {
                    deps.insert(Dependency {
                        specifier: specifier.clone(),
                        kind: EdgeKind::Eager,
                    });
                }
                _ => {}
            }
            if let Some(code) = stmt.code() {
                code.walk(&mut |fragment| {
                    if let Fragment::DynamicImport(dynamic) = fragment {
                        deps.insert(Dependency {
                            specifier: dynamic.specifier.clone(),
                            kind: EdgeKind::Lazy,
                        });
                    }
                });
            }
        }
        deps.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_builder::{code, const_decl, dynamic_import, export_default, import};

    #[test]
    fn test_exports_cover_all_forms() {
        let module = ParsedModule::new(vec![
            import("./c.js").default("sea").build(),
            Stmt::Export(ExportDecl::Decl(const_decl("honey", code("'🍯'")))),
            export_default(code("#bee = '🐝'")),
            Stmt::Export(ExportDecl::Named(vec![ExportSpecifier {
                local: "sea".into(),
                exported: "ocean".into(),
            }])),
            Stmt::Export(ExportDecl::From {
                specifier: "./d.js".into(),
                names: vec![ExportSpecifier {
                    local: "deer".into(),
                    exported: "deer".into(),
                }],
            }),
        ]);

        let exports = module.exports();
        let names: Vec<&str> = exports.keys().map(String::as_str).collect();
        assert_eq!(names, ["honey", "default", "ocean", "deer"]);
        assert_eq!(exports["ocean"], ExportBinding::Local("sea".into()));
        assert_eq!(
            exports["deer"],
            ExportBinding::Reexport {
                specifier: "./d.js".into(),
                imported: "deer".into(),
            }
        );
        assert!(module.has_default_export());
    }

    #[test]
    fn test_dependencies_distinguish_eager_and_lazy() {
        let module = ParsedModule::new(vec![
            import("./b.js").default("bee").build(),
            import("./b.js").named("honey").build(),
            Stmt::Expr(
                code("")
                    .then_dynamic(dynamic_import("./c.js").chain(code("then((c) => c.sea)")))
                    .then_text(";"),
            ),
        ]);

        assert_eq!(
            module.dependencies(),
            vec![
                Dependency {
                    specifier: "./b.js".into(),
                    kind: EdgeKind::Eager,
                },
                Dependency {
                    specifier: "./c.js".into(),
                    kind: EdgeKind::Lazy,
                },
            ]
        );
    }

    #[test]
    fn test_referenced_names_include_continuations() {
        let module = ParsedModule::new(vec![Stmt::Expr(
            code("#log(")
                .then_dynamic(dynamic_import("./b.js").chain(code("then(#project)")))
                .then_text(");"),
        )]);
        let names: Vec<&str> = module.referenced_names().into_iter().collect();
        assert_eq!(names, ["log", "project"]);
    }
}
