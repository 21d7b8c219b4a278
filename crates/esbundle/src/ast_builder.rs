//! AST builder module for creating parsed modules
//!
//! Analyzers, tests and benches use these factory functions instead of spelling
//! out the [`crate::ast`] structures by hand. The [`code`] template helper marks
//! module-scope references with a leading `#`: `code("#log(#bee)")` produces a
//! text fragment with two rewritable references. Use `##` for a literal `#`.

use crate::ast::{
    Code, Decl, DeclKind, DynamicImport, ExportDecl, ExportSpecifier, Fragment, ImportDecl,
    ImportSpecifier, ParsedModule, Stmt,
};

/// Build a [`Code`] value from a template where `#name` marks a reference
pub fn code(template: &str) -> Code {
    Code::default().then_code(template)
}

/// Build a [`Code`] value that is verbatim text
pub fn text(text: &str) -> Code {
    Code::default().then_text(text)
}

impl Code {
    /// Append verbatim text
    #[must_use]
    pub fn then_text(mut self, text: &str) -> Self {
        if text.is_empty() {
            return self;
        }
        if let Some(Fragment::Text(last)) = self.0.last_mut() {
            last.push_str(text);
        } else {
            self.0.push(Fragment::Text(text.to_owned()));
        }
        self
    }

    /// Append a reference to a module-scope binding
    #[must_use]
    pub fn then_ref(mut self, name: &str) -> Self {
        self.0.push(Fragment::Ref(name.to_owned()));
        self
    }

    /// Append a dynamic import expression
    #[must_use]
    pub fn then_dynamic(mut self, dynamic: DynamicImport) -> Self {
        self.0.push(Fragment::DynamicImport(dynamic));
        self
    }

    /// Append a `#name` template
    #[must_use]
    pub fn then_code(mut self, template: &str) -> Self {
        let mut chars = template.chars().peekable();
        let mut pending = String::new();

        while let Some(c) = chars.next() {
            if c != '#' {
                pending.push(c);
                continue;
            }
            if chars.peek() == Some(&'#') {
                chars.next();
                pending.push('#');
                continue;
            }

            let mut name = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' || next == '$' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }

            if name.is_empty() {
                pending.push('#');
            } else {
                self = self.then_text(&pending).then_ref(&name);
                pending.clear();
            }
        }

        self.then_text(&pending)
    }
}

/// Start a dynamic `import('specifier')` expression
pub fn dynamic_import(specifier: &str) -> DynamicImport {
    DynamicImport {
        specifier: specifier.to_owned(),
        continuation: Vec::new(),
    }
}

impl DynamicImport {
    /// Chain a member call onto the import, e.g. `then((m) => m.x)`
    #[must_use]
    pub fn chain(mut self, step: Code) -> Self {
        self.continuation.push(step);
        self
    }
}

/// Builder for static import declarations
#[derive(Debug, Clone)]
pub struct ImportBuilder {
    decl: ImportDecl,
}

/// Start an import declaration: `import ... from 'specifier'`
pub fn import(specifier: &str) -> ImportBuilder {
    ImportBuilder {
        decl: ImportDecl {
            specifier: specifier.to_owned(),
            ..ImportDecl::default()
        },
    }
}

impl ImportBuilder {
    /// `import local from ...`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn default(mut self, local: &str) -> Self {
        self.decl.default = Some(local.to_owned());
        self
    }

    /// `import * as local from ...`
    #[must_use]
    pub fn namespace(mut self, local: &str) -> Self {
        self.decl.namespace = Some(local.to_owned());
        self
    }

    /// `import { name } from ...`
    #[must_use]
    pub fn named(self, name: &str) -> Self {
        self.named_as(name, name)
    }

    /// `import { imported as local } from ...`
    #[must_use]
    pub fn named_as(mut self, imported: &str, local: &str) -> Self {
        self.decl.named.push(ImportSpecifier {
            imported: imported.to_owned(),
            local: local.to_owned(),
        });
        self
    }

    pub fn build(self) -> Stmt {
        Stmt::Import(self.decl)
    }
}

fn declaration(kind: DeclKind, name: &str, init: Code) -> Decl {
    Decl {
        kind,
        name: name.to_owned(),
        init,
    }
}

/// `const name = <init>;`
pub fn const_decl(name: &str, init: Code) -> Decl {
    declaration(DeclKind::Const, name, init)
}

/// `let name = <init>;`
pub fn let_decl(name: &str, init: Code) -> Decl {
    declaration(DeclKind::Let, name, init)
}

/// `var name = <init>;`
pub fn var_decl(name: &str, init: Code) -> Decl {
    declaration(DeclKind::Var, name, init)
}

/// `function name<init>` where `init` is the parameter list and body
pub fn function_decl(name: &str, init: Code) -> Decl {
    declaration(DeclKind::Function, name, init)
}

/// `async function name<init>`
pub fn async_function_decl(name: &str, init: Code) -> Decl {
    declaration(DeclKind::AsyncFunction, name, init)
}

/// `class name <init>` where `init` is the optional heritage and body
pub fn class_decl(name: &str, init: Code) -> Decl {
    declaration(DeclKind::Class, name, init)
}

/// Plain top-level declaration statement
pub fn decl(decl: Decl) -> Stmt {
    Stmt::Decl(decl)
}

/// Expression (or any other non-declaration) statement
pub fn expr(code: Code) -> Stmt {
    Stmt::Expr(code)
}

/// `export <declaration>`
pub fn export_decl(decl: Decl) -> Stmt {
    Stmt::Export(ExportDecl::Decl(decl))
}

/// `export default <expression>`
pub fn export_default(code: Code) -> Stmt {
    Stmt::Export(ExportDecl::Default(code))
}

/// `export default <named declaration>`
pub fn export_default_decl(decl: Decl) -> Stmt {
    Stmt::Export(ExportDecl::DefaultDecl(decl))
}

fn export_specifiers(names: &[(&str, &str)]) -> Vec<ExportSpecifier> {
    names
        .iter()
        .map(|(local, exported)| ExportSpecifier {
            local: (*local).to_owned(),
            exported: (*exported).to_owned(),
        })
        .collect()
}

/// `export { local as exported, ... }`
pub fn export_named(names: &[(&str, &str)]) -> Stmt {
    Stmt::Export(ExportDecl::Named(export_specifiers(names)))
}

/// `export { imported as exported, ... } from 'specifier'`
pub fn export_from(specifier: &str, names: &[(&str, &str)]) -> Stmt {
    Stmt::Export(ExportDecl::From {
        specifier: specifier.to_owned(),
        names: export_specifiers(names),
    })
}

impl ParsedModule {
    /// Record names bound in nested scopes
    #[must_use]
    pub fn with_nested_bindings<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.nested_bindings
            .extend(names.into_iter().map(str::to_owned));
        self
    }
}
