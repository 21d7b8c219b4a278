//! Text emission of a linked bundle

use super::linker::{Linker, SourceImports};
use crate::ast::{Code, Decl, DeclKind, DynamicImport, ExportDecl, Fragment, Stmt};

impl Linker<'_> {
    /// Final text: imports, member bodies with their namespace objects, exports
    pub(super) fn render(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        let imports: Vec<String> = self
            .sources
            .iter()
            .flat_map(|(source, imports)| {
                render_imports(&self.bundle.url.relative_specifier(source), imports)
            })
            .collect();
        if !imports.is_empty() {
            sections.push(imports.join("\n"));
        }

        for (i, document) in self.members.iter().enumerate() {
            let statements: Vec<String> = document
                .module
                .body
                .iter()
                .filter_map(|stmt| self.render_statement(i, stmt))
                .collect();
            if !statements.is_empty() {
                sections.push(statements.join("\n"));
            }
            if let Some(namespace) = &self.namespace_locals[i] {
                sections.push(render_namespace(namespace, &self.namespace_entries[i]));
            }
        }

        if !self.export_entries.is_empty() {
            let specifiers: Vec<String> = self
                .export_entries
                .iter()
                .map(|(local, external)| alias_clause(local, external))
                .collect();
            sections.push(format!("export {{ {} }};", specifiers.join(", ")));
        }

        let mut content = sections.join("\n\n");
        if !content.is_empty() {
            content.push('\n');
        }
        content
    }

    fn render_statement(&self, i: usize, stmt: &Stmt) -> Option<String> {
        match stmt {
            Stmt::Import(_) | Stmt::Export(ExportDecl::Named(_) | ExportDecl::From { .. }) => None,
            Stmt::Decl(decl)
            | Stmt::Export(ExportDecl::Decl(decl) | ExportDecl::DefaultDecl(decl)) => {
                Some(self.render_decl(i, decl))
            }
            Stmt::Export(ExportDecl::Default(code)) => {
                let value = self.render_code(i, code);
                Some(match &self.default_locals[i] {
                    Some(local) => format!("var {local} = {value};"),
                    None => format!("{value};"),
                })
            }
            Stmt::Expr(code) => Some(self.render_code(i, code)),
        }
    }

    fn render_decl(&self, i: usize, decl: &Decl) -> String {
        let name = self.reference(i, &decl.name);
        let init = self.render_code(i, &decl.init);
        match decl.kind {
            DeclKind::Var | DeclKind::Let | DeclKind::Const => {
                let keyword = match decl.kind {
                    DeclKind::Let => "let",
                    DeclKind::Const => "const",
                    _ => "var",
                };
                if init.is_empty() {
                    format!("{keyword} {name};")
                } else {
                    format!("{keyword} {name} = {init};")
                }
            }
            DeclKind::Function => format!("function {name}{init}"),
            DeclKind::AsyncFunction => format!("async function {name}{init}"),
            DeclKind::Class if init.is_empty() => format!("class {name} {{}}"),
            DeclKind::Class => format!("class {name} {init}"),
        }
    }

    fn render_code(&self, i: usize, code: &Code) -> String {
        let mut out = String::new();
        for fragment in code.fragments() {
            match fragment {
                Fragment::Text(text) => out.push_str(text),
                Fragment::Ref(name) => out.push_str(self.reference(i, name)),
                Fragment::DynamicImport(dynamic) => self.render_dynamic(i, dynamic, &mut out),
            }
        }
        out
    }

    fn render_dynamic(&self, i: usize, dynamic: &DynamicImport, out: &mut String) {
        match self.dynamic_targets[i].get(&dynamic.specifier) {
            Some(target) => {
                out.push_str(&format!("import('{}')", target.specifier));
                if let Some(name) = &target.projection {
                    out.push_str(&format!(".then(({{ {name} }}) => {name})"));
                }
            }
            None => out.push_str(&format!("import('{}')", dynamic.specifier)),
        }
        for step in &dynamic.continuation {
            out.push('.');
            out.push_str(&self.render_code(i, step));
        }
    }
}

/// Import declarations for one source, usually a single line
fn render_imports(specifier: &str, imports: &SourceImports) -> Vec<String> {
    if imports.is_empty() {
        return vec![format!("import '{specifier}';")];
    }

    let named: Vec<String> = imports
        .named
        .iter()
        .map(|(imported, local)| alias_clause(imported, local))
        .collect();
    let named = (!named.is_empty()).then(|| format!("{{ {} }}", named.join(", ")));
    let namespace = imports.namespace.as_ref().map(|local| format!("* as {local}"));

    // A namespace import cannot share a declaration with named imports.
    let clauses: Vec<Vec<String>> = match (namespace, named) {
        (Some(namespace), Some(named)) => vec![
            imports.default.iter().cloned().chain([namespace]).collect(),
            vec![named],
        ],
        (namespace, named) => vec![
            imports
                .default
                .iter()
                .cloned()
                .chain(namespace)
                .chain(named)
                .collect(),
        ],
    };

    clauses
        .into_iter()
        .map(|clause| format!("import {} from '{specifier}';", clause.join(", ")))
        .collect()
}

fn render_namespace(local: &str, entries: &[(String, String)]) -> String {
    if entries.is_empty() {
        return format!("var {local} = {{}};");
    }
    let properties: Vec<String> = entries
        .iter()
        .map(|(name, value)| format!("  {}: {value}", property_key(name)))
        .collect();
    format!("var {local} = {{\n{}\n}};", properties.join(",\n"))
}

/// `name` or `name as alias`
fn alias_clause(name: &str, alias: &str) -> String {
    if name == alias {
        name.to_owned()
    } else {
        format!("{name} as {alias}")
    }
}

fn property_key(name: &str) -> String {
    let is_identifier = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        name.to_owned()
    } else {
        format!("'{}'", name.replace('\'', "\\'"))
    }
}
