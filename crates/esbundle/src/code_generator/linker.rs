//! Binding resolution for one bundle
//!
//! The linker runs in two phases. First it claims the module-scope names of all
//! members in one [`NameScope`]: names that refer to globals and names bound in
//! nested scopes are reserved, then declared names are claimed in merge order,
//! then the generated default and namespace locals. Second it resolves every
//! import binding, re-export and dynamic import to the name it has in the
//! merged output, adding cross-bundle imports on the way.

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{
    export_table::{ExportKey, ExportTable, has_namespace},
    renamer::NameScope,
};
use crate::{
    ast::{ExportBinding, ExportDecl, ImportBinding, Stmt},
    bundle_manifest::{Bundle, BundleManifest},
    document_graph::{Document, DocumentGraph, EdgeTarget},
    error::{BundleError, Result},
    types::FxIndexMap,
    url::{DocumentUrl, make_legal_identifier},
};

/// What an import asks of its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request<'r> {
    Default,
    Namespace,
    Named(&'r str),
}

impl<'r> Request<'r> {
    const fn from_binding(binding: ImportBinding<'r>) -> Self {
        match binding {
            ImportBinding::Default { .. } => Self::Default,
            ImportBinding::Namespace { .. } => Self::Namespace,
            ImportBinding::Named { imported, .. } => Self::Named(imported),
        }
    }

    fn from_export_name(name: &'r str) -> Self {
        if name == "default" {
            Self::Default
        } else {
            Self::Named(name)
        }
    }

    const fn binding_name(self) -> &'r str {
        match self {
            Self::Default => "default",
            Self::Namespace => "*",
            Self::Named(name) => name,
        }
    }

    fn export_key(self) -> ExportKey {
        match self {
            Self::Default => ExportKey::Default,
            Self::Namespace => ExportKey::Namespace,
            Self::Named(name) => ExportKey::Named(name.to_owned()),
        }
    }
}

/// Merged imports from one source: another bundle or an excluded document
#[derive(Debug, Default)]
pub(super) struct SourceImports {
    pub(super) default: Option<String>,
    pub(super) namespace: Option<String>,
    /// Imported name to local name
    pub(super) named: FxIndexMap<String, String>,
}

impl SourceImports {
    pub(super) fn is_empty(&self) -> bool {
        self.default.is_none() && self.namespace.is_none() && self.named.is_empty()
    }
}

/// Rewritten form of one dynamic import
#[derive(Debug, Clone)]
pub(super) struct DynamicTarget {
    pub(super) specifier: String,
    /// External name of the target's namespace object in its bundle
    pub(super) projection: Option<String>,
}

#[derive(Debug)]
pub(super) struct Linker<'a> {
    pub(super) bundle: &'a Bundle,
    graph: &'a DocumentGraph,
    manifest: &'a BundleManifest,
    /// Members in merge order
    pub(super) members: Vec<&'a Document>,
    member_index: FxHashMap<&'a DocumentUrl, usize>,
    exports: Vec<FxIndexMap<String, ExportBinding>>,
    scope: NameScope,
    /// Declared name to final name, per member
    declared: Vec<FxHashMap<String, String>>,
    /// Final name of an `export default <expression>` value, per member
    pub(super) default_locals: Vec<Option<String>>,
    pub(super) namespace_locals: Vec<Option<String>>,
    /// Import local to final name, per member
    import_locals: Vec<FxHashMap<String, String>>,
    /// Exports whose resolution is in progress
    resolving: FxHashSet<(usize, String)>,
    tables: FxHashMap<DocumentUrl, ExportTable>,
    pub(super) sources: FxIndexMap<DocumentUrl, SourceImports>,
    /// Dynamic import specifier to its rewrite, per member
    pub(super) dynamic_targets: Vec<FxHashMap<String, DynamicTarget>>,
    /// (exported name, final local) pairs of each namespace object
    pub(super) namespace_entries: Vec<Vec<(String, String)>>,
    /// (final local, external name) pairs of the aggregated export
    pub(super) export_entries: Vec<(String, String)>,
}

impl<'a> Linker<'a> {
    pub(super) fn new(
        bundle: &'a Bundle,
        graph: &'a DocumentGraph,
        manifest: &'a BundleManifest,
    ) -> Result<Self> {
        let members: Vec<&'a Document> = bundle
            .members()
            .iter()
            .map(|url| {
                graph.document(url).ok_or_else(|| {
                    BundleError::invariant(format!(
                        "member {url} of bundle {} was never loaded",
                        bundle.url
                    ))
                })
            })
            .collect::<Result<_>>()?;

        let member_index = members
            .iter()
            .enumerate()
            .map(|(i, document)| (&document.url, i))
            .collect();
        let exports = members
            .iter()
            .map(|document| document.module.exports())
            .collect();
        let count = members.len();

        Ok(Self {
            bundle,
            graph,
            manifest,
            members,
            member_index,
            exports,
            scope: NameScope::new(),
            declared: vec![FxHashMap::default(); count],
            default_locals: vec![None; count],
            namespace_locals: vec![None; count],
            import_locals: vec![FxHashMap::default(); count],
            resolving: FxHashSet::default(),
            tables: FxHashMap::default(),
            sources: FxIndexMap::default(),
            dynamic_targets: vec![FxHashMap::default(); count],
            namespace_entries: vec![Vec::new(); count],
            export_entries: Vec::new(),
        })
    }

    /// Resolve every binding of the bundle
    pub(super) fn link(&mut self) -> Result<()> {
        self.claim_names();
        for i in 0..self.members.len() {
            self.link_member(i)?;
        }
        for i in 0..self.members.len() {
            self.collect_namespace(i)?;
        }
        self.collect_exports()?;

        debug!(
            "Linked {} member(s) of {}: {} import source(s), {} export(s)",
            self.members.len(),
            self.bundle.url,
            self.sources.len(),
            self.export_entries.len()
        );
        Ok(())
    }

    /// Final name of a module-scope reference in member `i`
    pub(super) fn reference<'n>(&'n self, i: usize, name: &'n str) -> &'n str {
        self.declared[i]
            .get(name)
            .or_else(|| self.import_locals[i].get(name))
            .map_or(name, String::as_str)
    }

    fn claim_names(&mut self) {
        for document in &self.members {
            let module = &document.module;
            let mut locals: FxHashSet<&str> = module.declared_names().into_iter().collect();
            for import in module.imports() {
                locals.extend(import.bindings().iter().map(ImportBinding::local));
            }
            for name in module.referenced_names() {
                if !locals.contains(name) {
                    self.scope.reserve(name);
                }
            }
            for name in &module.nested_bindings {
                self.scope.reserve(name);
            }
        }

        for (i, document) in self.members.iter().enumerate() {
            for name in document.module.declared_names() {
                if self.declared[i].contains_key(name) {
                    continue;
                }
                let renamed = self.scope.claim(name);
                if renamed != name {
                    trace!("{}: '{name}' becomes '{renamed}'", document.url);
                }
                self.declared[i].insert(name.to_owned(), renamed);
            }
        }

        for (i, document) in self.members.iter().enumerate() {
            let stem = make_legal_identifier(document.url.stem());
            // A later `export { x as default }` may shadow the expression in the
            // export map, but the expression statement is still emitted.
            if document
                .module
                .body
                .iter()
                .any(|stmt| matches!(stmt, Stmt::Export(ExportDecl::Default(_))))
            {
                self.default_locals[i] = Some(self.scope.claim(&stem));
            }
            if has_namespace(self.graph, document) {
                self.namespace_locals[i] = Some(self.scope.claim(&stem));
            }
        }
    }

    fn link_member(&mut self, i: usize) -> Result<()> {
        let document = self.members[i];

        for edge in document.edges().iter().filter(|edge| edge.kind.is_eager()) {
            self.touch_source(&edge.target)?;
        }

        for import in document.module.imports() {
            for binding in import.bindings() {
                self.import_local(i, binding.local())?;
            }
        }

        for dynamic in document.module.dynamic_imports() {
            if self.dynamic_targets[i].contains_key(&dynamic.specifier) {
                continue;
            }
            let target = Self::edge_target(document, &dynamic.specifier)?;
            let rewritten = self.dynamic_target(document, target)?;
            self.dynamic_targets[i].insert(dynamic.specifier.clone(), rewritten);
        }

        Ok(())
    }

    fn edge_target(document: &'a Document, specifier: &str) -> Result<&'a EdgeTarget> {
        document
            .resolve(specifier)
            .ok_or_else(|| BundleError::unresolved(specifier, &document.url))
    }

    fn bundle_url_for(&self, url: &DocumentUrl) -> Result<&'a DocumentUrl> {
        let manifest = self.manifest;
        manifest.bundle_url_for(url).ok_or_else(|| {
            BundleError::invariant(format!("{url} is not assigned to any bundle"))
        })
    }

    /// Make sure the source behind an eager edge is imported, even for side effects only
    fn touch_source(&mut self, target: &EdgeTarget) -> Result<()> {
        let source = match target {
            EdgeTarget::External(url) => url,
            EdgeTarget::Document(url) => {
                let bundle_url = self.bundle_url_for(url)?;
                if *bundle_url == self.bundle.url {
                    return Ok(());
                }
                bundle_url
            }
        };
        self.sources.entry(source.clone()).or_default();
        Ok(())
    }

    fn import_local(&mut self, i: usize, local: &str) -> Result<String> {
        if let Some(resolved) = self.import_locals[i].get(local) {
            return Ok(resolved.clone());
        }

        let document = self.members[i];
        let found = document.module.imports().find_map(|import| {
            import
                .bindings()
                .into_iter()
                .find(|binding| binding.local() == local)
                .map(|binding| (import.specifier.as_str(), Request::from_binding(binding)))
        });
        let Some((specifier, request)) = found else {
            return Err(BundleError::missing_export(local, &document.url, &document.url));
        };

        let resolved = self.resolve_import(i, specifier, request, local)?;
        if resolved != local {
            trace!("{}: import '{local}' resolves to '{resolved}'", document.url);
        }
        self.import_locals[i].insert(local.to_owned(), resolved.clone());
        Ok(resolved)
    }

    /// Final name of what `specifier`, written in member `i`, provides for `request`
    ///
    /// `hint` names a new local when the value has to be imported.
    fn resolve_import(
        &mut self,
        i: usize,
        specifier: &str,
        request: Request<'_>,
        hint: &str,
    ) -> Result<String> {
        let document = self.members[i];
        let target = match Self::edge_target(document, specifier)? {
            EdgeTarget::External(url) => return Ok(self.import_external(url, request, hint)),
            EdgeTarget::Document(target) => target,
        };

        let bundle_url = self.bundle_url_for(target)?;
        if *bundle_url != self.bundle.url {
            let external = self
                .external_name(target, &request.export_key())
                .ok_or_else(|| {
                    BundleError::missing_export(request.binding_name(), &document.url, target)
                })?;
            return Ok(self.import_from_bundle(bundle_url, external, hint));
        }

        let j = self.member_index.get(target).copied().ok_or_else(|| {
            BundleError::invariant(format!(
                "{target} is assigned to {} but not one of its members",
                self.bundle.url
            ))
        })?;
        match request {
            Request::Namespace => self.namespace_locals[j]
                .clone()
                .ok_or_else(|| BundleError::missing_export("*", &document.url, target)),
            Request::Default => self.resolve_export(j, "default", &document.url),
            Request::Named(name) => self.resolve_export(j, name, &document.url),
        }
    }

    /// Final name of export `name` of member `j`
    fn resolve_export(&mut self, j: usize, name: &str, importer: &DocumentUrl) -> Result<String> {
        let exporter = self.members[j];
        let Some(binding) = self.exports[j].get(name).cloned() else {
            return Err(BundleError::missing_export(name, importer, &exporter.url));
        };

        let key = (j, name.to_owned());
        if !self.resolving.insert(key.clone()) {
            return Err(BundleError::CircularReexport {
                binding: name.to_owned(),
                exporter: exporter.url.clone(),
            });
        }

        let resolved = match &binding {
            ExportBinding::Local(local) => self.resolve_local(j, local),
            ExportBinding::DefaultExpression => self.default_locals[j]
                .clone()
                .ok_or_else(|| BundleError::missing_export("default", importer, &exporter.url)),
            ExportBinding::Reexport {
                specifier,
                imported,
            } => self.resolve_import(j, specifier, Request::from_export_name(imported), name),
        };

        self.resolving.remove(&key);
        resolved
    }

    fn resolve_local(&mut self, j: usize, local: &str) -> Result<String> {
        if let Some(renamed) = self.declared[j].get(local) {
            return Ok(renamed.clone());
        }
        let document = self.members[j];
        let imported = document.module.imports().any(|import| {
            import
                .bindings()
                .iter()
                .any(|binding| binding.local() == local)
        });
        if imported {
            self.import_local(j, local)
        } else {
            Err(BundleError::missing_export(local, &document.url, &document.url))
        }
    }

    fn import_from_bundle(&mut self, bundle_url: &DocumentUrl, external: String, hint: &str) -> String {
        let imports = self.sources.entry(bundle_url.clone()).or_default();
        if let Some(local) = imports.named.get(&external) {
            return local.clone();
        }
        let local = self.scope.claim(hint);
        imports.named.insert(external, local.clone());
        local
    }

    fn import_external(&mut self, url: &DocumentUrl, request: Request<'_>, hint: &str) -> String {
        let imports = self.sources.entry(url.clone()).or_default();
        let slot = match request {
            Request::Default => &mut imports.default,
            Request::Namespace => &mut imports.namespace,
            Request::Named(name) => {
                if let Some(local) = imports.named.get(name) {
                    return local.clone();
                }
                let local = self.scope.claim(hint);
                imports.named.insert(name.to_owned(), local.clone());
                return local;
            }
        };
        slot.get_or_insert_with(|| self.scope.claim(hint)).clone()
    }

    /// External name of `key` of `target` in the bundle `target` lives in
    fn external_name(&mut self, target: &DocumentUrl, key: &ExportKey) -> Option<String> {
        let manifest = self.manifest;
        let graph = self.graph;
        let bundle = manifest.bundle_for(target)?;
        self.tables
            .entry(bundle.url.clone())
            .or_insert_with(|| ExportTable::for_bundle(bundle, graph))
            .external_name(target, key)
            .map(str::to_owned)
    }

    fn dynamic_target(&mut self, document: &Document, target: &EdgeTarget) -> Result<DynamicTarget> {
        match target {
            EdgeTarget::External(url) => Ok(DynamicTarget {
                specifier: self.bundle.url.relative_specifier(url),
                projection: None,
            }),
            EdgeTarget::Document(url) => {
                let bundle_url = self.bundle_url_for(url)?;
                let projection = self
                    .external_name(url, &ExportKey::Namespace)
                    .ok_or_else(|| BundleError::missing_export("*", &document.url, url))?;
                Ok(DynamicTarget {
                    specifier: self.bundle.url.relative_specifier(bundle_url),
                    projection: Some(projection),
                })
            }
        }
    }

    fn collect_namespace(&mut self, i: usize) -> Result<()> {
        if self.namespace_locals[i].is_none() {
            return Ok(());
        }
        let document = self.members[i];
        let names: Vec<String> = self.exports[i].keys().cloned().collect();
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let local = self.resolve_export(i, &name, &document.url)?;
            entries.push((name, local));
        }
        self.namespace_entries[i] = entries;
        Ok(())
    }

    fn collect_exports(&mut self) -> Result<()> {
        let table = ExportTable::for_bundle(self.bundle, self.graph);
        for (url, key, external) in table.sorted_entries() {
            let Some(&j) = self.member_index.get(url) else {
                continue;
            };
            let document = self.members[j];
            let local = match key {
                ExportKey::Namespace => self.namespace_locals[j].clone().ok_or_else(|| {
                    BundleError::invariant(format!("{url} has no namespace object"))
                })?,
                ExportKey::Default => self.resolve_export(j, "default", &document.url)?,
                ExportKey::Named(name) => self.resolve_export(j, name, &document.url)?,
            };
            self.export_entries.push((local, external.to_owned()));
        }
        Ok(())
    }
}
