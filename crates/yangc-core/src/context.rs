//! The compile context.
//!
//! A context owns the interned-string dictionary, the compiled schema of
//! all loaded modules, the runtime feature states and the collaborator
//! hooks (import callback, XPath compiler). A context may be read
//! concurrently once compilation is done; mutation requires exclusive
//! access, which the borrow checker enforces on the host.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::compiler::context::FeatureConfig;
pub use crate::compiler::context::FeatureSet;
use crate::compiler::phases::deviation::DeviationLog;
use crate::compiler::phases::types::seed_builtin_types;
use crate::compiler::{compile_module, CompileEnv};
use crate::error::{CompileError, Diagnostic, ErrorKind, Result};
use crate::model::{FeatureState, ModuleId, Schema};
use crate::parsed::{ParsedGrouping, ParsedModule};
use crate::xpath::{SyntaxChecker, XPathCompiler};

/// Callback that loads a parsed module by name and optional revision,
/// installed by the host for transitive imports.
pub type ImportCallback =
    Box<dyn Fn(&str, Option<&str>) -> Option<ParsedModule> + Send + Sync>;

/// Result of a successful compile call.
#[derive(Clone, Debug)]
pub struct CompileReport {
    /// The modules committed by this call, in compile order.
    pub modules: Vec<ModuleId>,
    /// Warnings gathered along the way.
    pub warnings: Vec<Diagnostic>,
}

/// A compile context.
pub struct Context {
    schema: Schema,
    features: FeatureConfig,
    xpath: Box<dyn XPathCompiler>,
    import_cb: Option<ImportCallback>,
    searchpaths: Vec<PathBuf>,
    foreign_groupings: HashMap<ModuleId, Vec<ParsedGrouping>>,
    deviation_log: DeviationLog,
    /// Names currently being loaded, for import-cycle detection.
    loading: Vec<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a context with the built-in types seeded.
    #[must_use]
    pub fn new() -> Self {
        let mut schema = Schema::new();
        seed_builtin_types(&mut schema);
        Self {
            schema,
            features: FeatureConfig::default(),
            xpath: Box::new(SyntaxChecker),
            import_cb: None,
            searchpaths: Vec::new(),
            foreign_groupings: HashMap::new(),
            deviation_log: DeviationLog::default(),
            loading: Vec::new(),
        }
    }

    /// The compiled schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Install the XPath collaborator used for `must`/`when` compilation.
    pub fn set_xpath_compiler(&mut self, xpath: Box<dyn XPathCompiler>) {
        self.xpath = xpath;
    }

    /// Install the import callback.
    pub fn set_import_callback(&mut self, callback: ImportCallback) {
        self.import_cb = Some(callback);
    }

    /// Add a search path. The core does no file discovery itself; the
    /// paths are advisory input for the host's import callback.
    pub fn add_searchpath(&mut self, path: impl Into<PathBuf>) {
        self.searchpaths.push(path.into());
    }

    /// The registered search paths.
    #[must_use]
    pub fn searchpaths(&self) -> &[PathBuf] {
        &self.searchpaths
    }

    /// Register the feature set of a module. Takes effect on the next
    /// compile call; modules without a registered set gate all features
    /// as disabled.
    pub fn set_features(&mut self, module: impl Into<String>, features: FeatureSet) {
        self.features.set(module, features);
    }

    /// Tri-valued feature state: unset when the module has no registered
    /// feature set.
    #[must_use]
    pub fn feature_state(&self, module: &str, feature: &str) -> FeatureState {
        match self.features.state(module, feature) {
            None => FeatureState::Unset,
            Some(true) => FeatureState::Enabled,
            Some(false) => FeatureState::Disabled,
        }
    }

    /// Compile a batch of parsed modules (submodules included) into the
    /// context. Modules are committed one by one in dependency order; on
    /// a fatal error the failing module is rolled back and the error
    /// carries all diagnostics, while earlier modules stay committed.
    pub fn compile(
        &mut self,
        batch: Vec<ParsedModule>,
    ) -> core::result::Result<CompileReport, CompileError> {
        let mut warnings = Vec::new();
        let result = self.compile_batch(batch, &mut warnings);
        match result {
            Ok(modules) => Ok(CompileReport { modules, warnings }),
            Err(error) => {
                let mut diagnostics: Vec<Diagnostic> = warnings;
                diagnostics.push(error.to_diagnostic());
                let mut error = error;
                error.diagnostics = diagnostics;
                Err(error)
            }
        }
    }

    /// Compile a data path (with predicates) against the compiled schema
    /// in the view of `module`: prefixes resolve through that module's
    /// imports and unprefixed names belong to it.
    ///
    /// Returns the `(schema node, predicate)` segment sequence.
    pub fn compile_data_path(
        &self,
        module: &str,
        text: &str,
    ) -> Result<crate::path::CompiledPath> {
        let view = self
            .schema
            .find_module(module, None)
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::NotFound,
                    format!("/{module}"),
                    format!("module \"{module}\" is not loaded"),
                )
            })?
            .id;
        let parsed = crate::path::parse_path(text, &crate::path::PathParseOptions::data_path())?;
        crate::compiler::lookup::compile_data_path(&self.schema, view, None, &parsed, &|prefix| {
            let prefix_id = self.schema.find_str(prefix);
            prefix_id
                .and_then(|p| self.schema.module(view).module_for_prefix(p))
                .ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::Reference,
                        text,
                        format!("unknown prefix \"{prefix}\""),
                    )
                })
        })
    }

    /// Import a module by name through the import callback, without
    /// implementing it. Idempotent on `(name, revision)`; importing
    /// without a revision returns the latest available.
    pub fn import(&mut self, name: &str, revision: Option<&str>) -> Result<ModuleId> {
        if let Some(module) = self.schema.find_module(name, revision) {
            return Ok(module.id);
        }
        let mut warnings = Vec::new();
        let batch = HashMap::new();
        let id = self.load_module(name, revision, &batch, &mut warnings)?;
        Ok(id)
    }

    fn compile_batch(
        &mut self,
        batch: Vec<ParsedModule>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<Vec<ModuleId>> {
        // Submodules are consumed by their parents' includes.
        let mut submodules: HashMap<String, ParsedModule> = HashMap::new();
        let mut modules: Vec<ParsedModule> = Vec::new();
        for parsed in batch {
            if parsed.is_submodule() {
                submodules.insert(parsed.name.clone(), parsed);
            } else {
                modules.push(parsed);
            }
        }

        let ordered = topo_sort(modules)?;
        let by_name: HashMap<String, ParsedModule> = ordered
            .iter()
            .map(|m| (m.name.clone(), m.clone()))
            .collect();
        let mut pending = by_name;
        pending.extend(submodules.into_iter());

        let mut committed = Vec::new();
        for parsed in &ordered {
            if self
                .schema
                .find_module(&parsed.name, parsed.latest_revision_date())
                .is_some()
            {
                // Already loaded through an import of an earlier batch
                // member.
                if let Some(module) = self.schema.find_module(&parsed.name, None) {
                    committed.push(module.id);
                }
                continue;
            }
            let id = self.compile_one(parsed, true, &pending, warnings)?;
            committed.push(id);
        }
        Ok(committed)
    }

    /// Compile one module as its own transaction.
    fn compile_one(
        &mut self,
        parsed: &ParsedModule,
        implement: bool,
        pending: &HashMap<String, ParsedModule>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<ModuleId> {
        if self.loading.contains(&parsed.name) {
            let chain = self.loading.join(" -> ");
            return Err(CompileError::new(
                ErrorKind::Cycle,
                format!("/{}", parsed.name),
                format!("import cycle detected: {chain} -> {}", parsed.name),
            ));
        }
        self.loading.push(parsed.name.clone());
        let result = self.compile_one_inner(parsed, implement, pending, warnings);
        self.loading.pop();
        result
    }

    fn compile_one_inner(
        &mut self,
        parsed: &ParsedModule,
        implement: bool,
        pending: &HashMap<String, ParsedModule>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<ModuleId> {
        // Resolve includes and imports first; imported modules commit on
        // their own and survive a failure of this module.
        let submodules = self.resolve_includes(parsed, pending, warnings)?;
        let mut imports: Vec<(String, ModuleId)> = Vec::new();
        let import_stmts = parsed
            .imports
            .iter()
            .chain(submodules.iter().flat_map(|s| s.imports.iter()));
        for import in import_stmts {
            if imports.iter().any(|(p, _)| *p == import.prefix) {
                // Submodules may repeat the parent's imports under the
                // same prefix.
                continue;
            }
            let id =
                self.load_module(&import.module, import.revision.as_deref(), pending, warnings)?;
            imports.push((import.prefix.clone(), id));
        }

        // From here on the module commits atomically.
        let backup = self.schema.clone();
        let log_backup = self.deviation_log.clone();
        let mut env = CompileEnv {
            schema: &mut self.schema,
            features: &self.features,
            xpath: self.xpath.as_ref(),
            warnings,
            foreign_groupings: &mut self.foreign_groupings,
            deviation_log: &mut self.deviation_log,
        };
        match compile_module(&mut env, parsed, &submodules, &imports, implement) {
            Ok(id) => {
                debug!(module = %parsed.name, "module committed");
                Ok(id)
            }
            Err(error) => {
                self.schema = backup;
                self.deviation_log = log_backup;
                Err(error)
            }
        }
    }

    /// Find or load an imported module: already-loaded revisions first,
    /// then the pending batch (whose members are implemented), then the
    /// import callback (import-only).
    fn load_module(
        &mut self,
        name: &str,
        revision: Option<&str>,
        pending: &HashMap<String, ParsedModule>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<ModuleId> {
        if let Some(module) = self.schema.find_module(name, revision) {
            return Ok(module.id);
        }
        if let Some(parsed) = pending.get(name).cloned() {
            return self.compile_one(&parsed, true, pending, warnings);
        }
        if let Some(callback) = &self.import_cb {
            if let Some(parsed) = callback(name, revision) {
                return self.compile_one(&parsed, false, pending, warnings);
            }
        }
        Err(CompileError::new(
            ErrorKind::NotFound,
            format!("/{name}"),
            format!("module \"{name}\" not found in the context, batch or import callback"),
        ))
    }

    /// Resolve the includes of a module against the batch and callback.
    fn resolve_includes(
        &mut self,
        parsed: &ParsedModule,
        pending: &HashMap<String, ParsedModule>,
        _warnings: &mut [Diagnostic],
    ) -> Result<Vec<ParsedModule>> {
        let mut submodules = Vec::with_capacity(parsed.includes.len());
        for include in &parsed.includes {
            let found = pending.get(&include.submodule).cloned().or_else(|| {
                self.import_cb
                    .as_ref()
                    .and_then(|cb| cb(&include.submodule, include.revision.as_deref()))
            });
            let Some(submodule) = found else {
                return Err(CompileError::new(
                    ErrorKind::NotFound,
                    format!("/{}", parsed.name),
                    format!("included submodule \"{}\" not found", include.submodule),
                )
                .in_module(parsed.name.clone()));
            };
            if submodule.belongs_to.as_deref() != Some(parsed.name.as_str()) {
                return Err(CompileError::new(
                    ErrorKind::Denied,
                    format!("/{}", parsed.name),
                    format!(
                        "submodule \"{}\" does not belong to module \"{}\"",
                        include.submodule, parsed.name
                    ),
                )
                .in_module(parsed.name.clone()));
            }
            submodules.push(submodule);
        }
        Ok(submodules)
    }
}

/// Order batch modules so that every batch-internal import precedes its
/// importer; an import cycle inside the batch is an error.
fn topo_sort(modules: Vec<ParsedModule>) -> Result<Vec<ParsedModule>> {
    let names: Vec<String> = modules.iter().map(|m| m.name.clone()).collect();
    let mut remaining = modules;
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut placed: Vec<String> = Vec::new();

    while !remaining.is_empty() {
        let ready_idx = remaining.iter().position(|m| {
            m.imports.iter().all(|i| {
                !names.contains(&i.module) || placed.contains(&i.module)
            })
        });
        match ready_idx {
            Some(idx) => {
                let module = remaining.remove(idx);
                placed.push(module.name.clone());
                ordered.push(module);
            }
            None => {
                let stuck: Vec<String> = remaining.iter().map(|m| m.name.clone()).collect();
                return Err(CompileError::new(
                    ErrorKind::Cycle,
                    "/",
                    format!("import cycle among modules: {}", stuck.join(", ")),
                ));
            }
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topo_sort_orders_imports_first() {
        let mut a = ParsedModule::new("a", "urn:a", "a");
        a.imports.push(crate::parsed::ParsedImport::new("b", "b"));
        let b = ParsedModule::new("b", "urn:b", "b");
        let ordered = topo_sort(vec![a, b]).unwrap();
        assert_eq!(ordered[0].name, "b");
        assert_eq!(ordered[1].name, "a");
    }

    #[test]
    fn test_topo_sort_detects_cycles() {
        let mut a = ParsedModule::new("a", "urn:a", "a");
        a.imports.push(crate::parsed::ParsedImport::new("b", "b"));
        let mut b = ParsedModule::new("b", "urn:b", "b");
        b.imports.push(crate::parsed::ParsedImport::new("a", "a"));
        let err = topo_sort(vec![a, b]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cycle);
    }

    #[test]
    fn test_feature_state_tri_valued() {
        let mut ctx = Context::new();
        assert_eq!(ctx.feature_state("m", "f"), FeatureState::Unset);
        ctx.set_features("m", FeatureSet::Some(vec!["f".into()]));
        assert_eq!(ctx.feature_state("m", "f"), FeatureState::Enabled);
        assert_eq!(ctx.feature_state("m", "g"), FeatureState::Disabled);
        ctx.set_features("m", FeatureSet::All);
        assert_eq!(ctx.feature_state("m", "g"), FeatureState::Enabled);
    }
}
