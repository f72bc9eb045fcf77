//! Per-module compile state.

use std::collections::HashMap;

use crate::error::{CompileError, Diagnostic, ErrorKind, Result, Severity};
use crate::expr::FeatureExpr;
use crate::model::{
    ExtensionId, FeatureId, IfFeature, ModuleId, NodeId, Schema, Status, StrId, TypeId, YangVersion,
};
use crate::parsed::{ParsedGrouping, ParsedTypedef};
use crate::plugins::ExtHost;
use crate::xpath::XPathCompiler;

/// Feature selection for one module, registered on the context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FeatureSet {
    /// Enable every feature the module declares.
    All,
    /// Disable every feature.
    #[default]
    None,
    /// Enable exactly the listed features.
    Some(Vec<String>),
}

/// Runtime feature state of all modules, keyed by module name.
#[derive(Clone, Debug, Default)]
pub struct FeatureConfig {
    sets: HashMap<String, FeatureSet>,
}

impl FeatureConfig {
    /// Register the feature set for a module, replacing any previous one.
    pub fn set(&mut self, module: impl Into<String>, features: FeatureSet) {
        self.sets.insert(module.into(), features);
    }

    /// Tri-valued state of one feature: `None` when the module has no
    /// registered set (unknown module state), otherwise the enablement.
    #[must_use]
    pub fn state(&self, module: &str, feature: &str) -> Option<bool> {
        let set = self.sets.get(module)?;
        Some(match set {
            FeatureSet::All => true,
            FeatureSet::None => false,
            FeatureSet::Some(list) => list.iter().any(|f| f == feature),
        })
    }
}

/// Rendered-path stack for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct PathStack {
    segments: Vec<String>,
}

impl PathStack {
    /// Push a path segment.
    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    /// Pop the innermost segment.
    pub fn pop(&mut self) {
        self.segments.pop();
    }

    /// Render as `/seg/seg/...`.
    #[must_use]
    pub fn render(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_owned();
        }
        let mut out = String::new();
        for seg in &self.segments {
            out.push('/');
            out.push_str(seg);
        }
        out
    }
}

/// Working state while compiling one module.
pub(crate) struct ModuleCtx<'a> {
    /// The schema being extended.
    pub schema: &'a mut Schema,
    /// The module under compilation.
    pub module: ModuleId,
    /// The module whose prefixes and unprefixed names apply; differs from
    /// `module` only while a grouping from another module is expanded.
    pub view: ModuleId,
    /// Its YANG version.
    pub version: YangVersion,
    /// Runtime feature states.
    pub features: &'a FeatureConfig,
    /// XPath collaborator for must/when.
    pub xpath: &'a dyn XPathCompiler,
    /// Accumulated warnings.
    pub warnings: &'a mut Vec<Diagnostic>,
    /// Diagnostic path of the construct being compiled.
    pub path: PathStack,

    /// Lexical typedef scopes, innermost last.
    pub typedef_scopes: Vec<Vec<ParsedTypedef>>,
    /// Lexical grouping scopes, innermost last.
    pub grouping_scopes: Vec<Vec<ParsedGrouping>>,
    /// Module-qualified names of groupings currently being expanded.
    pub uses_chain: Vec<String>,
    /// Module-qualified names of typedefs currently being compiled.
    pub typedef_stack: Vec<String>,
    /// Cache of compiled top-level typedefs of this module.
    pub typedef_cache: HashMap<String, TypeId>,

    /// Top-level typedefs of the module and its submodules.
    pub top_typedefs: Vec<ParsedTypedef>,
    /// Top-level groupings of the module and its submodules.
    pub top_groupings: Vec<ParsedGrouping>,
    /// Top-level groupings of previously compiled modules, for
    /// cross-module `uses`.
    pub foreign_groupings: &'a HashMap<ModuleId, Vec<ParsedGrouping>>,

    /// Leafref occurrences awaiting resolution: `(type, context leaf)`.
    pub pending_leafrefs: Vec<(TypeId, NodeId)>,
    /// Lists awaiting key/unique validation.
    pub pending_lists: Vec<NodeId>,
    /// Extension instances awaiting the tree-phase hook.
    pub tree_exts: Vec<(ExtHost, usize, ExtensionId)>,
    /// Committed nodes modified by this module's deviations.
    pub touched: Vec<NodeId>,
    /// Arena index of the first node created by this compile.
    pub first_new_node: usize,
}

impl<'a> ModuleCtx<'a> {
    pub(crate) fn new(
        schema: &'a mut Schema,
        module: ModuleId,
        features: &'a FeatureConfig,
        xpath: &'a dyn XPathCompiler,
        warnings: &'a mut Vec<Diagnostic>,
        foreign_groupings: &'a HashMap<ModuleId, Vec<ParsedGrouping>>,
    ) -> Self {
        let version = schema.module(module).version;
        let first_new_node = schema.node_count();
        Self {
            schema,
            module,
            view: module,
            version,
            features,
            xpath,
            warnings,
            path: PathStack::default(),
            typedef_scopes: Vec::new(),
            grouping_scopes: Vec::new(),
            uses_chain: Vec::new(),
            typedef_stack: Vec::new(),
            typedef_cache: HashMap::new(),
            top_typedefs: Vec::new(),
            top_groupings: Vec::new(),
            foreign_groupings,
            pending_leafrefs: Vec::new(),
            pending_lists: Vec::new(),
            tree_exts: Vec::new(),
            touched: Vec::new(),
            first_new_node,
        }
    }

    /// The name of the module under compilation.
    pub fn module_name(&self) -> &str {
        self.schema.str(self.schema.module(self.module).name)
    }

    /// Build an error at the current path.
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> CompileError {
        CompileError::new(kind, self.path.render(), message).in_module(self.module_name())
    }

    /// Record a warning at the current path.
    pub fn warn(&mut self, kind: ErrorKind, message: impl Into<String>) {
        let module = self.module_name().to_owned();
        let message = message.into();
        tracing::warn!(module = %module, path = %self.path.render(), %message);
        self.warnings.push(Diagnostic {
            severity: Severity::Warning,
            kind,
            path: self.path.render(),
            message,
            module: Some(module),
            revision: None,
        });
    }

    /// Intern into the schema dictionary.
    pub fn intern(&mut self, s: &str) -> StrId {
        self.schema.intern(s)
    }

    /// Resolve a prefix in the current view: the view module's own prefix
    /// or one of its import prefixes.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<ModuleId> {
        self.schema
            .find_str(prefix)
            .and_then(|id| self.schema.module(self.view).module_for_prefix(id))
            .ok_or_else(|| {
                self.error(ErrorKind::Reference, format!("unknown prefix \"{prefix}\""))
            })
    }

    /// Split `prefix:name` and resolve the prefix in the current view;
    /// no prefix resolves to the view module itself.
    pub fn resolve_prefixed(&self, ident: &str) -> Result<(ModuleId, String)> {
        match ident.split_once(':') {
            Some((prefix, name)) => Ok((self.resolve_prefix(prefix)?, name.to_owned())),
            None => Ok((self.view, ident.to_owned())),
        }
    }

    /// Status monotonicity check: a definition may not reference a
    /// definition of higher (weaker) status within the same module.
    pub fn check_status(
        &self,
        referrer_status: Status,
        referrer_module: ModuleId,
        referrer: &str,
        target_status: Status,
        target_module: ModuleId,
        target: &str,
    ) -> Result<()> {
        if referrer_status < target_status && referrer_module == target_module {
            return Err(self.error(
                ErrorKind::Denied,
                format!(
                    "a {} definition \"{referrer}\" is not allowed to reference {} definition \"{target}\"",
                    referrer_status.as_str(),
                    target_status.as_str(),
                ),
            ));
        }
        Ok(())
    }

    /// Whether a compiled feature is effectively enabled.
    pub fn feature_enabled(&self, id: FeatureId) -> bool {
        self.schema.feature(id).enabled
    }

    /// Resolve a name-based feature expression to feature ids, in the view
    /// of the module under compilation.
    pub fn resolve_feature_expr(&self, expr: &FeatureExpr) -> Result<IfFeature> {
        Ok(match expr {
            FeatureExpr::Name(name) => {
                let (module, name) = self.resolve_prefixed(name)?;
                let name_id = self.schema.find_str(&name).ok_or_else(|| {
                    self.error(ErrorKind::Reference, format!("unknown feature \"{name}\""))
                })?;
                let id = self.schema.find_feature(module, name_id).ok_or_else(|| {
                    self.error(ErrorKind::Reference, format!("unknown feature \"{name}\""))
                })?;
                IfFeature::Feature(id)
            }
            FeatureExpr::Not(e) => IfFeature::Not(Box::new(self.resolve_feature_expr(e)?)),
            FeatureExpr::And(a, b) => IfFeature::And(
                Box::new(self.resolve_feature_expr(a)?),
                Box::new(self.resolve_feature_expr(b)?),
            ),
            FeatureExpr::Or(a, b) => IfFeature::Or(
                Box::new(self.resolve_feature_expr(a)?),
                Box::new(self.resolve_feature_expr(b)?),
            ),
        })
    }

    /// Evaluate a node's `if-feature` guards. `false` means the node is
    /// conditionally absent and must not be compiled.
    pub fn eval_if_features(&self, guards: &[String]) -> Result<bool> {
        for guard in guards {
            let expr = crate::expr::parse_if_feature(guard)?;
            let resolved = self.resolve_feature_expr(&expr)?;
            if !resolved.eval(&|id| self.feature_enabled(id)) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
