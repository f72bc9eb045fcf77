//! Reference resolution over the compiled tree.
//!
//! Schema node-ids and leafref paths are resolved segment by segment against
//! the compiled schema. RPC/action input and output are traversed
//! implicitly when the addressed node sits below them; choice and case are
//! transparent for data paths and leafref paths but explicit for schema
//! node-ids.

use crate::compiler::value;
use crate::error::{CompileError, ErrorKind, Result};
use crate::model::{ModuleId, NodeId, NodeKind, NodeTag, NodeTagMask, Schema};
use crate::path::{
    CompiledPath, CompiledPathSegment, CompiledPredicate, ParsedPath, ParsedPredicate, PathStep,
};

/// Which operation body an ambiguous traversal uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperMode {
    /// Traverse into `input`.
    Input,
    /// Traverse into `output`.
    Output,
}

/// Options of one resolution call.
#[derive(Clone, Copy, Debug)]
pub struct ResolveOpts {
    /// Whether choice/case are traversed implicitly.
    pub transparent_choice: bool,
    /// Operation body used for implicit traversal.
    pub oper: OperMode,
    /// Accepted node types of the final segment.
    pub accept: NodeTagMask,
}

impl ResolveOpts {
    /// Options for schema node-ids (augment, deviation, unique, refine).
    #[must_use]
    pub fn schema_nodeid(accept: NodeTagMask) -> Self {
        Self {
            transparent_choice: false,
            oper: OperMode::Input,
            accept,
        }
    }

    /// Options for leafref and data paths.
    #[must_use]
    pub fn data(accept: NodeTagMask) -> Self {
        Self {
            transparent_choice: true,
            oper: OperMode::Input,
            accept,
        }
    }
}

fn not_found(context: &str, name: &str) -> CompileError {
    CompileError::new(
        ErrorKind::Reference,
        context,
        format!("node \"{name}\" not found in {}", schema_or_root(context)),
    )
}

fn schema_or_root(context: &str) -> String {
    if context.is_empty() || context == "/" {
        "the schema root".to_owned()
    } else {
        format!("\"{context}\"")
    }
}

/// Find a top-level node of a module by name.
#[must_use]
pub fn find_top(schema: &Schema, module: ModuleId, name: &str) -> Option<NodeId> {
    let name_id = schema.find_str(name)?;
    let record = schema.module(module);
    record
        .data
        .iter()
        .chain(&record.rpcs)
        .chain(&record.notifications)
        .copied()
        .find(|&id| schema.node(id).name == name_id)
}

/// Candidate children of a node for path traversal.
fn lookup_children(schema: &Schema, node: NodeId, opts: &ResolveOpts) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_children(schema, node, opts, &mut out);
    out
}

fn collect_children(schema: &Schema, node: NodeId, opts: &ResolveOpts, out: &mut Vec<NodeId>) {
    let record = schema.node(node);
    match &record.kind {
        NodeKind::Rpc { input, output } | NodeKind::Action { input, output } => {
            // Input and output are addressable by name; the body selected by
            // the oper option is additionally traversed implicitly.
            out.push(*input);
            out.push(*output);
            let implicit = match opts.oper {
                OperMode::Input => *input,
                OperMode::Output => *output,
            };
            out.extend_from_slice(schema.node(implicit).children());
        }
        NodeKind::Choice { cases, .. } if opts.transparent_choice => {
            for &case in cases {
                collect_children(schema, case, opts, out);
            }
        }
        _ => {
            for &child in record.children() {
                if opts.transparent_choice {
                    if let NodeKind::Choice { .. } = schema.node(child).kind {
                        out.push(child);
                        collect_children(schema, child, opts, out);
                        continue;
                    }
                }
                out.push(child);
            }
            if let NodeKind::Container {
                actions,
                notifications,
                ..
            }
            | NodeKind::List {
                actions,
                notifications,
                ..
            } = &record.kind
            {
                out.extend_from_slice(actions);
                out.extend_from_slice(notifications);
            }
        }
    }
}

/// Match one step against a set of candidates: name and module must both
/// agree. An unprefixed step belongs to `default_module`.
fn match_step(
    schema: &Schema,
    candidates: &[NodeId],
    step_module: ModuleId,
    name: &str,
) -> Option<NodeId> {
    let name_id = schema.find_str(name)?;
    candidates
        .iter()
        .copied()
        .find(|&id| {
            let node = schema.node(id);
            node.name == name_id && node.module == step_module
        })
        .or_else(|| {
            // Implicitly materialized input/output carry the operation's
            // module; accept them regardless of the step's module.
            candidates.iter().copied().find(|&id| {
                let node = schema.node(id);
                node.name == name_id && matches!(node.tag(), NodeTag::Input | NodeTag::Output)
            })
        })
}

fn step_module<F>(resolve_prefix: &F, step: &PathStep, view: ModuleId) -> Result<ModuleId>
where
    F: Fn(&str) -> Result<ModuleId>,
{
    match &step.prefix {
        Some(prefix) => resolve_prefix(prefix),
        None => Ok(view),
    }
}

/// Resolve a parsed path against the schema.
///
/// `view` is the module whose prefixes and default namespace apply.
/// `start` is the context node for relative paths; `None` resolves relative
/// paths against the top level of `view`. Leading `..` ascents of leafref
/// paths are honored.
pub fn resolve_path<F>(
    schema: &Schema,
    view: ModuleId,
    start: Option<NodeId>,
    path: &ParsedPath,
    opts: &ResolveOpts,
    resolve_prefix: &F,
) -> Result<NodeId>
where
    F: Fn(&str) -> Result<ModuleId>,
{
    let mut cursor: Option<NodeId> = if path.absolute { None } else { start };

    // Apply '..' ascents, skipping non-data wrappers the way data paths do.
    if path.up > 0 {
        let mut at = start.ok_or_else(|| {
            CompileError::new(ErrorKind::Reference, "", "relative path without a context node")
        })?;
        for _ in 0..path.up {
            let mut parent = schema.node(at).parent;
            while let Some(p) = parent {
                let tag = schema.node(p).tag();
                if opts.transparent_choice && matches!(tag, NodeTag::Choice | NodeTag::Case) {
                    parent = schema.node(p).parent;
                } else {
                    break;
                }
            }
            match parent {
                Some(p) => at = p,
                None => {
                    return Err(CompileError::new(
                        ErrorKind::Reference,
                        schema.node_path(at),
                        "too many \"..\" ascents in path",
                    ))
                }
            }
        }
        cursor = Some(at);
    }

    let mut resolved = cursor;
    for (idx, step) in path.steps.iter().enumerate() {
        let module = step_module(resolve_prefix, step, view)?;
        let name = step.name.as_str();

        let found = match resolved {
            Some(node) => {
                let candidates = lookup_children(schema, node, opts);
                match_step(schema, &candidates, module, name)
                    .ok_or_else(|| not_found(&schema.node_path(node), name))?
            }
            None => find_top(schema, module, name).ok_or_else(|| not_found("/", name))?,
        };

        if idx + 1 == path.steps.len() && !opts.accept.accepts(schema.node(found).tag()) {
            return Err(CompileError::new(
                ErrorKind::Denied,
                schema.node_path(found),
                format!(
                    "node \"{name}\" is a {}, which is not acceptable here",
                    schema.node(found).tag()
                ),
            ));
        }
        resolved = Some(found);
    }

    resolved.ok_or_else(|| CompileError::new(ErrorKind::Internal, "", "empty path resolution"))
}

/// Compile a parsed data path into `(schema node, predicate)` segments.
///
/// Every segment is resolved like a path step; list-key predicates must
/// name all keys of the addressed list (order irrelevant) with values
/// valid for the key types, position predicates apply to keyless lists
/// and leaf-lists, and `[.='value']` applies to leaf-lists.
pub fn compile_data_path<F>(
    schema: &Schema,
    view: ModuleId,
    start: Option<NodeId>,
    path: &ParsedPath,
    resolve_prefix: &F,
) -> Result<CompiledPath>
where
    F: Fn(&str) -> Result<ModuleId>,
{
    let opts = ResolveOpts::data(NodeTagMask::ANY);
    let mut cursor = if path.absolute { None } else { start };
    let mut segments = Vec::with_capacity(path.steps.len());

    for step in &path.steps {
        let module = step_module(resolve_prefix, step, view)?;
        let found = match cursor {
            Some(node) => {
                let candidates = lookup_children(schema, node, &opts);
                match_step(schema, &candidates, module, &step.name)
                    .ok_or_else(|| not_found(&schema.node_path(node), &step.name))?
            }
            None => find_top(schema, module, &step.name)
                .ok_or_else(|| not_found("/", &step.name))?,
        };
        let predicate = compile_predicate(schema, view, found, step, resolve_prefix)?;
        segments.push(CompiledPathSegment {
            node: found,
            predicate,
        });
        cursor = Some(found);
    }

    Ok(CompiledPath { segments })
}

fn compile_predicate<F>(
    schema: &Schema,
    view: ModuleId,
    node: NodeId,
    step: &PathStep,
    resolve_prefix: &F,
) -> Result<CompiledPredicate>
where
    F: Fn(&str) -> Result<ModuleId>,
{
    let denied = |message: String| CompileError::new(ErrorKind::Denied, schema.node_path(node), message);
    let tag = schema.node(node).tag();

    if step.predicates.is_empty() {
        // A keyed list names an exact instance only through its keys.
        if let NodeKind::List { keys, .. } = &schema.node(node).kind {
            if !keys.is_empty() {
                return Err(CompileError::new(
                    ErrorKind::Semantic,
                    schema.node_path(node),
                    "all keys of the list must be given in the predicates",
                ));
            }
        }
        return Ok(CompiledPredicate::None);
    }

    match &step.predicates[0] {
        ParsedPredicate::Position(n) => {
            if !matches!(tag, NodeTag::List | NodeTag::LeafList) {
                return Err(denied(format!(
                    "position predicate is not applicable to a {tag}"
                )));
            }
            Ok(CompiledPredicate::Position(*n))
        }
        ParsedPredicate::LeafListValue(value) => {
            if tag != NodeTag::LeafList {
                return Err(denied(format!(
                    "leaf-list value predicate is not applicable to a {tag}"
                )));
            }
            let typ = schema.node(node).value_type().expect("leaf-list has a type");
            value::check_value(schema, view, typ, value)?;
            Ok(CompiledPredicate::LeafListValue(value.clone()))
        }
        ParsedPredicate::KeyValue { .. } => {
            let keys = match &schema.node(node).kind {
                NodeKind::List { keys, .. } => keys.clone(),
                _ => {
                    return Err(denied(format!(
                        "key predicates are not applicable to a {tag}"
                    )))
                }
            };
            let mut values: Vec<(NodeId, String)> = Vec::with_capacity(keys.len());
            for pred in &step.predicates {
                let ParsedPredicate::KeyValue {
                    prefix,
                    name,
                    value,
                } = pred
                else {
                    return Err(denied("mixed predicate forms on one segment".to_owned()));
                };
                let key_module = match prefix {
                    Some(p) => resolve_prefix(p)?,
                    None => view,
                };
                let key = schema
                    .find_str(name)
                    .and_then(|n| {
                        keys.iter().copied().find(|&k| {
                            let node = schema.node(k);
                            node.name == n && node.module == key_module
                        })
                    })
                    .ok_or_else(|| {
                        CompileError::new(
                            ErrorKind::Reference,
                            schema.node_path(node),
                            format!("\"{name}\" is not a key of the list"),
                        )
                    })?;
                if values.iter().any(|(k, _)| *k == key) {
                    return Err(CompileError::new(
                        ErrorKind::Exists,
                        schema.node_path(node),
                        format!("key \"{name}\" is given twice"),
                    ));
                }
                let typ = schema.node(key).value_type().expect("keys are leaves");
                value::check_value(schema, view, typ, value)?;
                values.push((key, value.clone()));
            }
            if values.len() != keys.len() {
                return Err(CompileError::new(
                    ErrorKind::Semantic,
                    schema.node_path(node),
                    "all keys of the list must be given in the predicates",
                ));
            }
            Ok(CompiledPredicate::ListKeys(values))
        }
        ParsedPredicate::KeyLeafref { .. } => Err(denied(
            "leafref predicates are only checked, never compiled".to_owned(),
        )),
    }
}
