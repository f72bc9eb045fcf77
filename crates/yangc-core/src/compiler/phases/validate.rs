//! Final validation sweep.
//!
//! Runs after the module tree is built, augments applied and deviations
//! executed: leafref paths resolve in a bounded fix-point, `unique` tags
//! resolve to leaf tuples, list keys are re-verified, and `must`/`when`
//! expressions go through the XPath collaborator. Any failure aborts the
//! module compile; the caller rolls the schema back.

use crate::compiler::context::ModuleCtx;
use crate::compiler::lookup::{self, ResolveOpts};
use crate::compiler::value;
use crate::error::{ErrorKind, Result};
use crate::model::{BaseType, NodeId, NodeKind, NodeTag, NodeTagMask, TypeId};
use crate::path::parse_schema_nodeid;
use crate::xpath::XPathAxis;

/// Run the whole sweep.
pub(crate) fn validate(ctx: &mut ModuleCtx<'_>) -> Result<()> {
    resolve_leafrefs(ctx)?;
    resolve_uniques(ctx)?;
    verify_list_keys(ctx)?;
    compile_xpath(ctx)?;
    Ok(())
}

/// Resolve every pending leafref in a bounded fix-point. A leafref whose
/// target is itself an unresolved leafref is retried in the next round;
/// a round without progress on a non-empty remainder is a cycle.
fn resolve_leafrefs(ctx: &mut ModuleCtx<'_>) -> Result<()> {
    let mut remaining = std::mem::take(&mut ctx.pending_leafrefs);

    while !remaining.is_empty() {
        let mut progressed = false;
        let mut deferred = Vec::new();

        for (typ, node) in remaining.drain(..) {
            match resolve_one_leafref(ctx, typ, node)? {
                true => progressed = true,
                false => deferred.push((typ, node)),
            }
        }

        if !deferred.is_empty() && !progressed {
            let paths: Vec<String> = deferred
                .iter()
                .map(|&(typ, _)| {
                    let leafref = ctx.schema.typ(typ).leafref.as_ref();
                    leafref
                        .map(|l| ctx.schema.str(l.path_text).to_owned())
                        .unwrap_or_default()
                })
                .collect();
            return Err(ctx.error(
                ErrorKind::Cycle,
                format!(
                    "leafref paths form a dependency cycle: {}",
                    paths.join(", ")
                ),
            ));
        }
        remaining = deferred;
    }
    Ok(())
}

/// Try to resolve one leafref occurrence. `Ok(false)` defers it to the
/// next fix-point round.
fn resolve_one_leafref(ctx: &mut ModuleCtx<'_>, typ: TypeId, node: NodeId) -> Result<bool> {
    let Some(leafref) = ctx.schema.typ(typ).leafref.clone() else {
        return Ok(true);
    };
    if leafref.target.is_some() {
        return Ok(true);
    }

    let view = ctx.schema.node(node).module;
    let opts = ResolveOpts::data(NodeTagMask::of(&[NodeTag::Leaf, NodeTag::LeafList]));
    let target = lookup::resolve_path(
        ctx.schema,
        view,
        Some(node),
        &leafref.path,
        &opts,
        &|prefix| ctx.resolve_prefix(prefix),
    )
    .map_err(|e| {
        let path_text = ctx.schema.str(leafref.path_text).to_owned();
        crate::error::CompileError::new(
            e.kind,
            ctx.schema.node_path(node),
            format!("leafref path \"{path_text}\": {}", e.message),
        )
        .in_module(ctx.module_name().to_owned())
    })?;

    let target_node = ctx.schema.node(target);
    let target_type = target_node
        .value_type()
        .expect("leafref target is a leaf or leaf-list");

    // The value type of the leafref is the target's resolved type; a
    // target whose type still contains an unresolved leafref (directly or
    // as a union member) defers this occurrence to the next round.
    if !fully_resolved(ctx, target_type) {
        return Ok(false);
    }
    let realtype = match ctx.schema.typ(target_type).base {
        BaseType::Leafref => ctx
            .schema
            .typ(target_type)
            .leafref
            .as_ref()
            .and_then(|l| l.realtype)
            .expect("checked by fully_resolved"),
        _ => target_type,
    };

    // Status of the target must not be weaker within one module.
    let leaf = ctx.schema.node(node);
    let leaf_name = ctx.schema.str(leaf.name).to_owned();
    let target_name = ctx.schema.str(ctx.schema.node(target).name).to_owned();
    ctx.check_status(
        leaf.flags.status,
        leaf.module,
        &leaf_name,
        ctx.schema.node(target).flags.status,
        ctx.schema.node(target).module,
        &target_name,
    )?;

    if let Some(leafref) = &mut ctx.schema.typ_mut(typ).leafref {
        leafref.target = Some(target);
        leafref.realtype = Some(realtype);
    }

    // A default value on the referring leaf must fit the real type.
    let default_texts: Vec<String> = match &ctx.schema.node(node).kind {
        NodeKind::Leaf {
            typ: leaf_type,
            default: Some(d),
            ..
        } if *leaf_type == typ => vec![ctx.schema.str(*d).to_owned()],
        NodeKind::LeafList {
            typ: leaf_type,
            defaults,
            ..
        } if *leaf_type == typ => defaults.iter().map(|&d| ctx.schema.str(d).to_owned()).collect(),
        _ => Vec::new(),
    };
    for text in default_texts {
        value::check_value(ctx.schema, ctx.module, realtype, &text)
            .map_err(|e| ctx.error(e.kind, e.message))?;
    }

    Ok(true)
}

/// Whether a type carries no unresolved leafref, directly or through
/// union members.
fn fully_resolved(ctx: &ModuleCtx<'_>, typ: TypeId) -> bool {
    let record = ctx.schema.typ(typ);
    match record.base {
        BaseType::Leafref => record
            .leafref
            .as_ref()
            .is_some_and(|l| l.realtype.is_some()),
        BaseType::Union => record
            .members
            .iter()
            .all(|&member| fully_resolved(ctx, member)),
        _ => true,
    }
}

/// Resolve every `unique` tag of the lists compiled by this module into
/// leaf pointers.
fn resolve_uniques(ctx: &mut ModuleCtx<'_>) -> Result<()> {
    let lists = std::mem::take(&mut ctx.pending_lists);
    for list in &lists {
        let uniques = match &ctx.schema.node(*list).kind {
            NodeKind::List { uniques, .. } => uniques.clone(),
            _ => continue,
        };
        let mut resolved = uniques.clone();

        for (spec_idx, spec) in uniques.iter().enumerate() {
            let mut leaves = Vec::with_capacity(spec.tags.len());
            let mut config: Option<bool> = None;
            for &tag in &spec.tags {
                let text = ctx.schema.str(tag).to_owned();
                let leaf = resolve_unique_tag(ctx, *list, &text)?;
                let leaf_node = ctx.schema.node(leaf);
                if let Some(expected) = config {
                    if leaf_node.flags.config != expected {
                        return Err(ctx.error(
                            ErrorKind::Semantic,
                            format!(
                                "unique tag \"{text}\" crosses a config/state boundary within one unique statement"
                            ),
                        ));
                    }
                } else {
                    config = Some(leaf_node.flags.config);
                }
                leaves.push(leaf);
            }
            resolved[spec_idx].leaves = leaves;
        }

        if let NodeKind::List { uniques, .. } = &mut ctx.schema.node_mut(*list).kind {
            *uniques = resolved;
        }
    }
    ctx.pending_lists = lists;
    Ok(())
}

/// Resolve one unique tag: a descendant schema node-id that must reach a
/// leaf without crossing another list.
fn resolve_unique_tag(ctx: &ModuleCtx<'_>, list: NodeId, tag: &str) -> Result<NodeId> {
    let path = parse_schema_nodeid(tag, false).map_err(|e| ctx.error(e.kind, e.message))?;
    let view = ctx.schema.node(list).module;
    let opts = ResolveOpts::schema_nodeid(NodeTagMask::of(&[NodeTag::Leaf]));
    let leaf = lookup::resolve_path(ctx.schema, view, Some(list), &path, &opts, &|prefix| {
        ctx.resolve_prefix(prefix)
    })
    .map_err(|e| {
        let kind = match e.kind {
            ErrorKind::Denied => ErrorKind::Semantic,
            other => other,
        };
        ctx.error(kind, format!("unique tag \"{tag}\": {}", e.message))
    })?;

    // Walk back up: no list may sit between the leaf and the list.
    let mut cursor = ctx.schema.node(leaf).parent;
    while let Some(id) = cursor {
        if id == list {
            return Ok(leaf);
        }
        if ctx.schema.node(id).tag() == NodeTag::List {
            return Err(ctx.error(
                ErrorKind::Semantic,
                format!("unique tag \"{tag}\" crosses a nested list"),
            ));
        }
        cursor = ctx.schema.node(id).parent;
    }
    Ok(leaf)
}

/// Re-verify list keys after deviations: status consistency between list
/// and key.
fn verify_list_keys(ctx: &mut ModuleCtx<'_>) -> Result<()> {
    let lists = ctx.pending_lists.clone();
    for list in lists {
        let (keys, list_status, list_module) = match &ctx.schema.node(list).kind {
            NodeKind::List { keys, .. } => (
                keys.clone(),
                ctx.schema.node(list).flags.status,
                ctx.schema.node(list).module,
            ),
            _ => continue,
        };
        let list_name = ctx.schema.str(ctx.schema.node(list).name).to_owned();
        for key in keys {
            let key_node = ctx.schema.node(key);
            let key_name = ctx.schema.str(key_node.name).to_owned();
            ctx.check_status(
                list_status,
                list_module,
                &list_name,
                key_node.flags.status,
                key_node.module,
                &key_name,
            )?;
        }
    }
    Ok(())
}

/// Compile `must`/`when` expressions of all nodes created or touched by
/// this module compile through the XPath collaborator.
fn compile_xpath(ctx: &mut ModuleCtx<'_>) -> Result<()> {
    let mut nodes: Vec<NodeId> = (ctx.first_new_node..ctx.schema.node_count())
        .filter_map(NodeId::from_index)
        .collect();
    nodes.extend(ctx.touched.iter().copied());

    for id in nodes {
        let node = ctx.schema.node(id);
        let parent = node.parent;
        let musts: Vec<_> = node.musts.iter().map(|m| m.expr).collect();
        let whens: Vec<_> = node.whens.iter().map(|w| w.expr).collect();

        let mut compiled_musts = Vec::with_capacity(musts.len());
        for expr in musts {
            let text = ctx.schema.str(expr).to_owned();
            let compiled = ctx
                .xpath
                .compile(&text, XPathAxis {
                    context_node: Some(id),
                })
                .map_err(|e| ctx.error(e.kind, format!("in must \"{text}\": {}", e.message)))?;
            compiled_musts.push(compiled);
        }
        // The when condition evaluates in the parent's context.
        let mut compiled_whens = Vec::with_capacity(whens.len());
        for expr in whens {
            let text = ctx.schema.str(expr).to_owned();
            let compiled = ctx
                .xpath
                .compile(&text, XPathAxis {
                    context_node: parent,
                })
                .map_err(|e| ctx.error(e.kind, format!("in when \"{text}\": {}", e.message)))?;
            compiled_whens.push(compiled);
        }

        let node = ctx.schema.node_mut(id);
        for (must, compiled) in node.musts.iter_mut().zip(compiled_musts) {
            must.compiled = Some(compiled);
        }
        for (when, compiled) in node.whens.iter_mut().zip(compiled_whens) {
            when.compiled = Some(compiled);
        }
    }
    Ok(())
}
