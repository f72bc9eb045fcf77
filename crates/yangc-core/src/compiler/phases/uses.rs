//! Grouping expansion.
//!
//! A `uses` statement inlines the resolved grouping's children as children
//! of its parent, then applies the overlays in order: `refine` targets,
//! `augment` statements inside the uses, extension instances. Names inside
//! the grouping body resolve in the grouping's defining module; the inlined
//! nodes belong to the using module.

use crate::compiler::context::ModuleCtx;
use crate::compiler::phases::nodes::{self, Inherited};
use crate::compiler::phases::augment;
use crate::compiler::value;
use crate::error::{ErrorKind, Result};
use crate::model::{ModuleId, NodeId, NodeKind, NodeTag, WhenSpec};
use crate::parsed::{ParsedGrouping, ParsedRefine, ParsedUses};
use crate::path::parse_schema_nodeid;
use crate::plugins::ExtHost;

/// Expand a `uses` statement into `sink`.
pub(crate) fn expand_uses(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    uses: &ParsedUses,
    sink: &mut Vec<NodeId>,
) -> Result<()> {
    if !ctx.eval_if_features(&uses.if_features)? {
        return Ok(());
    }

    let (grouping_module, grouping) = resolve_grouping(ctx, &uses.name)?;
    let key = format!(
        "{}:{}",
        ctx.schema.str(ctx.schema.module(grouping_module).name),
        grouping.name
    );
    if ctx.uses_chain.contains(&key) {
        if uses.when.is_some() {
            // The recursion is broken by the when condition; the nested
            // occurrence expands to nothing.
            return Ok(());
        }
        let chain = ctx.uses_chain.join(" -> ");
        return Err(ctx.error(
            ErrorKind::Cycle,
            format!("recursive uses of grouping detected: {chain} -> {key}"),
        ));
    }

    ctx.uses_chain.push(key);
    ctx.typedef_scopes.push(grouping.typedefs.clone());
    ctx.grouping_scopes.push(grouping.groupings.clone());
    let saved_view = ctx.view;
    ctx.view = grouping_module;

    let mut inlined = Vec::new();
    let result =
        nodes::compile_children(ctx, parent, inh, &grouping.children, &mut inlined);

    ctx.view = saved_view;
    ctx.grouping_scopes.pop();
    ctx.typedef_scopes.pop();
    ctx.uses_chain.pop();
    result?;

    // The uses' when condition guards every inlined top-level node.
    if let Some(when) = &uses.when {
        let expr = ctx.intern(when);
        for &id in &inlined {
            ctx.schema.node_mut(id).whens.push(WhenSpec {
                expr,
                compiled: None,
            });
        }
    }

    for refine in &uses.refines {
        apply_refine(ctx, &mut inlined, refine)?;
    }

    for aug in &uses.augments {
        let target = find_descendant(ctx, &inlined, &aug.target)?;
        augment::apply_augment_at(ctx, target, aug)?;
    }

    for &id in &inlined {
        let exts: Vec<_> = uses.exts.clone();
        nodes::attach_extensions(ctx, ExtHost::Node(id), &exts)?;
    }

    for id in inlined {
        nodes::link_child(ctx, sink, id)?;
    }
    Ok(())
}

/// Resolve a grouping reference: local scopes, then the view module's top
/// level, then other modules' top levels via an explicit prefix.
fn resolve_grouping(
    ctx: &mut ModuleCtx<'_>,
    name: &str,
) -> Result<(ModuleId, ParsedGrouping)> {
    let (module, plain) = ctx.resolve_prefixed(name)?;

    if module == ctx.view {
        for depth in (0..ctx.grouping_scopes.len()).rev() {
            let found = ctx.grouping_scopes[depth]
                .iter()
                .find(|g| g.name == plain)
                .cloned();
            if let Some(grouping) = found {
                return Ok((module, grouping));
            }
        }
    }
    if module == ctx.module {
        if let Some(grouping) = ctx.top_groupings.iter().find(|g| g.name == plain).cloned() {
            return Ok((module, grouping));
        }
    } else if let Some(groupings) = ctx.foreign_groupings.get(&module) {
        if let Some(grouping) = groupings.iter().find(|g| g.name == plain).cloned() {
            return Ok((module, grouping));
        }
    }

    Err(ctx.error(
        ErrorKind::NotFound,
        format!("unknown grouping \"{name}\""),
    ))
}

/// Resolve a descendant schema node-id among freshly inlined nodes.
pub(crate) fn find_descendant(
    ctx: &ModuleCtx<'_>,
    roots: &[NodeId],
    target: &str,
) -> Result<NodeId> {
    let path = parse_schema_nodeid(target, false)
        .map_err(|e| ctx.error(e.kind, e.message))?;

    let mut candidates: Vec<NodeId> = roots.to_vec();
    let mut resolved = None;
    for step in &path.steps {
        let module = match &step.prefix {
            Some(prefix) => {
                let (module, _) = ctx.resolve_prefixed(&format!("{prefix}:{}", step.name))?;
                module
            }
            None => ctx.module,
        };
        let name_id = ctx.schema.find_str(&step.name);
        let found = name_id.and_then(|n| {
            candidates.iter().copied().find(|&id| {
                let node = ctx.schema.node(id);
                node.name == n && node.module == module
            })
        });
        let Some(found) = found else {
            return Err(ctx.error(
                ErrorKind::NotFound,
                format!("descendant node \"{}\" not found in \"{target}\"", step.name),
            ));
        };
        candidates = ctx.schema.structural_children(found);
        resolved = Some(found);
    }
    resolved.ok_or_else(|| ctx.error(ErrorKind::Syntax, format!("empty target \"{target}\"")))
}

/// Apply one `refine` overlay.
fn apply_refine(
    ctx: &mut ModuleCtx<'_>,
    roots: &mut Vec<NodeId>,
    refine: &ParsedRefine,
) -> Result<()> {
    let target = find_descendant(ctx, roots, &refine.target)?;
    let tag = ctx.schema.node(target).tag();

    // An if-feature added by refine may prune the refined node entirely.
    if !refine.if_features.is_empty() && !ctx.eval_if_features(&refine.if_features)? {
        unlink(ctx, roots, target);
        return Ok(());
    }

    if !refine.defaults.is_empty() {
        match tag {
            NodeTag::Leaf => {
                if refine.defaults.len() != 1 {
                    return Err(ctx.error(
                        ErrorKind::Semantic,
                        "refine of a leaf takes exactly one default",
                    ));
                }
                let text = refine.defaults[0].clone();
                let typ = ctx.schema.node(target).value_type().expect("leaf has a type");
                value::check_value(ctx.schema, ctx.module, typ, &text)
                    .map_err(|e| ctx.error(e.kind, e.message))?;
                let interned = ctx.intern(&text);
                if let NodeKind::Leaf { default, .. } = &mut ctx.schema.node_mut(target).kind {
                    *default = Some(interned);
                }
            }
            NodeTag::LeafList => {
                let typ = ctx.schema.node(target).value_type().expect("leaf-list has a type");
                let mut interned = Vec::with_capacity(refine.defaults.len());
                for text in &refine.defaults {
                    value::check_value(ctx.schema, ctx.module, typ, text)
                        .map_err(|e| ctx.error(e.kind, e.message))?;
                    interned.push(ctx.intern(text));
                }
                if let NodeKind::LeafList { defaults, .. } =
                    &mut ctx.schema.node_mut(target).kind
                {
                    *defaults = interned;
                }
            }
            NodeTag::Choice => {
                let name = &refine.defaults[0];
                let name_id = ctx.schema.find_str(name);
                let case = name_id.and_then(|n| {
                    ctx.schema
                        .node(target)
                        .children()
                        .iter()
                        .copied()
                        .find(|&c| ctx.schema.node(c).name == n)
                });
                let Some(case) = case else {
                    return Err(ctx.error(
                        ErrorKind::NotFound,
                        format!("default case \"{name}\" not found in the refined choice"),
                    ));
                };
                if let NodeKind::Choice { default_case, .. } =
                    &mut ctx.schema.node_mut(target).kind
                {
                    *default_case = Some(case);
                }
            }
            other => {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!("refine of default is not applicable to a {other}"),
                ))
            }
        }
    }

    if let Some(presence) = &refine.presence {
        let interned = ctx.intern(presence);
        match &mut ctx.schema.node_mut(target).kind {
            NodeKind::Container { presence: p, .. } => *p = Some(interned),
            _ => {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!("refine of presence is not applicable to a {tag}"),
                ))
            }
        }
    }

    if let Some(config) = refine.config {
        set_config_recursive(ctx, target, config);
    }

    if let Some(mandatory) = refine.mandatory {
        if !matches!(
            tag,
            NodeTag::Leaf | NodeTag::Choice | NodeTag::AnyData | NodeTag::AnyXml
        ) {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!("refine of mandatory is not applicable to a {tag}"),
            ));
        }
        ctx.schema.node_mut(target).flags.mandatory = mandatory;
    }

    if refine.min_elements.is_some() || refine.max_elements.is_some() {
        match &mut ctx.schema.node_mut(target).kind {
            NodeKind::List {
                min_elements,
                max_elements,
                ..
            }
            | NodeKind::LeafList {
                min_elements,
                max_elements,
                ..
            } => {
                if let Some(min) = refine.min_elements {
                    *min_elements = min;
                }
                if let Some(max) = refine.max_elements {
                    *max_elements = Some(max);
                }
                let (min, max) = (*min_elements, *max_elements);
                if let Some(max) = max {
                    if min > max {
                        return Err(ctx.error(
                            ErrorKind::Semantic,
                            format!("min-elements {min} is greater than max-elements {max}"),
                        ));
                    }
                }
            }
            _ => {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!("refine of element bounds is not applicable to a {tag}"),
                ))
            }
        }
    }

    if !refine.musts.is_empty() {
        let mut musts = refine
            .musts
            .iter()
            .map(|m| crate::model::MustSpec {
                expr: ctx.intern(&m.expr),
                error_message: m.error_message.as_deref().map(|s| ctx.intern(s)),
                error_app_tag: m.error_app_tag.as_deref().map(|s| ctx.intern(s)),
                compiled: None,
            })
            .collect();
        ctx.schema.node_mut(target).musts.append(&mut musts);
    }

    Ok(())
}

/// Remove a node from its parent's child list (or the inlined root set).
fn unlink(ctx: &mut ModuleCtx<'_>, roots: &mut Vec<NodeId>, target: NodeId) {
    if let Some(pos) = roots.iter().position(|&id| id == target) {
        roots.remove(pos);
        return;
    }
    if let Some(parent) = ctx.schema.node(target).parent {
        if let Some(children) = ctx.schema.node_mut(parent).children_mut() {
            children.retain(|&id| id != target);
        }
    }
}

/// Re-inherit `config` through a refined subtree.
fn set_config_recursive(ctx: &mut ModuleCtx<'_>, node: NodeId, config: bool) {
    ctx.schema.node_mut(node).flags.config = config;
    for child in ctx.schema.node(node).children().to_vec() {
        set_config_recursive(ctx, child, config);
    }
}
