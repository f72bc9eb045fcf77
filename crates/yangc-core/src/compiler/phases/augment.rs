//! Augment application.
//!
//! Top-level augments re-target schema nodes anywhere in the compiled
//! tree, addressed by an absolute schema node-id in the augmenting
//! module's view. The augmented node keeps its original module; every
//! added child belongs to the augmenting module.

use crate::compiler::context::ModuleCtx;
use crate::compiler::lookup::{self, ResolveOpts};
use crate::compiler::phases::nodes::{self, Inherited};
use crate::error::{ErrorKind, Result};
use crate::model::{NodeId, NodeKind, NodeTag, NodeTagMask, WhenSpec};
use crate::parsed::{ParsedAugment, ParsedNode};
use crate::path::parse_schema_nodeid;

/// Node types an augment may target.
fn augment_target_mask() -> NodeTagMask {
    NodeTagMask::of(&[
        NodeTag::Container,
        NodeTag::List,
        NodeTag::Choice,
        NodeTag::Case,
        NodeTag::Input,
        NodeTag::Output,
        NodeTag::Notification,
    ])
}

/// Apply all top-level augments of the module under compilation.
pub(crate) fn apply_module_augments(
    ctx: &mut ModuleCtx<'_>,
    augments: &[ParsedAugment],
) -> Result<()> {
    for aug in augments {
        if !ctx.eval_if_features(&aug.if_features)? {
            continue;
        }
        let target = resolve_target(ctx, &aug.target)?;
        apply_augment_at(ctx, target, aug)?;
    }
    Ok(())
}

/// Resolve an absolute augment/deviation target in the view of the module
/// under compilation.
pub(crate) fn resolve_target(ctx: &ModuleCtx<'_>, target: &str) -> Result<NodeId> {
    let path = parse_schema_nodeid(target, true).map_err(|e| ctx.error(e.kind, e.message))?;
    let opts = ResolveOpts::schema_nodeid(augment_target_mask());
    lookup::resolve_path(ctx.schema, ctx.view, None, &path, &opts, &|prefix| {
        ctx.resolve_prefix(prefix)
    })
    .map_err(|e| {
        ctx.error(e.kind, format!("augment target \"{target}\": {}", e.message))
    })
}

/// Apply one augment at an already-resolved target node.
pub(crate) fn apply_augment_at(
    ctx: &mut ModuleCtx<'_>,
    target: NodeId,
    aug: &ParsedAugment,
) -> Result<()> {
    let target_node = ctx.schema.node(target);
    let target_tag = target_node.tag();
    let target_module = target_node.module;
    let cross_module = target_module != ctx.module;

    if !augment_target_mask().accepts(target_tag) {
        return Err(ctx.error(
            ErrorKind::Denied,
            format!("augment cannot target a {target_tag} node"),
        ));
    }

    let inh = Inherited {
        config: target_node.flags.config,
        status: target_node.flags.status,
        ignore_config: inside_state_subtree(ctx, target),
        in_operation: inside_tag(
            ctx,
            target,
            &[NodeTag::Rpc, NodeTag::Action, NodeTag::Input, NodeTag::Output],
        ),
        in_notification: inside_tag(ctx, target, &[NodeTag::Notification]),
    };

    // Compile the added children; inside a choice every alternative gets
    // its implicit case wrapper.
    let mut added = Vec::new();
    if target_tag == NodeTag::Choice {
        for child in &aug.children {
            if let Some(case) = compile_choice_alternative_for_augment(ctx, target, inh, child)? {
                added.push(case);
            }
        }
    } else {
        nodes::compile_children(ctx, Some(target), inh, &aug.children, &mut added)?;
    }

    let mut added_actions = Vec::new();
    let mut added_notifications = Vec::new();
    if matches!(target_tag, NodeTag::Container | NodeTag::List) {
        for action in &aug.actions {
            if let Some(a) = nodes::compile_operation(ctx, Some(target), inh, action, false)? {
                added_actions.push(a);
            }
        }
        for notif in &aug.notifications {
            if let Some(n) = nodes::compile_notification(ctx, Some(target), inh, notif)? {
                added_notifications.push(n);
            }
        }
    } else if !aug.actions.is_empty() || !aug.notifications.is_empty() {
        return Err(ctx.error(
            ErrorKind::Denied,
            format!("augment cannot add operations to a {target_tag} node"),
        ));
    }

    // An augment reaching into another module must not introduce nodes the
    // target module would be forced to instantiate.
    if cross_module && aug.when.is_none() {
        for &id in &added {
            if is_mandatory_addition(ctx, id) {
                let name = ctx.schema.str(ctx.schema.node(id).name).to_owned();
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!(
                        "augment adds mandatory node \"{name}\" to another module without a when condition"
                    ),
                ));
            }
        }
    }

    if let Some(when) = &aug.when {
        let expr = ctx.intern(when);
        for &id in &added {
            ctx.schema.node_mut(id).whens.push(WhenSpec {
                expr,
                compiled: None,
            });
        }
    }

    // Splice into the target's child list with duplicate detection.
    let mut children = ctx.schema.node(target).children().to_vec();
    for id in added {
        nodes::link_child(ctx, &mut children, id)?;
    }
    if let Some(c) = ctx.schema.node_mut(target).children_mut() {
        *c = children;
    }

    if !added_actions.is_empty() || !added_notifications.is_empty() {
        if let NodeKind::Container {
            actions,
            notifications,
            ..
        }
        | NodeKind::List {
            actions,
            notifications,
            ..
        } = &mut ctx.schema.node_mut(target).kind
        {
            actions.extend(added_actions);
            notifications.extend(added_notifications);
        }
    }

    Ok(())
}

/// Compile one augment-into-choice alternative, wrapping shorthand
/// children into implicit cases owned by the augmenting module.
fn compile_choice_alternative_for_augment(
    ctx: &mut ModuleCtx<'_>,
    choice: NodeId,
    inh: Inherited,
    parsed: &ParsedNode,
) -> Result<Option<NodeId>> {
    let mut sink = Vec::new();
    match parsed {
        ParsedNode::Case(_) => {
            nodes::compile_child(ctx, Some(choice), inh, parsed, &mut sink)?;
            Ok(sink.pop())
        }
        ParsedNode::Uses(_) => Err(ctx.error(
            ErrorKind::Denied,
            "uses is not a valid shorthand inside an augmented choice",
        )),
        _ => {
            let name = ctx.intern(parsed.name());
            let mut case = crate::model::CompiledNode::new(
                name,
                ctx.module,
                Some(choice),
                NodeKind::Case {
                    children: Vec::new(),
                },
            );
            case.flags.config = inh.config;
            case.flags.status = inh.status;
            let case_id = ctx
                .schema
                .add_node(case)
                .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
            let mut children = Vec::new();
            nodes::compile_child(ctx, Some(case_id), inh, parsed, &mut children)?;
            if children.is_empty() {
                return Ok(None);
            }
            if let NodeKind::Case { children: c } = &mut ctx.schema.node_mut(case_id).kind {
                *c = children;
            }
            Ok(Some(case_id))
        }
    }
}

/// Whether the node (or, for a list/leaf-list, its bounds) would force
/// instantiation in the target module.
fn is_mandatory_addition(ctx: &ModuleCtx<'_>, id: NodeId) -> bool {
    let node = ctx.schema.node(id);
    if node.flags.mandatory {
        return true;
    }
    match &node.kind {
        NodeKind::List { min_elements, .. } | NodeKind::LeafList { min_elements, .. } => {
            *min_elements > 0
        }
        NodeKind::Case { children } => children
            .iter()
            .any(|&c| is_mandatory_addition(ctx, c)),
        _ => false,
    }
}

/// Whether any ancestor (or the node itself) is one of the given tags.
fn inside_tag(ctx: &ModuleCtx<'_>, node: NodeId, tags: &[NodeTag]) -> bool {
    let mut cursor = Some(node);
    while let Some(id) = cursor {
        if tags.contains(&ctx.schema.node(id).tag()) {
            return true;
        }
        cursor = ctx.schema.node(id).parent;
    }
    false
}

/// Whether the target sits in a subtree where `config` has no meaning.
fn inside_state_subtree(ctx: &ModuleCtx<'_>, node: NodeId) -> bool {
    inside_tag(
        ctx,
        node,
        &[
            NodeTag::Rpc,
            NodeTag::Action,
            NodeTag::Input,
            NodeTag::Output,
            NodeTag::Notification,
        ],
    )
}
