//! Deviation application.
//!
//! Deviations run after all augments of a module and before the final
//! sweep. Four operations exist: `not-supported` removes the target
//! (idempotent, overrides everything else), `add`/`replace`/`delete`
//! adjust a bounded property set. Deviations from multiple modules apply
//! in context load order; two modules replacing the same property of one
//! target is a conflict.

use std::collections::{HashMap, HashSet};

use crate::compiler::context::ModuleCtx;
use crate::compiler::lookup::{self, ResolveOpts};
use crate::compiler::phases::types;
use crate::compiler::value;
use crate::error::{ErrorKind, Result};
use crate::model::{ModuleId, NodeId, NodeKind, NodeTagMask, UniqueSpec};
use crate::parsed::{DeviateProperties, ParsedDeviate, ParsedDeviation};
use crate::path::parse_schema_nodeid;

/// Deviation bookkeeping that outlives a single module compile.
#[derive(Clone, Debug, Default)]
pub struct DeviationLog {
    /// `(target, property)` -> module that already replaced it.
    replaced: HashMap<(NodeId, &'static str), ModuleId>,
    /// Canonical paths removed by `not-supported`.
    removed: HashSet<String>,
}

/// Render a deviation target with every prefix resolved to its module
/// name, so different deviators produce the same key.
fn canonical_target(ctx: &ModuleCtx<'_>, target: &str) -> Result<String> {
    let path = parse_schema_nodeid(target, true).map_err(|e| ctx.error(e.kind, e.message))?;
    let mut out = String::new();
    for step in &path.steps {
        let module = match &step.prefix {
            Some(prefix) => ctx.resolve_prefix(prefix)?,
            None => ctx.view,
        };
        out.push('/');
        out.push_str(ctx.schema.str(ctx.schema.module(module).name));
        out.push(':');
        out.push_str(&step.name);
    }
    Ok(out)
}

/// Apply all deviations of the module under compilation.
pub(crate) fn apply_deviations(
    ctx: &mut ModuleCtx<'_>,
    deviations: &[ParsedDeviation],
    log: &mut DeviationLog,
) -> Result<()> {
    for deviation in deviations {
        apply_deviation(ctx, deviation, log)?;
    }
    Ok(())
}

fn apply_deviation(
    ctx: &mut ModuleCtx<'_>,
    deviation: &ParsedDeviation,
    log: &mut DeviationLog,
) -> Result<()> {
    let canonical = canonical_target(ctx, &deviation.target)?;

    let path =
        parse_schema_nodeid(&deviation.target, true).map_err(|e| ctx.error(e.kind, e.message))?;
    let opts = ResolveOpts::schema_nodeid(NodeTagMask::ANY);
    let resolved = lookup::resolve_path(ctx.schema, ctx.view, None, &path, &opts, &|prefix| {
        ctx.resolve_prefix(prefix)
    });

    let target = match resolved {
        Ok(id) => id,
        Err(_) if log.removed.contains(&canonical) => {
            // Already removed by an earlier not-supported; any further
            // deviation of the target is moot.
            return Ok(());
        }
        Err(e) => {
            return Err(ctx.error(
                e.kind,
                format!("deviation target \"{}\": {}", deviation.target, e.message),
            ))
        }
    };

    for deviate in &deviation.deviates {
        match deviate {
            ParsedDeviate::NotSupported => {
                remove_node(ctx, target);
                log.removed.insert(canonical.clone());
                return Ok(());
            }
            ParsedDeviate::Add(props) => deviate_add(ctx, target, props)?,
            ParsedDeviate::Replace(props) => deviate_replace(ctx, target, props, log)?,
            ParsedDeviate::Delete(props) => deviate_delete(ctx, target, props)?,
        }
    }
    ctx.touched.push(target);
    Ok(())
}

/// Unlink a node from its parent's child list or from the module's top
/// level.
fn remove_node(ctx: &mut ModuleCtx<'_>, target: NodeId) {
    match ctx.schema.node(target).parent {
        Some(parent) => {
            if let Some(children) = ctx.schema.node_mut(parent).children_mut() {
                children.retain(|&id| id != target);
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
            } = &mut ctx.schema.node_mut(parent).kind
            {
                actions.retain(|&id| id != target);
                notifications.retain(|&id| id != target);
            }
        }
        None => {
            let module = ctx.schema.node(target).module;
            let record = ctx.schema.module_mut(module);
            record.data.retain(|&id| id != target);
            record.rpcs.retain(|&id| id != target);
            record.notifications.retain(|&id| id != target);
        }
    }
}

fn deviate_add(ctx: &mut ModuleCtx<'_>, target: NodeId, props: &DeviateProperties) -> Result<()> {
    if props.typ.is_some() {
        return Err(ctx.error(
            ErrorKind::Denied,
            "deviate add cannot carry a type; use replace",
        ));
    }

    if let Some(units) = &props.units {
        let interned = ctx.intern(units);
        match &mut ctx.schema.node_mut(target).kind {
            NodeKind::Leaf { units: u, .. } | NodeKind::LeafList { units: u, .. } => {
                if u.is_some() {
                    return Err(ctx.error(
                        ErrorKind::Exists,
                        "deviate add of units, but units already exist",
                    ));
                }
                *u = Some(interned);
            }
            _ => return Err(ctx.error(ErrorKind::Denied, "units apply only to leaf kinds")),
        }
    }

    if !props.defaults.is_empty() {
        add_defaults(ctx, target, &props.defaults, false)?;
    }

    if let Some(config) = props.config {
        set_config(ctx, target, config);
    }
    if let Some(mandatory) = props.mandatory {
        ctx.schema.node_mut(target).flags.mandatory = mandatory;
    }
    apply_bounds(ctx, target, props)?;

    for must in &props.musts {
        let expr = ctx.intern(must);
        ctx.schema.node_mut(target).musts.push(crate::model::MustSpec {
            expr,
            error_message: None,
            error_app_tag: None,
            compiled: None,
        });
    }

    for unique in &props.uniques {
        let tags: Vec<_> = unique.split_whitespace().map(|t| ctx.intern(t)).collect();
        match &mut ctx.schema.node_mut(target).kind {
            NodeKind::List { uniques, .. } => uniques.push(UniqueSpec {
                tags,
                leaves: Vec::new(),
            }),
            _ => return Err(ctx.error(ErrorKind::Denied, "unique applies only to lists")),
        }
        ctx.pending_lists.push(target);
    }

    Ok(())
}

fn deviate_replace(
    ctx: &mut ModuleCtx<'_>,
    target: NodeId,
    props: &DeviateProperties,
    log: &mut DeviationLog,
) -> Result<()> {
    let replace = |ctx: &ModuleCtx<'_>, log: &mut DeviationLog, prop: &'static str| {
        if let Some(&other) = log.replaced.get(&(target, prop)) {
            if other != ctx.module {
                let other_name = ctx.schema.str(ctx.schema.module(other).name).to_owned();
                return Err(ctx.error(
                    ErrorKind::Conflict,
                    format!(
                        "property \"{prop}\" of the deviation target was already replaced by module \"{other_name}\""
                    ),
                ));
            }
        }
        log.replaced.insert((target, prop), ctx.module);
        Ok(())
    };

    if let Some(parsed_type) = &props.typ {
        replace(ctx, log, "type")?;
        let typ = types::compile_type(ctx, parsed_type)?;
        match &mut ctx.schema.node_mut(target).kind {
            NodeKind::Leaf { typ: t, .. } | NodeKind::LeafList { typ: t, .. } => *t = typ,
            _ => {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    "deviate replace of type applies only to leaf kinds",
                ))
            }
        }
        types::collect_leafref_uses(ctx.schema, typ, target, &mut ctx.pending_leafrefs);
        // An existing default must still fit the new type.
        let default = match &ctx.schema.node(target).kind {
            NodeKind::Leaf { default, .. } => default.map(|d| vec![d]),
            NodeKind::LeafList { defaults, .. } => Some(defaults.clone()),
            _ => None,
        };
        for d in default.unwrap_or_default() {
            let text = ctx.schema.str(d).to_owned();
            value::check_value(ctx.schema, ctx.module, typ, &text)
                .map_err(|e| ctx.error(e.kind, e.message))?;
        }
    }

    if let Some(units) = &props.units {
        replace(ctx, log, "units")?;
        let interned = ctx.intern(units);
        match &mut ctx.schema.node_mut(target).kind {
            NodeKind::Leaf { units: u, .. } | NodeKind::LeafList { units: u, .. } => {
                if u.is_none() {
                    return Err(ctx.error(
                        ErrorKind::NotFound,
                        "deviate replace of units, but no units exist",
                    ));
                }
                *u = Some(interned);
            }
            _ => return Err(ctx.error(ErrorKind::Denied, "units apply only to leaf kinds")),
        }
    }

    if !props.defaults.is_empty() {
        replace(ctx, log, "default")?;
        add_defaults(ctx, target, &props.defaults, true)?;
    }

    if let Some(config) = props.config {
        replace(ctx, log, "config")?;
        set_config(ctx, target, config);
    }
    if let Some(mandatory) = props.mandatory {
        replace(ctx, log, "mandatory")?;
        ctx.schema.node_mut(target).flags.mandatory = mandatory;
    }
    if props.min_elements.is_some() {
        replace(ctx, log, "min-elements")?;
    }
    if props.max_elements.is_some() {
        replace(ctx, log, "max-elements")?;
    }
    apply_bounds(ctx, target, props)?;

    Ok(())
}

fn deviate_delete(
    ctx: &mut ModuleCtx<'_>,
    target: NodeId,
    props: &DeviateProperties,
) -> Result<()> {
    if let Some(units) = &props.units {
        let expected = ctx.schema.find_str(units);
        match &mut ctx.schema.node_mut(target).kind {
            NodeKind::Leaf { units: u, .. } | NodeKind::LeafList { units: u, .. } => {
                if u.is_none() || *u != expected {
                    return Err(ctx.error(
                        ErrorKind::NotFound,
                        "deviate delete of units does not match the existing value",
                    ));
                }
                *u = None;
            }
            _ => return Err(ctx.error(ErrorKind::Denied, "units apply only to leaf kinds")),
        }
    }

    for default in &props.defaults {
        let expected = ctx.schema.find_str(default);
        // The default case of a choice is matched by name.
        let default_case_matches = match &ctx.schema.node(target).kind {
            NodeKind::Choice { default_case, .. } => expected.is_some_and(|name| {
                default_case.is_some_and(|c| ctx.schema.node(c).name == name)
            }),
            _ => false,
        };
        let matched = match &mut ctx.schema.node_mut(target).kind {
            NodeKind::Leaf { default: d, .. } => {
                if d.is_some() && *d == expected {
                    *d = None;
                    true
                } else {
                    false
                }
            }
            NodeKind::LeafList { defaults, .. } => match expected {
                Some(id) if defaults.contains(&id) => {
                    defaults.retain(|&v| v != id);
                    true
                }
                _ => false,
            },
            NodeKind::Choice { default_case, .. } => {
                if default_case_matches {
                    *default_case = None;
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        if !matched {
            return Err(ctx.error(
                ErrorKind::NotFound,
                format!("deviate delete of default \"{default}\" does not match"),
            ));
        }
    }

    for must in &props.musts {
        let expected = ctx.schema.find_str(must);
        let node = ctx.schema.node_mut(target);
        let before = node.musts.len();
        if let Some(expected) = expected {
            node.musts.retain(|m| m.expr != expected);
        }
        if node.musts.len() == before {
            return Err(ctx.error(
                ErrorKind::NotFound,
                format!("deviate delete of must \"{must}\" does not match"),
            ));
        }
    }

    for unique in &props.uniques {
        let tags: Vec<_> = unique
            .split_whitespace()
            .map(|t| ctx.schema.find_str(t))
            .collect();
        let removed = match &mut ctx.schema.node_mut(target).kind {
            NodeKind::List { uniques, .. } => {
                let before = uniques.len();
                if tags.iter().all(Option::is_some) {
                    let tags: Vec<_> = tags.into_iter().flatten().collect();
                    uniques.retain(|u| u.tags != tags);
                }
                uniques.len() != before
            }
            _ => false,
        };
        if !removed {
            return Err(ctx.error(
                ErrorKind::NotFound,
                format!("deviate delete of unique \"{unique}\" does not match"),
            ));
        }
    }

    Ok(())
}

fn add_defaults(
    ctx: &mut ModuleCtx<'_>,
    target: NodeId,
    defaults: &[String],
    replacing: bool,
) -> Result<()> {
    match &ctx.schema.node(target).kind {
        NodeKind::Leaf { typ, default, .. } => {
            if defaults.len() != 1 {
                return Err(ctx.error(ErrorKind::Denied, "a leaf takes exactly one default"));
            }
            if !replacing && default.is_some() {
                return Err(ctx.error(
                    ErrorKind::Exists,
                    "deviate add of default, but a default already exists",
                ));
            }
            if replacing && default.is_none() {
                return Err(ctx.error(
                    ErrorKind::NotFound,
                    "deviate replace of default, but no default exists",
                ));
            }
            let typ = *typ;
            value::check_value(ctx.schema, ctx.module, typ, &defaults[0])
                .map_err(|e| ctx.error(e.kind, e.message))?;
            let interned = ctx.intern(&defaults[0]);
            if let NodeKind::Leaf { default, .. } = &mut ctx.schema.node_mut(target).kind {
                *default = Some(interned);
            }
            Ok(())
        }
        NodeKind::LeafList { typ, .. } => {
            let typ = *typ;
            for d in defaults {
                value::check_value(ctx.schema, ctx.module, typ, d)
                    .map_err(|e| ctx.error(e.kind, e.message))?;
            }
            let interned: Vec<_> = defaults.iter().map(|d| ctx.intern(d)).collect();
            if let NodeKind::LeafList { defaults: out, .. } = &mut ctx.schema.node_mut(target).kind
            {
                if replacing {
                    *out = interned;
                } else {
                    out.extend(interned);
                }
            }
            Ok(())
        }
        NodeKind::Choice { .. } => {
            let name = &defaults[0];
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
                    format!("default case \"{name}\" not found in the deviated choice"),
                ));
            };
            if let NodeKind::Choice { default_case, .. } = &mut ctx.schema.node_mut(target).kind {
                *default_case = Some(case);
            }
            Ok(())
        }
        _ => Err(ctx.error(
            ErrorKind::Denied,
            "defaults apply only to leaf, leaf-list and choice",
        )),
    }
}

fn apply_bounds(ctx: &mut ModuleCtx<'_>, target: NodeId, props: &DeviateProperties) -> Result<()> {
    if props.min_elements.is_none() && props.max_elements.is_none() {
        return Ok(());
    }
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
            if let Some(min) = props.min_elements {
                *min_elements = min;
            }
            if let Some(max) = props.max_elements {
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
            Ok(())
        }
        _ => Err(ctx.error(
            ErrorKind::Denied,
            "element bounds apply only to lists and leaf-lists",
        )),
    }
}

fn set_config(ctx: &mut ModuleCtx<'_>, node: NodeId, config: bool) {
    ctx.schema.node_mut(node).flags.config = config;
    for child in ctx.schema.node(node).children().to_vec() {
        set_config(ctx, child, config);
    }
}
