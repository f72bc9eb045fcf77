//! Node compilation.
//!
//! One compile routine per statement family. Input is a parsed node plus
//! the parent compiled node (or module root) and the inherited flags;
//! output is zero or more compiled nodes attached to the parent. A node
//! whose `if-feature` guards evaluate to false is not compiled at all.

use crate::compiler::context::ModuleCtx;
use crate::compiler::phases::{types, uses};
use crate::compiler::value;
use crate::error::{ErrorKind, Result};
use crate::model::{
    BaseType, CompiledNode, ExtInstance, MustSpec, NodeFlags, NodeId, NodeKind, Status, StrId,
    UniqueSpec, WhenSpec, YangVersion,
};
use crate::parsed::{
    ParsedAny, ParsedCase, ParsedChoice, ParsedCommon, ParsedContainer, ParsedExtInstance,
    ParsedInOut, ParsedLeaf, ParsedLeafList, ParsedList, ParsedMust, ParsedNode,
    ParsedNotification, ParsedOperation,
};
use crate::plugins::{self, ExtHookPhase, ExtHost};

/// Flags inherited top-down while descending the statement tree.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Inherited {
    /// Parent's effective `config`.
    pub config: bool,
    /// Parent's effective status.
    pub status: Status,
    /// Inside an operation or notification subtree, where `config` has no
    /// meaning and everything is state.
    pub ignore_config: bool,
    /// Inside an rpc or action; nested actions and notifications are
    /// disallowed.
    pub in_operation: bool,
    /// Inside a notification.
    pub in_notification: bool,
}

impl Default for Inherited {
    fn default() -> Self {
        Self {
            config: true,
            status: Status::Current,
            ignore_config: false,
            in_operation: false,
            in_notification: false,
        }
    }
}

impl Inherited {
    /// Inherited flags seen by the children of `flags`.
    fn child_of(&self, flags: NodeFlags) -> Self {
        Self {
            config: flags.config,
            status: flags.status,
            ..*self
        }
    }
}

/// Attach a child to a sibling list, rejecting duplicate `(module, name)`
/// pairs.
pub(crate) fn link_child(
    ctx: &ModuleCtx<'_>,
    children: &mut Vec<NodeId>,
    id: NodeId,
) -> Result<()> {
    let node = ctx.schema.node(id);
    let duplicate = children.iter().any(|&sibling| {
        let s = ctx.schema.node(sibling);
        s.name == node.name && s.module == node.module
    });
    if duplicate {
        let name = ctx.schema.str(node.name).to_owned();
        return Err(ctx.error(
            ErrorKind::Exists,
            format!("duplicate node name \"{name}\" among siblings"),
        ));
    }
    children.push(id);
    Ok(())
}

/// Resolved common statement properties.
struct Shaped {
    name: StrId,
    flags: NodeFlags,
    whens: Vec<WhenSpec>,
    exts: Vec<ParsedExtInstance>,
}

/// Resolve the shared properties of a statement. `None` means the node is
/// gated out by `if-feature`.
fn shape(
    ctx: &mut ModuleCtx<'_>,
    common: &ParsedCommon,
    inh: &Inherited,
) -> Result<Option<Shaped>> {
    if !ctx.eval_if_features(&common.if_features)? {
        return Ok(None);
    }

    let config = if inh.ignore_config {
        false
    } else {
        match common.config {
            Some(true) if !inh.config => {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!(
                        "node \"{}\" cannot be config true under a config false parent",
                        common.name
                    ),
                ))
            }
            Some(explicit) => explicit,
            None => inh.config,
        }
    };

    let status = match types::parse_status(ctx, common.status.as_deref())? {
        Some(explicit) => {
            if explicit < inh.status {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!(
                        "status {} of \"{}\" conflicts with status {} of its parent",
                        explicit.as_str(),
                        common.name,
                        inh.status.as_str()
                    ),
                ));
            }
            explicit
        }
        None => inh.status,
    };

    let whens = match &common.when {
        Some(expr) => {
            let expr = ctx.intern(expr);
            vec![WhenSpec {
                expr,
                compiled: None,
            }]
        }
        None => Vec::new(),
    };

    Ok(Some(Shaped {
        name: ctx.intern(&common.name),
        flags: NodeFlags {
            config,
            status,
            mandatory: false,
            ordered_by_user: false,
        },
        whens,
        exts: common.exts.clone(),
    }))
}

fn compile_musts(ctx: &mut ModuleCtx<'_>, musts: &[ParsedMust]) -> Vec<MustSpec> {
    musts
        .iter()
        .map(|m| MustSpec {
            expr: ctx.intern(&m.expr),
            error_message: m.error_message.as_deref().map(|s| ctx.intern(s)),
            error_app_tag: m.error_app_tag.as_deref().map(|s| ctx.intern(s)),
            compiled: None,
        })
        .collect()
}

/// Resolve extension instances and dispatch node-phase plugins; tree-phase
/// plugins are queued for after the tree is complete.
pub(crate) fn attach_extensions(
    ctx: &mut ModuleCtx<'_>,
    host: ExtHost,
    parsed_exts: &[ParsedExtInstance],
) -> Result<()> {
    for parsed in parsed_exts {
        let (module, name) = ctx.resolve_prefixed(&parsed.name)?;
        let name_id = ctx.intern(&name);
        let def = ctx.schema.find_extension(module, name_id).ok_or_else(|| {
            ctx.error(
                ErrorKind::Reference,
                format!("unknown extension \"{}\"", parsed.name),
            )
        })?;
        let argument = parsed.argument.as_deref().map(|a| ctx.intern(a));
        let inst = ExtInstance::new(def, argument);

        let index = match host {
            ExtHost::Node(id) => {
                let node = ctx.schema.node_mut(id);
                node.exts.push(inst);
                node.exts.len() - 1
            }
            ExtHost::Module(id) => {
                let module = ctx.schema.module_mut(id);
                module.exts.push(inst);
                module.exts.len() - 1
            }
        };

        let def_module = ctx
            .schema
            .str(ctx.schema.module(ctx.schema.extension(def).module).name)
            .to_owned();
        let def_name = ctx.schema.str(ctx.schema.extension(def).name).to_owned();
        if let Some(plugin) = plugins::find(&def_module, &def_name) {
            match plugin.phase() {
                ExtHookPhase::Node => {
                    plugin
                        .compile(ctx.schema, host, index)
                        .map_err(|e| e.in_module(ctx.module_name().to_owned()))?;
                }
                ExtHookPhase::Tree => ctx.tree_exts.push((host, index, def)),
            }
        }
    }
    Ok(())
}

/// Compile a list of statements into children of `parent`.
pub(crate) fn compile_children(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    nodes: &[ParsedNode],
    sink: &mut Vec<NodeId>,
) -> Result<()> {
    for node in nodes {
        compile_child(ctx, parent, inh, node, sink)?;
    }
    Ok(())
}

/// Compile one statement, attaching the result (if not feature-gated) to
/// `sink`.
pub(crate) fn compile_child(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    node: &ParsedNode,
    sink: &mut Vec<NodeId>,
) -> Result<()> {
    let compiled = match node {
        ParsedNode::Container(c) => compile_container(ctx, parent, inh, c)?,
        ParsedNode::Leaf(l) => compile_leaf(ctx, parent, inh, l)?,
        ParsedNode::LeafList(l) => compile_leaf_list(ctx, parent, inh, l)?,
        ParsedNode::List(l) => compile_list(ctx, parent, inh, l)?,
        ParsedNode::Choice(c) => compile_choice(ctx, parent, inh, c)?,
        ParsedNode::Case(c) => compile_case(ctx, parent, inh, c)?,
        ParsedNode::AnyData(a) => {
            if ctx.version < YangVersion::V1_1 {
                return Err(ctx.error(ErrorKind::Denied, "anydata requires YANG 1.1"));
            }
            compile_any(ctx, parent, inh, a, NodeKind::AnyData)?
        }
        ParsedNode::AnyXml(a) => compile_any(ctx, parent, inh, a, NodeKind::AnyXml)?,
        ParsedNode::Uses(u) => {
            return uses::expand_uses(ctx, parent, inh, u, sink);
        }
    };
    if let Some(id) = compiled {
        link_child(ctx, sink, id)?;
    }
    Ok(())
}

fn compile_container(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedContainer,
) -> Result<Option<NodeId>> {
    let Some(shaped) = shape(ctx, &parsed.common, &inh)? else {
        return Ok(None);
    };
    ctx.path.push(parsed.common.name.clone());

    let presence = parsed.presence.as_deref().map(|p| ctx.intern(p));
    let mut node = CompiledNode::new(
        shaped.name,
        ctx.module,
        parent,
        NodeKind::Container {
            presence,
            children: Vec::new(),
            actions: Vec::new(),
            notifications: Vec::new(),
        },
    );
    node.flags = shaped.flags;
    node.whens = shaped.whens;
    node.musts = compile_musts(ctx, &parsed.musts);
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
    attach_extensions(ctx, ExtHost::Node(id), &shaped.exts)?;

    ctx.typedef_scopes.push(parsed.typedefs.clone());
    ctx.grouping_scopes.push(parsed.groupings.clone());

    let child_inh = inh.child_of(shaped.flags);
    let mut children = Vec::new();
    let result = compile_children(ctx, Some(id), child_inh, &parsed.children, &mut children)
        .and_then(|()| {
            let mut actions = Vec::new();
            for action in &parsed.actions {
                if let Some(a) = compile_operation(ctx, Some(id), child_inh, action, false)? {
                    link_child(ctx, &mut actions, a)?;
                }
            }
            let mut notifications = Vec::new();
            for notif in &parsed.notifications {
                if let Some(n) = compile_notification(ctx, Some(id), child_inh, notif)? {
                    link_child(ctx, &mut notifications, n)?;
                }
            }
            Ok((actions, notifications))
        });

    ctx.grouping_scopes.pop();
    ctx.typedef_scopes.pop();
    ctx.path.pop();
    let (actions, notifications) = result?;

    if let NodeKind::Container {
        children: c,
        actions: a,
        notifications: n,
        ..
    } = &mut ctx.schema.node_mut(id).kind
    {
        *c = children;
        *a = actions;
        *n = notifications;
    }
    Ok(Some(id))
}

fn compile_leaf(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedLeaf,
) -> Result<Option<NodeId>> {
    let Some(shaped) = shape(ctx, &parsed.common, &inh)? else {
        return Ok(None);
    };
    ctx.path.push(parsed.common.name.clone());

    let typ = types::compile_type(ctx, &parsed.typ)?;
    let type_record = ctx.schema.typ(typ);
    let type_units = type_record.units;
    let type_default = type_record.default;

    let mandatory = parsed.mandatory.unwrap_or(false);
    if mandatory && parsed.default.is_some() {
        let err = ctx.error(
            ErrorKind::Semantic,
            "a mandatory leaf must not have a default value",
        );
        ctx.path.pop();
        return Err(err);
    }

    let units = match &parsed.units {
        Some(u) => Some(ctx.intern(u)),
        None => type_units,
    };
    // The typedef default is ignored on a mandatory leaf.
    let default = match &parsed.default {
        Some(d) => Some(ctx.intern(d)),
        None if mandatory => {
            if type_default.is_some() {
                ctx.warn(
                    ErrorKind::Semantic,
                    format!(
                        "default value of the type is ignored on mandatory leaf \"{}\"",
                        parsed.common.name
                    ),
                );
            }
            None
        }
        None => type_default,
    };

    if let Some(default) = default {
        let text = ctx.schema.str(default).to_owned();
        if let Err(e) = value::check_value(ctx.schema, ctx.module, typ, &text) {
            let err = ctx.error(e.kind, e.message);
            ctx.path.pop();
            return Err(err);
        }
    }

    let mut node = CompiledNode::new(
        shaped.name,
        ctx.module,
        parent,
        NodeKind::Leaf {
            typ,
            units,
            default,
            is_key: false,
        },
    );
    node.flags = shaped.flags;
    node.flags.mandatory = mandatory;
    node.whens = shaped.whens;
    node.musts = compile_musts(ctx, &parsed.musts);
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
    attach_extensions(ctx, ExtHost::Node(id), &shaped.exts)?;
    types::collect_leafref_uses(ctx.schema, typ, id, &mut ctx.pending_leafrefs);

    ctx.path.pop();
    Ok(Some(id))
}

fn compile_leaf_list(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedLeafList,
) -> Result<Option<NodeId>> {
    let Some(shaped) = shape(ctx, &parsed.common, &inh)? else {
        return Ok(None);
    };
    ctx.path.push(parsed.common.name.clone());

    let result = (|ctx: &mut ModuleCtx<'_>| {
        let typ = types::compile_type(ctx, &parsed.typ)?;

        if !parsed.defaults.is_empty() && ctx.version < YangVersion::V1_1 {
            return Err(ctx.error(
                ErrorKind::Denied,
                "default values on a leaf-list require YANG 1.1",
            ));
        }

        let min_elements = parsed.min_elements.unwrap_or(0);
        let max_elements = parsed.max_elements;
        if let Some(max) = max_elements {
            if min_elements > max {
                return Err(ctx.error(
                    ErrorKind::Semantic,
                    format!("min-elements {min_elements} is greater than max-elements {max}"),
                ));
            }
        }
        if min_elements > 0 && !parsed.defaults.is_empty() {
            return Err(ctx.error(
                ErrorKind::Semantic,
                "default values are not allowed with min-elements greater than 0",
            ));
        }

        let mut defaults = Vec::with_capacity(parsed.defaults.len());
        for default in &parsed.defaults {
            value::check_value(ctx.schema, ctx.module, typ, default)
                .map_err(|e| ctx.error(e.kind, e.message))?;
            defaults.push(ctx.intern(default));
        }

        let type_units = ctx.schema.typ(typ).units;
        let units = match &parsed.units {
            Some(u) => Some(ctx.intern(u)),
            None => type_units,
        };

        let mut node = CompiledNode::new(
            shaped.name,
            ctx.module,
            parent,
            NodeKind::LeafList {
                typ,
                units,
                defaults,
                min_elements,
                max_elements,
            },
        );
        node.flags = shaped.flags;
        node.flags.ordered_by_user = parsed.ordered_by_user;
        node.whens = shaped.whens;
        node.musts = compile_musts(ctx, &parsed.musts);
        let id = ctx
            .schema
            .add_node(node)
            .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
        attach_extensions(ctx, ExtHost::Node(id), &shaped.exts)?;
        types::collect_leafref_uses(ctx.schema, typ, id, &mut ctx.pending_leafrefs);
        Ok(id)
    })(ctx);

    ctx.path.pop();
    result.map(Some)
}

fn compile_list(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedList,
) -> Result<Option<NodeId>> {
    let Some(shaped) = shape(ctx, &parsed.common, &inh)? else {
        return Ok(None);
    };
    ctx.path.push(parsed.common.name.clone());

    let min_elements = parsed.min_elements.unwrap_or(0);
    let max_elements = parsed.max_elements;
    if let Some(max) = max_elements {
        if min_elements > max {
            let err = ctx.error(
                ErrorKind::Semantic,
                format!("min-elements {min_elements} is greater than max-elements {max}"),
            );
            ctx.path.pop();
            return Err(err);
        }
    }

    let uniques = parsed
        .uniques
        .iter()
        .map(|u| UniqueSpec {
            tags: u.split_whitespace().map(|t| ctx.intern(t)).collect(),
            leaves: Vec::new(),
        })
        .collect();

    let mut node = CompiledNode::new(
        shaped.name,
        ctx.module,
        parent,
        NodeKind::List {
            keys: Vec::new(),
            uniques,
            children: Vec::new(),
            actions: Vec::new(),
            notifications: Vec::new(),
            min_elements,
            max_elements,
        },
    );
    node.flags = shaped.flags;
    node.flags.ordered_by_user = parsed.ordered_by_user;
    node.whens = shaped.whens;
    node.musts = compile_musts(ctx, &parsed.musts);
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
    attach_extensions(ctx, ExtHost::Node(id), &shaped.exts)?;

    ctx.typedef_scopes.push(parsed.typedefs.clone());
    ctx.grouping_scopes.push(parsed.groupings.clone());

    let child_inh = inh.child_of(shaped.flags);
    let mut children = Vec::new();
    let result = compile_children(ctx, Some(id), child_inh, &parsed.children, &mut children)
        .and_then(|()| {
            let mut actions = Vec::new();
            for action in &parsed.actions {
                if let Some(a) = compile_operation(ctx, Some(id), child_inh, action, false)? {
                    link_child(ctx, &mut actions, a)?;
                }
            }
            let mut notifications = Vec::new();
            for notif in &parsed.notifications {
                if let Some(n) = compile_notification(ctx, Some(id), child_inh, notif)? {
                    link_child(ctx, &mut notifications, n)?;
                }
            }
            Ok((actions, notifications))
        })
        .and_then(|(actions, notifications)| {
            let keys = resolve_keys(ctx, id, parsed, &children, shaped.flags)?;
            Ok((actions, notifications, keys))
        });

    ctx.grouping_scopes.pop();
    ctx.typedef_scopes.pop();
    ctx.path.pop();
    let (actions, notifications, keys) = result?;

    if let NodeKind::List {
        keys: k,
        children: c,
        actions: a,
        notifications: n,
        ..
    } = &mut ctx.schema.node_mut(id).kind
    {
        *k = keys;
        *c = children;
        *a = actions;
        *n = notifications;
    }
    ctx.pending_lists.push(id);
    Ok(Some(id))
}

/// Resolve the `key` argument: an ordered list of direct-child leaf names.
/// Key leaves become mandatory and their config must match the list's.
fn resolve_keys(
    ctx: &mut ModuleCtx<'_>,
    _list: NodeId,
    parsed: &ParsedList,
    children: &[NodeId],
    list_flags: NodeFlags,
) -> Result<Vec<NodeId>> {
    let Some(key_arg) = &parsed.key else {
        // Inside operations and notifications config is forced false, so
        // this only fires on true configuration lists.
        if list_flags.config {
            return Err(ctx.error(
                ErrorKind::Semantic,
                format!("config list \"{}\" must have a key", parsed.common.name),
            ));
        }
        return Ok(Vec::new());
    };

    let mut keys: Vec<NodeId> = Vec::new();
    for name in key_arg.split_whitespace() {
        let Some(name_id) = ctx.schema.find_str(name) else {
            return Err(ctx.error(
                ErrorKind::Reference,
                format!("key leaf \"{name}\" not found in the list"),
            ));
        };
        let found = children.iter().copied().find(|&c| {
            let node = ctx.schema.node(c);
            node.name == name_id && node.module == ctx.module
        });
        let Some(key) = found else {
            return Err(ctx.error(
                ErrorKind::Reference,
                format!("key leaf \"{name}\" not found in the list"),
            ));
        };
        if keys.contains(&key) {
            return Err(ctx.error(
                ErrorKind::Exists,
                format!("duplicate key leaf \"{name}\""),
            ));
        }

        let node = ctx.schema.node(key);
        let typ = match &node.kind {
            NodeKind::Leaf { typ, .. } => *typ,
            _ => {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!("key \"{name}\" is not a leaf"),
                ))
            }
        };
        if ctx.schema.typ(typ).base == BaseType::Empty {
            return Err(ctx.error(
                ErrorKind::Semantic,
                format!("key leaf \"{name}\" must not be of type empty"),
            ));
        }
        if node.flags.config != list_flags.config {
            return Err(ctx.error(
                ErrorKind::Semantic,
                format!("key leaf \"{name}\" config does not match the list"),
            ));
        }

        let node = ctx.schema.node_mut(key);
        node.flags.mandatory = true;
        if let NodeKind::Leaf { is_key, default, .. } = &mut node.kind {
            *is_key = true;
            // A key is always present; a default would never apply.
            *default = None;
        }
        keys.push(key);
    }
    Ok(keys)
}

fn compile_choice(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedChoice,
) -> Result<Option<NodeId>> {
    let Some(shaped) = shape(ctx, &parsed.common, &inh)? else {
        return Ok(None);
    };
    ctx.path.push(parsed.common.name.clone());

    let mandatory = parsed.mandatory.unwrap_or(false);
    if mandatory && parsed.default_case.is_some() {
        let err = ctx.error(
            ErrorKind::Semantic,
            "a mandatory choice must not have a default case",
        );
        ctx.path.pop();
        return Err(err);
    }

    let mut node = CompiledNode::new(
        shaped.name,
        ctx.module,
        parent,
        NodeKind::Choice {
            cases: Vec::new(),
            default_case: None,
        },
    );
    node.flags = shaped.flags;
    node.flags.mandatory = mandatory;
    node.whens = shaped.whens;
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
    attach_extensions(ctx, ExtHost::Node(id), &shaped.exts)?;

    let child_inh = inh.child_of(shaped.flags);
    let mut cases = Vec::new();
    let result = (|ctx: &mut ModuleCtx<'_>| {
        for child in &parsed.children {
            let case = compile_choice_alternative(ctx, id, child_inh, child)?;
            if let Some(case) = case {
                link_child(ctx, &mut cases, case)?;
            }
        }

        let default_case = match &parsed.default_case {
            Some(name) => {
                let name_id = ctx.schema.find_str(name);
                let found = name_id.and_then(|n| {
                    cases
                        .iter()
                        .copied()
                        .find(|&c| ctx.schema.node(c).name == n)
                });
                let Some(case) = found else {
                    return Err(ctx.error(
                        ErrorKind::NotFound,
                        format!("default case \"{name}\" not found in the choice"),
                    ));
                };
                // The default case must be able to exist implicitly.
                let has_mandatory = ctx
                    .schema
                    .node(case)
                    .children()
                    .iter()
                    .any(|&c| ctx.schema.node(c).flags.mandatory);
                if has_mandatory {
                    return Err(ctx.error(
                        ErrorKind::Semantic,
                        format!("default case \"{name}\" must not contain mandatory nodes"),
                    ));
                }
                Some(case)
            }
            None => None,
        };
        Ok(default_case)
    })(ctx);

    ctx.path.pop();
    let default_case = result?;

    if let NodeKind::Choice {
        cases: c,
        default_case: d,
    } = &mut ctx.schema.node_mut(id).kind
    {
        *c = cases;
        *d = default_case;
    }
    Ok(Some(id))
}

/// Compile one alternative of a choice: an explicit case, or a shorthand
/// child wrapped in an implicit case of the same name.
fn compile_choice_alternative(
    ctx: &mut ModuleCtx<'_>,
    choice: NodeId,
    inh: Inherited,
    parsed: &ParsedNode,
) -> Result<Option<NodeId>> {
    if let ParsedNode::Case(case) = parsed {
        return compile_case(ctx, Some(choice), inh, case);
    }
    if let ParsedNode::Uses(_) = parsed {
        return Err(ctx.error(
            ErrorKind::Denied,
            "uses is not a valid shorthand inside a choice",
        ));
    }

    // Shorthand: synthesize the implicit case wrapper.
    let name = ctx.intern(parsed.name());
    let mut case_node = CompiledNode::new(
        name,
        ctx.module,
        Some(choice),
        NodeKind::Case {
            children: Vec::new(),
        },
    );
    case_node.flags = NodeFlags {
        config: inh.config,
        status: inh.status,
        mandatory: false,
        ordered_by_user: false,
    };
    let case_id = ctx
        .schema
        .add_node(case_node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;

    let mut children = Vec::new();
    compile_child(ctx, Some(case_id), inh, parsed, &mut children)?;
    if children.is_empty() {
        // The shorthand child was gated out; drop the wrapper with it.
        return Ok(None);
    }
    if let NodeKind::Case { children: c } = &mut ctx.schema.node_mut(case_id).kind {
        *c = children;
    }
    Ok(Some(case_id))
}

fn compile_case(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedCase,
) -> Result<Option<NodeId>> {
    let Some(shaped) = shape(ctx, &parsed.common, &inh)? else {
        return Ok(None);
    };
    ctx.path.push(parsed.common.name.clone());

    let mut node = CompiledNode::new(
        shaped.name,
        ctx.module,
        parent,
        NodeKind::Case {
            children: Vec::new(),
        },
    );
    node.flags = shaped.flags;
    node.whens = shaped.whens;
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
    attach_extensions(ctx, ExtHost::Node(id), &shaped.exts)?;

    let child_inh = inh.child_of(shaped.flags);
    let mut children = Vec::new();
    let result = compile_children(ctx, Some(id), child_inh, &parsed.children, &mut children);
    ctx.path.pop();
    result?;

    if let NodeKind::Case { children: c } = &mut ctx.schema.node_mut(id).kind {
        *c = children;
    }
    Ok(Some(id))
}

fn compile_any(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedAny,
    kind: NodeKind,
) -> Result<Option<NodeId>> {
    let Some(shaped) = shape(ctx, &parsed.common, &inh)? else {
        return Ok(None);
    };
    ctx.path.push(parsed.common.name.clone());

    let mut node = CompiledNode::new(shaped.name, ctx.module, parent, kind);
    node.flags = shaped.flags;
    node.flags.mandatory = parsed.mandatory.unwrap_or(false);
    node.whens = shaped.whens;
    node.musts = compile_musts(ctx, &parsed.musts);
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
    attach_extensions(ctx, ExtHost::Node(id), &shaped.exts)?;

    ctx.path.pop();
    Ok(Some(id))
}

/// Compile an rpc (`is_rpc`) or action statement. The `input` and `output`
/// nodes are always materialized, possibly empty, as `config false`.
pub(crate) fn compile_operation(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedOperation,
    is_rpc: bool,
) -> Result<Option<NodeId>> {
    if !is_rpc && (inh.in_operation || inh.in_notification) {
        return Err(ctx.error(
            ErrorKind::Denied,
            format!(
                "action \"{}\" must not be nested inside an operation or notification",
                parsed.name
            ),
        ));
    }
    if !ctx.eval_if_features(&parsed.if_features)? {
        return Ok(None);
    }
    ctx.path.push(parsed.name.clone());

    let status = types::parse_status(ctx, parsed.status.as_deref())?.unwrap_or(inh.status);
    let name = ctx.intern(&parsed.name);

    // Operation and body nodes reference each other; the bodies are created
    // first and re-parented once the operation record exists.
    let op_inh = Inherited {
        config: false,
        status,
        ignore_config: true,
        in_operation: true,
        in_notification: false,
    };

    ctx.typedef_scopes.push(parsed.typedefs.clone());
    ctx.grouping_scopes.push(parsed.groupings.clone());

    let result = (|ctx: &mut ModuleCtx<'_>| {
        let input = compile_in_out(ctx, parsed.input.as_ref(), true, status, op_inh)?;
        let output = compile_in_out(ctx, parsed.output.as_ref(), false, status, op_inh)?;
        Ok((input, output))
    })(ctx);

    ctx.grouping_scopes.pop();
    ctx.typedef_scopes.pop();
    let (input, output) = match result {
        Ok(pair) => pair,
        Err(e) => {
            ctx.path.pop();
            return Err(e);
        }
    };

    let kind = if is_rpc {
        NodeKind::Rpc { input, output }
    } else {
        NodeKind::Action { input, output }
    };
    let mut node = CompiledNode::new(name, ctx.module, parent, kind);
    node.flags = NodeFlags {
        config: false,
        status,
        mandatory: false,
        ordered_by_user: false,
    };
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
    ctx.schema.node_mut(input).parent = Some(id);
    ctx.schema.node_mut(output).parent = Some(id);
    attach_extensions(ctx, ExtHost::Node(id), &parsed.exts)?;

    ctx.path.pop();
    Ok(Some(id))
}

fn compile_in_out(
    ctx: &mut ModuleCtx<'_>,
    parsed: Option<&ParsedInOut>,
    is_input: bool,
    status: Status,
    inh: Inherited,
) -> Result<NodeId> {
    let keyword = if is_input { "input" } else { "output" };
    ctx.path.push(keyword);

    let name = ctx.intern(keyword);
    let kind = if is_input {
        NodeKind::Input {
            children: Vec::new(),
        }
    } else {
        NodeKind::Output {
            children: Vec::new(),
        }
    };
    let mut node = CompiledNode::new(name, ctx.module, None, kind);
    node.flags = NodeFlags {
        config: false,
        status,
        mandatory: false,
        ordered_by_user: false,
    };
    if let Some(body) = parsed {
        node.musts = compile_musts(ctx, &body.musts);
    }
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;

    let mut children = Vec::new();
    let result = match parsed {
        Some(body) => {
            ctx.typedef_scopes.push(body.typedefs.clone());
            ctx.grouping_scopes.push(body.groupings.clone());
            let r = compile_children(ctx, Some(id), inh, &body.children, &mut children);
            ctx.grouping_scopes.pop();
            ctx.typedef_scopes.pop();
            r
        }
        None => Ok(()),
    };
    ctx.path.pop();
    result?;

    match &mut ctx.schema.node_mut(id).kind {
        NodeKind::Input { children: c } | NodeKind::Output { children: c } => *c = children,
        _ => {}
    }
    Ok(id)
}

/// Compile a notification; its whole subtree is `config false`.
pub(crate) fn compile_notification(
    ctx: &mut ModuleCtx<'_>,
    parent: Option<NodeId>,
    inh: Inherited,
    parsed: &ParsedNotification,
) -> Result<Option<NodeId>> {
    if inh.in_operation || inh.in_notification {
        return Err(ctx.error(
            ErrorKind::Denied,
            format!(
                "notification \"{}\" must not be nested inside an operation or notification",
                parsed.name
            ),
        ));
    }
    if !ctx.eval_if_features(&parsed.if_features)? {
        return Ok(None);
    }
    ctx.path.push(parsed.name.clone());

    let status = types::parse_status(ctx, parsed.status.as_deref())?.unwrap_or(inh.status);
    let name = ctx.intern(&parsed.name);
    let mut node = CompiledNode::new(
        name,
        ctx.module,
        parent,
        NodeKind::Notification {
            children: Vec::new(),
        },
    );
    node.flags = NodeFlags {
        config: false,
        status,
        mandatory: false,
        ordered_by_user: false,
    };
    node.musts = compile_musts(ctx, &parsed.musts);
    let id = ctx
        .schema
        .add_node(node)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
    attach_extensions(ctx, ExtHost::Node(id), &parsed.exts)?;

    let child_inh = Inherited {
        config: false,
        status,
        ignore_config: true,
        in_operation: false,
        in_notification: true,
    };
    ctx.typedef_scopes.push(parsed.typedefs.clone());
    ctx.grouping_scopes.push(parsed.groupings.clone());
    let mut children = Vec::new();
    let result = compile_children(ctx, Some(id), child_inh, &parsed.children, &mut children);
    ctx.grouping_scopes.pop();
    ctx.typedef_scopes.pop();
    ctx.path.pop();
    result?;

    if let NodeKind::Notification { children: c } = &mut ctx.schema.node_mut(id).kind {
        *c = children;
    }
    Ok(Some(id))
}
