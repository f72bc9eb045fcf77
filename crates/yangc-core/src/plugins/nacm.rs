//! NACM (RFC 8341) extension plugin.
//!
//! Handles `default-deny-write` and `default-deny-all` from
//! `ietf-netconf-acm`. The access flag is stored as plugin data on the
//! instance and inherited to every descendant node that does not carry a
//! NACM tag of its own; inheritance is an explicit walk performed here, not
//! implicit propagation.

use std::sync::Arc;

use super::{ExtHookPhase, ExtHost, ExtensionPlugin};
use crate::error::{CompileError, ErrorKind, Result};
use crate::model::{ExtInstance, ExtensionId, NodeId, NodeTag, Schema};

/// The module defining the NACM extensions.
pub const NACM_MODULE: &str = "ietf-netconf-acm";

/// The access flag carried as plugin data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NacmFlag {
    /// `default-deny-all`: deny read, write and execute by default.
    DenyAll,
    /// `default-deny-write`: deny write by default.
    DenyWrite,
}

/// Plugin for the NACM `default-deny-write` and `default-deny-all`
/// extensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct NacmPlugin;

fn is_nacm_def(schema: &Schema, def: ExtensionId) -> bool {
    let def = schema.extension(def);
    let module = schema.module(def.module);
    schema.str(module.name) == NACM_MODULE
        && matches!(
            schema.str(def.name),
            "default-deny-write" | "default-deny-all"
        )
}

fn extension_error(schema: &Schema, node: NodeId, message: String) -> CompileError {
    CompileError::new(ErrorKind::Extension, schema.node_path(node), message)
}

impl ExtensionPlugin for NacmPlugin {
    fn id(&self) -> &'static str {
        "yangc - NACM, version 1"
    }

    fn phase(&self) -> ExtHookPhase {
        // Inheritance needs the full subtree, including augmented children.
        ExtHookPhase::Tree
    }

    fn compile(&self, schema: &mut Schema, host: ExtHost, ext_index: usize) -> Result<()> {
        let node_id = match host {
            ExtHost::Node(id) => id,
            ExtHost::Module(id) => {
                let module = schema.str(schema.module(id).name).to_owned();
                return Err(CompileError::new(
                    ErrorKind::Extension,
                    format!("/{module}"),
                    "NACM extensions are allowed only on data nodes, not on a module statement",
                ));
            }
        };

        let (def, argument, ext_name) = {
            let node = schema.node(node_id);
            let inst = &node.exts[ext_index];
            let name = schema.str(schema.extension(inst.def).name).to_owned();
            (inst.def, inst.argument, name)
        };

        let flag = match ext_name.as_str() {
            "default-deny-write" => NacmFlag::DenyWrite,
            "default-deny-all" => NacmFlag::DenyAll,
            other => {
                return Err(CompileError::new(
                    ErrorKind::Internal,
                    schema.node_path(node_id),
                    format!("NACM plugin invoked for unknown extension \"{other}\""),
                ))
            }
        };

        // Instantiation site must be a data node, operation or notification;
        // deny-write additionally excludes operations and notifications.
        let tag = schema.node(node_id).tag();
        let allowed = matches!(
            tag,
            NodeTag::Container
                | NodeTag::Leaf
                | NodeTag::LeafList
                | NodeTag::List
                | NodeTag::Choice
                | NodeTag::Case
                | NodeTag::AnyData
                | NodeTag::AnyXml
                | NodeTag::Rpc
                | NodeTag::Action
                | NodeTag::Notification
        );
        let write_misplaced = flag == NacmFlag::DenyWrite
            && matches!(tag, NodeTag::Rpc | NodeTag::Action | NodeTag::Notification);
        if !allowed || write_misplaced {
            return Err(extension_error(
                schema,
                node_id,
                format!("extension \"{ext_name}\" is not allowed in a {tag} statement"),
            ));
        }

        // A node carries at most one NACM tag.
        for (idx, other) in schema.node(node_id).exts.iter().enumerate() {
            if idx != ext_index && is_nacm_def(schema, other.def) {
                let message = if other.def == def {
                    format!("extension \"{ext_name}\" is instantiated multiple times")
                } else {
                    "extension nacm:default-deny-write is mixed with nacm:default-deny-all"
                        .to_owned()
                };
                return Err(extension_error(schema, node_id, message));
            }
        }

        let data: Arc<dyn std::any::Any + Send + Sync> = Arc::new(flag);
        schema.node_mut(node_id).exts[ext_index].data = Some(data.clone());

        // Inherit to every descendant without its own NACM tag; a tagged
        // descendant shields its whole subtree.
        let mut inherit_to = Vec::new();
        let mut stack = schema.structural_children(node_id);
        while let Some(id) = stack.pop() {
            if schema
                .node(id)
                .exts
                .iter()
                .any(|e| is_nacm_def(schema, e.def))
            {
                continue;
            }
            inherit_to.push(id);
            stack.extend(schema.structural_children(id));
        }
        for id in inherit_to {
            let mut inherited = ExtInstance::new(def, argument);
            inherited.data = Some(data.clone());
            schema.node_mut(id).exts.push(inherited);
        }

        Ok(())
    }
}

/// Read the NACM flag attached to an extension instance, if this instance
/// belongs to the NACM plugin.
#[must_use]
pub fn flag_of(inst: &ExtInstance) -> Option<NacmFlag> {
    inst.data
        .as_ref()
        .and_then(|d| d.downcast_ref::<NacmFlag>())
        .copied()
}
