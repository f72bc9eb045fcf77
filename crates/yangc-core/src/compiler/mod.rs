//! The schema compiler.
//!
//! Transforms parsed modules into the compiled schema:
//!
//! ```text
//! Parsed modules -> [Compiler] -> Schema
//! ```
//!
//! The compiler is single-threaded and runs to completion per invocation.
//! Each module is committed atomically: on a fatal error the schema is
//! rolled back to the state before the failing module, keeping the
//! modules that compiled successfully before it.

pub(crate) mod context;
pub(crate) mod lookup;
pub(crate) mod phases;
pub(crate) mod value;

use tracing::debug;

use crate::error::{Diagnostic, ErrorKind, Result};
use crate::model::{ModuleId, Schema};
use crate::parsed::{ParsedGrouping, ParsedModule, ParsedTypedef};
use crate::plugins::{self, ExtHost};
use crate::xpath::XPathCompiler;
use context::{FeatureConfig, ModuleCtx};
use phases::deviation::DeviationLog;
use std::collections::HashMap;

/// Everything one module compile needs besides the parsed module itself.
pub(crate) struct CompileEnv<'a> {
    /// The schema being extended.
    pub schema: &'a mut Schema,
    /// Runtime feature states.
    pub features: &'a FeatureConfig,
    /// XPath collaborator.
    pub xpath: &'a dyn XPathCompiler,
    /// Accumulated warnings.
    pub warnings: &'a mut Vec<Diagnostic>,
    /// Parsed top-level groupings of committed modules.
    pub foreign_groupings: &'a mut HashMap<ModuleId, Vec<ParsedGrouping>>,
    /// Deviation bookkeeping across module compiles.
    pub deviation_log: &'a mut DeviationLog,
}

/// Compile one module whose imports are already resolved. The caller is
/// responsible for schema rollback on error.
pub(crate) fn compile_module(
    env: &mut CompileEnv<'_>,
    parsed: &ParsedModule,
    submodules: &[ParsedModule],
    imports: &[(String, ModuleId)],
    implement: bool,
) -> Result<ModuleId> {
    phases::registration::check_definition_names(parsed, submodules)?;
    let module = match phases::registration::register_module(env.schema, parsed, imports, implement)?
    {
        phases::registration::Registered::Existing(id) => return Ok(id),
        phases::registration::Registered::New(id) => id,
    };
    debug!(module = %parsed.name, implement, "compiling module");

    phases::registration::register_extensions(env.schema, module, parsed, submodules)?;

    let mut ctx = ModuleCtx::new(
        env.schema,
        module,
        env.features,
        env.xpath,
        env.warnings,
        env.foreign_groupings,
    );

    // Top-level typedefs and groupings of the module and its submodules
    // form one scope.
    ctx.top_typedefs = merged_typedefs(parsed, submodules);
    ctx.top_groupings = merged_groupings(parsed, submodules);

    debug!(module = %parsed.name, phase = "features");
    let features: Vec<_> = parsed
        .features
        .iter()
        .chain(submodules.iter().flat_map(|s| s.features.iter()))
        .cloned()
        .collect();
    phases::features::compile_features(&mut ctx, &features)?;

    debug!(module = %parsed.name, phase = "identities");
    let identities: Vec<_> = parsed
        .identities
        .iter()
        .chain(submodules.iter().flat_map(|s| s.identities.iter()))
        .cloned()
        .collect();
    phases::features::compile_identities(&mut ctx, &identities)?;

    debug!(module = %parsed.name, phase = "typedefs");
    phases::types::compile_top_typedefs(&mut ctx)?;

    if implement {
        debug!(module = %parsed.name, phase = "schema-tree");
        compile_trees(&mut ctx, parsed, submodules)?;

        debug!(module = %parsed.name, phase = "augments");
        let augments: Vec<_> = parsed
            .augments
            .iter()
            .chain(submodules.iter().flat_map(|s| s.augments.iter()))
            .cloned()
            .collect();
        phases::augment::apply_module_augments(&mut ctx, &augments)?;

        debug!(module = %parsed.name, phase = "deviations");
        let deviations: Vec<_> = parsed
            .deviations
            .iter()
            .chain(submodules.iter().flat_map(|s| s.deviations.iter()))
            .cloned()
            .collect();
        phases::deviation::apply_deviations(&mut ctx, &deviations, env.deviation_log)?;

        debug!(module = %parsed.name, phase = "extensions");
        dispatch_tree_extensions(&mut ctx)?;

        debug!(module = %parsed.name, phase = "validate");
        phases::validate::validate(&mut ctx)?;
    }

    env.foreign_groupings
        .insert(module, merged_groupings(parsed, submodules));
    Ok(module)
}

fn merged_typedefs(parsed: &ParsedModule, submodules: &[ParsedModule]) -> Vec<ParsedTypedef> {
    parsed
        .typedefs
        .iter()
        .chain(submodules.iter().flat_map(|s| s.typedefs.iter()))
        .cloned()
        .collect()
}

fn merged_groupings(parsed: &ParsedModule, submodules: &[ParsedModule]) -> Vec<ParsedGrouping> {
    parsed
        .groupings
        .iter()
        .chain(submodules.iter().flat_map(|s| s.groupings.iter()))
        .cloned()
        .collect()
}

/// Compile the data, rpc and notification trees of the module and its
/// submodules, then the module-statement extension instances.
fn compile_trees(
    ctx: &mut ModuleCtx<'_>,
    parsed: &ParsedModule,
    submodules: &[ParsedModule],
) -> Result<()> {
    use phases::nodes::{self, Inherited};

    let inh = Inherited::default();

    let mut data = Vec::new();
    let data_stmts: Vec<_> = parsed
        .data
        .iter()
        .chain(submodules.iter().flat_map(|s| s.data.iter()))
        .cloned()
        .collect();
    nodes::compile_children(ctx, None, inh, &data_stmts, &mut data)?;

    let mut rpcs = Vec::new();
    let rpc_stmts: Vec<_> = parsed
        .rpcs
        .iter()
        .chain(submodules.iter().flat_map(|s| s.rpcs.iter()))
        .cloned()
        .collect();
    for rpc in &rpc_stmts {
        if let Some(id) = nodes::compile_operation(ctx, None, inh, rpc, true)? {
            nodes::link_child(ctx, &mut rpcs, id)?;
        }
    }

    let mut notifications = Vec::new();
    let notif_stmts: Vec<_> = parsed
        .notifications
        .iter()
        .chain(submodules.iter().flat_map(|s| s.notifications.iter()))
        .cloned()
        .collect();
    for notif in &notif_stmts {
        if let Some(id) = nodes::compile_notification(ctx, None, inh, notif)? {
            nodes::link_child(ctx, &mut notifications, id)?;
        }
    }

    let module = ctx.module;
    let record = ctx.schema.module_mut(module);
    record.data = data;
    record.rpcs = rpcs;
    record.notifications = notifications;

    nodes::attach_extensions(ctx, ExtHost::Module(module), &parsed.exts)?;
    Ok(())
}

/// Run the queued tree-phase extension hooks (plugins that need the whole
/// subtree, like NACM inheritance).
fn dispatch_tree_extensions(ctx: &mut ModuleCtx<'_>) -> Result<()> {
    let queued = std::mem::take(&mut ctx.tree_exts);
    for (host, index, def) in queued {
        let def_record = ctx.schema.extension(def);
        let def_module = ctx
            .schema
            .str(ctx.schema.module(def_record.module).name)
            .to_owned();
        let def_name = ctx.schema.str(def_record.name).to_owned();
        if let Some(plugin) = plugins::find(&def_module, &def_name) {
            plugin
                .compile(ctx.schema, host, index)
                .map_err(|e| {
                    let mut e = e.in_module(ctx.module_name().to_owned());
                    if e.kind != ErrorKind::Extension && e.kind != ErrorKind::Internal {
                        e.kind = ErrorKind::Extension;
                    }
                    e
                })?;
        }
    }
    Ok(())
}
