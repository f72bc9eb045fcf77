//! Feature compilation and evaluation.
//!
//! Features form a DAG through their `if-feature` guards; cycles are
//! compile errors. The effective value of a feature combines the runtime
//! state registered on the context with its guards: a feature is enabled
//! iff it is explicitly enabled and every guard holds. Explicitly enabling
//! a feature whose guards fail is an error.

use std::collections::HashMap;

use crate::compiler::context::ModuleCtx;
use crate::compiler::phases::types;
use crate::error::{ErrorKind, Result};
use crate::expr::parse_if_feature;
use crate::model::{CompiledFeature, FeatureId, FeatureState, IfFeature};
use crate::parsed::ParsedFeature;

/// Compile the features of the module under compilation.
pub(crate) fn compile_features(ctx: &mut ModuleCtx<'_>, features: &[ParsedFeature]) -> Result<()> {
    let module_name = ctx.module_name().to_owned();

    // Materialize all names first so guards can reference any declaration
    // order.
    let mut ids: Vec<FeatureId> = Vec::with_capacity(features.len());
    for feature in features {
        let name = ctx.intern(&feature.name);
        if ctx.schema.find_feature(ctx.module, name).is_some() {
            return Err(ctx.error(
                ErrorKind::Exists,
                format!("duplicate feature \"{}\"", feature.name),
            ));
        }
        let state = match ctx.features.state(&module_name, &feature.name) {
            None => FeatureState::Unset,
            Some(true) => FeatureState::Enabled,
            Some(false) => FeatureState::Disabled,
        };
        let record = CompiledFeature {
            id: FeatureId::from_raw(1).unwrap(),
            name,
            module: ctx.module,
            if_features: Vec::new(),
            state,
            enabled: false,
        };
        let id = ctx
            .schema
            .add_feature(record)
            .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
        ctx.schema.module_mut(ctx.module).features.push(id);
        ids.push(id);
    }

    // Resolve guard expressions.
    for (feature, &id) in features.iter().zip(&ids) {
        let mut guards = Vec::with_capacity(feature.if_features.len());
        for guard in &feature.if_features {
            let expr = parse_if_feature(guard)?;
            let resolved = ctx.resolve_feature_expr(&expr).map_err(|e| {
                ctx.error(
                    e.kind,
                    format!("in if-feature of \"{}\": {}", feature.name, e.message),
                )
            })?;
            guards.push(resolved);
        }
        ctx.schema.feature_mut(id).if_features = guards;
        types::parse_status(ctx, feature.status.as_deref())?;
    }

    // Evaluate in dependency order, rejecting cycles among the new
    // features. Previously compiled modules are already settled.
    let mut colors: HashMap<FeatureId, Color> = HashMap::new();
    for &id in &ids {
        evaluate(ctx, id, &mut colors)?;
    }

    // An explicitly enabled feature whose guards fail cannot be honored.
    for (feature, &id) in features.iter().zip(&ids) {
        let record = ctx.schema.feature(id);
        if record.state == FeatureState::Enabled && !record.enabled {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!(
                    "feature \"{}\" is enabled but its if-feature guards are not satisfied",
                    feature.name
                ),
            ));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Visiting,
    Done,
}

/// Depth-first evaluation with cycle detection.
fn evaluate(
    ctx: &mut ModuleCtx<'_>,
    id: FeatureId,
    colors: &mut HashMap<FeatureId, Color>,
) -> Result<()> {
    match colors.get(&id) {
        Some(Color::Done) => return Ok(()),
        Some(Color::Visiting) => {
            let name = ctx.schema.str(ctx.schema.feature(id).name).to_owned();
            return Err(ctx.error(
                ErrorKind::Cycle,
                format!("feature \"{name}\" depends on itself through its if-feature guards"),
            ));
        }
        None => {}
    }
    colors.insert(id, Color::Visiting);

    let guards = ctx.schema.feature(id).if_features.clone();
    let mut referenced = Vec::new();
    for guard in &guards {
        guard.collect(&mut referenced);
    }
    for dep in referenced {
        // Features of already-committed modules carry final values and
        // cannot participate in a new cycle.
        if ctx.schema.feature(dep).module == ctx.module {
            evaluate(ctx, dep, colors)?;
        }
    }

    let enabled_state = ctx.schema.feature(id).state == FeatureState::Enabled;
    let guards_hold = guards
        .iter()
        .all(|g| g.eval(&|dep| ctx.schema.feature(dep).enabled));
    ctx.schema.feature_mut(id).enabled = enabled_state && guards_hold;

    colors.insert(id, Color::Done);
    Ok(())
}

/// Compile the identities of the module under compilation and extend the
/// derived closures of their bases.
pub(crate) fn compile_identities(
    ctx: &mut ModuleCtx<'_>,
    identities: &[crate::parsed::ParsedIdentity],
) -> Result<()> {
    use crate::model::CompiledIdentity;
    use crate::model::IdentityId;

    // Phase A: materialize names.
    let mut ids: Vec<IdentityId> = Vec::with_capacity(identities.len());
    for identity in identities {
        let name = ctx.intern(&identity.name);
        if ctx.schema.find_identity(ctx.module, name).is_some() {
            return Err(ctx.error(
                ErrorKind::Exists,
                format!("duplicate identity \"{}\"", identity.name),
            ));
        }
        let mut record = CompiledIdentity::new(IdentityId::from_raw(1).unwrap(), name, ctx.module);
        record.status = types::parse_status(ctx, identity.status.as_deref())?.unwrap_or_default();
        let id = ctx
            .schema
            .add_identity(record)
            .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;
        ctx.schema.module_mut(ctx.module).identities.push(id);
        ids.push(id);
    }

    // Phase B: resolve bases.
    for (identity, &id) in identities.iter().zip(&ids) {
        if identity.bases.len() > 1 && ctx.version < crate::model::YangVersion::V1_1 {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!(
                    "identity \"{}\" has multiple bases, which requires YANG 1.1",
                    identity.name
                ),
            ));
        }
        let mut bases = Vec::with_capacity(identity.bases.len());
        for base in &identity.bases {
            let (module, name) = ctx.resolve_prefixed(base)?;
            let name_id = ctx.intern(&name);
            let base_id = ctx.schema.find_identity(module, name_id).ok_or_else(|| {
                ctx.error(
                    ErrorKind::Reference,
                    format!("unknown base identity \"{base}\""),
                )
            })?;
            if base_id == id {
                return Err(ctx.error(
                    ErrorKind::Cycle,
                    format!("identity \"{}\" is derived from itself", identity.name),
                ));
            }
            bases.push(base_id);
        }
        ctx.schema.identity_mut(id).bases = bases;
    }

    // Extend the derived closure of every (transitive) base. A cycle in
    // the base graph would revisit the starting identity.
    for &id in &ids {
        let mut stack = ctx.schema.identity(id).bases.clone();
        let mut visited = Vec::new();
        while let Some(base) = stack.pop() {
            if base == id {
                let name = ctx.schema.str(ctx.schema.identity(id).name).to_owned();
                return Err(ctx.error(
                    ErrorKind::Cycle,
                    format!("identity \"{name}\" participates in a derivation cycle"),
                ));
            }
            if visited.contains(&base) {
                continue;
            }
            visited.push(base);
            let record = ctx.schema.identity_mut(base);
            if !record.derived.contains(&id) {
                record.derived.push(id);
            }
            stack.extend(ctx.schema.identity(base).bases.iter().copied());
        }
    }
    Ok(())
}
