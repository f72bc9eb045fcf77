//! Type compilation.
//!
//! A parsed type reference is compiled into a [`CompiledType`] that carries
//! the base tag of the eventual built-in base and the intersection of all
//! restrictions along the typedef chain. Compiled typedefs are shared by
//! reference; a use site allocates a fresh record only when it adds
//! restrictions of its own or when the effective type contains a leafref,
//! whose resolution is per use site.

use crate::compiler::context::ModuleCtx;
use crate::compiler::value;
use crate::error::{ErrorKind, Result};
use crate::model::{
    BaseType, BitItem, CompiledPattern, CompiledType, EnumItem, Intervals, LeafrefSpec, ModuleId,
    Status, TypeId, YangVersion,
};
use crate::parsed::{ParsedType, ParsedTypedef};
use crate::path::{parse_path, PathParseOptions};

/// Seed the compiled records of all built-in base types.
pub(crate) fn seed_builtin_types(schema: &mut crate::model::Schema) {
    const BUILTINS: [BaseType; 19] = [
        BaseType::Binary,
        BaseType::Bits,
        BaseType::Boolean,
        BaseType::Decimal64,
        BaseType::Empty,
        BaseType::Enumeration,
        BaseType::Identityref,
        BaseType::InstanceIdentifier,
        BaseType::Int8,
        BaseType::Int16,
        BaseType::Int32,
        BaseType::Int64,
        BaseType::Leafref,
        BaseType::String,
        BaseType::Uint8,
        BaseType::Uint16,
        BaseType::Uint32,
        BaseType::Uint64,
        BaseType::Union,
    ];
    for base in BUILTINS {
        let placeholder = crate::model::TypeId::from_raw(1).unwrap();
        let id = schema
            .add_type(CompiledType::new(placeholder, base))
            .expect("builtin seeding cannot overflow");
        schema.register_builtin(base, id);
    }
}

/// Parse a `status` argument.
pub(crate) fn parse_status(ctx: &ModuleCtx<'_>, status: Option<&str>) -> Result<Option<Status>> {
    Ok(match status {
        None => None,
        Some("current") => Some(Status::Current),
        Some("deprecated") => Some(Status::Deprecated),
        Some("obsolete") => Some(Status::Obsolete),
        Some(other) => {
            return Err(ctx.error(
                ErrorKind::Syntax,
                format!("invalid status \"{other}\""),
            ))
        }
    })
}

/// Compile a type reference at a use site (leaf, leaf-list or deviation).
pub(crate) fn compile_type(ctx: &mut ModuleCtx<'_>, parsed: &ParsedType) -> Result<TypeId> {
    let base_id = resolve_base(ctx, parsed)?;

    if !parsed.has_restrictions() {
        // Share the typedef's compiled record unless its resolution is
        // bound to the use site.
        if contains_leafref(ctx, base_id) {
            return instantiate(ctx, base_id);
        }
        return Ok(base_id);
    }

    let parent = ctx.schema.typ(base_id).clone();
    let mut record = derive_from(&parent, base_id);
    record.module = Some(ctx.module);
    compose_restrictions(ctx, &mut record, parsed)?;
    finish_record(ctx, &record)?;
    Ok(ctx
        .schema
        .add_type(record)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?)
}

/// Resolve the referenced name to the compiled record it derives from:
/// a built-in record or a compiled typedef.
fn resolve_base(ctx: &mut ModuleCtx<'_>, parsed: &ParsedType) -> Result<TypeId> {
    if !parsed.name.contains(':') {
        if let Some(base) = BaseType::from_ident(&parsed.name) {
            return Ok(ctx.schema.builtin_type(base));
        }
    }

    let (module, name) = ctx.resolve_prefixed(&parsed.name)?;
    if module == ctx.view {
        // Local scopes, innermost first. While a foreign grouping is
        // expanded these hold the grouping's own typedefs.
        for depth in (0..ctx.typedef_scopes.len()).rev() {
            let found = ctx.typedef_scopes[depth]
                .iter()
                .find(|t| t.name == name)
                .cloned();
            if let Some(tpdf) = found {
                return compile_typedef(ctx, &tpdf, module, false);
            }
        }
    }
    if module == ctx.module {
        // Module and submodule top level, compiled on demand.
        if let Some(&cached) = ctx.typedef_cache.get(&name) {
            return Ok(cached);
        }
        let found = ctx.top_typedefs.iter().find(|t| t.name == name).cloned();
        if let Some(tpdf) = found {
            let own = ctx.module;
            return compile_typedef(ctx, &tpdf, own, true);
        }
    } else {
        // Other modules expose their compiled top-level typedefs.
        let name_id = ctx.schema.find_str(&name);
        if let Some(id) = name_id.and_then(|n| ctx.schema.module(module).typedef(n)) {
            return Ok(id);
        }
    }

    Err(ctx.error(
        ErrorKind::NotFound,
        format!("unknown type \"{}\"", parsed.name),
    ))
}

/// Compile a typedef into a named, shareable record.
pub(crate) fn compile_typedef(
    ctx: &mut ModuleCtx<'_>,
    tpdf: &ParsedTypedef,
    defining_module: ModuleId,
    cacheable: bool,
) -> Result<TypeId> {
    let key = format!("{}:{}", ctx.module_name(), tpdf.name);
    if ctx.typedef_stack.contains(&key) {
        let chain = ctx.typedef_stack.join(" -> ");
        return Err(ctx.error(
            ErrorKind::Cycle,
            format!("typedef cycle detected: {chain} -> {key}"),
        ));
    }

    ctx.typedef_stack.push(key);
    let base_result = resolve_base(ctx, &tpdf.typ);
    ctx.typedef_stack.pop();
    let base_id = base_result?;

    let parent = ctx.schema.typ(base_id).clone();
    let mut record = derive_from(&parent, base_id);
    record.name = Some(ctx.intern(&tpdf.name));
    record.module = Some(defining_module);
    record.status = parse_status(ctx, tpdf.status.as_deref())?.unwrap_or_default();
    if let Some(units) = &tpdf.units {
        record.units = Some(ctx.intern(units));
    }

    // A typedef may not reference a weaker-status typedef of its module.
    if let (Some(pname), Some(pmodule)) = (parent.name, parent.module) {
        let parent_name = ctx.schema.str(pname).to_owned();
        ctx.check_status(
            record.status,
            defining_module,
            &tpdf.name,
            parent.status,
            pmodule,
            &parent_name,
        )?;
    }

    compose_restrictions(ctx, &mut record, &tpdf.typ)?;
    finish_record(ctx, &record)?;

    if let Some(default) = &tpdf.default {
        record.default = Some(ctx.intern(default));
    }

    let id = ctx
        .schema
        .add_type(record)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))?;

    if let Some(default) = &tpdf.default {
        value::check_value(ctx.schema, ctx.module, id, default)
            .map_err(|e| ctx.error(e.kind, e.message))?;
    }

    if cacheable {
        ctx.typedef_cache.insert(tpdf.name.clone(), id);
        let name_id = ctx.intern(&tpdf.name);
        ctx.schema
            .module_mut(defining_module)
            .typedefs
            .push((name_id, id));
    }
    Ok(id)
}

/// A fresh record inheriting the parent's effective payload.
fn derive_from(parent: &CompiledType, parent_id: TypeId) -> CompiledType {
    let mut record = CompiledType::new(parent_id, parent.base);
    record.parent = Some(parent_id);
    record.status = parent.status;
    record.units = parent.units;
    record.default = parent.default;
    record.range = parent.range.clone();
    record.length = parent.length.clone();
    record.patterns = parent.patterns.clone();
    record.enums = parent.enums.clone();
    record.bits = parent.bits.clone();
    record.fraction_digits = parent.fraction_digits;
    record.leafref = parent.leafref.clone();
    record.bases = parent.bases.clone();
    record.members = parent.members.clone();
    record.require_instance = parent.require_instance;
    record
}

/// Whether the effective type contains a leafref anywhere (directly or as
/// a union member). Such types are never shared between use sites.
fn contains_leafref(ctx: &ModuleCtx<'_>, id: TypeId) -> bool {
    let record = ctx.schema.typ(id);
    match record.base {
        BaseType::Leafref => true,
        BaseType::Union => record
            .members
            .clone()
            .iter()
            .any(|&m| contains_leafref(ctx, m)),
        _ => false,
    }
}

/// Copy a leafref-containing type for a new use site, so that path
/// resolution state is not shared.
fn instantiate(ctx: &mut ModuleCtx<'_>, id: TypeId) -> Result<TypeId> {
    let mut record = ctx.schema.typ(id).clone();
    record.parent = Some(id);
    if record.base == BaseType::Union {
        let members = record.members.clone();
        let mut copied = Vec::with_capacity(members.len());
        for member in members {
            if contains_leafref(ctx, member) {
                copied.push(instantiate(ctx, member)?);
            } else {
                copied.push(member);
            }
        }
        record.members = copied;
    }
    ctx.schema
        .add_type(record)
        .map_err(|e| ctx.error(ErrorKind::Memory, e.to_string()))
}

/// Apply the restrictions of one parsed reference onto a record that
/// already carries its parent's effective payload.
fn compose_restrictions(
    ctx: &mut ModuleCtx<'_>,
    record: &mut CompiledType,
    parsed: &ParsedType,
) -> Result<()> {
    if let Some(digits) = parsed.fraction_digits {
        if record.base != BaseType::Decimal64 {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!("fraction-digits is not applicable to {}", record.base),
            ));
        }
        if record.fraction_digits.is_some() {
            return Err(ctx.error(
                ErrorKind::Denied,
                "fraction-digits may not be re-specified on a derived type",
            ));
        }
        if !(1..=18).contains(&digits) {
            return Err(ctx.error(ErrorKind::Syntax, "fraction-digits must be 1..18"));
        }
        record.fraction_digits = Some(digits);
    }

    if let Some(range) = &parsed.range {
        if !record.base.is_numeric() {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!("range is not applicable to {}", record.base),
            ));
        }
        let bounds = record
            .base
            .value_bounds()
            .unwrap_or((i128::MIN, i128::MAX));
        let effective = record
            .range
            .clone()
            .unwrap_or_else(|| Intervals::new(vec![bounds]));
        let parsed_range = parse_restriction_expr(
            ctx,
            range,
            &effective,
            record.fraction_digits.filter(|_| record.base == BaseType::Decimal64),
        )?;
        if !parsed_range.is_subset_of(&effective) {
            return Err(ctx.error(
                ErrorKind::Semantic,
                format!("range \"{range}\" is not a subset of the base type range"),
            ));
        }
        record.range = Some(parsed_range);
    }

    if let Some(length) = &parsed.length {
        if !record.base.has_length() {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!("length is not applicable to {}", record.base),
            ));
        }
        let effective = record
            .length
            .clone()
            .unwrap_or_else(|| Intervals::new(vec![(0, i128::from(u64::MAX))]));
        let parsed_length = parse_restriction_expr(ctx, length, &effective, None)?;
        if !parsed_length.is_subset_of(&effective) {
            return Err(ctx.error(
                ErrorKind::Semantic,
                format!("length \"{length}\" is not a subset of the base type length"),
            ));
        }
        record.length = Some(parsed_length);
    }

    if !parsed.patterns.is_empty() {
        if record.base != BaseType::String {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!("pattern is not applicable to {}", record.base),
            ));
        }
        for pattern in &parsed.patterns {
            value::compile_pattern(&pattern.expr).map_err(|e| ctx.error(e.kind, e.message))?;
            let expr = ctx.intern(&pattern.expr);
            record.patterns.push(CompiledPattern {
                expr,
                invert: pattern.invert,
            });
        }
    }

    if !parsed.enums.is_empty() {
        compose_enums(ctx, record, parsed)?;
    }

    if !parsed.bits.is_empty() {
        compose_bits(ctx, record, parsed)?;
    }

    if let Some(path) = &parsed.path {
        if record.base != BaseType::Leafref {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!("path is not applicable to {}", record.base),
            ));
        }
        if record.leafref.is_some() {
            return Err(ctx.error(
                ErrorKind::Denied,
                "the path of a leafref may not be restricted on a derived type",
            ));
        }
        let parsed_path = parse_path(path, &PathParseOptions::leafref())
            .map_err(|e| ctx.error(e.kind, e.message))?;
        let path_text = ctx.intern(path);
        record.leafref = Some(LeafrefSpec {
            path_text,
            path: parsed_path,
            require_instance: true,
            target: None,
            realtype: None,
        });
    }

    if let Some(require) = parsed.require_instance {
        match record.base {
            BaseType::Leafref => {
                if let Some(leafref) = &mut record.leafref {
                    leafref.require_instance = require;
                }
            }
            BaseType::InstanceIdentifier => record.require_instance = Some(require),
            other => {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!("require-instance is not applicable to {other}"),
                ))
            }
        }
    }

    if !parsed.bases.is_empty() {
        if record.base != BaseType::Identityref {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!("base is not applicable to {}", record.base),
            ));
        }
        if parsed.bases.len() > 1 && ctx.version < YangVersion::V1_1 {
            return Err(ctx.error(
                ErrorKind::Denied,
                "multiple identityref bases require YANG 1.1",
            ));
        }
        let mut bases = Vec::with_capacity(parsed.bases.len());
        for base in &parsed.bases {
            let (module, name) = ctx.resolve_prefixed(base)?;
            let name_id = ctx.intern(&name);
            let identity = ctx.schema.find_identity(module, name_id).ok_or_else(|| {
                ctx.error(ErrorKind::Reference, format!("unknown identity \"{base}\""))
            })?;
            bases.push(identity);
        }
        record.bases = bases;
    }

    if !parsed.union_types.is_empty() {
        if record.base != BaseType::Union {
            return Err(ctx.error(
                ErrorKind::Denied,
                format!("member types are not applicable to {}", record.base),
            ));
        }
        if !record.members.is_empty() {
            return Err(ctx.error(
                ErrorKind::Denied,
                "the members of a union may not be re-specified on a derived type",
            ));
        }
        let mut members = Vec::new();
        for member in &parsed.union_types {
            let compiled = compile_type(ctx, member)?;
            let compiled_base = ctx.schema.typ(compiled).base;
            if ctx.version < YangVersion::V1_1
                && matches!(compiled_base, BaseType::Empty | BaseType::Leafref)
            {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    format!("type {compiled_base} in a union requires YANG 1.1"),
                ));
            }
            if compiled_base == BaseType::Union {
                // Nested unions are flattened into the member list.
                members.extend(ctx.schema.typ(compiled).members.iter().copied());
            } else {
                members.push(compiled);
            }
        }
        record.members = members;
    }

    Ok(())
}

fn compose_enums(
    ctx: &mut ModuleCtx<'_>,
    record: &mut CompiledType,
    parsed: &ParsedType,
) -> Result<()> {
    if record.base != BaseType::Enumeration {
        return Err(ctx.error(
            ErrorKind::Denied,
            format!("enum is not applicable to {}", record.base),
        ));
    }
    let parent = std::mem::take(&mut record.enums);
    let restricting = !parent.is_empty();
    let mut next_value: i64 = 0;
    let mut out: Vec<EnumItem> = Vec::with_capacity(parsed.enums.len());

    for item in &parsed.enums {
        if !item.if_features.is_empty() {
            if ctx.version < YangVersion::V1_1 {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    "if-feature on an enum requires YANG 1.1",
                ));
            }
            if !ctx.eval_if_features(&item.if_features)? {
                continue;
            }
        }
        let name_id = ctx.intern(&item.name);
        if out.iter().any(|e| e.name == name_id) {
            return Err(ctx.error(
                ErrorKind::Exists,
                format!("duplicate enum \"{}\"", item.name),
            ));
        }

        let value = if restricting {
            let parent_item = parent.iter().find(|e| e.name == name_id).ok_or_else(|| {
                ctx.error(
                    ErrorKind::Semantic,
                    format!("enum \"{}\" is not a value of the base type", item.name),
                )
            })?;
            if let Some(explicit) = item.value {
                if explicit != i64::from(parent_item.value) {
                    return Err(ctx.error(
                        ErrorKind::Semantic,
                        format!(
                            "enum \"{}\" value {explicit} does not match the base type value {}",
                            item.name, parent_item.value
                        ),
                    ));
                }
            }
            parent_item.value
        } else {
            let value = match item.value {
                Some(v) => i32::try_from(v).map_err(|_| {
                    ctx.error(
                        ErrorKind::Semantic,
                        format!("enum \"{}\" value {v} overflows int32", item.name),
                    )
                })?,
                None => i32::try_from(next_value).map_err(|_| {
                    ctx.error(
                        ErrorKind::Semantic,
                        format!("auto-assigned value for enum \"{}\" overflows int32", item.name),
                    )
                })?,
            };
            value
        };
        next_value = i64::from(value) + 1;
        out.push(EnumItem {
            name: name_id,
            value,
        });
    }

    if out.is_empty() {
        return Err(ctx.error(ErrorKind::Semantic, "enumeration has no usable values"));
    }
    record.enums = out;
    Ok(())
}

fn compose_bits(
    ctx: &mut ModuleCtx<'_>,
    record: &mut CompiledType,
    parsed: &ParsedType,
) -> Result<()> {
    if record.base != BaseType::Bits {
        return Err(ctx.error(
            ErrorKind::Denied,
            format!("bit is not applicable to {}", record.base),
        ));
    }
    let parent = std::mem::take(&mut record.bits);
    let restricting = !parent.is_empty();
    let mut next_position: u64 = 0;
    let mut out: Vec<BitItem> = Vec::with_capacity(parsed.bits.len());

    for item in &parsed.bits {
        if !item.if_features.is_empty() {
            if ctx.version < YangVersion::V1_1 {
                return Err(ctx.error(
                    ErrorKind::Denied,
                    "if-feature on a bit requires YANG 1.1",
                ));
            }
            if !ctx.eval_if_features(&item.if_features)? {
                continue;
            }
        }
        let name_id = ctx.intern(&item.name);
        if out.iter().any(|b| b.name == name_id) {
            return Err(ctx.error(
                ErrorKind::Exists,
                format!("duplicate bit \"{}\"", item.name),
            ));
        }

        let position = if restricting {
            let parent_item = parent.iter().find(|b| b.name == name_id).ok_or_else(|| {
                ctx.error(
                    ErrorKind::Semantic,
                    format!("bit \"{}\" is not a bit of the base type", item.name),
                )
            })?;
            if let Some(explicit) = item.position {
                if explicit != parent_item.position {
                    return Err(ctx.error(
                        ErrorKind::Semantic,
                        format!(
                            "bit \"{}\" position {explicit} does not match the base type position {}",
                            item.name, parent_item.position
                        ),
                    ));
                }
            }
            parent_item.position
        } else {
            match item.position {
                Some(p) => p,
                None => u32::try_from(next_position).map_err(|_| {
                    ctx.error(
                        ErrorKind::Semantic,
                        format!(
                            "auto-assigned position for bit \"{}\" overflows uint32",
                            item.name
                        ),
                    )
                })?,
            }
        };
        next_position = u64::from(position) + 1;
        out.push(BitItem {
            name: name_id,
            position,
        });
    }

    if out.is_empty() {
        return Err(ctx.error(ErrorKind::Semantic, "bits type has no usable bits"));
    }
    record.bits = out;
    Ok(())
}

/// Checks that must hold once all restrictions are composed: bases that
/// require a mandatory substatement at their first definition.
fn finish_record(ctx: &ModuleCtx<'_>, record: &CompiledType) -> Result<()> {
    match record.base {
        BaseType::Decimal64 if record.fraction_digits.is_none() => Err(ctx.error(
            ErrorKind::Syntax,
            "decimal64 requires fraction-digits at its first definition",
        )),
        BaseType::Enumeration if record.enums.is_empty() => Err(ctx.error(
            ErrorKind::Syntax,
            "enumeration requires at least one enum",
        )),
        BaseType::Bits if record.bits.is_empty() => {
            Err(ctx.error(ErrorKind::Syntax, "bits requires at least one bit"))
        }
        BaseType::Leafref if record.leafref.is_none() => Err(ctx.error(
            ErrorKind::Syntax,
            "leafref requires a path at its first definition",
        )),
        BaseType::Identityref if record.bases.is_empty() => Err(ctx.error(
            ErrorKind::Syntax,
            "identityref requires at least one base",
        )),
        BaseType::Union if record.members.is_empty() => Err(ctx.error(
            ErrorKind::Syntax,
            "union requires at least one member type",
        )),
        _ => Ok(()),
    }
}

/// Parse a range or length expression, e.g. `"2..10|15"`, into a sorted
/// interval union. `min`/`max` refer to the effective bounds of the base.
fn parse_restriction_expr(
    ctx: &ModuleCtx<'_>,
    text: &str,
    effective: &Intervals,
    decimal_digits: Option<u8>,
) -> Result<Intervals> {
    let lo_bound = effective.min().unwrap_or(i128::MIN);
    let hi_bound = effective.max().unwrap_or(i128::MAX);

    let parse_bound = |word: &str| -> Result<i128> {
        let word = word.trim();
        match word {
            "min" => Ok(lo_bound),
            "max" => Ok(hi_bound),
            _ => match decimal_digits {
                Some(digits) => value::parse_decimal(word, digits).ok_or_else(|| {
                    ctx.error(
                        ErrorKind::Syntax,
                        format!("invalid decimal bound \"{word}\" in \"{text}\""),
                    )
                }),
                None => word.parse::<i128>().map_err(|_| {
                    ctx.error(
                        ErrorKind::Syntax,
                        format!("invalid bound \"{word}\" in \"{text}\""),
                    )
                }),
            },
        }
    };

    let mut parts: Vec<(i128, i128)> = Vec::new();
    for piece in text.split('|') {
        let piece = piece.trim();
        if piece.is_empty() {
            return Err(ctx.error(
                ErrorKind::Syntax,
                format!("empty part in restriction \"{text}\""),
            ));
        }
        let (lo, hi) = match piece.split_once("..") {
            Some((lo, hi)) => (parse_bound(lo)?, parse_bound(hi)?),
            None => {
                let v = parse_bound(piece)?;
                (v, v)
            }
        };
        if lo > hi {
            return Err(ctx.error(
                ErrorKind::Syntax,
                format!("descending interval in restriction \"{text}\""),
            ));
        }
        if let Some(&(_, prev_hi)) = parts.last() {
            if lo <= prev_hi {
                return Err(ctx.error(
                    ErrorKind::Syntax,
                    format!("parts of restriction \"{text}\" must be disjoint and ascending"),
                ));
            }
        }
        parts.push((lo, hi));
    }
    Ok(Intervals::new(parts))
}

/// Eagerly compile every top-level typedef of the module so importers and
/// later phases can share them.
pub(crate) fn compile_top_typedefs(ctx: &mut ModuleCtx<'_>) -> Result<()> {
    let typedefs = ctx.top_typedefs.clone();
    let own = ctx.module;
    for tpdf in &typedefs {
        if !ctx.typedef_cache.contains_key(&tpdf.name) {
            compile_typedef(ctx, tpdf, own, true)?;
        }
    }
    Ok(())
}

/// Collect leafref occurrences of a use-site type (directly or as a union
/// member) for the final resolution sweep.
pub(crate) fn collect_leafref_uses(
    schema: &crate::model::Schema,
    typ: TypeId,
    node: crate::model::NodeId,
    out: &mut Vec<(TypeId, crate::model::NodeId)>,
) {
    let record = schema.typ(typ);
    match record.base {
        BaseType::Leafref => out.push((typ, node)),
        BaseType::Union => {
            for &member in &record.members {
                collect_leafref_uses(schema, member, node, out);
            }
        }
        _ => {}
    }
}
