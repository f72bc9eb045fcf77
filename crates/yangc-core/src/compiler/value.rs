//! Compile-time value checking.
//!
//! Default values of leaves, leaf-lists and typedefs are checked against
//! their compiled types. Leafref defaults are deferred to the final sweep,
//! where the resolved real type is known.

use regex::Regex;

use crate::error::{CompileError, ErrorKind, Result};
use crate::model::{BaseType, CompiledType, ModuleId, Schema, TypeId};
use crate::path::{parse_path, PathParseOptions};

fn invalid(value: &str, message: impl Into<String>) -> CompileError {
    CompileError::new(
        ErrorKind::Semantic,
        value,
        format!("invalid value \"{value}\": {}", message.into()),
    )
}

/// Compile a YANG pattern for matching: the expression is anchored to the
/// whole value per XSD semantics.
pub fn compile_pattern(expr: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{expr})$")).map_err(|e| {
        CompileError::new(
            ErrorKind::Syntax,
            expr,
            format!("invalid pattern \"{expr}\": {e}"),
        )
    })
}

fn parse_int(value: &str) -> Option<i128> {
    let v = value.trim();
    v.parse::<i128>().ok()
}

/// Parse a decimal literal scaled by `fraction_digits`.
pub fn parse_decimal(value: &str, fraction_digits: u8) -> Option<i128> {
    let v = value.trim();
    let negative = v.starts_with('-');
    let unsigned = v.trim_start_matches(['-', '+']);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if frac_part.len() > usize::from(fraction_digits) {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let mut scaled: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    for _ in 0..fraction_digits {
        scaled = scaled.checked_mul(10)?;
    }
    if !frac_part.is_empty() {
        let mut frac: i128 = frac_part.parse().ok()?;
        for _ in 0..(usize::from(fraction_digits) - frac_part.len()) {
            frac = frac.checked_mul(10)?;
        }
        scaled = scaled.checked_add(frac)?;
    }
    Some(if negative { -scaled } else { scaled })
}

fn check_numeric(typ: &CompiledType, scaled: i128, value: &str) -> Result<()> {
    if let Some(range) = &typ.range {
        if !range.contains(scaled) {
            return Err(invalid(value, "outside the type's range"));
        }
    } else if let Some((lo, hi)) = typ.base.value_bounds() {
        if scaled < lo || scaled > hi {
            return Err(invalid(value, format!("outside the {} domain", typ.base)));
        }
    }
    Ok(())
}

fn check_string(schema: &Schema, typ: &CompiledType, value: &str) -> Result<()> {
    if let Some(length) = &typ.length {
        let chars = value.chars().count() as i128;
        if !length.contains(chars) {
            return Err(invalid(value, "length outside the type's length restriction"));
        }
    }
    for pattern in &typ.patterns {
        let expr = schema.str(pattern.expr);
        let regex = compile_pattern(expr)?;
        let matched = regex.is_match(value);
        if matched == pattern.invert {
            return Err(invalid(
                value,
                format!(
                    "{} pattern \"{expr}\"",
                    if pattern.invert { "matches inverted" } else { "does not match" }
                ),
            ));
        }
    }
    Ok(())
}

fn check_binary(typ: &CompiledType, value: &str) -> Result<()> {
    let stripped: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let core = stripped.trim_end_matches('=');
    if !core
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
    {
        return Err(invalid(value, "not valid base64"));
    }
    if let Some(length) = &typ.length {
        // Decoded octet count from the base64 length.
        let padding = stripped.len() - core.len();
        if stripped.len() % 4 != 0 || padding > 2 {
            return Err(invalid(value, "not valid base64"));
        }
        let octets = (stripped.len() / 4 * 3 - padding) as i128;
        if !length.contains(octets) {
            return Err(invalid(value, "length outside the type's length restriction"));
        }
    }
    Ok(())
}

fn check_identityref(
    schema: &Schema,
    module: ModuleId,
    typ: &CompiledType,
    value: &str,
) -> Result<()> {
    let (target_module, name) = match value.split_once(':') {
        Some((prefix, name)) => {
            let prefix_id = schema
                .find_str(prefix)
                .ok_or_else(|| invalid(value, format!("unknown prefix \"{prefix}\"")))?;
            let target = schema
                .module(module)
                .module_for_prefix(prefix_id)
                .ok_or_else(|| invalid(value, format!("unknown prefix \"{prefix}\"")))?;
            (target, name)
        }
        None => (module, value),
    };
    let name_id = schema
        .find_str(name)
        .ok_or_else(|| invalid(value, "unknown identity"))?;
    let identity = schema
        .find_identity(target_module, name_id)
        .ok_or_else(|| invalid(value, "unknown identity"))?;
    let derived_from_base = typ
        .bases
        .iter()
        .any(|&base| base == identity || schema.identity(base).is_derived(identity));
    if !derived_from_base {
        return Err(invalid(value, "identity is not derived from the type's base"));
    }
    Ok(())
}

/// Check a value against a compiled type. `module` provides the prefix
/// view for identityref values. Leafref values are accepted here and
/// checked against the resolved real type in the final sweep.
pub fn check_value(schema: &Schema, module: ModuleId, typ: TypeId, value: &str) -> Result<()> {
    let typ = schema.typ(typ);
    match typ.base {
        BaseType::Int8
        | BaseType::Int16
        | BaseType::Int32
        | BaseType::Int64
        | BaseType::Uint8
        | BaseType::Uint16
        | BaseType::Uint32
        | BaseType::Uint64 => {
            let scaled = parse_int(value).ok_or_else(|| invalid(value, "not an integer"))?;
            check_numeric(typ, scaled, value)
        }
        BaseType::Decimal64 => {
            let digits = typ.fraction_digits.unwrap_or(0);
            let scaled =
                parse_decimal(value, digits).ok_or_else(|| invalid(value, "not a decimal64"))?;
            check_numeric(typ, scaled, value)
        }
        BaseType::Boolean => match value {
            "true" | "false" => Ok(()),
            _ => Err(invalid(value, "boolean must be \"true\" or \"false\"")),
        },
        BaseType::Empty => Err(invalid(value, "type empty does not take a value")),
        BaseType::String => check_string(schema, typ, value),
        BaseType::Binary => check_binary(typ, value),
        BaseType::Enumeration => {
            let found = schema
                .find_str(value)
                .is_some_and(|id| typ.enums.iter().any(|e| e.name == id));
            if found {
                Ok(())
            } else {
                Err(invalid(value, "not a value of the enumeration"))
            }
        }
        BaseType::Bits => {
            for bit in value.split_whitespace() {
                let found = schema
                    .find_str(bit)
                    .is_some_and(|id| typ.bits.iter().any(|b| b.name == id));
                if !found {
                    return Err(invalid(value, format!("unknown bit \"{bit}\"")));
                }
            }
            Ok(())
        }
        BaseType::Identityref => check_identityref(schema, module, typ, value),
        BaseType::InstanceIdentifier => {
            parse_path(value, &PathParseOptions::data_path()).map(|_| ())
        }
        BaseType::Leafref => Ok(()),
        BaseType::Union => {
            for &member in &typ.members {
                if check_value(schema, module, member, value).is_ok() {
                    return Ok(());
                }
            }
            Err(invalid(value, "no union member accepts the value"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompiledType, Intervals, Schema};

    fn add_type(schema: &mut Schema, typ: CompiledType) -> TypeId {
        schema.add_type(typ).unwrap()
    }

    fn dummy_module(schema: &mut Schema) -> ModuleId {
        let name = schema.intern("m");
        let ns = schema.intern("urn:m");
        let prefix = schema.intern("m");
        let module =
            crate::model::CompiledModule::new(ModuleId::from_raw(1).unwrap(), name, ns, prefix);
        schema.add_module(module).unwrap()
    }

    #[test]
    fn test_integer_bounds() {
        let mut schema = Schema::new();
        let module = dummy_module(&mut schema);
        let t = add_type(
            &mut schema,
            CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::Uint8),
        );
        assert!(check_value(&schema, module, t, "0").is_ok());
        assert!(check_value(&schema, module, t, "255").is_ok());
        assert!(check_value(&schema, module, t, "256").is_err());
        assert!(check_value(&schema, module, t, "-1").is_err());
        assert!(check_value(&schema, module, t, "x").is_err());
    }

    #[test]
    fn test_range_restriction() {
        let mut schema = Schema::new();
        let module = dummy_module(&mut schema);
        let mut typ = CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::Int32);
        typ.range = Some(Intervals::new(vec![(-100, 100)]));
        let t = add_type(&mut schema, typ);
        assert!(check_value(&schema, module, t, "-100").is_ok());
        assert!(check_value(&schema, module, t, "101").is_err());
    }

    #[test]
    fn test_decimal64() {
        let mut schema = Schema::new();
        let module = dummy_module(&mut schema);
        let mut typ = CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::Decimal64);
        typ.fraction_digits = Some(2);
        let t = add_type(&mut schema, typ);
        assert!(check_value(&schema, module, t, "3.14").is_ok());
        assert!(check_value(&schema, module, t, "-0.5").is_ok());
        assert!(check_value(&schema, module, t, "3.141").is_err());
        assert_eq!(parse_decimal("3.14", 2), Some(314));
        assert_eq!(parse_decimal("-1", 2), Some(-100));
    }

    #[test]
    fn test_string_patterns() {
        let mut schema = Schema::new();
        let module = dummy_module(&mut schema);
        let expr = schema.intern("[a-z]+");
        let bad = schema.intern("xxx");
        let mut typ = CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::String);
        typ.patterns.push(crate::model::CompiledPattern {
            expr,
            invert: false,
        });
        typ.patterns.push(crate::model::CompiledPattern {
            expr: bad,
            invert: true,
        });
        let t = add_type(&mut schema, typ);
        assert!(check_value(&schema, module, t, "abc").is_ok());
        assert!(check_value(&schema, module, t, "ABC").is_err());
        assert!(check_value(&schema, module, t, "xxx").is_err());
    }

    #[test]
    fn test_string_length() {
        let mut schema = Schema::new();
        let module = dummy_module(&mut schema);
        let mut typ = CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::String);
        typ.length = Some(Intervals::new(vec![(2, 4)]));
        let t = add_type(&mut schema, typ);
        assert!(check_value(&schema, module, t, "ab").is_ok());
        assert!(check_value(&schema, module, t, "a").is_err());
        assert!(check_value(&schema, module, t, "abcde").is_err());
    }

    #[test]
    fn test_boolean_and_empty() {
        let mut schema = Schema::new();
        let module = dummy_module(&mut schema);
        let b = add_type(
            &mut schema,
            CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::Boolean),
        );
        let e = add_type(
            &mut schema,
            CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::Empty),
        );
        assert!(check_value(&schema, module, b, "true").is_ok());
        assert!(check_value(&schema, module, b, "yes").is_err());
        assert!(check_value(&schema, module, e, "anything").is_err());
    }

    #[test]
    fn test_union() {
        let mut schema = Schema::new();
        let module = dummy_module(&mut schema);
        let int8 = add_type(
            &mut schema,
            CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::Int8),
        );
        let boolean = add_type(
            &mut schema,
            CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::Boolean),
        );
        let mut union = CompiledType::new(TypeId::from_raw(1).unwrap(), BaseType::Union);
        union.members = vec![int8, boolean];
        let u = add_type(&mut schema, union);
        assert!(check_value(&schema, module, u, "42").is_ok());
        assert!(check_value(&schema, module, u, "true").is_ok());
        assert!(check_value(&schema, module, u, "200").is_err());
    }
}
