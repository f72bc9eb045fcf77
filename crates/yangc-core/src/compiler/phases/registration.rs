//! Module registration.
//!
//! Creates the compiled module record and enforces the module-level
//! invariants before any body is compiled: prefix uniqueness, revision
//! validity, the one-implemented-revision rule, and name uniqueness inside
//! the typedef/grouping/feature/identity/extension namespace partitions.

use crate::error::{CompileError, ErrorKind, Result};
use crate::model::{
    CompiledExtensionDef, CompiledModule, ExtensionId, ModuleId, Revision, Schema, YangVersion,
};
use crate::parsed::ParsedModule;

fn module_error(name: &str, kind: ErrorKind, message: impl Into<String>) -> CompileError {
    CompileError::new(kind, format!("/{name}"), message).in_module(name)
}

/// Validate a `YYYY-MM-DD` revision date, including month lengths and
/// leap years.
pub(crate) fn check_date(module: &str, date: &str) -> Result<()> {
    let error = || {
        module_error(
            module,
            ErrorKind::Syntax,
            format!("invalid revision date \"{date}\""),
        )
    };

    let bytes = date.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return Err(error());
    }
    for (idx, b) in bytes.iter().enumerate() {
        if idx != 4 && idx != 7 && !b.is_ascii_digit() {
            return Err(error());
        }
    }
    let year: u32 = date[0..4].parse().map_err(|_| error())?;
    let month: u32 = date[5..7].parse().map_err(|_| error())?;
    let day: u32 = date[8..10].parse().map_err(|_| error())?;
    if !(1..=12).contains(&month) || day == 0 {
        return Err(error());
    }
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let max_day = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        _ => 28,
    };
    if day > max_day {
        return Err(error());
    }
    Ok(())
}

/// Outcome of looking for an already-loaded revision.
pub(crate) enum Registered {
    /// The `(name, revision)` pair is already in the context.
    Existing(ModuleId),
    /// The module is new and was added to the schema.
    New(ModuleId),
}

/// Register a parsed module: dedup against loaded revisions, validate the
/// header and create the compiled record with its imports.
pub(crate) fn register_module(
    schema: &mut Schema,
    parsed: &ParsedModule,
    imports: &[(String, ModuleId)],
    implement: bool,
) -> Result<Registered> {
    let name = &parsed.name;

    if parsed.is_submodule() {
        return Err(module_error(
            name,
            ErrorKind::Denied,
            "a submodule can only be compiled through its parent module's include",
        ));
    }
    let Some(namespace) = parsed.namespace.as_deref() else {
        return Err(module_error(name, ErrorKind::Syntax, "module has no namespace"));
    };
    if parsed.prefix.is_empty() {
        return Err(module_error(name, ErrorKind::Syntax, "module has no prefix"));
    }

    let version = match parsed.yang_version.as_deref() {
        None | Some("1") => YangVersion::V1,
        Some("1.1") => YangVersion::V1_1,
        Some(other) => {
            return Err(module_error(
                name,
                ErrorKind::Syntax,
                format!("invalid yang-version \"{other}\""),
            ))
        }
    };

    for revision in &parsed.revisions {
        check_date(name, &revision.date)?;
    }
    let latest_date = parsed.latest_revision_date().map(str::to_owned);

    // Deduplicate against loaded revisions of the same name.
    for &loaded in schema.modules_by_name(name) {
        let module = schema.module(loaded);
        let loaded_revision = module.revision.map(|r| schema.str(r).to_owned());
        if loaded_revision.as_deref() == latest_date.as_deref() {
            if implement && !module.implemented {
                return Err(module_error(
                    name,
                    ErrorKind::Denied,
                    "module revision is already loaded as import-only; implement it in a fresh context",
                ));
            }
            return Ok(Registered::Existing(loaded));
        }
        if implement && module.implemented {
            return Err(module_error(
                name,
                ErrorKind::Denied,
                "another revision of the module is already implemented in this context",
            ));
        }
    }

    // One namespace, one module name.
    if let Some(other) = schema.find_module_by_namespace(namespace) {
        if schema.str(other.name) != name {
            let other_name = schema.str(other.name).to_owned();
            return Err(module_error(
                name,
                ErrorKind::Denied,
                format!("namespace \"{namespace}\" is already used by module \"{other_name}\""),
            ));
        }
    }

    // Module prefix and import prefixes are pairwise distinct.
    let mut prefixes: Vec<&str> = vec![parsed.prefix.as_str()];
    for (prefix, _) in imports {
        if prefixes.contains(&prefix.as_str()) {
            return Err(module_error(
                name,
                ErrorKind::Exists,
                format!("prefix \"{prefix}\" is already used"),
            ));
        }
        prefixes.push(prefix.as_str());
    }

    let name_id = schema.intern(name);
    let ns_id = schema.intern(namespace);
    let prefix_id = schema.intern(&parsed.prefix);
    let mut module = CompiledModule::new(ModuleId::from_raw(1).unwrap(), name_id, ns_id, prefix_id);
    module.version = version;
    module.implemented = implement;

    // Revisions, newest first.
    let mut revisions = parsed.revisions.clone();
    revisions.sort_by(|a, b| b.date.cmp(&a.date));
    module.revision = revisions.first().map(|r| schema.intern(&r.date));
    module.revisions = revisions
        .iter()
        .map(|r| Revision {
            date: schema.intern(&r.date),
            description: r.description.as_deref().map(|d| schema.intern(d)),
        })
        .collect();

    module.imports = imports
        .iter()
        .map(|(prefix, id)| (schema.intern(prefix), *id))
        .collect();
    module.includes = parsed
        .includes
        .iter()
        .map(|i| schema.intern(&i.submodule))
        .collect();

    if let Some(organization) = &parsed.organization {
        module.organization = Some(schema.intern(organization));
    }
    if let Some(contact) = &parsed.contact {
        module.contact = Some(schema.intern(contact));
    }
    if let Some(description) = &parsed.description {
        module.description = Some(schema.intern(description));
    }

    let id = schema
        .add_module(module)
        .map_err(|e| module_error(name, ErrorKind::Memory, e.to_string()))?;
    update_latest_revision(schema, name, id);
    Ok(Registered::New(id))
}

/// Maintain the `latest-revision` flag across all loaded revisions of a
/// name. A missing revision date sorts oldest.
fn update_latest_revision(schema: &mut Schema, name: &str, _added: ModuleId) {
    let ids: Vec<ModuleId> = schema.modules_by_name(name).to_vec();
    let latest = ids
        .iter()
        .copied()
        .max_by_key(|&id| {
            schema
                .module(id)
                .revision
                .map(|r| schema.str(r).to_owned())
        });
    for id in ids {
        schema.module_mut(id).latest_revision = Some(id) == latest;
    }
}

/// Register the extension definitions of the module and its submodules,
/// with duplicate detection.
pub(crate) fn register_extensions(
    schema: &mut Schema,
    module: ModuleId,
    parsed: &ParsedModule,
    submodules: &[ParsedModule],
) -> Result<()> {
    let module_name = schema.str(schema.module(module).name).to_owned();
    let defs = parsed
        .extensions
        .iter()
        .chain(submodules.iter().flat_map(|s| s.extensions.iter()));
    for def in defs {
        let name = schema.intern(&def.name);
        if schema.find_extension(module, name).is_some() {
            return Err(module_error(
                &module_name,
                ErrorKind::Exists,
                format!("duplicate extension \"{}\"", def.name),
            ));
        }
        let argument_name = def.argument.as_deref().map(|a| schema.intern(a));
        let record = CompiledExtensionDef {
            id: ExtensionId::from_raw(1).unwrap(),
            name,
            module,
            argument_name,
        };
        let id = schema
            .add_extension(record)
            .map_err(|e| module_error(&module_name, ErrorKind::Memory, e.to_string()))?;
        schema.module_mut(module).extensions.push(id);
    }
    Ok(())
}

/// Name-uniqueness checks inside the typedef/grouping/feature/identity
/// namespace partitions of the module (with submodule top levels merged),
/// plus the builtin-shadowing rule for typedefs.
pub(crate) fn check_definition_names(
    parsed: &ParsedModule,
    submodules: &[ParsedModule],
) -> Result<()> {
    let name = &parsed.name;
    let mut seen: Vec<&str> = Vec::new();
    for tpdf in parsed
        .typedefs
        .iter()
        .chain(submodules.iter().flat_map(|s| s.typedefs.iter()))
    {
        if crate::model::BaseType::from_ident(&tpdf.name).is_some() {
            return Err(module_error(
                name,
                ErrorKind::Denied,
                format!("typedef \"{}\" shadows a built-in type", tpdf.name),
            ));
        }
        if seen.contains(&tpdf.name.as_str()) {
            return Err(module_error(
                name,
                ErrorKind::Exists,
                format!("duplicate typedef \"{}\"", tpdf.name),
            ));
        }
        seen.push(&tpdf.name);
    }

    let mut seen: Vec<&str> = Vec::new();
    for grouping in parsed
        .groupings
        .iter()
        .chain(submodules.iter().flat_map(|s| s.groupings.iter()))
    {
        if seen.contains(&grouping.name.as_str()) {
            return Err(module_error(
                name,
                ErrorKind::Exists,
                format!("duplicate grouping \"{}\"", grouping.name),
            ));
        }
        seen.push(&grouping.name);
    }
    Ok(())
}
