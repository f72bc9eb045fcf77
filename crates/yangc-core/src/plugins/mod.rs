//! Extension plugin dispatch.
//!
//! Extension instances are resolved to a plugin by the defining module and
//! extension name through a process-wide registry. The registry is seeded
//! with the built-in plugins on first use and may be extended by the host;
//! it is the only process-wide mutable state of the library.

pub mod nacm;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::Result;
use crate::model::{ModuleId, NodeId, Schema};

/// When a plugin's compile hook runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtHookPhase {
    /// Right after the host node is shaped, before its children are
    /// compiled.
    Node,
    /// After the whole schema tree of the compile is built, before the
    /// final validation sweep. Needed by plugins that walk descendants.
    Tree,
}

/// The statement hosting an extension instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtHost {
    /// A compiled schema node.
    Node(NodeId),
    /// A module statement.
    Module(ModuleId),
}

/// A compiled-schema extension plugin.
///
/// The compile hook may attach opaque data to the instance, reject the
/// instantiation with a diagnostic, or synthesize further instances on
/// descendant nodes. The validate hook runs per data instance and is out of
/// the schema compiler's scope; the default implementation accepts.
pub trait ExtensionPlugin: Send + Sync {
    /// Stable plugin identifier for diagnostics.
    fn id(&self) -> &'static str;

    /// Which compile phase the hook wants.
    fn phase(&self) -> ExtHookPhase {
        ExtHookPhase::Node
    }

    /// Compile one extension instance: `host` carries the instance at
    /// `ext_index` in its extension list. Errors surface as compile errors
    /// of kind `extension`.
    fn compile(&self, schema: &mut Schema, host: ExtHost, ext_index: usize) -> Result<()>;

    /// Data-instance validation hook.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

type Registry = HashMap<(String, String), Arc<dyn ExtensionPlugin>>;

static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

fn registry() -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| {
        let mut map: Registry = HashMap::new();
        let plugin: Arc<dyn ExtensionPlugin> = Arc::new(nacm::NacmPlugin);
        for name in ["default-deny-write", "default-deny-all"] {
            map.insert((nacm::NACM_MODULE.to_owned(), name.to_owned()), plugin.clone());
        }
        RwLock::new(map)
    })
}

/// Register a plugin for `(module, extension)`. Replaces any previous
/// registration for the pair.
pub fn register(module: &str, extension: &str, plugin: Arc<dyn ExtensionPlugin>) {
    registry()
        .write()
        .expect("plugin registry poisoned")
        .insert((module.to_owned(), extension.to_owned()), plugin);
}

/// Find the plugin registered for `(module, extension)`.
#[must_use]
pub fn find(module: &str, extension: &str) -> Option<Arc<dyn ExtensionPlugin>> {
    registry()
        .read()
        .expect("plugin registry poisoned")
        .get(&(module.to_owned(), extension.to_owned()))
        .cloned()
}
