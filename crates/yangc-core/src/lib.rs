//! yangc-core: YANG (RFC 7950) schema compiler.
//!
//! This crate takes parsed YANG modules (the statement tree a YANG/YIN
//! parser produces) and compiles them into a schema tree against which
//! configuration and state data can be validated.
//!
//! # Pipeline
//!
//! ```text
//! Parsed modules -> Compiler -> Schema
//!                   ^^^^^^^^
//!                   imports, typedefs, groupings, augments,
//!                   deviations, features, extensions, validation
//! ```
//!
//! - **parsed** (`parsed`): the P-tree input structures
//! - **model** (`model`): the compiled schema arena
//! - **context** (`context`): the owning [`Context`] with its dictionary
//! - **path** (`path`): schema node-id and data-path parsing
//! - **plugins** (`plugins`): extension plugin registry and built-ins
//!
//! # Usage
//!
//! ```
//! use yangc_core::context::Context;
//! use yangc_core::parsed::{ParsedLeaf, ParsedModule, ParsedNode, ParsedType};
//!
//! let mut module = ParsedModule::new("example", "urn:example", "ex");
//! module.data.push(ParsedNode::Leaf(ParsedLeaf::new(
//!     "hostname",
//!     ParsedType::plain("string"),
//! )));
//!
//! let mut ctx = Context::new();
//! let report = ctx.compile(vec![module]).unwrap();
//! assert_eq!(report.modules.len(), 1);
//!
//! let module = ctx.schema().module(report.modules[0]);
//! assert_eq!(module.data.len(), 1);
//! ```

pub mod context;
pub mod error;
pub mod expr;
pub mod model;
pub mod parsed;
pub mod path;
pub mod plugins;
pub mod xpath;

mod compiler;

pub use context::{CompileReport, Context, FeatureSet, ImportCallback};
pub use error::{CompileError, Diagnostic, ErrorKind, Severity};
