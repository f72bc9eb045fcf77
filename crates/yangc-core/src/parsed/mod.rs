//! Parsed-module structures (the P-tree).
//!
//! This is the input side of the pipeline:
//!
//! ```text
//! [Parsed modules] -> Compiler -> Schema
//! ```
//!
//! A YANG/YIN parser produces these structures; their shape mirrors the
//! statement tree of the source. Lexical validation is the parser's job:
//! the compiler assumes statements match the YANG ABNF and enforces the
//! structural and semantic rules on top.

mod module;
mod node;
mod types;

pub use module::{
    DeviateProperties, ParsedDeviate, ParsedDeviation, ParsedExtensionDef, ParsedFeature,
    ParsedIdentity, ParsedImport, ParsedInclude, ParsedModule, ParsedRevision,
};
pub use node::{
    ParsedAny, ParsedAugment, ParsedCase, ParsedChoice, ParsedCommon, ParsedContainer,
    ParsedExtInstance, ParsedGrouping, ParsedInOut, ParsedLeaf, ParsedLeafList, ParsedList,
    ParsedMust, ParsedNode, ParsedNotification, ParsedOperation, ParsedRefine, ParsedUses,
};
pub use types::{ParsedBit, ParsedEnum, ParsedPattern, ParsedType, ParsedTypedef};
