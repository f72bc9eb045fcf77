//! Schema node-id and data-path parsing.
//!
//! Two path flavors are consumed by the compiler:
//!
//! - *schema node-id*: `("/" node-id)+` absolute, `node-id ("/" node-id)*`
//!   descendant, with `node-id := [prefix ":"] name` and no predicates;
//! - *data path*: segments may carry predicates in the list-key form
//!   `[k='v']`, the position form `[N]`, or the leaf-list form `[.='v']`.
//!   Leafref paths additionally allow `..` ascents and `current()`-rooted
//!   key predicates, which are checked but not compiled.
//!
//! Parsing yields a [`ParsedPath`]; resolving against the schema yields a
//! [`CompiledPath`] of `(schema node, predicate)` segments.

use crate::error::{CompileError, ErrorKind, Result};
use crate::model::NodeId;

/// Where a path may begin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathBegin {
    /// The path must be absolute.
    Absolute,
    /// The path may be absolute or relative.
    Either,
}

/// Prefix policy, configurable per call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixMode {
    /// Prefixes may be omitted (module-schema paths).
    Optional,
    /// Every name must be prefixed (XML instance-identifier).
    Mandatory,
}

/// Which predicate class a call site accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredicateMode {
    /// No predicates at all (schema node-ids).
    None,
    /// Only `[key='value']` forms.
    Keys,
    /// `[key='value']*`, a single `[N]`, or a single `[.='value']`.
    Simple,
    /// Leafref key predicates `[key=current()/../...]` only.
    Leafref,
}

/// Path parse options.
#[derive(Clone, Copy, Debug)]
pub struct PathParseOptions {
    /// Begin option.
    pub begin: PathBegin,
    /// Whether this is a leafref path (`..` ascents allowed).
    pub leafref: bool,
    /// Prefix policy.
    pub prefixes: PrefixMode,
    /// Accepted predicate class.
    pub predicates: PredicateMode,
}

impl PathParseOptions {
    /// Options for a leafref `path` argument.
    #[must_use]
    pub fn leafref() -> Self {
        Self {
            begin: PathBegin::Either,
            leafref: true,
            prefixes: PrefixMode::Optional,
            predicates: PredicateMode::Leafref,
        }
    }

    /// Options for a schema-format data path.
    #[must_use]
    pub fn data_path() -> Self {
        Self {
            begin: PathBegin::Absolute,
            leafref: false,
            prefixes: PrefixMode::Optional,
            predicates: PredicateMode::Simple,
        }
    }
}

/// A parsed predicate of one path step.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParsedPredicate {
    /// `[N]`, 1-based.
    Position(u64),
    /// `[key='value']`.
    KeyValue {
        /// Key prefix, if written.
        prefix: Option<String>,
        /// Key name.
        name: String,
        /// Literal value.
        value: String,
    },
    /// `[.='value']`.
    LeafListValue(String),
    /// `[key=current()/../a/b]`; checked, never compiled.
    KeyLeafref {
        /// Key prefix, if written.
        prefix: Option<String>,
        /// Key name.
        name: String,
        /// Number of `..` ascents after `current()`.
        up: u32,
        /// Trailing `(prefix, name)` steps.
        steps: Vec<(Option<String>, String)>,
    },
}

/// One step of a parsed path.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathStep {
    /// Prefix, if written.
    pub prefix: Option<String>,
    /// Node name.
    pub name: String,
    /// Predicates in source order.
    pub predicates: Vec<ParsedPredicate>,
}

/// A parsed, unresolved path.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParsedPath {
    /// Whether the path begins with `/`.
    pub absolute: bool,
    /// Leading `..` ascents (leafref relative paths).
    pub up: u32,
    /// The steps, outermost first.
    pub steps: Vec<PathStep>,
}

/// Predicate of a compiled path segment.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompiledPredicate {
    /// No predicate.
    None,
    /// Position predicate, 1-based.
    Position(u64),
    /// All list keys with canonical values.
    ListKeys(Vec<(NodeId, String)>),
    /// Leaf-list value.
    LeafListValue(String),
}

/// One segment of a compiled path.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledPathSegment {
    /// The schema node of this segment.
    pub node: NodeId,
    /// The segment's predicate.
    pub predicate: CompiledPredicate,
}

/// A compiled path: resolved schema nodes with simple predicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledPath {
    /// Segments, outermost first.
    pub segments: Vec<CompiledPathSegment>,
}

impl CompiledPath {
    /// The final (target) node of the path.
    #[must_use]
    pub fn target(&self) -> Option<NodeId> {
        self.segments.last().map(|s| s.node)
    }
}

fn syntax(text: &str, message: impl Into<String>) -> CompileError {
    CompileError::new(
        ErrorKind::Syntax,
        text,
        format!("invalid path: {}", message.into()),
    )
}

/// Character-level scanner over a path expression.
struct Scanner<'a> {
    text: &'a str,
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, rest: text }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(syntax(self.text, format!("expected '{c}'")))
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if let Some(rest) = self.rest.strip_prefix(s) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    /// A YANG identifier: `[A-Za-z_][A-Za-z0-9_.-]*`.
    fn identifier(&mut self) -> Result<String> {
        let start = self.rest;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.bump();
            }
            _ => return Err(syntax(self.text, "expected an identifier")),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                self.bump();
            } else {
                break;
            }
        }
        Ok(start[..start.len() - self.rest.len()].to_owned())
    }

    /// `[prefix:]name`.
    fn node_id(&mut self) -> Result<(Option<String>, String)> {
        let first = self.identifier()?;
        if self.eat(':') {
            let name = self.identifier()?;
            Ok((Some(first), name))
        } else {
            Ok((None, first))
        }
    }

    /// A single- or double-quoted literal.
    fn quoted(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Err(syntax(self.text, "expected a quoted value")),
        };
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(syntax(self.text, "unterminated quoted value")),
            }
        }
    }
}

/// Parse a schema node-id: slash-separated `[prefix:]name` steps without
/// predicates. `absolute` demands a leading `/`.
pub fn parse_schema_nodeid(text: &str, absolute: bool) -> Result<ParsedPath> {
    let opts = PathParseOptions {
        begin: if absolute { PathBegin::Absolute } else { PathBegin::Either },
        leafref: false,
        prefixes: PrefixMode::Optional,
        predicates: PredicateMode::None,
    };
    let path = parse_path(text, &opts)?;
    if absolute && !path.absolute {
        return Err(syntax(text, "schema node-id must be absolute"));
    }
    Ok(path)
}

/// Parse a path expression under the given options.
pub fn parse_path(text: &str, opts: &PathParseOptions) -> Result<ParsedPath> {
    let mut sc = Scanner::new(text);
    sc.skip_ws();
    if sc.is_empty() {
        return Err(syntax(text, "empty path"));
    }

    let mut up = 0u32;
    if opts.leafref {
        while sc.eat_str("..") {
            up += 1;
            if !sc.eat('/') {
                return Err(syntax(text, "'..' must be followed by '/'"));
            }
        }
    }

    let absolute = up == 0 && sc.eat('/');
    if opts.begin == PathBegin::Absolute && !absolute {
        return Err(syntax(text, "path must be absolute"));
    }

    let mut steps = Vec::new();
    loop {
        let (prefix, name) = sc.node_id()?;
        if opts.prefixes == PrefixMode::Mandatory && prefix.is_none() {
            return Err(syntax(text, format!("prefix required on \"{name}\"")));
        }
        let mut predicates = Vec::new();
        while sc.peek() == Some('[') {
            predicates.push(parse_predicate(&mut sc, opts)?);
        }
        check_predicates(text, &predicates, opts)?;
        steps.push(PathStep {
            prefix,
            name,
            predicates,
        });

        if sc.eat('/') {
            continue;
        }
        sc.skip_ws();
        if sc.is_empty() {
            break;
        }
        return Err(syntax(text, "trailing characters after path"));
    }

    Ok(ParsedPath { absolute, up, steps })
}

fn parse_predicate(sc: &mut Scanner<'_>, opts: &PathParseOptions) -> Result<ParsedPredicate> {
    sc.expect('[')?;
    sc.skip_ws();

    let pred = match sc.peek() {
        Some(c) if c.is_ascii_digit() => {
            let mut value = 0u64;
            while let Some(c) = sc.peek() {
                if let Some(d) = c.to_digit(10) {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u64::from(d)))
                        .ok_or_else(|| syntax(sc.text, "position overflows"))?;
                    sc.bump();
                } else {
                    break;
                }
            }
            if value == 0 {
                return Err(syntax(sc.text, "position predicates are 1-based"));
            }
            ParsedPredicate::Position(value)
        }
        Some('.') => {
            sc.bump();
            sc.skip_ws();
            sc.expect('=')?;
            sc.skip_ws();
            ParsedPredicate::LeafListValue(sc.quoted()?)
        }
        _ => {
            let (prefix, name) = sc.node_id()?;
            sc.skip_ws();
            sc.expect('=')?;
            sc.skip_ws();
            if sc.eat_str("current()") {
                // Leafref key predicate: current()/../.../name
                let mut up = 0u32;
                while sc.eat('/') && sc.eat_str("..") {
                    up += 1;
                }
                if up == 0 {
                    return Err(syntax(sc.text, "leafref predicate requires at least one '..'"));
                }
                // The scanner already consumed the '/' before the first
                // non-'..' step in the loop condition above.
                let mut steps = Vec::new();
                loop {
                    steps.push(sc.node_id()?);
                    if !sc.eat('/') {
                        break;
                    }
                    if sc.eat_str("..") {
                        return Err(syntax(sc.text, "'..' after a named step"));
                    }
                }
                ParsedPredicate::KeyLeafref {
                    prefix,
                    name,
                    up,
                    steps,
                }
            } else {
                if opts.predicates == PredicateMode::Leafref {
                    return Err(syntax(sc.text, "leafref predicate must use current()"));
                }
                ParsedPredicate::KeyValue {
                    prefix,
                    name,
                    value: sc.quoted()?,
                }
            }
        }
    };

    sc.skip_ws();
    sc.expect(']')?;
    Ok(pred)
}

fn check_predicates(
    text: &str,
    predicates: &[ParsedPredicate],
    opts: &PathParseOptions,
) -> Result<()> {
    if predicates.is_empty() {
        return Ok(());
    }
    match opts.predicates {
        PredicateMode::None => Err(syntax(text, "predicates are not allowed here")),
        PredicateMode::Keys => {
            if predicates
                .iter()
                .all(|p| matches!(p, ParsedPredicate::KeyValue { .. }))
            {
                Ok(())
            } else {
                Err(syntax(text, "only [key='value'] predicates are allowed here"))
            }
        }
        PredicateMode::Simple => {
            let all_keys = predicates
                .iter()
                .all(|p| matches!(p, ParsedPredicate::KeyValue { .. }));
            let single_simple = predicates.len() == 1
                && matches!(
                    predicates[0],
                    ParsedPredicate::Position(_) | ParsedPredicate::LeafListValue(_)
                );
            if all_keys || single_simple {
                Ok(())
            } else {
                Err(syntax(text, "unsupported predicate combination"))
            }
        }
        PredicateMode::Leafref => {
            if predicates
                .iter()
                .all(|p| matches!(p, ParsedPredicate::KeyLeafref { .. }))
            {
                Ok(())
            } else {
                Err(syntax(text, "only current()-based predicates are allowed here"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_nodeid_absolute() {
        let path = parse_schema_nodeid("/a:top/child/a:leaf", true).unwrap();
        assert!(path.absolute);
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[0].prefix.as_deref(), Some("a"));
        assert_eq!(path.steps[1].prefix, None);
        assert_eq!(path.steps[2].name, "leaf");
    }

    #[test]
    fn test_schema_nodeid_descendant() {
        let path = parse_schema_nodeid("c/u2", false).unwrap();
        assert!(!path.absolute);
        assert_eq!(path.steps.len(), 2);
    }

    #[test]
    fn test_schema_nodeid_rejects_relative_when_absolute_required() {
        assert!(parse_schema_nodeid("a/b", true).is_err());
    }

    #[test]
    fn test_schema_nodeid_rejects_predicates() {
        assert!(parse_schema_nodeid("/a[x='1']/b", true).is_err());
    }

    #[test]
    fn test_leafref_relative() {
        let path = parse_path("../../cont/target", &PathParseOptions::leafref()).unwrap();
        assert!(!path.absolute);
        assert_eq!(path.up, 2);
        assert_eq!(path.steps.len(), 2);
    }

    #[test]
    fn test_leafref_absolute() {
        let path = parse_path("/cont1/llist1", &PathParseOptions::leafref()).unwrap();
        assert!(path.absolute);
        assert_eq!(path.up, 0);
    }

    #[test]
    fn test_leafref_key_predicate() {
        let path = parse_path(
            "/a:ifc[a:name=current()/../ref]/a:mtu",
            &PathParseOptions::leafref(),
        )
        .unwrap();
        assert_eq!(path.steps.len(), 2);
        match &path.steps[0].predicates[0] {
            ParsedPredicate::KeyLeafref { name, up, steps, .. } => {
                assert_eq!(name, "name");
                assert_eq!(*up, 1);
                assert_eq!(steps.len(), 1);
                assert_eq!(steps[0].1, "ref");
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_data_path_key_predicates() {
        let path = parse_path(
            "/m:lst[m:k1='a'][m:k2='b']/m:leaf",
            &PathParseOptions::data_path(),
        )
        .unwrap();
        assert_eq!(path.steps[0].predicates.len(), 2);
        match &path.steps[0].predicates[1] {
            ParsedPredicate::KeyValue { name, value, .. } => {
                assert_eq!(name, "k2");
                assert_eq!(value, "b");
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_data_path_position_predicate() {
        let path = parse_path("/m:lst[3]", &PathParseOptions::data_path()).unwrap();
        assert_eq!(path.steps[0].predicates, vec![ParsedPredicate::Position(3)]);
    }

    #[test]
    fn test_data_path_leaflist_predicate() {
        let path = parse_path("/m:ll[.='v 1']", &PathParseOptions::data_path()).unwrap();
        assert_eq!(
            path.steps[0].predicates,
            vec![ParsedPredicate::LeafListValue("v 1".into())]
        );
    }

    #[test]
    fn test_position_zero_rejected() {
        assert!(parse_path("/m:lst[0]", &PathParseOptions::data_path()).is_err());
    }

    #[test]
    fn test_mandatory_prefixes() {
        let opts = PathParseOptions {
            begin: PathBegin::Absolute,
            leafref: false,
            prefixes: PrefixMode::Mandatory,
            predicates: PredicateMode::Simple,
        };
        assert!(parse_path("/m:a/m:b", &opts).is_ok());
        assert!(parse_path("/m:a/b", &opts).is_err());
    }

    #[test]
    fn test_mixed_predicates_rejected() {
        assert!(parse_path("/m:lst[m:k='a'][2]", &PathParseOptions::data_path()).is_err());
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(parse_path("/a/b !", &PathParseOptions::data_path()).is_err());
        assert!(parse_schema_nodeid("", true).is_err());
    }
}
