//! Integration tests driving the compiler with programmatically built
//! parsed modules.

use yangc_core::context::{Context, FeatureSet};
use yangc_core::error::ErrorKind;
use yangc_core::model::{
    BaseType, FeatureState, ModuleId, NodeId, NodeKind, NodeTag, Schema,
};
use yangc_core::parsed::{
    ParsedAugment, ParsedCase, ParsedChoice, ParsedCommon, ParsedContainer, ParsedDeviate,
    ParsedDeviation, ParsedExtInstance, ParsedExtensionDef, ParsedFeature, ParsedGrouping,
    ParsedImport, ParsedInOut, ParsedLeaf, ParsedLeafList, ParsedList, ParsedModule, ParsedNode,
    ParsedOperation, ParsedRefine, ParsedRevision, ParsedType, ParsedTypedef, ParsedUses,
    DeviateProperties,
};
use yangc_core::plugins::nacm;

fn module(name: &str) -> ParsedModule {
    ParsedModule::new(name, format!("urn:test:{name}"), name)
}

fn leaf(name: &str, typ: ParsedType) -> ParsedNode {
    ParsedNode::Leaf(ParsedLeaf::new(name, typ))
}

fn container(name: &str, children: Vec<ParsedNode>) -> ParsedNode {
    ParsedNode::Container(ParsedContainer {
        common: ParsedCommon::named(name),
        children,
        ..ParsedContainer::default()
    })
}

fn compile_one(parsed: ParsedModule) -> (Context, ModuleId) {
    let mut ctx = Context::new();
    let report = ctx.compile(vec![parsed]).expect("module should compile");
    assert_eq!(report.modules.len(), 1);
    (ctx, report.modules[0])
}

fn compile_err(batch: Vec<ParsedModule>) -> yangc_core::CompileError {
    let mut ctx = Context::new();
    ctx.compile(batch).expect_err("compile should fail")
}

fn top_named(schema: &Schema, module: ModuleId, name: &str) -> NodeId {
    let n = schema.find_str(name).expect("name interned");
    let record = schema.module(module);
    record
        .data
        .iter()
        .chain(&record.rpcs)
        .chain(&record.notifications)
        .copied()
        .find(|&id| schema.node(id).name == n)
        .unwrap_or_else(|| panic!("top-level node \"{name}\" not found"))
}

fn child_named(schema: &Schema, parent: NodeId, name: &str) -> NodeId {
    let n = schema.find_str(name).expect("name interned");
    schema
        .node(parent)
        .children()
        .iter()
        .copied()
        .find(|&id| schema.node(id).name == n)
        .unwrap_or_else(|| panic!("child \"{name}\" not found"))
}

// === Basic compilation ===

#[test]
fn test_single_leaf_module() {
    let mut m = module("basic");
    m.revisions.push(ParsedRevision::new("2024-01-15"));
    m.data.push(leaf("hostname", ParsedType::plain("string")));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let record = schema.module(id);
    assert!(record.implemented);
    assert!(record.latest_revision);
    assert_eq!(schema.str(record.revision.unwrap()), "2024-01-15");

    let hostname = top_named(schema, id, "hostname");
    let node = schema.node(hostname);
    assert_eq!(node.tag(), NodeTag::Leaf);
    assert!(node.flags.config);
    assert_eq!(schema.typ(node.value_type().unwrap()).base, BaseType::String);
}

#[test]
fn test_invalid_revision_date() {
    let mut m = module("bad-date");
    m.revisions.push(ParsedRevision::new("2023-02-29"));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Syntax);
}

#[test]
fn test_duplicate_sibling_name() {
    let mut m = module("dup");
    m.data.push(leaf("x", ParsedType::plain("string")));
    m.data.push(leaf("x", ParsedType::plain("int32")));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Exists);
}

#[test]
fn test_config_true_under_config_false() {
    let mut state = ParsedContainer {
        common: ParsedCommon::named("state"),
        ..ParsedContainer::default()
    };
    state.common.config = Some(false);
    let mut inner = ParsedLeaf::new("bad", ParsedType::plain("string"));
    inner.common.config = Some(true);
    state.children.push(ParsedNode::Leaf(inner));

    let mut m = module("cfg");
    m.data.push(ParsedNode::Container(state));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Denied);
}

#[test]
fn test_anydata_requires_yang_1_1() {
    let mut m = module("anyd");
    m.data.push(ParsedNode::AnyData(yangc_core::parsed::ParsedAny {
        common: ParsedCommon::named("blob"),
        ..Default::default()
    }));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Denied);

    let mut m = module("anyd");
    m.yang_version = Some("1.1".into());
    m.data.push(ParsedNode::AnyData(yangc_core::parsed::ParsedAny {
        common: ParsedCommon::named("blob"),
        ..Default::default()
    }));
    compile_one(m);
}

// === S1: numeric restriction subset ===

#[test]
fn test_range_not_a_subset_fails() {
    let mut m = module("s1");
    m.typedefs.push(ParsedTypedef::new(
        "T",
        ParsedType::ranged("int32", "-100..100"),
    ));
    m.data.push(leaf("x", ParsedType::ranged("T", "-25..50|100..200")));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);
}

#[test]
fn test_range_subset_succeeds() {
    let mut m = module("s1ok");
    m.typedefs.push(ParsedTypedef::new(
        "T",
        ParsedType::ranged("int32", "-200..200"),
    ));
    m.data.push(leaf("x", ParsedType::ranged("T", "-25..50|100..200")));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let x = top_named(schema, id, "x");
    let typ = schema.typ(schema.node(x).value_type().unwrap());
    assert_eq!(typ.base, BaseType::Int32);
    let range = typ.range.as_ref().unwrap();
    assert_eq!(range.parts, vec![(-25, 50), (100, 200)]);
}

#[test]
fn test_typedef_cycle() {
    let mut m = module("tcycle");
    m.typedefs.push(ParsedTypedef::new("T1", ParsedType::plain("T2")));
    m.typedefs.push(ParsedTypedef::new("T2", ParsedType::plain("T1")));
    m.data.push(leaf("x", ParsedType::plain("T1")));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Cycle);
}

#[test]
fn test_shared_typedef_compiled_once() {
    let mut m = module("share");
    m.typedefs.push(ParsedTypedef::new(
        "port",
        ParsedType::ranged("uint16", "1..65535"),
    ));
    m.data.push(leaf("a", ParsedType::plain("port")));
    m.data.push(leaf("b", ParsedType::plain("port")));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let a = schema.node(top_named(schema, id, "a")).value_type().unwrap();
    let b = schema.node(top_named(schema, id, "b")).value_type().unwrap();
    assert_eq!(a, b, "restriction-free use sites share the typedef record");
}

// === S2: unique across container ===

fn s2_list(unique: &str, nested_list: bool) -> ParsedModule {
    let c_children = if nested_list {
        vec![
            leaf("u2", ParsedType::plain("string")),
            ParsedNode::List(ParsedList::new(
                "inner",
                Some("ik"),
                vec![
                    leaf("ik", ParsedType::plain("string")),
                    leaf("u3", ParsedType::plain("string")),
                ],
            )),
        ]
    } else {
        vec![
            leaf("u2", ParsedType::plain("string")),
            leaf("u3", ParsedType::plain("string")),
        ]
    };
    let mut list = ParsedList::new(
        "list1",
        Some("k"),
        vec![
            leaf("k", ParsedType::plain("string")),
            leaf("u1", ParsedType::plain("string")),
            container("c", c_children),
        ],
    );
    list.uniques.push(unique.into());

    let mut m = module("s2");
    m.data.push(ParsedNode::List(list));
    m
}

#[test]
fn test_unique_resolves_across_container() {
    let (ctx, id) = compile_one(s2_list("u1 c/u2 c/u3", false));
    let schema = ctx.schema();
    let list = top_named(schema, id, "list1");
    let NodeKind::List { uniques, keys, .. } = &schema.node(list).kind else {
        panic!("expected a list");
    };
    assert_eq!(keys.len(), 1);
    assert_eq!(uniques.len(), 1);
    assert_eq!(uniques[0].leaves.len(), 3);

    let c = child_named(schema, list, "c");
    assert_eq!(schema.node(uniques[0].leaves[0]).parent, Some(list));
    assert_eq!(schema.node(uniques[0].leaves[1]).parent, Some(c));
    assert_eq!(schema.node(uniques[0].leaves[2]).parent, Some(c));
}

#[test]
fn test_unique_across_nested_list_fails() {
    let err = compile_err(vec![s2_list("u1 c/u2 c/inner/u3", true)]);
    assert_eq!(err.kind, ErrorKind::Semantic);
}

#[test]
fn test_list_key_rules() {
    // Key must be a direct child leaf of non-empty type, and a config
    // list must have one.
    let mut m = module("keys");
    m.data.push(ParsedNode::List(ParsedList::new(
        "l",
        Some("k"),
        vec![leaf("k", ParsedType::plain("empty"))],
    )));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);

    let mut m = module("keys2");
    m.data
        .push(ParsedNode::List(ParsedList::new("l", None, vec![])));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);

    let mut m = module("keys3");
    m.data.push(ParsedNode::List(ParsedList::new(
        "l",
        Some("k"),
        vec![leaf("k", ParsedType::plain("string"))],
    )));
    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let list = top_named(schema, id, "l");
    let NodeKind::List { keys, .. } = &schema.node(list).kind else {
        panic!("expected a list");
    };
    let key = schema.node(keys[0]);
    assert!(key.flags.mandatory, "key leaves are implicitly mandatory");
    assert!(matches!(key.kind, NodeKind::Leaf { is_key: true, .. }));
}

// === S3: leaf-list bounds ===

#[test]
fn test_leaf_list_bounds() {
    let mut ok = ParsedLeafList::new("ll", ParsedType::plain("string"));
    ok.min_elements = Some(3);
    ok.max_elements = Some(5);
    let mut m = module("s3");
    m.data.push(ParsedNode::LeafList(ok));
    let (ctx, id) = compile_one(m);
    let ll = top_named(ctx.schema(), id, "ll");
    assert!(matches!(
        ctx.schema().node(ll).kind,
        NodeKind::LeafList {
            min_elements: 3,
            max_elements: Some(5),
            ..
        }
    ));

    let mut bad = ParsedLeafList::new("ll", ParsedType::plain("string"));
    bad.min_elements = Some(6);
    bad.max_elements = Some(5);
    let mut m = module("s3bad");
    m.data.push(ParsedNode::LeafList(bad));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);
}

// === S4: leafref of leafref in a union ===

fn s4_module(llist5_path: &str, llist7_path: &str) -> ParsedModule {
    let mut m = module("s4");
    m.yang_version = Some("1.1".into());
    m.data.push(container(
        "cont1",
        vec![
            ParsedNode::LeafList(ParsedLeafList::new("llist1", ParsedType::plain("int8"))),
            ParsedNode::LeafList(ParsedLeafList::new(
                "llist5",
                ParsedType::leafref(llist5_path),
            )),
            ParsedNode::LeafList(ParsedLeafList::new(
                "llist7",
                ParsedType::union(vec![
                    ParsedType::leafref(llist7_path),
                    ParsedType::plain("int8"),
                ]),
            )),
        ],
    ));
    m
}

#[test]
fn test_leafref_chain_resolves_through_fix_point() {
    let (ctx, id) = compile_one(s4_module("/cont1/llist1", "/cont1/llist5"));
    let schema = ctx.schema();
    let cont1 = top_named(schema, id, "cont1");
    let llist1 = child_named(schema, cont1, "llist1");
    let llist5 = child_named(schema, cont1, "llist5");
    let llist7 = child_named(schema, cont1, "llist7");

    let t5 = schema.typ(schema.node(llist5).value_type().unwrap());
    let l5 = t5.leafref.as_ref().unwrap();
    assert_eq!(l5.target, Some(llist1));
    assert!(l5.require_instance);
    assert_eq!(schema.typ(l5.realtype.unwrap()).base, BaseType::Int8);

    let t7 = schema.typ(schema.node(llist7).value_type().unwrap());
    assert_eq!(t7.base, BaseType::Union);
    let member = schema.typ(t7.members[0]);
    let l7 = member.leafref.as_ref().unwrap();
    assert_eq!(l7.target, Some(llist5));
    assert_eq!(schema.typ(l7.realtype.unwrap()).base, BaseType::Int8);
}

#[test]
fn test_mutual_leafrefs_fail_with_cycle() {
    let err = compile_err(vec![s4_module("/cont1/llist7", "/cont1/llist5")]);
    assert_eq!(err.kind, ErrorKind::Cycle);
}

#[test]
fn test_union_flattening_and_1_0_restrictions() {
    let mut m = module("u10");
    m.data.push(leaf(
        "x",
        ParsedType::union(vec![
            ParsedType::plain("empty"),
            ParsedType::plain("string"),
        ]),
    ));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Denied);

    let mut m = module("uflat");
    m.yang_version = Some("1.1".into());
    m.data.push(leaf(
        "x",
        ParsedType::union(vec![
            ParsedType::plain("int8"),
            ParsedType::union(vec![
                ParsedType::plain("string"),
                ParsedType::plain("boolean"),
            ]),
        ]),
    ));
    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let x = top_named(schema, id, "x");
    let typ = schema.typ(schema.node(x).value_type().unwrap());
    let bases: Vec<BaseType> = typ.members.iter().map(|&t| schema.typ(t).base).collect();
    assert_eq!(
        bases,
        vec![BaseType::Int8, BaseType::String, BaseType::Boolean]
    );
}

// === S5: NACM inheritance ===

fn nacm_module() -> ParsedModule {
    let mut m = ParsedModule::new(
        "ietf-netconf-acm",
        "urn:ietf:params:xml:ns:yang:ietf-netconf-acm",
        "nacm",
    );
    m.extensions
        .push(ParsedExtensionDef::new("default-deny-write"));
    m.extensions
        .push(ParsedExtensionDef::new("default-deny-all"));
    m
}

#[test]
fn test_nacm_inheritance() {
    let mut top = ParsedContainer {
        common: ParsedCommon::named("top"),
        children: vec![
            leaf("a", ParsedType::plain("string")),
            container("c2", vec![leaf("b", ParsedType::plain("string"))]),
        ],
        ..ParsedContainer::default()
    };
    top.common
        .exts
        .push(ParsedExtInstance::new("nacm:default-deny-write"));

    let mut m = module("protected");
    m.imports
        .push(ParsedImport::new("ietf-netconf-acm", "nacm"));
    m.data.push(ParsedNode::Container(top));

    let mut ctx = Context::new();
    let report = ctx.compile(vec![nacm_module(), m]).expect("should compile");
    let schema = ctx.schema();
    let protected = report.modules[1];
    let top = top_named(schema, protected, "top");

    let flag_on = |id: NodeId| {
        schema
            .node(id)
            .exts
            .iter()
            .find_map(nacm::flag_of)
            .expect("node carries a NACM flag")
    };
    assert_eq!(flag_on(top), nacm::NacmFlag::DenyWrite);
    let a = child_named(schema, top, "a");
    let c2 = child_named(schema, top, "c2");
    let b = child_named(schema, c2, "b");
    assert_eq!(flag_on(a), nacm::NacmFlag::DenyWrite);
    assert_eq!(flag_on(c2), nacm::NacmFlag::DenyWrite);
    assert_eq!(flag_on(b), nacm::NacmFlag::DenyWrite);
}

#[test]
fn test_nacm_own_tag_shields_subtree() {
    let mut c2 = ParsedContainer {
        common: ParsedCommon::named("c2"),
        children: vec![leaf("b", ParsedType::plain("string"))],
        ..ParsedContainer::default()
    };
    c2.common
        .exts
        .push(ParsedExtInstance::new("nacm:default-deny-all"));
    let mut top = ParsedContainer {
        common: ParsedCommon::named("top"),
        children: vec![ParsedNode::Container(c2)],
        ..ParsedContainer::default()
    };
    top.common
        .exts
        .push(ParsedExtInstance::new("nacm:default-deny-write"));

    let mut m = module("shielded");
    m.imports
        .push(ParsedImport::new("ietf-netconf-acm", "nacm"));
    m.data.push(ParsedNode::Container(top));

    let mut ctx = Context::new();
    let report = ctx.compile(vec![nacm_module(), m]).expect("should compile");
    let schema = ctx.schema();
    let top = top_named(schema, report.modules[1], "top");
    let c2 = child_named(schema, top, "c2");
    let b = child_named(schema, c2, "b");

    // c2 keeps its own deny-all; b inherits from c2, not from top.
    let flags: Vec<_> = schema.node(c2).exts.iter().filter_map(nacm::flag_of).collect();
    assert_eq!(flags, vec![nacm::NacmFlag::DenyAll]);
    let flags: Vec<_> = schema.node(b).exts.iter().filter_map(nacm::flag_of).collect();
    assert_eq!(flags, vec![nacm::NacmFlag::DenyAll]);
}

#[test]
fn test_nacm_deny_write_rejected_on_rpc() {
    let mut rpc = ParsedOperation::new("do-thing");
    rpc.exts
        .push(ParsedExtInstance::new("nacm:default-deny-write"));
    let mut m = module("rpcnacm");
    m.imports
        .push(ParsedImport::new("ietf-netconf-acm", "nacm"));
    m.rpcs.push(rpc);

    let err = compile_err(vec![nacm_module(), m]);
    assert_eq!(err.kind, ErrorKind::Extension);
}

#[test]
fn test_unknown_extension_is_a_reference_error() {
    let mut top = ParsedContainer {
        common: ParsedCommon::named("top"),
        ..ParsedContainer::default()
    };
    top.common
        .exts
        .push(ParsedExtInstance::new("nacm:no-such-extension"));
    let mut m = module("unknown-ext");
    m.imports
        .push(ParsedImport::new("ietf-netconf-acm", "nacm"));
    m.data.push(ParsedNode::Container(top));
    let err = compile_err(vec![nacm_module(), m]);
    assert_eq!(err.kind, ErrorKind::Reference);
}

// === S6: feature gating ===

fn s6_module() -> ParsedModule {
    let mut gated = ParsedLeaf::new("gated", ParsedType::plain("string"));
    gated.common.if_features.push("F".into());

    let mut m = module("fmod");
    m.features.push(ParsedFeature::new("F"));
    m.data.push(ParsedNode::Leaf(gated));
    m.data
        .push(leaf("pointer", ParsedType::leafref("/gated")));
    m
}

#[test]
fn test_disabled_feature_prunes_leaf_and_breaks_leafref() {
    let err = compile_err(vec![s6_module()]);
    assert_eq!(err.kind, ErrorKind::Reference);
}

#[test]
fn test_enabled_feature_restores_compile() {
    let mut ctx = Context::new();
    ctx.set_features("fmod", FeatureSet::All);
    let report = ctx.compile(vec![s6_module()]).expect("should compile");
    let schema = ctx.schema();
    let id = report.modules[0];
    let gated = top_named(schema, id, "gated");
    let pointer = top_named(schema, id, "pointer");
    let typ = schema.typ(schema.node(pointer).value_type().unwrap());
    assert_eq!(typ.leafref.as_ref().unwrap().target, Some(gated));
    assert_eq!(
        ctx.feature_state("fmod", "F"),
        FeatureState::Enabled
    );
}

#[test]
fn test_feature_gating_is_monotone() {
    // Disabling the feature removes the gated leaf and nothing else.
    let mut m = s6_module();
    m.data.pop(); // drop the leafref so the gated variant compiles

    let mut ctx = Context::new();
    ctx.set_features("fmod", FeatureSet::All);
    let report = ctx.compile(vec![m.clone()]).expect("enabled should compile");
    let enabled_count = ctx.schema().module(report.modules[0]).data.len();

    let mut ctx = Context::new();
    let report = ctx.compile(vec![m]).expect("disabled should compile");
    let disabled_count = ctx.schema().module(report.modules[0]).data.len();

    assert_eq!(enabled_count, 1);
    assert_eq!(disabled_count, 0);
}

#[test]
fn test_feature_guard_cycle() {
    let mut f1 = ParsedFeature::new("f1");
    f1.if_features.push("f2".into());
    let mut f2 = ParsedFeature::new("f2");
    f2.if_features.push("f1".into());
    let mut m = module("fcycle");
    m.features.push(f1);
    m.features.push(f2);
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Cycle);
}

#[test]
fn test_enabled_feature_with_failing_guard_is_denied() {
    let mut dependent = ParsedFeature::new("dep");
    dependent.if_features.push("base".into());
    let mut m = module("fguard");
    m.features.push(ParsedFeature::new("base"));
    m.features.push(dependent);

    let mut ctx = Context::new();
    ctx.set_features("fguard", FeatureSet::Some(vec!["dep".into()]));
    let err = ctx.compile(vec![m]).expect_err("guard cannot hold");
    assert_eq!(err.kind, ErrorKind::Denied);
}

// === Groupings and uses ===

#[test]
fn test_uses_expansion_is_referentially_transparent() {
    let mut m = module("groups");
    m.groupings.push(ParsedGrouping::new(
        "endpoint",
        vec![
            leaf("address", ParsedType::plain("string")),
            leaf("port", ParsedType::ranged("uint16", "1..65535")),
        ],
    ));
    m.data.push(container(
        "client",
        vec![ParsedNode::Uses(ParsedUses::new("endpoint"))],
    ));
    m.data.push(container(
        "server",
        vec![ParsedNode::Uses(ParsedUses::new("endpoint"))],
    ));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let client = top_named(schema, id, "client");
    let server = top_named(schema, id, "server");

    let shape = |parent: NodeId| -> Vec<(String, NodeTag, Option<BaseType>)> {
        schema
            .node(parent)
            .children()
            .iter()
            .map(|&c| {
                let node = schema.node(c);
                (
                    schema.str(node.name).to_owned(),
                    node.tag(),
                    node.value_type().map(|t| schema.typ(t).base),
                )
            })
            .collect()
    };
    assert_eq!(shape(client), shape(server));
    assert_eq!(shape(client).len(), 2);
}

#[test]
fn test_uses_and_grouping_do_not_appear_in_compiled_tree() {
    let mut m = module("nouses");
    m.groupings.push(ParsedGrouping::new(
        "g",
        vec![leaf("x", ParsedType::plain("string"))],
    ));
    m.data
        .push(ParsedNode::Uses(ParsedUses::new("g")));
    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    // The grouping's leaf lands directly at the module top level.
    let x = top_named(schema, id, "x");
    assert_eq!(schema.node(x).tag(), NodeTag::Leaf);
    assert_eq!(schema.module(id).data.len(), 1);
}

#[test]
fn test_refine_adjusts_default_and_mandatory() {
    let mut uses = ParsedUses::new("g");
    let mut refine = ParsedRefine::new("x");
    refine.defaults.push("lo".into());
    uses.refines.push(refine);

    let mut m = module("refine");
    m.groupings.push(ParsedGrouping::new(
        "g",
        vec![leaf("x", ParsedType::plain("string"))],
    ));
    m.data.push(ParsedNode::Uses(uses));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let x = top_named(schema, id, "x");
    let NodeKind::Leaf { default, .. } = &schema.node(x).kind else {
        panic!("expected a leaf");
    };
    assert_eq!(schema.str(default.unwrap()), "lo");
}

#[test]
fn test_uses_augment_adds_into_inlined_subtree() {
    let mut uses = ParsedUses::new("g");
    uses.augments.push(ParsedAugment::new(
        "c",
        vec![leaf("extra", ParsedType::plain("string"))],
    ));

    let mut m = module("usesaug");
    m.groupings.push(ParsedGrouping::new(
        "g",
        vec![container("c", vec![leaf("x", ParsedType::plain("string"))])],
    ));
    m.data.push(ParsedNode::Uses(uses));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let c = top_named(schema, id, "c");
    child_named(schema, c, "x");
    child_named(schema, c, "extra");
}

#[test]
fn test_recursive_uses_without_when_is_a_cycle() {
    let mut m = module("gcycle");
    m.groupings.push(ParsedGrouping::new(
        "g",
        vec![container(
            "wrap",
            vec![ParsedNode::Uses(ParsedUses::new("g"))],
        )],
    ));
    m.data.push(ParsedNode::Uses(ParsedUses::new("g")));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Cycle);
}

#[test]
fn test_recursive_uses_broken_by_when() {
    let mut inner = ParsedUses::new("g");
    inner.when = Some("../enabled = 'true'".into());
    let mut m = module("gwhen");
    m.groupings.push(ParsedGrouping::new(
        "g",
        vec![container("wrap", vec![ParsedNode::Uses(inner)])],
    ));
    m.data.push(ParsedNode::Uses(ParsedUses::new("g")));
    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let wrap = top_named(schema, id, "wrap");
    // The recursion is broken: the inner wrap has no children.
    assert!(schema.node(wrap).children().is_empty());
}

#[test]
fn test_cross_module_grouping() {
    let mut lib = module("lib");
    lib.groupings.push(ParsedGrouping::new(
        "named",
        vec![leaf("name", ParsedType::plain("string"))],
    ));

    let mut app = module("app");
    app.imports.push(ParsedImport::new("lib", "lib"));
    app.data.push(container(
        "thing",
        vec![ParsedNode::Uses(ParsedUses::new("lib:named"))],
    ));

    let mut ctx = Context::new();
    let report = ctx.compile(vec![app, lib]).expect("should compile");
    let schema = ctx.schema();
    let app_id = *report.modules.last().unwrap();
    let thing = top_named(schema, app_id, "thing");
    let name = child_named(schema, thing, "name");
    // Inlined nodes belong to the using module.
    assert_eq!(schema.node(name).module, app_id);
}

// === Choice and case ===

#[test]
fn test_choice_shorthand_gets_implicit_case() {
    let mut m = module("choice");
    m.data.push(ParsedNode::Choice(ParsedChoice {
        common: ParsedCommon::named("transport"),
        default_case: Some("tcp".into()),
        children: vec![
            leaf("tcp", ParsedType::plain("string")),
            ParsedNode::Case(ParsedCase {
                common: ParsedCommon::named("udp"),
                children: vec![leaf("port", ParsedType::plain("uint16"))],
            }),
        ],
        ..Default::default()
    }));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let choice = top_named(schema, id, "transport");
    let NodeKind::Choice {
        cases,
        default_case,
    } = &schema.node(choice).kind
    else {
        panic!("expected a choice");
    };
    assert_eq!(cases.len(), 2);
    for &case in cases {
        assert_eq!(schema.node(case).tag(), NodeTag::Case);
    }
    let default = default_case.expect("default case resolved");
    assert_eq!(schema.str(schema.node(default).name), "tcp");
}

#[test]
fn test_choice_default_case_not_found() {
    let mut m = module("chmiss");
    m.data.push(ParsedNode::Choice(ParsedChoice {
        common: ParsedCommon::named("ch"),
        default_case: Some("nope".into()),
        children: vec![leaf("a", ParsedType::plain("string"))],
        ..Default::default()
    }));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn test_mandatory_choice_with_default_fails() {
    let mut m = module("chmand");
    m.data.push(ParsedNode::Choice(ParsedChoice {
        common: ParsedCommon::named("ch"),
        default_case: Some("a".into()),
        mandatory: Some(true),
        children: vec![leaf("a", ParsedType::plain("string"))],
    }));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);
}

// === Operations and notifications ===

#[test]
fn test_rpc_materializes_input_and_output() {
    let mut rpc = ParsedOperation::new("reset");
    rpc.input = Some(ParsedInOut {
        children: vec![leaf("delay", ParsedType::plain("uint32"))],
        ..Default::default()
    });
    let mut m = module("ops");
    m.rpcs.push(rpc);

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let reset = top_named(schema, id, "reset");
    let (input, output) = match &schema.node(reset).kind {
        NodeKind::Rpc { input, output } => (*input, *output),
        _ => panic!("expected an rpc"),
    };
    let input_node = schema.node(input);
    let output_node = schema.node(output);
    assert_eq!(input_node.tag(), NodeTag::Input);
    assert_eq!(output_node.tag(), NodeTag::Output);
    assert!(!input_node.flags.config);
    assert!(!output_node.flags.config);
    assert_eq!(input_node.parent, Some(reset));
    assert_eq!(input_node.children().len(), 1);
    assert!(output_node.children().is_empty());

    let delay = child_named(schema, input, "delay");
    assert!(!schema.node(delay).flags.config);
}

#[test]
fn test_notification_subtree_is_state() {
    let mut m = module("notif");
    m.notifications
        .push(yangc_core::parsed::ParsedNotification::new(
            "link-down",
            vec![leaf("if-name", ParsedType::plain("string"))],
        ));
    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let notif = top_named(schema, id, "link-down");
    assert_eq!(schema.node(notif).tag(), NodeTag::Notification);
    let if_name = child_named(schema, notif, "if-name");
    assert!(!schema.node(if_name).flags.config);
}

// === Augments ===

fn base_module() -> ParsedModule {
    let mut m = module("base");
    m.data.push(container(
        "top",
        vec![leaf("x", ParsedType::plain("string"))],
    ));
    m
}

#[test]
fn test_cross_module_augment() {
    let mut aug = module("extender");
    aug.imports.push(ParsedImport::new("base", "b"));
    aug.augments.push(ParsedAugment::new(
        "/b:top",
        vec![leaf("added", ParsedType::plain("string"))],
    ));

    let mut ctx = Context::new();
    let report = ctx
        .compile(vec![base_module(), aug])
        .expect("should compile");
    let schema = ctx.schema();
    let base_id = report.modules[0];
    let ext_id = report.modules[1];

    let top = top_named(schema, base_id, "top");
    // The target keeps its module; the added child carries the
    // augmenting module.
    assert_eq!(schema.node(top).module, base_id);
    let added = child_named(schema, top, "added");
    assert_eq!(schema.node(added).module, ext_id);
    child_named(schema, top, "x");
}

#[test]
fn test_augment_mandatory_into_foreign_module_requires_when() {
    let mut mandatory = ParsedLeaf::new("must-have", ParsedType::plain("string"));
    mandatory.mandatory = Some(true);

    let mut aug = module("extender");
    aug.imports.push(ParsedImport::new("base", "b"));
    aug.augments.push(ParsedAugment::new(
        "/b:top",
        vec![ParsedNode::Leaf(mandatory.clone())],
    ));
    let err = compile_err(vec![base_module(), aug]);
    assert_eq!(err.kind, ErrorKind::Denied);

    let mut guarded = ParsedAugment::new("/b:top", vec![ParsedNode::Leaf(mandatory)]);
    guarded.when = Some("x = 'on'".into());
    let mut aug = module("extender");
    aug.imports.push(ParsedImport::new("base", "b"));
    aug.augments.push(guarded);
    let mut ctx = Context::new();
    ctx.compile(vec![base_module(), aug]).expect("should compile");
}

#[test]
fn test_augment_target_must_allow_children() {
    let mut aug = module("extender");
    aug.imports.push(ParsedImport::new("base", "b"));
    aug.augments.push(ParsedAugment::new(
        "/b:top/b:x",
        vec![leaf("added", ParsedType::plain("string"))],
    ));
    let err = compile_err(vec![base_module(), aug]);
    assert_eq!(err.kind, ErrorKind::Denied);
}

#[test]
fn test_augment_duplicate_child() {
    let mut aug = module("extender");
    aug.imports.push(ParsedImport::new("base", "b"));
    aug.augments.push(ParsedAugment::new(
        "/b:top",
        vec![leaf("added", ParsedType::plain("string"))],
    ));
    aug.augments.push(ParsedAugment::new(
        "/b:top",
        vec![leaf("added", ParsedType::plain("string"))],
    ));
    let err = compile_err(vec![base_module(), aug]);
    assert_eq!(err.kind, ErrorKind::Exists);
}

// === Deviations ===

#[test]
fn test_deviation_not_supported_removes_node() {
    let mut dev = module("deviator");
    dev.imports.push(ParsedImport::new("base", "b"));
    dev.deviations.push(ParsedDeviation {
        target: "/b:top/b:x".into(),
        deviates: vec![ParsedDeviate::NotSupported],
        ..Default::default()
    });

    let mut ctx = Context::new();
    let report = ctx
        .compile(vec![base_module(), dev])
        .expect("should compile");
    let schema = ctx.schema();
    let top = top_named(schema, report.modules[0], "top");
    assert!(schema.node(top).children().is_empty());
}

#[test]
fn test_deviation_replace_config() {
    let mut dev = module("deviator");
    dev.imports.push(ParsedImport::new("base", "b"));
    dev.deviations.push(ParsedDeviation {
        target: "/b:top".into(),
        deviates: vec![ParsedDeviate::Replace(DeviateProperties {
            config: Some(false),
            ..Default::default()
        })],
        ..Default::default()
    });

    let mut ctx = Context::new();
    let report = ctx
        .compile(vec![base_module(), dev])
        .expect("should compile");
    let schema = ctx.schema();
    let top = top_named(schema, report.modules[0], "top");
    assert!(!schema.node(top).flags.config);
    // Config re-inherits through the deviated subtree.
    let x = child_named(schema, top, "x");
    assert!(!schema.node(x).flags.config);
}

#[test]
fn test_conflicting_replace_from_two_deviators() {
    let mut dev1 = module("dev1");
    dev1.imports.push(ParsedImport::new("base", "b"));
    dev1.deviations.push(ParsedDeviation {
        target: "/b:top".into(),
        deviates: vec![ParsedDeviate::Replace(DeviateProperties {
            config: Some(false),
            ..Default::default()
        })],
        ..Default::default()
    });
    let mut dev2 = module("dev2");
    dev2.imports.push(ParsedImport::new("base", "b"));
    dev2.deviations.push(ParsedDeviation {
        target: "/b:top".into(),
        deviates: vec![ParsedDeviate::Replace(DeviateProperties {
            config: Some(true),
            ..Default::default()
        })],
        ..Default::default()
    });

    let err = compile_err(vec![base_module(), dev1, dev2]);
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[test]
fn test_deviation_add_existing_default_fails() {
    let mut base = module("base");
    let mut x = ParsedLeaf::new("x", ParsedType::plain("string"));
    x.default = Some("dflt".into());
    base.data.push(container("top", vec![ParsedNode::Leaf(x)]));

    let mut dev = module("deviator");
    dev.imports.push(ParsedImport::new("base", "b"));
    dev.deviations.push(ParsedDeviation {
        target: "/b:top/b:x".into(),
        deviates: vec![ParsedDeviate::Add(DeviateProperties {
            defaults: vec!["other".into()],
            ..Default::default()
        })],
        ..Default::default()
    });
    let err = compile_err(vec![base, dev]);
    assert_eq!(err.kind, ErrorKind::Exists);
}

// === Identities and identityref ===

#[test]
fn test_identity_derivation_closure() {
    let mut m = module("idents");
    m.identities
        .push(yangc_core::parsed::ParsedIdentity::new("ethernet", &[]));
    m.identities.push(yangc_core::parsed::ParsedIdentity::new(
        "fast-ethernet",
        &["ethernet"],
    ));
    m.identities.push(yangc_core::parsed::ParsedIdentity::new(
        "gigabit-ethernet",
        &["fast-ethernet"],
    ));
    let mut typ = ParsedType::plain("identityref");
    typ.bases.push("ethernet".into());
    m.data.push(leaf("if-type", typ));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let record = schema.module(id);
    assert_eq!(record.identities.len(), 3);
    let ethernet = record.identities[0];
    let derived = &schema.identity(ethernet).derived;
    assert_eq!(derived.len(), 2, "closure covers both derivations");

    let if_type = top_named(schema, id, "if-type");
    let typ = schema.typ(schema.node(if_type).value_type().unwrap());
    assert_eq!(typ.base, BaseType::Identityref);
    assert_eq!(typ.bases, vec![ethernet]);
}

#[test]
fn test_identityref_default_checked_against_closure() {
    let mut m = module("identdef");
    m.identities
        .push(yangc_core::parsed::ParsedIdentity::new("proto", &[]));
    m.identities
        .push(yangc_core::parsed::ParsedIdentity::new("tcp", &["proto"]));
    let mut typ = ParsedType::plain("identityref");
    typ.bases.push("proto".into());
    let mut l = ParsedLeaf::new("p", typ);
    l.default = Some("tcp".into());
    m.data.push(ParsedNode::Leaf(l));
    compile_one(m);

    let mut m = module("identbad");
    m.identities
        .push(yangc_core::parsed::ParsedIdentity::new("proto", &[]));
    m.identities
        .push(yangc_core::parsed::ParsedIdentity::new("other", &[]));
    let mut typ = ParsedType::plain("identityref");
    typ.bases.push("proto".into());
    let mut l = ParsedLeaf::new("p", typ);
    l.default = Some("other".into());
    m.data.push(ParsedNode::Leaf(l));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);
}

// === Enumerations ===

#[test]
fn test_enum_auto_assignment_and_subset() {
    use yangc_core::parsed::ParsedEnum;

    let mut base_enum = ParsedType::plain("enumeration");
    base_enum.enums.push(ParsedEnum::new("up"));
    base_enum.enums.push(ParsedEnum::with_value("down", 5));
    base_enum.enums.push(ParsedEnum::new("testing"));

    let mut m = module("enums");
    m.typedefs.push(ParsedTypedef::new("oper-state", base_enum));

    let mut restricted = ParsedType::plain("oper-state");
    restricted.enums.push(ParsedEnum::new("up"));
    restricted.enums.push(ParsedEnum::new("down"));
    m.data.push(leaf("state", restricted));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let state = top_named(schema, id, "state");
    let typ = schema.typ(schema.node(state).value_type().unwrap());
    let values: Vec<(String, i32)> = typ
        .enums
        .iter()
        .map(|e| (schema.str(e.name).to_owned(), e.value))
        .collect();
    // "up" auto-assigned 0, "down" keeps its explicit 5.
    assert_eq!(values, vec![("up".into(), 0), ("down".into(), 5)]);
}

#[test]
fn test_enum_value_mismatch_fails() {
    use yangc_core::parsed::ParsedEnum;

    let mut base_enum = ParsedType::plain("enumeration");
    base_enum.enums.push(ParsedEnum::with_value("a", 1));

    let mut m = module("enumbad");
    m.typedefs.push(ParsedTypedef::new("e", base_enum));
    let mut restricted = ParsedType::plain("e");
    restricted.enums.push(ParsedEnum::with_value("a", 2));
    m.data.push(leaf("x", restricted));

    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);
}

#[test]
fn test_enum_not_in_base_fails() {
    use yangc_core::parsed::ParsedEnum;

    let mut base_enum = ParsedType::plain("enumeration");
    base_enum.enums.push(ParsedEnum::new("a"));

    let mut m = module("enumbad2");
    m.typedefs.push(ParsedTypedef::new("e", base_enum));
    let mut restricted = ParsedType::plain("e");
    restricted.enums.push(ParsedEnum::new("b"));
    m.data.push(leaf("x", restricted));

    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);
}

// === Patterns and defaults ===

#[test]
fn test_invalid_pattern_is_a_syntax_error() {
    use yangc_core::parsed::ParsedPattern;
    let mut typ = ParsedType::plain("string");
    typ.patterns.push(ParsedPattern::new("[unclosed"));
    let mut m = module("pat");
    m.data.push(leaf("x", typ));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Syntax);
}

#[test]
fn test_default_must_match_patterns() {
    use yangc_core::parsed::ParsedPattern;
    let mut typ = ParsedType::plain("string");
    typ.patterns.push(ParsedPattern::new("[a-z]+"));
    let mut l = ParsedLeaf::new("x", typ);
    l.default = Some("UPPER".into());
    let mut m = module("patdef");
    m.data.push(ParsedNode::Leaf(l));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Semantic);
}

#[test]
fn test_mandatory_leaf_ignores_typedef_default() {
    let mut m = module("manddef");
    let mut tpdf = ParsedTypedef::new("t", ParsedType::plain("string"));
    tpdf.default = Some("fallback".into());
    m.typedefs.push(tpdf);
    let mut l = ParsedLeaf::new("x", ParsedType::plain("t"));
    l.mandatory = Some(true);
    m.data.push(ParsedNode::Leaf(l));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let x = top_named(schema, id, "x");
    let NodeKind::Leaf { default, .. } = &schema.node(x).kind else {
        panic!("expected a leaf");
    };
    assert!(default.is_none());
    assert!(schema.node(x).flags.mandatory);
}

// === Status ===

#[test]
fn test_current_typedef_referencing_obsolete_fails() {
    let mut m = module("status");
    let mut old = ParsedTypedef::new("old", ParsedType::plain("string"));
    old.status = Some("obsolete".into());
    m.typedefs.push(old);
    m.typedefs
        .push(ParsedTypedef::new("fresh", ParsedType::plain("old")));
    m.data.push(leaf("x", ParsedType::plain("fresh")));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Denied);
}

#[test]
fn test_status_inherited_and_monotonic() {
    let mut parent = ParsedContainer {
        common: ParsedCommon::named("old-stuff"),
        children: vec![leaf("x", ParsedType::plain("string"))],
        ..Default::default()
    };
    parent.common.status = Some("deprecated".into());
    let mut m = module("statinherit");
    m.data.push(ParsedNode::Container(parent));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let cont = top_named(schema, id, "old-stuff");
    let x = child_named(schema, cont, "x");
    assert_eq!(
        schema.node(x).flags.status,
        yangc_core::model::Status::Deprecated
    );

    let mut bad_child = ParsedLeaf::new("x", ParsedType::plain("string"));
    bad_child.common.status = Some("current".into());
    let mut parent = ParsedContainer {
        common: ParsedCommon::named("old-stuff"),
        children: vec![ParsedNode::Leaf(bad_child)],
        ..Default::default()
    };
    parent.common.status = Some("deprecated".into());
    let mut m = module("statbad");
    m.data.push(ParsedNode::Container(parent));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Denied);
}

// === Modules, imports, submodules ===

#[test]
fn test_prefix_collision() {
    let mut m = module("prefixes");
    m.imports.push(ParsedImport::new("other", "prefixes"));
    let other = module("other");
    let err = compile_err(vec![m, other]);
    assert_eq!(err.kind, ErrorKind::Exists);
}

#[test]
fn test_missing_import_is_not_found() {
    let mut m = module("lonely");
    m.imports.push(ParsedImport::new("ghost", "g"));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn test_import_callback() {
    let mut m = module("caller");
    m.imports.push(ParsedImport::new("library", "lib"));
    m.data.push(leaf("x", ParsedType::plain("lib:id")));

    let mut ctx = Context::new();
    ctx.set_import_callback(Box::new(|name, _revision| {
        (name == "library").then(|| {
            let mut lib = ParsedModule::new("library", "urn:test:library", "lib");
            lib.typedefs
                .push(ParsedTypedef::new("id", ParsedType::plain("uint32")));
            lib
        })
    }));
    let report = ctx.compile(vec![m]).expect("should compile");
    let schema = ctx.schema();
    // The imported module is in the context but not implemented.
    let lib = schema.find_module("library", None).expect("library loaded");
    assert!(!lib.implemented);
    let x = top_named(schema, report.modules[0], "x");
    assert_eq!(
        schema.typ(schema.node(x).value_type().unwrap()).base,
        BaseType::Uint32
    );
}

#[test]
fn test_submodule_contributes_top_levels() {
    let mut m = module("parent");
    m.includes.push(yangc_core::parsed::ParsedInclude {
        submodule: "parent-types".into(),
        revision: None,
    });
    let mut sub = ParsedModule::submodule("parent-types", "parent");
    sub.typedefs
        .push(ParsedTypedef::new("id", ParsedType::plain("uint8")));
    sub.data.push(leaf("from-sub", ParsedType::plain("id")));

    let mut ctx = Context::new();
    let report = ctx.compile(vec![m, sub]).expect("should compile");
    let schema = ctx.schema();
    let from_sub = top_named(schema, report.modules[0], "from-sub");
    assert_eq!(
        schema.typ(schema.node(from_sub).value_type().unwrap()).base,
        BaseType::Uint8
    );
}

#[test]
fn test_import_is_idempotent() {
    let mut ctx = Context::new();
    ctx.set_import_callback(Box::new(|name, _| {
        (name == "library").then(|| ParsedModule::new("library", "urn:test:library", "lib"))
    }));
    let first = ctx.import("library", None).expect("first import");
    let second = ctx.import("library", None).expect("second import");
    assert_eq!(first, second);
    assert_eq!(
        ctx.schema()
            .modules()
            .filter(|m| ctx.schema().str(m.name) == "library")
            .count(),
        1
    );
}

#[test]
fn test_failed_module_rolls_back_but_earlier_ones_stay() {
    let good = base_module();
    let mut bad = module("broken");
    bad.imports.push(ParsedImport::new("base", "b"));
    bad.data.push(leaf("x", ParsedType::plain("no-such-type")));

    let mut ctx = Context::new();
    let err = ctx.compile(vec![good, bad]).expect_err("second module fails");
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(!err.diagnostics.is_empty());

    // The first module stays committed; the failing one left nothing.
    assert!(ctx.schema().find_module("base", None).is_some());
    assert!(ctx.schema().find_module("broken", None).is_none());
}

// === Data paths ===

#[test]
fn test_compile_data_path_with_key_predicates() {
    use yangc_core::path::CompiledPredicate;

    let mut m = module("paths");
    m.data.push(ParsedNode::List(ParsedList::new(
        "ifc",
        Some("name"),
        vec![
            leaf("name", ParsedType::plain("string")),
            leaf("mtu", ParsedType::plain("uint16")),
        ],
    )));
    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();

    let compiled = ctx
        .compile_data_path("paths", "/ifc[name='eth0']/mtu")
        .expect("path should compile");
    assert_eq!(compiled.segments.len(), 2);

    let list = top_named(schema, id, "ifc");
    let mtu = child_named(schema, list, "mtu");
    assert_eq!(compiled.segments[0].node, list);
    assert_eq!(compiled.target(), Some(mtu));
    match &compiled.segments[0].predicate {
        CompiledPredicate::ListKeys(keys) => {
            assert_eq!(keys.len(), 1);
            assert_eq!(keys[0].1, "eth0");
        }
        other => panic!("unexpected predicate {other:?}"),
    }
    assert_eq!(compiled.segments[1].predicate, CompiledPredicate::None);

    // All keys are required, and values must fit the key type.
    let err = ctx
        .compile_data_path("paths", "/ifc/mtu")
        .expect_err("missing key predicate");
    assert_eq!(err.kind, ErrorKind::Semantic);
    let err = ctx
        .compile_data_path("paths", "/ifc[mtu='9000']/mtu")
        .expect_err("mtu is not a key");
    assert_eq!(err.kind, ErrorKind::Reference);
}

// === Must/when compilation ===

#[test]
fn test_must_and_when_are_compiled() {
    let mut c = ParsedContainer {
        common: ParsedCommon::named("cont"),
        children: vec![leaf("x", ParsedType::plain("string"))],
        ..Default::default()
    };
    c.musts
        .push(yangc_core::parsed::ParsedMust::new("count(x) <= 1"));
    c.common.when = Some("../enabled = 'true'".into());
    let mut m = module("xp");
    m.data.push(leaf("enabled", ParsedType::plain("boolean")));
    m.data.push(ParsedNode::Container(c));

    let (ctx, id) = compile_one(m);
    let schema = ctx.schema();
    let cont = top_named(schema, id, "cont");
    assert!(schema.node(cont).musts[0].compiled.is_some());
    assert!(schema.node(cont).whens[0].compiled.is_some());
}

#[test]
fn test_broken_must_expression_fails_in_final_sweep() {
    let mut c = ParsedContainer {
        common: ParsedCommon::named("cont"),
        ..Default::default()
    };
    c.musts
        .push(yangc_core::parsed::ParsedMust::new("count(x"));
    let mut m = module("xpbad");
    m.data.push(ParsedNode::Container(c));
    let err = compile_err(vec![m]);
    assert_eq!(err.kind, ErrorKind::Syntax);
}
