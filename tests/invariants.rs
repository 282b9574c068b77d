//! Universal invariants, round-trip/idempotence properties, and boundary cases from
//! spec.md §8, as flat `#[test]` functions (see `scenarios.rs` for S1-S6).

use ddsl::idl::serialize_idl;
use ddsl::model::{self, MemberSpec};
use ddsl::{self as core, Bound, Kind};

fn fresh_root() -> core::NodeRef {
    core::new_template("", Kind::Module, true).unwrap()
}

fn long() -> core::NodeRef {
    core::builtin_atom("long").unwrap()
}

#[test]
fn instance_keys_equal_struct_and_base_roles() {
    let root = fresh_root();
    let base = model::struct_(&root, "Base", None, vec![MemberSpec::new("a", long())], vec![]).unwrap();
    let derived =
        model::struct_(&root, "Derived", Some(base), vec![MemberSpec::new("b", long())], vec![]).unwrap();
    let inst = core::new_instance(&derived, "").unwrap();
    let keys: std::collections::HashSet<_> = inst.borrow().fields.keys().cloned().collect();
    assert_eq!(keys, ["a".to_string(), "b".to_string()].into_iter().collect());
}

#[test]
fn leaf_accessor_is_prefix_dot_role() {
    let root = fresh_root();
    let s = model::struct_(&root, "S", None, vec![MemberSpec::new("x", long())], vec![]).unwrap();

    let templ = core::new_instance(&s, "").unwrap();
    assert_eq!(templ.borrow().get("x").unwrap().as_leaf(), Some("x"));

    let prefixed = core::new_instance(&s, "p").unwrap();
    assert_eq!(prefixed.borrow().get("x").unwrap().as_leaf(), Some("p.x"));
}

#[test]
fn bounded_collection_length_and_element_accessors() {
    let root = fresh_root();
    let seq = model::sequence(Some(Bound::Literal(3)));
    let s = model::struct_(
        &root,
        "S",
        None,
        vec![MemberSpec::new("items", long()).with_collection(seq)],
        vec![],
    )
    .unwrap();
    let inst = core::new_instance(&s, "").unwrap();
    let core::FieldValue::Collection(coll) = inst.borrow().get("items").unwrap().clone() else {
        panic!("expected a collection field");
    };
    assert_eq!(coll.capacity(), Some(3));
    for i in 0..3 {
        let core::FieldValue::Leaf(accessor) = coll.get(i).unwrap() else { panic!("expected a leaf element") };
        assert_eq!(accessor, format!("items[{i}]"));
    }
}

#[test]
fn typedef_chain_resolves_to_non_typedef_terminal() {
    let root = fresh_root();
    let s = model::struct_(&root, "S", None, vec![], vec![]).unwrap();
    let t1 = model::typedef(&root, "T1", s.clone(), None).unwrap();
    let t2 = model::typedef(&root, "T2", t1, None).unwrap();
    let (terminal, chain) = core::resolve(&t2);
    assert!(std::rc::Rc::ptr_eq(&terminal, &s));
    assert!(chain.is_empty());
}

#[test]
fn setting_name_twice_is_a_noop_after_the_first() {
    let root = fresh_root();
    let s = model::struct_(&root, "S", None, vec![], vec![]).unwrap();
    core::set_name(&s, "Renamed").unwrap();
    core::set_name(&s, "Renamed").unwrap();
    assert_eq!(s.borrow().name, "Renamed");
    assert!(core::lookup_child(&root, "Renamed").is_some());
    assert!(core::lookup_child(&root, "S").is_none());
}

#[test]
fn renaming_a_child_preserves_its_declaration_order() {
    let root = fresh_root();
    model::struct_(&root, "A", None, vec![], vec![]).unwrap();
    let b = model::struct_(&root, "B", None, vec![], vec![]).unwrap();
    model::struct_(&root, "C", None, vec![], vec![]).unwrap();

    core::set_name(&b, "Renamed").unwrap();

    let idl = serialize_idl(&root).unwrap();
    let a_pos = idl.find("struct A").unwrap();
    let renamed_pos = idl.find("struct Renamed").unwrap();
    let c_pos = idl.find("struct C").unwrap();
    assert!(a_pos < renamed_pos && renamed_pos < c_pos, "rename must not reorder sibling declarations:\n{idl}");
}

#[test]
fn setting_same_member_twice_leaves_instances_unchanged() {
    let root = fresh_root();
    let s = model::struct_(&root, "S", None, vec![MemberSpec::new("x", long())], vec![]).unwrap();
    let inst = core::new_instance(&s, "").unwrap();
    let before = inst.borrow().get("x").unwrap().as_leaf().map(str::to_string);

    let member = core::Member { role: "x".into(), ty: long(), collection: None, annotations: vec![] };
    core::set_struct_member(&s, 1, Some(member.clone())).unwrap();
    core::set_struct_member(&s, 1, Some(member)).unwrap();

    assert_eq!(inst.borrow().get("x").unwrap().as_leaf().map(str::to_string), before);
}

#[test]
fn empty_root_module_serializes_as_nothing() {
    let root = fresh_root();
    assert_eq!(serialize_idl(&root).unwrap(), "\n");
}

#[test]
fn empty_nested_module_serializes_with_empty_braces() {
    let root = fresh_root();
    model::module(&root, "N").unwrap();
    assert_eq!(serialize_idl(&root).unwrap(), "module N { };\n");
}

#[test]
fn duplicate_enumerator_mutation_fails_and_enum_is_unchanged() {
    let root = fresh_root();
    let e = model::enum_(&root, "E", vec![("RED".into(), None), ("GREEN".into(), None)]).unwrap();
    let err = core::set_enumerator(&e, 3, Some(("RED".into(), None)));
    assert!(err.is_err());
    let ddsl::Defn::Enum(defn) = &e.borrow().defn else { panic!("expected an ENUM") };
    assert_eq!(defn.enumerators, vec![("RED".to_string(), 1), ("GREEN".to_string(), 2)]);
}

#[test]
fn inherited_role_shadowed_by_local_role_is_rejected() {
    let root = fresh_root();
    let base = model::struct_(&root, "Base", None, vec![MemberSpec::new("x", long())], vec![]).unwrap();
    let derived = model::struct_(&root, "Derived", None, vec![MemberSpec::new("x", long())], vec![]).unwrap();
    let err = core::set_base(&derived, Some(base));
    assert!(err.is_err());
}

#[test]
fn unbounded_sequence_len_is_capacity_accessor_and_indexes_lazily() {
    let root = fresh_root();
    let seq = model::sequence(None);
    let s = model::struct_(
        &root,
        "S",
        None,
        vec![MemberSpec::new("items", long()).with_collection(seq)],
        vec![],
    )
    .unwrap();
    let inst = core::new_instance(&s, "").unwrap();
    let core::FieldValue::Collection(coll) = inst.borrow().get("items").unwrap().clone() else {
        panic!("expected a collection field");
    };
    assert_eq!(coll.capacity(), None);
    assert_eq!(coll.length_accessor(), "items");
    assert!(coll.materialized_indices().is_empty());
    let core::FieldValue::Leaf(accessor) = coll.get(4).unwrap() else { panic!("expected a leaf element") };
    assert_eq!(accessor, "items[4]");
    assert_eq!(coll.materialized_indices(), vec![4]);
}

#[test]
fn new_instance_under_different_prefixes_differs_only_in_prefix() {
    let root = fresh_root();
    let s = model::struct_(&root, "S", None, vec![MemberSpec::new("x", long())], vec![]).unwrap();
    let a = core::new_instance(&s, "a").unwrap();
    let b = core::new_instance(&s, "b").unwrap();
    assert_eq!(a.borrow().get("x").unwrap().as_leaf(), Some("a.x"));
    assert_eq!(b.borrow().get("x").unwrap().as_leaf(), Some("b.x"));
}
