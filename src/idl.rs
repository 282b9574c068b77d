//! The IDL serializer (C4, spec.md §4.5, §6): a depth-first walk of a module tree
//! producing line-accurate OMG IDL text — two-space indent, one blank line between
//! top-level declarations of the root module, no trailing whitespace.
//!
//! Structurally this is the same recursive descent `idl2rust::ast`'s `ToTokens` impls
//! perform (one function per kind), just emitting IDL tokens into a line buffer instead
//! of a `proc_macro2::TokenStream` (see the ambient-stack notes for why `quote`/
//! `proc-macro2` are dropped here).

use crate::error::{DdslError, Result};
use crate::kernel::{
    self, AnnotationInstance, AttrValue, Bound, CaseValue, CollectionQualifier, ConstValue, Defn,
    Kind, Member, NodeRef,
};

const INDENT: &str = "  ";

struct Writer {
    lines: Vec<String>,
}

impl Writer {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn push(&mut self, depth: usize, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", INDENT.repeat(depth), text));
        }
    }

    fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Serializes `module` (typically the root module) to IDL text.
pub fn serialize_idl(module: &NodeRef) -> Result<String> {
    let mut w = Writer::new();
    write_module_body(&mut w, module, 0, true)?;
    Ok(w.finish())
}

fn write_module_body(w: &mut Writer, module: &NodeRef, depth: usize, is_root: bool) -> Result<()> {
    let children: Vec<NodeRef> = match &module.borrow().defn {
        Defn::Module(m) => m.children.values().cloned().collect(),
        _ => return Err(DdslError::kind_mismatch("serialize_idl expects a MODULE")),
    };

    let mut first = true;
    for child in &children {
        if matches!(kernel::model_kind(child), Kind::Atom | Kind::Annotation) {
            continue;
        }
        if !first && is_root {
            w.push(depth, "");
        }
        first = false;
        write_decl(w, child, depth)?;
    }
    Ok(())
}

fn write_decl(w: &mut Writer, node: &NodeRef, depth: usize) -> Result<()> {
    match kernel::model_kind(node) {
        Kind::Const => write_const(w, node, depth),
        Kind::Typedef => write_typedef(w, node, depth),
        Kind::Enum => write_enum(w, node, depth),
        Kind::Struct => write_struct(w, node, depth),
        Kind::Union => write_union(w, node, depth),
        Kind::Module => write_module(w, node, depth),
        Kind::Atom | Kind::Annotation => Ok(()),
    }
}

fn const_literal(value: &ConstValue) -> String {
    match value {
        ConstValue::Bool(b) => b.to_string(),
        ConstValue::Int(i) => i.to_string(),
        ConstValue::Float(f) => f.to_string(),
        ConstValue::Char(c) => format!("'{c}'"),
        ConstValue::Str(s) => format!("\"{s}\""),
    }
}

fn write_const(w: &mut Writer, node: &NodeRef, depth: usize) -> Result<()> {
    let borrowed = node.borrow();
    let Defn::Const(c) = &borrowed.defn else { unreachable!() };
    let atom_name = type_name(&c.atom);
    w.push(depth, format!("const {atom_name} {} = {};", borrowed.name, const_literal(&c.value)));
    Ok(())
}

fn type_name(node: &NodeRef) -> String {
    kernel::nsname(node, None).trim_start_matches("::").to_string()
}

fn member_form(ty: &NodeRef, collection: &Option<CollectionQualifier>) -> (String, String) {
    let (base, mut chain) = kernel::resolve(ty);
    if let Some(own) = collection {
        chain.insert(0, kernel::clone_qualifier(own));
    }
    render_chain(&base, &chain)
}

/// Renders a resolved type plus its collection chain into (`type-text`, `trailing-role-suffix`):
/// sequences nest as `sequence<...sequence<T, n>...>` in the type text; arrays append
/// `[n]...` dimensions as a suffix on the role instead (spec.md §4.5).
fn render_chain(base: &NodeRef, chain: &[CollectionQualifier]) -> (String, String) {
    let base_name = type_name(base);
    let mut ty_text = base_name;
    let mut suffix = String::new();
    for q in chain.iter().rev() {
        match q {
            CollectionQualifier::Sequence { bound } => {
                ty_text = match bound {
                    Some(b) => format!("sequence<{ty_text}, {}>", bound_text(b)),
                    None => format!("sequence<{ty_text}>"),
                };
            }
            CollectionQualifier::Array { bounds } => {
                for b in bounds {
                    suffix.push_str(&format!("[{}]", bound_text(b)));
                }
            }
        }
    }
    (ty_text, suffix)
}

fn bound_text(b: &Bound) -> String {
    match b {
        Bound::Literal(n) => n.to_string(),
        Bound::Const(c) => c.borrow().name.clone(),
    }
}

fn annotations_comment(annotations: &[AnnotationInstance]) -> String {
    if annotations.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = annotations
        .iter()
        .map(|a| {
            let name = a.annotation.borrow().name.clone();
            if a.overrides.positional.is_empty() && a.overrides.keyed.is_empty() {
                format!("@{name}")
            } else {
                format!("@{name}({})", attr_value_list(a))
            }
        })
        .collect();
    format!(" // {}", parts.join(" "))
}

fn attr_value_list(a: &AnnotationInstance) -> String {
    let mut parts: Vec<String> = a.overrides.positional.iter().map(attr_value_text).collect();
    for (k, v) in &a.overrides.keyed {
        parts.push(format!("{k}={}", attr_value_text(v)));
    }
    parts.join(", ")
}

fn attr_value_text(v: &AttrValue) -> String {
    match v {
        AttrValue::Bool(b) => b.to_string(),
        AttrValue::Int(i) => i.to_string(),
        AttrValue::Float(f) => f.to_string(),
        AttrValue::Str(s) => format!("\"{s}\""),
        AttrValue::Node(n) => n.borrow().name.clone(),
    }
}

fn write_member_line(w: &mut Writer, depth: usize, m: &Member) {
    let (ty_text, suffix) = member_form(&m.ty, &m.collection);
    let comment = annotations_comment(&m.annotations);
    w.push(depth, format!("{ty_text} {}{suffix};{comment}", m.role));
}

fn write_typedef(w: &mut Writer, node: &NodeRef, depth: usize) -> Result<()> {
    let borrowed = node.borrow();
    let Defn::Typedef(t) = &borrowed.defn else { unreachable!() };
    let (ty_text, suffix) = render_chain_from_typedef(&t.alias, &t.collection);
    w.push(depth, format!("typedef {ty_text} {}{suffix};", borrowed.name));
    Ok(())
}

fn render_chain_from_typedef(alias: &NodeRef, own: &Option<CollectionQualifier>) -> (String, String) {
    let (base, mut chain) = kernel::resolve(alias);
    if let Some(q) = own {
        chain.insert(0, kernel::clone_qualifier(q));
    }
    render_chain(&base, &chain)
}

fn write_enum(w: &mut Writer, node: &NodeRef, depth: usize) -> Result<()> {
    let borrowed = node.borrow();
    let Defn::Enum(e) = &borrowed.defn else { unreachable!() };
    w.push(depth, format!("enum {} {{", borrowed.name));
    let last = e.enumerators.len().saturating_sub(1);
    for (i, (name, ordinal)) in e.enumerators.iter().enumerate() {
        let expected = i as i32 + 1;
        let suffix = if *ordinal == expected { String::new() } else { format!(" = {ordinal}") };
        let comma = if i == last { "" } else { "," };
        w.push(depth + 1, format!("{name}{suffix}{comma}"));
    }
    w.push(depth, "};");
    Ok(())
}

fn write_struct(w: &mut Writer, node: &NodeRef, depth: usize) -> Result<()> {
    let borrowed = node.borrow();
    let Defn::Struct(s) = &borrowed.defn else { unreachable!() };
    for a in &borrowed.qualifiers {
        w.push(depth, format!("@{}", a.annotation.borrow().name));
    }
    let header = match &s.base {
        Some(b) => format!("struct {} : {} {{", borrowed.name, type_name(b)),
        None => format!("struct {} {{", borrowed.name),
    };
    w.push(depth, header);
    for m in &s.members {
        write_member_line(w, depth + 1, m);
    }
    w.push(depth, "};");
    Ok(())
}

fn case_value_text(v: &CaseValue) -> String {
    match v {
        CaseValue::Int(i) => i.to_string(),
        CaseValue::Bool(b) => b.to_string(),
        CaseValue::Str(s) => format!("'{s}'"),
        CaseValue::Enumerator(n) => n.clone(),
        CaseValue::Default => "default".to_string(),
    }
}

fn write_union(w: &mut Writer, node: &NodeRef, depth: usize) -> Result<()> {
    let borrowed = node.borrow();
    let Defn::Union(u) = &borrowed.defn else { unreachable!() };
    let disc_name = type_name(&u.discriminator);
    w.push(depth, format!("union {} switch({disc_name}) {{", borrowed.name));
    for case in &u.cases {
        for v in &case.values {
            let label = case_value_text(v);
            let label = if matches!(v, CaseValue::Default) { "default".to_string() } else { format!("case {label}") };
            w.push(depth + 1, format!("{label} :"));
        }
        write_member_line(w, depth + 2, &case.member);
    }
    w.push(depth, "};");
    Ok(())
}

fn write_module(w: &mut Writer, node: &NodeRef, depth: usize) -> Result<()> {
    let borrowed_name = node.borrow().name.clone();
    let has_children = matches!(&node.borrow().defn, Defn::Module(m) if !m.children.is_empty());
    if !has_children {
        w.push(depth, format!("module {borrowed_name} {{ }};"));
        return Ok(());
    }
    w.push(depth, format!("module {borrowed_name} {{"));
    write_module_body(w, node, depth + 1, false)?;
    w.push(depth, "};");
    Ok(())
}
