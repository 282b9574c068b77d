//! CONST value coercion (spec.md §4.3). Two entry points: [`coerce`] takes an
//! already-typed Rust value (the common case — callers building a model programmatically
//! already have a `bool`/`i64`/`f64`/`String`), and [`coerce_str`] additionally scans a
//! raw string (the XML importer's `value` attribute) using a small `nom` literal grammar,
//! carried over from the teacher's own lexer in spirit (`idl2rust::parser`'s combinator
//! style) but sized to just the numeric/boolean grammars this needs.

use nom::branch::alt;
use nom::character::complete::{char, digit1};
use nom::combinator::{map, opt, recognize};
use nom::sequence::{pair, preceded};
use nom::IResult;

use crate::error::{DdslError, Result};
use crate::kernel::{AtomDefn, ConstValue, Defn, NodeRef};
use crate::logger::coercion_warning;

/// An already-typed value supplied by a caller constructing a `CONST` programmatically.
#[derive(Debug, Clone)]
pub enum RawConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

fn atom_name(atom: &NodeRef) -> Result<String> {
    let borrowed = atom.borrow();
    match &borrowed.defn {
        Defn::Atom(AtomDefn { dimension }) => {
            // Dimensioned atoms are still string/wstring underneath; strip the cached
            // `"T<n>"` canonical form back to the base name for rule lookup.
            let name = &borrowed.name;
            if dimension.is_some() {
                Ok(name.split('<').next().unwrap_or(name).to_string())
            } else {
                Ok(name.clone())
            }
        }
        _ => Err(DdslError::kind_mismatch("CONST atom must be an ATOM node")),
    }
}

fn is_signed_integral(name: &str) -> bool {
    matches!(name, "short" | "long" | "long_long" | "octet")
}

fn is_unsigned_integral(name: &str) -> bool {
    matches!(name, "unsigned_short" | "unsigned_long" | "unsigned_long_long")
}

fn is_floating(name: &str) -> bool {
    matches!(name, "float" | "double" | "long_double")
}

fn is_char(name: &str) -> bool {
    matches!(name, "char" | "wchar")
}

fn is_string(name: &str) -> bool {
    matches!(name, "string" | "wstring")
}

/// Coerces an already-typed Rust value to the atom's kind per the spec.md §4.3 table,
/// logging a non-fatal coercion warning through [`coercion_warning`] wherever the source
/// says to ("log notice on truncation", etc).
pub fn coerce(atom: &NodeRef, value: RawConstValue) -> Result<ConstValue> {
    let name = atom_name(atom)?;

    if name == "boolean" {
        return Ok(ConstValue::Bool(coerce_bool(value, &name)));
    }
    if is_char(&name) {
        return Ok(ConstValue::Char(coerce_char(value, &name)));
    }
    if is_string(&name) {
        return Ok(ConstValue::Str(coerce_string(value)));
    }
    if is_signed_integral(&name) {
        return Ok(ConstValue::Int(coerce_int(value, &name)?));
    }
    if is_unsigned_integral(&name) {
        let i = coerce_int(value, &name)?;
        if i < 0 {
            coercion_warning(format!("negative value coerced to unsigned atom {name:?} (not clamped)"), None);
        }
        return Ok(ConstValue::Int(i));
    }
    if is_floating(&name) {
        return Ok(ConstValue::Float(coerce_float(value, &name)?));
    }
    Err(DdslError::kind_mismatch(format!("{name:?} is not a valid CONST atom")))
}

fn coerce_bool(value: RawConstValue, name: &str) -> bool {
    match value {
        RawConstValue::Bool(b) => b,
        RawConstValue::Int(i) => {
            let b = i != 0;
            if i != 0 && i != 1 {
                coercion_warning(format!("ambiguous boolean coercion of {i} for {name:?}"), None);
            }
            b
        }
        RawConstValue::Float(f) => {
            coercion_warning(format!("ambiguous boolean coercion of {f} for {name:?}"), None);
            f != 0.0
        }
        RawConstValue::Str(s) => match s.as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => {
                coercion_warning(format!("ambiguous boolean coercion of {s:?} for {name:?}"), None);
                !s.is_empty()
            }
        },
    }
}

fn coerce_char(value: RawConstValue, name: &str) -> char {
    let s = coerce_string(value);
    let mut chars = s.chars();
    let first = chars.next().unwrap_or('\0');
    if chars.next().is_some() {
        coercion_warning(format!("string truncated to first character for {name:?}"), None);
    }
    first
}

fn coerce_string(value: RawConstValue) -> String {
    match value {
        RawConstValue::Bool(b) => b.to_string(),
        RawConstValue::Int(i) => i.to_string(),
        RawConstValue::Float(f) => f.to_string(),
        RawConstValue::Str(s) => s,
    }
}

fn coerce_int(value: RawConstValue, name: &str) -> Result<i64> {
    match value {
        RawConstValue::Int(i) => Ok(i),
        RawConstValue::Bool(b) => Ok(if b { 1 } else { 0 }),
        RawConstValue::Float(f) => {
            if f.fract() != 0.0 {
                coercion_warning(format!("decimal truncated coercing {f} to {name:?}"), None);
            }
            Ok(f.trunc() as i64)
        }
        RawConstValue::Str(s) => {
            let (_, n) = parse_number(&s)
                .map_err(|_| DdslError::malformed(format!("{s:?} is not a valid number for {name:?}")))?;
            if n.fract() != 0.0 {
                coercion_warning(format!("decimal truncated coercing {s:?} to {name:?}"), None);
            }
            Ok(n.trunc() as i64)
        }
    }
}

fn coerce_float(value: RawConstValue, name: &str) -> Result<f64> {
    match value {
        RawConstValue::Float(f) => Ok(f),
        RawConstValue::Int(i) => Ok(i as f64),
        RawConstValue::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
        RawConstValue::Str(s) => parse_number(&s)
            .map(|(_, n)| n)
            .map_err(|_| DdslError::malformed(format!("{s:?} is not a valid number for {name:?}"))),
    }
}

/// Scans a signed decimal, optionally fractional, number from the front of `input`.
fn parse_number(input: &str) -> IResult<&str, f64> {
    map(
        recognize(pair(
            opt(char('-')),
            pair(digit1, opt(preceded(char('.'), digit1))),
        )),
        |s: &str| s.parse::<f64>().unwrap_or(0.0),
    )(input)
}

fn parse_bool_literal(input: &str) -> IResult<&str, bool> {
    alt((
        map(nom::bytes::complete::tag("true"), |_| true),
        map(nom::bytes::complete::tag("false"), |_| false),
    ))(input)
}

/// Coerces a raw XML attribute string, trying a boolean literal first when the atom is
/// `boolean` (so `"true"`/`"false"` aren't misparsed as numbers), then falling back to
/// [`coerce`]'s string-input path.
pub fn coerce_str(atom: &NodeRef, raw: &str) -> Result<ConstValue> {
    let name = atom_name(atom)?;
    if name == "boolean" {
        if let Ok((rest, b)) = parse_bool_literal(raw) {
            if rest.is_empty() {
                return Ok(ConstValue::Bool(b));
            }
        }
    }
    coerce(atom, RawConstValue::Str(raw.to_string()))
}
