//! `atom`/`string`/`wstring` constructors (spec.md §4.2, §6).

use crate::builtins;
use crate::error::{DdslError, Result};
use crate::kernel::{Bound, NodeRef};

/// Looks up a builtin dimensionless atom by name. Fails for any name outside the fixed
/// builtin set — unlike the other constructors, `atom` never allocates a new node.
pub fn atom(name: &str) -> Result<NodeRef> {
    builtins::builtin_atom(name).ok_or_else(|| DdslError::unresolved(name, None))
}

/// `string(n)`: a `string` atom bounded to `n` characters, cached by canonical name so
/// repeated calls with the same bound return the same node (spec.md §4.2).
pub fn string(n: Bound) -> Result<NodeRef> {
    builtins::dimensioned_atom("string", n)
}

/// `wstring(n)`: as [`string`], for wide characters.
pub fn wstring(n: Bound) -> Result<NodeRef> {
    builtins::dimensioned_atom("wstring", n)
}
