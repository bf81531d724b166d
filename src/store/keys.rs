//! Key schema for the containment graph
//!
//! Three key families per resource type:
//!
//! | Family | Pattern | Value |
//! |---|---|---|
//! | entity | `{type}:{oid}` | serialized resource body |
//! | forward index | `CONTAINS:{type}:{oid}` | set of member oids |
//! | reverse index | `CONTAINEDIN:{type}:{oid}` | parent oid |
//!
//! Resource types never contain `:` and never equal one of the index
//! prefixes, so the first segment of a key identifies its family and type
//! unambiguously.

/// Resource type of every chassis key
pub const CHASSIS: &str = "Chassis";

const CONTAINS: &str = "CONTAINS";
const CONTAINED_IN: &str = "CONTAINEDIN";

// =============================================================================
// Builders
// =============================================================================

/// Entity key.
///
/// Pattern: `{type}:{oid}`
pub fn entity_key(kind: &str, oid: &str) -> String {
    format!("{}:{}", kind, oid)
}

/// Forward containment set key.
///
/// Pattern: `CONTAINS:{type}:{oid}` → {member oid, ...}
pub fn contains_key(kind: &str, oid: &str) -> String {
    format!("{}:{}:{}", CONTAINS, kind, oid)
}

/// Reverse containment pointer key.
///
/// Pattern: `CONTAINEDIN:{type}:{oid}` → parent oid
pub fn contained_in_key(kind: &str, oid: &str) -> String {
    format!("{}:{}:{}", CONTAINED_IN, kind, oid)
}

/// Glob pattern matching every entity key of `kind`
pub fn entity_pattern(kind: &str) -> String {
    format!("{}:*", escape_glob(kind))
}

// =============================================================================
// Parsing
// =============================================================================

/// Recover the oid from an entity key of `kind`
pub fn oid_from_entity_key<'a>(kind: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(kind)
        .and_then(|rest| rest.strip_prefix(':'))
        .filter(|oid| !oid.is_empty())
}

/// Escape glob metacharacters understood by both Redis `KEYS` and `glob::Pattern`
pub fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '*' | '?' | '[' | ']' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}
