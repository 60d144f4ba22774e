//! Entity identity for records that carry no reliable primary key.

use std::fmt;

use serde::Serialize;

use crate::{data::Record, normalize::collapse_whitespace, resolver::ResolvedColumnSet};

/// Which canonical fields make up an entity's identity.
///
/// The cascade is: explicit id, then `name` + `secondary`, then `name`, then
/// `secondary`. Every record of one aggregation pass goes through the same
/// strategy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdentityStrategy {
    pub id: Option<String>,
    pub name: Option<String>,
    pub secondary: Option<String>,
}

impl IdentityStrategy {
    pub fn new(id: Option<&str>, name: Option<&str>, secondary: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            secondary: secondary.map(str::to_string),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        [&self.id, &self.name, &self.secondary]
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// True when at least one identity field resolved for this file.
    pub fn is_resolvable(&self, resolved: &ResolvedColumnSet) -> bool {
        self.fields().any(|field| resolved.is_resolved(field))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IdentityKey {
    Id(String),
    Composite(String, String),
    Name(String),
    Secondary(String),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Id(value) | IdentityKey::Name(value) | IdentityKey::Secondary(value) => {
                f.write_str(value)
            }
            IdentityKey::Composite(name, secondary) => write!(f, "{name} ({secondary})"),
        }
    }
}

fn field_text(record: &Record, resolved: &ResolvedColumnSet, field: Option<&str>) -> Option<String> {
    let column = resolved.column(field?)?;
    record.text(column)
}

fn normalized(record: &Record, resolved: &ResolvedColumnSet, field: Option<&str>) -> Option<String> {
    field_text(record, resolved, field)
        .map(|text| collapse_whitespace(&text))
        .filter(|text| !text.is_empty())
}

/// Identity key of `record`, or `None` when none of the strategy's fields
/// carries a value.
pub fn identity(
    record: &Record,
    resolved: &ResolvedColumnSet,
    strategy: &IdentityStrategy,
) -> Option<IdentityKey> {
    if let Some(id) = field_text(record, resolved, strategy.id.as_deref()) {
        return Some(IdentityKey::Id(id));
    }
    let name = normalized(record, resolved, strategy.name.as_deref());
    let secondary = normalized(record, resolved, strategy.secondary.as_deref());
    match (name, secondary) {
        (Some(name), Some(secondary)) => Some(IdentityKey::Composite(name, secondary)),
        (Some(name), None) => Some(IdentityKey::Name(name)),
        (None, Some(secondary)) => Some(IdentityKey::Secondary(secondary)),
        (None, None) => None,
    }
}
