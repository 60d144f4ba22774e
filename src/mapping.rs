//! Tenant column mappings and scoping identifiers.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::AnalysisType,
    error::{EngineError, EngineResult},
};

/// Canonical field (or alias) → source column.
pub type MappingEntries = BTreeMap<String, String>;

macro_rules! scoped_id {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Accepts non-empty identifiers that cannot escape a directory
            /// when used as a path component.
            pub fn new(value: impl Into<String>) -> EngineResult<Self> {
                let value = value.into();
                let trimmed = value.trim();
                let valid = !trimmed.is_empty()
                    && trimmed != "."
                    && !trimmed.contains("..")
                    && !trimmed.contains(['/', '\\', '\0']);
                if !valid {
                    return Err(EngineError::InvalidIdentifier {
                        kind: $kind,
                        value,
                    });
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

scoped_id!(TenantId, "tenant");
scoped_id!(FileId, "file");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub tenant_id: TenantId,
    pub file_id: FileId,
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub entries: MappingEntries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ColumnMapping {
    pub fn new(tenant_id: TenantId, file_id: FileId, analysis_type: AnalysisType) -> Self {
        Self {
            tenant_id,
            file_id,
            analysis_type,
            entries: MappingEntries::new(),
            updated_at: None,
        }
    }

    pub fn with_entry(mut self, field: &str, column: &str) -> Self {
        self.entries.insert(field.to_string(), column.to_string());
        self
    }

    /// Mapped column for `key`, ignoring entries that are blank.
    pub fn column_for(&self, key: &str) -> Option<&str> {
        lookup(&self.entries, key)
    }
}

pub(crate) fn lookup<'a>(entries: &'a MappingEntries, key: &str) -> Option<&'a str> {
    entries
        .get(key)
        .map(|column| column.trim())
        .filter(|column| !column.is_empty())
}
