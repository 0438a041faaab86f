// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dataset access-control entries.
//!
//! A Dataset carries its grants under `spec.forProvider.access` as a list of
//! mappings. Each mapping names a `role` and identifies the grantee through
//! exactly one identifier field. Two entries are the same grant when they share
//! an [`AccessKey`], regardless of where they sit in the list.

use super::value::str_field;
use crate::admission::{AdmissionError, AdmissionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Field name holding the role of an access entry.
pub const ROLE_FIELD: &str = "role";

/// Key suffix used for entries that carry no identifier.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

// ============================================================================
// Identifier Types
// ============================================================================

/// IdentifierKind names the field used to identify the grantee of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentifierKind {
    GroupByEmail,
    IamMember,
    SpecialGroup,
    UserByEmail,
}

impl IdentifierKind {
    /// Identifier fields in precedence order. When an entry incorrectly
    /// populates several of them, the first one listed here decides its key.
    pub const PRECEDENCE: [IdentifierKind; 4] = [
        IdentifierKind::GroupByEmail,
        IdentifierKind::IamMember,
        IdentifierKind::SpecialGroup,
        IdentifierKind::UserByEmail,
    ];

    /// Returns the field name used on the wire.
    pub fn field_name(&self) -> &'static str {
        match self {
            IdentifierKind::GroupByEmail => "groupByEmail",
            IdentifierKind::IamMember => "iamMember",
            IdentifierKind::SpecialGroup => "specialGroup",
            IdentifierKind::UserByEmail => "userByEmail",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Identifier is the grantee of an access entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub value: String,
}

// ============================================================================
// Access Keys
// ============================================================================

/// AccessKey is the canonical identity of an access entry: `role:identifier`,
/// or `role:unknown` when the entry has no identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessKey(String);

impl AccessKey {
    fn new(role: &str, identifier: Option<&str>) -> Self {
        AccessKey(format!(
            "{}:{}",
            role,
            identifier.unwrap_or(UNKNOWN_IDENTIFIER)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the identity of an untyped access entry.
///
/// The identifier fields are scanned in [`IdentifierKind::PRECEDENCE`] order
/// and the first one holding a non-empty string wins. Missing or wrongly typed
/// fields read as empty, so this never fails: a scalar entry keys as
/// `":unknown"`.
pub fn derive_key(entry: &Value) -> (AccessKey, Option<IdentifierKind>) {
    let role = str_field(entry, ROLE_FIELD);
    for kind in IdentifierKind::PRECEDENCE {
        let value = str_field(entry, kind.field_name());
        if !value.is_empty() {
            return (AccessKey::new(role, Some(value)), Some(kind));
        }
    }
    (AccessKey::new(role, None), None)
}

// ============================================================================
// Access Entries
// ============================================================================

/// AccessEntry is a typed access grant: a role plus at most one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessEntry {
    pub role: String,
    pub identifier: Option<Identifier>,
}

impl AccessEntry {
    /// Create an entry identified by the given field.
    pub fn new(role: &str, kind: IdentifierKind, value: &str) -> Self {
        Self {
            role: role.to_string(),
            identifier: Some(Identifier {
                kind,
                value: value.to_string(),
            }),
        }
    }

    /// Create an entry with no identifier.
    pub fn role_only(role: &str) -> Self {
        Self {
            role: role.to_string(),
            identifier: None,
        }
    }

    pub fn key(&self) -> AccessKey {
        AccessKey::new(
            &self.role,
            self.identifier
                .as_ref()
                .map(|id| id.value.as_str())
                .filter(|v| !v.is_empty()),
        )
    }

    /// Render the entry as the mapping stored in a resource document.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(ROLE_FIELD.to_string(), Value::String(self.role.clone()));
        if let Some(id) = &self.identifier {
            map.insert(
                id.kind.field_name().to_string(),
                Value::String(id.value.clone()),
            );
        }
        Value::Object(map)
    }
}

/// AccessEntrySpec is the serialized form of an access entry, as it appears in
/// configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccessEntrySpec {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_member: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_by_email: Option<String>,
}

impl AccessEntrySpec {
    fn identifiers(&self) -> Vec<Identifier> {
        let fields = [
            (IdentifierKind::GroupByEmail, &self.group_by_email),
            (IdentifierKind::IamMember, &self.iam_member),
            (IdentifierKind::SpecialGroup, &self.special_group),
            (IdentifierKind::UserByEmail, &self.user_by_email),
        ];
        fields
            .into_iter()
            .filter_map(|(kind, value)| match value {
                Some(v) if !v.is_empty() => Some(Identifier {
                    kind,
                    value: v.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

impl TryFrom<AccessEntrySpec> for AccessEntry {
    type Error = AdmissionError;

    fn try_from(spec: AccessEntrySpec) -> AdmissionResult<Self> {
        if spec.role.is_empty() {
            return Err(AdmissionError::config("access entry has an empty role"));
        }
        let mut identifiers = spec.identifiers();
        if identifiers.len() > 1 {
            let names: Vec<&str> = identifiers.iter().map(|id| id.kind.field_name()).collect();
            return Err(AdmissionError::config(format!(
                "access entry for role {} sets more than one identifier: {}",
                spec.role,
                names.join(", ")
            )));
        }
        let identifier = identifiers.pop();
        if identifier.is_none() {
            tracing::warn!(role = %spec.role, "baseline access entry has no identifier");
        }
        Ok(AccessEntry {
            role: spec.role,
            identifier,
        })
    }
}

// ============================================================================
// Baseline
// ============================================================================

/// BaselineSet is the ordered list of grants every admitted resource must carry.
/// It is loaded once and shared read-only between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineSet {
    entries: Arc<[AccessEntry]>,
}

impl BaselineSet {
    pub fn new(entries: Vec<AccessEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Validate and convert configured entries, keeping their order.
    pub fn from_specs(specs: Vec<AccessEntrySpec>) -> AdmissionResult<Self> {
        let entries = specs
            .into_iter()
            .map(AccessEntry::try_from)
            .collect::<AdmissionResult<Vec<_>>>()?;
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[AccessEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BaselineSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FromIterator<AccessEntry> for BaselineSet {
    fn from_iter<T: IntoIterator<Item = AccessEntry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
