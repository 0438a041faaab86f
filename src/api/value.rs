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

//! Safe navigation over untyped resource documents.
//!
//! Admitted objects arrive as a [`serde_json::Value`] tree. Every step of a
//! lookup checks the shape of the node it walks through and reports either a
//! missing segment or a type mismatch, so callers can decide how to degrade.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// LookupError describes why a field could not be reached in a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// A segment along the path does not exist.
    #[error("field {path} is missing")]
    Missing { path: String },

    /// A segment exists but holds a value of the wrong shape.
    #[error("field {path} is {found}, expected {expected}")]
    TypeMismatch {
        path: String,
        found: &'static str,
        expected: &'static str,
    },
}

/// Returns a short name for the shape of a value, for diagnostics.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// FieldPath is a dotted path of mapping keys, e.g. `spec.forProvider.access`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Empty segments are rejected.
    pub fn parse(path: &str) -> Result<Self, String> {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(format!("invalid field path {:?}: empty segment", path));
        }
        Ok(Self { segments })
    }

    /// Build a path from already split segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    fn prefix(&self, len: usize) -> String {
        self.segments[..len].join(".")
    }

    /// Walk the path and return the node at its end.
    pub fn get<'a>(&self, document: &'a Value) -> Result<&'a Value, LookupError> {
        let mut current = document;
        for (i, segment) in self.segments.iter().enumerate() {
            let map = current.as_object().ok_or_else(|| self.mismatch(i, current))?;
            current = map.get(segment).ok_or_else(|| LookupError::Missing {
                path: self.prefix(i + 1),
            })?;
        }
        Ok(current)
    }

    /// Walk the path and return the node at its end, mutably.
    pub fn get_mut<'a>(&self, document: &'a mut Value) -> Result<&'a mut Value, LookupError> {
        let mut current = document;
        for (i, segment) in self.segments.iter().enumerate() {
            if !current.is_object() {
                return Err(self.mismatch(i, current));
            }
            current = match current.as_object_mut().and_then(|m| m.get_mut(segment)) {
                Some(next) => next,
                None => {
                    return Err(LookupError::Missing {
                        path: self.prefix(i + 1),
                    })
                }
            };
        }
        Ok(current)
    }

    /// Return the sequence at the end of the path.
    pub fn array_mut<'a>(&self, document: &'a mut Value) -> Result<&'a mut Vec<Value>, LookupError> {
        let path = self.to_string();
        match self.get_mut(document)? {
            Value::Array(items) => Ok(items),
            other => Err(LookupError::TypeMismatch {
                path,
                found: kind_of(other),
                expected: "a sequence",
            }),
        }
    }

    /// Return the mapping at the end of the path.
    pub fn object_mut<'a>(
        &self,
        document: &'a mut Value,
    ) -> Result<&'a mut Map<String, Value>, LookupError> {
        let path = self.to_string();
        match self.get_mut(document)? {
            Value::Object(map) => Ok(map),
            other => Err(LookupError::TypeMismatch {
                path,
                found: kind_of(other),
                expected: "a mapping",
            }),
        }
    }

    // The node reached after `walked` segments is not a mapping.
    fn mismatch(&self, walked: usize, node: &Value) -> LookupError {
        let path = if walked == 0 {
            "<root>".to_string()
        } else {
            self.prefix(walked)
        };
        LookupError::TypeMismatch {
            path,
            found: kind_of(node),
            expected: "a mapping",
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl TryFrom<String> for FieldPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FieldPath::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

/// Read a string field from a mapping-shaped value. Absent fields, non-string
/// values, and non-mapping parents all read as the empty string.
pub fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}
