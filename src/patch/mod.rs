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

//! JSON Patch (RFC 6902) generation.
//!
//! The webhook never sends a re-encoded object back to the API server. It
//! diffs the object it received against the mutated one and returns only the
//! operations needed to get from one to the other, so fields it did not touch
//! keep their exact original encoding.

use crate::admission::{AdmissionError, AdmissionResult};
use json_patch::PatchOperation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// JSON Patch Types
// ============================================================================

/// PatchType is the patch encoding reported back to the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchType {
    /// JSONPatch means the patch is an RFC 6902 operation list.
    JSONPatch,
}

/// Patch is the ordered list of operations turning the admitted object into
/// the mutated one.
///
/// It serializes as the plain operation array. An AdmissionReview carries the
/// patch as base64 bytes, so the transport encodes [`Patch::to_json`] before
/// placing it in the response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    operations: Vec<PatchOperation>,
}

impl Patch {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn patch_type(&self) -> PatchType {
        PatchType::JSONPatch
    }

    /// Encode the operation list as the JSON body the API server applies.
    pub fn to_json(&self) -> AdmissionResult<Vec<u8>> {
        serde_json::to_vec(&self.operations).map_err(AdmissionError::Serialization)
    }
}

impl From<json_patch::Patch> for Patch {
    fn from(patch: json_patch::Patch) -> Self {
        Self::new(patch.0)
    }
}

/// Reconciled is the outcome of admitting one object.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// The object already satisfied every plugin; nothing to send back.
    Unchanged,
    /// The object was mutated; the patch must be applied before persistence.
    Patched(Patch),
}

impl From<Patch> for Reconciled {
    fn from(patch: Patch) -> Self {
        if patch.is_empty() {
            Reconciled::Unchanged
        } else {
            Reconciled::Patched(patch)
        }
    }
}

// ============================================================================
// Patch Construction
// ============================================================================

/// Build the patch that turns the decoded admitted object into `mutated`.
///
/// Encoding `mutated` failing is a defect in the caller and is reported as
/// [`AdmissionError::Serialization`].
pub fn build_patch<T>(original: &Value, mutated: &T) -> AdmissionResult<Patch>
where
    T: Serialize + ?Sized,
{
    let target = serde_json::to_value(mutated).map_err(|e| {
        tracing::error!(error = %e, "mutated object cannot be encoded");
        AdmissionError::Serialization(e)
    })?;
    Ok(diff(original, &target))
}

/// Compute the operations that transform `source` into `target`.
pub fn diff(source: &Value, target: &Value) -> Patch {
    json_patch::diff(source, target).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn encoded(patch: &Patch) -> Value {
        serde_json::to_value(patch).unwrap()
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let doc = json!({"a": [1, {"b": "c"}]});
        assert!(diff(&doc, &doc).is_empty());
        assert_eq!(Reconciled::from(diff(&doc, &doc)), Reconciled::Unchanged);
    }

    #[test]
    fn test_diff_appended_array_elements() {
        let source = json!({"spec": {"forProvider": {"access": [{"role": "READER"}]}}});
        let target = json!({"spec": {"forProvider": {"access": [
            {"role": "READER"},
            {"role": "OWNER", "specialGroup": "projectOwners"},
        ]}}});
        assert_eq!(
            encoded(&diff(&source, &target)),
            json!([{
                "op": "add",
                "path": "/spec/forProvider/access/1",
                "value": {"role": "OWNER", "specialGroup": "projectOwners"},
            }])
        );
    }

    #[test]
    fn test_diff_objects() {
        let source = json!({"keep": 1, "drop": 2, "change": "x"});
        let target = json!({"keep": 1, "change": "y", "new": true});
        assert_eq!(
            encoded(&diff(&source, &target)),
            json!([
                {"op": "remove", "path": "/drop"},
                {"op": "replace", "path": "/change", "value": "y"},
                {"op": "add", "path": "/new", "value": true},
            ])
        );
    }

    #[test]
    fn test_diff_escapes_keys() {
        let patch = diff(
            &json!({"metadata": {"labels": {}}}),
            &json!({"metadata": {"labels": {"example.com/tier": "a~b"}}}),
        );
        assert_eq!(
            encoded(&patch)[0]["path"],
            "/metadata/labels/example.com~1tier"
        );
    }

    #[test]
    fn test_patch_serialization() {
        let patch = diff(&json!({"metadata": {"labels": {}}, "spec": {"x": 1}}), &json!({
            "metadata": {"labels": {"mutated": "true"}},
            "spec": {},
        }));
        let encoded = String::from_utf8(patch.to_json().unwrap()).unwrap();
        assert_eq!(
            encoded,
            r#"[{"op":"add","path":"/metadata/labels/mutated","value":"true"},{"op":"remove","path":"/spec/x"}]"#
        );
        assert_eq!(patch.patch_type(), PatchType::JSONPatch);
    }

    #[test]
    fn test_apply_reproduces_target() {
        let source = json!({
            "metadata": {"name": "d", "labels": {"a": "1", "b/c": "2"}},
            "spec": {"list": [1, 2, 3], "x": {"y": null}},
        });
        let target = json!({
            "metadata": {"name": "d", "labels": {"b/c": "3", "d": "4"}},
            "spec": {"list": [1, 5], "x": {"y": [true]}, "z": 0},
        });
        let patch = diff(&source, &target);
        let mut patched = source.clone();
        json_patch::patch(&mut patched, patch.operations()).unwrap();
        assert_eq!(patched, target);

        let mut root = json!("a");
        let patch = diff(&root, &json!({"b": 1}));
        json_patch::patch(&mut root, patch.operations()).unwrap();
        assert_eq!(root, json!({"b": 1}));
    }

    #[test]
    fn test_apply_rejects_missing_parent() {
        let mut doc = json!({});
        let patch: Patch =
            serde_json::from_value(json!([{"op": "add", "path": "/a/b", "value": 1}])).unwrap();
        assert!(json_patch::patch(&mut doc, patch.operations()).is_err());
        assert_eq!(doc, json!({}));
    }

    #[test]
    fn test_apply_rejects_non_canonical_array_indices() {
        for path in ["/list/+1", "/list/00", "/list/01"] {
            let mut doc = json!({"list": [1, 2, 3]});
            let patch: Patch =
                serde_json::from_value(json!([{"op": "replace", "path": path, "value": 9}]))
                    .unwrap();
            assert!(json_patch::patch(&mut doc, patch.operations()).is_err(), "{}", path);
            assert_eq!(doc, json!({"list": [1, 2, 3]}), "{}", path);

            let patch: Patch =
                serde_json::from_value(json!([{"op": "remove", "path": path}])).unwrap();
            assert!(json_patch::patch(&mut doc, patch.operations()).is_err(), "{}", path);
            assert_eq!(doc, json!({"list": [1, 2, 3]}), "{}", path);
        }
    }

    #[test]
    fn test_build_patch() {
        let original = json!({"metadata": {"name": "p"}});
        let mutated = json!({"metadata": {"name": "p", "labels": {"mutated": "true"}}});
        let patch = build_patch(&original, &mutated).unwrap();
        assert_eq!(
            encoded(&patch),
            json!([{"op": "add", "path": "/metadata/labels", "value": {"mutated": "true"}}])
        );
    }

    #[test]
    fn test_build_patch_serialization_error() {
        let mut unencodable: HashMap<(u8, u8), u8> = HashMap::new();
        unencodable.insert((1, 2), 3);
        let err = build_patch(&json!({}), &unencodable).unwrap_err();
        assert!(matches!(err, AdmissionError::Serialization(_)));
        assert_eq!(err.code(), 500);
    }
}
