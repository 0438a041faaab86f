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

//! Admission review pipeline.
//!
//! The HTTP server, TLS and AdmissionReview envelope handling live in the
//! host process. It hands each request to [`Webhook::review`], which decodes
//! the object, runs the mutating plugins in order, and turns the result into a
//! JSON Patch response.

use super::attributes::{AttributesRecord, GroupVersionKind, GroupVersionResource};
use super::errors::{AdmissionError, AdmissionResult};
use super::interfaces::{MutationInterface, Operation};
use crate::patch::{build_patch, Patch, PatchType, Reconciled};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Message attached to responses that carry no patch.
pub const NO_MUTATION_MESSAGE: &str = "No mutation required";

/// AdmissionRequest is the part of an AdmissionReview request the plugins need.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    pub sub_resource: String,
    pub name: String,
    pub namespace: String,
    pub operation: Operation,
    pub dry_run: bool,
    /// Raw encoding of the object being admitted.
    pub object: Vec<u8>,
    /// Raw encoding of the stored object, for UPDATE and DELETE.
    pub old_object: Option<Vec<u8>>,
}

impl AdmissionRequest {
    pub fn new(
        uid: &str,
        kind: GroupVersionKind,
        resource: GroupVersionResource,
        operation: Operation,
        object: Vec<u8>,
    ) -> Self {
        Self {
            uid: uid.to_string(),
            kind,
            resource,
            sub_resource: String::new(),
            name: String::new(),
            namespace: String::new(),
            operation,
            dry_run: false,
            object,
            old_object: None,
        }
    }

    fn attributes(&self, object: Value, old_object: Option<Value>) -> AttributesRecord {
        AttributesRecord::new(
            &self.name,
            &self.namespace,
            self.resource.clone(),
            &self.sub_resource,
            self.operation,
            Some(object),
            old_object,
            self.kind.clone(),
            self.dry_run,
        )
    }
}

/// Status explains why a request was not simply admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: u16,
    pub message: String,
}

/// AdmissionResponse is handed back to the transport for encoding.
///
/// `patch` serializes as a JSON operation array. The AdmissionReview wire
/// format expects base64 bytes there, so the transport base64-encodes
/// [`Patch::to_json`] when it builds the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,
}

impl AdmissionResponse {
    /// Admit the object as is.
    pub fn allowed(uid: &str, message: &str) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: true,
            status: Some(Status {
                code: 200,
                message: message.to_string(),
            }),
            patch: None,
            patch_type: None,
        }
    }

    /// Admit the object once the patch has been applied.
    pub fn patched(uid: &str, patch: Patch) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: true,
            status: None,
            patch_type: Some(patch.patch_type()),
            patch: Some(patch),
        }
    }

    /// Fail the request. The API server applies the webhook's failure policy.
    pub fn errored(uid: &str, err: &AdmissionError) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: false,
            status: Some(Status {
                code: err.code(),
                message: err.to_string(),
            }),
            patch: None,
            patch_type: None,
        }
    }

    /// Returns the outcome carried by an allowed response.
    pub fn reconciled(&self) -> Option<Reconciled> {
        if !self.allowed {
            return None;
        }
        Some(match &self.patch {
            Some(patch) => Reconciled::from(patch.clone()),
            None => Reconciled::Unchanged,
        })
    }
}

/// Webhook runs a fixed, ordered list of mutating plugins over each request.
#[derive(Clone, Default)]
pub struct Webhook {
    plugins: Vec<Arc<dyn MutationInterface>>,
}

impl Webhook {
    pub fn new(plugins: Vec<Arc<dyn MutationInterface>>) -> Self {
        Self { plugins }
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Admit a request and describe the result for the transport.
    pub fn review(&self, request: &AdmissionRequest) -> AdmissionResponse {
        match self.mutate(request) {
            Ok(Reconciled::Unchanged) => {
                tracing::debug!(uid = %request.uid, kind = %request.kind.kind, "admitted without mutation");
                AdmissionResponse::allowed(&request.uid, NO_MUTATION_MESSAGE)
            }
            Ok(Reconciled::Patched(patch)) => {
                tracing::info!(
                    uid = %request.uid,
                    kind = %request.kind.kind,
                    name = %request.name,
                    operations = patch.len(),
                    "admitted with patch"
                );
                AdmissionResponse::patched(&request.uid, patch)
            }
            Err(err) => {
                tracing::warn!(uid = %request.uid, code = err.code(), error = %err, "admission failed");
                AdmissionResponse::errored(&request.uid, &err)
            }
        }
    }

    /// Decode the request object, run every plugin that handles the operation,
    /// and diff the result against the decoded original.
    pub fn mutate(&self, request: &AdmissionRequest) -> AdmissionResult<Reconciled> {
        let original = decode(&request.object)?;
        let old_object = request.old_object.as_deref().and_then(|raw| match decode(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(uid = %request.uid, error = %err, "old object ignored");
                None
            }
        });
        let mut attributes = request.attributes(original.clone(), old_object);

        for plugin in &self.plugins {
            if !plugin.handles(request.operation) {
                continue;
            }
            plugin.admit(&mut attributes)?;
        }

        match attributes.into_object() {
            Some(mutated) => Ok(build_patch(&original, &mutated)?.into()),
            None => Ok(Reconciled::Unchanged),
        }
    }
}

fn decode(raw: &[u8]) -> AdmissionResult<Value> {
    serde_json::from_slice(raw)
        .map_err(|e| AdmissionError::bad_request(format!("cannot decode object: {}", e)))
}
