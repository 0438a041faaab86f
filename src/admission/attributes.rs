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

//! Admission attributes that describe an admission request.

use super::interfaces::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API group of the Crossplane BigQuery provider that serves Datasets.
pub const DATASET_GROUP: &str = "bigquery.gcp.upbound.io";

/// GroupVersionResource identifies a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }
}

/// GroupVersionKind identifies a kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// Attributes gives admission plugins access to the request being admitted.
///
/// Objects are untyped documents: plugins navigate them with
/// [`crate::api::FieldPath`] rather than downcasting to concrete types.
pub trait Attributes {
    /// Returns the name of the object as presented in the request.
    fn get_name(&self) -> &str;

    /// Returns the namespace associated with the request (if any).
    fn get_namespace(&self) -> &str;

    /// Returns the resource being requested.
    fn get_resource(&self) -> &GroupVersionResource;

    /// Returns the name of the subresource being requested.
    fn get_subresource(&self) -> &str;

    /// Returns the operation being performed.
    fn get_operation(&self) -> Operation;

    /// Returns the object from the incoming request.
    fn get_object(&self) -> Option<&Value>;

    /// Returns the object as a mutable reference.
    fn get_object_mut(&mut self) -> Option<&mut Value>;

    /// Returns the existing object (only populated for UPDATE and DELETE requests).
    fn get_old_object(&self) -> Option<&Value>;

    /// Returns the kind of object being manipulated.
    fn get_kind(&self) -> &GroupVersionKind;

    /// Check if this request is a dry run.
    fn is_dry_run(&self) -> bool;
}

/// AttributesRecord is a concrete implementation of Attributes.
#[derive(Debug, Clone)]
pub struct AttributesRecord {
    pub name: String,
    pub namespace: String,
    pub resource: GroupVersionResource,
    pub subresource: String,
    pub operation: Operation,
    pub object: Option<Value>,
    pub old_object: Option<Value>,
    pub kind: GroupVersionKind,
    pub dry_run: bool,
}

impl AttributesRecord {
    /// Create attributes for an arbitrary resource.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        namespace: &str,
        resource: GroupVersionResource,
        subresource: &str,
        operation: Operation,
        object: Option<Value>,
        old_object: Option<Value>,
        kind: GroupVersionKind,
        dry_run: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            resource,
            subresource: subresource.to_string(),
            operation,
            object,
            old_object,
            kind,
            dry_run,
        }
    }

    /// Helper to create attributes for a cluster-scoped Dataset.
    pub fn new_dataset(name: &str, operation: Operation, dataset: Value) -> Self {
        Self::new(
            name,
            "",
            GroupVersionResource::new(DATASET_GROUP, "v1beta1", "datasets"),
            "",
            operation,
            Some(dataset),
            None,
            GroupVersionKind::new(DATASET_GROUP, "v1beta1", "Dataset"),
            false,
        )
    }

    /// Helper to create attributes for a Pod resource.
    pub fn new_pod(name: &str, namespace: &str, operation: Operation, pod: Value) -> Self {
        Self::new(
            name,
            namespace,
            GroupVersionResource::new("", "v1", "pods"),
            "",
            operation,
            Some(pod),
            None,
            GroupVersionKind::new("", "v1", "Pod"),
            false,
        )
    }

    /// Take the (possibly mutated) object out of the record.
    pub fn into_object(self) -> Option<Value> {
        self.object
    }
}

impl Attributes for AttributesRecord {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn get_namespace(&self) -> &str {
        &self.namespace
    }

    fn get_resource(&self) -> &GroupVersionResource {
        &self.resource
    }

    fn get_subresource(&self) -> &str {
        &self.subresource
    }

    fn get_operation(&self) -> Operation {
        self.operation
    }

    fn get_object(&self) -> Option<&Value> {
        self.object.as_ref()
    }

    fn get_object_mut(&mut self) -> Option<&mut Value> {
        self.object.as_mut()
    }

    fn get_old_object(&self) -> Option<&Value> {
        self.old_object.as_ref()
    }

    fn get_kind(&self) -> &GroupVersionKind {
        &self.kind
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
