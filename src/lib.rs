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

//! Mutating admission plugins for access-controlled cloud resources.
//!
//! The webhook transport (HTTP server, TLS, AdmissionReview envelopes) is
//! provided by the host. This crate supplies what runs inside it: plugins that
//! reconcile a Dataset's access list with a configured baseline and label Pods,
//! plus the review pipeline that turns their mutations into a JSON Patch.

pub mod admission;
pub mod api;
pub mod config;
pub mod patch;
pub mod plugins;

// Re-export commonly used types
pub use admission::{
    AdmissionError, AdmissionRequest, AdmissionResponse, AdmissionResult, Attributes, Handler,
    Interface, MutationInterface, Operation, Webhook,
};
pub use api::{derive_key, AccessEntry, AccessKey, BaselineSet, FieldPath, IdentifierKind};
pub use patch::{build_patch, Patch, Reconciled};
