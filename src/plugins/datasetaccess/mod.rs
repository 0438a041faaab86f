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

//! DatasetAccess admission controller.
//!
//! This admission controller makes sure every Dataset carries a baseline set of
//! access grants. Grants already present on the object are kept as they are,
//! in their original order; missing baseline grants are appended. Two grants
//! are the same when they share an [`AccessKey`], so admitting an object twice
//! never duplicates anything.
//!
//! Objects whose access list cannot be found, or is not a list, are admitted
//! unchanged. The webhook prefers letting a malformed object through over
//! blocking the API server on it.

use crate::admission::{
    AdmissionResult, Attributes, Handler, Interface, MutationInterface, Operation, Plugins,
};
use crate::api::{derive_key, AccessKey, BaselineSet, FieldPath, LookupError};
use crate::config::{self, DatasetAccessConfig};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

/// Plugin name for the DatasetAccess admission controller.
pub const PLUGIN_NAME: &str = "DatasetAccess";

/// Register the DatasetAccess plugin with the plugin registry.
pub fn register(plugins: &Plugins) {
    plugins.register(PLUGIN_NAME, |reader: Option<&mut dyn Read>| {
        let cfg = match reader {
            Some(reader) => config::load_from_reader(reader)?,
            None => DatasetAccessConfig::default(),
        };
        Ok(Arc::new(DatasetAccess::from_config(&cfg)?) as Arc<dyn MutationInterface>)
    });
}

/// Append every baseline entry missing from `existing`, in baseline order.
/// Returns the number of entries appended.
pub fn merge_access(existing: &mut Vec<Value>, baseline: &BaselineSet) -> usize {
    let mut present: HashSet<AccessKey> = existing.iter().map(|e| derive_key(e).0).collect();
    let before = existing.len();
    for entry in baseline.iter() {
        if present.insert(entry.key()) {
            existing.push(entry.to_value());
        }
    }
    existing.len() - before
}

/// Reconcile the access list found at `path` with the baseline.
///
/// A missing or wrongly shaped access list is reported as a [`LookupError`]
/// and the document is left untouched. Nothing outside the access list is
/// modified.
pub fn reconcile(
    document: &mut Value,
    path: &FieldPath,
    baseline: &BaselineSet,
) -> Result<usize, LookupError> {
    let access = path.array_mut(document)?;
    Ok(merge_access(access, baseline))
}

/// Reconcile a Dataset's `spec.forProvider.access` with the baseline,
/// returning the document unchanged when the list is absent or malformed.
pub fn apply_baseline(mut document: Value, baseline: &BaselineSet) -> Value {
    let path = FieldPath::from_segments(config::DEFAULT_ACCESS_PATH.split('.'));
    if let Err(err) = reconcile(&mut document, &path, baseline) {
        tracing::debug!(reason = %err, "access list not reconciled");
    }
    document
}

/// DatasetAccess appends baseline access grants to Datasets.
pub struct DatasetAccess {
    handler: Handler,
    kinds: Vec<String>,
    access_path: FieldPath,
    baseline: BaselineSet,
}

impl DatasetAccess {
    /// Create a DatasetAccess plugin for Datasets with the given baseline.
    pub fn new(baseline: BaselineSet) -> Self {
        let defaults = DatasetAccessConfig::default();
        Self {
            handler: Handler::new_create_update(),
            kinds: defaults.kinds,
            access_path: defaults.access_path,
            baseline,
        }
    }

    /// Create a DatasetAccess plugin from its configuration file contents.
    pub fn from_config(config: &DatasetAccessConfig) -> AdmissionResult<Self> {
        let baseline = config.baseline()?;
        let handler = Handler::new_create_update();
        tracing::info!(
            kinds = ?config.kinds,
            operations = ?handler.operations(),
            path = %config.access_path,
            required = baseline.len(),
            "dataset access baseline loaded"
        );
        Ok(Self {
            handler,
            kinds: config.kinds.clone(),
            access_path: config.access_path.clone(),
            baseline,
        })
    }

    pub fn baseline(&self) -> &BaselineSet {
        &self.baseline
    }

    fn applies_to(&self, attributes: &dyn Attributes) -> bool {
        if !attributes.get_subresource().is_empty() {
            return false;
        }
        let kind = &attributes.get_kind().kind;
        self.kinds.is_empty() || self.kinds.iter().any(|k| k == kind)
    }
}

impl Interface for DatasetAccess {
    fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }
}

impl MutationInterface for DatasetAccess {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        if !self.applies_to(attributes) || self.baseline.is_empty() {
            return Ok(());
        }

        let name = attributes.get_name().to_string();
        let document = match attributes.get_object_mut() {
            Some(document) => document,
            None => return Ok(()),
        };

        match reconcile(document, &self.access_path, &self.baseline) {
            Ok(0) => tracing::debug!(name = %name, "access list already satisfies baseline"),
            Ok(added) => tracing::debug!(name = %name, added, "appended baseline access entries"),
            Err(err) => tracing::debug!(name = %name, reason = %err, "no mutation required"),
        }
        Ok(())
    }
}
