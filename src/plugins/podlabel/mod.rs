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

//! PodLabel admission controller.
//!
//! Marks every new Pod with a fixed set of labels (by default
//! `mutated: "true"`). A missing `metadata.labels` map is created; a Pod whose
//! metadata or labels are not mappings is admitted unchanged.

use crate::admission::{
    AdmissionResult, Attributes, Handler, Interface, MutationInterface, Operation, Plugins,
};
use crate::api::{FieldPath, LookupError};
use crate::config::{self, PodLabelConfig};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

/// Plugin name for the PodLabel admission controller.
pub const PLUGIN_NAME: &str = "PodLabel";

/// Register the PodLabel plugin with the plugin registry.
pub fn register(plugins: &Plugins) {
    plugins.register(PLUGIN_NAME, |reader: Option<&mut dyn Read>| {
        let cfg: PodLabelConfig = match reader {
            Some(reader) => config::load_from_reader(reader)?,
            None => PodLabelConfig::default(),
        };
        Ok(Arc::new(PodLabel::new(cfg.labels)) as Arc<dyn MutationInterface>)
    });
}

/// Set `labels` on the Pod's metadata, creating the labels map if needed.
/// Returns the number of labels added or changed.
pub fn ensure_labels(
    pod: &mut Value,
    labels: &BTreeMap<String, String>,
) -> Result<usize, LookupError> {
    if labels.is_empty() {
        return Ok(0);
    }
    let metadata = FieldPath::from_segments(["metadata"]).object_mut(pod)?;
    let existing = metadata
        .entry("labels")
        .or_insert_with(|| Value::Object(Map::new()));
    let existing = match existing {
        Value::Object(map) => map,
        other => {
            return Err(LookupError::TypeMismatch {
                path: "metadata.labels".to_string(),
                found: crate::api::value::kind_of(other),
                expected: "a mapping",
            })
        }
    };

    let mut changed = 0;
    for (key, value) in labels {
        if existing.get(key).and_then(Value::as_str) != Some(value.as_str()) {
            existing.insert(key.clone(), Value::String(value.clone()));
            changed += 1;
        }
    }
    Ok(changed)
}

/// PodLabel stamps a fixed set of labels onto newly created Pods.
pub struct PodLabel {
    handler: Handler,
    labels: BTreeMap<String, String>,
}

impl PodLabel {
    /// Create a PodLabel plugin that sets `labels` on every new Pod.
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        let handler = Handler::new(&[Operation::Create]);
        tracing::info!(
            operations = ?handler.operations(),
            labels = ?labels,
            "pod labels configured"
        );
        Self { handler, labels }
    }
}

impl Default for PodLabel {
    fn default() -> Self {
        Self::new(PodLabelConfig::default().labels)
    }
}

impl Interface for PodLabel {
    fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }
}

impl MutationInterface for PodLabel {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        if attributes.get_kind().kind != "Pod" || !attributes.get_subresource().is_empty() {
            return Ok(());
        }
        let Some(pod) = attributes.get_object_mut() else {
            return Ok(());
        };
        if let Err(err) = ensure_labels(pod, &self.labels) {
            tracing::debug!(reason = %err, "pod labels not applied");
        }
        Ok(())
    }
}
