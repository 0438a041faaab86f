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

//! Plugin configuration files.
//!
//! Configuration is read once at process start and handed to plugin factories.
//! Both TOML and JSON are accepted:
//!
//! ```toml
//! kinds = ["Dataset"]
//! accessPath = "spec.forProvider.access"
//!
//! [[required]]
//! role = "OWNER"
//! specialGroup = "projectOwners"
//! ```

use crate::admission::{AdmissionError, AdmissionResult};
use crate::api::{AccessEntrySpec, BaselineSet, FieldPath};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Kind whose access list is reconciled when no kinds are configured.
pub const DEFAULT_DATASET_KIND: &str = "Dataset";

/// Access list location on a Dataset.
pub const DEFAULT_ACCESS_PATH: &str = "spec.forProvider.access";

/// Label added to admitted Pods when no labels are configured.
pub const DEFAULT_POD_LABEL: (&str, &str) = ("mutated", "true");

/// DatasetAccessConfig configures the DatasetAccess plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatasetAccessConfig {
    /// Kinds the plugin applies to. Empty means every kind.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,

    /// Dotted path of the access list inside the object.
    #[serde(default = "default_access_path")]
    pub access_path: FieldPath,

    /// Entries every object must carry, in the order they are appended.
    #[serde(default)]
    pub required: Vec<AccessEntrySpec>,
}

impl Default for DatasetAccessConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
            access_path: default_access_path(),
            required: Vec::new(),
        }
    }
}

impl DatasetAccessConfig {
    /// Validate the required entries and build the baseline.
    pub fn baseline(&self) -> AdmissionResult<BaselineSet> {
        BaselineSet::from_specs(self.required.clone())
    }
}

fn default_kinds() -> Vec<String> {
    vec![DEFAULT_DATASET_KIND.to_string()]
}

fn default_access_path() -> FieldPath {
    FieldPath::from_segments(DEFAULT_ACCESS_PATH.split('.'))
}

/// PodLabelConfig configures the PodLabel plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PodLabelConfig {
    #[serde(default = "default_pod_labels")]
    pub labels: BTreeMap<String, String>,
}

impl Default for PodLabelConfig {
    fn default() -> Self {
        Self {
            labels: default_pod_labels(),
        }
    }
}

fn default_pod_labels() -> BTreeMap<String, String> {
    let (key, value) = DEFAULT_POD_LABEL;
    BTreeMap::from([(key.to_string(), value.to_string())])
}

/// Parse configuration from a reader. Content starting with `{` is JSON,
/// anything else is TOML.
pub fn load_from_reader<T: DeserializeOwned>(reader: &mut dyn Read) -> AdmissionResult<T> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| AdmissionError::config(format!("failed to read configuration: {}", e)))?;
    if content.trim_start().starts_with('{') {
        parse_json(&content)
    } else {
        parse_toml(&content)
    }
}

/// Parse a configuration file, choosing the format from its extension.
pub fn load_from_path<T: DeserializeOwned>(path: &Path) -> AdmissionResult<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        AdmissionError::config(format!("failed to read {}: {}", path.display(), e))
    })?;
    tracing::debug!(path = %path.display(), "loading plugin configuration");
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => parse_toml(&content),
        Some("json") => parse_json(&content),
        _ => Err(AdmissionError::config(format!(
            "unsupported configuration format: {}",
            path.display()
        ))),
    }
}

fn parse_toml<T: DeserializeOwned>(content: &str) -> AdmissionResult<T> {
    toml::from_str(content).map_err(|e| AdmissionError::config(format!("invalid TOML: {}", e)))
}

fn parse_json<T: DeserializeOwned>(content: &str) -> AdmissionResult<T> {
    serde_json::from_str(content).map_err(|e| AdmissionError::config(format!("invalid JSON: {}", e)))
}
