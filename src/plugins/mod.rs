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

//! Admission plugins module.

pub mod datasetaccess;
pub mod podlabel;

use crate::admission::{AdmissionResult, Plugins, Webhook};
use std::io::Read;

/// All plugins in execution order.
pub const ALL_ORDERED_PLUGINS: &[&str] = &[datasetaccess::PLUGIN_NAME, podlabel::PLUGIN_NAME];

/// Register all admission plugins.
pub fn register_all_admission_plugins(plugins: &Plugins) {
    datasetaccess::register(plugins);
    podlabel::register(plugins);
}

/// Build a webhook running the named plugins in [`ALL_ORDERED_PLUGINS`] order.
/// `config_for` supplies each plugin's configuration, if it has one.
pub fn new_webhook<'a, F>(
    plugins: &Plugins,
    enabled: &[&str],
    mut config_for: F,
) -> AdmissionResult<Webhook>
where
    F: FnMut(&str) -> Option<Box<dyn Read + 'a>>,
{
    let mut instances = Vec::new();
    for name in ALL_ORDERED_PLUGINS.iter().copied().filter(|n| enabled.contains(n)) {
        let mut config = config_for(name);
        let reader = config.as_mut().map(|r| r.as_mut() as &mut dyn Read);
        instances.push(plugins.new_from_plugins(name, reader)?);
    }
    for name in enabled.iter().copied().filter(|n| !ALL_ORDERED_PLUGINS.contains(n)) {
        tracing::warn!(plugin = name, "ignoring unknown admission plugin");
    }
    let webhook = Webhook::new(instances);
    tracing::info!(plugins = ?webhook.plugin_names(), "admission webhook ready");
    Ok(webhook)
}
