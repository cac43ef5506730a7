/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use lattice_base::{constants::*, RoleType, Url};

use crate::error::ConfigurationError;

/// Address placeholder that disables a registry section without deleting it.
const UNAVAILABLE_ADDRESS: &str = "N/A";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Naming backend kind, e.g. `nacos`. May also come from the address
    /// scheme.
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub timeout: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl RegistryConfig {
    /// Translate this section into a subscription URL of scheme `registry`.
    /// The backend kind travels as the `registry` parameter so the address
    /// scheme never leaks into protocol selection.
    pub fn to_url(&self, role: RoleType) -> Result<Url, ConfigurationError> {
        if self.address.is_empty() {
            return Err(ConfigurationError::new("registry address must not be empty"));
        }

        let (backend, address) = match self.address.split_once("://") {
            Some((scheme, rest)) => (scheme.to_string(), rest.to_string()),
            None => (self.protocol.clone(), self.address.clone()),
        };

        let authority = if self.username.is_empty() {
            address
        } else {
            format!("{}:{}@{}", self.username, self.password, address)
        };
        let url = Url::parse(&format!("{REGISTRY_PROTOCOL}://{authority}"))
            .map_err(|e| ConfigurationError::new(e.to_string()))?;

        url.set_param(REGISTRY_KEY, &backend);
        url.set_param(REGISTRY_ROLE_KEY, &role.code().to_string());
        if !self.timeout.is_empty() {
            url.set_param(REGISTRY_TIMEOUT_KEY, &self.timeout);
        }
        if !self.group.is_empty() {
            url.set_param(REGISTRY_GROUP_KEY, &self.group);
        }
        if !self.namespace.is_empty() {
            url.set_param(REGISTRY_NAMESPACE_KEY, &self.namespace);
        }
        for (key, value) in &self.params {
            url.set_param(key, value);
        }
        Ok(url)
    }
}

/// Resolve the declared registry IDs into subscription URLs. Sections whose
/// address is `N/A` and IDs without a section are skipped.
pub fn load_registries(
    registry_ids: &[String],
    registries: &HashMap<String, RegistryConfig>,
    role: RoleType,
) -> Result<Vec<Url>, ConfigurationError> {
    let mut urls = Vec::new();
    for id in registry_ids {
        let Some(config) = registries.get(id) else {
            warn!("registry id {} has no matching registry section", id);
            continue;
        };
        if config.address == UNAVAILABLE_ADDRESS {
            continue;
        }
        urls.push(config.to_url(role)?);
    }
    Ok(urls)
}

/// Normalize registry IDs: split comma-joined entries, trim, drop empties
/// and duplicates while keeping the declared order.
pub fn translate_registry_ids(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for id in ids {
        for part in id.split(',') {
            let part = part.trim();
            if !part.is_empty() && !seen.iter().any(|s| s == part) {
                seen.push(part.to_string());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_url_shape() {
        let config = RegistryConfig {
            protocol: "nacos".to_string(),
            address: "127.0.0.1:8848".to_string(),
            timeout: "5s".to_string(),
            group: "g1".to_string(),
            ..Default::default()
        };
        let url = config.to_url(RoleType::Consumer).unwrap();
        assert_eq!(url.protocol(), "registry");
        assert_eq!(url.address(), "127.0.0.1:8848");
        assert_eq!(url.param(REGISTRY_KEY, ""), "nacos");
        assert_eq!(url.param(REGISTRY_ROLE_KEY, ""), "0");
        assert_eq!(url.param(REGISTRY_TIMEOUT_KEY, ""), "5s");
        assert_eq!(url.param(REGISTRY_GROUP_KEY, ""), "g1");
    }

    #[test]
    fn test_to_url_takes_backend_from_address_scheme() {
        let config = RegistryConfig {
            address: "zookeeper://10.0.0.5:2181".to_string(),
            username: "root".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        };
        let url = config.to_url(RoleType::Consumer).unwrap();
        assert_eq!(url.protocol(), "registry");
        assert_eq!(url.param(REGISTRY_KEY, ""), "zookeeper");
        assert_eq!(url.username(), "root");
        assert_eq!(url.password(), "secret");
    }

    #[test]
    fn test_to_url_rejects_empty_address() {
        let config = RegistryConfig::default();
        assert!(config.to_url(RoleType::Consumer).is_err());
    }

    #[test]
    fn test_load_registries_skips_unavailable() {
        let mut registries = HashMap::new();
        registries.insert(
            "r1".to_string(),
            RegistryConfig {
                protocol: "nacos".to_string(),
                address: "127.0.0.1:8848".to_string(),
                ..Default::default()
            },
        );
        registries.insert(
            "r2".to_string(),
            RegistryConfig {
                address: UNAVAILABLE_ADDRESS.to_string(),
                ..Default::default()
            },
        );
        let ids = vec!["r1".to_string(), "r2".to_string(), "ghost".to_string()];
        let urls = load_registries(&ids, &registries, RoleType::Consumer).unwrap();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].address(), "127.0.0.1:8848");
    }

    #[test]
    fn test_translate_registry_ids() {
        let ids = vec!["r1, r2".to_string(), "r2".to_string(), " ".to_string()];
        assert_eq!(translate_registry_ids(&ids), vec!["r1", "r2"]);
    }
}
