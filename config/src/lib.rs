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

use std::{collections::HashMap, env, fs};

use serde::{Deserialize, Serialize};
use tracing::info;

pub mod application;
pub mod consumer;
pub mod error;
pub mod method;
pub mod metrics;
pub mod registry;

pub use application::ApplicationConfig;
pub use consumer::ConsumerConfig;
pub use error::ConfigurationError;
pub use method::MethodConfig;
pub use metrics::MetricsConfig;
pub use registry::{load_registries, translate_registry_ids, RegistryConfig};

pub const CONFIG_PATH_ENV_KEY: &str = "LATTICE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "./lattice.yaml";

/// Root of the declarative configuration tree: application identity,
/// consumer defaults and the named registry sections.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub registries: HashMap<String, RegistryConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl RootConfig {
    /// Load from the YAML file named by `LATTICE_CONFIG_PATH`, falling back
    /// to `./lattice.yaml`.
    pub fn load() -> Result<RootConfig, lattice_base::StdError> {
        let path = match env::var(CONFIG_PATH_ENV_KEY) {
            Ok(path) => {
                info!("read config path from env: {}", path);
                path
            }
            Err(_) => DEFAULT_CONFIG_PATH.to_string(),
        };
        let data = fs::read(path)?;
        let config: RootConfig = serde_yaml::from_slice(&data)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<RootConfig, lattice_base::StdError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_str() {
        let config = RootConfig::from_yaml_str(
            r#"
application:
  name: shop-cart
  owner: platform-team
consumer:
  registry-ids:
    - r1
registries:
  r1:
    protocol: nacos
    address: 127.0.0.1:8848
metrics:
  enable: true
"#,
        )
        .unwrap();
        assert_eq!(config.application.name, "shop-cart");
        assert_eq!(config.consumer.registry_ids, vec!["r1"]);
        assert_eq!(config.consumer.protocol, "tri");
        assert_eq!(config.consumer.proxy_factory, "default");
        assert_eq!(config.registries["r1"].protocol, "nacos");
        assert_eq!(config.metrics.enable, Some(true));
    }
}
