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

use serde::{Deserialize, Serialize};

/// Consumer-wide defaults, overridable per reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub filter: String,
    #[serde(default, rename = "registry-ids")]
    pub registry_ids: Vec<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default, rename = "tracing-key")]
    pub tracing_key: String,
    #[serde(default)]
    pub check: bool,
    /// When set, every reference must resolve against the service mesh.
    #[serde(default, rename = "mesh-enabled")]
    pub mesh_enabled: bool,
    /// Forces cluster `adaptivesvc` and load balance `p2c` on every
    /// reference.
    #[serde(default, rename = "adaptive-service")]
    pub adaptive_service: bool,
    #[serde(default = "default_proxy_factory", rename = "proxy-factory")]
    pub proxy_factory: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            filter: String::new(),
            registry_ids: Vec::new(),
            protocol: default_protocol(),
            tracing_key: String::new(),
            check: false,
            mesh_enabled: false,
            adaptive_service: false,
            proxy_factory: default_proxy_factory(),
        }
    }
}

fn default_protocol() -> String {
    "tri".to_string()
}

fn default_proxy_factory() -> String {
    "default".to_string()
}
