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

//! Parameter keys recognized on the wire URL, plus framework-wide defaults.

pub const INTERFACE_KEY: &str = "interface";
pub const GROUP_KEY: &str = "group";
pub const VERSION_KEY: &str = "version";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const REMOTE_TIMESTAMP_KEY: &str = "remote.timestamp";
pub const CLUSTER_KEY: &str = "cluster";
pub const LOADBALANCE_KEY: &str = "loadbalance";
pub const RETRIES_KEY: &str = "retries";
pub const TIMEOUT_KEY: &str = "timeout";
pub const GENERIC_KEY: &str = "generic";
pub const SERIALIZATION_KEY: &str = "serialization";
pub const SIDE_KEY: &str = "side";
pub const APPLICATION_KEY: &str = "application";
pub const ORGANIZATION_KEY: &str = "organization";
pub const NAME_KEY: &str = "name";
pub const MODULE_KEY: &str = "module";
pub const APP_VERSION_KEY: &str = "application.version";
pub const OWNER_KEY: &str = "owner";
pub const ENVIRONMENT_KEY: &str = "environment";
pub const RELEASE_KEY: &str = "release";
pub const FILTER_KEY: &str = "filter";
pub const REFERENCE_FILTER_KEY: &str = "reference.filters";
pub const METADATA_TYPE_KEY: &str = "metadata-type";
pub const BEAN_NAME_KEY: &str = "bean.name";
pub const METHODS_KEY: &str = "methods";
pub const STICKY_KEY: &str = "sticky";
pub const ASYNC_KEY: &str = "async";
pub const PEER_KEY: &str = "peer";
pub const WEIGHT_KEY: &str = "weight";
pub const TAG_KEY: &str = "tag";
pub const FORCE_USE_TAG_KEY: &str = "force.use.tag";
pub const ENABLED_KEY: &str = "enabled";
pub const CATEGORY_KEY: &str = "category";
pub const MESH_CLUSTER_ID_KEY: &str = "mesh-cluster-id";
pub const PROVIDED_BY_KEY: &str = "provided-by";
pub const TRACING_CONFIG_KEY: &str = "tracing-config";

pub const REGISTRY_KEY: &str = "registry";
pub const REGISTRY_ROLE_KEY: &str = "registry.role";
pub const REGISTRY_GROUP_KEY: &str = "registry.group";
pub const REGISTRY_TIMEOUT_KEY: &str = "registry.timeout";
pub const REGISTRY_NAMESPACE_KEY: &str = "registry.namespace";
pub const REGISTRY_WEIGHT_KEY: &str = "registry.weight";

/// Scheme of a subscription URL that carries an interface URL as its sub-URL.
pub const REGISTRY_PROTOCOL: &str = "registry";
/// Alias scheme resolved to [`REGISTRY_PROTOCOL`] during invoker acquisition.
pub const SERVICE_REGISTRY_PROTOCOL: &str = "service-discovery-registry";
pub const TRIPLE_PROTOCOL: &str = "tri";

pub const CLUSTER_KEY_FAILOVER: &str = "failover";
pub const CLUSTER_KEY_FAILFAST: &str = "failfast";
pub const CLUSTER_KEY_ZONE_AWARE: &str = "zoneAware";
pub const CLUSTER_KEY_ADAPTIVE_SERVICE: &str = "adaptivesvc";
pub const LOADBALANCE_KEY_P2C: &str = "p2c";

pub const GENERIC_FILTER_KEY: &str = "generic";
pub const METRICS_FILTER_KEY: &str = "metrics";
pub const DEFAULT_REFERENCE_FILTERS: &str = "graceful_shutdown";

pub const DEFAULT_CATEGORY: &str = "providers";
pub const ANY_VALUE: &str = "*";
pub const PATH_SEPARATOR: &str = "/";
pub const COMMA_SEPARATOR: &str = ",";

pub const POD_NAMESPACE_ENV_KEY: &str = "POD_NAMESPACE";
pub const CLUSTER_DOMAIN_ENV_KEY: &str = "CLUSTER_DOMAIN";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";
/// Service-DNS suffix joining pod namespace and cluster domain.
pub const SVC_SUFFIX: &str = ".svc.";
pub const DEFAULT_MESH_PORT: u16 = 80;

pub const DEFAULT_RETRIES: &str = "2";
pub const DEFAULT_REG_TIMEOUT: &str = "10s";
/// Naming backends treat weight 0 as "hide the instance", so 1 is the floor.
pub const DEFAULT_WEIGHT: i64 = 1;
pub const MAX_WEIGHT: i64 = 10_000;

pub const RELEASE_VERSION: &str = concat!("lattice-rust-", env!("CARGO_PKG_VERSION"));
