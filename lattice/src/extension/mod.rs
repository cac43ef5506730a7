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

//! Process-wide named-extension tables. Extension modules register their
//! factories at startup; the resolver assumes registration is complete
//! before the first `refer`, so lookups take the read path only.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use once_cell::sync::Lazy;
use thiserror::Error;

use lattice_base::{constants::*, Url};

use crate::{
    cluster::{
        failover::{AdaptiveServiceCluster, FailfastCluster, FailoverCluster, ZoneAwareCluster},
        BoxCluster,
    },
    filter::{BoxFilter, GenericFilter, GracefulShutdownFilter, MetricsFilter},
    protocol::BoxProtocol,
    proxy::{BoxProxyFactory, DefaultProxyFactory},
    registry::protocol::RegistryProtocol,
};

#[derive(Error, Debug)]
#[error("unknown {kind} extension: {name}")]
pub struct UnknownExtension {
    pub kind: &'static str,
    pub name: String,
}

impl UnknownExtension {
    fn new(kind: &'static str, name: &str) -> Self {
        UnknownExtension {
            kind,
            name: name.to_string(),
        }
    }
}

static PROTOCOLS: Lazy<RwLock<HashMap<String, BoxProtocol>>> = Lazy::new(|| {
    let mut protocols: HashMap<String, BoxProtocol> = HashMap::new();
    protocols.insert(REGISTRY_PROTOCOL.to_string(), Arc::new(RegistryProtocol));
    RwLock::new(protocols)
});

static CLUSTERS: Lazy<RwLock<HashMap<String, BoxCluster>>> = Lazy::new(|| {
    let mut clusters: HashMap<String, BoxCluster> = HashMap::new();
    clusters.insert(CLUSTER_KEY_FAILOVER.to_string(), Arc::new(FailoverCluster));
    clusters.insert(CLUSTER_KEY_FAILFAST.to_string(), Arc::new(FailfastCluster));
    clusters.insert(CLUSTER_KEY_ZONE_AWARE.to_string(), Arc::new(ZoneAwareCluster));
    clusters.insert(
        CLUSTER_KEY_ADAPTIVE_SERVICE.to_string(),
        Arc::new(AdaptiveServiceCluster),
    );
    RwLock::new(clusters)
});

static PROXY_FACTORIES: Lazy<RwLock<HashMap<String, BoxProxyFactory>>> = Lazy::new(|| {
    let mut factories: HashMap<String, BoxProxyFactory> = HashMap::new();
    factories.insert("default".to_string(), Arc::new(DefaultProxyFactory));
    RwLock::new(factories)
});

static FILTERS: Lazy<RwLock<HashMap<String, BoxFilter>>> = Lazy::new(|| {
    let mut filters: HashMap<String, BoxFilter> = HashMap::new();
    filters.insert(
        "graceful_shutdown".to_string(),
        Arc::new(GracefulShutdownFilter),
    );
    filters.insert(GENERIC_FILTER_KEY.to_string(), Arc::new(GenericFilter));
    filters.insert(METRICS_FILTER_KEY.to_string(), Arc::new(MetricsFilter));
    RwLock::new(filters)
});

/// Hook run over every assembled interface URL before subscription
/// expansion.
pub trait ConfigPostProcessor: Send + Sync {
    fn post_process_reference(&self, url: &Url);
}

static CONFIG_POST_PROCESSORS: Lazy<RwLock<Vec<Arc<dyn ConfigPostProcessor>>>> =
    Lazy::new(|| RwLock::new(Vec::new()));

pub fn set_protocol(name: &str, protocol: BoxProtocol) {
    PROTOCOLS.write().unwrap().insert(name.to_string(), protocol);
}

pub fn get_protocol(name: &str) -> Result<BoxProtocol, UnknownExtension> {
    PROTOCOLS
        .read()
        .unwrap()
        .get(name)
        .cloned()
        .ok_or_else(|| UnknownExtension::new("protocol", name))
}

pub fn set_cluster(name: &str, cluster: BoxCluster) {
    CLUSTERS.write().unwrap().insert(name.to_string(), cluster);
}

pub fn get_cluster(name: &str) -> Result<BoxCluster, UnknownExtension> {
    CLUSTERS
        .read()
        .unwrap()
        .get(name)
        .cloned()
        .ok_or_else(|| UnknownExtension::new("cluster", name))
}

pub fn set_proxy_factory(name: &str, factory: BoxProxyFactory) {
    PROXY_FACTORIES
        .write()
        .unwrap()
        .insert(name.to_string(), factory);
}

pub fn get_proxy_factory(name: &str) -> Result<BoxProxyFactory, UnknownExtension> {
    PROXY_FACTORIES
        .read()
        .unwrap()
        .get(name)
        .cloned()
        .ok_or_else(|| UnknownExtension::new("proxy factory", name))
}

pub fn set_filter(name: &str, filter: BoxFilter) {
    FILTERS.write().unwrap().insert(name.to_string(), filter);
}

pub fn get_filter(name: &str) -> Result<BoxFilter, UnknownExtension> {
    FILTERS
        .read()
        .unwrap()
        .get(name)
        .cloned()
        .ok_or_else(|| UnknownExtension::new("filter", name))
}

pub fn add_config_post_processor(processor: Arc<dyn ConfigPostProcessor>) {
    CONFIG_POST_PROCESSORS.write().unwrap().push(processor);
}

pub fn config_post_processors() -> Vec<Arc<dyn ConfigPostProcessor>> {
    CONFIG_POST_PROCESSORS.read().unwrap().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_extensions_are_seeded() {
        assert!(get_cluster(CLUSTER_KEY_FAILOVER).is_ok());
        assert!(get_cluster(CLUSTER_KEY_ZONE_AWARE).is_ok());
        assert!(get_proxy_factory("default").is_ok());
        assert!(get_filter(GENERIC_FILTER_KEY).is_ok());
        assert!(get_protocol(REGISTRY_PROTOCOL).is_ok());
    }

    #[test]
    fn test_missing_lookup_reports_kind_and_name() {
        let err = get_cluster("no-such-cluster").err().unwrap();
        assert_eq!(err.to_string(), "unknown cluster extension: no-such-cluster");
    }
}
