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

//! The consumer pipeline: a declarative [`ReferenceConfig`] is initialized
//! against the root configuration, assembled into an interface URL, expanded
//! into subscription URLs, referred into invokers, joined by a cluster and
//! finally wrapped into a proxy.

use std::{
    collections::HashMap,
    env,
    sync::{Arc, RwLock},
    time::{SystemTime, UNIX_EPOCH},
};

use once_cell::sync::Lazy;
use tracing::{info, warn};

use lattice_base::{constants::*, RoleType, StdError, Url, UrlBuilder};
use lattice_config::{
    load_registries, translate_registry_ids, ConfigurationError, MethodConfig, RootConfig,
};

use crate::{
    cluster::directory::StaticDirectory,
    extension, filter,
    protocol::BoxInvoker,
    proxy::{self, Proxy, RpcService},
};

/// Stubs registered per interface name so providers can reach them during
/// generic calls.
static CONSUMER_SERVICES: Lazy<RwLock<HashMap<String, Arc<dyn RpcService>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn set_consumer_service(interface_name: &str, service: Arc<dyn RpcService>) {
    CONSUMER_SERVICES
        .write()
        .unwrap()
        .insert(interface_name.to_string(), service);
}

pub fn get_consumer_service(interface_name: &str) -> Option<Arc<dyn RpcService>> {
    CONSUMER_SERVICES.read().unwrap().get(interface_name).cloned()
}

/// The declarative consumer configuration for one remote interface.
#[derive(Default)]
pub struct ReferenceConfig {
    proxy: Option<Arc<Proxy>>,
    invoker: Option<BoxInvoker>,
    urls: Vec<Url>,
    root_config: Option<RootConfig>,

    id: String,
    pub interface_name: String,
    pub check: Option<bool>,
    /// Optional explicit endpoint list, semicolon separated; may mix direct
    /// and registry URLs.
    pub url: String,
    pub filter: String,
    pub protocol: String,
    pub registry_ids: Vec<String>,
    pub cluster: String,
    pub loadbalance: String,
    pub retries: String,
    pub group: String,
    pub version: String,
    pub serialization: String,
    pub provided_by: String,
    pub methods: Vec<MethodConfig>,
    pub is_async: bool,
    pub params: HashMap<String, String>,
    pub generic: String,
    pub sticky: bool,
    pub request_timeout: String,
    pub force_tag: bool,
    pub tracing_key: String,
    pub mesh_provider_port: u16,

    metadata_type: String,
    metrics_enabled: bool,
}

impl ReferenceConfig {
    /// Fill zero-valued fields from the root configuration and validate.
    /// Precedence: per-reference value > consumer section > application
    /// section > hard-coded default.
    pub fn init(&mut self, root: &RootConfig) -> Result<(), ConfigurationError> {
        for method in &self.methods {
            method.init()?;
        }

        self.metadata_type = root.application.metadata_type.clone();
        if self.group.is_empty() {
            self.group = root.application.group.clone();
        }
        if self.version.is_empty() {
            self.version = root.application.version.clone();
        }

        self.registry_ids = translate_registry_ids(&self.registry_ids);
        if self.filter.is_empty() {
            self.filter = root.consumer.filter.clone();
        }
        if self.registry_ids.is_empty() {
            self.registry_ids = translate_registry_ids(&root.consumer.registry_ids);
        }
        if self.protocol.is_empty() {
            self.protocol = root.consumer.protocol.clone();
        }
        if self.tracing_key.is_empty() {
            self.tracing_key = root.consumer.tracing_key.clone();
        }
        if self.check.is_none() {
            self.check = Some(root.consumer.check);
        }
        if self.cluster.is_empty() {
            self.cluster = CLUSTER_KEY_FAILOVER.to_string();
        }
        if let Some(enable) = root.metrics.enable {
            self.metrics_enabled = enable;
        }
        if self.id.is_empty() {
            self.id = self.interface_name.clone();
        }

        if self.interface_name.is_empty() {
            return Err(ConfigurationError::new(
                "reference config requires an interface name",
            ));
        }
        self.root_config = Some(root.clone());
        Ok(())
    }

    /// Resolve this reference into a live proxy. Must run after
    /// [`ReferenceConfig::init`], exactly once.
    ///
    /// Panics on mesh-mode misconfiguration and on an unknown cluster name;
    /// both are programmer errors. Every other failure is returned.
    pub fn refer(&mut self, service: Arc<dyn RpcService>) -> Result<(), StdError> {
        let root = self
            .root_config
            .clone()
            .ok_or_else(|| ConfigurationError::new("init must run before refer"))?;

        // Adaptive service overrides both strategy knobs.
        if root.consumer.adaptive_service {
            self.cluster = CLUSTER_KEY_ADAPTIVE_SERVICE.to_string();
            self.loadbalance = LOADBALANCE_KEY_P2C.to_string();
        }

        // Interface-level URL: it represents the interface itself.
        let cfg_url = UrlBuilder::new()
            .protocol(&self.protocol)
            .path(&self.interface_name)
            .params(self.get_url_map())
            .param(BEAN_NAME_KEY, &self.id)
            .param(METADATA_TYPE_KEY, &self.metadata_type)
            .build();

        set_consumer_service(&self.interface_name, service);
        if self.force_tag {
            cfg_url.add_param(FORCE_USE_TAG_KEY, "true");
        }
        for processor in extension::config_post_processors() {
            processor.post_process_reference(&cfg_url);
        }

        self.update_or_create_mesh_url(&root);

        // Subscription expansion: explicit URLs win over registry sections.
        let cfg_url = Arc::new(cfg_url);
        self.urls.clear();
        if !self.url.is_empty() {
            for url_str in self.url.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                let service_url = Url::parse(url_str).map_err(|err| {
                    ConfigurationError::new(format!(
                        "user specified URL {url_str} refer error: {err}"
                    ))
                })?;
                if service_url.protocol() == REGISTRY_PROTOCOL {
                    let mut service_url = service_url;
                    service_url.set_sub_url(cfg_url.clone());
                    self.urls.push(service_url);
                } else {
                    let service_url = if service_url.path().is_empty() {
                        service_url.with_path(&self.interface_name)
                    } else {
                        service_url
                    };
                    // endpoint fields stay, reference parameters flow in
                    let merged = service_url.merge_url(&cfg_url);
                    merged.add_param(PEER_KEY, "true");
                    self.urls.push(merged);
                }
            }
        } else {
            self.urls = load_registries(&self.registry_ids, &root.registries, RoleType::Consumer)?;
            for registry_url in &mut self.urls {
                registry_url.set_sub_url(cfg_url.clone());
            }
        }

        // One invoker per subscription URL.
        let mut invokers: Vec<BoxInvoker> = Vec::with_capacity(self.urls.len());
        let mut has_registry_url = false;
        for subscription_url in &self.urls {
            let protocol_name = if subscription_url.protocol() == SERVICE_REGISTRY_PROTOCOL {
                REGISTRY_PROTOCOL
            } else {
                subscription_url.protocol()
            };
            let protocol = extension::get_protocol(protocol_name)?;
            let mut invoker = protocol.refer(subscription_url.clone())?;
            if !self.url.is_empty() {
                invoker = filter::build_reference_chain(invoker);
            }
            if subscription_url.protocol() == REGISTRY_PROTOCOL {
                has_registry_url = true;
            }
            invokers.push(invoker);
        }

        // Cluster join collapses the invoker set into one logical invoker.
        let invoker: BoxInvoker = if invokers.len() == 1 {
            if self.url.is_empty() {
                invokers[0].clone()
            } else {
                let cluster_name = invokers[0].url().param(CLUSTER_KEY, CLUSTER_KEY_ZONE_AWARE);
                let cluster = extension::get_cluster(&cluster_name)
                    .unwrap_or_else(|err| panic!("{err}"));
                cluster.join(Arc::new(StaticDirectory::new(invokers)))
            }
        } else if !invokers.is_empty() {
            let cluster_name = pick_cluster_name(&invokers, has_registry_url);
            let cluster =
                extension::get_cluster(&cluster_name).unwrap_or_else(|err| panic!("{err}"));
            cluster.join(Arc::new(StaticDirectory::new(invokers)))
        } else {
            warn!(
                "reference {} resolved zero subscription URLs, the proxy stays empty until one appears",
                self.interface_name
            );
            return Ok(());
        };
        self.invoker = Some(invoker.clone());

        // Wrap the logical invoker into the caller-facing proxy.
        let factory = extension::get_proxy_factory(&root.consumer.proxy_factory)?;
        let proxy = if self.is_async {
            let callback = proxy::get_callback(&self.id);
            factory.get_async_proxy(invoker, callback, &cfg_url)
        } else {
            factory.get_proxy(invoker, &cfg_url)
        };
        self.proxy = Some(Arc::new(proxy));
        Ok(())
    }

    /// Bind the resolved proxy into the caller's stub value.
    pub fn implement(&self, service: Arc<dyn RpcService>) {
        if let Some(proxy) = &self.proxy {
            proxy.clone().implement(service);
        }
    }

    pub fn get_rpc_service(&self) -> Option<Arc<dyn RpcService>> {
        self.proxy.as_ref().and_then(|proxy| proxy.get())
    }

    pub fn get_proxy(&self) -> Option<Arc<Proxy>> {
        self.proxy.clone()
    }

    pub fn get_invoker(&self) -> Option<BoxInvoker> {
        self.invoker.clone()
    }

    pub fn subscription_urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The parameter dictionary of the interface URL, assembled in a fixed
    /// order: user params first, framework-owned keys after so they win.
    fn get_url_map(&self) -> HashMap<String, String> {
        let mut url_map = HashMap::new();
        for (key, value) in &self.params {
            url_map.insert(key.clone(), value.clone());
        }

        let root = self.root_config.as_ref();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        url_map.insert(INTERFACE_KEY.to_string(), self.interface_name.clone());
        url_map.insert(TIMESTAMP_KEY.to_string(), timestamp.to_string());
        url_map.insert(CLUSTER_KEY.to_string(), self.cluster.clone());
        url_map.insert(LOADBALANCE_KEY.to_string(), self.loadbalance.clone());
        url_map.insert(RETRIES_KEY.to_string(), self.retries.clone());
        url_map.insert(GROUP_KEY.to_string(), self.group.clone());
        url_map.insert(VERSION_KEY.to_string(), self.version.clone());
        url_map.insert(GENERIC_KEY.to_string(), self.generic.clone());
        url_map.insert(
            REGISTRY_ROLE_KEY.to_string(),
            RoleType::Consumer.code().to_string(),
        );
        url_map.insert(PROVIDED_BY_KEY.to_string(), self.provided_by.clone());
        url_map.insert(SERIALIZATION_KEY.to_string(), self.serialization.clone());
        url_map.insert(TRACING_CONFIG_KEY.to_string(), self.tracing_key.clone());
        url_map.insert(RELEASE_KEY.to_string(), RELEASE_VERSION.to_string());
        url_map.insert(SIDE_KEY.to_string(), RoleType::Consumer.role().to_string());

        if !self.request_timeout.is_empty() {
            url_map.insert(TIMEOUT_KEY.to_string(), self.request_timeout.clone());
        }
        url_map.insert(ASYNC_KEY.to_string(), self.is_async.to_string());
        url_map.insert(STICKY_KEY.to_string(), self.sticky.to_string());

        if let Some(root) = root {
            let application = &root.application;
            url_map.insert(APPLICATION_KEY.to_string(), application.name.clone());
            url_map.insert(ORGANIZATION_KEY.to_string(), application.organization.clone());
            // the application name doubles under `name` for legacy readers
            url_map.insert(NAME_KEY.to_string(), application.name.clone());
            url_map.insert(MODULE_KEY.to_string(), application.module.clone());
            url_map.insert(APP_VERSION_KEY.to_string(), application.version.clone());
            url_map.insert(OWNER_KEY.to_string(), application.owner.clone());
            url_map.insert(ENVIRONMENT_KEY.to_string(), application.environment.clone());
        }

        let mut default_filters = DEFAULT_REFERENCE_FILTERS.to_string();
        if !self.generic.is_empty() {
            default_filters = format!("{GENERIC_FILTER_KEY},{default_filters}");
        }
        if self.metrics_enabled {
            default_filters = format!("{default_filters},{METRICS_FILTER_KEY}");
        }
        let filters = if self.filter.is_empty() {
            default_filters
        } else {
            self.filter.clone()
        };
        url_map.insert(REFERENCE_FILTER_KEY.to_string(), filters);

        for method in &self.methods {
            url_map.insert(
                format!("methods.{}.{}", method.name, LOADBALANCE_KEY),
                method.loadbalance.clone(),
            );
            url_map.insert(
                format!("methods.{}.{}", method.name, RETRIES_KEY),
                method.retries.clone(),
            );
            url_map.insert(
                format!("methods.{}.{}", method.name, STICKY_KEY),
                method.sticky.to_string(),
            );
            if !method.request_timeout.is_empty() {
                url_map.insert(
                    format!("methods.{}.{}", method.name, TIMEOUT_KEY),
                    method.request_timeout.clone(),
                );
            }
        }

        url_map
    }

    /// Rewrite `url` to the mesh DNS name when consumer mesh mode is on.
    /// Requires the triple protocol and a provider name; anything else is a
    /// programmer error.
    fn update_or_create_mesh_url(&mut self, root: &RootConfig) {
        if !self.url.is_empty() {
            info!("URL specified explicitly {}", self.url);
        }
        if !root.consumer.mesh_enabled {
            return;
        }
        if self.protocol != TRIPLE_PROTOCOL {
            panic!(
                "mesh mode enabled, triple protocol expected but {} protocol found",
                self.protocol
            );
        }
        if self.provided_by.is_empty() {
            panic!("mesh mode enabled, provided-by should not be empty");
        }

        let pod_namespace = env_or(POD_NAMESPACE_ENV_KEY, DEFAULT_NAMESPACE);
        let cluster_domain = env_or(CLUSTER_DOMAIN_ENV_KEY, DEFAULT_CLUSTER_DOMAIN);
        let mesh_port = if self.mesh_provider_port > 0 {
            self.mesh_provider_port
        } else {
            DEFAULT_MESH_PORT
        };

        self.url = format!(
            "{TRIPLE_PROTOCOL}://{}.{}{}{}:{}",
            self.provided_by, pod_namespace, SVC_SUFFIX, cluster_domain, mesh_port
        );
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}

/// Multi-invoker cluster choice: zone-aware as soon as a registry URL takes
/// part, otherwise whatever the first invoker's URL declares.
fn pick_cluster_name(invokers: &[BoxInvoker], has_registry_url: bool) -> String {
    if has_registry_url {
        return CLUSTER_KEY_ZONE_AWARE.to_string();
    }
    invokers
        .first()
        .map(|invoker| invoker.url().param(CLUSTER_KEY, CLUSTER_KEY_ZONE_AWARE))
        .unwrap_or_else(|| CLUSTER_KEY_FAILOVER.to_string())
}

#[derive(Default)]
pub struct ReferenceConfigBuilder {
    reference: ReferenceConfig,
}

impl ReferenceConfigBuilder {
    pub fn new() -> Self {
        ReferenceConfigBuilder::default()
    }

    pub fn interface(mut self, interface_name: &str) -> Self {
        self.reference.interface_name = interface_name.to_string();
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.reference.id = id.to_string();
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.reference.url = url.to_string();
        self
    }

    pub fn filter(mut self, filter: &str) -> Self {
        self.reference.filter = filter.to_string();
        self
    }

    pub fn protocol(mut self, protocol: &str) -> Self {
        self.reference.protocol = protocol.to_string();
        self
    }

    pub fn registry_ids(mut self, registry_ids: Vec<String>) -> Self {
        self.reference.registry_ids = registry_ids;
        self
    }

    pub fn cluster(mut self, cluster: &str) -> Self {
        self.reference.cluster = cluster.to_string();
        self
    }

    pub fn loadbalance(mut self, loadbalance: &str) -> Self {
        self.reference.loadbalance = loadbalance.to_string();
        self
    }

    pub fn retries(mut self, retries: &str) -> Self {
        self.reference.retries = retries.to_string();
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.reference.group = group.to_string();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.reference.version = version.to_string();
        self
    }

    pub fn serialization(mut self, serialization: &str) -> Self {
        self.reference.serialization = serialization.to_string();
        self
    }

    pub fn provided_by(mut self, provided_by: &str) -> Self {
        self.reference.provided_by = provided_by.to_string();
        self
    }

    pub fn method(mut self, method: MethodConfig) -> Self {
        self.reference.methods.push(method);
        self
    }

    pub fn methods(mut self, methods: Vec<MethodConfig>) -> Self {
        self.reference.methods = methods;
        self
    }

    pub fn generic(mut self, generic: bool) -> Self {
        self.reference.generic = generic.to_string();
        self
    }

    pub fn is_async(mut self, is_async: bool) -> Self {
        self.reference.is_async = is_async;
        self
    }

    pub fn params(mut self, params: HashMap<String, String>) -> Self {
        self.reference.params = params;
        self
    }

    pub fn sticky(mut self, sticky: bool) -> Self {
        self.reference.sticky = sticky;
        self
    }

    pub fn request_timeout(mut self, request_timeout: &str) -> Self {
        self.reference.request_timeout = request_timeout.to_string();
        self
    }

    pub fn force_tag(mut self, force_tag: bool) -> Self {
        self.reference.force_tag = force_tag;
        self
    }

    pub fn tracing_key(mut self, tracing_key: &str) -> Self {
        self.reference.tracing_key = tracing_key.to_string();
        self
    }

    pub fn mesh_provider_port(mut self, port: u16) -> Self {
        self.reference.mesh_provider_port = port;
        self
    }

    pub fn build(self) -> ReferenceConfig {
        self.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_config::{ApplicationConfig, ConsumerConfig, MetricsConfig};

    fn sample_root() -> RootConfig {
        RootConfig {
            application: ApplicationConfig {
                name: "shop-cart".to_string(),
                organization: "example".to_string(),
                module: "cart".to_string(),
                version: "2.1.0".to_string(),
                owner: "platform-team".to_string(),
                environment: "dev".to_string(),
                group: "app-group".to_string(),
                metadata_type: "local".to_string(),
            },
            consumer: ConsumerConfig {
                filter: "consumer-filter".to_string(),
                registry_ids: vec!["r1,r2".to_string()],
                tracing_key: "jaeger".to_string(),
                check: true,
                ..Default::default()
            },
            registries: HashMap::new(),
            metrics: MetricsConfig { enable: Some(true) },
        }
    }

    #[test]
    fn test_init_propagates_defaults_in_precedence_order() {
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .build();
        reference.init(&sample_root()).unwrap();

        assert_eq!(reference.group, "app-group");
        assert_eq!(reference.version, "2.1.0");
        assert_eq!(reference.filter, "consumer-filter");
        assert_eq!(reference.registry_ids, vec!["r1", "r2"]);
        assert_eq!(reference.protocol, "tri");
        assert_eq!(reference.tracing_key, "jaeger");
        assert_eq!(reference.check, Some(true));
        assert_eq!(reference.cluster, CLUSTER_KEY_FAILOVER);
        assert!(reference.metrics_enabled);
        assert_eq!(reference.id(), "org.example.Greeter");
    }

    #[test]
    fn test_init_keeps_explicit_values() {
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .group("my-group")
            .protocol("grpc")
            .cluster("failfast")
            .build();
        reference.init(&sample_root()).unwrap();

        assert_eq!(reference.group, "my-group");
        assert_eq!(reference.protocol, "grpc");
        assert_eq!(reference.cluster, "failfast");
    }

    #[test]
    fn test_init_rejects_missing_interface() {
        let mut reference = ReferenceConfigBuilder::new().build();
        assert!(reference.init(&sample_root()).is_err());
    }

    #[test]
    fn test_init_rejects_invalid_method_config() {
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .method(MethodConfig::default())
            .build();
        assert!(reference.init(&sample_root()).is_err());
    }

    #[test]
    fn test_url_map_framework_keys_win_over_user_params() {
        let mut params = HashMap::new();
        params.insert("interface".to_string(), "spoofed".to_string());
        params.insert("custom".to_string(), "kept".to_string());
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .params(params)
            .build();
        let mut root = sample_root();
        root.consumer.filter = String::new();
        reference.init(&root).unwrap();

        let url_map = reference.get_url_map();
        assert_eq!(url_map["interface"], "org.example.Greeter");
        assert_eq!(url_map["custom"], "kept");
        assert_eq!(url_map["side"], "consumer");
        assert_eq!(url_map["registry.role"], "0");
        // the application name is written under both keys
        assert_eq!(url_map["application"], "shop-cart");
        assert_eq!(url_map["name"], "shop-cart");
        assert_eq!(url_map["application.version"], "2.1.0");
        assert!(url_map["release"].starts_with("lattice-rust-"));
        assert!(!url_map.contains_key("timeout"));
    }

    #[test]
    fn test_url_map_filter_composition() {
        let mut root = sample_root();
        root.consumer.filter = String::new();

        // generic prefixes, metrics suffixes
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .generic(true)
            .build();
        reference.init(&root).unwrap();
        let url_map = reference.get_url_map();
        assert_eq!(
            url_map[REFERENCE_FILTER_KEY],
            "generic,graceful_shutdown,metrics"
        );

        // an explicit filter string overrides the defaults entirely
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .filter("mine")
            .build();
        reference.init(&root).unwrap();
        assert_eq!(reference.get_url_map()[REFERENCE_FILTER_KEY], "mine");
    }

    #[test]
    fn test_url_map_emits_method_overrides_and_timeout() {
        let mut root = sample_root();
        root.metrics.enable = None;
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .request_timeout("5s")
            .method(MethodConfig {
                name: "GetUser".to_string(),
                retries: "4".to_string(),
                loadbalance: "random".to_string(),
                request_timeout: "2s".to_string(),
                sticky: true,
            })
            .build();
        reference.init(&root).unwrap();

        let url_map = reference.get_url_map();
        assert_eq!(url_map["timeout"], "5s");
        assert_eq!(url_map["methods.GetUser.retries"], "4");
        assert_eq!(url_map["methods.GetUser.loadbalance"], "random");
        assert_eq!(url_map["methods.GetUser.sticky"], "true");
        assert_eq!(url_map["methods.GetUser.timeout"], "2s");
    }

    #[test]
    #[should_panic(expected = "triple protocol expected")]
    fn test_mesh_requires_triple_protocol() {
        let mut root = sample_root();
        root.consumer.mesh_enabled = true;
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .protocol("grpc")
            .provided_by("svc-a")
            .build();
        reference.init(&root).unwrap();
        reference.update_or_create_mesh_url(&root);
    }

    #[test]
    #[should_panic(expected = "provided-by should not be empty")]
    fn test_mesh_requires_provided_by() {
        let mut root = sample_root();
        root.consumer.mesh_enabled = true;
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .protocol(TRIPLE_PROTOCOL)
            .build();
        reference.init(&root).unwrap();
        reference.update_or_create_mesh_url(&root);
    }

    #[test]
    fn test_mesh_rewrite_defaults() {
        let mut root = sample_root();
        root.consumer.mesh_enabled = true;
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .protocol(TRIPLE_PROTOCOL)
            .provided_by("svc-a")
            .build();
        reference.init(&root).unwrap();
        reference.update_or_create_mesh_url(&root);
        // env vars unset here, so namespace and domain take their defaults
        assert_eq!(reference.url, "tri://svc-a.default.svc.cluster.local:80");
    }

    #[test]
    fn test_mesh_rewrite_honors_port_override() {
        let mut root = sample_root();
        root.consumer.mesh_enabled = true;
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .protocol(TRIPLE_PROTOCOL)
            .provided_by("svc-b")
            .mesh_provider_port(20885)
            .build();
        reference.init(&root).unwrap();
        reference.update_or_create_mesh_url(&root);
        assert_eq!(reference.url, "tri://svc-b.default.svc.cluster.local:20885");
    }

    #[test]
    fn test_adaptive_service_forces_cluster_and_loadbalance() {
        let mut root = sample_root();
        root.consumer.adaptive_service = true;
        let mut reference = ReferenceConfigBuilder::new()
            .interface("org.example.Greeter")
            .build();
        reference.init(&root).unwrap();
        // no subscription source at all: refer resolves nothing but still
        // applies the adaptive overrides before bailing out
        let service: Arc<dyn RpcService> = Arc::new(NopService);
        reference.refer(service).unwrap();
        assert_eq!(reference.cluster, CLUSTER_KEY_ADAPTIVE_SERVICE);
        assert_eq!(reference.loadbalance, LOADBALANCE_KEY_P2C);
        assert!(reference.get_proxy().is_none());
    }

    struct NopService;

    impl RpcService for NopService {
        fn implement(&self, _: Arc<Proxy>) {}
    }

    struct UrlInvoker {
        url: Url,
    }

    impl crate::protocol::Invoker for UrlInvoker {
        fn invoke(
            &self,
            _: crate::protocol::RpcInvocation,
        ) -> Result<crate::protocol::RpcResponse, StdError> {
            Ok(crate::protocol::RpcResponse::default())
        }

        fn url(&self) -> &Url {
            &self.url
        }

        fn is_available(&self) -> bool {
            true
        }

        fn destroy(&self) {}
    }

    #[test]
    fn test_pick_cluster_name() {
        let direct: BoxInvoker = Arc::new(UrlInvoker {
            url: Url::parse("tri://10.0.0.1:20000/s?cluster=failover").unwrap(),
        });
        let unlabelled: BoxInvoker = Arc::new(UrlInvoker {
            url: Url::parse("tri://10.0.0.1:20000/s").unwrap(),
        });

        // any registry URL in the mix forces zone-aware
        assert_eq!(
            pick_cluster_name(&[direct.clone()], true),
            CLUSTER_KEY_ZONE_AWARE
        );
        // pure direct invokers follow the first invoker's declaration
        assert_eq!(pick_cluster_name(&[direct], false), CLUSTER_KEY_FAILOVER);
        assert_eq!(
            pick_cluster_name(&[unlabelled], false),
            CLUSTER_KEY_ZONE_AWARE
        );
    }
}
