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

pub mod discovery;
pub mod dispatcher;
pub mod naming;
pub mod protocol;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use lattice_base::{constants::*, StdError, Url, UrlBuilder};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Reserved metadata key carrying the instance id across backends that have
/// no native id field.
pub const INSTANCE_ID_KEY: &str = "id";

/// Metadata key under which the endpoint list travels as JSON.
pub const ENDPOINTS_KEY: &str = "endpoints";

#[derive(Error, Debug)]
#[error("naming service error: {0}")]
pub struct NamingServiceError(String);

impl NamingServiceError {
    pub fn new(msg: impl Into<String>) -> Self {
        NamingServiceError(msg.into())
    }
}

#[derive(Error, Debug)]
#[error("subscription error for service {service_name}: {reason}")]
pub struct SubscriptionError {
    pub service_name: String,
    pub reason: String,
}

impl SubscriptionError {
    pub fn new(service_name: &str, reason: impl Into<String>) -> Self {
        SubscriptionError {
            service_name: service_name.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub port: u16,
    pub protocol: String,
}

/// Per-application metadata shared by every instance of a revision.
#[derive(Debug, Clone, Default)]
pub struct MetadataInfo {
    pub app: String,
    pub revision: String,
    pub services: HashMap<String, ServiceInfo>,
}

/// What the consumer knows about one exported service: enough to rebuild
/// its URLs from a discovered instance.
#[derive(Debug, Clone, Default)]
pub struct ServiceInfo {
    pub name: String,
    pub group: String,
    pub version: String,
    pub protocol: String,
    pub params: HashMap<String, String>,
    pub methods: Vec<String>,
}

impl ServiceInfo {
    pub fn new(name: &str, protocol: &str) -> Self {
        ServiceInfo {
            name: name.to_string(),
            protocol: protocol.to_string(),
            ..Default::default()
        }
    }
}

/// A discovered endpoint as the registry hands it to the rest of the core.
#[derive(Debug, Clone, Default)]
pub struct ServiceInstance {
    pub id: String,
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// `<= 0` means "use the default weight".
    pub weight: i64,
    pub enable: bool,
    pub healthy: bool,
    pub metadata: HashMap<String, String>,
    pub endpoints: Vec<Endpoint>,
    pub group: String,
    pub tag: String,
    pub service_metadata: Option<Arc<MetadataInfo>>,
}

impl ServiceInstance {
    pub fn address(&self) -> String {
        if self.port == 0 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn weight(&self) -> i64 {
        if self.weight <= 0 {
            DEFAULT_WEIGHT
        } else {
            self.weight
        }
    }

    /// The endpoint list, read from the field or lazily from the JSON blob
    /// in metadata. A broken blob is logged and treated as absent.
    pub fn resolved_endpoints(&self) -> Vec<Endpoint> {
        if !self.endpoints.is_empty() {
            return self.endpoints.clone();
        }
        let Some(raw) = self.metadata.get(ENDPOINTS_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<Endpoint>>(raw) {
            Ok(endpoints) => endpoints,
            Err(err) => {
                error!("parsing endpoints {} of instance {} failed: {}", raw, self.id, err);
                Vec::new()
            }
        }
    }

    /// Derive the URLs this instance serves for `service`: one per endpoint
    /// whose protocol matches, or a single URL on the primary port when the
    /// instance declares no endpoints. Tag and weight ride on every URL.
    pub fn to_urls(&self, service: &ServiceInfo) -> Vec<Url> {
        let endpoints = self.resolved_endpoints();
        if endpoints.is_empty() {
            return vec![self.build_url(service, self.port)];
        }
        endpoints
            .iter()
            .filter(|endpoint| endpoint.protocol == service.protocol)
            .map(|endpoint| self.build_url(service, endpoint.port))
            .collect()
    }

    fn build_url(&self, service: &ServiceInfo, port: u16) -> Url {
        UrlBuilder::new()
            .protocol(&service.protocol)
            .host(&self.host)
            .port(&port.to_string())
            .path(&service.name)
            .interface(&service.name)
            .methods(service.methods.clone())
            .params(service.params.clone())
            .param(TAG_KEY, &self.tag)
            .weight(self.weight())
            .build()
    }

    /// A sibling instance bound to one endpoint's port; its id becomes the
    /// new address.
    pub fn copy_with_endpoint(&self, endpoint: &Endpoint) -> ServiceInstance {
        let mut copy = self.clone();
        copy.port = endpoint.port;
        copy.id = copy.address();
        copy.endpoints = Vec::new();
        copy
    }
}

/// Membership snapshot delivered to listeners of one service name.
#[derive(Debug, Clone)]
pub struct ServiceInstancesChangedEvent {
    pub service_name: String,
    pub instances: Vec<ServiceInstance>,
}

pub trait ServiceInstancesChangedListener: Send + Sync {
    /// The service names this listener wants pushes for.
    fn service_names(&self) -> HashSet<String>;

    fn on_event(&self, event: &ServiceInstancesChangedEvent) -> Result<(), StdError>;
}

/// One page of a client-side paged enumeration.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub offset: usize,
    pub page_size: usize,
    pub data: Vec<T>,
    pub total: usize,
}

/// Consumer view of a naming service: registration, enumeration and push
/// subscription over the domain model.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    async fn register(&self, instance: ServiceInstance) -> Result<(), StdError>;

    /// The backend model has no in-place update; implementations deregister
    /// then register.
    async fn update(&self, instance: ServiceInstance) -> Result<(), StdError>;

    async fn unregister(&self, instance: &ServiceInstance) -> Result<(), StdError>;

    fn default_page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }

    async fn services(&self) -> HashSet<String>;

    async fn instances(&self, service_name: &str) -> Vec<ServiceInstance>;

    async fn instances_by_page(
        &self,
        service_name: &str,
        offset: usize,
        page_size: usize,
    ) -> Page<ServiceInstance>;

    async fn healthy_instances_by_page(
        &self,
        service_name: &str,
        offset: usize,
        page_size: usize,
        healthy: bool,
    ) -> Page<ServiceInstance>;

    async fn request_instances(
        &self,
        service_names: &[String],
        offset: usize,
        requested_size: usize,
    ) -> HashMap<String, Page<ServiceInstance>>;

    async fn add_listener(
        &self,
        listener: Arc<dyn ServiceInstancesChangedListener>,
    ) -> Result<(), StdError>;

    async fn destroy(&self) -> Result<(), StdError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instance() -> ServiceInstance {
        ServiceInstance {
            id: "inst-1".to_string(),
            service_name: "org.example.Greeter".to_string(),
            host: "10.0.0.7".to_string(),
            port: 20000,
            weight: 0,
            enable: true,
            healthy: true,
            tag: "gray".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_weight_defaults_when_non_positive() {
        let mut instance = sample_instance();
        assert_eq!(instance.weight(), DEFAULT_WEIGHT);
        instance.weight = 42;
        assert_eq!(instance.weight(), 42);
    }

    #[test]
    fn test_to_urls_without_endpoints_uses_primary_port() {
        let instance = sample_instance();
        let service = ServiceInfo::new("org.example.Greeter", "tri");
        let urls = instance.to_urls(&service);
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].address(), "10.0.0.7:20000");
        assert_eq!(urls[0].param(TAG_KEY, ""), "gray");
        assert_eq!(urls[0].param_i64(WEIGHT_KEY, 0), DEFAULT_WEIGHT);
    }

    #[test]
    fn test_to_urls_matches_endpoint_protocol() {
        let mut instance = sample_instance();
        instance.metadata.insert(
            ENDPOINTS_KEY.to_string(),
            r#"[{"port":20001,"protocol":"tri"},{"port":20002,"protocol":"jsonrpc"}]"#.to_string(),
        );
        let service = ServiceInfo::new("org.example.Greeter", "tri");
        let urls = instance.to_urls(&service);
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].port(), "20001");

        let other = ServiceInfo::new("org.example.Greeter", "grpc");
        assert!(instance.to_urls(&other).is_empty());
    }

    #[test]
    fn test_copy_with_endpoint_rekeys_by_address() {
        let instance = sample_instance();
        let copy = instance.copy_with_endpoint(&Endpoint {
            port: 30000,
            protocol: "tri".to_string(),
        });
        assert_eq!(copy.port, 30000);
        assert_eq!(copy.id, "10.0.0.7:30000");
    }
}
