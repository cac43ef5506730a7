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

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info, warn};

use lattice_base::{constants::*, StdError, Url};

use crate::registry::{
    dispatcher::ChangeDispatcher,
    naming::{
        BatchRegisterParam, DeregisterParam, InstanceRecord, NamingClient, RegisterParam,
        SubscribeCallback, SubscribeParam,
    },
    NamingServiceError, Page, ServiceDiscovery, ServiceInstance, ServiceInstancesChangedEvent,
    ServiceInstancesChangedListener, SubscriptionError, DEFAULT_PAGE_SIZE, INSTANCE_ID_KEY,
};

const DEFAULT_SERVICE_GROUP: &str = "DEFAULT_GROUP";

// Interface-level data ids live next to application-level service names in
// the backend; enumeration must not surface them.
static INTERFACE_DATA_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^providers:[\w\.]+(?::[\w\.]*:|::[\w\.]*)?$").unwrap());

/// Service discovery over a [`NamingClient`]. The backend has no id field,
/// so instance ids travel in metadata under a reserved key.
pub struct NamingServiceDiscovery {
    group: String,
    descriptor: String,
    client: Arc<dyn NamingClient>,
    /// The URL this adapter was configured from; carries dynamic settings
    /// like the weight override.
    registry_url: Url,
    /// Everything registered through this adapter, unregistered on destroy.
    registered: Mutex<Vec<ServiceInstance>>,
    /// Batch registration accumulator per service name.
    service_instances: Mutex<HashMap<String, Vec<ServiceInstance>>>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl NamingServiceDiscovery {
    pub fn new(registry_url: Url, client: Arc<dyn NamingClient>) -> Self {
        let group = registry_url.param(REGISTRY_GROUP_KEY, DEFAULT_SERVICE_GROUP);
        let descriptor = format!("naming-service-discovery[{}]", registry_url.location());
        NamingServiceDiscovery {
            group,
            descriptor,
            client,
            registry_url,
            registered: Mutex::new(Vec::new()),
            service_instances: Mutex::new(HashMap::new()),
            dispatcher: Arc::new(ChangeDispatcher::new()),
        }
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Timeout naming-service calls inherit, from the registry URL with the
    /// built-in default.
    pub fn request_timeout(&self) -> Duration {
        self.registry_url
            .param_duration(REGISTRY_TIMEOUT_KEY, DEFAULT_REG_TIMEOUT)
    }

    fn to_register_param(&self, instance: &ServiceInstance) -> RegisterParam {
        let mut weight = instance.weight();
        // the registry URL may pin the weight for every instance it registers
        if let Some(raw) = self.registry_url.non_default_param(REGISTRY_WEIGHT_KEY) {
            match raw.parse::<f64>() {
                Ok(parsed) => weight = parsed as i64,
                Err(err) => warn!(
                    "invalid weight override value '{}': {}, keeping instance weight",
                    raw, err
                ),
            }
        }
        let weight = weight.clamp(DEFAULT_WEIGHT, MAX_WEIGHT);

        let mut metadata = instance.metadata.clone();
        metadata.insert(INSTANCE_ID_KEY.to_string(), instance.id.clone());

        RegisterParam {
            service_name: instance.service_name.clone(),
            ip: instance.host.clone(),
            port: instance.port,
            // zero-weight instances are invisible to some backends, so the
            // weight is always explicit
            weight: weight as f64,
            enable: instance.enable,
            healthy: instance.healthy,
            ephemeral: true,
            group_name: self.group.clone(),
            metadata,
        }
    }

    fn to_batch_register_param(&self, service_name: &str, held: &[ServiceInstance]) -> BatchRegisterParam {
        BatchRegisterParam {
            service_name: service_name.to_string(),
            group_name: self.group.clone(),
            instances: held.iter().map(|i| self.to_register_param(i)).collect(),
        }
    }

    fn record_to_instance(&self, service_name: &str, record: InstanceRecord) -> ServiceInstance {
        let mut metadata = record.metadata;
        // the backend echoes our reserved key back; it belongs in the id field
        let id = metadata.remove(INSTANCE_ID_KEY).unwrap_or_default();
        ServiceInstance {
            id,
            // the backend's own service name carries group decorations, so
            // the requested name is used instead
            service_name: service_name.to_string(),
            host: record.ip,
            port: record.port,
            weight: record.weight.round() as i64,
            enable: record.enable,
            healthy: record.healthy,
            metadata,
            group: self.group.clone(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ServiceDiscovery for NamingServiceDiscovery {
    async fn register(&self, instance: ServiceInstance) -> Result<(), StdError> {
        let service_name = instance.service_name.clone();
        let batch = {
            let mut held = self.service_instances.lock().unwrap();
            let entry = held.entry(service_name.clone()).or_default();
            entry.push(instance.clone());
            self.to_batch_register_param(&service_name, entry)
        };

        let ok = self
            .client
            .batch_register_instance(batch)
            .await
            .map_err(|e| NamingServiceError::new(format!("register instances failed: {e}")))?;
        if !ok {
            return Err(NamingServiceError::new("register instances rejected by backend").into());
        }
        self.registered.lock().unwrap().push(instance);
        Ok(())
    }

    async fn update(&self, instance: ServiceInstance) -> Result<(), StdError> {
        self.unregister(&instance).await?;
        self.register(instance).await
    }

    async fn unregister(&self, instance: &ServiceInstance) -> Result<(), StdError> {
        let ok = self
            .client
            .deregister_instance(DeregisterParam {
                service_name: instance.service_name.clone(),
                ip: instance.host.clone(),
                port: instance.port,
                group_name: self.group.clone(),
            })
            .await
            .map_err(|e| {
                NamingServiceError::new(format!(
                    "could not unregister the instance {}: {e}",
                    instance.service_name
                ))
            })?;
        if !ok {
            return Err(NamingServiceError::new(format!(
                "could not unregister the instance {}",
                instance.service_name
            ))
            .into());
        }

        // keep the batch accumulator honest: a later register must not
        // resurrect this endpoint. Host+port+service+group is the whole
        // identity, multiple endpoints of one instance are indistinguishable.
        let mut held = self.service_instances.lock().unwrap();
        if let Some(entry) = held.get_mut(&instance.service_name) {
            entry.retain(|held| held.host != instance.host || held.port != instance.port);
        }
        Ok(())
    }

    async fn services(&self) -> HashSet<String> {
        let mut result = HashSet::new();
        let page_size = self.default_page_size();
        let mut page_no = 1u32;
        loop {
            let page = match self
                .client
                .get_all_services_info(page_no, page_size as u32, &self.group)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    error!("could not query the services: {}", err);
                    return result;
                }
            };
            for dom in &page.doms {
                if !INTERFACE_DATA_ID_RE.is_match(dom) {
                    result.insert(dom.clone());
                }
            }
            if page.doms.len() < page_size {
                return result;
            }
            page_no += 1;
        }
    }

    async fn instances(&self, service_name: &str) -> Vec<ServiceInstance> {
        let records = match self
            .client
            .select_all_instances(service_name, &self.group)
            .await
        {
            Ok(records) => records,
            Err(err) => {
                error!(
                    "could not query the instances for service: {}, group: {}, err: {}",
                    service_name, self.group, err
                );
                return Vec::new();
            }
        };
        records
            .into_iter()
            .map(|record| self.record_to_instance(service_name, record))
            .collect()
    }

    // The backend's paged filter semantics are unreliable, so paging happens
    // client side over the unpaged result.
    async fn instances_by_page(
        &self,
        service_name: &str,
        offset: usize,
        page_size: usize,
    ) -> Page<ServiceInstance> {
        let all = self.instances(service_name).await;
        let total = all.len();
        let data = all
            .into_iter()
            .skip(offset)
            .take(page_size)
            .collect();
        Page {
            offset,
            page_size,
            data,
            total,
        }
    }

    async fn healthy_instances_by_page(
        &self,
        service_name: &str,
        offset: usize,
        page_size: usize,
        healthy: bool,
    ) -> Page<ServiceInstance> {
        let all = self.instances(service_name).await;
        let total = all.len();
        let mut data = Vec::with_capacity(page_size);
        let mut index = offset;
        while index < total && data.len() < page_size {
            if all[index].healthy == healthy {
                data.push(all[index].clone());
            }
            index += 1;
        }
        Page {
            offset,
            page_size,
            data,
            total,
        }
    }

    async fn request_instances(
        &self,
        service_names: &[String],
        offset: usize,
        requested_size: usize,
    ) -> HashMap<String, Page<ServiceInstance>> {
        let mut result = HashMap::with_capacity(service_names.len());
        for name in service_names {
            let page = self.instances_by_page(name, offset, requested_size).await;
            result.insert(name.clone(), page);
        }
        result
    }

    async fn add_listener(
        &self,
        listener: Arc<dyn ServiceInstancesChangedListener>,
    ) -> Result<(), StdError> {
        for service_name in listener.service_names() {
            self.dispatcher.add_listener(&service_name, listener.clone());
        }

        for service_name in listener.service_names() {
            let dispatcher = self.dispatcher.clone();
            let group = self.group.clone();
            let callback_service = service_name.clone();
            let callback: SubscribeCallback = Arc::new(move |result| {
                let records = match result {
                    Ok(records) => records,
                    Err(err) => {
                        error!(
                            "could not handle the subscribe notification, service name: {}, err: {}",
                            callback_service, err
                        );
                        return;
                    }
                };
                let instances = records
                    .into_iter()
                    .map(|record| {
                        let mut metadata = record.metadata;
                        let id = metadata.remove(INSTANCE_ID_KEY).unwrap_or_default();
                        ServiceInstance {
                            id,
                            service_name: callback_service.clone(),
                            host: record.ip,
                            port: record.port,
                            weight: record.weight.round() as i64,
                            enable: record.enable,
                            healthy: record.healthy,
                            metadata,
                            group: group.clone(),
                            ..Default::default()
                        }
                    })
                    .collect();
                dispatcher.dispatch(&ServiceInstancesChangedEvent {
                    service_name: callback_service.clone(),
                    instances,
                });
            });

            self.client
                .subscribe(SubscribeParam {
                    service_name: service_name.clone(),
                    group_name: self.group.clone(),
                    callback,
                })
                .await
                .map_err(|e| SubscriptionError::new(&service_name, e.to_string()))?;
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), StdError> {
        let registered = self.registered.lock().unwrap().clone();
        for instance in registered {
            match self.unregister(&instance).await {
                Ok(()) => info!("unregistered instance {}", instance.address()),
                Err(err) => error!(
                    "unregister instance {} failed: {}",
                    instance.address(),
                    err
                ),
            }
        }
        self.client.close().await;
        Ok(())
    }
}
