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

//! Wires a registry-only reference to the discovery adapter and drives a
//! membership push through the change dispatcher into the reference's
//! directory.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Once},
};

use async_trait::async_trait;

use lattice::{
    extension,
    protocol::{BoxInvoker, Invoker, Protocol, RpcInvocation, RpcResponse},
    proxy::{Proxy, RpcService},
    reference::ReferenceConfigBuilder,
    registry::{
        discovery::NamingServiceDiscovery,
        naming::{
            BatchRegisterParam, DeregisterParam, InstanceRecord, NamingClient, ServiceList,
            SubscribeParam,
        },
        protocol::directory_listener_for,
        ServiceDiscovery, ServiceInfo, INSTANCE_ID_KEY,
    },
    StdError, Url,
};
use lattice_base::constants::*;
use lattice_config::{RegistryConfig, RootConfig};

struct TriProtocol;

struct TriInvoker {
    url: Url,
}

impl Invoker for TriInvoker {
    fn invoke(&self, _: RpcInvocation) -> Result<RpcResponse, StdError> {
        Ok(RpcResponse {
            value: Some(serde_json::json!("pong")),
            attachments: HashMap::new(),
        })
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn is_available(&self) -> bool {
        true
    }

    fn destroy(&self) {}
}

impl Protocol for TriProtocol {
    fn refer(&self, url: Url) -> Result<BoxInvoker, StdError> {
        Ok(Arc::new(TriInvoker { url }))
    }
}

static SETUP: Once = Once::new();

fn setup() {
    SETUP.call_once(|| {
        extension::set_protocol(TRIPLE_PROTOCOL, Arc::new(TriProtocol));
    });
}

#[derive(Default)]
struct PushableClient {
    subscriptions: Mutex<Vec<SubscribeParam>>,
}

impl PushableClient {
    fn push(&self, service_name: &str, records: Vec<InstanceRecord>) {
        for subscription in self.subscriptions.lock().unwrap().iter() {
            if subscription.service_name == service_name {
                (subscription.callback)(Ok(records.clone()));
            }
        }
    }
}

#[async_trait]
impl NamingClient for PushableClient {
    async fn batch_register_instance(&self, _: BatchRegisterParam) -> Result<bool, StdError> {
        Ok(true)
    }

    async fn deregister_instance(&self, _: DeregisterParam) -> Result<bool, StdError> {
        Ok(true)
    }

    async fn get_all_services_info(
        &self,
        _: u32,
        _: u32,
        _: &str,
    ) -> Result<ServiceList, StdError> {
        Ok(ServiceList::default())
    }

    async fn select_all_instances(
        &self,
        _: &str,
        _: &str,
    ) -> Result<Vec<InstanceRecord>, StdError> {
        Ok(Vec::new())
    }

    async fn subscribe(&self, param: SubscribeParam) -> Result<(), StdError> {
        self.subscriptions.lock().unwrap().push(param);
        Ok(())
    }

    async fn close(&self) {}
}

struct NopStub;

impl RpcService for NopStub {
    fn implement(&self, _: Arc<Proxy>) {}
}

#[tokio::test]
async fn test_membership_push_populates_a_registry_reference() {
    setup();

    let mut root = RootConfig::default();
    root.registries.insert(
        "r1".to_string(),
        RegistryConfig {
            protocol: "nacos".to_string(),
            address: "127.0.0.1:8848".to_string(),
            ..Default::default()
        },
    );

    let interface = "com.example.InventoryService";
    let mut reference = ReferenceConfigBuilder::new()
        .interface(interface)
        .protocol(TRIPLE_PROTOCOL)
        .registry_ids(vec!["r1".to_string()])
        .build();
    reference.init(&root).unwrap();
    reference.refer(Arc::new(NopStub)).unwrap();

    let invoker = reference.get_invoker().unwrap();
    assert!(!invoker.is_available());

    // wire the reference's directory to the discovery adapter
    let client = Arc::new(PushableClient::default());
    let discovery = NamingServiceDiscovery::new(
        Url::parse("registry://127.0.0.1:8848").unwrap(),
        client.clone(),
    );
    let listener = directory_listener_for(interface, ServiceInfo::new(interface, TRIPLE_PROTOCOL))
        .expect("refer must have created the directory");
    discovery.add_listener(listener).await.unwrap();

    // a backend push brings the first endpoint online
    let mut metadata = HashMap::new();
    metadata.insert(INSTANCE_ID_KEY.to_string(), "inv-1".to_string());
    client.push(
        interface,
        vec![InstanceRecord {
            ip: "10.0.0.21".to_string(),
            port: 20021,
            weight: 10.0,
            enable: true,
            healthy: true,
            metadata,
        }],
    );

    assert!(invoker.is_available());
    let response = invoker.invoke(RpcInvocation::new("List")).unwrap();
    assert_eq!(response.value, Some(serde_json::json!("pong")));

    // a push with an empty membership takes the endpoint away again
    client.push(interface, Vec::new());
    assert!(!invoker.is_available());
}
