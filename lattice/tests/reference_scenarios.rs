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

//! End-to-end resolution scenarios: direct URLs, mixed direct/registry,
//! registry-only and mesh mode, driven through the public surface only.

use std::sync::{Arc, Mutex, Once};

use lattice::{
    extension,
    protocol::{BoxInvoker, Invoker, Protocol, RpcInvocation, RpcResponse},
    proxy::{Proxy, RpcService},
    reference::{get_consumer_service, ReferenceConfigBuilder},
    StdError, Url,
};
use lattice_base::constants::*;
use lattice_config::{ApplicationConfig, RegistryConfig, RootConfig};

/// Stand-in for the triple transport: answers every call with "pong" and
/// echoes the invocation attachments back.
struct TriProtocol;

struct TriInvoker {
    url: Url,
}

impl Invoker for TriInvoker {
    fn invoke(&self, invocation: RpcInvocation) -> Result<RpcResponse, StdError> {
        Ok(RpcResponse {
            value: Some(serde_json::json!("pong")),
            attachments: invocation.attachments,
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
struct GreeterStub {
    proxy: Mutex<Option<Arc<Proxy>>>,
}

impl RpcService for GreeterStub {
    fn implement(&self, proxy: Arc<Proxy>) {
        *self.proxy.lock().unwrap() = Some(proxy);
    }
}

fn sample_root() -> RootConfig {
    RootConfig {
        application: ApplicationConfig {
            name: "shop-cart".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn root_with_registry() -> RootConfig {
    let mut root = sample_root();
    root.registries.insert(
        "r1".to_string(),
        RegistryConfig {
            protocol: "nacos".to_string(),
            address: "127.0.0.1:8848".to_string(),
            ..Default::default()
        },
    );
    root
}

#[test]
fn test_direct_url_reference() {
    setup();
    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .protocol(TRIPLE_PROTOCOL)
        .url("tri://10.0.0.1:20000")
        .build();
    reference.init(&sample_root()).unwrap();

    let stub = Arc::new(GreeterStub::default());
    reference.refer(stub.clone()).unwrap();

    // one merged subscription URL, marked as a peer endpoint
    let urls = reference.subscription_urls();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].address(), "10.0.0.1:20000");
    assert_eq!(urls[0].path(), "/com.example.UserProvider");
    assert_eq!(urls[0].param(PEER_KEY, ""), "true");
    assert_eq!(urls[0].param(CLUSTER_KEY, ""), CLUSTER_KEY_FAILOVER);

    // the logical invoker carries the merged URL and answers calls
    let invoker = reference.get_invoker().unwrap();
    assert_eq!(invoker.url().param(PEER_KEY, ""), "true");
    let response = invoker.invoke(RpcInvocation::new("GetUser")).unwrap();
    assert_eq!(response.value, Some(serde_json::json!("pong")));

    // the stub received the proxy and the consumer registry knows the stub
    reference.implement(stub.clone());
    assert!(stub.proxy.lock().unwrap().is_some());
    assert!(get_consumer_service("com.example.UserProvider").is_some());
    assert!(reference.get_rpc_service().is_some());
}

#[test]
fn test_mixed_direct_and_registry_urls() {
    setup();
    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .protocol(TRIPLE_PROTOCOL)
        .url("tri://10.0.0.1:20000 ; registry://127.0.0.1:2181")
        .build();
    reference.init(&sample_root()).unwrap();
    reference.refer(Arc::new(GreeterStub::default())).unwrap();

    let urls = reference.subscription_urls();
    assert_eq!(urls.len(), 2);
    // the registry URL carries the interface URL as its sub-URL
    let registry_url = urls
        .iter()
        .find(|u| u.protocol() == REGISTRY_PROTOCOL)
        .unwrap();
    let sub_url = registry_url.sub_url().unwrap();
    assert_eq!(sub_url.interface(), "com.example.UserProvider");

    // two invokers joined into one logical invoker; the direct endpoint
    // serves the call while the registry side is still empty
    let invoker = reference.get_invoker().unwrap();
    let response = invoker.invoke(RpcInvocation::new("GetUser")).unwrap();
    assert_eq!(response.value, Some(serde_json::json!("pong")));
}

#[test]
fn test_registry_only_reference_resolves_without_instances() {
    setup();
    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .protocol(TRIPLE_PROTOCOL)
        .registry_ids(vec!["r1".to_string()])
        .build();
    reference.init(&root_with_registry()).unwrap();
    reference.refer(Arc::new(GreeterStub::default())).unwrap();

    let urls = reference.subscription_urls();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].protocol(), REGISTRY_PROTOCOL);
    assert_eq!(
        urls[0].sub_url().unwrap().interface(),
        "com.example.UserProvider"
    );

    // resolution succeeded although no instance is known yet
    let invoker = reference.get_invoker().unwrap();
    assert!(!invoker.is_available());
    let err = invoker.invoke(RpcInvocation::new("GetUser")).unwrap_err();
    assert!(err.to_string().contains("no provider available"));
    assert!(reference.get_proxy().is_some());
}

#[test]
fn test_generic_reference_marks_calls_through_the_filter_chain() {
    setup();
    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .protocol(TRIPLE_PROTOCOL)
        .url("tri://10.0.0.1:20000")
        .generic(true)
        .build();
    reference.init(&sample_root()).unwrap();

    let stub = Arc::new(GreeterStub::default());
    reference.refer(stub.clone()).unwrap();
    reference.implement(stub.clone());

    let proxy = stub.proxy.lock().unwrap().clone().unwrap();
    let response = proxy.invoke(RpcInvocation::new("GetUser")).unwrap();
    // the generic filter stamped the invocation on its way out
    assert_eq!(
        response.attachments.get(GENERIC_KEY).map(String::as_str),
        Some("true")
    );
}

#[test]
fn test_mesh_rewrite_builds_service_dns_url() {
    setup();
    std::env::set_var("POD_NAMESPACE", "ns1");
    let mut root = sample_root();
    root.consumer.mesh_enabled = true;

    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .protocol(TRIPLE_PROTOCOL)
        .provided_by("svc-a")
        .build();
    reference.init(&root).unwrap();
    reference.refer(Arc::new(GreeterStub::default())).unwrap();
    std::env::remove_var("POD_NAMESPACE");

    assert_eq!(reference.url, "tri://svc-a.ns1.svc.cluster.local:80");
    let urls = reference.subscription_urls();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].address(), "svc-a.ns1.svc.cluster.local:80");
    assert_eq!(urls[0].param(PEER_KEY, ""), "true");
}

#[test]
#[should_panic(expected = "triple protocol expected")]
fn test_mesh_misconfiguration_is_fatal() {
    setup();
    let mut root = sample_root();
    root.consumer.mesh_enabled = true;
    root.consumer.protocol = "grpc".to_string();

    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .provided_by("svc-a")
        .build();
    reference.init(&root).unwrap();
    let _ = reference.refer(Arc::new(GreeterStub::default()));
}

#[test]
fn test_invalid_user_url_is_a_configuration_error() {
    setup();
    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .protocol(TRIPLE_PROTOCOL)
        .url("://missing-scheme:20000")
        .build();
    reference.init(&sample_root()).unwrap();
    let err = reference
        .refer(Arc::new(GreeterStub::default()))
        .unwrap_err();
    assert!(err.to_string().contains("configuration error"));
}

#[test]
fn test_unknown_protocol_is_reported() {
    setup();
    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .protocol(TRIPLE_PROTOCOL)
        .url("warp://10.0.0.1:20000")
        .build();
    reference.init(&sample_root()).unwrap();
    let err = reference
        .refer(Arc::new(GreeterStub::default()))
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown protocol extension: warp");
}

#[test]
#[should_panic(expected = "unknown cluster extension")]
fn test_unknown_cluster_is_a_programmer_error() {
    setup();
    let mut reference = ReferenceConfigBuilder::new()
        .interface("com.example.UserProvider")
        .protocol(TRIPLE_PROTOCOL)
        .url("tri://10.0.0.1:20000")
        .cluster("no-such-cluster")
        .build();
    reference.init(&sample_root()).unwrap();
    let _ = reference.refer(Arc::new(GreeterStub::default()));
}
