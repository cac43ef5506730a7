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
    collections::HashMap,
    sync::{Arc, RwLock},
};

use once_cell::sync::Lazy;

use lattice_base::{StdError, Url};

use crate::protocol::{BoxInvoker, RpcInvocation, RpcResponse};

/// Callback fired with the response of a call made through an async proxy.
pub type AsyncCallback = Arc<dyn Fn(&RpcResponse) + Send + Sync>;

/// The caller-facing stub contract: a generated (or hand-written) client
/// receives the resolved proxy and routes its typed methods through it.
pub trait RpcService: Send + Sync {
    fn implement(&self, proxy: Arc<Proxy>);
}

/// The invocable handle a resolved reference hands to its stub.
pub struct Proxy {
    invoker: BoxInvoker,
    url: Url,
    callback: Option<AsyncCallback>,
    service: RwLock<Option<Arc<dyn RpcService>>>,
}

impl Proxy {
    /// Bind `service` to this proxy: the stub learns its proxy, the proxy
    /// remembers the stub for [`Proxy::get`].
    pub fn implement(self: Arc<Self>, service: Arc<dyn RpcService>) {
        service.implement(self.clone());
        *self.service.write().unwrap() = Some(service);
    }

    /// The stub previously bound with [`Proxy::implement`].
    pub fn get(&self) -> Option<Arc<dyn RpcService>> {
        self.service.read().unwrap().clone()
    }

    pub fn invoke(&self, invocation: RpcInvocation) -> Result<RpcResponse, StdError> {
        let response = self.invoker.invoke(invocation)?;
        if let Some(callback) = &self.callback {
            callback(&response);
        }
        Ok(response)
    }

    pub fn invoker(&self) -> &BoxInvoker {
        &self.invoker
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_async(&self) -> bool {
        self.callback.is_some()
    }
}

pub trait ProxyFactory: Send + Sync {
    fn get_proxy(&self, invoker: BoxInvoker, url: &Url) -> Proxy;

    fn get_async_proxy(
        &self,
        invoker: BoxInvoker,
        callback: Option<AsyncCallback>,
        url: &Url,
    ) -> Proxy;
}

pub type BoxProxyFactory = Arc<dyn ProxyFactory>;

pub struct DefaultProxyFactory;

impl ProxyFactory for DefaultProxyFactory {
    fn get_proxy(&self, invoker: BoxInvoker, url: &Url) -> Proxy {
        Proxy {
            invoker,
            url: url.clone(),
            callback: None,
            service: RwLock::new(None),
        }
    }

    fn get_async_proxy(
        &self,
        invoker: BoxInvoker,
        callback: Option<AsyncCallback>,
        url: &Url,
    ) -> Proxy {
        Proxy {
            invoker,
            url: url.clone(),
            callback,
            service: RwLock::new(None),
        }
    }
}

static CALLBACKS: Lazy<RwLock<HashMap<String, AsyncCallback>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register the callback an async reference (keyed by its id) should fire.
pub fn set_callback(reference_id: &str, callback: AsyncCallback) {
    CALLBACKS
        .write()
        .unwrap()
        .insert(reference_id.to_string(), callback);
}

pub fn get_callback(reference_id: &str) -> Option<AsyncCallback> {
    CALLBACKS.read().unwrap().get(reference_id).cloned()
}
