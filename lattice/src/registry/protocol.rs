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
    sync::{Arc, RwLock},
};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use lattice_base::{StdError, Url};

use crate::{
    cluster::{directory::Directory, directory::DynamicDirectory, NoProviderError},
    extension,
    protocol::{BoxInvoker, Invoker, Protocol, RpcInvocation, RpcResponse},
    registry::{ServiceInfo, ServiceInstancesChangedEvent, ServiceInstancesChangedListener},
};

// Directories behind referred registry invokers, keyed by service key.
// Repeated refers of one service share membership, and discovery wiring can
// reach the directory of a reference it never saw being created.
static DIRECTORIES: Lazy<RwLock<HashMap<String, Arc<DynamicDirectory>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The dynamic directory serving `service_key`, if some reference created
/// one.
pub fn directory_for(service_key: &str) -> Option<Arc<DynamicDirectory>> {
    DIRECTORIES.read().unwrap().get(service_key).cloned()
}

/// The listener that feeds discovery pushes into `service_key`'s directory;
/// hand it to `ServiceDiscovery::add_listener`.
pub fn directory_listener_for(
    service_key: &str,
    service: ServiceInfo,
) -> Option<Arc<DirectoryListener>> {
    directory_for(service_key).map(|directory| Arc::new(DirectoryListener { directory, service }))
}

/// Answers `refer` for subscription URLs of scheme `registry`. The returned
/// invoker starts with an empty directory; discovery pushes populate it, so
/// a reference resolves cleanly even before any instance is known.
pub struct RegistryProtocol;

impl Protocol for RegistryProtocol {
    fn refer(&self, url: Url) -> Result<BoxInvoker, StdError> {
        // the interface URL rides inside the registry URL
        let service_url = match url.sub_url() {
            Some(sub) => (**sub).clone(),
            None => url.clone(),
        };
        let directory = {
            let mut directories = DIRECTORIES.write().unwrap();
            directories
                .entry(service_url.service_key())
                .or_insert_with(|| Arc::new(DynamicDirectory::new(service_url.clone())))
                .clone()
        };
        Ok(Arc::new(RegistryInvoker {
            service_url,
            registry_url: url,
            directory,
        }))
    }
}

pub struct RegistryInvoker {
    service_url: Url,
    registry_url: Url,
    directory: Arc<DynamicDirectory>,
}

impl RegistryInvoker {
    pub fn registry_url(&self) -> &Url {
        &self.registry_url
    }

    pub fn directory(&self) -> Arc<DynamicDirectory> {
        self.directory.clone()
    }

    /// The listener that keeps this invoker's directory in sync with
    /// discovery pushes; hand it to `ServiceDiscovery::add_listener`.
    pub fn directory_listener(&self, service: ServiceInfo) -> Arc<DirectoryListener> {
        Arc::new(DirectoryListener {
            directory: self.directory.clone(),
            service,
        })
    }
}

impl Invoker for RegistryInvoker {
    fn invoke(&self, invocation: RpcInvocation) -> Result<RpcResponse, StdError> {
        let invokers = self.directory.list();
        let Some(invoker) = invokers.iter().find(|i| i.is_available()) else {
            return Err(NoProviderError(self.service_url.service()).into());
        };
        invoker.invoke(invocation)
    }

    fn url(&self) -> &Url {
        &self.service_url
    }

    fn is_available(&self) -> bool {
        self.directory.list().iter().any(|i| i.is_available())
    }

    fn destroy(&self) {
        for invoker in self.directory.list() {
            invoker.destroy();
        }
        self.directory.replace(Vec::new());
    }
}

/// Translates membership events into a fresh invoker set and swaps it into
/// the directory behind a reference.
pub struct DirectoryListener {
    directory: Arc<DynamicDirectory>,
    service: ServiceInfo,
}

impl ServiceInstancesChangedListener for DirectoryListener {
    fn service_names(&self) -> HashSet<String> {
        HashSet::from([self.service.name.clone()])
    }

    fn on_event(&self, event: &ServiceInstancesChangedEvent) -> Result<(), StdError> {
        let mut invokers: Vec<BoxInvoker> = Vec::new();
        for instance in &event.instances {
            if !instance.enable {
                continue;
            }
            for url in instance.to_urls(&self.service) {
                let protocol = extension::get_protocol(url.protocol())?;
                match protocol.refer(url) {
                    Ok(invoker) => invokers.push(invoker),
                    Err(err) => warn!(
                        "refer {} instance {} failed: {}",
                        self.service.name,
                        instance.address(),
                        err
                    ),
                }
            }
        }
        debug!(
            "directory of {} now holds {} invokers",
            self.service.name,
            invokers.len()
        );
        self.directory.replace(invokers);
        Ok(())
    }
}
