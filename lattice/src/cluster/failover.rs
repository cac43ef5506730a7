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

use std::sync::Arc;

use tracing::warn;

use lattice_base::{constants::*, StdError, Url};

use crate::{
    cluster::{directory::Directory, Cluster, NoProviderError},
    protocol::{BoxInvoker, Invoker, RpcInvocation, RpcResponse},
};

/// Walks the directory in order, retrying on the next invoker until the
/// attempt budget (`retries` + 1) is spent.
pub struct FailoverCluster;

impl Cluster for FailoverCluster {
    fn join(&self, directory: Arc<dyn Directory>) -> BoxInvoker {
        Arc::new(ClusterInvoker::new(directory, CLUSTER_KEY_FAILOVER))
    }
}

/// Single attempt on the first available invoker; any error surfaces
/// immediately.
pub struct FailfastCluster;

impl Cluster for FailfastCluster {
    fn join(&self, directory: Arc<dyn Directory>) -> BoxInvoker {
        Arc::new(ClusterInvoker::new(directory, CLUSTER_KEY_FAILFAST))
    }
}

/// Multi-registry strategy. Zone placement is decided by routing layers
/// behind the per-registry invokers, so the join itself reuses the failover
/// walk across registries.
pub struct ZoneAwareCluster;

impl Cluster for ZoneAwareCluster {
    fn join(&self, directory: Arc<dyn Directory>) -> BoxInvoker {
        Arc::new(ClusterInvoker::new(directory, CLUSTER_KEY_ZONE_AWARE))
    }
}

/// Adaptive-service strategy; the p2c load balance applied inside protocol
/// invokers does the actual picking.
pub struct AdaptiveServiceCluster;

impl Cluster for AdaptiveServiceCluster {
    fn join(&self, directory: Arc<dyn Directory>) -> BoxInvoker {
        Arc::new(ClusterInvoker::new(directory, CLUSTER_KEY_ADAPTIVE_SERVICE))
    }
}

pub struct ClusterInvoker {
    directory: Arc<dyn Directory>,
    policy: &'static str,
    url: Url,
}

impl ClusterInvoker {
    fn new(directory: Arc<dyn Directory>, policy: &'static str) -> Self {
        let url = directory
            .list()
            .first()
            .map(|invoker| invoker.url().clone())
            .unwrap_or_default();
        ClusterInvoker {
            directory,
            policy,
            url,
        }
    }

    pub fn policy(&self) -> &str {
        self.policy
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    fn attempts(&self) -> usize {
        if self.policy == CLUSTER_KEY_FAILFAST {
            return 1;
        }
        let retries = self
            .url
            .param(RETRIES_KEY, DEFAULT_RETRIES)
            .parse::<usize>()
            .unwrap_or(0);
        retries + 1
    }
}

impl Invoker for ClusterInvoker {
    fn invoke(&self, invocation: RpcInvocation) -> Result<RpcResponse, StdError> {
        let invokers = self.directory.list();
        if invokers.is_empty() {
            return Err(NoProviderError(self.url.service()).into());
        }

        let attempts = self.attempts().max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            let invoker = &invokers[attempt % invokers.len()];
            if !invoker.is_available() {
                continue;
            }
            match invoker.invoke(invocation.clone()) {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!(
                        "invoke {} on {} failed at attempt {}: {}",
                        invocation.method_name,
                        invoker.url().address(),
                        attempt,
                        err
                    );
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| NoProviderError(self.url.service()).into()))
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn is_available(&self) -> bool {
        self.directory.list().iter().any(|i| i.is_available())
    }

    fn destroy(&self) {
        for invoker in self.directory.list() {
            invoker.destroy();
        }
    }
}
