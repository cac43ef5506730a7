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

use std::sync::RwLock;

use lattice_base::Url;

use crate::protocol::BoxInvoker;

/// The set of invokers currently known to a cluster.
pub trait Directory: Send + Sync {
    fn list(&self) -> Vec<BoxInvoker>;

    fn is_empty(&self) -> bool {
        self.list().is_empty()
    }
}

/// Directory over a fixed invoker set, used when the subscription URLs are
/// fully known at refer time.
pub struct StaticDirectory {
    invokers: Vec<BoxInvoker>,
}

impl StaticDirectory {
    pub fn new(invokers: Vec<BoxInvoker>) -> Self {
        StaticDirectory { invokers }
    }
}

impl Directory for StaticDirectory {
    fn list(&self) -> Vec<BoxInvoker> {
        self.invokers.clone()
    }
}

/// Directory whose membership is swapped wholesale by discovery pushes.
/// Readers dominate; a push replaces the whole set under the write lock.
pub struct DynamicDirectory {
    service_url: Url,
    invokers: RwLock<Vec<BoxInvoker>>,
}

impl DynamicDirectory {
    pub fn new(service_url: Url) -> Self {
        DynamicDirectory {
            service_url,
            invokers: RwLock::new(Vec::new()),
        }
    }

    pub fn service_url(&self) -> &Url {
        &self.service_url
    }

    pub fn replace(&self, invokers: Vec<BoxInvoker>) {
        let mut guard = self.invokers.write().unwrap();
        *guard = invokers;
    }

    pub fn len(&self) -> usize {
        self.invokers.read().unwrap().len()
    }
}

impl Directory for DynamicDirectory {
    fn list(&self) -> Vec<BoxInvoker> {
        self.invokers.read().unwrap().clone()
    }
}
