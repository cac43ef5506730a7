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
    sync::{Arc, Mutex},
};

use tracing::error;

use crate::registry::{ServiceInstancesChangedEvent, ServiceInstancesChangedListener};

/// Per-service listener registry. Fan-out is synchronous and in arrival
/// order, so `on_event` handlers must stay bounded: a blocking listener
/// blocks the whole dispatch for its service name.
#[derive(Default)]
pub struct ChangeDispatcher {
    listeners: Mutex<HashMap<String, Vec<Arc<dyn ServiceInstancesChangedListener>>>>,
}

impl ChangeDispatcher {
    pub fn new() -> Self {
        ChangeDispatcher::default()
    }

    /// Record `listener` under `service_name`. The set only grows for the
    /// dispatcher's lifetime; re-adding the same listener is a no-op.
    pub fn add_listener(
        &self,
        service_name: &str,
        listener: Arc<dyn ServiceInstancesChangedListener>,
    ) {
        let mut listeners = self.listeners.lock().unwrap();
        let entry = listeners.entry(service_name.to_string()).or_default();
        if !entry.iter().any(|known| Arc::ptr_eq(known, &listener)) {
            entry.push(listener);
        }
    }

    pub fn listener_count(&self, service_name: &str) -> usize {
        self.listeners
            .lock()
            .unwrap()
            .get(service_name)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener registered under its service name.
    /// Listener errors are logged and do not mutate the listener list.
    pub fn dispatch(&self, event: &ServiceInstancesChangedEvent) {
        let listeners = {
            let guard = self.listeners.lock().unwrap();
            guard.get(&event.service_name).cloned().unwrap_or_default()
        };
        for listener in listeners {
            if let Err(err) = listener.on_event(event) {
                error!(
                    "dispatching event got exception, service name: {}, err: {}",
                    event.service_name, err
                );
            }
        }
    }
}
