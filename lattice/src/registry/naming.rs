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

//! The naming-service backend contract as the adapter consumes it. The
//! concrete client crate lives behind this seam; tests plug a mock in.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use lattice_base::StdError;

/// One instance to register. Weight is a float because that is what the
/// backend speaks.
#[derive(Debug, Clone, Default)]
pub struct RegisterParam {
    pub service_name: String,
    pub ip: String,
    pub port: u16,
    pub weight: f64,
    pub enable: bool,
    pub healthy: bool,
    pub ephemeral: bool,
    pub group_name: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchRegisterParam {
    pub service_name: String,
    pub group_name: String,
    pub instances: Vec<RegisterParam>,
}

#[derive(Debug, Clone, Default)]
pub struct DeregisterParam {
    pub service_name: String,
    pub ip: String,
    pub port: u16,
    pub group_name: String,
}

/// One page of the backend's service-name enumeration.
#[derive(Debug, Clone, Default)]
pub struct ServiceList {
    pub doms: Vec<String>,
    pub count: i64,
}

/// A backend instance record before translation into the domain model.
#[derive(Debug, Clone, Default)]
pub struct InstanceRecord {
    pub ip: String,
    pub port: u16,
    pub weight: f64,
    pub enable: bool,
    pub healthy: bool,
    pub metadata: HashMap<String, String>,
}

/// Push callback. Runs on threads owned by the client library; pushes for
/// different service names may arrive concurrently, pushes for one name
/// arrive serially.
pub type SubscribeCallback = Arc<dyn Fn(Result<Vec<InstanceRecord>, StdError>) + Send + Sync>;

pub struct SubscribeParam {
    pub service_name: String,
    pub group_name: String,
    pub callback: SubscribeCallback,
}

#[async_trait]
pub trait NamingClient: Send + Sync {
    /// Registers the whole batch; `false` without an error still means the
    /// backend rejected it.
    async fn batch_register_instance(&self, param: BatchRegisterParam) -> Result<bool, StdError>;

    async fn deregister_instance(&self, param: DeregisterParam) -> Result<bool, StdError>;

    async fn get_all_services_info(
        &self,
        page_no: u32,
        page_size: u32,
        group_name: &str,
    ) -> Result<ServiceList, StdError>;

    async fn select_all_instances(
        &self,
        service_name: &str,
        group_name: &str,
    ) -> Result<Vec<InstanceRecord>, StdError>;

    async fn subscribe(&self, param: SubscribeParam) -> Result<(), StdError>;

    async fn close(&self);
}
