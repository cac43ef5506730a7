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

use std::{collections::HashMap, sync::Arc};

use lattice_base::{StdError, Url};

/// A single call travelling through an invoker chain.
#[derive(Debug, Default, Clone)]
pub struct RpcInvocation {
    pub method_name: String,
    pub arguments: Vec<serde_json::Value>,
    pub attachments: HashMap<String, String>,
}

impl RpcInvocation {
    pub fn new(method_name: &str) -> Self {
        RpcInvocation {
            method_name: method_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<serde_json::Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn set_attachment(&mut self, key: &str, value: &str) {
        self.attachments.insert(key.to_string(), value.to_string());
    }
}

#[derive(Debug, Default)]
pub struct RpcResponse {
    pub value: Option<serde_json::Value>,
    pub attachments: HashMap<String, String>,
}

/// A uniformly callable handle to a remote (or clustered) endpoint.
pub trait Invoker: Send + Sync {
    fn invoke(&self, invocation: RpcInvocation) -> Result<RpcResponse, StdError>;

    /// The URL this invoker was referred with. Clusters read their policy
    /// parameters from it.
    fn url(&self) -> &Url;

    fn is_available(&self) -> bool;

    fn destroy(&self);
}

pub type BoxInvoker = Arc<dyn Invoker>;

/// Protocol implementations turn a subscription URL into an invoker. The
/// transport and codec behind `refer` are not this crate's concern.
pub trait Protocol: Send + Sync {
    fn refer(&self, url: Url) -> Result<BoxInvoker, StdError>;

    fn destroy(&self) {}
}

pub type BoxProtocol = Arc<dyn Protocol>;
