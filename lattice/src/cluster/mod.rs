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

pub mod directory;
pub mod failover;

use std::sync::Arc;

use thiserror::Error;

use crate::{cluster::directory::Directory, protocol::BoxInvoker};

/// A named strategy collapsing a directory of invokers into one logical
/// invoker. Only the naming contract lives here; routing arithmetic beyond
/// the selection walk belongs to dedicated cluster crates.
pub trait Cluster: Send + Sync {
    fn join(&self, directory: Arc<dyn Directory>) -> BoxInvoker;
}

pub type BoxCluster = Arc<dyn Cluster>;

#[derive(Error, Debug)]
#[error("no provider available for service {0}")]
pub struct NoProviderError(pub String);
