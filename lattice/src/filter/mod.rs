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

use std::{sync::Arc, time::Instant};

use tracing::{debug, warn};

use lattice_base::{constants::*, StdError, Url};

use crate::{
    extension,
    protocol::{BoxInvoker, Invoker, RpcInvocation, RpcResponse},
};

/// Cross-cutting handler wrapping an invoker.
pub trait Filter: Send + Sync {
    fn invoke(&self, invoker: &dyn Invoker, invocation: RpcInvocation)
        -> Result<RpcResponse, StdError>;
}

pub type BoxFilter = Arc<dyn Filter>;

struct FilterInvoker {
    filter: BoxFilter,
    next: BoxInvoker,
}

impl Invoker for FilterInvoker {
    fn invoke(&self, invocation: RpcInvocation) -> Result<RpcResponse, StdError> {
        self.filter.invoke(self.next.as_ref(), invocation)
    }

    fn url(&self) -> &Url {
        self.next.url()
    }

    fn is_available(&self) -> bool {
        self.next.is_available()
    }

    fn destroy(&self) {
        self.next.destroy()
    }
}

/// Wrap `invoker` with the filters its URL names under `reference.filters`.
/// The first name ends up outermost. Names without a registered filter are
/// skipped with a warning so an enabled-but-absent filter never breaks the
/// reference.
pub fn build_reference_chain(invoker: BoxInvoker) -> BoxInvoker {
    let names = invoker.url().param(REFERENCE_FILTER_KEY, "");
    let mut chain = invoker;
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()).rev() {
        match extension::get_filter(name) {
            Ok(filter) => {
                chain = Arc::new(FilterInvoker {
                    filter,
                    next: chain,
                });
            }
            Err(_) => warn!("reference filter {} is not registered, skipping", name),
        }
    }
    chain
}

/// Lets in-flight calls finish during shutdown; pass-through otherwise.
pub struct GracefulShutdownFilter;

impl Filter for GracefulShutdownFilter {
    fn invoke(
        &self,
        invoker: &dyn Invoker,
        invocation: RpcInvocation,
    ) -> Result<RpcResponse, StdError> {
        invoker.invoke(invocation)
    }
}

/// Marks the call as generic so the provider side decodes arguments from
/// their map form.
pub struct GenericFilter;

impl Filter for GenericFilter {
    fn invoke(
        &self,
        invoker: &dyn Invoker,
        mut invocation: RpcInvocation,
    ) -> Result<RpcResponse, StdError> {
        invocation.set_attachment(GENERIC_KEY, "true");
        invoker.invoke(invocation)
    }
}

/// Times each call for the metrics pipeline.
pub struct MetricsFilter;

impl Filter for MetricsFilter {
    fn invoke(
        &self,
        invoker: &dyn Invoker,
        invocation: RpcInvocation,
    ) -> Result<RpcResponse, StdError> {
        let method = invocation.method_name.clone();
        let started = Instant::now();
        let result = invoker.invoke(invocation);
        debug!(
            "rpc {} on {} took {:?}",
            method,
            invoker.url().address(),
            started.elapsed()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingInvoker {
        url: Url,
        seen: Mutex<Vec<RpcInvocation>>,
    }

    impl Invoker for RecordingInvoker {
        fn invoke(&self, invocation: RpcInvocation) -> Result<RpcResponse, StdError> {
            self.seen.lock().unwrap().push(invocation);
            Ok(RpcResponse::default())
        }

        fn url(&self) -> &Url {
            &self.url
        }

        fn is_available(&self) -> bool {
            true
        }

        fn destroy(&self) {}
    }

    #[test]
    fn test_chain_applies_generic_filter_and_skips_unknown() {
        let url = Url::parse(
            "tri://127.0.0.1:20000/s?reference.filters=generic,no_such_filter,graceful_shutdown",
        )
        .unwrap();
        let inner = Arc::new(RecordingInvoker {
            url,
            seen: Mutex::new(Vec::new()),
        });
        let chained = build_reference_chain(inner.clone());
        chained.invoke(RpcInvocation::new("Get")).unwrap();

        let seen = inner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].attachments.get("generic").map(String::as_str), Some("true"));
    }
}
