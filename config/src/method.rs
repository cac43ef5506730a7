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

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Per-method override of the reference-level knobs, emitted onto the
/// interface URL under `methods.<name>.<key>`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MethodConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub retries: String,
    #[serde(default)]
    pub loadbalance: String,
    #[serde(default, rename = "timeout")]
    pub request_timeout: String,
    #[serde(default)]
    pub sticky: bool,
}

impl MethodConfig {
    pub fn init(&self) -> Result<(), ConfigurationError> {
        if self.name.is_empty() {
            return Err(ConfigurationError::new("method config requires a name"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_rejects_unnamed_method() {
        let method = MethodConfig {
            retries: "3".to_string(),
            ..Default::default()
        };
        assert!(method.init().is_err());

        let method = MethodConfig {
            name: "GetUser".to_string(),
            ..Default::default()
        };
        assert!(method.init().is_ok());
    }
}
