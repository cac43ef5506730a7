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

use std::fmt::{Display, Formatter};

/// Role a node plays towards the naming service. The numeric code is what
/// goes onto the wire under `registry.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleType {
    Consumer = 0,
    Configurator = 1,
    Router = 2,
    Provider = 3,
}

impl RoleType {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Node category under which URLs of this role are filed.
    pub fn node(&self) -> &'static str {
        match self {
            RoleType::Consumer => "consumers",
            RoleType::Configurator => "configurators",
            RoleType::Router => "routers",
            RoleType::Provider => "providers",
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            RoleType::Consumer => "consumer",
            RoleType::Configurator => "",
            RoleType::Router => "routers",
            RoleType::Provider => "provider",
        }
    }
}

impl Display for RoleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.node())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes() {
        assert_eq!(RoleType::Consumer.code(), 0);
        assert_eq!(RoleType::Provider.code(), 3);
        assert_eq!(RoleType::Consumer.role(), "consumer");
        assert_eq!(RoleType::Provider.node(), "providers");
    }
}
