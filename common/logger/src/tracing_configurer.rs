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

use crate::level::{parse_level, DEFAULT_LEVEL};

const LOG_LEVEL_ENV_KEY: &str = "LATTICE_LOG_LEVEL";

pub(crate) fn default() {
    let level = std::env::var(LOG_LEVEL_ENV_KEY)
        .map(|raw| parse_level(&raw))
        .unwrap_or(DEFAULT_LEVEL);
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_max_level(level)
        .with_thread_names(false)
        .with_line_number(true)
        // sets this to be the default, global collector for this application
        .try_init();
}
