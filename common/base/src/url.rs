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
    any::Any,
    collections::HashMap,
    fmt::{Debug, Display, Formatter},
    str::FromStr,
    sync::{Arc, RwLock},
    time::Duration,
};

use thiserror::Error;

use crate::constants::*;

/// Opaque in-process value carried in the URL attribute bag. Attributes are
/// never serialized into the wire URL.
pub type Attribute = Arc<dyn Any + Send + Sync>;

/// The parameter-carrying descriptor used everywhere downstream of reference
/// assembly.
///
/// A `Url` is immutable after initialization: `protocol`, `host`, `port`,
/// `path`, `username` and `password` cannot change once built, and the
/// parameter/attribute maps may only be written while the URL is being set
/// up. Parameter reads are safe under concurrent readers; writes after the
/// initialization phase are forbidden by convention (`merge_url`, `clone`
/// and tests being the only expected writers).
#[derive(Default)]
pub struct Url {
    protocol: String,
    username: String,
    password: String,
    // raw authority host list, may be comma separated
    location: String,
    host: String,
    port: String,
    path: String,
    methods: Vec<String>,
    primitive_url: String,
    params: RwLock<HashMap<String, String>>,
    attributes: RwLock<HashMap<String, Attribute>>,
    sub_url: Option<Arc<Url>>,
}

#[derive(Error, Debug)]
#[error("invalid url '{url}': {reason}")]
pub struct UrlParseError {
    pub url: String,
    pub reason: String,
}

impl UrlParseError {
    fn new(url: &str, reason: impl Into<String>) -> Self {
        UrlParseError {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

impl Url {
    pub fn empty() -> Self {
        Url::default()
    }

    /// Parse a wire-format URL string. The input is percent-decoded as a
    /// whole before splitting. An empty input yields an empty URL without
    /// error; a malformed input yields the error and no URL.
    pub fn parse(raw: &str) -> Result<Url, UrlParseError> {
        Url::parse_with_protocol(raw, "")
    }

    /// Like [`Url::parse`], but when the input lacks a `//` separator the
    /// given protocol is prepended as the scheme.
    pub fn parse_with_protocol(raw: &str, default_protocol: &str) -> Result<Url, UrlParseError> {
        if raw.is_empty() {
            return Ok(Url::default());
        }

        let decoded = urlencoding::decode(raw)
            .map_err(|e| UrlParseError::new(raw, format!("percent-decode failed: {e}")))?
            .into_owned();

        let full = if decoded.contains("//") {
            decoded
        } else {
            format!("{default_protocol}://{decoded}")
        };

        let (protocol, rest) = full
            .split_once("://")
            .ok_or_else(|| UrlParseError::new(raw, "missing scheme separator"))?;
        if protocol.is_empty() {
            return Err(UrlParseError::new(raw, "empty scheme"));
        }

        let (before_query, query) = match rest.split_once('?') {
            Some((b, q)) => (b, q),
            None => (rest, ""),
        };
        let (authority, path) = match before_query.find('/') {
            Some(idx) => (&before_query[..idx], &before_query[idx..]),
            None => (before_query, ""),
        };

        let (username, password, location) = match authority.rsplit_once('@') {
            Some((userinfo, hostpart)) => {
                let (user, pass) = match userinfo.split_once(':') {
                    Some((u, p)) => (u.to_string(), p.to_string()),
                    None => (userinfo.to_string(), String::new()),
                };
                (user, pass, hostpart.to_string())
            }
            None => (String::new(), String::new(), authority.to_string()),
        };

        // The host part may be a comma separated candidate list; the first
        // entry carrying a port wins. Without any port the first entry still
        // names the host so that address() stays meaningful.
        let mut host = String::new();
        let mut port = String::new();
        for entry in location.split(',') {
            if let Some((h, p)) = entry.trim().rsplit_once(':') {
                host = h.to_string();
                port = p.to_string();
                break;
            }
        }
        if host.is_empty() {
            if let Some(entry) = location.split(',').map(str::trim).find(|e| !e.is_empty()) {
                host = entry.to_string();
            }
        }

        let mut params = HashMap::new();
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            if let Some((k, v)) = pair.split_once('=') {
                params.insert(k.trim().to_string(), v.trim().to_string());
            }
        }

        // Registries of the same address but different groups must not key
        // identically, so the group is folded into the primitive string.
        let mut primitive_url = raw.to_string();
        if let Some(group) = params.get(REGISTRY_GROUP_KEY) {
            if !group.is_empty() {
                primitive_url = format!("{raw}{PATH_SEPARATOR}{group}");
            }
        }

        Ok(Url {
            protocol: protocol.to_string(),
            username,
            password,
            location,
            host,
            port,
            path: path.to_string(),
            methods: Vec::new(),
            primitive_url,
            params: RwLock::new(params),
            attributes: RwLock::new(HashMap::new()),
            sub_url: None,
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn primitive_url(&self) -> &str {
        &self.primitive_url
    }

    /// `host` when the port is empty, `host:port` otherwise.
    pub fn address(&self) -> String {
        if self.port.is_empty() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Replace the path while the URL is still owned by its initializer.
    /// Consuming `self` keeps the frozen-after-init contract intact.
    pub fn with_path(mut self, path: &str) -> Url {
        self.path = format!("/{}", path.trim_start_matches('/'));
        self
    }

    pub fn sub_url(&self) -> Option<&Arc<Url>> {
        self.sub_url.as_ref()
    }

    pub fn set_sub_url(&mut self, sub_url: Arc<Url>) {
        self.sub_url = Some(sub_url);
    }

    pub fn group(&self) -> String {
        self.param(GROUP_KEY, "")
    }

    pub fn interface(&self) -> String {
        self.param(INTERFACE_KEY, "")
    }

    pub fn version(&self) -> String {
        self.param(VERSION_KEY, "")
    }

    /// The service this URL refers to: the `interface` parameter, falling
    /// back to the path, falling back to the sub-URL (registry URLs usually
    /// have no path of their own).
    pub fn service(&self) -> String {
        let service = self.param(INTERFACE_KEY, self.path.trim_start_matches('/'));
        if !service.is_empty() {
            return service;
        }
        if let Some(sub) = &self.sub_url {
            let service = sub.param(INTERFACE_KEY, sub.path().trim_start_matches('/'));
            if !service.is_empty() {
                return service;
            }
        }
        String::new()
    }

    pub fn param(&self, key: &str, default: &str) -> String {
        let params = self.params.read().unwrap();
        match params.get(key) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => default.to_string(),
        }
    }

    /// Returns the parameter only when it is present and non-empty.
    pub fn non_default_param(&self, key: &str) -> Option<String> {
        let params = self.params.read().unwrap();
        params.get(key).filter(|v| !v.is_empty()).cloned()
    }

    pub fn param_bool(&self, key: &str, default: bool) -> bool {
        self.param(key, "").parse::<bool>().unwrap_or(default)
    }

    pub fn param_i32(&self, key: &str, default: i32) -> i32 {
        self.param(key, "").parse::<i32>().unwrap_or(default)
    }

    pub fn param_i64(&self, key: &str, default: i64) -> i64 {
        self.param(key, "").parse::<i64>().unwrap_or(default)
    }

    pub fn param_usize(&self, key: &str, default: usize) -> usize {
        self.param(key, "").parse::<usize>().unwrap_or(default)
    }

    /// Duration parameter, `3s` whenever neither the value nor the supplied
    /// default parses.
    pub fn param_duration(&self, key: &str, default: &str) -> Duration {
        parse_duration(&self.param(key, default)).unwrap_or(Duration::from_secs(3))
    }

    pub fn method_param(&self, method: &str, key: &str, default: &str) -> String {
        self.param(&method_key(method, key), default)
    }

    pub fn method_param_i64(&self, method: &str, key: &str, default: i64) -> i64 {
        match self.non_default_param(&method_key(method, key)) {
            Some(v) => v.parse::<i64>().unwrap_or(default),
            None => self.param_i64(key, default),
        }
    }

    pub fn method_param_bool(&self, method: &str, key: &str, default: bool) -> bool {
        self.param_bool(&method_key(method, key), default)
    }

    /// Put a key-value pair, overriding any previous value. Only expected
    /// during URL initialization.
    pub fn set_param(&self, key: &str, value: &str) {
        let mut params = self.params.write().unwrap();
        params.insert(key.to_string(), value.to_string());
    }

    /// Same write policy as [`Url::set_param`]; the map is last-write-wins.
    pub fn add_param(&self, key: &str, value: &str) {
        self.set_param(key, value);
    }

    pub fn del_param(&self, key: &str) {
        let mut params = self.params.write().unwrap();
        params.remove(key);
    }

    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.read().unwrap().clone()
    }

    pub fn params_count(&self) -> usize {
        self.params.read().unwrap().len()
    }

    pub fn set_attribute(&self, key: &str, value: Attribute) {
        let mut attributes = self.attributes.write().unwrap();
        attributes.insert(key.to_string(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<Attribute> {
        let attributes = self.attributes.read().unwrap();
        attributes.get(key).cloned()
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.read().unwrap().contains_key(key)
    }

    fn attributes_map(&self) -> HashMap<String, Attribute> {
        self.attributes.read().unwrap().clone()
    }

    /// Identity key: protocol, credentials, address, service, group and
    /// version.
    pub fn key(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/?interface={}&group={}&version={}",
            self.protocol,
            self.username,
            self.password,
            self.host,
            self.port,
            self.service(),
            self.param(GROUP_KEY, ""),
            self.param(VERSION_KEY, ""),
        )
    }

    /// Directory cache key: the identity key widened with the timestamp the
    /// URL originally carried and the mesh cluster id.
    pub fn cache_key(&self) -> String {
        let original = Url::parse(&self.primitive_url).unwrap_or_default();
        format!(
            "{}&timestamp={}&{}={}",
            self.key(),
            original.param(TIMESTAMP_KEY, ""),
            MESH_CLUSTER_ID_KEY,
            self.param(MESH_CLUSTER_ID_KEY, ""),
        )
    }

    pub fn service_key(&self) -> String {
        service_key(
            &self.param(INTERFACE_KEY, self.path.trim_start_matches('/')),
            &self.param(GROUP_KEY, ""),
            &self.param(VERSION_KEY, ""),
        )
    }

    /// `{interface}:[version]:[group]`
    pub fn colon_separated_key(&self) -> String {
        let interface = self.param(INTERFACE_KEY, self.path.trim_start_matches('/'));
        if interface.is_empty() {
            return String::new();
        }
        let mut version = self.param(VERSION_KEY, "");
        if version == "0.0.0" {
            version = String::new();
        }
        format!("{}:{}:{}", interface, version, self.param(GROUP_KEY, ""))
    }

    /// Flatten this URL into a plain map: the non-parameter fields join the
    /// parameters under reserved keys.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = self.params_map();
        if !self.protocol.is_empty() {
            map.insert("protocol".to_string(), self.protocol.clone());
        }
        if !self.username.is_empty() {
            map.insert("username".to_string(), self.username.clone());
        }
        if !self.password.is_empty() {
            map.insert("password".to_string(), self.password.clone());
        }
        if !self.location.is_empty() {
            map.insert("host".to_string(), self.host.clone());
            let port = if self.port.is_empty() {
                "0".to_string()
            } else {
                self.port.clone()
            };
            map.insert("port".to_string(), port);
        }
        if !self.path.is_empty() {
            map.insert("path".to_string(), self.path.clone());
        }
        map
    }

    /// Merge `self` with `another`: the result is based on `self`, keys only
    /// `another` carries are added, and the override set (`loadbalance`,
    /// `cluster`, `retries`, `timeout` and every `methods.<m>.<k>` of those)
    /// is taken from `another` when it has a value. When `another` carries a
    /// timestamp it becomes the merged timestamp and `self`'s survives as
    /// `remote.timestamp`; otherwise `self`'s timestamp stays untouched.
    pub fn merge_url(&self, another: &Url) -> Url {
        let mut merged = self.clone();

        for (key, value) in another.params_map() {
            if merged.non_default_param(&key).is_none() && !value.is_empty() {
                merged.set_param(&key, &value);
            }
        }

        // remote.timestamp records self's timestamp only when another's
        // actually replaces it; without a replacement self's value stays.
        if let Some(another_ts) = another.non_default_param(TIMESTAMP_KEY) {
            if let Some(ts) = self.non_default_param(TIMESTAMP_KEY) {
                merged.set_param(REMOTE_TIMESTAMP_KEY, &ts);
            }
            merged.set_param(TIMESTAMP_KEY, &another_ts);
        }

        const OVERRIDE_KEYS: [&str; 4] = [LOADBALANCE_KEY, CLUSTER_KEY, RETRIES_KEY, TIMEOUT_KEY];
        for key in OVERRIDE_KEYS {
            if let Some(value) = another.non_default_param(key) {
                merged.set_param(key, &value);
            }
        }
        merged.methods = another.methods.clone();
        for method in &another.methods {
            for key in OVERRIDE_KEYS {
                let methods_key = method_key(method, key);
                if let Some(value) = another.non_default_param(&methods_key) {
                    merged.set_param(&methods_key, &value);
                }
            }
        }

        for (key, value) in another.attributes_map() {
            if !merged.has_attribute(&key) {
                merged.set_attribute(&key, value);
            }
        }

        merged
    }
}

impl Clone for Url {
    fn clone(&self) -> Self {
        Url {
            protocol: self.protocol.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            location: self.location.clone(),
            host: self.host.clone(),
            port: self.port.clone(),
            path: self.path.clone(),
            methods: self.methods.clone(),
            primitive_url: self.primitive_url.clone(),
            params: RwLock::new(self.params_map()),
            attributes: RwLock::new(self.attributes_map()),
            sub_url: self.sub_url.clone(),
        }
    }
}

impl Display for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.username.is_empty() && self.password.is_empty() {
            write!(f, "{}://{}{}", self.protocol, self.address(), self.path)?;
        } else {
            write!(
                f,
                "{}://{}:{}@{}{}",
                self.protocol,
                self.username,
                self.password,
                self.address(),
                self.path
            )?;
        }
        let params = self.params_map();
        if params.is_empty() {
            return Ok(());
        }
        let mut pairs: Vec<(String, String)> = params.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let encoded: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        write!(f, "?{}", encoded.join("&"))
    }
}

impl Debug for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Url({self})")
    }
}

impl FromStr for Url {
    type Err = UrlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s)
    }
}

/// `[group/]interface[:version]`, with version `0.0.0` treated as empty. An
/// empty interface yields an empty key.
pub fn service_key(interface: &str, group: &str, version: &str) -> String {
    if interface.is_empty() {
        return String::new();
    }
    let mut key = String::new();
    if !group.is_empty() {
        key.push_str(group);
        key.push('/');
    }
    key.push_str(interface);
    if !version.is_empty() && version != "0.0.0" {
        key.push(':');
        key.push_str(version);
    }
    key
}

/// Inverse of [`service_key`]: `(interface, group, version)`.
pub fn parse_service_key(service_key: &str) -> (String, String, String) {
    if service_key.is_empty() {
        return (String::new(), String::new(), String::new());
    }
    let mut rest = service_key;
    let mut group = "";
    if let Some(idx) = rest.find('/') {
        group = &rest[..idx];
        rest = &rest[idx + 1..];
    }
    let mut version = "";
    if let Some(idx) = rest.rfind(':') {
        version = &rest[idx + 1..];
        rest = &rest[..idx];
    }
    (rest.to_string(), group.to_string(), version.to_string())
}

pub fn match_key(service_key: &str, protocol: &str) -> String {
    format!("{service_key}:{protocol}")
}

fn method_key(method: &str, key: &str) -> String {
    format!("methods.{method}.{key}")
}

/// Compare two URLs for logical equality, ignoring the parameter keys named
/// in `excludes`. Host and port always take part in the comparison.
pub fn is_equals(left: &Url, right: &Url, excludes: &[&str]) -> bool {
    if left.host() != right.host() || left.port() != right.port() {
        return false;
    }
    let mut left_map = left.to_map();
    let mut right_map = right.to_map();
    for exclude in excludes {
        left_map.remove(*exclude);
        right_map.remove(*exclude);
    }
    left_map == right_map
}

fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) if idx > 0 => value.split_at(idx),
        _ => return None,
    };
    let number: u64 = number.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(number)),
        "s" => Some(Duration::from_secs(number)),
        "m" => Some(Duration::from_secs(number * 60)),
        "h" => Some(Duration::from_secs(number * 3600)),
        _ => None,
    }
}

/// Builder for a [`Url`] constructed piecewise instead of parsed.
#[derive(Default)]
pub struct UrlBuilder {
    protocol: String,
    username: String,
    password: String,
    location: String,
    host: String,
    port: String,
    path: String,
    methods: Vec<String>,
    params: HashMap<String, String>,
    attributes: HashMap<String, Attribute>,
}

impl UrlBuilder {
    pub fn new() -> Self {
        UrlBuilder::default()
    }

    pub fn protocol(mut self, protocol: &str) -> Self {
        self.protocol = protocol.to_string();
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: &str) -> Self {
        self.port = port.to_string();
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = format!("/{}", path.trim_start_matches('/'));
        self
    }

    pub fn methods(mut self, methods: Vec<String>) -> Self {
        self.methods = methods;
        self
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn params(mut self, params: HashMap<String, String>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn interface(self, interface: &str) -> Self {
        self.param(INTERFACE_KEY, interface)
    }

    /// Weight is only recorded when positive; callers resolve defaults.
    pub fn weight(self, weight: i64) -> Self {
        if weight > 0 {
            self.param(WEIGHT_KEY, &weight.to_string())
        } else {
            self
        }
    }

    pub fn attribute(mut self, key: &str, value: Attribute) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Url {
        let location = if self.location.is_empty() {
            format!("{}:{}", self.host, self.port)
        } else {
            self.location
        };
        Url {
            protocol: self.protocol,
            username: self.username,
            password: self.password,
            location,
            host: self.host,
            port: self.port,
            path: self.path,
            methods: self.methods,
            primitive_url: String::new(),
            params: RwLock::new(self.params),
            attributes: RwLock::new(self.attributes),
            sub_url: None,
        }
    }
}
