//! Route keys and targets.

use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;

/// `host + path`, matched as an exact string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey(String);

impl RouteKey {
    /// Key contributed by a rule: host and path concatenated verbatim.
    pub fn from_rule(host: &str, path: &str) -> Self {
        Self(format!("{}{}", host, path))
    }

    /// Key looked up for an inbound request.
    ///
    /// The port is dropped from `host` and exactly one `/` separates host
    /// from path, so `example.com:8080` + `/app` yields `example.com/app`.
    pub fn from_request(host: &str, path: &str) -> Self {
        Self(join_host_path(strip_port(host), path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Backend authority (`service.namespace:port`) used as the proxy host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteTarget(String);

impl RouteTarget {
    pub fn new(authority: impl Into<String>) -> Self {
        Self(authority.into())
    }

    pub fn for_service(service_name: &str, namespace: &str, port: u16) -> Self {
        Self(format!("{}.{}:{}", service_name, namespace, port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteTarget {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Remove a trailing `:port` from a Host value. Bracketed IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.split_once(':') {
        Some((name, _)) => name,
        None => host,
    }
}

/// Percent-decoded request path. A path that does not decode to UTF-8 is used as sent.
pub fn decode_path(raw: &str) -> Cow<'_, str> {
    percent_decode_str(raw).decode_utf8().unwrap_or(Cow::Borrowed(raw))
}

/// `host/path` with a single separating slash.
pub fn join_host_path(host: &str, path: &str) -> String {
    format!("{}/{}", host, path.strip_prefix('/').unwrap_or(path))
}
