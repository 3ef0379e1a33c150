//! Client identifier extraction
//!
//! The limiter keys its entries by a client identifier. Most deployments use
//! the network address, optionally combined with the endpoint so that each
//! public route gets its own budget.

use std::net::IpAddr;
use std::str::FromStr;

/// Information about an incoming request used for key extraction
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Client IP address as seen on the socket
    pub ip: Option<IpAddr>,
    /// Request path (the endpoint)
    pub path: String,
    /// Request method (GET, POST, etc.)
    pub method: String,
    /// Request headers that might be useful for key extraction
    pub headers: Vec<(String, String)>,
}

impl RequestInfo {
    /// Create a new request info
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            ip: None,
            path: path.into(),
            method: method.into(),
            headers: Vec::new(),
        }
    }

    /// Set the socket IP address
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Get a header value by name (case-insensitive)
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Resolve the client address.
    ///
    /// Priority: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
    /// socket address.
    pub fn client_ip(&self) -> Option<IpAddr> {
        if let Some(forwarded) = self.get_header("x-forwarded-for") {
            return forwarded
                .split(',')
                .next()
                .and_then(|s| s.trim().parse::<IpAddr>().ok());
        }

        if let Some(real_ip) = self.get_header("x-real-ip") {
            return real_ip.trim().parse::<IpAddr>().ok();
        }

        self.ip
    }
}

/// Key extraction strategies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyExtractor {
    /// Extract key from the client address
    #[default]
    Ip,
    /// Combine client address and path for per-endpoint limiting
    IpAndPath,
    /// Extract key from an API key header
    ApiKey {
        /// Header name for API key
        header_name: String,
    },
    /// Extract key from a custom header
    Header {
        /// Header name to extract
        name: String,
    },
}

impl KeyExtractor {
    /// Create an API key-based extractor
    pub fn api_key(header_name: impl Into<String>) -> Self {
        Self::ApiKey {
            header_name: header_name.into(),
        }
    }

    /// Create a header-based extractor
    pub fn header(name: impl Into<String>) -> Self {
        Self::Header { name: name.into() }
    }

    /// Extract the key from request info
    pub fn extract(&self, info: &RequestInfo) -> Option<String> {
        match self {
            Self::Ip => info.client_ip().map(|ip| ip.to_string()),
            Self::IpAndPath => info
                .client_ip()
                .map(|ip| format!("{}:{}", ip, info.path)),
            Self::ApiKey { header_name } => info.get_header(header_name).map(|s| s.to_string()),
            Self::Header { name } => info.get_header(name).map(|s| s.to_string()),
        }
    }

    /// Get a description of this extractor
    pub fn description(&self) -> &str {
        match self {
            Self::Ip => "IP address",
            Self::IpAndPath => "IP + Path",
            Self::ApiKey { .. } => "API key",
            Self::Header { .. } => "Custom header",
        }
    }
}

impl FromStr for KeyExtractor {
    type Err = String;

    /// Parse `ip`, `ip_and_path`, `api_key:<header>` or `header:<name>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some(("api_key", header)) if !header.is_empty() => Ok(Self::api_key(header)),
            Some(("header", name)) if !name.is_empty() => Ok(Self::header(name)),
            None => match s.trim().to_ascii_lowercase().as_str() {
                "ip" => Ok(Self::Ip),
                "ip_and_path" | "ip+path" => Ok(Self::IpAndPath),
                other => Err(format!("unknown key extractor '{}'", other)),
            },
            _ => Err(format!("unknown key extractor '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_request() -> RequestInfo {
        RequestInfo::new("/v1/sessions", "POST")
            .with_ip(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5)))
            .with_header("X-API-Key", "pk_live_abc123")
            .with_header("X-Tenant-ID", "tenant_456")
    }

    #[test]
    fn test_ip_extractor() {
        let key = KeyExtractor::Ip.extract(&sample_request()).unwrap();
        assert_eq!(key, "203.0.113.5");
    }

    #[test]
    fn test_ip_and_path_extractor() {
        let key = KeyExtractor::IpAndPath.extract(&sample_request()).unwrap();
        assert_eq!(key, "203.0.113.5:/v1/sessions");
    }

    #[test]
    fn test_api_key_extractor() {
        let key = KeyExtractor::api_key("x-api-key")
            .extract(&sample_request())
            .unwrap();
        assert_eq!(key, "pk_live_abc123");
    }

    #[test]
    fn test_header_extractor() {
        let key = KeyExtractor::header("X-Tenant-ID")
            .extract(&sample_request())
            .unwrap();
        assert_eq!(key, "tenant_456");
    }

    #[test]
    fn test_forwarded_for_wins() {
        let request = sample_request().with_header("X-Forwarded-For", "198.51.100.7, 10.0.0.1");
        assert_eq!(
            request.client_ip(),
            Some(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7)))
        );
    }

    #[test]
    fn test_real_ip_header() {
        let request = RequestInfo::new("/", "GET").with_header("X-Real-IP", "192.0.2.44");
        assert_eq!(
            request.client_ip(),
            Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 44)))
        );
    }

    #[test]
    fn test_missing_ip() {
        let request = RequestInfo::new("/", "GET");
        assert!(KeyExtractor::Ip.extract(&request).is_none());
    }

    #[test]
    fn test_parse_extractor() {
        assert_eq!("ip".parse::<KeyExtractor>().unwrap(), KeyExtractor::Ip);
        assert_eq!(
            "ip_and_path".parse::<KeyExtractor>().unwrap(),
            KeyExtractor::IpAndPath
        );
        assert_eq!(
            "api_key:X-API-Key".parse::<KeyExtractor>().unwrap(),
            KeyExtractor::api_key("X-API-Key")
        );
        assert!("cookie".parse::<KeyExtractor>().is_err());
        assert!("header:".parse::<KeyExtractor>().is_err());
    }
}
