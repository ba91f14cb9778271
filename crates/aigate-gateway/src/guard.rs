//! SSRF gate and the guarded image fetcher.
//!
//! Every remote fetch made on behalf of a caller goes through [`validate`],
//! including each redirect hop. The gate:
//!
//! - allows only `http` and `https`
//! - rejects `localhost`, `*.localhost`, and known cloud metadata hosts
//! - rejects IP literals in loopback, private, link-local, shared, multicast,
//!   documentation, broadcast, unspecified, and reserved ranges (IPv4, IPv6,
//!   and IPv4-mapped IPv6)
//! - fails closed on anything it cannot parse
//!
//! Symbolic hostnames are accepted without DNS resolution. A hostname that
//! resolves to an internal address (DNS rebinding) is not caught here.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use tracing::{debug, warn};
use url::{Host, Url};

use aigate_core::error::GatewayError;
use aigate_core::types::Attachment;

/// Hostnames of cloud metadata services.
pub const METADATA_HOSTS: &[&str] = &[
    "169.254.169.254",
    "metadata.google.internal",
    "metadata.goog",
    "metadata",
    "instance-data",
    "instance-data.ec2.internal",
    "metadata.azure.internal",
    "100.100.100.200",
];

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 3;

// ─────────────────────────────────────────────
// Gate
// ─────────────────────────────────────────────

/// Whether `url` may be fetched.
pub fn is_safe(url: &str) -> bool {
    validate(url).is_ok()
}

/// Parse and gate `url`.
pub fn validate(url: &str) -> Result<Url, GatewayError> {
    let reject = |reason: &str| {
        warn!(url = %url, reason, "unsafe resource rejected");
        GatewayError::UnsafeResource(format!("{url}: {reason}"))
    };

    let parsed = Url::parse(url.trim()).map_err(|_| reject("unparseable URL"))?;

    match parsed.scheme() {
        "http" | "https" => {}
        _ => return Err(reject("scheme not allowed")),
    }

    match parsed.host() {
        None => return Err(reject("missing host")),
        Some(Host::Ipv4(ip)) => {
            if is_blocked_ip(&IpAddr::V4(ip)) {
                return Err(reject("internal address"));
            }
        }
        Some(Host::Ipv6(ip)) => {
            if is_blocked_ip(&IpAddr::V6(ip)) {
                return Err(reject("internal address"));
            }
        }
        Some(Host::Domain(domain)) => {
            let host = domain.trim_end_matches('.').to_lowercase();
            if host.is_empty()
                || host == "localhost"
                || host.ends_with(".localhost")
                || METADATA_HOSTS.contains(&host.as_str())
            {
                return Err(reject("internal host"));
            }
            // Hosts the URL parser left as names but that read as addresses.
            if let Ok(ip) = host.parse::<IpAddr>() {
                if is_blocked_ip(&ip) {
                    return Err(reject("internal address"));
                }
            }
        }
    }

    Ok(parsed)
}

/// Whether an IP address is internal or otherwise not publicly routable.
pub fn is_blocked_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    }
}

fn is_blocked_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_unspecified()
        || ip.is_multicast()
        // 0.0.0.0/8 "this network"
        || a == 0
        // 100.64.0.0/10 shared address space (CGNAT)
        || (a == 100 && (b & 0xc0) == 64)
        // 192.0.0.0/24 IETF protocol assignments
        || (a == 192 && b == 0 && ip.octets()[2] == 0)
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_blocked_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_blocked_v4(&v4);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (first & 0xffc0) == 0xfe80
        // 2001:db8::/32 documentation
        || (first == 0x2001 && ip.segments()[1] == 0x0db8)
        // ::/96 IPv4-compatible (deprecated)
        || ip.segments()[..6].iter().all(|s| *s == 0)
}

// ─────────────────────────────────────────────
// ResourceFetcher
// ─────────────────────────────────────────────

type Gate = fn(&str) -> Result<Url, GatewayError>;

/// Fetches caller-supplied image URLs through the gate.
///
/// Redirects are followed by hand so every hop is re-validated. Only
/// `image/*` responses up to `max_bytes` are accepted.
pub struct ResourceFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    gate: Gate,
}

impl ResourceFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(ResourceFetcher {
            client,
            max_bytes,
            gate: validate,
        })
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Fetch an image. Gate rejections surface as `UnsafeResource`, anything
    /// else as `FetchFailed`.
    pub async fn fetch(&self, url: &str) -> Result<Attachment, GatewayError> {
        let mut current = (self.gate)(url)?;

        for hop in 0..=MAX_REDIRECTS {
            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| fetch_failed(&current, e.to_string()))?;

            let status = response.status();
            if status.is_redirection() {
                if hop == MAX_REDIRECTS {
                    break;
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| fetch_failed(&current, "redirect without location"))?;
                let next = current
                    .join(location)
                    .map_err(|_| GatewayError::UnsafeResource(location.to_string()))?;
                current = (self.gate)(next.as_str())?;
                debug!(hop = hop + 1, url = %current, "following redirect");
                continue;
            }

            if !status.is_success() {
                return Err(fetch_failed(&current, format!("status {status}")));
            }

            let declared = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let Some(mime_type) = image_mime(declared) else {
                let shown = if declared.is_empty() {
                    "no content type"
                } else {
                    declared
                };
                return Err(fetch_failed(&current, format!("not an image ({shown})")));
            };

            if response
                .content_length()
                .is_some_and(|len| len > self.max_bytes as u64)
            {
                return Err(fetch_failed(&current, "image too large"));
            }

            let data = self.read_capped(response, &current).await?;
            debug!(url = %current, bytes = data.len(), mime = %mime_type, "image fetched");
            return Ok(Attachment::new(data, mime_type));
        }

        Err(fetch_failed(&current, "too many redirects"))
    }

    async fn read_capped(
        &self,
        mut response: reqwest::Response,
        url: &Url,
    ) -> Result<Vec<u8>, GatewayError> {
        let mut data = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_failed(url, e.to_string()))?
        {
            if data.len() + chunk.len() > self.max_bytes {
                return Err(fetch_failed(url, "image too large"));
            }
            data.extend_from_slice(&chunk);
        }
        if data.is_empty() {
            return Err(fetch_failed(url, "empty body"));
        }
        Ok(data)
    }
}

/// Normalized `image/*` MIME type, or `None` for anything else.
///
/// Parameters are dropped: `Image/PNG; q=1` becomes `image/png`.
pub(crate) fn image_mime(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = essence.strip_prefix("image/")?;
    (!subtype.is_empty()).then_some(essence)
}

fn fetch_failed(url: &Url, reason: impl Into<String>) -> GatewayError {
    let reason = reason.into();
    warn!(url = %url, reason = %reason, "image fetch failed");
    GatewayError::FetchFailed(format!("{url}: {reason}"))
}
