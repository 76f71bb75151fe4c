//! Client address extraction for rate limiting.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

use crate::cli::IpExtractor;

/// Address identifying the caller.
///
/// With an `ip_extractor` the address comes from that proxy header only, and
/// a missing or invalid header is an error (no fallback to the socket, which
/// would be the proxy itself). Without one, the socket address from
/// `ConnectInfo` is used and forwarding headers are ignored.
pub fn client_key(
    request: &Request,
    ip_extractor: Option<IpExtractor>,
) -> Result<String, &'static str> {
    match ip_extractor {
        Some(extractor) => {
            let value = request
                .headers()
                .get(extractor.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            extractor.extract(value)
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}
