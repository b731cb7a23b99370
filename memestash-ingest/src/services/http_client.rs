//! Shared outbound HTTP client
//!
//! One `reqwest::Client` serves the Discord API, remote downloads and the
//! vision endpoint. Timeouts are applied per request since each caller
//! has its own limit.

use std::time::Duration;

const USER_AGENT: &str = concat!("memestash/", env!("CARGO_PKG_VERSION"));

/// Connect timeout applied to every outbound connection
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Build the shared client, routing all traffic through `proxy_url` when set
pub fn build_http_client(proxy_url: Option<&str>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));

    if let Some(url) = proxy_url.map(str::trim).filter(|u| !u.is_empty()) {
        tracing::info!(proxy = %url, "Routing outbound requests through proxy");
        builder = builder.proxy(reqwest::Proxy::all(url)?);
    }

    builder.build()
}
