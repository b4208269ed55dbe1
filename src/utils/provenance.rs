use axum::http::HeaderMap;
use sqlx::types::ipnetwork::IpNetwork;
use std::net::IpAddr;

/// Informational request metadata recorded on submissions and audit rows.
/// Non-authoritative: never used for authorization decisions.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    pub ip: Option<IpNetwork>,
    pub user_agent: Option<String>,
}

impl Provenance {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(first_forwarded_ip)
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<IpAddr>().ok())
            })
            .map(IpNetwork::from);

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.chars().take(200).collect());

        Self { ip, user_agent }
    }
}

fn first_forwarded_ip(value: &str) -> Option<IpAddr> {
    value.split(',').next()?.trim().parse().ok()
}
