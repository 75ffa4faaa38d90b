use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Client metadata captured at the boundary and stored on sessions and
/// password-reset tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub ip: String,
    pub user_agent: String,
    pub os: String,
}

impl ClientMetadata {
    /// Placeholder metadata for callers without a transport context.
    pub fn unknown() -> Self {
        Self {
            ip: "unknown".to_string(),
            user_agent: String::new(),
            os: "Unknown OS".to_string(),
        }
    }
}

/// Extract client metadata from request headers.
///
/// Pure function called by the boundary before invoking the core; the core
/// never inspects raw request objects. `fallback_ip` is the socket peer
/// address, used when no `x-forwarded-for` hop is present.
pub fn parse_client_metadata(headers: &HeaderMap, fallback_ip: &str) -> ClientMetadata {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback_ip.to_string());

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let os = sniff_os(&user_agent).to_string();

    ClientMetadata { ip, user_agent, os }
}

fn sniff_os(user_agent: &str) -> &'static str {
    let ua = user_agent.to_lowercase();
    if ua.contains("windows nt 10") {
        "Windows 10"
    } else if ua.contains("windows nt 11") {
        "Windows 11"
    } else if ua.contains("windows nt 6.3") {
        "Windows 8.1"
    } else if ua.contains("windows nt 6.2") {
        "Windows 8"
    } else if ua.contains("windows nt 6.1") {
        "Windows 7"
    } else if ua.contains("macintosh") || ua.contains("mac os x") {
        "macOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        "iOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown OS"
    }
}
