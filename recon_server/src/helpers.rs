use std::{net::IpAddr, str::FromStr, sync::OnceLock};

use actix_web::HttpRequest;
use log::{debug, trace, warn};
use regex::Regex;

use crate::config::ServerOptions;

fn forwarded_for_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"for="?(?P<ip>[^;,"]+)"?"#)
                .map_err(|e| warn!("💻️ Could not compile the Forwarded header pattern. {e}"))
                .ok()
        })
        .as_ref()
}

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The first address in the `X-Forwarded-For` header, iif `use_x_forwarded_for` is set in the options.
/// 2. The `for=` field of the `Forwarded` header, iif `use_forwarded` is set in the options.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, options: ServerOptions) -> Option<IpAddr> {
    let mut result = None;
    if options.use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if options.use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| forwarded_for_pattern().and_then(|re| re.captures(v)))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

/// A short description of where a callback came from, for the logs.
pub fn describe_caller(req: &HttpRequest, options: ServerOptions) -> String {
    get_remote_ip(req, options).map(|ip| ip.to_string()).unwrap_or_else(|| "an unknown address".to_string())
}
