//! Pre-flight URL checks. Nothing that fails here ever reaches the wire.

use super::url;
use crate::network::error::{Error, ErrorKind, Result};

const ALLOWED_PUNCTUATION: &[u8] = b".-_~:/?#[]@!$&'()*+,;=";

fn check_authority(target: &str, kind: ErrorKind, what: &str) -> Result<()> {
    let scheme = url::extract_scheme(target);
    if !(scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")) {
        return Err(Error::new(
            kind,
            format!("{what} scheme must be http or https"),
        ));
    }
    if url::extract_host(target).is_empty() {
        return Err(Error::new(kind, format!("{what} has no host")));
    }
    if url::extract_port(target).is_none() {
        return Err(Error::new(
            kind,
            format!("{what} port must be a number between 0 and 65535"),
        ));
    }
    Ok(())
}

/// Validate a request URL: non-empty, `http`/`https` scheme, a host, a port
/// in range and only permitted characters. The first failing check wins.
pub fn validate_url(target: &str) -> Result<()> {
    if target.is_empty() {
        return Err(Error::new(ErrorKind::InvalidUrl, "URL is empty"));
    }
    check_authority(target, ErrorKind::InvalidUrl, "URL")?;
    if let Some(bad) = target
        .bytes()
        .find(|b| !(b.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(b)))
    {
        return Err(Error::new(
            ErrorKind::InvalidUrl,
            format!("URL contains invalid character 0x{bad:02x}"),
        ));
    }
    Ok(())
}

/// Validate a proxy URL. An empty string means no proxy and is accepted.
pub fn validate_proxy_url(proxy: &str) -> Result<()> {
    if proxy.is_empty() {
        return Ok(());
    }
    check_authority(proxy, ErrorKind::InvalidProxyUrl, "proxy URL")
}
