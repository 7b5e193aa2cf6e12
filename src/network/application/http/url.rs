//! URL decomposition helpers.
//!
//! These operate on absolute `scheme://[user:pass@]host[:port][/path]`
//! strings without allocating, which is all the engine needs to pick a
//! connection target and build a request line.

use std::borrow::Cow;

/// Port used for `http` URLs without an explicit port.
pub const HTTP_DEFAULT_PORT: u16 = 80;
/// Port used for `https` URLs without an explicit port.
pub const HTTPS_DEFAULT_PORT: u16 = 443;

fn authority_start(url: &str) -> usize {
    url.find("://").map_or(0, |pos| pos + 3)
}

/// The `[user:pass@]host[:port]` part of `url`.
fn authority(url: &str) -> &str {
    let rest = &url[authority_start(url)..];
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

/// The `host[:port]` part of the authority, without credentials.
fn host_port(url: &str) -> &str {
    let authority = authority(url);
    match authority.rfind('@') {
        Some(at) => &authority[at + 1..],
        None => authority,
    }
}

/// Splits `host[:port]` into the host and the raw port text, if any.
fn split_host_port(host_port: &str) -> (&str, Option<&str>) {
    if let Some(bracketed) = host_port.strip_prefix('[') {
        return match bracketed.find(']') {
            Some(end) => {
                let port = bracketed[end + 1..].strip_prefix(':');
                (&bracketed[..end], port)
            }
            None => (bracketed, None),
        };
    }
    match host_port.find(':') {
        Some(colon) => (&host_port[..colon], Some(&host_port[colon + 1..])),
        None => (host_port, None),
    }
}

/// The scheme of `url`, or `""` when it has none.
pub fn extract_scheme(url: &str) -> &str {
    url.find("://").map_or("", |pos| &url[..pos])
}

/// Whether `url` uses the `https` scheme.
pub fn is_https(url: &str) -> bool {
    extract_scheme(url).eq_ignore_ascii_case("https")
}

/// Default port for a scheme.
pub fn default_port(scheme: &str) -> u16 {
    if scheme.eq_ignore_ascii_case("https") {
        HTTPS_DEFAULT_PORT
    } else {
        HTTP_DEFAULT_PORT
    }
}

/// The host of `url`, with any `user:pass@` credentials skipped.
pub fn extract_host(url: &str) -> &str {
    split_host_port(host_port(url)).0
}

/// The port of `url`.
///
/// An explicit port always wins; otherwise the scheme default is used.
/// Returns `None` when an explicit port is not a number in `0..=65535`.
pub fn extract_port(url: &str) -> Option<u16> {
    match split_host_port(host_port(url)).1 {
        Some(port) if !port.is_empty() => {
            if !port.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            port.parse::<u16>().ok()
        }
        _ => Some(default_port(extract_scheme(url))),
    }
}

/// Whether `url` names a port explicitly.
pub fn has_explicit_port(url: &str) -> bool {
    matches!(split_host_port(host_port(url)).1, Some(port) if !port.is_empty())
}

/// The `user:pass` credentials embedded in the authority, if any.
pub fn extract_userinfo(url: &str) -> Option<(&str, &str)> {
    let authority = authority(url);
    let at = authority.rfind('@')?;
    let userinfo = &authority[..at];
    Some(match userinfo.find(':') {
        Some(colon) => (&userinfo[..colon], &userinfo[colon + 1..]),
        None => (userinfo, ""),
    })
}

/// The request target of `url`: path plus query, always starting with `/`.
///
/// Fragments are never sent on the wire and are dropped here.
pub fn extract_path(url: &str) -> Cow<'_, str> {
    let start = authority_start(url) + authority(url).len();
    let rest = &url[start..];
    let rest = match rest.find('#') {
        Some(hash) => &rest[..hash],
        None => rest,
    };
    if rest.starts_with('/') {
        Cow::Borrowed(rest)
    } else {
        Cow::Owned(format!("/{rest}"))
    }
}

/// `scheme://authority` of `url`, excluding the first path level `/`.
pub fn extract_base_url(url: &str) -> &str {
    let end = authority_start(url) + authority(url).len();
    &url[..end]
}

/// Value for the `Host` header: the host, plus the port when it is explicit
/// and differs from the scheme default.
pub fn host_header(url: &str) -> Cow<'_, str> {
    let host = extract_host(url);
    let scheme = extract_scheme(url);
    match extract_port(url) {
        Some(port) if has_explicit_port(url) && port != default_port(scheme) => {
            if host.contains(':') {
                Cow::Owned(format!("[{host}]:{port}"))
            } else {
                Cow::Owned(format!("{host}:{port}"))
            }
        }
        _ => Cow::Borrowed(host),
    }
}

/// Resolve a `Location` header value against the URL that produced it.
pub fn resolve_location(current: &str, location: &str) -> String {
    if location.contains("://") {
        return location.to_string();
    }
    if let Some(rest) = location.strip_prefix("//") {
        return format!("{}://{rest}", extract_scheme(current));
    }
    let base = extract_base_url(current);
    if location.starts_with('/') {
        return format!("{base}{location}");
    }
    let path = extract_path(current);
    let path = path.split(['?']).next().unwrap_or("/");
    if location.starts_with('?') {
        return format!("{base}{path}{location}");
    }
    let directory = match path.rfind('/') {
        Some(slash) => &path[..=slash],
        None => "/",
    };
    format!("{base}{directory}{location}")
}
