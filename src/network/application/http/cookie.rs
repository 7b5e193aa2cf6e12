//! Cookies and the domain-keyed cookie jar.

use super::url;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, warn};

const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Current wall clock time in epoch seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A cookie received through `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie belongs to, lowercase and without a leading dot.
    pub domain: String,
    /// Path prefix the cookie applies to.
    pub path: String,
    /// Only send over `https`.
    pub secure: bool,
    /// Not exposed to scripts. Recorded only.
    pub http_only: bool,
    /// Expiry in epoch seconds; 0 for a session cookie that never expires.
    pub expires: i64,
}

impl Cookie {
    /// Parse a `Set-Cookie` value received from `request_url`.
    ///
    /// Attribute names are matched as written (`Domain`, `Path`, `Secure`,
    /// `HttpOnly`, `Expires`, `Max-Age`). `Max-Age` wins over `Expires`.
    /// Returns `None` when the value has no `name=value` pair.
    pub fn parse(request_url: &str, header: &str, now: i64) -> Option<Cookie> {
        let mut tokens = header.split(';');
        let (name, value) = tokens.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().to_string(),
            domain: url::extract_host(request_url).to_ascii_lowercase(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
            expires: 0,
        };
        let mut max_age = None;

        for token in tokens.map(str::trim) {
            if let Some(domain) = token.strip_prefix("Domain=") {
                let domain = domain.trim().trim_start_matches('.');
                if !domain.is_empty() {
                    cookie.domain = domain.to_ascii_lowercase();
                }
            } else if let Some(path) = token.strip_prefix("Path=") {
                if path.starts_with('/') {
                    cookie.path = path.to_string();
                }
            } else if token == "Secure" {
                cookie.secure = true;
            } else if token == "HttpOnly" {
                cookie.http_only = true;
            } else if let Some(expires) = token.strip_prefix("Expires=") {
                match parse_expires(expires) {
                    Some(at) => cookie.expires = at,
                    None => warn!(cookie = %name, "ignoring unparseable cookie expiry"),
                }
            } else if let Some(age) = token.strip_prefix("Max-Age=") {
                match age.trim().parse::<i64>() {
                    Ok(age) => max_age = Some(age),
                    Err(_) => warn!(cookie = %name, "ignoring unparseable cookie max-age"),
                }
            }
        }

        if let Some(age) = max_age {
            // Epoch second 1 is always in the past, and distinct from 0.
            cookie.expires = if age <= 0 { 1 } else { now.saturating_add(age) };
        }
        Some(cookie)
    }

    /// Whether the cookie has expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires != 0 && self.expires < now
    }

    /// Whether the cookie should be sent with a request to `target`.
    pub fn matches(&self, target: &str, now: i64) -> bool {
        if self.is_expired(now) || (self.secure && !url::is_https(target)) {
            return false;
        }
        domain_matches(&url::extract_host(target).to_ascii_lowercase(), &self.domain)
            && path_matches(&url::extract_path(target), &self.path)
    }

    /// `name=value` as sent in a `Cookie` header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

fn parse_expires(value: &str) -> Option<i64> {
    let value = value.trim();
    let value = value
        .strip_suffix("GMT")
        .or_else(|| value.strip_suffix("UTC"))
        .unwrap_or(value)
        .trim_end();
    NaiveDateTime::parse_from_str(value, EXPIRES_FORMAT)
        .ok()
        .map(|at| at.and_utc().timestamp())
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    let request_path = request_path.split('?').next().unwrap_or("/");
    match request_path.strip_prefix(cookie_path) {
        Some(rest) => cookie_path.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Cookies keyed by domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, Vec<Cookie>>,
}

impl CookieJar {
    /// An empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and store a `Set-Cookie` value received from `request_url`.
    pub fn set_cookie(&mut self, request_url: &str, header: &str) -> Option<Cookie> {
        self.set_cookie_at(request_url, header, now())
    }

    /// [`CookieJar::set_cookie`] with an explicit clock. An already expired
    /// cookie removes its stored counterpart and is not returned.
    pub fn set_cookie_at(&mut self, request_url: &str, header: &str, now: i64) -> Option<Cookie> {
        let cookie = Cookie::parse(request_url, header, now)?;
        let host = url::extract_host(request_url).to_ascii_lowercase();
        if !domain_matches(&host, &cookie.domain) {
            warn!(
                cookie = %cookie.name,
                domain = %cookie.domain,
                host = %host,
                "rejecting cookie for foreign domain"
            );
            return None;
        }
        let expired = cookie.is_expired(now);
        self.insert(cookie.clone(), now);
        (!expired).then_some(cookie)
    }

    /// Store `cookie`, replacing one with the same name and path, then drop
    /// everything that expired.
    pub fn insert(&mut self, cookie: Cookie, now: i64) {
        debug!(cookie = %cookie.name, domain = %cookie.domain, path = %cookie.path, "cookie stored");
        let entries = self.cookies.entry(cookie.domain.clone()).or_default();
        match entries
            .iter_mut()
            .find(|c| c.name == cookie.name && c.path == cookie.path)
        {
            Some(existing) => *existing = cookie,
            None => entries.push(cookie),
        }
        self.purge_expired(now);
    }

    /// Drop expired cookies from every domain.
    pub fn purge_expired(&mut self, now: i64) {
        for entries in self.cookies.values_mut() {
            entries.retain(|c| !c.is_expired(now));
        }
        self.cookies.retain(|_, entries| !entries.is_empty());
    }

    /// `name=value` pairs to send with a request to `target`.
    pub fn cookies_for_url(&self, target: &str) -> Vec<String> {
        self.cookies_for_url_at(target, now())
    }

    /// [`CookieJar::cookies_for_url`] with an explicit clock.
    pub fn cookies_for_url_at(&self, target: &str, now: i64) -> Vec<String> {
        self.cookies
            .values()
            .flatten()
            .filter(|c| c.matches(target, now))
            .map(Cookie::pair)
            .collect()
    }

    /// `Cookie` header value for `target`, if any cookie applies.
    pub fn cookie_header(&self, target: &str) -> Option<String> {
        let pairs = self.cookies_for_url(target);
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// All cookies stored for `domain`.
    pub fn domain(&self, domain: &str) -> &[Cookie] {
        self.cookies.get(domain).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of stored cookies.
    pub fn len(&self) -> usize {
        self.cookies.values().map(Vec::len).sum()
    }

    /// Whether the jar is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Forget every cookie.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }
}
