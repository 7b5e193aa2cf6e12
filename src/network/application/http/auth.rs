//! `Authorization` header injection.

use super::options::{AuthType, ClientOptions};
use super::request::Request;
use base64ct::{Base64, Encoding as B64Encoding};

/// Static credentials applied to every request, redirect hops included.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Auth {
    header: Option<String>,
}

impl core::fmt::Debug for Auth {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Auth")
            .field("enabled", &self.header.is_some())
            .finish()
    }
}

impl Auth {
    /// Precompute the header value for `options`.
    pub fn new(options: &ClientOptions) -> Self {
        let header = match options.auth_type {
            AuthType::None => None,
            AuthType::Basic => Some(format!(
                "Basic {}",
                basic_credentials(&options.username, &options.password)
            )),
            AuthType::Bearer => Some(format!("Bearer {}", options.bearer_token)),
        };
        Self { header }
    }

    /// Whether an `Authorization` header will be added.
    pub fn is_enabled(&self) -> bool {
        self.header.is_some()
    }

    /// Set `Authorization` on `request`, replacing any caller supplied value.
    pub fn apply(&self, request: &mut Request) {
        if let Some(header) = &self.header {
            request.headers.set("Authorization", header.as_str());
        }
    }
}

/// `base64(user:password)`
pub fn basic_credentials(user: &str, password: &str) -> String {
    Base64::encode_string(format!("{user}:{password}").as_bytes())
}
