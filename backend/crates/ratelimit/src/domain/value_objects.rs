//! Value Objects

use super::entities::PolicyClass;
use kernel::id::UserId;
use platform::client::client_ip_label;
use std::fmt;
use std::net::IpAddr;

/// Verified subject placed in request extensions by the upstream
/// authentication step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub UserId);

/// Who is being counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    User(String),
    /// Caller IP, or `unknown`
    Ip(String),
}

impl Subject {
    pub fn resolve(user: Option<&AuthenticatedSubject>, ip: Option<IpAddr>) -> Self {
        match user {
            Some(AuthenticatedSubject(id)) => Subject::User(id.to_string()),
            None => Subject::Ip(client_ip_label(ip)),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Subject::User(id) => Some(id),
            Subject::Ip(_) => None,
        }
    }
}

/// Counter key: `rate_limit:{class}:user:{id}` or `rate_limit:{class}:ip:{ip}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub const PREFIX: &'static str = "rate_limit";

    pub fn new(class: PolicyClass, subject: &Subject) -> Self {
        let key = match subject {
            Subject::User(id) => format!("{}:{}:user:{}", Self::PREFIX, class.as_str(), id),
            Subject::Ip(ip) => format!("{}:{}:ip:{}", Self::PREFIX, class.as_str(), ip),
        };
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
