/// Shared error type used across every booking-agent crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    /// The stored session cookie has expired or was rejected by the
    /// upstream; the caller must re-authenticate (§4.1, §6.1).
    #[error("session expired for {user}")]
    AuthExpired { user: String },

    /// The login flow reached a state the session authenticator cannot
    /// recover from (e.g. a rejected credential pair).
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// Captcha confidence stayed below the configured threshold after
    /// exhausting `bad_captcha_retries` (§4.5).
    #[error("captcha could not be solved after {attempts} attempts")]
    BadCaptcha { attempts: u32 },

    /// The upstream responded with an unexpected HTTP status.
    #[error("upstream returned {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// The upstream call succeeded at the HTTP layer but its own
    /// response body reports a business failure (§4.4.1).
    #[error("business error {code}: {message}")]
    BusinessError { code: String, message: String },

    /// The upstream signalled that the caller is being rate limited
    /// (§4.8.1); callers should fail over to another credential.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// A transient failure worth retrying without operator attention
    /// (network blip, 5xx not recognized as a business error).
    #[error("transient: {0}")]
    Transient(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable category tag exposed to facade callers alongside `Display`,
    /// as the `{success: false, message, category}` triple (§10.3).
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "io",
            Error::Http(_) => "upstream",
            Error::Timeout(_) => "transient",
            Error::Config(_) => "config",
            Error::AuthExpired { .. } => "auth_expired",
            Error::LoginRejected(_) => "login_rejected",
            Error::BadCaptcha { .. } => "bad_captcha",
            Error::UpstreamError { .. } => "upstream",
            Error::BusinessError { .. } => "business",
            Error::RateLimited { .. } => "rate_limited",
            Error::Transient(_) => "transient",
            Error::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_distinguishes_auth_and_rate_limit_errors() {
        assert_eq!(Error::AuthExpired { user: "a".into() }.category(), "auth_expired");
        assert_eq!(Error::RateLimited { message: "500".into() }.category(), "rate_limited");
        assert_eq!(Error::Config("x".into()).category(), "config");
    }
}
