//! Error taxonomy for the relay core
//!
//! Everything the cache, fetcher, and chat proxy can fail with is a
//! `ProxyError`; the HTTP layer decides how much of it a client sees.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Network failure or non-200 from the nonce page. Transient; the
    /// fetcher retries these internally.
    #[error("origin unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The page came back 200 but the nonce pattern was not in the body.
    /// Also treated as transient (mid-deploy or a cached partial page).
    #[error("no nonce found in origin page body")]
    TokenNotFound,

    /// Retries exhausted; wraps the last error observed.
    #[error("nonce fetch failed after {attempts} attempt(s): {last_error}")]
    NonceFetchExhausted { attempts: u32, last_error: String },

    /// The chat endpoint answered non-200 with a token attached. Not
    /// retried here: a rejection is not assumed to be token-related.
    #[error("chat endpoint rejected request with status {status}")]
    UpstreamRejected { status: u16 },

    /// 200 from the chat endpoint but the body was not JSON.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl ProxyError {
    /// True for failures the nonce fetcher should retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamUnavailable(_) | ProxyError::TokenNotFound
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProxyError::UpstreamUnavailable("timeout".into()).is_transient());
        assert!(ProxyError::TokenNotFound.is_transient());
        assert!(!ProxyError::UpstreamRejected { status: 403 }.is_transient());
        assert!(!ProxyError::NonceFetchExhausted {
            attempts: 3,
            last_error: "x".into()
        }
        .is_transient());
    }

    #[test]
    fn display_does_not_leak_tokens() {
        // Error strings carry status and cause, never a nonce value.
        let e = ProxyError::UpstreamRejected { status: 403 };
        assert_eq!(
            e.to_string(),
            "chat endpoint rejected request with status 403"
        );
    }
}
