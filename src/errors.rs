//! # Error Types Module
//!
//! This module defines the error types used by the dialog core and by the
//! boundary to the external collaborators (chat transport, completion service,
//! payment provider).

/// Errors raised while decoding a choice token (button payload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token is shorter than any known prefix
    Malformed(String),
    /// Token prefix does not name a question category
    UnknownPrefix(String),
    /// Prefix is known but the value is not one of its choices
    UnknownValue { prefix: String, value: String },
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed(token) => write!(f, "Malformed token: {token:?}"),
            TokenError::UnknownPrefix(token) => write!(f, "Unknown token prefix: {token:?}"),
            TokenError::UnknownValue { prefix, value } => {
                write!(f, "Unknown value {value:?} for prefix {prefix:?}")
            }
        }
    }
}

impl std::error::Error for TokenError {}

/// Errors surfaced by the dialog orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// Button payload could not be translated
    UnknownToken(TokenError),
    /// Payment provider reported the payment as not completed
    PaymentNotConfirmed(String),
    /// Payment confirmation did not carry a usable identity
    InvalidIdentity(String),
}

impl std::fmt::Display for DialogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialogError::UnknownToken(err) => write!(f, "Unknown token: {err}"),
            DialogError::PaymentNotConfirmed(reference) => {
                write!(f, "Payment not confirmed: {reference}")
            }
            DialogError::InvalidIdentity(raw) => write!(f, "Invalid identity: {raw:?}"),
        }
    }
}

impl std::error::Error for DialogError {}

impl From<TokenError> for DialogError {
    fn from(err: TokenError) -> Self {
        DialogError::UnknownToken(err)
    }
}

/// Failures reported by external collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamError {
    /// Completion service rejected the request because of rate limits
    RateLimited,
    /// Completion service could not answer
    Unavailable(String),
    /// Chat transport failed to deliver or edit a message
    Delivery(String),
    /// Payment provider failed to create or verify a payment
    PaymentProvider(String),
}

impl DownstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DownstreamError::RateLimited)
    }
}

impl std::fmt::Display for DownstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownstreamError::RateLimited => write!(f, "Rate limited by completion service"),
            DownstreamError::Unavailable(msg) => write!(f, "Completion service unavailable: {msg}"),
            DownstreamError::Delivery(msg) => write!(f, "Delivery error: {msg}"),
            DownstreamError::PaymentProvider(msg) => write!(f, "Payment provider error: {msg}"),
        }
    }
}

impl std::error::Error for DownstreamError {}

impl From<anyhow::Error> for DownstreamError {
    fn from(err: anyhow::Error) -> Self {
        DownstreamError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display() {
        let err = TokenError::UnknownValue {
            prefix: "sex:".to_string(),
            value: "robot".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown value \"robot\" for prefix \"sex:\"");
        assert_eq!(
            TokenError::Malformed("ab".to_string()).to_string(),
            "Malformed token: \"ab\""
        );
    }

    #[test]
    fn test_dialog_error_from_token_error() {
        let err: DialogError = TokenError::UnknownPrefix("zzz:1".to_string()).into();
        assert!(matches!(err, DialogError::UnknownToken(TokenError::UnknownPrefix(_))));
    }

    #[test]
    fn test_downstream_error_conversions() {
        let err: DownstreamError = anyhow::anyhow!("connection reset").into();
        match err {
            DownstreamError::Unavailable(msg) => assert!(msg.contains("connection reset")),
            _ => panic!("Expected Unavailable"),
        }
        assert!(DownstreamError::RateLimited.is_rate_limited());
        assert!(!DownstreamError::Delivery("x".to_string()).is_rate_limited());
    }
}
