//! The seam between virtual users and the HTTP client that carries their
//! requests.

use std::num::NonZeroU16;

use async_trait::async_trait;
use loadgen_profile::Request;
use thiserror::Error;

#[cfg(feature = "reqwest")]
pub mod reqwest;

#[cfg(any(test, feature = "simulator"))]
pub mod simulator;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid status code {0}")]
    InvalidStatus(u16),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "reqwest")]
    #[error(transparent)]
    Reqwest(#[from] ::reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Sends one request and reports the response status.
///
/// A non-2xx status is a successful send; deciding whether it counts as a
/// failure is up to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// * If the request could not be sent or the response could not be read
    async fn send(&self, request: &Request) -> Result<StatusCode, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatusCode(NonZeroU16);

impl StatusCode {
    pub const OK: Self = Self(NonZeroU16::new(200).unwrap());
    pub const INTERNAL_SERVER_ERROR: Self = Self(NonZeroU16::new(500).unwrap());
    pub const SERVICE_UNAVAILABLE: Self = Self(NonZeroU16::new(503).unwrap());

    /// # Errors
    ///
    /// * If `code` is outside `100..=999`
    pub const fn from_u16(code: u16) -> Result<Self, Error> {
        if code < 100 || code > 999 {
            return Err(Error::InvalidStatus(code));
        }

        match NonZeroU16::new(code) {
            Some(code) => Ok(Self(code)),
            None => Err(Error::InvalidStatus(code)),
        }
    }

    #[must_use]
    pub const fn as_u16(&self) -> u16 {
        self.0.get()
    }

    /// Check if status is within 200-299.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        let code = self.0.get();
        code >= 200 && code < 300
    }
}

impl From<StatusCode> for u16 {
    fn from(value: StatusCode) -> Self {
        value.0.get()
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn test_success_range() {
        assert!(StatusCode::OK.is_success());
        assert!(StatusCode::from_u16(299).unwrap().is_success());
        assert!(!StatusCode::from_u16(302).unwrap().is_success());
        assert!(!StatusCode::SERVICE_UNAVAILABLE.is_success());
    }

    #[test_log::test]
    fn test_from_u16() {
        assert_eq!(StatusCode::from_u16(204).unwrap().as_u16(), 204);
        assert!(StatusCode::from_u16(204).unwrap().is_success());
        assert!(matches!(StatusCode::from_u16(0), Err(Error::InvalidStatus(0))));
        assert!(matches!(
            StatusCode::from_u16(1000),
            Err(Error::InvalidStatus(1000))
        ));
    }

    #[test_log::test]
    fn test_display() {
        assert_eq!(StatusCode::SERVICE_UNAVAILABLE.to_string(), "503");
        assert_eq!(u16::from(StatusCode::INTERNAL_SERVER_ERROR), 500);
    }
}
