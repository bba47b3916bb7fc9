//! TLS configuration for MySQL connections.

use mysql_async::SslOpts;
use tracing::warn;

use crate::error::{MigrateError, Result};

/// SSL verification modes, named after the `ssl_mode` config values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// No TLS (plain TCP connection).
    #[default]
    Disable,
    /// TLS without certificate verification.
    Prefer,
    /// TLS without certificate verification.
    /// **Security Warning**: Vulnerable to man-in-the-middle attacks.
    Require,
    /// Verify the server certificate against the CA.
    VerifyCa,
    /// Full certificate and hostname verification.
    VerifyFull,
}

impl SslMode {
    /// Parse an SSL mode from a string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" | "" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-ca" | "verify_ca" => Ok(SslMode::VerifyCa),
            "verify-full" | "verify_identity" => Ok(SslMode::VerifyFull),
            other => Err(MigrateError::Config(format!(
                "Invalid ssl_mode '{}'. Valid values: disable, prefer, require, verify-ca, verify-full",
                other
            ))),
        }
    }

    /// `mysql_async` TLS options, `None` when TLS is disabled.
    pub fn ssl_opts(self) -> Option<SslOpts> {
        match self {
            SslMode::Disable => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            SslMode::Prefer | SslMode::Require => {
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
            SslMode::VerifyCa => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
            SslMode::VerifyFull => Some(SslOpts::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(SslMode::parse("disable").unwrap(), SslMode::Disable);
        assert_eq!(SslMode::parse("VERIFY-FULL").unwrap(), SslMode::VerifyFull);
        assert_eq!(SslMode::parse("verify_ca").unwrap(), SslMode::VerifyCa);
        assert!(SslMode::parse("sometimes").is_err());
    }

    #[test]
    fn test_disable_has_no_opts() {
        assert!(SslMode::Disable.ssl_opts().is_none());
        assert!(SslMode::Require.ssl_opts().is_some());
    }
}
