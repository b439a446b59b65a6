// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Credentials the replication probe connects with.

use std::fmt;

use crate::constants::{ENV_MYSQL_PASSWORD, ENV_MYSQL_USERNAME};
use crate::errors::{OperatorError, Result};

/// Username and password for the probe's MySQL connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of probe credentials.
pub trait CredentialSource: Send + Sync {
    /// Resolve the credentials.
    ///
    /// # Errors
    ///
    /// [`OperatorError::Configuration`] if the username is unavailable.
    fn credentials(&self) -> Result<Credentials>;
}

/// Reads credentials from the `username` and `password` environment variables.
///
/// A missing or empty username is a configuration error. A missing password
/// is treated as empty.
#[derive(Clone, Debug, Default)]
pub struct EnvCredentialSource;

impl CredentialSource for EnvCredentialSource {
    fn credentials(&self) -> Result<Credentials> {
        credentials_from(
            std::env::var(ENV_MYSQL_USERNAME).ok(),
            std::env::var(ENV_MYSQL_PASSWORD).ok(),
        )
    }
}

/// Build credentials from raw values as they would come from the environment.
///
/// # Errors
///
/// [`OperatorError::Configuration`] if `username` is absent or empty.
pub fn credentials_from(username: Option<String>, password: Option<String>) -> Result<Credentials> {
    let username = username.filter(|u| !u.is_empty()).ok_or_else(|| {
        OperatorError::Configuration(format!(
            "missing MySQL probe username (environment variable '{ENV_MYSQL_USERNAME}')"
        ))
    })?;
    Ok(Credentials {
        username,
        password: password.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_username_is_configuration_error() {
        let err = credentials_from(None, Some("secret".to_string())).unwrap_err();
        assert!(matches!(err, OperatorError::Configuration(_)));
        assert!(!err.is_retryable());

        let err = credentials_from(Some(String::new()), None).unwrap_err();
        assert!(matches!(err, OperatorError::Configuration(_)));
    }

    #[test]
    fn test_missing_password_is_empty() {
        let creds = credentials_from(Some("root".to_string()), None).unwrap();
        assert_eq!(creds.username, "root");
        assert_eq!(creds.password, "");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = credentials_from(Some("root".to_string()), Some("hunter2".to_string())).unwrap();
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("root"));
        assert!(!rendered.contains("hunter2"));
    }
}
