//! Credential records for remote transports
//!
//! These are plain configuration values. Nothing here reads process
//! environment: the env-var kind is resolved against a map the caller
//! passes in.

use crate::errors::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Username sent along with a personal access token
pub const TOKEN_USERNAME: &str = "x-access-token";

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username and password read from two named variables
    EnvVars {
        username_var: String,
        password_var: String,
    },
    PersonalAccessToken {
        token: String,
    },
    UserPass {
        username: String,
        password: String,
    },
    SshKey {
        username: String,
        public_key: Option<PathBuf>,
        private_key: PathBuf,
        passphrase: Option<String>,
    },
}

/// Username and password ready to hand to a transport
#[derive(Clone, PartialEq, Eq)]
pub struct UserPass {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn env_vars(username_var: impl Into<String>, password_var: impl Into<String>) -> Self {
        Credentials::EnvVars {
            username_var: username_var.into(),
            password_var: password_var.into(),
        }
    }

    /// Plain username/password for every kind except key pairs
    ///
    /// Missing variables are an argument error.
    pub fn user_pass(&self, vars: &HashMap<String, String>) -> Result<Option<UserPass>> {
        let lookup = |name: &str| {
            vars.get(name)
                .cloned()
                .ok_or_else(|| Error::invalid_argument(format!("variable {name} is not set")))
        };

        Ok(match self {
            Credentials::EnvVars {
                username_var,
                password_var,
            } => Some(UserPass {
                username: lookup(username_var)?,
                password: lookup(password_var)?,
            }),
            Credentials::PersonalAccessToken { token } => Some(UserPass {
                username: TOKEN_USERNAME.to_string(),
                password: token.clone(),
            }),
            Credentials::UserPass { username, password } => Some(UserPass {
                username: username.clone(),
                password: password.clone(),
            }),
            Credentials::SshKey { .. } => None,
        })
    }
}

// Secrets never reach logs through `{:?}`.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::EnvVars {
                username_var,
                password_var,
            } => f
                .debug_struct("EnvVars")
                .field("username_var", username_var)
                .field("password_var", password_var)
                .finish(),
            Credentials::PersonalAccessToken { .. } => {
                f.debug_struct("PersonalAccessToken").finish_non_exhaustive()
            }
            Credentials::UserPass { username, .. } => f
                .debug_struct("UserPass")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::SshKey {
                username,
                public_key,
                private_key,
                ..
            } => f
                .debug_struct("SshKey")
                .field("username", username)
                .field("public_key", public_key)
                .field("private_key", private_key)
                .finish_non_exhaustive(),
        }
    }
}

impl fmt::Debug for UserPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPass")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_var_pairs_read_the_given_map() {
        let credentials = Credentials::env_vars("USER_VAR", "PASS_VAR");

        let resolved = credentials
            .user_pass(&vars(&[("USER_VAR", "alice"), ("PASS_VAR", "secret")]))
            .unwrap();

        assert_eq!(
            resolved,
            Some(UserPass {
                username: "alice".into(),
                password: "secret".into()
            })
        );
    }

    #[test]
    fn missing_variables_are_argument_errors() {
        let credentials = Credentials::env_vars("USER_VAR", "PASS_VAR");

        let err = credentials
            .user_pass(&vars(&[("USER_VAR", "alice")]))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(message) if message.contains("PASS_VAR")));
    }

    #[test]
    fn tokens_use_the_access_token_username() {
        let credentials = Credentials::PersonalAccessToken {
            token: "ghp_x".into(),
        };

        let resolved = credentials.user_pass(&HashMap::new()).unwrap().unwrap();

        assert_eq!(resolved.username, TOKEN_USERNAME);
        assert_eq!(resolved.password, "ghp_x");
    }

    #[test]
    fn key_pairs_have_no_password_form() {
        let credentials = Credentials::SshKey {
            username: "git".into(),
            public_key: None,
            private_key: PathBuf::from("id_ed25519"),
            passphrase: Some("hunter2".into()),
        };

        assert_eq!(credentials.user_pass(&HashMap::new()).unwrap(), None);
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
