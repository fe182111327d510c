//! Secret reference resolution.
//!
//! Config values that must not live in the config file are declared as
//! references with a scheme prefix: `env:NAME`, `file:PATH` or `plain:VALUE`.
//! Resolution happens once, during pre-flight, so a bad reference fails the
//! run before anything is mutated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("environment variable '{0}' is not set")]
    MissingEnv(String),

    #[error("failed to read secret file '{0}': {1}")]
    UnreadableFile(String, String),

    #[error("unknown secret scheme in '{0}' (expected env:, file: or plain:)")]
    UnknownScheme(String),
}

/// A secret source descriptor, serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SecretRef {
    Env(String),
    File(String),
    Plain(String),
}

impl SecretRef {
    /// Resolve the reference to its secret value.
    pub fn resolve(&self) -> Result<String, SecretError> {
        match self {
            Self::Env(name) => {
                std::env::var(name).map_err(|_| SecretError::MissingEnv(name.clone()))
            }
            Self::File(path) => std::fs::read_to_string(path)
                .map(|s| s.trim_end().to_string())
                .map_err(|e| SecretError::UnreadableFile(path.clone(), e.to_string())),
            Self::Plain(value) => Ok(value.clone()),
        }
    }
}

impl FromStr for SecretRef {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("env", name)) => Ok(Self::Env(name.to_string())),
            Some(("file", path)) => Ok(Self::File(path.to_string())),
            Some(("plain", value)) => Ok(Self::Plain(value.to_string())),
            _ => Err(SecretError::UnknownScheme(s.to_string())),
        }
    }
}

impl TryFrom<String> for SecretRef {
    type Error = SecretError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SecretRef> for String {
    /// Serialized form, unredacted (`Display` is the redacting one).
    fn from(r: SecretRef) -> Self {
        match r {
            SecretRef::Env(name) => format!("env:{name}"),
            SecretRef::File(path) => format!("file:{path}"),
            SecretRef::Plain(value) => format!("plain:{value}"),
        }
    }
}

impl fmt::Display for SecretRef {
    /// Displays the reference, never the resolved value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(name) => write!(f, "env:{name}"),
            Self::File(path) => write!(f, "file:{path}"),
            Self::Plain(_) => write!(f, "plain:<redacted>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_schemes() {
        assert_eq!(
            "env:DB_PASSWORD".parse::<SecretRef>().unwrap(),
            SecretRef::Env("DB_PASSWORD".to_string())
        );
        assert_eq!(
            "file:/run/secrets/pw".parse::<SecretRef>().unwrap(),
            SecretRef::File("/run/secrets/pw".to_string())
        );
        assert_eq!(
            "plain:hunter2".parse::<SecretRef>().unwrap(),
            SecretRef::Plain("hunter2".to_string())
        );
    }

    #[test]
    fn test_parse_unknown_scheme() {
        assert!("vault:kv/pw".parse::<SecretRef>().is_err());
        assert!("no-scheme".parse::<SecretRef>().is_err());
    }

    #[test]
    fn test_resolve_plain() {
        let secret = SecretRef::Plain("hunter2".to_string());
        assert_eq!(secret.resolve().unwrap(), "hunter2");
    }

    #[test]
    fn test_resolve_env() {
        std::env::set_var("STACKCTL_TEST_SECRET", "from-env");
        let secret = SecretRef::Env("STACKCTL_TEST_SECRET".to_string());
        assert_eq!(secret.resolve().unwrap(), "from-env");

        let missing = SecretRef::Env("STACKCTL_TEST_SECRET_MISSING".to_string());
        assert!(matches!(
            missing.resolve(),
            Err(SecretError::MissingEnv(_))
        ));
    }

    #[test]
    fn test_resolve_file_trims_trailing_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        let secret = SecretRef::File(file.path().to_string_lossy().to_string());
        assert_eq!(secret.resolve().unwrap(), "from-file");
    }

    #[test]
    fn test_resolve_missing_file() {
        let secret = SecretRef::File("/nonexistent/secret".to_string());
        assert!(matches!(
            secret.resolve(),
            Err(SecretError::UnreadableFile(_, _))
        ));
    }

    #[test]
    fn test_display_redacts_plain() {
        let secret = SecretRef::Plain("hunter2".to_string());
        assert!(!secret.to_string().contains("hunter2"));
        assert_eq!(
            SecretRef::Env("X".to_string()).to_string(),
            "env:X"
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let secret: SecretRef = serde_yaml::from_str("env:PW").unwrap();
        assert_eq!(secret, SecretRef::Env("PW".to_string()));
    }
}
