//! Key formatting
//!
//! Keys are the join between `save` and `get`, and between different
//! backends, so they must be identical across processes: `{Type}.{Field}`,
//! trimmed and lower-cased one character at a time with the locale-independent
//! Unicode mapping (no context-sensitive final sigma).

use crate::error::{Error, Result};

/// Derives canonical entry keys from type and field names
pub trait KeyFormatter: Send + Sync {
    /// Key for `field_name` of the type named `type_name`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if either name is empty or whitespace.
    fn key(&self, type_name: &str, field_name: &str) -> Result<String>;

    /// Canonical form of an arbitrary key
    fn normalize(&self, key: &str) -> String;
}

/// `{type}.{field}`, trimmed and lower-cased
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyFormatter;

impl KeyFormatter for DefaultKeyFormatter {
    fn key(&self, type_name: &str, field_name: &str) -> Result<String> {
        if type_name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "configuration type name must be provided".into(),
            ));
        }
        if field_name.trim().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "field name must be provided for type '{type_name}'"
            )));
        }

        Ok(self.normalize(&format!("{type_name}.{field_name}")))
    }

    fn normalize(&self, key: &str) -> String {
        key.trim().chars().flat_map(char::to_lowercase).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_lowercase_type_dot_field() {
        let key = DefaultKeyFormatter
            .key("CheckoutConfig", "LoginRequired")
            .unwrap();
        assert_eq!(key, "checkoutconfig.loginrequired");
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(DefaultKeyFormatter.normalize("  Test.KEY "), "test.key");
        assert_eq!(DefaultKeyFormatter.normalize(""), "");
    }

    #[test]
    fn test_missing_type_name_is_rejected() {
        let err = DefaultKeyFormatter.key("  ", "Prop").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_blank_field_name_is_rejected() {
        assert!(DefaultKeyFormatter.key("Checkout", "").is_err());
        assert!(DefaultKeyFormatter.key("Checkout", " \n").is_err());
    }

    #[test]
    fn test_non_ascii_lowercasing_is_stable() {
        let key = DefaultKeyFormatter.key("ÜberConfig", "Größe").unwrap();
        assert_eq!(key, "überconfig.größe");
    }

    #[test]
    fn test_final_sigma_maps_like_any_other_sigma() {
        assert_eq!(DefaultKeyFormatter.normalize("ΟΔΟΣ"), "οδοσ");
        assert_eq!(
            DefaultKeyFormatter.key("Config", "ΟΔΟΣ").unwrap(),
            "config.οδοσ"
        );
        // A sigma before the dot is not treated as word-final
        assert_eq!(DefaultKeyFormatter.normalize("ΣΟΦΟΣ.X"), "σοφοσ.x");
    }
}
