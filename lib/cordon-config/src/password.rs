use std::fmt;

use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;

/// A secret string configuration value.
///
/// Configuration settings that carry credentials (keystore passwords, key passwords, and so on)
/// deserialize into this type rather than a plain `String`, so that accidentally logging or
/// serializing the value is structurally discouraged: `Password` has no `Display` implementation,
/// its `Debug` output is redacted, and the inner value is only reachable through the explicit
/// [`expose`][Self::expose] accessor.
///
/// The underlying storage is zeroed when the value is dropped.
#[derive(Deserialize)]
#[serde(transparent)]
pub struct Password(SecretString);

impl Password {
    /// Creates a `Password` from the given value.
    pub fn new<S>(value: S) -> Self
    where
        S: Into<String>,
    {
        Self(SecretString::from(value.into()))
    }

    /// Exposes the inner secret value.
    ///
    /// Callers are responsible for not letting the returned reference escape into logs or
    /// serialized output.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(REDACTED)")
    }
}
