use cordon_config::Password;

use crate::config::CommonTlsSettings;
use crate::keystore::KeyMaterialHandle;

/// Client-authentication policy for a server-mode TLS context.
///
/// Controls whether a connecting client must, may, or need not present its own certificate during
/// the handshake.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ClientAuthPolicy {
    /// Clients are not asked for a certificate.
    #[default]
    None,

    /// Clients are asked for a certificate, but may decline to present one.
    Requested,

    /// Clients must present a certificate.
    Required,
}

impl ClientAuthPolicy {
    /// Parses a policy from its raw configuration value.
    ///
    /// Only the exact strings `requested` and `required` select their respective policies; any
    /// other value, including absence, maps to `None`. Unrecognized values are intentionally
    /// treated identically to absence rather than rejected, preserving the long-standing
    /// permissive behavior of this setting.
    pub fn from_config_value(value: Option<&str>) -> Self {
        match value {
            Some("requested") => Self::Requested,
            Some("required") => Self::Required,
            _ => Self::None,
        }
    }
}

/// Mode-specific context settings.
///
/// A descriptor carries exactly one of these: the client-authentication policy in server mode, or
/// the endpoint-identity verification algorithm in client mode. Holding them as a single enum
/// makes a descriptor mode-pure by construction.
#[derive(Debug)]
pub enum ModeSettings {
    /// Server-mode settings.
    Server {
        /// Client-authentication policy.
        client_auth: ClientAuthPolicy,
    },

    /// Client-mode settings.
    Client {
        /// Endpoint-identity verification algorithm (e.g. `HTTPS`), if one was requested.
        ///
        /// When absent, no endpoint-identity check is requested at this layer and the underlying
        /// TLS stack's own default applies.
        endpoint_identification_algorithm: Option<String>,
    },
}

/// A fully populated TLS context descriptor.
///
/// The immutable output artifact of [`build_server_context`][crate::build_server_context] and
/// [`build_client_context`][crate::build_client_context]: every attribute is either set from
/// configuration or set to its documented default, and the descriptor is handed to the consuming
/// transport as-is. Password-bearing attributes are held as [`Password`] values and stay redacted
/// in `Debug` output.
#[derive(Debug)]
pub struct TlsContextDescriptor {
    key_material: Option<KeyMaterialHandle>,
    keystore_location: Option<String>,
    keystore_password: Option<Password>,
    key_password: Option<Password>,
    keystore_type: String,
    truststore_location: Option<String>,
    truststore_password: Option<Password>,
    truststore_type: String,
    enabled_protocols: Vec<String>,
    provider: Option<String>,
    protocol: String,
    cipher_suites: Option<Vec<String>>,
    key_manager_algorithm: String,
    trust_manager_algorithm: String,
    secure_random_implementation: Option<String>,
    mode: ModeSettings,
}

impl TlsContextDescriptor {
    pub(crate) fn from_parts(
        common: CommonTlsSettings, key_material: Option<KeyMaterialHandle>, mode: ModeSettings,
    ) -> Self {
        Self {
            key_material,
            keystore_location: common.keystore_location,
            keystore_password: common.keystore_password,
            key_password: common.key_password,
            keystore_type: common.keystore_type,
            truststore_location: common.truststore_location,
            truststore_password: common.truststore_password,
            truststore_type: common.truststore_type,
            enabled_protocols: common.enabled_protocols,
            provider: common.provider,
            protocol: common.protocol,
            cipher_suites: common.cipher_suites,
            key_manager_algorithm: common.key_manager_algorithm,
            trust_manager_algorithm: common.trust_manager_algorithm,
            secure_random_implementation: common.secure_random_implementation,
            mode,
        }
    }

    /// Explicitly loaded key material, if the keystore type required it.
    ///
    /// Only populated for PKCS12 keystores. When present, the handle supersedes
    /// [`keystore_location`][Self::keystore_location] for actual use; the path is still retained
    /// for diagnostics.
    pub fn key_material(&self) -> Option<&KeyMaterialHandle> {
        self.key_material.as_ref()
    }

    /// Path to the keystore file, if configured.
    pub fn keystore_location(&self) -> Option<&str> {
        self.keystore_location.as_deref()
    }

    /// Keystore password, if configured.
    pub fn keystore_password(&self) -> Option<&Password> {
        self.keystore_password.as_ref()
    }

    /// Private key password, if configured.
    pub fn key_password(&self) -> Option<&Password> {
        self.key_password.as_ref()
    }

    /// Keystore type. Defaults to `JKS`.
    pub fn keystore_type(&self) -> &str {
        &self.keystore_type
    }

    /// Path to the truststore file, if configured.
    pub fn truststore_location(&self) -> Option<&str> {
        self.truststore_location.as_deref()
    }

    /// Truststore password, if configured.
    pub fn truststore_password(&self) -> Option<&Password> {
        self.truststore_password.as_ref()
    }

    /// Truststore type. Defaults to `JKS`.
    pub fn truststore_type(&self) -> &str {
        &self.truststore_type
    }

    /// TLS protocol versions to enable. Defaults to `TLSv1.2` and `TLSv1.3`.
    pub fn enabled_protocols(&self) -> &[String] {
        &self.enabled_protocols
    }

    /// Security provider name, if configured.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Protocol to use for context negotiation. Defaults to `TLSv1.3`.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Cipher suites to restrict negotiation to, if configured.
    ///
    /// `None` means no restriction is applied and the platform default suite set is used. This is
    /// distinct from an empty list, which would forbid every suite.
    pub fn cipher_suites(&self) -> Option<&[String]> {
        self.cipher_suites.as_deref()
    }

    /// Key manager algorithm. Defaults to the platform default (`PKIX`).
    pub fn key_manager_algorithm(&self) -> &str {
        &self.key_manager_algorithm
    }

    /// Trust manager algorithm. Defaults to the platform default (`PKIX`).
    pub fn trust_manager_algorithm(&self) -> &str {
        &self.trust_manager_algorithm
    }

    /// Secure random implementation, if configured.
    pub fn secure_random_implementation(&self) -> Option<&str> {
        self.secure_random_implementation.as_deref()
    }

    /// Mode-specific settings.
    pub fn mode_settings(&self) -> &ModeSettings {
        &self.mode
    }

    /// Client-authentication policy, if this is a server-mode descriptor.
    pub fn client_auth(&self) -> Option<ClientAuthPolicy> {
        match &self.mode {
            ModeSettings::Server { client_auth } => Some(*client_auth),
            ModeSettings::Client { .. } => None,
        }
    }

    /// Endpoint-identity verification algorithm, if this is a client-mode descriptor and one was
    /// configured.
    pub fn endpoint_identification_algorithm(&self) -> Option<&str> {
        match &self.mode {
            ModeSettings::Server { .. } => None,
            ModeSettings::Client {
                endpoint_identification_algorithm,
            } => endpoint_identification_algorithm.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_auth_policy_from_config_value() {
        assert_eq!(
            ClientAuthPolicy::from_config_value(Some("requested")),
            ClientAuthPolicy::Requested
        );
        assert_eq!(
            ClientAuthPolicy::from_config_value(Some("required")),
            ClientAuthPolicy::Required
        );

        // "none", absence, and unrecognized values all map to `None` identically.
        assert_eq!(ClientAuthPolicy::from_config_value(Some("none")), ClientAuthPolicy::None);
        assert_eq!(ClientAuthPolicy::from_config_value(None), ClientAuthPolicy::None);
        assert_eq!(ClientAuthPolicy::from_config_value(Some("bogus")), ClientAuthPolicy::None);
    }
}
