//! Transport Layer Security (TLS) context configuration building.
//!
//! Translates the flat, string-keyed TLS configuration namespace of an HTTPS listener into a fully
//! populated [`TlsContextDescriptor`], usable both by the HTTPS server and by the in-process HTTPS
//! client. Keystores that need explicit, provider-aware loading (PKCS12) are loaded here, behind a
//! one-time, process-wide registration of the auxiliary cryptography provider; everything else is
//! recorded as-is for the consuming transport to resolve.

use cordon_config::{ConfigurationError, GenericConfiguration};
use snafu::{ResultExt as _, Snafu};

mod config;
mod descriptor;
mod keystore;
mod provider;

pub use self::config::{ClientTlsConfiguration, ServerTlsConfiguration, DEFAULT_CONFIG_PREFIX, PKCS12_STORE_TYPE};
pub use self::descriptor::{ClientAuthPolicy, ModeSettings, TlsContextDescriptor};
pub use self::keystore::{KeyMaterialError, KeyMaterialHandle};
pub use self::provider::{ensure_crypto_provider_registered, registration_count};

/// An error encountered while building a TLS context descriptor.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum TlsBuildError {
    /// A recognized configuration key held a value of the wrong type, or a list-valued key could
    /// not be parsed.
    #[snafu(display("Invalid TLS configuration."))]
    Configuration {
        /// Error source.
        source: ConfigurationError,
    },

    /// The keystore could not be opened or parsed.
    #[snafu(display("Failed to load TLS key material."))]
    KeyMaterial {
        /// Error source.
        source: KeyMaterialError,
    },
}

/// Builds a server-mode TLS context descriptor from the given configuration.
///
/// Reads all recognized TLS keys under the default HTTPS listener prefix
/// ([`DEFAULT_CONFIG_PREFIX`]).
///
/// ## Errors
///
/// If a recognized key holds a value of the wrong type, or if key material needed to be loaded and
/// the keystore could not be opened or parsed, an error will be returned.
pub fn build_server_context(config: &GenericConfiguration) -> Result<TlsContextDescriptor, TlsBuildError> {
    ServerTlsConfiguration::from_configuration(config)
        .context(Configuration)?
        .build()
}

/// Builds a server-mode TLS context descriptor, reading recognized keys under the given prefix.
///
/// ## Errors
///
/// If a recognized key holds a value of the wrong type, or if key material needed to be loaded and
/// the keystore could not be opened or parsed, an error will be returned.
pub fn build_server_context_with_prefix(
    config: &GenericConfiguration, prefix: &str,
) -> Result<TlsContextDescriptor, TlsBuildError> {
    ServerTlsConfiguration::from_configuration_with_prefix(config, prefix)
        .context(Configuration)?
        .build()
}

/// Builds a client-mode TLS context descriptor from the given configuration.
///
/// Always reads the default HTTPS listener prefix ([`DEFAULT_CONFIG_PREFIX`]), so that the
/// in-process client is configured against the same material the listener serves.
///
/// ## Errors
///
/// If a recognized key holds a value of the wrong type, or if key material needed to be loaded and
/// the keystore could not be opened or parsed, an error will be returned.
pub fn build_client_context(config: &GenericConfiguration) -> Result<TlsContextDescriptor, TlsBuildError> {
    ClientTlsConfiguration::from_configuration(config)
        .context(Configuration)?
        .build()
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use cordon_config::ConfigurationLoader;
    use rcgen::{generate_simple_self_signed, CertifiedKey};
    use tempfile::NamedTempFile;

    use super::*;

    fn write_pkcs12_keystore(password: &str) -> NamedTempFile {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["localhost".to_string()]).expect("should generate certificate");

        let pfx = p12::PFX::new(cert.der().as_ref(), &key_pair.serialize_der(), None, password, "cordon")
            .expect("should assemble PKCS12 container");

        let mut file = NamedTempFile::new().expect("should create temporary file");
        file.write_all(&pfx.to_der()).expect("should write keystore");
        file
    }

    fn config_from_yaml(contents: &str) -> GenericConfiguration {
        let mut file = NamedTempFile::new().expect("should create temporary file");
        file.write_all(contents.as_bytes()).expect("should write YAML contents");

        ConfigurationLoader::default()
            .from_yaml(file.path())
            .expect("should load YAML file")
            .into_generic()
    }

    #[test]
    fn pkcs12_server_context_end_to_end() {
        let keystore = write_pkcs12_keystore("hunter2");
        let config = config_from_yaml(&format!(
            "listeners:\n  https:\n    ssl:\n      keystore:\n        location: \"{}\"\n        type: PKCS12\n        password: hunter2\n      client:\n        auth: required\n",
            keystore.path().to_string_lossy()
        ));

        let descriptor = build_server_context(&config).expect("should build server descriptor");

        assert_eq!(descriptor.keystore_type(), PKCS12_STORE_TYPE);
        assert_eq!(descriptor.client_auth(), Some(ClientAuthPolicy::Required));
        assert_eq!(descriptor.protocol(), "TLSv1.3");
        assert_eq!(descriptor.enabled_protocols(), ["TLSv1.2", "TLSv1.3"]);
        assert_eq!(descriptor.cipher_suites(), None);

        let handle = descriptor.key_material().expect("key material should be loaded");
        assert_eq!(handle.certificate_chain().len(), 1);

        // The path is retained for diagnostics even though the handle supersedes it.
        assert_eq!(
            descriptor.keystore_location(),
            Some(keystore.path().to_string_lossy().as_ref())
        );

        // The provider registration happened (exactly once, process-wide) before the load.
        assert_eq!(registration_count(), 1);
    }

    #[test]
    fn pkcs12_client_context_end_to_end() {
        let keystore = write_pkcs12_keystore("");
        let config = config_from_yaml(&format!(
            "listeners:\n  https:\n    ssl:\n      keystore:\n        location: \"{}\"\n        type: PKCS12\n      endpoint:\n        identification:\n          algorithm: HTTPS\n",
            keystore.path().to_string_lossy()
        ));

        let descriptor = build_client_context(&config).expect("should build client descriptor");

        assert!(descriptor.key_material().is_some());
        assert_eq!(descriptor.endpoint_identification_algorithm(), Some("HTTPS"));
        assert_eq!(descriptor.client_auth(), None);
    }

    #[test]
    fn pkcs12_load_failure_is_key_material_error() {
        let config = config_from_yaml(
            "listeners:\n  https:\n    ssl:\n      keystore:\n        location: /nonexistent/server.p12\n        type: PKCS12\n",
        );

        let result = build_server_context(&config);
        match result {
            Err(TlsBuildError::KeyMaterial { source }) => {
                assert!(source.to_string().contains("/nonexistent/server.p12"));
            }
            result => panic!("expected key material error, got {:?}", result.err()),
        }
    }

    #[test]
    fn custom_prefix_build() {
        let config = config_from_yaml("internal:\n  api:\n    ssl:\n      protocol: TLSv1.2\n");

        let descriptor =
            build_server_context_with_prefix(&config, "internal.api.").expect("should build server descriptor");

        assert_eq!(descriptor.protocol(), "TLSv1.2");
    }
}
