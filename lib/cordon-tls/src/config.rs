use cordon_config::{ConfigurationError, GenericConfiguration, Password, ScopedConfiguration};
use serde::Deserialize;
use snafu::ResultExt as _;

use crate::descriptor::{ClientAuthPolicy, ModeSettings, TlsContextDescriptor};
use crate::keystore::{self, KeyMaterialHandle};
use crate::{KeyMaterial, TlsBuildError};

/// Default configuration key prefix: the HTTPS listener namespace.
pub const DEFAULT_CONFIG_PREFIX: &str = "listeners.https.";

/// Keystore type that requires explicit, provider-aware loading.
///
/// Every other declared store type is recorded as-is and left to the consuming transport's own
/// lazy loading.
pub const PKCS12_STORE_TYPE: &str = "PKCS12";

const KEYSTORE_LOCATION_KEY: &str = "ssl.keystore.location";
const KEYSTORE_PASSWORD_KEY: &str = "ssl.keystore.password";
const KEY_PASSWORD_KEY: &str = "ssl.key.password";
const KEYSTORE_TYPE_KEY: &str = "ssl.keystore.type";
const TRUSTSTORE_LOCATION_KEY: &str = "ssl.truststore.location";
const TRUSTSTORE_PASSWORD_KEY: &str = "ssl.truststore.password";
const TRUSTSTORE_TYPE_KEY: &str = "ssl.truststore.type";
const ENABLED_PROTOCOLS_KEY: &str = "ssl.enabled.protocols";
const PROVIDER_KEY: &str = "ssl.provider";
const PROTOCOL_KEY: &str = "ssl.protocol";
const CIPHER_SUITES_KEY: &str = "ssl.cipher.suites";
const KEY_MANAGER_ALGORITHM_KEY: &str = "ssl.keymanager.algorithm";
const TRUST_MANAGER_ALGORITHM_KEY: &str = "ssl.trustmanager.algorithm";
const SECURE_RANDOM_KEY: &str = "ssl.secure.random.implementation";
const CLIENT_AUTH_KEY: &str = "ssl.client.auth";
const ENDPOINT_IDENTIFICATION_KEY: &str = "ssl.endpoint.identification.algorithm";

const DEFAULT_STORE_TYPE: &str = "JKS";
const DEFAULT_PROTOCOL: &str = "TLSv1.3";
const DEFAULT_ENABLED_PROTOCOLS: &[&str] = &["TLSv1.2", "TLSv1.3"];
const DEFAULT_KEY_MANAGER_ALGORITHM: &str = "PKIX";
const DEFAULT_TRUST_MANAGER_ALGORITHM: &str = "PKIX";

/// A list-valued configuration setting.
///
/// Accepts either a native sequence of strings or a single comma-separated string, with optional
/// whitespace around each item.
struct StringList(Vec<String>);

impl StringList {
    fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            List(Vec<String>),
            Flat(String),
        }

        let items = match Raw::deserialize(deserializer)? {
            Raw::List(items) => items,
            Raw::Flat(raw) => raw
                .split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        };

        Ok(Self(items))
    }
}

/// TLS settings shared by server and client mode.
///
/// One field per recognized configuration key, populated once via typed accessors. Every field has
/// a declared default, so a descriptor built from these settings is never partially specified.
pub(crate) struct CommonTlsSettings {
    pub keystore_location: Option<String>,
    pub keystore_password: Option<Password>,
    pub key_password: Option<Password>,
    pub keystore_type: String,
    pub truststore_location: Option<String>,
    pub truststore_password: Option<Password>,
    pub truststore_type: String,
    pub enabled_protocols: Vec<String>,
    pub provider: Option<String>,
    pub protocol: String,
    pub cipher_suites: Option<Vec<String>>,
    pub key_manager_algorithm: String,
    pub trust_manager_algorithm: String,
    pub secure_random_implementation: Option<String>,
}

impl CommonTlsSettings {
    fn from_scoped(config: &ScopedConfiguration<'_>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            keystore_location: config.try_get_typed::<String>(KEYSTORE_LOCATION_KEY)?,
            keystore_password: config.try_get_typed::<Password>(KEYSTORE_PASSWORD_KEY)?,
            key_password: config.try_get_typed::<Password>(KEY_PASSWORD_KEY)?,
            keystore_type: config
                .try_get_typed::<String>(KEYSTORE_TYPE_KEY)?
                .unwrap_or_else(|| DEFAULT_STORE_TYPE.to_string()),
            truststore_location: config.try_get_typed::<String>(TRUSTSTORE_LOCATION_KEY)?,
            truststore_password: config.try_get_typed::<Password>(TRUSTSTORE_PASSWORD_KEY)?,
            truststore_type: config
                .try_get_typed::<String>(TRUSTSTORE_TYPE_KEY)?
                .unwrap_or_else(|| DEFAULT_STORE_TYPE.to_string()),
            enabled_protocols: config
                .try_get_typed::<StringList>(ENABLED_PROTOCOLS_KEY)?
                .map(StringList::into_inner)
                .unwrap_or_else(default_enabled_protocols),
            provider: config.try_get_typed::<String>(PROVIDER_KEY)?,
            protocol: config
                .try_get_typed::<String>(PROTOCOL_KEY)?
                .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string()),
            // Absence deliberately means "unrestricted" here, not an empty restriction list.
            cipher_suites: config
                .try_get_typed::<StringList>(CIPHER_SUITES_KEY)?
                .map(StringList::into_inner),
            key_manager_algorithm: config
                .try_get_typed::<String>(KEY_MANAGER_ALGORITHM_KEY)?
                .unwrap_or_else(|| DEFAULT_KEY_MANAGER_ALGORITHM.to_string()),
            trust_manager_algorithm: config
                .try_get_typed::<String>(TRUST_MANAGER_ALGORITHM_KEY)?
                .unwrap_or_else(|| DEFAULT_TRUST_MANAGER_ALGORITHM.to_string()),
            secure_random_implementation: config.try_get_typed::<String>(SECURE_RANDOM_KEY)?,
        })
    }

    fn load_key_material(&self) -> Result<Option<KeyMaterialHandle>, keystore::KeyMaterialError> {
        match self.keystore_location.as_deref() {
            Some(path) if self.keystore_type == PKCS12_STORE_TYPE => {
                keystore::load_key_material(path, self.keystore_password.as_ref()).map(Some)
            }
            _ => Ok(None),
        }
    }
}

fn default_enabled_protocols() -> Vec<String> {
    DEFAULT_ENABLED_PROTOCOLS.iter().map(|p| p.to_string()).collect()
}

/// Server-mode TLS configuration.
///
/// The strongly-typed form of all recognized TLS configuration keys for an HTTPS listener,
/// populated once from a [`GenericConfiguration`] and consumed by [`build`][Self::build].
pub struct ServerTlsConfiguration {
    common: CommonTlsSettings,
    client_auth: ClientAuthPolicy,
}

impl ServerTlsConfiguration {
    /// Creates a new `ServerTlsConfiguration` from the given configuration, reading keys under the
    /// default prefix ([`DEFAULT_CONFIG_PREFIX`]).
    ///
    /// ## Errors
    ///
    /// If any recognized key holds a value of the wrong type, an error will be returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, ConfigurationError> {
        Self::from_configuration_with_prefix(config, DEFAULT_CONFIG_PREFIX)
    }

    /// Creates a new `ServerTlsConfiguration` from the given configuration, reading keys under the
    /// given prefix.
    ///
    /// ## Errors
    ///
    /// If any recognized key holds a value of the wrong type, an error will be returned.
    pub fn from_configuration_with_prefix(
        config: &GenericConfiguration, prefix: &str,
    ) -> Result<Self, ConfigurationError> {
        let scoped = config.scoped(prefix);
        let common = CommonTlsSettings::from_scoped(&scoped)?;
        let client_auth_raw = scoped.try_get_typed::<String>(CLIENT_AUTH_KEY)?;

        Ok(Self {
            common,
            client_auth: ClientAuthPolicy::from_config_value(client_auth_raw.as_deref()),
        })
    }

    /// Builds the TLS context descriptor, consuming the configuration.
    ///
    /// If the keystore type requires explicit loading (PKCS12), the key material is loaded here;
    /// otherwise the keystore settings are passed through untouched.
    ///
    /// ## Errors
    ///
    /// If key material needed to be loaded and the keystore could not be opened or parsed, an
    /// error will be returned.
    pub fn build(self) -> Result<TlsContextDescriptor, TlsBuildError> {
        let key_material = self.common.load_key_material().context(KeyMaterial)?;

        Ok(TlsContextDescriptor::from_parts(
            self.common,
            key_material,
            ModeSettings::Server {
                client_auth: self.client_auth,
            },
        ))
    }
}

/// Client-mode TLS configuration.
///
/// Mirrors [`ServerTlsConfiguration`] for the in-process HTTPS client: the shared settings are
/// identical, but in place of a client-authentication policy it carries the endpoint-identity
/// verification algorithm.
pub struct ClientTlsConfiguration {
    common: CommonTlsSettings,
    endpoint_identification_algorithm: Option<String>,
}

impl ClientTlsConfiguration {
    /// Creates a new `ClientTlsConfiguration` from the given configuration.
    ///
    /// Client mode always reads the default prefix ([`DEFAULT_CONFIG_PREFIX`]), so that the
    /// in-process client trusts the same material the listener serves.
    ///
    /// ## Errors
    ///
    /// If any recognized key holds a value of the wrong type, an error will be returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, ConfigurationError> {
        let scoped = config.scoped(DEFAULT_CONFIG_PREFIX);
        let common = CommonTlsSettings::from_scoped(&scoped)?;
        let endpoint_identification_algorithm = scoped.try_get_typed::<String>(ENDPOINT_IDENTIFICATION_KEY)?;

        Ok(Self {
            common,
            endpoint_identification_algorithm,
        })
    }

    /// Builds the TLS context descriptor, consuming the configuration.
    ///
    /// ## Errors
    ///
    /// If key material needed to be loaded and the keystore could not be opened or parsed, an
    /// error will be returned.
    pub fn build(self) -> Result<TlsContextDescriptor, TlsBuildError> {
        let key_material = self.common.load_key_material().context(KeyMaterial)?;

        Ok(TlsContextDescriptor::from_parts(
            self.common,
            key_material,
            ModeSettings::Client {
                endpoint_identification_algorithm: self.endpoint_identification_algorithm,
            },
        ))
    }
}
