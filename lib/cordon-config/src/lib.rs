//! Primitives for working with typed configuration data.
#![deny(warnings)]
#![deny(missing_docs)]

use std::sync::Arc;
use std::{borrow::Cow, collections::HashSet};

use cordon_error::GenericError;
use figment::providers::Serialized;
use figment::Provider;
use figment::{error::Kind, providers::Env, Figment};
use serde::Deserialize;
use snafu::Snafu;

mod password;
mod provider;

pub use self::password::Password;
use self::provider::ResolvedProvider;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Help text describing how to set the missing field.
        ///
        /// This is meant to be displayed to the user, and includes environment variable-specific text if environment
        /// variables had been loaded originally.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// Requested field's value was not the expected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Name of the invalid field.
        ///
        /// This is a period-separated path to the field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Generic configuration error.
    #[snafu(display("Failed to query configuration."))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        match e.kind {
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e.into() },
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum LookupSource {
    /// The configuration key is looked up in a form suitable for environment variables.
    Environment { prefix: String },
}

impl LookupSource {
    fn transform_key(&self, key: &str) -> String {
        match self {
            // The prefix should already be uppercased, with a trailing underscore, which is needed when we actually
            // configure the provider used for reading from the environment... so we don't need to re-do that here.
            LookupSource::Environment { prefix } => format!("{}{}", prefix, key.replace('.', "_").to_uppercase()),
        }
    }
}

struct BoxedProvider(Box<dyn figment::Provider + Send + Sync>);

impl figment::Provider for BoxedProvider {
    fn metadata(&self) -> figment::Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// A configuration loader that can pull from various sources.
///
/// This loader provides a wrapper around a lower-level library, `figment`, to expose a simpler and focused API for both
/// loading configuration data from various sources, as well as querying it.
///
/// A variety of configuration sources can be configured (see below), with an implicit priority based on the order in
/// which sources are added: sources added later take precedence over sources prior. Once all sources are loaded, the
/// merged configuration is queried through [`GenericConfiguration`] (see [`into_generic`][Self::into_generic]).
///
/// # Supported sources
///
/// - YAML file
/// - JSON file
/// - environment variables (must be prefixed; see [`from_environment`][Self::from_environment])
#[derive(Default)]
pub struct ConfigurationLoader {
    lookup_sources: HashSet<LookupSource>,
    providers: Vec<BoxedProvider>,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid YAML, an error will be returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<std::path::Path>,
    {
        let resolved_provider = ResolvedProvider::from_yaml(&path)?;
        self.providers.push(BoxedProvider(Box::new(resolved_provider)));
        Ok(self)
    }

    /// Attempts to load the given YAML configuration file, ignoring any errors.
    ///
    /// Errors include the file not existing, not being readable/accessible, and not being valid YAML.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<std::path::Path>,
    {
        match ResolvedProvider::from_yaml(&path) {
            Ok(resolved_provider) => {
                self.providers.push(BoxedProvider(Box::new(resolved_provider)));
            }
            Err(e) => {
                tracing::debug!(error = %e, file_path = %path.as_ref().to_string_lossy(), "Unable to read YAML configuration file. Ignoring.");
            }
        }
        self
    }

    /// Loads the given JSON configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid JSON, an error will be returned.
    pub fn from_json<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<std::path::Path>,
    {
        let resolved_provider = ResolvedProvider::from_json(&path)?;
        self.providers.push(BoxedProvider(Box::new(resolved_provider)));
        Ok(self)
    }

    /// Attempts to load the given JSON configuration file, ignoring any errors.
    ///
    /// Errors include the file not existing, not being readable/accessible, and not being valid JSON.
    pub fn try_from_json<P>(mut self, path: P) -> Self
    where
        P: AsRef<std::path::Path>,
    {
        match ResolvedProvider::from_json(&path) {
            Ok(resolved_provider) => {
                self.providers.push(BoxedProvider(Box::new(resolved_provider)));
            }
            Err(e) => {
                tracing::debug!(error = %e, file_path = %path.as_ref().to_string_lossy(), "Unable to read JSON configuration file. Ignoring.");
            }
        }
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// The prefix given will have an underscore appended to it if it does not already end with one. For example, with a
    /// prefix of `app`, any environment variable starting with `app_` would be matched.
    ///
    /// The prefix is case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, an error will be returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_string()
        } else {
            format!("{}_", prefix)
        };

        // Convert to use Serialized::defaults since Env isn't Send + Sync.
        let env = Env::prefixed(&prefix);
        let values = env.data().unwrap();
        if let Some(default_dict) = values.get(&figment::Profile::Default) {
            self.providers
                .push(BoxedProvider(Box::new(Serialized::defaults(default_dict.clone()))));
            self.lookup_sources.insert(LookupSource::Environment { prefix });
        }
        Ok(self)
    }

    /// Consumes the configuration loader and wraps the merged sources in a generic wrapper.
    pub fn into_generic(self) -> GenericConfiguration {
        let figment = self
            .providers
            .iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider));

        GenericConfiguration {
            inner: Arc::new(Inner {
                figment,
                lookup_sources: self.lookup_sources,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    lookup_sources: HashSet<LookupSource>,
}

/// A generic configuration object.
///
/// This represents the merged configuration derived from [`ConfigurationLoader`] in its raw form. Values can be
/// queried by key, and can be extracted either as typed values or in their raw form.
///
/// Keys must be in the form of `a.b.c`, where periods (`.`) are used to indicate a nested value.
///
/// Using an example JSON configuration:
///
/// ```json
/// {
///   "a": {
///     "b": {
///       "c": "value"
///     }
///   }
/// }
/// ```
///
/// Querying for the value of `a.b.c` would return `"value"`, and querying for `a.b` would return the nested object `{
/// "c": "value" }`.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.inner.figment.extract_inner(key) {
            Ok(value) => Ok(value),
            Err(e) => {
                if matches!(e.kind, figment::error::Kind::MissingField(_)) {
                    // We might have been given a key that uses nested notation -- `foo.bar` -- but is only present in the
                    // environment variables. We specifically don't want to use a different separator in environment
                    // variables to map to nested key separators, so we simply try again here but with all nested key
                    // separators (`.`) replaced with `_`, to match environment variables.
                    let fallback_key = key.replace('.', "_");
                    self.inner
                        .figment
                        .extract_inner(&fallback_key)
                        .map_err(|fallback_e| from_figment_error(&self.inner.lookup_sources, fallback_e))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Gets a configuration value by key.
    ///
    /// The key must be in the form of `a.b.c`, where periods (`.`) are used to indicate a nested lookup.
    ///
    /// ## Errors
    ///
    /// If the key does not exist in the configuration, or if the value could not be deserialized into `T`, an error
    /// variant will be returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.get(key)
    }

    /// Gets a configuration value by key, or the default value if a key does not exist or could not be deserialized.
    ///
    /// The `Default` implementation of `T` will be used both if the key could not be found, as well as for any error
    /// during deserialization. This effectively swallows any errors and should generally be used sparingly.
    ///
    /// The key must be in the form of `a.b.c`, where periods (`.`) are used to indicate a nested lookup.
    pub fn get_typed_or_default<'a, T>(&self, key: &str) -> T
    where
        T: Default + Deserialize<'a>,
    {
        self.get(key).unwrap_or_default()
    }

    /// Gets a configuration value by key, if it exists.
    ///
    /// If the key exists in the configuration, and can be deserialized, `Ok(Some(value))` is returned. Otherwise,
    /// `Ok(None)` will be returned.
    ///
    /// The key must be in the form of `a.b.c`, where periods (`.`) are used to indicate a nested lookup.
    ///
    /// ## Errors
    ///
    /// If the value could not be deserialized into `T`, an error will be returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Attempts to deserialize the entire configuration as `T`.
    ///
    /// ## Errors
    ///
    /// If the value could not be deserialized into `T`, an error will be returned.
    pub fn as_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner
            .figment
            .extract()
            .map_err(|e| from_figment_error(&self.inner.lookup_sources, e))
    }

    /// Returns a read-only view over this configuration, scoped to the given key prefix.
    ///
    /// Every key queried through the view is joined to the prefix as-is, so prefixes addressing a
    /// nested namespace should carry their trailing separator (e.g. `listeners.https.`).
    pub fn scoped<'a>(&'a self, prefix: &str) -> ScopedConfiguration<'a> {
        ScopedConfiguration {
            config: self,
            prefix: prefix.to_string(),
        }
    }
}

/// A read-only view over a [`GenericConfiguration`], scoped to a key prefix.
///
/// All of the typed accessors behave identically to their [`GenericConfiguration`] counterparts,
/// except that the queried key is first joined to the view's prefix.
pub struct ScopedConfiguration<'a> {
    config: &'a GenericConfiguration,
    prefix: String,
}

impl ScopedConfiguration<'_> {
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Gets a configuration value by prefixed key.
    ///
    /// ## Errors
    ///
    /// If the key does not exist in the configuration, or if the value could not be deserialized into `T`, an error
    /// variant will be returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.config.get_typed(&self.full_key(key))
    }

    /// Gets a configuration value by prefixed key, if it exists.
    ///
    /// If the key exists in the configuration, and can be deserialized, `Ok(Some(value))` is returned. Otherwise,
    /// `Ok(None)` will be returned.
    ///
    /// ## Errors
    ///
    /// If the value could not be deserialized into `T`, an error will be returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.config.try_get_typed(&self.full_key(key))
    }
}

fn from_figment_error(lookup_sources: &HashSet<LookupSource>, e: figment::Error) -> ConfigurationError {
    match e.kind {
        Kind::MissingField(field) => {
            let mut valid_keys = lookup_sources
                .iter()
                .map(|source| source.transform_key(&field))
                .collect::<Vec<_>>();

            // Always specify the original key as a valid key to try.
            valid_keys.insert(0, field.to_string());

            let help_text = format!("Try setting `{}`.", valid_keys.join("` or `"));

            ConfigurationError::MissingField { help_text, field }
        }
        Kind::InvalidType(actual_ty, expected_ty) => ConfigurationError::InvalidFieldType {
            field: e.path.join("."),
            expected_ty,
            actual_ty: actual_ty.to_string(),
        },
        _ => ConfigurationError::Generic { source: e.into() },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn config_from_yaml(contents: &str) -> GenericConfiguration {
        let mut file = tempfile::NamedTempFile::new().expect("should create temporary file");
        file.write_all(contents.as_bytes()).expect("should write YAML contents");

        ConfigurationLoader::default()
            .from_yaml(file.path())
            .expect("should load YAML file")
            .into_generic()
    }

    #[test]
    fn get_typed_nested_key() {
        let config = config_from_yaml("server:\n  port: 8443\n  name: api\n");

        assert_eq!(config.get_typed::<u16>("server.port").unwrap(), 8443);
        assert_eq!(config.get_typed::<String>("server.name").unwrap(), "api");
    }

    #[test]
    fn get_typed_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().expect("should create temporary file");
        file.write_all(b"{\"server\":{\"port\":8443}}")
            .expect("should write JSON contents");

        let config = ConfigurationLoader::default()
            .from_json(file.path())
            .expect("should load JSON file")
            .into_generic();

        assert_eq!(config.get_typed::<u16>("server.port").unwrap(), 8443);
    }

    #[test]
    fn try_from_sources_ignore_unreadable_files() {
        let mut file = tempfile::NamedTempFile::new().expect("should create temporary file");
        file.write_all(b"server:\n  port: 8443\n").expect("should write YAML contents");

        // Missing files are skipped while readable ones still contribute.
        let config = ConfigurationLoader::default()
            .try_from_yaml("/nonexistent/cordon.yaml")
            .try_from_json("/nonexistent/cordon.json")
            .try_from_yaml(file.path())
            .into_generic();

        assert_eq!(config.get_typed::<u16>("server.port").unwrap(), 8443);
    }

    #[test]
    fn get_typed_or_default_swallows_missing_and_invalid() {
        let config = config_from_yaml("server:\n  port: [8443]\n");

        assert_eq!(config.get_typed_or_default::<u16>("server.port"), 0);
        assert_eq!(config.get_typed_or_default::<String>("server.name"), String::new());
    }

    #[test]
    fn as_typed_deserializes_whole_configuration() {
        #[derive(Deserialize)]
        struct Server {
            port: u16,
            name: String,
        }

        #[derive(Deserialize)]
        struct Root {
            server: Server,
        }

        let config = config_from_yaml("server:\n  port: 8443\n  name: api\n");

        let root = config.as_typed::<Root>().expect("should deserialize configuration");
        assert_eq!(root.server.port, 8443);
        assert_eq!(root.server.name, "api");
    }

    #[test]
    fn try_get_typed_missing_key_is_none() {
        let config = config_from_yaml("server:\n  port: 8443\n");

        let value = config.try_get_typed::<String>("server.name").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn get_typed_wrong_type_is_invalid_field_type() {
        let config = config_from_yaml("server:\n  port: [8443]\n");

        match config.get_typed::<u16>("server.port") {
            Err(ConfigurationError::InvalidFieldType { .. }) => {}
            result => panic!("expected invalid field type error, got {:?}", result.err()),
        }
    }

    #[test]
    fn get_typed_missing_key_is_missing_field() {
        let config = config_from_yaml("server:\n  port: 8443\n");

        match config.get_typed::<u16>("server.tls_port") {
            Err(ConfigurationError::MissingField { .. }) => {}
            result => panic!("expected missing field error, got {:?}", result.err()),
        }
    }

    #[test]
    fn scoped_view_joins_prefix() {
        let config = config_from_yaml("listeners:\n  https:\n    ssl:\n      protocol: TLSv1.3\n");
        let scoped = config.scoped("listeners.https.");

        assert_eq!(scoped.get_typed::<String>("ssl.protocol").unwrap(), "TLSv1.3");
        assert_eq!(scoped.try_get_typed::<String>("ssl.provider").unwrap(), None);
    }

    #[test]
    fn environment_underscore_fallback() {
        std::env::set_var("CORDON_CONFIG_TEST_SSL_PROTOCOL", "TLSv1.2");

        let config = ConfigurationLoader::default()
            .from_environment("CORDON_CONFIG_TEST")
            .expect("should load environment variables")
            .into_generic();

        // The dotted form isn't present directly, so the lookup falls back to the
        // underscore-separated form sourced from the environment.
        assert_eq!(config.get_typed::<String>("ssl.protocol").unwrap(), "TLSv1.2");

        std::env::remove_var("CORDON_CONFIG_TEST_SSL_PROTOCOL");
    }

    #[test]
    fn password_deserializes_from_string_only() {
        let config = config_from_yaml("keystore:\n  password: hunter2\n  bogus: [1, 2]\n");

        let password = config.get_typed::<Password>("keystore.password").unwrap();
        assert_eq!(password.expose(), "hunter2");

        match config.get_typed::<Password>("keystore.bogus") {
            Err(ConfigurationError::InvalidFieldType { .. }) => {}
            result => panic!("expected invalid field type error, got {:?}", result.err()),
        }
    }
}
