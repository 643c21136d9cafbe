use std::fmt;

use cordon_config::Password;
use cordon_error::{generic_error, GenericError};
use p12::PFX;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use snafu::{IntoError as _, Snafu};
use tracing::debug;

use crate::provider;

/// An error encountered while loading key material from a keystore.
///
/// Wraps the underlying cause (IO failure, malformed container, failed integrity check, missing
/// entries) together with the offending keystore path, for diagnosability.
#[derive(Debug, Snafu)]
#[snafu(display("Failed to load TLS keystore '{}'.", path))]
pub struct KeyMaterialError {
    path: String,
    source: GenericError,
}

/// In-memory key material: a private key plus its certificate chain.
///
/// Produced by explicit keystore loading. The private key is held in DER form and zeroed on drop.
pub struct KeyMaterialHandle {
    certificate_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
}

impl KeyMaterialHandle {
    /// The certificate chain, leaf first.
    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.certificate_chain
    }

    /// The private key.
    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.private_key
    }

    /// Consumes the handle, returning the certificate chain and private key.
    pub fn into_parts(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.certificate_chain, self.private_key)
    }
}

impl fmt::Debug for KeyMaterialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterialHandle")
            .field("certificates", &self.certificate_chain.len())
            .finish_non_exhaustive()
    }
}

/// Loads key material from the PKCS12 keystore at the given path.
///
/// The auxiliary cryptography provider is registered (if it wasn't already) before the store is
/// parsed. If a password is given, the store's integrity (MAC) is verified before anything is
/// extracted; if no password is given, the store is still opened but integrity checking is
/// disabled, so callers relying on tamper-detection must supply one.
pub(crate) fn load_key_material(path: &str, password: Option<&Password>) -> Result<KeyMaterialHandle, KeyMaterialError> {
    provider::ensure_crypto_provider_registered().map_err(|e| load_error(path, e))?;

    let contents = std::fs::read(path).map_err(|e| load_error(path, e.into()))?;
    let pfx = PFX::parse(&contents).map_err(|e| load_error(path, e.into()))?;

    // If a password is not set, access to the keystore is still available, but integrity checking
    // is disabled.
    if let Some(password) = password {
        if !pfx.verify_mac(password.expose()) {
            return Err(load_error(
                path,
                generic_error!("keystore integrity check failed (wrong password or tampered store)"),
            ));
        }
    }

    let decrypt_password = password.map(Password::expose).unwrap_or("");

    let mut keys = pfx.key_bags(decrypt_password).map_err(|e| load_error(path, e.into()))?;
    let private_key = match keys.len() {
        0 => return Err(load_error(path, generic_error!("keystore contains no private key entries"))),
        _ => PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(keys.remove(0))),
    };

    let certificate_chain = pfx
        .cert_bags(decrypt_password)
        .map_err(|e| load_error(path, e.into()))?
        .into_iter()
        .map(CertificateDer::from)
        .collect::<Vec<_>>();
    if certificate_chain.is_empty() {
        return Err(load_error(path, generic_error!("keystore contains no certificate entries")));
    }

    debug!(path, certificates = certificate_chain.len(), "Loaded PKCS12 keystore.");

    Ok(KeyMaterialHandle {
        certificate_chain,
        private_key,
    })
}

fn load_error(path: &str, source: GenericError) -> KeyMaterialError {
    KeyMaterialSnafu { path }.into_error(source)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use rcgen::{generate_simple_self_signed, CertifiedKey};
    use tempfile::NamedTempFile;

    use super::*;

    fn write_pkcs12_keystore(password: &str) -> NamedTempFile {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec!["localhost".to_string()]).expect("should generate certificate");

        let pfx = PFX::new(cert.der().as_ref(), &key_pair.serialize_der(), None, password, "cordon")
            .expect("should assemble PKCS12 container");

        let mut file = NamedTempFile::new().expect("should create temporary file");
        file.write_all(&pfx.to_der()).expect("should write keystore");
        file
    }

    #[test]
    fn load_with_password() {
        let keystore = write_pkcs12_keystore("hunter2");
        let path = keystore.path().to_string_lossy().into_owned();

        let handle = load_key_material(&path, Some(&Password::new("hunter2"))).expect("should load keystore");

        assert_eq!(handle.certificate_chain().len(), 1);
        assert!(matches!(handle.private_key(), PrivateKeyDer::Pkcs8(_)));

        let (chain, key) = handle.into_parts();
        assert_eq!(chain.len(), 1);
        assert!(matches!(key, PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn load_without_password_skips_integrity_check() {
        let keystore = write_pkcs12_keystore("");
        let path = keystore.path().to_string_lossy().into_owned();

        // No password supplied: the store still opens, with integrity verification disabled.
        let handle = load_key_material(&path, None).expect("should load keystore without password");

        assert_eq!(handle.certificate_chain().len(), 1);
    }

    #[test]
    fn load_with_wrong_password_fails_integrity_check() {
        let keystore = write_pkcs12_keystore("hunter2");
        let path = keystore.path().to_string_lossy().into_owned();

        let error = load_key_material(&path, Some(&Password::new("wrong"))).expect_err("should reject wrong password");
        assert!(format!("{:?}", error).contains("integrity check failed"));
    }

    #[test]
    fn load_missing_file_reports_path() {
        let result = load_key_material("/nonexistent/cordon-test.p12", None);

        let error = result.expect_err("should fail to load missing keystore");
        assert!(error.to_string().contains("/nonexistent/cordon-test.p12"));
    }

    #[test]
    fn load_registers_crypto_provider() {
        let keystore = write_pkcs12_keystore("");
        let path = keystore.path().to_string_lossy().into_owned();

        load_key_material(&path, None).expect("should load keystore");

        // Registration is process-wide and at-most-once, no matter how many loads have run.
        assert_eq!(provider::registration_count(), 1);
    }

    #[test]
    fn handle_debug_omits_key_material() {
        let keystore = write_pkcs12_keystore("hunter2");
        let path = keystore.path().to_string_lossy().into_owned();

        let handle = load_key_material(&path, Some(&Password::new("hunter2"))).expect("should load keystore");
        let debugged = format!("{:?}", handle);

        assert!(debugged.contains("certificates: 1"));
        assert!(!debugged.contains("private_key"));
    }
}
