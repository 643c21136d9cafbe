use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use cordon_error::{generic_error, GenericError};
use rustls::crypto::CryptoProvider;
use tracing::debug;

/// Tracks whether the auxiliary cryptography provider has been registered for this process.
static PROVIDER_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Lock dedicated to the registration decision, and nothing else.
static PROVIDER_REGISTRATION_LOCK: Mutex<()> = Mutex::new(());

/// Number of registration events that have actually occurred.
static PROVIDER_REGISTRATIONS: AtomicUsize = AtomicUsize::new(0);

/// Ensures the auxiliary cryptography provider is registered for this process.
///
/// This installs [AWS-LC][aws_lc] as the process-wide default `CryptoProvider` for `rustls`, which
/// key-material loading relies on being in place before any keystore is parsed. Registration
/// happens at most once for the process lifetime, regardless of how many threads call this
/// concurrently, and the provider is never uninstalled afterwards.
///
/// Safe to call from multiple threads simultaneously: a fast unsynchronized check is followed by a
/// re-check under a dedicated lock, and only the first caller through performs the installation.
///
/// ## Errors
///
/// If no default provider could be installed and none is otherwise present, an error will be
/// returned.
///
/// [aws_lc]: https://github.com/aws/aws-lc-rs
pub fn ensure_crypto_provider_registered() -> Result<(), GenericError> {
    // Fast path: registration already completed.
    if PROVIDER_REGISTERED.load(Ordering::Acquire) {
        return Ok(());
    }

    let _guard = PROVIDER_REGISTRATION_LOCK
        .lock()
        .map_err(|_| generic_error!("Cryptography provider registration lock poisoned."))?;

    // Re-check under the lock: another thread may have won the race.
    if PROVIDER_REGISTERED.load(Ordering::Acquire) {
        return Ok(());
    }

    if CryptoProvider::get_default().is_none() {
        match rustls::crypto::aws_lc_rs::default_provider().install_default() {
            Ok(()) => debug!("Installed AWS-LC as the process-wide default cryptography provider."),
            Err(_) => {
                // Installation only fails when a default provider is already in place, so losing
                // an install race against code outside this registry still leaves the process with
                // a registered provider.
                if CryptoProvider::get_default().is_none() {
                    return Err(generic_error!(
                        "Failed to install AWS-LC as the default cryptography provider."
                    ));
                }
            }
        }
    }

    PROVIDER_REGISTRATIONS.fetch_add(1, Ordering::AcqRel);
    PROVIDER_REGISTERED.store(true, Ordering::Release);

    Ok(())
}

/// Returns the number of provider registration events that have occurred in this process.
///
/// Always `0` or `1`: registration is a one-time, process-wide event. Exposed so that callers (and
/// tests) can verify the at-most-once guarantee.
pub fn registration_count() -> usize {
    PROVIDER_REGISTRATIONS.load(Ordering::Acquire)
}
