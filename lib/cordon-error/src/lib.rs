/// A generic, opaque error.
///
/// Used for errors that are only ever reported, never matched on. Components with a meaningful
/// error taxonomy define their own enumerated error types instead.
pub type GenericError = anyhow::Error;

/// Macro for constructing a generic error.
///
/// The resulting value evaluates to [`GenericError`], and can be constructed from a string literal,
/// a format string (with arguments accepted, in the same order as `std::format!`), or a value which
/// implements `Debug` and `Display`, such as an existing error that implements `std::error::Error`.
///
/// When the value given implements `std::error::Error`, the source of the existing error value will
/// be used as the source of the error created by this macro.
#[macro_export]
macro_rules! generic_error {
    // This macro forwards to the [`anyhow::anyhow`] macro, and is intended to be used in place of that macro. We simply
    // use our own macro, instead of re-exporting it, so that we can provide better documentation that isn't
    // `anyhow`-specific.
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;
