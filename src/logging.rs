//! Logging macro shared by every module.
//!
//! `knx_log!` forwards to the `log` crate by default and to `defmt` when the
//! `defmt` feature is enabled, so protocol code logs the same way on a host and
//! on a microcontroller.
//!
//! # Usage
//!
//! ```rust,ignore
//! knx_log!(info, "Tunnel connected on channel {}", channel);
//! knx_log!(debug, "Dropped {} bytes", n);
//! knx_log!(warn, "Retransmitting sequence {}", seq);
//! ```
//!
//! Arguments must implement `Display` for `log` and `defmt::Format` for `defmt`.

/// Log through the backend selected at compile time.
#[macro_export]
#[cfg(not(feature = "defmt"))]
macro_rules! knx_log {
    (info, $($arg:tt)*) => { log::info!($($arg)*) };
    (debug, $($arg:tt)*) => { log::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { log::warn!($($arg)*) };
    (error, $($arg:tt)*) => { log::error!($($arg)*) };
    (trace, $($arg:tt)*) => { log::trace!($($arg)*) };
}

#[macro_export]
#[cfg(feature = "defmt")]
macro_rules! knx_log {
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}
