//! USB error types

use core::fmt;

/// USB operation result type
pub type Result<T> = core::result::Result<T, UsbError>;

/// USB error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbError {
    /// Timeout waiting for a controller register bit
    Timeout,
    /// Endpoint rejected the request (STALL handshake)
    Stall,
    /// Endpoint not ready (NAK handshake)
    Nak,
    /// Transaction failed with an unexpected channel interrupt pattern
    TransactionError,
    /// Invalid parameter
    InvalidParameter,
    /// No available resources (registry entries, buffers)
    NoResources,
}

impl fmt::Display for UsbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Timeout"),
            Self::Stall => write!(f, "USB stall"),
            Self::Nak => write!(f, "Device NAK"),
            Self::TransactionError => write!(f, "Transaction error"),
            Self::InvalidParameter => write!(f, "Invalid parameter"),
            Self::NoResources => write!(f, "No resources available"),
        }
    }
}
