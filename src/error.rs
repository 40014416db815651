//! Error types for the codec, storage, dispatcher and transport layers.
//!
//! Classification never fails and the automation loop never surfaces write
//! failures, so every error here originates from frame handling, parameter
//! construction, configuration, or the wire.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Command parameters do not fit the function that was asked to consume them.
    #[error("{function}: parameter mismatch, expected {expected}")]
    ParameterMismatch {
        /// Function being constructed
        function: &'static str,
        /// Parameter shape the function requires
        expected: &'static str,
    },

    /// Parameter or point values outside protocol limits.
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Description
        message: String,
    },

    /// Malformed response frame.
    #[error("{function} response for address {address} is malformed: {message}")]
    Frame {
        /// Function that tried to decode the response
        function: &'static str,
        /// Start address (reads) or output address (writes) of the request
        address: u16,
        /// What was wrong with the buffer
        message: String,
    },

    /// Device answered with a Modbus exception response.
    #[error("Modbus exception for function {function:02X}: {message} (code {code:02X})")]
    Exception {
        /// Function code without the exception bit
        function: u8,
        /// Exception code
        code: u8,
        /// Human-readable exception name
        message: String,
    },

    /// Response does not echo the request's transaction id.
    #[error("Transaction id mismatch: expected {expected}, got {actual}")]
    TransactionMismatch {
        /// Transaction id sent
        expected: u16,
        /// Transaction id received
        actual: u16,
    },

    /// Function code with no codec variant.
    #[error("Unsupported function code: {code:02X}")]
    InvalidFunction {
        /// Raw function code
        code: u8,
    },

    /// Transport could not reach the device.
    #[error("Connection error: {message}")]
    Connection {
        /// Description
        message: String,
    },

    /// Transport operation exceeded its deadline.
    #[error("Timeout during {operation} after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description
        message: String,
    },

    /// Underlying socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModbusError {
    /// Build an [`ModbusError::InvalidData`].
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Build a [`ModbusError::Frame`] attributed to a function and address.
    pub fn frame(function: &'static str, address: u16, message: impl Into<String>) -> Self {
        Self::Frame {
            function,
            address,
            message: message.into(),
        }
    }

    /// Build a [`ModbusError::Connection`].
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Build a [`ModbusError::Timeout`].
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Build a [`ModbusError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Build a [`ModbusError::InvalidFunction`].
    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    /// True for faults that may clear on retry (transport-level).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_names_function_and_address() {
        let err = ModbusError::frame("ReadCoils", 100, "byte count 1 < 2");
        let text = err.to_string();
        assert!(text.contains("ReadCoils"));
        assert!(text.contains("100"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ModbusError::timeout("read", 1000).is_transient());
        assert!(ModbusError::connection("refused").is_transient());
        assert!(!ModbusError::invalid_function(0x2B).is_transient());
        assert!(!ModbusError::frame("ReadCoils", 0, "short").is_transient());
    }
}
