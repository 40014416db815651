//! # Modbus SCADA - Modbus TCP Codec and Water Level Automation
//!
//! **Author:** Evan Liu <liuyifanz.1996@gmail.com>
//! **Version:** 0.1.0
//! **License:** MIT
//!
//! A supervisory control core for a single Modbus TCP device: a function
//! codec that packs fixed 12-byte requests and decodes responses into typed
//! point values, an alarm classifier, and a cyclic automation engine that
//! drives corrective writes through a queued dispatcher.
//!
//! ## Features
//!
//! - **One type per function code**: shared [`ModbusFunction`] contract,
//!   selected by [`FunctionCode`] tag
//! - **Strict decoding**: byte counts checked against the buffer and the
//!   requested quantity, exception responses surfaced as errors
//! - **Pure alarm classification**: plausibility first, inclusive thresholds
//! - **Async automation**: Tokio worker with a coalescing trigger and
//!   cooperative stop
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Point type |
//! |------|----------|------------|
//! | 0x01 | Read Coils | DIGITAL_OUTPUT |
//! | 0x02 | Read Discrete Inputs | DIGITAL_INPUT |
//! | 0x03 | Read Holding Registers | ANALOG_OUTPUT |
//! | 0x04 | Read Input Registers | ANALOG_INPUT |
//! | 0x05 | Write Single Coil | DIGITAL_OUTPUT |
//! | 0x06 | Write Single Register | ANALOG_OUTPUT |
//!
//! ## Quick Start
//!
//! ```rust
//! use modbus_scada::{
//!     create_function, CommandParameters, ModbusFunction, ModbusResult, ReadCommandParameters,
//!     FC_READ_INPUT_REGISTERS,
//! };
//!
//! fn main() -> ModbusResult<()> {
//!     let params = ReadCommandParameters::new(1, 1, FC_READ_INPUT_REGISTERS, 0, 2);
//!     let function = create_function(CommandParameters::Read(params))?;
//!
//!     let request = function.pack_request();
//!     assert_eq!(request.len(), 12);
//!
//!     let response = [0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x04, 0x04, 0x00, 0x2A, 0x00, 0x2B];
//!     let values = function.parse_response(&response)?;
//!     assert_eq!(values.len(), 2);
//!     Ok(())
//! }
//! ```

// ============================================================================
// Protocol modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus TCP constants
pub mod constants;

/// Point identity and decoded value maps
pub mod point;

/// Request headers and command parameters
pub mod params;

/// Request builder and bounds-checked response reader
pub mod frame;

/// Function codec: one type per function code
pub mod function;

// ============================================================================
// Processing modules
// ============================================================================

/// Alarm classification
pub mod alarm;

/// Engineering unit conversion
pub mod egu;

/// Point and runtime configuration
pub mod config;

/// Point value storage
pub mod storage;

/// Network transport
pub mod transport;

/// Write command dispatch
pub mod dispatcher;

/// Cyclic water level automation
pub mod automation;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use tokio;

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Codec ===
pub use function::{
    create_function, FunctionCode, ModbusFunction, ReadCoilsFunction, ReadDiscreteInputsFunction,
    ReadHoldingRegistersFunction, ReadInputRegistersFunction, WriteSingleCoilFunction,
    WriteSingleRegisterFunction,
};
pub use params::{CommandParameters, ModbusHeader, ReadCommandParameters, WriteCommandParameters};
pub use point::{PointIdentifier, PointType, PointValues};

// === Processing ===
pub use alarm::{classify_analog, classify_digital, AlarmType};
pub use automation::{AutomationManager, AutomationTrigger, WaterLevelPoints};
pub use config::{ConfigItem, Configuration, PointConfig, DEFAULT_TCP_PORT, DEFAULT_TIMEOUT_MS};
pub use dispatcher::{CommandDispatcher, CommandQueue, ProcessingManager};
pub use egu::EguConverter;
pub use storage::{MemoryStorage, PointSnapshot, Storage};
pub use transport::{FrameTransport, TcpFrameTransport};

// === Function codes ===
pub use constants::{
    FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Modbus SCADA v{} - Modbus TCP automation core by Evan Liu", VERSION)
}
