//! Modbus TCP framing constants and function codes.
//!
//! Request frames produced by this crate are fixed at 12 bytes:
//! an 8-byte header (MBAP plus function code) and a 4-byte body.

// ============================================================================
// Frame Size Constants
// ============================================================================

/// MBAP prefix preceding the unit id:
/// Transaction ID(2) + Protocol ID(2) + Length(2) = 6 bytes
pub const MBAP_HEADER_LEN: usize = 6;

/// Header length including unit id and function code.
/// Response bodies start at this offset.
pub const REQUEST_HEADER_LEN: usize = 8;

/// Body length for every single-address request (read or write).
pub const REQUEST_BODY_LEN: usize = 4;

/// Total request frame size.
pub const REQUEST_FRAME_LEN: usize = REQUEST_HEADER_LEN + REQUEST_BODY_LEN;

/// Value of the MBAP Length field for fixed-size requests:
/// Unit ID(1) + Function Code(1) + Body(4)
pub const REQUEST_LENGTH_FIELD: u16 = (REQUEST_FRAME_LEN - MBAP_HEADER_LEN) as u16;

/// Protocol identifier for Modbus over TCP.
pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// Maximum PDU size per Modbus specification.
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum MBAP length field value (Unit ID + PDU).
pub const MAX_MBAP_LENGTH: usize = 1 + MAX_PDU_SIZE;

/// Offset of the byte-count field in read responses.
pub const BYTE_COUNT_OFFSET: usize = REQUEST_HEADER_LEN;

/// Offset of the first data byte in read responses.
pub const DATA_OFFSET: usize = BYTE_COUNT_OFFSET + 1;

// ============================================================================
// Read Limits
// ============================================================================

/// Maximum registers for FC03/FC04.
///
/// Response PDU: FC(1) + ByteCount(1) + N*2 <= 253, so N <= 125.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Maximum coils/inputs for FC01/FC02.
pub const MAX_READ_COILS: u16 = 2000;

// ============================================================================
// Coil Values
// ============================================================================

/// Wire value for a coil switched ON (FC05).
pub const COIL_ON: u16 = 0xFF00;

/// Wire value for a coil switched OFF (FC05).
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Bit set on the function code of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Server Device Failure
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Server Device Busy
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;

/// Gateway Path Unavailable
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;

/// Gateway Target Device Failed to Respond
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;

/// Human-readable name of an exception code.
pub fn exception_description(code: u8) -> &'static str {
    match code {
        EXCEPTION_ILLEGAL_FUNCTION => "Illegal Function",
        EXCEPTION_ILLEGAL_DATA_ADDRESS => "Illegal Data Address",
        EXCEPTION_ILLEGAL_DATA_VALUE => "Illegal Data Value",
        EXCEPTION_SERVER_DEVICE_FAILURE => "Server Device Failure",
        EXCEPTION_ACKNOWLEDGE => "Acknowledge",
        EXCEPTION_SERVER_DEVICE_BUSY => "Server Device Busy",
        EXCEPTION_GATEWAY_PATH_UNAVAILABLE => "Gateway Path Unavailable",
        EXCEPTION_GATEWAY_TARGET_FAILED => "Gateway Target Failed to Respond",
        _ => "Unknown Exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_constants() {
        assert_eq!(MBAP_HEADER_LEN, 6);
        assert_eq!(REQUEST_HEADER_LEN, 8);
        assert_eq!(REQUEST_FRAME_LEN, 12);
        assert_eq!(REQUEST_LENGTH_FIELD, 6);
        assert_eq!(MAX_MBAP_LENGTH, 254);
    }

    #[test]
    fn test_read_limits_fit_pdu() {
        let register_pdu = 1 + 1 + (MAX_READ_REGISTERS as usize * 2);
        assert!(register_pdu <= MAX_PDU_SIZE);

        let coil_pdu = 1 + 1 + (MAX_READ_COILS as usize).div_ceil(8);
        assert!(coil_pdu <= MAX_PDU_SIZE);
    }

    #[test]
    fn test_exception_description() {
        assert_eq!(exception_description(0x02), "Illegal Data Address");
        assert_eq!(exception_description(0x7F), "Unknown Exception");
    }
}
