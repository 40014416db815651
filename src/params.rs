//! Command parameters carried by every request.
//!
//! The header fields are shared; the body depends on whether the function
//! reads a range or writes a single address.

use crate::constants::{MODBUS_PROTOCOL_ID, REQUEST_LENGTH_FIELD};

/// MBAP header fields plus function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusHeader {
    /// Caller-assigned id, echoed by the device
    pub transaction_id: u16,
    /// Always 0 for Modbus TCP
    pub protocol_id: u16,
    /// Bytes following the length field (unit + function + body)
    pub length: u16,
    /// Sub-device address
    pub unit_id: u8,
    /// Operation
    pub function_code: u8,
}

impl ModbusHeader {
    /// Header for a fixed 12-byte request.
    pub fn new(transaction_id: u16, unit_id: u8, function_code: u8) -> Self {
        Self {
            transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            length: REQUEST_LENGTH_FIELD,
            unit_id,
            function_code,
        }
    }
}

/// Parameters for FC01-FC04.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCommandParameters {
    /// Shared header
    pub header: ModbusHeader,
    /// First coil/register
    pub start_address: u16,
    /// Number of coils/registers
    pub quantity: u16,
}

impl ReadCommandParameters {
    /// Build read parameters with protocol id 0 and length 6.
    pub fn new(
        transaction_id: u16,
        unit_id: u8,
        function_code: u8,
        start_address: u16,
        quantity: u16,
    ) -> Self {
        Self {
            header: ModbusHeader::new(transaction_id, unit_id, function_code),
            start_address,
            quantity,
        }
    }
}

/// Parameters for FC05/FC06.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCommandParameters {
    /// Shared header
    pub header: ModbusHeader,
    /// Target coil/register
    pub output_address: u16,
    /// 0x0000/0xFF00 for coils, raw register value otherwise
    pub value: u16,
}

impl WriteCommandParameters {
    /// Build write parameters with protocol id 0 and length 6.
    pub fn new(
        transaction_id: u16,
        unit_id: u8,
        function_code: u8,
        output_address: u16,
        value: u16,
    ) -> Self {
        Self {
            header: ModbusHeader::new(transaction_id, unit_id, function_code),
            output_address,
            value,
        }
    }
}

/// Either parameter shape, for tag-driven construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandParameters {
    /// Range read
    Read(ReadCommandParameters),
    /// Single write
    Write(WriteCommandParameters),
}

impl CommandParameters {
    /// Shared header.
    pub fn header(&self) -> &ModbusHeader {
        match self {
            CommandParameters::Read(p) => &p.header,
            CommandParameters::Write(p) => &p.header,
        }
    }
}

impl From<ReadCommandParameters> for CommandParameters {
    fn from(params: ReadCommandParameters) -> Self {
        CommandParameters::Read(params)
    }
}

impl From<WriteCommandParameters> for CommandParameters {
    fn from(params: WriteCommandParameters) -> Self {
        CommandParameters::Write(params)
    }
}
