//! # Modbus Function Codec
//!
//! One type per function code, all sharing the [`ModbusFunction`] contract:
//! pack a 12-byte request from typed parameters, parse a response into a
//! [`PointValues`] map.
//!
//! | Code | Type | Parameters | Response points |
//! |------|------|------------|-----------------|
//! | 0x01 | [`ReadCoilsFunction`] | read | `DigitalOutput`, 0/1 |
//! | 0x02 | [`ReadDiscreteInputsFunction`] | read | `DigitalInput`, 0/1 |
//! | 0x03 | [`ReadHoldingRegistersFunction`] | read | `AnalogOutput` |
//! | 0x04 | [`ReadInputRegistersFunction`] | read | `AnalogInput` |
//! | 0x05 | [`WriteSingleCoilFunction`] | write | `DigitalOutput`, 0/1 |
//! | 0x06 | [`WriteSingleRegisterFunction`] | write | `AnalogOutput` |
//!
//! Each constructor accepts only its own parameter type. When the variant is
//! chosen at runtime from a function-code tag, use [`create_function`].
//!
//! ## Example
//!
//! ```rust
//! use modbus_scada::{ModbusFunction, ReadCoilsFunction, ReadCommandParameters};
//!
//! let params = ReadCommandParameters::new(7, 1, 0x01, 100, 5);
//! let function = ReadCoilsFunction::new(params).unwrap();
//! let request = function.pack_request();
//! assert_eq!(&request[..], &[0, 7, 0, 0, 0, 6, 1, 1, 0, 0x64, 0, 5]);
//! ```

use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::constants::{
    BYTE_COUNT_OFFSET, COIL_OFF, COIL_ON, DATA_OFFSET, EXCEPTION_FLAG, FC_READ_COILS,
    FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS,
    FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, MAX_READ_COILS, MAX_READ_REGISTERS,
    REQUEST_HEADER_LEN,
};
use crate::error::{ModbusError, ModbusResult};
use crate::frame::{RequestFrame, ResponseFrame};
use crate::params::{
    CommandParameters, ModbusHeader, ReadCommandParameters, WriteCommandParameters,
};
use crate::point::{PointIdentifier, PointType, PointValues};

/// Supported function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// FC01
    ReadCoils,
    /// FC02
    ReadDiscreteInputs,
    /// FC03
    ReadHoldingRegisters,
    /// FC04
    ReadInputRegisters,
    /// FC05
    WriteSingleCoil,
    /// FC06
    WriteSingleRegister,
}

impl FunctionCode {
    /// Parse a raw function code.
    pub fn from_u8(code: u8) -> ModbusResult<Self> {
        match code {
            FC_READ_COILS => Ok(FunctionCode::ReadCoils),
            FC_READ_DISCRETE_INPUTS => Ok(FunctionCode::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Ok(FunctionCode::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(FunctionCode::ReadInputRegisters),
            FC_WRITE_SINGLE_COIL => Ok(FunctionCode::WriteSingleCoil),
            FC_WRITE_SINGLE_REGISTER => Ok(FunctionCode::WriteSingleRegister),
            _ => Err(ModbusError::invalid_function(code)),
        }
    }

    /// Raw function code.
    pub fn to_u8(self) -> u8 {
        match self {
            FunctionCode::ReadCoils => FC_READ_COILS,
            FunctionCode::ReadDiscreteInputs => FC_READ_DISCRETE_INPUTS,
            FunctionCode::ReadHoldingRegisters => FC_READ_HOLDING_REGISTERS,
            FunctionCode::ReadInputRegisters => FC_READ_INPUT_REGISTERS,
            FunctionCode::WriteSingleCoil => FC_WRITE_SINGLE_COIL,
            FunctionCode::WriteSingleRegister => FC_WRITE_SINGLE_REGISTER,
        }
    }

    /// Type name used in error messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            FunctionCode::ReadCoils => "ReadCoils",
            FunctionCode::ReadDiscreteInputs => "ReadDiscreteInputs",
            FunctionCode::ReadHoldingRegisters => "ReadHoldingRegisters",
            FunctionCode::ReadInputRegisters => "ReadInputRegisters",
            FunctionCode::WriteSingleCoil => "WriteSingleCoil",
            FunctionCode::WriteSingleRegister => "WriteSingleRegister",
        }
    }

    /// True for FC01-FC04.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            FunctionCode::ReadCoils
                | FunctionCode::ReadDiscreteInputs
                | FunctionCode::ReadHoldingRegisters
                | FunctionCode::ReadInputRegisters
        )
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (FC{:02X})", self.name(), self.to_u8())
    }
}

/// Pack/parse contract shared by all function codes.
///
/// Implementations hold only their parameters, so a single instance can be
/// packed and parsed repeatedly and shared across threads.
pub trait ModbusFunction: Send + Sync + fmt::Debug {
    /// Which function this is.
    fn function_code(&self) -> FunctionCode;

    /// Header fields of the owned parameters.
    fn header(&self) -> &ModbusHeader;

    /// Encode the 12-byte request frame.
    fn pack_request(&self) -> Bytes;

    /// Decode a full response frame (header included).
    fn parse_response(&self, response: &[u8]) -> ModbusResult<PointValues>;
}

// ============================================================================
// Shared helpers
// ============================================================================

fn check_function_code(
    header: &ModbusHeader,
    expected: FunctionCode,
    parameter_kind: &'static str,
) -> ModbusResult<()> {
    if header.function_code != expected.to_u8() {
        return Err(ModbusError::ParameterMismatch {
            function: expected.name(),
            expected: parameter_kind,
        });
    }
    Ok(())
}

fn check_quantity(params: &ReadCommandParameters, max: u16) -> ModbusResult<()> {
    if params.quantity == 0 || params.quantity > max {
        return Err(ModbusError::invalid_data(format!(
            "quantity {} at address {} outside 1..={}",
            params.quantity, params.start_address, max
        )));
    }
    Ok(())
}

fn pack_read(params: &ReadCommandParameters) -> Bytes {
    RequestFrame::with_header(&params.header)
        .address(params.start_address)
        .quantity(params.quantity)
        .build()
}

fn pack_write(params: &WriteCommandParameters) -> Bytes {
    RequestFrame::with_header(&params.header)
        .address(params.output_address)
        .value(params.value)
        .build()
}

/// Validate the response header against the request and return a reader.
fn open_response<'a>(
    response: &'a [u8],
    header: &ModbusHeader,
    code: FunctionCode,
    address: u16,
) -> ModbusResult<ResponseFrame<'a>> {
    let frame = ResponseFrame::new(response, code.name(), address)?;
    frame.check_transaction(header.transaction_id)?;
    frame.check_exception()?;
    if frame.function_code() & !EXCEPTION_FLAG != code.to_u8() {
        return Err(frame.error(format!(
            "function code {:02X} does not match request {:02X}",
            frame.function_code(),
            code.to_u8()
        )));
    }
    Ok(frame)
}

/// Bits are consumed LSB first; decoding stops after `quantity` bits and
/// never reads past the declared byte count.
fn parse_bits(
    response: &[u8],
    params: &ReadCommandParameters,
    code: FunctionCode,
    point_type: PointType,
) -> ModbusResult<PointValues> {
    let frame = open_response(response, &params.header, code, params.start_address)?;
    let byte_count = usize::from(frame.u8_at(BYTE_COUNT_OFFSET)?);
    let data = frame.bytes_at(DATA_OFFSET, byte_count)?;

    let quantity = usize::from(params.quantity);
    if byte_count * 8 < quantity {
        return Err(frame.error(format!(
            "byte count {} cannot hold {} bits",
            byte_count, quantity
        )));
    }

    let values: PointValues = data
        .iter()
        .flat_map(|&byte| (0..8).map(move |bit| u16::from((byte >> bit) & 1)))
        .take(quantity)
        .enumerate()
        .map(|(i, bit)| {
            let address = params.start_address.wrapping_add(i as u16);
            (PointIdentifier::new(point_type, address), bit)
        })
        .collect();

    debug!(
        "{} parsed: start={}, bits={}, byte_count={}",
        code.name(),
        params.start_address,
        values.len(),
        byte_count
    );
    Ok(values)
}

fn parse_registers(
    response: &[u8],
    params: &ReadCommandParameters,
    code: FunctionCode,
    point_type: PointType,
) -> ModbusResult<PointValues> {
    let frame = open_response(response, &params.header, code, params.start_address)?;
    let byte_count = usize::from(frame.u8_at(BYTE_COUNT_OFFSET)?);
    if byte_count % 2 != 0 || byte_count != usize::from(params.quantity) * 2 {
        return Err(frame.error(format!(
            "byte count {} inconsistent with quantity {}",
            byte_count, params.quantity
        )));
    }
    let data = frame.bytes_at(DATA_OFFSET, byte_count)?;

    let values: PointValues = data
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| {
            let address = params.start_address.wrapping_add(i as u16);
            (
                PointIdentifier::new(point_type, address),
                u16::from_be_bytes([pair[0], pair[1]]),
            )
        })
        .collect();

    debug!(
        "{} parsed: start={}, registers={}",
        code.name(),
        params.start_address,
        values.len()
    );
    Ok(values)
}

/// Decode a write echo: address at offset 8, value at offset 10.
fn parse_echo(
    response: &[u8],
    params: &WriteCommandParameters,
    code: FunctionCode,
) -> ModbusResult<(u16, u16)> {
    let frame = open_response(response, &params.header, code, params.output_address)?;
    let address = frame.u16_at(REQUEST_HEADER_LEN)?;
    let value = frame.u16_at(REQUEST_HEADER_LEN + 2)?;
    debug!("{} echo: address={}, value={:#06X}", code.name(), address, value);
    Ok((address, value))
}

// ============================================================================
// Read functions
// ============================================================================

/// FC01: read coils into `DigitalOutput` points.
#[derive(Debug, Clone)]
pub struct ReadCoilsFunction {
    params: ReadCommandParameters,
}

impl ReadCoilsFunction {
    /// Fails if the function code is not FC01 or the quantity is out of range.
    pub fn new(params: ReadCommandParameters) -> ModbusResult<Self> {
        check_function_code(&params.header, FunctionCode::ReadCoils, "FC01 read parameters")?;
        check_quantity(&params, MAX_READ_COILS)?;
        Ok(Self { params })
    }

    /// Owned parameters
    pub fn params(&self) -> &ReadCommandParameters {
        &self.params
    }
}

impl ModbusFunction for ReadCoilsFunction {
    fn function_code(&self) -> FunctionCode {
        FunctionCode::ReadCoils
    }

    fn header(&self) -> &ModbusHeader {
        &self.params.header
    }

    fn pack_request(&self) -> Bytes {
        pack_read(&self.params)
    }

    fn parse_response(&self, response: &[u8]) -> ModbusResult<PointValues> {
        parse_bits(
            response,
            &self.params,
            FunctionCode::ReadCoils,
            PointType::DigitalOutput,
        )
    }
}

/// FC02: read discrete inputs into `DigitalInput` points.
#[derive(Debug, Clone)]
pub struct ReadDiscreteInputsFunction {
    params: ReadCommandParameters,
}

impl ReadDiscreteInputsFunction {
    /// Fails if the function code is not FC02 or the quantity is out of range.
    pub fn new(params: ReadCommandParameters) -> ModbusResult<Self> {
        check_function_code(
            &params.header,
            FunctionCode::ReadDiscreteInputs,
            "FC02 read parameters",
        )?;
        check_quantity(&params, MAX_READ_COILS)?;
        Ok(Self { params })
    }

    /// Owned parameters
    pub fn params(&self) -> &ReadCommandParameters {
        &self.params
    }
}

impl ModbusFunction for ReadDiscreteInputsFunction {
    fn function_code(&self) -> FunctionCode {
        FunctionCode::ReadDiscreteInputs
    }

    fn header(&self) -> &ModbusHeader {
        &self.params.header
    }

    fn pack_request(&self) -> Bytes {
        pack_read(&self.params)
    }

    fn parse_response(&self, response: &[u8]) -> ModbusResult<PointValues> {
        parse_bits(
            response,
            &self.params,
            FunctionCode::ReadDiscreteInputs,
            PointType::DigitalInput,
        )
    }
}

/// FC03: read holding registers into `AnalogOutput` points.
#[derive(Debug, Clone)]
pub struct ReadHoldingRegistersFunction {
    params: ReadCommandParameters,
}

impl ReadHoldingRegistersFunction {
    /// Fails if the function code is not FC03 or the quantity is out of range.
    pub fn new(params: ReadCommandParameters) -> ModbusResult<Self> {
        check_function_code(
            &params.header,
            FunctionCode::ReadHoldingRegisters,
            "FC03 read parameters",
        )?;
        check_quantity(&params, MAX_READ_REGISTERS)?;
        Ok(Self { params })
    }

    /// Owned parameters
    pub fn params(&self) -> &ReadCommandParameters {
        &self.params
    }
}

impl ModbusFunction for ReadHoldingRegistersFunction {
    fn function_code(&self) -> FunctionCode {
        FunctionCode::ReadHoldingRegisters
    }

    fn header(&self) -> &ModbusHeader {
        &self.params.header
    }

    fn pack_request(&self) -> Bytes {
        pack_read(&self.params)
    }

    fn parse_response(&self, response: &[u8]) -> ModbusResult<PointValues> {
        parse_registers(
            response,
            &self.params,
            FunctionCode::ReadHoldingRegisters,
            PointType::AnalogOutput,
        )
    }
}

/// FC04: read input registers into `AnalogInput` points.
#[derive(Debug, Clone)]
pub struct ReadInputRegistersFunction {
    params: ReadCommandParameters,
}

impl ReadInputRegistersFunction {
    /// Fails if the function code is not FC04 or the quantity is out of range.
    pub fn new(params: ReadCommandParameters) -> ModbusResult<Self> {
        check_function_code(
            &params.header,
            FunctionCode::ReadInputRegisters,
            "FC04 read parameters",
        )?;
        check_quantity(&params, MAX_READ_REGISTERS)?;
        Ok(Self { params })
    }

    /// Owned parameters
    pub fn params(&self) -> &ReadCommandParameters {
        &self.params
    }
}

impl ModbusFunction for ReadInputRegistersFunction {
    fn function_code(&self) -> FunctionCode {
        FunctionCode::ReadInputRegisters
    }

    fn header(&self) -> &ModbusHeader {
        &self.params.header
    }

    fn pack_request(&self) -> Bytes {
        pack_read(&self.params)
    }

    fn parse_response(&self, response: &[u8]) -> ModbusResult<PointValues> {
        parse_registers(
            response,
            &self.params,
            FunctionCode::ReadInputRegisters,
            PointType::AnalogInput,
        )
    }
}

// ============================================================================
// Write functions
// ============================================================================

/// FC05: switch one coil; the echo decodes to a 0/1 `DigitalOutput` value.
#[derive(Debug, Clone)]
pub struct WriteSingleCoilFunction {
    params: WriteCommandParameters,
}

impl WriteSingleCoilFunction {
    /// Fails if the function code is not FC05 or the value is not 0x0000/0xFF00.
    pub fn new(params: WriteCommandParameters) -> ModbusResult<Self> {
        check_function_code(
            &params.header,
            FunctionCode::WriteSingleCoil,
            "FC05 write parameters",
        )?;
        if params.value != COIL_ON && params.value != COIL_OFF {
            return Err(ModbusError::invalid_data(format!(
                "coil value {:#06X} at address {} must be 0x0000 or 0xFF00",
                params.value, params.output_address
            )));
        }
        Ok(Self { params })
    }

    /// Owned parameters
    pub fn params(&self) -> &WriteCommandParameters {
        &self.params
    }
}

impl ModbusFunction for WriteSingleCoilFunction {
    fn function_code(&self) -> FunctionCode {
        FunctionCode::WriteSingleCoil
    }

    fn header(&self) -> &ModbusHeader {
        &self.params.header
    }

    fn pack_request(&self) -> Bytes {
        pack_write(&self.params)
    }

    fn parse_response(&self, response: &[u8]) -> ModbusResult<PointValues> {
        let (address, value) = parse_echo(response, &self.params, FunctionCode::WriteSingleCoil)?;
        let mut values = PointValues::new();
        values.insert(
            PointIdentifier::new(PointType::DigitalOutput, address),
            u16::from(value == COIL_ON),
        );
        Ok(values)
    }
}

/// FC06: write one holding register; the echo decodes to an `AnalogOutput` value.
#[derive(Debug, Clone)]
pub struct WriteSingleRegisterFunction {
    params: WriteCommandParameters,
}

impl WriteSingleRegisterFunction {
    /// Fails if the function code is not FC06.
    pub fn new(params: WriteCommandParameters) -> ModbusResult<Self> {
        check_function_code(
            &params.header,
            FunctionCode::WriteSingleRegister,
            "FC06 write parameters",
        )?;
        Ok(Self { params })
    }

    /// Owned parameters
    pub fn params(&self) -> &WriteCommandParameters {
        &self.params
    }
}

impl ModbusFunction for WriteSingleRegisterFunction {
    fn function_code(&self) -> FunctionCode {
        FunctionCode::WriteSingleRegister
    }

    fn header(&self) -> &ModbusHeader {
        &self.params.header
    }

    fn pack_request(&self) -> Bytes {
        pack_write(&self.params)
    }

    fn parse_response(&self, response: &[u8]) -> ModbusResult<PointValues> {
        let (address, value) =
            parse_echo(response, &self.params, FunctionCode::WriteSingleRegister)?;
        let mut values = PointValues::new();
        values.insert(PointIdentifier::new(PointType::AnalogOutput, address), value);
        Ok(values)
    }
}

// ============================================================================
// Tag dispatch
// ============================================================================

/// Build the function named by the header's function code.
///
/// Fails with [`ModbusError::InvalidFunction`] for unknown codes and
/// [`ModbusError::ParameterMismatch`] when read parameters are given to a
/// write function or vice versa.
pub fn create_function(params: CommandParameters) -> ModbusResult<Box<dyn ModbusFunction>> {
    let code = FunctionCode::from_u8(params.header().function_code)?;
    let function: Box<dyn ModbusFunction> = match (code, params) {
        (FunctionCode::ReadCoils, CommandParameters::Read(p)) => {
            Box::new(ReadCoilsFunction::new(p)?)
        }
        (FunctionCode::ReadDiscreteInputs, CommandParameters::Read(p)) => {
            Box::new(ReadDiscreteInputsFunction::new(p)?)
        }
        (FunctionCode::ReadHoldingRegisters, CommandParameters::Read(p)) => {
            Box::new(ReadHoldingRegistersFunction::new(p)?)
        }
        (FunctionCode::ReadInputRegisters, CommandParameters::Read(p)) => {
            Box::new(ReadInputRegistersFunction::new(p)?)
        }
        (FunctionCode::WriteSingleCoil, CommandParameters::Write(p)) => {
            Box::new(WriteSingleCoilFunction::new(p)?)
        }
        (FunctionCode::WriteSingleRegister, CommandParameters::Write(p)) => {
            Box::new(WriteSingleRegisterFunction::new(p)?)
        }
        (code, _) => {
            return Err(ModbusError::ParameterMismatch {
                function: code.name(),
                expected: if code.is_read() {
                    "read parameters"
                } else {
                    "write parameters"
                },
            })
        }
    };
    Ok(function)
}
