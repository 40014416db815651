//! Request frame assembly and bounds-checked response reading.
//!
//! All multi-byte fields are big-endian. A [`ResponseFrame`] never indexes
//! past the buffer: every read returns a [`ModbusError::Frame`] naming the
//! function and address that produced the request.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::constants::{
    exception_description, EXCEPTION_FLAG, REQUEST_FRAME_LEN, REQUEST_HEADER_LEN,
};
use crate::error::{ModbusError, ModbusResult};
use crate::params::ModbusHeader;

/// Fixed-size request builder - fluent API
pub struct RequestFrame {
    buf: BytesMut,
}

impl RequestFrame {
    /// Start a frame with the 8-byte header.
    #[inline]
    pub fn with_header(header: &ModbusHeader) -> Self {
        let mut buf = BytesMut::with_capacity(REQUEST_FRAME_LEN);
        buf.put_u16(header.transaction_id);
        buf.put_u16(header.protocol_id);
        buf.put_u16(header.length);
        buf.put_u8(header.unit_id);
        buf.put_u8(header.function_code);
        Self { buf }
    }

    /// Add address
    #[inline]
    pub fn address(mut self, addr: u16) -> Self {
        self.buf.put_u16(addr);
        self
    }

    /// Add quantity
    #[inline]
    pub fn quantity(mut self, qty: u16) -> Self {
        self.buf.put_u16(qty);
        self
    }

    /// Add a register or coil value
    #[inline]
    pub fn value(mut self, value: u16) -> Self {
        self.buf.put_u16(value);
        self
    }

    /// Finish the frame
    #[inline]
    pub fn build(self) -> Bytes {
        let frame = self.buf.freeze();
        if let Some(&fc) = frame.get(REQUEST_HEADER_LEN - 1) {
            debug!(
                "Request built: FC={:02X} ({}), total_len={}",
                fc,
                function_code_description(fc),
                frame.len()
            );
        }
        frame
    }
}

/// Read-only view over a response buffer.
#[derive(Debug, Clone, Copy)]
pub struct ResponseFrame<'a> {
    data: &'a [u8],
    function: &'static str,
    address: u16,
}

impl<'a> ResponseFrame<'a> {
    /// Wrap a response; fails if the 8-byte header is incomplete.
    pub fn new(data: &'a [u8], function: &'static str, address: u16) -> ModbusResult<Self> {
        if data.len() < REQUEST_HEADER_LEN {
            return Err(ModbusError::frame(
                function,
                address,
                format!(
                    "response is {} bytes, header needs {}",
                    data.len(),
                    REQUEST_HEADER_LEN
                ),
            ));
        }
        Ok(Self {
            data,
            function,
            address,
        })
    }

    /// Raw buffer
    #[inline]
    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Current length
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: construction rejects short buffers
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Echoed transaction id
    #[inline]
    pub fn transaction_id(&self) -> u16 {
        u16::from_be_bytes([self.data[0], self.data[1]])
    }

    /// Unit id byte
    #[inline]
    pub fn unit_id(&self) -> u8 {
        self.data[6]
    }

    /// Function code byte (may carry the exception flag)
    #[inline]
    pub fn function_code(&self) -> u8 {
        self.data[7]
    }

    /// Check if exception response
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code() & EXCEPTION_FLAG != 0
    }

    /// Fail with [`ModbusError::Exception`] if the device reported one.
    pub fn check_exception(&self) -> ModbusResult<()> {
        if !self.is_exception() {
            return Ok(());
        }
        let code = self.u8_at(REQUEST_HEADER_LEN)?;
        Err(ModbusError::Exception {
            function: self.function_code() & !EXCEPTION_FLAG,
            code,
            message: exception_description(code).to_string(),
        })
    }

    /// Fail if the echoed transaction id differs from `expected`.
    pub fn check_transaction(&self, expected: u16) -> ModbusResult<()> {
        let actual = self.transaction_id();
        if actual != expected {
            return Err(ModbusError::TransactionMismatch { expected, actual });
        }
        Ok(())
    }

    /// Byte at `offset`.
    #[inline]
    pub fn u8_at(&self, offset: usize) -> ModbusResult<u8> {
        self.data
            .get(offset)
            .copied()
            .ok_or_else(|| self.short(offset + 1))
    }

    /// Big-endian u16 at `offset`.
    #[inline]
    pub fn u16_at(&self, offset: usize) -> ModbusResult<u16> {
        match self.data.get(offset..offset + 2) {
            Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
            None => Err(self.short(offset + 2)),
        }
    }

    /// `len` bytes starting at `offset`.
    #[inline]
    pub fn bytes_at(&self, offset: usize, len: usize) -> ModbusResult<&'a [u8]> {
        self.data
            .get(offset..offset + len)
            .ok_or_else(|| self.short(offset + len))
    }

    /// Build a decode error attributed to this frame.
    pub fn error(&self, message: impl Into<String>) -> ModbusError {
        ModbusError::frame(self.function, self.address, message)
    }

    fn short(&self, needed: usize) -> ModbusError {
        self.error(format!(
            "response is {} bytes, needs at least {}",
            self.data.len(),
            needed
        ))
    }
}

/// Human-readable function code description
pub fn function_code_description(fc: u8) -> &'static str {
    match fc & !EXCEPTION_FLAG {
        0x01 => "Read Coils",
        0x02 => "Read Discrete Inputs",
        0x03 => "Read Holding Registers",
        0x04 => "Read Input Registers",
        0x05 => "Write Single Coil",
        0x06 => "Write Single Register",
        _ => "Unknown Function",
    }
}
