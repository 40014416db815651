//! # Frame Transport
//!
//! Moves one packed request to the device and returns the complete
//! response frame. Framing uses the MBAP length field: read the 6-byte
//! prefix, then exactly `length` more bytes.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN};
use crate::error::{ModbusError, ModbusResult};

/// Request/response exchange with a device.
pub trait FrameTransport: Send {
    /// Send `request` and return the full response frame.
    fn exchange(
        &mut self,
        request: &[u8],
    ) -> impl std::future::Future<Output = ModbusResult<Vec<u8>>> + Send;
}

/// Modbus TCP transport over a single connection.
///
/// A connection that saw a timeout or I/O error may still deliver a stale
/// response, so it is dropped and the next exchange reconnects.
#[derive(Debug)]
pub struct TcpFrameTransport {
    /// Device address
    pub address: SocketAddr,
    stream: Option<TcpStream>,
    timeout: Duration,
}

impl TcpFrameTransport {
    /// Connect within `timeout`.
    pub async fn connect(address: SocketAddr, timeout_duration: Duration) -> ModbusResult<Self> {
        let stream = open_stream(address, timeout_duration).await?;
        Ok(Self {
            address,
            stream: Some(stream),
            timeout: timeout_duration,
        })
    }

    /// Check if a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn exchange_on(
        stream: &mut TcpStream,
        address: SocketAddr,
        timeout_duration: Duration,
        request: &[u8],
    ) -> ModbusResult<Vec<u8>> {
        let timeout_ms = timeout_duration.as_millis() as u64;

        timeout(timeout_duration, stream.write_all(request))
            .await
            .map_err(|_| ModbusError::timeout("send request", timeout_ms))??;
        debug!("Sent {} bytes to {}: {:02X?}", request.len(), address, request);

        let response = timeout(timeout_duration, read_frame(stream, address))
            .await
            .map_err(|_| ModbusError::timeout("receive response", timeout_ms))??;
        debug!(
            "Received {} bytes from {}: {:02X?}",
            response.len(),
            address,
            response
        );
        Ok(response)
    }
}

async fn open_stream(address: SocketAddr, timeout_duration: Duration) -> ModbusResult<TcpStream> {
    let stream = timeout(timeout_duration, TcpStream::connect(address))
        .await
        .map_err(|_| {
            ModbusError::timeout(
                format!("connect to {}", address),
                timeout_duration.as_millis() as u64,
            )
        })?
        .map_err(|e| ModbusError::connection(format!("connect to {}: {}", address, e)))?;
    stream.set_nodelay(true)?;
    info!("Connected to Modbus device at {}", address);
    Ok(stream)
}

async fn read_frame(stream: &mut TcpStream, address: SocketAddr) -> ModbusResult<Vec<u8>> {
    let mut prefix = [0u8; MBAP_HEADER_LEN];
    stream.read_exact(&mut prefix).await?;

    let length = usize::from(u16::from_be_bytes([prefix[4], prefix[5]]));
    if length == 0 || length > MAX_MBAP_LENGTH {
        return Err(ModbusError::connection(format!(
            "invalid MBAP length {} from {}",
            length, address
        )));
    }

    let mut frame = vec![0u8; MBAP_HEADER_LEN + length];
    frame[..MBAP_HEADER_LEN].copy_from_slice(&prefix);
    stream.read_exact(&mut frame[MBAP_HEADER_LEN..]).await?;
    Ok(frame)
}

impl FrameTransport for TcpFrameTransport {
    async fn exchange(&mut self, request: &[u8]) -> ModbusResult<Vec<u8>> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => open_stream(self.address, self.timeout).await?,
        };

        let result = Self::exchange_on(&mut stream, self.address, self.timeout, request).await;
        match &result {
            Ok(_) => self.stream = Some(stream),
            Err(e) => warn!("Dropping connection to {} after error: {}", self.address, e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_exchange_reads_full_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 12];
            socket.read_exact(&mut request).await.unwrap();
            // Echo write requests verbatim, split across two writes
            socket.write_all(&request[..5]).await.unwrap();
            socket.write_all(&request[5..]).await.unwrap();
        });

        let mut transport = TcpFrameTransport::connect(address, Duration::from_secs(2))
            .await
            .unwrap();
        let request = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x03, 0xE8, 0x00, 0x0A];
        let response = transport.exchange(&request).await.unwrap();

        assert_eq!(response, request.to_vec());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_invalid_length_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 12];
            socket.read_exact(&mut request).await.unwrap();
            socket
                .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00])
                .await
                .unwrap();
        });

        let mut transport = TcpFrameTransport::connect(address, Duration::from_secs(2))
            .await
            .unwrap();
        let result = transport.exchange(&[0u8; 12]).await;
        assert!(matches!(result, Err(ModbusError::Connection { .. })));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_late_response_is_not_read_by_next_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            // First connection answers after the client gave up
            let (mut slow, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 12];
            slow.read_exact(&mut request).await.unwrap();
            let late = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                let _ = slow.write_all(&request).await;
            });

            // Second connection answers at once
            let (mut fast, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 12];
            fast.read_exact(&mut request).await.unwrap();
            fast.write_all(&request).await.unwrap();
            late.await.unwrap();
        });

        let mut transport = TcpFrameTransport::connect(address, Duration::from_millis(100))
            .await
            .unwrap();
        let first = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x03, 0xE8, 0x00, 0x0A];
        let result = transport.exchange(&first).await;
        assert!(matches!(result, Err(ModbusError::Timeout { .. })));
        assert!(!transport.is_connected());

        let second = [0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x03, 0xE8, 0x00, 0x0B];
        let response = transport.exchange(&second).await.unwrap();
        assert_eq!(response[..2], [0x00, 0x02]);
        assert_eq!(response, second.to_vec());
        assert!(transport.is_connected());
        server.await.unwrap();
    }
}
