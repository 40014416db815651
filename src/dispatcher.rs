//! # Command Dispatcher
//!
//! The automation loop hands write commands to a [`ProcessingManager`] and
//! moves on. [`CommandDispatcher`] implements that contract by queueing each
//! command; a [`CommandQueue`] worker drains the queue, chooses the function
//! code from the point type, exchanges the frame with the device and applies
//! the decoded echo back into storage.
//!
//! Failures stay here: they are logged and counted, never returned to the
//! caller that issued the command. The queue is bounded; while the device
//! is slow or unreachable, commands beyond its capacity are dropped and
//! counted as failed.
//!
//! ```text
//! AutomationManager --execute_write_command--> CommandDispatcher
//!                                                   | (bounded mpsc)
//!                                                   v
//!                          CommandQueue::run --pack--> FrameTransport
//!                                   ^                       |
//!                                   +--parse--<-------------+
//!                                   |
//!                                   +--update_points--> Storage
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::config::PointConfig;
use crate::constants::{COIL_OFF, COIL_ON, FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER};
use crate::egu::EguConverter;
use crate::error::{ModbusError, ModbusResult};
use crate::function::create_function;
use crate::params::WriteCommandParameters;
use crate::point::{PointType, PointValues};
use crate::storage::Storage;
use crate::transport::FrameTransport;

/// Fire-and-forget write sink.
pub trait ProcessingManager: Send + Sync {
    /// Issue a write of `value` (engineering units for analog points, 0/1
    /// for digital points). Never blocks and never reports failure.
    fn execute_write_command(
        &self,
        config: Arc<PointConfig>,
        transaction_id: u16,
        unit_address: u8,
        point_address: u16,
        value: i32,
    );
}

/// One queued write.
#[derive(Debug, Clone)]
pub struct WriteCommand {
    /// Target point configuration
    pub config: Arc<PointConfig>,
    /// Transaction id for the request
    pub transaction_id: u16,
    /// Unit address
    pub unit_address: u8,
    /// Point address
    pub point_address: u16,
    /// Value as issued by the caller
    pub value: i32,
}

impl WriteCommand {
    /// Wire parameters: FC06 with the EGU value converted to raw for analog
    /// outputs, FC05 with 0x0000/0xFF00 for digital outputs.
    pub fn to_parameters(&self) -> ModbusResult<WriteCommandParameters> {
        let (function_code, value) = match self.config.point_type {
            PointType::AnalogOutput => (
                FC_WRITE_SINGLE_REGISTER,
                EguConverter::convert_to_raw(
                    self.config.scale_factor,
                    self.config.deviation,
                    f64::from(self.value),
                ),
            ),
            PointType::DigitalOutput => (
                FC_WRITE_SINGLE_COIL,
                if self.value != 0 { COIL_ON } else { COIL_OFF },
            ),
            read_only => {
                return Err(ModbusError::invalid_data(format!(
                    "point {} is {} and cannot be written",
                    self.point_address, read_only
                )))
            }
        };
        Ok(WriteCommandParameters::new(
            self.transaction_id,
            self.unit_address,
            function_code,
            self.point_address,
            value,
        ))
    }
}

/// Default number of commands the queue holds.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Counters shared between the dispatcher handle and its queue worker.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl DispatcherStats {
    /// Commands accepted by [`CommandDispatcher`]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Commands acknowledged by the device and applied to storage
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Commands that could not be queued, sent or decoded
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Queueing [`ProcessingManager`].
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    sender: mpsc::Sender<WriteCommand>,
    stats: Arc<DispatcherStats>,
}

/// Receiving half of a [`CommandDispatcher`].
#[derive(Debug)]
pub struct CommandQueue {
    receiver: mpsc::Receiver<WriteCommand>,
    stats: Arc<DispatcherStats>,
}

impl CommandDispatcher {
    /// Create a dispatcher and the queue its worker drains.
    pub fn new() -> (Self, CommandQueue) {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Dispatcher whose queue holds at most `capacity` commands (minimum 1).
    pub fn with_capacity(capacity: usize) -> (Self, CommandQueue) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(DispatcherStats::default());
        (
            Self {
                sender,
                stats: Arc::clone(&stats),
            },
            CommandQueue { receiver, stats },
        )
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<DispatcherStats> {
        Arc::clone(&self.stats)
    }
}

impl ProcessingManager for CommandDispatcher {
    fn execute_write_command(
        &self,
        config: Arc<PointConfig>,
        transaction_id: u16,
        unit_address: u8,
        point_address: u16,
        value: i32,
    ) {
        let command = WriteCommand {
            config,
            transaction_id,
            unit_address,
            point_address,
            value,
        };
        match self.sender.try_send(command) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Full(command)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    transaction_id,
                    point_address, "Dispatcher queue full, dropping write: {}", command.value
                );
            }
            Err(TrySendError::Closed(command)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    transaction_id,
                    point_address, "Dispatcher queue closed, dropping write: {}", command.value
                );
            }
        }
    }
}

impl CommandQueue {
    /// Drain commands until every [`CommandDispatcher`] handle is dropped.
    pub async fn run<T, S>(mut self, mut transport: T, storage: Arc<S>)
    where
        T: FrameTransport,
        S: Storage + ?Sized,
    {
        info!("Command dispatcher started");
        while let Some(command) = self.receiver.recv().await {
            self.process(&mut transport, storage.as_ref(), &command).await;
        }
        info!(
            completed = self.stats.completed(),
            failed = self.stats.failed(),
            "Command dispatcher stopped"
        );
    }

    /// Execute one command and apply its echo.
    pub async fn process<T, S>(&self, transport: &mut T, storage: &S, command: &WriteCommand)
    where
        T: FrameTransport,
        S: Storage + ?Sized,
    {
        match execute(transport, command).await {
            Ok(values) => {
                let updated = storage.update_points(&values);
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    transaction_id = command.transaction_id,
                    point_address = command.point_address,
                    updated,
                    "Write acknowledged"
                );
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    transaction_id = command.transaction_id,
                    point_address = command.point_address,
                    transient = e.is_transient(),
                    "Write failed: {}",
                    e
                );
            }
        }
    }
}

async fn execute<T: FrameTransport>(
    transport: &mut T,
    command: &WriteCommand,
) -> ModbusResult<PointValues> {
    let params = command.to_parameters()?;
    let function = create_function(params.into())?;
    let request = function.pack_request();
    let response = transport.exchange(&request).await?;
    function.parse_response(&response)
}
