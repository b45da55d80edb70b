//! In-memory serial port for testing.
//!
//! `MockPortOpener` hands out channels backed by `tokio::io::duplex`. The far
//! end of every opened channel is kept as a `MockDevice`, which a test uses to
//! play the device: feed bytes, read what the session transmitted, or unplug.

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialChannel};
use crate::device::DeviceHandle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Failure the next `open` should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    PermissionDenied,
    Busy,
}

#[derive(Debug, Default)]
struct MockPortState {
    /// Failures to report, one per open call.
    failures: VecDeque<MockFailure>,
    /// Device ends of opened channels not yet claimed by the test.
    devices: VecDeque<MockDevice>,
    /// Every successful open, in order.
    opens: Vec<(DeviceHandle, PortConfiguration)>,
}

/// `PortOpener` that never touches hardware.
///
/// # Example
/// ```
/// use serial_console::device::DeviceHandle;
/// use serial_console::port::{MockPortOpener, PortConfiguration, PortOpener};
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let opener = MockPortOpener::new();
/// let mut channel = opener
///     .open(&DeviceHandle::unknown("MOCK0"), &PortConfiguration::default())
///     .await
///     .unwrap();
/// let mut device = opener.take_device().unwrap();
///
/// device.feed(b"hello").await.unwrap();
/// let mut buf = [0u8; 5];
/// channel.reader.read_exact(&mut buf).await.unwrap();
/// assert_eq!(&buf, b"hello");
///
/// channel.writer.write_all(b"ping").await.unwrap();
/// assert_eq!(device.read_written(4).await.unwrap(), b"ping");
/// # }
/// ```
#[derive(Clone)]
pub struct MockPortOpener {
    state: Arc<Mutex<MockPortState>>,
    buffer_size: usize,
}

impl MockPortOpener {
    /// Create an opener with a 4 KiB in-flight buffer per direction.
    pub fn new() -> Self {
        Self::with_buffer_size(4096)
    }

    /// Create an opener whose channels buffer at most `buffer_size` bytes per
    /// direction before writers have to wait.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockPortState::default())),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Make the next `open` call fail.
    pub fn fail_next_open(&self, failure: MockFailure) {
        self.state.lock().failures.push_back(failure);
    }

    /// Claim the device end of the oldest unclaimed open.
    pub fn take_device(&self) -> Option<MockDevice> {
        self.state.lock().devices.pop_front()
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.state.lock().opens.len()
    }

    /// Settings used for the most recent successful open.
    pub fn last_open(&self) -> Option<(DeviceHandle, PortConfiguration)> {
        self.state.lock().opens.last().cloned()
    }
}

impl Default for MockPortOpener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortOpener for MockPortOpener {
    async fn open(
        &self,
        device: &DeviceHandle,
        config: &PortConfiguration,
    ) -> Result<SerialChannel, PortError> {
        let mut state = self.state.lock();

        if let Some(failure) = state.failures.pop_front() {
            let name = device.path().to_string();
            return Err(match failure {
                MockFailure::NotFound => PortError::NotFound(name),
                MockFailure::PermissionDenied => PortError::PermissionDenied(name),
                MockFailure::Busy => PortError::Busy(name),
            });
        }

        let (local, remote) = tokio::io::duplex(self.buffer_size);
        state.opens.push((device.clone(), *config));
        state.devices.push_back(MockDevice {
            name: device.path().to_string(),
            stream: remote,
        });
        Ok(SerialChannel::from_stream(local))
    }
}

impl std::fmt::Debug for MockPortOpener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockPortOpener")
            .field("opens", &state.opens.len())
            .field("pending_failures", &state.failures.len())
            .finish()
    }
}

/// The device side of a mock channel.
///
/// Dropping it (or calling [`MockDevice::unplug`]) ends the session's read
/// stream, exactly like pulling a USB cable.
#[derive(Debug)]
pub struct MockDevice {
    name: String,
    stream: DuplexStream,
}

impl MockDevice {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send bytes towards the session.
    pub async fn feed(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Read exactly `len` bytes the session transmitted.
    pub async fn read_written(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Read whatever the session transmits within `window`.
    pub async fn drain_written(&mut self, window: Duration) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            match tokio::time::timeout(window, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
                Ok(Ok(n)) => out.extend_from_slice(&buf[..n]),
            }
        }
        out
    }

    /// Disconnect the device.
    pub fn unplug(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(opener: &MockPortOpener) -> Result<SerialChannel, PortError> {
        opener
            .open(&DeviceHandle::unknown("MOCK0"), &PortConfiguration::default())
            .await
    }

    #[tokio::test]
    async fn test_feed_and_read() {
        let opener = MockPortOpener::new();
        let mut channel = open(&opener).await.unwrap();
        let mut device = opener.take_device().unwrap();

        device.feed(b"Hello").await.unwrap();
        let mut buffer = [0u8; 5];
        channel.reader.read_exact(&mut buffer).await.unwrap();
        assert_eq!(&buffer, b"Hello");
    }

    #[tokio::test]
    async fn test_written_bytes_reach_device() {
        let opener = MockPortOpener::new();
        let mut channel = open(&opener).await.unwrap();
        let mut device = opener.take_device().unwrap();

        channel.writer.write_all(b"Test1").await.unwrap();
        channel.writer.write_all(b"Test2").await.unwrap();
        assert_eq!(device.read_written(10).await.unwrap(), b"Test1Test2");
    }

    #[tokio::test]
    async fn test_unplug_ends_stream() {
        let opener = MockPortOpener::new();
        let mut channel = open(&opener).await.unwrap();
        opener.take_device().unwrap().unplug();

        let mut buffer = [0u8; 4];
        let n = channel.reader.read(&mut buffer).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let opener = MockPortOpener::new();
        opener.fail_next_open(MockFailure::Busy);
        opener.fail_next_open(MockFailure::PermissionDenied);

        assert!(matches!(open(&opener).await, Err(PortError::Busy(_))));
        assert!(matches!(open(&opener).await, Err(PortError::PermissionDenied(_))));
        assert!(open(&opener).await.is_ok());
        assert_eq!(opener.open_count(), 1);
    }

    #[tokio::test]
    async fn test_last_open_records_settings() {
        let opener = MockPortOpener::new();
        let config = PortConfiguration {
            baud_rate: 9600,
            ..Default::default()
        };
        let _channel = opener
            .open(&DeviceHandle::unknown("MOCK1"), &config)
            .await
            .unwrap();

        let (device, used) = opener.last_open().unwrap();
        assert_eq!(device.path(), "MOCK1");
        assert_eq!(used.baud_rate, 9600);
    }
}
