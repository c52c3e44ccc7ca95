//! Servo transports.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::info;

use gaze_models::ServoAxis;

use crate::backend::ServoTransport;
use crate::error::{TrackingError, TrackingResult};

/// Line protocol understood by the servo microcontroller firmware:
/// `SERVO_<angle>\n` moves pan, `SERVO2_<angle>\n` moves tilt.
pub struct LineServoTransport<W> {
    writer: Mutex<W>,
}

impl<W> LineServoTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Encode one command line.
    pub fn encode(axis: ServoAxis, angle: i32) -> String {
        match axis {
            ServoAxis::Pan => format!("SERVO_{}\n", angle),
            ServoAxis::Tilt => format!("SERVO2_{}\n", angle),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl LineServoTransport<tokio::fs::File> {
    /// Open a serial device (or any writable path) for the line protocol.
    pub async fn open(path: impl AsRef<std::path::Path>) -> TrackingResult<Self> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(path.as_ref())
            .await?;
        Ok(Self::new(file))
    }
}

#[async_trait]
impl<W> ServoTransport for LineServoTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_command(&self, axis: ServoAxis, angle: i32) -> TrackingResult<()> {
        let line = Self::encode(axis, angle);
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TrackingError::servo(format!("write failed: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| TrackingError::servo(format!("flush failed: {}", e)))?;
        Ok(())
    }
}

/// Transport that only logs, for running without hardware.
#[derive(Debug, Default)]
pub struct LogServoTransport;

#[async_trait]
impl ServoTransport for LogServoTransport {
    async fn send_command(&self, axis: ServoAxis, angle: i32) -> TrackingResult<()> {
        info!(axis = %axis, angle, "Servo command");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding() {
        assert_eq!(LineServoTransport::<Vec<u8>>::encode(ServoAxis::Pan, 90), "SERVO_90\n");
        assert_eq!(LineServoTransport::<Vec<u8>>::encode(ServoAxis::Tilt, 45), "SERVO2_45\n");
    }

    #[tokio::test]
    async fn test_writes_lines_in_order() {
        let transport = LineServoTransport::new(Vec::new());
        tokio_test::assert_ok!(transport.send_command(ServoAxis::Pan, 120).await);
        tokio_test::assert_ok!(transport.send_command(ServoAxis::Tilt, 70).await);

        let written = String::from_utf8(transport.into_inner()).unwrap();
        assert_eq!(written, "SERVO_120\nSERVO2_70\n");
    }

    #[tokio::test]
    async fn test_writes_to_device_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ttyservo");
        std::fs::write(&path, b"").unwrap();

        let transport = LineServoTransport::open(&path).await.unwrap();
        transport.send_command(ServoAxis::Pan, 90).await.unwrap();
        transport.send_command(ServoAxis::Tilt, 90).await.unwrap();
        drop(transport);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "SERVO_90\nSERVO2_90\n");
    }

    #[tokio::test]
    async fn test_missing_device_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LineServoTransport::open(dir.path().join("missing")).await;
        assert!(matches!(result, Err(TrackingError::Io(_))));
    }
}
