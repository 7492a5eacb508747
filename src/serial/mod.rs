//! UART side of the bridge.
//!
//! - **ESP32** (`esp32` feature): [`UartPort`] on the ESP-IDF UART driver
//! - **Host**: [`StdioSerial`], stdin/stdout standing in for the UART
//!
//! Both are non-blocking: reads return whatever is buffered and writes are
//! bounded by [`SerialPort::available_for_write`].

#[cfg(not(feature = "esp32"))]
mod host;
#[cfg(feature = "esp32")]
mod uart;

#[cfg(not(feature = "esp32"))]
pub use host::StdioSerial;
#[cfg(feature = "esp32")]
pub use uart::UartPort;

use std::fmt;

/// Byte-oriented, non-blocking serial transport.
pub trait SerialPort {
    /// Read buffered bytes into `buf`. Returns 0 when nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;

    /// Queue bytes for transmission. Returns how many were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError>;

    /// Bytes that can be written right now without blocking.
    fn available_for_write(&self) -> Result<usize, SerialError>;
}

/// Serial transport errors.
#[derive(Debug)]
pub enum SerialError {
    /// Generic I/O error.
    Io(std::io::Error),
    /// ESP-IDF UART driver error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "UART error: {:?}", e),
        }
    }
}

impl std::error::Error for SerialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "esp32")]
            Self::Esp(_) => None,
        }
    }
}

impl From<std::io::Error> for SerialError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for SerialError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
