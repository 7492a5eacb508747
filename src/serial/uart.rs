//! ESP-IDF UART driver wrapper.

use super::{SerialError, SerialPort};
use crate::config::{SerialFraming, StopBits};
use esp_idf_hal::delay::NON_BLOCK;
use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{config, Uart, UartDriver};
use esp_idf_hal::units::Hertz;
use esp_idf_sys::esp;
use log::info;

/// Driver ring buffer size for each direction. A zero TX buffer would make
/// the free-space query report nothing writable.
const UART_BUFFER_SIZE: usize = 1024;

/// Non-blocking UART configured from the stored record.
pub struct UartPort<'d> {
    driver: UartDriver<'d>,
}

impl<'d> UartPort<'d> {
    /// Install the UART driver with the given framing.
    pub fn new<U: Uart>(
        uart: impl Peripheral<P = U> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
        framing: &SerialFraming,
    ) -> Result<Self, SerialError> {
        let stop_bits = match framing.stop_bits {
            StopBits::One => config::StopBits::STOP1,
            StopBits::Two => config::StopBits::STOP2,
        };
        let uart_config = config::Config::new()
            .baudrate(Hertz(framing.baud_rate))
            .data_bits(config::DataBits::DataBits8)
            .parity_none()
            .stop_bits(stop_bits)
            .rx_fifo_size(UART_BUFFER_SIZE)
            .tx_fifo_size(UART_BUFFER_SIZE);

        let driver = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &uart_config,
        )?;

        info!("UART ready at {}", framing);
        Ok(Self { driver })
    }
}

impl SerialPort for UartPort<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        Ok(self.driver.read(buf, NON_BLOCK)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        Ok(self.driver.write(data)?)
    }

    fn available_for_write(&self) -> Result<usize, SerialError> {
        let mut free: usize = 0;
        esp!(unsafe { esp_idf_sys::uart_get_tx_buffer_free_size(self.driver.port(), &mut free) })?;
        Ok(free)
    }
}
