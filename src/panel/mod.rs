//! Front panel: three indicator LEDs and two push buttons.
//!
//! - **ESP32** (`esp32` feature): [`GpioPanel`] on `PinDriver`s
//! - **Host**: [`HeadlessPanel`], logs LED changes, buttons never pressed

#[cfg(feature = "esp32")]
mod gpio;
#[cfg(not(feature = "esp32"))]
mod host;

#[cfg(feature = "esp32")]
pub use gpio::{GpioPanel, PanelPins};
#[cfg(not(feature = "esp32"))]
pub use host::HeadlessPanel;

/// Indicator LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    /// Lit while in normal running mode.
    Power,
    /// Network indicator; lit while disconnected or in WPS setup.
    Wlan,
    /// Client activity; doubles as the config-setup indicator.
    Active,
}

impl Led {
    /// Every LED, in index order.
    pub const ALL: [Led; 3] = [Led::Power, Led::Wlan, Led::Active];

    pub fn index(self) -> usize {
        match self {
            Self::Power => 0,
            Self::Wlan => 1,
            Self::Active => 2,
        }
    }
}

/// Push buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Cycles through the menu modes.
    Menu,
    /// Confirms the action of the current menu mode.
    Confirm,
}

/// Digital I/O of the front panel.
///
/// Implementations report hardware faults through logging; a failed LED
/// write is never fatal to the bridge.
pub trait Panel {
    fn set_led(&mut self, led: Led, on: bool);

    /// Raw, undebounced button level.
    fn is_pressed(&mut self, button: Button) -> bool;
}
