//! GPIO-backed front panel.

use super::{Button, Led, Panel};
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, Input, Output, PinDriver, Pull};
use esp_idf_sys::EspError;
use log::warn;

/// Pins wired to the front panel.
pub struct PanelPins {
    pub power_led: AnyOutputPin,
    pub wlan_led: AnyOutputPin,
    pub active_led: AnyOutputPin,
    pub menu_button: AnyIOPin,
    pub confirm_button: AnyIOPin,
}

/// Front panel on ESP-IDF pin drivers.
///
/// Buttons use the internal pull-up and read as pressed while high.
pub struct GpioPanel<'d> {
    leds: [PinDriver<'d, AnyOutputPin, Output>; 3],
    menu: PinDriver<'d, AnyIOPin, Input>,
    confirm: PinDriver<'d, AnyIOPin, Input>,
}

impl<'d> GpioPanel<'d> {
    pub fn new(pins: PanelPins) -> Result<Self, EspError> {
        let leds = [
            PinDriver::output(pins.power_led)?,
            PinDriver::output(pins.wlan_led)?,
            PinDriver::output(pins.active_led)?,
        ];

        let mut menu = PinDriver::input(pins.menu_button)?;
        menu.set_pull(Pull::Up)?;
        let mut confirm = PinDriver::input(pins.confirm_button)?;
        confirm.set_pull(Pull::Up)?;

        Ok(Self {
            leds,
            menu,
            confirm,
        })
    }
}

impl Panel for GpioPanel<'_> {
    fn set_led(&mut self, led: Led, on: bool) {
        let pin = &mut self.leds[led.index()];
        let result = if on { pin.set_high() } else { pin.set_low() };
        if let Err(e) = result {
            warn!("Failed to drive LED {:?}: {:?}", led, e);
        }
    }

    fn is_pressed(&mut self, button: Button) -> bool {
        match button {
            Button::Menu => self.menu.is_high(),
            Button::Confirm => self.confirm.is_high(),
        }
    }
}
