//! Headless panel for host builds.

use super::{Button, Led, Panel};
use log::debug;

/// Panel without hardware: LED changes are logged, buttons are never
/// pressed.
#[derive(Debug, Default)]
pub struct HeadlessPanel {
    leds: [bool; 3],
}

impl HeadlessPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last level written to an LED.
    pub fn led(&self, led: Led) -> bool {
        self.leds[led.index()]
    }
}

impl Panel for HeadlessPanel {
    fn set_led(&mut self, led: Led, on: bool) {
        let slot = &mut self.leds[led.index()];
        if *slot != on {
            debug!("LED {:?} {}", led, if on { "on" } else { "off" });
            *slot = on;
        }
    }

    fn is_pressed(&mut self, _button: Button) -> bool {
        false
    }
}
