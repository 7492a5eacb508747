//! Front-panel menu: operating mode and debounced buttons.
//!
//! The menu button cycles `Running -> WpsSetup -> ConfigSetup -> Running`.
//! The confirm button triggers the action of the current mode and does
//! nothing while running.

use crate::panel::{Button, Led, Panel};
use log::info;
use std::fmt;
use std::time::{Duration, Instant};

/// Quiet time after a registered press, and again after every release,
/// during which rising edges are ignored.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Bridging; the only mode in which the network side is serviced.
    #[default]
    Running,
    /// Confirm starts a WPS push-button negotiation.
    WpsSetup,
    /// Confirm wipes the stored configuration and restarts.
    ConfigSetup,
}

impl Mode {
    /// Next mode in menu order.
    pub fn next(self) -> Self {
        match self {
            Self::Running => Self::WpsSetup,
            Self::WpsSetup => Self::ConfigSetup,
            Self::ConfigSetup => Self::Running,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::WpsSetup => "wps_setup",
            Self::ConfigSetup => "config_setup",
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::WpsSetup => 1,
            Self::ConfigSetup => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Running),
            1 => Some(Self::WpsSetup),
            2 => Some(Self::ConfigSetup),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rising-edge detector with a quiet window.
///
/// The level is sampled every cycle, also inside the window, so a button
/// that is held down never registers a second press. Releasing the button
/// re-arms the window, so contact bounce on release is ignored however long
/// the press lasted.
#[derive(Debug, Default)]
pub struct Debouncer {
    was_pressed: bool,
    quiet_until: Option<Instant>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current level. Returns true for a registered press.
    pub fn update(&mut self, pressed: bool, now: Instant) -> bool {
        let rising = pressed && !self.was_pressed;
        let falling = !pressed && self.was_pressed;
        self.was_pressed = pressed;

        if falling {
            self.quiet_until = Some(now + DEBOUNCE_WINDOW);
        }
        if !rising || self.quiet_until.is_some_and(|until| now < until) {
            return false;
        }

        self.quiet_until = Some(now + DEBOUNCE_WINDOW);
        true
    }
}

/// What the confirm button asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Run a WPS negotiation.
    NegotiateWps,
    /// Wipe the stored configuration and restart.
    ClearConfiguration,
}

/// Owner of the current [`Mode`].
#[derive(Debug, Default)]
pub struct ModeController {
    mode: Mode,
    menu: Debouncer,
    confirm: Debouncer,
}

impl ModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Power-on LED state.
    pub fn boot<P: Panel>(&self, panel: &mut P) {
        for led in Led::ALL {
            panel.set_led(led, led == Led::Power);
        }
    }

    /// Sample both buttons once.
    pub fn poll<P: Panel>(&mut self, panel: &mut P, now: Instant) -> Option<MenuAction> {
        let menu = panel.is_pressed(Button::Menu);
        if self.menu.update(menu, now) {
            self.advance(panel);
        }

        let confirm = panel.is_pressed(Button::Confirm);
        if !self.confirm.update(confirm, now) {
            return None;
        }

        match self.mode {
            Mode::Running => None,
            Mode::WpsSetup => Some(MenuAction::NegotiateWps),
            Mode::ConfigSetup => Some(MenuAction::ClearConfiguration),
        }
    }

    /// Return to running, e.g. after a successful WPS join.
    pub fn enter_running<P: Panel>(&mut self, panel: &mut P) {
        self.mode = Mode::Running;
        panel.set_led(Led::Wlan, false);
        panel.set_led(Led::Power, true);
        info!("Mode: {}", self.mode);
    }

    fn advance<P: Panel>(&mut self, panel: &mut P) {
        self.mode = self.mode.next();
        match self.mode {
            Mode::WpsSetup => {
                panel.set_led(Led::Power, false);
                panel.set_led(Led::Wlan, true);
            }
            Mode::ConfigSetup => {
                panel.set_led(Led::Wlan, false);
                panel.set_led(Led::Active, true);
            }
            Mode::Running => {
                panel.set_led(Led::Active, false);
                panel.set_led(Led::Power, true);
            }
        }
        info!("Mode: {}", self.mode);
    }
}
