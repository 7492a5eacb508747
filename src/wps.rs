//! WPS push-button negotiation with visible failure feedback.
//!
//! A negotiation only counts as successful when the driver reports a
//! non-empty network name. On failure the WLAN LED blinks
//! [`BLINK_REPETITIONS`] times and the menu stays in WPS setup so the user
//! can try again. The blink runs across polling cycles instead of stalling
//! the loop.

use crate::network::NetworkProvider;
use crate::panel::{Led, Panel};
use log::{info, warn};
use std::time::{Duration, Instant};

/// Off/on blinks shown after a failed negotiation.
pub const BLINK_REPETITIONS: u16 = 10;

/// Duration of each off and each on phase.
pub const BLINK_HALF_PERIOD: Duration = Duration::from_millis(100);

/// Non-blocking off/on blink sequence on one LED. Ends with the LED on.
#[derive(Debug)]
pub struct BlinkPattern {
    led: Led,
    /// Phases still to apply.
    remaining: u16,
    next_at: Instant,
}

impl BlinkPattern {
    /// Start the pattern, switching the LED off right away.
    pub fn start<P: Panel>(led: Led, repetitions: u16, panel: &mut P, now: Instant) -> Self {
        panel.set_led(led, false);
        Self {
            led,
            remaining: repetitions.saturating_mul(2).saturating_sub(1),
            next_at: now + BLINK_HALF_PERIOD,
        }
    }

    /// Apply every phase that is due. Returns false once finished.
    pub fn tick<P: Panel>(&mut self, panel: &mut P, now: Instant) -> bool {
        while self.remaining > 0 && now >= self.next_at {
            self.remaining -= 1;
            // Phases count down from an odd total; even remainders are "on".
            panel.set_led(self.led, self.remaining % 2 == 0);
            self.next_at += BLINK_HALF_PERIOD;
        }
        self.remaining > 0
    }
}

/// Runs negotiations and owns the failure feedback.
#[derive(Debug, Default)]
pub struct WpsNegotiator {
    feedback: Option<BlinkPattern>,
}

impl WpsNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one negotiation. Blocks for as long as the driver does.
    pub fn negotiate<N, P>(&mut self, network: &mut N, panel: &mut P, now: Instant) -> bool
    where
        N: NetworkProvider,
        P: Panel,
    {
        self.feedback = None;

        match network.begin_negotiation() {
            Ok(ssid) if !ssid.is_empty() => {
                info!("Connected via WPS to {}", ssid);
                return true;
            }
            Ok(_) => warn!("WPS finished without a network name"),
            Err(e) => warn!("No connection via WPS: {}", e),
        }

        self.feedback = Some(BlinkPattern::start(Led::Wlan, BLINK_REPETITIONS, panel, now));
        false
    }

    /// Advance the failure feedback, if showing.
    pub fn tick<P: Panel>(&mut self, panel: &mut P, now: Instant) {
        if let Some(pattern) = self.feedback.as_mut() {
            if !pattern.tick(panel, now) {
                self.feedback = None;
            }
        }
    }

    /// Drop the feedback, e.g. when leaving WPS setup.
    pub fn cancel_feedback(&mut self) {
        self.feedback = None;
    }

    pub fn is_signalling_failure(&self) -> bool {
        self.feedback.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimNetwork, SimPanel};

    fn after(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn test_blink_sequence() {
        let t0 = Instant::now();
        let mut panel = SimPanel::new();
        panel.set_led(Led::Wlan, true);

        let mut blink = BlinkPattern::start(Led::Wlan, 2, &mut panel, t0);
        assert!(!panel.led(Led::Wlan));

        assert!(blink.tick(&mut panel, after(t0, 50)));
        assert!(!panel.led(Led::Wlan));
        assert!(blink.tick(&mut panel, after(t0, 100)));
        assert!(panel.led(Led::Wlan));
        assert!(blink.tick(&mut panel, after(t0, 200)));
        assert!(!panel.led(Led::Wlan));
        assert!(!blink.tick(&mut panel, after(t0, 300)));
        assert!(panel.led(Led::Wlan));
        assert!(!blink.tick(&mut panel, after(t0, 400)));
    }

    #[test]
    fn test_blink_counts_led_toggles() {
        let t0 = Instant::now();
        let mut panel = SimPanel::new();
        let mut blink = BlinkPattern::start(Led::Wlan, BLINK_REPETITIONS, &mut panel, t0);

        let mut t = 0;
        while blink.tick(&mut panel, after(t0, t)) {
            t += 10;
        }
        assert_eq!(t, 1900);
        assert!(panel.led(Led::Wlan));
        assert_eq!(panel.led_writes(Led::Wlan), 2 * BLINK_REPETITIONS as usize);
    }

    #[test]
    fn test_late_tick_catches_up() {
        let t0 = Instant::now();
        let mut panel = SimPanel::new();
        let mut blink = BlinkPattern::start(Led::Wlan, BLINK_REPETITIONS, &mut panel, t0);
        assert!(!blink.tick(&mut panel, after(t0, 10_000)));
        assert!(panel.led(Led::Wlan));
    }

    #[test]
    fn test_success_requires_network_name() {
        let t0 = Instant::now();
        let mut panel = SimPanel::new();
        let mut network = SimNetwork::new();
        let mut wps = WpsNegotiator::new();

        network.set_negotiation(Ok(String::new()));
        assert!(!wps.negotiate(&mut network, &mut panel, t0));
        assert!(wps.is_signalling_failure());

        network.set_negotiation(Ok("home".into()));
        assert!(wps.negotiate(&mut network, &mut panel, t0));
        assert!(!wps.is_signalling_failure());
        assert_eq!(network.negotiations(), 2);
    }

    #[test]
    fn test_failure_blinks_then_stops() {
        let t0 = Instant::now();
        let mut panel = SimPanel::new();
        let mut network = SimNetwork::new();
        let mut wps = WpsNegotiator::new();

        network.set_negotiation(Err(crate::network::NetworkError::NegotiationFailed(
            "timeout".into(),
        )));
        assert!(!wps.negotiate(&mut network, &mut panel, t0));
        assert!(!panel.led(Led::Wlan));

        wps.tick(&mut panel, after(t0, 5_000));
        assert!(!wps.is_signalling_failure());
        assert!(panel.led(Led::Wlan));
    }

    #[test]
    fn test_cancel_feedback() {
        let t0 = Instant::now();
        let mut panel = SimPanel::new();
        let mut network = SimNetwork::new();
        let mut wps = WpsNegotiator::new();

        assert!(!wps.negotiate(&mut network, &mut panel, t0));
        wps.cancel_feedback();
        assert!(!wps.is_signalling_failure());
    }
}
