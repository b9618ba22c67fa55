//! Radio capability profiles
//!
//! One [`RadioSession`](crate::session::RadioSession) works for any
//! supported model; everything model-specific (mode list, tone command
//! strategy, band stacking table, receive current characteristics)
//! lives in the profile it was built with.

use serde::{Deserialize, Serialize};

use crate::vfo::Mode;

/// How the radio reports and accepts tone/DTCS enablement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToneStrategy {
    /// One combined mode byte on `16 5D` (IC-9700 class)
    Combined,
    /// Separate repeater-tone (`16 42`) and tone-squelch (`16 43`)
    /// on/off commands (IC-7300 class)
    Paired,
}

/// One band's stacking registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandStack {
    /// Band label shown to the operator (`"20m"`, `"2m"`)
    pub label: &'static str,
    /// Three most-recent frequencies used on this band, register 0
    /// newest, in display form
    pub registers: [String; 3],
}

impl BandStack {
    fn new(label: &'static str, base: &str) -> Self {
        Self {
            label,
            registers: [base.to_string(), base.to_string(), base.to_string()],
        }
    }
}

/// Model-specific capabilities of a radio
#[derive(Debug, Clone)]
pub struct RadioProfile {
    /// Model name
    pub model: &'static str,
    /// Default CI-V address for this model
    pub default_address: u8,
    /// Modes the radio offers, in selection order
    pub modes: Vec<Mode>,
    /// Tone command strategy
    pub tone_strategy: ToneStrategy,
    /// Band stacking table, seeded with each band's base frequency
    pub band_stack: Vec<BandStack>,
    /// Receive current draw with the AF gain closed (amperes)
    pub rx_current_min: f32,
    /// Receive current draw with the AF gain wide open (amperes)
    pub rx_current_max: f32,
}

impl RadioProfile {
    /// IC-7300 profile: HF + 6 m, paired tone commands
    pub fn ic7300() -> Self {
        Self {
            model: "IC-7300",
            default_address: 0x94,
            modes: vec![
                Mode::Lsb,
                Mode::Usb,
                Mode::Am,
                Mode::Cw,
                Mode::Rtty,
                Mode::Fm,
                Mode::CwR,
                Mode::RttyR,
            ],
            tone_strategy: ToneStrategy::Paired,
            band_stack: vec![
                BandStack::new("160m", "1.800.000"),
                BandStack::new("80m", "3.500.000"),
                BandStack::new("40m", "7.000.000"),
                BandStack::new("30m", "10.000.000"),
                BandStack::new("20m", "14.000.000"),
                BandStack::new("17m", "18.068.000"),
                BandStack::new("15m", "21.000.000"),
                BandStack::new("12m", "24.890.000"),
                BandStack::new("10m", "28.000.000"),
                BandStack::new("6m", "53.000.000"),
            ],
            rx_current_min: 0.9,
            rx_current_max: 1.25,
        }
    }

    /// IC-9700 profile: VHF/UHF/23 cm, combined tone mode byte, D-STAR
    pub fn ic9700() -> Self {
        Self {
            model: "IC-9700",
            default_address: 0xA2,
            modes: vec![
                Mode::Lsb,
                Mode::Usb,
                Mode::Am,
                Mode::Cw,
                Mode::Rtty,
                Mode::Fm,
                Mode::CwR,
                Mode::RttyR,
                Mode::Dv,
                Mode::Dd,
            ],
            tone_strategy: ToneStrategy::Combined,
            band_stack: vec![
                BandStack::new("2m", "144.000.000"),
                BandStack::new("70cm", "430.000.000"),
                BandStack::new("23cm", "1240.000.000"),
            ],
            rx_current_min: 1.2,
            rx_current_max: 1.8,
        }
    }

    /// True when the radio offers this operating mode
    pub fn supports_mode(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ic7300_bands() {
        let profile = RadioProfile::ic7300();
        assert_eq!(profile.band_stack.len(), 10);
        assert_eq!(profile.band_stack[4].registers[0], "14.000.000");
        assert_eq!(profile.tone_strategy, ToneStrategy::Paired);
        assert!(!profile.supports_mode(Mode::Dv));
    }

    #[test]
    fn test_ic9700_bands() {
        let profile = RadioProfile::ic9700();
        assert_eq!(profile.band_stack.len(), 3);
        assert_eq!(profile.band_stack[2].registers[0], "1240.000.000");
        assert_eq!(profile.tone_strategy, ToneStrategy::Combined);
        assert!(profile.supports_mode(Mode::Dd));
    }
}
