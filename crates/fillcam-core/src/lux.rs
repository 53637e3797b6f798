//! Illuminance estimate from the two LTR-559 photodiode channels.
//!
//! CH0 covers visible + IR, CH1 is IR only. The ratio `ch1 / (ch0 + ch1)`
//! selects one of four linear brackets; above the last bracket the reading
//! is dominated by IR and treated as dark.

/// Output is divided by this so it shares the unit of the configured lux
/// threshold (default 0.8).
pub const LUX_SCALE: f64 = 100.0;

/// One bracket of the piecewise-linear model.
struct Bracket {
    /// Exclusive upper bound on the channel ratio.
    ratio_below: f64,
    ch0_coeff: f64,
    ch1_coeff: f64,
}

const BRACKETS: [Bracket; 3] = [
    Bracket {
        ratio_below: 0.45,
        ch0_coeff: 1.7743,
        ch1_coeff: 1.1059,
    },
    Bracket {
        ratio_below: 0.64,
        ch0_coeff: 4.2785,
        ch1_coeff: -1.9548,
    },
    Bracket {
        ratio_below: 0.85,
        ch0_coeff: 0.5926,
        ch1_coeff: 0.1185,
    },
];

/// Estimate illuminance from raw channel counts.
///
/// Returns 0 when both channels are zero and for any ratio at or above 0.85.
/// The result is never negative.
pub fn estimate_lux(ch0: u16, ch1: u16) -> f64 {
    if ch0 == 0 && ch1 == 0 {
        return 0.0;
    }

    let ch0 = f64::from(ch0);
    let ch1 = f64::from(ch1);
    let ratio = ch1 / (ch0 + ch1);

    let raw = BRACKETS
        .iter()
        .find(|b| ratio < b.ratio_below)
        .map_or(0.0, |b| b.ch0_coeff * ch0 + b.ch1_coeff * ch1);

    (raw / LUX_SCALE).max(0.0)
}
