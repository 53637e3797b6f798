//! Averaged lux sampling over a fixed number of best-effort reads.

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::sensors::AmbientLightSensor;

/// Result of one round of lux sampling.
///
/// `average` is absent only when every attempt failed; the caller owns the
/// fallback policy for that case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LuxSummary {
    pub average: Option<f64>,
    /// Number of attempts that produced a reading
    pub valid: usize,
    /// Number of attempts made
    pub requested: usize,
}

impl LuxSummary {
    /// Aggregate observations, ignoring failed attempts.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut requested = 0;
        let mut valid = 0;
        let mut sum = 0.0;
        for observation in observations {
            requested += 1;
            if let Some(lux) = observation {
                valid += 1;
                sum += lux;
            }
        }

        Self {
            average: (valid > 0).then(|| sum / valid as f64),
            valid,
            requested,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.average.is_some()
    }
}

/// Attempt `count` reads, waiting `gap_ms` between attempts (not after the
/// last one), and average the ones that succeeded.
///
/// Failures are dropped without retry.
pub fn read_lux_avg<S, D>(sensor: &mut S, delay: &mut D, count: usize, gap_ms: u32) -> LuxSummary
where
    S: AmbientLightSensor + ?Sized,
    D: DelayNs + ?Sized,
{
    let mut observations = Vec::with_capacity(count);
    for attempt in 0..count {
        let observation = match sensor.read_raw() {
            Ok(raw) => Some(raw.lux()),
            Err(e) => {
                debug!("Lux sample {}/{} dropped: {}", attempt + 1, count, e);
                None
            }
        };
        observations.push(observation);

        if attempt + 1 < count {
            delay.delay_ms(gap_ms);
        }
    }

    LuxSummary::from_observations(observations)
}
