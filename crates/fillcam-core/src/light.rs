//! Fill-light control over two output lines.
//!
//! The fixture is one logical light built from an LED element and a
//! relay-driven lamp. Each line has its own polarity (the relay board used
//! so far triggers on a low level).

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};
use thiserror::Error;

/// Electrical level that switches a line on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    pub const fn from_active_low(active_low: bool) -> Self {
        if active_low {
            Self::ActiveLow
        } else {
            Self::ActiveHigh
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LightError {
    /// At least one line did not accept the requested state. The other line
    /// may have switched.
    #[error(
        "fill light switch to {} incomplete (led: {}, relay: {})",
        on_off(*requested),
        line_status(led),
        line_status(relay)
    )]
    Partial {
        requested: bool,
        led: Option<String>,
        relay: Option<String>,
    },
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

fn line_status(failure: &Option<String>) -> &str {
    failure.as_deref().unwrap_or("ok")
}

/// Anything that can switch the fill light.
pub trait FillControl {
    /// Switch the light. Repeating the current state is a no-op.
    fn set_fill(&mut self, on: bool) -> Result<(), LightError>;
}

struct Line<P> {
    pin: P,
    polarity: Polarity,
}

impl<P: OutputPin> Line<P> {
    fn drive(&mut self, on: bool) -> Result<(), String> {
        let result = match (on, self.polarity) {
            (true, Polarity::ActiveHigh) | (false, Polarity::ActiveLow) => self.pin.set_high(),
            (true, Polarity::ActiveLow) | (false, Polarity::ActiveHigh) => self.pin.set_low(),
        };
        result.map_err(|e| format!("{e:?}"))
    }
}

/// LED + relay fill light.
///
/// Construction and teardown both force the light OFF. The two lines are
/// driven independently: a failure on one does not stop the other from
/// being switched.
pub struct FillLight<L: OutputPin, R: OutputPin> {
    led: Line<L>,
    relay: Line<R>,
    /// Last state applied to both lines; `None` until known.
    state: Option<bool>,
}

impl<L: OutputPin, R: OutputPin> FillLight<L, R> {
    /// Take ownership of both lines and switch them OFF.
    pub fn new(
        led: L,
        led_polarity: Polarity,
        relay: R,
        relay_polarity: Polarity,
    ) -> Result<Self, LightError> {
        let mut light = Self {
            led: Line {
                pin: led,
                polarity: led_polarity,
            },
            relay: Line {
                pin: relay,
                polarity: relay_polarity,
            },
            state: None,
        };
        light.set_fill(false)?;
        Ok(light)
    }

    /// Last state applied to both lines, if known.
    pub const fn is_on(&self) -> Option<bool> {
        self.state
    }

    /// Force OFF ahead of releasing the lines.
    pub fn shutdown(&mut self) -> Result<(), LightError> {
        self.state = None;
        let result = self.set_fill(false);
        info!("Fill light shut down");
        result
    }
}

impl<L: OutputPin, R: OutputPin> FillControl for FillLight<L, R> {
    fn set_fill(&mut self, on: bool) -> Result<(), LightError> {
        if self.state == Some(on) {
            debug!("Fill light already {}", on_off(on));
            return Ok(());
        }

        let led = self.led.drive(on).err();
        let relay = self.relay.drive(on).err();

        if led.is_none() && relay.is_none() {
            self.state = Some(on);
            info!("Fill light {}", on_off(on));
            Ok(())
        } else {
            // Unknown physical state: re-issue the next request either way.
            self.state = None;
            let err = LightError::Partial {
                requested: on,
                led,
                relay,
            };
            warn!("{err}");
            Err(err)
        }
    }
}

impl<L: OutputPin, R: OutputPin> Drop for FillLight<L, R> {
    fn drop(&mut self) {
        if self.state != Some(false) {
            let _ = self.shutdown();
        }
    }
}

impl<T: FillControl + ?Sized> FillControl for &mut T {
    fn set_fill(&mut self, on: bool) -> Result<(), LightError> {
        (**self).set_fill(on)
    }
}
