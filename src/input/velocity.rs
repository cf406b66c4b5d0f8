//! Velocity from pointer contact

use serde::{Deserialize, Serialize};

/// Lowest velocity a pressure reading can produce
const MIN_PRESSURE: f64 = 0.05;

/// Velocity given to a strike at the very bottom of a key in `ypos` mode
const YPOS_FLOOR: f64 = 0.3;

/// How note velocity is derived from an input contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VelocityMode {
    /// Use the pointer's reported pressure
    Pressure,
    /// Use where on the key the strike landed; the top is loudest
    #[default]
    Ypos,
    /// Every note at full velocity
    #[serde(rename = "none")]
    Fixed,
}

/// Where and how hard a key was struck
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Contact {
    /// Vertical offset within the key, 0 at the top and 1 at the bottom
    pub offset_y: f64,
    /// Pressure in [0, 1] if the device reports one
    pub pressure: Option<f64>,
}

impl Contact {
    pub fn at(offset_y: f64) -> Self {
        Self {
            offset_y,
            pressure: None,
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }
}

impl VelocityMode {
    /// Velocity in [0, 1] for a strike
    pub fn velocity(self, contact: Contact) -> f64 {
        match self {
            VelocityMode::Pressure => match contact.pressure {
                Some(pressure) if pressure.is_finite() => pressure.clamp(MIN_PRESSURE, 1.0),
                _ => 1.0,
            },
            VelocityMode::Ypos => {
                let offset = if contact.offset_y.is_finite() {
                    contact.offset_y
                } else {
                    0.0
                };
                YPOS_FLOOR + (1.0 - YPOS_FLOOR) * (1.0 - offset).clamp(0.0, 1.0)
            }
            VelocityMode::Fixed => 1.0,
        }
    }
}
