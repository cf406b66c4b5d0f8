//! Stuck-note failsafe
//!
//! Touch devices routinely drop the release half of a gesture: the finger
//! leaves the key, the pointer-up lands somewhere else, the tab goes to the
//! background. The watchdog turns those signals, and a periodic idle sweep,
//! into pedal-ignoring silence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::Silence;
use crate::config::FailsafeConfig;

/// Host events that suggest release signals may have been lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailsafeTrigger {
    /// Pointer released somewhere no key had captured it
    PointerUp,
    /// Touch ended off every captured key
    TouchEnd,
    /// Touch sequence cancelled by the host
    TouchCancel,
    /// Screen rotated; layout is about to change under the fingers
    OrientationChange,
    /// Page went to the background
    VisibilityHidden,
    /// Host is tearing down
    Unload,
}

impl fmt::Display for FailsafeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailsafeTrigger::PointerUp => "pointer_up",
            FailsafeTrigger::TouchEnd => "touch_end",
            FailsafeTrigger::TouchCancel => "touch_cancel",
            FailsafeTrigger::OrientationChange => "orientation_change",
            FailsafeTrigger::VisibilityHidden => "visibility_hidden",
            FailsafeTrigger::Unload => "unload",
        };
        f.write_str(name)
    }
}

/// What the manager should do about a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Force off every voice whose key is not physically held
    SilenceUnheld(Silence),
    /// Force off every voice in the table
    SilenceAll(Silence),
    /// Force off every voice in the table once `Duration` has passed
    SilenceAllAfter(Duration, Silence),
    /// Stop everything, fading voices included, and cancel pending work
    Teardown,
}

/// Failsafe policy and idle tracking
#[derive(Debug, Clone)]
pub struct FailsafeWatchdog {
    config: FailsafeConfig,
    last_activity: Duration,
}

impl FailsafeWatchdog {
    pub fn new(config: FailsafeConfig) -> Self {
        Self {
            config,
            last_activity: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &FailsafeConfig {
        &self.config
    }

    /// Record input activity at `now`
    pub fn touch(&mut self, now: Duration) {
        self.last_activity = self.last_activity.max(now);
    }

    pub fn last_activity(&self) -> Duration {
        self.last_activity
    }

    /// Whether a full sweep interval has passed without input
    pub fn is_idle(&self, now: Duration) -> bool {
        now.saturating_sub(self.last_activity) >= self.config.sweep_interval()
    }

    /// Whether a voice at this amplitude still counts as sounding
    pub fn is_audible(&self, amplitude: f64) -> bool {
        amplitude > self.config.silence_threshold
    }

    /// When the next periodic sweep should run
    pub fn next_sweep(&self, now: Duration) -> Duration {
        now + self.config.sweep_interval()
    }

    /// Map a trigger to the silencing it calls for
    pub fn plan(&self, trigger: FailsafeTrigger) -> WatchdogAction {
        let silence = self.config.silence;
        match trigger {
            FailsafeTrigger::PointerUp
            | FailsafeTrigger::TouchEnd
            | FailsafeTrigger::TouchCancel => WatchdogAction::SilenceUnheld(silence),
            FailsafeTrigger::OrientationChange => {
                WatchdogAction::SilenceAllAfter(self.config.orientation_settle(), silence)
            }
            FailsafeTrigger::VisibilityHidden => WatchdogAction::SilenceAll(silence),
            FailsafeTrigger::Unload => WatchdogAction::Teardown,
        }
    }
}
