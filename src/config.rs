//! Session settings, read from a RON file and then overridden from the
//! command line.
//!
//! A config file only needs the fields it wants to change:
//!
//! ```text
//! (
//!     mode: Magnitude,
//!     scaling: 10.0,
//!     background: Some("board.png"),
//! )
//! ```

use crate::args::VizArgs;
use crate::gui::DEFAULT_WIDTH;
use crate::projector::{VizMode, DEFAULT_SCALING};

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, fs, path::Path, path::PathBuf, time::Duration};

/// Widest background accepted, in screen units.
pub const MAX_WIDTH: u32 = 8192;

/// Everything about a session that is fixed at startup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VizConfig {
    /// Which view to draw.
    pub mode: VizMode,
    /// Field units per screen unit.
    pub scaling: f64,
    /// Render ticks per second.
    pub frame_rate: f64,
    /// How long each notification window lasts, in milliseconds.
    pub dwell_ms: u64,
    /// Key that resets the baseline.
    pub rebaseline_key: char,
    /// Background width in screen units.
    pub width: u32,
    /// Background image. A plain fill is used without one.
    pub background: Option<PathBuf>,
    /// Where to write the calibrated samples on a normal exit.
    pub record: Option<PathBuf>,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            mode: VizMode::ThreeAxis,
            scaling: DEFAULT_SCALING,
            frame_rate: 60.0,
            dwell_ms: 100,
            rebaseline_key: 'b',
            width: DEFAULT_WIDTH,
            background: None,
            record: None,
        }
    }
}

/// Things that can go wrong while loading a [VizConfig].
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not valid RON for a [VizConfig].
    Ron(ron::de::SpannedError),
    /// A value is out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::Io(error) => Cow::from(format!("could not read config: {}", error)),
            ConfigError::Ron(error) => Cow::from(format!("bad config file: {}", error)),
            ConfigError::Invalid(reason) => Cow::from(format!("invalid config: {}", reason)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(error) => Some(error),
            ConfigError::Ron(error) => Some(error),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::Io(error)
    }
}

impl From<ron::de::SpannedError> for ConfigError {
    fn from(error: ron::de::SpannedError) -> Self {
        ConfigError::Ron(error)
    }
}

impl VizConfig {
    /// Read and validate a RON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: VizConfig = ron::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// The config file named on the command line (or the defaults) with the
    /// command line overrides applied on top.
    pub fn from_args(args: &VizArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };

        if let Some(mode) = args.mode {
            config.mode = mode;
        }
        if let Some(scaling) = args.scaling {
            config.scaling = scaling;
        }
        if let Some(frame_rate) = args.frame_rate {
            config.frame_rate = frame_rate;
        }
        if let Some(dwell_ms) = args.dwell_ms {
            config.dwell_ms = dwell_ms;
        }
        if let Some(key) = args.rebaseline_key {
            config.rebaseline_key = key;
        }
        if let Some(width) = args.width {
            config.width = width;
        }
        if let Some(background) = &args.background {
            config.background = Some(background.clone());
        }
        if let Some(record) = &args.record {
            config.record = Some(record.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scaling.is_finite() && self.scaling > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "scaling must be positive, got {}",
                self.scaling
            )));
        }
        // The tick budget has to fit in a Duration.
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0)
            || Duration::try_from_secs_f64(1.0 / self.frame_rate).is_err()
        {
            return Err(ConfigError::Invalid(format!(
                "frame rate must be positive and not vanishingly small, got {}",
                self.frame_rate
            )));
        }
        if !(1..=MAX_WIDTH).contains(&self.width) {
            return Err(ConfigError::Invalid(format!(
                "width must be between 1 and {}, got {}",
                MAX_WIDTH, self.width
            )));
        }
        Ok(())
    }

    /// The notification window length.
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    /// Time budget of one render tick. Zero for frame rates that
    /// [VizConfig::validate] rejects.
    pub fn frame_budget(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frame_rate).unwrap_or(Duration::ZERO)
    }

    /// The config as pretty RON, the same shape [VizConfig::from_path] reads.
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }
}
