//! Loads the motion configuration of a vehicle from TOML.
//!
//! ```toml
//! constraints = "medium"
//! manual_mode = "profiled_heading"
//!
//! [kinodynamics]
//! track_width_m = 0.5
//! wheelbase_m = 0.5
//! wheel_radius_m = 0.05
//! max_drive_velocity_m_s = 5.0
//! max_drive_acceleration_m_s2 = 10.0
//! max_drive_deceleration_m_s2 = 20.0
//! max_steering_velocity_rad_s = 13.0
//! max_steering_acceleration_rad_s2 = 62.8
//! center_of_gravity_height_m = 0.3
//!
//! [follower]
//! kp_cartesian = 2.4
//! ```
//!
//! Only the `kinodynamics` table is required. Everything else has a default.

use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::follower::FollowerConfig;
use crate::kinodynamics::{SwerveKinodynamics, SwerveKinodynamicsConfig};
use crate::manual::ManualMode;
use crate::planner::TrajectoryPlanner;
use crate::timing::{TimingConstraint, TimingConstraintFactory};
use crate::Error;

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

/// The named sets of timing constraints, see [TimingConstraintFactory].
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintPreset {
    /// [TimingConstraintFactory::all_good]
    #[default]
    AllGood,

    /// [TimingConstraintFactory::fast]
    Fast,

    /// [TimingConstraintFactory::medium]
    Medium,

    /// [TimingConstraintFactory::slow]
    Slow,

    /// [TimingConstraintFactory::for_test]
    ForTest,
}

/// Everything needed to plan and control the motion of one vehicle.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MotionConfig {
    /// The timing constraints used when planning.
    #[serde(default)]
    pub constraints: ConstraintPreset,

    /// The manual driving strategy.
    #[serde(default)]
    pub manual_mode: ManualMode,

    /// The control period in seconds.
    #[serde(default = "default_period_s")]
    pub period_s: f64,

    /// The geometry and limits of the vehicle.
    pub kinodynamics: SwerveKinodynamicsConfig,

    /// The trajectory follower gains.
    #[serde(default)]
    pub follower: FollowerConfig,
}

fn default_period_s() -> f64 {
    0.02
}

impl MotionConfig {
    /// Returns the timing constraints of the configured preset.
    pub fn constraints(&self, kinodynamics: &SwerveKinodynamics) -> Vec<Box<dyn TimingConstraint>> {
        let factory = TimingConstraintFactory::new(kinodynamics.clone());
        match self.constraints {
            ConstraintPreset::AllGood => factory.all_good(),
            ConstraintPreset::Fast => factory.fast(),
            ConstraintPreset::Medium => factory.medium(),
            ConstraintPreset::Slow => factory.slow(),
            ConstraintPreset::ForTest => factory.for_test(),
        }
    }

    /// Reads the configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = read_to_string(path).map_err(|e| {
            Error::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loading motion configuration");
        Self::from_toml_str(&text)
    }

    /// Parses the configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        let config: MotionConfig =
            toml::from_str(text).map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        if !(config.period_s > 0.0 && config.period_s.is_finite()) {
            return Err(Error::InvalidConfiguration(format!(
                "period_s must be positive, got {}",
                config.period_s
            )));
        }
        Ok(config)
    }

    /// Creates the vehicle model, checking the geometry and limits.
    pub fn kinodynamics(&self) -> Result<SwerveKinodynamics, Error> {
        SwerveKinodynamics::new(self.kinodynamics)
    }

    /// Creates a configuration with default settings for the given vehicle.
    pub fn new(kinodynamics: SwerveKinodynamicsConfig) -> Self {
        Self {
            kinodynamics,
            follower: FollowerConfig::default(),
            constraints: ConstraintPreset::default(),
            manual_mode: ManualMode::default(),
            period_s: default_period_s(),
        }
    }

    /// Creates a planner with the configured constraints.
    pub fn planner(&self) -> Result<TrajectoryPlanner, Error> {
        let kinodynamics = self.kinodynamics()?;
        Ok(TrajectoryPlanner::new(self.constraints(&kinodynamics)))
    }

    /// Writes the configuration as TOML text.
    pub fn to_toml_string(&self) -> Result<String, Error> {
        toml::to_string(self).map_err(|e| Error::InvalidConfiguration(e.to_string()))
    }
}
