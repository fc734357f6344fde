//! Inertial navigation on top of the [`NavState`](crate::manifold::NavState) manifold.
//!
//! - [`mechanization`]: propagate a state with one bias-corrected IMU sample
//! - [`coriolis`]: earth-rotation terms and gravity/Coriolis correction of a
//!   preintegrated measurement
//!
//! Frame conventions are carried by [`NavigationParams`]: the gravity vector
//! is expressed in the navigation frame, so a Z-up (ENU) frame uses
//! `(0, 0, -g)` and a Z-down (NED) frame uses `(0, 0, g)`.

use crate::error::{NavError, NavResult};
use nalgebra::Vector3;
use tracing::debug;

pub mod coriolis;
pub mod mechanization;

pub use mechanization::UpdateJacobians;

/// Standard gravity (m/s²).
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Earth rotation rate (rad/s), WGS-84.
pub const EARTH_ROTATION_RATE: f64 = 7.2921159e-5;

/// Gravity magnitude used by [`NavigationParams::default`] (m/s²).
pub const DEFAULT_GRAVITY: f64 = 9.81;

/// Navigation-frame parameters for preintegrated measurement correction.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationParams {
    /// Gravity vector in the navigation frame (m/s²)
    pub gravity: Vector3<f64>,
    /// Angular velocity of the navigation frame (rad/s); `None` disables Coriolis terms
    pub earth_rotation_rate: Option<Vector3<f64>>,
    /// Include the centrifugal ω×(ω×p) terms
    pub use_second_order_coriolis: bool,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self::z_up(DEFAULT_GRAVITY)
    }
}

impl NavigationParams {
    /// Create navigation parameters with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Z-up navigation frame (e.g. ENU): gravity `(0, 0, -g)`.
    pub fn z_up(gravity_magnitude: f64) -> Self {
        Self {
            gravity: Vector3::new(0.0, 0.0, -gravity_magnitude),
            earth_rotation_rate: None,
            use_second_order_coriolis: false,
        }
    }

    /// Z-down navigation frame (e.g. NED): gravity `(0, 0, g)`.
    pub fn z_down(gravity_magnitude: f64) -> Self {
        Self {
            gravity: Vector3::new(0.0, 0.0, gravity_magnitude),
            earth_rotation_rate: None,
            use_second_order_coriolis: false,
        }
    }

    /// Set the navigation-frame gravity vector
    pub fn with_gravity(mut self, gravity: Vector3<f64>) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the navigation-frame rotation rate used for Coriolis terms
    pub fn with_earth_rotation_rate(mut self, omega: Vector3<f64>) -> Self {
        self.earth_rotation_rate = Some(omega);
        self
    }

    /// Enable or disable the second-order Coriolis terms
    pub fn with_second_order_coriolis(mut self, enabled: bool) -> Self {
        self.use_second_order_coriolis = enabled;
        self
    }

    /// Reject non-finite gravity or rotation rate vectors.
    pub fn validate(&self) -> NavResult<()> {
        if !self.gravity.iter().all(|x| x.is_finite()) {
            debug!(gravity = ?self.gravity, "rejected navigation parameters");
            return Err(NavError::Configuration(format!(
                "gravity must be finite, got {:?}",
                self.gravity.as_slice()
            )));
        }

        if let Some(omega) = &self.earth_rotation_rate {
            if !omega.iter().all(|x| x.is_finite()) {
                debug!(earth_rotation_rate = ?omega, "rejected navigation parameters");
                return Err(NavError::Configuration(format!(
                    "earth rotation rate must be finite, got {:?}",
                    omega.as_slice()
                )));
            }
        }

        Ok(())
    }
}
