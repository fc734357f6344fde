//! # navstate
//!
//! Navigation state manifold for inertial navigation and factor-graph
//! backends: attitude, position and velocity treated as a single Lie group,
//! with analytic Jacobians for every operation.
//!
//! ## Features
//!
//! - **NavState**: the extended pose group SE₂(3) with a 7×7 matrix embedding
//! - **Chart and exponential**: a cheap retraction for optimizers and the
//!   exact group exponential, kept as separate operations
//! - **Mechanization**: one-step IMU propagation with state and input Jacobians
//! - **PIM correction**: gravity and Coriolis correction of preintegrated
//!   measurements
//!
//! ## Example
//!
//! ```rust
//! use nalgebra::Vector3;
//! use navstate::{NavState, SO3};
//!
//! let state = NavState::new(
//!     SO3::from_euler_angles(0.1, 0.2, 0.3),
//!     Vector3::new(1.0, 2.0, 3.0),
//!     Vector3::new(0.4, 0.5, 0.6),
//! );
//! let (next, jacobians) =
//!     state.update_with_jacobians(&Vector3::new(0.1, 0.0, 0.0), &Vector3::new(0.0, 0.0, 0.01), 0.01);
//! assert!(next.position(None).norm() > 0.0);
//! assert_eq!(jacobians.f.nrows(), 9);
//! ```

pub mod error;
pub mod logger;
pub mod manifold;
pub mod navigation;

pub use error::{NavError, NavResult};
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::nav_state::{Matrix3x9, Matrix7, Matrix9, Matrix9x3, Matrix9x6, Vector9};
pub use manifold::{
    ChartAtOrigin, LieGroup, ManifoldError, ManifoldResult, NavState, NavStateTangent, SE3,
    SE3Tangent, SO3, SO3Tangent, Tangent,
};
pub use navigation::{
    EARTH_ROTATION_RATE, NavigationParams, STANDARD_GRAVITY, UpdateJacobians,
};
