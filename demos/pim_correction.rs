//! Predicting the state at the end of a preintegration window
//!
//! A preintegrated measurement ignores gravity and earth rotation. This demo
//! corrects one with `correct_pim`, retracts the start state by the result
//! and compares predictions with and without the Coriolis terms.
//!
//! Run with:
//! ```bash
//! RUST_LOG=navstate=trace cargo run --example pim_correction
//! ```

use nalgebra::Vector3;
use navstate::{
    EARTH_ROTATION_RATE, Matrix9, NavError, NavState, NavStateTangent, NavigationParams, SO3,
    STANDARD_GRAVITY, Vector9, init_logger,
};
use tracing::{info, warn};

fn main() -> Result<(), NavError> {
    init_logger();

    let start = NavState::new(
        SO3::from_axis_angle(&Vector3::z(), std::f64::consts::FRAC_PI_4),
        Vector3::new(0.0, 0.0, 100.0),
        Vector3::new(15.0, 15.0, 0.0),
    );
    let dt = 1.0;

    // A stationary IMU would measure exactly the specific force cancelling gravity.
    let pim = NavStateTangent::new(
        Vector3::new(0.0, 0.0, 0.01),
        Vector3::new(0.0, 0.0, 0.5 * STANDARD_GRAVITY * dt * dt),
        Vector3::new(0.0, 0.0, STANDARD_GRAVITY * dt),
    )
    .coeffs();

    let gravity_only = NavigationParams::z_up(STANDARD_GRAVITY);
    let with_earth_rate = gravity_only
        .clone()
        .with_earth_rotation_rate(Vector3::new(0.0, 0.0, EARTH_ROTATION_RATE))
        .with_second_order_coriolis(true);

    let mut predictions = Vec::new();
    for (label, params) in [("gravity only", &gravity_only), ("with Coriolis", &with_earth_rate)] {
        let mut jac_state = Matrix9::zeros();
        let xi = start.correct_pim_with(&pim, dt, params, Some(&mut jac_state), None)?;
        let end = start.retract(&xi, None, None);
        info!(
            "{label}: corrected ξ = {}, ‖∂ξ/∂state‖ = {:.3}",
            NavStateTangent::from(xi),
            jac_state.norm()
        );
        info!("{label}: predicted end state {}", end);
        predictions.push(end);
    }

    if let [plain, corrected] = predictions.as_slice() {
        let difference: Vector9 = plain.local_coordinates(corrected, None, None);
        info!("Coriolis contribution over {dt} s: {}", NavStateTangent::from(difference));
    }

    let broken = NavigationParams::new().with_gravity(Vector3::new(f64::NAN, 0.0, 0.0));
    match start.correct_pim_with(&pim, dt, &broken, None, None) {
        Ok(_) => warn!("non-finite gravity was accepted"),
        Err(err) => info!("rejected invalid parameters: {err}"),
    }

    Ok(())
}
