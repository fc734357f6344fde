//! Dead-reckoning a navigation state from synthetic IMU samples
//!
//! A vehicle flies a constant-rate turn while its state covariance is
//! propagated with the mechanization Jacobians:
//!
//! ```text
//! P' = F P Fᵀ + G_a Q_a G_aᵀ + G_ω Q_ω G_ωᵀ
//! ```
//!
//! Run with:
//! ```bash
//! cargo run --example imu_propagation
//! ```

use nalgebra::{Matrix3, Vector3};
use navstate::{LieGroup, Matrix9, NavState, SO3, init_logger};
use tracing::info;

const IMU_RATE_HZ: f64 = 200.0;
const DURATION_S: f64 = 10.0;
const ACCEL_NOISE_DENSITY: f64 = 2.0e-3;
const GYRO_NOISE_DENSITY: f64 = 1.7e-4;

fn main() {
    init_logger();

    let dt = 1.0 / IMU_RATE_HZ;
    let steps = (DURATION_S * IMU_RATE_HZ) as usize;

    // Level flight at 10 m/s along x, yawing at 0.1 rad/s.
    let mut state = NavState::new(SO3::identity(), Vector3::zeros(), Vector3::new(10.0, 0.0, 0.0));
    let omega = Vector3::new(0.0, 0.0, 0.1);

    let mut covariance = Matrix9::identity() * 1e-6;
    let accel_cov = Matrix3::identity() * (ACCEL_NOISE_DENSITY * ACCEL_NOISE_DENSITY / dt);
    let gyro_cov = Matrix3::identity() * (GYRO_NOISE_DENSITY * GYRO_NOISE_DENSITY / dt);

    info!("Propagating {} samples at {} Hz", steps, IMU_RATE_HZ);

    for step in 0..steps {
        // Body-frame kinematic acceleration of a coordinated turn, gravity removed.
        let acc = omega.cross(&state.body_velocity(None));
        let (next, jacobians) = state.update_with_jacobians(&acc, &omega, dt);

        covariance = jacobians.f * covariance * jacobians.f.transpose()
            + jacobians.g_acc * accel_cov * jacobians.g_acc.transpose()
            + jacobians.g_omega * gyro_cov * jacobians.g_omega.transpose();
        state = next;

        if (step + 1) % (IMU_RATE_HZ as usize) == 0 {
            let position_sigma = (covariance[(3, 3)] + covariance[(4, 4)] + covariance[(5, 5)]).sqrt();
            info!(
                "t = {:>5.2} s  position [{:>8.3}, {:>8.3}, {:>8.3}]  speed {:.3} m/s  σp {:.2e} m",
                (step + 1) as f64 * dt,
                state.position(None).x,
                state.position(None).y,
                state.position(None).z,
                state.velocity(None).norm(),
                position_sigma
            );
        }
    }

    let radius = 10.0 / omega.z;
    info!("Final state: {}", state);
    info!(
        "Distance from turn centre: {:.3} m (expected {:.3} m)",
        (state.position(None) - Vector3::new(0.0, radius, 0.0)).norm(),
        radius
    );
}
