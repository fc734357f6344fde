//! Earth-rotation and gravity correction of preintegrated IMU measurements.
//!
//! A preintegrated measurement (PIM) is a tangent vector `[ω, ρ, ν]`
//! accumulated in the body frame at the start of a window, ignoring gravity
//! and the rotation of the navigation frame. [`NavState::correct_pim`] adds
//! those two effects back for a window of length `dt`.

use crate::error::{NavError, NavResult};
use crate::manifold::NavState;
use crate::manifold::nav_state::{Matrix9, NavStateTangent, Vector9};
use crate::navigation::NavigationParams;
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

impl NavState {
    /// Coriolis and centrifugal increments over `dt`, expressed in the body frame.
    ///
    /// In the navigation frame:
    ///
    /// ```text
    /// δR = -Ω dt
    /// δP = -dt² Ω×v        (- ½ dt² Ω×(Ω×p) with second order)
    /// δV = -2 dt Ω×v       (- dt Ω×(Ω×p) with second order)
    /// ```
    ///
    /// Each block is then rotated by `Rᵀ`.
    ///
    /// # Arguments
    /// * `dt` - Window length (s)
    /// * `omega` - Angular velocity of the navigation frame (rad/s)
    /// * `second_order` - Include the centrifugal terms
    /// * `jacobian` - Optional 9×9 Jacobian wrt this state
    pub fn coriolis(
        &self,
        dt: f64,
        omega: &Vector3<f64>,
        second_order: bool,
        jacobian: Option<&mut Matrix9>,
    ) -> Vector9 {
        let attitude = self.attitude(None);
        let position = self.position(None);
        let velocity = self.velocity(None);
        let dt_squared = dt * dt;
        let omega_cross_velocity = omega.cross(&velocity);

        let nav_rotation = omega * (-dt);
        let mut nav_position = -dt_squared * omega_cross_velocity;
        let mut nav_velocity = -2.0 * dt * omega_cross_velocity;
        if second_order {
            let omega_cross2_position = omega.cross(&omega.cross(&position));
            nav_position -= 0.5 * dt_squared * omega_cross2_position;
            nav_velocity -= dt * omega_cross2_position;
        }

        let wants_jacobian = jacobian.is_some();
        let mut d_rotation = Matrix3::zeros();
        let mut d_position = Matrix3::zeros();
        let mut d_velocity = Matrix3::zeros();
        let mut body_from_nav = Matrix3::zeros();
        let xi = NavStateTangent::new(
            attitude.inverse_act(
                &nav_rotation,
                wants_jacobian.then_some(&mut d_rotation),
                wants_jacobian.then_some(&mut body_from_nav),
            ),
            attitude.inverse_act(&nav_position, wants_jacobian.then_some(&mut d_position), None),
            attitude.inverse_act(&nav_velocity, wants_jacobian.then_some(&mut d_velocity), None),
        );

        if let Some(jac) = jacobian {
            let omega_skew = omega.cross_matrix();
            let d_cross_state = omega_skew * attitude.rotation_matrix();

            *jac = Matrix9::zeros();
            jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&d_rotation);
            jac.fixed_view_mut::<3, 3>(3, 0).copy_from(&d_position);
            jac.fixed_view_mut::<3, 3>(3, 6)
                .copy_from(&(body_from_nav * (-dt_squared) * d_cross_state));
            jac.fixed_view_mut::<3, 3>(6, 0).copy_from(&d_velocity);
            jac.fixed_view_mut::<3, 3>(6, 6)
                .copy_from(&(body_from_nav * (-2.0 * dt) * d_cross_state));

            if second_order {
                let d_cross2_state = omega_skew * d_cross_state;
                let mut position_block = jac.fixed_view_mut::<3, 3>(3, 3);
                position_block -= body_from_nav * (0.5 * dt_squared) * d_cross2_state;
                let mut velocity_block = jac.fixed_view_mut::<3, 3>(6, 3);
                velocity_block -= body_from_nav * dt * d_cross2_state;
            }
        }

        xi.coeffs()
    }

    /// Correct a preintegrated measurement for gravity and, optionally, the
    /// rotation of the navigation frame.
    ///
    /// ```text
    /// ω' = ω
    /// ρ' = ρ + dt Rᵀv + ½ dt² Rᵀg
    /// ν' = ν + dt Rᵀg
    /// ```
    ///
    /// plus [`coriolis`](NavState::coriolis) when `omega_coriolis` is given.
    ///
    /// # Arguments
    /// * `pim` - Preintegrated measurement `[ω, ρ, ν]`
    /// * `dt` - Window length (s)
    /// * `gravity` - Gravity vector in the navigation frame
    /// * `omega_coriolis` - Optional angular velocity of the navigation frame
    /// * `second_order` - Include the centrifugal terms of the Coriolis correction
    /// * `jacobian_self` - Optional 9×9 Jacobian wrt this state
    /// * `jacobian_pim` - Optional 9×9 Jacobian wrt the measurement (identity)
    #[allow(clippy::too_many_arguments)]
    pub fn correct_pim(
        &self,
        pim: &Vector9,
        dt: f64,
        gravity: &Vector3<f64>,
        omega_coriolis: Option<&Vector3<f64>>,
        second_order: bool,
        jacobian_self: Option<&mut Matrix9>,
        jacobian_pim: Option<&mut Matrix9>,
    ) -> Vector9 {
        let attitude = self.attitude(None);
        let half_dt_squared = 0.5 * dt * dt;
        let measurement = NavStateTangent::from(*pim);

        let wants_jacobian = jacobian_self.is_some();
        let mut d_body_velocity = Matrix3::zeros();
        let mut d_body_gravity = Matrix3::zeros();
        let body_velocity = attitude.inverse_act(
            &self.velocity(None),
            wants_jacobian.then_some(&mut d_body_velocity),
            None,
        );
        let body_gravity =
            attitude.inverse_act(gravity, wants_jacobian.then_some(&mut d_body_gravity), None);

        let mut xi = NavStateTangent::new(
            measurement.omega(),
            measurement.rho() + dt * body_velocity + half_dt_squared * body_gravity,
            measurement.nu() + dt * body_gravity,
        )
        .coeffs();

        let mut d_coriolis = Matrix9::zeros();
        if let Some(omega) = omega_coriolis {
            xi += self.coriolis(
                dt,
                omega,
                second_order,
                wants_jacobian.then_some(&mut d_coriolis),
            );
        }

        if let Some(jac_self) = jacobian_self {
            *jac_self = d_coriolis;

            let mut position_rotation = jac_self.fixed_view_mut::<3, 3>(3, 0);
            position_rotation += dt * d_body_velocity + half_dt_squared * d_body_gravity;

            let mut position_velocity = jac_self.fixed_view_mut::<3, 3>(3, 6);
            position_velocity += Matrix3::identity() * dt;

            let mut velocity_rotation = jac_self.fixed_view_mut::<3, 3>(6, 0);
            velocity_rotation += dt * d_body_gravity;
        }

        if let Some(jac_pim) = jacobian_pim {
            *jac_pim = Matrix9::identity();
        }

        xi
    }

    /// [`correct_pim`](NavState::correct_pim) with gravity and earth rotation
    /// taken from `params`.
    ///
    /// Fails when `params` does not validate or `dt` is not finite.
    pub fn correct_pim_with(
        &self,
        pim: &Vector9,
        dt: f64,
        params: &NavigationParams,
        jacobian_self: Option<&mut Matrix9>,
        jacobian_pim: Option<&mut Matrix9>,
    ) -> NavResult<Vector9> {
        params.validate()?;
        if !dt.is_finite() {
            debug!(dt, "rejected preintegration window length");
            return Err(NavError::InvalidInput(format!(
                "window length must be finite, got {dt}"
            )));
        }
        Ok(self.correct_pim(
            pim,
            dt,
            &params.gravity,
            params.earth_rotation_rate.as_ref(),
            params.use_second_order_coriolis,
            jacobian_self,
            jacobian_pim,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::{LieGroup, SO3};

    const TOLERANCE: f64 = 1e-12;

    fn state1() -> NavState {
        NavState::new(
            SO3::from_euler_angles(0.1, 0.2, 0.3),
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.4, 0.5, 0.6),
        )
    }

    fn sample_pim() -> Vector9 {
        Vector9::from_column_slice(&[0.1, 0.1, 0.1, 0.2, 0.3, 0.4, -0.1, -0.2, -0.3])
    }

    #[test]
    fn test_coriolis_at_identity_attitude() {
        // With R = I the body and navigation frames coincide.
        let state = NavState::new(SO3::identity(), Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        let omega = Vector3::new(0.0, 0.0, 0.1);
        let dt = 2.0;

        let first = NavStateTangent::from(state.coriolis(dt, &omega, false, None));
        let omega_cross_v = omega.cross(&Vector3::new(0.0, 1.0, 0.0));
        assert!((first.omega() - (-dt * omega)).norm() < TOLERANCE);
        assert!((first.rho() - (-dt * dt * omega_cross_v)).norm() < TOLERANCE);
        assert!((first.nu() - (-2.0 * dt * omega_cross_v)).norm() < TOLERANCE);

        let second = NavStateTangent::from(state.coriolis(dt, &omega, true, None));
        let centrifugal = omega.cross(&omega.cross(&Vector3::new(1.0, 0.0, 0.0)));
        assert!((second.rho() - first.rho() + 0.5 * dt * dt * centrifugal).norm() < TOLERANCE);
        assert!((second.nu() - first.nu() + dt * centrifugal).norm() < TOLERANCE);
    }

    #[test]
    fn test_coriolis_zero_rate_is_zero() {
        let xi = state1().coriolis(2.0, &Vector3::zeros(), true, None);
        assert!(xi.norm() < TOLERANCE);
    }

    #[test]
    fn test_coriolis_and_pim_values_without_jacobians() {
        let state = state1();
        let pim = sample_pim();
        let gravity = Vector3::new(0.0, 0.0, 9.81);
        let omega = Vector3::new(0.02, 0.03, 0.04);
        let mut jacobian = Matrix9::zeros();

        assert_eq!(
            state.coriolis(0.5, &omega, true, None),
            state.coriolis(0.5, &omega, true, Some(&mut jacobian))
        );
        assert_eq!(
            state.correct_pim(&pim, 0.5, &gravity, Some(&omega), true, None, None),
            state.correct_pim(&pim, 0.5, &gravity, Some(&omega), true, Some(&mut jacobian), None)
        );
    }

    #[test]
    fn test_correct_pim_without_coriolis() {
        let state = state1();
        let pim = sample_pim();
        let dt = 0.5;
        let gravity = Vector3::new(0.0, 0.0, 9.81);
        let r_t = state.attitude(None).rotation_matrix().transpose();

        let mut jac_pim = Matrix9::zeros();
        let corrected =
            NavStateTangent::from(state.correct_pim(&pim, dt, &gravity, None, false, None, Some(&mut jac_pim)));
        let measurement = NavStateTangent::from(pim);

        assert!((corrected.omega() - measurement.omega()).norm() < TOLERANCE);
        let expected_rho = measurement.rho()
            + dt * r_t * state.velocity(None)
            + 0.5 * dt * dt * r_t * gravity;
        assert!((corrected.rho() - expected_rho).norm() < TOLERANCE);
        assert!((corrected.nu() - (measurement.nu() + dt * r_t * gravity)).norm() < TOLERANCE);
        assert_eq!(jac_pim, Matrix9::identity());
    }

    #[test]
    fn test_correct_pim_adds_coriolis() {
        let state = state1();
        let pim = sample_pim();
        let gravity = Vector3::new(0.0, 0.0, 9.81);
        let omega = Vector3::new(0.02, 0.03, 0.04);

        let plain = state.correct_pim(&pim, 0.5, &gravity, None, false, None, None);
        let corrected = state.correct_pim(&pim, 0.5, &gravity, Some(&omega), true, None, None);
        let coriolis = state.coriolis(0.5, &omega, true, None);
        assert!((corrected - plain - coriolis).norm() < TOLERANCE);
    }

    #[test]
    fn test_correct_pim_with_params() {
        let state = state1();
        let pim = sample_pim();
        let omega = Vector3::new(0.02, 0.03, 0.04);
        let params = NavigationParams::z_down(9.81)
            .with_earth_rotation_rate(omega)
            .with_second_order_coriolis(true);

        let from_params = state.correct_pim_with(&pim, 0.5, &params, None, None);
        let direct = state.correct_pim(&pim, 0.5, &params.gravity, Some(&omega), true, None, None);
        assert!(matches!(from_params, Ok(xi) if (xi - direct).norm() < TOLERANCE));

        let invalid = NavigationParams::new().with_gravity(Vector3::new(f64::NAN, 0.0, 0.0));
        assert!(matches!(
            state.correct_pim_with(&pim, 0.5, &invalid, None, None),
            Err(NavError::Configuration(_))
        ));
        assert!(matches!(
            state.correct_pim_with(&pim, f64::NAN, &params, None, None),
            Err(NavError::InvalidInput(_))
        ));
    }
}
