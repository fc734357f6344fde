//! Strapdown mechanization: propagate a navigation state with one IMU sample.
//!
//! Given a bias-corrected acceleration `a` and angular rate `ω`, both in the
//! body frame, and a sample interval `dt`:
//!
//! ```text
//! R' = R Exp(ω dt)
//! p' = p + v dt + ½ R a dt²
//! v' = v + R a dt
//! ```
//!
//! `a` is taken as-is; gravity enters through
//! [`NavState::correct_pim`](crate::manifold::NavState::correct_pim) once per
//! preintegration window.

use crate::manifold::NavState;
use crate::manifold::nav_state::{Matrix3x9, Matrix9, Matrix9x3, NavStateTangent};
use nalgebra::Vector3;

/// Jacobians of one mechanization step.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateJacobians {
    /// ∂state'/∂state
    pub f: Matrix9,
    /// ∂state'/∂acceleration
    pub g_acc: Matrix9x3,
    /// ∂state'/∂angular rate
    pub g_omega: Matrix9x3,
}

impl NavState {
    /// Integrate one IMU sample.
    ///
    /// The step is the retraction of `ξ = [ω dt, Rᵀv dt + ½ a dt², a dt]`, so
    /// every Jacobian is the chain rule through
    /// [`retract`](NavState::retract). The state enters ξ through the body
    /// velocity `Rᵀv`, which adds a term to `F`.
    ///
    /// # Arguments
    /// * `acc_body` - Bias-corrected acceleration in the body frame
    /// * `omega_body` - Bias-corrected angular rate in the body frame
    /// * `dt` - Sample interval (s)
    /// * `jacobian_state` - Optional 9×9 Jacobian F wrt this state
    /// * `jacobian_acc` - Optional 9×3 Jacobian G1 wrt `acc_body`
    /// * `jacobian_omega` - Optional 9×3 Jacobian G2 wrt `omega_body`
    pub fn update(
        &self,
        acc_body: &Vector3<f64>,
        omega_body: &Vector3<f64>,
        dt: f64,
        jacobian_state: Option<&mut Matrix9>,
        jacobian_acc: Option<&mut Matrix9x3>,
        jacobian_omega: Option<&mut Matrix9x3>,
    ) -> NavState {
        let mut d_body_velocity_state = Matrix3x9::zeros();
        let body_velocity =
            self.body_velocity(jacobian_state.is_some().then_some(&mut d_body_velocity_state));

        let half_dt_squared = 0.5 * dt * dt;
        let xi = NavStateTangent::new(
            omega_body * dt,
            body_velocity * dt + acc_body * half_dt_squared,
            acc_body * dt,
        )
        .coeffs();

        let wants_state = jacobian_state.is_some();
        let wants_inputs = wants_state || jacobian_acc.is_some() || jacobian_omega.is_some();

        let mut d_new_state = Matrix9::zeros();
        let mut d_new_xi = Matrix9::zeros();
        let new_state = self.retract(
            &xi,
            wants_state.then_some(&mut d_new_state),
            wants_inputs.then_some(&mut d_new_xi),
        );

        if !wants_inputs {
            return new_state;
        }

        let d_new_rho = d_new_xi.fixed_columns::<3>(3);

        if let Some(f) = jacobian_state {
            *f = d_new_state + d_new_rho * dt * d_body_velocity_state;
        }

        if let Some(g_acc) = jacobian_acc {
            *g_acc = d_new_rho * half_dt_squared + d_new_xi.fixed_columns::<3>(6) * dt;
        }

        if let Some(g_omega) = jacobian_omega {
            *g_omega = d_new_xi.fixed_columns::<3>(0) * dt;
        }

        new_state
    }

    /// [`update`](NavState::update) returning all three Jacobians by value.
    pub fn update_with_jacobians(
        &self,
        acc_body: &Vector3<f64>,
        omega_body: &Vector3<f64>,
        dt: f64,
    ) -> (NavState, UpdateJacobians) {
        let mut jacobians = UpdateJacobians {
            f: Matrix9::zeros(),
            g_acc: Matrix9x3::zeros(),
            g_omega: Matrix9x3::zeros(),
        };
        let state = self.update(
            acc_body,
            omega_body,
            dt,
            Some(&mut jacobians.f),
            Some(&mut jacobians.g_acc),
            Some(&mut jacobians.g_omega),
        );
        (state, jacobians)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::{LieGroup, SO3, SO3Tangent, Tangent};
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-9;

    fn state1() -> NavState {
        NavState::new(
            SO3::from_euler_angles(0.1, 0.2, 0.3),
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.4, 0.5, 0.6),
        )
    }

    #[test]
    fn test_update_matches_closed_form() {
        let state = state1();
        let omega = Vector3::new(PI / 100.0, 0.0, 0.0);
        let acc = Vector3::new(0.1, 0.0, 0.0);
        let dt = 10.0;

        let attitude = state.attitude(None);
        let nav_acc = attitude.act(&acc, None, None);
        let expected = NavState::new(
            attitude.compose(&SO3Tangent::new(omega * dt).exp(None), None, None),
            state.position(None) + (state.velocity(None) + nav_acc * dt / 2.0) * dt,
            state.velocity(None) + nav_acc * dt,
        );

        let actual = state.update(&acc, &omega, dt, None, None, None);
        assert!(actual.is_approx(&expected, TOLERANCE));
    }

    #[test]
    fn test_update_zero_inputs_coasts() {
        let state = state1();
        let dt = 0.5;
        let coasted = state.update(&Vector3::zeros(), &Vector3::zeros(), dt, None, None, None);
        assert!(coasted.attitude(None).is_approx(state.attitude(None), TOLERANCE));
        assert!(
            (coasted.position(None) - (state.position(None) + state.velocity(None) * dt)).norm()
                < TOLERANCE
        );
        assert!((coasted.velocity(None) - state.velocity(None)).norm() < TOLERANCE);
    }

    #[test]
    fn test_update_with_jacobians_matches_out_arguments() {
        let state = state1();
        let acc = Vector3::new(0.4, 0.5, 0.6);
        let omega = Vector3::new(0.1, 0.2, 0.3);
        let dt = 0.1;

        let mut f = Matrix9::zeros();
        let mut g_acc = Matrix9x3::zeros();
        let mut g_omega = Matrix9x3::zeros();
        let direct = state.update(&acc, &omega, dt, Some(&mut f), Some(&mut g_acc), Some(&mut g_omega));
        let (by_value, jacobians) = state.update_with_jacobians(&acc, &omega, dt);

        assert!(direct.is_approx(&by_value, 1e-15));
        assert_eq!(jacobians.f, f);
        assert_eq!(jacobians.g_acc, g_acc);
        assert_eq!(jacobians.g_omega, g_omega);
    }

    #[test]
    fn test_update_value_without_jacobians() {
        let state = state1();
        let acc = Vector3::new(0.4, 0.5, 0.6);
        let omega = Vector3::new(0.1, 0.2, 0.3);
        let dt = 0.1;

        let plain = state.update(&acc, &omega, dt, None, None, None);
        let (with_jacobians, _) = state.update_with_jacobians(&acc, &omega, dt);
        assert_eq!(plain, with_jacobians);

        let mut g_omega = Matrix9x3::zeros();
        assert_eq!(state.update(&acc, &omega, dt, None, None, Some(&mut g_omega)), plain);
        assert!(g_omega.norm() > 0.0);
    }

    #[test]
    fn test_update_only_input_jacobians() {
        // Requesting G1 alone must not depend on F being requested.
        let state = state1();
        let acc = Vector3::new(0.4, 0.5, 0.6);
        let omega = Vector3::new(0.1, 0.2, 0.3);
        let dt = 0.1;

        let mut g_acc_alone = Matrix9x3::zeros();
        state.update(&acc, &omega, dt, None, Some(&mut g_acc_alone), None);
        let (_, jacobians) = state.update_with_jacobians(&acc, &omega, dt);
        assert!((g_acc_alone - jacobians.g_acc).norm() < 1e-15);
    }

    #[test]
    fn test_update_identity_jacobian_for_zero_dt() {
        let state = state1();
        let (next, jacobians) =
            state.update_with_jacobians(&Vector3::new(1.0, 2.0, 3.0), &Vector3::new(0.3, 0.2, 0.1), 0.0);
        assert!(next.is_approx(&state, TOLERANCE));
        assert!((jacobians.f - NavState::jacobian_identity()).norm() < TOLERANCE);
        assert!(jacobians.g_acc.norm() < TOLERANCE);
        assert!(jacobians.g_omega.norm() < TOLERANCE);
    }
}
