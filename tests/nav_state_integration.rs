//! Integration tests for the navigation state manifold
//!
//! Every analytic Jacobian is checked against central differences, at a state
//! near the identity and at one far from it.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use nalgebra::Vector3;
use navstate::{
    ChartAtOrigin, LieGroup, Matrix3x9, Matrix9, Matrix9x3, Matrix9x6, NavState, SE3, SO3,
    SO3Tangent, Tangent, Vector9,
};
use std::f64::consts::PI;

use nav_test_utils::*;

const TOLERANCE: f64 = 1e-9;

#[test]
fn test_constructor_from_pose_velocity() {
    let mut jac_pose = Matrix9x6::zeros();
    let mut jac_velocity = Matrix9x3::zeros();
    let actual = NavState::from_pose_velocity(
        &k_pose(),
        &k_velocity(),
        Some(&mut jac_pose),
        Some(&mut jac_velocity),
    );
    assert_state_close(&actual, &k_state1(), TOLERANCE, "from_pose_velocity");

    let velocity = k_velocity();
    let numerical_pose = numerical_derivative(
        |pose: &SE3| NavState::from_pose_velocity(pose, &velocity, None, None),
        &k_pose(),
    );
    assert_jacobian_close(&jac_pose, &numerical_pose, "from_pose_velocity wrt pose");

    let pose = k_pose();
    let numerical_velocity = numerical_derivative(
        |v: &Vector3<f64>| NavState::from_pose_velocity(&pose, v, None, None),
        &k_velocity(),
    );
    assert_jacobian_close(&jac_velocity, &numerical_velocity, "from_pose_velocity wrt velocity");
}

#[test]
fn test_accessors_with_jacobians() {
    for state in [k_state1(), k_state_far()] {
        let mut jacobian = Matrix3x9::zeros();

        let attitude = state.attitude(Some(&mut jacobian)).clone();
        assert!(attitude.is_approx(state.attitude(None), TOLERANCE));
        let numerical = numerical_derivative(|s: &NavState| s.attitude(None).clone(), &state);
        assert_jacobian_close(&jacobian, &numerical, "attitude");

        state.position(Some(&mut jacobian));
        let numerical = numerical_derivative(|s: &NavState| s.position(None), &state);
        assert_jacobian_close(&jacobian, &numerical, "position");

        state.velocity(Some(&mut jacobian));
        let numerical = numerical_derivative(|s: &NavState| s.velocity(None), &state);
        assert_jacobian_close(&jacobian, &numerical, "velocity");

        let body_velocity = state.body_velocity(Some(&mut jacobian));
        let expected = state.attitude(None).inverse_act(&state.velocity(None), None, None);
        assert!((body_velocity - expected).norm() < TOLERANCE);
        let numerical = numerical_derivative(|s: &NavState| s.body_velocity(None), &state);
        assert_jacobian_close(&jacobian, &numerical, "body_velocity");
    }

    assert!((k_state1().position(None) - k_position()).norm() < TOLERANCE);
    assert!((k_state1().velocity(None) - k_velocity()).norm() < TOLERANCE);
}

#[test]
fn test_matrix_group() {
    let state1 = k_state1();
    let t = state1.matrix();
    let recovered = NavState::from_matrix(&t).expect("valid embedding");
    assert_state_close(&recovered, &state1, TOLERANCE, "matrix roundtrip");

    let state2 = &state1 * &state1;
    let t2 = t * t;
    let from_product = NavState::from_matrix(&t2).expect("valid embedding");
    assert_state_close(&from_product, &state2, TOLERANCE, "matrix product");
    assert!((t2 - state2.matrix()).amax() < TOLERANCE);
}

#[test]
fn test_manifold_zero_xi() {
    let zero = Vector9::zeros();
    let identity = NavState::identity();
    let state1 = k_state1();

    assert_state_close(&identity.retract(&zero, None, None), &identity, TOLERANCE, "identity retract");
    assert_vector9_close(&identity.local_coordinates(&identity, None, None), &zero, TOLERANCE, "identity local");
    assert_state_close(&state1.retract(&zero, None, None), &state1, TOLERANCE, "state1 retract");
    assert_vector9_close(&state1.local_coordinates(&state1, None, None), &zero, TOLERANCE, "state1 local");
}

#[test]
fn test_manifold_retract_definition_and_roundtrip() {
    let state1 = k_state1();
    let xi = k_xi();

    let d_rotation = SO3Tangent::new(Vector3::new(0.1, 0.1, 0.1)).exp(None);
    let d_position = Vector3::new(0.2, 0.3, 0.4);
    let d_velocity = Vector3::new(-0.1, -0.2, -0.3);
    let state2 = &state1 * &NavState::new(d_rotation, d_position, d_velocity);

    assert_state_close(&state1.retract(&xi, None, None), &state2, TOLERANCE, "retract decomposition");
    assert_vector9_close(&state1.local_coordinates(&state2, None, None), &xi, TOLERANCE, "local of retract");

    let state3 = state2.retract(&xi, None, None);
    assert_vector9_close(&state2.local_coordinates(&state3, None, None), &xi, TOLERANCE, "roundtrip");
}

#[test]
fn test_chart_at_origin_jacobians() {
    for xi in [Vector9::zeros(), k_xi()] {
        let mut jacobian = Matrix9::zeros();
        ChartAtOrigin::retract(&xi, Some(&mut jacobian));
        let numerical = numerical_derivative(|x: &Vector9| ChartAtOrigin::retract(x, None), &xi);
        assert_jacobian_close(&jacobian, &numerical, "ChartAtOrigin::retract");
    }

    for state in [NavState::identity(), k_state1()] {
        let mut jacobian = Matrix9::zeros();
        ChartAtOrigin::local(&state, Some(&mut jacobian));
        let numerical = numerical_derivative(|s: &NavState| ChartAtOrigin::local(s, None), &state);
        assert_jacobian_close(&jacobian, &numerical, "ChartAtOrigin::local");
    }
}

#[test]
fn test_retract_jacobians() {
    let xi = k_xi();
    for state in [k_state1(), k_state_far()] {
        let mut jac_state = Matrix9::zeros();
        let mut jac_xi = Matrix9::zeros();
        state.retract(&xi, Some(&mut jac_state), Some(&mut jac_xi));

        let numerical_state = numerical_derivative(|s: &NavState| s.retract(&xi, None, None), &state);
        let numerical_xi = numerical_derivative(|x: &Vector9| state.retract(x, None, None), &xi);
        assert_jacobian_close(&jac_state, &numerical_state, "retract wrt state");
        assert_jacobian_close(&jac_xi, &numerical_xi, "retract wrt xi");
    }
}

#[test]
fn test_local_coordinates_jacobians() {
    let state1 = k_state1();
    let identity = NavState::identity();
    let state2 = state1.retract(&k_xi(), None, None);

    let pairs = [
        (state1.clone(), state2.clone(), "state1 to state2"),
        (identity.clone(), state2.clone(), "identity to state2"),
        (state2.clone(), identity.clone(), "state2 to identity"),
    ];

    for (from, to, context) in pairs {
        let mut jac_from = Matrix9::zeros();
        let mut jac_to = Matrix9::zeros();
        from.local_coordinates(&to, Some(&mut jac_from), Some(&mut jac_to));

        let numerical_from =
            numerical_derivative(|s: &NavState| s.local_coordinates(&to, None, None), &from);
        let numerical_to =
            numerical_derivative(|s: &NavState| from.local_coordinates(s, None, None), &to);
        assert_jacobian_close(&jac_from, &numerical_from, context);
        assert_jacobian_close(&jac_to, &numerical_to, context);
    }
}

#[test]
fn test_lie_expmap_logmap() {
    let zero = Vector9::zeros();
    let identity = NavState::identity();
    let state1 = k_state1();

    assert_state_close(&identity.expmap(&zero, None, None), &identity, TOLERANCE, "identity expmap");
    assert_vector9_close(&identity.logmap(&identity, None, None), &zero, TOLERANCE, "identity logmap");
    assert_state_close(&state1.expmap(&zero, None, None), &state1, TOLERANCE, "state1 expmap");
    assert_vector9_close(&state1.logmap(&state1, None, None), &zero, TOLERANCE, "state1 logmap");

    let xi = k_xi();
    let state2 = NavState::expmap_at_origin(&xi, None);
    assert_vector9_close(&NavState::logmap_at_origin(&state2, None), &xi, TOLERANCE, "static roundtrip");

    let state3 = state2.expmap(&xi, None, None);
    assert_vector9_close(&state2.logmap(&state3, None, None), &xi, TOLERANCE, "instance roundtrip");

    assert_state_close(&state3.expmap(&-xi, None, None), &state2, TOLERANCE, "negated expmap");
    assert_vector9_close(&-state3.logmap(&state2, None, None), &xi, TOLERANCE, "negated logmap");
}

#[test]
fn test_lie_jacobians() {
    let xi = k_xi();

    let mut jacobian = Matrix9::zeros();
    NavState::expmap_at_origin(&xi, Some(&mut jacobian));
    let numerical = numerical_derivative(|x: &Vector9| NavState::expmap_at_origin(x, None), &xi);
    assert_jacobian_close(&jacobian, &numerical, "expmap_at_origin");

    for state in [k_state1(), k_state_far()] {
        NavState::logmap_at_origin(&state, Some(&mut jacobian));
        let numerical = numerical_derivative(|s: &NavState| NavState::logmap_at_origin(s, None), &state);
        assert_jacobian_close(&jacobian, &numerical, "logmap_at_origin");

        let mut jac_state = Matrix9::zeros();
        let mut jac_xi = Matrix9::zeros();
        state.expmap(&xi, Some(&mut jac_state), Some(&mut jac_xi));
        let numerical_state = numerical_derivative(|s: &NavState| s.expmap(&xi, None, None), &state);
        let numerical_xi = numerical_derivative(|x: &Vector9| state.expmap(x, None, None), &xi);
        assert_jacobian_close(&jac_state, &numerical_state, "expmap wrt state");
        assert_jacobian_close(&jac_xi, &numerical_xi, "expmap wrt xi");

        let other = k_state1().retract(&xi, None, None);
        let mut jac_other = Matrix9::zeros();
        state.logmap(&other, Some(&mut jac_state), Some(&mut jac_other));
        let numerical_state = numerical_derivative(|s: &NavState| s.logmap(&other, None, None), &state);
        let numerical_other = numerical_derivative(|s: &NavState| state.logmap(s, None, None), &other);
        assert_jacobian_close(&jac_state, &numerical_state, "logmap wrt state");
        assert_jacobian_close(&jac_other, &numerical_other, "logmap wrt other");
    }
}

#[test]
fn test_group_operation_jacobians() {
    let a = k_state1();
    let b = k_state_far();
    let mut jac_a = Matrix9::zeros();
    let mut jac_b = Matrix9::zeros();

    a.compose(&b, Some(&mut jac_a), Some(&mut jac_b));
    assert_jacobian_close(&jac_a, &numerical_derivative(|s: &NavState| s.compose(&b, None, None), &a), "compose wrt self");
    assert_jacobian_close(&jac_b, &numerical_derivative(|s: &NavState| a.compose(s, None, None), &b), "compose wrt other");

    a.inverse(Some(&mut jac_a));
    assert_jacobian_close(&jac_a, &numerical_derivative(|s: &NavState| s.inverse(None), &a), "inverse");

    a.between(&b, Some(&mut jac_a), Some(&mut jac_b));
    assert_jacobian_close(&jac_a, &numerical_derivative(|s: &NavState| s.between(&b, None, None), &a), "between wrt self");
    assert_jacobian_close(&jac_b, &numerical_derivative(|s: &NavState| a.between(s, None, None), &b), "between wrt other");
}

#[test]
fn test_update() {
    let state1 = k_state1();
    let dt = 10.0;
    let omega = Vector3::new(PI / 100.0, 0.0, 0.0);
    let acc = Vector3::new(0.1, 0.0, 0.0);

    let nav_acc = k_attitude().act(&acc, None, None);
    let expected = NavState::new(
        k_attitude().compose(&SO3Tangent::new(omega * dt).exp(None), None, None),
        k_position() + (k_velocity() + nav_acc * dt / 2.0) * dt,
        k_velocity() + nav_acc * dt,
    );
    let actual = state1.update(&acc, &omega, dt, None, None, None);
    assert_state_close(&actual, &expected, TOLERANCE, "update closed form");

    let inputs = [
        (acc, omega),
        (Vector3::new(0.4, 0.5, 0.6), Vector3::new(0.1, 0.2, 0.3)),
    ];

    for (acc, omega) in inputs {
        let (_, jacobians) = state1.update_with_jacobians(&acc, &omega, dt);

        let numerical_state =
            numerical_derivative(|s: &NavState| s.update(&acc, &omega, dt, None, None, None), &state1);
        let numerical_acc =
            numerical_derivative(|a: &Vector3<f64>| state1.update(a, &omega, dt, None, None, None), &acc);
        let numerical_omega =
            numerical_derivative(|w: &Vector3<f64>| state1.update(&acc, w, dt, None, None, None), &omega);

        assert_jacobian_close(&jacobians.f, &numerical_state, "update F");
        assert_jacobian_close(&jacobians.g_acc, &numerical_acc, "update G1");
        assert_jacobian_close(&jacobians.g_omega, &numerical_omega, "update G2");
    }
}

#[test]
fn test_coriolis() {
    let dt = 2.0;
    let omega = k_omega_coriolis();

    for state in [k_state1(), k_state_far()] {
        for second_order in [false, true] {
            let mut jacobian = Matrix9::zeros();
            state.coriolis(dt, &omega, second_order, Some(&mut jacobian));
            let numerical = numerical_derivative(
                |s: &NavState| s.coriolis(dt, &omega, second_order, None),
                &state,
            );
            assert_jacobian_close(&jacobian, &numerical, "coriolis");
        }
    }
}

#[test]
fn test_correct_pim() {
    let xi = k_xi();
    let dt = 0.5;
    let gravity = k_gravity();
    let omega = k_omega_coriolis();

    for state in [k_state1(), k_state_far()] {
        for omega_coriolis in [None, Some(&omega)] {
            for second_order in [false, true] {
                let mut jac_state = Matrix9::zeros();
                let mut jac_pim = Matrix9::zeros();
                state.correct_pim(
                    &xi,
                    dt,
                    &gravity,
                    omega_coriolis,
                    second_order,
                    Some(&mut jac_state),
                    Some(&mut jac_pim),
                );

                let numerical_state = numerical_derivative(
                    |s: &NavState| {
                        s.correct_pim(&xi, dt, &gravity, omega_coriolis, second_order, None, None)
                    },
                    &state,
                );
                let numerical_pim = numerical_derivative(
                    |p: &Vector9| {
                        state.correct_pim(p, dt, &gravity, omega_coriolis, second_order, None, None)
                    },
                    &xi,
                );
                assert_jacobian_close(&jac_state, &numerical_state, "correct_pim wrt state");
                assert_jacobian_close(&jac_pim, &numerical_pim, "correct_pim wrt pim");
            }
        }
    }
}

#[test]
fn test_rotation_primitive_jacobians() {
    let rotation = k_attitude();
    let vector = k_velocity();

    let mut jac_rotation = nalgebra::Matrix3::zeros();
    let mut jac_vector = nalgebra::Matrix3::zeros();
    rotation.inverse_act(&vector, Some(&mut jac_rotation), Some(&mut jac_vector));
    assert_jacobian_close(
        &jac_rotation,
        &numerical_derivative(|r: &SO3| r.inverse_act(&vector, None, None), &rotation),
        "inverse_act wrt rotation",
    );
    assert_jacobian_close(
        &jac_vector,
        &numerical_derivative(|v: &Vector3<f64>| rotation.inverse_act(v, None, None), &vector),
        "inverse_act wrt vector",
    );
}
