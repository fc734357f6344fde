//! NavState - attitude, position and velocity of a moving body.
//!
//! A navigation state is the triple (R, p, v) with R the world-from-body
//! rotation and p, v the position and velocity expressed in the world frame.
//! It forms the extended pose group SE₂(3), a semi-direct product of SO(3)
//! with two copies of ℝ³:
//!
//! ```text
//! (R₁, p₁, v₁) ∘ (R₂, p₂, v₂) = (R₁R₂, p₁ + R₁p₂, v₁ + R₁v₂)
//! ```
//!
//! so the increments carried by the right operand are expressed in the body
//! frame of the left one. The homogeneous 7×7 embedding is
//!
//! ```text
//! [ R  0  p ]
//! [ 0  R  v ]
//! [ 0  0  1 ]
//! ```
//!
//! Tangent vectors are `ξ = [ω(3), ρ(3), ν(3)]`. Two distinct maps take a
//! tangent vector to a state:
//!
//! - the chart ([`ChartAtOrigin`], [`NavState::retract`],
//!   [`NavState::local_coordinates`]) which adds ρ and ν directly,
//! - the group exponential ([`NavState::expmap_at_origin`],
//!   [`NavState::expmap`], [`NavState::logmap`]) which couples them to the
//!   rotation through the SO(3) left Jacobian.
//!
//! They agree to first order at the identity and nowhere else.

use crate::manifold::se3::{SE3, q_matrix};
use crate::manifold::so3::{ROTATION_MATRIX_TOLERANCE, SO3, SO3Tangent};
use crate::manifold::{LieGroup, ManifoldError, ManifoldResult, Tangent};
use nalgebra::{DVector, Matrix3, SMatrix, SVector, Vector3};
use std::f64::consts::PI;
use std::fmt;
use std::ops::Mul;
use tracing::{debug, trace};

/// 9-vector `[ω, ρ, ν]`.
pub type Vector9 = SVector<f64, 9>;
/// 9×9 Jacobian between navigation state tangents.
pub type Matrix9 = SMatrix<f64, 9, 9>;
/// Jacobian of a 3-vector with respect to a navigation state.
pub type Matrix3x9 = SMatrix<f64, 3, 9>;
/// Jacobian of a navigation state with respect to a 3-vector.
pub type Matrix9x3 = SMatrix<f64, 9, 3>;
/// Jacobian of a navigation state with respect to a pose.
pub type Matrix9x6 = SMatrix<f64, 9, 6>;
/// Homogeneous matrix embedding of a navigation state.
pub type Matrix7 = SMatrix<f64, 7, 7>;

/// Angle beyond which the rotation logarithm is reported as near-singular.
const NEAR_PI_MARGIN: f64 = 1e-3;

#[inline]
fn set_block(matrix: &mut Matrix9, row: usize, col: usize, block: &Matrix3<f64>) {
    matrix.fixed_view_mut::<3, 3>(row, col).copy_from(block);
}

#[inline]
fn skew(vector: &Vector3<f64>) -> Matrix3<f64> {
    SO3Tangent::new(*vector).hat()
}

/// Block-diagonal 9×9 matrix.
fn block_diagonal(a: &Matrix3<f64>, b: &Matrix3<f64>, c: &Matrix3<f64>) -> Matrix9 {
    let mut matrix = Matrix9::zeros();
    set_block(&mut matrix, 0, 0, a);
    set_block(&mut matrix, 3, 3, b);
    set_block(&mut matrix, 6, 6, c);
    matrix
}

/// Navigation state: attitude, position and velocity.
#[derive(Clone, Debug, PartialEq)]
pub struct NavState {
    attitude: SO3,
    position: Vector3<f64>,
    velocity: Vector3<f64>,
}

impl Default for NavState {
    fn default() -> Self {
        <NavState as LieGroup>::identity()
    }
}

impl fmt::Display for NavState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.attitude.quaternion();
        let p = self.position;
        let v = self.velocity;
        write!(
            f,
            "NavState(R: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}], p: [{:.4}, {:.4}, {:.4}], v: [{:.4}, {:.4}, {:.4}])",
            q.w, q.i, q.j, q.k, p.x, p.y, p.z, v.x, v.y, v.z
        )
    }
}

impl NavState {
    /// Create a navigation state from its three components.
    pub fn new(attitude: SO3, position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        NavState {
            attitude,
            position,
            velocity,
        }
    }

    /// Create a navigation state from a pose and a world-frame velocity.
    ///
    /// # Arguments
    /// * `pose` - Attitude and position
    /// * `velocity` - World-frame velocity
    /// * `jacobian_pose` - Optional 9×6 Jacobian wrt the pose (`[θ, ρ]` layout)
    /// * `jacobian_velocity` - Optional 9×3 Jacobian wrt the velocity: `[0; 0; Rᵀ]`
    pub fn from_pose_velocity(
        pose: &SE3,
        velocity: &Vector3<f64>,
        jacobian_pose: Option<&mut Matrix9x6>,
        jacobian_velocity: Option<&mut Matrix9x3>,
    ) -> Self {
        if let Some(jac_pose) = jacobian_pose {
            *jac_pose = Matrix9x6::zeros();
            jac_pose
                .fixed_view_mut::<6, 6>(0, 0)
                .fill_with_identity();
        }

        if let Some(jac_velocity) = jacobian_velocity {
            *jac_velocity = Matrix9x3::zeros();
            jac_velocity
                .fixed_view_mut::<3, 3>(6, 0)
                .copy_from(&pose.rotation().rotation_matrix().transpose());
        }

        NavState::new(pose.rotation().clone(), pose.translation(), *velocity)
    }

    /// Attitude, with optional Jacobian `[I 0 0]`.
    pub fn attitude(&self, jacobian: Option<&mut Matrix3x9>) -> &SO3 {
        if let Some(jac) = jacobian {
            *jac = Matrix3x9::zeros();
            jac.fixed_view_mut::<3, 3>(0, 0).fill_with_identity();
        }
        &self.attitude
    }

    /// World-frame position, with optional Jacobian `[0 R 0]`.
    pub fn position(&self, jacobian: Option<&mut Matrix3x9>) -> Vector3<f64> {
        if let Some(jac) = jacobian {
            *jac = Matrix3x9::zeros();
            jac.fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&self.attitude.rotation_matrix());
        }
        self.position
    }

    /// World-frame velocity, with optional Jacobian `[0 0 R]`.
    pub fn velocity(&self, jacobian: Option<&mut Matrix3x9>) -> Vector3<f64> {
        if let Some(jac) = jacobian {
            *jac = Matrix3x9::zeros();
            jac.fixed_view_mut::<3, 3>(0, 6)
                .copy_from(&self.attitude.rotation_matrix());
        }
        self.velocity
    }

    /// Velocity expressed in the body frame, `Rᵀ v`.
    ///
    /// Jacobian: `[[Rᵀv]× 0 I]`
    pub fn body_velocity(&self, jacobian: Option<&mut Matrix3x9>) -> Vector3<f64> {
        let mut jac_attitude = Matrix3::zeros();
        let body_velocity = self.attitude.inverse_act(
            &self.velocity,
            jacobian.is_some().then_some(&mut jac_attitude),
            None,
        );

        if let Some(jac) = jacobian {
            *jac = Matrix3x9::zeros();
            jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&jac_attitude);
            jac.fixed_view_mut::<3, 3>(0, 6).fill_with_identity();
        }

        body_velocity
    }

    /// Attitude and position as a pose.
    pub fn pose(&self) -> SE3 {
        SE3::new(self.attitude.clone(), self.position)
    }

    /// Homogeneous 7×7 matrix `[R 0 p; 0 R v; 0 0 1]`.
    pub fn matrix(&self) -> Matrix7 {
        let rotation = self.attitude.rotation_matrix();
        let mut matrix = Matrix7::zeros();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        matrix.fixed_view_mut::<3, 3>(3, 3).copy_from(&rotation);
        matrix.fixed_view_mut::<3, 1>(0, 6).copy_from(&self.position);
        matrix.fixed_view_mut::<3, 1>(3, 6).copy_from(&self.velocity);
        matrix[(6, 6)] = 1.0;
        matrix
    }

    /// Recover a navigation state from its 7×7 embedding.
    ///
    /// Fails with [`ManifoldError::InvalidRepresentation`] when the matrix
    /// does not have the `[R 0 p; 0 R v; 0 0 1]` structure or `R` is not a
    /// rotation.
    pub fn from_matrix(matrix: &Matrix7) -> ManifoldResult<Self> {
        let upper = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let lower = matrix.fixed_view::<3, 3>(3, 3).into_owned();

        let structure_error = (upper - lower).norm()
            + matrix.fixed_view::<3, 3>(0, 3).norm()
            + matrix.fixed_view::<3, 3>(3, 0).norm()
            + matrix.fixed_view::<1, 6>(6, 0).norm()
            + (matrix[(6, 6)] - 1.0).abs();

        if !structure_error.is_finite() || structure_error > ROTATION_MATRIX_TOLERANCE {
            debug!(structure_error, "rejected 7x7 matrix with invalid block structure");
            return Err(ManifoldError::InvalidRepresentation(format!(
                "7x7 matrix is not of the form [R 0 p; 0 R v; 0 0 1] (residual {structure_error:e})"
            )));
        }

        let attitude = SO3::from_rotation_matrix(&upper)?;
        let position = matrix.fixed_view::<3, 1>(0, 6).into_owned();
        let velocity = matrix.fixed_view::<3, 1>(3, 6).into_owned();

        Ok(NavState::new(attitude, position, velocity))
    }

    /// Retraction `self ∘ ChartAtOrigin::retract(ξ)`.
    ///
    /// Produces `(R Exp(ω), p + Rρ, v + Rν)`.
    ///
    /// # Arguments
    /// * `xi` - Tangent increment `[ω, ρ, ν]`
    /// * `jacobian_self` - Optional Jacobian wrt this state
    /// * `jacobian_xi` - Optional Jacobian wrt ξ: `diag(Jr(ω), bRcᵀ, bRcᵀ)`
    pub fn retract(
        &self,
        xi: &Vector9,
        jacobian_self: Option<&mut Matrix9>,
        jacobian_xi: Option<&mut Matrix9>,
    ) -> NavState {
        let tangent = NavStateTangent::from(*xi);
        let rotation = self.attitude.rotation_matrix();

        let mut jac_omega = Matrix3::zeros();
        let b_r_c = SO3Tangent::new(tangent.omega())
            .exp(jacobian_xi.is_some().then_some(&mut jac_omega));
        let n_r_c = self.attitude.compose(&b_r_c, None, None);

        let rho = tangent.rho();
        let nu = tangent.nu();
        let position = self.position + rotation * rho;
        let velocity = self.velocity + rotation * nu;

        if jacobian_self.is_none() && jacobian_xi.is_none() {
            return NavState::new(n_r_c, position, velocity);
        }

        let b_r_c_t = b_r_c.rotation_matrix().transpose();

        if let Some(jac_self) = jacobian_self {
            let n_r_c_t = n_r_c.rotation_matrix().transpose();
            *jac_self = Matrix9::zeros();
            set_block(jac_self, 0, 0, &b_r_c_t);
            set_block(jac_self, 3, 0, &(n_r_c_t * (-rotation * skew(&rho))));
            set_block(jac_self, 3, 3, &b_r_c_t);
            set_block(jac_self, 6, 0, &(n_r_c_t * (-rotation * skew(&nu))));
            set_block(jac_self, 6, 6, &b_r_c_t);
        }

        if let Some(jac_xi) = jacobian_xi {
            *jac_xi = block_diagonal(&jac_omega, &b_r_c_t, &b_r_c_t);
        }

        NavState::new(n_r_c, position, velocity)
    }

    /// Chart coordinates of `other` around this state, the inverse of [`retract`](Self::retract).
    ///
    /// Returns `[Log(Rᵀ R₂), Rᵀ(p₂ - p), Rᵀ(v₂ - v)]`.
    pub fn local_coordinates(
        &self,
        other: &NavState,
        jacobian_self: Option<&mut Matrix9>,
        jacobian_other: Option<&mut Matrix9>,
    ) -> Vector9 {
        let delta_rotation = self.attitude.between(&other.attitude, None, None);
        let mut jac_log = Matrix3::zeros();
        let wants_jacobian = jacobian_self.is_some() || jacobian_other.is_some();
        let omega = delta_rotation.log(wants_jacobian.then_some(&mut jac_log));

        let delta_position = self
            .attitude
            .inverse_act(&(other.position - self.position), None, None);
        let delta_velocity = self
            .attitude
            .inverse_act(&(other.velocity - self.velocity), None, None);

        if let Some(jac_self) = jacobian_self {
            let minus_identity = -Matrix3::identity();
            *jac_self = Matrix9::zeros();
            set_block(
                jac_self,
                0,
                0,
                &(-jac_log * delta_rotation.rotation_matrix().transpose()),
            );
            set_block(jac_self, 3, 0, &skew(&delta_position));
            set_block(jac_self, 3, 3, &minus_identity);
            set_block(jac_self, 6, 0, &skew(&delta_velocity));
            set_block(jac_self, 6, 6, &minus_identity);
        }

        if let Some(jac_other) = jacobian_other {
            let d_r = delta_rotation.rotation_matrix();
            *jac_other = block_diagonal(&jac_log, &d_r, &d_r);
        }

        NavStateTangent::new(omega.coeffs(), delta_position, delta_velocity).coeffs()
    }

    /// Group exponential at the identity, `Exp(ξ) = (Exp(ω), Jl(ω)ρ, Jl(ω)ν)`.
    ///
    /// Jacobian: the right Jacobian Jr(ξ) of the extended pose group.
    pub fn expmap_at_origin(xi: &Vector9, jacobian: Option<&mut Matrix9>) -> NavState {
        NavStateTangent::from(*xi).exp(jacobian)
    }

    /// Group logarithm at the identity, the inverse of [`expmap_at_origin`](Self::expmap_at_origin).
    ///
    /// Jacobian: Jr⁻¹(ξ).
    pub fn logmap_at_origin(state: &NavState, jacobian: Option<&mut Matrix9>) -> Vector9 {
        state.log(jacobian).coeffs()
    }

    /// `self ∘ Exp(ξ)`.
    ///
    /// Jacobians: `Ad(Exp(ξ)⁻¹)` wrt this state and `Jr(ξ)` wrt ξ.
    pub fn expmap(
        &self,
        xi: &Vector9,
        jacobian_self: Option<&mut Matrix9>,
        jacobian_xi: Option<&mut Matrix9>,
    ) -> NavState {
        self.right_plus(&NavStateTangent::from(*xi), jacobian_self, jacobian_xi)
    }

    /// `Log(self⁻¹ ∘ other)`.
    ///
    /// Jacobians: `-Jr⁻¹(ξ) Ad(d⁻¹)` wrt this state and `Jr⁻¹(ξ)` wrt `other`,
    /// with `d = self⁻¹ ∘ other`.
    pub fn logmap(
        &self,
        other: &NavState,
        jacobian_self: Option<&mut Matrix9>,
        jacobian_other: Option<&mut Matrix9>,
    ) -> Vector9 {
        let delta = self.between(other, None, None);
        let xi = delta.log(None);

        if jacobian_self.is_some() || jacobian_other.is_some() {
            let jr_inv = xi.right_jacobian_inv();
            if let Some(jac_self) = jacobian_self {
                *jac_self = -jr_inv * delta.inverse(None).adjoint();
            }
            if let Some(jac_other) = jacobian_other {
                *jac_other = jr_inv;
            }
        }

        xi.coeffs()
    }
}

/// The chart used to linearize a navigation state around the identity.
///
/// Rotation goes through the SO(3) exponential while position and velocity
/// are taken as plain vector coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChartAtOrigin;

impl ChartAtOrigin {
    /// `(Exp(ω), ρ, ν)` with Jacobian `diag(Jr(ω), Rᵀ, Rᵀ)`.
    pub fn retract(xi: &Vector9, jacobian: Option<&mut Matrix9>) -> NavState {
        let tangent = NavStateTangent::from(*xi);
        let mut jac_omega = Matrix3::zeros();
        let attitude =
            SO3Tangent::new(tangent.omega()).exp(jacobian.is_some().then_some(&mut jac_omega));

        if let Some(jac) = jacobian {
            let r_t = attitude.rotation_matrix().transpose();
            *jac = block_diagonal(&jac_omega, &r_t, &r_t);
        }

        NavState::new(attitude, tangent.rho(), tangent.nu())
    }

    /// `(Log(R), p, v)` with Jacobian `diag(Jr⁻¹(Log R), R, R)`.
    pub fn local(state: &NavState, jacobian: Option<&mut Matrix9>) -> Vector9 {
        let mut jac_log = Matrix3::zeros();
        let omega = state.attitude.log(jacobian.is_some().then_some(&mut jac_log));

        if let Some(jac) = jacobian {
            let rotation = state.attitude.rotation_matrix();
            *jac = block_diagonal(&jac_log, &rotation, &rotation);
        }

        NavStateTangent::new(omega.coeffs(), state.position, state.velocity).coeffs()
    }
}

impl Mul for NavState {
    type Output = NavState;

    fn mul(self, rhs: NavState) -> NavState {
        self.compose(&rhs, None, None)
    }
}

impl<'a> Mul<&'a NavState> for &'a NavState {
    type Output = NavState;

    fn mul(self, rhs: &'a NavState) -> NavState {
        self.compose(rhs, None, None)
    }
}

impl LieGroup for NavState {
    type TangentVector = NavStateTangent;
    type JacobianMatrix = Matrix9;
    type LieAlgebra = Matrix7;
    type ActionJacobian = Matrix3x9;

    const DIM: usize = 3;
    const DOF: usize = 9;
    const REP_SIZE: usize = 10;

    fn identity() -> Self {
        NavState::new(SO3::identity(), Vector3::zeros(), Vector3::zeros())
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix9::identity()
    }

    /// `(Rᵀ, -Rᵀp, -Rᵀv)`, Jacobian `-Ad(X)`.
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        let attitude = self.attitude.inverse(None);
        let position = -attitude.act(&self.position, None, None);
        let velocity = -attitude.act(&self.velocity, None, None);

        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }

        NavState::new(attitude, position, velocity)
    }

    /// `(R₁R₂, p₁ + R₁p₂, v₁ + R₁v₂)`
    ///
    /// J_self = Ad(X₂⁻¹), J_other = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let attitude = self.attitude.compose(&other.attitude, None, None);
        let position = self.position + self.attitude.act(&other.position, None, None);
        let velocity = self.velocity + self.attitude.act(&other.velocity, None, None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix9::identity();
        }

        NavState::new(attitude, position, velocity)
    }

    /// `[Log(R), Jl⁻¹(ω) p, Jl⁻¹(ω) v]`, Jacobian Jr⁻¹(ξ).
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        let omega = self.attitude.log(None);
        let angle = omega.angle();
        if angle > PI - NEAR_PI_MARGIN {
            trace!(angle, "navigation state logarithm close to the rotation cut locus");
        }

        let jl_inv = omega.left_jacobian_inv();
        let result = NavStateTangent::new(
            omega.coeffs(),
            jl_inv * self.position,
            jl_inv * self.velocity,
        );

        if let Some(jac) = jacobian {
            *jac = result.right_jacobian_inv();
        }

        result
    }

    /// Transform a body-frame point into the world frame: `R x + p`.
    ///
    /// J_self = `[-R[x]× R 0]`, J_vector = R
    fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Self::ActionJacobian>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let mut jac_rotation = Matrix3::zeros();
        let rotated = self
            .attitude
            .act(vector, Some(&mut jac_rotation), jacobian_vector);

        if let Some(jac_self) = jacobian_self {
            *jac_self = Matrix3x9::zeros();
            jac_self.fixed_view_mut::<3, 3>(0, 0).copy_from(&jac_rotation);
            jac_self
                .fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&self.attitude.rotation_matrix());
        }

        rotated + self.position
    }

    /// Ad(X) = [R 0 0; [p]×R R 0; [v]×R 0 R]
    fn adjoint(&self) -> Self::JacobianMatrix {
        let rotation = self.attitude.rotation_matrix();
        let mut adjoint = block_diagonal(&rotation, &rotation, &rotation);
        set_block(&mut adjoint, 3, 0, &(skew(&self.position) * rotation));
        set_block(&mut adjoint, 6, 0, &(skew(&self.velocity) * rotation));
        adjoint
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        let position = Vector3::from_fn(|_, _| rng.random_range(-1.0..1.0));
        let velocity = Vector3::from_fn(|_, _| rng.random_range(-1.0..1.0));
        NavState::new(SO3::random(), position, velocity)
    }

    fn normalize(&mut self) {
        self.attitude.normalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.attitude.is_valid(tolerance)
            && self.position.iter().all(|x| x.is_finite())
            && self.velocity.iter().all(|x| x.is_finite())
    }

    /// Component-wise comparison of attitude, position and velocity.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.attitude.is_approx(&other.attitude, tolerance)
            && (self.position - other.position).norm() < tolerance
            && (self.velocity - other.velocity).norm() < tolerance
    }
}

/// Tangent vector of a navigation state, laid out `[ω(3), ρ(3), ν(3)]`.
#[derive(Clone, Debug, PartialEq)]
pub struct NavStateTangent {
    data: Vector9,
}

impl fmt::Display for NavStateTangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let omega = self.omega();
        let rho = self.rho();
        let nu = self.nu();
        write!(
            f,
            "nav(omega: [{:.4}, {:.4}, {:.4}], rho: [{:.4}, {:.4}, {:.4}], nu: [{:.4}, {:.4}, {:.4}])",
            omega.x, omega.y, omega.z, rho.x, rho.y, rho.z, nu.x, nu.y, nu.z
        )
    }
}

impl From<Vector9> for NavStateTangent {
    fn from(data: Vector9) -> Self {
        NavStateTangent { data }
    }
}

impl From<NavStateTangent> for Vector9 {
    fn from(tangent: NavStateTangent) -> Self {
        tangent.data
    }
}

impl TryFrom<DVector<f64>> for NavStateTangent {
    type Error = ManifoldError;

    fn try_from(data: DVector<f64>) -> ManifoldResult<Self> {
        if data.len() != 9 {
            debug!(length = data.len(), "rejected tangent vector of wrong length");
            return Err(ManifoldError::InvalidTangentDimension {
                expected: 9,
                actual: data.len(),
            });
        }
        Ok(NavStateTangent {
            data: Vector9::from_column_slice(data.as_slice()),
        })
    }
}

impl From<NavStateTangent> for DVector<f64> {
    fn from(tangent: NavStateTangent) -> Self {
        DVector::from_column_slice(tangent.data.as_slice())
    }
}

impl NavStateTangent {
    /// Create a tangent vector from its rotation, position and velocity blocks.
    pub fn new(omega: Vector3<f64>, rho: Vector3<f64>, nu: Vector3<f64>) -> Self {
        let mut data = Vector9::zeros();
        data.fixed_rows_mut::<3>(0).copy_from(&omega);
        data.fixed_rows_mut::<3>(3).copy_from(&rho);
        data.fixed_rows_mut::<3>(6).copy_from(&nu);
        NavStateTangent { data }
    }

    /// Rotation block.
    pub fn omega(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    /// Position block.
    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    /// Velocity block.
    pub fn nu(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(6).into_owned()
    }

    /// Raw 9-vector.
    pub fn coeffs(&self) -> Vector9 {
        self.data
    }

    /// Assemble a 9×9 Jacobian from the SO(3) block and the two coupling blocks.
    fn assemble(j: &Matrix3<f64>, q_rho: &Matrix3<f64>, q_nu: &Matrix3<f64>) -> Matrix9 {
        let mut jacobian = block_diagonal(j, j, j);
        set_block(&mut jacobian, 3, 0, q_rho);
        set_block(&mut jacobian, 6, 0, q_nu);
        jacobian
    }
}

impl Tangent<NavState> for NavStateTangent {
    const DIM: usize = 9;

    /// Exp(ξ) = (Exp(ω), Jl(ω)ρ, Jl(ω)ν)
    fn exp(&self, jacobian: Option<&mut Matrix9>) -> NavState {
        let omega = SO3Tangent::new(self.omega());
        let attitude = omega.exp(None);
        let jl = omega.left_jacobian();

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        NavState::new(attitude, jl * self.rho(), jl * self.nu())
    }

    /// Jr = [Jr 0 0; Q(-ρ,-ω) Jr 0; Q(-ν,-ω) 0 Jr]
    fn right_jacobian(&self) -> Matrix9 {
        let omega = self.omega();
        let jr = SO3Tangent::new(omega).right_jacobian();
        Self::assemble(
            &jr,
            &q_matrix(&-self.rho(), &-omega),
            &q_matrix(&-self.nu(), &-omega),
        )
    }

    /// Jl = [Jl 0 0; Q(ρ,ω) Jl 0; Q(ν,ω) 0 Jl]
    fn left_jacobian(&self) -> Matrix9 {
        let omega = self.omega();
        let jl = SO3Tangent::new(omega).left_jacobian();
        Self::assemble(
            &jl,
            &q_matrix(&self.rho(), &omega),
            &q_matrix(&self.nu(), &omega),
        )
    }

    fn right_jacobian_inv(&self) -> Matrix9 {
        let omega = self.omega();
        let jr_inv = SO3Tangent::new(omega).right_jacobian_inv();
        let q_rho = q_matrix(&-self.rho(), &-omega);
        let q_nu = q_matrix(&-self.nu(), &-omega);
        Self::assemble(
            &jr_inv,
            &(-jr_inv * q_rho * jr_inv),
            &(-jr_inv * q_nu * jr_inv),
        )
    }

    fn left_jacobian_inv(&self) -> Matrix9 {
        let omega = self.omega();
        let jl_inv = SO3Tangent::new(omega).left_jacobian_inv();
        let q_rho = q_matrix(&self.rho(), &omega);
        let q_nu = q_matrix(&self.nu(), &omega);
        Self::assemble(
            &jl_inv,
            &(-jl_inv * q_rho * jl_inv),
            &(-jl_inv * q_nu * jl_inv),
        )
    }

    /// ξ^ = [[ω]× 0 ρ; 0 [ω]× ν; 0 0 0] in the 7×7 embedding.
    fn hat(&self) -> Matrix7 {
        let omega_skew = skew(&self.omega());
        let mut lie_alg = Matrix7::zeros();
        lie_alg.fixed_view_mut::<3, 3>(0, 0).copy_from(&omega_skew);
        lie_alg.fixed_view_mut::<3, 3>(3, 3).copy_from(&omega_skew);
        lie_alg.fixed_view_mut::<3, 1>(0, 6).copy_from(&self.rho());
        lie_alg.fixed_view_mut::<3, 1>(3, 6).copy_from(&self.nu());
        lie_alg
    }

    /// ad(ξ) = [[ω]× 0 0; [ρ]× [ω]× 0; [ν]× 0 [ω]×]
    fn small_adj(&self) -> Matrix9 {
        Self::assemble(
            &skew(&self.omega()),
            &skew(&self.rho()),
            &skew(&self.nu()),
        )
    }

    fn zero() -> Self {
        NavStateTangent {
            data: Vector9::zeros(),
        }
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        NavStateTangent {
            data: Vector9::from_fn(|_, _| rng.random_range(-0.1..0.1)),
        }
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.data - other.data).norm() < tolerance
    }
}
