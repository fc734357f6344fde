//! SE(3) - rigid body pose (attitude + position).
//!
//! Elements are stored as an [`SO3`] rotation and a translation vector.
//! Tangent elements are laid out `[θ(3), ρ(3)]`: rotational block first, so
//! that a pose tangent embeds directly into the first two blocks of a
//! navigation state tangent.
//!
//! Jacobians follow the right-perturbation convention `T ∘ Exp(δ)`.
//!
//! # References
//! - "A micro Lie theory for state estimation in robotics" - Solà et al.
//! - "State Estimation for Robotics" - Barfoot, §7.1.5 (the Q block)

use crate::manifold::so3::{SO3, SO3Tangent};
use crate::manifold::{LieGroup, Tangent};
use nalgebra::{Matrix3, Matrix3x6, Matrix4, Matrix6, Vector3, Vector6};
use std::fmt;

/// SE(3) group element representing rigid body transformations in 3D.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3 {
    /// Rotation part as SO(3) element
    rotation: SO3,
    /// Translation part as Vector3
    translation: Vector3<f64>,
}

impl fmt::Display for SE3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        let q = self.rotation.quaternion();
        write!(
            f,
            "SE3(translation: [{:.4}, {:.4}, {:.4}], rotation: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

impl Default for SE3 {
    fn default() -> Self {
        <SE3 as LieGroup>::identity()
    }
}

impl SE3 {
    /// Create a new SE3 element from a rotation and a translation.
    pub fn new(rotation: SO3, translation: Vector3<f64>) -> Self {
        SE3 {
            rotation,
            translation,
        }
    }

    /// Get the rotation part.
    pub fn rotation(&self) -> &SO3 {
        &self.rotation
    }

    /// Get the translation part.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// Homogeneous 4×4 matrix `[R t; 0 1]`.
    pub fn matrix(&self) -> Matrix4<f64> {
        let mut matrix = Matrix4::identity();
        matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rotation.rotation_matrix());
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        matrix
    }
}

impl LieGroup for SE3 {
    type TangentVector = SE3Tangent;
    type JacobianMatrix = Matrix6<f64>;
    type LieAlgebra = Matrix4<f64>;
    type ActionJacobian = Matrix3x6<f64>;

    const DIM: usize = 3;
    const DOF: usize = 6;
    const REP_SIZE: usize = 7;

    fn identity() -> Self {
        SE3::new(SO3::identity(), Vector3::zeros())
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix6::identity()
    }

    /// T⁻¹ = (Rᵀ, -Rᵀt), J = -Ad(T)
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        let rotation_inv = self.rotation.inverse(None);
        let translation_inv = -rotation_inv.act(&self.translation, None, None);

        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }

        SE3::new(rotation_inv, translation_inv)
    }

    /// T₁T₂ = (R₁R₂, t₁ + R₁t₂)
    ///
    /// J_self = Ad(T₂⁻¹), J_other = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let rotation = self.rotation.compose(&other.rotation, None, None);
        let translation = self.translation + self.rotation.act(&other.translation, None, None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = other.inverse(None).adjoint();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix6::identity();
        }

        SE3::new(rotation, translation)
    }

    /// τ = Log(T) = [θ, Jl⁻¹(θ) t] with θ = Log(R)
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        let theta = self.rotation.log(None);
        let rho = theta.left_jacobian_inv() * self.translation;
        let result = SE3Tangent::new(theta.coeffs(), rho);

        if let Some(jac) = jacobian {
            *jac = result.right_jacobian_inv();
        }

        result
    }

    /// T ⊙ x = R x + t
    ///
    /// J_self = [-R[x]×, R], J_vector = R
    fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Self::ActionJacobian>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let mut jac_rotation = Matrix3::zeros();
        let rotated = self.rotation.act(vector, Some(&mut jac_rotation), None);

        if let Some(jac_self) = jacobian_self {
            jac_self.fixed_view_mut::<3, 3>(0, 0).copy_from(&jac_rotation);
            jac_self
                .fixed_view_mut::<3, 3>(0, 3)
                .copy_from(&self.rotation.rotation_matrix());
        }

        if let Some(jac_vector) = jacobian_vector {
            *jac_vector = self.rotation.rotation_matrix();
        }

        rotated + self.translation
    }

    /// Ad(T) = [R 0; [t]×R R]
    fn adjoint(&self) -> Self::JacobianMatrix {
        let rotation_matrix = self.rotation.rotation_matrix();
        let mut adjoint_matrix = Matrix6::zeros();

        adjoint_matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_matrix);
        adjoint_matrix
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&rotation_matrix);
        adjoint_matrix
            .fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&(SO3Tangent::new(self.translation).hat() * rotation_matrix));

        adjoint_matrix
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();

        let translation = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );

        SE3::new(SO3::random(), translation)
    }

    fn normalize(&mut self) {
        self.rotation.normalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        self.rotation.is_valid(tolerance) && self.translation.iter().all(|x| x.is_finite())
    }
}

/// SE(3) tangent space element, laid out `[θ(3), ρ(3)]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SE3Tangent {
    data: Vector6<f64>,
}

impl fmt::Display for SE3Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let theta = self.theta();
        let rho = self.rho();
        write!(
            f,
            "se3(theta: [{:.4}, {:.4}, {:.4}], rho: [{:.4}, {:.4}, {:.4}])",
            theta.x, theta.y, theta.z, rho.x, rho.y, rho.z
        )
    }
}

impl From<Vector6<f64>> for SE3Tangent {
    fn from(data: Vector6<f64>) -> Self {
        SE3Tangent { data }
    }
}

impl From<SE3Tangent> for Vector6<f64> {
    fn from(tangent: SE3Tangent) -> Self {
        tangent.data
    }
}

impl SE3Tangent {
    /// Create a new SE3Tangent from rotational and translational components.
    pub fn new(theta: Vector3<f64>, rho: Vector3<f64>) -> Self {
        let mut data = Vector6::zeros();
        data.fixed_rows_mut::<3>(0).copy_from(&theta);
        data.fixed_rows_mut::<3>(3).copy_from(&rho);
        SE3Tangent { data }
    }

    /// Get the theta (rotational) part.
    pub fn theta(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(0).into_owned()
    }

    /// Get the rho (translational) part.
    pub fn rho(&self) -> Vector3<f64> {
        self.data.fixed_rows::<3>(3).into_owned()
    }

    /// Raw 6-vector.
    pub fn coeffs(&self) -> Vector6<f64> {
        self.data
    }

    /// Assemble a 6×6 Jacobian from the SO(3) block `j` and the coupling block `q`.
    fn assemble(j: &Matrix3<f64>, q: &Matrix3<f64>) -> Matrix6<f64> {
        let mut jacobian = Matrix6::zeros();
        jacobian.fixed_view_mut::<3, 3>(0, 0).copy_from(j);
        jacobian.fixed_view_mut::<3, 3>(3, 3).copy_from(j);
        jacobian.fixed_view_mut::<3, 3>(3, 0).copy_from(q);
        jacobian
    }
}

/// Below this squared angle the Q coefficients switch to their Taylor series.
///
/// The closed forms lose about `ε/θ⁴` of precision, so the switch happens well
/// above the SO(3) small-angle threshold.
const Q_SERIES_THRESHOLD: f64 = 1e-4;

/// Scalar coefficients (b, c, d) of the Q block as functions of θ².
fn q_coefficients(theta_squared: f64) -> (f64, f64, f64) {
    if theta_squared < Q_SERIES_THRESHOLD {
        (
            1.0 / 6.0 - theta_squared / 120.0,
            1.0 / 24.0 - theta_squared / 720.0,
            1.0 / 120.0 - theta_squared / 2520.0,
        )
    } else {
        let theta_norm = theta_squared.sqrt();
        let (sin_theta, cos_theta) = theta_norm.sin_cos();
        let theta_cubed = theta_squared * theta_norm;
        (
            (theta_norm - sin_theta) / theta_cubed,
            (theta_squared + 2.0 * cos_theta - 2.0) / (2.0 * theta_squared * theta_squared),
            (2.0 * theta_norm - 3.0 * sin_theta + theta_norm * cos_theta)
                / (2.0 * theta_cubed * theta_squared),
        )
    }
}

/// Coupling block Q(ρ, θ) of the left Jacobian of SE(3).
///
/// Q(ρ, θ) = ½[ρ]× + (θ - sin θ)/θ³ (θ×ρ× + ρ×θ× + θ×ρ×θ×)
///         + (θ² + 2cos θ - 2)/(2θ⁴) (θ×θ×ρ× + ρ×θ×θ× - 3θ×ρ×θ×)
///         + (2θ - 3sin θ + θcos θ)/(2θ⁵) (θ×ρ×θ×θ× + θ×θ×ρ×θ×)
///
/// Shared with the extended pose group, whose position and velocity blocks
/// couple to the rotation through the same expression.
pub(crate) fn q_matrix(rho: &Vector3<f64>, theta: &Vector3<f64>) -> Matrix3<f64> {
    let rho_skew = SO3Tangent::new(*rho).hat();
    let theta_skew = SO3Tangent::new(*theta).hat();
    let (b, c, d) = q_coefficients(theta.norm_squared());

    let theta_rho = theta_skew * rho_skew;
    let rho_theta = rho_skew * theta_skew;
    let theta_rho_theta = theta_rho * theta_skew;
    let theta_theta = theta_skew * theta_skew;

    0.5 * rho_skew
        + b * (theta_rho + rho_theta + theta_rho_theta)
        + c * (theta_theta * rho_skew + rho_theta * theta_skew - 3.0 * theta_rho_theta)
        + d * (theta_rho_theta * theta_skew + theta_theta * rho_theta)
}

impl Tangent<SE3> for SE3Tangent {
    const DIM: usize = 6;

    /// Exp([θ, ρ]) = (Exp(θ), Jl(θ) ρ)
    fn exp(&self, jacobian: Option<&mut Matrix6<f64>>) -> SE3 {
        let theta = SO3Tangent::new(self.theta());
        let rotation = theta.exp(None);
        let translation = theta.left_jacobian() * self.rho();

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SE3::new(rotation, translation)
    }

    /// Jr = [Jr(θ) 0; Q(-ρ, -θ) Jr(θ)]
    fn right_jacobian(&self) -> Matrix6<f64> {
        let theta = self.theta();
        let jr = SO3Tangent::new(theta).right_jacobian();
        Self::assemble(&jr, &q_matrix(&-self.rho(), &-theta))
    }

    /// Jl = [Jl(θ) 0; Q(ρ, θ) Jl(θ)]
    fn left_jacobian(&self) -> Matrix6<f64> {
        let theta = self.theta();
        let jl = SO3Tangent::new(theta).left_jacobian();
        Self::assemble(&jl, &q_matrix(&self.rho(), &theta))
    }

    fn right_jacobian_inv(&self) -> Matrix6<f64> {
        let theta = self.theta();
        let jr_inv = SO3Tangent::new(theta).right_jacobian_inv();
        let q = q_matrix(&-self.rho(), &-theta);
        Self::assemble(&jr_inv, &(-jr_inv * q * jr_inv))
    }

    fn left_jacobian_inv(&self) -> Matrix6<f64> {
        let theta = self.theta();
        let jl_inv = SO3Tangent::new(theta).left_jacobian_inv();
        let q = q_matrix(&self.rho(), &theta);
        Self::assemble(&jl_inv, &(-jl_inv * q * jl_inv))
    }

    /// [θ, ρ]^ = [[θ]× ρ; 0 0]
    fn hat(&self) -> Matrix4<f64> {
        let mut lie_alg = Matrix4::zeros();
        lie_alg
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&SO3Tangent::new(self.theta()).hat());
        lie_alg.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.rho());
        lie_alg
    }

    /// ad([θ, ρ]) = [[θ]× 0; [ρ]× [θ]×]
    fn small_adj(&self) -> Matrix6<f64> {
        let theta_skew = SO3Tangent::new(self.theta()).hat();
        let rho_skew = SO3Tangent::new(self.rho()).hat();
        Self::assemble(&theta_skew, &rho_skew)
    }

    fn zero() -> Self {
        SE3Tangent {
            data: Vector6::zeros(),
        }
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SE3Tangent {
            data: Vector6::from_fn(|_, _| rng.random_range(-0.1..0.1)),
        }
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.data - other.data).norm() < tolerance
    }
}
