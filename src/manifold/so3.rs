//! SO(3) - attitude of the body frame.
//!
//! Elements are stored as nalgebra `UnitQuaternion`s. Tangent elements are
//! axis-angle vectors in R³ whose direction is the rotation axis and whose
//! norm is the rotation angle.
//!
//! Jacobians follow the right-perturbation convention `R ∘ Exp(δ)`:
//!
//! | Operation     | ∂/∂R           | ∂/∂(other)    |
//! |---------------|----------------|---------------|
//! | `R⁻¹`         | -R             |               |
//! | `R₁ R₂`       | R₂ᵀ            | I             |
//! | `R x`         | -R [x]×        | R             |
//! | `Rᵀ x`        | [Rᵀ x]×        | Rᵀ            |
//! | `Exp(θ)`      |                | Jr(θ)         |
//! | `Log(R)`      | Jr⁻¹(Log R)    |               |
//!
//! # Numerical conditioning
//!
//! The inverse Jacobians contain `(1 + cos θ) / (2θ sin θ)`, singular at θ = π.
//! Attitude increments produced by IMU integration stay far from that point.

use crate::manifold::{LieGroup, ManifoldError, ManifoldResult, SMALL_ANGLE_THRESHOLD, Tangent};
use nalgebra::{Matrix3, Quaternion, Rotation3, Unit, UnitQuaternion, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use tracing::debug;

/// Tolerance on ‖RᵀR − I‖ and |det R − 1| accepted by [`SO3::from_rotation_matrix`].
pub const ROTATION_MATRIX_TOLERANCE: f64 = 1e-9;

/// SO(3) group element representing rotations in 3D.
#[derive(Clone, Debug, PartialEq)]
pub struct SO3 {
    quaternion: UnitQuaternion<f64>,
}

impl Display for SO3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

impl Default for SO3 {
    fn default() -> Self {
        <SO3 as LieGroup>::identity()
    }
}

impl SO3 {
    /// Create a new SO(3) element from a unit quaternion.
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Create SO(3) from Euler angles.
    ///
    /// The resulting rotation is `Rz(yaw) · Ry(pitch) · Rx(roll)`.
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Create SO(3) from an axis and an angle.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        let unit_axis = Unit::new_normalize(*axis);
        SO3::new(UnitQuaternion::from_axis_angle(&unit_axis, angle))
    }

    /// Create SO(3) from a scaled axis (axis-angle vector).
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3::new(UnitQuaternion::from_scaled_axis(axis_angle))
    }

    /// Create SO(3) from a 3×3 rotation matrix.
    ///
    /// Fails with [`ManifoldError::InvalidRepresentation`] when the matrix is
    /// not orthonormal with determinant +1.
    pub fn from_rotation_matrix(matrix: &Matrix3<f64>) -> ManifoldResult<Self> {
        let orthogonality_error = (matrix.transpose() * matrix - Matrix3::identity()).norm();
        let determinant = matrix.determinant();

        if !orthogonality_error.is_finite()
            || orthogonality_error > ROTATION_MATRIX_TOLERANCE
            || (determinant - 1.0).abs() > ROTATION_MATRIX_TOLERANCE
        {
            debug!(
                orthogonality_error,
                determinant, "rejected matrix that is not a rotation"
            );
            return Err(ManifoldError::InvalidRepresentation(format!(
                "not a rotation matrix: |RᵀR - I| = {orthogonality_error:e}, det = {determinant}"
            )));
        }

        let rotation = Rotation3::from_matrix_unchecked(*matrix);
        Ok(SO3::new(UnitQuaternion::from_rotation_matrix(&rotation)))
    }

    /// Get the quaternion representation.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Get the rotation matrix (3x3).
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    /// Rotate a vector by the inverse rotation: Rᵀ x.
    ///
    /// # Arguments
    /// * `vector` - Vector expressed in the outer frame
    /// * `jacobian_self` - Optional Jacobian wrt the rotation: [Rᵀ x]×
    /// * `jacobian_vector` - Optional Jacobian wrt the vector: Rᵀ
    pub fn inverse_act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let result = self.quaternion.inverse_transform_vector(vector);

        if let Some(jac_self) = jacobian_self {
            *jac_self = SO3Tangent::new(result).hat();
        }

        if let Some(jac_vector) = jacobian_vector {
            *jac_vector = self.rotation_matrix().transpose();
        }

        result
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;
    type JacobianMatrix = Matrix3<f64>;
    type LieAlgebra = Matrix3<f64>;
    type ActionJacobian = Matrix3<f64>;

    const DIM: usize = 3;
    const DOF: usize = 3;
    const REP_SIZE: usize = 4;

    fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    fn jacobian_identity() -> Self::JacobianMatrix {
        Matrix3::identity()
    }

    /// SO3 inverse.
    ///
    /// # Notes
    /// R⁻¹ = Rᵀ, J_R⁻¹_R = -Adj(R) = -R
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }

        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    /// SO3 composition.
    ///
    /// # Notes
    /// J_QR_Q = Adj(R⁻¹) = Rᵀ, J_QR_R = I
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = other.rotation_matrix().transpose();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = Matrix3::identity();
        }

        SO3 {
            quaternion: self.quaternion * other.quaternion,
        }
    }

    /// Logarithmic map.
    ///
    /// # Notes
    /// θu = Log(q) = (2 / ‖v‖) · v · atan2(‖v‖, w)
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector {
        let q = self.quaternion.quaternion();
        let sin_angle_squared = q.i * q.i + q.j * q.j + q.k * q.k;

        let log_coeff = if sin_angle_squared > SMALL_ANGLE_THRESHOLD {
            let sin_angle = sin_angle_squared.sqrt();
            let cos_angle = q.w;

            // q and -q are the same rotation; pick the representative with angle in [-π, π].
            let two_angle = 2.0
                * if cos_angle < 0.0 {
                    f64::atan2(-sin_angle, -cos_angle)
                } else {
                    f64::atan2(sin_angle, cos_angle)
                };

            two_angle / sin_angle
        } else {
            // 2 / w to second order, with the sign folded in for w < 0.
            2.0 / q.w
        };

        let axis_angle = SO3Tangent::new(Vector3::new(
            q.i * log_coeff,
            q.j * log_coeff,
            q.k * log_coeff,
        ));

        if let Some(jac) = jacobian {
            *jac = axis_angle.right_jacobian_inv();
        }

        axis_angle
    }

    fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Self::ActionJacobian>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64> {
        let result = self.quaternion * vector;

        if let Some(jac_self) = jacobian_self {
            // -R * [v]×
            *jac_self = -self.rotation_matrix() * SO3Tangent::new(*vector).hat();
        }

        if let Some(jac_vector) = jacobian_vector {
            *jac_vector = self.rotation_matrix();
        }

        result
    }

    fn adjoint(&self) -> Self::JacobianMatrix {
        self.rotation_matrix()
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        SO3::from_scaled_axis(Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        ))
    }

    fn normalize(&mut self) {
        self.quaternion.renormalize();
    }

    fn is_valid(&self, tolerance: f64) -> bool {
        (self.quaternion.norm() - 1.0).abs() < tolerance
    }
}

/// SO(3) tangent space element (axis-angle vector).
#[derive(Clone, Debug, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl Display for SO3Tangent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "so3(axis-angle: [{:.4}, {:.4}, {:.4}])",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl From<Vector3<f64>> for SO3Tangent {
    fn from(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent::new(axis_angle)
    }
}

impl SO3Tangent {
    /// Create a new SO3Tangent from an axis-angle vector.
    #[inline]
    pub fn new(axis_angle: Vector3<f64>) -> Self {
        SO3Tangent { data: axis_angle }
    }

    /// Get the axis-angle vector.
    #[inline]
    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }

    /// Get the angle of rotation.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.data.norm()
    }

    /// Get the x component.
    #[inline]
    pub fn x(&self) -> f64 {
        self.data.x
    }

    /// Get the y component.
    #[inline]
    pub fn y(&self) -> f64 {
        self.data.y
    }

    /// Get the z component.
    #[inline]
    pub fn z(&self) -> f64 {
        self.data.z
    }
}

impl Tangent<SO3> for SO3Tangent {
    const DIM: usize = 3;

    /// SO3 exponential map.
    ///
    /// # Notes
    /// q = Exp(θu) = cos(θ/2) + u sin(θ/2)
    fn exp(&self, jacobian: Option<&mut Matrix3<f64>>) -> SO3 {
        let theta_squared = self.data.norm_squared();

        let quaternion = if theta_squared > SMALL_ANGLE_THRESHOLD {
            UnitQuaternion::from_scaled_axis(self.data)
        } else {
            UnitQuaternion::from_quaternion(Quaternion::new(
                1.0,
                self.data.x / 2.0,
                self.data.y / 2.0,
                self.data.z / 2.0,
            ))
        };

        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }

        SO3 { quaternion }
    }

    /// Jr(θ) = I - (1 - cos θ)/θ² [θ]ₓ + (θ - sin θ)/θ³ [θ]ₓ²
    fn right_jacobian(&self) -> Matrix3<f64> {
        self.left_jacobian().transpose()
    }

    /// Jl(θ) = I + (1 - cos θ)/θ² [θ]ₓ + (θ - sin θ)/θ³ [θ]ₓ²
    fn left_jacobian(&self) -> Matrix3<f64> {
        let theta_squared = self.data.norm_squared();
        let skew = self.hat();

        if theta_squared <= SMALL_ANGLE_THRESHOLD {
            Matrix3::identity() + 0.5 * skew + (1.0 / 6.0) * skew * skew
        } else {
            let theta = theta_squared.sqrt();
            let (sin_theta, cos_theta) = theta.sin_cos();

            Matrix3::identity()
                + (1.0 - cos_theta) / theta_squared * skew
                + (theta - sin_theta) / (theta_squared * theta) * skew * skew
        }
    }

    fn right_jacobian_inv(&self) -> Matrix3<f64> {
        self.left_jacobian_inv().transpose()
    }

    /// Jl⁻¹(θ) = I - ½ [θ]ₓ + (1/θ² - (1 + cos θ)/(2θ sin θ)) [θ]ₓ²
    fn left_jacobian_inv(&self) -> Matrix3<f64> {
        let theta_squared = self.data.norm_squared();
        let skew = self.hat();

        if theta_squared <= SMALL_ANGLE_THRESHOLD {
            Matrix3::identity() - 0.5 * skew + (1.0 / 12.0) * skew * skew
        } else {
            let theta = theta_squared.sqrt();
            let (sin_theta, cos_theta) = theta.sin_cos();

            Matrix3::identity() - 0.5 * skew
                + (1.0 / theta_squared - (1.0 + cos_theta) / (2.0 * theta * sin_theta))
                    * skew
                    * skew
        }
    }

    /// [θ]ₓ = [0 -θz θy; θz 0 -θx; -θy θx 0]
    fn hat(&self) -> Matrix3<f64> {
        Matrix3::new(
            0.0,
            -self.data.z,
            self.data.y,
            self.data.z,
            0.0,
            -self.data.x,
            -self.data.y,
            self.data.x,
            0.0,
        )
    }

    fn small_adj(&self) -> Matrix3<f64> {
        self.hat()
    }

    fn zero() -> Self {
        Self::new(Vector3::zeros())
    }

    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::rng();
        Self::new(Vector3::new(
            rng.random_range(-0.1..0.1),
            rng.random_range(-0.1..0.1),
            rng.random_range(-0.1..0.1),
        ))
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self.data - other.data).norm() < tolerance
    }
}
