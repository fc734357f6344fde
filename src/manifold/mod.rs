//! Lie group representations for inertial navigation states.
//!
//! This module provides the groups a navigation backend linearizes over:
//! - **SO(3)**: rotations (attitude)
//! - **SE(3)**: rigid body poses (attitude + position)
//! - **NavState**: attitude + position + velocity, the 9-DoF extended pose group
//!
//! Lie group M,° | size   | dim | X ∈ M                       | Constraint | T_E M            | Exp(T)          | Comp.
//! ------------- | ------ | --- | --------------------------- | ---------- | ---------------- | --------------- | ---------------------------
//! Rotation      | SO(3),.| 3   | R                           | RᵀR = I    | [θ]x ∈ so(3)     | R = exp([θ]x)   | R₁R₂
//! Rigid motion  | SE(3),.| 6   | M = [R p; 0 1]              | RᵀR = I    | [θ, ρ] ∈ R⁶      | Exp([θ, ρ])     | (R₁R₂, p₁ + R₁p₂)
//! NavState      | SE₂(3) | 9   | M = [R 0 p; 0 R v; 0 0 1]   | RᵀR = I    | [ω, ρ, ν] ∈ R⁹   | Exp([ω, ρ, ν])  | (R₁R₂, p₁ + R₁p₂, v₁ + R₁v₂)
//!
//! Every tangent vector in this crate puts the rotational block first. All
//! Jacobians are taken with respect to right perturbations `X ∘ Exp(δ)`, which
//! is also the convention [`NavState::retract`] uses.
//!
//! # Example
//!
//! ```rust
//! use navstate::manifold::{LieGroup, Tangent};
//! use navstate::manifold::so3::{SO3, SO3Tangent};
//! use nalgebra::{Matrix3, Vector3};
//!
//! let rotation = SO3::from_euler_angles(0.1, 0.2, 0.3);
//! let delta = SO3Tangent::new(Vector3::new(0.01, 0.0, 0.0));
//!
//! let mut jacobian = Matrix3::zeros();
//! let perturbed = rotation.plus(&delta, None, Some(&mut jacobian));
//! assert!(perturbed.is_valid(1e-9));
//! ```

use nalgebra::{Matrix3, Vector3};
use std::fmt::Debug;
use std::ops::{Mul, Neg};
use thiserror::Error;

pub mod nav_state;
pub mod se3;
pub mod so3;

pub use nav_state::{ChartAtOrigin, NavState, NavStateTangent};
pub use se3::{SE3, SE3Tangent};
pub use so3::{SO3, SO3Tangent};

/// Squared-angle threshold below which series expansions replace the closed forms.
pub const SMALL_ANGLE_THRESHOLD: f64 = 1e-10;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Invalid tangent vector dimension
    #[error("Invalid tangent dimension: expected {expected}, got {actual}")]
    InvalidTangentDimension { expected: usize, actual: usize },

    /// A matrix that is not the homogeneous embedding of a group element
    #[error("Invalid representation: {0}")]
    InvalidRepresentation(String),
}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Core trait for Lie group operations.
///
/// Every operation returns a fresh element and fills the optional Jacobians
/// only when asked, so callers pay for derivatives only while linearizing.
///
/// # Dimensions
///
/// - `DIM`: dimension of the space the group acts on (3 for all groups here)
/// - `DOF`: tangent space dimension
/// - `REP_SIZE`: size of the stored representation
pub trait LieGroup: Clone + Debug + PartialEq {
    /// The tangent space vector type
    type TangentVector: Tangent<Self>;

    /// Square Jacobian matrix of size `DOF × DOF`
    type JacobianMatrix: Copy
        + Debug
        + PartialEq
        + Mul<Output = Self::JacobianMatrix>
        + Neg<Output = Self::JacobianMatrix>;

    /// Matrix form of a Lie algebra element
    type LieAlgebra: Clone + Debug + PartialEq;

    /// Jacobian of the group action with respect to the element, size `3 × DOF`
    type ActionJacobian: Clone + Debug + PartialEq;

    /// Space dimension - dimension of the ambient space that the group acts on
    const DIM: usize;

    /// Degrees of freedom - dimension of the tangent space
    const DOF: usize;

    /// Representation size - size of the underlying data representation
    const REP_SIZE: usize;

    /// The neutral element e such that e ∘ g = g ∘ e = g.
    fn identity() -> Self;

    /// Identity matrix of the Jacobian type.
    fn jacobian_identity() -> Self::JacobianMatrix;

    /// Inverse g⁻¹ with optional Jacobian ∂(g⁻¹)/∂g.
    fn inverse(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self;

    /// Group product g₁ ∘ g₂ with optional Jacobians with respect to both operands.
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self;

    /// Logarithmic map log(g)^∨ with optional Jacobian Jr⁻¹(log(g)).
    fn log(&self, jacobian: Option<&mut Self::JacobianMatrix>) -> Self::TangentVector;

    /// Group action on a point: g ⊙ x.
    fn act(
        &self,
        vector: &Vector3<f64>,
        jacobian_self: Option<&mut Self::ActionJacobian>,
        jacobian_vector: Option<&mut Matrix3<f64>>,
    ) -> Vector3<f64>;

    /// Adjoint matrix Ad(g), so that g ∘ Exp(φ) ∘ g⁻¹ = Exp(Ad(g) φ).
    fn adjoint(&self) -> Self::JacobianMatrix;

    /// Random element, for tests and initialization.
    fn random() -> Self;

    /// Project the element back onto the manifold.
    fn normalize(&mut self);

    /// Check if the element satisfies the manifold constraints.
    fn is_valid(&self, tolerance: f64) -> bool;

    /// Relative element g₁⁻¹ ∘ g₂.
    ///
    /// J_self = -Ad((g₁⁻¹ g₂)⁻¹), J_other = I
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let result = self.inverse(None).compose(other, None, None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = -result.inverse(None).adjoint();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = Self::jacobian_identity();
        }

        result
    }

    /// Right plus: g ⊞ φ = g ∘ Exp(φ).
    ///
    /// J_self = Ad(Exp(φ)⁻¹), J_tangent = Jr(φ)
    fn right_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        let increment = tangent.exp(None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = increment.inverse(None).adjoint();
        }

        if let Some(jac_tangent) = jacobian_tangent {
            *jac_tangent = tangent.right_jacobian();
        }

        self.compose(&increment, None, None)
    }

    /// Right minus: g₁ ⊟ g₂ = Log(g₂⁻¹ ∘ g₁).
    ///
    /// J_self = Jr⁻¹(τ), J_other = -Jl⁻¹(τ)
    fn right_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        let result = other.between(self, None, None).log(None);

        if let Some(jac_self) = jacobian_self {
            *jac_self = result.right_jacobian_inv();
        }

        if let Some(jac_other) = jacobian_other {
            *jac_other = -result.left_jacobian_inv();
        }

        result
    }

    /// Left plus: φ ⊞ g = Exp(φ) ∘ g.
    ///
    /// With right perturbations on g: J_self = I, J_tangent = Ad(g⁻¹) Jr(φ)
    fn left_plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        if let Some(jac_self) = jacobian_self {
            *jac_self = Self::jacobian_identity();
        }

        if let Some(jac_tangent) = jacobian_tangent {
            *jac_tangent = self.inverse(None).adjoint() * tangent.right_jacobian();
        }

        tangent.exp(None).compose(self, None, None)
    }

    /// Left minus: g₁ ⊟ g₂ = Log(g₁ ∘ g₂⁻¹).
    ///
    /// With right perturbations: J_self = Jr⁻¹(τ) Ad(g₂), J_other = -Jr⁻¹(τ) Ad(g₂)
    fn left_minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        let result = self.compose(&other.inverse(None), None, None).log(None);

        if jacobian_self.is_some() || jacobian_other.is_some() {
            let chained = result.right_jacobian_inv() * other.adjoint();
            if let Some(jac_self) = jacobian_self {
                *jac_self = chained;
            }
            if let Some(jac_other) = jacobian_other {
                *jac_other = -chained;
            }
        }

        result
    }

    /// Convenience method for right_plus. Equivalent to g ⊞ φ.
    fn plus(
        &self,
        tangent: &Self::TangentVector,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_tangent: Option<&mut Self::JacobianMatrix>,
    ) -> Self {
        self.right_plus(tangent, jacobian_self, jacobian_tangent)
    }

    /// Convenience method for right_minus. Equivalent to g₁ ⊟ g₂.
    fn minus(
        &self,
        other: &Self,
        jacobian_self: Option<&mut Self::JacobianMatrix>,
        jacobian_other: Option<&mut Self::JacobianMatrix>,
    ) -> Self::TangentVector {
        self.right_minus(other, jacobian_self, jacobian_other)
    }

    /// Check if the element is approximately equal to another element.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.right_minus(other, None, None).is_zero(tolerance)
    }
}

/// Trait for Lie algebra operations.
///
/// # Type Parameters
///
/// - `G`: The associated Lie group type
pub trait Tangent<G: LieGroup>: Clone + Debug + PartialEq {
    /// Dimension of the tangent space (same as Lie group DOF)
    const DIM: usize = G::DOF;

    /// Exponential map Exp(φ) with optional Jacobian Jr(φ).
    fn exp(&self, jacobian: Option<&mut G::JacobianMatrix>) -> G;

    /// Right Jacobian Jr: Exp(φ + δφ) ≈ Exp(φ) ∘ Exp(Jr δφ).
    fn right_jacobian(&self) -> G::JacobianMatrix;

    /// Left Jacobian Jl: Exp(φ + δφ) ≈ Exp(Jl δφ) ∘ Exp(φ).
    fn left_jacobian(&self) -> G::JacobianMatrix;

    /// Inverse of right Jacobian Jr⁻¹.
    fn right_jacobian_inv(&self) -> G::JacobianMatrix;

    /// Inverse of left Jacobian Jl⁻¹.
    fn left_jacobian_inv(&self) -> G::JacobianMatrix;

    /// Hat operator: φ^∧ (vector to Lie algebra matrix).
    fn hat(&self) -> G::LieAlgebra;

    /// Small adjoint ad(φ), so that [φ, τ] = ad(φ) τ.
    fn small_adj(&self) -> G::JacobianMatrix;

    /// Zero tangent vector.
    fn zero() -> Self;

    /// Random tangent vector (useful for testing).
    fn random() -> Self;

    /// Check if the tangent vector is approximately zero.
    fn is_zero(&self, tolerance: f64) -> bool;

    /// Check if this tangent vector is approximately equal to another.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool;
}
