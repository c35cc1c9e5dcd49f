//! Shared Jacobian helpers for the arm and body solvers.

use glam::Vec3;
use nalgebra::{DMatrix, DVector};

use crate::error::{RigError, RigResult};

/// 3×N Jacobian of `f` at `params` by central differences of half-width
/// `epsilon`.
pub fn central_difference<F>(params: &[f32], epsilon: f32, mut f: F) -> DMatrix<f32>
where
    F: FnMut(&[f32]) -> Vec3,
{
    let mut jacobian = DMatrix::zeros(3, params.len());
    let mut probe = params.to_vec();
    for column in 0..params.len() {
        probe[column] = params[column] + epsilon;
        let forward = f(&probe);
        probe[column] = params[column] - epsilon;
        let backward = f(&probe);
        probe[column] = params[column];

        let derivative = (forward - backward) / (2.0 * epsilon);
        jacobian[(0, column)] = derivative.x;
        jacobian[(1, column)] = derivative.y;
        jacobian[(2, column)] = derivative.z;
    }
    jacobian
}

/// Least-norm parameter step `J⁺ · displacement`.
///
/// Singular values below `tolerance` are dropped, so rank-deficient
/// Jacobians yield the minimum-norm solution instead of failing.
pub fn pseudo_inverse_step(
    jacobian: &DMatrix<f32>,
    displacement: Vec3,
    tolerance: f32,
) -> RigResult<Vec<f32>> {
    if jacobian.ncols() == 0 {
        return Ok(Vec::new());
    }
    if jacobian.iter().any(|v| !v.is_finite()) {
        return Err(RigError::PseudoInverse("jacobian has non-finite entries"));
    }
    let pinv = jacobian
        .clone()
        .pseudo_inverse(tolerance)
        .map_err(RigError::PseudoInverse)?;
    let d = DVector::from_column_slice(&[displacement.x, displacement.y, displacement.z]);
    let step = pinv * d;
    log::trace!(
        "pseudo-inverse step over {} params, |step| = {}",
        step.len(),
        step.norm()
    );
    Ok(step.iter().copied().collect())
}
