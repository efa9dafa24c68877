//! Shared helpers for numerical tests.

use std::f64::consts::TAU;
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, Rng, SeedableRng };
use crate::mat::Mat;

pub(crate) const FD_STEP: f64 = 1e-6;
pub(crate) const FD_ATOL: f64 = 1e-5;

pub(crate) fn rng(seed: u64) -> StdRng { StdRng::seed_from_u64(seed) }

/// Sample `n` angles from a range wider than one full turn.
pub(crate) fn sample_params<R>(rng: &mut R, n: usize) -> Vec<f64>
where R: Rng + ?Sized
{
    (0..n).map(|_| rng.gen_range(-TAU..2.0 * TAU)).collect()
}

pub(crate) fn approx_eq(a: &Mat, b: &Mat, atol: f64) -> bool {
    a.shape() == b.shape()
        && a.iter().zip(b.iter()).all(|(x, y)| (x - y).norm() <= atol)
}

/// Compare two matrices modulo a global phase.
pub(crate) fn approx_eq_phase(a: &Mat, b: &Mat, atol: f64) -> bool {
    if a.shape() != b.shape() { return false; }
    let Some((k, bk)) = b.iter().enumerate().max_by(|(_, x), (_, y)| x.norm().total_cmp(&y.norm()))
        else { return true; };
    let ak = a.iter().nth(k).copied().unwrap_or_default();
    if ak.norm() <= atol { return false; }
    let phase = C64::from_polar(1.0, (bk / ak).arg());
    approx_eq(&(a * phase), b, atol)
}

/// Central finite-difference derivatives of `f` at `params`, one per
/// parameter.
pub(crate) fn fd_jacobian<F>(f: F, params: &[f64]) -> Vec<Mat>
where F: Fn(&[f64]) -> Mat
{
    (0..params.len())
        .map(|k| {
            let mut hi = params.to_vec();
            let mut lo = params.to_vec();
            hi[k] += FD_STEP;
            lo[k] -= FD_STEP;
            (f(&hi) - f(&lo)) / C64::from(2.0 * FD_STEP)
        })
        .collect()
}

/// Check a set of analytic Jacobians against finite differences of `f`.
pub(crate) fn jacobians_match<F>(f: F, params: &[f64], jacs: &[Mat]) -> bool
where F: Fn(&[f64]) -> Mat
{
    let fd = fd_jacobian(f, params);
    fd.len() == jacs.len()
        && fd.iter().zip(jacs).all(|(a, b)| approx_eq(a, b, FD_ATOL))
}
