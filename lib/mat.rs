//! Dense complex matrices and the closed-form building blocks shared by the
//! gate types.
//!
//! All matrices here are `d^n × d^n` for a register of `n` qudits of
//! dimension `d`, with qudit 0 as the most significant digit of the basis
//! index.

use std::f64::consts::{ FRAC_1_SQRT_2, TAU };
use itertools::iproduct;
use nalgebra as na;
use num_complex::Complex64 as C64;
use once_cell::sync::Lazy;

/// Dense complex matrix.
pub type Mat = na::DMatrix<C64>;

const Z0: C64 = C64 { re: 0.0, im: 0.0 };
const Z1: C64 = C64 { re: 1.0, im: 0.0 };
const ZI: C64 = C64 { re: 0.0, im: 1.0 };

fn from_rows<const N: usize>(rows: [[C64; N]; N]) -> Mat {
    Mat::from_fn(N, N, |i, j| rows[i][j])
}

// permutation matrix sending basis state `k` to `perm[k]`
fn permutation(perm: &[usize]) -> Mat {
    let n = perm.len();
    let mut p = Mat::zeros(n, n);
    perm.iter().enumerate().for_each(|(k, &pk)| { p[(pk, k)] = Z1; });
    p
}

/* single-qubit rotations *****************************************************/

/// Rotation by `theta` about X: `exp(-iθσ_x/2)`.
pub fn rot_x(theta: f64) -> Mat {
    let (s, c) = (theta / 2.0).sin_cos();
    let off = -ZI * s;
    from_rows([[c.into(), off], [off, c.into()]])
}

/// Derivative of [`rot_x`] with respect to `theta`.
pub fn rot_x_jac(theta: f64) -> Mat {
    let (s, c) = (theta / 2.0).sin_cos();
    let on = C64::from(-0.5 * s);
    let off = -ZI * (0.5 * c);
    from_rows([[on, off], [off, on]])
}

/// Rotation by `theta` about Y: `exp(-iθσ_y/2)`.
pub fn rot_y(theta: f64) -> Mat {
    let (s, c) = (theta / 2.0).sin_cos();
    from_rows([[c.into(), (-s).into()], [s.into(), c.into()]])
}

/// Derivative of [`rot_y`] with respect to `theta`.
pub fn rot_y_jac(theta: f64) -> Mat {
    let (s, c) = (theta / 2.0).sin_cos();
    from_rows([
        [(-0.5 * s).into(), (-0.5 * c).into()],
        [( 0.5 * c).into(), (-0.5 * s).into()],
    ])
}

/// Rotation by `theta` about Z: `exp(-iθσ_z/2)`.
pub fn rot_z(theta: f64) -> Mat {
    from_rows([[C64::cis(-theta / 2.0), Z0], [Z0, C64::cis(theta / 2.0)]])
}

/// Derivative of [`rot_z`] with respect to `theta`.
pub fn rot_z_jac(theta: f64) -> Mat {
    from_rows([
        [-0.5 * ZI * C64::cis(-theta / 2.0), Z0],
        [Z0, 0.5 * ZI * C64::cis(theta / 2.0)],
    ])
}

/// Reduce an angle to `[0, 2π)` for presentation.
pub fn wrap_angle(theta: f64) -> f64 { theta.rem_euclid(TAU) }

/* constant gates *************************************************************/

/// π/2 rotation about X.
pub static X90: Lazy<Mat> = Lazy::new(|| rot_x(std::f64::consts::FRAC_PI_2));

/// Two-qubit CNOT, control on the first qubit.
pub static CNOT: Lazy<Mat> = Lazy::new(|| permutation(&[0, 1, 3, 2]));

/// Two-qubit controlled-Z.
pub static CZ: Lazy<Mat> =
    Lazy::new(|| Mat::from_diagonal(&na::DVector::from_vec(vec![Z1, Z1, Z1, -Z1])));

/// Two-qubit SWAP.
pub static SWAP: Lazy<Mat> = Lazy::new(|| permutation(&[0, 2, 1, 3]));

/// Two-qubit iSWAP.
pub static ISWAP: Lazy<Mat> =
    Lazy::new(|| {
        from_rows([
            [Z1, Z0, Z0, Z0],
            [Z0, Z0, ZI, Z0],
            [Z0, ZI, Z0, Z0],
            [Z0, Z0, Z0, Z1],
        ])
    });

/// Two-qubit XX(π/2) Mølmer–Sørensen interaction.
pub static XX: Lazy<Mat> =
    Lazy::new(|| {
        let mi = -ZI;
        from_rows([
            [Z1, Z0, Z0, mi],
            [Z0, Z1, mi, Z0],
            [Z0, mi, Z1, Z0],
            [mi, Z0, Z0, Z1],
        ]) * C64::from(FRAC_1_SQRT_2)
    });

/// Square root of CNOT.
pub static CNOT_ROOT: Lazy<Mat> =
    Lazy::new(|| {
        let p = C64::new(0.5, 0.5);
        let m = C64::new(0.5, -0.5);
        from_rows([
            [Z1, Z0, Z0, Z0],
            [Z0, Z1, Z0, Z0],
            [Z0, Z0, p,  m ],
            [Z0, Z0, m,  p ],
        ])
    });

/// Two-qutrit controlled sum, `|a, b⟩ → |a, a + b mod 3⟩`.
pub static CSUM: Lazy<Mat> =
    Lazy::new(|| {
        let perm: Vec<usize>
            = iproduct!(0..3_usize, 0..3_usize)
            .map(|(a, b)| 3 * a + (a + b) % 3)
            .collect();
        permutation(&perm)
    });

/// Two-qutrit controlled π pulse on the `|1⟩ ↔ |0⟩` transition of the target,
/// active when the control is in `|1⟩`.
pub static CPI: Lazy<Mat> = Lazy::new(|| permutation(&[0, 1, 2, 4, 3, 5, 6, 7, 8]));

/// [`CPI`] with a sign flip on the `|1, 1⟩ → |1, 0⟩` amplitude, before any
/// additional phases are applied.
pub(crate) static CPI_SIGNED: Lazy<Mat> =
    Lazy::new(|| {
        let mut m = CPI.clone();
        m[(3, 4)] = -Z1;
        m
    });

/* register manipulation ******************************************************/

/// Return the number of dimension-`dim` qudits spanning a space of dimension
/// `size`, if `size` is an integer power of `dim`.
pub fn infer_qudits(size: usize, dim: usize) -> Option<usize> {
    if dim < 2 || size == 0 { return None; }
    let mut acc: usize = 1;
    let mut n: usize = 0;
    while acc < size {
        acc *= dim;
        n += 1;
    }
    (acc == size).then_some(n)
}

/// Return the dimension `d` such that `d^qudits == size`, if one exists.
pub fn infer_dim(size: usize, qudits: usize) -> Option<usize> {
    if qudits == 0 { return None; }
    let guess = (size as f64).powf(1.0 / qudits as f64).round() as usize;
    (guess.checked_pow(qudits as u32) == Some(size)).then_some(guess)
}

// base-`dim` digits of `k`, most significant first
fn digits(mut k: usize, dim: usize, n: usize) -> Vec<usize> {
    let mut out = vec![0; n];
    for slot in out.iter_mut().rev() {
        *slot = k % dim;
        k /= dim;
    }
    out
}

fn undigits(digits: &[usize], dim: usize) -> usize {
    digits.iter().fold(0, |acc, &dk| acc * dim + dk)
}

/// Re-embed an operator on `qudits` qudits of dimension `from` into qudits of
/// dimension `to > from`.
///
/// Basis states whose every digit is below `from` are acted on by `u`; every
/// other basis state is left unchanged.
pub fn upgrade_qudits(u: &Mat, qudits: usize, from: usize, to: usize) -> Mat {
    let size = to.pow(qudits as u32);
    let lift: Vec<usize>
        = (0..from.pow(qudits as u32))
        .map(|k| undigits(&digits(k, from, qudits), to))
        .collect();
    let mut out = Mat::identity(size, size);
    for ((r, &lr), (c, &lc)) in iproduct!(lift.iter().enumerate(), lift.iter().enumerate()) {
        out[(lr, lc)] = u[(r, c)];
    }
    out
}

/// Apply a two-qudit operator `g` to qudits `a` and `b` of a register of
/// `qudits` dimension-`dim` qudits, acting as identity elsewhere.
///
/// `a` takes the role of the first qudit of `g`. Indices must be in range and
/// distinct.
pub fn embed_pair(g: &Mat, dim: usize, qudits: usize, a: usize, b: usize) -> Mat {
    let size = dim.pow(qudits as u32);
    let mut out = Mat::zeros(size, size);
    for col in 0..size {
        let mut dig = digits(col, dim, qudits);
        let g_col = dim * dig[a] + dig[b];
        for (a2, b2) in iproduct!(0..dim, 0..dim) {
            let val = g[(dim * a2 + b2, g_col)];
            if val == Z0 { continue; }
            dig[a] = a2;
            dig[b] = b2;
            out[(undigits(&dig, dim), col)] = val;
        }
    }
    out
}

/// Build the controlled version of `u` on one extra qubit.
///
/// With `flipped == false` the control is the most significant qubit, giving
/// `diag(I, u)`; otherwise it is the least significant, giving
/// `I ⊗ |0⟩⟨0| + u ⊗ |1⟩⟨1|`.
pub fn controlled(u: &Mat, flipped: bool) -> Mat {
    let n = u.nrows();
    if flipped {
        let p0 = from_rows([[Z1, Z0], [Z0, Z0]]);
        let p1 = from_rows([[Z0, Z0], [Z0, Z1]]);
        Mat::identity(n, n).kronecker(&p0) + u.kronecker(&p1)
    } else {
        let mut out = Mat::identity(2 * n, 2 * n);
        out.view_mut((n, n), (n, n)).copy_from(u);
        out
    }
}

/// Return `true` if `u† u` is within `atol` of the identity, elementwise.
pub fn is_unitary(u: &Mat, atol: f64) -> bool {
    if !u.is_square() { return false; }
    let n = u.nrows();
    (u.adjoint() * u - Mat::identity(n, n)).iter().all(|z| z.norm() <= atol)
}
