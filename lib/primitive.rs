//! Leaf gates with closed-form matrices and derivatives.

use std::f64::consts::{ FRAC_1_SQRT_2, FRAC_PI_2, TAU };
use itertools::Itertools;
use nalgebra as na;
use num_complex::Complex64 as C64;
use rand::Rng;
use crate::{
    instr::Instr,
    mat::{ self, Mat },
};

/// A leaf gate.
///
/// Parameterized variants take their angles in the order documented on each
/// variant; all others ignore their parameters entirely.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Identity on any number of qudits of any dimension.
    Identity { qudits: usize, dim: usize },
    /// Rotation about X.
    X,
    /// Rotation about Y.
    Y,
    /// Rotation about Z.
    Z,
    /// Arbitrary single-qubit gate as `Z(v2) X(π/2) Z(v1) X(π/2) Z(v0)`.
    ZXZXZ,
    /// [`Self::ZXZXZ`] without the leading Z rotation, `Z(v1) X(π/2) Z(v0)
    /// X(π/2)`.
    ///
    /// The dropped rotation commutes through the control of a CNOT, which
    /// saves a parameter when this gate follows one.
    XZXZ,
    /// IBM's U3(θ, φ, λ).
    U3,
    /// IBM's U2(φ, λ).
    U2,
    /// IBM's U1(λ).
    U1,
    /// Arbitrary single-qutrit gate in 8 parameters: three mixing angles
    /// followed by five phases.
    SingleQutrit,
    CNOT,
    CZ,
    Swap,
    ISwap,
    /// XX(π/2).
    XX,
    /// √CNOT.
    CNOTRoot,
    /// Two-qutrit controlled sum.
    CSUM,
    /// Two-qutrit controlled π pulse.
    CPI,
    /// [`Self::CPI`] with extra phases on the last five basis states.
    CPIPhase([f64; 5]),
}

impl Primitive {
    /// Single-qubit identity.
    pub fn identity() -> Self { Self::Identity { qudits: 1, dim: 2 } }

    /// [`Self::CPIPhase`] with phases drawn uniformly from `[0, 2π)`.
    pub fn cpi_phase_random<R>(rng: &mut R) -> Self
    where R: Rng + ?Sized
    {
        Self::CPIPhase(std::array::from_fn(|_| rng.gen::<f64>() * TAU))
    }

    pub fn num_params(&self) -> usize {
        match self {
            Self::X | Self::Y | Self::Z | Self::U1 => 1,
            Self::XZXZ | Self::U2 => 2,
            Self::ZXZXZ | Self::U3 => 3,
            Self::SingleQutrit => 8,
            _ => 0,
        }
    }

    pub fn qudits(&self) -> usize {
        match self {
            Self::Identity { qudits, .. } => *qudits,
            Self::CNOT | Self::CZ | Self::Swap | Self::ISwap | Self::XX
            | Self::CNOTRoot | Self::CSUM | Self::CPI | Self::CPIPhase(_)
            => 2,
            _ => 1,
        }
    }

    pub fn matrix(&self, v: &[f64]) -> Mat {
        match self {
            Self::Identity { qudits, dim } => {
                let n = dim.pow(*qudits as u32);
                Mat::identity(n, n)
            },
            Self::X => mat::rot_x(v[0]),
            Self::Y => mat::rot_y(v[0]),
            Self::Z => mat::rot_z(v[0]),
            Self::ZXZXZ => {
                zxzxz(&mat::rot_z(v[0]), &mat::rot_z(v[1]), &mat::rot_z(v[2]))
            },
            Self::XZXZ => xzxz(&mat::rot_z(v[0]), &mat::rot_z(v[1])),
            Self::U3 => U3Terms::new(v).matrix(),
            Self::U2 => {
                let (e0, e1) = (C64::cis(v[0]), C64::cis(v[1]));
                rows2([[1.0.into(), -e1], [e0, e0 * e1]]) * C64::from(FRAC_1_SQRT_2)
            },
            Self::U1 => rows2([[1.0.into(), 0.0.into()], [0.0.into(), C64::cis(v[0])]]),
            Self::SingleQutrit => QutritTerms::new(v).matrix(),
            Self::CNOT => mat::CNOT.clone(),
            Self::CZ => mat::CZ.clone(),
            Self::Swap => mat::SWAP.clone(),
            Self::ISwap => mat::ISWAP.clone(),
            Self::XX => mat::XX.clone(),
            Self::CNOTRoot => mat::CNOT_ROOT.clone(),
            Self::CSUM => mat::CSUM.clone(),
            Self::CPI => mat::CPI.clone(),
            Self::CPIPhase(phases) => {
                let diag: Vec<C64>
                    = [0.0; 4].iter().chain(phases.iter())
                    .map(|ph| C64::cis(*ph))
                    .collect();
                &*mat::CPI_SIGNED * Mat::from_diagonal(&na::DVector::from_vec(diag))
            },
        }
    }

    /// Return the matrix and its derivative with respect to each parameter.
    pub fn jacobian(&self, v: &[f64]) -> (Mat, Vec<Mat>) {
        match self {
            Self::X => (mat::rot_x(v[0]), vec![mat::rot_x_jac(v[0])]),
            Self::Y => (mat::rot_y(v[0]), vec![mat::rot_y_jac(v[0])]),
            Self::Z => (mat::rot_z(v[0]), vec![mat::rot_z_jac(v[0])]),
            Self::ZXZXZ => {
                let z = [mat::rot_z(v[0]), mat::rot_z(v[1]), mat::rot_z(v[2])];
                let dz = [mat::rot_z_jac(v[0]), mat::rot_z_jac(v[1]), mat::rot_z_jac(v[2])];
                let u = zxzxz(&z[0], &z[1], &z[2]);
                let jacs = vec![
                    zxzxz(&dz[0], &z[1], &z[2]),
                    zxzxz(&z[0], &dz[1], &z[2]),
                    zxzxz(&z[0], &z[1], &dz[2]),
                ];
                (u, jacs)
            },
            Self::XZXZ => {
                let z = [mat::rot_z(v[0]), mat::rot_z(v[1])];
                let dz = [mat::rot_z_jac(v[0]), mat::rot_z_jac(v[1])];
                let u = xzxz(&z[0], &z[1]);
                let jacs = vec![xzxz(&dz[0], &z[1]), xzxz(&z[0], &dz[1])];
                (u, jacs)
            },
            Self::U3 => {
                let t = U3Terms::new(v);
                (t.matrix(), t.jacobians())
            },
            Self::U2 => {
                let (e0, e1) = (C64::cis(v[0]), C64::cis(v[1]));
                let e01 = e0 * e1;
                let i = C64::i();
                let z = C64::from(0.0);
                let norm = C64::from(FRAC_1_SQRT_2);
                let u = rows2([[1.0.into(), -e1], [e0, e01]]) * norm;
                let j0 = rows2([[z, z], [i * e0, i * e01]]) * norm;
                let j1 = rows2([[z, -i * e1], [z, i * e01]]) * norm;
                (u, vec![j0, j1])
            },
            Self::U1 => {
                let e = C64::cis(v[0]);
                let z = C64::from(0.0);
                let u = rows2([[1.0.into(), z], [z, e]]);
                let j = rows2([[z, z], [z, C64::i() * e]]);
                (u, vec![j])
            },
            Self::SingleQutrit => {
                let t = QutritTerms::new(v);
                (t.matrix(), t.jacobians())
            },
            _ => (self.matrix(v), Vec::new()),
        }
    }

    /// Describe `self` as assembly instructions acting from qudit `i` up.
    pub fn assemble(&self, v: &[f64], i: usize) -> Vec<Instr> {
        let w = |k: usize| mat::wrap_angle(v[k]);
        match self {
            Self::Identity { .. } => Vec::new(),
            Self::X => vec![Instr::gate("X", vec![v[0]], vec![i])],
            Self::Y => vec![Instr::gate("Y", vec![v[0]], vec![i])],
            Self::Z => vec![Instr::gate("Z", vec![v[0]], vec![i])],
            Self::ZXZXZ => vec![Instr::Block(vec![
                Instr::gate("Z", vec![w(0)], vec![i]),
                Instr::gate("X", vec![FRAC_PI_2], vec![i]),
                Instr::gate("Z", vec![w(1)], vec![i]),
                Instr::gate("X", vec![FRAC_PI_2], vec![i]),
                Instr::gate("Z", vec![w(2)], vec![i]),
            ])],
            Self::XZXZ => vec![Instr::Block(vec![
                Instr::gate("X", vec![FRAC_PI_2], vec![i]),
                Instr::gate("Z", vec![w(0)], vec![i]),
                Instr::gate("X", vec![FRAC_PI_2], vec![i]),
                Instr::gate("Z", vec![w(1)], vec![i]),
            ])],
            Self::U3 => vec![Instr::gate("U3", vec![w(0), w(1), w(2)], vec![i])],
            Self::U2 => vec![Instr::gate("U3", vec![FRAC_PI_2, w(0), w(1)], vec![i])],
            Self::U1 => vec![Instr::gate("U3", vec![0.0, 0.0, w(0)], vec![i])],
            Self::SingleQutrit => vec![Instr::gate("QUTRIT", v.to_vec(), vec![i])],
            _ => vec![Instr::gate(self.assembly_name(), Vec::new(), vec![i, i + 1])],
        }
    }

    // name under which constant two-qudit gates are assembled
    fn assembly_name(&self) -> &'static str {
        match self {
            Self::CNOT => "CNOT",
            Self::CZ => "CZ",
            Self::Swap => "SWAP",
            Self::ISwap => "ISWAP",
            Self::XX => "XX",
            Self::CNOTRoot => "sqrt(CNOT)",
            Self::CSUM => "CSUM",
            Self::CPI => "CPI",
            Self::CPIPhase(_) => "CPI-",
            _ => "",
        }
    }

    pub(crate) fn write_key(&self, out: &mut String) {
        match self {
            Self::Identity { qudits: 1, dim: 2 } => out.push_str("Identity"),
            Self::Identity { qudits, dim } => {
                out.push_str(&format!("Identity(qudits={}, d={})", qudits, dim));
            },
            Self::CPIPhase(phases) => {
                out.push_str(&format!(
                    "CPIPhase({})", phases.iter().map(|ph| format!("{:?}", ph)).join(", ")
                ));
            },
            other => out.push_str(&format!("{:?}", other)),
        }
    }
}

fn rows2(rows: [[C64; 2]; 2]) -> Mat { Mat::from_fn(2, 2, |i, j| rows[i][j]) }

fn rows3(rows: [[C64; 3]; 3]) -> Mat { Mat::from_fn(3, 3, |i, j| rows[i][j]) }

fn zxzxz(z0: &Mat, z1: &Mat, z2: &Mat) -> Mat {
    z2 * &*mat::X90 * z1 * &*mat::X90 * z0
}

fn xzxz(z0: &Mat, z1: &Mat) -> Mat {
    z1 * &*mat::X90 * z0 * &*mat::X90
}

// trig factors shared between the U3 matrix and its derivatives
struct U3Terms {
    ct: f64,
    st: f64,
    ep: C64,
    el: C64,
}

impl U3Terms {
    fn new(v: &[f64]) -> Self {
        let (st, ct) = (v[0] / 2.0).sin_cos();
        Self { ct, st, ep: C64::cis(v[1]), el: C64::cis(v[2]) }
    }

    fn matrix(&self) -> Mat {
        let Self { ct, st, ep, el } = *self;
        rows2([[ct.into(), -el * st], [ep * st, ep * el * ct]])
    }

    fn jacobians(&self) -> Vec<Mat> {
        let Self { ct, st, ep, el } = *self;
        let i = C64::i();
        let z = C64::from(0.0);
        vec![
            rows2([
                [(-0.5 * st).into(), -el * (0.5 * ct)],
                [ep * (0.5 * ct), ep * el * (-0.5 * st)],
            ]),
            rows2([[z, z], [i * ep * st, i * ep * el * ct]]),
            rows2([[z, -i * el * st], [z, i * ep * el * ct]]),
        ]
    }
}

// trig and phase factors shared between the single-qutrit matrix and its
// derivatives; `p_k = exp(i v[k + 2])` and `m_k = conj(p_k)`
struct QutritTerms {
    s1: f64, c1: f64,
    s2: f64, c2: f64,
    s3: f64, c3: f64,
    p1: C64, m1: C64,
    p2: C64, m2: C64,
    p3: C64, m3: C64,
    p4: C64, m4: C64,
    p5: C64, m5: C64,
}

impl QutritTerms {
    fn new(v: &[f64]) -> Self {
        let (s1, c1) = v[0].sin_cos();
        let (s2, c2) = v[1].sin_cos();
        let (s3, c3) = v[2].sin_cos();
        let ph = |k: usize| (C64::cis(v[k]), C64::cis(-v[k]));
        let (p1, m1) = ph(3);
        let (p2, m2) = ph(4);
        let (p3, m3) = ph(5);
        let (p4, m4) = ph(6);
        let (p5, m5) = ph(7);
        Self { s1, c1, s2, c2, s3, c3, p1, m1, p2, m2, p3, m3, p4, m4, p5, m5 }
    }

    fn matrix(&self) -> Mat {
        let Self { s1, c1, s2, c2, s3, c3, p1, m1, p2, m2, p3, m3, p4, m4, p5, m5 } = *self;
        rows3([
            [
                p1 * (c1 * c2),
                p3 * s1,
                p4 * (c1 * s2),
            ],
            [
                m4 * m5 * (s2 * s3) - p1 * p2 * m3 * (s1 * c2 * c3),
                p2 * (c1 * c3),
                -m1 * m5 * (c2 * s3) - p2 * m3 * p4 * (s1 * s2 * c3),
            ],
            [
                -p1 * m3 * p5 * (s1 * c2 * s3) - m2 * m4 * (s2 * c3),
                p5 * (c1 * s3),
                m1 * m2 * (c2 * c3) - m3 * p4 * p5 * (s1 * s2 * s3),
            ],
        ])
    }

    fn jacobians(&self) -> Vec<Mat> {
        let Self { s1, c1, s2, c2, s3, c3, p1, m1, p2, m2, p3, m3, p4, m4, p5, m5 } = *self;
        let i = C64::i();
        let z = C64::from(0.0);
        // recurring phase products
        let a = p1 * p2 * m3;
        let b = p1 * m3 * p5;
        let c = p2 * m3 * p4;
        let d = m3 * p4 * p5;
        let mm45 = m4 * m5;
        let mm15 = m1 * m5;
        let mm24 = m2 * m4;
        let mm12 = m1 * m2;
        vec![
            // ∂/∂v0
            rows3([
                [p1 * (-s1 * c2), p3 * c1, p4 * (-s1 * s2)],
                [a * (-c1 * c2 * c3), p2 * (-s1 * c3), c * (-c1 * s2 * c3)],
                [b * (-c1 * c2 * s3), p5 * (-s1 * s3), d * (-c1 * s2 * s3)],
            ]),
            // ∂/∂v1
            rows3([
                [p1 * (-c1 * s2), z, p4 * (c1 * c2)],
                [
                    mm45 * (c2 * s3) + a * (s1 * s2 * c3),
                    z,
                    mm15 * (s2 * s3) - c * (s1 * c2 * c3),
                ],
                [
                    b * (s1 * s2 * s3) - mm24 * (c2 * c3),
                    z,
                    -mm12 * (s2 * c3) - d * (s1 * c2 * s3),
                ],
            ]),
            // ∂/∂v2
            rows3([
                [z, z, z],
                [
                    mm45 * (s2 * c3) + a * (s1 * c2 * s3),
                    p2 * (-c1 * s3),
                    -mm15 * (c2 * c3) + c * (s1 * s2 * s3),
                ],
                [
                    -b * (s1 * c2 * c3) + mm24 * (s2 * s3),
                    p5 * (c1 * c3),
                    -mm12 * (c2 * s3) - d * (s1 * s2 * c3),
                ],
            ]),
            // ∂/∂v3
            rows3([
                [i * p1 * (c1 * c2), z, z],
                [-i * a * (s1 * c2 * c3), z, i * mm15 * (c2 * s3)],
                [-i * b * (s1 * c2 * s3), z, -i * mm12 * (c2 * c3)],
            ]),
            // ∂/∂v4
            rows3([
                [z, z, z],
                [-i * a * (s1 * c2 * c3), i * p2 * (c1 * c3), -i * c * (s1 * s2 * c3)],
                [i * mm24 * (s2 * c3), z, -i * mm12 * (c2 * c3)],
            ]),
            // ∂/∂v5
            rows3([
                [z, i * p3 * s1, z],
                [i * a * (s1 * c2 * c3), z, i * c * (s1 * s2 * c3)],
                [i * b * (s1 * c2 * s3), z, i * d * (s1 * s2 * s3)],
            ]),
            // ∂/∂v6
            rows3([
                [z, z, i * p4 * (c1 * s2)],
                [-i * mm45 * (s2 * s3), z, -i * c * (s1 * s2 * c3)],
                [i * mm24 * (s2 * c3), z, -i * d * (s1 * s2 * s3)],
            ]),
            // ∂/∂v7
            rows3([
                [z, z, z],
                [-i * mm45 * (s2 * s3), z, i * mm15 * (c2 * s3)],
                [-i * b * (s1 * c2 * s3), i * p5 * (c1 * s3), -i * d * (s1 * s2 * s3)],
            ]),
        ]
    }
}
