//! Parallel composition: gates on disjoint qudit ranges, combined by the
//! Kronecker product.

use itertools::{ Itertools, Position };
use tracing::debug;
use crate::{
    error::{ GateError, GateResult, StructureIssue },
    gate::{ Gate, param_slices },
    instr::Instr,
    mat::Mat,
};

/// The Kronecker product of a list of gates.
///
/// The first subgate acts on the lowest-indexed qudits. Nested `Kron`s are
/// kept as-is rather than flattened.
#[derive(Clone, Debug)]
pub struct Kron {
    pub(crate) subgates: Vec<Gate>,
    pub(crate) num_params: usize,
    pub(crate) qudits: usize,
}

impl Kron {
    /// Fails if `subgates` is empty.
    pub fn new(subgates: Vec<Gate>) -> GateResult<Self> {
        if subgates.is_empty() {
            return Err(GateError::EmptyComposite("Kron"));
        }
        Ok(Self::from_nonempty(subgates))
    }

    fn from_nonempty(subgates: Vec<Gate>) -> Self {
        let num_params = subgates.iter().map(Gate::num_params).sum();
        let qudits = subgates.iter().map(Gate::qudits).sum();
        debug!(subgates = subgates.len(), num_params, qudits, "built Kron");
        Self { subgates, num_params, qudits }
    }

    pub fn subgates(&self) -> &[Gate] { &self.subgates }

    pub fn num_params(&self) -> usize { self.num_params }

    pub fn qudits(&self) -> usize { self.qudits }

    /// Return a new `Kron` with `gate` acting on qudits after all current
    /// ones.
    pub fn appending(&self, gate: Gate) -> Self {
        let mut subgates = self.subgates.clone();
        subgates.push(gate);
        Self::from_nonempty(subgates)
    }

    pub fn matrix(&self, v: &[f64]) -> Mat {
        param_slices(&self.subgates, v)
            .map(|(gate, w)| gate.matrix(w))
            .reduce(|acc, u| acc.kronecker(&u))
            .unwrap_or_else(|| Mat::identity(1, 1))
    }

    /// Compute the matrix and all derivatives in a single pass.
    ///
    /// The derivative with respect to a parameter of one subgate is the
    /// Kronecker product of all subgate matrices with that subgate's replaced
    /// by its own derivative. Sweeping left to right, derivatives found so far
    /// are extended by each new subgate's matrix, and the new subgate's
    /// derivatives are prefixed by the product accumulated so far.
    pub fn jacobian(&self, v: &[f64]) -> GateResult<(Mat, Vec<Mat>)> {
        let mut u = Mat::identity(1, 1);
        let mut jacs: Vec<Mat> = Vec::with_capacity(self.num_params);
        for (gate, w) in param_slices(&self.subgates, v) {
            let (m, sub_jacs) = gate.jacobian(w)?;
            jacs.iter_mut().for_each(|j| { *j = j.kronecker(&m); });
            jacs.extend(sub_jacs.iter().map(|j| u.kronecker(j)));
            u = u.kronecker(&m);
        }
        Ok((u, jacs))
    }

    pub fn assemble(&self, v: &[f64], i: usize) -> Vec<Instr> {
        let mut offset = i;
        let mut body: Vec<Instr> = Vec::new();
        for (gate, w) in param_slices(&self.subgates, v) {
            body.append(&mut gate.assemble(w, offset));
            offset += gate.qudits();
        }
        vec![Instr::Block(body)]
    }

    pub(crate) fn check_structure(&self, issues: &mut Vec<StructureIssue>) {
        let mut num_params: usize = 0;
        let mut qudits: usize = 0;
        for gate in self.subgates.iter() {
            gate.check_structure(issues);
            num_params += gate.num_params();
            qudits += gate.qudits();
        }
        if num_params != self.num_params {
            issues.push(StructureIssue::ParamMismatch {
                composite: "Kron",
                expected: self.num_params,
                found: num_params,
            });
        }
        if qudits != self.qudits {
            issues.push(StructureIssue::QuditMismatch {
                composite: "Kron",
                expected: self.qudits,
                found: qudits,
            });
        }
    }

    pub(crate) fn write_key(&self, out: &mut String) {
        out.push_str("Kron(");
        write_children(&self.subgates, out);
        out.push(')');
    }
}

pub(crate) fn write_children(subgates: &[Gate], out: &mut String) {
    subgates.iter()
        .with_position()
        .for_each(|(pos, gate)| {
            gate.write_key(out);
            if matches!(pos, Position::First | Position::Middle) {
                out.push_str(", ");
            }
        });
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ primitive::Primitive, testing::* };

    fn prim(p: Primitive) -> Gate { Gate::Primitive(p) }

    #[test]
    fn empty_is_rejected() {
        assert!(matches!(Kron::new(Vec::new()), Err(GateError::EmptyComposite("Kron"))));
    }

    #[test]
    fn matrix_is_kronecker_product() {
        let mut rng = rng(20);
        let k = Kron::new(vec![prim(Primitive::U3), prim(Primitive::X)]).unwrap();
        for _ in 0..10 {
            let v = sample_params(&mut rng, 4);
            let expected
                = Primitive::U3.matrix(&v[..3])
                .kronecker(&Primitive::X.matrix(&v[3..]));
            assert!(approx_eq(&k.matrix(&v), &expected, 1e-14));
        }
    }

    #[test]
    fn jacobian_order_follows_parameters() {
        let mut rng = rng(21);
        let k = Kron::new(vec![
            prim(Primitive::Z),
            prim(Primitive::CNOT),
            prim(Primitive::XZXZ),
            prim(Primitive::Y),
        ]).unwrap();
        assert_eq!(k.qudits(), 5);
        for _ in 0..10 {
            let v = sample_params(&mut rng, k.num_params());
            let (u, jacs) = k.jacobian(&v).unwrap();
            assert_eq!(jacs.len(), 4);
            assert!(approx_eq(&u, &k.matrix(&v), 1e-12));
            assert!(jacobians_match(|w| k.matrix(w), &v, &jacs));
        }
    }

    #[test]
    fn single_subgate_passes_through() {
        let k = Kron::new(vec![prim(Primitive::U3)]).unwrap();
        let v = [0.4, 1.3, -2.0];
        let (u, jacs) = k.jacobian(&v).unwrap();
        let (u0, jacs0) = Primitive::U3.jacobian(&v);
        assert!(approx_eq(&u, &u0, 1e-15));
        jacs.iter().zip(&jacs0).for_each(|(a, b)| assert!(approx_eq(a, b, 1e-15)));
    }

    #[test]
    fn assembly_advances_offsets() {
        let k = Kron::new(vec![
            prim(Primitive::X),
            prim(Primitive::CNOT),
            prim(Primitive::identity()),
            prim(Primitive::Z),
        ]).unwrap();
        let out = k.assemble(&[0.5, 0.25], 2);
        assert_eq!(
            out,
            vec![Instr::Block(vec![
                Instr::gate("X", vec![0.5], vec![2]),
                Instr::gate("CNOT", vec![], vec![3, 4]),
                Instr::gate("Z", vec![0.25], vec![6]),
            ])],
        );
    }

    #[test]
    fn appending_does_not_mutate() {
        let k = Kron::new(vec![prim(Primitive::X)]).unwrap();
        let k2 = k.appending(prim(Primitive::Y));
        assert_eq!(k.subgates().len(), 1);
        assert_eq!(k2.subgates().len(), 2);
        assert_eq!(k2.num_params(), 2);
        assert_eq!(k2.qudits(), 2);
    }
}
