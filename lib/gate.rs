//! The closed set of gate kinds and the operations common to all of them.
//!
//! Every [`Gate`] reports how many real parameters it takes and how many
//! qudits it acts on, and maps a parameter vector to its unitary, the exact
//! derivatives of that unitary, and an instruction listing. Composites are
//! built from other gates with [`Kron`] (side by side) and [`Product`] (one
//! after another).

use std::hash::{ Hash, Hasher };
use rustc_hash::FxHasher;
use tracing::warn;
use crate::{
    adapter::{ Controlled, FnGate, Nonadjacent, UnitaryGate, Upgraded },
    error::{ GateResult, StructureIssue },
    instr::Instr,
    kron::Kron,
    mat::{ self, Mat },
    primitive::Primitive,
    product::Product,
};

/// A parameterized quantum gate.
///
/// Equality and hashing follow the gate's canonical key: two gates are equal
/// when they are built from the same kinds and configuration in the same
/// order, regardless of how they were constructed.
///
/// All operations taking a parameter slice *panic* if its length differs from
/// [`Self::num_params`].
#[derive(Clone, Debug)]
pub enum Gate {
    /// A fixed, named gate.
    Primitive(Primitive),
    /// A constant gate re-embedded into larger qudits.
    Upgrade(Upgraded),
    /// A caller-supplied constant unitary.
    Wrap(UnitaryGate),
    /// Caller-supplied matrix (and optionally Jacobian) functions.
    FnWrap(FnGate),
    /// A unitary controlled by one qubit.
    ControlledWrap(Controlled),
    /// A constant two-qudit gate on two arbitrary qudits of a register.
    PositionalPair(Nonadjacent),
    /// Parallel composition.
    Tensor(Kron),
    /// Sequential composition.
    Sequential(Product),
}

macro_rules! impl_from_kind {
    ( $kind:ident, $variant:ident ) => {
        impl From<$kind> for Gate {
            fn from(g: $kind) -> Self { Self::$variant(g) }
        }
    }
}
impl_from_kind!(Primitive, Primitive);
impl_from_kind!(Upgraded, Upgrade);
impl_from_kind!(UnitaryGate, Wrap);
impl_from_kind!(FnGate, FnWrap);
impl_from_kind!(Controlled, ControlledWrap);
impl_from_kind!(Nonadjacent, PositionalPair);
impl_from_kind!(Kron, Tensor);
impl_from_kind!(Product, Sequential);

impl PartialEq for Gate {
    fn eq(&self, other: &Self) -> bool { self.canonical_key() == other.canonical_key() }
}

impl Eq for Gate { }

impl Hash for Gate {
    fn hash<H: Hasher>(&self, state: &mut H) { state.write_u64(self.digest()); }
}

// pair each gate with its share of a flat parameter list
pub(crate) fn param_slices<'a>(gates: &'a [Gate], v: &'a [f64])
    -> impl Iterator<Item = (&'a Gate, &'a [f64])> + 'a
{
    gates.iter()
        .scan(0_usize, move |start, gate| {
            let end = *start + gate.num_params();
            let w = &v[*start..end];
            *start = end;
            Some((gate, w))
        })
}

impl Gate {
    /// Shorthand for a [`Kron`] of `subgates`.
    pub fn kron(subgates: Vec<Gate>) -> GateResult<Self> {
        Kron::new(subgates).map(Self::Tensor)
    }

    /// Shorthand for a [`Product`] of `subgates`, applied in order.
    pub fn product(subgates: Vec<Gate>) -> GateResult<Self> {
        Product::new(subgates).map(Self::Sequential)
    }

    /// Return `true` if `self` is a composite.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Tensor(..) | Self::Sequential(..))
    }

    pub fn num_params(&self) -> usize {
        match self {
            Self::Primitive(p) => p.num_params(),
            Self::FnWrap(f) => f.num_params(),
            Self::Tensor(k) => k.num_params(),
            Self::Sequential(p) => p.num_params(),
            Self::Upgrade(_)
            | Self::Wrap(_)
            | Self::ControlledWrap(_)
            | Self::PositionalPair(_) => 0,
        }
    }

    pub fn qudits(&self) -> usize {
        match self {
            Self::Primitive(p) => p.qudits(),
            Self::Upgrade(g) => g.qudits(),
            Self::Wrap(g) => g.qudits(),
            Self::FnWrap(f) => f.qudits(),
            Self::ControlledWrap(g) => g.qudits(),
            Self::PositionalPair(g) => g.qudits(),
            Self::Tensor(k) => k.qudits(),
            Self::Sequential(p) => p.qudits(),
        }
    }

    fn check_params(&self, v: &[f64]) {
        assert_eq!(
            v.len(), self.num_params(),
            "{} takes {} parameter(s) but was given {}",
            self.canonical_key(), self.num_params(), v.len(),
        );
    }

    /// Compute the unitary at `v`.
    pub fn matrix(&self, v: &[f64]) -> Mat {
        self.check_params(v);
        match self {
            Self::Primitive(p) => p.matrix(v),
            Self::Upgrade(g) => g.matrix(),
            Self::Wrap(g) => g.matrix(),
            Self::FnWrap(f) => f.matrix(v),
            Self::ControlledWrap(g) => g.matrix(),
            Self::PositionalPair(g) => g.matrix(),
            Self::Tensor(k) => k.matrix(v),
            Self::Sequential(p) => p.matrix(v),
        }
    }

    /// Compute the unitary at `v` along with its derivative with respect to
    /// each parameter, in parameter order.
    ///
    /// Gates without parameters always succeed with no derivatives. Fails if
    /// any parameterized part of `self` is an [`FnGate`] without a Jacobian
    /// function.
    pub fn jacobian(&self, v: &[f64]) -> GateResult<(Mat, Vec<Mat>)> {
        self.check_params(v);
        if self.num_params() == 0 {
            return Ok((self.matrix(v), Vec::new()));
        }
        match self {
            Self::Primitive(p) => Ok(p.jacobian(v)),
            Self::FnWrap(f) => f.jacobian(v),
            Self::Tensor(k) => k.jacobian(v),
            Self::Sequential(p) => p.jacobian(v),
            _ => Ok((self.matrix(v), Vec::new())),
        }
    }

    /// Render `self` at `v` as a list of instructions, with qudit indices
    /// counted from `i`.
    pub fn assemble(&self, v: &[f64], i: usize) -> Vec<Instr> {
        self.check_params(v);
        match self {
            Self::Primitive(p) => p.assemble(v, i),
            Self::Upgrade(g) => g.assemble(i),
            Self::Wrap(g) => g.assemble(i),
            Self::FnWrap(f) => f.assemble(v, i),
            Self::ControlledWrap(g) => g.assemble(i),
            Self::PositionalPair(g) => g.assemble(i),
            Self::Tensor(k) => k.assemble(v, i),
            Self::Sequential(p) => p.assemble(v, i),
        }
    }

    /// Return the immediate children of a composite, or `self` alone
    /// otherwise.
    pub fn parts(&self) -> &[Gate] {
        match self {
            Self::Tensor(k) => k.subgates(),
            Self::Sequential(p) => p.subgates(),
            _ => std::slice::from_ref(self),
        }
    }

    /// Return `true` if the matrix at `v` is unitary to within `atol` in
    /// every entry of `U†U - I`.
    pub fn is_unitary_at(&self, v: &[f64], atol: f64) -> bool {
        mat::is_unitary(&self.matrix(v), atol)
    }

    /// A string identifying the kind and full configuration of `self`.
    ///
    /// Structurally identical gates have identical keys.
    pub fn canonical_key(&self) -> String {
        let mut out = String::new();
        self.write_key(&mut out);
        out
    }

    pub(crate) fn write_key(&self, out: &mut String) {
        match self {
            Self::Primitive(p) => p.write_key(out),
            Self::Upgrade(g) => g.write_key(out),
            Self::Wrap(g) => g.write_key(out),
            Self::FnWrap(f) => f.write_key(out),
            Self::ControlledWrap(g) => g.write_key(out),
            Self::PositionalPair(g) => g.write_key(out),
            Self::Tensor(k) => k.write_key(out),
            Self::Sequential(p) => p.write_key(out),
        }
    }

    /// A 64-bit digest of the canonical key.
    ///
    /// The hasher is unseeded, so digests are stable across runs. It reads
    /// the key in native-endian `usize` chunks, however, so digests are only
    /// comparable between builds for 64-bit little-endian targets; persist
    /// [`Self::canonical_key`] instead where that cannot be assumed.
    pub fn digest(&self) -> u64 {
        let mut state = FxHasher::default();
        state.write(self.canonical_key().as_bytes());
        state.finish()
    }

    /// Collect every structural inconsistency in `self` and its
    /// descendants.
    pub fn structure_issues(&self) -> Vec<StructureIssue> {
        let mut issues: Vec<StructureIssue> = Vec::new();
        self.check_structure(&mut issues);
        issues
    }

    pub(crate) fn check_structure(&self, issues: &mut Vec<StructureIssue>) {
        match self {
            Self::Upgrade(g) => g.subgate().check_structure(issues),
            Self::PositionalPair(g) => g.check_structure(issues),
            Self::Tensor(k) => k.check_structure(issues),
            Self::Sequential(p) => p.check_structure(issues),
            Self::Primitive(_)
            | Self::Wrap(_)
            | Self::FnWrap(_)
            | Self::ControlledWrap(_) => { },
        }
    }

    /// Return `true` if `self` is internally consistent, logging a warning
    /// for each problem found otherwise.
    pub fn validate_structure(&self) -> bool {
        let issues = self.structure_issues();
        issues.iter()
            .for_each(|issue| { warn!(%issue, "invalid gate structure"); });
        issues.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use rayon::prelude::*;
    use crate::{ error::GateError, testing::*, DEFAULT_ATOL };
    use super::*;

    fn prim(p: Primitive) -> Gate { Gate::Primitive(p) }

    fn qubit_layer() -> Gate {
        Gate::kron(vec![prim(Primitive::U3), prim(Primitive::U3)]).unwrap()
    }

    fn ansatz() -> Gate {
        Gate::product(vec![
            qubit_layer(),
            prim(Primitive::CNOT),
            qubit_layer(),
            Gate::kron(vec![prim(Primitive::identity()), prim(Primitive::Z)]).unwrap(),
            prim(Primitive::CNOT),
            qubit_layer(),
        ]).unwrap()
    }

    #[test]
    fn u3_at_pi_flips() {
        let g = prim(Primitive::U3);
        let u = g.matrix(&[std::f64::consts::PI, 0.0, 0.0]);
        let flip = Mat::from_row_slice(2, 2, &[0.0.into(), (-1.0).into(), 1.0.into(), 0.0.into()]);
        assert!(approx_eq_phase(&u, &flip, 1e-12));
        assert!(g.is_unitary_at(&[std::f64::consts::PI, 0.0, 0.0], DEFAULT_ATOL));
    }

    #[test]
    fn constant_pairs_cancel() {
        for p in [Primitive::Swap, Primitive::CNOT, Primitive::CZ] {
            let g = Gate::product(vec![prim(p), prim(p)]).unwrap();
            assert!(approx_eq(&g.matrix(&[]), &Mat::identity(4, 4), 1e-15));
            let (_, jacs) = g.jacobian(&[]).unwrap();
            assert!(jacs.is_empty());
        }
    }

    #[test]
    fn kron_of_identities() {
        let g = Gate::kron(vec![prim(Primitive::identity()), prim(Primitive::identity())]).unwrap();
        let (u, jacs) = g.jacobian(&[]).unwrap();
        assert_eq!(u, Mat::identity(4, 4));
        assert!(jacs.is_empty());
    }

    #[test]
    fn deep_tree_jacobian() {
        let mut rng = rng(40);
        let g = Gate::kron(vec![
            ansatz(),
            Gate::product(vec![
                prim(Primitive::XZXZ),
                Gate::kron(vec![prim(Primitive::Y)]).unwrap(),
                prim(Primitive::U2),
            ]).unwrap(),
        ]).unwrap();
        assert_eq!(g.qudits(), 3);
        assert_eq!(g.num_params(), 3 * 6 + 1 + 2 + 1 + 2);
        for _ in 0..5 {
            let v = sample_params(&mut rng, g.num_params());
            let (u, jacs) = g.jacobian(&v).unwrap();
            assert_eq!(jacs.len(), g.num_params());
            assert!(approx_eq(&u, &g.matrix(&v), 1e-10));
            assert!(g.is_unitary_at(&v, DEFAULT_ATOL));
            assert!(jacobians_match(|w| g.matrix(w), &v, &jacs));
        }
    }

    #[test]
    fn qutrit_tree_jacobian() {
        let mut rng = rng(41);
        let g = Gate::product(vec![
            Gate::kron(vec![prim(Primitive::SingleQutrit), prim(Primitive::SingleQutrit)]).unwrap(),
            prim(Primitive::CSUM),
            Gate::kron(vec![
                prim(Primitive::Identity { qudits: 1, dim: 3 }),
                prim(Primitive::SingleQutrit),
            ]).unwrap(),
        ]).unwrap();
        let v = sample_params(&mut rng, g.num_params());
        let (_, jacs) = g.jacobian(&v).unwrap();
        assert_eq!(jacs.len(), 24);
        assert!(jacobians_match(|w| g.matrix(w), &v, &jacs));
    }

    #[test]
    #[should_panic]
    fn wrong_param_count_panics() {
        prim(Primitive::U3).matrix(&[0.0, 1.0]);
    }

    #[test]
    fn missing_jacobian_propagates() {
        let f = FnGate::new("phase", 1, 1, |v: &[f64]| Primitive::U1.matrix(v));
        let g = Gate::product(vec![
            prim(Primitive::X),
            Gate::kron(vec![Gate::from(f.clone())]).unwrap(),
        ]).unwrap();
        let v = [0.2, 0.7];
        let expected = Primitive::U1.matrix(&[0.7]) * Primitive::X.matrix(&[0.2]);
        assert!(approx_eq(&g.matrix(&v), &expected, 1e-14));
        assert!(matches!(g.jacobian(&v), Err(GateError::NoJacobian(name)) if name == "phase"));

        let with_jac = f.with_jacobian(|v: &[f64]| Primitive::U1.jacobian(v));
        let g = Gate::product(vec![prim(Primitive::X), with_jac.into()]).unwrap();
        let (_, jacs) = g.jacobian(&v).unwrap();
        assert!(jacobians_match(|w| g.matrix(w), &v, &jacs));
    }

    #[test]
    fn canonical_identity() {
        let a = ansatz();
        let b = ansatz();
        assert_eq!(a, b);
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a.digest(), b.digest());

        let mut set: HashSet<Gate> = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));

        assert_ne!(prim(Primitive::X), prim(Primitive::Y));
        let xy = Gate::kron(vec![prim(Primitive::X), prim(Primitive::Y)]).unwrap();
        let yx = Gate::kron(vec![prim(Primitive::Y), prim(Primitive::X)]).unwrap();
        assert_ne!(xy, yx);
        let seq = Gate::product(vec![prim(Primitive::X), prim(Primitive::Y)]).unwrap();
        assert_ne!(xy, seq);
    }

    #[test]
    fn canonical_key_format() {
        let g = Gate::product(vec![
            Gate::kron(vec![prim(Primitive::X), prim(Primitive::identity())]).unwrap(),
            prim(Primitive::CNOT),
        ]).unwrap();
        assert_eq!(g.canonical_key(), "Product(Kron(X, Identity), CNOT)");
        let mut state = FxHasher::default();
        state.write(b"Product(Kron(X, Identity), CNOT)");
        assert_eq!(g.digest(), state.finish());
    }

    #[test]
    #[cfg(all(target_pointer_width = "64", target_endian = "little"))]
    fn digests_are_pinned() {
        let g = Gate::product(vec![
            Gate::kron(vec![prim(Primitive::X), prim(Primitive::identity())]).unwrap(),
            prim(Primitive::CNOT),
        ]).unwrap();
        assert_eq!(g.digest(), 0x8bd0fc0dc40de84d);
        assert_eq!(prim(Primitive::CNOT).digest(), 0x3708bfd5c51d2aff);
    }

    #[test]
    fn kron_is_not_flattened() {
        let inner = Gate::kron(vec![prim(Primitive::X), prim(Primitive::Y)]).unwrap();
        let nested = Gate::kron(vec![inner, prim(Primitive::Z)]).unwrap();
        let flat = Gate::kron(vec![prim(Primitive::X), prim(Primitive::Y), prim(Primitive::Z)]).unwrap();
        assert_eq!(nested.parts().len(), 2);
        assert_ne!(nested, flat);
        let v = [0.1, 0.2, 0.3];
        assert!(approx_eq(&nested.matrix(&v), &flat.matrix(&v), 1e-14));
    }

    #[test]
    fn parts() {
        let g = ansatz();
        assert_eq!(g.parts().len(), 6);
        assert!(g.is_composite());
        let x = prim(Primitive::X);
        assert_eq!(x.parts(), std::slice::from_ref(&x));
    }

    #[test]
    fn valid_structures() {
        assert!(ansatz().validate_structure());
        let na = Gate::from(Nonadjacent::new(4, 3, 1));
        let g = Gate::product(vec![
            na,
            Gate::kron(vec![prim(Primitive::CZ), prim(Primitive::CNOT)]).unwrap(),
        ]).unwrap();
        assert!(g.validate_structure());
    }

    #[test]
    fn product_size_mismatch() {
        let g = Gate::product(vec![prim(Primitive::CNOT), prim(Primitive::X)]).unwrap();
        assert!(!g.validate_structure());
        assert_eq!(
            g.structure_issues(),
            vec![StructureIssue::SizeMismatch { expected: 2, found: 1, child: "X".into() }],
        );
    }

    #[test]
    fn tampered_counts_are_reported() {
        let mut k = Kron::new(vec![prim(Primitive::X), prim(Primitive::CNOT)]).unwrap();
        k.num_params = 4;
        k.qudits = 2;
        let g = Gate::from(k);
        assert_eq!(
            g.structure_issues(),
            vec![
                StructureIssue::ParamMismatch { composite: "Kron", expected: 4, found: 1 },
                StructureIssue::QuditMismatch { composite: "Kron", expected: 2, found: 3 },
            ],
        );

        let mut p = Product::new(vec![prim(Primitive::X), prim(Primitive::Y)]).unwrap();
        p.num_params = 1;
        let g = Gate::from(p);
        assert!(!g.validate_structure());
        assert_eq!(
            g.structure_issues(),
            vec![StructureIssue::ParamMismatch { composite: "Product", expected: 1, found: 2 }],
        );
    }

    #[test]
    fn nested_issues_are_found() {
        let bad = Gate::from(Nonadjacent::new(3, 1, 1));
        let g = Gate::product(vec![
            prim(Primitive::Identity { qudits: 3, dim: 2 }),
            Gate::product(vec![bad]).unwrap(),
        ]).unwrap();
        assert_eq!(g.structure_issues(), vec![StructureIssue::SameIndices(1)]);
        assert!(!g.validate_structure());
    }

    #[test]
    fn composite_assembly() {
        let g = Gate::kron(vec![
            prim(Primitive::X),
            Gate::product(vec![prim(Primitive::CZ), Nonadjacent::new(2, 1, 0).into()]).unwrap(),
        ]).unwrap();
        let out = g.assemble(&[0.5], 1);
        assert_eq!(
            out,
            vec![Instr::Block(vec![
                Instr::gate("X", vec![0.5], vec![1]),
                Instr::gate("CZ", vec![], vec![2, 3]),
                Instr::gate("CNOT", vec![], vec![3, 2]),
            ])],
        );
    }

    #[test]
    fn gates_are_send_and_sync() {
        fn check<T: Send + Sync>() { }
        check::<Gate>();
    }

    #[test]
    fn concurrent_jacobians() {
        let g = ansatz();
        let points: Vec<Vec<f64>>
            = (0..16_u64)
            .map(|seed| sample_params(&mut rng(seed), g.num_params()))
            .collect();
        let serial: Vec<(Mat, Vec<Mat>)>
            = points.iter()
            .map(|v| g.jacobian(v).unwrap())
            .collect();
        let parallel: Vec<(Mat, Vec<Mat>)>
            = points.par_iter()
            .map(|v| g.jacobian(v).unwrap())
            .collect();
        for ((u0, j0), (u1, j1)) in serial.iter().zip(&parallel) {
            assert_eq!(u0, u1);
            assert_eq!(j0, j1);
        }
    }
}
