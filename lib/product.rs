//! Sequential composition: gates on the same qudits, combined by matrix
//! multiplication in circuit order.

use tracing::debug;
use crate::{
    error::{ GateError, GateResult, StructureIssue },
    gate::{ Gate, param_slices },
    instr::Instr,
    kron::write_children,
    mat::Mat,
};

/// The matrix product of a list of gates applied in order.
///
/// The first subgate is applied first, so the matrix is `U_n ··· U_2 U_1`.
/// Any `Product` passed as a subgate is absorbed into a single flat list.
#[derive(Clone, Debug)]
pub struct Product {
    pub(crate) subgates: Vec<Gate>,
    pub(crate) num_params: usize,
    pub(crate) qudits: usize,
}

impl Product {
    /// Fails if `subgates` is empty.
    ///
    /// Subgates are expected to all act on the same number of qudits; this is
    /// not enforced here, but checked by [`Gate::validate_structure`].
    pub fn new(subgates: Vec<Gate>) -> GateResult<Self> {
        let flat = flatten(subgates);
        if flat.is_empty() {
            return Err(GateError::EmptyComposite("Product"));
        }
        Ok(Self::from_flat(flat))
    }

    // `subgates` must be non-empty and already flat
    fn from_flat(subgates: Vec<Gate>) -> Self {
        let num_params = subgates.iter().map(Gate::num_params).sum();
        let qudits = subgates[0].qudits();
        debug!(subgates = subgates.len(), num_params, qudits, "built Product");
        Self { subgates, num_params, qudits }
    }

    pub fn subgates(&self) -> &[Gate] { &self.subgates }

    pub fn num_params(&self) -> usize { self.num_params }

    pub fn qudits(&self) -> usize { self.qudits }

    /// Return a new `Product` with `gates` applied after all current ones.
    pub fn appending<I>(&self, gates: I) -> Self
    where I: IntoIterator<Item = Gate>
    {
        let subgates
            = self.subgates.iter().cloned()
            .chain(flatten(gates))
            .collect();
        Self::from_flat(subgates)
    }

    /// Return a new `Product` with `gates` spliced in before the subgate at
    /// index `depth`, or at the very beginning if `depth` is `None`.
    ///
    /// `depth` is clamped to the number of subgates.
    pub fn inserting<I>(&self, gates: I, depth: Option<usize>) -> Self
    where I: IntoIterator<Item = Gate>
    {
        let at = depth.unwrap_or(0).min(self.subgates.len());
        let (head, tail) = self.subgates.split_at(at);
        let subgates
            = head.iter().cloned()
            .chain(flatten(gates))
            .chain(tail.iter().cloned())
            .collect();
        Self::from_flat(subgates)
    }

    pub fn matrix(&self, v: &[f64]) -> Mat {
        let mut mats = param_slices(&self.subgates, v).map(|(gate, w)| gate.matrix(w));
        let first = mats.next().unwrap_or_else(|| Mat::identity(1, 1));
        mats.fold(first, |acc, u| u * acc)
    }

    /// Compute the matrix and all derivatives with a linear number of matrix
    /// products.
    ///
    /// The derivative with respect to a parameter of subgate `k` is `A_k J
    /// B_k`, where `A_k` is the product of all subgates after `k` and `B_k`
    /// the product of all before. Starting from `A` as the full product, each
    /// subgate is stripped off the right of `A` by multiplying with its
    /// adjoint, which relies on every subgate being unitary.
    pub fn jacobian(&self, v: &[f64]) -> GateResult<(Mat, Vec<Mat>)> {
        let mut mats: Vec<Mat> = Vec::with_capacity(self.subgates.len());
        let mut sub_jacs: Vec<Vec<Mat>> = Vec::with_capacity(self.subgates.len());
        for (gate, w) in param_slices(&self.subgates, v) {
            let (u, jacs) = gate.jacobian(w)?;
            mats.push(u);
            sub_jacs.push(jacs);
        }
        let n = mats[0].nrows();
        let mut after
            = mats.iter().skip(1)
            .fold(mats[0].clone(), |acc, u| u * acc);
        let mut before = Mat::identity(n, n);
        let mut jacs: Vec<Mat> = Vec::with_capacity(self.num_params);
        for (u, js) in mats.iter().zip(sub_jacs.iter()) {
            after *= u.adjoint();
            jacs.extend(js.iter().map(|j| &after * (j * &before)));
            before = u * before;
        }
        Ok((before, jacs))
    }

    /// Concatenate subgate assemblies; all act from the same offset.
    pub fn assemble(&self, v: &[f64], i: usize) -> Vec<Instr> {
        param_slices(&self.subgates, v)
            .flat_map(|(gate, w)| gate.assemble(w, i))
            .collect()
    }

    pub(crate) fn check_structure(&self, issues: &mut Vec<StructureIssue>) {
        let mut num_params: usize = 0;
        for gate in self.subgates.iter() {
            if gate.qudits() != self.qudits {
                issues.push(StructureIssue::SizeMismatch {
                    expected: self.qudits,
                    found: gate.qudits(),
                    child: gate.canonical_key(),
                });
            }
            gate.check_structure(issues);
            num_params += gate.num_params();
        }
        if num_params != self.num_params {
            issues.push(StructureIssue::ParamMismatch {
                composite: "Product",
                expected: self.num_params,
                found: num_params,
            });
        }
    }

    pub(crate) fn write_key(&self, out: &mut String) {
        out.push_str("Product(");
        write_children(&self.subgates, out);
        out.push(')');
    }
}

// absorb the subgates of any nested products
fn flatten<I>(subgates: I) -> Vec<Gate>
where I: IntoIterator<Item = Gate>
{
    let mut flat: Vec<Gate> = Vec::new();
    for gate in subgates {
        match gate {
            Gate::Sequential(prod) => { flat.extend(prod.subgates); },
            other => { flat.push(other); },
        }
    }
    flat
}
