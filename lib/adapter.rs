//! Gates that re-embed or wrap another gate's matrix, or a matrix supplied
//! directly by the caller.

use std::{ fmt, sync::Arc };
use itertools::Itertools;
use tracing::debug;
use crate::{
    error::{ GateError, GateResult, StructureIssue },
    gate::Gate,
    instr::Instr,
    mat::{ self, Mat },
    primitive::Primitive,
    DEFAULT_ATOL,
};

// render matrix entries exactly, for use in canonical keys
fn matrix_key(u: &Mat) -> String {
    let rows
        = u.row_iter()
        .map(|row| {
            row.iter().map(|z| format!("({:?}, {:?})", z.re, z.im)).join(", ")
        })
        .map(|row| format!("[{}]", row))
        .join(", ");
    format!("[{}]", rows)
}

fn check_square(u: &Mat, dim: usize) -> GateResult<usize> {
    u.is_square()
        .then(|| mat::infer_qudits(u.nrows(), dim))
        .flatten()
        .filter(|n| *n > 0)
        .ok_or(GateError::BadMatrixShape { rows: u.nrows(), cols: u.ncols(), dim })
}

fn check_unitary(u: &Mat) -> GateResult<()> {
    mat::is_unitary(u, DEFAULT_ATOL)
        .then_some(())
        .ok_or(GateError::NotUnitary { rows: u.nrows() })
}

// a source gate's matrix is only readable once its structure checks out
fn check_source(gate: &Gate) -> GateResult<()> {
    let issues = gate.structure_issues();
    if issues.is_empty() {
        Ok(())
    } else {
        Err(GateError::InvalidSource { gate: gate.canonical_key(), issues })
    }
}

/* Upgraded *******************************************************************/

/// A constant gate re-embedded into qudits of a larger dimension.
///
/// The original basis states keep their labels and the added levels are left
/// unchanged.
#[derive(Clone, Debug)]
pub struct Upgraded {
    sub: Box<Gate>,
    dim: usize,
    u: Mat,
}

impl Upgraded {
    /// Upgrade `gate` to act on qudits of dimension `dim`.
    ///
    /// Fails if `gate` takes parameters, is structurally invalid, or already
    /// acts on qudits of dimension `dim` or larger.
    pub fn new(gate: Gate, dim: usize) -> GateResult<Self> {
        if gate.num_params() > 0 {
            return Err(GateError::NotConstant {
                gate: gate.canonical_key(),
                params: gate.num_params(),
            });
        }
        check_source(&gate)?;
        let sub_u = gate.matrix(&[]);
        let qudits = gate.qudits();
        let from
            = mat::infer_dim(sub_u.nrows(), qudits)
            .ok_or(GateError::BadMatrixShape {
                rows: sub_u.nrows(),
                cols: sub_u.ncols(),
                dim: 0,
            })?;
        if dim <= from {
            return Err(GateError::DimensionNotIncreasing { from, to: dim });
        }
        debug!(from, to = dim, qudits, "upgrading constant gate");
        let u = mat::upgrade_qudits(&sub_u, qudits, from, dim);
        Ok(Self { sub: Box::new(gate), dim, u })
    }

    pub fn subgate(&self) -> &Gate { &self.sub }

    /// Qudit dimension after the upgrade.
    pub fn dim(&self) -> usize { self.dim }

    pub fn qudits(&self) -> usize { self.sub.qudits() }

    pub fn matrix(&self) -> Mat { self.u.clone() }

    /// Assemble as the original gate.
    pub fn assemble(&self, i: usize) -> Vec<Instr> { self.sub.assemble(&[], i) }

    pub(crate) fn write_key(&self, out: &mut String) {
        out.push_str("Upgraded(");
        self.sub.write_key(out);
        out.push_str(&format!(", d={})", self.dim));
    }
}

/* UnitaryGate ****************************************************************/

/// An arbitrary constant gate defined by a caller-supplied unitary.
#[derive(Clone, Debug)]
pub struct UnitaryGate {
    u: Mat,
    dim: usize,
    qudits: usize,
    name: String,
    params: Vec<f64>,
    indices: Option<Vec<usize>>,
}

impl UnitaryGate {
    /// Wrap `u`, assumed to act on qudits of dimension `dim`.
    ///
    /// Fails if `u` is not unitary, or not square with a side length that is
    /// a positive power of `dim`.
    pub fn new(u: Mat, dim: usize) -> GateResult<Self> {
        let qudits = check_square(&u, dim)?;
        check_unitary(&u)?;
        Ok(Self {
            u,
            dim,
            qudits,
            name: "CUSTOM".into(),
            params: Vec::new(),
            indices: None,
        })
    }

    /// Set the name passed on at assembly.
    pub fn with_name<S>(mut self, name: S) -> Self
    where S: Into<String>
    {
        self.name = name.into();
        self
    }

    /// Set the parameters passed on at assembly.
    pub fn with_params(mut self, params: Vec<f64>) -> Self {
        self.params = params;
        self
    }

    /// Fix the qudit indices passed on at assembly, overriding the default of
    /// a contiguous range starting at the assembly offset.
    pub fn with_indices(mut self, indices: Vec<usize>) -> Self {
        self.indices = Some(indices);
        self
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn qudits(&self) -> usize { self.qudits }

    pub fn matrix(&self) -> Mat { self.u.clone() }

    pub fn assemble(&self, i: usize) -> Vec<Instr> {
        let indices
            = self.indices.clone()
            .unwrap_or_else(|| (i..i + self.qudits).collect());
        vec![Instr::gate(self.name.clone(), self.params.clone(), indices)]
    }

    pub(crate) fn write_key(&self, out: &mut String) {
        out.push_str(&format!("Unitary({}, d={}, name={:?}", matrix_key(&self.u), self.dim, self.name));
        if !self.params.is_empty() {
            out.push_str(&format!(", params={:?}", self.params));
        }
        if let Some(indices) = &self.indices {
            out.push_str(&format!(", indices={:?}", indices));
        }
        out.push(')');
    }
}

/* FnGate *********************************************************************/

/// Matrix-valued function of a parameter vector.
pub type MatrixFn = Arc<dyn Fn(&[f64]) -> Mat + Send + Sync>;

/// Matrix-valued function of a parameter vector, returned along with its
/// derivatives.
pub type JacobianFn = Arc<dyn Fn(&[f64]) -> (Mat, Vec<Mat>) + Send + Sync>;

/// A parameterized gate computed by caller-supplied closures.
///
/// Without a Jacobian function this gate can only be used where matrices
/// alone are needed; requesting its Jacobian is an error.
#[derive(Clone)]
pub struct FnGate {
    name: String,
    qudits: usize,
    num_params: usize,
    matrix: MatrixFn,
    jacobian: Option<JacobianFn>,
}

impl fmt::Debug for FnGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGate")
            .field("name", &self.name)
            .field("qudits", &self.qudits)
            .field("num_params", &self.num_params)
            .field("has_jacobian", &self.jacobian.is_some())
            .finish()
    }
}

impl FnGate {
    /// `name` identifies the gate both at assembly and in its canonical key,
    /// so it should uniquely describe `f`.
    pub fn new<S, F>(name: S, qudits: usize, num_params: usize, f: F) -> Self
    where
        S: Into<String>,
        F: Fn(&[f64]) -> Mat + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            qudits,
            num_params,
            matrix: Arc::new(f),
            jacobian: None,
        }
    }

    /// Supply exact derivatives.
    pub fn with_jacobian<J>(mut self, jac: J) -> Self
    where J: Fn(&[f64]) -> (Mat, Vec<Mat>) + Send + Sync + 'static
    {
        self.jacobian = Some(Arc::new(jac));
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn qudits(&self) -> usize { self.qudits }

    pub fn num_params(&self) -> usize { self.num_params }

    pub fn matrix(&self, v: &[f64]) -> Mat { (self.matrix)(v) }

    pub fn jacobian(&self, v: &[f64]) -> GateResult<(Mat, Vec<Mat>)> {
        self.jacobian.as_ref()
            .map(|jac| jac(v))
            .ok_or_else(|| GateError::NoJacobian(self.name.clone()))
    }

    pub fn assemble(&self, v: &[f64], i: usize) -> Vec<Instr> {
        vec![Instr::gate(self.name.clone(), v.to_vec(), (i..i + self.qudits).collect())]
    }

    pub(crate) fn write_key(&self, out: &mut String) {
        out.push_str(&format!(
            "Fn({:?}, qudits={}, params={})", self.name, self.qudits, self.num_params
        ));
    }
}

/* Controlled *****************************************************************/

/// An arbitrary unitary controlled by one extra qubit.
#[derive(Clone, Debug)]
pub struct Controlled {
    u: Mat,
    cu: Mat,
    qudits: usize,
    flipped: bool,
    name: String,
    params: Vec<f64>,
}

impl Controlled {
    /// Build the controlled version of `u`, which must act on qubits.
    ///
    /// The control is the lowest-indexed qubit unless `flipped` is `true`, in
    /// which case it is the highest-indexed.
    ///
    /// Fails with [`GateError::BadMatrixShape`] unless `u` is `2^k × 2^k` for
    /// some `k ≥ 1`; unitaries of other sizes are not accepted. Fails with
    /// [`GateError::NotUnitary`] if `u` is not unitary.
    pub fn new(u: Mat, flipped: bool) -> GateResult<Self> {
        let targets = check_square(&u, 2)?;
        check_unitary(&u)?;
        let cu = mat::controlled(&u, flipped);
        Ok(Self {
            u,
            cu,
            qudits: targets + 1,
            flipped,
            name: "CU".into(),
            params: Vec::new(),
        })
    }

    /// Set the name passed on at assembly.
    pub fn with_name<S>(mut self, name: S) -> Self
    where S: Into<String>
    {
        self.name = name.into();
        self
    }

    /// Set the parameters passed on at assembly.
    pub fn with_params(mut self, params: Vec<f64>) -> Self {
        self.params = params;
        self
    }

    pub fn is_flipped(&self) -> bool { self.flipped }

    /// The uncontrolled unitary.
    pub fn target_unitary(&self) -> &Mat { &self.u }

    pub fn qudits(&self) -> usize { self.qudits }

    pub fn matrix(&self) -> Mat { self.cu.clone() }

    /// Assemble with the control index listed first.
    pub fn assemble(&self, i: usize) -> Vec<Instr> {
        let last = i + self.qudits - 1;
        let indices: Vec<usize>
            = if self.flipped {
                std::iter::once(last).chain(i..last).collect()
            } else {
                (i..=last).collect()
            };
        vec![Instr::gate(self.name.clone(), self.params.clone(), indices)]
    }

    pub(crate) fn write_key(&self, out: &mut String) {
        out.push_str(&format!("Controlled({}, name={:?}", matrix_key(&self.u), self.name));
        if !self.params.is_empty() {
            out.push_str(&format!(", params={:?}", self.params));
        }
        if self.flipped { out.push_str(", flipped"); }
        out.push(')');
    }
}

/* Nonadjacent ****************************************************************/

/// A constant two-qudit gate applied to two arbitrary qudits of a larger
/// register.
///
/// Indices are relative to the lowest qudit of the register. Out-of-range or
/// equal indices are not rejected at construction; they are reported by
/// [`Gate::validate_structure`].
#[derive(Clone, Debug)]
pub struct Nonadjacent {
    inner: Box<Gate>,
    qudits: usize,
    control: usize,
    target: usize,
    u: Option<Mat>,
}

impl Nonadjacent {
    /// A CNOT between `control` and `target` in a register of `qudits`
    /// qubits.
    pub fn new(qudits: usize, control: usize, target: usize) -> Self {
        let inner = Gate::Primitive(Primitive::CNOT);
        let u = Self::build(&inner, 2, qudits, control, target);
        Self { inner: Box::new(inner), qudits, control, target, u }
    }

    /// Like [`Self::new`], but for any constant two-qudit `gate`, whose first
    /// qudit is placed at `control` and second at `target`.
    pub fn with_gate(gate: Gate, qudits: usize, control: usize, target: usize)
        -> GateResult<Self>
    {
        if gate.num_params() > 0 {
            return Err(GateError::NotConstant {
                gate: gate.canonical_key(),
                params: gate.num_params(),
            });
        }
        if gate.qudits() != 2 {
            return Err(GateError::WrongQuditCount {
                gate: gate.canonical_key(),
                expected: 2,
                found: gate.qudits(),
            });
        }
        check_source(&gate)?;
        let size = gate.matrix(&[]).nrows();
        let dim
            = mat::infer_dim(size, 2)
            .ok_or(GateError::BadMatrixShape { rows: size, cols: size, dim: 0 })?;
        let u = Self::build(&gate, dim, qudits, control, target);
        Ok(Self { inner: Box::new(gate), qudits, control, target, u })
    }

    fn build(gate: &Gate, dim: usize, qudits: usize, control: usize, target: usize)
        -> Option<Mat>
    {
        (control < qudits && target < qudits && control != target)
            .then(|| mat::embed_pair(&gate.matrix(&[]), dim, qudits, control, target))
    }

    pub fn control(&self) -> usize { self.control }

    pub fn target(&self) -> usize { self.target }

    pub fn qudits(&self) -> usize { self.qudits }

    /// *Panics if the indices are invalid; see [`Gate::validate_structure`].*
    pub fn matrix(&self) -> Mat {
        match &self.u {
            Some(u) => u.clone(),
            None => panic!(
                "Nonadjacent: no matrix for control {} and target {} in {} qudits; \
                check validate_structure before use",
                self.control, self.target, self.qudits,
            ),
        }
    }

    pub fn assemble(&self, i: usize) -> Vec<Instr> {
        let (c, t) = (i + self.control, i + self.target);
        self.inner.assemble(&[], 0).into_iter()
            .map(|instr| instr.map_indices(&|k| if k == 0 { c } else { t }))
            .collect()
    }

    pub(crate) fn check_structure(&self, issues: &mut Vec<StructureIssue>) {
        if self.control >= self.qudits || self.target >= self.qudits {
            issues.push(StructureIssue::BadPosition {
                qudits: self.qudits,
                control: self.control,
                target: self.target,
            });
        } else if self.control == self.target {
            issues.push(StructureIssue::SameIndices(self.control));
        }
    }

    pub(crate) fn write_key(&self, out: &mut String) {
        out.push_str("Nonadjacent(");
        self.inner.write_key(out);
        out.push_str(&format!(
            ", qudits={}, control={}, target={})", self.qudits, self.control, self.target
        ));
    }
}
