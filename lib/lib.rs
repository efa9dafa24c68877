//! An algebra of parameterized quantum gates on registers of qudits.
//!
//! Gates map a vector of real parameters to a unitary matrix and can supply
//! the exact derivative of that matrix with respect to every parameter, which
//! makes them suitable as building blocks for gradient-based circuit
//! optimization. Gates compose in parallel ([`Kron`]) and in sequence
//! ([`Product`]) to form trees, and carry a canonical identity so that
//! structurally identical trees compare and hash equal.

pub mod error;
pub mod mat;
pub mod instr;
pub mod primitive;
pub mod adapter;
pub mod kron;
pub mod product;
pub mod gate;
#[cfg(test)]
mod testing;

pub use error::{ GateError, GateResult, StructureIssue };
pub use mat::Mat;
pub use instr::Instr;
pub use primitive::Primitive;
pub use adapter::{ Controlled, FnGate, Nonadjacent, UnitaryGate, Upgraded };
pub use kron::Kron;
pub use product::Product;
pub use gate::Gate;

/// Default absolute tolerance for numerical unitarity checks.
pub const DEFAULT_ATOL: f64 = 1e-10;
