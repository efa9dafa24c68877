//! Intermediate circuit description emitted by [`Gate::assemble`][crate::Gate::assemble].
//!
//! This is the format handed to downstream assemblers, which render it into
//! some concrete circuit language.

use std::fmt;
use itertools::Itertools;

/// A single assembled operation, or a block of them.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    /// A named gate with constant parameters acting on absolute qudit indices.
    Gate {
        name: String,
        params: Vec<f64>,
        indices: Vec<usize>,
    },
    /// A group of operations that belong together.
    Block(Vec<Instr>),
}

impl Instr {
    pub fn gate<S>(name: S, params: Vec<f64>, indices: Vec<usize>) -> Self
    where S: Into<String>
    {
        Self::Gate { name: name.into(), params, indices }
    }

    /// Return `true` if `self` is `Block`.
    pub fn is_block(&self) -> bool { matches!(self, Self::Block(..)) }

    /// Iterate over all `Gate` descriptors in order, descending into blocks.
    pub fn flatten(&self) -> Vec<&Instr> {
        match self {
            Self::Gate { .. } => vec![self],
            Self::Block(body) => body.iter().flat_map(Instr::flatten).collect(),
        }
    }

    /// Apply `f` to every qudit index in `self`, recursively.
    pub fn map_indices<F>(self, f: &F) -> Self
    where F: Fn(usize) -> usize
    {
        match self {
            Self::Gate { name, params, indices } => {
                let indices = indices.into_iter().map(f).collect();
                Self::Gate { name, params, indices }
            },
            Self::Block(body) => {
                Self::Block(body.into_iter().map(|i| i.map_indices(f)).collect())
            },
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gate { name, params, indices } => {
                write!(f, "{}", name)?;
                if !params.is_empty() {
                    write!(f, "({})", params.iter().join(", "))?;
                }
                write!(f, " {}", indices.iter().map(|k| format!("q{}", k)).join(", "))
            },
            Self::Block(body) => {
                write!(f, "{{ {} }}", body.iter().join("; "))
            },
        }
    }
}
