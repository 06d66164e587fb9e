use crate::il::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An IL variable.
///
/// Scalars name registers in calling conventions, and name the fresh
/// symbolic bytes produced by the posix model.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Scalar {
    name: String,
    bits: usize,
}

impl Scalar {
    pub fn new<S>(name: S, bits: usize) -> Scalar
    where
        S: Into<String>,
    {
        Scalar {
            name: name.into(),
            bits,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    /// An identifier uniquely identifies the variable in the form `<name>:<bits>`
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.name, self.bits)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl From<Scalar> for Expression {
    fn from(scalar: Scalar) -> Expression {
        Expression::Scalar(scalar)
    }
}
