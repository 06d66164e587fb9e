//! The interface to a constraint solver.
//!
//! Harrier never solves anything itself. When a symbolic address has to be
//! turned into a concrete one, the state asks its `Solver` for a value and
//! records the answer as a path constraint.

use crate::il;
use crate::Error;
use rustc_hash::FxHashMap;
use std::fmt::Debug;

pub trait Solver: Debug + Send + Sync {
    /// Find a value for `expression` which satisfies every constraint.
    ///
    /// Returns `Ok(None)` when the constraints are unsatisfiable.
    fn eval(
        &self,
        expression: &il::Expression,
        constraints: &[il::Expression],
    ) -> Result<Option<il::Constant>, Error>;
}

/// A solver over one fixed assignment of scalars.
///
/// This is what a concolic engine has on hand: the concrete inputs of the
/// current run. Every scalar referenced by the expression or the constraints
/// must be assigned.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Model {
    assignments: FxHashMap<String, il::Constant>,
}

impl Model {
    pub fn new() -> Model {
        Model::default()
    }

    /// Assign a constant to the scalar named `name`.
    pub fn assign<S: Into<String>>(&mut self, name: S, constant: il::Constant) {
        self.assignments.insert(name.into(), constant);
    }

    pub fn with<S: Into<String>>(mut self, name: S, constant: il::Constant) -> Model {
        self.assign(name, constant);
        self
    }

    pub fn get(&self, name: &str) -> Option<&il::Constant> {
        self.assignments.get(name)
    }

    /// Replace every assigned scalar in `expression` with its constant.
    pub fn substitute(&self, expression: &il::Expression) -> Result<il::Expression, Error> {
        Ok(match *expression {
            il::Expression::Scalar(ref scalar) => match self.assignments.get(scalar.name()) {
                Some(constant) => {
                    if constant.bits() != scalar.bits() {
                        return Err(Error::Sort);
                    }
                    constant.clone().into()
                }
                None => expression.clone(),
            },
            il::Expression::Constant(_) => expression.clone(),
            il::Expression::Add(ref lhs, ref rhs) => {
                il::Expression::add(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Sub(ref lhs, ref rhs) => {
                il::Expression::sub(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::And(ref lhs, ref rhs) => {
                il::Expression::and(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Or(ref lhs, ref rhs) => {
                il::Expression::or(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Xor(ref lhs, ref rhs) => {
                il::Expression::xor(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Shl(ref lhs, ref rhs) => {
                il::Expression::shl(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Shr(ref lhs, ref rhs) => {
                il::Expression::shr(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Cmpeq(ref lhs, ref rhs) => {
                il::Expression::cmpeq(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Cmpneq(ref lhs, ref rhs) => {
                il::Expression::cmpneq(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Cmpltu(ref lhs, ref rhs) => {
                il::Expression::cmpltu(self.substitute(lhs)?, self.substitute(rhs)?)?
            }
            il::Expression::Zext(bits, ref src) => il::Expression::zext(bits, self.substitute(src)?)?,
            il::Expression::Trun(bits, ref src) => il::Expression::trun(bits, self.substitute(src)?)?,
        })
    }
}

impl Solver for Model {
    fn eval(
        &self,
        expression: &il::Expression,
        constraints: &[il::Expression],
    ) -> Result<Option<il::Constant>, Error> {
        for constraint in constraints {
            if !il::eval(&self.substitute(constraint)?)?.is_one() {
                return Ok(None);
            }
        }
        Ok(Some(il::eval(&self.substitute(expression)?)?))
    }
}
