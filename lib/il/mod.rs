//! Harrier Intermediate Language.
//!
//! A deliberately small expression language. Symbolic values handed around
//! by procedures are `Expression`s over two terminals:
//!
//! * `Constant` - a value of a known bit-width, of any width.
//! * `Scalar` - a named, unknown value of a known bit-width.
//!
//! Expressions provide the arithmetic needed to split values into bytes and
//! put them back together (`Shl`, `Shr`, `Or`, `Zext`, `Trun`), compute
//! addresses (`Add`, `Sub`), and state constraints (`Cmpeq`, `Cmpneq`,
//! `Cmpltu`). Comparison expressions evaluate to a 1-bit value.
//!
//! It is an error to create an expression which operates over expressions of
//! differing bitness. This is checked dynamically at runtime, and a `Sort`
//! error will be emitted.

mod constant;
mod eval;
mod expression;
mod scalar;

pub use self::constant::*;
pub use self::eval::eval;
pub use self::expression::*;
pub use self::scalar::*;

/// A convenience function to create a new constant.
///
/// This is the preferred way to create a `Constant`.
pub fn const_(value: u64, bits: usize) -> Constant {
    Constant::new(value, bits)
}

/// A convenience function to create a new constant expression.
///
/// This is the preferred way to create an `Expression::Constant`.
pub fn expr_const(value: u64, bits: usize) -> Expression {
    Expression::constant(Constant::new(value, bits))
}

/// A convenience function to create a new scalar.
///
/// This is the preferred way to create a `Scalar`.
pub fn scalar<S>(name: S, bits: usize) -> Scalar
where
    S: Into<String>,
{
    Scalar::new(name, bits)
}

/// A convenience function to create a new scalar expression.
///
/// This is the preferred way to create an `Expression::Scalar`.
pub fn expr_scalar<S>(name: S, bits: usize) -> Expression
where
    S: Into<String>,
{
    Expression::scalar(Scalar::new(name, bits))
}
