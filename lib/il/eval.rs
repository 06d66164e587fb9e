//! Evaluation of expressions made entirely of constants.

use crate::il;
use crate::Error;

/// Evaluate an expression to a single constant.
///
/// Fails with `Error::EvalScalar` if the expression references a scalar.
pub fn eval(expr: &il::Expression) -> Result<il::Constant, Error> {
    Ok(match *expr {
        il::Expression::Scalar(ref scalar) => {
            return Err(Error::EvalScalar(scalar.name().to_string()));
        }
        il::Expression::Constant(ref constant) => constant.clone(),
        il::Expression::Add(ref lhs, ref rhs) => eval(lhs)?.add(&eval(rhs)?)?,
        il::Expression::Sub(ref lhs, ref rhs) => eval(lhs)?.sub(&eval(rhs)?)?,
        il::Expression::And(ref lhs, ref rhs) => eval(lhs)?.and(&eval(rhs)?)?,
        il::Expression::Or(ref lhs, ref rhs) => eval(lhs)?.or(&eval(rhs)?)?,
        il::Expression::Xor(ref lhs, ref rhs) => eval(lhs)?.xor(&eval(rhs)?)?,
        il::Expression::Shl(ref lhs, ref rhs) => eval(lhs)?.shl(&eval(rhs)?)?,
        il::Expression::Shr(ref lhs, ref rhs) => eval(lhs)?.shr(&eval(rhs)?)?,
        il::Expression::Cmpeq(ref lhs, ref rhs) => eval(lhs)?.cmpeq(&eval(rhs)?)?,
        il::Expression::Cmpneq(ref lhs, ref rhs) => eval(lhs)?.cmpneq(&eval(rhs)?)?,
        il::Expression::Cmpltu(ref lhs, ref rhs) => eval(lhs)?.cmpltu(&eval(rhs)?)?,
        il::Expression::Zext(bits, ref src) => eval(src)?.zext(bits)?,
        il::Expression::Trun(bits, ref src) => eval(src)?.trun(bits)?,
    })
}
