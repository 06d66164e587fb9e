//! The symbolic value handed between procedures, registers and memory.

use crate::architecture::Endian;
use crate::il;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value which is either a concrete constant, or a symbolic expression.
///
/// The width of a `Value` is always known. Building a value from an
/// expression made only of constants folds it to `Value::Concrete`, so a
/// `Value::Symbolic` always references at least one scalar.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Value {
    Concrete(il::Constant),
    Symbolic(il::Expression),
}

impl Value {
    /// Create a concrete value.
    pub fn concrete(value: u64, bits: usize) -> Value {
        Value::Concrete(il::const_(value, bits))
    }

    /// Create a fully unconstrained symbolic value named `name`.
    pub fn scalar<S: Into<String>>(name: S, bits: usize) -> Value {
        Value::Symbolic(il::expr_scalar(name, bits))
    }

    /// Create a value from an expression, folding it to a constant when it
    /// holds no scalars.
    pub fn from_expression(expression: il::Expression) -> Result<Value, Error> {
        if expression.all_constants() {
            Ok(Value::Concrete(il::eval(&expression)?))
        } else {
            Ok(Value::Symbolic(expression))
        }
    }

    /// Concrete bytes as 8-bit values.
    pub fn from_u8s(bytes: &[u8]) -> Vec<Value> {
        bytes
            .iter()
            .map(|byte| Value::concrete(*byte as u64, 8))
            .collect()
    }

    /// The number of bits in this value.
    pub fn bits(&self) -> usize {
        match *self {
            Value::Concrete(ref constant) => constant.bits(),
            Value::Symbolic(ref expression) => expression.bits(),
        }
    }

    pub fn is_concrete(&self) -> bool {
        matches!(*self, Value::Concrete(_))
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(*self, Value::Symbolic(_))
    }

    /// The constant held by this value, if it is concrete.
    pub fn constant(&self) -> Option<&il::Constant> {
        match *self {
            Value::Concrete(ref constant) => Some(constant),
            Value::Symbolic(_) => None,
        }
    }

    /// The concrete value as a u64, if this value is concrete and fits.
    pub fn value_u64(&self) -> Option<u64> {
        self.constant().and_then(|constant| constant.value_u64())
    }

    /// This value as an expression.
    pub fn expression(&self) -> il::Expression {
        match *self {
            Value::Concrete(ref constant) => constant.clone().into(),
            Value::Symbolic(ref expression) => expression.clone(),
        }
    }

    /// Add two values of the same width.
    pub fn add(&self, other: &Value) -> Result<Value, Error> {
        match (self, other) {
            (Value::Concrete(lhs), Value::Concrete(rhs)) => Ok(Value::Concrete(lhs.add(rhs)?)),
            _ => Value::from_expression(il::Expression::add(
                self.expression(),
                other.expression(),
            )?),
        }
    }

    /// Subtract `other` from this value.
    pub fn sub(&self, other: &Value) -> Result<Value, Error> {
        match (self, other) {
            (Value::Concrete(lhs), Value::Concrete(rhs)) => Ok(Value::Concrete(lhs.sub(rhs)?)),
            _ => Value::from_expression(il::Expression::sub(
                self.expression(),
                other.expression(),
            )?),
        }
    }

    /// Zero-extend this value to `bits`. Extending to the current width is a
    /// no-op, narrowing is an error.
    pub fn zext(&self, bits: usize) -> Result<Value, Error> {
        if bits == self.bits() {
            return Ok(self.clone());
        }
        match *self {
            Value::Concrete(ref constant) => Ok(Value::Concrete(constant.zext(bits)?)),
            Value::Symbolic(ref expression) => Ok(Value::Symbolic(il::Expression::zext(
                bits,
                expression.clone(),
            )?)),
        }
    }

    /// Truncate this value to its low `bits`. Truncating to the current width
    /// is a no-op, widening is an error.
    pub fn trun(&self, bits: usize) -> Result<Value, Error> {
        if bits == self.bits() {
            return Ok(self.clone());
        }
        match *self {
            Value::Concrete(ref constant) => Ok(Value::Concrete(constant.trun(bits)?)),
            Value::Symbolic(ref expression) => Value::from_expression(il::Expression::trun(
                bits,
                expression.clone(),
            )?),
        }
    }

    /// Split this value into 8-bit values, in the order they are laid out in
    /// memory for the given endianness.
    pub fn to_bytes(&self, endian: &Endian) -> Result<Vec<Value>, Error> {
        let bits = self.bits();
        if bits == 0 || bits % 8 != 0 {
            return Err(format!("Value of {} bits can not be split into bytes", bits).into());
        }
        let length = bits / 8;

        let mut bytes = match *self {
            Value::Concrete(ref constant) => {
                let mut le = constant.value().to_bytes_le();
                le.resize(length, 0);
                Value::from_u8s(&le)
            }
            Value::Symbolic(ref expression) => {
                if bits == 8 {
                    vec![self.clone()]
                } else {
                    let mut bytes = Vec::with_capacity(length);
                    for i in 0..length {
                        let shift = il::expr_const((i * 8) as u64, bits);
                        let byte = il::Expression::shr(expression.clone(), shift)?;
                        bytes.push(Value::from_expression(il::Expression::trun(8, byte)?)?);
                    }
                    bytes
                }
            }
        };

        if *endian == Endian::Big {
            bytes.reverse();
        }

        Ok(bytes)
    }

    /// Join 8-bit values, laid out in memory with the given endianness, into
    /// one value.
    pub fn from_bytes(bytes: &[Value], endian: &Endian) -> Result<Value, Error> {
        if bytes.is_empty() {
            return Err("Can not join zero bytes into a value".into());
        }
        if let Some(byte) = bytes.iter().find(|byte| byte.bits() != 8) {
            return Err(format!("Joining a {}-bit value as a byte", byte.bits()).into());
        }

        let mut le: Vec<&Value> = bytes.iter().collect();
        if *endian == Endian::Big {
            le.reverse();
        }

        if le.iter().all(|byte| byte.is_concrete()) {
            let le = le
                .iter()
                .map(|byte| byte.value_u64().map(|b| b as u8))
                .collect::<Option<Vec<u8>>>()
                .ok_or("Concrete byte wider than 8 bits")?;
            return Ok(Value::Concrete(il::Constant::from_le_bytes(&le)));
        }

        if le.len() == 1 {
            return Ok(le[0].clone());
        }

        let bits = le.len() * 8;
        let mut result: Option<il::Expression> = None;
        for (i, byte) in le.into_iter().enumerate() {
            let byte = il::Expression::zext(bits, byte.expression())?;
            let byte = if i == 0 {
                byte
            } else {
                il::Expression::shl(byte, il::expr_const((i * 8) as u64, bits))?
            };
            result = Some(match result {
                Some(result) => il::Expression::or(result, byte)?,
                None => byte,
            });
        }

        Value::from_expression(result.ok_or("Joined no bytes")?)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Concrete(ref constant) => constant.fmt(f),
            Value::Symbolic(ref expression) => expression.fmt(f),
        }
    }
}

impl From<il::Constant> for Value {
    fn from(constant: il::Constant) -> Value {
        Value::Concrete(constant)
    }
}
