//! A `Constant` holds a single value.
//!
//! Constants are backed by `BigUint`, so a constant of any width can be
//! represented without losing bits.

use crate::il::*;
use crate::Error;
use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A constant value for Harrier IL
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Constant {
    value: BigUint,
    bits: usize,
}

impl Constant {
    /// Create a new `Constant` with the given value and bitness.
    pub fn new(value: u64, bits: usize) -> Constant {
        Constant::new_big(BigUint::from(value), bits)
    }

    /// Create a new `Constant` from a `BigUint`. Bits above `bits` are
    /// discarded.
    pub fn new_big(value: BigUint, bits: usize) -> Constant {
        Constant {
            value: Constant::trim_value(value, bits),
            bits,
        }
    }

    /// Create a constant from little-endian bytes. The constant will have
    /// `bytes.len() * 8` bits.
    pub fn from_le_bytes(bytes: &[u8]) -> Constant {
        Constant::new_big(BigUint::from_bytes_le(bytes), bytes.len() * 8)
    }

    fn trim_value(value: BigUint, bits: usize) -> BigUint {
        let mask = (BigUint::one() << bits) - BigUint::one();
        value & mask
    }

    /// Get the value of this `Constant`.
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Get the value of this `Constant` if it fits in a u64.
    pub fn value_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }

    /// Get the number of bits for this `Constant`.
    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.value.is_one()
    }

    fn ensure_sort(&self, rhs: &Constant) -> Result<(), Error> {
        if self.bits != rhs.bits {
            Err(Error::Sort)
        } else {
            Ok(())
        }
    }

    fn bool(value: bool) -> Constant {
        Constant::new(if value { 1 } else { 0 }, 1)
    }

    fn shift_amount(&self, rhs: &Constant) -> Option<usize> {
        rhs.value
            .to_usize()
            .and_then(|bits| if bits >= self.bits { None } else { Some(bits) })
    }

    pub fn add(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value + &rhs.value, self.bits))
    }

    pub fn sub(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        let modulus = BigUint::one() << self.bits;
        Ok(Constant::new_big(
            &self.value + modulus - &rhs.value,
            self.bits,
        ))
    }

    pub fn and(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value & &rhs.value, self.bits))
    }

    pub fn or(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value | &rhs.value, self.bits))
    }

    pub fn xor(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::new_big(&self.value ^ &rhs.value, self.bits))
    }

    /// Shift left. Shifting by the bit-width or more yields zero.
    pub fn shl(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(match self.shift_amount(rhs) {
            Some(bits) => Constant::new_big(&self.value << bits, self.bits),
            None => Constant::new(0, self.bits),
        })
    }

    /// Logical shift right. Shifting by the bit-width or more yields zero.
    pub fn shr(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(match self.shift_amount(rhs) {
            Some(bits) => Constant::new_big(&self.value >> bits, self.bits),
            None => Constant::new(0, self.bits),
        })
    }

    pub fn cmpeq(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::bool(self.value == rhs.value))
    }

    pub fn cmpneq(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::bool(self.value != rhs.value))
    }

    pub fn cmpltu(&self, rhs: &Constant) -> Result<Constant, Error> {
        self.ensure_sort(rhs)?;
        Ok(Constant::bool(self.value < rhs.value))
    }

    pub fn zext(&self, bits: usize) -> Result<Constant, Error> {
        if bits <= self.bits {
            return Err(Error::Sort);
        }
        Ok(Constant::new_big(self.value.clone(), bits))
    }

    pub fn trun(&self, bits: usize) -> Result<Constant, Error> {
        if bits >= self.bits || bits == 0 {
            return Err(Error::Sort);
        }
        Ok(Constant::new_big(self.value.clone(), bits))
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:X}:{}", self.value, self.bits)
    }
}

impl From<Constant> for Expression {
    fn from(constant: Constant) -> Expression {
        Expression::Constant(constant)
    }
}

#[cfg(test)]
mod tests {
    use crate::il;

    #[test]
    fn sub_wraps() {
        let c = il::const_(1, 8).sub(&il::const_(2, 8)).unwrap();
        assert_eq!(c, il::const_(0xff, 8));
    }

    #[test]
    fn wide_constants_keep_their_bits() {
        let bytes = [0xffu8; 16];
        let c = il::Constant::from_le_bytes(&bytes);
        assert_eq!(c.bits(), 128);
        assert_eq!(c.value_u64(), None);
        assert_eq!(c.trun(64).unwrap().value_u64(), Some(u64::MAX));
    }

    #[test]
    fn shifts_past_width_are_zero() {
        let c = il::const_(0xAA, 8);
        assert!(c.shl(&il::const_(8, 8)).unwrap().is_zero());
        assert_eq!(c.shr(&il::const_(4, 8)).unwrap(), il::const_(0xA, 8));
    }

    #[test]
    fn mixed_sorts_are_rejected() {
        assert!(il::const_(1, 8).add(&il::const_(1, 16)).is_err());
        assert!(il::const_(1, 16).zext(8).is_err());
        assert!(il::const_(1, 16).trun(16).is_err());
    }
}
