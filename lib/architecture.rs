//! Information and types for Harrier's supported architectures.

use crate::calling_convention::{CallingConvention, CallingConventionType};
use crate::il;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// An architecture's endanness.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Endian {
    Big,
    Little,
}

/// The direction the stack grows in as values are pushed.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum StackDirection {
    /// Pushing decrements the stack pointer. Arguments live above it.
    Down,
    /// Pushing increments the stack pointer. Arguments live below it.
    Up,
}

/// Necessary functions for resolving calls over architectures.
///
/// Architectures are read-only descriptors, and may be shared by every path
/// and thread.
pub trait Architecture: Debug + Send + Sync {
    /// Get the name of this architecture.
    fn name(&self) -> &'static str;
    /// Get the endianness of this architecture.
    fn endian(&self) -> Endian;
    /// Get the _default_ calling convention for this architecture.
    fn calling_convention(&self) -> CallingConvention;
    /// Get the scalar used to represent the stack pointer.
    fn stack_pointer(&self) -> il::Scalar;
    /// Get the size of a natural word for this architecture in bits. This is
    /// also the width of a pointer.
    fn word_size(&self) -> usize;
    /// Get the direction the stack grows in.
    fn stack_direction(&self) -> StackDirection {
        StackDirection::Down
    }
    /// Clone into a boxed `Architecture`
    fn box_clone(&self) -> Box<dyn Architecture>;
}

/// The 64-bit X86 Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Amd64 {}

impl Amd64 {
    pub fn new() -> Amd64 {
        Amd64 {}
    }
}

impl Architecture for Amd64 {
    fn name(&self) -> &'static str {
        "amd64"
    }
    fn endian(&self) -> Endian {
        Endian::Little
    }
    fn calling_convention(&self) -> CallingConvention {
        CallingConvention::new(CallingConventionType::Amd64SystemV)
    }
    fn stack_pointer(&self) -> il::Scalar {
        il::scalar("rsp", 64)
    }
    fn word_size(&self) -> usize {
        64
    }
    fn box_clone(&self) -> Box<dyn Architecture> {
        Box::new(self.clone())
    }
}

/// The 64-bit Arm Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AArch64 {}

impl AArch64 {
    pub fn new() -> AArch64 {
        AArch64 {}
    }
}

impl Architecture for AArch64 {
    fn name(&self) -> &'static str {
        "aarch64"
    }
    fn endian(&self) -> Endian {
        Endian::Little
    }
    fn calling_convention(&self) -> CallingConvention {
        CallingConvention::new(CallingConventionType::Aapcs64)
    }
    fn stack_pointer(&self) -> il::Scalar {
        il::scalar("sp", 64)
    }
    fn word_size(&self) -> usize {
        64
    }
    fn box_clone(&self) -> Box<dyn Architecture> {
        Box::new(self.clone())
    }
}

/// The 32-bit Mips Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Mips {}

impl Mips {
    pub fn new() -> Mips {
        Mips {}
    }
}

impl Architecture for Mips {
    fn name(&self) -> &'static str {
        "mips"
    }
    fn endian(&self) -> Endian {
        Endian::Big
    }
    fn calling_convention(&self) -> CallingConvention {
        CallingConvention::new(CallingConventionType::MipsSystemV)
    }
    fn stack_pointer(&self) -> il::Scalar {
        il::scalar("$sp", 32)
    }
    fn word_size(&self) -> usize {
        32
    }
    fn box_clone(&self) -> Box<dyn Architecture> {
        Box::new(self.clone())
    }
}

/// The 32-bit Mipsel Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Mipsel {}

impl Mipsel {
    pub fn new() -> Mipsel {
        Mipsel {}
    }
}

impl Architecture for Mipsel {
    fn name(&self) -> &'static str {
        "mipsel"
    }
    fn endian(&self) -> Endian {
        Endian::Little
    }
    fn calling_convention(&self) -> CallingConvention {
        CallingConvention::new(CallingConventionType::MipselSystemV)
    }
    fn stack_pointer(&self) -> il::Scalar {
        il::scalar("$sp", 32)
    }
    fn word_size(&self) -> usize {
        32
    }
    fn box_clone(&self) -> Box<dyn Architecture> {
        Box::new(self.clone())
    }
}

/// The 32-bit X86 Architecture.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct X86 {}

impl X86 {
    pub fn new() -> X86 {
        X86 {}
    }
}

impl Architecture for X86 {
    fn name(&self) -> &'static str {
        "x86"
    }
    fn endian(&self) -> Endian {
        Endian::Little
    }
    fn calling_convention(&self) -> CallingConvention {
        CallingConvention::new(CallingConventionType::Cdecl)
    }
    fn stack_pointer(&self) -> il::Scalar {
        il::scalar("esp", 32)
    }
    fn word_size(&self) -> usize {
        32
    }
    fn box_clone(&self) -> Box<dyn Architecture> {
        Box::new(self.clone())
    }
}
