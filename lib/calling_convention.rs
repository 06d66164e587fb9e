//! Calling conventions, and resolution of logical arguments to values.
//!
//! A procedure never names registers. It asks for argument `n`, and the
//! `CallingConvention` of the active architecture translates that into a
//! register or a stack slot, and reads the value out of the state.

use crate::architecture::{Endian, StackDirection};
use crate::il;
use crate::memory::Value;
use crate::state::State;
use crate::Error;
use log::trace;
use serde::{Deserialize, Serialize};

/// Available type of calling conventions
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CallingConventionType {
    Amd64SystemV,
    Aapcs64,
    Cdecl,
    MipsSystemV,
    MipselSystemV,
}

/// The type of an argument.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArgumentType {
    /// The argument is held in a register.
    Register(il::Scalar),

    /// The argument is held in a stack offset.
    ///
    /// The stack offset is given at function call/entry.
    Stack(usize),
}

impl ArgumentType {
    pub fn register(&self) -> Option<&il::Scalar> {
        match self {
            ArgumentType::Register(scalar) => Some(scalar),
            ArgumentType::Stack(_) => None,
        }
    }

    pub fn stack(&self) -> Option<usize> {
        match self {
            ArgumentType::Stack(offset) => Some(*offset),
            ArgumentType::Register(_) => None,
        }
    }
}

/// Where a resolved argument was found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArgumentLocation {
    Register(il::Scalar),
    /// The address of the stack slot.
    Stack(Value),
}

/// An argument resolved against a state for a single call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedArgument {
    index: usize,
    location: ArgumentLocation,
    value: Value,
}

impl ResolvedArgument {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn location(&self) -> &ArgumentLocation {
        &self.location
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Represents the calling convention of a particular platform.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CallingConvention {
    /// arguments passed in registers.
    argument_registers: Vec<il::Scalar>,

    /// Offset from the stack pointer at function entry where the first
    /// argument on the stack is found.
    ///
    /// After register arguments are exhausted, resolution will begin looking
    /// here.
    stack_argument_offset: usize,

    /// Length of an argument on the stack in bytes.
    stack_argument_length: usize,

    /// The register the returned value is given in.
    return_register: il::Scalar,

    stack_pointer: il::Scalar,
    stack_direction: StackDirection,
    endian: Endian,

    /// Width of a pointer in bits.
    pointer_width: usize,
}

impl CallingConvention {
    /// Create a new `CallingConvention` based on the given
    /// `CallingConventionType`.
    pub fn new(typ: CallingConventionType) -> CallingConvention {
        match typ {
            CallingConventionType::Amd64SystemV => CallingConvention {
                argument_registers: vec![
                    il::scalar("rdi", 64),
                    il::scalar("rsi", 64),
                    il::scalar("rdx", 64),
                    il::scalar("rcx", 64),
                    il::scalar("r8", 64),
                    il::scalar("r9", 64),
                ],
                // The return address sits at [rsp]
                stack_argument_offset: 8,
                stack_argument_length: 8,
                return_register: il::scalar("rax", 64),
                stack_pointer: il::scalar("rsp", 64),
                stack_direction: StackDirection::Down,
                endian: Endian::Little,
                pointer_width: 64,
            },
            CallingConventionType::Aapcs64 => CallingConvention {
                argument_registers: (0..8).map(|i| il::scalar(format!("x{}", i), 64)).collect(),
                // The return address is in x30, stack arguments begin at sp
                stack_argument_offset: 0,
                stack_argument_length: 8,
                return_register: il::scalar("x0", 64),
                stack_pointer: il::scalar("sp", 64),
                stack_direction: StackDirection::Down,
                endian: Endian::Little,
                pointer_width: 64,
            },
            CallingConventionType::Cdecl => CallingConvention {
                argument_registers: Vec::new(),
                stack_argument_offset: 4,
                stack_argument_length: 4,
                return_register: il::scalar("eax", 32),
                stack_pointer: il::scalar("esp", 32),
                stack_direction: StackDirection::Down,
                endian: Endian::Little,
                pointer_width: 32,
            },
            CallingConventionType::MipsSystemV | CallingConventionType::MipselSystemV => {
                CallingConvention {
                    argument_registers: vec![
                        il::scalar("$a0", 32),
                        il::scalar("$a1", 32),
                        il::scalar("$a2", 32),
                        il::scalar("$a3", 32),
                    ],
                    // o32 reserves home space for $a0-$a3
                    stack_argument_offset: 16,
                    stack_argument_length: 4,
                    return_register: il::scalar("$v0", 32),
                    stack_pointer: il::scalar("$sp", 32),
                    stack_direction: StackDirection::Down,
                    endian: if typ == CallingConventionType::MipsSystemV {
                        Endian::Big
                    } else {
                        Endian::Little
                    },
                    pointer_width: 32,
                }
            }
        }
    }

    /// Get the registers the first n arguments are passed in.
    pub fn argument_registers(&self) -> &[il::Scalar] {
        &self.argument_registers
    }

    /// Get the length of an argument on the stack in _bytes, not bits_.
    ///
    /// We would expect this to be natural register-width of the architecture.
    pub fn stack_argument_length(&self) -> usize {
        self.stack_argument_length
    }

    /// Get the stack offset to the first argument passed on the stack in
    /// _bytes, not bits_.
    pub fn stack_argument_offset(&self) -> usize {
        self.stack_argument_offset
    }

    /// The register returned values is given in.
    pub fn return_register(&self) -> &il::Scalar {
        &self.return_register
    }

    pub fn stack_pointer(&self) -> &il::Scalar {
        &self.stack_pointer
    }

    pub fn stack_direction(&self) -> StackDirection {
        self.stack_direction
    }

    pub fn set_stack_direction(&mut self, stack_direction: StackDirection) {
        self.stack_direction = stack_direction;
    }

    /// Width of a pointer, in bits.
    pub fn pointer_width(&self) -> usize {
        self.pointer_width
    }

    /// Get the type for the given argument, starting with 0 index.
    pub fn argument_type(&self, argument_number: usize) -> ArgumentType {
        if argument_number >= self.argument_registers.len() {
            let n = argument_number - self.argument_registers.len();
            let offset = self.stack_argument_offset + (self.stack_argument_length * n);
            ArgumentType::Stack(offset)
        } else {
            ArgumentType::Register(self.argument_registers[argument_number].clone())
        }
    }

    /// Resolve the location and value of argument `index` in `state`.
    ///
    /// Reading a stack slot goes through the state's memory facade, so a
    /// symbolic stack pointer is handled by the state's symbolic address
    /// policy.
    pub fn resolve(&self, state: &mut State, index: usize) -> Result<ResolvedArgument, Error> {
        let argument = match self.argument_type(index) {
            ArgumentType::Register(register) => {
                let value = state.register(register.name()).cloned().ok_or_else(|| {
                    Error::ArgumentResolutionFailure {
                        index,
                        reason: format!("register {} holds no value", register.name()),
                    }
                })?;
                if value.bits() != register.bits() {
                    return Err(Error::ArchitectureMismatch {
                        expected: register.bits(),
                        found: value.bits(),
                    });
                }
                ResolvedArgument {
                    index,
                    location: ArgumentLocation::Register(register),
                    value,
                }
            }
            ArgumentType::Stack(offset) => {
                let stack_pointer = state
                    .register(self.stack_pointer.name())
                    .cloned()
                    .ok_or_else(|| Error::ArgumentResolutionFailure {
                        index,
                        reason: format!(
                            "stack pointer {} holds no value",
                            self.stack_pointer.name()
                        ),
                    })?;
                if stack_pointer.bits() != self.pointer_width {
                    return Err(Error::ArchitectureMismatch {
                        expected: self.pointer_width,
                        found: stack_pointer.bits(),
                    });
                }
                let address = match self.stack_direction {
                    StackDirection::Down => {
                        stack_pointer.add(&Value::concrete(offset as u64, self.pointer_width))?
                    }
                    StackDirection::Up => stack_pointer.sub(&Value::concrete(
                        (offset + self.stack_argument_length) as u64,
                        self.pointer_width,
                    ))?,
                };
                let length = Value::concrete(self.stack_argument_length as u64, self.pointer_width);
                let bytes = state.read_memory(&address, &length)?;
                ResolvedArgument {
                    index,
                    location: ArgumentLocation::Stack(address),
                    value: Value::from_bytes(&bytes, &self.endian)?,
                }
            }
        };

        trace!(
            "argument {} resolved to {:?} = {}",
            index,
            argument.location,
            argument.value
        );

        Ok(argument)
    }

    /// Get the value of argument `index` in `state`.
    pub fn argument(&self, state: &mut State, index: usize) -> Result<Value, Error> {
        Ok(self.resolve(state, index)?.into_value())
    }

    /// Write a value into the return register.
    ///
    /// Values narrower than the return register are zero-extended. Values
    /// wider than the return register are rejected rather than truncated.
    pub fn set_return_value(&self, state: &mut State, value: Value) -> Result<(), Error> {
        let bits = self.return_register.bits();
        if value.bits() > bits {
            return Err(Error::ArchitectureMismatch {
                expected: bits,
                found: value.bits(),
            });
        }
        let value = value.zext(bits)?;
        trace!("{} = {}", self.return_register.name(), value);
        state.set_register(self.return_register.name(), value);
        Ok(())
    }
}
