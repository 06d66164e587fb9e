//! Simulated procedures.
//!
//! A `Procedure` stands in for an external function. It is handed a `Call`,
//! which gives it the state of the calling path and resolves its arguments
//! through the calling convention of the target, and it answers with an
//! `Outcome`.
//!
//! Procedures are registered by symbol in a `DispatchTable`. The table is
//! built once and then shared, read-only, by every path.
//!
//! ```
//! use harrier::procedure::{ArgumentKind, Call, DispatchTable, Outcome, Procedure};
//! use harrier::{Error, Value};
//!
//! /// `int getchar(void)`, returning an unconstrained byte.
//! #[derive(Debug)]
//! struct Getchar;
//!
//! impl Procedure for Getchar {
//!     fn signature(&self) -> Vec<ArgumentKind> {
//!         Vec::new()
//!     }
//!
//!     fn invoke(&self, call: &mut Call) -> Result<Outcome, Error> {
//!         let byte = call.state_mut().posix_mut()?.read(0, 1)?.remove(0);
//!         Ok(Outcome::Return(byte.zext(32)?))
//!     }
//! }
//!
//! let mut hooks = DispatchTable::new();
//! hooks.register("getchar", Getchar);
//! assert!(hooks.contains("getchar"));
//! ```

use crate::calling_convention::CallingConvention;
use crate::memory::Value;
use crate::state::State;
use crate::Error;
use std::fmt::Debug;

mod dispatch;
pub mod libc;

pub use self::dispatch::{DispatchTable, ProcedureBinding};

/// How a procedure interprets one of its arguments.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ArgumentKind {
    /// A pointer, as wide as the architecture's pointer width.
    Pointer,
    /// An integer of the given width. Wider registers or stack slots are
    /// truncated to it.
    Integer(usize),
    /// An unsigned integer as wide as a pointer, such as `size_t`.
    Size,
    /// A pointer to a format string.
    FormatString,
}

/// What happened when a procedure ran.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The procedure returned this value to its caller.
    Return(Value),
    /// The procedure terminated the program with this status. Nothing is
    /// returned to the caller, and the path ends.
    Exit(Value),
}

/// A simulated external function.
///
/// Procedures are stateless between invocations. Everything they change
/// lives in the `State` reached through `Call`.
pub trait Procedure: Debug + Send + Sync {
    /// The arguments this procedure takes, in order.
    fn signature(&self) -> Vec<ArgumentKind>;

    /// Run this procedure.
    ///
    /// On error the state may be partially modified. `DispatchTable::invoke`
    /// restores it.
    fn invoke(&self, call: &mut Call) -> Result<Outcome, Error>;
}

/// A single call to a procedure.
pub struct Call<'c> {
    symbol: &'c str,
    state: &'c mut State,
    calling_convention: &'c CallingConvention,
    signature: &'c [ArgumentKind],
}

impl<'c> Call<'c> {
    pub fn new(
        symbol: &'c str,
        state: &'c mut State,
        calling_convention: &'c CallingConvention,
        signature: &'c [ArgumentKind],
    ) -> Call<'c> {
        Call {
            symbol,
            state,
            calling_convention,
            signature,
        }
    }

    /// The symbol this call was dispatched on.
    pub fn symbol(&self) -> &str {
        self.symbol
    }

    pub fn state(&self) -> &State {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut *self.state
    }

    pub fn calling_convention(&self) -> &CallingConvention {
        self.calling_convention
    }

    pub fn signature(&self) -> &[ArgumentKind] {
        self.signature
    }

    /// The width of a pointer, in bits.
    pub fn pointer_width(&self) -> usize {
        self.calling_convention.pointer_width()
    }

    /// A concrete value as wide as a pointer.
    pub fn word(&self, value: u64) -> Value {
        Value::concrete(value, self.pointer_width())
    }

    /// Get argument `index`, interpreted as its declared `ArgumentKind`.
    ///
    /// Only arguments in the signature may be fetched.
    pub fn argument(&mut self, index: usize) -> Result<Value, Error> {
        let kind = *self
            .signature
            .get(index)
            .ok_or_else(|| Error::ArgumentResolutionFailure {
                index,
                reason: format!(
                    "{} declares {} arguments",
                    self.symbol,
                    self.signature.len()
                ),
            })?;

        let value = self.calling_convention.argument(self.state, index)?;
        let pointer_width = self.pointer_width();

        match kind {
            ArgumentKind::Pointer | ArgumentKind::FormatString | ArgumentKind::Size => {
                if value.bits() != pointer_width {
                    return Err(Error::ArchitectureMismatch {
                        expected: pointer_width,
                        found: value.bits(),
                    });
                }
                Ok(value)
            }
            ArgumentKind::Integer(bits) => {
                if value.bits() < bits {
                    return Err(Error::ArchitectureMismatch {
                        expected: bits,
                        found: value.bits(),
                    });
                }
                value.trun(bits)
            }
        }
    }

    /// Get argument `index` as a concrete u64, concretizing it through the
    /// state's symbolic address policy if needed.
    pub fn concrete_argument(&mut self, index: usize) -> Result<u64, Error> {
        let value = self.argument(index)?;
        self.state.concretize(&value)
    }
}
