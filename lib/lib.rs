//! Harrier: simulated procedures for symbolic execution.
//!
//! When a symbolic executor reaches a call to an external library function,
//! lifting and executing the real implementation is slow and usually
//! pointless. Harrier replaces such calls with hand-written *procedures* that
//! manipulate machine state directly: they pull arguments through the
//! target's calling convention, read and write (possibly symbolic) memory,
//! consume input from a simplified posix model, and return a value that is
//! written back as if the real function had run.
//!
//! # Components
//!
//! * [`il`] - the expressions symbolic values are built from.
//! * [`memory`] - the symbolic [`Value`] and the copy-on-write paged memory.
//! * [`architecture`] and [`calling_convention`] - where arguments live.
//! * [`platform`] - the posix file descriptor model.
//! * [`state`] - the per-path machine state, its plugins and its solver.
//! * [`procedure`] - the `Procedure` trait, the dispatch table, and a small
//!   catalog of libc procedures.
//!
//! # A call, end to end
//!
//! ```
//! use harrier::architecture::{Amd64, Architecture};
//! use harrier::procedure::{DispatchTable, Outcome};
//! use harrier::state::State;
//! use harrier::{Config, Value};
//!
//! let config = Config::default();
//! let hooks = DispatchTable::standard(&config);
//! let architecture = Amd64::new();
//!
//! let mut state = State::new(&architecture, &config);
//! state.set_register("rsi", Value::concrete(0x2000, 64));
//!
//! let outcome = hooks.invoke("__isoc99_scanf", &mut state, &architecture).unwrap();
//! assert_eq!(outcome, Outcome::Return(Value::concrete(0x2000, 64)));
//! assert_eq!(state.register("rax"), Some(&Value::concrete(0x2000, 64)));
//! ```

pub mod architecture;
pub mod calling_convention;
pub mod config;
mod error;
pub mod il;
pub mod memory;
pub mod platform;
pub mod procedure;
pub mod state;
#[cfg(test)]
mod tests;

pub use crate::config::Config;
pub use crate::error::*;
pub use crate::memory::Value;

#[cfg(not(feature = "thread_safe"))]
use std::rc::Rc;
#[cfg(not(feature = "thread_safe"))]
pub type RC<T> = Rc<T>;

#[cfg(feature = "thread_safe")]
use std::sync::Arc;
#[cfg(feature = "thread_safe")]
pub type RC<T> = Arc<T>;
