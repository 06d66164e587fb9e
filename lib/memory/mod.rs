//! Memory representations.
//!
//! Memory is a byte-addressable store of 8-bit [`Value`]s, split into
//! copy-on-write pages so that cloning a state when a path forks only copies
//! the pages that are later written. Procedures do not use [`paged::Memory`]
//! directly; they go through the facade on [`crate::state::State`], which
//! decides what to do with symbolic addresses.

pub mod paged;
mod value;

pub use self::value::Value;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// RWX permissions for memory.
    #[derive(Deserialize, Serialize)]
    pub struct MemoryPermissions: u32 {
        const NONE    = 0b000;
        const READ    = 0b001;
        const WRITE   = 0b010;
        const EXECUTE = 0b100;
        const ALL     = 0b111;
    }
}
