//! State plugins.
//!
//! A plugin is a named piece of per-path state beyond registers and memory,
//! such as the posix model. Plugins are cloned with the state when a path
//! forks, so each path owns its own.

use std::any::Any;
use std::fmt::Debug;

pub trait Plugin: Any + Debug + Send + Sync {
    /// Clone into a boxed `Plugin`
    fn box_clone(&self) -> Box<dyn Plugin>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn Plugin> {
    fn clone(&self) -> Box<dyn Plugin> {
        self.box_clone()
    }
}
