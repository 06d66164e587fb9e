//! Configuration for states and the standard procedure catalog.
//!
//! Everything here is policy, not structure. The defaults reproduce the
//! behavior of the classic `scanf` summary: read 17 bytes from stdin, with
//! stdin fully symbolic, and refuse to touch memory through a symbolic
//! address. `read` may ask for at most 1 MiB at a time.
//!
//! A configuration can be loaded from json:
//!
//! ```
//! use harrier::config::{Config, SymbolicAddressPolicy};
//!
//! let config = Config::from_json(r#"{
//!     "symbolic_addresses": "concretize",
//!     "scanf": { "length": 32 }
//! }"#).unwrap();
//!
//! assert_eq!(config.symbolic_addresses, SymbolicAddressPolicy::Concretize);
//! assert_eq!(config.scanf.length, 32);
//! assert_eq!(config.scanf.fd, 0);
//! ```

use crate::platform::posix::Content;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What to do when memory is addressed by a symbolic value.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolicAddressPolicy {
    /// Fail with `Error::SymbolicAddressUnsupported`.
    Reject,
    /// Ask the state's solver for a satisfying value, and record the choice
    /// as a path constraint.
    Concretize,
}

impl Default for SymbolicAddressPolicy {
    fn default() -> SymbolicAddressPolicy {
        SymbolicAddressPolicy::Reject
    }
}

/// Placeholders used by `scanf` until format strings are parsed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ScanfOptions {
    /// The file descriptor input is read from.
    pub fd: u64,
    /// The number of bytes every call reads.
    pub length: usize,
}

impl Default for ScanfOptions {
    fn default() -> ScanfOptions {
        ScanfOptions { fd: 0, length: 17 }
    }
}

/// The largest count `read` accepts by default.
pub const DEFAULT_MAX_READ_LENGTH: usize = 0x10_0000;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub symbolic_addresses: SymbolicAddressPolicy,
    pub scanf: ScanfOptions,
    /// The content backing file descriptor 0 in new states.
    pub stdin: Content,
    /// The largest number of bytes a single `read` may ask for. Every byte
    /// read from symbolic input becomes a fresh scalar.
    pub max_read_length: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            symbolic_addresses: SymbolicAddressPolicy::default(),
            scanf: ScanfOptions::default(),
            stdin: Content::default(),
            max_read_length: DEFAULT_MAX_READ_LENGTH,
        }
    }
}

impl Config {
    /// Create a new `Config` with the default settings.
    pub fn new() -> Config {
        Config::default()
    }

    /// Parse a `Config` from json. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Config, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a json `Config` from a file.
    pub fn from_file(filename: &Path) -> Result<Config, Error> {
        let json = fs::read_to_string(filename)?;
        Config::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Create your config with the builder pattern.
#[derive(Clone, Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> ConfigBuilder {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    pub fn symbolic_addresses(mut self, policy: SymbolicAddressPolicy) -> ConfigBuilder {
        self.config.symbolic_addresses = policy;
        self
    }

    pub fn scanf_fd(mut self, fd: u64) -> ConfigBuilder {
        self.config.scanf.fd = fd;
        self
    }

    pub fn scanf_length(mut self, length: usize) -> ConfigBuilder {
        self.config.scanf.length = length;
        self
    }

    pub fn stdin(mut self, stdin: Content) -> ConfigBuilder {
        self.config.stdin = stdin;
        self
    }

    pub fn max_read_length(mut self, max_read_length: usize) -> ConfigBuilder {
        self.config.max_read_length = max_read_length;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scanf.length, 17);
        assert_eq!(config.stdin, Content::Symbolic);
        assert_eq!(config.symbolic_addresses, SymbolicAddressPolicy::Reject);
        assert_eq!(config.max_read_length, DEFAULT_MAX_READ_LENGTH);
    }

    #[test]
    fn concrete_stdin() {
        let config = Config::from_json(r#"{ "stdin": { "concrete": [65, 66] } }"#).unwrap();
        assert_eq!(config.stdin, Content::Concrete(vec![0x41, 0x42]));
    }

    #[test]
    fn builder_round_trips_through_json() {
        let config = ConfigBuilder::new()
            .symbolic_addresses(SymbolicAddressPolicy::Concretize)
            .scanf_fd(3)
            .scanf_length(4)
            .max_read_length(64)
            .build();
        let json = config.to_json().unwrap();
        assert_eq!(Config::from_json(&json).unwrap(), config);
    }

    #[test]
    fn bad_json() {
        assert!(matches!(
            Config::from_json(r#"{ "symbolic_addresses": "guess" }"#),
            Err(Error::Json(_))
        ));
    }
}
