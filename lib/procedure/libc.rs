//! Procedures for libc functions.

use crate::config::{ScanfOptions, DEFAULT_MAX_READ_LENGTH};
use crate::memory::Value;
use crate::procedure::{ArgumentKind, Call, Outcome, Procedure};
use crate::Error;
use log::trace;

/// `int scanf(const char *format, ...)`
///
/// The format string is not parsed. Every call reads a fixed number of bytes
/// from a fixed file descriptor and stores them, unmodified, at the first
/// pointer after the format string. The destination pointer is returned.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Scanf {
    fd: u64,
    length: usize,
}

impl Scanf {
    pub fn new(options: &ScanfOptions) -> Scanf {
        Scanf {
            fd: options.fd,
            length: options.length,
        }
    }
}

impl Default for Scanf {
    fn default() -> Scanf {
        Scanf::new(&ScanfOptions::default())
    }
}

impl Procedure for Scanf {
    fn signature(&self) -> Vec<ArgumentKind> {
        vec![ArgumentKind::FormatString, ArgumentKind::Pointer]
    }

    fn invoke(&self, call: &mut Call) -> Result<Outcome, Error> {
        trace!(
            "{} ignores its format string, reading {} bytes from fd {}",
            call.symbol(),
            self.length,
            self.fd
        );
        let destination = call.argument(1)?;
        let bytes = call.state_mut().posix_mut()?.read(self.fd, self.length)?;
        call.state_mut().write_memory(&destination, &bytes)?;
        Ok(Outcome::Return(destination))
    }
}

/// `ssize_t read(int fd, void *buf, size_t count)`
///
/// Always reads exactly `count` bytes. A count above `max_length` fails with
/// `Error::ArgumentResolutionFailure` before anything is read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Read {
    max_length: usize,
}

impl Read {
    pub fn new(max_length: usize) -> Read {
        Read { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn length(&self, count: u64) -> Result<usize, Error> {
        usize::try_from(count)
            .ok()
            .filter(|length| *length <= self.max_length)
            .ok_or_else(|| Error::ArgumentResolutionFailure {
                index: 2,
                reason: format!(
                    "count {} is larger than the limit of {} bytes",
                    count, self.max_length
                ),
            })
    }
}

impl Default for Read {
    fn default() -> Read {
        Read::new(DEFAULT_MAX_READ_LENGTH)
    }
}

impl Procedure for Read {
    fn signature(&self) -> Vec<ArgumentKind> {
        vec![
            ArgumentKind::Integer(32),
            ArgumentKind::Pointer,
            ArgumentKind::Size,
        ]
    }

    fn invoke(&self, call: &mut Call) -> Result<Outcome, Error> {
        let fd = call.concrete_argument(0)?;
        let buffer = call.argument(1)?;
        let count = call.concrete_argument(2)?;
        let length = self.length(count)?;

        let bytes = call.state_mut().posix_mut()?.read(fd, length)?;
        call.state_mut().write_memory(&buffer, &bytes)?;

        Ok(Outcome::Return(call.word(count)))
    }
}

/// `ssize_t write(int fd, const void *buf, size_t count)`
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Write;

impl Procedure for Write {
    fn signature(&self) -> Vec<ArgumentKind> {
        vec![
            ArgumentKind::Integer(32),
            ArgumentKind::Pointer,
            ArgumentKind::Size,
        ]
    }

    fn invoke(&self, call: &mut Call) -> Result<Outcome, Error> {
        let fd = call.concrete_argument(0)?;
        let buffer = call.argument(1)?;
        let count = call.argument(2)?;

        let bytes = call.state_mut().read_memory(&buffer, &count)?;
        let written = call.state_mut().posix_mut()?.write(fd, &bytes)?;

        Ok(Outcome::Return(call.word(written as u64)))
    }
}

/// `void exit(int status)`, also bound as `_exit`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Exit;

impl Procedure for Exit {
    fn signature(&self) -> Vec<ArgumentKind> {
        vec![ArgumentKind::Integer(32)]
    }

    fn invoke(&self, call: &mut Call) -> Result<Outcome, Error> {
        let status: Value = call.argument(0)?;
        trace!("{}({})", call.symbol(), status);
        Ok(Outcome::Exit(status))
    }
}
