//! A model of posix process I/O.
//!
//! File descriptors are backed either by concrete bytes, or by unconstrained
//! external input. Reads never block and are never short: a read of `n`
//! bytes always produces `n` bytes, with bytes that can not be known turned
//! into fresh 8-bit scalars. Every scalar created this way is remembered, so
//! the engine can constrain or solve for program input later.

use crate::il;
use crate::memory::Value;
use crate::state::Plugin;
use crate::Error;
use crate::RC;
use log::trace;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;

/// The name the posix model is registered under in a `State`.
pub const PLUGIN_NAME: &str = "posix";

/// The width of a file position.
const POSITION_BITS: usize = 64;

/// The number of entries in each shared chunk of a `History`.
pub const HISTORY_CHUNK_SIZE: usize = 1024;

/// An append-only sequence, stored in copy-on-write chunks.
///
/// Cloning a `History` copies one pointer per chunk. The first append after a
/// clone copies at most the last chunk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct History<T> {
    chunks: Vec<RC<Vec<T>>>,
    len: usize,
}

impl<T: Clone> History<T> {
    pub fn new() -> History<T> {
        History {
            chunks: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    pub fn push(&mut self, entry: T) {
        match self.chunks.last_mut() {
            Some(chunk) if chunk.len() < HISTORY_CHUNK_SIZE => RC::make_mut(chunk).push(entry),
            _ => self.chunks.push(RC::new(vec![entry])),
        }
        self.len += 1;
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T: Clone> Default for History<T> {
    fn default() -> History<T> {
        History::new()
    }
}

impl<T: Clone> Extend<T> for History<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, entries: I) {
        for entry in entries {
            self.push(entry);
        }
    }
}

/// What backs a file descriptor.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    /// Unconstrained input. Every byte read is a fresh scalar.
    Symbolic,
    /// Known bytes. Reads past the end produce fresh scalars.
    Concrete(Vec<u8>),
}

impl Default for Content {
    fn default() -> Content {
        Content::Symbolic
    }
}

/// An open file descriptor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileDescriptor {
    fd: u64,
    filename: String,
    position: Value,
    content: Content,
    written: History<Value>,
}

impl FileDescriptor {
    fn new(fd: u64, filename: String, content: Content) -> FileDescriptor {
        FileDescriptor {
            fd,
            filename,
            position: Value::concrete(0, POSITION_BITS),
            content,
            written: History::new(),
        }
    }

    pub fn fd(&self) -> u64 {
        self.fd
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The current read/write position. May be symbolic.
    pub fn position(&self) -> &Value {
        &self.position
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Every byte written to this descriptor, in order.
    pub fn written(&self) -> &History<Value> {
        &self.written
    }

    /// The concrete byte at `offset` past the current position, if it is
    /// known.
    fn concrete_byte(&self, offset: usize) -> Option<u8> {
        let buffer = match self.content {
            Content::Concrete(ref buffer) => buffer,
            Content::Symbolic => return None,
        };
        let position = self.position.value_u64()?.checked_add(offset as u64)?;
        buffer.get(usize::try_from(position).ok()?).copied()
    }
}

/// A model of posix process I/O.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Posix {
    files: BTreeMap<u64, FileDescriptor>,
    symbolic_scalars: History<il::Scalar>,
    next_scalar: u64,
}

impl Posix {
    /// Create a new `Posix` model with stdin, stdout and stderr open as file
    /// descriptors 0, 1 and 2. Stdin is fully symbolic.
    pub fn new() -> Posix {
        Posix::with_stdin(Content::Symbolic)
    }

    /// Create a new `Posix` model with stdin backed by `stdin`.
    pub fn with_stdin(stdin: Content) -> Posix {
        let mut posix = Posix {
            files: BTreeMap::new(),
            symbolic_scalars: History::new(),
            next_scalar: 0,
        };
        posix.open("stdin", stdin);
        posix.open("stdout", Content::Concrete(Vec::new()));
        posix.open("stderr", Content::Concrete(Vec::new()));
        posix
    }

    /// Open a file, returning the lowest file descriptor not in use.
    pub fn open<S: Into<String>>(&mut self, filename: S, content: Content) -> u64 {
        let mut fd = 0;
        while self.files.contains_key(&fd) {
            fd += 1;
        }
        self.files
            .insert(fd, FileDescriptor::new(fd, filename.into(), content));
        fd
    }

    pub fn close(&mut self, fd: u64) -> Result<(), Error> {
        self.files
            .remove(&fd)
            .map(|_| ())
            .ok_or(Error::BadFileDescriptor(fd))
    }

    pub fn is_open(&self, fd: u64) -> bool {
        self.files.contains_key(&fd)
    }

    pub fn file_descriptor(&self, fd: u64) -> Result<&FileDescriptor, Error> {
        self.files.get(&fd).ok_or(Error::BadFileDescriptor(fd))
    }

    pub fn file_descriptors(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.files.values()
    }

    pub fn position(&self, fd: u64) -> Result<&Value, Error> {
        Ok(self.file_descriptor(fd)?.position())
    }

    pub fn written(&self, fd: u64) -> Result<&History<Value>, Error> {
        Ok(self.file_descriptor(fd)?.written())
    }

    /// Every scalar created by reads so far, oldest first.
    pub fn symbolic_scalars(&self) -> &History<il::Scalar> {
        &self.symbolic_scalars
    }

    /// Move the position of `fd`. Positions narrower than 64 bits are
    /// zero-extended.
    pub fn seek(&mut self, fd: u64, position: Value) -> Result<(), Error> {
        if position.bits() > POSITION_BITS {
            return Err(Error::ArchitectureMismatch {
                expected: POSITION_BITS,
                found: position.bits(),
            });
        }
        let position = position.zext(POSITION_BITS)?;
        let file = self.files.get_mut(&fd).ok_or(Error::BadFileDescriptor(fd))?;
        file.position = position;
        Ok(())
    }

    /// Read exactly `length` bytes from `fd`.
    ///
    /// Bytes come from concrete content when the position is concrete and
    /// within the buffer. All other bytes are fresh scalars named
    /// `<filename>_<fd>_<n>`.
    pub fn read(&mut self, fd: u64, length: usize) -> Result<Vec<Value>, Error> {
        let file = self.files.get_mut(&fd).ok_or(Error::BadFileDescriptor(fd))?;
        let position = file
            .position
            .add(&Value::concrete(length as u64, POSITION_BITS))?;

        let mut bytes = Vec::new();
        for offset in 0..length {
            match file.concrete_byte(offset) {
                Some(byte) => bytes.push(Value::concrete(byte as u64, 8)),
                None => {
                    let scalar = il::scalar(
                        format!("{}_{}_{}", file.filename, fd, self.next_scalar),
                        8,
                    );
                    self.next_scalar += 1;
                    self.symbolic_scalars.push(scalar.clone());
                    bytes.push(Value::Symbolic(scalar.into()));
                }
            }
        }

        trace!("read {} bytes from fd {} at {}", length, fd, file.position);
        file.position = position;

        Ok(bytes)
    }

    /// Write bytes to `fd`, returning the number of bytes written. Every byte
    /// must be 8 bits wide.
    pub fn write(&mut self, fd: u64, bytes: &[Value]) -> Result<usize, Error> {
        if let Some(byte) = bytes.iter().find(|byte| byte.bits() != 8) {
            return Err(Error::ArchitectureMismatch {
                expected: 8,
                found: byte.bits(),
            });
        }
        let file = self.files.get_mut(&fd).ok_or(Error::BadFileDescriptor(fd))?;
        let position = file
            .position
            .add(&Value::concrete(bytes.len() as u64, POSITION_BITS))?;

        trace!("write {} bytes to fd {}", bytes.len(), fd);
        file.written.extend(bytes.iter().cloned());
        file.position = position;

        Ok(bytes.len())
    }
}

impl Default for Posix {
    fn default() -> Posix {
        Posix::new()
    }
}

impl Plugin for Posix {
    fn box_clone(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
