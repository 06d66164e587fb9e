//! Models of the operating system underneath a program.

pub mod posix;
