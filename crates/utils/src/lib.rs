//! Shared helpers for running version-control executables: locating them on
//! `PATH` and turning their raw output bytes into text.

pub mod shell;
pub mod text;
