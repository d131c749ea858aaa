//! A small, embeddable line-oriented command interpreter.
//!
//! The host registers a table of named commands, each a [`Handler`] taking positional
//! string arguments, and hands the [`Interpreter`] a line source. Every line is split on
//! spaces and newlines; the first token selects the command and the remaining tokens are
//! passed to it. Two directives are built in: `info` lists the registered commands and
//! `exit` ends the session.
//!
//! All storage the interpreter owns (the command table and each line's argument array)
//! is obtained through one injected [`Allocator`], so a host can cap or audit it with
//! [`TrackingAllocator`].
//!
//! Commands can be plain closures or argument structs deriving `argh::FromArgs`; see
//! [`typed::TypedCommand`].

pub mod allocator;
pub mod command;
pub mod config;
mod error;
mod interpreter;
pub mod io_adapters;
mod storage;
pub mod table;
pub mod tokenizer;
pub mod typed;

pub use allocator::{AllocError, Allocator, SystemAllocator, TrackingAllocator};
pub use command::{Command, ExitCode, Handler};
pub use config::Config;
pub use error::Error;
pub use table::CommandTable;
/// Just a convenient re-export of the session types.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Directive, Interpreter, ShutdownHandle, Termination};
