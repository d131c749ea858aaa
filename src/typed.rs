use crate::command::{Command, ExitCode, Handler};
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::io::Write;
use std::marker::PhantomData;

/// Command whose arguments are declared as an [`argh`] struct.
///
/// The adapter parses the positional arguments with `FromArgs` before calling
/// [`TypedCommand::execute`], so `--help` and argument errors are handled for free.
pub trait TypedCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "sum".
    fn name() -> &'static str;

    /// One-line description shown by the `info` directive.
    fn description() -> Option<&'static str> {
        None
    }

    /// Runs the command, writing its output to `stdout`.
    ///
    /// Return value should follow the usual convention: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write) -> Result<ExitCode>;
}

/// [`Handler`] that parses arguments into `T` and runs it.
///
/// Errors returned by `T::execute` are written to the output and turned into status 1.
pub struct Typed<T> {
    out: Box<dyn Write>,
    _phantom: PhantomData<T>,
}

impl<T: TypedCommand> Typed<T> {
    /// Adapter writing to the process standard output.
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    /// Adapter writing to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            out,
            _phantom: PhantomData,
        }
    }

    /// Wrap the adapter into a table entry named after `T`.
    pub fn into_command(self) -> Command
    where
        T: 'static,
    {
        let command = Command::new(T::name(), self);
        match T::description() {
            Some(desc) => command.with_description(desc),
            None => command,
        }
    }

    fn run(&mut self, args: &[&str]) -> Result<ExitCode> {
        match T::from_args(&[T::name()], args) {
            Ok(cmd) => match cmd.execute(&mut self.out) {
                Ok(code) => Ok(code),
                Err(e) => {
                    writeln!(self.out, "{}: {:#}", T::name(), e)?;
                    Ok(1)
                }
            },
            Err(EarlyExit { output, status }) => {
                self.out.write_all(output.as_bytes())?;
                Ok(if status.is_err() { 1 } else { 0 })
            }
        }
    }
}

impl<T: TypedCommand> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TypedCommand> Handler for Typed<T> {
    fn invoke(&mut self, args: &[&str]) -> ExitCode {
        let status = self.run(args).unwrap_or_else(|e| {
            log::warn!("{}: failed to write output: {}", T::name(), e);
            1
        });
        if let Err(e) = self.out.flush() {
            log::warn!("{}: failed to flush output: {}", T::name(), e);
        }
        status
    }
}
