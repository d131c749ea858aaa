use std::fmt;

/// Conventional status code returned by handlers.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// The interpreter never looks at it: reporting a failed command is the handler's job.
pub type ExitCode = i32;

/// Anything the interpreter can invoke for a registered command.
///
/// Implemented for every `FnMut(&[&str]) -> ExitCode` closure, and for typed
/// commands through [`crate::typed::Typed`].
pub trait Handler {
    /// Run the command with its positional arguments (the command name excluded).
    ///
    /// `args` borrows the input line and is only valid for the duration of the call.
    fn invoke(&mut self, args: &[&str]) -> ExitCode;
}

impl<F> Handler for F
where
    F: FnMut(&[&str]) -> ExitCode,
{
    fn invoke(&mut self, args: &[&str]) -> ExitCode {
        self(args)
    }
}

/// A named entry of the command table.
pub struct Command {
    name: String,
    description: Option<String>,
    handler: Box<dyn Handler>,
}

impl Command {
    /// Create a command without description.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or contains a delimiter, since such a name could
    /// never be produced by the tokenizer.
    pub fn new(name: impl Into<String>, handler: impl Handler + 'static) -> Self {
        let name = name.into();
        assert!(
            !name.is_empty() && !name.contains(&crate::tokenizer::DELIMITERS[..]),
            "invalid command name {:?}",
            name
        );
        Self {
            name,
            description: None,
            handler: Box::new(handler),
        }
    }

    /// Attach a one-line description shown by the `info` directive.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Invoke the handler with `args`.
    pub fn invoke(&mut self, args: &[&str]) -> ExitCode {
        self.handler.invoke(args)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Listing line used by `info`: the name alone or `name<TAB>description`.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{}\t{}", self.name, desc),
            None => write!(f, "{}", self.name),
        }
    }
}
