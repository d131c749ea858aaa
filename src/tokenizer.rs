//! Whitespace tokenizer turning one input line into a command name and its arguments.
//!
//! There is no quoting or escaping: a token is any maximal run of characters that are
//! not in [`DELIMITERS`]. Tokens are slices of the line, so the line is left intact and
//! must outlive the [`ParsedCommand`] built from it.

use crate::allocator::Allocator;
use crate::error::Error;
use crate::storage::Storage;
use std::rc::Rc;

/// Characters separating tokens. Tabs are ordinary token characters.
pub const DELIMITERS: [char; 2] = [' ', '\n'];

/// Capacity of the argument array before the first doubling.
pub const INITIAL_ARGS_CAPACITY: usize = 16;

/// A command line split into its name and positional arguments.
pub struct ParsedCommand<'line> {
    name: &'line str,
    args: Storage<&'line str>,
}

impl<'line> ParsedCommand<'line> {
    /// The first token of the line.
    pub fn name(&self) -> &'line str {
        self.name
    }

    /// Tokens after the name, in order.
    pub fn args(&self) -> &[&'line str] {
        &self.args
    }

    pub fn argc(&self) -> usize {
        self.args.len()
    }

    /// Capacity currently reserved for arguments; equals `argc` once tokenizing is done.
    pub fn capacity(&self) -> usize {
        self.args.capacity()
    }
}

impl std::fmt::Debug for ParsedCommand<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedCommand")
            .field("name", &self.name)
            .field("args", &&self.args[..])
            .finish()
    }
}

/// Split `line` into a [`ParsedCommand`].
///
/// Argument storage is taken from `allocator`: it starts at [`INITIAL_ARGS_CAPACITY`],
/// doubles whenever it is full and is shrunk to the exact argument count at the end.
/// A command without arguments ends up with an empty array holding no block.
///
/// # Errors
///
/// * [`Error::EmptyLine`] if the line contains no token.
/// * [`Error::Allocation`] if the allocator refuses any of the requests above. Whatever
///   was granted before the failure is released.
pub fn tokenize<'line>(
    line: &'line str,
    allocator: &Rc<dyn Allocator>,
) -> Result<ParsedCommand<'line>, Error> {
    let mut tokens = line.split(&DELIMITERS[..]).filter(|t| !t.is_empty());
    let name = tokens.next().ok_or(Error::EmptyLine)?;

    let mut args = Storage::with_capacity(allocator.clone(), INITIAL_ARGS_CAPACITY)?;
    for token in tokens {
        args.push(token)?;
    }
    args.shrink_to_fit()?;

    log::trace!("tokenized {:?} with {} argument(s)", name, args.len());
    Ok(ParsedCommand { name, args })
}
