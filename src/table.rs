use crate::allocator::Allocator;
use crate::command::Command;
use crate::error::Error;
use crate::storage::Storage;
use std::io::Write;
use std::rc::Rc;

/// Ordered, owned set of registered commands.
///
/// Lookups scan in registration order and compare names exactly, so when two entries
/// share a name the first one wins.
pub struct CommandTable {
    entries: Storage<Command>,
}

impl CommandTable {
    /// An empty table drawing its storage from `allocator`.
    pub fn new(allocator: Rc<dyn Allocator>) -> Self {
        Self {
            entries: Storage::new(allocator),
        }
    }

    /// Replace the current entries with `commands`.
    ///
    /// The previous entries are dropped and their storage released before the new
    /// storage is requested. If that request fails the table stays empty.
    pub fn register<I>(&mut self, commands: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Command>,
        I::IntoIter: ExactSizeIterator,
    {
        self.clear();

        let commands = commands.into_iter();
        let count = commands.len();
        if count == 0 {
            return Ok(());
        }

        self.entries.reserve_exact(count).map_err(Error::Registration)?;
        for command in commands {
            // capacity was reserved above, this never grows
            self.entries.push(command).map_err(Error::Registration)?;
        }
        log::debug!("registered {} command(s)", self.entries.len());
        Ok(())
    }

    /// Drop every entry and release the table storage.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("dropping {} registered command(s)", self.entries.len());
        }
        self.entries.clear();
    }

    /// First entry named exactly `name`.
    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.entries.iter().find(|c| c.name() == name)
    }

    /// Mutable access to the first entry named exactly `name`.
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.entries.as_mut_slice().iter_mut().find(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Command::name)
    }

    /// Write the `info` listing: one entry per line, or a notice if the table is empty.
    pub fn write_listing(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if self.is_empty() {
            return writeln!(out, "no registered commands");
        }
        for command in self.iter() {
            writeln!(out, "{}", command)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a CommandTable {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
