use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, Result as IoResult, Write};

/// What one read from a [`LineReader`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A line with its terminator (`\n` or `\r\n`) stripped.
    Line(String),
    /// The last line of the stream, which ended before a terminator was read.
    Unterminated(String),
    /// The input stream is exhausted.
    EndOfInput,
    /// The user interrupted the read (Ctrl-C in the line editor).
    Interrupted,
}

/// Source of input lines for the interpreter loop.
///
/// Reading is the loop's only blocking operation. Implementations show `prompt`
/// however suits them: plain readers write it to `stdout`, a line editor draws it itself.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str, stdout: &mut dyn Write) -> IoResult<ReadOutcome>;
}

/// Reads lines from any buffered reader: stdin, a script file or an in-memory cursor.
pub struct BufLines<R> {
    inner: R,
}

impl<R: BufRead> BufLines<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl BufLines<io::StdinLock<'static>> {
    /// Lines from the process standard input.
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> LineReader for BufLines<R> {
    fn read_line(&mut self, prompt: &str, stdout: &mut dyn Write) -> IoResult<ReadOutcome> {
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut buf = Vec::new();
        if self.inner.read_until(b'\n', &mut buf)? == 0 {
            return Ok(ReadOutcome::EndOfInput);
        }
        if buf.last() != Some(&b'\n') {
            return Ok(ReadOutcome::Unterminated(
                String::from_utf8_lossy(&buf).into_owned(),
            ));
        }
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(ReadOutcome::Line(String::from_utf8_lossy(&buf).into_owned()))
    }
}

/// Interactive reader backed by `rustyline`, with in-session history.
pub struct EditorLines {
    editor: DefaultEditor,
    history: bool,
}

impl EditorLines {
    /// Create an editor; `history` controls whether entered lines can be recalled.
    pub fn new(history: bool) -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            history,
        })
    }
}

impl LineReader for EditorLines {
    fn read_line(&mut self, prompt: &str, _stdout: &mut dyn Write) -> IoResult<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if self.history && !line.trim().is_empty() {
                    self.editor
                        .add_history_entry(line.as_str())
                        .map_err(|e| io::Error::other(e.to_string()))?;
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Eof) => Ok(ReadOutcome::EndOfInput),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(err) => Err(io::Error::other(err.to_string())),
        }
    }
}
