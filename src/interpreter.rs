use crate::allocator::{Allocator, SystemAllocator};
use crate::command::{Command, ExitCode};
use crate::config::Config;
use crate::error::Error;
use crate::io_adapters::{BufLines, LineReader, ReadOutcome};
use crate::table::CommandTable;
use crate::tokenizer;
use anyhow::Context;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reserved input lines handled by the loop itself, before tokenizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `exit`: end the session.
    Exit,
    /// `info`: list the registered commands.
    Info,
}

impl Directive {
    /// Match a whole line (terminator already stripped) against the directives.
    ///
    /// The comparison is exact: `" exit"` or `"exit now"` are ordinary command lines.
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            "exit" => Some(Directive::Exit),
            "info" => Some(Directive::Info),
            _ => None,
        }
    }
}

/// Why a session loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The `exit` directive was read.
    Exit,
    /// The input stream ended.
    EndOfInput,
    /// The line reader was interrupted by the user.
    Interrupted,
    /// A [`ShutdownHandle`] requested termination.
    Shutdown,
}

/// Thread-safe flag asking a running session to stop.
///
/// The loop checks it before each read, so a request made while the loop is blocked
/// on input takes effect once that read returns.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A line-oriented command interpreter.
///
/// The interpreter owns a [`CommandTable`] filled by [`Interpreter::register`] and an
/// allocator handle every table and argument array is drawn from. [`Interpreter::run`]
/// reads lines, intercepts the `exit` and `info` directives, and dispatches everything
/// else to the first command whose name matches the line's first token.
///
/// Example
/// ```
/// use linecmd::{Command, Interpreter};
/// let mut interp = Interpreter::default();
/// interp
///     .register([Command::new("count", |args: &[&str]| args.len() as i32)])
///     .unwrap();
/// assert_eq!(interp.execute_line("count 2 3").unwrap(), 2);
/// ```
pub struct Interpreter {
    config: Config,
    allocator: Rc<dyn Allocator>,
    table: CommandTable,
    shutdown: ShutdownHandle,
}

impl Interpreter {
    /// Create an interpreter with no commands, drawing all storage from `allocator`.
    pub fn new(allocator: Rc<dyn Allocator>) -> Self {
        Self::with_config(allocator, Config::default())
    }

    pub fn with_config(allocator: Rc<dyn Allocator>, config: Config) -> Self {
        Self {
            config,
            table: CommandTable::new(allocator.clone()),
            allocator,
            shutdown: ShutdownHandle::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Replace the registered commands with `commands`, in order.
    ///
    /// On failure the interpreter is left with no commands at all.
    pub fn register<I>(&mut self, commands: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Command>,
        I::IntoIter: ExactSizeIterator,
    {
        self.table.register(commands)
    }

    /// Drop all registered commands and release their storage.
    ///
    /// Dropping the interpreter does the same.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn commands(&self) -> &CommandTable {
        &self.table
    }

    /// Handle that stops [`Interpreter::run`] at the start of its next iteration.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Invoke the command `name` with `args`.
    ///
    /// Returns the handler's status, which is passed through uninterpreted.
    pub fn call(&mut self, name: &str, args: &[&str]) -> Result<ExitCode, Error> {
        match self.table.lookup_mut(name) {
            Some(command) => {
                log::debug!("dispatching {:?} with {} argument(s)", name, args.len());
                Ok(command.invoke(args))
            }
            None => Err(Error::UnknownCommand(name.to_string())),
        }
    }

    /// Tokenize `line` and invoke the command it names.
    ///
    /// Directives are not recognised here; this is the dispatch step of the loop only.
    pub fn execute_line(&mut self, line: &str) -> Result<ExitCode, Error> {
        let parsed = tokenizer::tokenize(line, &self.allocator)?;
        self.call(parsed.name(), parsed.args())
    }

    /// Run a session on the process standard streams.
    pub fn run(&mut self) -> anyhow::Result<Termination> {
        let mut input = BufLines::stdin();
        self.run_with(&mut input, &mut std::io::stdout(), &mut std::io::stderr())
    }

    /// Run a session reading from `input`.
    ///
    /// Listings go to `stdout`, `[warn]` diagnostics for unparsable lines and unknown
    /// commands go to `stderr`; neither ends the session. Only I/O failures are returned
    /// as errors.
    pub fn run_with(
        &mut self,
        input: &mut dyn LineReader,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> anyhow::Result<Termination> {
        if let Some(banner) = &self.config.banner {
            stdout
                .write_all(banner.as_bytes())
                .context("failed to write banner")?;
        }

        let termination = loop {
            if self.shutdown.is_requested() {
                break Termination::Shutdown;
            }

            // directives must be terminated lines; a dangling last line is always a command
            let (line, directive) = match input
                .read_line(&self.config.prompt, stdout)
                .context("failed to read input line")?
            {
                ReadOutcome::Line(line) => {
                    let directive = Directive::parse(&line);
                    (line, directive)
                }
                ReadOutcome::Unterminated(line) => (line, None),
                ReadOutcome::EndOfInput => break Termination::EndOfInput,
                ReadOutcome::Interrupted => break Termination::Interrupted,
            };

            match directive {
                Some(Directive::Exit) => break Termination::Exit,
                Some(Directive::Info) => {
                    self.table
                        .write_listing(stdout)
                        .context("failed to write command listing")?;
                    continue;
                }
                None => {}
            }

            match self.execute_line(&line) {
                Ok(status) => log::debug!("command returned {}", status),
                Err(Error::UnknownCommand(name)) => {
                    writeln!(stderr, "[warn] unknown command: {}", name)?;
                }
                Err(e) => {
                    writeln!(stderr, "[warn] failed to parse command: {}", e)?;
                }
            }
        };

        stdout.flush()?;
        log::debug!("session ended: {:?}", termination);
        Ok(termination)
    }
}

impl Default for Interpreter {
    /// Interpreter on the [`SystemAllocator`] with default settings and no commands.
    fn default() -> Self {
        Self::new(Rc::new(SystemAllocator::new()))
    }
}

#[cfg(test)]
mod session_tests {
    use super::*;
    use crate::allocator::TrackingAllocator;
    use std::cell::RefCell;
    use std::io::Cursor;

    type Calls = Rc<RefCell<Vec<(String, Vec<String>)>>>;

    fn recorder(name: &'static str, calls: &Calls, status: ExitCode) -> Command {
        let calls = calls.clone();
        Command::new(name, move |args: &[&str]| {
            calls
                .borrow_mut()
                .push((name.to_string(), args.iter().map(|a| a.to_string()).collect()));
            status
        })
    }

    fn hello_sum(allocator: Rc<dyn Allocator>, calls: &Calls) -> Interpreter {
        let mut interp = Interpreter::with_config(allocator, Config::quiet());
        interp
            .register([recorder("hello", calls, 0), recorder("sum", calls, 0)])
            .unwrap();
        interp
    }

    struct Session {
        termination: Termination,
        stdout: String,
        stderr: String,
    }

    fn session(interp: &mut Interpreter, input: &str) -> Session {
        let mut reader = BufLines::new(Cursor::new(input.to_string()));
        let mut out = Vec::new();
        let mut err = Vec::new();
        let termination = interp.run_with(&mut reader, &mut out, &mut err).unwrap();
        Session {
            termination,
            stdout: String::from_utf8(out).unwrap(),
            stderr: String::from_utf8(err).unwrap(),
        }
    }

    #[test]
    fn test_dispatches_sum_with_args() {
        let calls = Calls::default();
        let mut interp = hello_sum(Rc::new(SystemAllocator::new()), &calls);

        let s = session(&mut interp, "sum 2 3\nexit\n");
        assert_eq!(s.termination, Termination::Exit);
        assert_eq!(
            *calls.borrow(),
            [("sum".to_string(), vec!["2".to_string(), "3".to_string()])]
        );
        assert_eq!(s.stderr, "");
    }

    #[test]
    fn test_info_lists_in_order() {
        let calls = Calls::default();
        let mut interp = hello_sum(Rc::new(SystemAllocator::new()), &calls);

        let s = session(&mut interp, "info\nexit\n");
        assert_eq!(s.stdout, ">>> hello\nsum\n>>> ");
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_info_with_descriptions_and_empty_table() {
        let mut interp = Interpreter::with_config(Rc::new(SystemAllocator::new()), Config::quiet());
        let s = session(&mut interp, "info\n");
        assert_eq!(s.stdout, ">>> no registered commands\n>>> ");
        assert_eq!(s.termination, Termination::EndOfInput);

        interp
            .register([
                Command::new("hello", |_: &[&str]| 0).with_description("prints greetings"),
                Command::new("sum", |_: &[&str]| 0),
            ])
            .unwrap();
        let s = session(&mut interp, "info\n");
        assert_eq!(s.stdout, ">>> hello\tprints greetings\nsum\n>>> ");
    }

    #[test]
    fn test_unknown_command_warns_once_and_continues() {
        let calls = Calls::default();
        let mut interp = hello_sum(Rc::new(SystemAllocator::new()), &calls);

        let s = session(&mut interp, "bogus\nhello there\n");
        assert_eq!(s.stderr, "[warn] unknown command: bogus\n");
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(calls.borrow()[0].0, "hello");
        assert_eq!(s.termination, Termination::EndOfInput);
    }

    #[test]
    fn test_case_variant_is_unknown() {
        let calls = Calls::default();
        let mut interp = hello_sum(Rc::new(SystemAllocator::new()), &calls);

        let s = session(&mut interp, "Hello\nSUM 1 2\n");
        assert_eq!(
            s.stderr,
            "[warn] unknown command: Hello\n[warn] unknown command: SUM\n"
        );
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_empty_lines_warn_without_dispatch() {
        let calls = Calls::default();
        let mut interp = hello_sum(Rc::new(SystemAllocator::new()), &calls);

        let s = session(&mut interp, "\n   \nhello\n");
        assert_eq!(
            s.stderr,
            "[warn] failed to parse command: line contains no command\n".repeat(2)
        );
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn test_exit_stops_reading() {
        let calls = Calls::default();
        let mut interp = hello_sum(Rc::new(SystemAllocator::new()), &calls);

        let s = session(&mut interp, "exit\nhello\n");
        assert_eq!(s.termination, Termination::Exit);
        assert!(calls.borrow().is_empty());
        assert_eq!(s.stdout, ">>> ");

    }

    #[test]
    fn test_unterminated_last_line_is_not_a_directive() {
        let calls = Calls::default();
        let mut interp = hello_sum(Rc::new(SystemAllocator::new()), &calls);

        let s = session(&mut interp, "exit");
        assert_eq!(s.termination, Termination::EndOfInput);
        assert_eq!(s.stderr, "[warn] unknown command: exit\n");

        let s = session(&mut interp, "info");
        assert_eq!(s.termination, Termination::EndOfInput);
        assert_eq!(s.stdout, ">>> >>> ");
        assert_eq!(s.stderr, "[warn] unknown command: info\n");

        let s = session(&mut interp, "hello world");
        assert_eq!(s.termination, Termination::EndOfInput);
        assert_eq!(
            calls.borrow().as_slice(),
            [("hello".to_string(), vec!["world".to_string()])]
        );
    }

    #[test]
    fn test_directives_match_whole_line_only() {
        let calls = Calls::default();
        let mut interp = hello_sum(Rc::new(SystemAllocator::new()), &calls);

        let s = session(&mut interp, "exit now\n info\n");
        assert_eq!(s.termination, Termination::EndOfInput);
        assert_eq!(
            s.stderr,
            "[warn] unknown command: exit\n[warn] unknown command: info\n"
        );
    }

    #[test]
    fn test_handler_status_is_not_interpreted() {
        let calls = Calls::default();
        let mut interp = Interpreter::with_config(Rc::new(SystemAllocator::new()), Config::quiet());
        interp
            .register([recorder("fail", &calls, -1), recorder("ok", &calls, 0)])
            .unwrap();

        let s = session(&mut interp, "fail\nok\nexit\n");
        assert_eq!(s.termination, Termination::Exit);
        assert_eq!(s.stderr, "");
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(interp.call("fail", &[]), Ok(-1));
    }

    #[test]
    fn test_banner_printed_once() {
        let mut interp = Interpreter::default();
        let s = session(&mut interp, "info\nexit\n");
        assert_eq!(
            s.stdout,
            format!("{}>>> no registered commands\n>>> ", crate::config::DEFAULT_BANNER)
        );
    }

    #[test]
    fn test_custom_prompt() {
        let mut interp = Interpreter::with_config(
            Rc::new(SystemAllocator::new()),
            Config {
                prompt: "$ ".to_string(),
                banner: None,
            },
        );
        let s = session(&mut interp, "exit\n");
        assert_eq!(s.stdout, "$ ");
    }

    #[test]
    fn test_shutdown_requested_by_handler() {
        let calls = Calls::default();
        let mut interp = Interpreter::with_config(Rc::new(SystemAllocator::new()), Config::quiet());
        let handle = interp.shutdown_handle();
        interp
            .register([
                Command::new("stop", move |_: &[&str]| {
                    handle.request();
                    0
                }),
                recorder("hello", &calls, 0),
            ])
            .unwrap();

        let s = session(&mut interp, "hello\nstop\nhello\n");
        assert_eq!(s.termination, Termination::Shutdown);
        assert_eq!(calls.borrow().len(), 1);
        assert!(interp.shutdown_handle().is_requested());
    }

    #[test]
    fn test_shutdown_from_another_thread() {
        let mut interp = Interpreter::with_config(Rc::new(SystemAllocator::new()), Config::quiet());
        let handle = interp.shutdown_handle();
        std::thread::spawn(move || handle.request()).join().unwrap();

        let s = session(&mut interp, "hello\n");
        assert_eq!(s.termination, Termination::Shutdown);
        assert_eq!(s.stdout, "");
    }

    #[test]
    fn test_session_releases_every_argument_array() {
        let tracker = Rc::new(TrackingAllocator::new());
        let calls = Calls::default();
        let mut interp = hello_sum(tracker.clone(), &calls);
        assert_eq!(tracker.live_blocks(), 1);

        let many = vec!["1"; 50].join(" ");
        let input = format!("sum 2 3\nhello\nbogus a b\n\n{}\nsum {}\nexit\n", "info", many);
        session(&mut interp, &input);

        assert_eq!(calls.borrow().len(), 3);
        assert_eq!(calls.borrow()[2].1.len(), 50);
        assert_eq!(tracker.live_blocks(), 1);

        interp.clear();
        assert_eq!(tracker.live_blocks(), 0);
        drop(interp);
        assert_eq!(tracker.allocations(), tracker.releases());
    }

    #[test]
    fn test_tokenizer_allocation_failure_is_recovered() {
        let tracker = Rc::new(TrackingAllocator::new());
        let calls = Calls::default();
        let mut interp = hello_sum(tracker.clone(), &calls);

        // the table fits, no argument array does
        tracker.set_limit(Some(tracker.live_bytes()));
        let s = session(&mut interp, "sum 2 3\ninfo\nexit\n");
        assert_eq!(s.termination, Termination::Exit);
        let warning = "[warn] failed to parse command: allocation failed";
        assert!(s.stderr.starts_with(warning));
        assert_eq!(s.stderr.lines().count(), 1);
        assert_eq!(s.stdout, ">>> >>> hello\nsum\n>>> ");
        assert!(calls.borrow().is_empty());

        tracker.set_limit(None);
        assert_eq!(interp.execute_line("sum 2 3"), Ok(0));
    }

    #[test]
    fn test_failed_reregistration_leaves_no_commands() {
        let tracker = Rc::new(TrackingAllocator::new());
        let calls = Calls::default();
        let mut interp = hello_sum(tracker.clone(), &calls);

        tracker.set_limit(Some(0));
        let err = interp.register([recorder("other", &calls, 0)]).unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
        assert!(interp.commands().is_empty());
        assert_eq!(tracker.releases(), 1);
        assert_eq!(tracker.live_blocks(), 0);

        tracker.set_limit(None);
        let s = session(&mut interp, "hello\ninfo\n");
        assert_eq!(s.stderr, "[warn] unknown command: hello\n");
        assert_eq!(s.stdout, ">>> >>> no registered commands\n>>> ");
    }

    #[test]
    fn test_call_unknown() {
        let mut interp = Interpreter::default();
        assert_eq!(
            interp.call("nope", &["x"]),
            Err(Error::UnknownCommand("nope".to_string()))
        );
        assert_eq!(interp.execute_line("   "), Err(Error::EmptyLine));
    }
}
