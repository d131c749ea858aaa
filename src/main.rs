use anyhow::{Context, Result};
use argh::FromArgs;
use linecmd::config::DEFAULT_PROMPT;
use linecmd::io_adapters::{BufLines, EditorLines, LineReader};
use linecmd::typed::{Typed, TypedCommand};
use linecmd::{
    Allocator, Command, Config, ExitCode, Interpreter, SystemAllocator, TrackingAllocator,
};
use std::fs::File;
use std::io::{BufReader, IsTerminal, Write};
use std::path::PathBuf;
use std::rc::Rc;

#[derive(FromArgs)]
/// Interactive command interpreter with a couple of demo commands.
struct Options {
    #[argh(option, default = "String::from(DEFAULT_PROMPT)")]
    /// text printed before each line is read.
    prompt: String,

    #[argh(option)]
    /// read commands from this file instead of the terminal.
    script: Option<PathBuf>,

    #[argh(switch)]
    /// read plain lines from standard input, without line editing.
    plain: bool,

    #[argh(switch, short = 'q')]
    /// do not print the startup banner.
    quiet: bool,

    #[argh(switch)]
    /// do not keep entered lines for recall.
    no_history: bool,

    #[argh(option)]
    /// maximum number of bytes the interpreter may hold for commands and arguments.
    memory_limit: Option<usize>,

    #[argh(switch, short = 'v')]
    /// print debug logs to standard error.
    verbose: bool,
}

#[derive(FromArgs)]
/// Greet someone.
struct Hello {
    #[argh(positional)]
    /// who to greet.
    name: String,
}

impl TypedCommand for Hello {
    fn name() -> &'static str {
        "hello"
    }

    fn description() -> Option<&'static str> {
        Some("prints greetings")
    }

    fn execute(self, stdout: &mut dyn Write) -> Result<ExitCode> {
        writeln!(stdout, "Hello There!\nGeneral {}", self.name)?;
        Ok(0)
    }
}

/// `sum a b`: plain handler so negative operands like `-1` are not taken for flags.
fn sum(args: &[&str]) -> ExitCode {
    match sum_operands(args) {
        Ok(total) => {
            println!("result is {}", total);
            0
        }
        Err(e) => {
            println!("sum: {:#}", e);
            -1
        }
    }
}

fn sum_operands(args: &[&str]) -> Result<f64> {
    let &[a, b] = args else {
        anyhow::bail!("expected 2 args, got {}", args.len());
    };
    let parse = |s: &str| {
        s.parse::<f64>()
            .with_context(|| format!("{:?} is not a number", s))
    };
    Ok(parse(a)? + parse(b)?)
}

/// Minimal `log` backend writing every record to standard error.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn open_reader(options: &Options) -> Result<Box<dyn LineReader>> {
    if let Some(path) = &options.script {
        let file = File::open(path)
            .with_context(|| format!("can't open script {}", path.display()))?;
        return Ok(Box::new(BufLines::new(BufReader::new(file))));
    }
    if options.plain || !std::io::stdin().is_terminal() {
        return Ok(Box::new(BufLines::stdin()));
    }
    let editor = EditorLines::new(!options.no_history).context("can't start line editor")?;
    Ok(Box::new(editor))
}

fn main() -> Result<()> {
    let options: Options = argh::from_env();

    if options.verbose {
        log::set_logger(&LOGGER).context("logger already installed")?;
        log::set_max_level(log::LevelFilter::Debug);
    }

    let allocator: Rc<dyn Allocator> = match options.memory_limit {
        Some(limit) => Rc::new(TrackingAllocator::with_limit(limit)),
        None => Rc::new(SystemAllocator::new()),
    };
    let config = Config {
        prompt: options.prompt.clone(),
        banner: if options.quiet || options.script.is_some() {
            None
        } else {
            Some(linecmd::config::DEFAULT_BANNER.to_string())
        },
    };

    let mut interp = Interpreter::with_config(allocator, config);
    interp
        .register([
            Typed::<Hello>::new().into_command(),
            Command::new("sum", sum).with_description("the sum of two numbers"),
        ])
        .context("can't register commands")?;

    let mut input = open_reader(&options)?;
    let termination = interp.run_with(
        input.as_mut(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )?;
    log::debug!("terminated by {:?}", termination);

    if !options.quiet && options.script.is_none() {
        println!("\nbye");
    }
    Ok(())
}
