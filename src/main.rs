use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{thread_rng, Rng, RngCore, SeedableRng};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use nuts::{Host, Vm};

#[derive(Parser, Debug)]
#[command(name = "nuts")]
#[command(about = "Compile and run a Nuts program")]
struct Cli {
    /// Program file, or `-` to read it from standard input
    program: PathBuf,

    /// Maximum number of reductions (runs until halted when omitted)
    #[arg(long)]
    steps: Option<u64>,

    /// Log the program text after loading and after running
    #[arg(long)]
    dump: bool,

    /// Seed for the random built-in
    #[arg(long)]
    seed: Option<u64>,
}

/// Terminal-backed host: bytes out to stdout, characters in from stdin,
/// diagnostics to stderr.
struct StdioHost {
    stdin: io::Stdin,
    stdout: io::Stdout,
    rng: Box<dyn RngCore>,
}

impl StdioHost {
    fn new(seed: Option<u64>) -> Self {
        let rng: Box<dyn RngCore> = match seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(thread_rng()),
        };
        StdioHost {
            stdin: io::stdin(),
            stdout: io::stdout(),
            rng,
        }
    }

    /// Reads one UTF-8 character. Malformed input decodes as U+FFFD.
    fn read_char(&mut self) -> io::Result<Option<char>> {
        let mut buf = [0u8; 4];
        let mut stdin = self.stdin.lock();
        if stdin.read(&mut buf[..1])? == 0 {
            return Ok(None);
        }
        let len = match buf[0] {
            0x00..=0x7f => 1,
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            0xf0..=0xf7 => 4,
            _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
        };
        stdin.read_exact(&mut buf[1..len])?;
        Ok(Some(
            std::str::from_utf8(&buf[..len])
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        ))
    }

    fn flush(&mut self) {
        if let Err(err) = self.stdout.flush() {
            error!(%err, "failed to flush output");
        }
    }
}

impl Host for StdioHost {
    fn put_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        if let Err(err) = self.stdout.write_all(c.encode_utf8(&mut buf).as_bytes()) {
            error!(%err, "failed to write output");
        }
        if c == '\n' {
            self.flush();
        }
    }

    async fn get_char(&mut self, on_wait: impl FnOnce() -> String) -> Option<char> {
        self.flush();
        if self.stdin.is_terminal() {
            debug!(program = %on_wait(), "waiting for input");
        }
        match self.read_char() {
            Ok(c) => c,
            Err(err) => {
                error!(%err, "failed to read input");
                None
            }
        }
    }

    fn rand_byte(&mut self) -> u8 {
        self.rng.gen()
    }

    fn log(&mut self, text: &str) {
        eprintln!("{}", text);
    }

    fn error(&mut self, text: &str) {
        eprintln!("{}", text);
    }

    async fn sleep(&mut self) -> bool {
        false
    }
}

fn read_program(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut code = String::new();
        io::stdin().read_to_string(&mut code)?;
        Ok(code)
    } else {
        fs::read_to_string(path)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let code = match read_program(&cli.program) {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "failed to read {}", cli.program.display());
            return ExitCode::FAILURE;
        }
    };

    let mut vm = Vm::new(StdioHost::new(cli.seed));
    if let Err(err) = vm.load(&code, cli.dump) {
        eprintln!("{}", err.highlight(&code));
        return ExitCode::FAILURE;
    }

    let result = pollster::block_on(vm.run(cli.steps, cli.dump));
    vm.host_mut().flush();
    match result {
        Ok(()) => {
            info!(halted = vm.ended(), "run finished");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
