//! kvshell Binary
//!
//! Opens a store file and runs the interactive shell on stdin/stdout.

use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use kvshell::config::MB;
use kvshell::shell::Repl;
use kvshell::{Config, Store};
use tracing_subscriber::{fmt, EnvFilter};
use zeroize::Zeroizing;

/// kvshell
#[derive(Parser, Debug)]
#[command(name = "kvshell")]
#[command(about = "Interactive shell over an embedded key-value store")]
#[command(version)]
struct Args {
    /// Path to the store file (created if missing)
    path: PathBuf,

    /// Prompt for a password, read as one line from stdin
    #[arg(short, long, conflicts_with = "key_file")]
    password: bool,

    /// Read the encryption key from a file
    #[arg(long, value_name = "FILE")]
    key_file: Option<PathBuf>,

    /// Engine cache size in MB
    #[arg(long, default_value = "50")]
    cache_mb: usize,

    /// Segment size in MB the reclaim threshold is measured against
    #[arg(long, default_value = "100")]
    segment_mb: usize,

    /// Seconds between background reclaim passes
    #[arg(long, default_value = "1500")]
    maintenance_interval_secs: u64,
}

fn main() {
    // Quiet by default so logs don't interleave with the prompt
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let stdin = io::stdin();
    let mut input = stdin.lock();

    let key = match &args.key_file {
        Some(path) => read_key_file(path).unwrap_or_else(|e| {
            eprintln!("error reading key file '{}': {}", path.display(), e);
            std::process::exit(1);
        }),
        None if args.password => read_password(&mut input).unwrap_or_else(|e| {
            eprintln!("error reading password: {}", e);
            std::process::exit(1);
        }),
        None => Zeroizing::new(Vec::new()),
    };

    let config = Config::builder()
        .path(&args.path)
        .encryption_key(key.to_vec())
        .index_cache_size(args.cache_mb * MB)
        .value_log_file_size(args.segment_mb * MB)
        .maintenance_interval(Duration::from_secs(args.maintenance_interval_secs))
        .build();

    let store = match Store::open(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error opening store: {}", e);
            std::process::exit(1);
        }
    };

    let name = store
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| store.path().display().to_string());

    let session = Repl::new(&store, &name).run(&mut input, io::stdout().lock());

    // Close before exiting either way: the worker must be joined first
    let closed = store.close();

    if let Err(e) = session {
        eprintln!("unexpected error reading input: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = closed {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// Key material from `--key-file`, without a trailing line break
fn read_key_file(path: &Path) -> io::Result<Zeroizing<Vec<u8>>> {
    let mut bytes = Zeroizing::new(fs::read(path)?);
    trim_line_end(&mut bytes);
    Ok(bytes)
}

/// One stdin line for `--password`
fn read_password(input: &mut impl BufRead) -> io::Result<Zeroizing<Vec<u8>>> {
    if io::stdin().is_terminal() {
        eprint!("Password: ");
        io::stderr().flush()?;
    }

    let mut line = Zeroizing::new(Vec::new());
    input.read_until(b'\n', &mut line)?;
    trim_line_end(&mut line);
    Ok(line)
}

fn trim_line_end(bytes: &mut Vec<u8>) {
    while matches!(bytes.last(), Some(b'\n' | b'\r')) {
        bytes.pop();
    }
}
