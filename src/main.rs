//! wtread - interactive host for the console line-input engine
//!
//! Reads lines (or raw characters) from the terminal through a
//! [`ConsoleSession`], the same way a console client would.
//!
//! # Quick Start
//!
//! ```text
//! wtread                          # Cooked line reads as cmd.exe
//! wtread --alias "ll=dir /w $*"   # Define an alias first
//! wtread --raw                    # Raw character reads
//! ```
//!
//! # Keys (line mode)
//!
//! | Key | Action |
//! |-----|--------|
//! | Up/Down, F5 | Walk history |
//! | F7 | Command list popup |
//! | F9 | Command number prompt |
//! | F8 | Search history by prefix |
//! | Alt+F7 | Clear history |
//! | Ctrl+C | Cancel the line |
//!
//! Type `exit` to quit (Ctrl+D in raw mode).

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wtread::text::eq_ignore_case;
use wtread::ui::{KeyMapper, TerminalEcho};
use wtread::{
    CodePage, CompletedRead, Config, ConsoleError, ConsoleSession, InputMode, ReadData,
    ReadEncoding, ReadHandle, ReadOutput, ReadStatus, WaitReason,
};

/// Caller buffer size for every read
const READ_CAPACITY: usize = 512;

const PROMPT: &str = "wtread> ";

/// Command line options
struct Args {
    /// Application name the reads run as
    exe: String,
    /// Raw character reads instead of cooked lines
    raw: bool,
    /// Narrow reads in Latin-1
    latin1: bool,
    aliases: Vec<(String, String)>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            exe: "cmd.exe".to_string(),
            raw: false,
            latin1: false,
            aliases: Vec::new(),
        }
    }
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("wtread {}", VERSION);
}

fn print_help() {
    eprintln!("wtread {} - console line-input engine", VERSION);
    eprintln!();
    eprintln!("Usage: wtread [OPTIONS]");
    eprintln!();
    eprintln!("Read options:");
    eprintln!("  (default)             Cooked line reads with echo");
    eprintln!("  --raw                 Raw character reads");
    eprintln!("  --exe <NAME>          Application name for history and aliases (cmd.exe)");
    eprintln!("  --alias <SRC=TGT>     Define an alias before reading");
    eprintln!();
    eprintln!("Encoding options:");
    eprintln!("  (default)             Wide reads");
    eprintln!("  --latin1              Narrow reads in Latin-1 (CP28591)");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Line editing keys:");
    eprintln!("  Left/Right, Ctrl+Left/Right   Move by character or word");
    eprintln!("  Home/End, Ctrl+Home/End       Move to or erase to line start/end");
    eprintln!("  Insert                        Toggle insert/overwrite");
    eprintln!("  Esc                           Clear the line");
    eprintln!("  Up/Down, PgUp/PgDn, F5        History");
    eprintln!("  F1, F3                        Copy from the previous command");
    eprintln!("  F2, F4                        Copy-to / delete-to character prompts");
    eprintln!("  F6                            Insert ^Z");
    eprintln!("  F7, F9                        Command list / command number popups");
    eprintln!("  F8                            Prefix search in history");
    eprintln!("  Alt+F7                        Clear history");
    eprintln!("  Alt+F10                       Clear aliases");
    eprintln!();
    eprintln!("Type 'exit' to quit. In raw mode press Ctrl+D.");
    eprintln!();
    eprintln!("Configuration: ~/.wtread/config.toml");
    eprintln!("Log file: ~/.wtread/wtread.log (RUST_LOG overrides log_level)");
}

/// Parse command line arguments
fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--raw" => {
                parsed.raw = true;
            }
            "--latin1" => {
                parsed.latin1 = true;
            }
            "--exe" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing application name".to_string());
                }
                parsed.exe = args[i].clone();
            }
            "--alias" => {
                i += 1;
                let definition = args.get(i).ok_or("Missing alias definition")?;
                let (source, target) = definition
                    .split_once('=')
                    .ok_or_else(|| format!("Alias must look like SRC=TGT: {}", definition))?;
                parsed.aliases.push((source.to_string(), target.to_string()));
            }
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to ~/.wtread/wtread.log
fn init_logging(config: &Config) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("wtread.log"))
        .unwrap_or_else(|| PathBuf::from("wtread.log"));

    // Open log file (append mode)
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let mut config = Config::load();
    if args.latin1 {
        config.codepage = Some(CodePage::Latin1.id());
    }
    init_logging(&config);
    info!("wtread {} starting as {}", VERSION, args.exe);

    terminal::enable_raw_mode()?;
    let result = TerminalEcho::new()
        .map_err(anyhow::Error::from)
        .and_then(|echo| {
            let session = ConsoleSession::new(&config, Box::new(echo.clone()));
            run(&session, &echo, &args)
        });
    let _ = terminal::disable_raw_mode();
    println!();

    if let Err(e) = &result {
        error!("wtread failed: {:#}", e);
    }
    info!("wtread exiting");
    result
}

/// What the host does after a completed read
enum Outcome {
    Continue,
    Quit,
}

fn run(session: &ConsoleSession, echo: &TerminalEcho, args: &Args) -> anyhow::Result<()> {
    let client = session.connect_client(&args.exe);
    let input = session.open_input_handle(client)?;
    for (source, target) in &args.aliases {
        session.define_alias(&args.exe, source, target)?;
    }

    let mode = if args.raw {
        InputMode::PROCESSED
    } else {
        InputMode::PROCESSED | InputMode::LINE | InputMode::ECHO
    };
    let encoding = if args.latin1 {
        ReadEncoding::Narrow(session.code_page())
    } else {
        ReadEncoding::Wide
    };

    loop {
        if !args.raw {
            echo.print(PROMPT)?;
        }
        let result = match session.begin_read(client, input, mode, READ_CAPACITY, encoding)? {
            ReadStatus::Complete(output) => Ok(output),
            ReadStatus::Parked(handle) => wait_for(session, echo, handle, args.raw)?,
        };

        let outcome = match result {
            Ok(output) if args.raw => show_chars(session, echo, &output)?,
            Ok(output) => show_line(session, echo, &output)?,
            Err(ConsoleError::Cancelled(reason)) => {
                info!("Read cancelled: {}", reason);
                echo.print("^C\r\n")?;
                Outcome::Continue
            }
            Err(e) => return Err(e.into()),
        };
        if let Outcome::Quit = outcome {
            break;
        }
    }

    session.disconnect_client(client);
    Ok(())
}

/// Feed terminal events to the session until `handle` completes
fn wait_for(
    session: &ConsoleSession,
    echo: &TerminalEcho,
    handle: ReadHandle,
    raw: bool,
) -> anyhow::Result<wtread::Result<ReadOutput>> {
    loop {
        let completed: Vec<CompletedRead> = match event::read()? {
            Event::Key(key_event) => {
                let ctrl_c = key_event.kind == KeyEventKind::Press
                    && key_event.code == KeyCode::Char('c')
                    && key_event.modifiers.contains(KeyModifiers::CONTROL);
                if ctrl_c && !raw {
                    session.signal(WaitReason::CtrlC)
                } else {
                    match KeyMapper::map(&key_event) {
                        Some(key) => session.write_input([key]),
                        None => Vec::new(),
                    }
                }
            }
            Event::Resize(cols, rows) => {
                info!("Terminal resized to {}x{}", cols, rows);
                echo.resize(cols, rows);
                Vec::new()
            }
            _ => Vec::new(),
        };

        for done in completed {
            if done.handle == handle {
                return Ok(done.result);
            }
            warn!("Completion for unknown read {}", done.handle);
        }
    }
}

fn decode(data: &ReadData, code_page: CodePage) -> String {
    match data {
        ReadData::Wide(text) => text.clone(),
        ReadData::Narrow(bytes) => code_page.decode(&mut Vec::new(), bytes),
    }
}

fn show_line(session: &ConsoleSession, echo: &TerminalEcho, output: &ReadOutput) -> anyhow::Result<Outcome> {
    let text = decode(&output.data, session.code_page());
    let line = text.trim_end_matches(['\r', '\n']);
    info!("Line read: {:?}", line);

    if eq_ignore_case(line.trim(), "exit") {
        return Ok(Outcome::Quit);
    }
    if !line.is_empty() {
        echo.print(&format!("=> {}\r\n", line))?;
    }
    Ok(Outcome::Continue)
}

fn show_chars(session: &ConsoleSession, echo: &TerminalEcho, output: &ReadOutput) -> anyhow::Result<Outcome> {
    let text = decode(&output.data, session.code_page());
    if text.contains('\x04') {
        return Ok(Outcome::Quit);
    }
    let shown: String = text.chars().flat_map(char::escape_debug).collect();
    echo.print(&format!("[{}]", shown))?;
    Ok(Outcome::Continue)
}
