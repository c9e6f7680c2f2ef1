use clap::{Parser, Subcommand, ValueEnum};
use mu_link::config::{Config, ConfigLoader};
use mu_link::discovery::{boards, PortScanner};
use mu_link::fs::{FileManager, FileManagerHandle, FsEvent};
use mu_link::mode::{
    Board, FlashOutcome, Hardware, MicroPythonBoard, ModeController, ScriptTab, StuduinoBit, Tab,
    View,
};
use mu_link::session::SerialSession;
use mu_link::{handshake, logging, protocol, wifi, LinkError, LinkResult};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Find, reset and exchange files with MicroPython boards over USB serial.",
    long_about = "Locates a supported board by its USB identity, talks to its REPL and moves files \
to and from it. Studuino:bit boards can also receive scripts into numbered slots."
)]
struct Args {
    /// Board family to look for.
    #[arg(short, long, value_enum, default_value_t = BoardKind::Studuinobit)]
    board: BoardKind,

    /// Configuration file (defaults to MU_LINK_CONFIG, ./mu-link.toml, then the user config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print listings as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BoardKind {
    Micropython,
    Studuinobit,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports and any board they are recognised as.
    Ports,
    /// Print the port of the first attached board.
    Find,
    /// Run Python lines at the prompt and print their output.
    Exec {
        /// Use the raw REPL instead of the friendly prompt.
        #[arg(long)]
        raw: bool,
        lines: Vec<String>,
    },
    /// Reset the board and wait for the prompt.
    Reboot,
    /// List files on the board.
    Ls,
    /// Copy a file from the board.
    Get {
        device: String,
        /// Local destination (defaults to the device file name).
        local: Option<PathBuf>,
    },
    /// Copy a file to the board.
    Put {
        local: PathBuf,
        /// Directory on the board (tree-listing boards only).
        #[arg(long)]
        dest: Option<String>,
    },
    /// Delete a file on the board.
    Rm { device: String },
    /// Store a script in a slot and reboot into it.
    Flash {
        #[arg(long)]
        slot: u8,
        file: PathBuf,
    },
    /// Run a script through the REPL and print its output.
    Run { file: PathBuf },
    /// Wi-Fi station control.
    Wifi {
        #[command(subcommand)]
        action: WifiCommand,
    },
}

#[derive(Subcommand, Debug)]
enum WifiCommand {
    Scan,
    Connect { ssid: String, password: String },
    Disconnect,
}

/// Reports to the terminal and answers prompts from the command line.
struct ConsoleView {
    slot: Option<u8>,
    tab: Option<ScriptTab>,
    repl_lines: Vec<String>,
}

impl ConsoleView {
    fn new(slot: Option<u8>, tab: Option<ScriptTab>) -> Self {
        Self {
            slot,
            tab,
            repl_lines: Vec::new(),
        }
    }
}

impl View for ConsoleView {
    fn show_message(&mut self, title: &str, detail: &str) {
        eprintln!("{}\n{}", title, detail);
    }

    fn show_status(&mut self, text: &str) {
        println!("{}", text);
    }

    fn add_repl(&mut self, port_path: &str, board: &str, _force_interrupt: bool) {
        debug!("REPL for {} on {}", board, port_path);
    }

    fn remove_repl(&mut self) {}

    fn add_plotter(&mut self, _port_path: &str, _board: &str) {}

    fn remove_plotter(&mut self) {}

    fn add_filesystem(
        &mut self,
        _workspace: &Path,
        _manager: FileManagerHandle,
        _files: Receiver<FsEvent>,
    ) {
    }

    fn remove_filesystem(&mut self) {}

    fn send_repl_commands(&mut self, lines: &[String]) {
        self.repl_lines = lines.to_vec();
    }

    fn select_slot(&mut self, _slots: RangeInclusive<u8>) -> Option<u8> {
        self.slot
    }

    fn current_tab(&self) -> Option<&dyn Tab> {
        self.tab.as_ref().map(|tab| tab as &dyn Tab)
    }
}

fn board(kind: BoardKind) -> Arc<dyn Board> {
    match kind {
        BoardKind::Micropython => Arc::new(MicroPythonBoard),
        BoardKind::Studuinobit => Arc::new(StuduinoBit),
    }
}

fn load_config(path: Option<&Path>) -> LinkResult<Config> {
    let loader = match path {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(loader.into_config())
}

fn open(board: &dyn Board, hardware: &Hardware, config: &Config) -> LinkResult<SerialSession> {
    let device = board
        .find_device(hardware, true)?
        .ok_or(LinkError::DeviceNotFound)?;
    board.open_session(hardware, &device.port_path, &config.serial)
}

fn print_json<T: serde::Serialize>(value: &T) -> LinkResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| LinkError::Io(e.into()))?;
    println!("{}", text);
    Ok(())
}

/// Wait for the file manager's answer to one request.
fn next_event(events: &Receiver<FsEvent>, config: &Config) -> LinkResult<FsEvent> {
    let wait = config.serial.request_timeout() * 4 + Duration::from_secs(1);
    events
        .recv_timeout(wait)
        .map_err(|_| LinkError::timeout(b"file manager reply", wait))
}

fn files(args: &Args, board: &dyn Board, hardware: &Hardware, config: &Config) -> LinkResult<()> {
    let device = board
        .find_device(hardware, true)?
        .ok_or(LinkError::DeviceNotFound)?;
    let (tx, rx) = mpsc::channel();
    let mut manager: FileManager =
        board.file_manager(hardware, &device.port_path, &config.serial, tx);

    let listed = next_event(&rx, config)?;
    let outcome = match (&args.command, listed) {
        (Command::Ls, FsEvent::ListFiles(entries)) => {
            if args.json {
                print_json(&entries)?;
            } else {
                print_tree(&entries, 0);
            }
            Ok(())
        }
        (_, FsEvent::ListFailed) => {
            Err(LinkError::protocol(b"Could not list files on the device."))
        }
        (Command::Get { device, local }, _) => {
            let local = local.clone().unwrap_or_else(|| PathBuf::from(basename(device)));
            manager.handle().get(device.clone(), local);
            report(next_event(&rx, config)?)
        }
        (Command::Put { local, dest }, _) => {
            manager.handle().put(local.clone(), dest.clone());
            report(next_event(&rx, config)?)
        }
        (Command::Rm { device }, _) => {
            manager.handle().delete(device.clone());
            report(next_event(&rx, config)?)
        }
        _ => Ok(()),
    };
    manager.stop();
    outcome
}

fn failed(action: &str, name: &str) -> LinkError {
    LinkError::protocol(format!("Could not {} {}", action, name).as_bytes())
}

fn report(event: FsEvent) -> LinkResult<()> {
    match event {
        FsEvent::GotFile(name) => println!("Copied {}", name),
        FsEvent::PutFile(name) => println!("Uploaded {}", name),
        FsEvent::DeletedFile(name) => println!("Deleted {}", name),
        FsEvent::GetFailed(name) => return Err(failed("copy", &name)),
        FsEvent::PutFailed(name) => return Err(failed("upload", &name)),
        FsEvent::DeleteFailed(name) => return Err(failed("delete", &name)),
        other => debug!("Ignoring {:?}", other),
    }
    Ok(())
}

fn print_tree(entries: &[mu_link::FileEntry], depth: usize) {
    for entry in entries {
        let indent = "  ".repeat(depth);
        match (&entry.children, entry.size) {
            (Some(children), _) => {
                println!("{}{}/", indent, entry.name);
                print_tree(children, depth + 1);
            }
            (None, Some(size)) => println!("{}{} ({} bytes)", indent, entry.name, size),
            (None, None) => println!("{}{}", indent, entry.name),
        }
    }
}

fn basename(device_path: &str) -> &str {
    device_path.rsplit('/').next().unwrap_or(device_path)
}

fn run(args: Args, config: Config) -> LinkResult<ExitCode> {
    let board = board(args.board);
    let hardware = Hardware::system();

    match &args.command {
        Command::Ports => {
            let ports = hardware.scanner.scan()?;
            for port in ports {
                let known = boards::lookup(boards::STUDUINOBIT_BOARDS, port.vid, port.pid)
                    .or_else(|| boards::lookup(boards::MICROPYTHON_BOARDS, port.vid, port.pid))
                    .map_or("", |b| b.name);
                println!("{:<16} {:04x}:{:04x} {}", port.port_name, port.vid, port.pid, known);
            }
        }
        Command::Find => match board.find_device(&hardware, true)? {
            Some(device) => println!("{}", device.port_path),
            None => return Err(LinkError::DeviceNotFound),
        },
        Command::Exec { raw, lines } => {
            let mut link = open(board.as_ref(), &hardware, &config)?;
            let result = if *raw {
                protocol::execute_raw(&mut link, lines)?
            } else {
                handshake::interrupt(&mut link)?;
                protocol::execute(&mut link, lines)?
            };
            print!("{}", result.stdout_text());
            eprint!("{}", result.stderr_text());
            result.into_result()?;
        }
        Command::Reboot => {
            let mut link = open(board.as_ref(), &hardware, &config)?;
            board.reboot_handshake(&mut link)?;
            println!("Rebooted {}", link.port_path());
        }
        Command::Ls | Command::Get { .. } | Command::Put { .. } | Command::Rm { .. } => {
            files(&args, board.as_ref(), &hardware, &config)?;
        }
        Command::Flash { slot, file } => {
            let tab = ScriptTab::load(file)?;
            let view = ConsoleView::new(Some(*slot), Some(tab));
            let mut mode = ModeController::new(board, hardware, config, view);
            match mode.flash() {
                FlashOutcome::Transferred { slot, device_path } => {
                    debug!("Stored {} as slot {}", device_path, slot);
                }
                FlashOutcome::Cancelled => return Ok(ExitCode::FAILURE),
                FlashOutcome::Failed(step) => {
                    debug!("Transfer stopped at {:?}", step);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Run { file } => {
            let tab = ScriptTab::load(file)?;
            let view = ConsoleView::new(None, Some(tab));
            let mut mode = ModeController::new(board, hardware, config, view);
            if !mode.run() {
                return Ok(ExitCode::FAILURE);
            }
            let lines = mode.view().repl_lines.clone();
            if let Some(link) = mode.link_mut() {
                let result = protocol::execute(link, &lines)?;
                print!("{}", result.stdout_text());
                eprint!("{}", result.stderr_text());
            }
            mode.shutdown();
        }
        Command::Wifi { action } => {
            let mut link = open(board.as_ref(), &hardware, &config)?;
            match action {
                WifiCommand::Scan => {
                    let ssids = wifi::scan(&mut link)?;
                    if args.json {
                        print_json(&ssids)?;
                    } else {
                        ssids.iter().for_each(|s| println!("{}", s));
                    }
                }
                WifiCommand::Connect { ssid, password } => {
                    println!("{}", wifi::connect(&mut link, ssid, password)?)
                }
                WifiCommand::Disconnect => println!("{}", wifi::disconnect(&mut link)?),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

// --- Main Application Entry Point ---
fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.logging);

    match run(args, config) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            let (title, detail) = e.user_message();
            eprintln!("{}\n{}", title, detail);
            ExitCode::FAILURE
        }
    }
}
