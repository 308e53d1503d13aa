use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use studyloop_core::StudyMode;

#[derive(Debug, Clone, ValueEnum)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ModeArg {
    Flip,
    Write,
    Choice,
    Unscramble,
}

impl ModeArg {
    pub fn to_mode(&self) -> StudyMode {
        match self {
            ModeArg::Flip => StudyMode::Flip,
            ModeArg::Write => StudyMode::Write,
            ModeArg::Choice => StudyMode::Choice,
            ModeArg::Unscramble => StudyMode::Unscramble,
        }
    }
}

#[derive(Debug, Parser, Clone)]
#[command(name = "studyloop", version, about = "StudyLoop CLI/API")]
pub struct Cli {
    /// Storage backend (applies to CLI/API unless overridden)
    #[arg(long, value_enum, default_value_t = StoreKind::Sqlite)]
    pub store: StoreKind,

    /// SQLite DB path when --store sqlite (defaults to app data dir)
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Interactive study loop (CLI)
    Study(StudyCmd),
    /// Lifetime per-card counters for a list (CLI)
    Progress(ProgressCmd),
    /// Launch Axum HTTP API
    Serve(ServeCmd),
}

#[derive(Debug, Args, Clone)]
pub struct StudyCmd {
    /// Card list file (.json or .csv)
    pub file: PathBuf,

    #[arg(long, value_enum, default_value_t = ModeArg::Write)]
    pub mode: ModeArg,

    /// Profile to record progress under; omit to study anonymously
    #[arg(long)]
    pub profile: Option<String>,

    /// List name (defaults to the file stem)
    #[arg(long)]
    pub list: Option<String>,

    /// File of starred cards restricting the candidates
    #[arg(long)]
    pub starred: Option<PathBuf>,

    /// Study every candidate per round instead of rounds of ten
    #[arg(long)]
    pub use_all: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ProgressCmd {
    /// Card list file (.json or .csv)
    pub file: PathBuf,

    #[arg(long)]
    pub profile: String,

    #[arg(long)]
    pub list: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ServeCmd {
    /// Bind address (host:port)
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,
}
