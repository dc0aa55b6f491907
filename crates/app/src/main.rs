use std::fmt;

use kakomon_core::model::QualificationId;
use services::{AppServices, Clock};
use storage::StorageConfig;
use storage::config::StorageBackend;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  kakomon report [--db <sqlite_url>] [--memory] [--qualification <id>]");
    eprintln!("  kakomon reset  [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://kakomon.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  KAKOMON_DB_URL, KAKOMON_STORAGE=memory, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Report,
    Reset,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "report" => Some(Self::Report),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

struct Args {
    storage: StorageConfig,
    qualification: Option<QualificationId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut storage = StorageConfig::from_env();
        if let StorageBackend::Sqlite { url } = &storage.backend {
            storage = StorageConfig::sqlite(normalize_sqlite_url(url.clone()));
        }
        let mut qualification = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    storage = StorageConfig::sqlite(normalize_sqlite_url(value));
                }
                "--memory" => storage = StorageConfig::memory(),
                "--qualification" => {
                    let value = require_value(args, "--qualification")?;
                    qualification = Some(QualificationId::new(value.trim()));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            storage,
            qualification,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") || raw == "sqlite::memory:" {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and its directory) so the pool can open it.
fn prepare_sqlite_file(config: &StorageConfig) -> Result<(), Box<dyn std::error::Error>> {
    let StorageBackend::Sqlite { url } = &config.backend else {
        return Ok(());
    };
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl { raw: url.clone() }.into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_report(services: &AppServices, only: Option<&QualificationId>) {
    let catalog = services.catalog();
    let progress = services.progress();

    println!("visitor: {}", progress.visitor_id());
    println!(
        "answered: {}  correct: {}  accuracy: {}%",
        progress.total_answered(),
        progress.total_correct(),
        progress.accuracy(None)
    );
    println!(
        "weak questions: {}  bookmarks: {}",
        progress.weak_questions().len(),
        progress.bookmarks().len()
    );
    if let Some(last) = progress.last_session() {
        println!(
            "continue: {} / {} / {} at question {}",
            last.qualification_id,
            last.subject_id,
            last.year,
            last.question_index + 1
        );
    }
    println!();

    for qualification in catalog.qualifications() {
        if only.is_some_and(|id| id != &qualification.id) {
            continue;
        }
        let counts = catalog.question_counts(&qualification.id);
        let years = counts
            .iter()
            .rev()
            .map(|(year, count)| format!("{year}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{} {} ({} min) accuracy {}%  [{}]",
            qualification.id,
            qualification.name,
            qualification.exam_time_limit_secs() / 60,
            progress.accuracy(Some(&qualification.id)),
            if years.is_empty() { "no questions" } else { years.as_str() }
        );
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Report,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Report,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();
    prepare_sqlite_file(&parsed.storage)?;
    let services = AppServices::from_config(&parsed.storage, Clock::default_clock()).await?;

    match cmd {
        Command::Report => print_report(&services, parsed.qualification.as_ref()),
        Command::Reset => {
            services.progress().reset_progress().await;
            info!("progress cleared");
        }
    }

    services.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_string());
        Args::parse(&mut iter)
    }

    #[test]
    fn memory_flag_selects_memory_backend() {
        let args = parse(&["--memory", "--qualification", "B1"]).unwrap();
        assert_eq!(args.storage, StorageConfig::memory());
        assert_eq!(args.qualification, Some(QualificationId::new("B1")));
    }

    #[test]
    fn db_flag_is_normalized_to_absolute_url() {
        let args = parse(&["--db", "sqlite:/tmp/k.sqlite3"]).unwrap();
        assert_eq!(args.storage, StorageConfig::sqlite("sqlite:///tmp/k.sqlite3"));
    }

    #[test]
    fn missing_and_unknown_args_are_errors() {
        assert!(matches!(
            parse(&["--db"]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
        assert!(matches!(parse(&["--bogus"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(
            parse(&["--db", "  "]),
            Err(ArgsError::InvalidDbUrl { .. })
        ));
    }

    #[test]
    fn memory_backend_needs_no_file() {
        assert!(prepare_sqlite_file(&StorageConfig::memory()).is_ok());
    }
}
