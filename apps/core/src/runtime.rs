use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::codec::SearchableCodec;
use crate::config::{self, Config, ConfigError};
use crate::contract::FavoritesResponse;
use crate::favorites::{FavoritesRepository, RepositoryError, RepositoryOptions};
use crate::favorites_store::{FavoritesStore, StoreError};
use crate::settings::{LauncherSettings, SettingsStore};
use crate::transport;

pub const USAGE: &str = "usage: pinboard-core [--config <path>] <serve | favorites [--columns N] | watch [--columns N] | export <dir> | import <dir> | cleanup>";

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Answer JSON requests line by line on stdin/stdout.
    Serve,
    Favorites { columns: Option<usize> },
    /// Print every favorites snapshot as a JSON line until interrupted.
    Watch { columns: Option<usize> },
    Export(PathBuf),
    Import(PathBuf),
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, String> {
    let mut config_path = None;
    let mut columns = None;
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().ok_or("--config requires a path")?;
                config_path = Some(PathBuf::from(value));
            }
            "--columns" => {
                let value = iter.next().ok_or("--columns requires a number")?;
                let parsed = value
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("invalid --columns value '{value}'"))?;
                columns = Some(parsed);
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => {
                return Err(format!("unknown flag '{other}'\n{USAGE}"));
            }
            other => positional.push(other.to_string()),
        }
    }

    let command = match positional.as_slice() {
        [] => Command::Serve,
        [cmd] if cmd == "serve" => Command::Serve,
        [cmd] if cmd == "favorites" => Command::Favorites { columns },
        [cmd] if cmd == "watch" => Command::Watch { columns },
        [cmd] if cmd == "cleanup" => Command::Cleanup,
        [cmd, dir] if cmd == "export" => Command::Export(PathBuf::from(dir)),
        [cmd, dir] if cmd == "import" => Command::Import(PathBuf::from(dir)),
        _ => return Err(format!("unrecognized command '{}'\n{USAGE}", positional.join(" "))),
    };

    if columns.is_some() && !matches!(command, Command::Favorites { .. } | Command::Watch { .. }) {
        return Err("--columns only applies to 'favorites' and 'watch'".to_string());
    }

    Ok(RuntimeOptions {
        config_path,
        command,
    })
}

pub fn run_with_options(options: RuntimeOptions) -> Result<(), RuntimeError> {
    let config = config::load(options.config_path.as_deref())?;
    if !config.config_path.exists() {
        config::save(&config)?;
        eprintln!(
            "[pinboard-core] wrote default config to {}",
            config.config_path.display()
        );
    }

    let log_dir = config
        .config_path
        .parent()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(crate::logging::logs_dir);
    crate::logging::init(&log_dir, &config.log_level)?;
    info!(
        config_path = %config.config_path.display(),
        index_db_path = %config.index_db_path.display(),
        command = ?options.command,
        "startup"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let repository = open_repository(&config, runtime.handle().clone())?;
    runtime.block_on(execute(&repository, options.command))
}

/// Wires the store, settings and codec for `config` onto `runtime`.
pub fn open_repository(
    config: &Config,
    runtime: tokio::runtime::Handle,
) -> Result<FavoritesRepository, RuntimeError> {
    let store = Arc::new(FavoritesStore::open_from_config(config)?);
    let settings = Arc::new(SettingsStore::new(LauncherSettings::from_config(config)));
    Ok(FavoritesRepository::with_options(
        store,
        settings,
        SearchableCodec::default(),
        runtime,
        RepositoryOptions::from_config(config),
    ))
}

async fn execute(repository: &FavoritesRepository, command: Command) -> Result<(), RuntimeError> {
    let default_columns = repository.settings().current().grid_columns;
    match command {
        Command::Serve => serve_stdio(repository).await,
        Command::Favorites { columns } => {
            let items = repository
                .favorites_snapshot(columns.unwrap_or(default_columns))
                .await?;
            for item in items {
                println!("{}\t{}", item.key(), item.label());
            }
            Ok(())
        }
        Command::Watch { columns } => {
            watch_favorites(repository, columns.unwrap_or(default_columns)).await
        }
        Command::Export(dir) => {
            let exported = repository.export(dir).await?;
            println!("exported {exported} favorites");
            Ok(())
        }
        Command::Import(dir) => {
            let imported = repository.import(dir).await?;
            println!("imported {imported} favorites");
            Ok(())
        }
        Command::Cleanup => {
            let removed = repository.cleanup_database().await?;
            println!("removed {removed} invalid favorites");
            Ok(())
        }
    }
}

async fn serve_stdio(repository: &FavoritesRepository) -> Result<(), RuntimeError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("serving requests on stdio");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = transport::handle_json(repository, &line).await;
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    info!("stdin closed; shutting down");
    Ok(())
}

async fn watch_favorites(
    repository: &FavoritesRepository,
    columns: usize,
) -> Result<(), RuntimeError> {
    let mut stream = repository.get_favorites(columns);
    loop {
        tokio::select! {
            update = stream.next() => match update {
                Some(Ok(items)) => {
                    let response = FavoritesResponse::from_items(items.as_ref().clone());
                    println!("{}", serde_json::to_string(&response)?);
                }
                Some(Err(error)) => warn!(%error, "favorites stream reported an error"),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
