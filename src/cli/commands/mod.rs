//! CLI command definitions and dispatch.
//!
//! Each group of subcommands lives in its own submodule:
//! - `scan`: library scanning and listing
//! - `search`: search, track details and tag edits
//! - `performer`: person/group classification
//! - `settings`: effective configuration

mod performer;
mod scan;
mod search;
mod settings;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::db::{self, Store};
use crate::model::{PerformerType, Track};

pub use performer::{
    cmd_classify, cmd_group_add, cmd_group_join, cmd_group_list, cmd_group_members,
    cmd_group_update, cmd_person_add, cmd_person_list, cmd_person_update,
};
pub use scan::{cmd_list, cmd_scan};
pub use search::{cmd_edit, cmd_search, cmd_show};
pub use settings::cmd_config;

/// Rolas music library manager
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database file (defaults to the configured path)
    #[arg(long, global = true, env = "ROLAS_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan a directory for music and add new tracks
    Scan {
        /// Directory to scan (defaults to the configured root, then ~/Music)
        root: Option<PathBuf>,
        /// File name suffix to scan for
        #[arg(long)]
        extension: Option<String>,
    },
    /// List all tracks in the library
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Search the library
    ///
    /// Plain text matches artist, album, title or genre. Text starting with
    /// `*~*` is a structured query, e.g. `*~**AR*~punk && *YE*<1980 || *GE*=Jazz`.
    Search {
        text: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one track with its performer details
    Show { id: i64 },
    /// Edit the stored tags of a track
    Edit {
        id: i64,
        #[command(flatten)]
        changes: TrackEdit,
    },
    /// Classify performers
    Performer {
        #[command(subcommand)]
        action: PerformerCommand,
    },
    /// Manage persons
    Person {
        #[command(subcommand)]
        action: PersonCommand,
    },
    /// Manage groups and their members
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Tag changes for `edit`; unset flags leave the field alone.
#[derive(Args, Debug, Default)]
pub struct TrackEdit {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub artist: Option<String>,
    #[arg(long)]
    pub album: Option<String>,
    #[arg(long)]
    pub track: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub genre: Option<String>,
}

#[derive(Subcommand)]
pub enum PerformerCommand {
    /// Mark a performer as a person, a group, or unknown
    Classify {
        name: String,
        /// person, group or unknown
        kind: PerformerType,
    },
}

#[derive(Subcommand)]
pub enum PersonCommand {
    /// Add a person
    Add {
        stage_name: String,
        #[arg(long, default_value = "")]
        real_name: String,
        #[arg(long, default_value = "")]
        birth: String,
        #[arg(long, default_value = "")]
        death: String,
    },
    /// Update a person's details
    Update {
        id: i64,
        #[arg(long)]
        stage_name: Option<String>,
        #[arg(long)]
        real_name: Option<String>,
        #[arg(long)]
        birth: Option<String>,
        #[arg(long)]
        death: Option<String>,
    },
    /// List all persons
    List,
}

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Add a group
    Add {
        name: String,
        #[arg(long, default_value = "")]
        start: String,
        #[arg(long, default_value = "")]
        end: String,
    },
    /// Update a group's details
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Add a person (by stage name) to a group
    Join { person: String, group: String },
    /// List the members of a group
    Members { group: String },
    /// List all groups
    List,
}

/// Run the parsed command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = config::load();
    let rt = Runtime::new()?;
    let db = cli.db.as_deref();

    match &cli.command {
        Commands::Scan { root, extension } => {
            cmd_scan(&rt, &config, db, root.as_deref(), extension.as_deref())
        }
        Commands::List { json } => cmd_list(&rt, &config, db, *json),
        Commands::Search { text, json } => cmd_search(&rt, &config, db, text, *json),
        Commands::Show { id } => cmd_show(&rt, &config, db, *id),
        Commands::Edit { id, changes } => cmd_edit(&rt, &config, db, *id, changes),
        Commands::Performer {
            action: PerformerCommand::Classify { name, kind },
        } => cmd_classify(&rt, &config, db, name, *kind),
        Commands::Person { action } => match action {
            PersonCommand::Add {
                stage_name,
                real_name,
                birth,
                death,
            } => cmd_person_add(&rt, &config, db, stage_name, real_name, birth, death),
            PersonCommand::Update {
                id,
                stage_name,
                real_name,
                birth,
                death,
            } => cmd_person_update(
                &rt,
                &config,
                db,
                *id,
                stage_name.as_deref(),
                real_name.as_deref(),
                birth.as_deref(),
                death.as_deref(),
            ),
            PersonCommand::List => cmd_person_list(&rt, &config, db),
        },
        Commands::Group { action } => match action {
            GroupCommand::Add { name, start, end } => {
                cmd_group_add(&rt, &config, db, name, start, end)
            }
            GroupCommand::Update {
                id,
                name,
                start,
                end,
            } => cmd_group_update(
                &rt,
                &config,
                db,
                *id,
                name.as_deref(),
                start.as_deref(),
                end.as_deref(),
            ),
            GroupCommand::Join { person, group } => {
                cmd_group_join(&rt, &config, db, person, group)
            }
            GroupCommand::Members { group } => cmd_group_members(&rt, &config, db, group),
            GroupCommand::List => cmd_group_list(&rt, &config, db),
        },
        Commands::Config { save } => cmd_config(&config, db, *save),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Database file to use: the `--db` flag, else the configured path.
pub(crate) fn database_path(config: &Config, db: Option<&Path>) -> anyhow::Result<PathBuf> {
    match db {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config.database_path()?),
    }
}

/// Open the store, creating the database directory if needed.
pub(crate) async fn open_store(config: &Config, db: Option<&Path>) -> anyhow::Result<Store> {
    use anyhow::Context;

    let path = database_path(config, db)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }

    Store::open(&db::db_url(Some(path.as_path())))
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}

/// Print tracks as a table, or as JSON.
pub(crate) fn print_tracks(tracks: &[Track], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(tracks)?);
        return Ok(());
    }

    for track in tracks {
        println!("{}", track_line(track));
    }
    println!("{} track(s)", tracks.len());
    Ok(())
}

pub(crate) fn track_line(track: &Track) -> String {
    format!(
        "{:>6}  {} - {} [{} #{}, {}] {}",
        track.id(),
        track.artist,
        track.title,
        track.album,
        track.track,
        track.year,
        track.genre
    )
}
