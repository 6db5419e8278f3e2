use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracker_common::Role;

mod cmd;

#[derive(Parser)]
#[command(name = "tracker")]
#[command(version, about = "Project tracker with role-checked Kanban boards")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// SQLite database path. Overrides TRACKER_DB and tracker.toml.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Act as this actor id. Overrides TRACKER_ACTOR and tracker.toml.
    #[arg(long, global = true)]
    pub actor: Option<i64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .tracker/ with a config file and an empty database
    Init {
        /// Identity to record in tracker.toml
        #[arg(long)]
        actor_id: Option<i64>,
        /// Site role of that identity (admin, pm, member)
        #[arg(long)]
        site_role: Option<Role>,
        #[arg(long, default_value = "1")]
        site_id: i64,
    },
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },
    Column {
        #[command(subcommand)]
        command: ColumnCommands,
    },
    Issue {
        #[command(subcommand)]
        command: IssueCommands,
    },
    /// Show recent activity
    Activity {
        /// Only events of this project
        #[arg(long)]
        project: Option<String>,
        /// Only events by this actor
        #[arg(long)]
        by: Option<i64>,
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand, Clone)]
pub enum ProjectCommands {
    /// Create a project (key: 3-10 uppercase letters/digits)
    Create {
        key: String,
        name: String,
        #[arg(long)]
        private: bool,
    },
    /// List projects of the configured site
    List,
}

#[derive(Subcommand, Clone)]
pub enum BoardCommands {
    /// Print the board of a project
    Show {
        key: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum ColumnCommands {
    /// Add a custom column at the end of the board
    Add { key: String, title: String },
    Rename {
        key: String,
        column_id: i64,
        title: String,
    },
    Delete { key: String, column_id: i64 },
    /// Move the column at position FROM to position TO
    Move { key: String, from: usize, to: usize },
}

#[derive(Subcommand, Clone)]
pub enum IssueCommands {
    /// Append an issue to a column
    Add {
        key: String,
        column_id: i64,
        title: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        assignee: Option<i64>,
    },
    /// Move an issue to INDEX in COLUMN_ID
    Move {
        key: String,
        issue_id: i64,
        column_id: i64,
        index: usize,
    },
    Delete { key: String, issue_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init {
            actor_id,
            site_role,
            site_id,
        } => cmd::cmd_init(&project_dir, *actor_id, *site_role, *site_id)?,
        Commands::Project { command } => cmd::cmd_project(&cli, project_dir, command.clone()).await?,
        Commands::Board { command } => cmd::cmd_board(&cli, project_dir, command.clone()).await?,
        Commands::Column { command } => cmd::cmd_column(&cli, project_dir, command.clone()).await?,
        Commands::Issue { command } => cmd::cmd_issue(&cli, project_dir, command.clone()).await?,
        Commands::Activity {
            project,
            by,
            limit,
        } => cmd::cmd_activity(&cli, project_dir, project.as_deref(), *by, *limit).await?,
    }

    Ok(())
}
