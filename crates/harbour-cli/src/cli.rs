use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "harbour",
    about = "Harbour: content-addressed large file storage",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./harbour.toml when present)
    #[arg(short, long, global = true, env = "HARBOUR_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the LFS server
    Serve(ServeArgs),
    /// Manage local users
    User(UserArgs),
    /// Manage projects
    Project(ProjectArgs),
    /// List tracked objects
    Objects(ObjectsArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Override the configured listen address
    #[arg(long)]
    pub listen: Option<SocketAddr>,
}

#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub action: UserAction,
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Add a user; an existing user keeps their password
    Add { name: String, password: String },
    /// Delete a user
    Delete { name: String },
    /// List usernames
    List,
}

#[derive(Args)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create an empty project
    Add { name: String },
    /// List projects with their object counts
    List,
}

#[derive(Args)]
pub struct ObjectsArgs {
    /// Only show objects whose oid contains this text
    #[arg(long)]
    pub oid: Option<String>,
    /// Only show objects referenced by this project
    #[arg(long)]
    pub project: Option<String>,
}
