pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(name = "pengu", about = "Terminal client for the Pengu marketplace")]
#[clap(version)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[clap(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    #[clap(name = "login")]
    Login {
        /// Account email
        email: String,
    },

    /// Create an account and sign in
    #[clap(name = "register")]
    Register {
        /// Display name
        name: String,
        /// Account email
        email: String,
        /// Account role (student or expert)
        #[clap(long, default_value = "student")]
        role: String,
    },

    /// End the local session
    #[clap(name = "logout")]
    Logout,

    /// Show the signed-in user
    #[clap(name = "whoami")]
    Whoami,

    /// Reload every collection and print a summary
    #[clap(name = "pull")]
    Pull,

    /// Stay connected and apply live updates until interrupted
    #[clap(name = "watch")]
    Watch,

    /// Commands for service requests
    #[clap(subcommand, name = "request")]
    Request(RequestCommands),

    /// Show notifications
    #[clap(name = "notifications")]
    Notifications {
        /// Mark everything read after printing
        #[clap(long)]
        read_all: bool,
    },
}

#[derive(Subcommand)]
pub enum RequestCommands {
    /// List your service requests
    #[clap(name = "ls")]
    Ls,

    /// Submit a new service request
    #[clap(name = "new")]
    New {
        /// Request title
        title: String,
        /// What you need help with
        #[clap(long)]
        description: Option<String>,
        /// Budget in credits
        #[clap(long)]
        budget: Option<f64>,
    },
}
