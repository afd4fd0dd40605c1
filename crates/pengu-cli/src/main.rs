mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, RequestCommands};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut app = cli::commands::open_app()?;

    match &cli.command {
        Commands::Login { email } => {
            cli::commands::login(&mut app, email).await?;
        }
        Commands::Register { name, email, role } => {
            cli::commands::register(&mut app, name, email, role).await?;
        }
        Commands::Logout => {
            cli::commands::logout(&mut app);
        }
        Commands::Whoami => {
            cli::commands::whoami(&app, cli.json)?;
        }
        Commands::Pull => {
            cli::commands::pull(&mut app, cli.json).await?;
        }
        Commands::Watch => {
            cli::commands::watch(&mut app).await?;
        }
        Commands::Request(request_cmd) => match request_cmd {
            RequestCommands::Ls => {
                cli::commands::list_requests(&mut app, cli.json).await?;
            }
            RequestCommands::New {
                title,
                description,
                budget,
            } => {
                cli::commands::new_request(&mut app, title, description.as_deref(), *budget)
                    .await?;
            }
        },
        Commands::Notifications { read_all } => {
            cli::commands::notifications(&mut app, *read_all, cli.json).await?;
        }
    }

    Ok(())
}
