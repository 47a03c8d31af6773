//! Marketplace CLI - database migrations and back-office tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply the marketplace schema
//! mp-cli migrate
//!
//! # Move an order along its lifecycle
//! mp-cli order set-status -n 48213 -s dispatched
//!
//! # Deactivate a customer
//! mp-cli customer set-active -e jane@example.com --active false
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `order set-status` - Change an order's status (vendor dispatch, delivery, cancel)
//! - `customer set-active` - Enable or disable a customer account

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{ArgAction, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mp-cli")]
#[command(author, version, about = "Marketplace CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage orders
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Manage customer accounts
    Customer {
        #[command(subcommand)]
        action: CustomerAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Move an order to a new status
    SetStatus {
        /// Order number
        #[arg(short, long)]
        number: String,

        /// Target status (`confirmed`, `assembled`, `dispatched`, `delivered`, `canceled`)
        #[arg(short, long)]
        status: String,
    },
}

#[derive(Subcommand)]
enum CustomerAction {
    /// Enable or disable login for a customer
    SetActive {
        /// Customer email address
        #[arg(short, long)]
        email: String,

        /// Whether the account may log in
        #[arg(long, action = ArgAction::Set)]
        active: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Order { action } => match action {
            OrderAction::SetStatus { number, status } => {
                commands::orders::set_status(&number, &status).await?;
            }
        },
        Commands::Customer { action } => match action {
            CustomerAction::SetActive { email, active } => {
                commands::customers::set_active(&email, active).await?;
            }
        },
    }
    Ok(())
}
