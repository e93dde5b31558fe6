use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kitchen::config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER};
use kitchen::db::{self, PgStore};
use kitchen::ledger::{EntryId, LedgerEntry};
use kitchen::order_model::OrderId;
use kitchen::recipe_model::Unit;
use kitchen::service::{KitchenService, OrderChange};
use kitchen::session::StaticSession;

#[derive(Debug, Parser)]
#[command(name = "kitchen", version, about = "Kitchen orders, shopping list and inventory")]
struct Cli {
    /// Print listings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database tables
    InitDb,
    /// List recipes
    Recipes,
    /// Show the shopping list against the inventory
    Shopping,
    /// Show the inventory
    Inventory,
    /// List ongoing and completed orders
    Orders,
    /// Complete an ongoing order, consuming its ingredients
    Complete { order_id: OrderId },
    /// Delete an order
    DeleteOrder { order_id: OrderId },
    /// Record a purchase into the inventory
    Restock {
        ingredient: String,
        amount: f64,
        unit: Unit,
    },
    /// Set the count of an inventory entry; zero removes it
    AdjustInventory { entry_id: EntryId, count: f64 },
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_entries(entries: &[LedgerEntry]) {
    if entries.is_empty() {
        println!("(empty)");
    }
    for entry in entries {
        println!("#{:<5} {:<30} {} {}", entry.id, entry.ingredient, entry.quantity, entry.unit);
    }
}

fn print_change(action: &str, change: &OrderChange) {
    println!(
        "{action} order #{} for {} ({} ledger writes)",
        change.order.id, change.order.customer_name, change.mutations_applied
    );
    for warning in &change.warnings {
        println!("  warning: {warning}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    info!("Starting kitchen");

    let pool = db::connect(&config.database).await?;
    let store = PgStore::new(pool);

    if let Command::InitDb = cli.command {
        db::init_database_schema(store.pool()).await?;
        println!("Database schema ready");
        return Ok(());
    }

    let session = match &config.user_id {
        Some(user_id) => StaticSession::signed_in(user_id),
        None => StaticSession::signed_out(),
    };
    let service = KitchenService::new(store, session);

    match cli.command {
        Command::InitDb => {}
        Command::Recipes => {
            for recipe in service.list_recipes().await? {
                print!("#{:<5} {}", recipe.id, recipe);
            }
        }
        Command::Shopping if cli.json => print_json(&service.shopping_status().await?)?,
        Command::Inventory if cli.json => print_json(&service.inventory().await?)?,
        Command::Orders if cli.json => print_json(&service.ongoing_orders().await?)?,
        Command::Shopping => {
            for status in service.shopping_status().await? {
                let entry = &status.entry;
                if status.is_sufficient {
                    println!("{:<30} {} {} (in stock)", entry.ingredient, entry.quantity, entry.unit);
                } else {
                    println!(
                        "{:<30} {} {} needed, {} in stock, buy {} {}",
                        entry.ingredient,
                        entry.quantity,
                        entry.unit,
                        status.in_inventory,
                        status.needed_more,
                        entry.unit
                    );
                }
            }
        }
        Command::Inventory => print_entries(&service.inventory().await?),
        Command::Orders => {
            println!("Ongoing:");
            for order in service.ongoing_orders().await? {
                println!("  #{:<5} {:<20} {}", order.id, order.customer_name, order.total_price);
            }
            println!("Completed:");
            for order in service.completed_orders().await? {
                println!("  #{:<5} {:<20} {}", order.id, order.customer_name, order.total_price);
            }
        }
        Command::Complete { order_id } => {
            let change = service.complete_order(order_id).await?;
            print_change("Completed", &change);
        }
        Command::DeleteOrder { order_id } => {
            let change = service.delete_order(order_id).await?;
            print_change("Deleted", &change);
        }
        Command::Restock {
            ingredient,
            amount,
            unit,
        } => {
            let written = service.restock(&ingredient, amount, unit).await?;
            println!("Restocked {amount} {unit} {ingredient} ({written} ledger writes)");
        }
        Command::AdjustInventory { entry_id, count } => {
            service.adjust_inventory(entry_id, count).await?;
            println!("Inventory entry #{entry_id} set to {count}");
        }
    }

    Ok(())
}
