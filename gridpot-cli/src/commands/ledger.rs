use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use gridpot_core::storage::LedgerStore;
use gridpot_core::{LedgerEntry, PoolManager, Result};

use super::pool::parse_pool_id;

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Record that a player paid for squares
    BuyIn {
        /// Pool id
        pool: String,
        /// Paying player
        player: String,
        /// Number of squares covered
        #[arg(long, default_value_t = 1)]
        squares: u32,
    },
    /// Show a player's signed balance
    Balance {
        /// Player id
        player: String,
        /// Restrict to one pool
        #[arg(long)]
        pool: Option<String>,
    },
    /// Show a player's ledger history
    History {
        /// Player id
        player: String,
    },
    /// Show every money movement for a pool
    Pool {
        /// Pool id
        pool: String,
    },
}

pub async fn handle_ledger_command(cmd: LedgerCommands, manager: &PoolManager) -> Result<()> {
    match cmd {
        LedgerCommands::BuyIn {
            pool,
            player,
            squares,
        } => {
            let pool_id = parse_pool_id(&pool)?;
            let denomination = manager.get_pool(pool_id).await?.denomination;
            manager
                .record_buy_in(pool_id, &player, squares, "admin")
                .await?;
            println!(
                "Buy-in recorded: {} paid ${} for {} square(s)",
                player,
                denomination * squares as i64,
                squares
            );
        }

        LedgerCommands::Balance { player, pool } => {
            let pool_id = pool.as_deref().map(parse_pool_id).transpose()?;
            let storage = manager.storage();
            let balance = LedgerStore::new(&storage).balance(&player, pool_id).await?;
            println!("{}: ${}", player, balance);
        }

        LedgerCommands::History { player } => {
            let storage = manager.storage();
            let entries = LedgerStore::new(&storage).entries_for_player(&player).await?;
            print_entries(&entries);
        }

        LedgerCommands::Pool { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            let storage = manager.storage();
            let entries = LedgerStore::new(&storage).entries_for_pool(pool_id).await?;
            print_entries(&entries);
        }
    }

    Ok(())
}

fn print_entries(entries: &[LedgerEntry]) {
    if entries.is_empty() {
        println!("No ledger entries");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["When", "Player", "Type", "Amount", "Note"]);
    for entry in entries {
        table.add_row(vec![
            entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
            entry.player_id.clone(),
            entry.entry_type.to_string(),
            format!("${}", entry.amount),
            entry.note.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);
}
