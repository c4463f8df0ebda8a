use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use gridpot_core::storage::LedgerStore;
use gridpot_core::{
    ClaimStatus, PoolConfig, PoolError, PoolManager, PoolStatus, Result, Square,
};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum PoolCommands {
    /// Create a new pool with an empty 10x10 grid
    Create {
        /// Pool name
        name: String,
        /// Sport (football, basketball, hockey, soccer)
        #[arg(long, default_value = "football")]
        sport: String,
        /// Dollar cost of one square
        #[arg(long, default_value_t = 10)]
        denomination: i64,
        /// Maximum squares per player
        #[arg(long, default_value_t = 10)]
        max_per_player: u32,
        /// Fill percentage above which claims need approval (100 = off)
        #[arg(long, default_value_t = 100)]
        approval_threshold: u8,
        /// Payout structure (standard, heavy_final, halftime_final, reverse)
        #[arg(long, default_value = "standard")]
        payout: String,
        /// Overtime rule (include_final, separate, none)
        #[arg(long, default_value = "include_final")]
        ot_rule: String,
        /// Suggested tip percentage on payouts
        #[arg(long, default_value_t = 0)]
        tip_pct: u8,
        /// External score-feed game id
        #[arg(long)]
        external_game_id: Option<String>,
    },
    /// List all pools
    List,
    /// Show a pool and its grid
    Show {
        /// Pool id
        pool: String,
    },
    /// Lock the grid with random digits (one-time, irreversible)
    Lock {
        /// Pool id
        pool: String,
    },
    /// Mark the pool in progress
    Start {
        /// Pool id
        pool: String,
    },
    /// Mark the pool final
    Finalize {
        /// Pool id
        pool: String,
    },
    /// Cancel the pool (absorbing)
    Cancel {
        /// Pool id
        pool: String,
    },
    /// Suspend the pool (absorbing)
    Suspend {
        /// Pool id
        pool: String,
    },
    /// Show the pool's audit trail
    Audit {
        /// Pool id
        pool: String,
    },
}

pub fn parse_pool_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| PoolError::validation(format!("invalid pool id: {}", s)))
}

pub async fn handle_pool_command(cmd: PoolCommands, manager: &PoolManager) -> Result<()> {
    match cmd {
        PoolCommands::Create {
            name,
            sport,
            denomination,
            max_per_player,
            approval_threshold,
            payout,
            ot_rule,
            tip_pct,
            external_game_id,
        } => {
            let config = PoolConfig {
                name,
                sport: sport.parse()?,
                denomination,
                max_per_player,
                approval_threshold,
                payout_structure: payout.parse()?,
                ot_rule: ot_rule.parse()?,
                tip_pct,
                external_game_id,
            };
            let pool = manager.create_pool(config, "admin").await?;

            println!("Created pool '{}'", pool.name);
            println!("  Id: {}", pool.id);
            println!("  Sport: {} ({})", pool.sport, pool.sport.period_labels().join("/"));
            println!("  Denomination: ${} per square", pool.denomination);
            println!("  Pot: ${}", pool.pool_total());
        }

        PoolCommands::List => {
            let pools = manager.list_pools().await?;
            if pools.is_empty() {
                println!("No pools yet. Create one with 'gridpot pool create'");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Id", "Name", "Sport", "$/square", "Status"]);
            for pool in pools {
                table.add_row(vec![
                    pool.id.to_string(),
                    pool.name.clone(),
                    pool.sport.to_string(),
                    pool.denomination.to_string(),
                    pool.status.to_string(),
                ]);
            }
            println!("{}", table);
        }

        PoolCommands::Show { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            let pool = manager.get_pool(pool_id).await?;
            let squares = manager.grid(pool_id).await?;

            println!("Pool '{}' ({})", pool.name, pool.id);
            println!("  Status: {}", pool.status);
            println!(
                "  {} | ${}/square | pot ${} | payout {} | ot {}",
                pool.sport,
                pool.denomination,
                pool.pool_total(),
                pool.payout_structure,
                pool.ot_rule
            );
            if let Some(locked_at) = pool.locked_at {
                println!("  Locked at: {}", locked_at.format("%Y-%m-%d %H:%M"));
            }
            println!();
            print_grid(&pool.col_digits, &pool.row_digits, &squares);
        }

        PoolCommands::Lock { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            let pool = manager.lock_pool(pool_id, "admin").await?;

            println!("Pool locked. Digits are fixed for the life of the pool:");
            if let (Some(cols), Some(rows)) = (&pool.col_digits, &pool.row_digits) {
                println!("  Columns (away): {:?}", cols);
                println!("  Rows (home):    {:?}", rows);
            }
        }

        PoolCommands::Start { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            manager
                .transition(pool_id, PoolStatus::InProgress, "admin")
                .await?;
            println!("Pool is in progress");
        }

        PoolCommands::Finalize { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            manager.transition(pool_id, PoolStatus::Final, "admin").await?;
            println!("Pool is final");
        }

        PoolCommands::Cancel { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            let confirmed = Confirm::new()
                .with_prompt("Cancel this pool? This cannot be undone")
                .default(false)
                .interact()
                .map_err(|e| PoolError::internal(e.to_string()))?;
            if !confirmed {
                println!("Aborted");
                return Ok(());
            }
            manager
                .transition(pool_id, PoolStatus::Cancelled, "admin")
                .await?;
            println!("Pool cancelled");
        }

        PoolCommands::Suspend { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            manager
                .transition(pool_id, PoolStatus::Suspended, "admin")
                .await?;
            println!("Pool suspended");
        }

        PoolCommands::Audit { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            let storage = manager.storage();
            let records = LedgerStore::new(&storage).audit_for_pool(pool_id).await?;

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["When", "Actor", "Role", "Action", "Detail"]);
            for record in records {
                table.add_row(vec![
                    record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    record.actor_id.clone(),
                    record.actor_role.to_string(),
                    record.action.clone(),
                    record.detail.to_string(),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}

/// Render the 10x10 grid; locked pools show their digit headers.
fn print_grid(col_digits: &Option<Vec<u8>>, row_digits: &Option<Vec<u8>>, squares: &[Square]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    let mut header = vec!["".to_string()];
    for col in 0..10 {
        header.push(match col_digits {
            Some(digits) => format!("{}", digits[col]),
            None => format!("c{}", col),
        });
    }
    table.set_header(header);

    for row in 0..10usize {
        let label = match row_digits {
            Some(digits) => format!("{}", digits[row]),
            None => format!("r{}", row),
        };
        let mut cells = vec![label];
        for col in 0..10usize {
            cells.push(cell_text(&squares[row * 10 + col]));
        }
        table.add_row(cells);
    }

    println!("{}", table);
}

fn cell_text(square: &Square) -> String {
    match square.claim_status {
        ClaimStatus::Available => "-".to_string(),
        ClaimStatus::Pending => match &square.owner {
            Some(owner) => format!("{}?", truncate(owner)),
            None => "?".to_string(),
        },
        ClaimStatus::Claimed => match &square.owner {
            Some(owner) => truncate(owner),
            None => "?".to_string(),
        },
    }
}

// counts chars, not bytes: owner names are arbitrary UTF-8
fn truncate(name: &str) -> String {
    if name.chars().count() > 8 {
        let head: String = name.chars().take(6).collect();
        format!("{}..", head)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn test_truncate_short_names_unchanged() {
        assert_eq!(truncate("alice"), "alice");
        assert_eq!(truncate("12345678"), "12345678");
    }

    #[test]
    fn test_truncate_long_and_multibyte_names() {
        assert_eq!(truncate("altogether"), "altoge..");
        assert_eq!(truncate("éléphantesque"), "élépha..");
    }
}
