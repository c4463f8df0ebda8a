use clap::Subcommand;
use gridpot_core::{ActorRole, ClaimEngine, ClaimOutcome, PoolManager, Result};

use super::pool::parse_pool_id;

#[derive(Subcommand)]
pub enum SquareCommands {
    /// Claim a square for a player
    Claim {
        /// Pool id
        pool: String,
        /// Grid row (0-9)
        row: u8,
        /// Grid column (0-9)
        col: u8,
        /// Player the square is claimed for
        player: String,
        /// Claim as admin (bypasses the approval threshold)
        #[arg(long)]
        admin: bool,
    },
    /// Release a claimed square back to available
    Release {
        /// Pool id
        pool: String,
        /// Grid row (0-9)
        row: u8,
        /// Grid column (0-9)
        col: u8,
        /// Player releasing the square
        player: String,
        /// Release as admin (no refund is recorded)
        #[arg(long)]
        admin: bool,
    },
    /// Admin override: give a square to a player, displacing any owner
    Assign {
        /// Pool id
        pool: String,
        /// Grid row (0-9)
        row: u8,
        /// Grid column (0-9)
        col: u8,
        /// Player the square is assigned to
        player: String,
    },
    /// Swap the owners of two squares atomically
    Swap {
        /// Pool id
        pool: String,
        /// First square row
        a_row: u8,
        /// First square column
        a_col: u8,
        /// Second square row
        b_row: u8,
        /// Second square column
        b_col: u8,
    },
    /// Approve a pending claim
    Approve {
        /// Pool id
        pool: String,
        /// Grid row (0-9)
        row: u8,
        /// Grid column (0-9)
        col: u8,
    },
    /// Reject a pending claim
    Reject {
        /// Pool id
        pool: String,
        /// Grid row (0-9)
        row: u8,
        /// Grid column (0-9)
        col: u8,
    },
}

pub async fn handle_square_command(cmd: SquareCommands, manager: &PoolManager) -> Result<()> {
    let engine = ClaimEngine::new(manager.storage(), manager.notifier());

    match cmd {
        SquareCommands::Claim {
            pool,
            row,
            col,
            player,
            admin,
        } => {
            let pool_id = parse_pool_id(&pool)?;
            let (actor_id, role) = if admin {
                ("admin".to_string(), ActorRole::Admin)
            } else {
                (player.clone(), ActorRole::Player)
            };
            let outcome = engine
                .claim_square(pool_id, row, col, &player, &actor_id, role)
                .await?;

            match outcome {
                ClaimOutcome::Claimed { row, col } => {
                    println!("Square ({},{}) claimed by {}", row, col, player);
                }
                ClaimOutcome::PendingApproval { row, col } => {
                    println!(
                        "Square ({},{}) requested by {} - awaiting admin approval",
                        row, col, player
                    );
                }
            }
        }

        SquareCommands::Release {
            pool,
            row,
            col,
            player,
            admin,
        } => {
            let pool_id = parse_pool_id(&pool)?;
            let role = if admin {
                ActorRole::Admin
            } else {
                ActorRole::Player
            };
            engine
                .release_square(pool_id, row, col, &player, role)
                .await?;
            println!("Square ({},{}) released", row, col);
        }

        SquareCommands::Assign {
            pool,
            row,
            col,
            player,
        } => {
            let pool_id = parse_pool_id(&pool)?;
            engine
                .assign_square(pool_id, row, col, &player, "admin")
                .await?;
            println!("Square ({},{}) assigned to {}", row, col, player);
        }

        SquareCommands::Swap {
            pool,
            a_row,
            a_col,
            b_row,
            b_col,
        } => {
            let pool_id = parse_pool_id(&pool)?;
            engine
                .swap_squares(pool_id, (a_row, a_col), (b_row, b_col), "admin")
                .await?;
            println!(
                "Swapped squares ({},{}) and ({},{})",
                a_row, a_col, b_row, b_col
            );
        }

        SquareCommands::Approve { pool, row, col } => {
            let pool_id = parse_pool_id(&pool)?;
            engine.approve_square(pool_id, row, col, "admin").await?;
            println!("Claim on ({},{}) approved", row, col);
        }

        SquareCommands::Reject { pool, row, col } => {
            let pool_id = parse_pool_id(&pool)?;
            engine.reject_square(pool_id, row, col, "admin").await?;
            println!("Claim on ({},{}) rejected; square is available again", row, col);
        }
    }

    Ok(())
}
