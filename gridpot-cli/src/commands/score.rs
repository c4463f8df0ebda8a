use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use gridpot_core::storage::ScoreStore;
use gridpot_core::{ActorRole, PoolManager, Result, WinnerEngine};

use super::pool::parse_pool_id;

#[derive(Subcommand)]
pub enum ScoreCommands {
    /// Enter a period's final score and resolve the winner
    Enter {
        /// Pool id
        pool: String,
        /// Period key (e.g. q1, q2, q3, q4, ot)
        period: String,
        /// Away team score
        away: i64,
        /// Home team score
        home: i64,
        /// Override the payout percentage for this period (0-100)
        #[arg(long)]
        pct: Option<i64>,
    },
    /// List entered scores for a pool
    List {
        /// Pool id
        pool: String,
    },
    /// List resolved winners for a pool
    Winners {
        /// Pool id
        pool: String,
    },
}

pub async fn handle_score_command(cmd: ScoreCommands, manager: &PoolManager) -> Result<()> {
    match cmd {
        ScoreCommands::Enter {
            pool,
            period,
            away,
            home,
            pct,
        } => {
            let pool_id = parse_pool_id(&pool)?;
            let engine = WinnerEngine::new(manager.storage(), manager.notifier());
            let winner = engine
                .enter_score(pool_id, &period, away, home, pct, "admin", ActorRole::Admin)
                .await?;

            println!("Score recorded: away {} / home {}", away, home);
            match winner {
                Some(winner) => {
                    println!(
                        "Winner: {} on square ({},{}) - payout ${}, suggested tip ${}",
                        winner.player_id,
                        winner.row,
                        winner.col,
                        winner.payout_amount,
                        winner.tip_suggestion
                    );
                }
                None => {
                    println!("Winning square is unowned; payout stays in the pool");
                }
            }
        }

        ScoreCommands::List { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            let storage = manager.storage();
            let scores = ScoreStore::new(&storage).list_scores(pool_id).await?;
            if scores.is_empty() {
                println!("No scores entered yet");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Period", "Away", "Home", "Pct", "Entered"]);
            for score in scores {
                table.add_row(vec![
                    score.period_label.clone(),
                    score.away_score.to_string(),
                    score.home_score.to_string(),
                    format!("{}%", score.payout_pct),
                    score.entered_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{}", table);
        }

        ScoreCommands::Winners { pool } => {
            let pool_id = parse_pool_id(&pool)?;
            let storage = manager.storage();
            let winners = ScoreStore::new(&storage).list_winners(pool_id).await?;
            if winners.is_empty() {
                println!("No winners resolved yet");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Period", "Player", "Square", "Payout", "Tip"]);
            for winner in winners {
                table.add_row(vec![
                    winner.period_key.clone(),
                    winner.player_id.clone(),
                    format!("({},{})", winner.row, winner.col),
                    format!("${}", winner.payout_amount),
                    format!("${}", winner.tip_suggestion),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
