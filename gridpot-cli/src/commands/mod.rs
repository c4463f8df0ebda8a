pub mod ledger;
pub mod pool;
pub mod score;
pub mod square;

pub use ledger::{handle_ledger_command, LedgerCommands};
pub use pool::{handle_pool_command, PoolCommands};
pub use score::{handle_score_command, ScoreCommands};
pub use square::{handle_square_command, SquareCommands};
