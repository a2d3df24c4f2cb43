pub mod admin;
pub mod auth;
pub mod catalog;
pub mod deposits;
pub mod ledger;
pub mod settlement;
pub mod sqlite_store;
pub mod withdrawals;

pub use admin::AdminService;
pub use auth::{AuthError, AuthService};
pub use catalog::{CurrencyCatalog, PriceOrigin, RefreshOutcome};
pub use deposits::DepositWorkflow;
pub use ledger::Ledger;
pub use settlement::{FixedOutcome, OutcomeSource, RandomOutcome, SettlementEngine, SweepReport};
pub use sqlite_store::SqliteStore;
pub use withdrawals::WithdrawalWorkflow;
