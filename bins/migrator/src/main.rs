//! Ledger schema migration runner.
//!
//! Usage:
//!   migrator up      - Create enums, the entry number sequence, tables and triggers
//!   migrator down    - Drop the ledger schema
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop everything and re-run migrations
//!
//! The connection string is read from `DATABASE_URL`.

use saldo_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The CLI installs its own subscriber.
    cli::run_cli(Migrator).await;
}
