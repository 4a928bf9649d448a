//! Database migration runner for Carebudget.
//!
//! Reads `DATABASE_URL` and applies the ledger schema.
//!
//! Usage:
//!   migrator up      - Apply pending migrations
//!   migrator down    - Roll back the ledger schema
//!   migrator status  - Show applied migrations
//!   migrator fresh   - Drop everything and re-apply

use carebudget_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The CLI installs its own tracing subscriber.
    cli::run_cli(Migrator).await;
}
