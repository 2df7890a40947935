//! Accounting periods checked by the posting engine's closed-period guard.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(DOWN_SQL).await?;
        Ok(())
    }
}

const UP_SQL: &str = r"
CREATE TYPE period_status AS ENUM ('OPEN', 'CLOSED', 'LOCKED');

CREATE TABLE accounting_periods (
    id          UUID PRIMARY KEY,
    name        VARCHAR(255) NOT NULL,
    start_date  DATE NOT NULL,
    end_date    DATE NOT NULL,
    status      period_status NOT NULL DEFAULT 'OPEN',
    closed_at   TIMESTAMPTZ,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_accounting_periods_range CHECK (start_date <= end_date)
);

CREATE INDEX idx_accounting_periods_dates ON accounting_periods(start_date, end_date);
";

const DOWN_SQL: &str = r"
DROP TABLE IF EXISTS accounting_periods;
DROP TYPE IF EXISTS period_status;
";
