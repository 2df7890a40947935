//! Ledger schema.
//!
//! The journal invariants are enforced here as well as in `saldo-core`, so a
//! writer that bypasses the posting engine still cannot commit an unbalanced
//! or double-posted entry.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS AND SEQUENCES
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: JOURNAL
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;
        db.execute_unprepared(JOURNAL_TRIGGERS_SQL).await?;

        // ============================================================
        // PART 4: DERIVED STATE
        // ============================================================
        db.execute_unprepared(ACCOUNT_BALANCES_SQL).await?;
        db.execute_unprepared(CASH_BANKS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE account_class AS ENUM ('ASSET', 'LIABILITY', 'EQUITY', 'REVENUE', 'EXPENSE');
CREATE TYPE entry_status AS ENUM ('DRAFT', 'POSTED', 'VOID');

CREATE SEQUENCE journal_entry_number_seq AS BIGINT START WITH 1;
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id          UUID PRIMARY KEY,
    code        VARCHAR(32) NOT NULL,
    name        VARCHAR(255) NOT NULL,
    class       account_class NOT NULL,
    is_header   BOOLEAN NOT NULL DEFAULT FALSE,
    is_active   BOOLEAN NOT NULL DEFAULT TRUE,
    parent_id   UUID REFERENCES accounts(id),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_accounts_code UNIQUE (code),
    CONSTRAINT chk_accounts_not_own_parent CHECK (parent_id IS NULL OR parent_id <> id)
);

CREATE INDEX idx_accounts_parent ON accounts(parent_id);
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id            UUID PRIMARY KEY,
    entry_number  VARCHAR(64) NOT NULL,
    sequence      BIGINT NOT NULL,
    entry_date    DATE NOT NULL,
    description   TEXT NOT NULL,
    source_type   VARCHAR(64) NOT NULL,
    source_id     VARCHAR(255) NOT NULL,
    purpose       VARCHAR(64) NOT NULL,
    status        entry_status NOT NULL DEFAULT 'DRAFT',
    total_debit   NUMERIC(20, 4) NOT NULL,
    total_credit  NUMERIC(20, 4) NOT NULL,
    posted_at     TIMESTAMPTZ,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    reverses      UUID REFERENCES journal_entries(id),
    reversed_by   UUID REFERENCES journal_entries(id),
    void_reason   TEXT,

    CONSTRAINT uq_journal_entries_number UNIQUE (entry_number),
    CONSTRAINT chk_journal_entries_balanced CHECK (total_debit = total_credit),
    CONSTRAINT chk_journal_entries_positive CHECK (total_debit > 0),
    CONSTRAINT chk_journal_entries_key CHECK (
        source_type <> '' AND source_id <> '' AND purpose <> ''
    ),
    CONSTRAINT chk_journal_entries_posted_at CHECK (
        status = 'DRAFT' OR posted_at IS NOT NULL
    ),
    CONSTRAINT chk_journal_entries_void CHECK (
        status <> 'VOID' OR (reversed_by IS NOT NULL AND void_reason IS NOT NULL)
    )
);

-- At most one POSTED entry per idempotency key. Drafts and voided entries
-- do not hold their key.
CREATE UNIQUE INDEX uq_journal_entries_idempotency
    ON journal_entries (source_type, source_id, purpose)
    WHERE status = 'POSTED';

CREATE INDEX idx_journal_entries_status ON journal_entries(status);
CREATE INDEX idx_journal_entries_sequence ON journal_entries(sequence);
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id           UUID PRIMARY KEY,
    entry_id     UUID NOT NULL REFERENCES journal_entries(id),
    account_id   UUID NOT NULL REFERENCES accounts(id),
    line_number  INTEGER NOT NULL,
    debit        NUMERIC(20, 4) NOT NULL DEFAULT 0,
    credit       NUMERIC(20, 4) NOT NULL DEFAULT 0,
    description  TEXT,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_journal_lines_number UNIQUE (entry_id, line_number),
    CONSTRAINT chk_journal_lines_non_negative CHECK (debit >= 0 AND credit >= 0),
    CONSTRAINT chk_journal_lines_one_side CHECK ((debit > 0) <> (credit > 0))
);

CREATE INDEX idx_journal_lines_account ON journal_lines(account_id);
";

const JOURNAL_TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_journal_modification
-- Entries only move DRAFT -> POSTED -> VOID; posted content never changes
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_journal_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'VOID' THEN
        RAISE EXCEPTION 'Cannot modify voided journal entry %', OLD.entry_number;
    END IF;

    IF OLD.status = 'POSTED' AND NEW.status <> 'VOID' THEN
        RAISE EXCEPTION 'Cannot modify posted journal entry %. Void it instead.', OLD.entry_number;
    END IF;

    IF OLD.status <> 'DRAFT' AND (
        NEW.total_debit <> OLD.total_debit
        OR NEW.total_credit <> OLD.total_credit
        OR NEW.entry_date <> OLD.entry_date
        OR NEW.source_type <> OLD.source_type
        OR NEW.source_id <> OLD.source_id
        OR NEW.purpose <> OLD.purpose
    ) THEN
        RAISE EXCEPTION 'Cannot change the content of journal entry %', OLD.entry_number;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_journal_modification
BEFORE UPDATE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_journal_modification();

-- ============================================================
-- FUNCTION: prevent_line_modification
-- Lines are written once, with their entry
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_line_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Journal lines are append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_line_modification
BEFORE UPDATE OR DELETE ON journal_lines
FOR EACH ROW
EXECUTE FUNCTION prevent_line_modification();

-- ============================================================
-- FUNCTION: check_entry_lines_balance
-- Re-sums the lines of an entry once its transaction commits
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_lines_balance()
RETURNS TRIGGER AS $$
DECLARE
    line_debit NUMERIC(20, 4);
    line_credit NUMERIC(20, 4);
    line_count INTEGER;
BEGIN
    SELECT COALESCE(SUM(debit), 0), COALESCE(SUM(credit), 0), COUNT(*)
    INTO line_debit, line_credit, line_count
    FROM journal_lines
    WHERE entry_id = NEW.id;

    IF line_count < 2 THEN
        RAISE EXCEPTION 'Journal entry % has fewer than two lines', NEW.entry_number;
    END IF;

    IF line_debit <> line_credit
        OR line_debit <> NEW.total_debit
        OR line_credit <> NEW.total_credit THEN
        RAISE EXCEPTION 'Journal entry % is unbalanced: debit %, credit %',
            NEW.entry_number, line_debit, line_credit;
    END IF;

    RETURN NULL;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_lines_balance
AFTER INSERT ON journal_entries
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_lines_balance();
";

const ACCOUNT_BALANCES_SQL: &str = r"
CREATE TABLE account_balances (
    account_id     UUID PRIMARY KEY REFERENCES accounts(id),
    debit_total    NUMERIC(20, 4) NOT NULL DEFAULT 0,
    credit_total   NUMERIC(20, 4) NOT NULL DEFAULT 0,
    balance        NUMERIC(20, 4) NOT NULL DEFAULT 0,
    last_entry_id  UUID REFERENCES journal_entries(id),
    projected_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const CASH_BANKS_SQL: &str = r"
CREATE TABLE cash_banks (
    id                 UUID PRIMARY KEY,
    code               VARCHAR(32) NOT NULL,
    name               VARCHAR(255) NOT NULL,
    account_id         UUID REFERENCES accounts(id),
    balance            NUMERIC(20, 4) NOT NULL DEFAULT 0,
    balance_synced_at  TIMESTAMPTZ,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_cash_banks_code UNIQUE (code),
    CONSTRAINT uq_cash_banks_account UNIQUE (account_id)
);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS cash_banks;
DROP TABLE IF EXISTS account_balances;
DROP TABLE IF EXISTS journal_lines;
DROP TABLE IF EXISTS journal_entries;
DROP TABLE IF EXISTS accounts;
DROP FUNCTION IF EXISTS check_entry_lines_balance();
DROP FUNCTION IF EXISTS prevent_line_modification();
DROP FUNCTION IF EXISTS prevent_journal_modification();
DROP SEQUENCE IF EXISTS journal_entry_number_seq;
DROP TYPE IF EXISTS entry_status;
DROP TYPE IF EXISTS account_class;
";
