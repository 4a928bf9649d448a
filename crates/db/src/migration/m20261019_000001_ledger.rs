//! Ledger schema.
//!
//! Creates the budget and transaction tables, the transaction type enum and
//! the triggers that keep the ledger append-only.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: BUDGETS
        // ============================================================
        db.execute_unprepared(BUDGET_YEARS_SQL).await?;
        db.execute_unprepared(BUDGET_CATEGORIES_SQL).await?;

        // ============================================================
        // PART 3: LEDGER
        // ============================================================
        db.execute_unprepared(LEDGER_TRANSACTIONS_SQL).await?;
        db.execute_unprepared(LEDGER_LINES_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE ledger_transaction_type AS ENUM ('purchase', 'refund');
";

const BUDGET_YEARS_SQL: &str = r"
-- One budget per client and year; amounts in minor currency units
CREATE TABLE budget_years (
    id UUID PRIMARY KEY,
    client_id TEXT NOT NULL,
    year INTEGER NOT NULL,
    annual_allocated BIGINT NOT NULL DEFAULT 0,
    opening_carryover BIGINT NOT NULL DEFAULT 0,
    total_allocated BIGINT NOT NULL DEFAULT 0,
    total_spent BIGINT NOT NULL DEFAULT 0,
    surplus_override BIGINT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_budget_years_client_year UNIQUE (client_id, year),
    CONSTRAINT chk_budget_years_year CHECK (year BETWEEN 1 AND 9999),
    CONSTRAINT chk_budget_years_annual CHECK (annual_allocated >= 0),
    CONSTRAINT chk_budget_years_carryover CHECK (opening_carryover >= 0)
);
";

const BUDGET_CATEGORIES_SQL: &str = r"
CREATE TABLE budget_categories (
    id UUID PRIMARY KEY,
    budget_year_id UUID NOT NULL REFERENCES budget_years(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    category_id TEXT NOT NULL,
    category_name TEXT NOT NULL,
    allocated BIGINT NOT NULL,
    CONSTRAINT uq_budget_categories_category UNIQUE (budget_year_id, category_id),
    CONSTRAINT chk_budget_categories_allocated CHECK (allocated >= 0)
);

CREATE INDEX idx_budget_categories_year ON budget_categories(budget_year_id, position);
";

const LEDGER_TRANSACTIONS_SQL: &str = r"
CREATE TABLE ledger_transactions (
    id UUID PRIMARY KEY,
    client_id TEXT NOT NULL,
    year INTEGER NOT NULL,
    transaction_date DATE NOT NULL,
    transaction_type ledger_transaction_type NOT NULL,
    created_by_user_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    voided_at TIMESTAMPTZ,
    CONSTRAINT chk_ledger_transactions_year CHECK (year BETWEEN 1 AND 9999)
);

-- Scope reads: every query is per client and year
CREATE INDEX idx_ledger_transactions_scope
    ON ledger_transactions(client_id, year, transaction_date, created_at);
";

const LEDGER_LINES_SQL: &str = r"
CREATE TABLE ledger_lines (
    id UUID PRIMARY KEY,
    transaction_id UUID NOT NULL REFERENCES ledger_transactions(id) ON DELETE RESTRICT,
    position INTEGER NOT NULL,
    category_id TEXT NOT NULL,
    care_item_slug TEXT NOT NULL,
    label TEXT,
    amount BIGINT NOT NULL,
    refund_of_transaction_id UUID REFERENCES ledger_transactions(id) ON DELETE RESTRICT,
    refund_of_line_id UUID REFERENCES ledger_lines(id) ON DELETE RESTRICT,
    CONSTRAINT chk_ledger_lines_amount CHECK (amount > 0),
    CONSTRAINT chk_ledger_lines_refund_ref CHECK (
        (refund_of_transaction_id IS NULL) = (refund_of_line_id IS NULL)
    ),
    CONSTRAINT uq_ledger_lines_position UNIQUE (transaction_id, position)
);

-- Summing refunds per purchase line
CREATE INDEX idx_ledger_lines_refund_of ON ledger_lines(refund_of_line_id)
    WHERE refund_of_line_id IS NOT NULL;
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_ledger_line_mutation
-- Lines are immutable once written
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_ledger_line_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'ledger lines are append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_lines_immutable
BEFORE UPDATE OR DELETE ON ledger_lines
FOR EACH ROW EXECUTE FUNCTION prevent_ledger_line_mutation();

-- ============================================================
-- FUNCTION: restrict_ledger_transaction_update
-- Only voided_at may change, and only from NULL
-- ============================================================
CREATE OR REPLACE FUNCTION restrict_ledger_transaction_update()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        RAISE EXCEPTION 'ledger transactions are append-only';
    END IF;

    IF NEW.id IS DISTINCT FROM OLD.id
        OR NEW.client_id IS DISTINCT FROM OLD.client_id
        OR NEW.year IS DISTINCT FROM OLD.year
        OR NEW.transaction_date IS DISTINCT FROM OLD.transaction_date
        OR NEW.transaction_type IS DISTINCT FROM OLD.transaction_type
        OR NEW.created_by_user_id IS DISTINCT FROM OLD.created_by_user_id
        OR NEW.created_at IS DISTINCT FROM OLD.created_at THEN
        RAISE EXCEPTION 'ledger transactions are immutable except voided_at';
    END IF;

    IF OLD.voided_at IS NOT NULL AND NEW.voided_at IS DISTINCT FROM OLD.voided_at THEN
        RAISE EXCEPTION 'voided_at cannot change once set';
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_transactions_restrict
BEFORE UPDATE OR DELETE ON ledger_transactions
FOR EACH ROW EXECUTE FUNCTION restrict_ledger_transaction_update();
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS ledger_lines CASCADE;
DROP TABLE IF EXISTS ledger_transactions CASCADE;
DROP TABLE IF EXISTS budget_categories CASCADE;
DROP TABLE IF EXISTS budget_years CASCADE;
DROP FUNCTION IF EXISTS prevent_ledger_line_mutation();
DROP FUNCTION IF EXISTS restrict_ledger_transaction_update();
DROP TYPE IF EXISTS ledger_transaction_type;
";
