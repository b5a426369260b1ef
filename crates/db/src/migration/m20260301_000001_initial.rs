//! Initial database migration.
//!
//! Creates the catalog tables, the balance store and the single movements table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: CATALOG
        // ============================================================
        db.execute_unprepared(SITES_SQL).await?;
        db.execute_unprepared(ITEM_TYPES_SQL).await?;

        // ============================================================
        // PART 2: BALANCE STORE
        // ============================================================
        db.execute_unprepared(BALANCES_SQL).await?;

        // ============================================================
        // PART 3: MOVEMENT LEDGER
        // ============================================================
        db.execute_unprepared(MOVEMENTS_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const SITES_SQL: &str = r"
CREATE TABLE sites (
    id UUID PRIMARY KEY,
    code VARCHAR(50) NOT NULL UNIQUE,
    name VARCHAR(200) NOT NULL UNIQUE,
    location VARCHAR(300) NOT NULL,
    is_deleted BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_site_code_not_blank CHECK (btrim(code) <> '')
);

CREATE INDEX idx_sites_active ON sites(name) WHERE is_deleted = false;
";

const ITEM_TYPES_SQL: &str = r"
CREATE TABLE item_types (
    id UUID PRIMARY KEY,
    name VARCHAR(200) NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    unit VARCHAR(50) NOT NULL DEFAULT 'units',
    is_deleted BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_item_types_active ON item_types(name) WHERE is_deleted = false;
";

const BALANCES_SQL: &str = r"
-- One row per (site, item type) pair that has ever been touched.
CREATE TABLE balances (
    id UUID PRIMARY KEY,
    site_id UUID NOT NULL REFERENCES sites(id),
    item_type_id UUID NOT NULL REFERENCES item_types(id),
    quantity NUMERIC(10, 2) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_balances_site_item UNIQUE (site_id, item_type_id),
    CONSTRAINT chk_balance_non_negative CHECK (quantity >= 0)
);

CREATE INDEX idx_balances_item ON balances(item_type_id);
";

const MOVEMENTS_SQL: &str = r"
CREATE TABLE movements (
    id UUID PRIMARY KEY,
    kind VARCHAR(20) NOT NULL,
    item_type_id UUID NOT NULL REFERENCES item_types(id),
    quantity NUMERIC(10, 2) NOT NULL,
    effective_at TIMESTAMPTZ NOT NULL,

    -- Issuance and consumption
    site_id UUID REFERENCES sites(id),
    -- Transfer source
    source_site_id UUID REFERENCES sites(id),
    -- Acquisition and transfer destination
    destination_site_id UUID REFERENCES sites(id),

    status VARCHAR(20),
    source_description TEXT,
    recipient_name VARCHAR(200),
    recipient_personnel_id VARCHAR(100),
    returned_quantity NUMERIC(10, 2),
    return_date TIMESTAMPTZ,
    reason TEXT,

    created_by UUID NOT NULL,
    is_deleted BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_movement_kind CHECK (
        kind IN ('acquisition', 'transfer', 'issuance', 'consumption')
    ),
    CONSTRAINT chk_movement_quantity_positive CHECK (quantity > 0),
    CONSTRAINT chk_acquisition_columns CHECK (
        kind <> 'acquisition'
        OR (destination_site_id IS NOT NULL AND site_id IS NULL AND source_site_id IS NULL
            AND source_description IS NOT NULL)
    ),
    CONSTRAINT chk_transfer_columns CHECK (
        kind <> 'transfer'
        OR (source_site_id IS NOT NULL AND destination_site_id IS NOT NULL
            AND source_site_id <> destination_site_id AND site_id IS NULL
            AND status IN ('pending', 'in_transit', 'completed', 'cancelled'))
    ),
    CONSTRAINT chk_issuance_columns CHECK (
        kind <> 'issuance'
        OR (site_id IS NOT NULL AND recipient_name IS NOT NULL
            AND returned_quantity IS NOT NULL
            AND returned_quantity >= 0 AND returned_quantity <= quantity
            AND (return_date IS NULL OR returned_quantity > 0))
    ),
    CONSTRAINT chk_consumption_columns CHECK (
        kind <> 'consumption' OR (site_id IS NOT NULL AND reason IS NOT NULL)
    )
);

CREATE INDEX idx_movements_effective ON movements(effective_at DESC, created_at DESC)
    WHERE is_deleted = false;
CREATE INDEX idx_movements_site ON movements(site_id) WHERE site_id IS NOT NULL;
CREATE INDEX idx_movements_source ON movements(source_site_id) WHERE source_site_id IS NOT NULL;
CREATE INDEX idx_movements_destination ON movements(destination_site_id)
    WHERE destination_site_id IS NOT NULL;
CREATE INDEX idx_movements_item ON movements(item_type_id);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_movement_rewrite
-- Movements are append-only apart from status, returns and the
-- soft-delete flag.
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_movement_rewrite()
RETURNS TRIGGER AS $$
BEGIN
    IF NEW.kind IS DISTINCT FROM OLD.kind
        OR NEW.item_type_id IS DISTINCT FROM OLD.item_type_id
        OR NEW.quantity IS DISTINCT FROM OLD.quantity
        OR NEW.effective_at IS DISTINCT FROM OLD.effective_at
        OR NEW.site_id IS DISTINCT FROM OLD.site_id
        OR NEW.source_site_id IS DISTINCT FROM OLD.source_site_id
        OR NEW.destination_site_id IS DISTINCT FROM OLD.destination_site_id
        OR NEW.created_by IS DISTINCT FROM OLD.created_by
        OR NEW.created_at IS DISTINCT FROM OLD.created_at THEN
        RAISE EXCEPTION 'Movement % fields are immutable', OLD.id;
    END IF;

    IF NEW.returned_quantity < OLD.returned_quantity THEN
        RAISE EXCEPTION 'Movement % returned quantity cannot decrease', OLD.id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_movement_rewrite
BEFORE UPDATE ON movements
FOR EACH ROW
EXECUTE FUNCTION prevent_movement_rewrite();

-- ============================================================
-- FUNCTION: prevent_movement_hard_delete
-- Deletion is the is_deleted flag only.
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_movement_hard_delete()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Movement % cannot be deleted, set is_deleted instead', OLD.id;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_movement_delete
BEFORE DELETE ON movements
FOR EACH ROW
EXECUTE FUNCTION prevent_movement_hard_delete();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_prevent_movement_delete ON movements;
DROP TRIGGER IF EXISTS trg_prevent_movement_rewrite ON movements;
DROP FUNCTION IF EXISTS prevent_movement_hard_delete();
DROP FUNCTION IF EXISTS prevent_movement_rewrite();

DROP TABLE IF EXISTS movements CASCADE;
DROP TABLE IF EXISTS balances CASCADE;
DROP TABLE IF EXISTS item_types CASCADE;
DROP TABLE IF EXISTS sites CASCADE;
";
