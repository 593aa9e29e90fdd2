//! Postgres-backed ledger (`postgres` feature).
//!
//! Batches are appended inside one transaction; a failed insert rolls the
//! whole batch back. Balances are aggregated in SQL. Appends take a
//! transaction-scoped advisory lock per SKU so the overflow check sees the
//! committed totals.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use stockroom_core::{SkuId, TransactionId};
use stockroom_inventory::{InventoryTransaction, StockBalance, TxnReason, TxnType};

use super::InventoryLedger;
use crate::error::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory_transactions (
    id UUID PRIMARY KEY,
    sku_id UUID NOT NULL,
    txn_type TEXT NOT NULL,
    qty BIGINT NOT NULL CHECK (qty > 0),
    reason TEXT NOT NULL,
    reference_id TEXT,
    notes TEXT,
    created_by TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    seq BIGSERIAL NOT NULL
)
"#;

const SKU_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS inventory_transactions_sku_idx
    ON inventory_transactions (sku_id, seq)
"#;

const BALANCE: &str = r#"
SELECT
    COALESCE(SUM(qty) FILTER (WHERE txn_type = 'inward'), 0)::BIGINT AS total_inward,
    COALESCE(SUM(qty) FILTER (WHERE txn_type = 'outward'), 0)::BIGINT AS total_outward,
    COALESCE(SUM(qty) FILTER (WHERE txn_type = 'reserved'), 0)::BIGINT AS reserved
FROM inventory_transactions
WHERE sku_id = $1
"#;

#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the ledger table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        sqlx::query(SKU_INDEX)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl InventoryLedger for PostgresLedger {
    #[instrument(skip(self, txns), fields(count = txns.len()), err)]
    async fn append_batch(&self, txns: Vec<InventoryTransaction>) -> Result<(), StoreError> {
        if txns.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut sku_ids: Vec<SkuId> = txns.iter().map(|t| t.sku_id).collect();
        sku_ids.sort();
        sku_ids.dedup();

        let mut staged = HashMap::with_capacity(sku_ids.len());
        for sku_id in sku_ids {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(sku_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_sku", e))?;
            staged.insert(sku_id, fetch_balance(&mut *tx, sku_id).await?);
        }
        for txn in &txns {
            if let Some(balance) = staged.get_mut(&txn.sku_id) {
                balance.apply(txn)?;
            }
        }

        for txn in &txns {
            sqlx::query(
                r#"
                INSERT INTO inventory_transactions (
                    id, sku_id, txn_type, qty, reason,
                    reference_id, notes, created_by, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(*txn.id.as_uuid())
            .bind(*txn.sku_id.as_uuid())
            .bind(txn.txn_type.as_str())
            .bind(txn.qty)
            .bind(txn.reason.as_str())
            .bind(txn.reference_id.as_deref())
            .bind(txn.notes.as_deref())
            .bind(txn.created_by.as_deref())
            .bind(txn.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_transaction", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn balance(&self, sku_id: SkuId) -> Result<StockBalance, StoreError> {
        fetch_balance(&*self.pool, sku_id).await
    }

    async fn balances(&self) -> Result<HashMap<SkuId, StockBalance>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                sku_id,
                COALESCE(SUM(qty) FILTER (WHERE txn_type = 'inward'), 0)::BIGINT AS total_inward,
                COALESCE(SUM(qty) FILTER (WHERE txn_type = 'outward'), 0)::BIGINT AS total_outward,
                COALESCE(SUM(qty) FILTER (WHERE txn_type = 'reserved'), 0)::BIGINT AS reserved
            FROM inventory_transactions
            GROUP BY sku_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("balances", e))?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let sku_id: uuid::Uuid = row
                .try_get("sku_id")
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            out.insert(SkuId::from_uuid(sku_id), balance_from_row(&row)?);
        }
        Ok(out)
    }

    async fn history(
        &self,
        sku_id: Option<SkuId>,
        limit: usize,
    ) -> Result<Vec<InventoryTransaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sku_id, txn_type, qty, reason, reference_id, notes, created_by, created_at
            FROM inventory_transactions
            WHERE ($1::uuid IS NULL OR sku_id = $1)
            ORDER BY seq DESC
            LIMIT $2
            "#,
        )
        .bind(sku_id.map(|id| *id.as_uuid()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("history", e))?;

        rows.iter().map(transaction_from_row).collect()
    }

    async fn has_reference(&self, sku_id: SkuId, reference: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM inventory_transactions
                WHERE sku_id = $1 AND reference_id = $2
            ) AS present
            "#,
        )
        .bind(*sku_id.as_uuid())
        .bind(reference)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("has_reference", e))?;

        row.try_get("present")
            .map_err(|e| StoreError::Corrupt(format!("present: {e}")))
    }
}

async fn fetch_balance<'e, E>(executor: E, sku_id: SkuId) -> Result<StockBalance, StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    let row = sqlx::query(BALANCE)
        .bind(*sku_id.as_uuid())
        .fetch_one(executor)
        .await
        .map_err(|e| map_sqlx_error("balance", e))?;

    balance_from_row(&row)
}

fn balance_from_row(row: &PgRow) -> Result<StockBalance, StoreError> {
    let get = |col: &str| -> Result<i64, StoreError> {
        row.try_get::<i64, _>(col)
            .map_err(|e| StoreError::Corrupt(format!("{col}: {e}")))
    };
    Ok(StockBalance {
        total_inward: get("total_inward")?,
        total_outward: get("total_outward")?,
        reserved: get("reserved")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<InventoryTransaction, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(e.to_string());

    let txn_type: String = row.try_get("txn_type").map_err(corrupt)?;
    let reason: String = row.try_get("reason").map_err(corrupt)?;
    let id: uuid::Uuid = row.try_get("id").map_err(corrupt)?;
    let sku_id: uuid::Uuid = row.try_get("sku_id").map_err(corrupt)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;

    Ok(InventoryTransaction {
        id: TransactionId::from_uuid(id),
        sku_id: SkuId::from_uuid(sku_id),
        txn_type: TxnType::parse(&txn_type)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown txn_type '{txn_type}'")))?,
        qty: row.try_get("qty").map_err(corrupt)?,
        reason: TxnReason::parse(&reason)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown reason '{reason}'")))?,
        reference_id: row.try_get("reference_id").map_err(corrupt)?,
        notes: row.try_get("notes").map_err(corrupt)?,
        created_by: row.try_get("created_by").map_err(corrupt)?,
        created_at,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    let message = match err {
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => format!("{} (sqlstate {code})", db_err.message()),
            None => db_err.message().to_string(),
        },
        sqlx::Error::PoolClosed => "connection pool closed".to_string(),
        other => other.to_string(),
    };
    StoreError::Database {
        operation: operation.to_string(),
        message,
    }
}
