//! Client account repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use domain::error::EngineError;
use domain::stores::AccountStore;

use crate::entities::ClientAccountEntity;
use crate::metrics::QueryTimer;

/// Postgres-backed prepaid account store.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn balance(&self, client_id: Uuid) -> Result<f64, EngineError> {
        let timer = QueryTimer::new("account_balance");
        let row: Option<(f64,)> = sqlx::query_as(
            r#"
            SELECT balance FROM client_accounts WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        row.map(|(b,)| b)
            .ok_or_else(|| EngineError::NotFound(format!("Account for client {client_id}")))
    }

    async fn try_deduct(&self, client_id: Uuid, amount: f64) -> Result<bool, EngineError> {
        let timer = QueryTimer::new("account_try_deduct");
        // Conditional decrement: two racing sends cannot both succeed on
        // funds only one can afford, and the balance never goes negative.
        let result = sqlx::query(
            r#"
            UPDATE client_accounts
            SET balance = balance - $2, updated_at = NOW()
            WHERE client_id = $1 AND balance >= $2
            "#,
        )
        .bind(client_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    async fn add(&self, client_id: Uuid, amount: f64) -> Result<(), EngineError> {
        let timer = QueryTimer::new("account_add");
        sqlx::query(
            r#"
            UPDATE client_accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn allowed_senders(&self, client_id: Uuid) -> Result<Vec<String>, EngineError> {
        let timer = QueryTimer::new("account_allowed_senders");
        let entity = sqlx::query_as::<_, ClientAccountEntity>(
            r#"
            SELECT * FROM client_accounts WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        Ok(entity.map(|e| e.senders()).unwrap_or_default())
    }
}
