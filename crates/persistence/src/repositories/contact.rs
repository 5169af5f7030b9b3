//! Contact repository.
//!
//! Predicate-driven queries fetch the client's contacts in creation
//! order and evaluate the compiled predicate in process, so `count` and
//! `query` share exactly the same match path. Audiences are bounded per
//! client; the scan keeps the predicate semantics in one place instead
//! of duplicating them in SQL.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::contact::UpsertContactRequest;
use domain::models::Contact;
use domain::services::segmentation::CompiledFilter;
use domain::stores::ContactStore;

use crate::entities::ContactEntity;
use crate::metrics::QueryTimer;

/// Postgres-backed contact store.
#[derive(Clone)]
pub struct PgContactStore {
    pool: PgPool,
}

impl PgContactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn matching(
        &self,
        client_id: Uuid,
        filter: &CompiledFilter,
    ) -> Result<Vec<Contact>, EngineError> {
        let timer = QueryTimer::new("query_contacts_by_filter");
        let rows = sqlx::query_as::<_, ContactEntity>(
            r#"
            SELECT * FROM contacts WHERE client_id = $1 ORDER BY id ASC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        Ok(rows
            .into_iter()
            .map(Contact::from)
            .filter(|c| filter.matches(c))
            .collect())
    }
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn upsert(
        &self,
        client_id: Uuid,
        request: UpsertContactRequest,
    ) -> Result<Contact, EngineError> {
        let timer = QueryTimer::new("upsert_contact");
        let attributes = serde_json::to_value(&request.attributes)
            .map_err(|e| EngineError::Store(e.to_string()))?;
        let entity = sqlx::query_as::<_, ContactEntity>(
            r#"
            INSERT INTO contacts (contact_id, client_id, phone, email, attributes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (client_id, phone) DO UPDATE
            SET email = EXCLUDED.email,
                attributes = EXCLUDED.attributes,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(attributes)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(entity.into())
    }

    async fn find_by_client_and_phone(
        &self,
        client_id: Uuid,
        phone: &str,
    ) -> Result<Option<Contact>, EngineError> {
        let timer = QueryTimer::new("find_contact_by_phone");
        let entity = sqlx::query_as::<_, ContactEntity>(
            r#"
            SELECT * FROM contacts WHERE client_id = $1 AND phone = $2
            "#,
        )
        .bind(client_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        Ok(entity.map(Contact::from))
    }

    async fn find_by_contact_id(&self, contact_id: Uuid) -> Result<Option<Contact>, EngineError> {
        let timer = QueryTimer::new("find_contact_by_id");
        let entity = sqlx::query_as::<_, ContactEntity>(
            r#"
            SELECT * FROM contacts WHERE contact_id = $1
            "#,
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        Ok(entity.map(Contact::from))
    }

    async fn query(
        &self,
        client_id: Uuid,
        filter: &CompiledFilter,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Contact>, EngineError> {
        let matches = self.matching(client_id, filter).await?;
        let iter = matches.into_iter().skip(offset as usize);
        Ok(match limit {
            Some(n) => iter.take(n as usize).collect(),
            None => iter.collect(),
        })
    }

    async fn count(&self, client_id: Uuid, filter: &CompiledFilter) -> Result<u64, EngineError> {
        Ok(self.matching(client_id, filter).await?.len() as u64)
    }

    async fn delete(&self, client_id: Uuid, contact_id: Uuid) -> Result<bool, EngineError> {
        let timer = QueryTimer::new("delete_contact");
        let result = sqlx::query(
            r#"
            DELETE FROM contacts WHERE client_id = $1 AND contact_id = $2
            "#,
        )
        .bind(client_id)
        .bind(contact_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    async fn delete_bulk(&self, client_id: Uuid, contact_ids: &[Uuid]) -> Result<u64, EngineError> {
        let timer = QueryTimer::new("delete_contacts_bulk");
        let result = sqlx::query(
            r#"
            DELETE FROM contacts WHERE client_id = $1 AND contact_id = ANY($2)
            "#,
        )
        .bind(client_id)
        .bind(contact_ids)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}
