//! Segment preview, validation, and saved segment management.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use domain::error::EngineError;
use domain::models::segment::{CreateSegmentRequest, UpdateSegmentRequest};
use domain::models::{Contact, FilterConfig, SavedSegment};
use domain::services::segmentation::CompiledFilter;
use domain::stores::{ContactStore, SchemaStore, SegmentStore};

pub struct SegmentService {
    schemas: Arc<dyn SchemaStore>,
    contacts: Arc<dyn ContactStore>,
    segments: Arc<dyn SegmentStore>,
}

impl SegmentService {
    pub fn new(
        schemas: Arc<dyn SchemaStore>,
        contacts: Arc<dyn ContactStore>,
        segments: Arc<dyn SegmentStore>,
    ) -> Self {
        Self {
            schemas,
            contacts,
            segments,
        }
    }

    async fn compile(
        &self,
        client_id: Uuid,
        filter: &FilterConfig,
    ) -> Result<CompiledFilter, EngineError> {
        let schema = self.schemas.list_for_client(client_id).await?;
        CompiledFilter::compile(&schema, filter)
    }

    /// Check a filter against the client's schema without running it.
    /// Unknown keys or operator/type mismatches surface here.
    pub async fn validate_filter(
        &self,
        client_id: Uuid,
        filter: &FilterConfig,
    ) -> Result<(), EngineError> {
        self.compile(client_id, filter).await.map(|_| ())
    }

    pub async fn count_matches(
        &self,
        client_id: Uuid,
        filter: &FilterConfig,
    ) -> Result<u64, EngineError> {
        let compiled = self.compile(client_id, filter).await?;
        self.contacts.count(client_id, &compiled).await
    }

    /// Matching contacts in stable creation order; a limited call is
    /// always a prefix of a larger one.
    pub async fn get_matches(
        &self,
        client_id: Uuid,
        filter: &FilterConfig,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Contact>, EngineError> {
        let compiled = self.compile(client_id, filter).await?;
        self.contacts.query(client_id, &compiled, limit, offset).await
    }

    // Saved segments ------------------------------------------------------

    pub async fn create_segment(
        &self,
        client_id: Uuid,
        request: CreateSegmentRequest,
    ) -> Result<SavedSegment, EngineError> {
        request.validate()?;
        self.validate_filter(client_id, &request.filter_config).await?;

        let now = Utc::now();
        self.segments
            .create(SavedSegment {
                id: 0,
                segment_id: Uuid::new_v4(),
                client_id,
                name: request.name,
                filter_config: request.filter_config,
                created_at: now,
                updated_at: now,
            })
            .await
    }

    pub async fn update_segment(
        &self,
        segment_id: Uuid,
        request: UpdateSegmentRequest,
    ) -> Result<SavedSegment, EngineError> {
        request.validate()?;

        let mut segment = self
            .segments
            .find(segment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Segment {segment_id}")))?;

        if let Some(name) = request.name {
            segment.name = name;
        }
        if let Some(filter) = request.filter_config {
            self.validate_filter(segment.client_id, &filter).await?;
            segment.filter_config = filter;
        }
        segment.updated_at = Utc::now();
        self.segments.update(&segment).await?;
        Ok(segment)
    }

    pub async fn get_segment(&self, segment_id: Uuid) -> Result<SavedSegment, EngineError> {
        self.segments
            .find(segment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Segment {segment_id}")))
    }

    pub async fn list_segments(&self, client_id: Uuid) -> Result<Vec<SavedSegment>, EngineError> {
        self.segments.list_for_client(client_id).await
    }

    pub async fn delete_segment(&self, segment_id: Uuid) -> Result<(), EngineError> {
        if !self.segments.delete(segment_id).await? {
            return Err(EngineError::NotFound(format!("Segment {segment_id}")));
        }
        Ok(())
    }
}
