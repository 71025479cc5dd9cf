use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use util::test_outcome::{OutcomeError, TestOutcomeCollection};

/// A persisted result collection.
///
/// At most one row exists per `(submission_id, is_preview, orphaned)`. Reports that arrive
/// before their submission was handed to a worker are `orphaned`, so they never take the
/// slot of the real result. The full document is kept in `payload`; the counts are
/// denormalized for listing.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "test_outcome_collections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Not a foreign key: reports for unknown submissions are still kept.
    pub submission_id: i64,
    pub test_setup_id: i64,
    pub attempt_number: i64,
    pub build_status: String,
    pub is_preview: bool,
    pub orphaned: bool,
    pub passed: i32,
    pub failed: i32,
    pub errored: i32,
    pub timed_out: i32,
    pub total: i32,
    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Persists `collection` unless one with the same `(submission_id, is_preview, orphaned)`
    /// exists.
    ///
    /// Returns `true` when a row was written and `false` for a duplicate report.
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        collection: &TestOutcomeCollection,
        is_preview: bool,
        orphaned: bool,
        received_at: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let payload = serde_json::to_string(collection)
            .map_err(|e| DbErr::Custom(format!("encode collection: {e}")))?;
        let counts = collection.counts;

        let active = ActiveModel {
            submission_id: Set(collection.submission_id),
            test_setup_id: Set(collection.test_setup_id),
            attempt_number: Set(collection.attempt_number),
            build_status: Set(collection.build_status.as_str().to_string()),
            is_preview: Set(is_preview),
            orphaned: Set(orphaned),
            passed: Set(counts.passed as i32),
            failed: Set(counts.failed as i32),
            errored: Set(counts.errored as i32),
            timed_out: Set(counts.timed_out as i32),
            total: Set(counts.total as i32),
            payload: Set(payload),
            received_at: Set(received_at),
            ..Default::default()
        };

        let inserted = Entity::insert(active)
            .on_conflict(
                OnConflict::columns([
                    Column::SubmissionId,
                    Column::IsPreview,
                    Column::Orphaned,
                ])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        Ok(inserted == 1)
    }

    /// Accepted results for a submission, the worker result before the preview.
    pub async fn find_by_submission<C: ConnectionTrait>(
        db: &C,
        submission_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::SubmissionId.eq(submission_id))
            .filter(Column::Orphaned.eq(false))
            .order_by_asc(Column::IsPreview)
            .all(db)
            .await
    }

    pub async fn find_orphaned<C: ConnectionTrait>(
        db: &C,
        submission_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::SubmissionId.eq(submission_id))
            .filter(Column::Orphaned.eq(true))
            .order_by_asc(Column::ReceivedAt)
            .all(db)
            .await
    }

    /// Decodes the stored document.
    pub fn collection(&self) -> Result<TestOutcomeCollection, OutcomeError> {
        serde_json::from_str(&self.payload).map_err(|e| OutcomeError::Malformed(e.to_string()))
    }
}
