use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};

/// Lifecycle of a submission.
///
/// `pending -> assigned -> complete` is the worker path. Browser previews are
/// created directly in `browser-complete`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "browser-complete")]
    BrowserComplete,
    #[sea_orm(string_value = "complete")]
    Complete,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Assigned => "assigned",
            SubmissionStatus::BrowserComplete => "browser-complete",
            SubmissionStatus::Complete => "complete",
            SubmissionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One graded attempt.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub test_setup_id: i64,
    /// Owning user, when the intake boundary knows one.
    pub user_id: Option<i64>,
    /// 1-based, monotonic per (test setup, user).
    pub attempt_number: i64,
    pub status: SubmissionStatus,
    pub worker_id: Option<String>,
    pub worker_hostname: Option<String>,
    /// Storage key of the submitted artifact.
    pub path: String,
    /// Original filename as uploaded.
    pub filename: Option<String>,
    /// Hex SHA-256 of the artifact bytes.
    pub file_hash: String,
    /// Set on the authoritative re-run of a browser preview; points at the preview record.
    pub preview_submission_id: Option<i64>,
    pub submitted_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::test_setup::Entity",
        from = "Column::TestSetupId",
        to = "super::test_setup::Column::Id"
    )]
    TestSetup,
}

impl Related<super::test_setup::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TestSetup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fields supplied by the intake boundary when a submission is created.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub test_setup_id: i64,
    pub user_id: Option<i64>,
    pub filename: Option<String>,
    pub file_hash: String,
}

impl Model {
    /// Attempt number the next submission for `(test_setup_id, user_id)` receives.
    ///
    /// Re-run records of a browser preview share the preview's attempt, so they are not
    /// counted.
    pub async fn next_attempt_number<C: ConnectionTrait>(
        db: &C,
        test_setup_id: i64,
        user_id: Option<i64>,
    ) -> Result<i64, DbErr> {
        let mut query = Entity::find()
            .filter(Column::TestSetupId.eq(test_setup_id))
            .filter(Column::PreviewSubmissionId.is_null());
        query = match user_id {
            Some(uid) => query.filter(Column::UserId.eq(uid)),
            None => query.filter(Column::UserId.is_null()),
        };
        let prior = query.count(db).await?;
        Ok(prior as i64 + 1)
    }

    /// Creates a `pending` submission.
    ///
    /// `key_for` maps the computed attempt number to the artifact's storage key. Run
    /// this inside a transaction together with the artifact write so that a failed write
    /// leaves no row behind.
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        new: NewSubmission,
        key_for: impl FnOnce(i64) -> String,
    ) -> Result<Model, DbErr> {
        let attempt = Self::next_attempt_number(db, new.test_setup_id, new.user_id).await?;
        Self::insert_with_status(db, &new, attempt, key_for(attempt), SubmissionStatus::Pending, None)
            .await
    }

    /// Creates the browser-preview record (`browser-complete`) and its authoritative
    /// re-run (`pending`), linked through `preview_submission_id`.
    ///
    /// Both rows share the artifact path and attempt number. Returns `(preview, rerun)`.
    pub async fn create_browser_preview<C: ConnectionTrait>(
        db: &C,
        new: NewSubmission,
        key_for: impl FnOnce(i64) -> String,
    ) -> Result<(Model, Model), DbErr> {
        let attempt = Self::next_attempt_number(db, new.test_setup_id, new.user_id).await?;
        let path = key_for(attempt);
        let preview = Self::insert_with_status(
            db,
            &new,
            attempt,
            path.clone(),
            SubmissionStatus::BrowserComplete,
            None,
        )
        .await?;
        let rerun = Self::insert_with_status(
            db,
            &new,
            attempt,
            path,
            SubmissionStatus::Pending,
            Some(preview.id),
        )
        .await?;
        Ok((preview, rerun))
    }

    async fn insert_with_status<C: ConnectionTrait>(
        db: &C,
        new: &NewSubmission,
        attempt_number: i64,
        path: String,
        status: SubmissionStatus,
        preview_submission_id: Option<i64>,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        ActiveModel {
            test_setup_id: Set(new.test_setup_id),
            user_id: Set(new.user_id),
            attempt_number: Set(attempt_number),
            status: Set(status),
            worker_id: Set(None),
            worker_hostname: Set(None),
            path: Set(path),
            filename: Set(new.filename.clone()),
            file_hash: Set(new.file_hash.clone()),
            preview_submission_id: Set(preview_submission_id),
            submitted_at: Set(now),
            assigned_at: Set(None),
            completed_at: Set(None),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// The re-run record created for a browser preview, if any.
    pub async fn find_rerun_of<C: ConnectionTrait>(
        db: &C,
        preview_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::PreviewSubmissionId.eq(preview_id))
            .one(db)
            .await
    }

    /// Claims the oldest pending submission for `worker_id`.
    ///
    /// Each candidate is moved to `assigned` with an update conditioned on its status
    /// still being `pending`; when another claimant wins that row the next oldest is
    /// tried. Returns `None` once nothing is pending.
    pub async fn claim_next<C: ConnectionTrait>(
        db: &C,
        worker_id: &str,
        hostname: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Model>, DbErr> {
        loop {
            let Some(candidate) = Entity::find()
                .filter(Column::Status.eq(SubmissionStatus::Pending))
                .order_by_asc(Column::SubmittedAt)
                .order_by_asc(Column::Id)
                .one(db)
                .await?
            else {
                return Ok(None);
            };

            let result = Entity::update_many()
                .set(ActiveModel {
                    status: Set(SubmissionStatus::Assigned),
                    worker_id: Set(Some(worker_id.to_string())),
                    worker_hostname: Set(hostname.map(str::to_string)),
                    assigned_at: Set(Some(now)),
                    updated_at: Set(now),
                    ..Default::default()
                })
                .filter(Column::Id.eq(candidate.id))
                .filter(Column::Status.eq(SubmissionStatus::Pending))
                .exec(db)
                .await?;

            if result.rows_affected == 1 {
                tracing::debug!(submission_id = candidate.id, worker_id, "claimed submission");
                return Entity::find_by_id(candidate.id).one(db).await;
            }
            tracing::trace!(submission_id = candidate.id, "lost claim race, retrying");
        }
    }

    /// Moves an `assigned` submission to `complete`.
    ///
    /// Returns `false` without touching the row when it is in any other state.
    pub async fn mark_complete<C: ConnectionTrait>(
        db: &C,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .set(ActiveModel {
                status: Set(SubmissionStatus::Complete),
                completed_at: Set(Some(now)),
                updated_at: Set(now),
                ..Default::default()
            })
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(SubmissionStatus::Assigned))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Count of submissions currently in `status`.
    pub async fn count_with_status<C: ConnectionTrait>(
        db: &C,
        status: SubmissionStatus,
    ) -> Result<u64, DbErr> {
        Entity::find()
            .filter(Column::Status.eq(status))
            .count(db)
            .await
    }
}
