use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};
use serde::Serialize;
use util::manifest::{Manifest, ManifestError};
use util::paths;

/// Instructor-provided test bundle plus the manifest describing how to grade against it.
///
/// Immutable after creation except for the notebook path backfill and manifest
/// normalization.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "test_setups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Manifest JSON as stored.
    #[sea_orm(column_type = "Text")]
    pub manifest: String,
    /// Storage key of the bundle archive.
    pub path: String,
    /// Storage key of the canonical instructor notebook, if any.
    pub notebook_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::submission::Entity")]
    Submissions,
}

impl Related<super::submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Inserts a test setup and points its `path` at the bundle key derived from the new id.
    ///
    /// The manifest is stored exactly as given; callers validate it first.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        name: &str,
        manifest: &Manifest,
    ) -> Result<Model, DbErr> {
        let now = Utc::now();
        let inserted = ActiveModel {
            name: Set(name.to_string()),
            manifest: Set(manifest.to_json()),
            path: Set(String::new()),
            notebook_path: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let mut active: ActiveModel = inserted.clone().into();
        active.path = Set(key_string(paths::test_setup_bundle_key(inserted.id)));
        active.update(db).await
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Records the canonical notebook key for a setup created before one was uploaded.
    pub async fn set_notebook_path<C: ConnectionTrait>(
        db: &C,
        id: i64,
        notebook_path: &str,
    ) -> Result<Model, DbErr> {
        let mut active: ActiveModel = Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Test setup not found".to_string()))?
            .into();
        active.notebook_path = Set(Some(notebook_path.to_string()));
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    /// Rewrites the stored manifest in normalized form.
    ///
    /// Returns the updated row, or `DbErr::Custom` when the stored manifest no longer
    /// validates.
    pub async fn normalize_manifest<C: ConnectionTrait>(db: &C, id: i64) -> Result<Model, DbErr> {
        let existing = Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Test setup not found".to_string()))?;
        let normalized = Manifest::parse_for_upload(&existing.manifest)
            .map_err(|e| DbErr::Custom(format!("stored manifest invalid: {e}")))?;

        let mut active: ActiveModel = existing.into();
        active.manifest = Set(normalized.to_json());
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    /// Decodes the stored manifest.
    pub fn decoded_manifest(&self) -> Result<Manifest, ManifestError> {
        Manifest::from_json(&self.manifest)
    }
}

pub(crate) fn key_string(key: std::path::PathBuf) -> String {
    key.to_string_lossy().replace('\\', "/")
}
