use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202610010002_create_submissions"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("submissions"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("test_setup_id"))
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("user_id")).integer().null())
                    .col(
                        ColumnDef::new(Alias::new("attempt_number"))
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Alias::new("worker_id")).string().null())
                    .col(ColumnDef::new(Alias::new("worker_hostname")).string().null())
                    .col(ColumnDef::new(Alias::new("path")).string().not_null())
                    .col(ColumnDef::new(Alias::new("filename")).string().null())
                    .col(ColumnDef::new(Alias::new("file_hash")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("preview_submission_id"))
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("submitted_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(ColumnDef::new(Alias::new("assigned_at")).timestamp().null())
                    .col(ColumnDef::new(Alias::new("completed_at")).timestamp().null())
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_test_setup_id")
                            .from(Alias::new("submissions"), Alias::new("test_setup_id"))
                            .to(Alias::new("test_setups"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_preview_submission_id")
                            .from(
                                Alias::new("submissions"),
                                Alias::new("preview_submission_id"),
                            )
                            .to(Alias::new("submissions"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submissions_status_submitted_at")
                    .table(Alias::new("submissions"))
                    .col(Alias::new("status"))
                    .col(Alias::new("submitted_at"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submissions_setup_user")
                    .table(Alias::new("submissions"))
                    .col(Alias::new("test_setup_id"))
                    .col(Alias::new("user_id"))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("submissions")).to_owned())
            .await
    }
}
