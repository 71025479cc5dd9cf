use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202610010001_create_test_setups::Migration),
            Box::new(migrations::m202610010002_create_submissions::Migration),
            Box::new(migrations::m202610010003_create_test_outcome_collections::Migration),
        ]
    }
}
