//! Project entity - a tracked codebase grouping one or more repositories.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::source_system::SourceSystem;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Display ─────────────────────────────────────────────────────────────
    pub display_name: String,
    #[sea_orm(column_type = "Text")]
    pub description: Option<String>,
    /// Homepage or tracker link for the project.
    pub link: String,
    pub source_system: SourceSystem,

    // ─── Derived ─────────────────────────────────────────────────────────────
    /// Sum of the open issue counts of the project's repositories as of the
    /// last completed sync of any of them.
    pub issues_count: i64,
    /// Technology tags (JSON array of strings).
    #[sea_orm(column_type = "Json")]
    pub tags: serde_json::Value,
    /// Language breakdown (JSON object of name to percentage).
    #[sea_orm(column_type = "Json")]
    pub languages: serde_json::Value,

    // ─── Tracking ────────────────────────────────────────────────────────────
    pub last_parsed: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::repository::Entity")]
    Repositories,
    #[sea_orm(has_many = "super::issue::Entity")]
    Issues,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repositories.def()
    }
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issues.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
