//! Issue entity - one tracked remote issue.
//!
//! Identity is `(source_system, remote_id)`. Issues are never deleted;
//! `closed = true` is terminal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::experience_tier::ExperienceTier;
use crate::entity::issue_type::IssueType;
use crate::entity::source_system::SourceSystem;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Remote Identity ─────────────────────────────────────────────────────
    pub source_system: SourceSystem,
    /// Tracker-wide numeric id (GitHub `databaseId`, GitLab `id`).
    pub remote_id: i64,
    /// Per-repository issue number (GitHub `number`, GitLab `iid`).
    pub number: i64,

    // ─── Content ─────────────────────────────────────────────────────────────
    #[sea_orm(column_type = "Text")]
    pub title: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub body: Option<String>,
    pub url: String,
    pub closed: bool,

    // ─── Classification ──────────────────────────────────────────────────────
    pub experience_needed: ExperienceTier,
    pub issue_type: Option<IssueType>,
    /// Raw label names (JSON array).
    #[sea_orm(column_type = "Json")]
    pub labels: serde_json::Value,
    /// Technology tags of the owning repository at sync time (JSON array).
    #[sea_orm(column_type = "Json")]
    pub technologies: serde_json::Value,

    // ─── Ownership ───────────────────────────────────────────────────────────
    pub project_id: Uuid,
    pub repository_id: Uuid,

    // ─── Timestamps ──────────────────────────────────────────────────────────
    pub remote_created_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    /// Stamped on every sync that sees the issue; drives the stale sweep.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepositoryId",
        to = "super::repository::Column::Id",
        on_delete = "Cascade"
    )]
    Repository,
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
