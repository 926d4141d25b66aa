//! Repository entity - a single remote repository polled for issues.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::source_system::SourceSystem;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repositories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub source_system: SourceSystem,
    /// Web URL of the repository, e.g. `https://github.com/owner/name`.
    pub repository_url: String,
    /// Open issues as of the last completed sync.
    pub issue_count: i64,
    /// Technology tags (JSON array of strings).
    #[sea_orm(column_type = "Json")]
    pub tags: serde_json::Value,
    /// When the last full issue walk completed. Never-synced rows hold the
    /// Unix epoch so they sort first.
    pub last_parsed: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id",
        on_delete = "Cascade"
    )]
    Project,
    #[sea_orm(has_many = "super::issue::Entity")]
    Issues,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issues.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Tag set as plain strings, ignoring any non-string JSON entries.
    pub fn tag_list(&self) -> Vec<String> {
        json_strings(&self.tags)
    }

    /// `last_parsed` in UTC.
    pub fn last_parsed_utc(&self) -> DateTime<Utc> {
        self.last_parsed.with_timezone(&Utc)
    }
}

/// Collect the string members of a JSON array.
pub(crate) fn json_strings(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_strings_skips_non_strings() {
        let value = json!(["React", 3, null, "Node"]);
        assert_eq!(json_strings(&value), vec!["React", "Node"]);
    }

    #[test]
    fn test_json_strings_non_array() {
        assert!(json_strings(&json!({"a": 1})).is_empty());
    }
}
