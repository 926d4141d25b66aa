use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of work an issue asks for. Stored as `NULL` when unclassified.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    #[sea_orm(string_value = "bugfix")]
    Bugfix,
    #[sea_orm(string_value = "enhancement")]
    Enhancement,
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueType::Bugfix => write!(f, "bugfix"),
            IssueType::Enhancement => write!(f, "enhancement"),
        }
    }
}
