use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Difficulty classification derived from an issue's labels.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum ExperienceTier {
    #[sea_orm(string_value = "easy")]
    Easy,
    /// Assigned when no label says otherwise.
    #[default]
    #[sea_orm(string_value = "moderate")]
    Moderate,
    #[sea_orm(string_value = "senior")]
    Senior,
}

impl std::fmt::Display for ExperienceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperienceTier::Easy => write!(f, "easy"),
            ExperienceTier::Moderate => write!(f, "moderate"),
            ExperienceTier::Senior => write!(f, "senior"),
        }
    }
}
