//! Source system enum identifying which tracker a record came from.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Issue trackers the worker can ingest from.
///
/// Remote ids are only unique within a single source system, so every
/// issue, repository and project carries this flag.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum SourceSystem {
    /// github.com, via the GraphQL API.
    #[sea_orm(string_value = "github")]
    GitHub,
    /// gitlab.com or a self-hosted GitLab, via the REST API.
    #[sea_orm(string_value = "gitlab")]
    GitLab,
}

impl SourceSystem {
    /// All source systems, in polling order.
    pub const ALL: [SourceSystem; 2] = [SourceSystem::GitHub, SourceSystem::GitLab];
}

impl std::fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSystem::GitHub => write!(f, "github"),
            SourceSystem::GitLab => write!(f, "gitlab"),
        }
    }
}

impl std::str::FromStr for SourceSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(SourceSystem::GitHub),
            "gitlab" => Ok(SourceSystem::GitLab),
            _ => Err(format!("Unknown source system: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SourceSystem::GitHub.to_string(), "github");
        assert_eq!(SourceSystem::GitLab.to_string(), "gitlab");
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "GitHub".parse::<SourceSystem>().unwrap(),
            SourceSystem::GitHub
        );
        assert_eq!(
            "gitlab".parse::<SourceSystem>().unwrap(),
            SourceSystem::GitLab
        );
        assert!("gitea".parse::<SourceSystem>().is_err());
    }
}
