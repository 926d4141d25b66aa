//! SeaORM entity definitions for the fixme database schema.

pub mod experience_tier;
pub mod issue;
pub mod issue_type;
pub mod prelude;
pub mod project;
pub mod repository;
pub mod source_system;
