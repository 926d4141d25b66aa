//! Initial migration creating projects, repositories and issues.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_projects(manager).await?;
        self.create_repositories(manager).await?;
        self.create_issues(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Issues::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Repositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_projects(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Projects::DisplayName).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text().null())
                    .col(ColumnDef::new(Projects::Link).string().not_null())
                    .col(ColumnDef::new(Projects::SourceSystem).string().not_null())
                    .col(
                        ColumnDef::new(Projects::IssuesCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Projects::Tags)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Projects::Languages)
                            .json()
                            .not_null()
                            .default(Expr::cust("'{}'")),
                    )
                    .col(
                        ColumnDef::new(Projects::LastParsed)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Projects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Projects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_projects_source_system")
                    .table(Projects::Table)
                    .col(Projects::SourceSystem)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_repositories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Repositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Repositories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Repositories::ProjectId).uuid().not_null())
                    .col(
                        ColumnDef::new(Repositories::SourceSystem)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::RepositoryUrl)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::IssueCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Repositories::Tags)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Repositories::LastParsed)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Repositories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Repositories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_repositories_project")
                            .from(Repositories::Table, Repositories::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_source_url")
                    .table(Repositories::Table)
                    .col(Repositories::SourceSystem)
                    .col(Repositories::RepositoryUrl)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Scheduler key: oldest last_parsed first
        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_source_last_parsed")
                    .table(Repositories::Table)
                    .col(Repositories::SourceSystem)
                    .col(Repositories::LastParsed)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_repositories_project")
                    .table(Repositories::Table)
                    .col(Repositories::ProjectId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_issues(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Issues::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Issues::Id).uuid().not_null().primary_key())
                    // Remote identity
                    .col(ColumnDef::new(Issues::SourceSystem).string().not_null())
                    .col(ColumnDef::new(Issues::RemoteId).big_integer().not_null())
                    .col(ColumnDef::new(Issues::Number).big_integer().not_null())
                    // Content
                    .col(ColumnDef::new(Issues::Title).text().null())
                    .col(ColumnDef::new(Issues::Body).text().null())
                    .col(ColumnDef::new(Issues::Url).string().not_null())
                    .col(
                        ColumnDef::new(Issues::Closed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    // Classification
                    .col(
                        ColumnDef::new(Issues::ExperienceNeeded)
                            .string()
                            .not_null()
                            .default("moderate"),
                    )
                    .col(ColumnDef::new(Issues::IssueType).string().null())
                    .col(
                        ColumnDef::new(Issues::Labels)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    .col(
                        ColumnDef::new(Issues::Technologies)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'")),
                    )
                    // Ownership
                    .col(ColumnDef::new(Issues::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Issues::RepositoryId).uuid().not_null())
                    // Timestamps
                    .col(
                        ColumnDef::new(Issues::RemoteCreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Issues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Issues::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_repository")
                            .from(Issues::Table, Issues::RepositoryId)
                            .to(Repositories::Table, Repositories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issues_project")
                            .from(Issues::Table, Issues::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Remote ids never duplicate within a source system
        manager
            .create_index(
                Index::create()
                    .name("idx_issues_source_remote_id")
                    .table(Issues::Table)
                    .col(Issues::SourceSystem)
                    .col(Issues::RemoteId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Open-issue counts and the stale sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_issues_repository_closed_updated")
                    .table(Issues::Table)
                    .col(Issues::RepositoryId)
                    .col(Issues::Closed)
                    .col(Issues::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    DisplayName,
    Description,
    Link,
    SourceSystem,
    IssuesCount,
    Tags,
    Languages,
    LastParsed,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Repositories {
    Table,
    Id,
    ProjectId,
    SourceSystem,
    RepositoryUrl,
    IssueCount,
    Tags,
    LastParsed,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Issues {
    Table,
    Id,
    SourceSystem,
    RemoteId,
    Number,
    Title,
    Body,
    Url,
    Closed,
    ExperienceNeeded,
    IssueType,
    Labels,
    Technologies,
    ProjectId,
    RepositoryId,
    RemoteCreatedAt,
    CreatedAt,
    UpdatedAt,
}
