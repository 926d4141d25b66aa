use fixme::db;
use fixme::migration::{Migrator, MigratorTrait};

use crate::MigrateAction;

/// Line printed before `action` touches the issue schema.
fn announce(action: &MigrateAction) -> &'static str {
    match action {
        MigrateAction::Up => "Creating or upgrading the projects, repositories and issues tables...",
        MigrateAction::Down => "Reverting the most recent schema change (issue data may be dropped)...",
        MigrateAction::Status => "Schema changes recorded in fixme_migrations:",
        MigrateAction::Fresh => {
            "Dropping projects, repositories and issues, then rebuilding the schema..."
        }
    }
}

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;
    println!("{}", announce(&action));

    match action {
        MigrateAction::Up => {
            let pending = Migrator::get_pending_migrations(&db).await?;
            Migrator::up(&db, None).await?;
            println!(
                "Issue schema is current ({} change(s) applied).",
                pending.len()
            );
        }
        MigrateAction::Down => {
            Migrator::down(&db, Some(1)).await?;
            println!("Reverted. Run `fixme migrate up` before polling again.");
        }
        MigrateAction::Status => {
            Migrator::status(&db).await?;
        }
        MigrateAction::Fresh => {
            Migrator::fresh(&db).await?;
            println!("Empty issue schema ready. Register repositories before running `fixme run`.");
        }
    }

    Ok(())
}
