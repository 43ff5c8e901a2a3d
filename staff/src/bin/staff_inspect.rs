//! Staff Inspector
//!
//! Prints a user's effective permissions from a hierarchy snapshot.
//!
//! Usage: `staff-inspect <user-id> [entity-id]`
//!
//! With an entity id, prints the permissions on that entity. Without one,
//! prints the permissions on every entity the user may administrate.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use eb_common::{EntityId, UserId};
use serde_json::json;
use tracing::info;

use eb_staff::config::StaffConfig;
use eb_staff::events::NoopSink;
use eb_staff::permissions::PermissionRecord;
use eb_staff::snapshot::HierarchySnapshot;
use eb_staff::StaffService;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = StaffConfig::from_env();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eb_staff=info".into());
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut args = std::env::args().skip(1);
    let Some(user_arg) = args.next() else {
        bail!("usage: staff-inspect <user-id> [entity-id]");
    };
    let user_id: UserId = user_arg.parse().context("invalid user id")?;
    let entity_id: Option<EntityId> = args
        .next()
        .map(|raw| raw.parse())
        .transpose()
        .context("invalid entity id")?;

    let path = config
        .snapshot_path
        .clone()
        .context("STAFF_SNAPSHOT_PATH is not set")?;
    let snapshot = HierarchySnapshot::load(&path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    let user = snapshot
        .find_user(user_id)
        .cloned()
        .with_context(|| format!("user {user_id} is not in the snapshot"))?;

    let hierarchy = snapshot.into_hierarchy()?;
    info!(
        entities = hierarchy.len(),
        memberships = hierarchy.membership_count(),
        "Snapshot loaded"
    );
    let service = StaffService::new(hierarchy, &config, std::sync::Arc::new(NoopSink));

    let entities: Vec<EntityId> = match entity_id {
        Some(id) => vec![id],
        None => service
            .administrable_scope(user.id)
            .await
            .into_iter()
            .map(|entity| entity.id)
            .collect(),
    };

    let mut report = BTreeMap::new();
    for entity in entities {
        let permissions = service.effective_permissions(&user, entity).await;
        report.insert(entity.to_string(), PermissionRecord::from(permissions));
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "user": user.id, "permissions": report }))?
    );
    Ok(())
}
