//! One-off database maintenance commands: `migrate` and `sweep`.

use anyhow::Result;
use console::style;

use carebot_core::session::service::SessionService;
use carebot_infra::sqlite::pool::DatabasePool;
use carebot_infra::sqlite::session::SqliteSessionRepository;
use carebot_types::config::ServiceConfig;

/// Open the database (which applies pending migrations) and report them.
pub async fn migrate(config: &ServiceConfig, json: bool) -> Result<()> {
    let pool = DatabasePool::new(&config.database.url).await?;
    let applied = pool.applied_migrations().await?;
    pool.close().await;

    if json {
        let out = serde_json::json!({ "applied_migrations": applied });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "  {} Database up to date ({} migration{} applied)",
            style("✓").green(),
            applied.len(),
            if applied.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

/// Remove expired sessions once.
pub async fn sweep(config: &ServiceConfig, json: bool) -> Result<()> {
    let pool = DatabasePool::new(&config.database.url).await?;
    let sessions = SessionService::new(SqliteSessionRepository::new(pool.clone()))
        .with_default_ttl(config.session.ttl_secs);
    let removed = sessions.cleanup_expired().await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!(
            "  {} Removed {} expired session{}",
            style("✓").green(),
            removed,
            if removed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
