use anyhow::Result;
use palbot::daemon::DaemonServer;
use palbot::{AdminConfig, AllowListPolicy, Dispatcher, Orchestrator};
use std::sync::Arc;

pub(crate) async fn cmd_serve(config: AdminConfig) -> Result<()> {
    let policy = AllowListPolicy::from_config(&config.access);
    if policy.is_empty() {
        tracing::warn!("No users, roles or relay token are allowed; every command will be denied");
    }

    let orchestrator = Arc::new(Orchestrator::from_config(&config));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(policy), orchestrator)?);

    tracing::info!(
        service = %config.server.service_name,
        saves = %config.server.save_dir.display(),
        backups = %config.backup.dir.display(),
        retention = config.backup.max_backups,
        "Managing game server"
    );

    let mut server = DaemonServer::new(config.socket_path(), dispatcher);
    if let Some(url) = &config.daemon.report_webhook_url {
        tracing::info!("Mirroring reports to webhook");
        server = server.with_webhook(url.clone())?;
    }
    server.run().await
}
