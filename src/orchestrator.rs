//! Scripted operations against the one game server this process manages.
//!
//! Lifecycle procedures (start, stop, restart, update) are linear and best
//! effort: every external call is reported, a failed step never aborts the
//! steps after it, nothing is retried and nothing is rolled back. A backup is
//! always taken before the destructive step. At most one lifecycle procedure
//! runs at a time; a second one is rejected while the first is in flight.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

use crate::backup::{extract_version, BackupStore, TarBackupStore};
use crate::banlist::BanList;
use crate::config::AdminConfig;
use crate::error::{AdminError, Result};
use crate::executor::CommandResult;
use crate::lockfile::{LockAttempt, LockFile};
use crate::rcon::{RconClient, RemoteControl};
use crate::reporter::Reporter;
use crate::service::{truncate_output, ProcessController, SystemdController, DISPLAY_BUDGET};
use crate::settings;
use crate::updater::{AppUpdater, SteamCmdUpdater};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Procedure {
    Start,
    Stop,
    Restart,
    Update,
}

impl Procedure {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Update => "update",
        }
    }

    fn progressive(&self) -> &'static str {
        match self {
            Self::Start => "Starting",
            Self::Stop => "Stopping",
            Self::Restart => "Restarting",
            Self::Update => "Updating",
        }
    }

    /// Seconds to wait after the announcement when none is given.
    pub fn default_delay(&self) -> u64 {
        match self {
            Self::Start => 3,
            Self::Stop | Self::Restart | Self::Update => 60,
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Backups kept after every successful backup
    pub retention: usize,
    /// Wait after starting the service before the control channel is queried
    pub update_grace: Duration,
    pub banlist_path: PathBuf,
    pub settings_path: PathBuf,
    pub default_settings_path: PathBuf,
    /// Host-wide lock shared with other palbot processes (daemon and `exec`)
    pub lock_path: Option<PathBuf>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AdminConfig) -> Self {
        Self {
            retention: config.backup.max_backups,
            update_grace: Duration::from_secs(config.daemon.update_grace_secs),
            banlist_path: config.server.banlist_path.clone(),
            settings_path: config.server.settings_path.clone(),
            default_settings_path: config.server.default_settings_path.clone(),
            lock_path: Some(config.lock_path()),
        }
    }
}

pub struct Orchestrator {
    rcon: Arc<dyn RemoteControl>,
    backups: Arc<dyn BackupStore>,
    service: Arc<dyn ProcessController>,
    updater: Arc<dyn AppUpdater>,
    bans: BanList,
    settings: OrchestratorSettings,
    in_flight: Mutex<Option<Procedure>>,
}

/// Clears the in-flight slot when the procedure ends. The host-wide lock, if
/// any, is released right after.
struct LifecycleGuard<'a> {
    slot: &'a Mutex<Option<Procedure>>,
    _lock: Option<LockFile>,
}

impl Drop for LifecycleGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

impl Orchestrator {
    pub fn new(
        rcon: Arc<dyn RemoteControl>,
        backups: Arc<dyn BackupStore>,
        service: Arc<dyn ProcessController>,
        updater: Arc<dyn AppUpdater>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            rcon,
            backups,
            service,
            updater,
            bans: BanList::new(settings.banlist_path.clone()),
            settings,
            in_flight: Mutex::new(None),
        }
    }

    /// Wire the real collaborators described by `config`.
    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(
            Arc::new(RconClient::from_config(&config.rcon)),
            Arc::new(TarBackupStore::from_config(
                config.server.save_dir.clone(),
                &config.backup,
            )),
            Arc::new(SystemdController::new(
                config.server.service_name.clone(),
                config.server.use_sudo,
            )),
            Arc::new(SteamCmdUpdater::new(
                config.server.steamcmd_path.clone(),
                config.server.install_dir.clone(),
                config.server.app_id.clone(),
            )),
            OrchestratorSettings::from_config(config),
        )
    }

    /// Procedure currently holding the lifecycle slot.
    pub fn in_flight(&self) -> Option<Procedure> {
        self.in_flight.lock().ok().and_then(|slot| *slot)
    }

    fn begin(&self, procedure: Procedure) -> Result<LifecycleGuard<'_>> {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = *slot {
            return Err(AdminError::Busy {
                running: running.verb().to_string(),
            });
        }

        let lock = match &self.settings.lock_path {
            Some(path) => {
                let holder = format!("pid {}: {}", std::process::id(), procedure);
                match LockFile::try_acquire(path, &holder)? {
                    LockAttempt::Acquired(lock) => Some(lock),
                    LockAttempt::Held(holder) => {
                        return Err(AdminError::Busy {
                            running: if holder.is_empty() {
                                "another palbot process".to_string()
                            } else {
                                holder
                            },
                        })
                    }
                }
            }
            None => None,
        };

        *slot = Some(procedure);
        Ok(LifecycleGuard {
            slot: &self.in_flight,
            _lock: lock,
        })
    }

    // ------------------------------------------------------------------
    // Control channel queries
    // ------------------------------------------------------------------

    async fn control(&self, label: &str, command: &str, argument: Option<&str>, out: &dyn Reporter) -> CommandResult {
        let result = self.rcon.execute(command, argument).await;
        out.report(&render_control(label, command, &result)).await;
        result
    }

    pub async fn info(&self, out: &dyn Reporter) -> Result<()> {
        self.control("Info", "Info", None, out).await;
        Ok(())
    }

    pub async fn show_players(&self, out: &dyn Reporter) -> Result<()> {
        self.control("ShowPlayers", "ShowPlayers", None, out).await;
        Ok(())
    }

    pub async fn broadcast(&self, message: &str, out: &dyn Reporter) -> Result<()> {
        self.control(":mega: Broadcast", "Broadcast", Some(message), out)
            .await;
        Ok(())
    }

    pub async fn kick_player(&self, steam_id: &str, out: &dyn Reporter) -> Result<()> {
        self.control("KickPlayer", "KickPlayer", Some(steam_id), out)
            .await;
        Ok(())
    }

    /// The game server appends the ban line itself.
    pub async fn ban_player(&self, steam_id: &str, out: &dyn Reporter) -> Result<()> {
        self.control("BanPlayer", "BanPlayer", Some(steam_id), out)
            .await;
        self.show_banlist(out).await
    }

    // ------------------------------------------------------------------
    // Ban list
    // ------------------------------------------------------------------

    pub async fn show_banlist(&self, out: &dyn Reporter) -> Result<()> {
        match self.bans.read().await {
            Ok(content) if content.trim().is_empty() => {
                out.report(":blue_book: No players are banned").await;
            }
            Ok(content) => {
                out.report(&format!(
                    ":closed_book: Banned players\n```\nsteamid\n{}```",
                    truncate_output(&content, DISPLAY_BUDGET)
                ))
                .await;
            }
            Err(AdminError::ResourceNotFound { .. }) => {
                out.report(&banlist_missing(&self.bans)).await;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    pub async fn unban_player(&self, steam_id: &str, out: &dyn Reporter) -> Result<()> {
        match self.bans.unban(steam_id).await {
            Ok(removed) if removed.is_empty() => {
                out.report(&format!(
                    ":information_source: {} is not in the ban list",
                    steam_id
                ))
                .await;
            }
            Ok(_) => {
                out.report(&format!(
                    ":construction: Removed {} from the ban list",
                    steam_id
                ))
                .await;
            }
            Err(AdminError::ResourceNotFound { .. }) => {
                out.report(&banlist_missing(&self.bans)).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        self.show_banlist(out).await
    }

    // ------------------------------------------------------------------
    // Backups
    // ------------------------------------------------------------------

    /// Archive the save directory, then prune to the retention bound if the
    /// archive verified. An archive that the prune itself removed is reported
    /// as a failed backup.
    pub async fn backup(&self, out: &dyn Reporter) -> Result<()> {
        let info = self.rcon.execute("Info", None).await;
        let version = extract_version(info.control_outcome("Info").unwrap_or_default());

        let record = match self.backups.create(&version).await {
            Ok(record) => record,
            Err(e) => {
                warn!(kind = e.slug(), "Backup failed: {}", e);
                out.report(&format!(":warning: Backup failed\n```\n{}```", e))
                    .await;
                return Ok(());
            }
        };

        let pruned = self.backups.prune(self.settings.retention).await;
        if let Ok(removed) = &pruned {
            if !removed.is_empty() {
                info!(count = removed.len(), "Pruned old backups");
            }
            if removed.contains(&record.path) {
                let e = AdminError::BackupIo {
                    path: record.path.clone(),
                    reason: format!(
                        "removed by retention; {} or more archives sort above version '{}'",
                        self.settings.retention, record.version
                    ),
                };
                warn!(kind = e.slug(), "Backup failed: {}", e);
                out.report(&format!(":warning: Backup failed\n```\n{}```", e))
                    .await;
                return Ok(());
            }
        }

        out.report(&format!(
            ":ok: Backup succeeded\n```\n{} ({} bytes, {} entries)```",
            record.file_name(),
            record.size_bytes,
            record.entries
        ))
        .await;

        if let Err(e) = pruned {
            warn!(kind = e.slug(), "Backup pruning failed: {}", e);
            out.report(&format!(":warning: Pruning old backups failed: {}", e))
                .await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Service manager
    // ------------------------------------------------------------------

    pub async fn status(&self, out: &dyn Reporter) -> Result<()> {
        let result = self.service.status().await;
        let mut text = result.stdout.clone();
        if !result.stderr.trim().is_empty() {
            text.push_str(&result.stderr);
        }
        out.report(&format!(
            "```\n{}\n{}```",
            self.service.status_heading(),
            truncate_output(&text, DISPLAY_BUDGET)
        ))
        .await;
        Ok(())
    }

    async fn service_step(&self, procedure: Procedure, out: &dyn Reporter) {
        out.report(&format!(
            ":construction: {} the server...",
            procedure.progressive()
        ))
        .await;
        let result = match procedure {
            Procedure::Start => self.service.start().await,
            Procedure::Stop => self.service.stop().await,
            Procedure::Restart => self.service.restart().await,
            Procedure::Update => return,
        };
        let message = match result.service_outcome(procedure.verb()) {
            Ok(_) => format!(":ok: Server {} completed", procedure),
            Err(e) => {
                warn!(kind = e.slug(), "{}", e);
                format!(":warning: Server {} did not complete\n```\n{}```", procedure, e)
            }
        };
        out.report(&message).await;
    }

    // ------------------------------------------------------------------
    // Lifecycle procedures
    // ------------------------------------------------------------------

    /// Run one lifecycle procedure to completion. Rejected with a report when
    /// another lifecycle procedure is in flight.
    pub async fn run_lifecycle(&self, procedure: Procedure, delay_secs: u64, out: &dyn Reporter) -> Result<()> {
        let _guard = match self.begin(procedure) {
            Ok(guard) => guard,
            Err(e @ AdminError::Busy { .. }) => {
                warn!(requested = %procedure, kind = e.slug(), "{}", e);
                out.report(&format!(":no_entry: {}", e)).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        info!(procedure = %procedure, delay_secs, "Lifecycle procedure started");

        match procedure {
            Procedure::Update => self.update_sequence(delay_secs, out).await?,
            _ => self.service_sequence(procedure, delay_secs, out).await?,
        }

        info!(procedure = %procedure, "Lifecycle procedure finished");
        Ok(())
    }

    async fn announce(&self, procedure: Procedure, delay_secs: u64, out: &dyn Reporter) {
        out.report(&format!(
            ":muscle: The server will {} in {} seconds.\nPlease prepare to exit the game.",
            procedure, delay_secs
        ))
        .await;
    }

    async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            info!(secs = duration.as_secs(), "Waiting");
            tokio::time::sleep(duration).await;
        }
    }

    /// announce, broadcast, wait, backup, service action, status
    async fn service_sequence(&self, procedure: Procedure, delay_secs: u64, out: &dyn Reporter) -> Result<()> {
        self.announce(procedure, delay_secs, out).await;
        let notice = broadcast_notice(procedure, delay_secs);
        self.broadcast(&notice, out).await?;

        self.wait(Duration::from_secs(delay_secs)).await;

        out.report(":construction: Taking a backup...").await;
        self.backup(out).await?;

        self.service_step(procedure, out).await;
        self.status(out).await
    }

    /// announce, wait, stop, backup, update, start, grace, info, backup
    async fn update_sequence(&self, delay_secs: u64, out: &dyn Reporter) -> Result<()> {
        self.announce(Procedure::Update, delay_secs, out).await;
        self.wait(Duration::from_secs(delay_secs)).await;

        self.service_step(Procedure::Stop, out).await;
        self.status(out).await?;

        out.report(":construction: Taking a backup...").await;
        self.backup(out).await?;

        out.report(":construction: Updating the server application...")
            .await;
        let result = self.updater.update().await;
        if result.success {
            out.report(":ok: Server update completed").await;
        } else {
            warn!("Server update failed");
            out.report(&format!(
                ":warning: Server update failed\n```\nstdout: {}\nstderr: {}```",
                truncate_output(result.stdout.trim_end(), DISPLAY_BUDGET / 2),
                truncate_output(result.stderr.trim_end(), DISPLAY_BUDGET / 2)
            ))
            .await;
        }

        self.service_step(Procedure::Start, out).await;
        self.status(out).await?;

        self.wait(self.settings.update_grace).await;
        self.info(out).await?;

        out.report(":construction: Taking a backup...").await;
        self.backup(out).await?;

        out.report(":tada: All steps completed").await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Settings that differ from the shipped defaults. A malformed or missing
    /// file aborts with a report and no partial table.
    pub async fn show_config(&self, out: &dyn Reporter) -> Result<()> {
        out.report(":construction: Reading server settings...").await;

        let snapshots = settings::load_snapshot(&self.settings.default_settings_path)
            .and_then(|defaults| {
                settings::load_snapshot(&self.settings.settings_path).map(|active| (defaults, active))
            });
        let (defaults, active) = match snapshots {
            Ok(pair) => pair,
            Err(e) if e.is_classified() => {
                warn!(kind = e.slug(), "{}", e);
                out.report(&format!(":warning: Could not read server settings\n```\n{}```", e))
                    .await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let changed = settings::diff(&defaults, &active);
        if changed.is_empty() {
            out.report(":information_source: No settings differ from the defaults")
                .await;
        } else {
            out.report(&format!(
                "```\n{}```",
                truncate_output(&settings::render_table(&changed), DISPLAY_BUDGET)
            ))
            .await;
        }
        Ok(())
    }
}

/// Space-free announcement for the in-game broadcast command.
pub fn broadcast_notice(procedure: Procedure, delay_secs: u64) -> String {
    format!(
        "The-server-will-{}-in-{}-seconds.Please-prepare-to-exit-the-game.",
        procedure, delay_secs
    )
}

fn render_control(label: &str, command: &str, result: &CommandResult) -> String {
    match result.control_outcome(command) {
        Ok(stdout) => format!(
            "{} succeeded\n```\n{}```",
            ok_label(label),
            truncate_output(stdout, DISPLAY_BUDGET)
        ),
        Err(e) => {
            warn!(kind = e.slug(), "{}", e);
            format!(
                ":warning: {} failed\n```\nstdout: {}\nstderr: {}```",
                command,
                truncate_output(result.stdout.trim_end(), DISPLAY_BUDGET / 2),
                truncate_output(result.stderr.trim_end(), DISPLAY_BUDGET / 2)
            )
        }
    }
}

/// Labels without their own icon get `:ok:`.
fn ok_label(label: &str) -> String {
    if label.starts_with(':') {
        label.to_string()
    } else {
        format!(":ok: {}", label)
    }
}

fn banlist_missing(bans: &BanList) -> String {
    format!(
        ":information_source: {} was not found (run /banplayer first)",
        bans.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ban list".to_string())
    )
}
