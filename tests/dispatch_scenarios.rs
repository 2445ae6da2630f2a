//! End-to-end dispatcher scenarios with recording collaborators.

use async_trait::async_trait;
use chrono::Local;
use palbot::backup::{BackupRecord, BackupStore, TarBackupStore};
use palbot::executor::CommandResult;
use palbot::rcon::RemoteControl;
use palbot::reporter::MemoryReporter;
use palbot::service::ProcessController;
use palbot::updater::AppUpdater;
use palbot::{
    AccessClaim, AdminError, AllowListPolicy, Command, DispatchOutcome, Dispatcher, InboundRequest,
    Orchestrator, OrchestratorSettings, Procedure,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const INFO_TEXT: &str = "Welcome to Pal Server[v0.1.5.1] Default Palworld Server\n";

type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, call: impl Into<String>) {
    log.lock().unwrap().push(call.into());
}

struct FakeRcon {
    log: CallLog,
    failing: HashSet<&'static str>,
}

#[async_trait]
impl RemoteControl for FakeRcon {
    async fn execute(&self, command: &str, argument: Option<&str>) -> CommandResult {
        match argument {
            Some(arg) => record(&self.log, format!("rcon {} {}", command, arg)),
            None => record(&self.log, format!("rcon {}", command)),
        }
        if self.failing.contains(command) {
            return CommandResult::failed("", "connection refused");
        }
        match command {
            "Info" => CommandResult::ok(INFO_TEXT),
            "ShowPlayers" => CommandResult::ok("name,playeruid,steamid\n"),
            _ => CommandResult::ok(""),
        }
    }
}

struct FakeService {
    log: CallLog,
    failing: HashSet<&'static str>,
}

impl FakeService {
    fn call(&self, verb: &'static str) -> CommandResult {
        record(&self.log, format!("service {}", verb));
        if self.failing.contains(verb) {
            CommandResult::failed("", format!("Job for palworld.service failed ({})", verb))
        } else {
            CommandResult::ok(format!("palworld.service {} ok\n", verb))
        }
    }
}

#[async_trait]
impl ProcessController for FakeService {
    async fn start(&self) -> CommandResult {
        self.call("start")
    }

    async fn stop(&self) -> CommandResult {
        self.call("stop")
    }

    async fn restart(&self) -> CommandResult {
        self.call("restart")
    }

    async fn status(&self) -> CommandResult {
        self.call("status")
    }

    fn status_heading(&self) -> String {
        "# systemctl status palworld".to_string()
    }
}

struct FakeUpdater {
    log: CallLog,
    succeed: bool,
}

#[async_trait]
impl AppUpdater for FakeUpdater {
    async fn update(&self) -> CommandResult {
        record(&self.log, "update");
        if self.succeed {
            CommandResult::ok("Success! App '2394010' fully installed.\n")
        } else {
            CommandResult::failed("", "steamcmd: network unreachable")
        }
    }
}

struct FakeBackups {
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl BackupStore for FakeBackups {
    async fn create(&self, version: &str) -> palbot::Result<BackupRecord> {
        record(&self.log, format!("backup {}", version));
        if self.fail {
            return Err(AdminError::BackupIo {
                path: PathBuf::from("/backups/partial.tar.gz"),
                reason: "No space left on device".to_string(),
            });
        }
        let timestamp = Local::now().naive_local();
        Ok(BackupRecord {
            version: version.to_string(),
            base_name: "backup-palworld".to_string(),
            timestamp,
            path: PathBuf::from(palbot::backup::backup_file_name(
                version,
                "backup-palworld",
                &timestamp,
            )),
            size_bytes: 1024,
            entries: 3,
        })
    }

    async fn prune(&self, keep: usize) -> palbot::Result<Vec<PathBuf>> {
        record(&self.log, format!("prune {}", keep));
        Ok(Vec::new())
    }
}

struct Harness {
    log: CallLog,
    dispatcher: Arc<Dispatcher>,
}

#[derive(Default)]
struct Failures {
    rcon: HashSet<&'static str>,
    service: HashSet<&'static str>,
    update_fails: bool,
    backup_fails: bool,
}

fn settings_in(dir: &Path) -> OrchestratorSettings {
    OrchestratorSettings {
        retention: 5,
        update_grace: Duration::from_secs(10),
        banlist_path: dir.join("banlist.txt"),
        settings_path: dir.join("PalWorldSettings.ini"),
        default_settings_path: dir.join("DefaultPalWorldSettings.ini"),
        lock_path: Some(dir.join("lifecycle.lock")),
    }
}

fn policy() -> Arc<AllowListPolicy> {
    Arc::new(AllowListPolicy::new(
        vec!["alice".into()],
        vec!["1001".into()],
        Some("relay-42".into()),
    ))
}

fn harness_with(dir: &Path, failures: Failures) -> Harness {
    let log: CallLog = Arc::default();
    let orchestrator = Orchestrator::new(
        Arc::new(FakeRcon {
            log: log.clone(),
            failing: failures.rcon,
        }),
        Arc::new(FakeBackups {
            log: log.clone(),
            fail: failures.backup_fails,
        }),
        Arc::new(FakeService {
            log: log.clone(),
            failing: failures.service,
        }),
        Arc::new(FakeUpdater {
            log: log.clone(),
            succeed: !failures.update_fails,
        }),
        settings_in(dir),
    );
    let dispatcher = Dispatcher::new(policy(), Arc::new(orchestrator)).unwrap();
    Harness {
        log,
        dispatcher: Arc::new(dispatcher),
    }
}

fn harness(dir: &Path) -> Harness {
    harness_with(dir, Failures::default())
}

impl Harness {
    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    async fn run(&self, text: &str, claim: AccessClaim) -> (DispatchOutcome, MemoryReporter) {
        let out = MemoryReporter::new();
        let request = InboundRequest {
            command: Command::parse(text).unwrap(),
            claim,
        };
        let outcome = self.dispatcher.dispatch(&request, &out).await.unwrap();
        (outcome, out)
    }

    async fn run_as_alice(&self, text: &str) -> (DispatchOutcome, MemoryReporter) {
        self.run(text, AccessClaim::user("alice")).await
    }
}

fn position(calls: &[String], call: &str) -> usize {
    calls
        .iter()
        .position(|c| c == call)
        .unwrap_or_else(|| panic!("{} not called: {:?}", call, calls))
}

#[tokio::test]
async fn denied_requests_make_no_external_calls() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    for text in [
        "/info",
        "/broadcast hello",
        "/kickplayer 7656",
        "/banplayer 7656",
        "/unbanplayer 7656",
        "/backup",
        "/status",
        "/restart 0",
        "/stop",
        "/start",
        "/update 0",
        "/showconfig",
    ] {
        let claim = AccessClaim::user("mallory").with_roles(["9"]).relayed("wrong");
        let (outcome, out) = h.run(text, claim).await;
        assert_eq!(outcome, DispatchOutcome::Denied, "{}", text);
        assert!(out.messages().is_empty(), "{}", text);
    }
    assert!(h.calls().is_empty(), "{:?}", h.calls());
}

#[tokio::test]
async fn role_and_relay_claims_are_authorized() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let (outcome, _) = h
        .run("/info", AccessClaim::user("bob").with_roles(["1001"]))
        .await;
    assert_eq!(outcome, DispatchOutcome::Completed);

    let (outcome, _) = h
        .run("/info", AccessClaim::user("relay").relayed("relay-42"))
        .await;
    assert_eq!(outcome, DispatchOutcome::Completed);
    assert_eq!(h.calls(), vec!["rcon Info", "rcon Info"]);
}

#[tokio::test]
async fn unknown_command_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let (outcome, out) = h.run_as_alice("/teleport everyone").await;
    assert_eq!(outcome, DispatchOutcome::Unknown);
    assert!(out.messages().is_empty());
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn missing_argument_reports_usage() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let (outcome, out) = h.run_as_alice("/kickplayer").await;
    assert_eq!(outcome, DispatchOutcome::Rejected);
    assert_eq!(out.messages(), vec![":warning: Usage: /kickplayer <steamid>"]);
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn info_reports_control_channel_output() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let (_, out) = h.run_as_alice("info").await;
    let transcript = out.transcript();
    assert!(transcript.starts_with(":ok: Info succeeded"));
    assert!(transcript.contains("v0.1.5.1"));
}

#[tokio::test]
async fn broadcast_passes_text_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    h.run_as_alice("/broadcast Server-maintenance-at-noon").await;
    assert_eq!(h.calls(), vec!["rcon Broadcast Server-maintenance-at-noon"]);
}

#[tokio::test]
async fn unban_leaves_only_unrelated_lines() {
    let dir = tempfile::tempdir().unwrap();
    let banlist = dir.path().join("banlist.txt");
    std::fs::write(&banlist, "steam_76561198000000001\nsteam_76561198000000002\n").unwrap();
    let h = harness(dir.path());

    let (outcome, out) = h.run_as_alice("/unbanplayer 76561198000000001").await;
    assert_eq!(outcome, DispatchOutcome::Completed);

    let remaining = std::fs::read_to_string(&banlist).unwrap();
    assert_eq!(remaining.lines().collect::<Vec<_>>(), vec!["steam_76561198000000002"]);
    assert!(out.transcript().contains("steam_76561198000000002"));
    assert!(h.calls().is_empty());
}

#[tokio::test]
async fn ban_goes_through_control_channel_then_lists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("banlist.txt"), "").unwrap();
    let h = harness(dir.path());

    let (_, out) = h.run_as_alice("/banplayer 76561198000000003").await;
    assert_eq!(h.calls(), vec!["rcon BanPlayer 76561198000000003"]);
    let messages = out.messages();
    assert!(messages[0].starts_with(":ok: BanPlayer succeeded"));
    assert_eq!(messages[1], ":blue_book: No players are banned");
}

#[tokio::test]
async fn missing_banlist_is_informational() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let (outcome, out) = h.run_as_alice("/banlist").await;
    assert_eq!(outcome, DispatchOutcome::Completed);
    assert!(out.transcript().contains("banlist.txt was not found"));
}

#[tokio::test]
async fn backup_tags_archive_with_server_version() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let (_, out) = h.run_as_alice("/backup").await;
    assert_eq!(h.calls(), vec!["rcon Info", "backup v0.1.5.1", "prune 5"]);
    assert!(out.transcript().contains(":ok: Backup succeeded"));
    assert!(out.transcript().contains("v0.1.5.1_backup-palworld_"));
}

#[tokio::test]
async fn backup_without_control_channel_uses_placeholder_version() {
    let dir = tempfile::tempdir().unwrap();
    let failures = Failures {
        rcon: HashSet::from(["Info"]),
        ..Failures::default()
    };
    let h = harness_with(dir.path(), failures);

    h.run_as_alice("/backup").await;
    assert_eq!(h.calls(), vec!["rcon Info", "backup vx.x.x.x", "prune 5"]);
}

/// Dispatcher whose backups are real archives of `saves` in `archives`.
fn tar_dispatcher(dir: &Path, archives: &Path, retention: usize) -> Dispatcher {
    let saves = dir.join("SaveGames");
    std::fs::create_dir_all(saves.join("0")).unwrap();
    std::fs::write(saves.join("0").join("Level.sav"), b"level").unwrap();

    let store = Arc::new(TarBackupStore::new(saves, archives.to_path_buf(), "backup-palworld"));
    let log: CallLog = Arc::default();
    let orchestrator = Orchestrator::new(
        Arc::new(FakeRcon {
            log: log.clone(),
            failing: HashSet::new(),
        }),
        store,
        Arc::new(FakeService {
            log: log.clone(),
            failing: HashSet::new(),
        }),
        Arc::new(FakeUpdater {
            log: log.clone(),
            succeed: true,
        }),
        OrchestratorSettings {
            retention,
            ..settings_in(dir)
        },
    );
    Dispatcher::new(policy(), Arc::new(orchestrator)).unwrap()
}

fn archive_names(archives: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(archives)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn retention_keeps_newest_archives() {
    let dir = tempfile::tempdir().unwrap();
    let archives = dir.path().join("backups");
    let dispatcher = tar_dispatcher(dir.path(), &archives, 2);
    let request = InboundRequest {
        command: Command::parse("/backup").unwrap(),
        claim: AccessClaim::user("alice"),
    };

    let mut created = Vec::new();
    for _ in 0..4 {
        let out = MemoryReporter::new();
        dispatcher.dispatch(&request, &out).await.unwrap();
        assert!(out.transcript().contains(":ok: Backup succeeded"), "{}", out.transcript());

        let names = archive_names(&archives);
        assert!(names.len() <= 2);
        for name in names {
            if !created.contains(&name) {
                created.push(name);
            }
        }
    }

    created.sort();
    assert_eq!(created.len(), 4);
    assert_eq!(archive_names(&archives), created[2..].to_vec());
}

#[tokio::test]
async fn archive_removed_by_its_own_prune_is_a_failed_backup() {
    let dir = tempfile::tempdir().unwrap();
    let archives = dir.path().join("backups");
    std::fs::create_dir_all(&archives).unwrap();
    let placeholders = [
        "vx.x.x.x_backup-palworld_20240101000000.tar.gz",
        "vx.x.x.x_backup-palworld_20240102000000.tar.gz",
    ];
    for name in placeholders {
        std::fs::write(archives.join(name), b"x").unwrap();
    }
    let dispatcher = tar_dispatcher(dir.path(), &archives, 2);

    let out = MemoryReporter::new();
    let request = InboundRequest {
        command: Command::parse("/backup").unwrap(),
        claim: AccessClaim::user("alice"),
    };
    dispatcher.dispatch(&request, &out).await.unwrap();

    let transcript = out.transcript();
    assert!(transcript.contains(":warning: Backup failed"), "{}", transcript);
    assert!(transcript.contains("removed by retention"));
    assert!(!transcript.contains(":ok: Backup succeeded"));
    assert_eq!(archive_names(&archives), placeholders.to_vec());
}

#[tokio::test(start_paused = true)]
async fn restart_with_failing_restart_still_reports_status() {
    let dir = tempfile::tempdir().unwrap();
    let failures = Failures {
        service: HashSet::from(["restart"]),
        ..Failures::default()
    };
    let h = harness_with(dir.path(), failures);

    let (outcome, out) = h.run_as_alice("/restart 0").await;
    assert_eq!(outcome, DispatchOutcome::Completed);

    let calls = h.calls();
    assert_eq!(
        calls,
        vec![
            "rcon Broadcast The-server-will-restart-in-0-seconds.Please-prepare-to-exit-the-game.",
            "rcon Info",
            "backup v0.1.5.1",
            "prune 5",
            "service restart",
            "service status",
        ]
    );
    let transcript = out.transcript();
    assert!(transcript.contains(":warning: Server restart did not complete"));
    assert!(transcript.contains("# systemctl status palworld"));
}

#[tokio::test(start_paused = true)]
async fn stop_waits_for_the_delay_before_acting() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    let started = tokio::time::Instant::now();
    h.run_as_alice("/stop").await;
    assert!(started.elapsed() >= Duration::from_secs(60));

    let calls = h.calls();
    assert!(position(&calls, "backup v0.1.5.1") < position(&calls, "service stop"));
}

#[tokio::test(start_paused = true)]
async fn update_with_failing_tool_still_starts_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let failures = Failures {
        update_fails: true,
        ..Failures::default()
    };
    let h = harness_with(dir.path(), failures);

    let (outcome, out) = h.run_as_alice("/update 0").await;
    assert_eq!(outcome, DispatchOutcome::Completed);

    let calls = h.calls();
    assert_eq!(
        calls,
        vec![
            "service stop",
            "service status",
            "rcon Info",
            "backup v0.1.5.1",
            "prune 5",
            "update",
            "service start",
            "service status",
            "rcon Info",
            "rcon Info",
            "backup v0.1.5.1",
            "prune 5",
        ]
    );
    let transcript = out.transcript();
    assert!(transcript.contains(":warning: Server update failed"));
    assert!(transcript.contains(":ok: Server start completed"));
    assert!(transcript.ends_with(":tada: All steps completed"));
}

#[tokio::test(start_paused = true)]
async fn concurrent_lifecycle_is_rejected_as_busy() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let orchestrator = h.dispatcher.orchestrator().clone();

    let dispatcher = h.dispatcher.clone();
    let first = tokio::spawn(async move {
        let out = MemoryReporter::new();
        let request = InboundRequest {
            command: Command::parse("/restart 60").unwrap(),
            claim: AccessClaim::user("alice"),
        };
        dispatcher.dispatch(&request, &out).await.unwrap();
        out
    });

    while orchestrator.in_flight().is_none() {
        tokio::task::yield_now().await;
    }
    assert_eq!(orchestrator.in_flight(), Some(Procedure::Restart));
    let calls_before = h.calls().len();

    let (outcome, out) = h.run_as_alice("/stop 0").await;
    assert_eq!(outcome, DispatchOutcome::Completed);
    assert!(out.transcript().contains(":no_entry:"));
    assert!(out.transcript().contains("restart"));
    assert_eq!(h.calls().len(), calls_before);

    // Non-lifecycle commands interleave freely.
    h.run_as_alice("/info").await;

    let first_out = first.await.unwrap();
    assert!(first_out.transcript().contains(":ok: Server restart completed"));
    assert_eq!(orchestrator.in_flight(), None);
}

#[tokio::test]
async fn showconfig_lists_changed_settings_masked() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("DefaultPalWorldSettings.ini"),
        "[/Script/Pal.PalGameWorldSettings]\nOptionSettings=(Difficulty=None,ExpRate=1.000000,AdminPassword=\"\",ServerName=\"Default Palworld Server\")\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("PalWorldSettings.ini"),
        "[/Script/Pal.PalGameWorldSettings]\nOptionSettings=(Difficulty=None,ExpRate=2.000000,AdminPassword=\"hunter2\",ServerName=\"Friends, Only\")\n",
    )
    .unwrap();
    let h = harness(dir.path());

    let (_, out) = h.run_as_alice("/showconfig").await;
    let transcript = out.transcript();
    assert!(transcript.contains("ExpRate"));
    assert!(transcript.contains("Friends, Only"));
    assert!(transcript.contains("****"));
    assert!(!transcript.contains("hunter2"));
    assert!(!transcript.contains("Difficulty"));
}

#[tokio::test]
async fn showconfig_with_identical_files_reports_no_differences() {
    let dir = tempfile::tempdir().unwrap();
    let content = "OptionSettings=(Difficulty=None,ExpRate=1.000000)\n";
    std::fs::write(dir.path().join("DefaultPalWorldSettings.ini"), content).unwrap();
    std::fs::write(dir.path().join("PalWorldSettings.ini"), content).unwrap();
    let h = harness(dir.path());

    let (_, out) = h.run_as_alice("/showconfig").await;
    assert!(out.transcript().contains("No settings differ from the defaults"));
}

#[tokio::test]
async fn showconfig_without_marker_aborts_with_report() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("DefaultPalWorldSettings.ini"), "[empty]\n").unwrap();
    std::fs::write(dir.path().join("PalWorldSettings.ini"), "OptionSettings=(A=1)\n").unwrap();
    let h = harness(dir.path());

    let (outcome, out) = h.run_as_alice("/showconfig").await;
    assert_eq!(outcome, DispatchOutcome::Completed);
    assert!(out.transcript().contains(":warning: Could not read server settings"));
    assert!(!out.transcript().contains("Setting | Value"));
}

#[tokio::test(start_paused = true)]
async fn failed_backup_skips_prune_but_lifecycle_continues() {
    let dir = tempfile::tempdir().unwrap();
    let failures = Failures {
        backup_fails: true,
        ..Failures::default()
    };
    let h = harness_with(dir.path(), failures);

    let (outcome, out) = h.run_as_alice("/restart 0").await;
    assert_eq!(outcome, DispatchOutcome::Completed);
    assert_eq!(
        h.calls(),
        vec![
            "rcon Broadcast The-server-will-restart-in-0-seconds.Please-prepare-to-exit-the-game.",
            "rcon Info",
            "backup v0.1.5.1",
            "service restart",
            "service status",
        ]
    );
    let transcript = out.transcript();
    assert!(transcript.contains(":warning: Backup failed"));
    assert!(transcript.contains("No space left on device"));
    assert!(transcript.contains(":ok: Server restart completed"));
}

#[tokio::test(start_paused = true)]
async fn stop_with_failing_stop_still_reports_status() {
    let dir = tempfile::tempdir().unwrap();
    let failures = Failures {
        service: HashSet::from(["stop"]),
        ..Failures::default()
    };
    let h = harness_with(dir.path(), failures);

    let (outcome, out) = h.run_as_alice("/stop 0").await;
    assert_eq!(outcome, DispatchOutcome::Completed);

    let calls = h.calls();
    assert_eq!(&calls[calls.len() - 2..], ["service stop", "service status"]);
    let transcript = out.transcript();
    assert!(transcript.contains(":warning: Server stop did not complete"));
    assert!(transcript.ends_with("```"));
    assert!(transcript.contains("# systemctl status palworld"));
}

#[tokio::test(start_paused = true)]
async fn update_with_failing_stop_still_updates_and_starts() {
    let dir = tempfile::tempdir().unwrap();
    let failures = Failures {
        service: HashSet::from(["stop"]),
        ..Failures::default()
    };
    let h = harness_with(dir.path(), failures);

    let (outcome, out) = h.run_as_alice("/update 0").await;
    assert_eq!(outcome, DispatchOutcome::Completed);

    let calls = h.calls();
    assert!(position(&calls, "service stop") < position(&calls, "update"));
    assert!(position(&calls, "update") < position(&calls, "service start"));
    assert_eq!(calls.iter().filter(|c| *c == "service status").count(), 2);
    let transcript = out.transcript();
    assert!(transcript.contains(":warning: Server stop did not complete"));
    assert!(transcript.contains(":ok: Server update completed"));
    assert!(transcript.ends_with(":tada: All steps completed"));
}

#[tokio::test(start_paused = true)]
async fn lifecycle_lock_is_shared_across_orchestrators() {
    let dir = tempfile::tempdir().unwrap();
    // Two independent instances, as with the daemon and a cron `exec`.
    let daemon = harness(dir.path());
    let cron = harness(dir.path());
    let daemon_orchestrator = daemon.dispatcher.orchestrator().clone();

    let dispatcher = daemon.dispatcher.clone();
    let running = tokio::spawn(async move {
        let out = MemoryReporter::new();
        let request = InboundRequest {
            command: Command::parse("/update 60").unwrap(),
            claim: AccessClaim::user("alice"),
        };
        dispatcher.dispatch(&request, &out).await.unwrap();
    });

    while daemon_orchestrator.in_flight().is_none() {
        tokio::task::yield_now().await;
    }

    let (outcome, out) = cron.run_as_alice("/restart 0").await;
    assert_eq!(outcome, DispatchOutcome::Completed);
    let transcript = out.transcript();
    assert!(transcript.contains(":no_entry:"), "{}", transcript);
    assert!(transcript.contains(": update"), "{}", transcript);
    assert!(cron.calls().is_empty());
    assert_eq!(cron.dispatcher.orchestrator().in_flight(), None);

    running.await.unwrap();

    let (_, out) = cron.run_as_alice("/restart 0").await;
    assert!(out.transcript().contains(":ok: Server restart completed"));
}
