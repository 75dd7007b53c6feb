//! Pull, push and smart sync commands.

use gmpq_store::MirrorStore;
use gmpq_sync_engine::{
    FullSyncReport, RemoteConfig, ReqwestClient, RestRemote, SmartSyncOutcome, SyncOrchestrator,
    SyncReport, TokenAuth, TracingObserver,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

/// Backend connection settings.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Backend project URL.
    pub url: String,
    /// Public API key.
    pub api_key: String,
    /// Access token of the user to sync.
    pub token: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Output format (text, json).
    pub format: String,
}

/// Which sync operation to run.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// Remote to local only.
    Pull,
    /// Local to remote only.
    Push,
    /// Pull then push, unless skipped.
    Smart {
        /// Ignore the skip rule.
        force: bool,
        /// Unix seconds of the last successful sync.
        last_sync: Option<u64>,
    },
}

/// One table line of the output.
#[derive(Debug, Serialize)]
pub struct TableLine {
    /// `pull` or `push`.
    pub direction: &'static str,
    /// Table name.
    pub table: &'static str,
    /// Whether the table synced.
    pub success: bool,
    /// Rows moved.
    pub count: usize,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Command output.
#[derive(Debug, Serialize)]
pub struct SyncOutput {
    /// Whether a smart sync decided to skip.
    pub skipped: bool,
    /// Per-table results.
    pub tables: Vec<TableLine>,
}

/// Runs a sync command.
pub fn run(
    path: &Path,
    connection: &Connection,
    mode: Mode,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MirrorStore::open_path(path)?);
    let orchestrator = connect(store, connection)?;

    let output = match mode {
        Mode::Pull => from_report("pull", &orchestrator.pull()?),
        Mode::Push => from_report("push", &orchestrator.push()?),
        Mode::Smart { force, last_sync } => {
            let last_sync = last_sync.map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
            match orchestrator.smart_sync(force, last_sync)? {
                SmartSyncOutcome::Skipped => SyncOutput {
                    skipped: true,
                    tables: Vec::new(),
                },
                SmartSyncOutcome::Synced(report) => from_full_report(&report),
            }
        }
    };

    match connection.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&output)?),
        _ => print_text_output(&output),
    }

    if output.tables.iter().any(|t| !t.success) {
        return Err("some tables failed to sync".into());
    }
    Ok(())
}

fn connect(
    store: Arc<MirrorStore>,
    connection: &Connection,
) -> Result<SyncOrchestrator, Box<dyn std::error::Error>> {
    let config = RemoteConfig::new(&connection.url, &connection.api_key)
        .with_timeout(Duration::from_secs(connection.timeout_secs));
    let client = Arc::new(ReqwestClient::new(&config)?);

    let remote = RestRemote::new(config.clone(), Arc::clone(&client));
    remote.set_access_token(Some(connection.token.clone()));
    let auth = TokenAuth::new(config, client);
    auth.set_token(Some(connection.token.clone()));

    let orchestrator = SyncOrchestrator::new(store, Arc::new(remote), Arc::new(auth));
    orchestrator.add_observer(Arc::new(TracingObserver));
    Ok(orchestrator)
}

fn from_report(direction: &'static str, report: &SyncReport) -> SyncOutput {
    SyncOutput {
        skipped: false,
        tables: lines(direction, report).collect(),
    }
}

fn from_full_report(report: &FullSyncReport) -> SyncOutput {
    SyncOutput {
        skipped: false,
        tables: lines("pull", &report.pull)
            .chain(lines("push", &report.push))
            .collect(),
    }
}

fn lines<'a>(
    direction: &'static str,
    report: &'a SyncReport,
) -> impl Iterator<Item = TableLine> + 'a {
    report.results.iter().map(move |outcome| TableLine {
        direction,
        table: outcome.table,
        success: outcome.success,
        count: outcome.count,
        error: outcome.error.as_ref().map(ToString::to_string),
    })
}

fn print_text_output(output: &SyncOutput) {
    if output.skipped {
        println!("Nothing to sync (no local changes, last sync is recent)");
        return;
    }
    for line in &output.tables {
        match &line.error {
            None => println!(
                "  ✓ {:<5} {:<18} {:>6}",
                line.direction, line.table, line.count
            ),
            Some(error) => println!("  ✗ {:<5} {:<18} {}", line.direction, line.table, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmpq_sync_engine::{SyncError, TableOutcome};

    #[test]
    fn full_report_lists_pull_before_push() {
        let mut pull = SyncReport::default();
        pull.results.push(TableOutcome::ok("level_1", 2));
        let mut push = SyncReport::default();
        push.results.push(TableOutcome::failed(
            "level_4",
            SyncError::PermissionDenied("denied".into()),
        ));

        let output = from_full_report(&FullSyncReport { pull, push });

        assert_eq!(output.tables.len(), 2);
        assert_eq!(output.tables[0].direction, "pull");
        assert_eq!(output.tables[0].count, 2);
        assert!(!output.tables[1].success);
        assert!(output.tables[1].error.is_some());
    }
}
