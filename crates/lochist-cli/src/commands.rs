use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{Local, TimeZone};
use colored::Colorize;
use serde_json::json;

use lochist_core::editor::EditorHandle;
use lochist_core::restore::restore_commit;
use lochist_core::status::scan_project;
use lochist_core::{
    enforce_size_limit, project_files, EditorHost, FileStatus, HistoryConfig, HistoryContext,
    ProjectRepository,
};
use lochist_diff::{diff_blobs, TreeChange};
use lochist_types::{OwnerId, Timestamp};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let project = cli.project.as_path();
    let json = matches!(cli.format, OutputFormat::Json);
    match cli.command {
        Command::Init => cmd_init(project),
        Command::Snapshot(args) => cmd_snapshot(project, args),
        Command::Log(args) => cmd_log(project, args, json),
        Command::Show(args) => cmd_show(project, args, json),
        Command::Tag(args) => cmd_tag(project, args),
        Command::Tags => cmd_tags(project, json),
        Command::Diff(args) => cmd_diff(project, args, json),
        Command::Restore(args) => cmd_restore(project, args),
        Command::Status => cmd_status(project, json),
        Command::Gc(args) => cmd_gc(project, args, json),
        Command::Verify => cmd_verify(project, json),
        Command::Watch(args) => cmd_watch(project, args),
        Command::Config(args) => cmd_config(project, args),
    }
}

fn open(project: &Path) -> anyhow::Result<ProjectRepository> {
    ProjectRepository::open(project)
        .with_context(|| format!("no history in {} (run `lochist init`)", project.display()))
}

fn format_time(ts: Timestamp) -> String {
    Local
        .timestamp_millis_opt(ts.as_millis() as i64)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init(project: &Path) -> anyhow::Result<()> {
    ProjectRepository::init(project)?;
    println!("{} Initialized history in {}", "✓".green().bold(), project.display().to_string().bold());
    Ok(())
}

fn cmd_snapshot(project: &Path, args: SnapshotArgs) -> anyhow::Result<()> {
    let repo = open(project)?;
    let id = repo.commit_full_snapshot(&args.message)?;
    println!("{} {} {}", "✓".green().bold(), id.short_hex().yellow(), args.message);
    if let Some(tag) = args.tag {
        repo.tag_head(&tag)?;
        println!("  Tagged {}", tag.cyan());
    }
    Ok(())
}

fn cmd_log(project: &Path, args: LogArgs, json: bool) -> anyhow::Result<()> {
    let repo = open(project)?;
    let snapshots = repo.history(args.limit)?;
    if json {
        return print_json(&serde_json::to_value(&snapshots)?);
    }
    if snapshots.is_empty() {
        println!("No snapshots.");
        return Ok(());
    }
    let tags = repo.tags()?;
    for snap in &snapshots {
        let labels: Vec<&str> = tags
            .iter()
            .filter(|(_, target)| *target == snap.id)
            .map(|(name, _)| name.as_str())
            .collect();
        let decoration = if labels.is_empty() {
            String::new()
        } else {
            format!(" ({})", labels.join(", ")).green().to_string()
        };
        if args.oneline {
            println!("{}{} {}", snap.id.short_hex().yellow(), decoration, snap.summary);
        } else {
            println!("{}{}", snap.id.to_hex().yellow().bold(), decoration);
            println!("  Date:  {}", format_time(snap.timestamp));
            println!("  Files: {}", snap.file_count);
            if snap.truncated {
                println!("  {}", "(history truncated)".dimmed());
            }
            println!("  {}\n", snap.summary);
        }
    }
    Ok(())
}

fn cmd_show(project: &Path, args: ShowArgs, json: bool) -> anyhow::Result<()> {
    let repo = open(project)?;
    let id = repo.resolve(&args.rev)?;
    let commit = repo.read_commit(&id)?;
    let tree = repo.read_tree(&commit.tree)?;
    if json {
        return print_json(&json!({
            "id": id.to_hex(),
            "parent": commit.parent.map(|p| p.to_hex()),
            "summary": commit.summary,
            "message": commit.message,
            "timestamp": commit.timestamp.as_millis(),
            "files": tree.entries.iter().map(|e| json!({
                "path": e.path,
                "size": e.size,
                "mode": e.mode.to_string(),
                "blob": e.object_id.to_hex(),
            })).collect::<Vec<_>>(),
        }));
    }
    println!("Snapshot {}", id.to_hex().yellow().bold());
    if let Some(parent) = commit.parent {
        println!("Parent:   {}", parent.short_hex());
    }
    println!("Date:     {}", format_time(commit.timestamp));
    println!("\n  {}\n", commit.summary);
    for entry in &tree.entries {
        println!("  {} {:>10}  {}", entry.mode, entry.size, entry.path);
    }
    Ok(())
}

fn cmd_tag(project: &Path, args: TagArgs) -> anyhow::Result<()> {
    let repo = open(project)?;
    let target = repo.tag_head(&args.name)?;
    println!("Tag {} → {}", args.name.cyan(), target.short_hex().yellow());
    Ok(())
}

fn cmd_tags(project: &Path, json: bool) -> anyhow::Result<()> {
    let repo = open(project)?;
    let tags = repo.tags()?;
    if json {
        let map: serde_json::Map<String, serde_json::Value> = tags
            .into_iter()
            .map(|(name, target)| (name, json!(target.to_hex())))
            .collect();
        return print_json(&serde_json::Value::Object(map));
    }
    if tags.is_empty() {
        println!("No tags.");
    }
    for (name, target) in tags {
        println!("{}  {}", target.short_hex().yellow(), name.cyan());
    }
    Ok(())
}

fn cmd_diff(project: &Path, args: DiffArgs, json: bool) -> anyhow::Result<()> {
    let repo = open(project)?;
    let from = repo.resolve(&args.from)?;
    let to = repo.resolve(&args.to)?;
    let diff = repo.diff(&from, &to)?;
    if json {
        let changes: Vec<_> = diff
            .changes
            .iter()
            .map(|change| {
                let kind = serde_json::to_value(change)
                    .ok()
                    .and_then(|v| v.get("kind").cloned())
                    .unwrap_or_default();
                json!({ "kind": kind, "path": change.path() })
            })
            .collect();
        return print_json(&json!(changes));
    }
    if diff.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    for change in &diff.changes {
        match change {
            TreeChange::Added { path, .. } => println!("{} {}", "A".green(), path),
            TreeChange::Deleted { path, .. } => println!("{} {}", "D".red(), path),
            TreeChange::Modified { path, .. } => println!("{} {}", "M".yellow(), path),
            TreeChange::Renamed { old_path, new_path, .. } => {
                println!("{} {} → {}", "R".cyan(), old_path, new_path)
            }
            TreeChange::ModeChanged { path, old_mode, new_mode, .. } => {
                println!("{} {} ({} → {})", "T".cyan(), path, old_mode, new_mode)
            }
        }
    }
    if args.patch {
        for change in &diff.changes {
            if let TreeChange::Modified { path, old_id, new_id, .. } = change {
                let old = repo.read_blob(old_id)?;
                let new = repo.read_blob(new_id)?;
                println!();
                for line in diff_blobs(&old, &new).to_unified(path).lines() {
                    if line.starts_with('+') && !line.starts_with("+++") {
                        println!("{}", line.green());
                    } else if line.starts_with('-') && !line.starts_with("---") {
                        println!("{}", line.red());
                    } else if line.starts_with("@@") {
                        println!("{}", line.cyan());
                    } else {
                        println!("{line}");
                    }
                }
            }
        }
    }
    Ok(())
}

/// The terminal has no editors to close or reopen.
struct TerminalHost;

impl EditorHost for TerminalHost {
    fn open_editors(&self) -> Vec<EditorHandle> {
        Vec::new()
    }

    fn close_editor(&mut self, _editor: &EditorHandle, _force: bool) -> bool {
        true
    }

    fn reopen_editor(&mut self, _editor: &EditorHandle) -> bool {
        true
    }

    fn mark_modified(&mut self, _editor: &EditorHandle) {}
}

fn cmd_restore(project: &Path, args: RestoreArgs) -> anyhow::Result<()> {
    let repo = open(project)?;
    let id = repo.resolve(&args.rev)?;
    let outcome = restore_commit(&repo, &id, &mut TerminalHost)?;
    println!("{} Restored {} ({} files)", "✓".green().bold(), id.short_hex().yellow(), outcome.files_written);
    if let Some(backup) = outcome.backup {
        println!("  Previous state saved as {}", backup.short_hex().yellow());
    }
    Ok(())
}

fn cmd_status(project: &Path, json: bool) -> anyhow::Result<()> {
    let repo = open(project)?;
    let result = scan_project(project, &repo.head_tree()?)?;
    if json {
        let changes: serde_json::Map<String, serde_json::Value> = result
            .changes()
            .map(|(path, status)| (path.to_string(), json!(status)))
            .collect();
        return print_json(&serde_json::Value::Object(changes));
    }
    match repo.head()? {
        Some(head) => println!("Head: {}", head.short_hex().yellow()),
        None => println!("No snapshots yet."),
    }
    if result.is_clean() {
        println!("\nNo changes since the last snapshot.");
        return Ok(());
    }
    println!();
    for (path, status) in result.changes() {
        let label = match status {
            FileStatus::Modified => "modified:".yellow(),
            FileStatus::Added => "new:     ".green(),
            FileStatus::Deleted => "deleted: ".red(),
            FileStatus::Unchanged => continue,
        };
        println!("  {label} {path}");
    }
    Ok(())
}

fn cmd_gc(project: &Path, args: GcArgs, json: bool) -> anyhow::Result<()> {
    let repo = open(project)?;
    let limit = match args.limit {
        Some(limit) => limit,
        None => HistoryConfig::load_for_project(project)?.backup.limit_total_size,
    };
    let report = enforce_size_limit(&repo, limit)?;
    if json {
        return print_json(&serde_json::to_value(&report)?);
    }
    if limit <= 0 {
        println!("Size limit disabled; nothing pruned.");
        return Ok(());
    }
    let mark = if report.within_budget { "✓".green().bold() } else { "!".yellow().bold() };
    println!(
        "{} GC: {} snapshots pruned, {} objects removed ({} → {} bytes)",
        mark, report.commits_pruned, report.objects_removed, report.bytes_before, report.bytes_after
    );
    if !report.within_budget {
        println!("  Tagged snapshots and head alone exceed {limit} bytes.");
    }
    Ok(())
}

fn cmd_verify(project: &Path, json: bool) -> anyhow::Result<()> {
    let repo = open(project)?;
    let report = repo.verify()?;
    if json {
        return print_json(&serde_json::to_value(&report)?);
    }
    if report.is_ok() {
        println!(
            "{} {} snapshots, {} objects verified",
            "✓".green().bold(),
            report.commits_checked,
            report.objects_checked
        );
        return Ok(());
    }
    for id in &report.missing {
        println!("  {} {}", "missing:".red(), id);
    }
    for id in &report.corrupt {
        println!("  {} {}", "corrupt:".red(), id);
    }
    anyhow::bail!("{} damaged objects", report.missing.len() + report.corrupt.len())
}

fn cmd_watch(project: &Path, args: WatchArgs) -> anyhow::Result<()> {
    let config = HistoryConfig::load_for_project(project)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch_loop(project, config, Duration::from_secs(args.interval.max(1))))
}

async fn watch_loop(project: &Path, config: HistoryConfig, every: Duration) -> anyhow::Result<()> {
    let mut ctx = HistoryContext::new(config);
    let saver = Box::new(|root: &Path| {
        project_files(root)
            .map(|files| files.into_iter().map(|f| root.join(f)).collect::<Vec<PathBuf>>())
            .unwrap_or_default()
    });
    let outcome = ctx.load_project(project, OwnerId::new(), saver, Instant::now());
    if !outcome.history_available {
        anyhow::bail!("cannot write history in {}", project.display());
    }
    if outcome.offer_restore {
        println!("{} History has snapshots newer than the last save.", "!".yellow().bold());
    }
    println!("Watching {} (Ctrl-C to stop)", project.display().to_string().bold());

    let mut last_head = outcome.head;
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                if let Err(e) = ctx.scan_disk(now) {
                    tracing::warn!(error = %e, "project scan failed");
                }
                let report = ctx.tick(now);
                if report.autosaved {
                    let head = ctx.history().get_head_hash(project);
                    if head != last_head {
                        if let Some(id) = head {
                            println!("{} autosaved {}", "✓".green(), id.short_hex().yellow());
                        }
                        last_head = head;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    if ctx.close_project(&mut TerminalHost) {
        println!("{} Final snapshot recorded.", "✓".green().bold());
    }
    Ok(())
}

fn cmd_config(project: &Path, args: ConfigArgs) -> anyhow::Result<()> {
    let config = HistoryConfig::load_for_project(project)?;
    if args.write {
        let path = HistoryConfig::project_config_path(project);
        config.save(&path)?;
        println!("Wrote {}", path.display().to_string().bold());
        return Ok(());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
