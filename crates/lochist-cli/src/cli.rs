use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lochist",
    about = "Local project history: autosave snapshots, save points, and restore",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Project directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub project: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the history directory
    Init,
    /// Snapshot every project file
    Snapshot(SnapshotArgs),
    /// Show snapshot history, newest first
    Log(LogArgs),
    /// Show one snapshot and its files
    Show(ShowArgs),
    /// Move a tag to the latest snapshot
    Tag(TagArgs),
    /// List tags
    Tags,
    /// Show changes between two snapshots
    Diff(DiffArgs),
    /// Restore project files from a snapshot
    Restore(RestoreArgs),
    /// Compare project files with the latest snapshot
    Status,
    /// Prune history to a size limit
    Gc(GcArgs),
    /// Check stored objects for damage
    Verify,
    /// Autosave the project while it changes
    Watch(WatchArgs),
    /// Show or write the history configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct SnapshotArgs {
    #[arg(short, long, default_value = "Snapshot")]
    pub message: String,
    /// Also move this tag to the new snapshot
    #[arg(short, long)]
    pub tag: Option<String>,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Tag name or (abbreviated) snapshot hash
    pub rev: String,
}

#[derive(Args)]
pub struct TagArgs {
    pub name: String,
}

#[derive(Args)]
pub struct DiffArgs {
    pub from: String,
    pub to: String,
    /// Print line diffs of modified files
    #[arg(short, long)]
    pub patch: bool,
}

#[derive(Args)]
pub struct RestoreArgs {
    pub rev: String,
}

#[derive(Args)]
pub struct GcArgs {
    /// Byte limit; defaults to backup.limit_total_size
    #[arg(long)]
    pub limit: Option<i64>,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Seconds between change checks
    #[arg(long, default_value = "2")]
    pub interval: u64,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the effective configuration to .history/config.toml
    #[arg(long)]
    pub write: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["lochist", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        assert_eq!(cli.project, PathBuf::from("."));
    }

    #[test]
    fn parse_snapshot_with_message_and_tag() {
        let cli = Cli::try_parse_from(["lochist", "snapshot", "-m", "before reroute", "-t", "Save"]).unwrap();
        if let Command::Snapshot(args) = cli.command {
            assert_eq!(args.message, "before reroute");
            assert_eq!(args.tag, Some("Save".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_log_oneline() {
        let cli = Cli::try_parse_from(["lochist", "log", "--oneline", "-n", "5"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert!(args.oneline);
            assert_eq!(args.limit, 5);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_tag_with_spaces() {
        let cli = Cli::try_parse_from(["lochist", "tag", "Declined restore"]).unwrap();
        if let Command::Tag(args) = cli.command {
            assert_eq!(args.name, "Declined restore");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_diff_patch() {
        let cli = Cli::try_parse_from(["lochist", "diff", "abcd", "project", "--patch"]).unwrap();
        if let Command::Diff(args) = cli.command {
            assert_eq!(args.from, "abcd");
            assert_eq!(args.to, "project");
            assert!(args.patch);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_gc_limit() {
        let cli = Cli::try_parse_from(["lochist", "gc", "--limit", "1048576"]).unwrap();
        if let Command::Gc(args) = cli.command {
            assert_eq!(args.limit, Some(1_048_576));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_watch_default_interval() {
        let cli = Cli::try_parse_from(["lochist", "watch"]).unwrap();
        if let Command::Watch(args) = cli.command {
            assert_eq!(args.interval, 2);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_project_after_subcommand() {
        let cli = Cli::try_parse_from(["lochist", "status", "-C", "/tmp/board"]).unwrap();
        assert!(matches!(cli.command, Command::Status));
        assert_eq!(cli.project, PathBuf::from("/tmp/board"));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["lochist", "--verbose", "verify"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["lochist", "--format", "json", "tags"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
