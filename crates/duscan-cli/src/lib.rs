/// duscan CLI — command-line frontend.
///
/// This crate owns everything user-facing: argument parsing, the transient
/// progress line, human/JSON rendering, and exit-code policy. The scan
/// itself lives in `duscan-core`.
pub mod render;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use duscan_core::model::{format_count, format_size};
use duscan_core::{start_scan, Report, ScanHandle, ScanOptions, ScanProgress, SizeMode};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// How many recorded issues are listed on stderr before eliding the rest.
const MAX_LISTED_ISSUES: usize = 20;

#[derive(Debug, Parser)]
#[command(
    name = "duscan",
    version,
    about = "Parallel disk usage analyser with streaming progress"
)]
pub struct Cli {
    /// Root paths to scan.
    #[arg(required = true, value_name = "PATH")]
    roots: Vec<PathBuf>,

    /// Limit traversal depth; directories at the limit are recorded but
    /// not expanded.
    #[arg(short = 'd', long, value_name = "DEPTH")]
    max_depth: Option<usize>,

    /// Report apparent sizes instead of allocated (on-disk) sizes.
    #[arg(long)]
    apparent: bool,

    /// Stay on the filesystem of each root; do not cross mount points.
    #[arg(short = 'x', long = "one-file-system")]
    one_file_system: bool,

    /// Follow symlinked directories (cycles are detected and pruned).
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Skip entries whose full path matches this glob (repeatable).
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Emit the full report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Also list the N largest files.
    #[arg(long, value_name = "N", default_value_t = 0)]
    top: usize,

    /// Worker threads (default: twice the available cores).
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Do not draw the transient progress line on stderr.
    #[arg(long)]
    no_progress: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn size_mode(&self) -> SizeMode {
        if self.apparent {
            SizeMode::Apparent
        } else {
            SizeMode::Allocated
        }
    }

    fn scan_options(&self) -> ScanOptions {
        let defaults = ScanOptions::default();
        ScanOptions {
            roots: self.roots.clone(),
            max_depth: self.max_depth,
            follow_symlinks: self.follow_symlinks,
            same_filesystem: self.one_file_system,
            exclude: self.exclude.clone(),
            threads: self.threads,
            // The finalize cache must cover the requested listing or
            // `--top N` would silently truncate at the default.
            largest_files: self.top.max(defaults.largest_files),
            ..defaults
        }
    }
}

/// Run the CLI end to end. Per-node issues are warnings and leave the exit
/// status at success; only fatal scan errors propagate (and exit non-zero
/// via `main`).
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mode = cli.size_mode();
    let handle = start_scan(cli.scan_options())?;

    if !cli.no_progress {
        pump_progress(&handle);
    }

    let result = handle.join()?;

    if cli.json {
        println!("{}", Report::new(&result).to_json()?);
    } else {
        print!("{}", render::human(&result, mode, cli.top));
    }

    let issues = &result.summary.issues;
    if !issues.is_empty() {
        eprintln!(
            "{} entries could not be fully read:",
            format_count(issues.len() as u64)
        );
        for issue in issues.iter().take(MAX_LISTED_ISSUES) {
            eprintln!("  {}: {}", issue.path.display(), issue.message);
        }
        if issues.len() > MAX_LISTED_ISSUES {
            eprintln!("  ... and {} more", issues.len() - MAX_LISTED_ISSUES);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Drain the progress channel into a transient stderr line until the scan
/// signals completion or the channel disconnects.
fn pump_progress(handle: &ScanHandle) {
    loop {
        match handle.progress_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(ScanProgress::Update {
                files,
                apparent_bytes,
                current_path,
                ..
            }) => {
                eprint!(
                    "\r\x1b[2K  {} files, {}  {}",
                    format_count(files),
                    format_size(apparent_bytes),
                    current_path.display()
                );
            }
            Ok(ScanProgress::Complete { .. }) | Ok(ScanProgress::Cancelled) => break,
            // Issues are summarized after the scan; skip them here.
            Ok(ScanProgress::Issue(_)) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    eprint!("\r\x1b[2K");
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_scan_options() {
        let cli = Cli::parse_from([
            "duscan",
            "/tmp",
            "-d",
            "3",
            "-x",
            "-L",
            "--exclude",
            "*.log",
            "--threads",
            "4",
            "--top",
            "200",
            "--apparent",
        ]);

        let options = cli.scan_options();
        assert_eq!(options.roots, vec![PathBuf::from("/tmp")]);
        assert_eq!(options.max_depth, Some(3));
        assert!(options.same_filesystem);
        assert!(options.follow_symlinks);
        assert_eq!(options.exclude, vec!["*.log".to_string()]);
        assert_eq!(options.threads, Some(4));
        assert_eq!(options.largest_files, 200);
        assert_eq!(cli.size_mode(), SizeMode::Apparent);
    }

    #[test]
    fn small_top_values_keep_the_default_largest_cache() {
        let cli = Cli::parse_from(["duscan", "/tmp", "--top", "5"]);
        let options = cli.scan_options();
        assert_eq!(
            options.largest_files,
            ScanOptions::default().largest_files
        );
    }

    #[test]
    fn allocated_is_the_default_accounting() {
        let cli = Cli::parse_from(["duscan", "/tmp"]);
        assert_eq!(cli.size_mode(), SizeMode::Allocated);
    }

    #[test]
    fn at_least_one_root_is_required() {
        assert!(Cli::try_parse_from(["duscan"]).is_err());
    }
}
