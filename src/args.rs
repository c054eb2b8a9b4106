//! Command line arguments for the `eyechart` binary.

// Commandline argument parser using clap for EyeChart

use crate::{classifier::TestKind, distance_source::Eye};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command line for the `eyechart` binary.
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct EyeChartArgs {
    #[command(subcommand)]
    /// Which task to perform, an interactive exam or a scripted replay
    pub command: CommandTask,

    /// RON file with test settings; defaults are used for anything missing
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Pixel density of the display, overriding the config
    #[arg(long = "ppi", global = true)]
    pub ppi: Option<f64>,

    /// Viewing distance to test at, in centimeters
    #[arg(short = 'd', long = "distance", global = true)]
    pub distance: Option<f64>,

    /// Starting acuity as the x in 20/x; asks interactively when left out
    #[arg(short = 's', long = "start", global = true)]
    pub start: Option<u32>,

    /// Filename for the finished exam to be written to
    #[arg(short = 'o', long = "out", global = true)]
    pub outfile: Option<PathBuf>,
}

/// What `eyechart` was asked to do.
#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Test both eyes in the terminal, with a simulated face tracker
    #[command(about)]
    Exam(ExamCommand),

    /// Run one eye's test from an event script and print the score
    #[command(about)]
    Replay(ReplayCommand),
}

/// Options for `eyechart exam`.
#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ExamCommand {
    /// Which kind of optotype to show
    #[arg(value_enum)]
    pub kind: TestKind,
}

/// Options for `eyechart replay`.
#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ReplayCommand {
    /// Event script to replay
    pub script: PathBuf,

    /// Which kind of optotype the script answers
    #[arg(short = 'k', long = "kind", value_enum)]
    pub kind: TestKind,

    /// Which eye the script tests
    #[arg(short = 'e', long = "eye", value_enum, default_value_t = Eye::Right)]
    pub eye: Eye,

    /// Seed for the optotype draws, for reproducible replays
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_exam() {
        let args = EyeChartArgs::parse_from(["eyechart", "exam", "tumbling-e", "--ppi", "458"]);
        assert_eq!(args.ppi, Some(458.0));
        assert!(matches!(
            args.command,
            CommandTask::Exam(ExamCommand {
                kind: TestKind::TumblingE
            })
        ));
    }

    #[test]
    fn parses_a_replay() {
        let args = EyeChartArgs::parse_from([
            "eyechart", "-s", "63", "replay", "run.txt", "--kind", "etdrs", "--eye", "left",
        ]);
        assert_eq!(args.start, Some(63));
        match args.command {
            CommandTask::Replay(replay) => {
                assert_eq!(replay.script, PathBuf::from("run.txt"));
                assert_eq!(replay.kind, TestKind::Etdrs);
                assert_eq!(replay.eye, Eye::Left);
                assert_eq!(replay.seed, None);
            }
            other => panic!("expected a replay, got {:?}", other),
        }
    }

    #[test]
    fn replay_needs_a_kind() {
        assert!(EyeChartArgs::try_parse_from(["eyechart", "replay", "run.txt"]).is_err());
    }
}
