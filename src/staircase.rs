//! The adaptive staircase that walks the acuity chart.
//!
//! Each level is a block of up to ten trials. Six or more correct passes
//! the level and moves one step smaller; fewer fails it and moves one step
//! larger. Five correct out of the first five ends the block early and is
//! credited as a perfect block. The walk ends as soon as it would step onto
//! a level it has already visited, when the smallest level is passed, or
//! when the largest level is failed.

use crate::acuity::{AcuityChart, AcuityLevel};

use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Correct answers recorded per visited level.
pub type LevelTally = BTreeMap<AcuityLevel, u32>;

/// The thresholds of the procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaircaseRules {
    /// Trials in a full block.
    pub trials_per_level: u32,
    /// Correct answers needed to pass a block.
    pub pass_threshold: u32,
    /// A block whose first `skip_after` answers are all correct ends early.
    pub skip_after: u32,
}

impl Default for StaircaseRules {
    fn default() -> Self {
        Self {
            trials_per_level: 10,
            pass_threshold: 6,
            skip_after: 5,
        }
    }
}

/// Correct answers at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelResult {
    /// The level.
    pub level: AcuityLevel,
    /// Correct answers credited at it.
    pub correct: u32,
}

/// Why the walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// The smallest level on the chart was passed.
    SmallestLevelPassed,
    /// The walk would have revisited a level.
    Converged,
    /// The largest level was failed; the result is a floor, not a measurement.
    CouldNotAssess,
}

/// The two levels a final score is computed from. `primary` supplies the
/// base LogMAR; both contribute their misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminal {
    /// The level the score is read from.
    pub primary: LevelResult,
    /// The level whose tally adjusts the score.
    pub secondary: LevelResult,
    /// Why the staircase stopped.
    pub reason: TerminalReason,
}

/// Where the staircase is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaircaseState {
    /// Still testing the level at `index`.
    InProgress {
        /// Position of the level on the chart.
        index: usize,
        /// Answers given at this level.
        trial_in_level: u32,
        /// Of those, how many were right.
        correct_in_level: u32,
    },
    /// Stopped, with the levels to score.
    Terminal(Terminal),
}

/// What one recorded trial did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Same level, next trial.
    Continue,
    /// Level passed, moved to this smaller level.
    Advanced(AcuityLevel),
    /// Level failed, moved back to this larger level.
    Retreated(AcuityLevel),
    /// The walk is over.
    Finished(Terminal),
    /// The walk was already over; nothing recorded.
    AlreadyFinished,
}

/// The adaptive test over one [AcuityChart].
#[derive(Debug, Clone)]
pub struct AcuityStaircase {
    chart: AcuityChart,
    rules: StaircaseRules,
    state: StaircaseState,
    tally: LevelTally,
}

impl AcuityStaircase {
    /// Start at `start`, or at the largest level when no start was chosen or
    /// the chosen one isn't on the chart.
    pub fn new(chart: AcuityChart, rules: StaircaseRules, start: Option<AcuityLevel>) -> Self {
        let index = match start {
            None => 0,
            Some(level) => chart.index_of(level).unwrap_or_else(|| {
                warn!("Starting acuity {} is not on the chart, starting at the top", level);
                0
            }),
        };

        Self {
            chart,
            rules,
            state: StaircaseState::InProgress {
                index,
                trial_in_level: 0,
                correct_in_level: 0,
            },
            tally: LevelTally::new(),
        }
    }

    /// The chart being walked.
    pub fn chart(&self) -> &AcuityChart {
        &self.chart
    }

    /// The thresholds in use.
    pub fn rules(&self) -> StaircaseRules {
        self.rules
    }

    /// The current state.
    pub fn state(&self) -> StaircaseState {
        self.state
    }

    /// Correct answers credited per finished level.
    pub fn tally(&self) -> &LevelTally {
        &self.tally
    }

    /// The level being tested, or `None` once the walk is over.
    pub fn current_level(&self) -> Option<AcuityLevel> {
        match self.state {
            StaircaseState::InProgress { index, .. } => self.chart.level(index),
            StaircaseState::Terminal(_) => None,
        }
    }

    /// The outcome, once the staircase has stopped.
    pub fn terminal(&self) -> Option<Terminal> {
        match self.state {
            StaircaseState::Terminal(t) => Some(t),
            StaircaseState::InProgress { .. } => None,
        }
    }

    /// Whether the staircase has stopped.
    pub fn is_terminal(&self) -> bool {
        self.terminal().is_some()
    }

    fn tallied(&self, level: AcuityLevel) -> Option<LevelResult> {
        self.tally
            .get(&level)
            .map(|&correct| LevelResult { level, correct })
    }

    fn finish(&mut self, primary: LevelResult, secondary: LevelResult, reason: TerminalReason) -> Step {
        let terminal = Terminal {
            primary,
            secondary,
            reason,
        };
        info!(
            "Staircase finished ({:?}): {} with {} correct, {} with {} correct",
            reason, primary.level, primary.correct, secondary.level, secondary.correct
        );
        self.state = StaircaseState::Terminal(terminal);
        Step::Finished(terminal)
    }

    fn move_to(&mut self, index: usize) {
        self.state = StaircaseState::InProgress {
            index,
            trial_in_level: 0,
            correct_in_level: 0,
        };
    }

    /// Record one scored trial at the current level.
    pub fn record(&mut self, is_correct: bool) -> Step {
        let (index, mut trial, mut correct) = match self.state {
            StaircaseState::InProgress {
                index,
                trial_in_level,
                correct_in_level,
            } => (index, trial_in_level, correct_in_level),
            StaircaseState::Terminal(_) => return Step::AlreadyFinished,
        };
        // index always comes from the chart
        let level = match self.chart.level(index) {
            Some(level) => level,
            None => return Step::AlreadyFinished,
        };

        trial += 1;
        if is_correct {
            correct += 1;
        }
        self.tally.insert(level, correct);
        debug!(
            "{} trial {}: {} ({} correct so far)",
            level,
            trial,
            if is_correct { "correct" } else { "wrong" },
            correct
        );

        let skipped = trial == self.rules.skip_after && correct == self.rules.skip_after;
        if trial < self.rules.trials_per_level && !skipped {
            self.state = StaircaseState::InProgress {
                index,
                trial_in_level: trial,
                correct_in_level: correct,
            };
            return Step::Continue;
        }

        if skipped {
            debug!("First {} at {} all correct, crediting a full block", trial, level);
            correct = self.rules.trials_per_level;
            self.tally.insert(level, correct);
        }

        let here = LevelResult { level, correct };
        let passed = correct >= self.rules.pass_threshold;
        let last = self.chart.len() - 1;

        if passed && index == last {
            let below = index
                .checked_sub(1)
                .and_then(|i| self.chart.level(i))
                .map(|l| self.tallied(l).unwrap_or(LevelResult { level: l, correct: 0 }))
                .unwrap_or(here);
            return self.finish(here, below, TerminalReason::SmallestLevelPassed);
        }

        if !passed {
            if index == 0 {
                // Nothing larger to fall back to.
                let next = match self.chart.level(1) {
                    Some(l) => self.tallied(l).unwrap_or(LevelResult { level: l, correct: 0 }),
                    None => here,
                };
                return self.finish(next, here, TerminalReason::CouldNotAssess);
            }

            let previous = index - 1;
            let previous_level = self.chart.level(previous).unwrap_or(level);
            if let Some(seen) = self.tallied(previous_level) {
                return self.finish(here, seen, TerminalReason::Converged);
            }

            info!("Failed {}, going back to {}", level, previous_level);
            self.move_to(previous);
            return Step::Retreated(previous_level);
        }

        let next = index + 1;
        let next_level = self.chart.level(next).unwrap_or(level);
        if let Some(seen) = self.tallied(next_level) {
            return self.finish(seen, here, TerminalReason::Converged);
        }

        info!("Passed {}, advancing to {}", level, next_level);
        self.move_to(next);
        Step::Advanced(next_level)
    }
}
