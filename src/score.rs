//! Turns the two levels a staircase ended on into a LogMAR and a Snellen
//! score.
//!
//! The base is the LogMAR of the primary level. Every missed letter at
//! either level adds 0.01 (one letter of a ten-letter line), and the Snellen
//! denominator follows as `20 * 10^logmar`.

use crate::{
    acuity::{AcuityChart, AcuityLevel},
    staircase::Terminal,
};

use log::info;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt};

/// LogMAR added per missed letter.
pub const LOGMAR_PER_LETTER: f64 = 0.01;

/// A finished test's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    /// The LogMAR value.
    pub logmar: f64,
    /// `x` in 20/x.
    pub snellen_denominator: f64,
}

impl fmt::Display for FinalScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogMAR: {:.4}, Snellen: 20/{:.0}",
            self.logmar, self.snellen_denominator
        )
    }
}

/// Scoring a finished staircase failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreError {
    /// The primary level has no LogMAR value.
    MissingLogMar(AcuityLevel),
}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ScoreError::MissingLogMar(level) => {
                Cow::from(format!("cannot score {}, it has no LogMAR value", level))
            }
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ScoreError {}

/// Scores against one chart, with blocks of `letters_per_level` trials.
#[derive(Debug, Clone, Copy)]
pub struct ScoreCalculator<'a> {
    chart: &'a AcuityChart,
    letters_per_level: u32,
}

impl<'a> ScoreCalculator<'a> {
    /// Score against `chart`, with `letters_per_level` letters per level.
    pub fn new(chart: &'a AcuityChart, letters_per_level: u32) -> Self {
        Self {
            chart,
            letters_per_level,
        }
    }

    fn misses(&self, correct: u32) -> f64 {
        self.letters_per_level.saturating_sub(correct) as f64
    }

    /// Score from the primary level, which gives the base LogMAR, and the
    /// secondary one. Only the primary level needs a LogMAR entry.
    pub fn finalize(
        &self,
        level1: AcuityLevel,
        correct1: u32,
        level2: AcuityLevel,
        correct2: u32,
    ) -> Result<FinalScore, ScoreError> {
        let base = self
            .chart
            .logmar(level1)
            .ok_or(ScoreError::MissingLogMar(level1))?;

        let logmar = base
            + self.misses(correct1) * LOGMAR_PER_LETTER
            + self.misses(correct2) * LOGMAR_PER_LETTER;
        let score = FinalScore {
            logmar,
            snellen_denominator: 20.0 * 10f64.powf(logmar),
        };

        info!(
            "Scored {} ({} correct) and {} ({} correct): {}",
            level1, correct1, level2, correct2, score
        );
        Ok(score)
    }

    /// Score whatever a staircase ended on.
    pub fn score_terminal(&self, terminal: &Terminal) -> Result<FinalScore, ScoreError> {
        self.finalize(
            terminal.primary.level,
            terminal.primary.correct,
            terminal.secondary.level,
            terminal.secondary.correct,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staircase::{LevelResult, TerminalReason};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn perfect_blocks_score_the_table_value() {
        let chart = AcuityChart::default();
        let calc = ScoreCalculator::new(&chart, 10);
        let score = calc
            .finalize(AcuityLevel(200), 10, AcuityLevel(200), 10)
            .unwrap();
        assert!(close(score.logmar, 1.0));
        assert!(close(score.snellen_denominator, 200.0));
        assert_eq!(score.to_string(), "LogMAR: 1.0000, Snellen: 20/200");
    }

    #[test]
    fn every_miss_costs_a_letter() {
        let chart = AcuityChart::default();
        let calc = ScoreCalculator::new(&chart, 10);
        let score = calc.finalize(AcuityLevel(20), 7, AcuityLevel(25), 9).unwrap();
        assert!(close(score.logmar, 0.04));
        assert!(close(score.snellen_denominator, 20.0 * 10f64.powf(0.04)));
        assert_eq!(score.to_string(), "LogMAR: 0.0400, Snellen: 20/22");
    }

    #[test]
    fn only_the_primary_level_needs_a_table_entry() {
        let chart = AcuityChart::default();
        let calc = ScoreCalculator::new(&chart, 10);
        assert!(calc.finalize(AcuityLevel(40), 6, AcuityLevel(33), 2).is_ok());
        assert_eq!(
            calc.finalize(AcuityLevel(33), 6, AcuityLevel(40), 2),
            Err(ScoreError::MissingLogMar(AcuityLevel(33)))
        );
    }

    #[test]
    fn scores_a_staircase_terminal() {
        let chart = AcuityChart::default();
        let calc = ScoreCalculator::new(&chart, 10);
        let terminal = Terminal {
            primary: LevelResult {
                level: AcuityLevel(125),
                correct: 3,
            },
            secondary: LevelResult {
                level: AcuityLevel(160),
                correct: 10,
            },
            reason: TerminalReason::Converged,
        };
        let score = calc.score_terminal(&terminal).unwrap();
        assert!(close(score.logmar, 0.87));
    }
}
