//! Acuity levels in Snellen 20/x notation and the chart that orders them.
//!
//! An [AcuityChart] pairs the ordered list of levels a test walks through
//! (largest letters first) with the table converting each level to LogMAR.
//! The two must stay in lock-step: every level on the chart needs a LogMAR
//! entry, so building a chart checks that up front.

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap, fmt};

/// The levels walked by a default test, largest (easiest) first.
pub const DEFAULT_ACUITY_LEVELS: [u32; 11] = [200, 160, 125, 100, 80, 63, 50, 40, 32, 20, 16];

/// US foot notation (20/x) to LogMAR.
pub const DEFAULT_LOGMAR_TABLE: [(u32, f64); 24] = [
    (10, -0.3),
    (12, -0.2),
    (16, -0.1),
    (20, 0.0),
    (25, 0.1),
    (32, 0.2),
    (40, 0.3),
    (50, 0.4),
    (63, 0.5),
    (80, 0.6),
    (100, 0.7),
    (125, 0.8),
    (160, 0.9),
    (200, 1.0),
    (250, 1.1),
    (320, 1.2),
    (400, 1.3),
    (500, 1.4),
    (630, 1.5),
    (800, 1.6),
    (1000, 1.7),
    (1260, 1.8),
    (1600, 1.9),
    (2000, 2.0),
];

/// An acuity level, stored as the Snellen denominator `x` in 20/x. Larger
/// values mean a bigger letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcuityLevel(pub u32);

impl AcuityLevel {
    /// The Snellen denominator.
    pub fn denominator(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AcuityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "20/{}", self.0)
    }
}

/// Returned when a chart's level list and LogMAR table disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartError {
    /// The chart has no levels at all.
    Empty,

    /// The level at this position is not smaller than the one before it.
    NotDecreasing(usize),

    /// A level on the chart has no LogMAR value.
    MissingLogMar(AcuityLevel),
}

impl fmt::Display for ChartError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ChartError::Empty => Cow::from("acuity chart has no levels"),
            ChartError::NotDecreasing(idx) => Cow::from(format!(
                "acuity level at index {} is not smaller than the previous one",
                idx
            )),
            ChartError::MissingLogMar(level) => {
                Cow::from(format!("no LogMAR value for acuity {}", level))
            }
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ChartError {}

/// The ordered levels of a test together with their LogMAR values.
#[derive(Debug, Clone, PartialEq)]
pub struct AcuityChart {
    levels: Vec<AcuityLevel>,
    logmar: BTreeMap<AcuityLevel, f64>,
}

impl AcuityChart {
    /// Builds a chart, checking that `levels` is non-empty, strictly
    /// decreasing, and fully covered by `logmar`.
    pub fn new(levels: &[u32], logmar: &BTreeMap<u32, f64>) -> Result<Self, ChartError> {
        if levels.is_empty() {
            return Err(ChartError::Empty);
        }

        if let Some(idx) = levels.windows(2).position(|w| w[1] >= w[0]) {
            return Err(ChartError::NotDecreasing(idx + 1));
        }

        if let Some(&missing) = levels.iter().find(|l| !logmar.contains_key(l)) {
            return Err(ChartError::MissingLogMar(AcuityLevel(missing)));
        }

        Ok(Self {
            levels: levels.iter().copied().map(AcuityLevel).collect(),
            logmar: logmar
                .iter()
                .map(|(&level, &value)| (AcuityLevel(level), value))
                .collect(),
        })
    }

    /// Number of levels on the chart.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false for a constructed chart; here for clippy's sake.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The level at `index`, if there is one.
    pub fn level(&self, index: usize) -> Option<AcuityLevel> {
        self.levels.get(index).copied()
    }

    /// All levels, largest first.
    pub fn levels(&self) -> &[AcuityLevel] {
        &self.levels
    }

    /// Position of `level` on the chart.
    pub fn index_of(&self, level: AcuityLevel) -> Option<usize> {
        self.levels.iter().position(|&l| l == level)
    }

    /// The LogMAR value for `level`, if the table has one.
    pub fn logmar(&self, level: AcuityLevel) -> Option<f64> {
        self.logmar.get(&level).copied()
    }
}

impl Default for AcuityChart {
    fn default() -> Self {
        let table: BTreeMap<u32, f64> = DEFAULT_LOGMAR_TABLE.iter().copied().collect();
        Self {
            levels: DEFAULT_ACUITY_LEVELS.iter().copied().map(AcuityLevel).collect(),
            logmar: table
                .into_iter()
                .map(|(level, value)| (AcuityLevel(level), value))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_table() -> BTreeMap<u32, f64> {
        DEFAULT_LOGMAR_TABLE.iter().copied().collect()
    }

    #[test]
    fn default_chart_is_consistent() {
        let built = AcuityChart::new(&DEFAULT_ACUITY_LEVELS, &default_table()).unwrap();
        assert_eq!(built, AcuityChart::default());
        assert_eq!(built.len(), 11);
        assert_eq!(built.level(0), Some(AcuityLevel(200)));
        assert_eq!(built.level(10), Some(AcuityLevel(16)));
        assert_eq!(built.level(11), None);
    }

    #[test]
    fn levels_shrink_along_the_chart() {
        let chart = AcuityChart::default();
        assert!(chart.levels().windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn rejects_out_of_order_levels() {
        let res = AcuityChart::new(&[200, 100, 160], &default_table());
        assert_eq!(res, Err(ChartError::NotDecreasing(2)));
    }

    #[test]
    fn rejects_level_without_logmar() {
        let res = AcuityChart::new(&[200, 150, 100], &default_table());
        assert_eq!(res, Err(ChartError::MissingLogMar(AcuityLevel(150))));
    }

    #[test]
    fn rejects_empty_chart() {
        assert_eq!(AcuityChart::new(&[], &default_table()), Err(ChartError::Empty));
    }

    #[test]
    fn looks_up_logmar_and_index() {
        let chart = AcuityChart::default();
        assert_eq!(chart.logmar(AcuityLevel(20)), Some(0.0));
        assert_eq!(chart.logmar(AcuityLevel(200)), Some(1.0));
        assert_eq!(chart.index_of(AcuityLevel(63)), Some(5));
        assert_eq!(chart.index_of(AcuityLevel(25)), None);
        assert_eq!(AcuityLevel(40).to_string(), "20/40");
    }
}
