//! Test settings, loaded from a [ron] file. Every field has a default, so a
//! config file only needs the values it changes:
//!
//! ```text
//! (
//!     pixels_per_inch: 458.0,
//!     default_target_distance_cm: 50.0,
//! )
//! ```

use crate::{
    acuity::{AcuityChart, ChartError, DEFAULT_ACUITY_LEVELS, DEFAULT_LOGMAR_TABLE},
    distance_source::Centimeters,
    distance_tracker::DEFAULT_PLAUSIBLE_CM,
    staircase::StaircaseRules,
};

use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{Read, Write},
    path::Path,
    time::Duration,
};

/// Everything that can go wrong reading or checking a [TestConfig].
#[derive(Debug)]
pub enum ConfigError {
    /// Returned when the file can't be read or written.
    IoError(std::io::Error),

    /// Returned when the file isn't valid RON for a [TestConfig].
    RonSpannedError(ron::de::SpannedError),

    /// Returned when writing the config out fails.
    RonError(ron::Error),

    /// The acuity levels and LogMAR table don't line up.
    Chart(ChartError),

    /// A threshold is out of range.
    InvalidRules(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError as CE;
        let msg = match self {
            CE::IoError(error) => Cow::from(format!("io error: {}", error)),
            CE::RonSpannedError(error) => Cow::from(format!("ron spanning error: {}", error)),
            CE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            CE::Chart(error) => Cow::from(format!("bad acuity chart: {}", error)),
            CE::InvalidRules(why) => Cow::from(format!("invalid test rules: {}", why)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::IoError(value)
    }
}

impl From<ron::de::SpannedError> for ConfigError {
    fn from(value: ron::de::SpannedError) -> Self {
        ConfigError::RonSpannedError(value)
    }
}

impl From<ChartError> for ConfigError {
    fn from(value: ChartError) -> Self {
        ConfigError::Chart(value)
    }
}

/// Tunable parameters of a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Snellen denominators, largest first.
    pub acuity_levels: Vec<u32>,
    /// Snellen denominator to LogMAR.
    pub logmar_table: BTreeMap<u32, f64>,
    /// Answers per level before it is judged.
    pub trials_per_level: u32,
    /// Correct answers needed to pass a level.
    pub pass_threshold: u32,
    /// Answers after which an all-correct level is passed early.
    pub skip_after: u32,
    /// Exclusive bounds on raw readings the tracker accepts.
    pub plausible_distance_cm: (Centimeters, Centimeters),
    /// Bounds on a distance that can be captured as the target.
    pub capture_range_cm: (Centimeters, Centimeters),
    /// Target used when none was captured.
    pub default_target_distance_cm: Centimeters,
    /// Half-width of the allowed band, as a fraction of the target.
    pub distance_tolerance: f64,
    /// Hysteresis applied while paused.
    pub resume_margin_cm: Centimeters,
    /// Smallest distance change that resizes the optotype.
    pub rescale_threshold_cm: Centimeters,
    /// Screen density used for sizing.
    pub pixels_per_inch: f64,
    /// How long to listen for an answer.
    pub listen_timeout_secs: f64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            acuity_levels: DEFAULT_ACUITY_LEVELS.to_vec(),
            logmar_table: DEFAULT_LOGMAR_TABLE.iter().copied().collect(),
            trials_per_level: 10,
            pass_threshold: 6,
            skip_after: 5,
            plausible_distance_cm: DEFAULT_PLAUSIBLE_CM,
            capture_range_cm: (10.0, 100.0),
            default_target_distance_cm: 40.0,
            distance_tolerance: 0.2,
            resume_margin_cm: 3.0,
            rescale_threshold_cm: 2.0,
            pixels_per_inch: 326.0,
            listen_timeout_secs: 15.0,
        }
    }
}

impl TestConfig {
    /// Read a config from the path provided.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut handle = File::open(path)?;
        Self::from_file(&mut handle)
    }

    /// Read a config from the [Read]able object provided.
    pub fn from_file(file: &mut impl Read) -> Result<Self, ConfigError> {
        let mut text = String::new();
        file.read_to_string(&mut text)?;
        Ok(ron::from_str(&text)?)
    }

    /// Write the config out to the path provided.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut handle = File::create(path)?;
        self.to_file(&mut handle)
    }

    /// Write the config out to the [Write]able object provided.
    pub fn to_file(&self, file: &mut impl Write) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::RonError)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }

    /// The staircase thresholds.
    pub fn rules(&self) -> StaircaseRules {
        StaircaseRules {
            trials_per_level: self.trials_per_level,
            pass_threshold: self.pass_threshold,
            skip_after: self.skip_after,
        }
    }

    /// [TestConfig::listen_timeout_secs] as a [Duration].
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.listen_timeout_secs.max(0.0))
    }

    /// Check the config and build its chart.
    pub fn validate(&self) -> Result<AcuityChart, ConfigError> {
        let chart = AcuityChart::new(&self.acuity_levels, &self.logmar_table)?;

        let invalid = |why: &str| Err(ConfigError::InvalidRules(why.to_string()));
        if self.skip_after == 0 || self.skip_after >= self.trials_per_level {
            return invalid("skip_after must be between 1 and trials_per_level - 1");
        }
        if self.pass_threshold == 0 || self.pass_threshold > self.trials_per_level {
            return invalid("pass_threshold must be between 1 and trials_per_level");
        }
        let (plausible_low, plausible_high) = self.plausible_distance_cm;
        if !(plausible_low >= 0.0 && plausible_low < plausible_high) {
            return invalid("plausible_distance_cm must be an increasing, non-negative range");
        }
        let (low, high) = self.capture_range_cm;
        if !(low > 0.0 && low < high) {
            return invalid("capture_range_cm must be an increasing, positive range");
        }
        if !(low > plausible_low && high < plausible_high) {
            return invalid("capture_range_cm must lie inside plausible_distance_cm");
        }
        if !(self.distance_tolerance > 0.0 && self.distance_tolerance < 1.0) {
            return invalid("distance_tolerance must be between 0 and 1");
        }
        if !(self.pixels_per_inch > 0.0) {
            return invalid("pixels_per_inch must be positive");
        }
        if !(self.default_target_distance_cm > 0.0) {
            return invalid("default_target_distance_cm must be positive");
        }

        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acuity::AcuityLevel;
    use std::io::{Cursor, Seek, SeekFrom};

    #[test]
    fn defaults_validate() {
        let config = TestConfig::default();
        let chart = config.validate().unwrap();
        assert_eq!(chart.len(), 11);
        assert_eq!(chart.logmar(AcuityLevel(200)), Some(1.0));
        assert_eq!(config.rules(), StaircaseRules::default());
        assert_eq!(config.listen_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut text = Cursor::new("(pixels_per_inch: 458.0, skip_after: 4)");
        let config = TestConfig::from_file(&mut text).unwrap();
        assert_eq!(config.pixels_per_inch, 458.0);
        assert_eq!(config.skip_after, 4);
        assert_eq!(config.trials_per_level, 10);
        assert_eq!(config.default_target_distance_cm, 40.0);
    }

    #[test]
    fn garbage_is_a_ron_error() {
        let mut text = Cursor::new("(pixels_per_inch: \"lots\")");
        assert!(matches!(
            TestConfig::from_file(&mut text),
            Err(ConfigError::RonSpannedError(_))
        ));
    }

    #[test]
    fn chart_out_of_lock_step_is_rejected() {
        let mut config = TestConfig::default();
        config.acuity_levels.push(15);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Chart(ChartError::MissingLogMar(AcuityLevel(15))))
        ));
    }

    #[test]
    fn bad_thresholds_are_rejected() {
        let mut config = TestConfig::default();
        config.skip_after = 10;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRules(_))));

        let mut config = TestConfig::default();
        config.pass_threshold = 11;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRules(_))));

        let mut config = TestConfig::default();
        config.capture_range_cm = (2.0, 100.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRules(_))));

        let mut config = TestConfig::default();
        config.capture_range_cm = (10.0, 200.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRules(_))));

        let mut config = TestConfig::default();
        config.capture_range_cm = (f64::NAN, 100.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRules(_))));

        let mut config = TestConfig::default();
        config.distance_tolerance = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRules(_))));
    }

    #[test]
    fn survives_a_trip_through_a_file() {
        let mut config = TestConfig::default();
        config.pixels_per_inch = 401.0;
        config.capture_range_cm = (20.0, 80.0);

        let mut file = tempfile::tempfile().unwrap();
        config.to_file(&mut file).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(TestConfig::from_file(&mut file).unwrap(), config);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eyechart.ron");
        config.to_path(&path).unwrap();
        assert_eq!(TestConfig::from_path(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TestConfig::from_path(dir.path().join("nope.ron")),
            Err(ConfigError::IoError(_))
        ));
    }
}
