//! Reading and writing finished exams. An [ExamRecord] is written as a
//! single [ron] document:
//!
//! ```text
//! (kind:Etdrs,pixels_per_inch:326.0,sessions:[(session_id:Some("ETDRS_Right_20240501_093000_120"),started_at:Some("2024-05-01T09:30:00.120Z"),eye:Right,...), ...])
//! ```
//!
//! Each session carries its id and start time, then lists its trials in the
//! order they were answered, followed by its score, or `None` when the
//! session was cancelled.

use crate::{
    classifier::{ResponseClassifier, TestKind},
    distance_source::{Centimeters, Eye},
    score::FinalScore,
    session::{TestSession, TrialResult},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt,
    fs::File,
    io::{Read, Write},
    path::Path,
};

/// One eye's test as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// `None` if the session was never started.
    pub session_id: Option<String>,
    /// When the session started.
    pub started_at: Option<DateTime<Utc>>,
    /// The eye tested.
    pub eye: Eye,
    /// Distance the eye was tested at.
    pub target_distance_cm: Centimeters,
    /// Trials in the order they were answered.
    pub trials: Vec<TrialResult>,
    /// `None` when cancelled.
    pub score: Option<FinalScore>,
}

impl SessionRecord {
    /// Snapshot a session, finished or not.
    pub fn from_session<C: ResponseClassifier>(session: &TestSession<C>) -> Self {
        Self {
            session_id: session.session_id().map(str::to_owned),
            started_at: session.started_at(),
            eye: session.eye(),
            target_distance_cm: session.tracker().target_distance_cm(),
            trials: session.trials().to_vec(),
            score: session.score(),
        }
    }

    /// Fraction of trials answered correctly, or `None` with no trials.
    pub fn percent_correct(&self) -> Option<f64> {
        if self.trials.is_empty() {
            return None;
        }
        let correct = self.trials.iter().filter(|t| t.is_correct).count();
        Some(100.0 * correct as f64 / self.trials.len() as f64)
    }
}

/// Every session of one exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamRecord {
    /// Optotype used for every session.
    pub kind: TestKind,
    /// Screen density the optotypes were sized for.
    pub pixels_per_inch: f64,
    /// One entry per eye tested, in order.
    pub sessions: Vec<SessionRecord>,
}

/// Reading or writing an [ExamRecord] failed.
#[derive(Debug)]
pub enum ExportError {
    /// Returned when io fails when reading or writing files.
    IoError(std::io::Error),

    /// Returned when serialization fails.
    RonError(ron::Error),

    /// Returned when deserialization fails.
    RonSpannedError(ron::de::SpannedError),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ExportError as EE;
        let msg = match self {
            EE::IoError(error) => Cow::from(format!("io error: {}", error)),
            EE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            EE::RonSpannedError(error) => Cow::from(format!("ron spanning error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ExportError {}

impl ExamRecord {
    /// An empty record.
    pub fn new(kind: TestKind, pixels_per_inch: f64) -> Self {
        Self {
            kind,
            pixels_per_inch,
            sessions: vec![],
        }
    }

    /// The record of the session with id `session_id`.
    pub fn session(&self, session_id: &str) -> Option<&SessionRecord> {
        self.sessions
            .iter()
            .find(|s| s.session_id.as_deref() == Some(session_id))
    }

    /// The score recorded for `eye`, if that eye finished.
    pub fn score_for(&self, eye: Eye) -> Option<FinalScore> {
        self.sessions
            .iter()
            .rev()
            .find(|s| s.eye == eye)
            .and_then(|s| s.score)
    }

    /// Write out an [ExamRecord] to the path provided.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let mut handle = File::create(path).map_err(ExportError::IoError)?;
        self.to_file(&mut handle)
    }

    /// Write out an [ExamRecord] to the [Write]able object provided.
    pub fn to_file(&self, file: &mut impl Write) -> Result<(), ExportError> {
        let text = ron::ser::to_string(self).map_err(ExportError::RonError)?;
        file.write_all(text.as_bytes())
            .map_err(ExportError::IoError)
    }

    /// Read an [ExamRecord] from the path provided.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let mut handle = File::open(path).map_err(ExportError::IoError)?;
        Self::from_file(&mut handle)
    }

    /// Read an [ExamRecord] from the [Read]able object provided.
    pub fn from_file(file: &mut impl Read) -> Result<Self, ExportError> {
        let mut raw_text = Vec::new();
        file.read_to_end(&mut raw_text)
            .map_err(ExportError::IoError)?;

        ron::de::from_bytes(&raw_text).map_err(ExportError::RonSpannedError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acuity::AcuityLevel;
    use chrono::TimeZone;
    use std::io::{Seek, SeekFrom};

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, secs).unwrap()
    }

    fn trial(correct: bool) -> TrialResult {
        TrialResult {
            eye: Eye::Right,
            kind: TestKind::Etdrs,
            acuity: AcuityLevel(200),
            shown: "K".into(),
            response: "\"kay\"".into(),
            is_correct: correct,
            trial_in_level: 1,
            distance_cm: 41.5,
            response_time_ms: 1830,
            recorded_at: at(12),
        }
    }

    fn record() -> ExamRecord {
        let mut record = ExamRecord::new(TestKind::Etdrs, 326.0);
        record.sessions.push(SessionRecord {
            session_id: Some("ETDRS_Right_20240501_093000_000".to_string()),
            started_at: Some(at(0)),
            eye: Eye::Right,
            target_distance_cm: 40.0,
            trials: vec![trial(true), trial(false), trial(true), trial(true)],
            score: Some(FinalScore {
                logmar: 0.25,
                snellen_denominator: 20.0 * 10f64.powf(0.25),
            }),
        });
        record.sessions.push(SessionRecord {
            session_id: None,
            started_at: None,
            eye: Eye::Left,
            target_distance_cm: 40.0,
            trials: vec![],
            score: None,
        });
        record
    }

    #[test]
    fn write_then_read_a_file() {
        let record = record();
        let mut file = tempfile::tempfile().unwrap();
        record.to_file(&mut file).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(ExamRecord::from_file(&mut file).unwrap(), record);
    }

    #[test]
    fn write_then_read_a_path() {
        let record = record();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exam.ron");
        record.to_path(&path).unwrap();
        assert_eq!(ExamRecord::from_path(&path).unwrap(), record);
    }

    #[test]
    fn scores_per_eye() {
        let record = record();
        assert!(record.score_for(Eye::Right).is_some());
        assert_eq!(record.score_for(Eye::Left), None);
        assert_eq!(record.sessions[0].percent_correct(), Some(75.0));
        assert_eq!(record.sessions[1].percent_correct(), None);
        let right = record.session("ETDRS_Right_20240501_093000_000").unwrap();
        assert_eq!(right.started_at, Some(at(0)));
        assert!(record.session("ETDRS_Left_20240501_093000_000").is_none());
    }

    #[test]
    fn truncated_file_fails() {
        let mut text = std::io::Cursor::new("(kind:Etdrs,pixels_per_inch:326.0,sessions:[");
        assert!(matches!(
            ExamRecord::from_file(&mut text),
            Err(ExportError::RonSpannedError(_))
        ));
    }
}
