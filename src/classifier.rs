//! Turning what the viewer said or swiped into an answer.
//!
//! Two kinds of test share one staircase: ETDRS letter naming, answered by
//! voice, and the tumbling E, answered by swiping the way the E's legs
//! open. Each has a [ResponseClassifier] that maps raw input to one of
//! three outcomes: an answer, a well-formed attempt that matched nothing
//! (scored as wrong), or input that wasn't an attempt at all (ignored).

use clap::ValueEnum;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two kinds of acuity test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum TestKind {
    /// Name the ETDRS letter shown
    Etdrs,
    /// Swipe the way the E points
    TumblingE,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestKind::Etdrs => write!(f, "ETDRS"),
            TestKind::TumblingE => write!(f, "Tumbling_E"),
        }
    }
}

/// The Sloan letters used on ETDRS charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EtdrsLetter {
    /// The letter C.
    C,
    /// The letter D.
    D,
    /// The letter F.
    F,
    /// The letter H.
    H,
    /// The letter K.
    K,
    /// The letter N.
    N,
    /// The letter P.
    P,
    /// The letter R.
    R,
    /// The letter U.
    U,
    /// The letter V.
    V,
    /// The letter Z.
    Z,
}

impl EtdrsLetter {
    /// Every letter, in chart order.
    pub const ALL: [EtdrsLetter; 11] = [
        EtdrsLetter::C,
        EtdrsLetter::D,
        EtdrsLetter::F,
        EtdrsLetter::H,
        EtdrsLetter::K,
        EtdrsLetter::N,
        EtdrsLetter::P,
        EtdrsLetter::R,
        EtdrsLetter::U,
        EtdrsLetter::V,
        EtdrsLetter::Z,
    ];

    /// The letter for `c`, in either case, if it is on the chart.
    pub fn from_char(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|l| l.as_char() == upper)
    }

    /// The letter as a character.
    pub fn as_char(self) -> char {
        match self {
            EtdrsLetter::C => 'C',
            EtdrsLetter::D => 'D',
            EtdrsLetter::F => 'F',
            EtdrsLetter::H => 'H',
            EtdrsLetter::K => 'K',
            EtdrsLetter::N => 'N',
            EtdrsLetter::P => 'P',
            EtdrsLetter::R => 'R',
            EtdrsLetter::U => 'U',
            EtdrsLetter::V => 'V',
            EtdrsLetter::Z => 'Z',
        }
    }
}

impl fmt::Display for EtdrsLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A four-way swipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Swipe up.
    Up,
    /// Swipe down.
    Down,
    /// Swipe left.
    Left,
    /// Swipe right.
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        write!(f, "{}", s)
    }
}

/// How far the tumbling E is turned clockwise from its upright, right-facing
/// pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    /// Legs open to the right.
    Deg0,
    /// Legs open downward.
    Deg90,
    /// Legs open to the left.
    Deg180,
    /// Legs open upward.
    Deg270,
}

impl Rotation {
    /// Every rotation.
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Clockwise rotation in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// The only swipe that counts as correct for this rotation.
    pub fn expected_swipe(self) -> Direction {
        match self {
            Rotation::Deg0 => Direction::Right,
            Rotation::Deg90 => Direction::Down,
            Rotation::Deg180 => Direction::Left,
            Rotation::Deg270 => Direction::Up,
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E@{}", self.degrees())
    }
}

/// Raw input from the speech or gesture recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// What the speech recognizer heard.
    Transcript(String),
    /// A swipe on the screen.
    Swipe(Direction),
}

impl fmt::Display for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawResponse::Transcript(text) => write!(f, "\"{}\"", text),
            RawResponse::Swipe(direction) => write!(f, "swipe {}", direction),
        }
    }
}

/// The outcome of classifying one raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<A> {
    /// Not an attempt at an answer; keep listening, count nothing.
    Ignore,
    /// An attempt that matched no symbol; counts as a wrong answer.
    NoMatch,
    /// A recognized answer.
    Answer(A),
}

/// Strategy for one kind of test: what is shown, what can be answered, and
/// how the two relate.
pub trait ResponseClassifier {
    /// What appears on screen.
    type Shown: Copy + PartialEq + fmt::Debug + fmt::Display;
    /// What the viewer can answer.
    type Answer: Copy + PartialEq + fmt::Debug + fmt::Display;

    /// The test this classifier runs.
    fn kind(&self) -> TestKind;

    /// Map raw input to an answer.
    fn classify(&self, input: &RawResponse) -> Classification<Self::Answer>;

    /// Pick the next optotype.
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Shown;

    /// Whether `answer` names `shown`.
    fn is_correct(&self, shown: Self::Shown, answer: Self::Answer) -> bool;
}

/// Answers a tumbling E by swipe direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionClassifier;

impl ResponseClassifier for DirectionClassifier {
    type Shown = Rotation;
    type Answer = Direction;

    fn kind(&self) -> TestKind {
        TestKind::TumblingE
    }

    fn classify(&self, input: &RawResponse) -> Classification<Direction> {
        match input {
            RawResponse::Swipe(direction) => Classification::Answer(*direction),
            RawResponse::Transcript(_) => Classification::Ignore,
        }
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Rotation {
        Rotation::ALL[rng.gen_range(0..Rotation::ALL.len())]
    }

    fn is_correct(&self, shown: Rotation, answer: Direction) -> bool {
        shown.expected_swipe() == answer
    }
}

mod phonetics {
    use super::EtdrsLetter::{self, *};

    /// How speech recognizers most often spell each letter name.
    #[rustfmt::skip]
    pub(super) const EXACT_PHONETICS: &[(&str, EtdrsLetter)] = &[
        ("see", C), ("sea", C), ("cee", C), ("si", C), ("c", C),
        ("dee", D), ("di", D), ("d", D), ("de", D), ("dear", D),
        ("ef", F), ("eff", F), ("f", F), ("aff", F),
        ("aitch", H), ("atch", H), ("aych", H), ("h", H), ("haitch", H), ("eitch", H),
        ("kay", K), ("key", K), ("k", K), ("kei", K),
        ("en", N), ("enn", N), ("n", N), ("ne", N),
        ("pee", P), ("pi", P), ("p", P), ("pe", P),
        ("are", R), ("ar", R), ("arr", R), ("or", R), ("r", R),
        ("you", U), ("yu", U), ("u", U), ("yoo", U),
        ("vee", V), ("vi", V), ("v", V), ("ve", V), ("we", V),
        ("zee", Z), ("zed", Z), ("zi", Z), ("z", Z),
    ];

    /// Rarer transcriptions, tried after the common ones.
    #[rustfmt::skip]
    pub(super) const ALTERNATIVE_PHONETICS: &[(&str, EtdrsLetter)] = &[
        ("sie", C), ("sii", C), ("ce", C), ("sea sea", C),
        ("dea", D), ("dia", D), ("dii", D), ("the", D), ("tea", D),
        ("eph", F), ("aef", F), ("afe", F), ("fe", F), ("if", F),
        ("ache", H), ("hatch", H), ("itch", H), ("each", H), ("age", H),
        ("hey", H), ("hay", H), ("eight", H), ("ate", H),
        ("ca", K), ("cay", K), ("kae", K), ("kai", K), ("que", K),
        ("okay", K), ("ok", K), ("kway", K),
        ("an", N), ("ene", N), ("inn", N), ("and", N), ("ain", N),
        ("pea", P), ("pia", P), ("pie", P), ("pii", P),
        ("aar", R), ("aire", R), ("er", R), ("ore", R), ("arre", R),
        ("our", R), ("hour", R), ("air", R), ("heir", R), ("ah", R),
        ("oo", U), ("ooo", U), ("uu", U), ("ou", U), ("yew", U),
        ("ewe", U), ("hugh", U), ("hue", U), ("ew", U), ("ooh", U),
        ("who", U), ("woo", U), ("wu", U), ("ue", U),
        ("vea", V), ("via", V), ("vie", V), ("vii", V), ("bee", V),
        ("zea", Z), ("zia", Z), ("ze", Z), ("zeta", Z), ("said", Z),
    ];
}

use phonetics::{ALTERNATIVE_PHONETICS, EXACT_PHONETICS};

/// Words that open conversation rather than a letter.
const SENTENCE_STARTERS: &[&str] = &[
    "WAIT", "I", "SHOULD", "CAN", "COULD", "WILL", "WOULD", "MAYBE", "PERHAPS", "LET", "LETS",
    "PLEASE", "EXCUSE", "SORRY", "HI", "HELLO", "YES", "NO", "OKAY", "WELL", "SO", "BUT", "OR",
    "THE", "A", "AN", "THIS", "THAT", "THESE", "THOSE", "MY", "YOUR", "HIS", "HER", "OUR",
    "THEIR", "WE", "THEY", "SHE", "HE", "IT", "THERE", "HERE", "NOW", "THEN", "WHEN", "WHERE",
    "WHY", "HOW", "WHAT", "WHO", "WHICH",
];

const SENTENCE_PATTERNS: &[&str] = &[
    "I SHOULD", "WAIT I", "CAN YOU", "COULD YOU", "WILL YOU", "WOULD YOU", "LET ME", "LETS",
    "PLEASE", "EXCUSE ME", "I THINK", "I BELIEVE", "MAYBE", "PERHAPS", "PROBABLY", "DEFINITELY",
    "CERTAINLY", "WAIT I SHOULD", "I SHOULD PROBABLY", "SHOULD PROBABLY", "PROBABLY DO",
    "DO ONE", "ONE", "TWO", "THREE", "FOUR", "FIVE", "SIX", "SEVEN", "EIGHT", "NINE", "TEN",
];

const QUESTION_PREFIXES: &[&str] = &[
    "WHAT", "WHERE", "WHEN", "WHY", "WHO", "HOW", "DO YOU", "DID YOU", "ARE YOU", "CAN YOU",
];

const NUMBER_WORDS: &[&str] = &[
    "ONE", "TWO", "THREE", "FOUR", "FIVE", "SIX", "SEVEN", "EIGHT", "NINE", "TEN", "ELEVEN",
    "TWELVE", "THIRTEEN", "FOURTEEN", "FIFTEEN", "SIXTEEN", "SEVENTEEN", "EIGHTEEN", "NINETEEN",
    "TWENTY",
];

/// Short utterances accepted even though they aren't a bare letter.
const KNOWN_LETTER_WORDS: &[&str] = &[
    "ARE", "YOU", "SEE", "SEA", "DEE", "EFF", "AITCH", "KAY", "PEE", "VEE", "ZEE", "EACH", "AND",
    "OK", "OH", "HE", "FEE", "ED", "DZ", "VV", "CC", "DD", "FF", "HH", "KK", "NN", "PP", "RR",
    "UU", "ZZ", "AR", "ARR", "EN", "AFF", "ATCH", "AYCH", "SI", "SII", "DI", "DIA",
];

const MAX_ATTEMPT_CHARS: usize = 15;
const MAX_ATTEMPT_LETTERS: usize = 5;
const MAX_ATTEMPT_WORDS: usize = 4;
const SHORT_ATTEMPT_CHARS: usize = 3;

/// Answers ETDRS letters from a speech transcript.
///
/// Best effort: it recognizes what its phonetic tables contain and nothing
/// more.
#[derive(Debug, Clone)]
pub struct PhoneticLetterClassifier {
    // each table longest spelling first, so "sea sea" wins over "sea"
    tables: [Vec<(&'static str, EtdrsLetter)>; 2],
}

impl Default for PhoneticLetterClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn by_length(table: &[(&'static str, EtdrsLetter)]) -> Vec<(&'static str, EtdrsLetter)> {
    let mut sorted = table.to_vec();
    // stable, so within one length the table order is kept
    sorted.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    sorted
}

impl PhoneticLetterClassifier {
    /// A classifier with the built-in phonetic tables.
    pub fn new() -> Self {
        Self {
            tables: [by_length(EXACT_PHONETICS), by_length(ALTERNATIVE_PHONETICS)],
        }
    }

    /// Whether `text` looks like someone trying to name one letter, as
    /// opposed to talking.
    pub fn is_letter_attempt(text: &str) -> bool {
        let clean = text.trim().to_uppercase();
        if clean.is_empty() {
            return false;
        }

        let n_chars = clean.chars().count();
        if n_chars > MAX_ATTEMPT_CHARS {
            return false;
        }
        if clean.chars().filter(|c| c.is_alphabetic()).count() > MAX_ATTEMPT_LETTERS {
            return false;
        }

        let words: Vec<&str> = clean.split_whitespace().collect();
        if words.len() > MAX_ATTEMPT_WORDS {
            return false;
        }
        if let Some(first) = words.first() {
            if SENTENCE_STARTERS.contains(first) {
                return false;
            }
        }
        if SENTENCE_PATTERNS.iter().any(|p| clean.contains(p)) {
            return false;
        }
        if clean.contains('?') || QUESTION_PREFIXES.iter().any(|p| clean.starts_with(p)) {
            return false;
        }
        if words.len() > 1 && words.iter().any(|w| NUMBER_WORDS.contains(w)) {
            return false;
        }

        if n_chars == 1 && clean.chars().all(|c| c.is_alphabetic()) {
            return true;
        }
        if KNOWN_LETTER_WORDS.contains(&clean.as_str()) {
            return true;
        }
        n_chars <= SHORT_ATTEMPT_CHARS && EtdrsLetter::ALL.iter().any(|l| clean.contains(l.as_char()))
    }

    /// Match an already-filtered transcript to a letter.
    pub fn match_letter(&self, text: &str) -> Option<EtdrsLetter> {
        let text = text.trim().to_lowercase();

        let exact = EXACT_PHONETICS
            .iter()
            .chain(ALTERNATIVE_PHONETICS.iter())
            .find(|(spelling, _)| *spelling == text);
        if let Some(&(_, letter)) = exact {
            debug!("Exact phonetic match '{}' -> {}", text, letter);
            return Some(letter);
        }

        // common spellings get the first pass, whatever their length
        for table in &self.tables {
            if let Some(&(spelling, letter)) = table.iter().find(|(s, _)| text.contains(s)) {
                debug!("'{}' contains '{}' -> {}", text, spelling, letter);
                return Some(letter);
            }
        }

        let mut chars = text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(letter) = EtdrsLetter::from_char(c) {
                return Some(letter);
            }
        }

        let mut letters = text.chars().filter(|c| c.is_alphabetic());
        if let Some(first) = letters.next() {
            if letters.all(|c| c == first) {
                return EtdrsLetter::from_char(first);
            }
        }

        None
    }
}

impl ResponseClassifier for PhoneticLetterClassifier {
    type Shown = EtdrsLetter;
    type Answer = EtdrsLetter;

    fn kind(&self) -> TestKind {
        TestKind::Etdrs
    }

    fn classify(&self, input: &RawResponse) -> Classification<EtdrsLetter> {
        let text = match input {
            RawResponse::Transcript(text) => text,
            RawResponse::Swipe(_) => return Classification::Ignore,
        };

        if !Self::is_letter_attempt(text) {
            debug!("Ignoring '{}', not a letter attempt", text);
            return Classification::Ignore;
        }

        match self.match_letter(text) {
            Some(letter) => Classification::Answer(letter),
            None => {
                debug!("No letter matches '{}'", text);
                Classification::NoMatch
            }
        }
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> EtdrsLetter {
        EtdrsLetter::ALL[rng.gen_range(0..EtdrsLetter::ALL.len())]
    }

    fn is_correct(&self, shown: EtdrsLetter, answer: EtdrsLetter) -> bool {
        shown == answer
    }
}
