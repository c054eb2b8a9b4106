//! A line-oriented text form of [SessionEvent]s, so a session can be
//! replayed without a camera or a microphone:
//!
//! ```text
//! # viewer settles in
//! distance 41.5
//! say "see"
//! swipe left
//! timeout
//! cancel
//! ```
//!
//! Keywords are case-insensitive, `#` starts a comment and blank lines are
//! skipped.

use crate::{
    classifier::{Direction, RawResponse},
    session::SessionEvent,
};

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_till},
    character::complete::{char, not_line_ending, space0, space1},
    combinator::{all_consuming, map, opt, value},
    error::Error,
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated},
    Finish, IResult,
};

use std::{borrow::Cow, fmt, str::FromStr};

fn parse_distance(s: &str) -> IResult<&str, SessionEvent> {
    map(
        preceded(pair(tag_no_case("distance"), space1), double),
        SessionEvent::Distance,
    )(s)
}

fn parse_quoted(s: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), take_till(|c| c == '"'), char('"')),
        |text: &str| text.to_owned(),
    )(s)
}

fn parse_say(s: &str) -> IResult<&str, SessionEvent> {
    map(preceded(pair(tag_no_case("say"), space1), parse_quoted), |text| {
        SessionEvent::Response(RawResponse::Transcript(text))
    })(s)
}

fn parse_direction(s: &str) -> IResult<&str, Direction> {
    alt((
        value(Direction::Up, tag_no_case("up")),
        value(Direction::Down, tag_no_case("down")),
        value(Direction::Left, tag_no_case("left")),
        value(Direction::Right, tag_no_case("right")),
    ))(s)
}

fn parse_swipe(s: &str) -> IResult<&str, SessionEvent> {
    map(
        preceded(pair(tag_no_case("swipe"), space1), parse_direction),
        |direction| SessionEvent::Response(RawResponse::Swipe(direction)),
    )(s)
}

fn parse_comment(s: &str) -> IResult<&str, &str> {
    preceded(char('#'), not_line_ending)(s)
}

fn parse_event(s: &str) -> IResult<&str, SessionEvent> {
    delimited(
        space0,
        alt((
            parse_distance,
            parse_say,
            parse_swipe,
            value(SessionEvent::ListenTimeout, tag_no_case("timeout")),
            value(SessionEvent::Cancel, tag_no_case("cancel")),
        )),
        terminated(space0, opt(parse_comment)),
    )(s)
}

impl FromStr for SessionEvent {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match all_consuming(parse_event)(s).finish() {
            Ok((_remaining, event)) => Ok(event),
            Err(Error { input, code }) => Err(Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}

/// A script line that didn't parse.
#[derive(Debug, PartialEq)]
pub struct ScriptError {
    /// 1-based line number.
    pub line: usize,
    /// What nom could not parse.
    pub error: Error<String>,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = Cow::from(format!(
            "line {}: cannot parse event at \"{}\"",
            self.line, self.error.input
        ));
        write!(f, "{}", msg)
    }
}

impl std::error::Error for ScriptError {}

/// Parse a whole script, skipping blank and comment-only lines.
pub fn parse_script(text: &str) -> Result<Vec<SessionEvent>, ScriptError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            line.parse::<SessionEvent>().map_err(|error| ScriptError {
                line: idx + 1,
                error,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_line() {
        let (leftover, res) = parse_event("distance 41.5").unwrap();
        assert_eq!(leftover, "");
        assert_eq!(res, SessionEvent::Distance(41.5));
        assert_eq!("  Distance 40".parse::<SessionEvent>(), Ok(SessionEvent::Distance(40.0)));
    }

    #[test]
    fn say_line_keeps_the_transcript() {
        assert_eq!(
            "say \"Sea sea\"".parse::<SessionEvent>(),
            Ok(SessionEvent::Response(RawResponse::Transcript(
                "Sea sea".to_owned()
            )))
        );
        assert_eq!(
            "say \"\"".parse::<SessionEvent>(),
            Ok(SessionEvent::Response(RawResponse::Transcript(String::new())))
        );
    }

    #[test]
    fn swipe_timeout_cancel() {
        assert_eq!(
            "swipe LEFT # went left".parse::<SessionEvent>(),
            Ok(SessionEvent::Response(RawResponse::Swipe(Direction::Left)))
        );
        assert_eq!("timeout".parse::<SessionEvent>(), Ok(SessionEvent::ListenTimeout));
        assert_eq!("cancel  ".parse::<SessionEvent>(), Ok(SessionEvent::Cancel));
    }

    #[test]
    fn rejects_junk() {
        assert!("swipe sideways".parse::<SessionEvent>().is_err());
        assert!("distance".parse::<SessionEvent>().is_err());
        assert!("say unquoted".parse::<SessionEvent>().is_err());
        assert!("timeout now".parse::<SessionEvent>().is_err());
    }

    #[test]
    fn whole_script() {
        let script = "# warm up\n\ndistance 40\nsay \"see\"\n   \nswipe up\ncancel\n";
        let events = parse_script(script).unwrap();
        assert_eq!(
            events,
            vec![
                SessionEvent::Distance(40.0),
                SessionEvent::Response(RawResponse::Transcript("see".to_owned())),
                SessionEvent::Response(RawResponse::Swipe(Direction::Up)),
                SessionEvent::Cancel,
            ]
        );
    }

    #[test]
    fn script_errors_name_the_line() {
        let err = parse_script("distance 40\n# fine\nblink\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.to_string().starts_with("line 3"));
    }
}
