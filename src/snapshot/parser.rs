//! Heuristic parsing of persisted log lines
//!
//! Every extraction step is an ordered list of strategies. Each strategy either
//! matches (yielding a value and the remaining text) or does not, and the first
//! match wins.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::models::{LogEvent, LogLevel};

/// Source reported for lines that carry no `file:line` hint
pub const DEFAULT_SOURCE: &str = "system";

/// Result of one parsing strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult<T> {
    Matched { value: T, rest: String },
    NoMatch,
}

impl<T> ParseResult<T> {
    pub fn is_match(&self) -> bool {
        matches!(self, ParseResult::Matched { .. })
    }
}

type Strategy<T> = fn(&str) -> ParseResult<T>;

/// Try each strategy in order and return the first match
fn first_match<T>(input: &str, strategies: &[Strategy<T>]) -> ParseResult<T> {
    strategies
        .iter()
        .map(|strategy| strategy(input))
        .find(ParseResult::is_match)
        .unwrap_or(ParseResult::NoMatch)
}

/// Where a line's level came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelOrigin {
    Prefix,
    Bracket,
}

const LEVEL_STRATEGIES: &[Strategy<(LogLevel, LevelOrigin)>] = &[level_prefix, bracket_level];

const TIMESTAMP_STRATEGIES: &[Strategy<DateTime<Utc>>] = &[date_time_pair, rfc3339_token];

const SOURCE_STRATEGIES: &[Strategy<String>] = &[file_line_source];

/// `WARNING:` must be tried before `WARN:`
const LEVEL_PREFIXES: &[(&str, LogLevel)] = &[
    ("DEBUG:", LogLevel::Debug),
    ("INFO:", LogLevel::Info),
    ("WARNING:", LogLevel::Warn),
    ("WARN:", LogLevel::Warn),
    ("ERROR:", LogLevel::Error),
    ("FATAL:", LogLevel::Fatal),
];

/// Date + time layouts, tried in order against the first two tokens
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

/// Parse one persisted log line. Never fails: anything unrecognised falls back
/// to level `info`, source `system` and a timestamp of `now`.
pub fn parse_line(line: &str, now: DateTime<Utc>) -> LogEvent {
    let line = line.trim();

    let (level, origin, body) = match first_match(line, LEVEL_STRATEGIES) {
        ParseResult::Matched {
            value: (level, origin),
            rest,
        } => (level, Some(origin), rest),
        ParseResult::NoMatch => (LogLevel::Info, None, line.to_string()),
    };

    let (timestamp, body) = match first_match(&body, TIMESTAMP_STRATEGIES) {
        ParseResult::Matched { value, rest } => (value, rest),
        ParseResult::NoMatch => (now, body),
    };

    // Source hints are only trusted on lines without an explicit level prefix
    let (source, body) = match origin {
        Some(LevelOrigin::Prefix) => (DEFAULT_SOURCE.to_string(), body),
        _ => match first_match(&body, SOURCE_STRATEGIES) {
            ParseResult::Matched { value, rest } => (value, rest),
            ParseResult::NoMatch => (DEFAULT_SOURCE.to_string(), body),
        },
    };

    LogEvent::at(timestamp, level, body.trim(), source)
}

fn level_prefix(line: &str) -> ParseResult<(LogLevel, LevelOrigin)> {
    let line = line.trim_start();
    LEVEL_PREFIXES
        .iter()
        .find_map(|(prefix, level)| {
            line.strip_prefix(prefix).map(|rest| ParseResult::Matched {
                value: (*level, LevelOrigin::Prefix),
                rest: rest.trim_start().to_string(),
            })
        })
        .unwrap_or(ParseResult::NoMatch)
}

fn bracket_level(line: &str) -> ParseResult<(LogLevel, LevelOrigin)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let found = tokens.iter().enumerate().find_map(|(i, token)| {
        let inner = token
            .trim_end_matches(':')
            .strip_prefix('[')?
            .strip_suffix(']')?;
        LogLevel::from_str(inner).map(|level| (i, level))
    });

    match found {
        Some((index, level)) => ParseResult::Matched {
            value: (level, LevelOrigin::Bracket),
            rest: join_without(&tokens, index),
        },
        None => ParseResult::NoMatch,
    }
}

fn date_time_pair(line: &str) -> ParseResult<DateTime<Utc>> {
    let Some((candidate, rest)) = take_tokens(line, 2) else {
        return ParseResult::NoMatch;
    };

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&candidate, format).ok())
        .map(|naive| ParseResult::Matched {
            value: naive.and_utc(),
            rest: rest.to_string(),
        })
        .unwrap_or(ParseResult::NoMatch)
}

fn rfc3339_token(line: &str) -> ParseResult<DateTime<Utc>> {
    let Some((candidate, rest)) = take_tokens(line, 1) else {
        return ParseResult::NoMatch;
    };

    match DateTime::parse_from_rfc3339(&candidate) {
        Ok(parsed) => ParseResult::Matched {
            value: parsed.with_timezone(&Utc),
            rest: rest.to_string(),
        },
        Err(_) => ParseResult::NoMatch,
    }
}

/// Extensions that mark a `name.ext:N` token as a source location
const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "cs", "ex", "exs", "go", "h", "hpp", "java", "js", "kt", "php", "py", "rb",
    "rs", "scala", "swift", "ts",
];

/// `handler.go:42` or `src/jobs/runner.go:118:` yields the file stem as source.
/// Anything else with a colon (host:port, addresses, URLs) is left in the message.
fn file_line_source(line: &str) -> ParseResult<String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let found = tokens
        .iter()
        .enumerate()
        .find_map(|(i, token)| source_location(token).map(|stem| (i, stem)));

    match found {
        Some((index, source)) => ParseResult::Matched {
            value: source,
            rest: join_without(&tokens, index),
        },
        None => ParseResult::NoMatch,
    }
}

fn source_location(token: &str) -> Option<String> {
    if token.contains("://") {
        return None;
    }

    let (file, line_no) = token.strip_suffix(':').unwrap_or(token).rsplit_once(':')?;
    if line_no.is_empty() || !line_no.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let name = file.rsplit(['/', '\\']).next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if !SOURCE_EXTENSIONS.contains(&ext) {
        return None;
    }
    let stem = name.split('.').next()?;
    if stem.is_empty() || stem.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    Some(stem.to_string())
}

/// Split off the first `count` whitespace-separated tokens
fn take_tokens(input: &str, count: usize) -> Option<(String, &str)> {
    let mut rest = input.trim_start();
    let mut taken = Vec::with_capacity(count);

    for _ in 0..count {
        if rest.is_empty() {
            return None;
        }
        let (token, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        taken.push(token);
        rest = tail.trim_start();
    }

    Some((taken.join(" "), rest))
}

fn join_without(tokens: &[&str], skip: usize) -> String {
    tokens
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != skip)
        .map(|(_, token)| *token)
        .collect::<Vec<_>>()
        .join(" ")
}
