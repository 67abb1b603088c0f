//! Score validity ("voided match") classifier.
//!
//! A settled bet only counts towards the financial aggregates when its score
//! text describes a usable result. The rules, applied to whitespace tokens:
//!
//! - a token containing a retirement/abandonment marker (`RET`, `ABD`,
//!   `ABANDON`, ...) flags the match as retired;
//! - a token shaped `N-M` or `N-M(T)` is a set; it is *completed* when either
//!   side reached 6 games or it carries a tiebreak;
//! - no sets at all: voided unless retired;
//! - retired: voided when at least one set is completed;
//! - otherwise: voided when any set is incomplete.
//!
//! Empty input or any token that cannot be parsed voids the bet.

const RETIREMENT_MARKERS: [&str; 7] = [
    "RET",
    "RETIRE",
    "RETIREE",
    "RET.",
    "ABD",
    "ABANDON",
    "RETIREMENT",
];

/// One set as written in the score, e.g. `7-6(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScore {
    pub first: u32,
    pub second: u32,
    pub tiebreak: Option<u32>,
}

impl SetScore {
    pub fn is_completed(&self) -> bool {
        self.first >= 6 || self.second >= 6 || self.tiebreak.is_some()
    }
}

/// True when the bet on a match with this score must be left out of the
/// aggregates.
pub fn is_voided(score: Option<&str>) -> bool {
    match score {
        Some(s) => classify(s).unwrap_or(true),
        None => true,
    }
}

/// `None` signals a parse failure.
fn classify(score: &str) -> Option<bool> {
    if score.trim().is_empty() {
        return Some(true);
    }

    let mut retired = false;
    let mut sets = Vec::new();
    for token in score.split_whitespace() {
        if has_retirement_marker(token) {
            retired = true;
        }
        let candidate = token.trim_end_matches([',', ';', '.']);
        if looks_like_set(candidate) {
            sets.push(parse_set(candidate)?);
        }
    }

    if sets.is_empty() {
        // A bare retirement note with no games is kept.
        return Some(!retired);
    }

    let voided = if retired {
        sets.iter().any(SetScore::is_completed)
    } else {
        sets.iter().any(|s| !s.is_completed())
    };
    Some(voided)
}

fn has_retirement_marker(token: &str) -> bool {
    let upper = token.to_uppercase();
    let cleaned = upper.trim_end_matches(|c: char| c.is_ascii_punctuation());
    RETIREMENT_MARKERS
        .iter()
        .any(|m| cleaned.contains(m) || upper.contains(m))
}

/// Shape check only: `digits-digits` optionally followed by `(digits)`.
fn looks_like_set(token: &str) -> bool {
    let Some((left, right)) = token.split_once('-') else {
        return false;
    };
    if !is_digits(left) {
        return false;
    }
    match right.split_once('(') {
        None => is_digits(right),
        Some((games, rest)) => {
            is_digits(games) && rest.strip_suffix(')').is_some_and(is_digits)
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_set(token: &str) -> Option<SetScore> {
    let (left, right) = token.split_once('-')?;
    let (games, tiebreak) = match right.split_once('(') {
        Some((games, rest)) => (games, Some(rest.strip_suffix(')')?.parse().ok()?)),
        None => (right, None),
    };
    Some(SetScore {
        first: left.parse().ok()?,
        second: games.parse().ok()?,
        tiebreak,
    })
}
