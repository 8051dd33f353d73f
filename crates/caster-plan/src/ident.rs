//! Identifier matching
//!
//! Field names from two type families rarely agree byte-for-byte
//! (`OrderID` vs `OrderId` vs `order_id`). Matching compares normalized
//! forms instead.

/// Suffix tokens that may be dropped when comparing names, longest first.
const STRIPPABLE_SUFFIXES: &[&str] = &["Timestamp", "UTC", "IDs", "ID", "At"];

fn is_separator(c: char) -> bool {
    !c.is_alphanumeric()
}

/// Split an identifier into case/digit/separator delimited tokens.
///
/// A run of uppercase letters is one token unless a lowercase letter follows
/// it, in which case the last uppercase letter starts the next token:
/// `XMLParser` -> `["XML", "Parser"]`, `ABcD` -> `["A", "Bc", "D"]`.
#[must_use]
pub fn tokenize_camel_case(ident: &str) -> Vec<String> {
    let chars: Vec<char> = ident.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if is_separator(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_ascii_digit() != c.is_ascii_digit())
                || (prev.is_uppercase()
                    && c.is_uppercase()
                    && next.is_some_and(char::is_lowercase));
            if boundary {
                tokens.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Tokenize, lowercase, and concatenate
#[must_use]
pub fn normalize_ident(ident: &str) -> String {
    tokenize_camel_case(ident)
        .iter()
        .map(|t| t.to_lowercase())
        .collect()
}

/// [`normalize_ident`] after dropping one trailing suffix token
/// (`ID`, `IDs`, `At`, `UTC`, `Timestamp`, case-insensitive).
///
/// The suffix must start a token: `CreatedAt` and `created_at` lose `At`,
/// `Format` keeps its `at`. A strip that would leave nothing is skipped.
#[must_use]
pub fn normalize_ident_with_suffix_strip(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();

    for suffix in STRIPPABLE_SUFFIXES {
        let suffix_len = suffix.chars().count();
        if chars.len() <= suffix_len {
            continue;
        }
        let start = chars.len() - suffix_len;
        let tail: String = chars[start..].iter().collect();
        if !tail.eq_ignore_ascii_case(suffix) {
            continue;
        }

        let starts_token = chars[start].is_uppercase() || is_separator(chars[start - 1]);
        if !starts_token {
            continue;
        }

        let head: String = chars[..start].iter().collect();
        let stripped = normalize_ident(&head);
        if !stripped.is_empty() {
            return stripped;
        }
    }

    normalize_ident(ident)
}

/// Outcome of matching one target name against candidate source names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Exactly one candidate matched; index into the candidate list
    Unique(usize),
    /// Several candidates matched equally well
    Ambiguous(Vec<usize>),
    /// Nothing matched
    NoMatch,
}

/// Match a target name against candidates.
///
/// Plain normalization is tried first; suffix-stripped normalization is
/// consulted only when the plain pass finds nothing.
#[must_use]
pub fn match_ident<S: AsRef<str>>(target: &str, candidates: &[S]) -> MatchOutcome {
    let passes: [fn(&str) -> String; 2] = [normalize_ident, normalize_ident_with_suffix_strip];

    for normalize in passes {
        let wanted = normalize(target);
        let hits: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| normalize(c.as_ref()) == wanted)
            .map(|(i, _)| i)
            .collect();

        match hits.len() {
            0 => {}
            1 => return MatchOutcome::Unique(hits[0]),
            _ => return MatchOutcome::Ambiguous(hits),
        }
    }

    MatchOutcome::NoMatch
}
