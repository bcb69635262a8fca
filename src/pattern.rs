//! Pattern matching for review comment bodies.
//!
//! Policy files accept two dialects at the same key, disambiguated by the
//! `/…/` sigil:
//!
//! | Pattern | Dialect |
//! |---------|---------|
//! | `"/^lgtm$/"` | regex, case-sensitive |
//! | `"/^lgtm$/i"` | regex, case-insensitive |
//! | `"!/^lgtm$/"` | regex; the `!` is reserved and currently ignored |
//! | anything else | shell-style glob |
//!
//! Glob patterns match like a shell against file-ish text: a pattern with no
//! `/` also matches the basename of the candidate, leading dots are ordinary
//! characters, and any single line of a multiline body may satisfy the
//! pattern. Compilation failures in either dialect are configuration errors,
//! never silent denials.

use glob::{MatchOptions, Pattern as GlobPattern};
use regex::{Regex, RegexBuilder};

use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Compiled pattern
// ─────────────────────────────────────────────────────────────────────────────

/// A compiled comment pattern, either dialect.
///
/// Compile once with [`Pattern::compile`], then call [`Pattern::matches`]
/// per candidate text.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Regex dialect (`/…/` sigil)
    Regex(Regex),
    /// Glob dialect (everything else)
    Glob(GlobPattern),
}

impl Pattern {
    /// Classify and compile a pattern string from a policy file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] when the body fails to compile in
    /// its dialect.
    pub fn compile(source: &str) -> Result<Self> {
        match split_regex_sigil(source) {
            Some((body, case_insensitive)) => {
                let regex = RegexBuilder::new(body)
                    .case_insensitive(case_insensitive)
                    .build()
                    .map_err(|e| Error::InvalidPattern {
                        pattern: source.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Self::Regex(regex))
            }
            None => {
                let glob = GlobPattern::new(source).map_err(|e| Error::InvalidPattern {
                    pattern: source.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Self::Glob(glob))
            }
        }
    }

    /// Test the pattern against a candidate text.
    ///
    /// Empty text never matches. Regexes match anywhere in the text; globs
    /// match the whole text, any single line of it, or (for patterns with no
    /// `/`) the basename of either.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        match self {
            Self::Regex(re) => re.is_match(text),
            Self::Glob(glob) => glob_matches(glob, text),
        }
    }
}

/// Recognizes `!?/body/(i)?` and returns `(body, case_insensitive)`.
fn split_regex_sigil(source: &str) -> Option<(&str, bool)> {
    let unbanged = source.strip_prefix('!').unwrap_or(source);
    let body = unbanged.strip_prefix('/')?;
    if let Some(body) = body.strip_suffix("/i") {
        return Some((body, true));
    }
    let body = body.strip_suffix('/')?;
    Some((body, false))
}

fn glob_matches(glob: &GlobPattern, text: &str) -> bool {
    // Leading dots are ordinary characters; separators are not special
    // inside review bodies.
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let match_base = !glob.as_str().contains('/');

    let candidate = |s: &str| {
        if glob.matches_with(s, options) {
            return true;
        }
        // matchBase: a slash-free pattern also tests the basename.
        match_base
            && s.contains('/')
            && s.rsplit('/')
                .next()
                .is_some_and(|base| glob.matches_with(base, options))
    };

    if candidate(text) {
        return true;
    }
    // Multiline bodies: any single line may satisfy the pattern.
    text.lines().any(candidate)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
