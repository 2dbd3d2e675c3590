use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32Str};
use std::cmp::Ordering;

/// A successful match of a prepared query against one string.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchScore {
    /// Higher is better.
    pub score: f64,
    /// Sorted, de-duplicated positions of matched characters, in the
    /// matcher's own units (characters or grapheme clusters).
    pub positions: Vec<u32>,
}

impl MatchScore {
    /// Length of the longest run of consecutive matched positions.
    pub fn longest_run(&self) -> usize {
        let mut best = 0;
        let mut current = 0;
        let mut prev: Option<u32> = None;
        for &pos in &self.positions {
            current = match prev {
                Some(p) if pos == p + 1 => current + 1,
                _ => 1,
            };
            best = best.max(current);
            prev = Some(pos);
        }
        best
    }

    /// Same match, scored lower by `amount`.
    pub fn penalized(mut self, amount: f64) -> Self {
        self.score -= amount;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Subsequence matching.
    Fuzzy,
    /// Every whitespace-separated token must occur as a substring.
    Simple,
}

/// A query compiled once per keystroke and run against many strings.
pub trait PreparedQuery: Send {
    fn score(&mut self, text: &str) -> Option<MatchScore>;
}

/// The host's string matcher.
pub trait MatcherFactory: Send + Sync {
    fn prepare(&self, query: &str, mode: MatchMode) -> Box<dyn PreparedQuery>;

    /// Secondary ordering between two equally scored matches: better
    /// contiguous run first, then lexicographic on the matched text.
    fn tie_break(&self, a: (&str, &MatchScore), b: (&str, &MatchScore)) -> Ordering {
        b.1.longest_run()
            .cmp(&a.1.longest_run())
            .then_with(|| a.0.cmp(b.0))
    }
}

/// Fuzzy matching via nucleo, simple matching via case-insensitive substrings.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMatcherFactory;

impl MatcherFactory for DefaultMatcherFactory {
    fn prepare(&self, query: &str, mode: MatchMode) -> Box<dyn PreparedQuery> {
        match mode {
            MatchMode::Fuzzy => Box::new(FuzzyQuery::new(query)),
            MatchMode::Simple => Box::new(SimpleQuery::new(query)),
        }
    }
}

struct FuzzyQuery {
    pattern: Pattern,
    matcher: Matcher,
    buf: Vec<char>,
    indices: Vec<u32>,
}

impl FuzzyQuery {
    fn new(query: &str) -> Self {
        Self {
            pattern: Pattern::new(
                query,
                CaseMatching::Ignore,
                Normalization::Smart,
                AtomKind::Fuzzy,
            ),
            matcher: Matcher::new(nucleo_matcher::Config::DEFAULT),
            buf: Vec::new(),
            indices: Vec::new(),
        }
    }
}

impl PreparedQuery for FuzzyQuery {
    fn score(&mut self, text: &str) -> Option<MatchScore> {
        let haystack = Utf32Str::new(text, &mut self.buf);
        self.indices.clear();
        let score = self
            .pattern
            .indices(haystack, &mut self.matcher, &mut self.indices)?;
        self.indices.sort_unstable();
        self.indices.dedup();
        Some(MatchScore {
            score: f64::from(score),
            positions: self.indices.clone(),
        })
    }
}

const PREFIX_BONUS: f64 = 2.0;
const WORD_START_BONUS: f64 = 1.0;
const POSITION_COST: f64 = 0.01;

struct SimpleQuery {
    tokens: Vec<String>,
}

impl SimpleQuery {
    fn new(query: &str) -> Self {
        Self {
            tokens: query.split_whitespace().map(str::to_lowercase).collect(),
        }
    }
}

impl PreparedQuery for SimpleQuery {
    fn score(&mut self, text: &str) -> Option<MatchScore> {
        let haystack = text.to_lowercase();
        let mut score = 0.0;
        let mut positions = Vec::new();

        for token in &self.tokens {
            let byte_idx = haystack.find(token.as_str())?;
            let char_idx = haystack[..byte_idx].chars().count();
            let at_word_start = haystack[..byte_idx]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());

            if char_idx == 0 {
                score += PREFIX_BONUS;
            } else if at_word_start {
                score += WORD_START_BONUS;
            }
            score -= char_idx as f64 * POSITION_COST;

            let len = token.chars().count();
            positions.extend((char_idx..char_idx + len).map(|p| p as u32));
        }

        positions.sort_unstable();
        positions.dedup();
        Some(MatchScore { score, positions })
    }
}
