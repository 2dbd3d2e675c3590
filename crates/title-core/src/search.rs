use crate::matcher::{MatchMode, MatchScore, MatcherFactory, PreparedQuery};
use crate::resolver::DisplayRecord;
use crate::settings::Settings;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// Score subtracted from file-name and alias matches so that a title match
/// of equal quality always ranks above them.
pub const FALLBACK_TIER_PENALTY: f64 = 1.0;

pub const LINK_SUGGEST_LIMIT: usize = 50;
pub const QUICK_SWITCH_LIMIT: usize = 100;

/// Which field produced a candidate's match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum MatchReason {
    Title,
    FileName,
    /// The literal alias that matched.
    Alias(String),
    Unresolved,
    Create,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Candidate {
    File(DisplayRecord),
    /// A link target that does not exist yet; its text is shown as-is.
    Unresolved(String),
    /// Offer to create a document with this name.
    Create(String),
}

impl Candidate {
    pub fn display_text(&self) -> &str {
        match self {
            Candidate::File(record) => &record.display_name,
            Candidate::Unresolved(link) | Candidate::Create(link) => link,
        }
    }
}

/// One ranked search result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub candidate: Candidate,
    pub score: f64,
    pub reason: MatchReason,
}

/// Whether a call site offers a synthetic "create new" entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreatePolicy {
    Never,
    /// Appended when nothing matches the query exactly.
    UnlessExactMatch,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchOptions {
    pub include_filename: bool,
    pub include_aliases: bool,
    pub mode: MatchMode,
    pub show_existing_only: bool,
    pub create: CreatePolicy,
    pub limit: usize,
}

impl SearchOptions {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            include_filename: settings.include_filename_in_search,
            include_aliases: settings.include_aliases_in_search,
            mode: if settings.use_simple_search {
                MatchMode::Simple
            } else {
                MatchMode::Fuzzy
            },
            show_existing_only: false,
            create: CreatePolicy::Never,
            limit: LINK_SUGGEST_LIMIT,
        }
    }

    /// Link insertion autocomplete: never offers creation.
    pub fn link_suggest(settings: &Settings) -> Self {
        Self::from_settings(settings)
    }

    /// Quick switcher: offers creation when nothing matches exactly.
    pub fn quick_switch(settings: &Settings) -> Self {
        Self {
            create: CreatePolicy::UnlessExactMatch,
            limit: QUICK_SWITCH_LIMIT,
            ..Self::from_settings(settings)
        }
    }
}

struct Scored {
    hit: SearchHit,
    text: String,
    matched: MatchScore,
}

/// Tiered title → file name → alias search over display records.
pub struct SearchAdapter {
    matcher: Arc<dyn MatcherFactory>,
}

impl SearchAdapter {
    pub fn new(matcher: Arc<dyn MatcherFactory>) -> Self {
        Self { matcher }
    }

    pub fn search(
        &self,
        query: &str,
        records: &[DisplayRecord],
        unresolved: &[String],
        options: &SearchOptions,
    ) -> Vec<SearchHit> {
        let query = query.trim();
        if query.is_empty() {
            return recent_first(records, options.limit);
        }

        let mut prepared = self.matcher.prepare(query, options.mode);
        let mut scored: Vec<Scored> = records
            .iter()
            .filter_map(|record| match_record(prepared.as_mut(), record, options))
            .collect();

        if !options.show_existing_only {
            scored.extend(unresolved.iter().filter_map(|link| {
                let matched = prepared.score(link)?;
                Some(Scored {
                    hit: SearchHit {
                        candidate: Candidate::Unresolved(link.clone()),
                        score: matched.score,
                        reason: MatchReason::Unresolved,
                    },
                    text: link.clone(),
                    matched,
                })
            }));
        }

        scored.sort_by(|a, b| {
            b.hit
                .score
                .partial_cmp(&a.hit.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    self.matcher
                        .tie_break((a.text.as_str(), &a.matched), (b.text.as_str(), &b.matched))
                })
        });
        let mut hits: Vec<SearchHit> = scored
            .into_iter()
            .take(options.limit)
            .map(|s| s.hit)
            .collect();

        if options.create == CreatePolicy::UnlessExactMatch
            && !has_exact_match(query, records, unresolved)
        {
            hits.push(SearchHit {
                candidate: Candidate::Create(query.to_string()),
                score: f64::NEG_INFINITY,
                reason: MatchReason::Create,
            });
        }
        hits
    }
}

/// First tier that matches wins; later tiers are not tried.
fn match_record(
    prepared: &mut dyn PreparedQuery,
    record: &DisplayRecord,
    options: &SearchOptions,
) -> Option<Scored> {
    let basename = record.basename();

    let (matched, text, reason) = if let Some(m) = record
        .is_custom_display
        .then(|| prepared.score(&record.display_name))
        .flatten()
    {
        (m, record.display_name.clone(), MatchReason::Title)
    } else if let Some(m) = try_basename(prepared, record, basename, options) {
        (
            m.penalized(FALLBACK_TIER_PENALTY),
            basename.to_string(),
            MatchReason::FileName,
        )
    } else if options.include_aliases {
        let (m, alias) = record
            .aliases
            .iter()
            .find_map(|alias| prepared.score(alias).map(|m| (m, alias)))?;
        (
            m.penalized(FALLBACK_TIER_PENALTY),
            alias.clone(),
            MatchReason::Alias(alias.clone()),
        )
    } else {
        return None;
    };

    Some(Scored {
        hit: SearchHit {
            candidate: Candidate::File(record.clone()),
            score: matched.score,
            reason,
        },
        text,
        matched,
    })
}

// Without a custom title the basename is the document's only name, so it is
// always searchable; otherwise only when file names are included.
fn try_basename(
    prepared: &mut dyn PreparedQuery,
    record: &DisplayRecord,
    basename: &str,
    options: &SearchOptions,
) -> Option<MatchScore> {
    let searchable = !record.is_custom_display
        || (options.include_filename && basename != record.display_name);
    if searchable {
        prepared.score(basename)
    } else {
        None
    }
}

fn has_exact_match(query: &str, records: &[DisplayRecord], unresolved: &[String]) -> bool {
    let query = query.to_lowercase();
    let path_query = query.strip_suffix(".md").unwrap_or(&query).to_string();
    records.iter().any(|r| {
        r.display_name.to_lowercase() == query
            || r.basename().to_lowercase() == query
            || r.path.to_lowercase().strip_suffix(".md") == Some(path_query.as_str())
    }) || unresolved.iter().any(|link| link.to_lowercase() == query)
}

fn recent_first(records: &[DisplayRecord], limit: usize) -> Vec<SearchHit> {
    let mut sorted: Vec<&DisplayRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
    sorted
        .into_iter()
        .take(limit)
        .map(|record| SearchHit {
            candidate: Candidate::File(record.clone()),
            score: 0.0,
            reason: if record.is_custom_display {
                MatchReason::Title
            } else {
                MatchReason::FileName
            },
        })
        .collect()
}
