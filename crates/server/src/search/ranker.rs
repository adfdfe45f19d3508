//! Tiered filtering, grouping and disambiguation of retrieval candidates.
//!
//! The cascade is an ordered list of [`Tier`]s. Each tier pairs a text
//! matcher with a similarity threshold; the first tier with at least one
//! matching candidate strictly above its threshold decides the selection.
//!
//! | Tier | Matcher | Default threshold |
//! |------|---------|-------------------|
//! | 1 | title contains the whole query | 0.4 |
//! | 2 | title contains any query word longer than two characters | 0.5 |
//! | 3 | any candidate | 0.4 |
//! | 4 | any candidate (last resort) | 0.25 |
//!
//! Matching is case-insensitive. All sorts are stable, so equal scores keep
//! retrieval order and the same pool always yields the same ranking.

use shopvox_core::ProductId;

use super::SearchCandidate;

/// How a tier decides whether a candidate's title matches the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierMatcher {
    /// Title contains the entire trimmed query.
    ExactSubstring,
    /// Title contains at least one sufficiently long query word.
    TokenOverlap,
    /// Every candidate matches.
    Any,
}

/// One step of the ranking cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub matcher: TierMatcher,
    /// Candidates must score strictly above this.
    pub threshold: f64,
}

/// Tunable ranking thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    pub exact_threshold: f64,
    pub token_threshold: f64,
    pub fallback_threshold: f64,
    pub last_resort_threshold: f64,
    /// Query words shorter than this are ignored by the token matcher.
    pub min_token_chars: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 0.4,
            token_threshold: 0.5,
            fallback_threshold: 0.4,
            last_resort_threshold: 0.25,
            min_token_chars: 3,
        }
    }
}

impl RankingConfig {
    /// The cascade in priority order.
    #[must_use]
    pub fn tiers(&self) -> Vec<Tier> {
        vec![
            Tier {
                matcher: TierMatcher::ExactSubstring,
                threshold: self.exact_threshold,
            },
            Tier {
                matcher: TierMatcher::TokenOverlap,
                threshold: self.token_threshold,
            },
            Tier {
                matcher: TierMatcher::Any,
                threshold: self.fallback_threshold,
            },
            Tier {
                matcher: TierMatcher::Any,
                threshold: self.last_resort_threshold,
            },
        ]
    }
}

/// Candidates belonging to one product, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultGroup {
    pub product_id: ProductId,
    pub product_title: String,
    pub members: Vec<SearchCandidate>,
}

impl ResultGroup {
    /// Highest similarity in the group.
    #[must_use]
    pub fn top_similarity(&self) -> f64 {
        self.members.first().map_or(0.0, |c| c.similarity)
    }

    /// Number of variant members.
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.members.iter().filter(|c| c.is_variant()).count()
    }

    /// Member shown when the group is listed on one line: the best variant,
    /// or the best member when the group holds no variant.
    #[must_use]
    pub fn representative(&self) -> Option<&SearchCandidate> {
        self.members
            .iter()
            .find(|c| c.is_variant())
            .or_else(|| self.members.first())
    }
}

/// Outcome of ranking a candidate pool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranking {
    /// Selected candidates grouped by product, best group first.
    pub groups: Vec<ResultGroup>,
    /// The tier that produced the selection, `None` when nothing qualified.
    pub tier: Option<Tier>,
    /// `true` when the answer is restricted to one product's variants.
    pub disambiguated: bool,
}

impl Ranking {
    /// Selected candidates in ranked order.
    #[must_use]
    pub fn candidates(&self) -> Vec<SearchCandidate> {
        self.groups
            .iter()
            .flat_map(|g| g.members.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Applies the tier cascade and the disambiguation rule.
#[derive(Debug, Clone)]
pub struct Ranker {
    tiers: Vec<Tier>,
    min_token_chars: usize,
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(&RankingConfig::default())
    }
}

impl Ranker {
    #[must_use]
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            tiers: config.tiers(),
            min_token_chars: config.min_token_chars,
        }
    }

    /// Rank `pool` for `query`, returning at most `limit` candidates.
    #[must_use]
    pub fn rank(&self, mut pool: Vec<SearchCandidate>, query: &str, limit: usize) -> Ranking {
        if limit == 0 {
            return Ranking::default();
        }

        pool.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        let query = QueryText::new(query, self.min_token_chars);
        let Some((tier, selection)) = self.tiers.iter().find_map(|tier| {
            let selected: Vec<&SearchCandidate> = pool
                .iter()
                .filter(|c| c.similarity > tier.threshold && query.matches(tier.matcher, &c.title))
                .collect();
            (!selected.is_empty()).then_some((*tier, selected))
        }) else {
            return Ranking::default();
        };

        let groups = group_by_product(selection.into_iter().cloned().collect());
        let disambiguated = groups.first().is_some_and(|g| g.variant_count() > 1);

        let selected: Vec<SearchCandidate> = if disambiguated {
            groups
                .into_iter()
                .take(1)
                .flat_map(|g| g.members)
                .take(limit)
                .collect()
        } else {
            groups.into_iter().flat_map(|g| g.members).take(limit).collect()
        };

        Ranking {
            groups: group_by_product(selected),
            tier: Some(tier),
            disambiguated,
        }
    }
}

/// Group candidates by product, preserving first-appearance order.
///
/// For a pool sorted by descending similarity this orders groups by their top
/// similarity and keeps each group internally sorted.
#[must_use]
pub fn group_by_product(candidates: Vec<SearchCandidate>) -> Vec<ResultGroup> {
    let mut groups: Vec<ResultGroup> = Vec::new();
    for candidate in candidates {
        let key = candidate.group_key();
        match groups.iter_mut().find(|g| g.product_id == key) {
            Some(group) => group.members.push(candidate),
            None => groups.push(ResultGroup {
                product_id: key,
                product_title: candidate.product_title.clone(),
                members: vec![candidate],
            }),
        }
    }
    for group in &mut groups {
        group
            .members
            .sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    }
    groups
}

/// Lowercased query with its matchable words.
struct QueryText {
    phrase: String,
    tokens: Vec<String>,
}

impl QueryText {
    fn new(query: &str, min_token_chars: usize) -> Self {
        let phrase = query.trim().to_lowercase();
        let tokens = phrase
            .split_whitespace()
            .filter(|t| t.chars().count() >= min_token_chars)
            .map(str::to_string)
            .collect();
        Self { phrase, tokens }
    }

    fn matches(&self, matcher: TierMatcher, title: &str) -> bool {
        match matcher {
            TierMatcher::Any => true,
            TierMatcher::ExactSubstring => {
                !self.phrase.is_empty() && title.to_lowercase().contains(&self.phrase)
            }
            TierMatcher::TokenOverlap => {
                let title = title.to_lowercase();
                self.tokens.iter().any(|t| title.contains(t.as_str()))
            }
        }
    }
}
