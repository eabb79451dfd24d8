//! Balanced pair construction for the authorship-verification benchmark.
//!
//! Articles grouped by news source are recombined into two pair lists:
//! same-source pairs (ground-truth label "same") and cross-source pairs
//! (ground-truth label "diff"). Cross-source pairing spreads every source's
//! right-half articles evenly over all other sources so that no single
//! source combination dominates the benchmark.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seed for the same-source shuffle.
pub const SAME_PAIR_SEED: u64 = 42;
/// Seed for the cross-source shuffle. Deliberately different from
/// [`SAME_PAIR_SEED`] so the left/right split is independent of the
/// same-pair ordering.
pub const DIFF_PAIR_SEED: u64 = 43;

/// One news article. Immutable input row; pairing never mutates these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub source: String,
    pub title: String,
    pub text: String,
}

/// An ordered pair of articles. Which list it sits in (same vs diff)
/// carries the ground-truth label.
#[derive(Debug, Clone, Serialize)]
pub struct ArticlePair {
    pub first: Article,
    pub second: Article,
}

/// Seeds for the two independent shuffle phases.
#[derive(Debug, Clone, Copy)]
pub struct PairConfig {
    pub same_seed: u64,
    pub diff_seed: u64,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            same_seed: SAME_PAIR_SEED,
            diff_seed: DIFF_PAIR_SEED,
        }
    }
}

/// Precondition failures of the cross-source pairing scheme.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairError {
    #[error("source groups must be the same size: expected {expected} articles, `{group}` has {actual}")]
    UnevenGroups {
        // not named `source`: thiserror reserves that name for error chaining
        group: String,
        expected: usize,
        actual: usize,
    },
    #[error("per-source article count must be even for cross-source pairing, got {0}")]
    OddGroupSize(usize),
}

/// Group article indices by source label, ordered lexicographically.
///
/// The explicit ordered key list is part of the contract: pairing output
/// must not depend on incidental map iteration order.
pub fn group_by_source(articles: &[Article]) -> Vec<(String, Vec<usize>)> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, article) in articles.iter().enumerate() {
        groups.entry(article.source.as_str()).or_default().push(idx);
    }
    groups
        .into_iter()
        .map(|(source, members)| (source.to_owned(), members))
        .collect()
}

/// Build the two pair lists from a fixed input snapshot.
///
/// Same-source pairing tolerates any group sizes (an odd leftover article
/// is dropped, a 0/1-article group contributes nothing). Cross-source
/// pairing requires uniform, even group sizes once two or more sources are
/// present; with a single source it is simply empty.
pub fn create_pairs(
    articles: &[Article],
    cfg: &PairConfig,
) -> Result<(Vec<ArticlePair>, Vec<ArticlePair>), PairError> {
    let groups = group_by_source(articles);
    let same_pairs = same_source_pairs(articles, &groups, cfg.same_seed);
    let diff_pairs = diff_source_pairs(articles, &groups, cfg.diff_seed)?;
    Ok((same_pairs, diff_pairs))
}

fn pair_of(articles: &[Article], first: usize, second: usize) -> ArticlePair {
    ArticlePair {
        first: articles[first].clone(),
        second: articles[second].clone(),
    }
}

fn same_source_pairs(
    articles: &[Article],
    groups: &[(String, Vec<usize>)],
    seed: u64,
) -> Vec<ArticlePair> {
    let mut pairs = Vec::new();
    for (_, members) in groups {
        // Fresh rng per group, same seed: group order must not leak into
        // another group's permutation.
        let mut shuffled = members.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);

        for chunk in shuffled.chunks_exact(2) {
            pairs.push(pair_of(articles, chunk[0], chunk[1]));
        }
    }
    pairs
}

/// Cross-source pairing.
///
/// Each group is shuffled and split in half: the first `N/2` articles are
/// left-candidates, the rest right-candidates. With `K` groups, each round
/// pairs one group's lefts against a window of `W = (N/2) / (K-1)` rights
/// from every other group; the `R = N/2 - (K-1)*W` leftover lefts are paired
/// against the tails of the next `R` groups (wrapping), consumed backwards.
/// Forward cursors stop at `(K-1)*W` and tail cursors never go below it, so
/// the two regions partition every right half exactly: each right-candidate
/// is consumed exactly once, and ordered cross-source counts differ by at
/// most one.
fn diff_source_pairs(
    articles: &[Article],
    groups: &[(String, Vec<usize>)],
    seed: u64,
) -> Result<Vec<ArticlePair>, PairError> {
    let k = groups.len();
    if k < 2 {
        // No cross-source partner exists.
        return Ok(Vec::new());
    }

    let expected = groups[0].1.len();
    for (source, members) in groups {
        if members.len() != expected {
            return Err(PairError::UnevenGroups {
                group: source.clone(),
                expected,
                actual: members.len(),
            });
        }
    }
    if expected % 2 != 0 {
        return Err(PairError::OddGroupSize(expected));
    }

    let half = expected / 2;
    let mut firsts = Vec::with_capacity(k);
    let mut seconds = Vec::with_capacity(k);
    for (_, members) in groups {
        let mut shuffled = members.clone();
        let mut rng = StdRng::seed_from_u64(seed);
        shuffled.shuffle(&mut rng);
        seconds.push(shuffled.split_off(half));
        firsts.push(shuffled);
    }

    let window = half / (k - 1);
    let remainder = half - window * (k - 1); // < k-1, so the wrap below never hits i

    let mut fwd = vec![0usize; k]; // forward cursor into each right half
    let mut back = vec![0usize; k]; // articles consumed from each right-half tail

    let mut pairs = Vec::with_capacity(k * half);
    for i in 0..k {
        let mut first_idx = 0;
        for j in 0..k {
            if i == j {
                continue;
            }
            for _ in 0..window {
                pairs.push(pair_of(articles, firsts[i][first_idx], seconds[j][fwd[j]]));
                first_idx += 1;
                fwd[j] += 1;
            }
        }

        // Leftover lefts of group i against the tails of the next groups.
        for step in 1..=remainder {
            let j = (i + step) % k;
            let tail = half - 1 - back[j];
            pairs.push(pair_of(articles, firsts[i][first_idx], seconds[j][tail]));
            first_idx += 1;
            back[j] += 1;
        }
    }
    Ok(pairs)
}

/// Source×source pair counts. Same-pairs sit on the diagonal, diff-pairs
/// off it. Read-only companion of [`create_pairs`], for inspection only.
#[derive(Debug, Clone)]
pub struct ContingencyTable {
    pub sources: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

pub fn contingency_table(same: &[ArticlePair], diff: &[ArticlePair]) -> ContingencyTable {
    let mut labels: BTreeSet<&str> = BTreeSet::new();
    for pair in same.iter().chain(diff) {
        labels.insert(pair.first.source.as_str());
        labels.insert(pair.second.source.as_str());
    }
    let sources: Vec<String> = labels.iter().map(|s| (*s).to_owned()).collect();
    let index: HashMap<&str, usize> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let n = sources.len();
    let mut counts = vec![vec![0usize; n]; n];
    for pair in same.iter().chain(diff) {
        let row = index[pair.first.source.as_str()];
        let col = index[pair.second.source.as_str()];
        counts[row][col] += 1;
    }
    ContingencyTable { sources, counts }
}

impl ContingencyTable {
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

impl fmt::Display for ContingencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:8} |", "")?;
        for source in &self.sources {
            write!(f, " {:>4} |", clip(source, 4))?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat(11 + 7 * self.sources.len()))?;
        for (row, source) in self.sources.iter().enumerate() {
            write!(f, "{:8} |", clip(source, 8))?;
            for count in &self.counts[row] {
                write!(f, " {:>4} |", count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// char-based clip, source names are not always ASCII
fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(sources: &[(&str, usize)]) -> Vec<Article> {
        let mut articles = Vec::new();
        for (source, count) in sources {
            for i in 0..*count {
                articles.push(Article {
                    source: (*source).to_owned(),
                    title: format!("{source}-{i}"),
                    text: format!("body of {source} article {i}"),
                });
            }
        }
        articles
    }

    fn uniform(k: usize, n: usize) -> Vec<Article> {
        let names: Vec<String> = (0..k).map(|i| format!("outlet_{i:02}")).collect();
        let sizes: Vec<(&str, usize)> = names.iter().map(|s| (s.as_str(), n)).collect();
        corpus(&sizes)
    }

    #[test]
    fn deterministic_across_runs() {
        let articles = uniform(4, 10);
        let cfg = PairConfig::default();
        let (same_a, diff_a) = create_pairs(&articles, &cfg).unwrap();
        let (same_b, diff_b) = create_pairs(&articles, &cfg).unwrap();

        let titles = |pairs: &[ArticlePair]| -> Vec<(String, String)> {
            pairs
                .iter()
                .map(|p| (p.first.title.clone(), p.second.title.clone()))
                .collect()
        };
        assert_eq!(titles(&same_a), titles(&same_b));
        assert_eq!(titles(&diff_a), titles(&diff_b));
    }

    #[test]
    fn seeds_change_the_pairing() {
        let articles = uniform(3, 8);
        let (same_a, _) = create_pairs(&articles, &PairConfig::default()).unwrap();
        let (same_b, _) = create_pairs(
            &articles,
            &PairConfig {
                same_seed: 7,
                diff_seed: DIFF_PAIR_SEED,
            },
        )
        .unwrap();
        let titles = |pairs: &[ArticlePair]| -> Vec<(String, String)> {
            pairs
                .iter()
                .map(|p| (p.first.title.clone(), p.second.title.clone()))
                .collect()
        };
        assert_ne!(titles(&same_a), titles(&same_b));
    }

    #[test]
    fn same_pair_counts_tolerate_odd_and_tiny_groups() {
        let articles = corpus(&[("a", 5), ("b", 4), ("c", 1), ("d", 0)]);
        let groups = group_by_source(&articles);
        let same = same_source_pairs(&articles, &groups, SAME_PAIR_SEED);
        // floor(5/2) + floor(4/2) + floor(1/2)
        assert_eq!(same.len(), 2 + 2 + 0);
    }

    #[test]
    fn pair_tags_match_their_list() {
        let articles = uniform(3, 6);
        let (same, diff) = create_pairs(&articles, &PairConfig::default()).unwrap();
        assert!(same.iter().all(|p| p.first.source == p.second.source));
        assert!(diff.iter().all(|p| p.first.source != p.second.source));
    }

    #[test]
    fn diff_pairs_exhaust_both_halves_exactly_once() {
        let articles = uniform(4, 8);
        let (_, diff) = create_pairs(&articles, &PairConfig::default()).unwrap();

        // 4 groups x 4 lefts each
        assert_eq!(diff.len(), 16);

        let firsts: std::collections::HashSet<&str> =
            diff.iter().map(|p| p.first.title.as_str()).collect();
        let seconds: std::collections::HashSet<&str> =
            diff.iter().map(|p| p.second.title.as_str()).collect();
        assert_eq!(firsts.len(), diff.len(), "a left article was reused");
        assert_eq!(seconds.len(), diff.len(), "a right article was reused");
        // left and right halves are disjoint
        assert!(firsts.is_disjoint(&seconds));
    }

    #[test]
    fn cross_source_coverage_is_balanced() {
        // half = 6, K-1 = 4: window 1 with remainder 2 per round.
        let articles = uniform(5, 12);
        let (same, diff) = create_pairs(&articles, &PairConfig::default()).unwrap();
        let table = contingency_table(&same, &diff);

        let mut min = usize::MAX;
        let mut max = 0;
        for (row, row_counts) in table.counts.iter().enumerate() {
            for (col, &count) in row_counts.iter().enumerate() {
                if row != col {
                    min = min.min(count);
                    max = max.max(count);
                }
            }
        }
        assert!(max - min <= 1, "cell counts spread too far: {min}..{max}");
    }

    #[test]
    fn two_sources_of_four_articles() {
        let articles = uniform(2, 4);
        let (same, diff) = create_pairs(&articles, &PairConfig::default()).unwrap();
        // one pair per two articles in each group
        assert_eq!(same.len(), 4);
        // every left-half article pairs across, both directions
        assert_eq!(diff.len(), 4);
    }

    #[test]
    fn single_source_has_no_diff_pairs() {
        let articles = uniform(1, 6);
        let (same, diff) = create_pairs(&articles, &PairConfig::default()).unwrap();
        assert_eq!(same.len(), 3);
        assert!(diff.is_empty());
    }

    #[test]
    fn uneven_groups_are_rejected() {
        let articles = corpus(&[("a", 4), ("b", 2)]);
        let err = create_pairs(&articles, &PairConfig::default()).unwrap_err();
        assert_eq!(
            err,
            PairError::UnevenGroups {
                group: "b".into(),
                expected: 4,
                actual: 2,
            }
        );
        // the message names the offending source group
        assert!(err.to_string().contains("`b`"));
    }

    #[test]
    fn odd_group_size_is_rejected() {
        let articles = corpus(&[("a", 5), ("b", 5)]);
        let err = create_pairs(&articles, &PairConfig::default()).unwrap_err();
        assert_eq!(err, PairError::OddGroupSize(5));
    }

    #[test]
    fn single_article_groups_fail_the_evenness_check() {
        let articles = corpus(&[("a", 1), ("b", 1)]);
        let err = create_pairs(&articles, &PairConfig::default()).unwrap_err();
        assert_eq!(err, PairError::OddGroupSize(1));
    }

    #[test]
    fn contingency_table_counts_every_pair_once() {
        let articles = uniform(3, 6);
        let (same, diff) = create_pairs(&articles, &PairConfig::default()).unwrap();
        let table = contingency_table(&same, &diff);

        assert_eq!(table.total(), same.len() + diff.len());
        for (i, _) in table.sources.iter().enumerate() {
            // diagonal holds exactly the same-pairs of that source
            assert_eq!(table.counts[i][i], 3);
        }
    }

    #[test]
    fn group_keys_are_lexicographic() {
        let articles = corpus(&[("zeta", 2), ("alpha", 2), ("mid", 2)]);
        let groups = group_by_source(&articles);
        let keys: Vec<&str> = groups.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(keys, ["alpha", "mid", "zeta"]);
    }
}
