//! All-pairs drug interaction fan-out.
//!
//! The pure half ([`unordered_pairs`], [`merge_outcomes`]) is kept apart from the I/O half
//! ([`check_all`]) so the filtering and de-duplication rules can be tested without a lookup.

use std::collections::HashMap;
use std::fmt;

use futures_util::stream::{self, StreamExt};
use medivault_core::{CoreResult, InteractionLookup, InteractionRecord, Severity};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Index pairs `(i, j)` with `i < j`, in row-major order. N names yield N*(N-1)/2 pairs.
pub fn unordered_pairs(len: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(len * len.saturating_sub(1) / 2);
    for i in 0..len {
        for j in (i + 1)..len {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Canonical key for an unordered pair: both names sorted, joined with `|`.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}|{}", a, b)
    } else {
        format!("{}|{}", b, a)
    }
}

fn sorted_pair(a: &str, b: &str) -> [String; 2] {
    if a <= b {
        [a.to_string(), b.to_string()]
    } else {
        [b.to_string(), a.to_string()]
    }
}

/// A significant interaction between two medications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionFinding {
    pub pair: [String; 2],
    pub pair_key: String,
    pub severity: Severity,
    pub summary: String,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPair {
    pub pair: [String; 2],
    pub reason: String,
}

impl fmt::Display for SkippedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interaction check failed for {} + {}: {}",
            self.pair[0], self.pair[1], self.reason
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    pub interactions: Vec<InteractionFinding>,
    pub pairs_evaluated: usize,
    pub skipped: Vec<SkippedPair>,
}

impl FanOutReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Result of one lookup call for the pair `(subject, reference)`.
#[derive(Debug)]
pub struct PairOutcome {
    pub subject: String,
    pub reference: String,
    pub result: CoreResult<Vec<InteractionRecord>>,
}

/// Fold per-pair outcomes into a report.
///
/// Low and unknown findings are dropped. When a canonical key shows up more than once the
/// most severe finding wins; ties keep the one seen first.
pub fn merge_outcomes(outcomes: Vec<PairOutcome>) -> FanOutReport {
    let mut report = FanOutReport {
        pairs_evaluated: outcomes.len(),
        ..FanOutReport::default()
    };
    let mut positions: HashMap<String, usize> = HashMap::new();

    for outcome in outcomes {
        let records = match outcome.result {
            Ok(records) => records,
            Err(e) => {
                report.skipped.push(SkippedPair {
                    pair: sorted_pair(&outcome.subject, &outcome.reference),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let key = pair_key(&outcome.subject, &outcome.reference);
        for record in records.into_iter().filter(|r| r.severity.is_significant()) {
            let finding = InteractionFinding {
                pair: sorted_pair(&outcome.subject, &outcome.reference),
                pair_key: key.clone(),
                severity: record.severity,
                summary: record.summary,
                description: record.description,
                action: record.action,
            };
            match positions.get(&key) {
                Some(&pos) => {
                    if finding.severity.rank() > report.interactions[pos].severity.rank() {
                        report.interactions[pos] = finding;
                    }
                }
                None => {
                    positions.insert(key.clone(), report.interactions.len());
                    report.interactions.push(finding);
                }
            }
        }
    }

    report
}

/// Check every unordered pair of `names` against `lookup`.
///
/// At most `max_concurrent` lookups are in flight. Outcomes are merged in pair order, so
/// the report does not depend on completion order. A failed pair is skipped, never fatal.
pub async fn check_all(
    lookup: &dyn InteractionLookup,
    names: &[String],
    max_concurrent: usize,
) -> FanOutReport {
    let pairs = unordered_pairs(names.len());
    debug!("Checking {} medication pairs", pairs.len());

    let outcomes: Vec<PairOutcome> = stream::iter(pairs)
        .map(|(i, j)| {
            let subject = names[i].clone();
            let reference = names[j].clone();
            async move {
                let references = [reference.clone()];
                let result = lookup.check(&subject, &references).await;
                PairOutcome {
                    subject,
                    reference,
                    result,
                }
            }
        })
        .buffered(max_concurrent.max(1))
        .collect()
        .await;

    let report = merge_outcomes(outcomes);
    for skipped in &report.skipped {
        warn!("{}", skipped);
    }
    report
}
