//! Dashboard metrics aggregated from survey records, and the per-response
//! listing joined with the prize each respondent won.

use std::{cmp::Reverse, collections::HashMap};

use serde::{Deserialize, Serialize};

use crate::{IdentityKey, prize::PrizeClaim, survey::SurveyRecord};

/// One slice of a distribution: a label and how many responses carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
  pub name:  String,
  pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
  pub total_responses: usize,
  /// Mean overall rating; 0 when there are no responses.
  pub average_rating:  f64,
  pub discovery:       Vec<Bucket>,
  pub service:         Vec<Bucket>,
  pub speed:           Vec<Bucket>,
  pub food:            Vec<Bucket>,
  /// Star counts in ascending order, e.g. `"1 star"` .. `"5 stars"`.
  pub ratings:         Vec<Bucket>,
}

/// Count labels and sort most frequent first, ties alphabetically.
fn distribution<I>(labels: I) -> Vec<Bucket>
where
  I: IntoIterator<Item = String>,
{
  let mut counts: HashMap<String, usize> = HashMap::new();
  for label in labels {
    *counts.entry(label).or_default() += 1;
  }
  let mut buckets: Vec<Bucket> = counts
    .into_iter()
    .map(|(name, value)| Bucket { name, value })
    .collect();
  buckets.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
  buckets
}

fn star_label(stars: u8) -> String {
  if stars == 1 { "1 star".to_owned() } else { format!("{stars} stars") }
}

impl DashboardMetrics {
  pub fn compute(records: &[SurveyRecord]) -> Self {
    let total_responses = records.len();
    let average_rating = if total_responses == 0 {
      0.0
    } else {
      records
        .iter()
        .map(|r| f64::from(r.overall_rating))
        .sum::<f64>()
        / total_responses as f64
    };

    let mut star_counts = [0usize; 5];
    for r in records {
      if (1..=5).contains(&r.overall_rating) {
        star_counts[usize::from(r.overall_rating) - 1] += 1;
      }
    }
    let ratings = (1..=5u8)
      .zip(star_counts)
      .filter(|(_, n)| *n > 0)
      .map(|(stars, value)| Bucket { name: star_label(stars), value })
      .collect();

    Self {
      total_responses,
      average_rating,
      discovery: distribution(records.iter().map(|r| r.discovery_channel.to_string())),
      service: distribution(records.iter().map(|r| r.service.to_string())),
      speed: distribution(records.iter().map(|r| r.speed.to_string())),
      food: distribution(records.iter().map(|r| r.food.to_string())),
      ratings,
    }
  }
}

// ─── Detailed responses ──────────────────────────────────────────────────────

/// One survey response with the prize its respondent won, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRow {
  #[serde(flatten)]
  pub record: SurveyRecord,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prize:  Option<String>,
}

impl ResponseRow {
  /// Attach each claim's prize to the survey record with the same key.
  ///
  /// Claims without a survey record are dropped; a claim whose wheel has not
  /// resolved contributes no prize. Rows are newest first.
  pub fn join(records: &[SurveyRecord], claims: &[PrizeClaim]) -> Vec<Self> {
    let prizes: HashMap<&IdentityKey, &str> = claims
      .iter()
      .filter_map(|c| c.prize.as_deref().map(|p| (&c.uid, p)))
      .collect();

    let mut rows: Vec<Self> = records
      .iter()
      .map(|r| Self {
        record: r.clone(),
        prize:  prizes.get(&r.uid).map(|p| (*p).to_owned()),
      })
      .collect();
    rows.sort_by_key(|row| Reverse(row.record.created_at));
    rows
  }
}
