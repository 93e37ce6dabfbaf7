//! Time-window filtering and per-source capping.
//!
//! All functions here are pure: the crawler passes in `now` so that a run
//! uses one reference instant and tests stay deterministic.

use crate::models::Article;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// Lookback window and article cap applied to one source's candidates.
#[derive(Debug, Clone, Copy)]
pub struct WindowPlan {
    pub now: DateTime<Utc>,
    pub lookback_hours: u32,
    pub max_articles: usize,
}

impl WindowPlan {
    pub fn new(now: DateTime<Utc>, lookback_hours: u32, max_articles: usize) -> Self {
        Self {
            now,
            lookback_hours,
            max_articles,
        }
    }
}

fn within(published_at: Option<DateTime<Utc>>, lookback_hours: u32, now: DateTime<Utc>) -> bool {
    match published_at {
        None => true,
        Some(ts) => now - ts <= Duration::hours(i64::from(lookback_hours)),
    }
}

/// Keep articles published within `lookback_hours` of `now`, or with no known time.
pub fn filter(articles: Vec<Article>, lookback_hours: u32, now: DateTime<Utc>) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|a| within(a.published_at, lookback_hours, now))
        .collect()
}

/// Newest first, unknown times last; keep the first `max`.
pub fn cap(mut articles: Vec<Article>, max: usize) -> Vec<Article> {
    articles.sort_by(|a, b| newest_first(a.published_at, b.published_at));
    articles.truncate(max);
    articles
}

/// `filter` then `cap`.
pub fn select(articles: Vec<Article>, plan: &WindowPlan) -> Vec<Article> {
    cap(filter(articles, plan.lookback_hours, plan.now), plan.max_articles)
}

fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
