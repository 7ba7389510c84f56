use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::{AiRecommendation, SensorReading, SensorUpdate};

pub const DEFAULT_HISTORY: usize = 20;

/// What the live views render: the newest readings and the latest AI
/// recommendation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// Newest first, at most `capacity` entries.
    pub history: Vec<SensorReading>,
    pub latest_recommendation: Option<AiRecommendation>,
    /// Risk score of the recommendation that `latest_recommendation` replaced.
    pub previous_risk_score: Option<f64>,
}

impl FeedSnapshot {
    pub fn latest(&self) -> Option<&SensorReading> {
        self.history.first()
    }

    /// Change in AI risk score since the previous recommendation.
    pub fn risk_trend(&self) -> Option<f64> {
        let latest = self.latest_recommendation.as_ref()?;
        Some(latest.risk_score - self.previous_risk_score?)
    }
}

/// Bounded, shared view state fed by `sensor_update` frames.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Every update publishes a fresh snapshot; readers never observe a list
/// being edited in place.
#[derive(Clone)]
pub struct LiveFeed {
    capacity: usize,
    inner: Arc<RwLock<Arc<FeedSnapshot>>>,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Arc::new(RwLock::new(Arc::new(FeedSnapshot::default()))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Apply one update. The reading always enters the history (evicting the
    /// oldest past capacity); the AI recommendation is replaced only when the
    /// update carries a non-empty recommendation list.
    pub async fn push(&self, update: &SensorUpdate) -> Arc<FeedSnapshot> {
        let mut guard = self.inner.write().await;
        let prev = guard.clone();

        let history: Vec<SensorReading> = std::iter::once(update.reading.clone())
            .chain(prev.history.iter().cloned())
            .take(self.capacity)
            .collect();

        let (latest_recommendation, previous_risk_score) = match update.recommendation() {
            Some(rec) => (
                Some(rec),
                prev.latest_recommendation.as_ref().map(|r| r.risk_score),
            ),
            None => (prev.latest_recommendation.clone(), prev.previous_risk_score),
        };

        let next = Arc::new(FeedSnapshot {
            history,
            latest_recommendation,
            previous_risk_score,
        });
        *guard = next.clone();
        next
    }

    pub async fn snapshot(&self) -> Arc<FeedSnapshot> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::RiskLevel;

    fn make_update(temperature: f64, score: f64, recommendations: Option<Vec<&str>>) -> SensorUpdate {
        SensorUpdate {
            reading: SensorReading {
                id: None,
                temperature,
                humidity: 30.0,
                smoke_level: 100.0,
                rain_level: 4000.0,
                rain_detected: false,
                fire_risk_score: Some(score),
                risk_level: Some(RiskLevel::from_score(score)),
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            },
            reasoning: Some("dry".into()),
            recommendations: recommendations
                .map(|r| r.into_iter().map(str::to_owned).collect()),
            should_activate_sprinkler: Some(false),
        }
    }

    #[tokio::test]
    async fn empty_feed_has_nothing() {
        let feed = LiveFeed::default();
        let snap = feed.snapshot().await;
        assert!(snap.history.is_empty());
        assert!(snap.latest().is_none());
        assert!(snap.latest_recommendation.is_none());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_bounded() {
        let feed = LiveFeed::new(3);
        for t in 1..=5 {
            feed.push(&make_update(t as f64, 10.0, None)).await;
        }
        let temps: Vec<f64> = feed
            .snapshot()
            .await
            .history
            .iter()
            .map(|r| r.temperature)
            .collect();
        assert_eq!(temps, vec![5.0, 4.0, 3.0]);
    }

    #[tokio::test]
    async fn empty_recommendations_do_not_replace_ai_state() {
        let feed = LiveFeed::default();
        feed.push(&make_update(30.0, 40.0, Some(vec!["Reduce risk"]))).await;
        let snap = feed.push(&make_update(31.0, 90.0, Some(vec![]))).await;

        let rec = snap.latest_recommendation.as_ref().unwrap();
        assert_eq!(rec.risk_score, 40.0);
        assert_eq!(rec.recommendations, vec!["Reduce risk".to_owned()]);
        // The reading itself still lands in history.
        assert_eq!(snap.latest().unwrap().temperature, 31.0);
    }

    #[tokio::test]
    async fn missing_recommendations_do_not_create_ai_state() {
        let feed = LiveFeed::default();
        let snap = feed.push(&make_update(30.0, 80.0, None)).await;
        assert!(snap.latest_recommendation.is_none());
    }

    #[tokio::test]
    async fn non_empty_recommendations_replace_and_track_trend() {
        let feed = LiveFeed::default();
        feed.push(&make_update(30.0, 40.0, Some(vec!["Monitor"]))).await;
        let snap = feed.push(&make_update(35.0, 65.0, Some(vec!["Reduce risk"]))).await;

        let rec = snap.latest_recommendation.as_ref().unwrap();
        assert_eq!(rec.risk_score, 65.0);
        assert_eq!(rec.risk_level, RiskLevel::High);
        assert_eq!(snap.previous_risk_score, Some(40.0));
        assert_eq!(snap.risk_trend(), Some(25.0));
    }

    #[tokio::test]
    async fn old_snapshots_are_unaffected_by_updates() {
        let feed = LiveFeed::default();
        let before = feed.push(&make_update(20.0, 10.0, None)).await;
        feed.push(&make_update(21.0, 10.0, None)).await;
        assert_eq!(before.history.len(), 1);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let feed = LiveFeed::default();
        let clone = feed.clone();
        feed.push(&make_update(22.0, 10.0, None)).await;
        assert_eq!(clone.snapshot().await.history.len(), 1);
    }
}
