use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timestamps
//
// The backend emits naive ISO-8601 timestamps (`2024-05-01T12:00:00.123456`)
// that are implicitly UTC. Some paths go through a JSON encoder that appends an
// offset instead. Accept both and always serialise as RFC 3339.
// ---------------------------------------------------------------------------

pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw:?}")))
    }
}

// ---------------------------------------------------------------------------
// Users & auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub full_name: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_role() -> String {
    "user".to_owned()
}

fn default_true() -> bool {
    true
}

/// Login form. `username` carries the account email.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

// ---------------------------------------------------------------------------
// RiskLevel
// ---------------------------------------------------------------------------

/// Fire risk classification. Ordered from least to most severe; values the
/// client does not recognise sort below `Low`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskLevel {
    Unknown(String),
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Classify a 0-100 risk score using the backend's thresholds.
    pub fn from_score(score: f64) -> Self {
        if score >= 76.0 {
            Self::Critical
        } else if score >= 51.0 {
            Self::High
        } else if score >= 26.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<String> for RiskLevel {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        level.as_str().to_owned()
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sensor readings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub temperature: f64,
    pub humidity: f64,
    pub smoke_level: f64,
    pub rain_level: f64,
    pub rain_detected: bool,
    #[serde(default)]
    pub fire_risk_score: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Payload of a `sensor_update` realtime frame: a reading plus whatever AI
/// analysis the backend attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorUpdate {
    #[serde(flatten)]
    pub reading: SensorReading,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
    #[serde(default)]
    pub should_activate_sprinkler: Option<bool>,
}

impl SensorUpdate {
    /// The AI recommendation carried by this update, present only when the
    /// backend attached a non-empty recommendation list.
    pub fn recommendation(&self) -> Option<AiRecommendation> {
        let recommendations = self.recommendations.as_ref().filter(|r| !r.is_empty())?;
        let risk_score = self.reading.fire_risk_score.unwrap_or_default();
        Some(AiRecommendation {
            risk_score,
            risk_level: self
                .reading
                .risk_level
                .clone()
                .unwrap_or_else(|| RiskLevel::from_score(risk_score)),
            reasoning: self.reasoning.clone().unwrap_or_default(),
            recommendations: recommendations.clone(),
            should_activate_sprinkler: self.should_activate_sprinkler.unwrap_or(false),
            timestamp: self.reading.timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiRecommendation {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub reasoning: String,
    pub recommendations: Vec<String>,
    pub should_activate_sprinkler: bool,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pagination: GET /sensors/records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordsQuery {
    pub skip: u64,
    pub limit: u64,
    pub risk_level: Option<RiskLevel>,
}

impl Default for RecordsQuery {
    fn default() -> Self {
        Self { skip: 0, limit: 20, risk_level: None }
    }
}

impl RecordsQuery {
    /// Query for the 1-based `page` at `per_page` records per page.
    pub fn page(page: u64, per_page: u64, risk_level: Option<RiskLevel>) -> Self {
        Self {
            skip: page.saturating_sub(1) * per_page,
            limit: per_page,
            risk_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SensorRecordsPage {
    pub records: Vec<SensorReading>,
    pub total: u64,
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// 1-based.
    pub current_page: u64,
    pub total_pages: u64,
    pub total: u64,
}

impl PageInfo {
    pub fn new(skip: u64, limit: u64, total: u64) -> Self {
        if limit == 0 {
            return Self { current_page: 1, total_pages: 0, total };
        }
        Self {
            current_page: skip / limit + 1,
            total_pages: total.div_ceil(limit),
            total,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }
}

impl SensorRecordsPage {
    pub fn page_info(&self) -> PageInfo {
        PageInfo::new(self.skip, self.limit, self.total)
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown alert status: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: RiskLevel,
    pub status: AlertStatus,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement returned by alert state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionAck {
    pub message: String,
    #[serde(default)]
    pub alert_id: Option<String>,
}

/// Filter for `GET /alerts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub hours: u32,
    pub limit: u32,
}

impl Default for AlertFilter {
    fn default() -> Self {
        Self { status: None, hours: 24, limit: 50 }
    }
}

/// `GET /alerts/count`: number of alerts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AlertCounts {
    #[serde(default)]
    pub active: u64,
    #[serde(default)]
    pub acknowledged: u64,
    #[serde(default)]
    pub resolved: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    Webhook,
    Siren,
    Dashboard,
}

/// Alert raised by the backend's rule-based notification system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartAlert {
    #[serde(alias = "id")]
    pub alert_id: String,
    pub title: String,
    pub message: String,
    pub priority: AlertPriority,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub action_taken: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Dashboard & sprinkler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprinklerMode {
    Off,
    On,
    Auto,
}

impl SprinklerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardStats {
    pub current_temperature: f64,
    pub current_humidity: f64,
    pub current_smoke: f64,
    pub current_risk_level: RiskLevel,
    pub current_risk_score: f64,
    pub active_alerts: u64,
    pub sprinkler_status: SprinklerMode,
    pub total_readings_today: u64,
    pub average_temp_today: f64,
    pub max_risk_today: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SprinklerState {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub status: SprinklerMode,
    #[serde(default)]
    pub manual_override: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Response to `POST /sprinkler/control` and `POST /sprinkler/auto`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SprinklerCommandAck {
    pub message: String,
    pub control: SprinklerState,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn update_json(recommendations: serde_json::Value) -> serde_json::Value {
        json!({
            "temperature": 41.5,
            "humidity": 12.0,
            "smoke_level": 300.0,
            "rain_level": 4095.0,
            "rain_detected": false,
            "fire_risk_score": 82.0,
            "risk_level": "critical",
            "reasoning": "Hot, dry and smoky",
            "recommendations": recommendations,
            "should_activate_sprinkler": true,
            "timestamp": "2024-05-01T12:00:00.123456"
        })
    }

    #[test]
    fn naive_and_offset_timestamps_both_parse() {
        let naive = timestamp::parse("2024-05-01T12:00:00.5").unwrap();
        let zulu = timestamp::parse("2024-05-01T12:00:00.5Z").unwrap();
        assert_eq!(naive, zulu);
        assert!(timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn risk_level_parses_known_and_preserves_unknown() {
        let levels: Vec<RiskLevel> =
            serde_json::from_value(json!(["low", "HIGH", "extreme"])).unwrap();
        assert_eq!(levels[0], RiskLevel::Low);
        assert_eq!(levels[1], RiskLevel::High);
        assert_eq!(levels[2], RiskLevel::Unknown("extreme".into()));
        assert_eq!(serde_json::to_value(&levels[2]).unwrap(), json!("extreme"));
    }

    #[test]
    fn risk_level_orders_by_severity() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Medium > RiskLevel::Low);
        assert!(RiskLevel::Low > RiskLevel::Unknown("n/a".into()));
    }

    #[test]
    fn risk_level_from_score_uses_backend_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(25.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(26.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(51.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(76.0), RiskLevel::Critical);
    }

    #[test]
    fn sensor_update_with_recommendations_yields_ai_recommendation() {
        let update: SensorUpdate =
            serde_json::from_value(update_json(json!(["Reduce risk"]))).unwrap();
        let rec = update.recommendation().unwrap();
        assert_eq!(rec.risk_score, 82.0);
        assert_eq!(rec.risk_level, RiskLevel::Critical);
        assert_eq!(rec.recommendations, vec!["Reduce risk".to_owned()]);
        assert!(rec.should_activate_sprinkler);
        assert_eq!(rec.reasoning, "Hot, dry and smoky");
    }

    #[test]
    fn sensor_update_with_empty_recommendations_has_none() {
        let update: SensorUpdate = serde_json::from_value(update_json(json!([]))).unwrap();
        assert!(update.recommendation().is_none());
        assert_eq!(update.reading.risk_level, Some(RiskLevel::Critical));
    }

    #[test]
    fn plain_reading_accepts_mongo_id_alias() {
        let reading: SensorReading = serde_json::from_value(json!({
            "_id": "665f",
            "temperature": 20.0,
            "humidity": 50.0,
            "smoke_level": 10.0,
            "rain_level": 100.0,
            "rain_detected": true,
            "timestamp": "2024-05-01T12:00:00"
        }))
        .unwrap();
        assert_eq!(reading.id.as_deref(), Some("665f"));
        assert!(reading.fire_risk_score.is_none());
    }

    #[test]
    fn page_info_matches_ceiling_division() {
        let info = PageInfo::new(20, 20, 57);
        assert_eq!(info.current_page, 2);
        assert_eq!(info.total_pages, 3);
        assert!(info.has_next());
        assert!(info.has_previous());

        let last = PageInfo::new(40, 20, 57);
        assert_eq!(last.current_page, 3);
        assert!(!last.has_next());

        assert_eq!(PageInfo::new(0, 20, 0).total_pages, 0);
        assert_eq!(PageInfo::new(0, 0, 10).total_pages, 0);
    }

    #[test]
    fn records_query_page_computes_skip() {
        let q = RecordsQuery::page(2, 20, Some(RiskLevel::High));
        assert_eq!(q.skip, 20);
        assert_eq!(q.limit, 20);
        assert_eq!(RecordsQuery::page(0, 20, None).skip, 0);
    }

    #[test]
    fn alert_counts_default_missing_statuses_to_zero() {
        let counts: AlertCounts = serde_json::from_value(json!({ "active": 3 })).unwrap();
        assert_eq!(counts, AlertCounts { active: 3, acknowledged: 0, resolved: 0 });
    }
}
