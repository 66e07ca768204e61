use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Pageview,
    Event,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Pageview => "pageview",
            EventType::Event => "event",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "pageview" => Ok(EventType::Pageview),
            "event" => Ok(EventType::Event),
            other => Err(anyhow!("unknown event_type: {other}")),
        }
    }
}

/// A stored analytics event. Mirrors the `events` table columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub website_id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub event_type: EventType,
    pub url: String,
    pub referrer_domain: Option<String>,
    pub event_name: Option<String>,
    /// Serialized JSON object of custom properties.
    pub event_data: Option<String>,
    pub country: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub language: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    fn blank(
        website_id: &str,
        session_id: &str,
        visitor_id: &str,
        event_type: EventType,
        url: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            website_id: website_id.to_string(),
            session_id: session_id.to_string(),
            visitor_id: visitor_id.to_string(),
            event_type,
            url: url.to_string(),
            referrer_domain: None,
            event_name: None,
            event_data: None,
            country: None,
            browser: None,
            os: None,
            device_type: None,
            language: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            created_at,
        }
    }

    pub fn pageview(
        website_id: &str,
        session_id: &str,
        visitor_id: &str,
        url: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::blank(
            website_id,
            session_id,
            visitor_id,
            EventType::Pageview,
            url,
            created_at,
        )
    }

    pub fn custom(
        website_id: &str,
        session_id: &str,
        visitor_id: &str,
        event_name: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut event = Self::blank(
            website_id,
            session_id,
            visitor_id,
            EventType::Event,
            "",
            created_at,
        );
        event.event_name = Some(event_name.to_string());
        event
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.event_data = Some(data.to_string());
        self
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn with_device(mut self, device_type: &str) -> Self {
        self.device_type = Some(device_type.to_string());
        self
    }

    pub fn with_utm_source(mut self, utm_source: &str) -> Self {
        self.utm_source = Some(utm_source.to_string());
        self
    }
}

/// The projection of an event the query engines consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub event_type: EventType,
    pub url: String,
    pub event_name: Option<String>,
    pub event_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventRow {
    /// Look up a top-level custom property. Strings come back raw, other JSON
    /// scalars as their JSON text. Malformed `event_data` yields `None`.
    pub fn property(&self, key: &str) -> Option<String> {
        let raw = self.event_data.as_deref()?;
        let data: serde_json::Value = serde_json::from_str(raw).ok()?;
        match data.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            session_id: event.session_id.clone(),
            visitor_id: event.visitor_id.clone(),
            event_type: event.event_type,
            url: event.url.clone(),
            event_name: event.event_name.clone(),
            event_data: event.event_data.clone(),
            created_at: event.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_lookup_handles_strings_numbers_and_garbage() {
        let at = Utc::now();
        let event = Event::custom("site_1", "s1", "v1", "purchase", at)
            .with_data(json!({ "plan": "pro", "seats": 3, "trial": false }));
        let row = EventRow::from(&event);
        assert_eq!(row.property("plan").as_deref(), Some("pro"));
        assert_eq!(row.property("seats").as_deref(), Some("3"));
        assert_eq!(row.property("trial").as_deref(), Some("false"));
        assert_eq!(row.property("missing"), None);

        let mut broken = row.clone();
        broken.event_data = Some("{not json".to_string());
        assert_eq!(broken.property("plan"), None);
    }

    #[test]
    fn event_type_round_trips_through_storage_strings() {
        assert_eq!(EventType::parse("pageview").ok(), Some(EventType::Pageview));
        assert_eq!(EventType::Event.as_str(), "event");
        assert!(EventType::parse("click").is_err());
    }
}
