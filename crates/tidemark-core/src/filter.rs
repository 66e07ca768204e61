use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Optional dimension filters applied uniformly to funnel and journey queries.
///
/// Every field is an exact match except `page` (substring of the URL) and
/// `hostname` (case-insensitive host of an absolute URL).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub country: Option<String>,
    pub page: Option<String>,
    pub referrer: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device: Option<String>,
    pub language: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub hostname: Option<String>,
}

fn eq_opt(wanted: &Option<String>, actual: &Option<String>) -> bool {
    match wanted {
        Some(w) => actual.as_deref() == Some(w.as_str()),
        None => true,
    }
}

pub(crate) fn url_host(raw: &str) -> Option<String> {
    url::Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

impl EventFilter {
    pub fn is_empty(&self) -> bool {
        *self == EventFilter::default()
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(page) = &self.page {
            if !event.url.contains(page.as_str()) {
                return false;
            }
        }
        if let Some(hostname) = &self.hostname {
            if url_host(&event.url).as_deref() != Some(hostname.to_lowercase().as_str()) {
                return false;
            }
        }
        eq_opt(&self.country, &event.country)
            && eq_opt(&self.referrer, &event.referrer_domain)
            && eq_opt(&self.browser, &event.browser)
            && eq_opt(&self.os, &event.os)
            && eq_opt(&self.device, &event.device_type)
            && eq_opt(&self.language, &event.language)
            && eq_opt(&self.utm_source, &event.utm_source)
            && eq_opt(&self.utm_medium, &event.utm_medium)
            && eq_opt(&self.utm_campaign, &event.utm_campaign)
    }
}
