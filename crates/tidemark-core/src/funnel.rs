//! Ordered multi-step funnels.
//!
//! A funnel is evaluated per session (or per visitor) over that stream's
//! events in `(created_at, id)` order. Each stream is scanned once: the stream
//! reaches step *i + 1* only through an event that comes after the event that
//! satisfied step *i*, and a single event never satisfies two steps.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::QueryError;
use crate::event::{EventRow, EventType};
use crate::filter::EventFilter;
use crate::matcher::PathPattern;
use crate::runner::{Compared, QueryRunner};
use crate::store::{EventQuery, EventStore, FunnelConflict, FunnelDraft, FunnelStore, MatchCriteria};
use crate::time_range::ResolvedWindow;

const MAX_MATCH_VALUE_LEN: usize = 500;
const MAX_STEP_NAME_LEN: usize = 120;
const MAX_FUNNEL_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Page,
    Event,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Page => "page",
            StepType::Event => "event",
        }
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw {
            "page" => Ok(StepType::Page),
            "event" => Ok(StepType::Event),
            other => Err(anyhow::anyhow!("invalid step_type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub step_type: StepType,
    /// Path pattern for page steps, event name for event steps.
    pub match_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_value: Option<String>,
}

impl FunnelStep {
    pub fn page(pattern: &str) -> Self {
        Self {
            step_type: StepType::Page,
            match_value: pattern.to_string(),
            name: None,
            property_key: None,
            property_value: None,
        }
    }

    pub fn event(event_name: &str) -> Self {
        Self {
            step_type: StepType::Event,
            ..Self::page(event_name)
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.property_key = Some(key.to_string());
        self.property_value = Some(value.to_string());
        self
    }

    /// Display name: the explicit name, else the match value.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.match_value)
    }

    fn criteria(&self) -> MatchCriteria {
        match self.step_type {
            StepType::Page => MatchCriteria::Page,
            StepType::Event => MatchCriteria::Event {
                name: self.match_value.trim().to_string(),
            },
        }
    }
}

/// Streams a funnel is counted over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountBy {
    #[default]
    Session,
    Visitor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStepResult {
    /// 1-based.
    pub step_number: u32,
    pub step_name: String,
    pub visitor_count: u64,
    /// Percent of step-1 entrants that reached this step.
    pub conversion_rate: f64,
    /// Percent of the previous step's count lost at this step; 0 for step 1.
    pub dropoff_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelReport {
    pub funnel_id: Option<String>,
    pub name: Option<String>,
    pub window: ResolvedWindow,
    pub total_entered: u64,
    pub final_conversion_rate: f64,
    pub steps: Vec<FunnelStepResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFunnel {
    pub id: String,
    pub website_id: String,
    pub name: String,
    pub steps: Vec<FunnelStep>,
    pub created_at: String,
    pub updated_at: String,
}

pub fn validate_name(name: &str) -> Result<String, QueryError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(QueryError::validation("name", "name must not be empty"));
    }
    if trimmed.chars().count() > MAX_FUNNEL_NAME_LEN {
        return Err(QueryError::validation(
            "name",
            format!("name must be {MAX_FUNNEL_NAME_LEN} characters or fewer"),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_steps(steps: &[FunnelStep]) -> Result<(), QueryError> {
    if steps.len() < 2 {
        return Err(QueryError::validation(
            "steps",
            "a funnel needs at least 2 steps",
        ));
    }

    for (idx, step) in steps.iter().enumerate() {
        let position = idx + 1;
        if step.match_value.trim().is_empty() {
            return Err(QueryError::validation(
                "match_value",
                format!("step {position}: match value must not be empty"),
            ));
        }
        if step.match_value.chars().count() > MAX_MATCH_VALUE_LEN {
            return Err(QueryError::validation(
                "match_value",
                format!("step {position}: match value must be {MAX_MATCH_VALUE_LEN} characters or fewer"),
            ));
        }
        if let Some(name) = &step.name {
            if name.trim().is_empty() || name.chars().count() > MAX_STEP_NAME_LEN {
                return Err(QueryError::validation(
                    "name",
                    format!("step {position}: name must be 1-{MAX_STEP_NAME_LEN} characters"),
                ));
            }
        }
        match (&step.property_key, &step.property_value) {
            (None, None) => {}
            (Some(key), Some(_)) if !key.trim().is_empty() => {
                if step.step_type == StepType::Page {
                    return Err(QueryError::validation(
                        "property_key",
                        format!("step {position}: property filters apply to event steps only"),
                    ));
                }
            }
            _ => {
                return Err(QueryError::validation(
                    "property_key",
                    format!("step {position}: property key and value must be given together"),
                ));
            }
        }
    }
    Ok(())
}

/// A step with its page pattern compiled once per query.
struct StepMatcher<'a> {
    step: &'a FunnelStep,
    pattern: Option<PathPattern>,
}

impl<'a> StepMatcher<'a> {
    fn new(step: &'a FunnelStep) -> Self {
        let pattern = match step.step_type {
            StepType::Page => Some(PathPattern::parse(&step.match_value)),
            StepType::Event => None,
        };
        Self { step, pattern }
    }

    fn matches(&self, row: &EventRow) -> bool {
        match (&self.pattern, row.event_type) {
            (Some(pattern), EventType::Pageview) => pattern.matches(&row.url),
            (None, EventType::Event) => {
                if row.event_name.as_deref() != Some(self.step.match_value.trim()) {
                    return false;
                }
                match (&self.step.property_key, &self.step.property_value) {
                    (Some(key), Some(value)) => row.property(key).as_deref() == Some(value.as_str()),
                    _ => true,
                }
            }
            _ => false,
        }
    }
}

/// Per-step counts of streams that reached each step.
pub fn count_progress(steps: &[FunnelStep], rows: &[EventRow], count_by: CountBy) -> Vec<u64> {
    let matchers: Vec<StepMatcher<'_>> = steps.iter().map(StepMatcher::new).collect();

    let mut order: Vec<&str> = Vec::new();
    let mut streams: HashMap<&str, Vec<&EventRow>> = HashMap::new();
    for row in rows {
        let key = match count_by {
            CountBy::Session => row.session_id.as_str(),
            CountBy::Visitor => row.visitor_id.as_str(),
        };
        streams
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    let mut counts = vec![0u64; steps.len()];
    for key in order {
        let Some(stream) = streams.get_mut(key) else {
            continue;
        };
        stream.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        // Events sharing the previous match's timestamp stay eligible for the
        // next step; only the event already matched is consumed.
        let mut consumed = vec![false; stream.len()];
        let mut floor = 0;
        let mut reached = 0;
        while reached < matchers.len() {
            let Some(idx) = (floor..stream.len())
                .find(|&idx| !consumed[idx] && matchers[reached].matches(stream[idx]))
            else {
                break;
            };
            consumed[idx] = true;
            let matched_at = stream[idx].created_at;
            floor = stream.partition_point(|row| row.created_at < matched_at);
            reached += 1;
        }
        for count in counts.iter_mut().take(reached) {
            *count += 1;
        }
    }
    counts
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

pub fn compute_step_results(steps: &[FunnelStep], counts: &[u64]) -> Vec<FunnelStepResult> {
    let entered = counts.first().copied().unwrap_or(0);
    steps
        .iter()
        .enumerate()
        .map(|(idx, step)| {
            let reached = counts.get(idx).copied().unwrap_or(0);
            let dropoff_rate = if idx == 0 {
                0.0
            } else {
                let previous = counts.get(idx - 1).copied().unwrap_or(0);
                percent(previous.saturating_sub(reached), previous)
            };
            FunnelStepResult {
                step_number: (idx + 1) as u32,
                step_name: step.label().to_string(),
                visitor_count: reached,
                conversion_rate: percent(reached, entered),
                dropoff_rate,
            }
        })
        .collect()
}

fn conflict_to_validation(err: QueryError) -> QueryError {
    let QueryError::Store(inner) = err else {
        return err;
    };
    match inner.downcast_ref::<FunnelConflict>() {
        Some(FunnelConflict::DuplicateName) => {
            QueryError::validation("name", "a funnel with this name already exists")
        }
        Some(FunnelConflict::LimitExceeded { limit }) => QueryError::validation(
            "funnel",
            format!("funnel limit reached ({limit} per website)"),
        ),
        None => QueryError::Store(inner),
    }
}

#[derive(Clone)]
pub struct FunnelEngine {
    events: Arc<dyn EventStore>,
    funnels: Arc<dyn FunnelStore>,
    runner: QueryRunner,
    max_event_rows: usize,
    max_funnels: usize,
}

impl FunnelEngine {
    pub fn new(events: Arc<dyn EventStore>, funnels: Arc<dyn FunnelStore>, config: &Config) -> Self {
        Self {
            events,
            funnels,
            runner: QueryRunner::from_config(config),
            max_event_rows: config.max_event_rows,
            max_funnels: config.max_funnels_per_website,
        }
    }

    /// Share a runner (and its supersession registry) with other engines.
    pub fn with_runner(mut self, runner: QueryRunner) -> Self {
        self.runner = runner;
        self
    }

    pub async fn analyze(
        &self,
        website_id: &str,
        steps: &[FunnelStep],
        window: &ResolvedWindow,
        filter: &EventFilter,
    ) -> Result<Vec<FunnelStepResult>, QueryError> {
        self.analyze_by(website_id, steps, window, filter, CountBy::Session)
            .await
    }

    pub async fn analyze_by(
        &self,
        website_id: &str,
        steps: &[FunnelStep],
        window: &ResolvedWindow,
        filter: &EventFilter,
        count_by: CountBy,
    ) -> Result<Vec<FunnelStepResult>, QueryError> {
        validate_steps(steps)?;

        let mut criteria: Vec<MatchCriteria> = Vec::with_capacity(steps.len());
        for step in steps {
            let c = step.criteria();
            if !criteria.contains(&c) {
                criteria.push(c);
            }
        }
        let query = EventQuery::for_window(website_id, window, filter).with_criteria(criteria);
        let rows = self
            .runner
            .fetch_events(self.events.as_ref(), query, self.max_event_rows)
            .await?;

        let owned_steps = steps.to_vec();
        let counts = tokio::task::spawn_blocking(move || count_progress(&owned_steps, &rows, count_by))
            .await
            .map_err(|e| QueryError::Store(anyhow::anyhow!("funnel computation task failed: {e}")))?;
        tracing::debug!(
            website_id,
            steps = steps.len(),
            entered = counts.first().copied().unwrap_or(0),
            "funnel analyzed"
        );
        Ok(compute_step_results(steps, &counts))
    }

    /// Current and previous period, issued concurrently.
    pub async fn analyze_with_previous(
        &self,
        website_id: &str,
        steps: &[FunnelStep],
        window: &ResolvedWindow,
        filter: &EventFilter,
    ) -> Compared<Vec<FunnelStepResult>> {
        let previous_window = window.previous_period();
        let current = self.analyze(website_id, steps, window, filter);
        let previous = async {
            match &previous_window {
                Some(previous) => Some(self.analyze(website_id, steps, previous, filter).await),
                None => None,
            }
        };
        let (current, previous) = tokio::join!(current, previous);
        Compared { current, previous }
    }

    /// Like [`analyze`](Self::analyze), superseding any in-flight call made
    /// under the same `identity`.
    pub async fn analyze_tracked(
        &self,
        identity: &str,
        website_id: &str,
        steps: &[FunnelStep],
        window: &ResolvedWindow,
        filter: &EventFilter,
    ) -> Result<Vec<FunnelStepResult>, QueryError> {
        self.runner
            .run_tracked(identity, self.analyze(website_id, steps, window, filter))
            .await
    }

    /// Persist a funnel definition without analyzing it. Updates in place
    /// when `existing_id` is given.
    pub async fn save(
        &self,
        website_id: &str,
        name: &str,
        steps: Vec<FunnelStep>,
        existing_id: Option<&str>,
    ) -> Result<SavedFunnel, QueryError> {
        let name = validate_name(name)?;
        validate_steps(&steps)?;
        let draft = FunnelDraft { name, steps };

        let saved = match existing_id {
            Some(funnel_id) => self
                .runner
                .run(
                    "update_funnel",
                    self.funnels.update_funnel(website_id, funnel_id, &draft),
                )
                .await
                .map_err(conflict_to_validation)?
                .ok_or_else(|| QueryError::not_found("funnel", funnel_id))?,
            None => self
                .runner
                .run(
                    "create_funnel",
                    self.funnels
                        .create_funnel(website_id, &draft, self.max_funnels),
                )
                .await
                .map_err(conflict_to_validation)?,
        };

        tracing::info!(
            website_id,
            funnel_id = %saved.id,
            steps = saved.steps.len(),
            updated = existing_id.is_some(),
            "funnel saved"
        );
        Ok(saved)
    }

    pub async fn delete(&self, website_id: &str, funnel_id: &str) -> Result<(), QueryError> {
        let deleted = self
            .runner
            .run(
                "delete_funnel",
                self.funnels.delete_funnel(website_id, funnel_id),
            )
            .await?;
        if !deleted {
            return Err(QueryError::not_found("funnel", funnel_id));
        }
        tracing::info!(website_id, funnel_id, "funnel deleted");
        Ok(())
    }

    pub async fn get(&self, website_id: &str, funnel_id: &str) -> Result<SavedFunnel, QueryError> {
        self.runner
            .run("get_funnel", self.funnels.get_funnel(website_id, funnel_id))
            .await?
            .ok_or_else(|| QueryError::not_found("funnel", funnel_id))
    }

    pub async fn list(&self, website_id: &str) -> Result<Vec<SavedFunnel>, QueryError> {
        self.runner
            .run("list_funnels", self.funnels.list_funnels(website_id))
            .await
    }

    pub async fn analyze_saved(
        &self,
        website_id: &str,
        funnel_id: &str,
        window: &ResolvedWindow,
        filter: &EventFilter,
    ) -> Result<FunnelReport, QueryError> {
        let funnel = self.get(website_id, funnel_id).await?;
        let steps = self
            .analyze(website_id, &funnel.steps, window, filter)
            .await?;
        let total_entered = steps.first().map_or(0, |s| s.visitor_count);
        let final_conversion_rate = steps.last().map_or(0.0, |s| s.conversion_rate);
        Ok(FunnelReport {
            funnel_id: Some(funnel.id),
            name: Some(funnel.name),
            window: window.clone(),
            total_entered,
            final_conversion_rate,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::event::Event;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid instant")
            + Duration::minutes(minute)
    }

    fn page(session: &str, url: &str, minute: i64) -> EventRow {
        EventRow::from(&Event::pageview("site_1", session, &format!("v_{session}"), url, at(minute)))
    }

    fn custom(session: &str, name: &str, minute: i64) -> EventRow {
        EventRow::from(&Event::custom("site_1", session, &format!("v_{session}"), name, at(minute)))
    }

    fn signup_funnel() -> Vec<FunnelStep> {
        vec![
            FunnelStep::page("/"),
            FunnelStep::page("/pricing"),
            FunnelStep::event("signup_completed").named("Signed up"),
        ]
    }

    #[test]
    fn rejects_funnels_with_fewer_than_two_steps() {
        let err = validate_steps(&[FunnelStep::page("/")]).expect_err("one step");
        assert!(matches!(err, QueryError::Validation { field: "steps", .. }));
        assert!(validate_steps(&[]).is_err());
    }

    #[test]
    fn rejects_blank_or_oversized_criteria() {
        let blank = vec![FunnelStep::page("/"), FunnelStep::event("   ")];
        assert!(matches!(
            validate_steps(&blank),
            Err(QueryError::Validation { field: "match_value", .. })
        ));

        let long = vec![FunnelStep::page("/"), FunnelStep::page(&"a".repeat(501))];
        assert!(validate_steps(&long).is_err());

        let long_name = vec![
            FunnelStep::page("/").named(&"n".repeat(121)),
            FunnelStep::page("/pricing"),
        ];
        assert!(validate_steps(&long_name).is_err());
    }

    #[test]
    fn property_filters_must_be_paired_and_on_event_steps() {
        let mut half = FunnelStep::event("purchase");
        half.property_key = Some("plan".to_string());
        assert!(validate_steps(&[FunnelStep::page("/"), half]).is_err());

        let on_page = FunnelStep::page("/pricing").with_property("plan", "pro");
        assert!(validate_steps(&[FunnelStep::page("/"), on_page]).is_err());

        let ok = FunnelStep::event("purchase").with_property("plan", "pro");
        assert!(validate_steps(&[FunnelStep::page("/"), ok]).is_ok());
    }

    #[test]
    fn funnel_names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("  Signup  ").ok().as_deref(), Some("Signup"));
        assert!(validate_name(" ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn order_matters_within_a_session() {
        let rows = vec![
            // s1 follows the funnel in order.
            page("s1", "/", 0),
            page("s1", "/pricing", 1),
            custom("s1", "signup_completed", 2),
            // s2 signs up before viewing pricing: only step 1 counts.
            page("s2", "/", 0),
            custom("s2", "signup_completed", 1),
            page("s2", "/pricing", 2),
            // s3 never hits the entry page.
            page("s3", "/pricing", 0),
            custom("s3", "signup_completed", 1),
        ];
        let counts = count_progress(&signup_funnel(), &rows, CountBy::Session);
        assert_eq!(counts, vec![2, 1, 1]);
    }

    #[test]
    fn later_steps_may_skip_intermediate_events() {
        let rows = vec![
            page("s1", "/", 0),
            page("s1", "/blog/post", 1),
            page("s1", "/about", 2),
            page("s1", "/pricing?ref=blog", 3),
            custom("s1", "newsletter", 4),
            custom("s1", "signup_completed", 5),
        ];
        assert_eq!(
            count_progress(&signup_funnel(), &rows, CountBy::Session),
            vec![1, 1, 1]
        );
    }

    #[test]
    fn one_event_satisfies_at_most_one_step() {
        let steps = vec![FunnelStep::page("/pricing"), FunnelStep::page("/pricing")];
        let once = vec![page("s1", "/pricing", 0)];
        assert_eq!(count_progress(&steps, &once, CountBy::Session), vec![1, 0]);

        let twice = vec![page("s1", "/pricing", 0), page("s1", "/pricing", 1)];
        assert_eq!(count_progress(&steps, &twice, CountBy::Session), vec![1, 1]);
    }

    #[test]
    fn rows_are_reordered_by_time_within_a_stream() {
        let rows = vec![
            page("s1", "/pricing", 5),
            page("s1", "/", 1),
            custom("s1", "signup_completed", 9),
        ];
        assert_eq!(
            count_progress(&signup_funnel(), &rows, CountBy::Session),
            vec![1, 1, 1]
        );
    }

    #[test]
    fn same_instant_events_advance_regardless_of_id_order() {
        let steps = vec![FunnelStep::page("/"), FunnelStep::page("/pricing")];
        let mut landing = page("s1", "/", 3);
        landing.id = "b".to_string();
        let mut pricing = page("s1", "/pricing", 3);
        pricing.id = "a".to_string();
        let rows = vec![landing, pricing];
        assert_eq!(count_progress(&steps, &rows, CountBy::Session), vec![1, 1]);

        let repeated = vec![FunnelStep::page("/"), FunnelStep::page("/")];
        let single = vec![page("s2", "/", 3)];
        assert_eq!(count_progress(&repeated, &single, CountBy::Session), vec![1, 0]);

        // An earlier event never satisfies a later step.
        let reversed = vec![page("s3", "/pricing", 1), page("s3", "/", 2)];
        assert_eq!(count_progress(&steps, &reversed, CountBy::Session), vec![1, 0]);
    }

    #[test]
    fn wildcard_steps_and_property_filters() {
        let steps = vec![
            FunnelStep::page("/blog/*"),
            FunnelStep::event("purchase").with_property("plan", "pro"),
        ];
        let mut basic = custom("s1", "purchase", 2);
        basic.event_data = Some(json!({ "plan": "basic" }).to_string());
        let mut pro = custom("s2", "purchase", 2);
        pro.event_data = Some(json!({ "plan": "pro" }).to_string());
        let rows = vec![
            page("s1", "/blog/launch", 0),
            basic,
            page("s2", "https://example.com/Blog/Launch/", 0),
            pro,
            page("s3", "/blog/2024/launch", 0),
        ];
        assert_eq!(count_progress(&steps, &rows, CountBy::Session), vec![2, 1]);
    }

    #[test]
    fn visitor_counting_joins_sessions_of_one_visitor() {
        let mut first = page("s1", "/", 0);
        first.visitor_id = "v_1".to_string();
        let mut second = page("s2", "/pricing", 60);
        second.visitor_id = "v_1".to_string();
        let rows = vec![first, second];
        let steps = vec![FunnelStep::page("/"), FunnelStep::page("/pricing")];

        assert_eq!(count_progress(&steps, &rows, CountBy::Session), vec![1, 0]);
        assert_eq!(count_progress(&steps, &rows, CountBy::Visitor), vec![1, 1]);
    }

    #[test]
    fn step_results_report_conversion_and_dropoff_percentages() {
        let results = compute_step_results(&signup_funnel(), &[1000, 400, 50]);
        let summary: Vec<(u32, u64, f64, f64)> = results
            .iter()
            .map(|r| (r.step_number, r.visitor_count, r.conversion_rate, r.dropoff_rate))
            .collect();
        assert_eq!(
            summary,
            vec![(1, 1000, 100.0, 0.0), (2, 400, 40.0, 60.0), (3, 50, 5.0, 87.5)]
        );
        assert_eq!(results[0].step_name, "/");
        assert_eq!(results[2].step_name, "Signed up");
    }

    #[test]
    fn zero_entrants_yield_zero_rates_not_nan() {
        let results = compute_step_results(&signup_funnel(), &[0, 0, 0]);
        for result in results {
            assert_eq!(result.visitor_count, 0);
            assert_eq!(result.conversion_rate, 0.0);
            assert_eq!(result.dropoff_rate, 0.0);
        }
    }

    #[test]
    fn funnel_step_json_uses_snake_case_and_omits_empty_options() {
        let step = FunnelStep::event("purchase").with_property("plan", "pro");
        let value = serde_json::to_value(&step).expect("json");
        assert_eq!(
            value,
            json!({
                "step_type": "event",
                "match_value": "purchase",
                "property_key": "plan",
                "property_value": "pro"
            })
        );
        let parsed: FunnelStep =
            serde_json::from_value(json!({ "step_type": "page", "match_value": "/" }))
                .expect("parse");
        assert_eq!(parsed, FunnelStep::page("/"));
    }
}
