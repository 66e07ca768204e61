use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use tidemark_core::config::Config;
use tidemark_core::filter::EventFilter;
use tidemark_core::journey::JourneyAggregator;
use tidemark_core::time_range::{resolve_at, TimeSpec};
use tidemark_duckdb::DuckDbBackend;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0)
        .single()
        .expect("valid instant")
}

fn june_first() -> TimeSpec {
    TimeSpec::Day {
        date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"),
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_event(
    db: &DuckDbBackend,
    event_id: &str,
    session_id: &str,
    event_type: &str,
    url: &str,
    event_name: Option<&str>,
    country: &str,
    created_at: &str,
) {
    let conn = db.conn_for_test().await;
    conn.execute(
        r#"
        INSERT INTO events (
            id, website_id, session_id, visitor_id, event_type, url,
            referrer_domain, event_name, event_data, country,
            browser, os, device_type, language,
            utm_source, utm_medium, utm_campaign, created_at
        ) VALUES (
            ?1, 'site_1', ?2, ?3, ?4, ?5,
            NULL, ?6, NULL, ?7,
            'Chrome', 'macOS', 'desktop', 'en-US',
            NULL, NULL, NULL, CAST(?8 AS TIMESTAMP)
        )
        "#,
        tidemark_duckdb::duckdb::params![
            event_id,
            session_id,
            format!("visitor_{session_id}"),
            event_type,
            url,
            event_name,
            country,
            created_at
        ],
    )
    .expect("insert event");
}

#[tokio::test]
async fn journeys_rank_paths_from_duckdb_rows() {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("db"));
    for i in 0..400 {
        let session = format!("s{i:03}");
        let next = if i % 4 == 3 { "/docs/" } else { "/Pricing?plan=pro" };
        let minute = i % 60;
        insert_event(
            &db,
            &format!("{session}_a"),
            &session,
            "pageview",
            "/",
            None,
            "US",
            &format!("2024-06-01 10:{minute:02}:00"),
        )
        .await;
        insert_event(
            &db,
            &format!("{session}_b"),
            &session,
            "pageview",
            next,
            None,
            "US",
            &format!("2024-06-01 10:{minute:02}:30"),
        )
        .await;
    }

    let window = resolve_at(&june_first(), Tz::UTC, now()).expect("window");
    let journeys = JourneyAggregator::new(db, &Config::default());
    let paths = journeys
        .aggregate("site_1", &window, 2, 10, &EventFilter::default())
        .await
        .expect("aggregate");

    let summary: Vec<(Vec<String>, u64, f64)> = paths
        .into_iter()
        .map(|j| (j.path, j.count, j.percentage))
        .collect();
    assert_eq!(
        summary,
        vec![
            (vec!["/".to_string(), "/pricing".to_string()], 300, 75.0),
            (vec!["/".to_string(), "/docs".to_string()], 100, 25.0),
        ]
    );
}

#[tokio::test]
async fn journeys_mix_pages_and_custom_events() {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("db"));
    insert_event(&db, "e1", "s1", "pageview", "/", None, "US", "2024-06-01 09:00:00").await;
    insert_event(&db, "e2", "s1", "event", "", Some("cta_click"), "US", "2024-06-01 09:00:10").await;
    insert_event(&db, "e3", "s1", "pageview", "/signup", None, "US", "2024-06-01 09:00:20").await;
    insert_event(&db, "e4", "s2", "pageview", "/", None, "DE", "2024-06-01 09:05:00").await;
    insert_event(&db, "e5", "s2", "pageview", "/about", None, "DE", "2024-06-01 09:05:10").await;
    // Single-step session never forms a path.
    insert_event(&db, "e6", "s3", "pageview", "/", None, "US", "2024-06-01 09:06:00").await;

    let window = resolve_at(&june_first(), Tz::UTC, now()).expect("window");
    let journeys = JourneyAggregator::new(db, &Config::default());

    let paths = journeys
        .aggregate("site_1", &window, 2, 10, &EventFilter::default())
        .await
        .expect("aggregate");
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].path, vec!["/", "cta_click"]);
    assert_eq!(paths[1].path, vec!["/", "/about"]);
    assert_eq!(paths[0].percentage, 50.0);

    let filter = EventFilter {
        country: Some("DE".to_string()),
        ..Default::default()
    };
    let german = journeys
        .aggregate("site_1", &window, 2, 10, &filter)
        .await
        .expect("aggregate");
    assert_eq!(german.len(), 1);
    assert_eq!(german[0].path, vec!["/", "/about"]);
    assert_eq!(german[0].percentage, 100.0);

    let longer = journeys
        .aggregate("site_1", &window, 3, 10, &EventFilter::default())
        .await
        .expect("aggregate");
    assert_eq!(longer.len(), 1);
    assert_eq!(longer[0].path, vec!["/", "cta_click", "/signup"]);
}

#[tokio::test]
async fn all_time_window_has_no_previous_period() {
    let db = Arc::new(DuckDbBackend::open_in_memory().expect("db"));
    insert_event(&db, "e1", "s1", "pageview", "/", None, "US", "2019-03-01 09:00:00").await;
    insert_event(&db, "e2", "s1", "pageview", "/blog", None, "US", "2019-03-01 09:01:00").await;

    let window = resolve_at(&TimeSpec::AllTime, Tz::UTC, now()).expect("window");
    let journeys = JourneyAggregator::new(db, &Config::default());
    let compared = journeys
        .aggregate_with_previous("site_1", &window, 2, 5, &EventFilter::default())
        .await;
    let current = compared.current.expect("current");
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].count, 1);
    assert!(compared.previous.is_none());
}
