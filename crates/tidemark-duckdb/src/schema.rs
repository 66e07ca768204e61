/// DuckDB initialization SQL.
///
/// Executed once at open time via `Connection::execute_batch`. Every statement
/// uses `IF NOT EXISTS`, so re-running on each startup is safe.
///
/// `memory_limit` comes from `Config.duckdb_memory_limit`
/// (env `TIDEMARK_DUCKDB_MEMORY`, default `"1GB"`). Always set an explicit
/// limit: DuckDB otherwise claims 80% of system RAM.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- EVENTS
-- ===========================================
CREATE TABLE IF NOT EXISTS events (
    id              VARCHAR PRIMARY KEY,
    website_id      VARCHAR NOT NULL,
    session_id      VARCHAR NOT NULL,
    visitor_id      VARCHAR NOT NULL,
    event_type      VARCHAR NOT NULL,              -- 'pageview' | 'event'
    url             VARCHAR NOT NULL,
    referrer_domain VARCHAR,
    event_name      VARCHAR,
    event_data      VARCHAR,                       -- JSON object of custom properties

    country         VARCHAR,
    browser         VARCHAR,
    os              VARCHAR,
    device_type     VARCHAR,                       -- 'desktop' | 'mobile' | 'tablet'
    language        VARCHAR,

    utm_source      VARCHAR,
    utm_medium      VARCHAR,
    utm_campaign    VARCHAR,

    created_at      TIMESTAMP NOT NULL             -- UTC
);

-- Primary query pattern: website + time window
CREATE INDEX IF NOT EXISTS idx_events_website_time
    ON events(website_id, created_at);

-- Session-ordered streams for funnels and journeys
CREATE INDEX IF NOT EXISTS idx_events_website_session_time
    ON events(website_id, session_id, created_at);

-- Event-step prefilter
CREATE INDEX IF NOT EXISTS idx_events_name_date
    ON events(website_id, event_type, event_name, created_at);

-- ===========================================
-- FUNNELS
-- ===========================================
CREATE TABLE IF NOT EXISTS funnels (
    id              VARCHAR PRIMARY KEY,           -- 'fun_' + 21 base-36 chars
    website_id      VARCHAR NOT NULL,
    name            VARCHAR NOT NULL,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_funnels_website
    ON funnels(website_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_funnels_website_name
    ON funnels(website_id, name);

CREATE TABLE IF NOT EXISTS funnel_steps (
    id              VARCHAR PRIMARY KEY,
    funnel_id       VARCHAR NOT NULL,
    step_order      INTEGER NOT NULL,              -- 1-based
    step_type       VARCHAR NOT NULL,              -- 'page' | 'event'
    match_value     VARCHAR NOT NULL,
    name            VARCHAR,
    property_key    VARCHAR,
    property_value  VARCHAR,
    created_at      TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_funnel_steps_funnel_order
    ON funnel_steps(funnel_id, step_order);
"#
    )
}
