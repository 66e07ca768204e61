use anyhow::{anyhow, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};

use tidemark_core::event::{EventRow, EventType};
use tidemark_core::filter::EventFilter;
use tidemark_core::store::{EventQuery, MatchCriteria};

use crate::backend::sql_timestamp;
use crate::DuckDbBackend;

fn push_param(
    sql: &mut String,
    clause: &str,
    value: &str,
    params: &mut Vec<Box<dyn duckdb::types::ToSql + Send>>,
    param_idx: &mut usize,
) {
    sql.push_str(&clause.replace("{}", &format!("?{}", *param_idx)));
    params.push(Box::new(value.to_string()));
    *param_idx += 1;
}

pub(crate) fn append_event_filters(
    filter: &EventFilter,
    filter_sql: &mut String,
    params: &mut Vec<Box<dyn duckdb::types::ToSql + Send>>,
    param_idx: &mut usize,
) {
    let exact = [
        ("e.country", &filter.country),
        ("e.referrer_domain", &filter.referrer),
        ("e.browser", &filter.browser),
        ("e.os", &filter.os),
        ("e.device_type", &filter.device),
        ("e.language", &filter.language),
        ("e.utm_source", &filter.utm_source),
        ("e.utm_medium", &filter.utm_medium),
        ("e.utm_campaign", &filter.utm_campaign),
    ];
    for (column, value) in exact {
        if let Some(value) = value {
            push_param(
                filter_sql,
                &format!(" AND {column} = {{}}"),
                value,
                params,
                param_idx,
            );
        }
    }
    if let Some(ref page) = filter.page {
        push_param(
            filter_sql,
            " AND position({} in e.url) > 0",
            page,
            params,
            param_idx,
        );
    }
    if let Some(ref hostname) = filter.hostname {
        push_param(
            filter_sql,
            " AND lower(regexp_extract(e.url, '^https?://([^/:?#]+)', 1)) = lower({})",
            hostname,
            params,
            param_idx,
        );
    }
}

/// Any-of prefilter over the step criteria. Empty criteria add nothing.
pub(crate) fn append_criteria(
    criteria: &[MatchCriteria],
    filter_sql: &mut String,
    params: &mut Vec<Box<dyn duckdb::types::ToSql + Send>>,
    param_idx: &mut usize,
) {
    if criteria.is_empty() {
        return;
    }
    let mut names = Vec::new();
    let mut any_page = false;
    for c in criteria {
        match c {
            MatchCriteria::Page => any_page = true,
            MatchCriteria::Event { name } => names.push(name.as_str()),
        }
    }

    let mut branches = Vec::new();
    if any_page {
        branches.push("e.event_type = 'pageview'".to_string());
    }
    if !names.is_empty() {
        let placeholders: Vec<String> = names
            .iter()
            .map(|name| {
                let placeholder = format!("?{}", *param_idx);
                params.push(Box::new(name.to_string()));
                *param_idx += 1;
                placeholder
            })
            .collect();
        branches.push(format!(
            "(e.event_type = 'event' AND e.event_name IN ({}))",
            placeholders.join(", ")
        ));
    }
    filter_sql.push_str(&format!(" AND ({})", branches.join(" OR ")));
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| anyhow!("invalid_datetime: {raw}"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

pub(crate) fn build_events_query(
    query: &EventQuery,
) -> (String, Vec<Box<dyn duckdb::types::ToSql + Send>>) {
    let mut params: Vec<Box<dyn duckdb::types::ToSql + Send>> = vec![
        Box::new(query.website_id.clone()),
        Box::new(sql_timestamp(query.end)),
    ];
    let mut param_idx = 3;
    let mut filter_sql = String::new();

    if let Some(start) = query.start {
        push_param(
            &mut filter_sql,
            " AND e.created_at >= CAST({} AS TIMESTAMP)",
            &sql_timestamp(start),
            &mut params,
            &mut param_idx,
        );
    }
    append_criteria(&query.criteria, &mut filter_sql, &mut params, &mut param_idx);
    append_event_filters(&query.filter, &mut filter_sql, &mut params, &mut param_idx);

    let limit_sql = query
        .limit
        .map(|limit| format!("\n        LIMIT {limit}"))
        .unwrap_or_default();

    let sql = format!(
        r#"
        SELECT
            e.id,
            e.session_id,
            e.visitor_id,
            e.event_type,
            e.url,
            e.event_name,
            e.event_data,
            CAST(e.created_at AS VARCHAR)
        FROM events e
        WHERE e.website_id = ?1
          AND e.created_at < CAST(?2 AS TIMESTAMP)
          {filter_sql}
        ORDER BY e.session_id ASC, e.created_at ASC, e.id ASC{limit_sql}
        "#
    );
    (sql, params)
}

/// Session-ordered rows for the funnel and journey engines. Runs on the
/// blocking pool; the scan can be long for wide windows.
pub async fn query_events_inner(db: &DuckDbBackend, query: &EventQuery) -> Result<Vec<EventRow>> {
    let (sql, params) = build_events_query(query);
    let conn = db.conn.clone();

    tokio::task::spawn_blocking(move || -> Result<Vec<EventRow>> {
        let conn = conn.blocking_lock();
        let param_refs: Vec<&dyn duckdb::types::ToSql> =
            params.iter().map(|p| p.as_ref() as &dyn duckdb::types::ToSql).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, session_id, visitor_id, event_type, url, event_name, event_data, created_at) =
                row?;
            out.push(EventRow {
                id,
                session_id,
                visitor_id,
                event_type: EventType::parse(&event_type)?,
                url,
                event_name,
                event_data,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(out)
    })
    .await
    .map_err(|e| anyhow!("event query task failed: {e}"))?
}
