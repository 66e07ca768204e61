use std::sync::Arc;

use anyhow::Result;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use tidemark_core::config::Config;
use tidemark_core::event::Event;

use crate::schema::init_sql;

/// Random hex string of `n` bytes (2n hex chars).
pub(crate) fn rand_hex(n: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Naive-UTC text form DuckDB casts to `TIMESTAMP`.
pub(crate) fn sql_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// A DuckDB store for events and saved funnels.
///
/// DuckDB is single-writer, so the connection sits behind `Arc<Mutex<_>>`;
/// the struct is cheap to share across tasks.
///
/// Memory and thread limits are applied by [`init_sql`] at open time.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"1GB"` or `"512MB"`.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        info!(path, memory_limit, threads = 2, "DuckDB opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open `tidemark.db` under `config.data_dir`, creating the directory.
    pub fn open_from_config(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let db_path = format!("{}/tidemark.db", config.data_dir);
        Self::open(&db_path, &config.duckdb_memory_limit)
    }

    /// Open an in-memory database. Data is discarded on drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a batch of events in a single transaction. No-op when empty.
    pub async fn insert_events(&self, events: &[Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        for event in events {
            tx.execute(
                r#"INSERT INTO events (
                    id, website_id, session_id, visitor_id,
                    event_type, url, referrer_domain,
                    event_name, event_data,
                    country, browser, os, device_type, language,
                    utm_source, utm_medium, utm_campaign,
                    created_at
                ) VALUES (
                    ?1,  ?2,  ?3,  ?4,
                    ?5,  ?6,  ?7,
                    ?8,  ?9,
                    ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17,
                    CAST(?18 AS TIMESTAMP)
                )"#,
                duckdb::params![
                    event.id,
                    event.website_id,
                    event.session_id,
                    event.visitor_id,
                    event.event_type.as_str(),
                    event.url,
                    event.referrer_domain,
                    event.event_name,
                    event.event_data,
                    event.country,
                    event.browser,
                    event.os,
                    event.device_type,
                    event.language,
                    event.utm_source,
                    event.utm_medium,
                    event.utm_campaign,
                    sql_timestamp(event.created_at),
                ],
            )?;
        }

        tx.commit()?;
        info!(count = events.len(), "Inserted events into DuckDB");
        Ok(())
    }

    /// `SELECT 1` liveness check.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    /// Direct connection access for integration-test fixtures.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
