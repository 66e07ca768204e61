use anyhow::{anyhow, Result};
use duckdb::Error;

use tidemark_core::funnel::{FunnelStep, SavedFunnel, StepType};
use tidemark_core::store::{generate_funnel_id, FunnelConflict, FunnelDraft};

use crate::backend::rand_hex;
use crate::DuckDbBackend;

fn generate_funnel_step_id() -> String {
    format!("fstep_{}", rand_hex(8))
}

fn is_duplicate_name_constraint(error: &Error) -> bool {
    let message = error.to_string();
    (message.contains("UNIQUE constraint failed") || message.contains("Duplicate key"))
        && (message.contains("funnels.website_id")
            || message.contains("idx_funnels_website_name")
            || message.contains("website_id"))
}

fn load_funnel_steps(conn: &duckdb::Connection, funnel_id: &str) -> Result<Vec<FunnelStep>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            step_type,
            match_value,
            name,
            property_key,
            property_value
        FROM funnel_steps
        WHERE funnel_id = ?1
        ORDER BY step_order ASC
        "#,
    )?;

    let rows = stmt.query_map(duckdb::params![funnel_id], |row| {
        let step_type_raw: String = row.get(0)?;
        Ok(FunnelStep {
            step_type: StepType::parse(&step_type_raw).map_err(|_| duckdb::Error::InvalidQuery)?,
            match_value: row.get(1)?,
            name: row.get(2)?,
            property_key: row.get(3)?,
            property_value: row.get(4)?,
        })
    })?;

    let mut steps = Vec::new();
    for row in rows {
        steps.push(row?);
    }
    Ok(steps)
}

fn insert_funnel_steps(
    tx: &duckdb::Transaction<'_>,
    funnel_id: &str,
    steps: &[FunnelStep],
) -> Result<()> {
    for (idx, step) in steps.iter().enumerate() {
        tx.execute(
            r#"
            INSERT INTO funnel_steps (
                id,
                funnel_id,
                step_order,
                step_type,
                match_value,
                name,
                property_key,
                property_value,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)
            "#,
            duckdb::params![
                generate_funnel_step_id(),
                funnel_id,
                (idx + 1) as i64,
                step.step_type.as_str(),
                &step.match_value,
                &step.name,
                &step.property_key,
                &step.property_value,
            ],
        )?;
    }
    Ok(())
}

fn get_funnel_with_conn(
    conn: &duckdb::Connection,
    website_id: &str,
    funnel_id: &str,
) -> Result<Option<SavedFunnel>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            id,
            website_id,
            name,
            CAST(created_at AS VARCHAR),
            CAST(updated_at AS VARCHAR)
        FROM funnels
        WHERE website_id = ?1 AND id = ?2
        "#,
    )?;

    let row = match stmt.query_row(duckdb::params![website_id, funnel_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    }) {
        Ok(row) => Some(row),
        Err(Error::QueryReturnedNoRows) => None,
        Err(error) => return Err(error.into()),
    };

    let Some((id, website_id, name, created_at, updated_at)) = row else {
        return Ok(None);
    };

    let steps = load_funnel_steps(conn, &id)?;
    Ok(Some(SavedFunnel {
        id,
        website_id,
        name,
        steps,
        created_at,
        updated_at,
    }))
}

pub async fn list_funnels_inner(db: &DuckDbBackend, website_id: &str) -> Result<Vec<SavedFunnel>> {
    let conn = db.conn.lock().await;
    let mut stmt = conn.prepare(
        r#"
        SELECT
            id,
            website_id,
            name,
            CAST(created_at AS VARCHAR),
            CAST(updated_at AS VARCHAR)
        FROM funnels
        WHERE website_id = ?1
        ORDER BY created_at DESC, id DESC
        "#,
    )?;

    let rows = stmt.query_map(duckdb::params![website_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut funnels = Vec::new();
    for row in rows {
        let (id, website_id, name, created_at, updated_at) = row?;
        let steps = load_funnel_steps(&conn, &id)?;
        funnels.push(SavedFunnel {
            id,
            website_id,
            name,
            steps,
            created_at,
            updated_at,
        });
    }
    Ok(funnels)
}

pub async fn get_funnel_inner(
    db: &DuckDbBackend,
    website_id: &str,
    funnel_id: &str,
) -> Result<Option<SavedFunnel>> {
    let conn = db.conn.lock().await;
    get_funnel_with_conn(&conn, website_id, funnel_id)
}

pub async fn create_funnel_inner(
    db: &DuckDbBackend,
    website_id: &str,
    draft: &FunnelDraft,
    limit: usize,
) -> Result<SavedFunnel> {
    let mut conn = db.conn.lock().await;

    let funnel_id = generate_funnel_id();
    let tx = conn.transaction()?;
    let count: i64 = tx
        .prepare("SELECT COUNT(*) FROM funnels WHERE website_id = ?1")?
        .query_row(duckdb::params![website_id], |row| row.get(0))?;
    if count >= limit as i64 {
        return Err(FunnelConflict::LimitExceeded { limit }.into());
    }

    let duplicate_count: i64 = tx
        .prepare("SELECT COUNT(*) FROM funnels WHERE website_id = ?1 AND name = ?2")?
        .query_row(duckdb::params![website_id, &draft.name], |row| row.get(0))?;
    if duplicate_count > 0 {
        return Err(FunnelConflict::DuplicateName.into());
    }

    if let Err(error) = tx.execute(
        r#"
        INSERT INTO funnels (
            id,
            website_id,
            name,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
        duckdb::params![&funnel_id, website_id, &draft.name],
    ) {
        if is_duplicate_name_constraint(&error) {
            return Err(FunnelConflict::DuplicateName.into());
        }
        return Err(error.into());
    }

    insert_funnel_steps(&tx, &funnel_id, &draft.steps)?;
    tx.commit()?;

    get_funnel_with_conn(&conn, website_id, &funnel_id)?
        .ok_or_else(|| anyhow!("failed to load created funnel"))
}

pub async fn update_funnel_inner(
    db: &DuckDbBackend,
    website_id: &str,
    funnel_id: &str,
    draft: &FunnelDraft,
) -> Result<Option<SavedFunnel>> {
    let mut conn = db.conn.lock().await;
    let current_name = match conn
        .prepare("SELECT name FROM funnels WHERE website_id = ?1 AND id = ?2")?
        .query_row(duckdb::params![website_id, funnel_id], |row| {
            row.get::<_, String>(0)
        }) {
        Ok(name) => name,
        Err(Error::QueryReturnedNoRows) => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    let duplicate_count: i64 = conn
        .prepare("SELECT COUNT(*) FROM funnels WHERE website_id = ?1 AND name = ?2 AND id != ?3")?
        .query_row(duckdb::params![website_id, &draft.name, funnel_id], |row| {
            row.get(0)
        })?;
    if duplicate_count > 0 {
        return Err(FunnelConflict::DuplicateName.into());
    }

    let tx = conn.transaction()?;
    if current_name == draft.name {
        tx.execute(
            "UPDATE funnels SET updated_at = CURRENT_TIMESTAMP WHERE website_id = ?1 AND id = ?2",
            duckdb::params![website_id, funnel_id],
        )?;
    } else if let Err(error) = tx.execute(
        "UPDATE funnels SET name = ?1, updated_at = CURRENT_TIMESTAMP WHERE website_id = ?2 AND id = ?3",
        duckdb::params![&draft.name, website_id, funnel_id],
    ) {
        if is_duplicate_name_constraint(&error) {
            return Err(FunnelConflict::DuplicateName.into());
        }
        return Err(error.into());
    }

    tx.execute(
        "DELETE FROM funnel_steps WHERE funnel_id = ?1",
        duckdb::params![funnel_id],
    )?;
    insert_funnel_steps(&tx, funnel_id, &draft.steps)?;
    tx.commit()?;

    get_funnel_with_conn(&conn, website_id, funnel_id)
}

pub async fn delete_funnel_inner(
    db: &DuckDbBackend,
    website_id: &str,
    funnel_id: &str,
) -> Result<bool> {
    let mut conn = db.conn.lock().await;
    let tx = conn.transaction()?;

    let exists: i64 = tx
        .prepare("SELECT COUNT(*) FROM funnels WHERE website_id = ?1 AND id = ?2")?
        .query_row(duckdb::params![website_id, funnel_id], |row| row.get(0))?;
    if exists == 0 {
        return Ok(false);
    }

    tx.execute(
        "DELETE FROM funnel_steps WHERE funnel_id = ?1",
        duckdb::params![funnel_id],
    )?;
    tx.execute(
        "DELETE FROM funnels WHERE website_id = ?1 AND id = ?2",
        duckdb::params![website_id, funnel_id],
    )?;
    tx.commit()?;
    Ok(true)
}
