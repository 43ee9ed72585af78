use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::types::{AgentRecord, ExecutionRecord, ExecutionStatus, LogEntry, LogLevel};
use super::{Store, new_id, now_millis};

const EXECUTION_COLUMNS: &str = "id, owner_id, agent_id, agent_name, execution_id, start_time, \
     end_time, status, duration_ms, output, error";

pub const START_MESSAGE: &str = "Agent execution started";
pub const PROCESSING_MESSAGE: &str = "Processing agent workflow";
pub const SUCCESS_MESSAGE: &str = "Agent execution completed successfully";

/// The single terminal outcome applied to a running record.
#[derive(Debug, Clone)]
pub enum Completion {
    Succeeded(serde_json::Value),
    Failed(String),
}

impl Completion {
    fn status(&self) -> ExecutionStatus {
        match self {
            Completion::Succeeded(_) => ExecutionStatus::Completed,
            Completion::Failed(_) => ExecutionStatus::Failed,
        }
    }

    fn terminal_entry(&self) -> (LogLevel, String) {
        match self {
            Completion::Succeeded(_) => (LogLevel::Success, SUCCESS_MESSAGE.to_string()),
            Completion::Failed(reason) => {
                (LogLevel::Error, format!("Agent execution failed: {}", reason))
            }
        }
    }
}

fn map_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    Ok(ExecutionRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        agent_id: row.get(2)?,
        agent_name: row.get(3)?,
        execution_id: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        status: row.get(7)?,
        duration_ms: row.get(8)?,
        output: row.get(9)?,
        error: row.get(10)?,
        logs: Vec::new(),
    })
}

fn load_logs(db: &Connection, record_id: &str) -> rusqlite::Result<Vec<LogEntry>> {
    let mut stmt = db.prepare(
        "SELECT timestamp, level, message FROM execution_logs WHERE record_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![record_id], |row| {
        Ok(LogEntry {
            timestamp: row.get(0)?,
            level: row.get(1)?,
            message: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn append_log(
    db: &Connection,
    record_id: &str,
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: &str,
) -> rusqlite::Result<()> {
    db.execute(
        "INSERT INTO execution_logs (record_id, seq, timestamp, level, message)
         VALUES (?1, (SELECT COUNT(*) FROM execution_logs WHERE record_id = ?1), ?2, ?3, ?4)",
        params![record_id, timestamp, level, message],
    )?;
    Ok(())
}

fn query_executions(
    db: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<ExecutionRecord>> {
    let mut stmt = db.prepare(sql)?;
    let rows = stmt.query_map(args, map_execution)?;
    let mut records = Vec::new();
    for row in rows {
        let mut record = row?;
        record.logs = load_logs(db, &record.id)?;
        records.push(record);
    }
    Ok(records)
}

impl Store {
    /// Insert a `running` record together with its start entry, atomically.
    /// Returns `None` once the agent has been archived.
    pub async fn create_execution(&self, agent: &AgentRecord) -> Result<Option<ExecutionRecord>> {
        let start_time = now_millis();
        let mut record = ExecutionRecord {
            id: new_id(),
            owner_id: agent.owner_id.clone(),
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            execution_id: format!("exec-{}", uuid::Uuid::new_v4().simple()),
            start_time,
            end_time: None,
            status: ExecutionStatus::Running,
            duration_ms: None,
            output: None,
            error: None,
            logs: Vec::new(),
        };

        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let rows = tx.execute(
            "INSERT INTO executions (id, owner_id, agent_id, agent_name, execution_id, start_time, status)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
             WHERE EXISTS (SELECT 1 FROM agents WHERE id = ?3 AND archived = 0)",
            params![
                record.id,
                record.owner_id,
                record.agent_id,
                record.agent_name,
                record.execution_id,
                record.start_time,
                record.status
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        append_log(&tx, &record.id, start_time, LogLevel::Info, START_MESSAGE)?;
        tx.commit()?;

        record.logs.push(LogEntry {
            timestamp: start_time,
            level: LogLevel::Info,
            message: START_MESSAGE.to_string(),
        });
        Ok(Some(record))
    }

    /// Apply the terminal transition. Returns `None` when the record was
    /// already terminal, so at most one caller ever wins.
    pub async fn complete_execution(
        &self,
        record_id: &str,
        completion: Completion,
        end_time: DateTime<Utc>,
    ) -> Result<Option<ExecutionRecord>> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        let Some((agent_id, start_time, status)) = tx
            .query_row(
                "SELECT agent_id, start_time, status FROM executions WHERE id = ?1",
                params![record_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, DateTime<Utc>>(1)?,
                        row.get::<_, ExecutionStatus>(2)?,
                    ))
                },
            )
            .optional()?
        else {
            return Ok(None);
        };
        if !status.can_transition_to(completion.status()) {
            return Ok(None);
        }

        // A clock step backwards must not produce a negative duration.
        let end_time = end_time.max(start_time);
        let duration_ms = (end_time - start_time).num_milliseconds();
        let (output, error) = match &completion {
            Completion::Succeeded(output) => (Some(output.clone()), None),
            Completion::Failed(reason) => (None, Some(reason.clone())),
        };

        let rows = tx.execute(
            "UPDATE executions SET status = ?1, end_time = ?2, duration_ms = ?3, output = ?4, error = ?5
             WHERE id = ?6 AND status = 'running'",
            params![
                completion.status(),
                end_time,
                duration_ms,
                output,
                error,
                record_id
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }

        append_log(&tx, record_id, end_time, LogLevel::Info, PROCESSING_MESSAGE)?;
        let (level, message) = completion.terminal_entry();
        append_log(&tx, record_id, end_time, level, &message)?;
        tx.execute(
            "UPDATE agents SET last_run = ?1 WHERE id = ?2",
            params![end_time, agent_id],
        )?;
        tx.commit()?;

        let record = db.query_row(
            &format!("SELECT {} FROM executions WHERE id = ?1", EXECUTION_COLUMNS),
            params![record_id],
            map_execution,
        )?;
        let logs = load_logs(&db, record_id)?;
        Ok(Some(ExecutionRecord { logs, ..record }))
    }

    /// Looks up by either the record id or the public execution id.
    pub async fn get_execution(&self, owner_id: &str, id: &str) -> Result<Option<ExecutionRecord>> {
        let db = self.db.lock().await;
        let record = db
            .query_row(
                &format!(
                    "SELECT {} FROM executions WHERE (id = ?1 OR execution_id = ?1) AND owner_id = ?2",
                    EXECUTION_COLUMNS
                ),
                params![id, owner_id],
                map_execution,
            )
            .optional()?;
        match record {
            Some(record) => {
                let logs = load_logs(&db, &record.id)?;
                Ok(Some(ExecutionRecord { logs, ..record }))
            }
            None => Ok(None),
        }
    }

    pub async fn list_executions_for_agent(
        &self,
        owner_id: &str,
        agent_id: &str,
    ) -> Result<Vec<ExecutionRecord>> {
        let db = self.db.lock().await;
        query_executions(
            &db,
            &format!(
                "SELECT {} FROM executions WHERE agent_id = ?1 AND owner_id = ?2
                 ORDER BY start_time DESC, rowid DESC",
                EXECUTION_COLUMNS
            ),
            &[&agent_id, &owner_id],
        )
    }

    pub async fn list_executions(&self, owner_id: &str, limit: u32) -> Result<Vec<ExecutionRecord>> {
        let db = self.db.lock().await;
        query_executions(
            &db,
            &format!(
                "SELECT {} FROM executions WHERE owner_id = ?1
                 ORDER BY start_time DESC, rowid DESC LIMIT ?2",
                EXECUTION_COLUMNS
            ),
            &[&owner_id, &limit],
        )
    }

    pub async fn list_running_execution_ids(&self) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT id FROM executions WHERE status = 'running'")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Historical records are inserted whole; used by the demo seed.
    pub(crate) async fn insert_execution_record(&self, record: &ExecutionRecord) -> Result<()> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO executions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                EXECUTION_COLUMNS
            ),
            params![
                record.id,
                record.owner_id,
                record.agent_id,
                record.agent_name,
                record.execution_id,
                record.start_time,
                record.end_time,
                record.status,
                record.duration_ms,
                record.output,
                record.error
            ],
        )?;
        for entry in &record.logs {
            append_log(&tx, &record.id, entry.timestamp, entry.level, &entry.message)?;
        }
        tx.commit()?;
        Ok(())
    }
}
