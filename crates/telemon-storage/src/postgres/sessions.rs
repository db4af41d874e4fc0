//! `"Sessions"` 테이블 조회.

use sqlx::postgres::PgRow;
use sqlx::Row;
use telemon_core::error::CoreError;
use telemon_core::models::session::{Session, SessionId};
use tracing::{debug, warn};

use super::{storage_error, PgTelemetryStore};

impl PgTelemetryStore {
    /// 세션 목록 (최신순)
    pub(super) async fn fetch_sessions(&self) -> Result<Vec<Session>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "Id", "Name", "StartTime", "EndTime"
            FROM "Sessions"
            ORDER BY "StartTime" DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("세션 목록 조회 실패", e))?;

        let sessions: Vec<Session> = rows
            .iter()
            .filter_map(|row| match session_from_row(row) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("세션 행 건너뜀: {e}");
                    None
                }
            })
            .collect();

        debug!("세션 {}개 조회", sessions.len());
        Ok(sessions)
    }
}

fn session_from_row(row: &PgRow) -> Result<Session, sqlx::Error> {
    Ok(Session {
        id: SessionId(row.try_get("Id")?),
        name: row.try_get::<Option<String>, _>("Name")?.unwrap_or_default(),
        started_at: row.try_get("StartTime")?,
        ended_at: row.try_get("EndTime")?,
    })
}
