//! `"Packets"` 테이블 조회 + 행 변환.

use sqlx::postgres::PgRow;
use sqlx::Row;
use telemon_core::error::CoreError;
use telemon_core::models::packet::{PacketTimestamp, TelemetryPacket};
use telemon_core::models::session::SessionId;
use tracing::{debug, warn};

use super::{storage_error, PgTelemetryStore};

impl PgTelemetryStore {
    /// 세션의 패킷 목록 (타임스탬프 오름차순)
    pub(super) async fn fetch_session_packets(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<TelemetryPacket>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "Id", "PacketCounter", "Timestamp", "Payload", "Crc16", "SessionId"
            FROM "Packets"
            WHERE "SessionId" = $1
            ORDER BY "Timestamp" ASC
            "#,
        )
        .bind(session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("세션 패킷 조회 실패", e))?;

        let packets: Vec<TelemetryPacket> = rows
            .iter()
            .filter_map(|row| match packet_from_row(row) {
                Ok(packet) => Some(packet),
                Err(e) => {
                    warn!("패킷 행 건너뜀 (session={session_id}): {e}");
                    None
                }
            })
            .collect();

        debug!("세션 {session_id}: 패킷 {}개 조회", packets.len());
        Ok(packets)
    }

    /// ID로 패킷 조회
    pub(super) async fn fetch_packet(&self, id: i64) -> Result<Option<TelemetryPacket>, CoreError> {
        let row = sqlx::query(
            r#"
            SELECT "Id", "PacketCounter", "Timestamp", "Payload", "Crc16", "SessionId"
            FROM "Packets"
            WHERE "Id" = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("패킷 조회 실패", e))?;

        row.as_ref().map(packet_from_row).transpose()
    }
}

fn packet_from_row(row: &PgRow) -> Result<TelemetryPacket, CoreError> {
    let column = |e: sqlx::Error| CoreError::Parse(format!("패킷 행 디코딩 실패: {e}"));
    packet_from_columns(
        row.try_get("Id").map_err(column)?,
        row.try_get("PacketCounter").map_err(column)?,
        row.try_get("Timestamp").map_err(column)?,
        row.try_get("Payload").map_err(column)?,
        row.try_get("Crc16").map_err(column)?,
        row.try_get("SessionId").map_err(column)?,
    )
}

/// 컬럼 값 → 패킷. 체크섬이 u16 범위를 벗어나면 파싱 에러.
fn packet_from_columns(
    id: i64,
    counter: i32,
    timestamp: Option<f64>,
    payload: f64,
    crc16: i32,
    session_id: Option<i64>,
) -> Result<TelemetryPacket, CoreError> {
    let checksum = u16::try_from(crc16)
        .map_err(|_| CoreError::Parse(format!("CRC16 범위 초과: id={id}, crc16={crc16}")))?;

    Ok(TelemetryPacket {
        id,
        counter: i64::from(counter),
        timestamp: timestamp.map(PacketTimestamp::Epoch),
        payload,
        checksum,
        session_id: session_id.map(SessionId),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use telemon_core::models::packet::PacketStatus;

    #[test]
    fn columns_map_to_packet() {
        let packet =
            packet_from_columns(10, 3, Some(1_700_000_000.0), -0.5, 0xBEEF, Some(2)).unwrap();
        assert_eq!(packet.id, 10);
        assert_eq!(packet.counter, 3);
        assert_eq!(packet.timestamp, Some(PacketTimestamp::Epoch(1_700_000_000.0)));
        assert_eq!(packet.checksum, 0xBEEF);
        assert_eq!(packet.session_id, Some(SessionId(2)));
        assert_eq!(packet.status(), PacketStatus::NegativeValue);
    }

    #[test]
    fn out_of_range_checksum_is_row_error() {
        assert_matches!(
            packet_from_columns(1, 0, None, 0.0, 70_000, None),
            Err(CoreError::Parse(_))
        );
        assert_matches!(
            packet_from_columns(1, 0, None, 0.0, -1, None),
            Err(CoreError::Parse(_))
        );
    }
}
