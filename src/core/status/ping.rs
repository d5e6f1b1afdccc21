// ─── Server List Ping ───
// Minimal Minecraft status protocol: one handshake packet, one status
// request, one JSON response. Enough to show player counts and the MOTD
// next to the pack; no SRV lookup, callers supply host and port.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::core::error::{ModpackError, ModpackResult};

/// Post-1.18.2 protocol number; servers answer status requests from any
/// client version, the field just has to be present.
const PROTOCOL_VERSION: i32 = 758;
const NEXT_STATE_STATUS: i32 = 1;
const SOCKET_TIMEOUT: Duration = Duration::from_millis(3000);
const MAX_STATUS_PAYLOAD: i32 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PingOutcome {
    pub players_online: Option<u32>,
    pub players_max: Option<u32>,
    pub motd: String,
    pub ping_ms: u64,
}

/// Ping a server and parse its status response.
pub async fn ping_server(host: &str, port: u16) -> ModpackResult<PingOutcome> {
    let started = Instant::now();
    let status = timeout(SOCKET_TIMEOUT, exchange_status(host, port))
        .await
        .map_err(|_| {
            ModpackError::Other(format!("status ping to {host}:{port} timed out"))
        })??;
    let ping_ms = started.elapsed().as_millis() as u64;

    Ok(parse_status(&status, ping_ms))
}

async fn exchange_status(host: &str, port: u16) -> ModpackResult<Value> {
    let mut stream = TcpStream::connect((host, port)).await?;

    // Handshake: packet id 0, protocol version, server address, port,
    // next state = status.
    let mut handshake = Vec::new();
    write_varint(&mut handshake, 0x00);
    write_varint(&mut handshake, PROTOCOL_VERSION);
    write_varint(&mut handshake, host.len() as i32);
    handshake.extend_from_slice(host.as_bytes());
    handshake.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut handshake, NEXT_STATE_STATUS);

    let mut packets = Vec::new();
    write_varint(&mut packets, handshake.len() as i32);
    packets.extend_from_slice(&handshake);

    // Status request: empty packet with id 0.
    write_varint(&mut packets, 1);
    packets.push(0x00);

    stream.write_all(&packets).await?;
    stream.flush().await?;

    // Response: total length, packet id 0, JSON string.
    let _total_len = read_varint(&mut stream).await?;
    let packet_id = read_varint(&mut stream).await?;
    if packet_id != 0x00 {
        return Err(ModpackError::Other(format!(
            "unexpected status packet id {packet_id}"
        )));
    }

    let json_len = read_varint(&mut stream).await?;
    if json_len < 0 || json_len > MAX_STATUS_PAYLOAD {
        return Err(ModpackError::Other(format!(
            "status payload length {json_len} out of range"
        )));
    }

    let mut payload = vec![0u8; json_len as usize];
    stream.read_exact(&mut payload).await?;

    let status: Value = serde_json::from_slice(&payload)?;
    Ok(status)
}

fn write_varint(buf: &mut Vec<u8>, mut value: i32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value = ((value as u32) >> 7) as i32;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> ModpackResult<i32> {
    let mut result: i32 = 0;
    let mut shift: u32 = 0;
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).await?;
        result |= ((byte[0] & 0x7F) as i32) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 35 {
            return Err(ModpackError::Other(
                "malformed VarInt in status response".into(),
            ));
        }
    }
}

pub(super) fn parse_status(status: &Value, ping_ms: u64) -> PingOutcome {
    let players = status.get("players");
    PingOutcome {
        players_online: players
            .and_then(|p| p.get("online"))
            .and_then(Value::as_u64)
            .map(|v| v as u32),
        players_max: players
            .and_then(|p| p.get("max"))
            .and_then(Value::as_u64)
            .map(|v| v as u32),
        motd: status
            .get("description")
            .map(flatten_description)
            .unwrap_or_default(),
        ping_ms,
    }
}

/// Flatten a chat-component description into plain text. Descriptions
/// arrive as a bare string, a component object with `text`/`extra`, or an
/// array of components.
fn flatten_description(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(map) => {
            let mut out = String::new();
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            if let Some(Value::Array(extra)) = map.get("extra") {
                for part in extra {
                    out.push_str(&flatten_description(part));
                }
            }
            out
        }
        Value::Array(parts) => parts.iter().map(flatten_description).collect(),
        _ => String::new(),
    }
}
