//! Supabase Realtime client for `postgres_changes` notifications.
//!
//! Speaks the Phoenix channel JSON framing (`vsn=1.0.0`): join the table
//! topic, heartbeat on the `phoenix` topic, translate change messages into
//! [`ChangeEvent`]s.

use super::{ChangeStream, FeedItem, SupabaseSource};
use crate::error::SourceError;
use callboard_rs_protocol::{CallRecord, ChangeEvent, ChangeKind};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use reqwest::Url;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const JOIN_REF: &str = "1";
const FEED_BUFFER: usize = 256;

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeFrame {
    /// A row change on the subscribed table.
    Change(ChangeEvent),
    /// Reply to one of our pushes (join or heartbeat).
    Reply {
        reference: Option<String>,
        ok: bool,
        detail: String,
    },
    /// Server-side error about the subscription.
    SystemError(String),
    /// The channel was closed or crashed on the server.
    Closed(String),
    /// A change message whose record could not be decoded.
    Malformed(String),
    /// Presence, broadcast and other frames we do not consume.
    Ignored,
}

/// Websocket endpoint for a project base URL.
pub fn realtime_url(base: &Url, api_key: &str) -> Result<Url, SourceError> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(SourceError::Config(format!(
                "unsupported url scheme for realtime: {other}"
            )));
        }
    };
    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|_| SourceError::Config(format!("cannot derive websocket url from {base}")))?;
    url.path_segments_mut()
        .map_err(|_| SourceError::Config(format!("url cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(["realtime", "v1", "websocket"]);
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

/// Decode one text frame from the server.
pub fn decode_frame(text: &str) -> RealtimeFrame {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => return RealtimeFrame::Malformed(format!("invalid json: {err}")),
    };
    let payload = &value["payload"];
    match value["event"].as_str().unwrap_or_default() {
        "postgres_changes" => decode_change(&payload["data"]),
        "phx_reply" => {
            let ok = payload["status"].as_str() == Some("ok");
            let response = &payload["response"];
            let detail = response["reason"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| response.to_string());
            RealtimeFrame::Reply {
                reference: value["ref"].as_str().map(str::to_string),
                ok,
                detail,
            }
        }
        "system" if payload["status"].as_str() == Some("error") => RealtimeFrame::SystemError(
            payload["message"]
                .as_str()
                .unwrap_or("unknown realtime error")
                .to_string(),
        ),
        "phx_error" => RealtimeFrame::Closed("channel error".to_string()),
        "phx_close" => RealtimeFrame::Closed("channel closed".to_string()),
        _ => RealtimeFrame::Ignored,
    }
}

fn decode_change(data: &Value) -> RealtimeFrame {
    let Some(kind) = data["type"].as_str().and_then(ChangeKind::parse) else {
        return RealtimeFrame::Malformed(format!("unknown change type {}", data["type"]));
    };
    match kind {
        ChangeKind::Insert | ChangeKind::Update => match CallRecord::from_row(&data["record"]) {
            Ok(record) if kind == ChangeKind::Insert => {
                RealtimeFrame::Change(ChangeEvent::Insert(record))
            }
            Ok(record) => RealtimeFrame::Change(ChangeEvent::Update(record)),
            Err(err) => RealtimeFrame::Malformed(format!("{kind} record: {err}")),
        },
        ChangeKind::Delete => match &data["old_record"]["id"] {
            Value::String(id) => RealtimeFrame::Change(ChangeEvent::Delete { id: id.clone() }),
            Value::Number(id) => RealtimeFrame::Change(ChangeEvent::Delete { id: id.to_string() }),
            _ => RealtimeFrame::Malformed("delete without old_record.id".to_string()),
        },
    }
}

/// Connect, join the table topic, and spawn the pump feeding the stream.
///
/// Connecting and joining together are bounded by the source's subscribe
/// timeout.
pub(super) async fn subscribe(source: &SupabaseSource) -> Result<ChangeStream, SourceError> {
    let url = realtime_url(&source.base_url, &source.api_key)?;
    info!(
        "opening realtime subscription (host={}, table={})",
        url.host_str().unwrap_or("?"),
        source.table
    );
    let (sink, stream, topic) =
        tokio::time::timeout(source.subscribe_timeout, connect_and_join(source, &url))
            .await
            .map_err(|_| {
                SourceError::Unavailable(format!(
                    "realtime subscription not joined within {}s",
                    source.subscribe_timeout.as_secs()
                ))
            })??;
    info!("realtime subscription joined (topic={})", topic);

    let (tx, rx) = mpsc::channel(FEED_BUFFER);
    let heartbeat = source.heartbeat;
    let handle = tokio::spawn(async move {
        if let Err(err) = pump(sink, stream, &tx, heartbeat).await {
            warn!("realtime feed ended (reason={})", err);
            let _ = tx.send(Err(err)).await;
        }
    });
    Ok(ChangeStream::new(rx, handle))
}

async fn connect_and_join(
    source: &SupabaseSource,
    url: &Url,
) -> Result<(SplitSink<Socket, Message>, SplitStream<Socket>, String), SourceError> {
    let (socket, _) = connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = socket.split();

    let topic = format!("realtime:{}:{}", source.schema, source.table);
    let join = json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [
                    { "event": "*", "schema": source.schema, "table": source.table }
                ]
            },
            "access_token": source.api_key,
        },
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
    });
    sink.send(Message::Text(join.to_string())).await?;
    await_join(&mut stream).await?;
    Ok((sink, stream, topic))
}

async fn await_join(stream: &mut SplitStream<Socket>) -> Result<(), SourceError> {
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => match decode_frame(&text) {
                RealtimeFrame::Reply {
                    reference: Some(reference),
                    ok,
                    detail,
                } if reference == JOIN_REF => {
                    return if ok {
                        Ok(())
                    } else {
                        Err(SourceError::Rejected(detail))
                    };
                }
                RealtimeFrame::SystemError(message) => return Err(SourceError::Rejected(message)),
                RealtimeFrame::Closed(reason) => return Err(SourceError::Closed(reason)),
                _ => {}
            },
            Message::Close(_) => {
                return Err(SourceError::Closed("socket closed during join".to_string()));
            }
            _ => {}
        }
    }
    Err(SourceError::Closed("socket ended during join".to_string()))
}

/// Forward changes until the socket ends or the stream is dropped.
async fn pump(
    mut sink: SplitSink<Socket, Message>,
    mut stream: SplitStream<Socket>,
    tx: &mpsc::Sender<FeedItem>,
    heartbeat: Duration,
) -> Result<(), SourceError> {
    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await;
    let mut next_ref: u64 = 2;
    loop {
        tokio::select! {
            _ = tx.closed() => return Ok(()),
            _ = ticker.tick() => {
                let frame = json!({
                    "topic": "phoenix",
                    "event": "heartbeat",
                    "payload": {},
                    "ref": next_ref.to_string(),
                });
                next_ref += 1;
                sink.send(Message::Text(frame.to_string())).await?;
            }
            message = stream.next() => {
                let Some(message) = message else {
                    return Err(SourceError::Closed("socket ended".to_string()));
                };
                match message? {
                    Message::Text(text) => match decode_frame(&text) {
                        RealtimeFrame::Change(event) => {
                            debug!(
                                "realtime change (kind={}, id={})",
                                event.kind(),
                                event.record_id()
                            );
                            if tx.send(Ok(event)).await.is_err() {
                                return Ok(());
                            }
                        }
                        RealtimeFrame::Malformed(reason) => {
                            warn!("skipping malformed realtime frame (reason={})", reason);
                        }
                        RealtimeFrame::Reply { ok: false, detail, .. } => {
                            warn!("realtime push rejected (detail={})", detail);
                        }
                        RealtimeFrame::SystemError(message) => {
                            return Err(SourceError::Rejected(message));
                        }
                        RealtimeFrame::Closed(reason) => return Err(SourceError::Closed(reason)),
                        RealtimeFrame::Reply { .. } | RealtimeFrame::Ignored => {}
                    },
                    Message::Close(frame) => {
                        let reason = frame
                            .map(|frame| frame.reason.to_string())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return Err(SourceError::Closed(reason));
                    }
                    _ => {}
                }
            }
        }
    }
}
