//! MQTT-over-websocket connector for the edge-chat endpoint.

use std::time::Duration;

use bytes::BytesMut;
use ec_protocol::mqtt::{Connect, Publish, Subscribe, CLIENT_ID};
use ec_protocol::{ConnectUsername, MqttCodec, Packet, QoS, SUBSCRIBED_TOPICS};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use rand::Rng;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;

use crate::config::EndpointConfig;
use crate::transport::{ConnectOptions, Connector, Frame, Link, LinkPublisher, Outbound};
use crate::types::{RealtimeError, SessionCredentials};

/// Upper bound (inclusive) for the per-connection session id.
pub const MAX_SESSION_ID: u64 = 1 << 53;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const CONNACK_TIMEOUT: Duration = Duration::from_secs(10);
const SUBSCRIBE_PACKET_ID: u16 = 1;
const OUTBOUND_CAPACITY: usize = 64;
const INBOUND_CAPACITY: usize = 256;

/// Opens one websocket per call, performs the MQTT CONNECT/SUBSCRIBE
/// handshake, then hands the socket to reader/writer/ping tasks.
#[derive(Debug, Clone)]
pub struct WsMqttConnector {
    endpoint: EndpointConfig,
}

impl WsMqttConnector {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }

    fn build_request(
        &self,
        url: &str,
        credentials: &SessionCredentials,
    ) -> Result<Request, RealtimeError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| RealtimeError::Config(format!("endpoint url {url}: {e}")))?;

        let user_agent = self
            .endpoint
            .user_agent
            .as_deref()
            .unwrap_or(&credentials.user_agent);

        let headers = request.headers_mut();
        headers.insert(header::COOKIE, header_value("cookie", &credentials.cookie)?);
        headers.insert(header::USER_AGENT, header_value("user agent", user_agent)?);
        headers.insert(header::ORIGIN, header_value("origin", &self.endpoint.origin)?);
        headers.insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            HeaderValue::from_static("mqtt"),
        );
        Ok(request)
    }
}

fn header_value(what: &str, value: &str) -> Result<HeaderValue, RealtimeError> {
    HeaderValue::from_str(value)
        .map_err(|_| RealtimeError::Config(format!("{what} is not a valid header value")))
}

#[async_trait::async_trait]
impl Connector for WsMqttConnector {
    async fn connect(
        &self,
        credentials: &SessionCredentials,
        options: &ConnectOptions,
    ) -> Result<Link, RealtimeError> {
        let session_id = rand::thread_rng().gen_range(1..=MAX_SESSION_ID);
        let url = self.endpoint.url(session_id);
        let request = self.build_request(&url, credentials)?;

        tracing::info!(
            host = %self.endpoint.host,
            user_id = %credentials.user_id,
            session_id,
            "connecting to realtime endpoint"
        );

        let (ws, _response) =
            tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| RealtimeError::Transport("websocket handshake timeout".into()))?
                .map_err(|e| RealtimeError::Transport(format!("websocket: {e}")))?;
        let (mut sink, mut stream) = ws.split();
        let mut buf = BytesMut::new();

        // ── CONNECT ──────────────────────────────────────────────────
        let mut username = ConnectUsername::new(
            &credentials.user_id,
            session_id,
            &credentials.device_id,
            options.chat_on,
            SUBSCRIBED_TOPICS,
        );
        username.fg = options.foreground;
        let connect = Connect::new(
            CLIENT_ID,
            Some(username.to_json()?),
            self.endpoint.keep_alive_secs,
        );
        send_packet(&mut sink, Packet::Connect(connect)).await?;

        // ── Wait for CONNACK ─────────────────────────────────────────
        let ack = tokio::time::timeout(CONNACK_TIMEOUT, async {
            loop {
                match next_packet(&mut stream, &mut buf).await? {
                    Some(Packet::ConnAck { return_code, .. }) => return Ok(return_code),
                    Some(other) => {
                        tracing::debug!(packet = other.name(), "ignoring packet before CONNACK");
                    }
                    None => {
                        return Err(RealtimeError::Transport(
                            "connection closed before CONNACK".into(),
                        ))
                    }
                }
            }
        })
        .await
        .map_err(|_| RealtimeError::Transport("CONNACK timeout".into()))??;

        if ack != 0 {
            return Err(RealtimeError::Transport(format!(
                "connection refused, return code {ack}"
            )));
        }

        // ── SUBSCRIBE ────────────────────────────────────────────────
        let subscribe = Subscribe {
            packet_id: SUBSCRIBE_PACKET_ID,
            topics: SUBSCRIBED_TOPICS
                .iter()
                .map(|t| (t.to_string(), QoS::AtMostOnce))
                .collect(),
        };
        send_packet(&mut sink, Packet::Subscribe(subscribe)).await?;

        tracing::info!(
            user_id = %credentials.user_id,
            topics = SUBSCRIBED_TOPICS.len(),
            "realtime connection established"
        );

        // ── Background tasks ─────────────────────────────────────────
        let close = CancellationToken::new();
        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(OUTBOUND_CAPACITY);
        let (control_tx, mut control_rx) = mpsc::channel::<Packet>(OUTBOUND_CAPACITY);
        let (frames_tx, frames_rx) = mpsc::channel::<Frame>(INBOUND_CAPACITY);

        // Writer: owns the sink; assigns packet ids to QoS 1 publishes.
        let writer_close = close.clone();
        tokio::spawn(async move {
            let mut next_id = SUBSCRIBE_PACKET_ID;
            loop {
                let packet = tokio::select! {
                    _ = writer_close.cancelled() => break,
                    Some(p) = control_rx.recv() => p,
                    Some(out) = out_rx.recv() => {
                        let publish = Publish::new(out.topic, out.payload);
                        match out.qos {
                            QoS::AtMostOnce => Packet::Publish(publish),
                            QoS::AtLeastOnce => {
                                next_id = next_id.wrapping_add(1).max(1);
                                Packet::Publish(publish.at_least_once(next_id))
                            }
                        }
                    }
                    else => break,
                };
                if let Err(e) = send_packet(&mut sink, packet).await {
                    tracing::warn!(error = %e, "realtime write failed");
                    break;
                }
            }
            writer_close.cancel();
            let _ = send_packet(&mut sink, Packet::Disconnect).await;
            let _ = sink.close().await;
        });

        // Pinger: PINGREQ every keepalive interval.
        if self.endpoint.keep_alive_secs > 0 {
            let ping_close = close.clone();
            let ping_tx = control_tx.clone();
            let period = Duration::from_secs(u64::from(self.endpoint.keep_alive_secs));
            tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    tokio::select! {
                        _ = ping_close.cancelled() => break,
                        _ = interval.tick() => {
                            if ping_tx.send(Packet::PingReq).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }

        // Reader: decode packets, ack QoS 1, forward publishes in order.
        let reader_close = close.clone();
        tokio::spawn(async move {
            loop {
                let packet = tokio::select! {
                    _ = reader_close.cancelled() => break,
                    p = next_packet(&mut stream, &mut buf) => p,
                };
                match packet {
                    Ok(Some(Packet::Publish(p))) => {
                        if let (QoS::AtLeastOnce, Some(packet_id)) = (p.qos, p.packet_id) {
                            let _ = control_tx.send(Packet::PubAck { packet_id }).await;
                        }
                        tracing::trace!(topic = %p.topic, bytes = p.payload.len(), "frame received");
                        let frame = Frame {
                            topic: p.topic,
                            payload: p.payload,
                        };
                        if frames_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Packet::SubAck { return_codes, .. })) => {
                        tracing::debug!(granted = return_codes.len(), "subscriptions acknowledged");
                    }
                    Ok(Some(Packet::PingResp)) | Ok(Some(Packet::PubAck { .. })) => {
                        tracing::trace!("ack received");
                    }
                    Ok(Some(Packet::Disconnect)) => {
                        tracing::info!("realtime endpoint sent DISCONNECT");
                        break;
                    }
                    Ok(Some(other)) => {
                        tracing::debug!(packet = other.name(), "ignoring unexpected packet");
                    }
                    Ok(None) => {
                        tracing::info!("realtime endpoint closed connection");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "realtime read failed");
                        break;
                    }
                }
            }
            reader_close.cancel();
        });

        Ok(Link {
            publisher: LinkPublisher::new(out_tx),
            frames: frames_rx,
            close,
        })
    }
}

async fn send_packet<S>(sink: &mut S, packet: Packet) -> Result<(), RealtimeError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let bytes = packet.to_bytes()?;
    sink.send(Message::Binary(bytes.to_vec()))
        .await
        .map_err(|e| RealtimeError::Transport(format!("send {}: {e}", packet.name())))
}

/// Next complete MQTT packet. A websocket message may carry several packets
/// or a fragment of one; `buf` carries the remainder between calls.
async fn next_packet<S>(stream: &mut S, buf: &mut BytesMut) -> Result<Option<Packet>, RealtimeError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        if let Some(packet) = MqttCodec.decode(buf)? {
            return Ok(Some(packet));
        }
        match stream.next().await {
            Some(Ok(Message::Binary(data))) => buf.extend_from_slice(&data),
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(RealtimeError::Transport(format!("websocket: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> WsMqttConnector {
        WsMqttConnector::new(EndpointConfig::default())
    }

    #[test]
    fn request_carries_session_headers() {
        let creds = SessionCredentials::new("100", "c_user=100; xs=abc");
        let req = connector()
            .build_request("wss://edge-chat.facebook.com/chat?sid=5", &creds)
            .unwrap();
        let h = req.headers();
        assert_eq!(h[header::COOKIE], "c_user=100; xs=abc");
        assert_eq!(h[header::ORIGIN], "https://www.facebook.com");
        assert_eq!(h[header::SEC_WEBSOCKET_PROTOCOL], "mqtt");
        assert_eq!(h[header::USER_AGENT], creds.user_agent.as_str());
        assert_eq!(req.uri().query(), Some("sid=5"));
    }

    #[test]
    fn user_agent_override() {
        let mut endpoint = EndpointConfig::default();
        endpoint.user_agent = Some("custom/1.0".into());
        let creds = SessionCredentials::new("100", "c");
        let req = WsMqttConnector::new(endpoint)
            .build_request("wss://edge-chat.facebook.com/chat?sid=5", &creds)
            .unwrap();
        assert_eq!(req.headers()[header::USER_AGENT], "custom/1.0");
    }

    #[test]
    fn bad_cookie_is_config_error() {
        let creds = SessionCredentials::new("100", "bad\ncookie");
        let err = connector()
            .build_request("wss://edge-chat.facebook.com/chat?sid=5", &creds)
            .unwrap_err();
        assert!(matches!(err, RealtimeError::Config(_)));
    }
}
