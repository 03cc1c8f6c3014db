//! MQTT 3.1 packet codec.
//!
//! Only the subset the edge-chat endpoint uses: CONNECT, CONNACK, PUBLISH
//! (QoS 0/1), PUBACK, SUBSCRIBE, SUBACK, PINGREQ, PINGRESP, DISCONNECT.
//! Every packet encodes and decodes, so the same codec can play the broker
//! side in tests.
//!
//! Websocket messages are not aligned to packets: one message may hold
//! several packets or a fragment of one. [`MqttCodec`] buffers accordingly.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::WireError;

pub const PROTOCOL_NAME: &str = "MQIsdp";
pub const PROTOCOL_LEVEL: u8 = 3;
pub const CLIENT_ID: &str = "mqttwsclient";
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;

const MAX_REMAINING_LENGTH: usize = 268_435_455;
/// Upper bound on read-ahead reservation for a partially received packet.
const MAX_READ_RESERVE: usize = 64 * 1024;

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const PUBACK: u8 = 4;
const SUBSCRIBE: u8 = 8;
const SUBACK: u8 = 9;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;
const DISCONNECT: u8 = 14;

const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_CLEAN_SESSION: u8 = 0x02;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
}

impl QoS {
    fn bits(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
        }
    }

    fn from_bits(bits: u8) -> Result<Self, WireError> {
        match bits {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            other => Err(WireError::UnsupportedQos(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub protocol_name: String,
    pub protocol_level: u8,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: u16,
    pub clean_session: bool,
}

impl Connect {
    /// A clean-session MQTT 3.1 CONNECT.
    pub fn new(client_id: impl Into<String>, username: Option<String>, keep_alive: u16) -> Self {
        Self {
            protocol_name: PROTOCOL_NAME.into(),
            protocol_level: PROTOCOL_LEVEL,
            client_id: client_id.into(),
            username,
            password: None,
            keep_alive,
            clean_session: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub qos: QoS,
    /// Required when `qos` is [`QoS::AtLeastOnce`].
    pub packet_id: Option<u16>,
    pub retain: bool,
    pub dup: bool,
    pub payload: Bytes,
}

impl Publish {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            qos: QoS::AtMostOnce,
            packet_id: None,
            retain: false,
            dup: false,
            payload: payload.into(),
        }
    }

    pub fn at_least_once(mut self, packet_id: u16) -> Self {
        self.qos = QoS::AtLeastOnce;
        self.packet_id = Some(packet_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_id: u16,
    pub topics: Vec<(String, QoS)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnAck { session_present: bool, return_code: u8 },
    Publish(Publish),
    PubAck { packet_id: u16 },
    Subscribe(Subscribe),
    SubAck { packet_id: u16, return_codes: Vec<u8> },
    PingReq,
    PingResp,
    Disconnect,
}

impl Packet {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect(_) => "CONNECT",
            Self::ConnAck { .. } => "CONNACK",
            Self::Publish(_) => "PUBLISH",
            Self::PubAck { .. } => "PUBACK",
            Self::Subscribe(_) => "SUBSCRIBE",
            Self::SubAck { .. } => "SUBACK",
            Self::PingReq => "PINGREQ",
            Self::PingResp => "PINGRESP",
            Self::Disconnect => "DISCONNECT",
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), WireError> {
        let mut body = BytesMut::new();
        let header = match self {
            Self::Connect(c) => {
                put_str(&mut body, &c.protocol_name)?;
                body.put_u8(c.protocol_level);
                let mut flags = 0u8;
                if c.username.is_some() {
                    flags |= FLAG_USERNAME;
                }
                if c.password.is_some() {
                    flags |= FLAG_PASSWORD;
                }
                if c.clean_session {
                    flags |= FLAG_CLEAN_SESSION;
                }
                body.put_u8(flags);
                body.put_u16(c.keep_alive);
                put_str(&mut body, &c.client_id)?;
                if let Some(u) = &c.username {
                    put_str(&mut body, u)?;
                }
                if let Some(p) = &c.password {
                    put_str(&mut body, p)?;
                }
                CONNECT << 4
            }
            Self::ConnAck {
                session_present,
                return_code,
            } => {
                body.put_u8(u8::from(*session_present));
                body.put_u8(*return_code);
                CONNACK << 4
            }
            Self::Publish(p) => {
                put_str(&mut body, &p.topic)?;
                if p.qos != QoS::AtMostOnce {
                    body.put_u16(p.packet_id.ok_or(WireError::MissingPacketId)?);
                }
                body.put_slice(&p.payload);
                let mut h = (PUBLISH << 4) | (p.qos.bits() << 1);
                if p.dup {
                    h |= 0x08;
                }
                if p.retain {
                    h |= 0x01;
                }
                h
            }
            Self::PubAck { packet_id } => {
                body.put_u16(*packet_id);
                PUBACK << 4
            }
            Self::Subscribe(s) => {
                body.put_u16(s.packet_id);
                for (topic, qos) in &s.topics {
                    put_str(&mut body, topic)?;
                    body.put_u8(qos.bits());
                }
                (SUBSCRIBE << 4) | 0x02
            }
            Self::SubAck {
                packet_id,
                return_codes,
            } => {
                body.put_u16(*packet_id);
                body.put_slice(return_codes);
                SUBACK << 4
            }
            Self::PingReq => PINGREQ << 4,
            Self::PingResp => PINGRESP << 4,
            Self::Disconnect => DISCONNECT << 4,
        };

        if body.len() > MAX_REMAINING_LENGTH {
            return Err(WireError::TooLarge(body.len()));
        }
        dst.reserve(5 + body.len());
        dst.put_u8(header);
        put_remaining_length(dst, body.len());
        dst.put_slice(&body);
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    fn decode_body(header: u8, mut body: Bytes) -> Result<Self, WireError> {
        match header >> 4 {
            CONNECT => {
                let what = "CONNECT";
                let protocol_name = get_str(&mut body, what)?;
                let protocol_level = get_u8(&mut body, what)?;
                let flags = get_u8(&mut body, what)?;
                let keep_alive = get_u16(&mut body, what)?;
                let client_id = get_str(&mut body, what)?;
                let username = if flags & FLAG_USERNAME != 0 {
                    Some(get_str(&mut body, what)?)
                } else {
                    None
                };
                let password = if flags & FLAG_PASSWORD != 0 {
                    Some(get_str(&mut body, what)?)
                } else {
                    None
                };
                Ok(Self::Connect(Connect {
                    protocol_name,
                    protocol_level,
                    client_id,
                    username,
                    password,
                    keep_alive,
                    clean_session: flags & FLAG_CLEAN_SESSION != 0,
                }))
            }
            CONNACK => {
                let flags = get_u8(&mut body, "CONNACK")?;
                let return_code = get_u8(&mut body, "CONNACK")?;
                Ok(Self::ConnAck {
                    session_present: flags & 0x01 != 0,
                    return_code,
                })
            }
            PUBLISH => {
                let qos = QoS::from_bits((header >> 1) & 0x03)?;
                let topic = get_str(&mut body, "PUBLISH")?;
                let packet_id = match qos {
                    QoS::AtMostOnce => None,
                    QoS::AtLeastOnce => Some(get_u16(&mut body, "PUBLISH")?),
                };
                Ok(Self::Publish(Publish {
                    topic,
                    qos,
                    packet_id,
                    retain: header & 0x01 != 0,
                    dup: header & 0x08 != 0,
                    payload: body,
                }))
            }
            PUBACK => Ok(Self::PubAck {
                packet_id: get_u16(&mut body, "PUBACK")?,
            }),
            SUBSCRIBE => {
                let packet_id = get_u16(&mut body, "SUBSCRIBE")?;
                let mut topics = Vec::new();
                while body.has_remaining() {
                    let topic = get_str(&mut body, "SUBSCRIBE")?;
                    let qos = QoS::from_bits(get_u8(&mut body, "SUBSCRIBE")? & 0x03)?;
                    topics.push((topic, qos));
                }
                Ok(Self::Subscribe(Subscribe { packet_id, topics }))
            }
            SUBACK => {
                let packet_id = get_u16(&mut body, "SUBACK")?;
                Ok(Self::SubAck {
                    packet_id,
                    return_codes: body.to_vec(),
                })
            }
            PINGREQ => Ok(Self::PingReq),
            PINGRESP => Ok(Self::PingResp),
            DISCONNECT => Ok(Self::Disconnect),
            other => Err(WireError::UnsupportedPacket(other)),
        }
    }
}

/// Stateless framing codec; the caller owns the read buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct MqttCodec;

impl Decoder for MqttCodec {
    type Item = Packet;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, WireError> {
        if src.len() < 2 {
            return Ok(None);
        }
        let Some((remaining, len_bytes)) = read_remaining_length(&src[1..])? else {
            return Ok(None);
        };
        let total = 1 + len_bytes + remaining;
        if src.len() < total {
            src.reserve((total - src.len()).min(MAX_READ_RESERVE));
            return Ok(None);
        }

        let header = src.get_u8();
        src.advance(len_bytes);
        let body = src.split_to(remaining).freeze();
        Packet::decode_body(header, body).map(Some)
    }
}

impl Encoder<Packet> for MqttCodec {
    type Error = WireError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), WireError> {
        item.encode(dst)
    }
}

// ── Primitives ───────────────────────────────────────────────────────

fn put_remaining_length(dst: &mut BytesMut, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        dst.put_u8(byte);
        if len == 0 {
            break;
        }
    }
}

/// Returns `(value, bytes used)`, or `None` if more input is needed.
fn read_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>, WireError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, byte) in buf.iter().take(4).enumerate() {
        value += (byte & 0x7f) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    if buf.len() >= 4 {
        Err(WireError::MalformedLength)
    } else {
        Ok(None)
    }
}

fn put_str(dst: &mut BytesMut, s: &str) -> Result<(), WireError> {
    let len = u16::try_from(s.len()).map_err(|_| WireError::TooLarge(s.len()))?;
    dst.put_u16(len);
    dst.put_slice(s.as_bytes());
    Ok(())
}

fn get_u8(buf: &mut Bytes, what: &'static str) -> Result<u8, WireError> {
    if buf.remaining() < 1 {
        return Err(WireError::Truncated(what));
    }
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut Bytes, what: &'static str) -> Result<u16, WireError> {
    if buf.remaining() < 2 {
        return Err(WireError::Truncated(what));
    }
    Ok(buf.get_u16())
}

fn get_str(buf: &mut Bytes, what: &'static str) -> Result<String, WireError> {
    let len = get_u16(buf, what)? as usize;
    if buf.remaining() < len {
        return Err(WireError::Truncated(what));
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| WireError::InvalidUtf8(what))
}
