use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// The ID of the telemetry codec on the wire.
const WIRE_ID: u8 = 0x54;

/// Wire ID + topic size + sequence number + payload size.
const FIXED_HEADER_LEN: usize = 1 + 2 + 4 + 4;

/// Topic prefix of a subscribe control frame.
pub const SUB_PREFIX: &[u8] = b"SUB.";
/// Topic prefix of an unsubscribe control frame.
pub const UNSUB_PREFIX: &[u8] = b"UNSUB.";

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("Invalid wire ID: {0}")]
    WireId(u8),
    #[error("Topic too large: {0} bytes")]
    TopicTooLarge(usize),
}

/// A telemetry frame: a topic, a per-session sequence number and an opaque payload.
///
/// Frames with an empty payload are control frames sent by subscribers, see
/// [`Message::subscribe`] and [`Message::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: Bytes,
    seq: u32,
    payload: Bytes,
}

impl Message {
    /// Creates a new message with the given sequence number, topic and payload.
    pub fn new(seq: u32, topic: Bytes, payload: Bytes) -> Result<Self, Error> {
        if topic.len() > u16::MAX as usize {
            return Err(Error::TopicTooLarge(topic.len()));
        }

        Ok(Self { topic, seq, payload })
    }

    /// Creates a subscribe control frame for the given topic.
    pub fn subscribe(topic: &str) -> Result<Self, Error> {
        Self::control(SUB_PREFIX, topic)
    }

    /// Creates an unsubscribe control frame for the given topic.
    pub fn unsubscribe(topic: &str) -> Result<Self, Error> {
        Self::control(UNSUB_PREFIX, topic)
    }

    fn control(prefix: &[u8], topic: &str) -> Result<Self, Error> {
        let mut full = BytesMut::with_capacity(prefix.len() + topic.len());
        full.put_slice(prefix);
        full.put_slice(topic.as_bytes());
        Self::new(0, full.freeze(), Bytes::new())
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    #[inline]
    pub fn topic(&self) -> &Bytes {
        &self.topic
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[inline]
    pub fn into_parts(self) -> (Bytes, Bytes) {
        (self.topic, self.payload)
    }

    /// Total size of the encoded frame in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        FIXED_HEADER_LEN + self.topic.len() + self.payload.len()
    }

    #[inline]
    pub fn is_control(&self) -> bool {
        self.payload.is_empty()
    }
}

#[derive(Debug)]
struct Header {
    topic: Bytes,
    seq: u32,
    size: u32,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Header,
    Payload(Header),
}

/// Length-prefixed codec for [`Message`]s.
///
/// Layout: `wire id (u8) | topic size (u16) | topic | seq (u32) | payload size (u32) | payload`,
/// all integers big-endian.
#[derive(Debug, Default)]
pub struct Codec {
    /// The current state of the decoder.
    state: State,
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for Codec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match std::mem::take(&mut self.state) {
                State::Header => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    // Wire ID check (without advancing the cursor)
                    let wire_id = src[0];
                    if wire_id != WIRE_ID {
                        return Err(Error::WireId(wire_id));
                    }

                    // The src is too small to read the topic size
                    if src.len() < 3 {
                        tracing::trace!("not enough bytes for topic size");
                        return Ok(None);
                    }

                    let topic_size = u16::from_be_bytes([src[1], src[2]]) as usize;

                    // Not enough bytes for the topic and the rest of the header
                    if src.len() < FIXED_HEADER_LEN + topic_size {
                        return Ok(None);
                    }

                    src.advance(3);
                    let topic = src.split_to(topic_size).freeze();
                    let seq = src.get_u32();
                    let size = src.get_u32();

                    self.state = State::Payload(Header { topic, seq, size });
                }
                State::Payload(header) => {
                    if src.len() < header.size as usize {
                        tracing::trace!(have = src.len(), want = header.size, "waiting for payload");
                        self.state = State::Payload(header);
                        return Ok(None);
                    }

                    let payload = src.split_to(header.size as usize).freeze();

                    return Ok(Some(Message { topic: header.topic, seq: header.seq, payload }));
                }
            }
        }
    }
}

impl Encoder<Message> for Codec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.size());

        dst.put_u8(WIRE_ID);
        dst.put_u16(item.topic.len() as u16);
        dst.put(item.topic);
        dst.put_u32(item.seq);
        dst.put_u32(item.payload.len() as u32);
        dst.put(item.payload);

        Ok(())
    }
}
