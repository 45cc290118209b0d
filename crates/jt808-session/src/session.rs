use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use bytes::Bytes;
use jt808_frame::{
    parse_frame, split, Frame, FrameWriter, Header, ReassemblyBuffer, TerminalId, FLAG,
    MAX_BODY_LENGTH,
};
use tracing::{debug, trace, warn};

use crate::error::{Result, SessionError};

/// How long an incomplete multi-part message may sit idle before eviction.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on concurrently pending multi-part messages.
pub const DEFAULT_MAX_PENDING_MESSAGES: usize = 64;

/// Session behavior configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest body placed in one outbound frame.
    pub max_body_length: usize,
    /// First serial number handed out.
    pub initial_serial_number: u16,
    /// Idle time after which a partial message is dropped.
    pub reassembly_timeout: Duration,
    /// Pending messages kept before the least recently touched is dropped.
    pub max_pending_messages: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_body_length: MAX_BODY_LENGTH,
            initial_serial_number: 0,
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            max_pending_messages: DEFAULT_MAX_PENDING_MESSAGES,
        }
    }
}

/// Addressing for an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub message_id: u16,
    pub terminal_id: TerminalId,
    pub encrypted: bool,
}

impl Envelope {
    pub fn new(message_id: u16, terminal_id: TerminalId) -> Self {
        Self {
            message_id,
            terminal_id,
            encrypted: false,
        }
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }
}

/// Identifies one multi-part message in flight.
///
/// Two interleaved messages with the same id and terminal but different
/// totals are kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReassemblyKey {
    pub message_id: u16,
    pub terminal_id: TerminalId,
    pub total: u16,
}

/// A complete inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: u16,
    pub terminal_id: TerminalId,
    pub encrypted: bool,
    pub payload: Bytes,
}

impl Message {
    /// Addressing of this message, suitable for replying with the same id.
    pub fn envelope(&self) -> Envelope {
        Envelope {
            message_id: self.message_id,
            terminal_id: self.terminal_id,
            encrypted: self.encrypted,
        }
    }
}

/// Outcome of feeding one frame to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// The frame completed a message.
    Complete(Message),
    /// The frame was stored; more sub-packets are needed.
    Pending {
        key: ReassemblyKey,
        received: usize,
        total: u16,
    },
}

#[derive(Debug)]
struct PendingMessage {
    buffer: ReassemblyBuffer,
    encrypted: bool,
    last_activity: Instant,
}

/// Per-link protocol state.
///
/// Owns the outbound serial-number counter and the set of partially
/// received multi-part messages. A session is not shared between threads;
/// wrap it in a mutex if several senders need it.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    next_serial: u16,
    pending: HashMap<ReassemblyKey, PendingMessage>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            next_serial: config.initial_serial_number,
            config,
            pending: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The serial number the next outbound frame will carry.
    pub fn next_serial_number(&self) -> u16 {
        self.next_serial
    }

    /// Number of multi-part messages still waiting for sub-packets.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn take_serial(&mut self) -> u16 {
        let serial = self.next_serial;
        self.next_serial = serial.wrapping_add(1);
        serial
    }

    /// Send a message whose payload is read from `payload`.
    ///
    /// Payloads longer than the configured body limit are split into
    /// sub-packets, each with its own serial number. Exactly
    /// `payload_length` bytes are read from the source. A serial number is
    /// consumed before its body is read, so a failed send still advances
    /// the counter.
    ///
    /// Returns the number of frames written.
    pub fn send<W: Write, R: Read>(
        &mut self,
        writer: &mut FrameWriter<W>,
        envelope: &Envelope,
        mut payload: R,
        payload_length: usize,
    ) -> Result<u16> {
        let parts = split(payload_length, self.config.max_body_length)?;
        let total = parts.total();
        let mut body = Vec::with_capacity(payload_length.min(self.config.max_body_length));

        for part in parts {
            let mut header = Header::new(envelope.message_id, envelope.terminal_id)
                .with_encrypted(envelope.encrypted)
                .with_serial_number(self.take_serial());
            part.apply(&mut header)?;

            body.resize(part.body_length, 0);
            payload
                .read_exact(&mut body)
                .map_err(SessionError::Payload)?;
            writer.send(&header, &body)?;

            trace!(
                message_id = envelope.message_id,
                serial_number = header.serial_number,
                index = part.index,
                total,
                "frame sent"
            );
        }

        debug!(
            message_id = envelope.message_id,
            terminal_id = %envelope.terminal_id,
            bytes = payload_length,
            frames = total,
            "message sent"
        );
        Ok(total)
    }

    /// Send a message from an in-memory payload.
    pub fn send_bytes<W: Write>(
        &mut self,
        writer: &mut FrameWriter<W>,
        envelope: &Envelope,
        payload: &[u8],
    ) -> Result<u16> {
        self.send(writer, envelope, payload, payload.len())
    }

    /// Feed one raw frame read off the transport.
    ///
    /// `raw` is the escaped span between two flag markers. Surrounding
    /// markers are tolerated and stripped.
    pub fn receive(&mut self, raw: &[u8]) -> Result<Received> {
        let raw = raw.strip_prefix(&[FLAG]).unwrap_or(raw);
        let raw = raw.strip_suffix(&[FLAG]).unwrap_or(raw);
        let frame = parse_frame(raw)?;
        self.receive_frame(frame)
    }

    /// Feed one already decoded frame.
    ///
    /// Unsplit frames complete immediately. Sub-packets are collected per
    /// [`ReassemblyKey`]; the buffer is released once every index has
    /// arrived. An error affects only the frame that caused it.
    pub fn receive_frame(&mut self, frame: Frame) -> Result<Received> {
        let now = Instant::now();
        self.evict_stale(now);

        let header = frame.header;
        header.verify()?;

        let (Some(total), Some(index)) = (header.total(), header.index()) else {
            return Ok(Received::Complete(Message {
                message_id: header.message_id,
                terminal_id: header.terminal_id,
                encrypted: header.is_encrypted(),
                payload: frame.body,
            }));
        };

        let key = ReassemblyKey {
            message_id: header.message_id,
            terminal_id: header.terminal_id,
            total,
        };
        let full = self.pending.len() >= self.config.max_pending_messages;
        if full && !self.pending.contains_key(&key) {
            self.evict_oldest();
        }

        let pending = match self.pending.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(
                    message_id = key.message_id,
                    terminal_id = %key.terminal_id,
                    total,
                    "reassembly started"
                );
                entry.insert(PendingMessage {
                    buffer: ReassemblyBuffer::new(total)?,
                    encrypted: header.is_encrypted(),
                    last_activity: now,
                })
            }
        };
        pending.buffer.put(index, frame.body)?;
        pending.last_activity = now;

        if !pending.buffer.is_ready() {
            trace!(
                message_id = key.message_id,
                index,
                received = pending.buffer.filled(),
                total,
                "sub-packet stored"
            );
            return Ok(Received::Pending {
                key,
                received: pending.buffer.filled(),
                total,
            });
        }

        let payload = pending.buffer.assemble()?;
        let encrypted = pending.encrypted;
        self.pending.remove(&key);
        debug!(
            message_id = key.message_id,
            terminal_id = %key.terminal_id,
            bytes = payload.len(),
            total,
            "reassembly complete"
        );
        Ok(Received::Complete(Message {
            message_id: key.message_id,
            terminal_id: key.terminal_id,
            encrypted,
            payload,
        }))
    }

    /// Drop partial messages idle for longer than the reassembly timeout.
    ///
    /// Returns the number of messages dropped.
    pub fn evict_stale(&mut self, now: Instant) -> usize {
        let timeout = self.config.reassembly_timeout;
        let before = self.pending.len();
        self.pending.retain(|key, pending| {
            let idle = now.saturating_duration_since(pending.last_activity);
            if idle < timeout {
                return true;
            }
            warn!(
                message_id = key.message_id,
                terminal_id = %key.terminal_id,
                received = pending.buffer.filled(),
                total = key.total,
                idle_ms = idle.as_millis() as u64,
                "dropping stale partial message"
            );
            false
        });
        before - self.pending.len()
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .pending
            .iter()
            .min_by_key(|(_, pending)| pending.last_activity)
            .map(|(key, _)| *key);
        if let Some(key) = oldest {
            self.pending.remove(&key);
            warn!(
                message_id = key.message_id,
                terminal_id = %key.terminal_id,
                limit = self.config.max_pending_messages,
                "pending message limit reached, dropping oldest"
            );
        }
    }
}
