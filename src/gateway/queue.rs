//! The outbound message queue shared between API callers and the shard task.
//!
//! One deque, two logical lanes: priority messages (heartbeats, presence,
//! voice state) are drained before any normal message, while arrival
//! order is preserved within each lane. Draining respects the gateway
//! send budget of 120 messages per 60 s, two of which are held in
//! reserve so a heartbeat can never be starved by bulk traffic.

use crate::constants::{GATEWAY_RESERVED_HEARTBEATS, GATEWAY_SEND_LIMIT, GATEWAY_SEND_WINDOW};
use parking_lot::Mutex;
use std::{collections::VecDeque, time::Instant};

#[derive(Clone, Debug)]
pub(crate) struct OutboundMessage {
    pub json: String,
    pub heartbeat: bool,
}

#[derive(Debug, Default)]
struct QueueInner {
    messages: VecDeque<OutboundMessage>,
    /// Number of messages at the head belonging to the priority lane.
    priority_len: usize,
    /// Send timestamps within the current rate-limit window.
    sent: VecDeque<Instant>,
}

#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
    inner: Mutex<QueueInner>,
}

impl OutboundQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueues a normal-lane message at the tail.
    pub(crate) fn push(&self, json: String) {
        let mut inner = self.inner.lock();
        inner.messages.push_back(OutboundMessage {
            json,
            heartbeat: false,
        });
    }

    /// Enqueues a priority-lane message behind any earlier priority sends.
    pub(crate) fn push_priority(&self, json: String) {
        self.push_lane(json, false);
    }

    /// Enqueues a heartbeat, which also draws on the reserved send slots.
    pub(crate) fn push_heartbeat(&self, json: String) {
        self.push_lane(json, true);
    }

    fn push_lane(&self, json: String, heartbeat: bool) {
        let mut inner = self.inner.lock();
        let at = inner.priority_len;
        inner.messages.insert(at, OutboundMessage { json, heartbeat });
        inner.priority_len += 1;
    }

    /// Removes the next message the rate budget allows, recording its send.
    pub(crate) fn pop_sendable(&self, now: Instant) -> Option<OutboundMessage> {
        let mut inner = self.inner.lock();

        while let Some(&front) = inner.sent.front() {
            if now.duration_since(front) >= GATEWAY_SEND_WINDOW {
                inner.sent.pop_front();
            } else {
                break;
            }
        }

        let budget = if inner.messages.front()?.heartbeat {
            GATEWAY_SEND_LIMIT
        } else {
            GATEWAY_SEND_LIMIT - GATEWAY_RESERVED_HEARTBEATS
        };

        if inner.sent.len() >= budget {
            return None;
        }

        let msg = inner.messages.pop_front()?;
        inner.priority_len = inner.priority_len.saturating_sub(1);
        inner.sent.push_back(now);
        Some(msg)
    }

    /// Number of queued messages.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    /// Discards every queued message.
    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.messages.clear();
        inner.priority_len = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn drain(queue: &OutboundQueue) -> Vec<String> {
        let now = Instant::now();
        let mut out = Vec::new();
        while let Some(m) = queue.pop_sendable(now) {
            out.push(m.json);
        }
        out
    }

    #[test]
    fn priority_precedes_all_normal_traffic() {
        let q = OutboundQueue::new();

        q.push("chunk-1".into());
        q.push_heartbeat("hb-1".into());
        q.push("chunk-2".into());
        q.push_priority("presence".into());
        q.push_heartbeat("hb-2".into());

        // Heartbeats precede every normal message queued before them,
        // and both lanes stay FIFO internally.
        assert_eq!(
            drain(&q),
            vec!["hb-1", "presence", "hb-2", "chunk-1", "chunk-2"]
        );
    }

    #[test]
    fn normal_sends_leave_heartbeat_reserve() {
        let q = OutboundQueue::new();
        let now = Instant::now();

        for i in 0..GATEWAY_SEND_LIMIT {
            q.push(format!("m{i}"));
        }

        let mut sent = 0;
        while q.pop_sendable(now).is_some() {
            sent += 1;
        }
        assert_eq!(sent, GATEWAY_SEND_LIMIT - GATEWAY_RESERVED_HEARTBEATS);

        // The reserve is still open for heartbeats...
        q.push_heartbeat("hb-1".into());
        q.push_heartbeat("hb-2".into());
        q.push_heartbeat("hb-3".into());
        assert!(q.pop_sendable(now).is_some());
        assert!(q.pop_sendable(now).is_some());

        // ...but the hard window cap still binds.
        assert!(q.pop_sendable(now).is_none());

        // Once the window slides, sends resume.
        let later = now + GATEWAY_SEND_WINDOW;
        assert!(q.pop_sendable(later).is_some());
    }
}
