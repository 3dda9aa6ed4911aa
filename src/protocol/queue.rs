//! Outbound delivery queue for tunnelling requests.
//!
//! A tunnel channel may only have one unacknowledged `TUNNELING_REQUEST` at a
//! time. [`OutboundDeliveryQueue`] holds the FIFO of waiting messages, the
//! single in-flight entry with its sequence number and the retransmission
//! deadline. It performs no I/O: every call that puts a frame on the wire
//! returns a [`Transmission`] for the caller to send.
//!
//! ```text
//!            enqueue                   confirm(seq)
//!  pending ──────────► in flight ─────────────────► next pending
//!                        │   ▲
//!              deadline  │   │ same sequence
//!                        └───┘
//! ```

use embassy_time::{Duration, Instant};
use heapless::Deque;

use crate::error::{KnxError, Result};
use crate::knx_log;
use crate::protocol::cemi::CemiMessage;

/// Maximum number of messages the queue can hold (in flight included)
pub const MAX_QUEUE_CAPACITY: usize = 32;

/// A frame the caller has to put on the wire now
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transmission {
    /// Sequence number to place in the connection header
    pub sequence: u8,
    /// Message to carry
    pub message: CemiMessage,
    /// 0 for the first transmission, then 1, 2, ... for retransmissions
    pub retransmission: u32,
}

/// Outcome of an expired retransmission deadline
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueTimeout {
    /// Send the in-flight message again with its original sequence number
    Retransmit(Transmission),
    /// The retransmission limit was reached; the message was dropped and the
    /// next pending message (if any) is now in flight
    Exhausted {
        /// Sequence number of the dropped message
        sequence: u8,
        /// The dropped message
        message: CemiMessage,
        /// First transmission of the next pending message
        next: Option<Transmission>,
    },
}

#[derive(Debug)]
struct InFlight {
    sequence: u8,
    message: CemiMessage,
    deadline: Instant,
    retransmissions: u32,
}

impl InFlight {
    fn transmission(&self) -> Transmission {
        Transmission {
            sequence: self.sequence,
            message: self.message.clone(),
            retransmission: self.retransmissions,
        }
    }
}

/// FIFO, single-in-flight, retransmitting send queue
///
/// # Examples
///
/// ```
/// use embassy_time::{Duration, Instant};
/// use knx_ip_client::protocol::cemi::CemiMessage;
/// use knx_ip_client::protocol::constants::CemiService;
/// use knx_ip_client::protocol::queue::OutboundDeliveryQueue;
/// use knx_ip_client::{GroupAddress, IndividualAddress};
///
/// let msg = CemiMessage::group_read(CemiService::Request, IndividualAddress::from(0), GroupAddress::from(1));
/// let mut queue = OutboundDeliveryQueue::new(Duration::from_millis(1000));
/// let start = Instant::from_millis(0);
///
/// let first = queue.enqueue(msg.clone(), start)?.expect("idle queue transmits at once");
/// assert!(queue.enqueue(msg, start)?.is_none());
///
/// let (confirmed, next) = queue.confirm(first.sequence, start).expect("matching sequence");
/// assert_eq!(confirmed, first.message);
/// assert_eq!(next.map(|t| t.sequence), Some(1));
/// # Ok::<(), knx_ip_client::KnxError>(())
/// ```
#[derive(Debug)]
pub struct OutboundDeliveryQueue {
    pending: Deque<CemiMessage, MAX_QUEUE_CAPACITY>,
    in_flight: Option<InFlight>,
    next_sequence: u8,
    interval: Duration,
    max_retransmits: Option<u32>,
    capacity: usize,
}

impl OutboundDeliveryQueue {
    /// Create an idle queue that retransmits every `interval`, forever.
    pub const fn new(interval: Duration) -> Self {
        Self {
            pending: Deque::new(),
            in_flight: None,
            next_sequence: 0,
            interval,
            max_retransmits: None,
            capacity: MAX_QUEUE_CAPACITY,
        }
    }

    /// Give up after `max` retransmissions of the same message (`None` never gives up).
    #[must_use]
    pub const fn with_max_retransmits(mut self, max: Option<u32>) -> Self {
        self.max_retransmits = max;
        self
    }

    /// Limit the number of queued messages (clamped to [`MAX_QUEUE_CAPACITY`]).
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.clamp(1, MAX_QUEUE_CAPACITY);
        self
    }

    /// Append `message`. Returns its first transmission if the queue was idle.
    ///
    /// # Errors
    ///
    /// Returns `Tunneling/QueueFull` when the queue is at capacity.
    pub fn enqueue(&mut self, message: CemiMessage, now: Instant) -> Result<Option<Transmission>> {
        if self.len() >= self.capacity {
            return Err(KnxError::queue_full());
        }
        if self.in_flight.is_some() {
            self.pending.push_back(message).map_err(|_| KnxError::queue_full())?;
            return Ok(None);
        }
        Ok(Some(self.launch(message, now)))
    }

    /// Confirm the in-flight entry carrying `sequence`.
    ///
    /// Returns the confirmed message and the first transmission of the next
    /// pending one. A sequence that does not match the in-flight entry (a late
    /// or duplicate ack) returns `None` and changes nothing.
    pub fn confirm(&mut self, sequence: u8, now: Instant) -> Option<(CemiMessage, Option<Transmission>)> {
        if self.in_flight.as_ref()?.sequence != sequence {
            knx_log!(debug, "ack for sequence {} does not match in-flight request", sequence);
            return None;
        }
        let done = self.in_flight.take()?;
        let next = self.pending.pop_front().map(|msg| self.launch(msg, now));
        Some((done.message, next))
    }

    /// Handle the retransmission deadline. Does nothing before it is due.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<QueueTimeout> {
        let entry = self.in_flight.as_mut()?;
        if now < entry.deadline {
            return None;
        }

        if self.max_retransmits.is_some_and(|max| entry.retransmissions >= max) {
            let dropped = self.in_flight.take()?;
            let next = self.pending.pop_front().map(|msg| self.launch(msg, now));
            return Some(QueueTimeout::Exhausted {
                sequence: dropped.sequence,
                message: dropped.message,
                next,
            });
        }

        entry.retransmissions += 1;
        entry.deadline = now + self.interval;
        knx_log!(
            warn,
            "retransmitting sequence {} (attempt {})",
            entry.sequence,
            entry.retransmissions
        );
        Some(QueueTimeout::Retransmit(entry.transmission()))
    }

    /// Instant at which [`poll_timeout`](Self::poll_timeout) has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.as_ref().map(|entry| entry.deadline)
    }

    /// Sequence number of the in-flight entry
    pub fn in_flight_sequence(&self) -> Option<u8> {
        self.in_flight.as_ref().map(|entry| entry.sequence)
    }

    /// Number of messages held, in flight included
    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.in_flight.is_some())
    }

    /// True when nothing is pending or in flight
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending and in-flight entry and disarm the timer.
    ///
    /// The sequence counter restarts at 0 for the next channel.
    pub fn dispose(&mut self) {
        let dropped = self.len();
        if dropped > 0 {
            knx_log!(debug, "dropping {} undelivered message(s)", dropped);
        }
        self.pending.clear();
        self.in_flight = None;
        self.next_sequence = 0;
    }

    fn launch(&mut self, message: CemiMessage, now: Instant) -> Transmission {
        let entry = InFlight {
            sequence: self.next_sequence,
            message,
            deadline: now + self.interval,
            retransmissions: 0,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        let transmission = entry.transmission();
        self.in_flight = Some(entry);
        transmission
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::{GroupAddress, IndividualAddress};
    use crate::protocol::constants::CemiService;

    const INTERVAL: Duration = Duration::from_millis(1000);

    fn msg(value: u8) -> CemiMessage {
        CemiMessage::group_write(
            CemiService::Request,
            IndividualAddress::from(0x1101),
            GroupAddress::from(0x0101),
            &[0, value],
        )
        .unwrap()
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL);
        let first = queue.enqueue(msg(1), at(0)).unwrap().unwrap();
        assert!(queue.enqueue(msg(2), at(0)).unwrap().is_none());
        assert!(queue.enqueue(msg(3), at(0)).unwrap().is_none());

        let (m1, next) = queue.confirm(first.sequence, at(10)).unwrap();
        assert_eq!(m1, msg(1));
        let next = next.unwrap();
        assert_eq!(next.message, msg(2));

        let (m2, next) = queue.confirm(next.sequence, at(20)).unwrap();
        assert_eq!(m2, msg(2));
        let next = next.unwrap();

        let (m3, next) = queue.confirm(next.sequence, at(30)).unwrap();
        assert_eq!(m3, msg(3));
        assert!(next.is_none());
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_at_most_one_in_flight() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL);
        assert!(queue.enqueue(msg(1), at(0)).unwrap().is_some());
        assert!(queue.enqueue(msg(2), at(0)).unwrap().is_none());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.in_flight_sequence(), Some(0));
    }

    #[test]
    fn test_retransmits_same_sequence_indefinitely() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL);
        let first = queue.enqueue(msg(1), at(0)).unwrap().unwrap();
        assert_eq!(queue.poll_timeout(at(999)), None);

        for tick in 1..=20u32 {
            let now = at(u64::from(tick) * 1000);
            let Some(QueueTimeout::Retransmit(t)) = queue.poll_timeout(now) else {
                panic!("expected retransmission at tick {tick}");
            };
            assert_eq!(t.sequence, first.sequence);
            assert_eq!(t.message, first.message);
            assert_eq!(t.retransmission, tick);
            assert_eq!(queue.next_deadline(), Some(now + INTERVAL));
        }
    }

    #[test]
    fn test_bounded_retransmits() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL).with_max_retransmits(Some(2));
        queue.enqueue(msg(1), at(0)).unwrap();
        queue.enqueue(msg(2), at(0)).unwrap();
        assert!(matches!(queue.poll_timeout(at(1000)), Some(QueueTimeout::Retransmit(_))));
        assert!(matches!(queue.poll_timeout(at(2000)), Some(QueueTimeout::Retransmit(_))));

        let Some(QueueTimeout::Exhausted { sequence, message, next }) = queue.poll_timeout(at(3000)) else {
            panic!("expected exhaustion");
        };
        assert_eq!(sequence, 0);
        assert_eq!(message, msg(1));
        let next = next.unwrap();
        assert_eq!(next.sequence, 1);
        assert_eq!(next.message, msg(2));
    }

    #[test]
    fn test_confirm_wrong_sequence_ignored() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL);
        queue.enqueue(msg(1), at(0)).unwrap();
        assert!(queue.confirm(7, at(5)).is_none());
        assert_eq!(queue.in_flight_sequence(), Some(0));
        assert!(OutboundDeliveryQueue::new(INTERVAL).confirm(0, at(0)).is_none());
    }

    #[test]
    fn test_confirm_rearms_timer_for_next() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL);
        let first = queue.enqueue(msg(1), at(0)).unwrap().unwrap();
        queue.enqueue(msg(2), at(0)).unwrap();
        queue.confirm(first.sequence, at(400)).unwrap();
        assert_eq!(queue.next_deadline(), Some(at(1400)));
    }

    #[test]
    fn test_sequence_wraps() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL);
        for expected in 0..=255u8 {
            let t = queue.enqueue(msg(0), at(0)).unwrap().unwrap();
            assert_eq!(t.sequence, expected);
            queue.confirm(t.sequence, at(0)).unwrap();
        }
        assert_eq!(queue.enqueue(msg(0), at(0)).unwrap().unwrap().sequence, 0);
    }

    #[test]
    fn test_capacity() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL).with_capacity(2);
        queue.enqueue(msg(1), at(0)).unwrap();
        queue.enqueue(msg(2), at(0)).unwrap();
        let err = queue.enqueue(msg(3), at(0)).unwrap_err();
        assert!(matches!(err, KnxError::Tunneling(ref e) if e.is_queue_full()));
    }

    #[test]
    fn test_dispose() {
        let mut queue = OutboundDeliveryQueue::new(INTERVAL);
        queue.enqueue(msg(1), at(0)).unwrap();
        queue.enqueue(msg(2), at(0)).unwrap();
        queue.dispose();
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
        assert_eq!(queue.poll_timeout(at(5000)), None);
        assert_eq!(queue.enqueue(msg(3), at(6000)).unwrap().unwrap().sequence, 0);
    }
}
