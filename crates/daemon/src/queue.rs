//! Hand-off queue between the capture loop and the namespace sender.
//!
//! The queue is the only state shared between the two sides. It is
//! unbounded: if the sender stalls, entries accumulate. That is an
//! accepted trade-off; dropping events here would defeat the point of
//! forwarding them.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use ueventfw_protocol::DeviceEvent;

/// FIFO hand-off queue for captured device events.
///
/// `push` never blocks and is safe under concurrent producers.
/// `drain_blocking` is meant for a single consumer: it takes every
/// queued entry in one go, so the consumer only re-blocks on an empty
/// queue. Events drain in arrival order.
pub struct EventQueue {
    entries: Mutex<VecDeque<DeviceEvent>>,
    ready: Condvar,
    pushed: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            pushed: AtomicU64::new(0),
        }
    }

    /// Append one event and wake the consumer.
    pub fn push(&self, event: DeviceEvent) {
        let mut entries = self.entries.lock();
        entries.push_back(event);
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.ready.notify_one();
    }

    /// Block until at least one event is queued, then take all of them.
    pub fn drain_blocking(&self) -> VecDeque<DeviceEvent> {
        let mut entries = self.entries.lock();
        while entries.is_empty() {
            self.ready.wait(&mut entries);
        }
        std::mem::take(&mut *entries)
    }

    /// Total number of events ever pushed.
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn event(seq: u64) -> DeviceEvent {
        DeviceEvent::from_properties(vec![("SEQNUM".to_string(), seq.to_string())])
    }

    fn seq(event: &DeviceEvent) -> u64 {
        event.properties[0].1.parse().unwrap()
    }

    #[test]
    fn test_drain_returns_arrival_order() {
        let queue = EventQueue::new();
        queue.push(event(1));
        queue.push(event(2));
        queue.push(event(3));

        let drained: Vec<u64> = queue.drain_blocking().iter().map(seq).collect();
        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn test_drain_takes_everything() {
        let queue = EventQueue::new();
        for i in 0..10 {
            queue.push(event(i));
        }
        assert_eq!(queue.len(), 10);
        assert_eq!(queue.drain_blocking().len(), 10);
        assert!(queue.is_empty());
        assert_eq!(queue.pushed(), 10);
    }

    #[test]
    fn test_drain_blocks_until_push() {
        let queue = Arc::new(EventQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.drain_blocking())
        };

        // Give the consumer a chance to block on the empty queue.
        thread::sleep(std::time::Duration::from_millis(50));
        queue.push(event(7));

        let drained = consumer.join().unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(seq(&drained[0]), 7);
    }

    #[test]
    fn test_concurrent_producers_no_loss_or_duplication() {
        const PRODUCERS: u64 = 8;
        const PER_PRODUCER: u64 = 250;

        let queue = Arc::new(EventQueue::new());
        let total = PRODUCERS * PER_PRODUCER;

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = Vec::with_capacity(total as usize);
                while (seen.len() as u64) < total {
                    seen.extend(queue.drain_blocking().iter().map(seq));
                }
                seen
            })
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push(event(p * PER_PRODUCER + i));
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }

        let mut seen = consumer.join().unwrap();
        assert_eq!(seen.len() as u64, total);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len() as u64, total, "duplicated or lost entries");
        assert!(queue.is_empty());
    }
}
