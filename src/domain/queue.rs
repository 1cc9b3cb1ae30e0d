use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::domain::AudioFrame;

/// An entry in the signal queue.
#[derive(Debug, PartialEq, Eq)]
pub enum QueueItem {
    Frame(AudioFrame),
    /// Terminal marker: no more data will arrive for this session. Pushed
    /// exactly once per session, strictly after the last real frame.
    EndOfStream,
}

/// Unbounded FIFO handing frames from the real-time capture callback to the
/// file writer.
///
/// `push` never blocks beyond the short internal lock, so the producer is
/// safe to call from the device callback. `pop` suspends the calling thread
/// until an item arrives; only the consumer does that. Depth is observable
/// so a session start can detect (and warn about) residue left behind by a
/// session that did not drain cleanly.
#[derive(Default)]
pub struct SignalQueue {
    items: Mutex<VecDeque<QueueItem>>,
    ready: Condvar,
}

impl SignalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: QueueItem) {
        let mut items = self.items.lock();
        items.push_back(item);
        self.ready.notify_one();
    }

    /// Block the calling thread until an item is available, then take it.
    pub fn pop(&self) -> QueueItem {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            self.ready.wait(&mut items);
        }
    }

    /// Take the front item if one is queued.
    pub fn try_pop(&self) -> Option<QueueItem> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Discard all queued items, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let dropped = items.len();
        items.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame {
            seq,
            samples: vec![seq as i16; 4],
        }
    }

    #[test]
    fn test_fifo_order_preserved() {
        let queue = SignalQueue::new();
        for seq in 0..5 {
            queue.push(QueueItem::Frame(frame(seq)));
        }
        queue.push(QueueItem::EndOfStream);

        for seq in 0..5 {
            match queue.pop() {
                QueueItem::Frame(f) => assert_eq!(f.seq, seq),
                QueueItem::EndOfStream => panic!("sentinel before frames"),
            }
        }
        assert_eq!(queue.pop(), QueueItem::EndOfStream);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear_reports_dropped_count() {
        let queue = SignalQueue::new();
        queue.push(QueueItem::Frame(frame(0)));
        queue.push(QueueItem::Frame(frame(1)));
        queue.push(QueueItem::EndOfStream);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(SignalQueue::new());
        let producer = Arc::clone(&queue);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            producer.push(QueueItem::Frame(frame(7)));
        });

        match queue.pop() {
            QueueItem::Frame(f) => assert_eq!(f.seq, 7),
            QueueItem::EndOfStream => panic!("unexpected sentinel"),
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_try_pop_on_empty_queue() {
        let queue = SignalQueue::new();
        assert!(queue.try_pop().is_none());
    }
}
