//! Per-league buffers feeding the streaming model.

use crate::config::StreamingEnvConfig;
use crate::domain::league::League;
use crate::domain::ml::FeatureVector;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One real-time observation; only labelled items train the model
#[derive(Debug, Clone, PartialEq)]
pub struct StreamItem {
    pub features: FeatureVector,
    pub outcome: Option<f64>,
}

#[derive(Default)]
struct LeagueQueue {
    items: VecDeque<StreamItem>,
    /// Absent means never flushed, read as the Unix epoch
    last_flush: Option<SystemTime>,
}

/// Bounded FIFO queues with batch flushing.
///
/// A batch is released once the queue holds at least `batch_size` items and
/// `flush_interval` has passed since the previous flush.
pub struct StreamBuffer {
    queues: Mutex<HashMap<League, LeagueQueue>>,
    capacity: usize,
    batch_size: usize,
    flush_interval: Duration,
}

impl StreamBuffer {
    pub fn new(config: &StreamingEnvConfig) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            capacity: config.queue_capacity.max(1),
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<League, LeagueQueue>> {
        match self.queues.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("StreamBuffer: Lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Append an item, dropping the oldest when full. Returns the new depth.
    pub fn enqueue(&self, league: League, item: StreamItem) -> usize {
        let mut queues = self.lock();
        let queue = queues.entry(league).or_default();
        queue.items.push_back(item);
        while queue.items.len() > self.capacity {
            queue.items.pop_front();
        }
        queue.items.len()
    }

    pub fn depth(&self, league: League) -> usize {
        self.lock().get(&league).map(|q| q.items.len()).unwrap_or(0)
    }

    pub fn take_batch_if_due(&self, league: League) -> Option<Vec<StreamItem>> {
        self.take_batch_if_due_at(league, SystemTime::now())
    }

    /// Remove and return up to `batch_size` of the oldest items if a flush is
    /// due at `now`, recording `now` as the flush time.
    pub fn take_batch_if_due_at(&self, league: League, now: SystemTime) -> Option<Vec<StreamItem>> {
        let mut queues = self.lock();
        let queue = queues.get_mut(&league)?;
        if queue.items.len() < self.batch_size {
            return None;
        }
        let last = queue.last_flush.unwrap_or(UNIX_EPOCH);
        let elapsed = now.duration_since(last).unwrap_or(Duration::ZERO);
        if elapsed < self.flush_interval {
            return None;
        }

        let batch: Vec<StreamItem> = queue.items.drain(..self.batch_size).collect();
        queue.last_flush = Some(now);
        while queue.items.len() > self.capacity {
            queue.items.pop_front();
        }
        Some(batch)
    }

    /// Drop every queued item
    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize, batch: usize, interval_secs: u64) -> StreamBuffer {
        StreamBuffer::new(&StreamingEnvConfig {
            queue_capacity: capacity,
            batch_size: batch,
            flush_interval_secs: interval_secs,
        })
    }

    fn item(i: usize) -> StreamItem {
        StreamItem {
            features: FeatureVector::new(vec![i as f64]),
            outcome: Some((i % 2) as f64),
        }
    }

    #[test]
    fn test_no_flush_below_batch_size() {
        let buf = buffer(100, 5, 10);
        for i in 0..4 {
            buf.enqueue(League::Nba, item(i));
        }
        assert!(buf.take_batch_if_due(League::Nba).is_none());
        assert!(buf.take_batch_if_due(League::Nfl).is_none());
    }

    #[test]
    fn test_first_flush_is_immediate_then_waits_interval() {
        let buf = buffer(100, 5, 10);
        for i in 0..12 {
            buf.enqueue(League::Nba, item(i));
        }
        let now = SystemTime::now();
        let batch = buf.take_batch_if_due_at(League::Nba, now).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(batch[0], item(0));
        assert_eq!(buf.depth(League::Nba), 7);

        assert!(buf.take_batch_if_due_at(League::Nba, now + Duration::from_secs(5)).is_none());
        let batch = buf
            .take_batch_if_due_at(League::Nba, now + Duration::from_secs(10))
            .unwrap();
        assert_eq!(batch[0], item(5));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let buf = buffer(3, 50, 10);
        for i in 0..5 {
            assert!(buf.enqueue(League::Mls, item(i)) <= 3);
        }
        assert_eq!(buf.depth(League::Mls), 3);
        buf.clear();
        assert_eq!(buf.depth(League::Mls), 0);
    }
}
