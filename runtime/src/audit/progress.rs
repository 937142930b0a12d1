//! Progress reporting for audits and paginated discovery.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// `current` of `total` records processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditProgress {
    pub current: usize,
    pub total: usize,
}

impl AuditProgress {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.current >= self.total
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Receives `(current, total)` after every processed unit of work.
///
/// Called on the caller's task; implementations must not block or panic.
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, current: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: FnMut(usize, usize) + Send,
{
    fn on_progress(&mut self, current: usize, total: usize) {
        self(current, total)
    }
}

/// Forwards progress into a channel. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver(pub UnboundedSender<AuditProgress>);

impl ProgressObserver for ChannelObserver {
    fn on_progress(&mut self, current: usize, total: usize) {
        let _ = self.0.send(AuditProgress { current, total });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut observer = |c: usize, t: usize| seen.push((c, t));
            observer.on_progress(1, 2);
            observer.on_progress(2, 2);
        }
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_channel_observer() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut observer = ChannelObserver(tx);
        observer.on_progress(3, 4);
        drop(observer);
        assert_eq!(rx.recv().await, Some(AuditProgress { current: 3, total: 4 }));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_fraction() {
        let p = AuditProgress { current: 1, total: 4 };
        assert_eq!(p.fraction(), 0.25);
        assert!(!p.is_complete());
        assert!(AuditProgress { current: 4, total: 4 }.is_complete());
        assert_eq!(AuditProgress::default().fraction(), 0.0);
    }
}
