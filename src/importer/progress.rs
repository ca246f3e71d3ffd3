use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Counters shared by the import pool and its jobs.
#[derive(Clone)]
pub struct ImportProgress {
    inner: Arc<Inner>,
}

struct Inner {
    repos_total: AtomicUsize,
    repos_done: AtomicUsize,
    repos_failed: AtomicUsize,
    references: AtomicUsize,
    edges: AtomicUsize,
    is_active: AtomicBool,
    started_at: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub is_active: bool,
    pub repos_total: usize,
    /// Finished jobs, failed ones included.
    pub repos_done: usize,
    pub repos_failed: usize,
    pub references: usize,
    pub edges: usize,
    pub elapsed_ms: u64,
    pub eta_ms: Option<u64>,
}

impl ImportProgress {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                repos_total: AtomicUsize::new(0),
                repos_done: AtomicUsize::new(0),
                repos_failed: AtomicUsize::new(0),
                references: AtomicUsize::new(0),
                edges: AtomicUsize::new(0),
                is_active: AtomicBool::new(false),
                started_at: Mutex::new(None),
            }),
        }
    }

    pub fn start(&self, total_repos: usize) {
        self.inner.repos_total.store(total_repos, Ordering::Release);
        self.inner.repos_done.store(0, Ordering::Release);
        self.inner.repos_failed.store(0, Ordering::Release);
        self.inner.references.store(0, Ordering::Release);
        self.inner.edges.store(0, Ordering::Release);
        self.inner.is_active.store(true, Ordering::Release);
        *self
            .inner
            .started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    pub fn inc(&self, references: usize, edges: usize) {
        self.inner.repos_done.fetch_add(1, Ordering::Relaxed);
        self.inner.references.fetch_add(references, Ordering::Relaxed);
        self.inner.edges.fetch_add(edges, Ordering::Relaxed);
    }

    pub fn inc_error(&self) {
        self.inner.repos_done.fetch_add(1, Ordering::Relaxed);
        self.inner.repos_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        self.inner.is_active.store(false, Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let is_active = self.inner.is_active.load(Ordering::Acquire);
        let repos_total = self.inner.repos_total.load(Ordering::Acquire);
        let repos_done = self.inner.repos_done.load(Ordering::Acquire);

        let elapsed_ms = self
            .inner
            .started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let eta_ms = if is_active && repos_done > 0 && repos_done < repos_total {
            let ms_per_repo = elapsed_ms as f64 / repos_done as f64;
            Some(((repos_total - repos_done) as f64 * ms_per_repo) as u64)
        } else {
            None
        };

        ProgressSnapshot {
            is_active,
            repos_total,
            repos_done,
            repos_failed: self.inner.repos_failed.load(Ordering::Acquire),
            references: self.inner.references.load(Ordering::Acquire),
            edges: self.inner.edges.load(Ordering::Acquire),
            elapsed_ms,
            eta_ms,
        }
    }
}

impl Default for ImportProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let progress = ImportProgress::new();
        progress.start(3);
        progress.inc(10, 2);
        progress.inc_error();

        let snapshot = progress.snapshot();
        assert!(snapshot.is_active);
        assert_eq!(snapshot.repos_done, 2);
        assert_eq!(snapshot.repos_failed, 1);
        assert_eq!(snapshot.references, 10);
        assert_eq!(snapshot.edges, 2);

        progress.finish();
        assert!(!progress.snapshot().is_active);
        assert_eq!(progress.snapshot().eta_ms, None);
    }

    #[test]
    fn test_clones_share_counters() {
        let progress = ImportProgress::new();
        progress.start(2);
        let other = progress.clone();
        other.inc(1, 0);
        assert_eq!(progress.snapshot().repos_done, 1);
    }
}
