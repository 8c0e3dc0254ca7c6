//! Debounced mirror of local profile mutations to the platform.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use campusnet_shared::{ApiError, ProfileMetadata};
use tokio::task::JoinHandle;

/// Quiescence window before an accumulated patch is written remotely.
pub const SYNC_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Remote half of the profile mirror.
#[async_trait]
pub trait ProfileRemote: Send + Sync {
    async fn update_user_metadata(&self, data: &ProfileMetadata) -> Result<(), ApiError>;
}

/// Coalesces rapid profile mutations into one remote write per quiescence
/// window.
///
/// Patches merge field-wise into a pending buffer, so a burst of distinct
/// mutations flushes as their union rather than last-call-wins. Fields
/// touched since the last successful write survive a failed flush; there is
/// no retry timer beyond that.
#[derive(Clone)]
pub struct CloudSync {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    remote: Arc<dyn ProfileRemote>,
    pending: Mutex<ProfileMetadata>,
    timer: Mutex<Option<JoinHandle<()>>>,
    delay: Duration,
}

impl CloudSync {
    pub fn new(remote: Arc<dyn ProfileRemote>) -> Self {
        Self::with_delay(remote, SYNC_DEBOUNCE)
    }

    pub fn with_delay(remote: Arc<dyn ProfileRemote>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                remote,
                pending: Mutex::new(ProfileMetadata::default()),
                timer: Mutex::new(None),
                delay,
            }),
        }
    }

    /// Merge `patch` into the pending buffer and restart the flush timer.
    pub fn queue(&self, patch: ProfileMetadata) {
        self.inner.pending.lock().unwrap().merge(patch);

        let mut timer = self.inner.timer.lock().unwrap();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        let inner = self.inner.clone();
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            flush(&inner).await;
        }));
    }

    /// Write any pending fields immediately, cancelling the timer.
    pub async fn flush_now(&self) {
        if let Some(handle) = self.inner.timer.lock().unwrap().take() {
            handle.abort();
        }
        flush(&self.inner).await;
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.pending.lock().unwrap().is_empty()
    }
}

async fn flush(inner: &Arc<SyncInner>) {
    let patch = std::mem::take(&mut *inner.pending.lock().unwrap());
    if patch.is_empty() {
        return;
    }
    if let Err(e) = inner.remote.update_user_metadata(&patch).await {
        tracing::warn!("cloud sync failed: {e}");
        // put the touched fields back so the next flush carries them;
        // anything queued meanwhile wins per field
        let mut pending = inner.pending.lock().unwrap();
        let queued_meanwhile = std::mem::replace(&mut *pending, patch);
        pending.merge(queued_meanwhile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingRemote {
        writes: Mutex<Vec<ProfileMetadata>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ProfileRemote for RecordingRemote {
        async fn update_user_metadata(&self, data: &ProfileMetadata) -> Result<(), ApiError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Network("offline".to_string()));
            }
            self.writes.lock().unwrap().push(data.clone());
            Ok(())
        }
    }

    fn xp_patch(xp: u32) -> ProfileMetadata {
        ProfileMetadata {
            xp: Some(xp),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_coalesces_into_one_union_write() {
        let remote = Arc::new(RecordingRemote::default());
        let sync = CloudSync::new(remote.clone());

        sync.queue(xp_patch(10));
        tokio::time::sleep(Duration::from_millis(500)).await;
        sync.queue(ProfileMetadata {
            bio: Some("hello".to_string()),
            ..Default::default()
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        sync.queue(xp_patch(25));

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let writes = remote.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].xp, Some(25));
        assert_eq!(writes[0].bio.as_deref(), Some("hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_windows_produce_separate_writes() {
        let remote = Arc::new(RecordingRemote::default());
        let sync = CloudSync::new(remote.clone());

        sync.queue(xp_patch(10));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        sync.queue(xp_patch(20));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let writes = remote.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].xp, Some(10));
        assert_eq!(writes[1].xp, Some(20));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_keeps_touched_fields_for_the_next_one() {
        let remote = Arc::new(RecordingRemote::default());
        let sync = CloudSync::new(remote.clone());

        remote.fail.store(true, Ordering::SeqCst);
        sync.queue(ProfileMetadata {
            tagline: Some("Builder".to_string()),
            ..Default::default()
        });
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(remote.writes.lock().unwrap().is_empty());
        assert!(sync.has_pending());

        remote.fail.store(false, Ordering::SeqCst);
        sync.queue(xp_patch(40));
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let writes = remote.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].tagline.as_deref(), Some("Builder"));
        assert_eq!(writes[0].xp, Some(40));
        assert!(!sync.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_now_skips_the_wait() {
        let remote = Arc::new(RecordingRemote::default());
        let sync = CloudSync::new(remote.clone());

        sync.queue(xp_patch(5));
        sync.flush_now().await;

        assert_eq!(remote.writes.lock().unwrap().len(), 1);
        assert!(!sync.has_pending());
    }
}
