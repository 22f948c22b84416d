use std::sync::Arc;

use async_lock::Mutex;
use log::{debug, error, info, warn};
use thiserror::Error;

use super::id::IdGenerator;
use super::store::{KvStore, StoreError};
use crate::models::{
    preview, relative_time, Clip, ClipSummary, Expiration, FeedEntry, FeedItem,
    ADMIN_PREVIEW_CHARS,
};

/// Reserved key holding the public feed.
pub const FEED_KEY: &str = "PUBLIC_FEED";

pub const FEED_CAPACITY: usize = 50;

pub const DEFAULT_MAX_ID_ATTEMPTS: usize = 1000;

#[derive(Debug, Error)]
pub enum ClipError {
    #[error("clip not found")]
    NotFound,

    #[error("no free clip id after {attempts} attempts")]
    IdSpaceExhausted { attempts: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed clip record: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created {
    /// Public clips are found through the feed, so no id is handed back.
    Public,
    Private { phrase_id: String },
}

/// Clip lifecycle on top of a key-value store.
pub struct ClipStore {
    kv: Arc<dyn KvStore>,
    ids: IdGenerator,
    max_id_attempts: usize,
    // Serialises feed read-modify-write within this process.
    feed_lock: Mutex<()>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl ClipStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        ClipStore {
            kv,
            ids: IdGenerator::from_entropy(),
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
            feed_lock: Mutex::new(()),
        }
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_max_id_attempts(mut self, attempts: usize) -> Self {
        self.max_id_attempts = attempts.max(1);
        self
    }

    /// Store a new clip. Public clips are always first-view and go into the feed.
    pub async fn create(
        &self,
        text: &str,
        is_public: bool,
        expiration: Expiration,
    ) -> Result<Created, ClipError> {
        let now = now_millis();

        if is_public {
            let id = self.ids.public_id(now);
            let clip = Clip {
                text: text.to_string(),
                is_public: true,
                expiration: Expiration::FirstView,
                created_at: now,
            };
            self.kv.put(&id, &serde_json::to_string(&clip)?, None).await?;

            if let Err(e) = self.push_feed_entry(FeedEntry::new(&id, text, now)).await {
                error!("Failed to add {} to the public feed: {}", id, e);
            }

            info!("Created public clip {}", id);
            return Ok(Created::Public);
        }

        let phrase_id = self.unused_phrase_id().await?;
        let clip = Clip {
            text: text.to_string(),
            is_public: false,
            expiration,
            created_at: now,
        };
        self.kv
            .put(&phrase_id, &serde_json::to_string(&clip)?, expiration.ttl_secs())
            .await?;

        info!("Created private clip {} ({})", phrase_id, expiration.as_str());
        Ok(Created::Private { phrase_id })
    }

    /// Read a clip. First-view clips are deleted as soon as they are found.
    pub async fn view(&self, id: &str) -> Result<String, ClipError> {
        let clip = self.fetch(id).await?.ok_or(ClipError::NotFound)?;

        if clip.expiration == Expiration::FirstView {
            self.kv.delete(id).await?;
            debug!("Consumed first-view clip {}", id);
        }

        Ok(clip.text)
    }

    /// Take a clip out of circulation and return its text.
    ///
    /// Any feed entry for the id is dropped, also when the clip itself is
    /// already gone; this is the only place stale feed entries get pruned.
    pub async fn copy(&self, id: &str) -> Result<String, ClipError> {
        let clip = match self.fetch(id).await? {
            Some(clip) => clip,
            None => {
                if let Err(e) = self.remove_feed_entry(id).await {
                    error!("Failed to prune {} from the public feed: {}", id, e);
                }
                return Err(ClipError::NotFound);
            }
        };

        self.kv.delete(id).await?;

        if let Err(e) = self.remove_feed_entry(id).await {
            error!("Failed to remove {} from the public feed: {}", id, e);
        }

        debug!("Copied clip {}", id);
        Ok(clip.text)
    }

    /// The public feed, newest first, with ages relative to now.
    pub async fn list_feed(&self) -> Result<Vec<FeedItem>, ClipError> {
        let now = now_millis();
        Ok(self
            .load_feed()
            .await?
            .into_iter()
            .map(|entry| FeedItem {
                timestamp: relative_time(now, entry.timestamp),
                id: entry.id,
                preview: entry.preview,
            })
            .collect())
    }

    /// Every stored clip, newest first. Scans the whole store.
    pub async fn admin_list(&self) -> Result<Vec<ClipSummary>, ClipError> {
        let mut clips = Vec::new();

        for id in self.kv.list().await? {
            if id == FEED_KEY {
                continue;
            }

            let clip = match self.fetch(&id).await {
                Ok(Some(clip)) => clip,
                Ok(None) => continue,
                Err(ClipError::Serialization(e)) => {
                    warn!("Skipping unreadable clip {}: {}", id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            clips.push(ClipSummary {
                preview: preview(&clip.text, ADMIN_PREVIEW_CHARS),
                id,
                is_public: clip.is_public,
                expiration: clip.expiration,
                created_at: clip.created_at,
            });
        }

        clips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(clips)
    }

    /// Remove a clip outright. The feed is left alone.
    pub async fn admin_delete(&self, id: &str) -> Result<(), ClipError> {
        if id == FEED_KEY {
            return Err(ClipError::NotFound);
        }

        self.kv.delete(id).await?;
        info!("Deleted clip {}", id);
        Ok(())
    }

    /// Round trip to the backing store.
    pub async fn health_check(&self) -> Result<(), ClipError> {
        self.kv.get(FEED_KEY).await?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Clip>, ClipError> {
        if id == FEED_KEY {
            return Ok(None);
        }

        match self.kv.get(id).await? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn unused_phrase_id(&self) -> Result<String, ClipError> {
        for attempt in 1..=self.max_id_attempts {
            let candidate = self.ids.phrase_id();
            if self.kv.get(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            debug!("Phrase id {} taken (attempt {})", candidate, attempt);
        }

        Err(ClipError::IdSpaceExhausted {
            attempts: self.max_id_attempts,
        })
    }

    // A missing or corrupt feed reads as empty.
    async fn load_feed(&self) -> Result<Vec<FeedEntry>, ClipError> {
        match self.kv.get(FEED_KEY).await? {
            Some(data) => match serde_json::from_str(&data) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    warn!("Ignoring malformed public feed: {}", e);
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    async fn save_feed(&self, entries: &[FeedEntry]) -> Result<(), ClipError> {
        self.kv
            .put(FEED_KEY, &serde_json::to_string(entries)?, None)
            .await?;
        Ok(())
    }

    async fn push_feed_entry(&self, entry: FeedEntry) -> Result<(), ClipError> {
        let _guard = self.feed_lock.lock().await;
        let mut entries = self.load_feed().await?;
        entries.insert(0, entry);
        entries.truncate(FEED_CAPACITY);
        self.save_feed(&entries).await
    }

    async fn remove_feed_entry(&self, id: &str) -> Result<(), ClipError> {
        let _guard = self.feed_lock.lock().await;
        let mut entries = self.load_feed().await?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(());
        }
        self.save_feed(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::utils::memory::MemoryStore;

    fn store() -> (Arc<MemoryStore>, ClipStore) {
        let kv = Arc::new(MemoryStore::new());
        let clips = ClipStore::new(kv.clone()).with_id_generator(IdGenerator::seeded(7));
        (kv, clips)
    }

    async fn create_private(clips: &ClipStore, text: &str, expiration: Expiration) -> String {
        match clips.create(text, false, expiration).await.unwrap() {
            Created::Private { phrase_id } => phrase_id,
            Created::Public => panic!("private clip came back as public"),
        }
    }

    async fn raw_feed(kv: &MemoryStore) -> Vec<FeedEntry> {
        match kv.get(FEED_KEY).await.unwrap() {
            Some(data) => serde_json::from_str(&data).unwrap(),
            None => Vec::new(),
        }
    }

    /// Reports every key as taken.
    struct FullStore;

    #[rocket::async_trait]
    impl KvStore for FullStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(Some("{}".to_string()))
        }

        async fn put(&self, _key: &str, _value: &str, _ttl: Option<u64>) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn list(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn first_view_clip_reads_once() {
        let (_, clips) = store();
        let id = create_private(&clips, "secret", Expiration::FirstView).await;

        assert_eq!(clips.view(&id).await.unwrap(), "secret");
        assert!(matches!(clips.view(&id).await, Err(ClipError::NotFound)));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_clip_reads_many_times_until_ttl() {
        let (_, clips) = store();
        let id = create_private(&clips, "twice", Expiration::FiveMinutes).await;

        assert_eq!(clips.view(&id).await.unwrap(), "twice");
        assert_eq!(clips.view(&id).await.unwrap(), "twice");

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(matches!(clips.view(&id).await, Err(ClipError::NotFound)));
    }

    #[tokio::test]
    async fn private_record_keeps_requested_expiration() {
        let (kv, clips) = store();
        let id = create_private(&clips, "hi", Expiration::TwentyFourHours).await;

        let clip: Clip = serde_json::from_str(&kv.get(&id).await.unwrap().unwrap()).unwrap();
        assert!(!clip.is_public);
        assert_eq!(clip.expiration, Expiration::TwentyFourHours);
        assert_eq!(clip.text, "hi");
        assert!(raw_feed(&kv).await.is_empty());
    }

    #[tokio::test]
    async fn phrase_ids_are_unused_at_creation() {
        let (_, clips) = store();
        let mut seen = std::collections::HashSet::new();
        for i in 0..300 {
            let id = create_private(&clips, &format!("clip {}", i), Expiration::OneHour).await;
            assert!(seen.insert(id));
        }
    }

    #[tokio::test]
    async fn taken_phrase_id_is_regenerated() {
        let (kv, clips) = store();
        let probe = IdGenerator::seeded(7);
        let taken = probe.phrase_id();
        let next = probe.phrase_id();
        assert_ne!(taken, next);
        kv.put(&taken, "occupied", None).await.unwrap();

        let id = create_private(&clips, "new", Expiration::OneHour).await;
        assert_eq!(id, next);
        assert_eq!(kv.get(&taken).await.unwrap().as_deref(), Some("occupied"));
    }

    #[tokio::test]
    async fn saturated_id_space_gives_up() {
        let clips = ClipStore::new(Arc::new(FullStore)).with_max_id_attempts(5);
        let result = clips.create("x", false, Expiration::OneHour).await;
        assert!(matches!(
            result,
            Err(ClipError::IdSpaceExhausted { attempts: 5 })
        ));
    }

    #[tokio::test]
    async fn public_clip_lands_in_feed() {
        let (kv, clips) = store();
        assert_eq!(clips.create("hello world", true, Expiration::FiveMinutes).await.unwrap(), Created::Public);

        let feed = clips.list_feed().await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].preview, "hello world");
        assert_eq!(feed[0].timestamp, "just now");
        assert!(feed[0].id.starts_with("pub_"));

        let clip: Clip = serde_json::from_str(&kv.get(&feed[0].id).await.unwrap().unwrap()).unwrap();
        assert!(clip.is_public);
        assert_eq!(clip.expiration, Expiration::FirstView);
    }

    #[tokio::test]
    async fn long_public_text_preview_is_truncated() {
        let (_, clips) = store();
        let text = "b".repeat(70);
        clips.create(&text, true, Expiration::FirstView).await.unwrap();

        let feed = clips.list_feed().await.unwrap();
        assert_eq!(feed[0].preview, format!("{}...", "b".repeat(60)));
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_capped() {
        let (kv, clips) = store();
        for i in 0..FEED_CAPACITY + 5 {
            let before = raw_feed(&kv).await.len();
            clips.create(&format!("clip {}", i), true, Expiration::FirstView).await.unwrap();
            let after = raw_feed(&kv).await;
            assert_eq!(after.len(), (before + 1).min(FEED_CAPACITY));
            assert_eq!(after[0].preview, format!("clip {}", i));
        }

        let feed = raw_feed(&kv).await;
        assert_eq!(feed.last().unwrap().preview, "clip 5");
    }

    #[tokio::test]
    async fn copy_consumes_clip_and_feed_entry() {
        let (kv, clips) = store();
        clips.create("first", true, Expiration::FirstView).await.unwrap();
        clips.create("second", true, Expiration::FirstView).await.unwrap();
        let feed = clips.list_feed().await.unwrap();
        let id = feed[1].id.clone();

        assert_eq!(clips.copy(&id).await.unwrap(), "first");
        assert_eq!(kv.get(&id).await.unwrap(), None);

        let feed = raw_feed(&kv).await;
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].preview, "second");

        assert!(matches!(clips.copy(&id).await, Err(ClipError::NotFound)));
    }

    #[tokio::test]
    async fn viewing_public_clip_consumes_it() {
        let (_, clips) = store();
        clips.create("once", true, Expiration::FirstView).await.unwrap();
        let id = clips.list_feed().await.unwrap()[0].id.clone();

        assert_eq!(clips.view(&id).await.unwrap(), "once");
        assert!(matches!(clips.view(&id).await, Err(ClipError::NotFound)));
    }

    #[tokio::test]
    async fn admin_delete_leaves_feed_entry_until_copy() {
        let (kv, clips) = store();
        clips.create("doomed", true, Expiration::FirstView).await.unwrap();
        let id = clips.list_feed().await.unwrap()[0].id.clone();

        clips.admin_delete(&id).await.unwrap();
        assert!(matches!(clips.view(&id).await, Err(ClipError::NotFound)));
        assert_eq!(raw_feed(&kv).await.len(), 1);

        assert!(matches!(clips.copy(&id).await, Err(ClipError::NotFound)));
        assert!(raw_feed(&kv).await.is_empty());
    }

    #[tokio::test]
    async fn copy_works_on_private_clips() {
        let (kv, clips) = store();
        let id = create_private(&clips, "mine", Expiration::OneHour).await;

        assert_eq!(clips.copy(&id).await.unwrap(), "mine");
        assert_eq!(kv.get(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn feed_key_is_not_a_clip() {
        let (_, clips) = store();
        clips.create("public", true, Expiration::FirstView).await.unwrap();

        assert!(matches!(clips.view(FEED_KEY).await, Err(ClipError::NotFound)));
        assert!(matches!(clips.copy(FEED_KEY).await, Err(ClipError::NotFound)));
        assert_eq!(clips.list_feed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_feed_does_not_block_creation() {
        let (kv, clips) = store();
        kv.put(FEED_KEY, "not json", None).await.unwrap();

        assert!(clips.list_feed().await.unwrap().is_empty());
        clips.create("fresh", true, Expiration::FirstView).await.unwrap();
        assert_eq!(clips.list_feed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admin_list_is_newest_first_and_skips_feed() {
        let (kv, clips) = store();
        let old = Clip {
            text: "x".repeat(80),
            is_public: false,
            expiration: Expiration::OneHour,
            created_at: 1_000,
        };
        kv.put("old-clip-1", &serde_json::to_string(&old).unwrap(), None).await.unwrap();
        kv.put("broken-clip-2", "garbage", None).await.unwrap();
        clips.create("public one", true, Expiration::FirstView).await.unwrap();
        let private = create_private(&clips, "private one", Expiration::FiveMinutes).await;

        let listed = clips.admin_list().await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(listed.iter().all(|c| c.id != FEED_KEY));

        let summary = listed.iter().find(|c| c.id == private).unwrap();
        assert!(!summary.is_public);
        assert_eq!(summary.expiration, Expiration::FiveMinutes);
        assert_eq!(summary.preview, "private one");

        let last = listed.last().unwrap();
        assert_eq!(last.id, "old-clip-1");
        assert_eq!(last.preview, format!("{}...", "x".repeat(50)));
    }

    #[tokio::test]
    async fn admin_list_on_empty_store() {
        let (_, clips) = store();
        assert!(clips.admin_list().await.unwrap().is_empty());
        clips.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn admin_delete_cannot_remove_feed() {
        let (_, clips) = store();
        clips.create("keep me", true, Expiration::FirstView).await.unwrap();

        assert!(matches!(clips.admin_delete(FEED_KEY).await, Err(ClipError::NotFound)));
        let feed = clips.list_feed().await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].preview, "keep me");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_public_creates_all_reach_feed() {
        let (_, clips) = store();
        let clips = Arc::new(clips);

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let clips = clips.clone();
                tokio::spawn(async move {
                    clips
                        .create(&format!("clip {}", i), true, Expiration::FirstView)
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(clips.list_feed().await.unwrap().len(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_and_copies_keep_feed_consistent() {
        let (kv, clips) = store();
        let clips = Arc::new(clips);
        for i in 0..20 {
            clips.create(&format!("old {}", i), true, Expiration::FirstView).await.unwrap();
        }
        let old_ids: Vec<String> = raw_feed(&kv).await.into_iter().map(|e| e.id).collect();

        let mut tasks = Vec::new();
        for (i, id) in old_ids.into_iter().enumerate() {
            let copier = clips.clone();
            tasks.push(tokio::spawn(async move {
                assert!(copier.copy(&id).await.unwrap().starts_with("old "));
            }));
            let creator = clips.clone();
            tasks.push(tokio::spawn(async move {
                creator
                    .create(&format!("new {}", i), true, Expiration::FirstView)
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let feed = raw_feed(&kv).await;
        assert_eq!(feed.len(), 20);
        assert!(feed.iter().all(|entry| entry.preview.starts_with("new ")));
    }
}
