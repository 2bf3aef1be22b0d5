//! Feed Paginator.
//!
//! [`FeedState`] is the page-state machine (pure); [`FeedPaginator`] runs it
//! against the [`Backend`]. [`VisibilityTrigger`] turns "last item is on
//! screen" samples into single `load_next` requests.
//!
//! The paginator also keeps the signed-in user's own posts (the profile
//! page list); create, delete, like and comment keep both lists in step.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use hearth_shared::error::ValidationError;
use hearth_shared::models::{FeedPage, Post};
use hearth_shared::types::PostId;

use crate::backend::Backend;
use crate::error::ClientError;
use crate::events::{EventBus, UiEvent};

/// Proof that a load was started; hand it back when the fetch resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub page: u32,
    generation: u64,
}

#[derive(Debug)]
pub struct FeedState {
    items: Vec<Post>,
    ids: HashSet<PostId>,
    /// Next page to request (1-based).
    cursor: u32,
    has_more: bool,
    loading: bool,
    /// Bumped by `reset`; tickets from before a reset are ignored.
    generation: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            ids: HashSet::new(),
            cursor: 1,
            has_more: true,
            loading: false,
            generation: 0,
        }
    }
}

impl FeedState {
    /// Start loading the next page, unless a load is in flight or the feed
    /// is exhausted.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.loading || !self.has_more {
            return None;
        }
        self.loading = true;
        Some(LoadTicket {
            page: self.cursor,
            generation: self.generation,
        })
    }

    /// Append the unseen posts of `page`. Returns how many were added.
    pub fn finish_load(&mut self, ticket: LoadTicket, page: FeedPage) -> usize {
        if ticket.generation != self.generation {
            return 0;
        }

        self.loading = false;
        self.has_more = page.has_more;
        self.cursor = ticket.page + 1;

        let before = self.items.len();
        for post in page.posts {
            if self.ids.insert(post.post_id.clone()) {
                self.items.push(post);
            }
        }
        self.items.len() - before
    }

    pub fn fail_load(&mut self, ticket: LoadTicket) {
        if ticket.generation == self.generation {
            self.loading = false;
        }
    }

    /// Put a freshly created post at the top. `false` if already present.
    pub fn prepend(&mut self, post: Post) -> bool {
        if !self.ids.insert(post.post_id.clone()) {
            return false;
        }
        self.items.insert(0, post);
        true
    }

    pub fn apply_like_delta(&mut self, id: &PostId, like_count: u32) -> bool {
        self.patch(id, |p| p.like_count = like_count)
    }

    pub fn apply_comment_delta(&mut self, id: &PostId, comment_count: u32) -> bool {
        self.patch(id, |p| p.comment_count = comment_count)
    }

    /// Idempotent: removing an absent id returns `false`.
    pub fn remove_post(&mut self, id: &PostId) -> bool {
        if !self.ids.remove(id) {
            return false;
        }
        self.items.retain(|p| p.post_id != *id);
        true
    }

    /// Back to page 1; in-flight loads are orphaned.
    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::default()
        };
    }

    pub fn items(&self) -> &[Post] {
        &self.items
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn patch(&mut self, id: &PostId, f: impl FnOnce(&mut Post)) -> bool {
        match self.items.iter_mut().find(|p| p.post_id == *id) {
            Some(post) => {
                f(post);
                true
            }
            None => false,
        }
    }
}

/// Edge-triggered "reached the end of the list" signal.
///
/// Fires once per hidden-to-visible transition of the last rendered item.
/// A different last item (a page was appended) re-arms it.
#[derive(Debug, Default)]
pub struct VisibilityTrigger {
    last: Option<PostId>,
    visible: bool,
}

impl VisibilityTrigger {
    pub fn observe(&mut self, last_item: Option<&PostId>, visible: bool) -> bool {
        if self.last.as_ref() != last_item {
            self.last = last_item.cloned();
            self.visible = false;
        }

        let fire = visible && !self.visible && self.last.is_some();
        self.visible = visible;
        fire
    }
}

#[derive(Clone)]
pub struct FeedPaginator {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    backend: Arc<dyn Backend>,
    events: EventBus,
    page_size: u32,
    state: Mutex<FeedState>,
    trigger: Mutex<VisibilityTrigger>,
    mine: Mutex<Vec<Post>>,
}

impl FeedPaginator {
    pub fn new(backend: Arc<dyn Backend>, events: EventBus, page_size: u32) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                backend,
                events,
                page_size,
                state: Mutex::new(FeedState::default()),
                trigger: Mutex::new(VisibilityTrigger::default()),
                mine: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Fetch and append the next page. A no-op (returns `Ok(0)`) while a
    /// load is in flight or when there is nothing more to load.
    pub async fn load_next(&self) -> Result<usize, ClientError> {
        let Some(ticket) = self.state().begin_load() else {
            debug!("load_next skipped: busy or exhausted");
            return Ok(0);
        };

        match self.inner.backend.feed(ticket.page, self.inner.page_size).await {
            Ok(page) => {
                let added = self.state().finish_load(ticket, page);
                debug!(page = ticket.page, added, "Feed page loaded");
                self.emit_updated();
                Ok(added)
            }
            Err(e) => {
                self.state().fail_load(ticket);
                self.inner.events.emit_error("load_feed", &e);
                Err(e)
            }
        }
    }

    /// Report whether the last rendered item is on screen; loads the next
    /// page on the hidden-to-visible edge.
    pub async fn on_last_item_visible(&self, visible: bool) -> Result<usize, ClientError> {
        let fire = {
            let state = self.state();
            let last = state.items().last().map(|p| p.post_id.clone());
            lock(&self.inner.trigger).observe(last.as_ref(), visible)
        };

        if fire {
            self.load_next().await
        } else {
            Ok(0)
        }
    }

    /// Drop everything and load page 1 again.
    pub async fn refresh(&self) -> Result<usize, ClientError> {
        self.state().reset();
        *lock(&self.inner.trigger) = VisibilityTrigger::default();
        self.load_next().await
    }

    /// Replace the own-posts list with the backend's copy.
    pub async fn load_my_posts(&self) -> Result<usize, ClientError> {
        let posts = self
            .inner
            .backend
            .my_posts()
            .await
            .map_err(|e| self.report("load_my_posts", e))?;

        let len = posts.len();
        *lock(&self.inner.mine) = posts;
        debug!(len, "Own posts loaded");
        self.emit_mine_updated();
        Ok(len)
    }

    pub async fn create_post(&self, text: &str) -> Result<Post, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            let e = ValidationError::EmptyPost;
            self.inner.events.emit_error("create_post", &e);
            return Err(e.into());
        }

        let post = self
            .inner
            .backend
            .create_post(text)
            .await
            .map_err(|e| self.report("create_post", e))?;

        info!(post = %post.post_id, "Post created");
        self.state().prepend(post.clone());
        {
            let mut mine = lock(&self.inner.mine);
            if !mine.iter().any(|p| p.post_id == post.post_id) {
                mine.insert(0, post.clone());
            }
        }
        self.emit_updated();
        self.emit_mine_updated();
        Ok(post)
    }

    pub async fn delete_post(&self, id: &PostId) -> Result<(), ClientError> {
        self.inner
            .backend
            .delete_post(id)
            .await
            .map_err(|e| self.report("delete_post", e))?;

        if self.state().remove_post(id) {
            self.emit_updated();
        }
        let removed_own = {
            let mut mine = lock(&self.inner.mine);
            let before = mine.len();
            mine.retain(|p| p.post_id != *id);
            mine.len() != before
        };
        if removed_own {
            self.emit_mine_updated();
        }
        Ok(())
    }

    /// Like round trip; the count is patched only with the confirmed value.
    pub async fn like(&self, id: &PostId) -> Result<u32, ClientError> {
        let count = self
            .inner
            .backend
            .like_post(id)
            .await
            .map_err(|e| self.report("like_post", e))?;

        if self.state().apply_like_delta(id, count) {
            self.emit_updated();
        }
        self.patch_mine(id, |p| p.like_count = count);
        Ok(count)
    }

    pub async fn comment(&self, id: &PostId, text: &str) -> Result<u32, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            let e = ValidationError::EmptyComment;
            self.inner.events.emit_error("comment_post", &e);
            return Err(e.into());
        }

        let count = self
            .inner
            .backend
            .comment_post(id, text)
            .await
            .map_err(|e| self.report("comment_post", e))?;

        if self.state().apply_comment_delta(id, count) {
            self.emit_updated();
        }
        self.patch_mine(id, |p| p.comment_count = count);
        Ok(count)
    }

    pub fn items(&self) -> Vec<Post> {
        self.state().items().to_vec()
    }

    pub fn my_posts(&self) -> Vec<Post> {
        lock(&self.inner.mine).clone()
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    /// Forget all posts (sign-out).
    pub fn reset(&self) {
        self.state().reset();
        *lock(&self.inner.trigger) = VisibilityTrigger::default();
        lock(&self.inner.mine).clear();
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        lock(&self.inner.state)
    }

    fn report(&self, context: &'static str, e: ClientError) -> ClientError {
        self.inner.events.emit_error(context, &e);
        e
    }

    fn patch_mine(&self, id: &PostId, f: impl FnOnce(&mut Post)) {
        if let Some(post) = lock(&self.inner.mine).iter_mut().find(|p| p.post_id == *id) {
            f(post);
        }
    }

    fn emit_mine_updated(&self) {
        let len = lock(&self.inner.mine).len();
        self.inner.events.emit(UiEvent::MyPostsUpdated { len });
    }

    fn emit_updated(&self) {
        let (len, has_more) = {
            let state = self.state();
            (state.items().len(), state.has_more())
        };
        self.inner.events.emit(UiEvent::FeedUpdated { len, has_more });
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page, post, MockBackend};

    fn ids(items: &[Post]) -> Vec<&str> {
        items.iter().map(|p| p.post_id.0.as_str()).collect()
    }

    fn paginator() -> (FeedPaginator, Arc<MockBackend>) {
        let backend = MockBackend::new();
        (FeedPaginator::new(backend.clone(), EventBus::default(), 3), backend)
    }

    #[test]
    fn test_repeated_pages_never_duplicate() {
        let mut state = FeedState::default();

        let t1 = state.begin_load().unwrap();
        state.finish_load(t1, page(&["a", "b", "c"], true));
        let t2 = state.begin_load().unwrap();
        // Server shifted by one: page 2 overlaps page 1.
        assert_eq!(state.finish_load(t2, page(&["c", "d", "e"], true)), 2);
        let t3 = state.begin_load().unwrap();
        assert_eq!(state.finish_load(t3, page(&["a", "b", "c"], false)), 0);

        assert_eq!(ids(state.items()), vec!["a", "b", "c", "d", "e"]);
        assert!(state.begin_load().is_none());
    }

    #[test]
    fn test_begin_load_is_exclusive() {
        let mut state = FeedState::default();
        let ticket = state.begin_load().unwrap();
        assert!(state.begin_load().is_none());

        state.fail_load(ticket);
        assert_eq!(state.begin_load().map(|t| t.page), Some(1));
    }

    #[test]
    fn test_reset_orphans_in_flight_load() {
        let mut state = FeedState::default();
        let old = state.begin_load().unwrap();
        state.reset();

        assert_eq!(state.finish_load(old, page(&["stale"], true)), 0);
        assert!(state.items().is_empty());
        assert!(!state.is_loading());
    }

    #[test]
    fn test_patches_and_removal() {
        let mut state = FeedState::default();
        let t = state.begin_load().unwrap();
        state.finish_load(t, page(&["a", "b"], false));

        assert!(state.apply_like_delta(&PostId("a".into()), 7));
        assert!(state.apply_comment_delta(&PostId("b".into()), 2));
        assert!(!state.apply_like_delta(&PostId("zzz".into()), 1));
        assert_eq!(state.items()[0].like_count, 7);
        assert_eq!(state.items()[1].comment_count, 2);

        assert!(state.remove_post(&PostId("a".into())));
        assert!(!state.remove_post(&PostId("a".into())));
        assert_eq!(ids(state.items()), vec!["b"]);

        assert!(state.prepend(post("n")));
        assert!(!state.prepend(post("b")));
        assert_eq!(ids(state.items()), vec!["n", "b"]);
    }

    #[test]
    fn test_visibility_trigger_is_edge_triggered() {
        let mut trigger = VisibilityTrigger::default();
        let a = PostId("a".into());
        let b = PostId("b".into());

        assert!(!trigger.observe(None, true));
        assert!(trigger.observe(Some(&a), true));
        assert!(!trigger.observe(Some(&a), true));
        assert!(!trigger.observe(Some(&a), false));
        assert!(trigger.observe(Some(&a), true));

        // New last item while still on screen: fires again.
        assert!(trigger.observe(Some(&b), true));
    }

    #[tokio::test]
    async fn test_concurrent_load_next_fetches_once() {
        let (feed, backend) = paginator();
        backend.pages.lock().unwrap().insert(1, page(&["a", "b", "c"], true));
        backend.hold("feed:1");

        let first = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_next().await })
        };
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while backend.calls("feed") == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(feed.load_next().await.unwrap(), 0);
        backend.release("feed:1");
        assert_eq!(first.await.unwrap().unwrap(), 3);

        assert_eq!(backend.calls("feed"), 1);
        assert_eq!(ids(&feed.items()), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failed_load_can_be_retried() {
        let (feed, backend) = paginator();
        backend.pages.lock().unwrap().insert(1, page(&["a"], false));
        backend.fail("feed");

        assert!(feed.load_next().await.is_err());
        assert!(!feed.is_loading());

        backend.succeed("feed");
        assert_eq!(feed.load_next().await.unwrap(), 1);
        assert!(!feed.has_more());
        assert_eq!(feed.load_next().await.unwrap(), 0);
        assert_eq!(backend.calls("feed"), 2);
    }

    #[tokio::test]
    async fn test_scrolling_loads_each_page_once() {
        let (feed, backend) = paginator();
        backend.pages.lock().unwrap().insert(1, page(&["a", "b", "c"], true));
        backend.pages.lock().unwrap().insert(2, page(&["d"], false));

        feed.load_next().await.unwrap();
        assert_eq!(feed.on_last_item_visible(true).await.unwrap(), 1);
        // Still on screen, same last item: no request storm.
        assert_eq!(feed.on_last_item_visible(true).await.unwrap(), 0);
        assert_eq!(feed.on_last_item_visible(true).await.unwrap(), 0);
        assert_eq!(backend.calls("feed"), 2);
    }

    #[tokio::test]
    async fn test_like_and_comment_patch_only_on_success() {
        let (feed, backend) = paginator();
        backend.pages.lock().unwrap().insert(1, page(&["a"], false));
        feed.load_next().await.unwrap();
        let a = PostId("a".into());

        assert_eq!(feed.like(&a).await.unwrap(), 1);
        assert_eq!(feed.items()[0].like_count, 1);

        backend.fail("like_post");
        assert!(feed.like(&a).await.is_err());
        assert_eq!(feed.items()[0].like_count, 1);

        assert!(matches!(
            feed.comment(&a, " ").await,
            Err(ClientError::Validation(ValidationError::EmptyComment))
        ));
        assert_eq!(feed.comment(&a, "nice").await.unwrap(), 1);
        assert_eq!(feed.items()[0].comment_count, 1);
        assert_eq!(backend.calls("comment_post"), 1);
    }

    #[tokio::test]
    async fn test_create_and_delete_post() {
        let (feed, backend) = paginator();
        backend.pages.lock().unwrap().insert(1, page(&["a"], false));
        feed.load_next().await.unwrap();

        assert!(matches!(
            feed.create_post("   ").await,
            Err(ClientError::Validation(ValidationError::EmptyPost))
        ));
        assert_eq!(backend.calls("create_post"), 0);

        let created = feed.create_post("sunset").await.unwrap();
        assert_eq!(feed.items()[0].post_id, created.post_id);

        feed.delete_post(&created.post_id).await.unwrap();
        feed.delete_post(&created.post_id).await.unwrap();
        assert_eq!(ids(&feed.items()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_refresh_starts_over() {
        let (feed, backend) = paginator();
        backend.pages.lock().unwrap().insert(1, page(&["a"], false));
        feed.load_next().await.unwrap();
        backend.pages.lock().unwrap().insert(1, page(&["z", "a"], false));

        assert_eq!(feed.refresh().await.unwrap(), 2);
        assert_eq!(ids(&feed.items()), vec!["z", "a"]);
    }

    #[tokio::test]
    async fn test_my_posts_follow_create_delete_and_likes() {
        let (feed, backend) = paginator();
        *backend.my_posts.lock().unwrap() = vec![post("m1"), post("m2")];
        backend.pages.lock().unwrap().insert(1, page(&["m1", "x"], false));
        feed.load_next().await.unwrap();

        assert_eq!(feed.load_my_posts().await.unwrap(), 2);

        let created = feed.create_post("fresh").await.unwrap();
        assert_eq!(ids(&feed.my_posts()), vec![created.post_id.0.as_str(), "m1", "m2"]);

        let m1 = PostId("m1".into());
        feed.like(&m1).await.unwrap();
        assert_eq!(feed.my_posts()[1].like_count, 1);

        // Not in the loaded feed page, still removed from the profile list.
        feed.delete_post(&PostId("m2".into())).await.unwrap();
        feed.delete_post(&m1).await.unwrap();
        assert_eq!(ids(&feed.my_posts()), vec![created.post_id.0.as_str()]);
        assert_eq!(ids(&feed.items()), vec![created.post_id.0.as_str(), "x"]);

        assert_eq!(feed.load_my_posts().await.unwrap(), 1);
        feed.reset();
        assert!(feed.my_posts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_my_posts() {
        let (feed, backend) = paginator();
        *backend.my_posts.lock().unwrap() = vec![post("m1")];
        feed.load_my_posts().await.unwrap();

        backend.fail("delete_post");
        assert!(feed.delete_post(&PostId("m1".into())).await.is_err());
        assert_eq!(ids(&feed.my_posts()), vec!["m1"]);
    }
}
