use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use teloxide::types::{FileId, MediaGroupId, UserId};

use crate::llm::gemini::GeminiClient;

/// A photo waiting for the user's follow-up instruction text.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPhoto {
    pub file_id: FileId,
    /// Set when the photo arrived as part of an album; used to acknowledge the
    /// album only once while later items keep overwriting the pending entry.
    pub media_group_id: Option<MediaGroupId>,
}

/// Per-user pending-photo store. Keys are disjoint per user, so a single map
/// guarded by one mutex is enough; handlers for different users may run
/// interleaved.
#[derive(Clone, Default)]
pub struct SessionStore {
    pending: Arc<Mutex<HashMap<UserId, PendingPhoto>>>,
}

impl SessionStore {
    /// Records a pending photo for the user, overwriting any previous one.
    /// Returns the replaced entry, if any (last-write-wins, no queue).
    pub fn set_pending(&self, user_id: UserId, photo: PendingPhoto) -> Option<PendingPhoto> {
        self.pending.lock().insert(user_id, photo)
    }

    /// Returns and clears the user's pending photo in one step.
    pub fn take_pending(&self, user_id: UserId) -> Option<PendingPhoto> {
        self.pending.lock().remove(&user_id)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    /// `None` when the client could not be constructed at startup; handlers
    /// then answer with a "not available" message instead of crashing.
    pub gemini: Option<GeminiClient>,
}

impl AppState {
    pub fn new(gemini: Option<GeminiClient>) -> Self {
        AppState {
            sessions: SessionStore::default(),
            gemini,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(id: &str) -> PendingPhoto {
        PendingPhoto {
            file_id: FileId(id.to_string()),
            media_group_id: None,
        }
    }

    #[test]
    fn take_returns_and_clears_the_pending_photo() {
        let store = SessionStore::default();
        let user = UserId(7);
        store.set_pending(user, photo("first"));

        assert_eq!(store.take_pending(user), Some(photo("first")));
        assert_eq!(store.take_pending(user), None);
    }

    #[test]
    fn a_second_photo_overwrites_the_first() {
        let store = SessionStore::default();
        let user = UserId(7);
        store.set_pending(user, photo("first"));
        let replaced = store.set_pending(user, photo("second"));

        assert_eq!(replaced, Some(photo("first")));
        assert_eq!(store.take_pending(user), Some(photo("second")));
    }

    #[test]
    fn users_do_not_share_pending_photos() {
        let store = SessionStore::default();
        store.set_pending(UserId(1), photo("one"));
        store.set_pending(UserId(2), photo("two"));

        assert_eq!(store.take_pending(UserId(2)), Some(photo("two")));
        assert_eq!(store.take_pending(UserId(1)), Some(photo("one")));
    }
}
