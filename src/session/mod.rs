//! Per-user edit sessions and the store that owns them.
//!
//! A [`Session`] holds the uploaded `original`, the edited `current` image,
//! the region selector bound at creation, and an undo/redo history.
//! [`SessionStore`] maps ids to sessions; each session sits behind its own
//! lock so independent sessions never wait on each other.

mod history;

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use log::info;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ColorizeError, Result};
use crate::select::{RegionSelector, SelectorKind};
use crate::types::{Mask, Point};

pub use history::EditHistory;

/// Opaque random session token (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, used for default file names.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One user's editing state for one uploaded image.
///
/// `original` is never mutated. `current` always has the same dimensions as
/// `original`; every change to it goes through [`commit`](Session::commit),
/// [`undo`](Session::undo) or [`redo`](Session::redo), which also tell the
/// selector its image changed.
pub struct Session {
    id: SessionId,
    original: RgbImage,
    current: RgbImage,
    selector: Box<dyn RegionSelector>,
    history: EditHistory,
    last_access: Instant,
}

impl Session {
    pub fn new(
        id: SessionId,
        image: RgbImage,
        selector: Box<dyn RegionSelector>,
        history_limit: usize,
    ) -> Self {
        Self {
            id,
            current: image.clone(),
            original: image,
            selector,
            history: EditHistory::new(history_limit),
            last_access: Instant::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn original(&self) -> &RgbImage {
        &self.original
    }

    pub fn current(&self) -> &RgbImage {
        &self.current
    }

    pub fn selector_kind(&self) -> SelectorKind {
        self.selector.kind()
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// Ask the bound selector for the region under `point` in `current`.
    pub fn select(&mut self, point: Point) -> Result<Option<Mask>> {
        self.selector.select(&self.current, point)
    }

    /// Replace `current` with an edited image, recording the old one.
    pub fn commit(&mut self, image: RgbImage) -> Result<()> {
        if image.dimensions() != self.original.dimensions() {
            return Err(ColorizeError::Apply {
                message: format!(
                    "edited image is {}x{} but the session image is {}x{}",
                    image.width(),
                    image.height(),
                    self.original.width(),
                    self.original.height()
                ),
            });
        }
        let previous = mem::replace(&mut self.current, image);
        self.history.record(previous);
        self.selector.invalidate();
        Ok(())
    }

    /// Copy `original` over `current`. Undoable like any other edit; a
    /// session already showing its original is left untouched.
    pub fn reset(&mut self) {
        if self.current == self.original {
            return;
        }
        let previous = mem::replace(&mut self.current, self.original.clone());
        self.history.record(previous);
        self.selector.invalidate();
    }

    pub fn undo(&mut self) -> bool {
        let changed = self.history.undo(&mut self.current);
        if changed {
            self.selector.invalidate();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.history.redo(&mut self.current);
        if changed {
            self.selector.invalidate();
        }
        changed
    }

    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access)
    }
}

type SharedSession = Arc<Mutex<Session>>;

/// Registry of live sessions.
///
/// The map lock is only held to look up, insert or remove an entry; the
/// work on a session happens under that session's own mutex.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedSession>>,
    ttl: Option<Duration>,
}

impl SessionStore {
    /// A store evicting sessions idle longer than `ttl` (`None` keeps them).
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, session: Session) -> SessionId {
        let id = session.id().clone();
        self.sessions
            .write()
            .insert(id.as_str().to_string(), Arc::new(Mutex::new(session)));
        id
    }

    pub fn get(&self, id: &str) -> Result<SharedSession> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ColorizeError::not_found(id))
    }

    /// Run `f` with exclusive access to a session, marking it as used.
    ///
    /// A session evicted or removed between the lookup and taking its lock
    /// is reported as not found.
    pub fn with<T>(&self, id: &str, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let session = self.get(id)?;
        let mut guard = session.lock();
        if !self.is_live(id, &session) {
            return Err(ColorizeError::not_found(id));
        }
        guard.touch();
        f(&mut guard)
    }

    /// Whether `session` is still the entry stored under `id`.
    fn is_live(&self, id: &str, session: &SharedSession) -> bool {
        self.sessions
            .read()
            .get(id)
            .is_some_and(|stored| Arc::ptr_eq(stored, session))
    }

    /// Remove a session. Returns false if it was not present.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop sessions idle longer than the TTL. Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    /// [`evict_idle`](Self::evict_idle) as if the clock read `now`.
    ///
    /// Sessions locked by an in-flight operation are in use and always kept.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };

        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, session| match session.try_lock() {
            Some(guard) => {
                let keep = guard.idle_for(now) <= ttl;
                if !keep {
                    info!("Evicted idle session {}", id);
                }
                keep
            }
            None => true,
        });
        before - sessions.len()
    }
}
