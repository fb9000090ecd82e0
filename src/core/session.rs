//! Per-client session slots
//!
//! Each client holds one slot: the last resolved URL and the last fetched
//! artifact. Writes overwrite (last write wins). Slots expire after an idle
//! TTL and then behave as if they never existed. Artifacts that can no
//! longer be delivered (overwritten or expired) are handed back to the caller
//! so their working directories can be reclaimed.

use dashmap::DashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Opaque session token carried in the client cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fetched file waiting for its one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadSession {
    pub resolved_url: Option<String>,
    pub artifact: Option<Artifact>,
}

/// Outcome of [`SessionStore::purge_expired`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub sessions: usize,
    /// Artifacts nobody can collect any more
    pub orphaned: Vec<Artifact>,
}

/// Session storage. Operations on one session are atomic; different sessions
/// do not contend.
pub trait SessionStore: Send + Sync {
    fn set_resolved_url(&self, id: SessionId, url: String);
    fn resolved_url(&self, id: SessionId) -> Option<String>;
    /// Store the artifact, returning the one it replaced
    fn set_artifact(&self, id: SessionId, artifact: Artifact) -> Option<Artifact>;
    fn artifact(&self, id: SessionId) -> Option<Artifact>;
    /// Remove and return the artifact in one step
    fn take_artifact(&self, id: SessionId) -> Option<Artifact>;
    /// Drop expired sessions. The report also carries artifacts of sessions
    /// that expired since the last purge.
    fn purge_expired(&self) -> PurgeReport;
}

#[derive(Debug)]
struct Slot {
    session: DownloadSession,
    touched: Instant,
}

impl Slot {
    fn fresh() -> Self {
        Self {
            session: DownloadSession::default(),
            touched: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.touched.elapsed() > ttl
    }
}

/// In-process [`SessionStore`] on a sharded map
#[derive(Debug)]
pub struct InMemorySessionStore {
    slots: DashMap<SessionId, Slot>,
    /// Artifacts of expired slots, keyed by path, until the next purge
    orphans: DashMap<PathBuf, Artifact>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            orphans: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn orphan(&self, slot: Slot) {
        if let Some(artifact) = slot.session.artifact {
            self.orphans.insert(artifact.path.clone(), artifact);
        }
    }

    fn write<R, F>(&self, id: SessionId, update: F) -> R
    where
        F: FnOnce(&mut DownloadSession) -> R,
    {
        let mut slot = self.slots.entry(id).or_insert_with(Slot::fresh);
        if slot.is_expired(self.ttl) {
            let expired = std::mem::replace(&mut *slot, Slot::fresh());
            self.orphan(expired);
        }
        slot.touched = Instant::now();
        update(&mut slot.session)
    }

    fn read<R, F>(&self, id: SessionId, read: F) -> Option<R>
    where
        F: FnOnce(&mut DownloadSession) -> Option<R>,
    {
        if let Some(mut slot) = self.slots.get_mut(&id) {
            if !slot.is_expired(self.ttl) {
                slot.touched = Instant::now();
                return read(&mut slot.session);
            }
        }

        let ttl = self.ttl;
        if let Some((_, expired)) = self.slots.remove_if(&id, |_, slot| slot.is_expired(ttl)) {
            debug!("Session {} expired", id);
            self.orphan(expired);
        }
        None
    }
}

impl SessionStore for InMemorySessionStore {
    fn set_resolved_url(&self, id: SessionId, url: String) {
        self.write(id, |session| session.resolved_url = Some(url));
    }

    fn resolved_url(&self, id: SessionId) -> Option<String> {
        self.read(id, |session| session.resolved_url.clone())
    }

    fn set_artifact(&self, id: SessionId, artifact: Artifact) -> Option<Artifact> {
        self.write(id, |session| session.artifact.replace(artifact))
    }

    fn artifact(&self, id: SessionId) -> Option<Artifact> {
        self.read(id, |session| session.artifact.clone())
    }

    fn take_artifact(&self, id: SessionId) -> Option<Artifact> {
        self.read(id, |session| session.artifact.take())
    }

    fn purge_expired(&self) -> PurgeReport {
        let ttl = self.ttl;
        let mut report = PurgeReport::default();
        self.slots.retain(|_, slot| {
            if !slot.is_expired(ttl) {
                return true;
            }
            report.sessions += 1;
            report.orphaned.extend(slot.session.artifact.take());
            false
        });

        let paths: Vec<PathBuf> = self.orphans.iter().map(|e| e.key().clone()).collect();
        for path in paths {
            if let Some((_, artifact)) = self.orphans.remove(&path) {
                report.orphaned.push(artifact);
            }
        }
        report
    }
}
