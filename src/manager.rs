//! Registry of concurrent game sessions.
//!
//! The session map and the per-player index live behind one
//! [`parking_lot::RwLock`] and are only ever changed together, while holding
//! the write lock. Each session sits behind its own mutex so a long search in
//! one game never blocks another. The registry never waits on a session
//! mutex: lookups read a mirrored active flag and the sweep only uses
//! `try_lock`, so holding a session guard while calling the manager is safe.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use derive_getters::Getters;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::BotConfig;
use crate::error::{SessionError, SessionErrorKind};
use crate::record::GameSnapshot;
use crate::session::{GameResult, GameSession};
use crate::{ChannelId, PlayerId, SessionId};

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<GameSession>>;

/// Counts returned by [`SessionManager::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Getters, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Sessions in the registry.
    total: usize,
    /// Sessions still accepting moves.
    active: usize,
    /// Sessions finished but not yet removed.
    finished: usize,
}

/// A session removed by a staleness sweep.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct EvictedSession {
    /// Id of the removed session.
    id: SessionId,
    /// Channel it was bound to.
    channel: ChannelId,
    /// White and Black participants.
    players: [PlayerId; 2],
    /// Final result.
    result: Option<GameResult>,
}

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    channel: ChannelId,
    players: [PlayerId; 2],
    created_at: DateTime<Utc>,
    sequence: u64,
    live: Arc<AtomicBool>,
}

impl Entry {
    fn is_active(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
struct Registry {
    sessions: HashMap<SessionId, Entry>,
    by_player: HashMap<PlayerId, HashSet<SessionId>>,
}

impl Registry {
    fn insert(&mut self, session: GameSession) -> SessionHandle {
        let id = session.id().clone();
        let players = session.players();
        let entry = Entry {
            channel: session.channel(),
            players,
            created_at: session.created_at(),
            sequence: session.sequence(),
            live: session.live_flag(),
            handle: Arc::new(Mutex::new(session)),
        };
        let handle = Arc::clone(&entry.handle);
        for player in players {
            self.by_player.entry(player).or_default().insert(id.clone());
        }
        self.sessions.insert(id, entry);
        handle
    }

    fn evict(&mut self, id: &str) -> Option<Entry> {
        let entry = self.sessions.remove(id)?;
        for player in entry.players {
            if let Some(ids) = self.by_player.get_mut(&player) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_player.remove(&player);
                }
            }
        }
        Some(entry)
    }

    fn conflict_in_channel(&self, players: [PlayerId; 2], channel: ChannelId) -> Option<PlayerId> {
        players.into_iter().find(|player| {
            self.by_player.get(player).is_some_and(|ids| {
                ids.iter().any(|id| {
                    self.sessions.get(id).is_some_and(|entry| {
                        entry.channel == channel && entry.is_active()
                    })
                })
            })
        })
    }

    /// Most recently created active session among `ids` passing `filter`.
    fn newest_active<'a>(
        &self,
        ids: impl Iterator<Item = &'a SessionId>,
        filter: impl Fn(&Entry) -> bool,
    ) -> Option<SessionHandle> {
        ids.filter_map(|id| self.sessions.get(id))
            .filter(|entry| filter(entry))
            .filter(|entry| entry.is_active())
            .max_by_key(|entry| (entry.created_at, entry.sequence))
            .map(|entry| Arc::clone(&entry.handle))
    }
}

/// Manages all game sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    registry: Arc<RwLock<Registry>>,
    config: Arc<BotConfig>,
}

impl SessionManager {
    /// Creates a manager with default settings.
    #[instrument]
    pub fn new() -> Self {
        Self::with_config(BotConfig::default())
    }

    /// Creates a manager whose sessions use `config`.
    #[instrument(skip(config))]
    pub fn with_config(config: BotConfig) -> Self {
        info!("Creating session manager");
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            config: Arc::new(config),
        }
    }

    /// Settings applied to new sessions.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Creates a session from the standard position.
    ///
    /// # Errors
    ///
    /// [`SessionErrorKind::PlayerAlreadyInGame`] if either player has an
    /// active session in `channel`; [`SessionErrorKind::SamePlayer`] if both
    /// ids are equal.
    #[instrument(skip(self))]
    pub fn create(
        &self,
        white: PlayerId,
        black: PlayerId,
        channel: ChannelId,
    ) -> Result<SessionHandle, SessionError> {
        self.register(white, black, channel, || {
            GameSession::with_config(white, black, channel, &self.config)
        })
    }

    /// Creates a session from a FEN position.
    #[instrument(skip(self))]
    pub fn create_from_fen(
        &self,
        white: PlayerId,
        black: PlayerId,
        channel: ChannelId,
        fen: &str,
    ) -> Result<SessionHandle, SessionError> {
        self.register(white, black, channel, || {
            GameSession::from_fen(white, black, channel, fen, &self.config)
        })
    }

    /// Registers a session rebuilt from a snapshot.
    #[instrument(skip(self, snapshot), fields(session_id = %snapshot.game_id))]
    pub fn restore(&self, snapshot: &GameSnapshot) -> Result<SessionHandle, SessionError> {
        let session = GameSession::restore(snapshot, &self.config)?;
        let mut registry = self.registry.write();
        if registry.sessions.contains_key(session.id()) {
            warn!("Snapshot id already registered");
            return Err(SessionErrorKind::CorruptRecord(format!(
                "duplicate session id {}",
                session.id()
            ))
            .into());
        }
        if session.is_active() {
            if let Some(player) = registry.conflict_in_channel(session.players(), session.channel())
            {
                return Err(SessionErrorKind::PlayerAlreadyInGame {
                    player,
                    channel: session.channel(),
                }
                .into());
            }
        }
        Ok(registry.insert(session))
    }

    fn register(
        &self,
        white: PlayerId,
        black: PlayerId,
        channel: ChannelId,
        build: impl FnOnce() -> Result<GameSession, SessionError>,
    ) -> Result<SessionHandle, SessionError> {
        if white == black {
            return Err(SessionErrorKind::SamePlayer.into());
        }

        let mut registry = self.registry.write();
        if let Some(player) = registry.conflict_in_channel([white, black], channel) {
            warn!(player, channel, "Player already in an active game in channel");
            return Err(SessionErrorKind::PlayerAlreadyInGame { player, channel }.into());
        }

        let session = build()?;
        let id = session.id().clone();
        let handle = registry.insert(session);
        info!(session_id = %id, total = registry.sessions.len(), "Created new session");
        Ok(handle)
    }

    /// Looks up a session by id.
    #[instrument(skip(self))]
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        let registry = self.registry.read();
        let handle = registry.sessions.get(id).map(|entry| Arc::clone(&entry.handle));
        if handle.is_none() {
            debug!(session_id = id, "Session not found");
        }
        handle
    }

    /// Newest active session bound to `channel`.
    #[instrument(skip(self))]
    pub fn find_by_channel(&self, channel: ChannelId) -> Option<SessionHandle> {
        let registry = self.registry.read();
        registry.newest_active(registry.sessions.keys(), |entry| entry.channel == channel)
    }

    /// Newest active session of `player`, optionally limited to one channel.
    #[instrument(skip(self))]
    pub fn find_for_player(
        &self,
        player: PlayerId,
        channel: Option<ChannelId>,
    ) -> Option<SessionHandle> {
        let registry = self.registry.read();
        let ids = registry.by_player.get(&player)?;
        registry.newest_active(ids.iter(), |entry| {
            channel.is_none_or(|wanted| entry.channel == wanted)
        })
    }

    /// Ids of every session `player` takes part in, active or not.
    pub fn player_sessions(&self, player: PlayerId) -> Vec<SessionId> {
        let registry = self.registry.read();
        let mut ids: Vec<SessionId> = registry
            .by_player
            .get(&player)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Ids of every registered session.
    #[instrument(skip(self))]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let registry = self.registry.read();
        let mut ids: Vec<SessionId> = registry.sessions.keys().cloned().collect();
        ids.sort();
        debug!(count = ids.len(), "Listed sessions");
        ids
    }

    /// Resigns `player` from session `id`. The session stays registered.
    #[instrument(skip(self))]
    pub fn resign(&self, id: &str, player: PlayerId) -> bool {
        match self.get(id) {
            Some(handle) => handle.lock().resign(player),
            None => false,
        }
    }

    /// Removes a session regardless of state.
    #[instrument(skip(self))]
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.registry.write().evict(id).is_some();
        if removed {
            info!(session_id = id, "Removed session");
        }
        removed
    }

    /// Abandons and removes sessions idle for at least `max_idle_secs`.
    ///
    /// Returns how many sessions were removed.
    pub fn sweep_stale(&self, max_idle_secs: u64) -> usize {
        self.sweep_stale_at(Utc::now(), max_idle_secs).len()
    }

    /// Sweep as of `now`, returning what was removed.
    ///
    /// Active sessions idle for at least `max_idle_secs` become abandoned.
    /// Finished sessions idle that long are removed as they are. Sessions
    /// locked by another caller are left for the next sweep.
    #[instrument(skip(self))]
    pub fn sweep_stale_at(&self, now: DateTime<Utc>, max_idle_secs: u64) -> Vec<EvictedSession> {
        let max_idle = i64::try_from(max_idle_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let mut registry = self.registry.write();

        let stale: Vec<(SessionId, Option<GameResult>)> = registry
            .sessions
            .iter()
            .filter_map(|(id, entry)| {
                let mut session = entry.handle.try_lock()?;
                if now.signed_duration_since(session.last_move_at()) < max_idle {
                    return None;
                }
                session.abandon();
                Some((id.clone(), session.result()))
            })
            .collect();

        let evicted: Vec<EvictedSession> = stale
            .into_iter()
            .filter_map(|(id, result)| {
                registry.evict(&id).map(|entry| EvictedSession {
                    id,
                    channel: entry.channel,
                    players: entry.players,
                    result,
                })
            })
            .collect();

        if !evicted.is_empty() {
            info!(
                evicted = evicted.len(),
                remaining = registry.sessions.len(),
                "Swept stale sessions"
            );
        }
        evicted
    }

    /// Registry-wide counts.
    #[instrument(skip(self))]
    pub fn stats(&self) -> ManagerStats {
        let registry = self.registry.read();
        let total = registry.sessions.len();
        let active = registry
            .sessions
            .values()
            .filter(|entry| entry.is_active())
            .count();
        ManagerStats {
            total,
            active,
            finished: total - active,
        }
    }

    /// Checks that the session map and player index agree.
    ///
    /// Every indexed id must exist and list the player; every session's
    /// players must index it.
    pub fn is_consistent(&self) -> bool {
        let registry = self.registry.read();
        let index_ok = registry.by_player.iter().all(|(player, ids)| {
            !ids.is_empty()
                && ids.iter().all(|id| {
                    registry
                        .sessions
                        .get(id)
                        .is_some_and(|entry| entry.players.contains(player))
                })
        });
        let sessions_ok = registry.sessions.iter().all(|(id, entry)| {
            entry.players.iter().all(|player| {
                registry
                    .by_player
                    .get(player)
                    .is_some_and(|ids| ids.contains(id))
            })
        });
        index_ok && sessions_ok
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
