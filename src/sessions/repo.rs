use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::workflow::{Surface, Workflow};

/// One client screen and the workflow it owns.
pub struct Session {
    pub id: Uuid,
    pub surface: Surface,
    pub created_at: OffsetDateTime,
    pub workflow: Arc<Workflow>,
    opened: Instant,
    // millis since `opened`
    last_seen: AtomicU64,
}

impl Session {
    fn new(surface: Surface, workflow: Workflow) -> Self {
        Self {
            id: Uuid::new_v4(),
            surface,
            created_at: OffsetDateTime::now_utc(),
            workflow: Arc::new(workflow),
            opened: Instant::now(),
            last_seen: AtomicU64::new(0),
        }
    }

    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&self, now: Instant) {
        let ms = now.saturating_duration_since(self.opened).as_millis();
        self.last_seen
            .fetch_max(u64::try_from(ms).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    fn last_seen(&self) -> Instant {
        self.opened + Duration::from_millis(self.last_seen.load(Ordering::Relaxed))
    }

    pub fn idle_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen())
    }
}

/// In-memory sessions, bounded by an idle TTL and a hard cap.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl SessionRegistry {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl: config.idle_ttl,
            max_sessions: config.max_sessions.max(1),
        }
    }

    /// Registers a new session. At the cap, the least recently used one is evicted.
    pub async fn create(&self, surface: Surface, workflow: Workflow) -> Arc<Session> {
        let session = Arc::new(Session::new(surface, workflow));
        let evicted = {
            let mut map = self.sessions.write().await;
            let oldest = if map.len() >= self.max_sessions {
                map.values().min_by_key(|s| s.last_seen()).map(|s| s.id)
            } else {
                None
            };
            let evicted = oldest.and_then(|id| map.remove(&id));
            map.insert(session.id, session.clone());
            evicted
        };
        if let Some(old) = evicted {
            info!(session_id = %old.id, max = self.max_sessions, "session cap reached, evicting least recently used");
            old.workflow.clear().await;
        }
        session
    }

    /// Looks a session up and marks it as used.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(&id).cloned();
        if let Some(s) = &session {
            s.touch();
        }
        session
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session idle for at least the TTL as of `now`. Returns how many went.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        let expired: Vec<Arc<Session>> = {
            let mut map = self.sessions.write().await;
            let ids: Vec<Uuid> = map
                .values()
                .filter(|s| s.idle_at(now) >= self.idle_ttl)
                .map(|s| s.id)
                .collect();
            ids.iter().filter_map(|id| map.remove(id)).collect()
        };
        for s in &expired {
            debug!(session_id = %s.id, "session expired");
            s.workflow.clear().await;
        }
        expired.len()
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let evicted = self.sweep().await;
                if evicted > 0 {
                    let remaining = self.len().await;
                    info!(evicted, remaining, "idle sessions evicted");
                }
            }
        })
    }
}
