//! Application state: the session store, the shared capabilities and the
//! knowledge base.
//!
//! This module owns:
//!   - the sessions map (id -> per-session lock)
//!   - the capability set (OpenAI when configured, local engines otherwise)
//!   - the knowledge base embedded once at startup
//!   - the assessment settings (from TOML or defaults)
//!
//! Each session sits behind its own `Mutex`, so operations on one session are
//! serialized while different sessions proceed in parallel. Sessions idle for
//! longer than `session_ttl_secs` are pruned on insert and by the reaper task.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::assessment::{Assessor, Session};
use crate::capabilities::Capabilities;
use crate::config::{resolve_config, AssessmentSettings};
use crate::local::{HashingEmbedder, LocalChoiceMatcher, LocalNarrator, LocalQuestionBank};
use crate::openai::OpenAI;
use crate::retrieval::KnowledgeBase;

pub type SessionHandle = Arc<Mutex<Session>>;

/// Longest pause between two reaper sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    pub caps: Capabilities,
    pub kb: Arc<KnowledgeBase>,
    pub settings: AssessmentSettings,
}

/// Local engines for every capability.
pub fn local_capabilities() -> Capabilities {
    Capabilities {
        questions: Arc::new(LocalQuestionBank),
        disambiguator: Arc::new(LocalChoiceMatcher),
        narrator: Arc::new(LocalNarrator),
        embedder: Arc::new(HashingEmbedder),
    }
}

fn openai_capabilities(oa: OpenAI) -> Capabilities {
    let oa = Arc::new(oa);
    Capabilities {
        questions: oa.clone(),
        disambiguator: oa.clone(),
        narrator: oa.clone(),
        embedder: oa,
    }
}

impl AppState {
    pub fn new(caps: Capabilities, kb: KnowledgeBase, settings: AssessmentSettings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            caps,
            kb: Arc::new(kb),
            settings,
        }
    }

    /// Build state from env: load config, pick capabilities, embed the knowledge base.
    #[instrument(level = "info", skip_all)]
    pub async fn bootstrap() -> Self {
        let cfg = resolve_config();

        let caps = match OpenAI::from_env(cfg.prompts.clone(), cfg.assessment.call_timeout()) {
            Some(oa) => {
                info!(target: "explorer_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, embedding_model = %oa.embedding_model, "OpenAI enabled.");
                openai_capabilities(oa)
            }
            None => {
                info!(target: "explorer_backend", "OpenAI disabled (no OPENAI_API_KEY). Using local question bank and matchers.");
                local_capabilities()
            }
        };

        let docs_dir = cfg.assessment.docs_dir.clone();
        let kb = match KnowledgeBase::load_dir(&docs_dir, caps.embedder.as_ref()).await {
            Ok(kb) => kb,
            Err(e) => {
                error!(target: "explorer_backend", dir = %docs_dir.display(), error = %e, "Knowledge base failed to load; reports will be ungrounded");
                KnowledgeBase::new()
            }
        };
        info!(target: "explorer_backend", docs = kb.len(), names = ?kb.names(), "Knowledge base ready");

        Self::new(caps, kb, cfg.assessment)
    }

    /// Borrowing view used to drive one session operation.
    pub fn assessor(&self) -> Assessor<'_> {
        Assessor::new(&self.caps, &self.kb, &self.settings)
    }

    /// Look up a session and mark it as active.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn session(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(entry.handle.clone())
    }

    /// Insert or replace the session stored under its id. Idle sessions are
    /// pruned first.
    #[instrument(level = "debug", skip(self, session), fields(id = %session.id))]
    pub async fn put_session(&self, session: Session) -> SessionHandle {
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let pruned = prune(&mut sessions, now, self.settings.session_ttl());
        if pruned > 0 {
            debug!(target: "explorer_backend", pruned, "Idle sessions pruned");
        }
        let entry = SessionEntry { handle: handle.clone(), last_seen: now };
        if sessions.insert(id, entry).is_some() {
            info!(target: "explorer_backend", %id, "Session restarted");
        }
        handle
    }

    /// Drop every session not touched within the TTL as of `now`.
    pub async fn prune_idle(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.write().await;
        prune(&mut sessions, now, self.settings.session_ttl())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn prune(sessions: &mut HashMap<Uuid, SessionEntry>, now: Instant, ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= ttl);
    before - sessions.len()
}

/// Background sweep so abandoned sessions go away even when no new session
/// is started.
pub fn spawn_session_reaper(state: Arc<AppState>) -> JoinHandle<()> {
    let period = state.settings.session_ttl().min(MAX_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let pruned = state.prune_idle(Instant::now()).await;
            if pruned > 0 {
                let remaining = state.session_count().await;
                info!(target: "explorer_backend", pruned, remaining, "Expired sessions removed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QuestionPreference, UserProfile};

    fn state_with_ttl(secs: u64) -> AppState {
        let settings = AssessmentSettings { session_ttl_secs: secs, ..AssessmentSettings::default() };
        AppState::new(local_capabilities(), KnowledgeBase::new(), settings)
    }

    fn blank_session() -> Session {
        Session::new(Uuid::new_v4(), UserProfile::default(), QuestionPreference::Textual)
    }

    async fn last_seen(state: &AppState, id: Uuid) -> Instant {
        state.sessions.read().await[&id].last_seen
    }

    #[tokio::test]
    async fn idle_sessions_expire_and_active_ones_stay() {
        let state = state_with_ttl(60);
        let stale = state.put_session(blank_session()).await.lock().await.id;
        let fresh = state.put_session(blank_session()).await.lock().await.id;

        let t0 = last_seen(&state, stale).await;
        state.sessions.write().await.get_mut(&fresh).unwrap().last_seen = t0 + Duration::from_secs(45);

        assert_eq!(state.prune_idle(t0 + Duration::from_secs(30)).await, 0);
        assert_eq!(state.prune_idle(t0 + Duration::from_secs(61)).await, 1);
        assert!(state.session(stale).await.is_none());
        assert!(state.session(fresh).await.is_some());
        assert_eq!(state.session_count().await, 1);
    }

    #[tokio::test]
    async fn lookups_refresh_the_idle_clock() {
        let state = state_with_ttl(60);
        let id = state.put_session(blank_session()).await.lock().await.id;
        let t0 = last_seen(&state, id).await;
        state.session(id).await.unwrap();
        assert!(last_seen(&state, id).await >= t0);
    }

    #[tokio::test]
    async fn inserting_prunes_expired_sessions() {
        let state = state_with_ttl(1);
        let mut old_ids = Vec::new();
        for _ in 0..50 {
            old_ids.push(state.put_session(blank_session()).await.lock().await.id);
        }
        let Some(long_ago) = Instant::now().checked_sub(Duration::from_secs(5)) else {
            return;
        };
        for id in &old_ids {
            state.sessions.write().await.get_mut(id).unwrap().last_seen = long_ago;
        }

        state.put_session(blank_session()).await;
        assert_eq!(state.session_count().await, 1);
    }
}
