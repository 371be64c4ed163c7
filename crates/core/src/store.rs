use std::sync::{Arc, Mutex, MutexGuard};

use haven_remote::{ChatBackend, TranscriptRole};
use uuid::Uuid;

use crate::error::StoreError;
use crate::session::{Message, Role, Session, SessionSummary};
use crate::title::{self, TitleCache};

type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// [`SessionStore`] builder.
pub struct SessionStoreBuilder<B> {
    backend: B,
    word_limit: usize,
    on_change: Option<ChangeCallback>,
}

impl<B: ChatBackend + 'static> SessionStoreBuilder<B> {
    /// Creates a builder with the specified backend.
    #[inline]
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            word_limit: 5,
            on_change: None,
        }
    }

    /// Sets the word limit used when deriving session titles.
    #[inline]
    pub fn title_word_limit(mut self, word_limit: usize) -> Self {
        self.word_limit = word_limit;
        self
    }

    /// Attaches a callback to be invoked after every observable state
    /// change, so a renderer can redraw without polling.
    #[inline]
    pub fn on_change(
        mut self,
        on_change: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Arc::new(on_change));
        self
    }

    /// Builds the store.
    pub fn build(self) -> SessionStore<B> {
        SessionStore {
            backend: Arc::new(self.backend),
            state: Arc::new(Mutex::new(StoreState::default())),
            titles: TitleCache::new(),
            word_limit: self.word_limit,
            on_change: self.on_change,
        }
    }
}

#[derive(Default)]
struct StoreState {
    /// Most recent first; ids are unique.
    sessions: Vec<Session>,
    active_id: Option<String>,
    /// Bumped on every selection change, so a history response that
    /// arrives after a newer selection is dropped instead of applied.
    load_epoch: u64,
}

impl StoreState {
    fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}

/// The single source of truth for conversation sessions.
///
/// The store owns the session collection, the active selection and
/// the title cache. All mutations go through its methods; clones
/// share the same state, so background tasks and the send coordinator
/// can hold their own handles. The internal lock is never held across
/// an await point, which keeps mutations serialized without blocking
/// the caller's task during remote calls.
pub struct SessionStore<B: ChatBackend> {
    backend: Arc<B>,
    state: Arc<Mutex<StoreState>>,
    titles: TitleCache,
    word_limit: usize,
    on_change: Option<ChangeCallback>,
}

impl<B: ChatBackend> Clone for SessionStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            state: Arc::clone(&self.state),
            titles: self.titles.clone(),
            word_limit: self.word_limit,
            on_change: self.on_change.clone(),
        }
    }
}

impl<B: ChatBackend + 'static> SessionStore<B> {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("session store lock poisoned")
    }

    fn notify(&self) {
        if let Some(on_change) = &self.on_change {
            on_change();
        }
    }

    pub(crate) fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Returns the id of the active session, if a session has been
    /// selected or created yet.
    pub fn active_session_id(&self) -> Option<String> {
        self.state().active_id.clone()
    }

    /// Returns a copy of the active session's transcript.
    pub fn active_transcript(&self) -> Vec<Message> {
        let state = self.state();
        state
            .active_id
            .as_ref()
            .and_then(|id| state.session(id))
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Returns a copy of a session by id.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.state().session(session_id).cloned()
    }

    /// Returns the display title for a session: the cached derivation
    /// if present, the session's own locked title otherwise.
    pub fn title_for(&self, session_id: &str) -> String {
        if let Some(title) = self.titles.get(session_id) {
            return title;
        }
        self.state()
            .session(session_id)
            .map(|s| s.title.clone())
            .unwrap_or_else(|| title::SENTINEL_TITLE.to_owned())
    }

    /// Snapshots the current listing, most recent session first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let state = self.state();
        state
            .sessions
            .iter()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                title: self
                    .titles
                    .get(&s.id)
                    .unwrap_or_else(|| s.title.clone()),
                message_count: s.message_count(),
            })
            .collect()
    }

    /// Synchronizes the collection with the remote listing.
    ///
    /// Remote ordering is authoritative: sessions the service lists
    /// are kept in its order, sessions it stopped listing were
    /// deleted elsewhere and are dropped, and only never-synced local
    /// sessions (a fresh chat that has not been sent yet) keep their
    /// spot at the front. Loaded transcripts are preserved. A dropped
    /// active session is replaced with the same policy as a local
    /// delete. Sessions without a cached title get a background title
    /// resolution kicked off, which never blocks the caller.
    ///
    /// On failure the local state is left untouched.
    pub async fn refresh_sessions(&self) -> Result<(), StoreError> {
        let summaries = self
            .backend
            .list_conversations()
            .await
            .map_err(StoreError::remote)?;

        let (backfill, dropped, replacement) = {
            let mut state = self.state();
            let previous = std::mem::take(&mut state.sessions);
            let (absent, mut known): (Vec<_>, Vec<_>) =
                previous.into_iter().partition(|s| {
                    !summaries.iter().any(|c| c.session_id == s.id)
                });
            let (mut merged, dropped): (Vec<_>, Vec<_>) =
                absent.into_iter().partition(|s| !s.remote_known);
            for summary in &summaries {
                let session = match known
                    .iter()
                    .position(|s| s.id == summary.session_id)
                {
                    Some(idx) => {
                        let mut session = known.swap_remove(idx);
                        session.remote_known = true;
                        session.remote_messages = summary.messages;
                        session
                    }
                    None => Session::known_remote(
                        summary.session_id.clone(),
                        summary.messages,
                    ),
                };
                merged.push(session);
            }
            state.sessions = merged;

            let active_missing = state
                .active_id
                .as_ref()
                .is_some_and(|id| state.session(id).is_none());
            let replacement = if active_missing {
                let next = state.sessions.first().map(|s| s.id.clone());
                state.active_id = next.clone();
                state.load_epoch += 1;
                Some(next)
            } else {
                None
            };

            let backfill: Vec<String> = state
                .sessions
                .iter()
                .filter(|s| self.titles.get(&s.id).is_none())
                .map(|s| s.id.clone())
                .collect();
            (backfill, dropped, replacement)
        };
        for session in &dropped {
            self.titles.remove(&session.id);
        }
        self.notify();

        for session_id in backfill {
            if !self.titles.begin_resolve(&session_id) {
                continue;
            }
            let store = self.clone();
            tokio::spawn(async move {
                store.resolve_begun(&session_id).await;
            });
        }

        match replacement {
            Some(Some(next)) => {
                if let Err(err) = self.select_session(&next).await {
                    warn!(
                        "failed to load replacement session {next}: {err}"
                    );
                }
            }
            Some(None) => {
                self.create_session();
            }
            None => {}
        }
        Ok(())
    }

    /// Makes a session active, lazily loading its transcript from the
    /// remote on first selection.
    ///
    /// An unknown id is rejected with
    /// [`SessionNotFound`](StoreError::SessionNotFound) and leaves the
    /// store untouched. A failed history fetch reverts the selection.
    /// Overlapping selections race benignly: a history response is
    /// applied only while its selection is still the latest one.
    pub async fn select_session(
        &self,
        session_id: &str,
    ) -> Result<(), StoreError> {
        let (needs_load, previous, epoch) = {
            let mut state = self.state();
            let Some(session) = state.session(session_id) else {
                return Err(StoreError::SessionNotFound(
                    session_id.to_owned(),
                ));
            };
            let needs_load = !session.history_loaded;
            let previous = state.active_id.replace(session_id.to_owned());
            state.load_epoch += 1;
            (needs_load, previous, state.load_epoch)
        };
        self.notify();

        if !needs_load {
            return Ok(());
        }

        match self.backend.fetch_history(session_id).await {
            Ok(history) => {
                {
                    let mut state = self.state();
                    if state.load_epoch != epoch {
                        // A newer selection superseded this fetch.
                        return Ok(());
                    }
                    if let Some(session) = state.session_mut(session_id) {
                        session.messages =
                            history.into_iter().map(Message::from).collect();
                        session.history_loaded = true;
                    }
                }
                self.notify();
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state();
                    if state.load_epoch == epoch {
                        state.active_id = previous;
                    }
                }
                self.notify();
                Err(StoreError::remote(err))
            }
        }
    }

    /// Creates a fresh, empty session, makes it active and returns
    /// it.
    ///
    /// The generated id combines a timestamp and a random component
    /// (UUID v7), so client-generated ids cannot collide with
    /// existing ones.
    pub fn create_session(&self) -> Session {
        let session = Session::new_local(Uuid::now_v7().to_string());
        {
            let mut state = self.state();
            state.sessions.insert(0, session.clone());
            state.active_id = Some(session.id.clone());
            state.load_epoch += 1;
        }
        self.notify();
        session
    }

    /// Deletes a session.
    ///
    /// The remote reset is best-effort: a failure is logged and the
    /// local removal proceeds regardless. Deleting the active session
    /// selects the first remaining session, or creates a fresh one
    /// when none remain, so the active id never points at a deleted
    /// session.
    pub async fn delete_session(
        &self,
        session_id: &str,
    ) -> Result<(), StoreError> {
        if self.state().session(session_id).is_none() {
            return Err(StoreError::SessionNotFound(session_id.to_owned()));
        }

        if let Err(err) = self.backend.reset(session_id).await {
            warn!("remote reset of session {session_id} failed: {err}");
        }

        self.titles.remove(session_id);

        let replacement = {
            let mut state = self.state();
            state.sessions.retain(|s| s.id != session_id);
            state.load_epoch += 1;
            if state.active_id.as_deref() == Some(session_id) {
                let next = state.sessions.first().map(|s| s.id.clone());
                state.active_id = next.clone();
                Some(next)
            } else {
                None
            }
        };
        self.notify();

        match replacement {
            Some(Some(next)) => {
                // The replacement loads lazily like any other
                // selection; a fetch failure is not fatal to the
                // delete.
                if let Err(err) = self.select_session(&next).await {
                    warn!(
                        "failed to load replacement session {next}: {err}"
                    );
                }
            }
            Some(None) => {
                self.create_session();
            }
            None => {}
        }
        Ok(())
    }

    /// Appends a message to a session's transcript.
    ///
    /// The first message of a session, when user-authored, derives
    /// the session's title from its content and fixes it permanently;
    /// later messages never change it.
    pub fn append_message(
        &self,
        session_id: &str,
        message: Message,
    ) -> Result<(), StoreError> {
        let derived = {
            let mut state = self.state();
            let Some(session) = state.session_mut(session_id) else {
                return Err(StoreError::SessionNotFound(
                    session_id.to_owned(),
                ));
            };
            let locks_title =
                session.messages.is_empty() && message.role == Role::User;
            let derived = locks_title.then(|| {
                title::derive_title(&message.content, self.word_limit)
            });
            if let Some(title) = &derived {
                session.title = title.clone();
            }
            session.messages.push(message);
            derived
        };
        if let Some(title) = derived {
            self.titles.insert(session_id, title);
        }
        self.notify();
        Ok(())
    }

    /// Start-of-life composition: refresh the listing, then select
    /// the first known session, or create a fresh one when the
    /// service knows none.
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        self.refresh_sessions().await?;
        let first = self.state().sessions.first().map(|s| s.id.clone());
        match first {
            Some(id) => self.select_session(&id).await,
            None => {
                self.create_session();
                Ok(())
            }
        }
    }

    /// Resolves and caches the title of a session whose content is
    /// only known to the remote.
    ///
    /// Calls for an already-cached id return without a remote fetch,
    /// and concurrent calls for the same id are deduplicated. The
    /// title is derived from the first user-authored message of the
    /// fetched history; an empty or all-assistant history leaves the
    /// sentinel in place. Failures are logged, never surfaced.
    pub async fn resolve_title(&self, session_id: &str) {
        if !self.titles.begin_resolve(session_id) {
            return;
        }
        self.resolve_begun(session_id).await;
    }

    async fn resolve_begun(&self, session_id: &str) {
        let derived = match self.backend.fetch_history(session_id).await {
            Ok(history) => history
                .iter()
                .find(|m| m.role == TranscriptRole::Human)
                .map(|m| title::derive_title(&m.content, self.word_limit)),
            Err(err) => {
                warn!("title resolution for {session_id} failed: {err}");
                None
            }
        };
        let resolved = derived.is_some();
        self.titles.finish_resolve(session_id, derived);
        if resolved {
            self.notify();
        }
    }

    /// Captures a session's transcript and title state, to be
    /// restored by [`restore`](Self::restore) if an optimistic
    /// operation has to be rolled back.
    pub fn snapshot(
        &self,
        session_id: &str,
    ) -> Result<TranscriptSnapshot, StoreError> {
        let state = self.state();
        let Some(session) = state.session(session_id) else {
            return Err(StoreError::SessionNotFound(session_id.to_owned()));
        };
        Ok(TranscriptSnapshot {
            session_id: session_id.to_owned(),
            messages: session.messages.clone(),
            title: session.title.clone(),
            cached_title: self.titles.get(session_id),
        })
    }

    /// Restores a previously captured snapshot, discarding any
    /// messages (and any title derivation) applied since.
    pub fn restore(&self, snapshot: TranscriptSnapshot) {
        {
            let mut state = self.state();
            let Some(session) = state.session_mut(&snapshot.session_id)
            else {
                // The session was deleted while the operation was in
                // flight; nothing left to roll back.
                return;
            };
            session.messages = snapshot.messages;
            session.title = snapshot.title;
        }
        match snapshot.cached_title {
            Some(title) => self.titles.insert(snapshot.session_id, title),
            None => self.titles.remove(&snapshot.session_id),
        }
        self.notify();
    }
}

/// A captured pre-operation state of one session, used for rollbacks.
#[derive(Clone, Debug)]
pub struct TranscriptSnapshot {
    session_id: String,
    messages: Vec<Message>,
    title: String,
    cached_title: Option<String>,
}
