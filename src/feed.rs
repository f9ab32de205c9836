use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::data::CommentService;
use crate::error::{FeedError, SubmitError};
use crate::identity::{AuthError, IdentityProvider};
use crate::model::{Comment, FeedEntry, PendingComment, Viewer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    Idle,
    Loading,
    Ready(Vec<Comment>),
    Error(FeedError),
}

/// The comment form. At most one submission is outstanding at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Submission {
    #[default]
    Idle,
    Pending(PendingComment),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Submitting,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NotificationLevel::Success => write!(f, "{}", self.message),
            NotificationLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Delete { comment_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Succeeded,
    Failed(String),
}

/// Sent to observers once a create or delete has resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSettled {
    pub post_id: String,
    pub kind: MutationKind,
    pub outcome: MutationOutcome,
}

type Observer = Box<dyn FnMut(&MutationSettled) + Send>;

struct PendingLoad {
    request_id: u64,
    post_id: String,
}

struct PendingCreate {
    request_id: u64,
    post_id: String,
}

pub(crate) struct PendingDelete {
    pub(crate) request_id: u64,
    pub(crate) post_id: String,
}

pub(crate) enum Response {
    Comments {
        request_id: u64,
        post_id: String,
        result: Result<Vec<Comment>, ApiError>,
    },
    Created {
        request_id: u64,
        post_id: String,
        result: Result<(), FeedError>,
    },
    Deleted {
        request_id: u64,
        post_id: String,
        comment_id: String,
        result: Result<(), FeedError>,
    },
}

/// Owns one post's comment list, the comment form, and the requests that
/// keep them in sync with the server.
///
/// Requests run on worker threads and report back over a channel; nothing
/// changes until [`Feed::poll`] or [`Feed::wait_until_settled`] applies the
/// responses on the owning thread. Every request is tagged with an id and
/// the post it was issued for, and responses that no longer match are
/// dropped.
pub struct Feed {
    pub(crate) service: Arc<dyn CommentService>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) post_id: String,
    list: ListState,
    submission: Submission,
    pending_load: Option<PendingLoad>,
    pending_create: Option<PendingCreate>,
    pub(crate) deleting: HashMap<String, PendingDelete>,
    notifications: VecDeque<Notification>,
    observers: Vec<Observer>,
    next_request_id: u64,
    pub(crate) response_tx: Sender<Response>,
    response_rx: Receiver<Response>,
}

impl Feed {
    pub fn new(
        service: Arc<dyn CommentService>,
        identity: Arc<dyn IdentityProvider>,
        post_id: impl Into<String>,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            service,
            identity,
            post_id: post_id.into(),
            list: ListState::Idle,
            submission: Submission::Idle,
            pending_load: None,
            pending_create: None,
            deleting: HashMap::new(),
            notifications: VecDeque::new(),
            observers: Vec::new(),
            next_request_id: 1,
            response_tx,
            response_rx,
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn list(&self) -> &ListState {
        &self.list
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn viewer(&self) -> Option<Viewer> {
        self.identity.current_viewer()
    }

    pub fn phase(&self) -> Phase {
        match &self.list {
            ListState::Idle => Phase::Idle,
            ListState::Loading => Phase::Loading,
            ListState::Error(_) => Phase::Error,
            ListState::Ready(_) => {
                if matches!(self.submission, Submission::Pending(_)) {
                    Phase::Submitting
                } else {
                    Phase::Ready
                }
            }
        }
    }

    /// True while a re-fetch runs behind an already rendered list.
    pub fn is_refreshing(&self) -> bool {
        matches!(self.list, ListState::Ready(_)) && self.pending_load.is_some()
    }

    /// The form is disabled while a submission is outstanding.
    pub fn can_submit(&self) -> bool {
        matches!(self.list, ListState::Ready(_))
            && self.pending_create.is_none()
            && self.identity.current_viewer().is_some()
    }

    pub fn has_outstanding_requests(&self) -> bool {
        self.pending_load.is_some() || self.pending_create.is_some() || !self.deleting.is_empty()
    }

    /// What the list region shows: the pending comment, if any, ahead of
    /// the server's comments in server order. Empty unless the list loaded.
    pub fn entries(&self) -> Vec<FeedEntry> {
        let ListState::Ready(comments) = &self.list else {
            return Vec::new();
        };
        let mut entries = Vec::with_capacity(comments.len() + 1);
        if let Submission::Pending(pending) = &self.submission {
            entries.push(FeedEntry::Pending(pending.clone()));
        }
        entries.extend(comments.iter().cloned().map(FeedEntry::Server));
        entries
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    pub fn on_mutation_settled<F>(&mut self, callback: F)
    where
        F: FnMut(&MutationSettled) + Send + 'static,
    {
        self.observers.push(Box::new(callback));
    }

    /// Loads `post_id`'s comments, switching posts first if it differs from
    /// the current one.
    pub fn load_comments(&mut self, post_id: impl Into<String>) {
        let post_id = post_id.into();
        if post_id != self.post_id {
            self.set_post(post_id);
        } else {
            self.start_load();
        }
    }

    /// Navigates to `post_id`: drops the current list, the form state, and
    /// every outstanding request's result, then starts a load.
    pub fn set_post(&mut self, post_id: impl Into<String>) {
        let post_id = post_id.into();
        debug!(from = %self.post_id, to = %post_id, "switch post");
        self.post_id = post_id;
        self.submission = Submission::Idle;
        self.pending_create = None;
        self.deleting.clear();
        self.list = ListState::Idle;
        self.start_load();
    }

    pub fn refresh(&mut self) {
        self.start_load();
    }

    pub fn submit_comment(&mut self, body: &str) -> Result<(), SubmitError> {
        if body.trim().is_empty() {
            return Err(SubmitError::EmptyBody);
        }
        if self.pending_create.is_some() {
            return Err(SubmitError::InFlight);
        }
        if !matches!(self.list, ListState::Ready(_)) {
            return Err(SubmitError::NotReady);
        }
        let Some(viewer) = self.identity.current_viewer() else {
            return Err(SubmitError::SignedOut);
        };

        let request_id = self.next_request_id();
        let post_id = self.post_id.clone();
        self.submission = Submission::Pending(PendingComment::new(body, &viewer, Utc::now()));
        self.pending_create = Some(PendingCreate {
            request_id,
            post_id: post_id.clone(),
        });
        debug!(request_id, %post_id, "submit comment");

        let tx = self.response_tx.clone();
        let service = self.service.clone();
        let identity = self.identity.clone();
        let body = body.to_string();
        thread::spawn(move || {
            let result = identity
                .token()
                .map_err(auth_error)
                .and_then(|token| {
                    service
                        .create_comment(&post_id, &body, &token)
                        .map_err(mutation_error)
                });
            let _ = tx.send(Response::Created {
                request_id,
                post_id,
                result,
            });
        });
        Ok(())
    }

    /// Applies every response that has already arrived. Returns whether
    /// anything was received.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_response(message);
            changed = true;
        }
        changed
    }

    /// Blocks until no request is outstanding or `timeout` elapses. Returns
    /// whether the feed settled.
    pub fn wait_until_settled(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll();
        while self.has_outstanding_requests() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(message) => self.handle_response(message),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
        true
    }

    pub(crate) fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    pub(crate) fn start_load(&mut self) {
        let request_id = self.next_request_id();
        let post_id = self.post_id.clone();
        if !matches!(self.list, ListState::Ready(_)) {
            self.list = ListState::Loading;
        }
        // A newer fetch supersedes whatever is still in flight.
        self.pending_load = Some(PendingLoad {
            request_id,
            post_id: post_id.clone(),
        });
        debug!(request_id, %post_id, "load comments");

        let tx = self.response_tx.clone();
        let service = self.service.clone();
        thread::spawn(move || {
            let result = service.load_comments(&post_id);
            let _ = tx.send(Response::Comments {
                request_id,
                post_id,
                result,
            });
        });
    }

    pub(crate) fn notify(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }

    pub(crate) fn settle(&mut self, kind: MutationKind, outcome: MutationOutcome) {
        let event = MutationSettled {
            post_id: self.post_id.clone(),
            kind,
            outcome,
        };
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }

    fn handle_response(&mut self, message: Response) {
        match message {
            Response::Comments {
                request_id,
                post_id,
                result,
            } => {
                let Some(pending) = &self.pending_load else {
                    debug!(request_id, "discard unexpected comments response");
                    return;
                };
                if pending.request_id != request_id
                    || pending.post_id != post_id
                    || post_id != self.post_id
                {
                    debug!(request_id, %post_id, "discard stale comments response");
                    return;
                }
                self.pending_load = None;

                match result {
                    Ok(comments) => {
                        debug!(request_id, count = comments.len(), "comments loaded");
                        self.list = ListState::Ready(comments);
                    }
                    Err(err) => {
                        warn!(%post_id, error = %err, "failed to load comments");
                        self.list = ListState::Error(FeedError::Fetch(err.to_string()));
                    }
                }
            }
            Response::Created {
                request_id,
                post_id,
                result,
            } => {
                let Some(pending) = &self.pending_create else {
                    debug!(request_id, "discard unexpected create response");
                    return;
                };
                if pending.request_id != request_id || pending.post_id != post_id {
                    debug!(request_id, %post_id, "discard stale create response");
                    return;
                }
                self.pending_create = None;

                match result {
                    Ok(()) => {
                        self.submission = Submission::Idle;
                        self.settle(MutationKind::Create, MutationOutcome::Succeeded);
                        self.start_load();
                    }
                    Err(err) => {
                        debug!(%post_id, error = %err, "failed to create comment");
                        let message = err.message().to_string();
                        self.submission = Submission::Failed(message.clone());
                        self.notify(Notification::error(message.clone()));
                        self.settle(MutationKind::Create, MutationOutcome::Failed(message));
                    }
                }
            }
            Response::Deleted {
                request_id,
                post_id,
                comment_id,
                result,
            } => self.handle_deleted(request_id, post_id, comment_id, result),
        }
    }
}

pub(crate) fn auth_error(err: AuthError) -> FeedError {
    FeedError::Auth(err.to_string())
}

pub(crate) fn mutation_error(err: ApiError) -> FeedError {
    FeedError::Mutation(err.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;
    use reqwest::StatusCode;

    use crate::identity::{StaticIdentity, Token};
    use crate::model::{Author, Role};

    pub(crate) const WAIT: Duration = Duration::from_secs(5);

    /// In-memory server. Creates append to the front, like a newest-first
    /// backend. A gate, when set, holds create requests until released.
    #[derive(Default)]
    pub(crate) struct FakeService {
        pub(crate) comments: Mutex<HashMap<String, Vec<Comment>>>,
        pub(crate) loads: AtomicUsize,
        pub(crate) fail_load: Mutex<Option<String>>,
        pub(crate) fail_create: Mutex<Option<String>>,
        pub(crate) fail_delete: Mutex<Option<String>>,
        pub(crate) create_gate: Mutex<Option<Receiver<()>>>,
        pub(crate) tokens: Mutex<Vec<String>>,
        next_id: AtomicUsize,
    }

    impl FakeService {
        pub(crate) fn with_comments(post_id: &str, comments: Vec<Comment>) -> Arc<Self> {
            let service = Self::default();
            service.comments.lock().insert(post_id.to_string(), comments);
            service.next_id.store(100, Ordering::SeqCst);
            Arc::new(service)
        }

        pub(crate) fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        pub(crate) fn gate_creates(&self) -> Sender<()> {
            let (tx, rx) = bounded(1);
            *self.create_gate.lock() = Some(rx);
            tx
        }
    }

    fn server_error(message: &str) -> ApiError {
        ApiError::Server {
            status: StatusCode::FORBIDDEN,
            message: message.to_string(),
        }
    }

    impl CommentService for FakeService {
        fn load_comments(&self, post_id: &str) -> Result<Vec<Comment>, ApiError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = self.fail_load.lock().clone() {
                return Err(server_error(&message));
            }
            Ok(self
                .comments
                .lock()
                .get(post_id)
                .cloned()
                .unwrap_or_default())
        }

        fn create_comment(&self, post_id: &str, body: &str, token: &Token) -> Result<(), ApiError> {
            let gate = self.create_gate.lock().clone();
            if let Some(gate) = gate {
                let _ = gate.recv_timeout(WAIT);
            }
            self.tokens.lock().push(token.access_token.clone());
            if let Some(message) = self.fail_create.lock().clone() {
                return Err(server_error(&message));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let comment = Comment {
                id: format!("c{id}"),
                body: body.to_string(),
                created_at: Utc::now(),
                author: Author {
                    username: token.access_token.trim_start_matches("token-").to_string(),
                    avatar_url: None,
                },
            };
            self.comments
                .lock()
                .entry(post_id.to_string())
                .or_default()
                .insert(0, comment);
            Ok(())
        }

        fn delete_comment(&self, comment_id: &str, token: &Token) -> Result<(), ApiError> {
            self.tokens.lock().push(token.access_token.clone());
            if let Some(message) = self.fail_delete.lock().clone() {
                return Err(server_error(&message));
            }
            for comments in self.comments.lock().values_mut() {
                comments.retain(|comment| comment.id != comment_id);
            }
            Ok(())
        }
    }

    pub(crate) fn comment(id: &str, body: &str, author: &str) -> Comment {
        Comment {
            id: id.into(),
            body: body.into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            author: Author {
                username: author.into(),
                avatar_url: None,
            },
        }
    }

    pub(crate) fn signed_in(username: &str, role: Role) -> Arc<dyn IdentityProvider> {
        StaticIdentity::new(
            Some(Viewer::new(username, role)),
            Some(format!("token-{username}")),
        )
        .shared()
    }

    pub(crate) fn loaded_feed(service: Arc<FakeService>, identity: Arc<dyn IdentityProvider>) -> Feed {
        let mut feed = Feed::new(service, identity, "p1");
        feed.load_comments("p1");
        assert!(feed.wait_until_settled(WAIT));
        feed
    }

    fn server_ids(feed: &Feed) -> Vec<String> {
        feed.entries()
            .iter()
            .filter_map(|entry| entry.id().map(str::to_string))
            .collect()
    }

    #[test]
    fn loads_in_server_order() {
        let service = FakeService::with_comments(
            "p1",
            vec![comment("c2", "second", "bob"), comment("c1", "hi", "alice")],
        );
        let mut feed = Feed::new(service.clone(), signed_in("bob", Role::Member), "p1");
        assert_eq!(feed.phase(), Phase::Idle);
        feed.load_comments("p1");
        assert_eq!(feed.phase(), Phase::Loading);
        assert!(feed.entries().is_empty());
        assert!(feed.wait_until_settled(WAIT));
        assert_eq!(feed.phase(), Phase::Ready);
        assert_eq!(server_ids(&feed), vec!["c2", "c1"]);
        assert_eq!(service.loads(), 1);
    }

    #[test]
    fn empty_post_is_ready_without_error() {
        let service = FakeService::with_comments("p1", Vec::new());
        let feed = loaded_feed(service, signed_in("bob", Role::Member));
        assert_eq!(feed.phase(), Phase::Ready);
        assert_eq!(feed.list(), &ListState::Ready(Vec::new()));
        assert!(feed.entries().is_empty());
        assert!(feed.can_submit());
    }

    #[test]
    fn fetch_failure_blocks_list() {
        let service = FakeService::with_comments("p1", vec![comment("c1", "hi", "alice")]);
        *service.fail_load.lock() = Some("database down".into());
        let mut feed = loaded_feed(service, signed_in("bob", Role::Member));
        assert_eq!(feed.phase(), Phase::Error);
        match feed.list() {
            ListState::Error(FeedError::Fetch(message)) => assert_eq!(message, "database down"),
            other => panic!("unexpected list state: {other:?}"),
        }
        assert!(feed.entries().is_empty());
        assert_eq!(feed.submit_comment("hello"), Err(SubmitError::NotReady));
        assert!(feed.take_notifications().is_empty());
    }

    #[test]
    fn pending_comment_is_first_until_create_resolves() {
        let service = FakeService::with_comments("p1", vec![comment("c1", "hi", "alice")]);
        let mut feed = loaded_feed(service.clone(), signed_in("alice", Role::Member));
        let release = service.gate_creates();

        feed.submit_comment("thanks").unwrap();
        assert_eq!(feed.phase(), Phase::Submitting);
        let entries = feed.entries();
        assert_eq!(entries.len(), 2);
        match &entries[0] {
            FeedEntry::Pending(pending) => {
                assert_eq!(pending.body, "thanks");
                assert_eq!(pending.author.username, "alice");
            }
            other => panic!("expected pending entry, got {other:?}"),
        }
        assert_eq!(entries[1].id(), Some("c1"));

        feed.poll();
        assert!(feed.entries()[0].is_pending());

        release.send(()).unwrap();
        assert!(feed.wait_until_settled(WAIT));
        assert_eq!(feed.phase(), Phase::Ready);
        assert_eq!(feed.submission(), &Submission::Idle);
        let entries = feed.entries();
        assert!(entries.iter().all(|entry| !entry.is_pending()));
        assert_eq!(entries[0].body(), "thanks");
        assert_eq!(entries[1].id(), Some("c1"));
    }

    #[test]
    fn successful_create_refetches_once() {
        let service = FakeService::with_comments("p1", vec![comment("c1", "hi", "alice")]);
        let mut feed = loaded_feed(service.clone(), signed_in("alice", Role::Member));
        assert_eq!(service.loads(), 1);

        feed.submit_comment("thanks").unwrap();
        assert!(feed.wait_until_settled(WAIT));
        assert_eq!(service.loads(), 2);
        assert_eq!(service.tokens.lock().as_slice(), ["token-alice"]);
        assert!(feed.take_notifications().is_empty());
    }

    #[test]
    fn failed_create_surfaces_server_message() {
        let service = FakeService::with_comments("p1", vec![comment("c1", "hi", "alice")]);
        *service.fail_create.lock() = Some("Not authenticated!".into());
        let mut feed = loaded_feed(service.clone(), signed_in("alice", Role::Member));

        feed.submit_comment("thanks").unwrap();
        assert!(feed.wait_until_settled(WAIT));

        assert_eq!(
            feed.take_notifications(),
            vec![Notification::error("Not authenticated!")]
        );
        assert_eq!(
            feed.submission(),
            &Submission::Failed("Not authenticated!".into())
        );
        assert_eq!(feed.phase(), Phase::Ready);
        assert_eq!(server_ids(&feed), vec!["c1"]);
        assert!(feed.entries().iter().all(|entry| !entry.is_pending()));
        assert_eq!(service.loads(), 1);
        assert_eq!(service.comments.lock()["p1"].len(), 1);
    }

    #[test]
    fn missing_token_is_reported_as_mutation_failure() {
        let service = FakeService::with_comments("p1", Vec::new());
        let identity = StaticIdentity::new(Some(Viewer::new("alice", Role::Member)), None).shared();
        let mut feed = loaded_feed(service.clone(), identity);

        feed.submit_comment("thanks").unwrap();
        assert!(feed.wait_until_settled(WAIT));
        let notes = feed.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Error);
        assert_eq!(notes[0].message, "no access token available");
        assert!(service.tokens.lock().is_empty());
    }

    #[test]
    fn rejects_blank_signed_out_and_concurrent_submissions() {
        let service = FakeService::with_comments("p1", Vec::new());
        let mut anonymous = loaded_feed(service.clone(), StaticIdentity::anonymous().shared());
        assert!(!anonymous.can_submit());
        assert_eq!(anonymous.submit_comment("hi"), Err(SubmitError::SignedOut));

        let mut feed = loaded_feed(service.clone(), signed_in("alice", Role::Member));
        assert_eq!(feed.submit_comment(""), Err(SubmitError::EmptyBody));
        assert_eq!(feed.submit_comment("  \n\t"), Err(SubmitError::EmptyBody));

        let release = service.gate_creates();
        feed.submit_comment("first").unwrap();
        assert!(!feed.can_submit());
        assert_eq!(feed.submit_comment("second"), Err(SubmitError::InFlight));
        assert_eq!(feed.entries().iter().filter(|e| e.is_pending()).count(), 1);
        release.send(()).unwrap();
        assert!(feed.wait_until_settled(WAIT));
        assert_eq!(service.comments.lock()["p1"].len(), 1);
    }

    #[test]
    fn observers_hear_settled_mutations() {
        let service = FakeService::with_comments("p1", Vec::new());
        let mut feed = loaded_feed(service.clone(), signed_in("alice", Role::Member));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        feed.on_mutation_settled(move |event| sink.lock().push(event.clone()));

        feed.submit_comment("one").unwrap();
        assert!(feed.wait_until_settled(WAIT));
        *service.fail_create.lock() = Some("slow down".into());
        feed.submit_comment("two").unwrap();
        assert!(feed.wait_until_settled(WAIT));

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                MutationSettled {
                    post_id: "p1".into(),
                    kind: MutationKind::Create,
                    outcome: MutationOutcome::Succeeded,
                },
                MutationSettled {
                    post_id: "p1".into(),
                    kind: MutationKind::Create,
                    outcome: MutationOutcome::Failed("slow down".into()),
                },
            ]
        );
    }

    #[test]
    fn switching_posts_discards_stale_responses() {
        let service = FakeService::with_comments("p1", vec![comment("c1", "hi", "alice")]);
        service
            .comments
            .lock()
            .insert("p2".into(), vec![comment("c9", "other", "carol")]);
        let mut feed = loaded_feed(service.clone(), signed_in("alice", Role::Member));
        let release = service.gate_creates();

        feed.submit_comment("for p1").unwrap();
        feed.load_comments("p2");
        assert_eq!(feed.post_id(), "p2");
        assert_eq!(feed.submission(), &Submission::Idle);
        assert!(feed.wait_until_settled(WAIT));
        assert_eq!(server_ids(&feed), vec!["c9"]);

        release.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));
        feed.poll();
        assert_eq!(server_ids(&feed), vec!["c9"]);
        assert!(feed.take_notifications().is_empty());
        assert!(!feed.has_outstanding_requests());
    }

    #[test]
    fn pending_entry_leads_unchanged_server_order() {
        let service = FakeService::with_comments(
            "p1",
            vec![
                comment("c3", "third", "carol"),
                comment("c2", "second", "bob"),
                comment("c1", "first", "alice"),
            ],
        );
        let mut feed = loaded_feed(service.clone(), signed_in("alice", Role::Member));
        let release = service.gate_creates();

        let before = Utc::now();
        feed.submit_comment("thanks").unwrap();
        let after = Utc::now();

        let entries = feed.entries();
        let ids: Vec<Option<&str>> = entries.iter().map(FeedEntry::id).collect();
        assert_eq!(ids, vec![None, Some("c3"), Some("c2"), Some("c1")]);
        match &entries[0] {
            FeedEntry::Pending(pending) => {
                assert_eq!(pending.body, "thanks");
                assert_eq!(pending.author.username, "alice");
                assert!(pending.created_at >= before && pending.created_at <= after);
            }
            other => panic!("expected pending entry, got {other:?}"),
        }

        release.send(()).unwrap();
        assert!(feed.wait_until_settled(WAIT));
        let ids = server_ids(&feed);
        assert_eq!(ids.len(), 4);
        assert_eq!(&ids[1..], &["c3", "c2", "c1"]);
    }

    #[test]
    fn set_post_resets_and_loads() {
        let service = FakeService::with_comments("p1", vec![comment("c1", "hi", "alice")]);
        service
            .comments
            .lock()
            .insert("p2".into(), vec![comment("c9", "other", "carol")]);
        let mut feed = loaded_feed(service.clone(), signed_in("alice", Role::Member));
        *service.fail_create.lock() = Some("rejected".into());
        feed.submit_comment("nope").unwrap();
        assert!(feed.wait_until_settled(WAIT));
        assert_eq!(feed.submission(), &Submission::Failed("rejected".into()));

        feed.set_post("p2");
        assert_eq!(feed.post_id(), "p2");
        assert_eq!(feed.phase(), Phase::Loading);
        assert_eq!(feed.submission(), &Submission::Idle);
        assert!(feed.entries().is_empty());
        assert!(feed.wait_until_settled(WAIT));
        assert_eq!(server_ids(&feed), vec!["c9"]);
        assert_eq!(service.loads(), 2);
    }

    #[test]
    fn newer_fetch_supersedes_older() {
        let service = FakeService::with_comments("p1", vec![comment("c1", "hi", "alice")]);
        let mut feed = Feed::new(service.clone(), signed_in("alice", Role::Member), "p1");
        feed.load_comments("p1");
        feed.refresh();
        assert!(feed.wait_until_settled(WAIT));
        assert_eq!(server_ids(&feed), vec!["c1"]);
        thread::sleep(Duration::from_millis(50));
        feed.poll();
        assert_eq!(feed.phase(), Phase::Ready);
        assert_eq!(server_ids(&feed), vec!["c1"]);
        assert_eq!(service.loads(), 2);
    }

    #[test]
    fn refresh_keeps_list_visible() {
        let service = FakeService::with_comments("p1", vec![comment("c1", "hi", "alice")]);
        let mut feed = loaded_feed(service, signed_in("alice", Role::Member));
        feed.refresh();
        assert!(feed.is_refreshing());
        assert_eq!(feed.phase(), Phase::Ready);
        assert_eq!(server_ids(&feed), vec!["c1"]);
        assert!(feed.wait_until_settled(WAIT));
        assert!(!feed.is_refreshing());
    }
}
