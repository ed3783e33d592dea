//! Scriptable port mocks shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::adapters::MemoryStorage;
use crate::error::{NetworkError, StorageError, TransitionError};
use crate::ports::{
    Clock, DocumentPort, EnvironmentProbe, HttpMethod, HttpRequest, HttpResponse, NetworkPort, StoragePort,
    ViewTransitionPort,
};
use crate::theme::palette::Palette;
use crate::theme::transition::TransitionStyle;
use crate::theme::{AccessibilityFlags, ThemeName};

// =============================================================================
// ManualClock
// =============================================================================

pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn at(millis: u64) -> Arc<Self> {
        Arc::new(Self { now: AtomicU64::new(millis) })
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// =============================================================================
// FlakyStorage
// =============================================================================

/// Memory storage whose reads and writes can be switched to fail.
#[derive(Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FlakyStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn broken() -> Arc<Self> {
        let storage = Self::default();
        storage.fail_reads.store(true, Ordering::SeqCst);
        storage.fail_writes.store(true, Ordering::SeqCst);
        Arc::new(storage)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(key).unwrap()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.inner.set(key, value).unwrap();
    }
}

impl StoragePort for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Denied("reads disabled".into()));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QuotaExceeded);
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Denied("writes disabled".into()));
        }
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        self.inner.keys()
    }
}

// =============================================================================
// MockNetwork
// =============================================================================

type Reply = Result<HttpResponse, NetworkError>;

/// Scripted network. Each route replays its queue; the last reply repeats.
pub struct MockNetwork {
    online: AtomicBool,
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn reply(&self, method: HttpMethod, path: &str, reply: Reply) {
        self.routes.lock().unwrap().entry((method, path.to_owned())).or_default().push_back(reply);
    }

    pub fn reply_json(&self, method: HttpMethod, path: &str, body: &Value) {
        self.reply(method, path, Ok(ok_response(&body.to_string())));
    }

    pub fn reply_status(&self, method: HttpMethod, path: &str, status: u16, status_text: &str) {
        self.reply(method, path, Ok(HttpResponse { status, status_text: status_text.to_owned(), body: String::new() }));
    }

    pub fn reply_error(&self, method: HttpMethod, path: &str, err: NetworkError) {
        self.reply(method, path, Err(err));
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, method: HttpMethod, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.method == method && c.path == path).count()
    }
}

pub fn ok_response(body: &str) -> HttpResponse {
    HttpResponse { status: 200, status_text: "OK".into(), body: body.to_owned() }
}

#[async_trait::async_trait]
impl NetworkPort for MockNetwork {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        self.calls.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(request.method, request.path.clone())) else {
            return Err(NetworkError::Connection(format!("no route for {}", request.path)));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

// =============================================================================
// RecordingDocument
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocEvent {
    Applied { theme: ThemeName, high_contrast: bool },
    TransitionStarted { duration: Duration },
    TransitionEnded,
}

#[derive(Default)]
pub struct RecordingDocument {
    events: Mutex<Vec<DocEvent>>,
}

impl RecordingDocument {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DocEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn applied_themes(&self) -> Vec<ThemeName> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                DocEvent::Applied { theme, .. } => Some(theme),
                _ => None,
            })
            .collect()
    }

    pub fn transition_active(&self) -> bool {
        let events = self.events();
        let started = events.iter().filter(|e| matches!(e, DocEvent::TransitionStarted { .. })).count();
        let ended = events.iter().filter(|e| matches!(e, DocEvent::TransitionEnded)).count();
        started > ended
    }
}

impl DocumentPort for RecordingDocument {
    fn apply_theme(&self, theme: ThemeName, palette: &Palette) {
        self.events.lock().unwrap().push(DocEvent::Applied { theme, high_contrast: palette.high_contrast });
    }

    fn begin_transition(&self, style: &TransitionStyle) {
        self.events.lock().unwrap().push(DocEvent::TransitionStarted { duration: style.duration });
    }

    fn end_transition(&self) {
        self.events.lock().unwrap().push(DocEvent::TransitionEnded);
    }
}

// =============================================================================
// Environment + view transitions
// =============================================================================

pub struct FixedEnvironment {
    pub system_theme: Option<ThemeName>,
    pub accessibility: Option<AccessibilityFlags>,
}

impl EnvironmentProbe for FixedEnvironment {
    fn system_theme(&self) -> Option<ThemeName> {
        self.system_theme
    }

    fn accessibility(&self) -> Option<AccessibilityFlags> {
        self.accessibility
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveBehavior {
    /// Run the update, wait, succeed.
    Succeed,
    /// Throw before touching the update.
    FailBeforeUpdate,
    /// Run the update, then throw.
    FailAfterUpdate,
}

pub struct ScriptedViewTransition {
    behavior: PrimitiveBehavior,
    duration: Duration,
    pub runs: AtomicUsize,
}

impl ScriptedViewTransition {
    pub fn new(behavior: PrimitiveBehavior, duration: Duration) -> Arc<Self> {
        Arc::new(Self { behavior, duration, runs: AtomicUsize::new(0) })
    }
}

#[async_trait::async_trait]
impl ViewTransitionPort for ScriptedViewTransition {
    async fn run(&self, update: &mut (dyn FnMut() + Send)) -> Result<(), TransitionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            PrimitiveBehavior::Succeed => {
                update();
                tokio::time::sleep(self.duration).await;
                Ok(())
            }
            PrimitiveBehavior::FailBeforeUpdate => Err(TransitionError::Primitive("not supported".into())),
            PrimitiveBehavior::FailAfterUpdate => {
                update();
                Err(TransitionError::Primitive("aborted".into()))
            }
        }
    }
}
