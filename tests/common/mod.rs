#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lexicon_backend::engine::events::{DomainEvent, EventPublisher, MemoryPublisher, PublishError};
use lexicon_backend::engine::policy::ModerationPolicy;
use lexicon_backend::engine::{Intent, ModerationEngine, Outcome, Projection};
use lexicon_backend::models::content_models::{ContentItem, ContentPayload, ValidationState};
use lexicon_backend::models::contribution_models::ContributionEntry;
use lexicon_backend::models::db_operations::SqliteStore;
use lexicon_backend::models::moderation_models::ModeratorAction;
use lexicon_backend::models::report_models::Report;
use lexicon_backend::models::{ActorContext, Role};
use tempfile::TempDir;

pub type TestEngine = ModerationEngine<SqliteStore>;

/// An engine over a fresh database in a temporary directory.
pub struct Harness {
    _dir: TempDir,
    pub engine: Arc<TestEngine>,
    pub events: Arc<MemoryPublisher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(ModerationPolicy::default())
    }

    pub fn with_policy(policy: ModerationPolicy) -> Self {
        let events = Arc::new(MemoryPublisher::new());
        let (dir, engine) = open_engine(events.clone(), policy);
        Self { _dir: dir, engine: Arc::new(engine), events }
    }

    pub fn user(&self, username: &str, role: Role) -> ActorContext {
        let user = self.engine.store().create_user(username, role).expect("create user");
        ActorContext::new(user.id, role)
    }

    pub fn submit_word(&self, author: ActorContext, headword: &str) -> ContentItem {
        let outcome = self
            .engine
            .handle(Intent::SubmitContent { payload: word(headword) }, author)
            .expect("submit word");
        content(outcome)
    }

    pub fn move_to(&self, actor: ActorContext, item: &ContentItem, to: ValidationState) -> ContentItem {
        let outcome = self
            .engine
            .handle(
                Intent::ValidateContent { content: item.content_ref(), to_state: to, comment: None, expected_version: None },
                actor,
            )
            .expect("validation transition");
        content(outcome)
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.names()
    }
}

pub fn open_engine(publisher: Arc<dyn EventPublisher>, policy: ModerationPolicy) -> (TempDir, TestEngine) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = SqliteStore::open(dir.path().join("moderation.db")).expect("open store");
    store.initialize().expect("create schema");
    (dir, ModerationEngine::new(store, publisher, policy))
}

pub fn word(headword: &str) -> ContentPayload {
    ContentPayload::Word {
        headword: headword.to_string(),
        definition: format!("meaning of {}", headword),
        translations: vec![],
    }
}

pub fn content(outcome: Outcome) -> ContentItem {
    match outcome.projection {
        Projection::Content(item) => item,
        other => panic!("expected content, got {:?}", other),
    }
}

pub fn contribution(outcome: Outcome) -> ContributionEntry {
    match outcome.projection {
        Projection::Contribution(entry) => entry,
        other => panic!("expected contribution, got {:?}", other),
    }
}

pub fn action(outcome: Outcome) -> ModeratorAction {
    match outcome.projection {
        Projection::ModeratorAction(action) => action,
        other => panic!("expected moderator action, got {:?}", other),
    }
}

pub fn report(outcome: Outcome) -> Report {
    match outcome.projection {
        Projection::Report(report) => report,
        other => panic!("expected report, got {:?}", other),
    }
}

/// Publisher whose sink can be switched off to simulate a broker outage.
#[derive(Default)]
pub struct FlakyPublisher {
    failing: AtomicBool,
    delivered: Mutex<Vec<DomainEvent>>,
}

impl FlakyPublisher {
    pub fn failing() -> Self {
        Self { failing: AtomicBool::new(true), delivered: Mutex::new(Vec::new()) }
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<DomainEvent> {
        self.delivered.lock().unwrap().clone()
    }
}

impl EventPublisher for FlakyPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError("broker unreachable".to_string()));
        }
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}
