mod common;

use std::sync::Arc;

use common::{open_engine, word, FlakyPublisher};
use lexicon_backend::engine::policy::ModerationPolicy;
use lexicon_backend::engine::Intent;
use lexicon_backend::models::{ActorContext, Role};

#[test]
fn undelivered_events_are_redelivered_with_the_same_ids() {
    let publisher = Arc::new(FlakyPublisher::failing());
    let (_dir, engine) = open_engine(publisher.clone(), ModerationPolicy::default());
    let author = engine.store().create_user("amara", Role::Contributor).unwrap();
    let author = ActorContext::new(author.id, author.role);

    // The change commits even though nothing could be published.
    let outcome = engine.handle(Intent::SubmitContent { payload: word("sala kahle") }, author).unwrap();
    assert_eq!(outcome.events.len(), 2);
    assert!(publisher.delivered().is_empty());
    let item = common::content(outcome.clone());
    assert!(engine.content(item.content_ref()).is_ok());

    assert_eq!(engine.flush_outbox().unwrap(), 0);

    publisher.recover();
    assert_eq!(engine.flush_outbox().unwrap(), 2);
    let delivered: Vec<_> = publisher.delivered().iter().map(|e| e.event_id).collect();
    let committed: Vec<_> = outcome.events.iter().map(|e| e.event_id).collect();
    assert_eq!(delivered, committed);

    assert_eq!(engine.flush_outbox().unwrap(), 0);
    assert_eq!(publisher.delivered().len(), 2);
}

#[test]
fn maintenance_flushes_the_outbox() {
    let publisher = Arc::new(FlakyPublisher::failing());
    let (_dir, engine) = open_engine(publisher.clone(), ModerationPolicy::default());
    let author = engine.store().create_user("amara", Role::Contributor).unwrap();
    engine
        .handle(Intent::SubmitContent { payload: word("hamba kahle") }, ActorContext::new(author.id, author.role))
        .unwrap();

    publisher.recover();
    let report = engine.run_maintenance().unwrap();
    assert_eq!(report.sweep.expired, 0);
    assert_eq!(report.events_delivered, 2);
    let names: Vec<_> = publisher.delivered().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["contribution_recorded", "content_submitted"]);
}
