//! End-to-end session lifecycle over mock backends: single-flight
//! submission, history/stat side effects, favorite round trips and the
//! AI follow-up chain.

use std::sync::Arc;
use std::time::Duration;

use quizlens_core::backend::mock::{db_match, ok_ai, ok_search, MockAiBackend, MockSearchBackend};
use quizlens_core::{
    AiFollowupController, AskError, AskOutcome, PersistentStore, SearchSession, StatsAggregator,
    SubmitOutcome, HISTORY_CAP,
};

fn two_mb_jpeg() -> Vec<u8> {
    vec![0xD8; 2 * 1024 * 1024]
}

#[tokio::test]
async fn example_scenario_empty_results_still_count() {
    // Select a 2 MB JPEG, submit with a college filter, backend returns
    // zero matches: one history entry with result_count 0 and the search
    // counter bumped by 1.
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentStore::new(dir.path());
    let backend = Arc::new(MockSearchBackend::always(Ok(ok_search("求极限", vec![]))));
    let session = SearchSession::new(backend.clone(), store.clone());

    session
        .select_file(two_mb_jpeg(), "题目.jpg", "image/jpeg")
        .unwrap();
    session.set_college("计算机学院");

    let outcome = session.submit().await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Completed(_)));

    let history = store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result_count, 0);
    assert_eq!(history[0].college, "计算机学院");
    assert_eq!(store.stats().search_count(), 1);
}

#[tokio::test]
async fn duplicate_submit_issues_one_backend_call() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentStore::new(dir.path());
    let backend = Arc::new(
        MockSearchBackend::always(Ok(ok_search("text", vec![])))
            .with_delay(Duration::from_millis(50)),
    );
    let session = Arc::new(SearchSession::new(backend.clone(), store));
    session
        .select_file(vec![0xFF; 64], "q.png", "image/png")
        .unwrap();

    let first = session.clone();
    let second = session.clone();
    let (a, b) = tokio::join!(first.submit(), second.submit());
    let outcomes = [a.unwrap(), b.unwrap()];

    assert!(outcomes
        .iter()
        .any(|o| matches!(o, SubmitOutcome::AlreadyInFlight)));
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, SubmitOutcome::Completed(_))));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn repeated_searches_respect_the_history_cap() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentStore::new(dir.path());
    let backend = Arc::new(MockSearchBackend::always(Ok(ok_search("text", vec![]))));
    let session = SearchSession::new(backend, store.clone());
    session
        .select_file(vec![0xFF; 64], "q.png", "image/png")
        .unwrap();

    for _ in 0..HISTORY_CAP + 3 {
        session.submit().await.unwrap();
    }

    let history = store.history();
    assert_eq!(history.len(), HISTORY_CAP);
    // Newest first, strictly monotonic ids.
    for pair in history.windows(2) {
        assert!(pair[0].id > pair[1].id);
    }
    // Every search counted, including the evicted ones.
    assert_eq!(store.stats().search_count(), (HISTORY_CAP + 3) as u64);
}

#[tokio::test]
async fn favorite_toggle_round_trip_via_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentStore::new(dir.path());
    let result = db_match("hust_042", "积分为 1/3");
    let backend = Arc::new(MockSearchBackend::always(Ok(ok_search(
        "text",
        vec![result.clone()],
    ))));
    let session = SearchSession::new(backend, store.clone());

    assert!(session.toggle_favorite(&result).unwrap());
    assert_eq!(store.favorites().len(), 1);
    assert_eq!(store.favorites()[0].answer_snapshot, "积分为 1/3");

    assert!(!session.toggle_favorite(&result).unwrap());
    assert!(store.favorites().is_empty());
}

#[tokio::test]
async fn followup_chain_after_search() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentStore::new(dir.path());
    let search = Arc::new(MockSearchBackend::always(Ok(ok_search(
        "证明 lim(x→0) sinx/x = 1",
        vec![],
    ))));
    let session = Arc::new(SearchSession::new(search, store));
    let ai = Arc::new(MockAiBackend::always(Ok(ok_ai(
        "## 证明\n\n利用夹逼定理，$\\frac{\\sin x}{x} \\to 1$",
    ))));
    let controller = AiFollowupController::new(ai.clone(), session.clone());

    // Before any search: NoContext, no network.
    assert!(matches!(
        controller.ask().await.unwrap_err(),
        AskError::NoContext
    ));
    assert_eq!(ai.call_count(), 0);

    session
        .select_file(vec![0xFF; 64], "q.jpg", "image/jpeg")
        .unwrap();
    session.submit().await.unwrap();

    let AskOutcome::Delivered(delivered) = controller.ask().await.unwrap() else {
        panic!("expected delivery");
    };
    assert_eq!(ai.requests()[0].text, "证明 lim(x→0) sinx/x = 1");
    assert!(delivered.rendered.contains("<h2>"));
    assert!(delivered.rendered.contains("math math-inline"));
    assert!(!delivered.rendered.contains("<script"));
}

#[tokio::test]
async fn stats_panel_view_tracks_all_three_collections() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentStore::new(dir.path());
    let result = db_match("hust_007", "答案");
    let backend = Arc::new(MockSearchBackend::always(Ok(ok_search(
        "text",
        vec![result.clone()],
    ))));
    let session = SearchSession::new(backend, store.clone());
    let aggregator = StatsAggregator::new(store.clone());

    session
        .select_file(vec![0xFF; 64], "q.png", "image/png")
        .unwrap();
    session.submit().await.unwrap();
    session.submit().await.unwrap();
    session.toggle_favorite(&result).unwrap();

    let snap = aggregator.snapshot();
    assert_eq!(snap.search_count, 2);
    assert_eq!(snap.history_count, 2);
    assert_eq!(snap.favorite_count, 1);
}
