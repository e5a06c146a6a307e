//! Post-session analysis over an in-memory session store

use ai_lib_layers::session::analysis::{SessionAnalyzer, ANALYSIS_AUTHOR, POST_ANALYSIS_KEY};
use ai_lib_layers::session::{InMemorySessionService, SessionEvent, SessionState};
use ai_lib_layers::types::message::Author;
use ai_lib_layers::Turn;
use serde_json::json;

fn analyzer() -> SessionAnalyzer {
    SessionAnalyzer::new(["WeatherAgent", "StockAgent"])
}

#[tokio::test]
async fn test_run_analyzes_each_session_once() {
    let service = InMemorySessionService::new();

    let busy = service.create_session("app", "alice", Some("a-busy")).unwrap();
    busy.append_event(
        SessionEvent::new(Author::User, "inv-1")
            .with_content(Turn::user("price of GOOGL?"))
            .with_timestamp(1000.0),
    )
    .unwrap();
    busy.append_event(
        SessionEvent::new(Author::Agent("StockAgent".into()), "inv-1")
            .with_content(Turn::from_agent("StockAgent", "175.50 USD"))
            .with_timestamp(1001.5),
    )
    .unwrap();
    busy.append_event(
        SessionEvent::new(Author::User, "inv-2")
            .with_content(Turn::user("thanks"))
            .with_timestamp(1012.25),
    )
    .unwrap();

    service.create_session("app", "alice", Some("b-empty")).unwrap();

    let done = service.create_session("app", "alice", Some("c-done")).unwrap();
    done.set(POST_ANALYSIS_KEY, json!({"turn_count": 9})).await.unwrap();

    service.create_session("app", "bob", Some("other-user")).unwrap();

    let summary = analyzer().run(&service, "app", "alice").await.unwrap();
    assert_eq!((summary.analyzed, summary.skipped), (1, 2));

    let recorded = busy.get(POST_ANALYSIS_KEY).await.unwrap().unwrap();
    assert_eq!(recorded["turn_count"], json!(2));
    assert_eq!(recorded["duration_seconds"], json!(12.25));
    assert_eq!(recorded["used_specialists"], json!(["StockAgent"]));

    let last = busy.events().unwrap().pop().unwrap();
    assert_eq!(last.author, Author::Agent(ANALYSIS_AUTHOR.to_string()));

    let untouched = done.get(POST_ANALYSIS_KEY).await.unwrap().unwrap();
    assert_eq!(untouched["turn_count"], json!(9));

    let rerun = analyzer().run(&service, "app", "alice").await.unwrap();
    assert_eq!((rerun.analyzed, rerun.skipped), (0, 3));
}
