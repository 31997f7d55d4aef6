use std::sync::{Arc, Mutex};

use super::*;

type Captured = Arc<Mutex<Vec<(Vec<FollowUpAnswer>, bool)>>>;

fn flow(questions: &[&str], ready: bool) -> (FollowUpFlow, Captured) {
    let captured: Captured = Arc::default();
    let sink = captured.clone();
    let batch = FollowUpQuestions { questions: questions.iter().map(|q| (*q).to_owned()).collect(), ready };
    let flow = FollowUpFlow::new(batch, move |answers, ready| sink.lock().unwrap().push((answers, ready)));
    (flow, captured)
}

#[test]
fn walks_questions_in_order_and_completes_once() {
    let (mut flow, captured) = flow(&["Is the fan running?", "Any ice on the coil?"], true);
    assert_eq!(flow.current(), Some("Is the fan running?"));

    flow.answer("yes").unwrap();
    assert_eq!(flow.current(), Some("Any ice on the coil?"));
    assert!(captured.lock().unwrap().is_empty());

    flow.answer("  a thick layer ").unwrap();
    assert!(flow.is_complete());
    assert!(flow.current().is_none());

    let calls = captured.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (answers, ready) = &calls[0];
    assert!(*ready);
    assert_eq!(answers[1], FollowUpAnswer { question: "Any ice on the coil?".into(), answer: "a thick layer".into() });
}

#[test]
fn blank_answer_is_rejected_without_advancing() {
    let (mut flow, _) = flow(&["When did it start?"], false);
    assert_eq!(flow.answer("   "), Err(FollowUpError::EmptyAnswer));
    assert_eq!(flow.index(), 0);
    assert!(flow.answers().is_empty());
}

#[test]
fn skip_records_empty_answer_and_advances() {
    let (mut flow, captured) = flow(&["Model number?", "Error code on display?"], false);
    flow.skip().unwrap();
    assert_eq!(flow.answers()[0].answer, "");
    assert_eq!(flow.index(), 1);
    flow.answer("E4").unwrap();

    let calls = captured.lock().unwrap();
    let (answers, ready) = &calls[0];
    assert!(!*ready);
    assert_eq!(answers.len(), 2);
}

#[test]
fn index_is_monotonic_and_bounded() {
    let (mut flow, captured) = flow(&["a?", "b?", "c?"], false);
    let mut last = flow.index();
    for step in 0..10 {
        let outcome = if step % 2 == 0 { flow.skip() } else { flow.answer("ok") };
        assert!(flow.index() >= last);
        assert!(flow.index() <= flow.len());
        if step >= 3 {
            assert_eq!(outcome, Err(FollowUpError::Finished));
        }
        last = flow.index();
    }
    assert_eq!(flow.index(), 3);
    assert_eq!(captured.lock().unwrap().len(), 1);
}

#[test]
fn empty_batch_completes_immediately() {
    let (flow, captured) = flow(&["", "   "], true);
    assert!(flow.is_empty());
    assert!(flow.is_complete());
    let calls = captured.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].0.is_empty());
    assert!(calls[0].1);
}

#[test]
fn answers_fold_into_description() {
    let answers = vec![
        FollowUpAnswer { question: "Fan running?".into(), answer: "no".into() },
        FollowUpAnswer { question: "Error code?".into(), answer: String::new() },
    ];
    assert_eq!(
        with_answers(" cooler warm ", &answers),
        "cooler warm\n\nQ: Fan running?\nA: no"
    );
}

// =============================================================================
// rounds against a server
// =============================================================================

mod rounds {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use uuid::Uuid;

    use super::super::*;
    use crate::net::{ChatApi, ClientError, HttpClient, test_server};

    type Seen = Arc<Mutex<Vec<Value>>>;

    #[derive(Debug)]
    enum Failed {
        Client(ClientError),
        FollowUp(FollowUpError),
    }

    impl From<ClientError> for Failed {
        fn from(e: ClientError) -> Self {
            Self::Client(e)
        }
    }

    impl From<FollowUpError> for Failed {
        fn from(e: FollowUpError) -> Self {
            Self::FollowUp(e)
        }
    }

    /// First round asks two questions; once answers arrive the server asks
    /// one more and reports it is ready.
    async fn two_rounds(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
        let answered = body["answers"].as_array().map_or(0, Vec::len);
        seen.lock().unwrap().push(body);
        if answered == 0 {
            Json(json!({ "questions": ["Is the fan running?", "Any ice on the coil?"], "ready": false }))
        } else {
            Json(json!({ "questions": ["Is the door gasket torn?"], "ready": true }))
        }
    }

    async fn never_ready(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
        let n = seen.lock().unwrap().len();
        seen.lock().unwrap().push(body);
        Json(json!({ "questions": [format!("Question {n}?")], "ready": false }))
    }

    async fn nothing_to_ask(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
        seen.lock().unwrap().push(body);
        Json(json!({ "questions": [], "ready": false }))
    }

    async fn chat_with(handler: axum::routing::MethodRouter<Seen>) -> (ChatApi, Seen) {
        let seen = Seen::default();
        let router = Router::new()
            .route("/api/chat/sessions/{id}/followup-questions", handler)
            .with_state(seen.clone());
        let base = test_server::spawn(router).await;
        (ChatApi::new(HttpClient::new(&base).unwrap()), seen)
    }

    fn scripted(replies: Vec<FollowUpReply>) -> impl FnMut(&FollowUpFlow) -> Result<FollowUpReply, Failed> {
        let mut replies = VecDeque::from(replies);
        move |flow| {
            assert!(flow.current().is_some());
            Ok(replies.pop_front().unwrap_or(FollowUpReply::Stop))
        }
    }

    #[tokio::test]
    async fn second_round_carries_answers_and_ready_ends_it() {
        let (chat, seen) = chat_with(post(two_rounds)).await;
        let replies = vec![
            FollowUpReply::Answer("yes".into()),
            FollowUpReply::Skip,
            FollowUpReply::Answer("no".into()),
        ];

        let gathered = gather_answers(&chat, Uuid::new_v4(), "walk-in is warm", MAX_FOLLOWUP_ROUNDS, scripted(replies))
            .await
            .unwrap();

        assert_eq!(gathered.rounds, 2);
        assert!(gathered.ready);
        let asked: Vec<&str> = gathered.answers.iter().map(|a| a.question.as_str()).collect();
        assert_eq!(asked, ["Is the fan running?", "Any ice on the coil?", "Is the door gasket torn?"]);
        assert_eq!(gathered.answers[1].answer, "");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].get("answers").is_none());
        let sent = seen[1]["answers"].as_array().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["question"], "Is the fan running?");
        assert_eq!(sent[0]["answer"], "yes");
        assert_eq!(seen[1]["description"], "walk-in is warm");
    }

    #[tokio::test]
    async fn rounds_stop_at_the_cap() {
        let (chat, seen) = chat_with(post(never_ready)).await;
        let replies = vec![FollowUpReply::Answer("a".into()), FollowUpReply::Answer("b".into())];

        let gathered = gather_answers(&chat, Uuid::new_v4(), "fryer won't heat", 2, scripted(replies))
            .await
            .unwrap();

        assert_eq!(gathered.rounds, 2);
        assert!(!gathered.ready);
        assert_eq!(gathered.answers.len(), 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stopping_keeps_partial_answers_and_asks_no_more() {
        let (chat, seen) = chat_with(post(two_rounds)).await;
        let replies = vec![FollowUpReply::Answer("yes".into()), FollowUpReply::Stop];

        let gathered = gather_answers(&chat, Uuid::new_v4(), "walk-in is warm", MAX_FOLLOWUP_ROUNDS, scripted(replies))
            .await
            .unwrap();

        assert_eq!(gathered.rounds, 1);
        assert!(!gathered.ready);
        assert_eq!(gathered.answers.len(), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn an_empty_batch_ends_the_rounds() {
        let (chat, seen) = chat_with(post(nothing_to_ask)).await;
        let ask = scripted(Vec::new());
        let gathered = gather_answers(&chat, Uuid::new_v4(), "walk-in is warm", MAX_FOLLOWUP_ROUNDS, ask)
            .await
            .unwrap();
        assert_eq!(gathered.rounds, 1);
        assert!(gathered.answers.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn request_errors_and_blank_answers_surface() {
        let (chat, _) = chat_with(post(two_rounds)).await;
        let ask = scripted(vec![FollowUpReply::Answer(" ".into())]);
        let err = gather_answers(&chat, Uuid::new_v4(), "walk-in is warm", 1, ask).await.unwrap_err();
        assert!(matches!(err, Failed::FollowUp(FollowUpError::EmptyAnswer)));

        let missing = ChatApi::new(HttpClient::new(&test_server::spawn(Router::new()).await).unwrap());
        let err = gather_answers(&missing, Uuid::new_v4(), "walk-in is warm", 1, scripted(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Failed::Client(ref e) if e.status() == Some(404)), "{err:?}");
    }
}
