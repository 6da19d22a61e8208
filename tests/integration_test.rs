use scrumpoker::mirror::SessionMirror;
use scrumpoker::protocol::{ClientMessage, ServerMessage, SessionView};
use scrumpoker::registry::Connection;
use scrumpoker::state::{AppState, DisconnectOutcome};
use scrumpoker::ws::handlers::handle_message;
use std::sync::Arc;
use tokio::sync::mpsc;

struct Client {
    conn: Arc<Connection>,
    rx: mpsc::Receiver<Arc<String>>,
}

impl Client {
    async fn connect(state: &Arc<AppState>, session_id: &str) -> Self {
        let (conn, rx) = Connection::new(session_id.to_string(), 64);
        state.registry.register(conn.clone()).await;
        Self { conn, rx }
    }

    async fn send(&self, state: &Arc<AppState>, msg: ClientMessage) -> Option<ServerMessage> {
        handle_message(msg, &self.conn, state).await
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(json) = self.rx.try_recv() {
            out.push(serde_json::from_str(&json).expect("server sent invalid JSON"));
        }
        out
    }

    fn last_state(&mut self) -> SessionView {
        self.drain()
            .into_iter()
            .rev()
            .find_map(|m| match m {
                ServerMessage::State { state } => Some(state),
                _ => None,
            })
            .expect("Expected a state message")
    }
}

fn join(name: &str) -> ClientMessage {
    ClientMessage::Join {
        name: Some(name.to_string()),
    }
}

fn vote(name: &str, value: &str) -> ClientMessage {
    ClientMessage::Vote {
        name: Some(name.to_string()),
        value: Some(value.to_string()),
    }
}

/// End-to-end flow of one estimation round with two participants
#[tokio::test]
async fn test_full_round_flow() {
    let state = Arc::new(AppState::in_memory());
    let session = state.create_session().await.unwrap();

    // 1. Both participants connect and join
    let mut alice = Client::connect(&state, &session.id).await;
    let mut bob = Client::connect(&state, &session.id).await;
    assert!(alice.send(&state, join("Alice")).await.is_none());
    assert!(bob.send(&state, join("Bob")).await.is_none());

    let view = alice.last_state();
    assert_eq!(view.users.len(), 2);
    assert!(view.votes.is_empty());
    assert!(!view.votes_revealed);

    // 2. Voting; every snapshot goes to everyone
    alice.send(&state, vote("Alice", "8")).await;
    bob.send(&state, vote("Bob", "3")).await;
    let view = bob.last_state();
    assert_eq!(view.votes["Alice"], "8");
    assert_eq!(view.votes["Bob"], "3");
    assert!(!view.votes_revealed);

    // 3. Reveal; display order follows the votes
    bob.send(&state, ClientMessage::Reveal).await;
    let view = alice.last_state();
    assert!(view.votes_revealed);
    let order: Vec<&str> = view
        .sorted_participants()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(order, vec!["Bob", "Alice"]);
    assert_eq!(view.consensus(), None);
    assert_eq!(bob.last_state(), view);

    // 4. Next round
    alice.send(&state, ClientMessage::ClearVotes).await;
    let view = bob.last_state();
    assert!(view.votes.is_empty());
    assert!(!view.votes_revealed);
    assert_eq!(view.users.len(), 2);
    assert_eq!(alice.last_state(), view);
}

#[tokio::test]
async fn test_hide_votes_keeps_votes() {
    let state = Arc::new(AppState::in_memory());
    let session = state.create_session().await.unwrap();
    let mut alice = Client::connect(&state, &session.id).await;

    alice.send(&state, join("Alice")).await;
    alice.send(&state, vote("Alice", "5")).await;
    alice.send(&state, ClientMessage::Reveal).await;
    alice.send(&state, ClientMessage::HideVotes).await;

    let view = alice.last_state();
    assert!(!view.votes_revealed);
    assert_eq!(view.votes["Alice"], "5");
}

#[tokio::test]
async fn test_remove_user_reaches_removed_client_first() {
    let state = Arc::new(AppState::in_memory());
    let session = state.create_session().await.unwrap();
    let mut alice = Client::connect(&state, &session.id).await;
    let mut bob = Client::connect(&state, &session.id).await;
    alice.send(&state, join("Alice")).await;
    bob.send(&state, join("Bob")).await;
    bob.send(&state, vote("Bob", "13")).await;
    alice.drain();
    bob.drain();

    let bob_mirror = SessionMirror::new(Some("Bob".to_string()));
    let reply = alice
        .send(
            &state,
            ClientMessage::RemoveUser {
                name: Some("Bob".to_string()),
            },
        )
        .await;
    assert!(reply.is_none());

    let msgs = bob.drain();
    assert_eq!(msgs.len(), 2);
    assert!(matches!(&msgs[0], ServerMessage::UserRemoved { name } if name == "Bob"));
    for msg in msgs {
        bob_mirror.apply(msg);
    }
    let mirrored = bob_mirror.snapshot();
    assert!(mirrored.removed);
    assert!(!mirrored.view.users.contains_key("Bob"));
    assert!(!mirrored.view.votes.contains_key("Bob"));

    let view = alice.last_state();
    assert_eq!(view.users.keys().collect::<Vec<_>>(), vec!["Alice"]);
}

#[tokio::test]
async fn test_disconnects_reclaim_session() {
    let state = Arc::new(AppState::in_memory());
    let session = state.create_session().await.unwrap();
    let mut alice = Client::connect(&state, &session.id).await;
    let bob = Client::connect(&state, &session.id).await;
    alice.send(&state, join("Alice")).await;
    bob.send(&state, join("Bob")).await;
    bob.send(&state, vote("Bob", "5")).await;
    alice.drain();

    // Bob's socket closes: his seat and vote go away
    assert_eq!(
        state.handle_disconnect(&bob.conn.id).await,
        DisconnectOutcome::Kept
    );
    let view = alice.last_state();
    assert!(!view.users.contains_key("Bob"));
    assert!(view.votes.is_empty());

    // The last one out deletes the session
    assert_eq!(
        state.handle_disconnect(&alice.conn.id).await,
        DisconnectOutcome::Reclaimed
    );
    assert!(!state.session_exists(&session.id).await.unwrap());

    // Anyone still talking to it is told the session is gone
    let late = Client::connect(&state, &session.id).await;
    assert_eq!(
        late.send(&state, ClientMessage::GetState).await,
        Some(ServerMessage::no_session())
    );
}

#[tokio::test]
async fn test_concurrent_joins_with_same_name() {
    let state = Arc::new(AppState::in_memory());
    let session = state.create_session().await.unwrap();

    let mut clients = Vec::new();
    for _ in 0..8 {
        clients.push(Client::connect(&state, &session.id).await);
    }

    let mut tasks = Vec::new();
    for client in &clients {
        let state = state.clone();
        let conn = client.conn.clone();
        tasks.push(tokio::spawn(async move {
            handle_message(join("Alice"), &conn, &state).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_none());
    }

    let view = state.session_view(&session.id).await.unwrap();
    assert_eq!(view.users.len(), 1);
    assert!(view.users["Alice"].online);

    // Every client converged on the same final snapshot
    for client in &mut clients {
        assert_eq!(client.last_state(), view);
    }
}

#[tokio::test]
async fn test_concurrent_votes_all_recorded() {
    let state = Arc::new(AppState::in_memory());
    let session = state.create_session().await.unwrap();
    let mut observer = Client::connect(&state, &session.id).await;

    let names: Vec<String> = (0..10).map(|i| format!("P{}", i)).collect();
    let mut clients = Vec::new();
    for name in &names {
        let client = Client::connect(&state, &session.id).await;
        client.send(&state, join(name)).await;
        clients.push(client);
    }

    let mut tasks = Vec::new();
    for (client, name) in clients.iter().zip(&names) {
        let state = state.clone();
        let conn = client.conn.clone();
        let msg = vote(name, "5");
        tasks.push(tokio::spawn(
            async move { handle_message(msg, &conn, &state).await },
        ));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let view = observer.last_state();
    assert_eq!(view.votes.len(), 10);
    assert!(view.votes.values().all(|v| v == "5"));
}

#[tokio::test]
async fn test_viewer_gets_state_without_joining() {
    let state = Arc::new(AppState::in_memory());
    let session = state.create_session().await.unwrap();
    let mut viewer = Client::connect(&state, &session.id).await;
    let alice = Client::connect(&state, &session.id).await;

    viewer.send(&state, ClientMessage::GetState).await;
    assert_eq!(viewer.last_state(), SessionView::default());

    alice.send(&state, join("Alice")).await;
    assert!(viewer.last_state().users.contains_key("Alice"));
}

#[tokio::test]
async fn test_malformed_events_leave_session_untouched() {
    let state = Arc::new(AppState::in_memory());
    let session = state.create_session().await.unwrap();
    let mut client = Client::connect(&state, &session.id).await;

    for raw in [
        r#"{"type":"join"}"#,
        r#"{"type":"vote","value":"5"}"#,
        r#"{"type":"remove_user","name":""}"#,
    ] {
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(client.send(&state, msg).await.is_none());
    }
    assert!(client.drain().is_empty());

    // Frames that are not envelopes at all never reach the processor
    assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shuffle"}"#).is_err());

    assert_eq!(
        state.session_view(&session.id).await.unwrap(),
        SessionView::default()
    );
}
