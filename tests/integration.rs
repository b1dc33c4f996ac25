//! End-to-end tests driving the app through terminal keys and frames

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use padchat::app::{ChatModal, Screen, SessionSelection};
use padchat::camera::StillCamera;
use padchat::keyboard::LineEditor;
use padchat::pipeline::{PipelinePhase, Transport};
use padchat::{App, PadchatConfig, Sender};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ENDPOINT: &str = "http://chat.test/v1/chat/completions";
const MODELS_URL: &str = "http://chat.test/v1/models";

struct Post {
    url: String,
    body: String,
    /// sessions.json as it was when the request went out
    sessions_on_disk: String,
}

/// In-process endpoint serving a fixed model list and reply.
struct FakeServer {
    sessions_file: PathBuf,
    reply: String,
    posts: Mutex<Vec<Post>>,
    probes: AtomicUsize,
}

impl FakeServer {
    fn new(sessions_file: PathBuf, reply: &str) -> Self {
        Self {
            sessions_file,
            reply: reply.to_string(),
            posts: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        }
    }
}

impl Transport for FakeServer {
    fn post_json(&self, url: String, body: String, _api_key: String) -> impl Future<Output = String> + Send {
        let sessions_on_disk = std::fs::read_to_string(&self.sessions_file).unwrap_or_default();
        self.posts.lock().unwrap().push(Post {
            url,
            body,
            sessions_on_disk,
        });
        std::future::ready(self.reply.clone())
    }

    fn get(&self, url: String, _api_key: String) -> impl Future<Output = String> + Send {
        let body = if url == MODELS_URL {
            r#"{"data":[{"id":"alpha"},{"id":"beta"}]}"#.to_string()
        } else {
            format!("Error: unexpected GET {url}")
        };
        std::future::ready(body)
    }

    fn probe(&self, _url: String, _api_key: String) -> impl Future<Output = bool> + Send {
        self.probes.fetch_add(1, Ordering::SeqCst);
        std::future::ready(true)
    }
}

fn completion(content: &str) -> String {
    serde_json::json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
}

async fn start(data_dir: &Path, reply: &str) -> (App<FakeServer>, Arc<FakeServer>) {
    start_with_camera(data_dir, reply, None).await
}

async fn start_with_camera(
    data_dir: &Path,
    reply: &str,
    camera_dir: Option<PathBuf>,
) -> (App<FakeServer>, Arc<FakeServer>) {
    let config = PadchatConfig::new(data_dir.to_path_buf()).with_endpoint_override(ENDPOINT.to_string());
    let server = Arc::new(FakeServer::new(config.sessions_file(), reply));
    let mut app = App::new(
        config,
        Arc::clone(&server),
        Box::new(StillCamera::new(camera_dir)),
        Box::new(LineEditor::new()),
    )
    .await;
    app.resize(80, 24);
    step(&mut app, 5).await;
    (app, server)
}

/// Run frames, letting spawned network tasks finish in between.
async fn step(app: &mut App<FakeServer>, frames: usize) {
    for _ in 0..frames {
        tokio::task::yield_now().await;
        app.frame().await;
    }
}

async fn press(app: &mut App<FakeServer>, code: KeyCode) {
    app.feed_key(KeyEvent::new(code, KeyModifiers::NONE));
    step(app, 2).await;
}

fn is_bare_chat(app: &App<FakeServer>) -> bool {
    matches!(
        app.screen(),
        Screen::Chat {
            modal: ChatModal::None
        }
    )
}

fn type_text(app: &mut App<FakeServer>, text: &str) {
    for c in text.chars() {
        app.feed_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }
    app.feed_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
}

#[tokio::test]
async fn test_models_load_on_startup() {
    let temp_dir = TempDir::new().unwrap();
    let (app, _server) = start(temp_dir.path(), "").await;

    assert!(app.directory().is_loaded());
    assert_eq!(app.directory().models(), ["alpha", "beta"]);
    assert_eq!(app.directory().selected_model(), Some("alpha"));
}

#[tokio::test]
async fn test_message_is_saved_before_request_and_reply_split() {
    let temp_dir = TempDir::new().unwrap();
    let reply = completion("<think>pondering</think>Hello there");
    let (mut app, server) = start(temp_dir.path(), &reply).await;

    press(&mut app, KeyCode::Enter).await;
    assert!(matches!(
        app.screen(),
        Screen::Chat {
            modal: ChatModal::Keyboard
        }
    ));
    type_text(&mut app, "hi");
    step(&mut app, 40).await;

    let posts = server.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].url, ENDPOINT);
    assert!(posts[0].body.contains("\"model\":\"alpha\""));
    assert!(posts[0].sessions_on_disk.contains("\"hi\""));
    assert!(!posts[0].sessions_on_disk.contains("Hello there"));

    let messages = app.store().current();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, Sender::User);
    assert_eq!(messages[1].sender, Sender::Assistant);
    assert_eq!(messages[1].text, "Hello there");
    assert_eq!(messages[1].reasoning, "pondering");
    assert_eq!(app.pipeline_phase(), PipelinePhase::Idle);

    let saved = std::fs::read_to_string(temp_dir.path().join("sessions.json")).unwrap();
    assert!(saved.contains("Hello there"));
}

#[tokio::test]
async fn test_empty_message_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, server) = start(temp_dir.path(), &completion("unused")).await;

    press(&mut app, KeyCode::Enter).await;
    type_text(&mut app, "   ");
    step(&mut app, 40).await;

    assert!(server.posts.lock().unwrap().is_empty());
    assert!(app.store().current().is_empty());
}

#[tokio::test]
async fn test_photo_is_stored_and_sent() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, server) = start(temp_dir.path(), &completion("A test card")).await;

    // Camera sits right of the input pill
    press(&mut app, KeyCode::Right).await;
    press(&mut app, KeyCode::Enter).await;
    assert!(matches!(
        app.screen(),
        Screen::Chat {
            modal: ChatModal::Camera(_)
        }
    ));
    press(&mut app, KeyCode::Char('c')).await;
    assert!(app.has_staged_photo());
    press(&mut app, KeyCode::Esc).await;
    assert!(app.has_staged_photo());

    press(&mut app, KeyCode::Left).await;
    press(&mut app, KeyCode::Enter).await;
    type_text(&mut app, "what is this");
    step(&mut app, 40).await;

    assert!(!app.has_staged_photo());
    let posts = server.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].body.contains("data:image/png;base64,"));
    assert!(posts[0].sessions_on_disk.contains("image_path"));

    let stored: Vec<_> = std::fs::read_dir(temp_dir.path().join("images"))
        .unwrap()
        .collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(app.store().current()[1].text, "A test card");
}

#[tokio::test]
async fn test_delete_session_from_list() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("sessions.json"),
        r#"[[{"sender":"user","text":"first"}],[{"sender":"user","text":"second"},{"sender":"llm","text":"reply"}]]"#,
    )
    .unwrap();
    let (mut app, _server) = start(temp_dir.path(), "").await;
    assert_eq!(app.store().len(), 3);
    assert_eq!(app.store().current_index(), 2);

    // Input pill -> settings -> sessions
    press(&mut app, KeyCode::Left).await;
    press(&mut app, KeyCode::Left).await;
    press(&mut app, KeyCode::Enter).await;
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Char('x')).await;
    press(&mut app, KeyCode::Left).await;
    press(&mut app, KeyCode::Enter).await;

    assert_eq!(app.store().len(), 2);
    assert_eq!(app.store().current_index(), 1);
    assert_eq!(app.store().sessions()[0][0].text, "second");
    assert!(matches!(
        app.screen(),
        Screen::Sessions {
            selection: SessionSelection::Existing(0),
            confirm: None
        }
    ));

    let saved = std::fs::read_to_string(temp_dir.path().join("sessions.json")).unwrap();
    assert!(!saved.contains("first"));
    assert!(saved.contains("second"));
}

#[tokio::test]
async fn test_default_model_commit_probes_then_persists() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, server) = start(temp_dir.path(), "").await;

    press(&mut app, KeyCode::Left).await;
    press(&mut app, KeyCode::Enter).await;
    assert!(matches!(app.screen(), Screen::Settings { .. }));
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Enter).await;
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Enter).await;
    step(&mut app, 40).await;

    assert_eq!(server.probes.load(Ordering::SeqCst), 1);
    assert!(!app.connect_failed());
    assert_eq!(app.settings().default_model(), Some("beta"));
    assert_eq!(app.directory().selected_model(), Some("beta"));

    let saved = std::fs::read_to_string(temp_dir.path().join("settings.json")).unwrap();
    assert!(saved.contains("beta"));
}

#[tokio::test]
async fn test_ctrl_c_exits() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, _server) = start(temp_dir.path(), "").await;

    app.feed_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    step(&mut app, 1).await;
    assert!(app.should_exit());
}

#[tokio::test]
async fn test_shutdown_saves_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, _server) = start(temp_dir.path(), "").await;

    app.shutdown().await;
    let saved = std::fs::read_to_string(temp_dir.path().join("sessions.json")).unwrap();
    assert_eq!(saved.trim(), "[\n  []\n]");
}

#[tokio::test]
async fn test_failed_connect_blocks_chat() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, server) = start(temp_dir.path(), &completion("unused")).await;
    assert!(!app.directory().is_empty());

    // Clear the endpoint from the settings screen
    press(&mut app, KeyCode::Left).await;
    press(&mut app, KeyCode::Enter).await;
    press(&mut app, KeyCode::Enter).await;
    app.feed_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
    app.feed_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    step(&mut app, 60).await;

    assert_eq!(app.settings().endpoint, "");
    assert!(app.connect_failed());
    assert!(app.directory().is_empty());
    assert_eq!(app.directory().selected_model(), None);

    // Back to chat: the input pill no longer opens
    press(&mut app, KeyCode::Esc).await;
    press(&mut app, KeyCode::Right).await;
    press(&mut app, KeyCode::Enter).await;
    assert!(is_bare_chat(&app));
    type_text(&mut app, "hello");
    step(&mut app, 40).await;

    assert!(server.posts.lock().unwrap().is_empty());
    assert!(app.store().current().is_empty());
}

#[tokio::test]
async fn test_model_dropdown_cancel_keeps_selection() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, _server) = start(temp_dir.path(), "").await;

    press(&mut app, KeyCode::Up).await;
    press(&mut app, KeyCode::Enter).await;
    assert!(matches!(
        app.screen(),
        Screen::Chat {
            modal: ChatModal::ModelDropdown { hovered: 0 }
        }
    ));
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Esc).await;
    assert!(is_bare_chat(&app));
    assert_eq!(app.directory().selected_model(), Some("alpha"));

    press(&mut app, KeyCode::Enter).await;
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Enter).await;
    assert!(is_bare_chat(&app));
    assert_eq!(app.directory().selected_model(), Some("beta"));
}

#[tokio::test]
async fn test_camera_without_frames_stays_closed() {
    let temp_dir = TempDir::new().unwrap();
    let frames = TempDir::new().unwrap();
    let (mut app, _server) = start_with_camera(temp_dir.path(), "", Some(frames.path().to_path_buf())).await;

    press(&mut app, KeyCode::Right).await;
    press(&mut app, KeyCode::Enter).await;
    assert!(is_bare_chat(&app));
    assert!(!app.has_staged_photo());

    // Capture does nothing outside the camera
    press(&mut app, KeyCode::Char('c')).await;
    assert!(!app.has_staged_photo());
}

#[tokio::test]
async fn test_cancelled_entry_sends_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (mut app, server) = start(temp_dir.path(), &completion("unused")).await;

    press(&mut app, KeyCode::Enter).await;
    for c in "draft".chars() {
        app.feed_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }
    app.feed_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
    step(&mut app, 40).await;

    assert!(is_bare_chat(&app));
    assert!(server.posts.lock().unwrap().is_empty());
    assert!(app.store().current().is_empty());
    assert_eq!(app.pipeline_phase(), PipelinePhase::Idle);
}

#[tokio::test]
async fn test_switching_session_resets_view() {
    let temp_dir = TempDir::new().unwrap();
    let long: Vec<_> = (0..12)
        .map(|i| {
            let sender = if i % 2 == 0 { "user" } else { "llm" };
            serde_json::json!({"sender": sender, "text": format!("message {i}")})
        })
        .collect();
    let doc = serde_json::json!([long, [{"sender": "user", "text": "short"}]]);
    std::fs::write(temp_dir.path().join("sessions.json"), doc.to_string()).unwrap();
    let (mut app, _server) = start(temp_dir.path(), "").await;

    // Open the long session
    press(&mut app, KeyCode::Left).await;
    press(&mut app, KeyCode::Left).await;
    press(&mut app, KeyCode::Enter).await;
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Enter).await;
    assert_eq!(app.store().current_index(), 0);

    // Flick up to hover the newest message
    app.feed_key(KeyEvent::new(KeyCode::Char('k'), KeyModifiers::NONE));
    step(&mut app, 6).await;
    assert_eq!(app.view().hovered, Some(11));
    assert!(app.view().scroll_offset > 0);

    // Switch to the short session
    press(&mut app, KeyCode::Enter).await;
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Down).await;
    press(&mut app, KeyCode::Enter).await;

    assert!(is_bare_chat(&app));
    assert_eq!(app.store().current_index(), 1);
    assert_eq!(app.view().hovered, None);
    assert_eq!(app.view().scroll_offset, 0);
}
