mod common;

use common::{Sandbox, TestRepo};
use save_commit_core::ai::api::{ChatCompletionsClient, GenerationRequest, TextGenerator};
use save_commit_core::ai::composer::{Composer, MessageOrigin, MessageStyle};
use save_commit_core::ai::intelligence::analyze;
use save_commit_core::config::GenerationConfig;
use save_commit_core::credentials::ApiKey;
use save_commit_core::{GenerationError, SaveEvent, SaveOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// minimal http server answering every request with `status` and `body`
async fn stub_backend(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);

            // read headers, then as much body as content-length announces
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break None;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break Some(pos + 4);
                }
            };
            if let Some(header_end) = header_end {
                let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while request.len() < header_end + content_length {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}/v1/chat/completions"), hits)
}

/// accepts connections and never answers
async fn silent_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}/v1/chat/completions")
}

fn request() -> GenerationRequest {
    GenerationRequest {
        model: "test/model".to_string(),
        system: "system".to_string(),
        user: "user".to_string(),
        temperature: 0.2,
        max_tokens: 50,
    }
}

#[tokio::test]
async fn client_reads_chat_completion_replies() {
    let (endpoint, hits) = stub_backend(
        "200 OK",
        r#"{"choices":[{"message":{"role":"assistant","content":"fix(auth): handle expired sessions"}}]}"#,
    )
    .await;
    let client = ChatCompletionsClient::new(endpoint, ApiKey::new("sk-test").unwrap(), 5).unwrap();

    let text = client.generate(&request()).await.unwrap();
    assert_eq!(text, "fix(auth): handle expired sessions");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_reports_server_errors() {
    let (endpoint, _) = stub_backend("500 Internal Server Error", r#"{"error":{"message":"upstream down"}}"#).await;
    let client = ChatCompletionsClient::new(endpoint, ApiKey::new("sk-test").unwrap(), 5).unwrap();

    let err = client.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Status { status: 500, ref message } if message == "upstream down"));
}

#[tokio::test]
async fn composer_falls_back_when_backend_fails() {
    let (endpoint, hits) = stub_backend("500 Internal Server Error", "{}").await;
    let client = ChatCompletionsClient::new(endpoint, ApiKey::new("sk-test").unwrap(), 5).unwrap();
    let composer = Composer::new(GenerationConfig::default()).with_generator(Arc::new(client));
    let style = MessageStyle {
        use_emoji: false,
        conventional_commits: true,
        include_scope: true,
    };

    let diff = "diff --git a/src/auth/login.ts b/src/auth/login.ts\n+const a = 1;\n";
    let analysis = analyze(diff, "src/auth/login.ts");
    let first = composer.compose(&analysis, diff, "src/auth/login.ts", &style).await;
    let second = composer.compose(&analysis, diff, "src/auth/login.ts", &style).await;

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(first.origin, MessageOrigin::Template);
    assert!(!first.subject.is_empty());
    assert!(first.subject.contains("login.ts"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn save_still_commits_when_backend_fails() {
    let (endpoint, hits) = stub_backend("500 Internal Server Error", "{}").await;
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(&format!(
        "[generation]\nendpoint = \"{endpoint}\"\napi_key_env = \"SAVE_COMMIT_TEST_KEY_THAT_IS_NEVER_SET\"\ntimeout_secs = 5\n"
    ));
    sandbox.credentials().save(&ApiKey::new("sk-stored").unwrap()).unwrap();

    let file = repo.write("src/auth/login.ts", "export const attempts = 3;\n");
    let outcome = sandbox.handler(&repo).save_and_run(SaveEvent::new(&file)).await;

    match outcome {
        SaveOutcome::Committed { origin, hash, .. } => {
            assert_eq!(origin, MessageOrigin::Template);
            assert_eq!(repo.head(), hash);
        }
        other => panic!("expected a commit, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn save_uses_generated_message_when_backend_answers() {
    let (endpoint, _) = stub_backend(
        "200 OK",
        r#"{"choices":[{"message":{"content":"Add login attempt limit"}}]}"#,
    )
    .await;
    let repo = TestRepo::init();
    let sandbox = Sandbox::new(&format!(
        "[generation]\nendpoint = \"{endpoint}\"\napi_key_env = \"SAVE_COMMIT_TEST_KEY_THAT_IS_NEVER_SET\"\n"
    ));
    sandbox.credentials().save(&ApiKey::new("sk-stored").unwrap()).unwrap();

    let file = repo.write("src/auth/login.ts", "export const attempts = 3;\n");
    let outcome = sandbox.handler(&repo).save_and_run(SaveEvent::new(&file)).await;

    match outcome {
        SaveOutcome::Committed { origin, message, .. } => {
            assert_eq!(origin, MessageOrigin::Generated);
            assert_eq!(message, "chore(auth): add login attempt limit");
            assert_eq!(repo.last_subject(), message);
        }
        other => panic!("expected a commit, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_backend_times_out_and_falls_back() {
    let endpoint = silent_backend().await;
    let client = Arc::new(ChatCompletionsClient::new(endpoint, ApiKey::new("sk-test").unwrap(), 1).unwrap());

    let err = client.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Timeout(1)), "got {err:?}");

    let composer = Composer::new(GenerationConfig::default()).with_generator(client);
    let style = MessageStyle {
        use_emoji: false,
        conventional_commits: true,
        include_scope: true,
    };
    let diff = "diff --git a/src/auth/login.ts b/src/auth/login.ts\n+const a = 1;\n";
    let analysis = analyze(diff, "src/auth/login.ts");
    let message = composer.compose(&analysis, diff, "src/auth/login.ts", &style).await;

    assert_eq!(message.origin, MessageOrigin::Template);
    assert!(!message.subject.is_empty());
}
