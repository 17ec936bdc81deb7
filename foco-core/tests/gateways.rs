//! HTTP gateways against a local one-shot server.

use std::sync::Arc;

use foco_core::{
    AudioBuffer, AudioChunk, FocoError, Intent, Interpreter, InterpreterChain, LlmConfig,
    LlmInterpreter, PowerAction, StreamFormat, Transcriber, WhisperConfig, WhisperTranscriber,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Serve `body` with `status` to every connection; raw requests are forwarded
/// to the returned receiver.
async fn serve(status: u16, body: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let request = read_request(&mut socket).await;
            let _ = tx.send(request);
            let response = format!(
                "HTTP/1.1 {status} TEST\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}/v1/endpoint"), rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = socket.read(&mut tmp).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        if request_complete(&buf) {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request_complete(buf: &[u8]) -> bool {
    let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let body_len = buf.len() - header_end - 4;
    let content_length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    match content_length {
        Some(len) => body_len >= len,
        None if head.contains("transfer-encoding: chunked") => buf.ends_with(b"0\r\n\r\n"),
        None => true,
    }
}

fn chunk() -> AudioChunk {
    AudioChunk::new(0, vec![AudioBuffer::new(vec![0u8; 640])], StreamFormat::FALLBACK)
}

fn roster() -> Vec<String> {
    vec!["10.0.0.11".into(), "10.0.0.12".into(), "10.0.0.13".into()]
}

#[tokio::test]
async fn whisper_uploads_wav_and_returns_trimmed_text() {
    let (url, mut requests) = serve(200, r#"{"text":"  enciende el foco dos  "}"#).await;
    let transcriber = WhisperTranscriber::new(WhisperConfig {
        endpoint: url,
        ..WhisperConfig::new("test-key")
    })
    .unwrap();

    let text = transcriber.transcribe(&chunk()).await.unwrap();
    assert_eq!(text, "enciende el foco dos");

    let request = requests.recv().await.unwrap();
    assert!(request.starts_with("POST /v1/endpoint"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer test-key"));
    assert!(request.contains("whisper-1"));
    assert!(request.contains("audio.wav"));
    assert!(request.contains("RIFF"));
}

#[tokio::test]
async fn whisper_non_success_is_a_transcription_error() {
    let (url, _requests) = serve(500, r#"{"error":"overloaded"}"#).await;
    let transcriber = WhisperTranscriber::new(WhisperConfig {
        endpoint: url,
        ..WhisperConfig::new("test-key")
    })
    .unwrap();

    let err = transcriber.transcribe(&chunk()).await.unwrap_err();
    assert!(matches!(err, FocoError::Transcription(ref m) if m.contains("overloaded")));
}

#[tokio::test]
async fn llm_answer_becomes_a_command() {
    let (url, mut requests) = serve(
        200,
        r#"{"choices":[{"message":{"content":"{\"action\": \"power_off\", \"targets\": [1, 3]}"}}]}"#,
    )
    .await;
    let interpreter = LlmInterpreter::new(LlmConfig {
        endpoint: url,
        ..LlmConfig::new("test-key")
    })
    .unwrap();

    let intent = interpreter
        .interpret("apaga el primero y el tercero", &roster())
        .await
        .unwrap();
    let command = intent.command().unwrap();
    assert_eq!(command.action, PowerAction::PowerOff);
    assert_eq!(command.targets, vec!["10.0.0.11".to_string(), "10.0.0.13".to_string()]);

    let request = requests.recv().await.unwrap();
    assert!(request.contains("gpt-4o-mini"));
    assert!(request.contains("device 3"));
}

#[tokio::test]
async fn chain_falls_back_to_patterns_when_llm_fails() {
    let (url, _requests) = serve(503, r#"{"error":"unavailable"}"#).await;
    let llm = LlmInterpreter::new(LlmConfig {
        endpoint: url,
        ..LlmConfig::new("test-key")
    })
    .unwrap();
    let chain = InterpreterChain::with_pattern_fallback(Arc::new(llm)).unwrap();

    let intent = chain.interpret("apaga las luces", &roster()).await.unwrap();
    match intent {
        Intent::Command(cmd) => {
            assert_eq!(cmd.action, PowerAction::PowerOff);
            assert_eq!(cmd.targets.len(), 3);
        }
        Intent::NoIntent => panic!("pattern fallback should have matched"),
    }
}
