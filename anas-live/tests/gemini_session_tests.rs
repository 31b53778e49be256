//! Gemini Live transport against a loopback WebSocket server.
#![cfg(feature = "gemini")]

use anas_live::gemini::GeminiLiveTransport;
use anas_live::{
    AudioFormat, EncodedFrame, LiveConnection, LiveError, LiveTransport, ServerEvent, SessionSetup,
    VoiceProfile,
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

fn setup() -> SessionSetup {
    SessionSetup {
        model: "models/test-live".to_string(),
        voice: VoiceProfile::Male,
        system_instruction: "Answer briefly.".to_string(),
    }
}

/// Accept one connection, record every client message, and send `script`
/// once each of the listed client messages has arrived.
async fn serve(
    script: Vec<(usize, Vec<Value>)>,
    close_after: Option<usize>,
) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut received = 0;
        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else { continue };
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            let _ = seen_tx.send(value);
            received += 1;

            for (after, replies) in &script {
                if *after == received {
                    for reply in replies {
                        ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                    }
                }
            }
            if close_after == Some(received) {
                let _ = ws.close(None).await;
                break;
            }
        }
    });

    (format!("ws://{addr}"), seen_rx)
}

#[tokio::test]
async fn test_handshake_audio_and_close() {
    let (endpoint, mut seen) = serve(
        vec![
            (1, vec![json!({ "setupComplete": {} })]),
            (
                2,
                vec![json!({
                    "serverContent": {
                        "modelTurn": { "parts": [{ "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAABAA==" } }] },
                        "turnComplete": true
                    }
                })],
            ),
        ],
        Some(2),
    )
    .await;

    let transport = GeminiLiveTransport::new("test-key", "models/test-live").with_endpoint(endpoint);
    let connection = transport.connect(setup()).await.unwrap();
    assert!(connection.is_connected());

    let first = seen.recv().await.unwrap();
    assert_eq!(first["setup"]["model"], "models/test-live");
    assert_eq!(
        first["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
        "Fenrir"
    );
    assert_eq!(first["setup"]["systemInstruction"]["parts"][0]["text"], "Answer briefly.");

    let frame = EncodedFrame::encode(&[0.0, 0.5], AudioFormat::pcm16_16khz());
    connection.send_audio(&frame).await.unwrap();
    let chunk = seen.recv().await.unwrap();
    assert_eq!(chunk["realtimeInput"]["mediaChunks"][0]["mimeType"], "audio/pcm;rate=16000");
    assert_eq!(chunk["realtimeInput"]["mediaChunks"][0]["data"], "AAAAQA==");

    let audio = connection.next_event().await.unwrap().unwrap();
    assert_eq!(audio, ServerEvent::Audio { data: bytes::Bytes::from_static(&[0, 0, 1, 0]) });
    let done = connection.next_event().await.unwrap().unwrap();
    assert_eq!(done, ServerEvent::TurnComplete);

    assert!(connection.next_event().await.is_none());
    assert!(!connection.is_connected());
    assert!(matches!(connection.send_text("late").await, Err(LiveError::SendFailure(_))));
    connection.close().await.unwrap();
}

#[tokio::test]
async fn test_text_turn_is_sent_as_client_content() {
    let (endpoint, mut seen) = serve(vec![(1, vec![json!({ "setupComplete": {} })])], None).await;
    let transport = GeminiLiveTransport::new("test-key", "models/test-live").with_endpoint(endpoint);
    let connection = transport.connect(setup()).await.unwrap();
    let _setup = seen.recv().await.unwrap();

    connection.send_text("چۆنی؟").await.unwrap();
    let turn = seen.recv().await.unwrap();
    assert_eq!(turn["clientContent"]["turns"][0]["role"], "user");
    assert_eq!(turn["clientContent"]["turns"][0]["parts"][0]["text"], "چۆنی؟");
    assert_eq!(turn["clientContent"]["turnComplete"], true);

    connection.close().await.unwrap();
    assert!(!connection.is_connected());
}

#[tokio::test]
async fn test_missing_setup_acknowledgement_times_out() {
    let (endpoint, _seen) = serve(Vec::new(), None).await;
    let transport = GeminiLiveTransport::new("test-key", "models/test-live")
        .with_endpoint(endpoint)
        .with_handshake_timeout(Duration::from_millis(100));

    let result = transport.connect(setup()).await;
    assert!(matches!(result, Err(LiveError::Transport(_))));
}

#[tokio::test]
async fn test_close_during_handshake_fails_connect() {
    let (endpoint, _seen) = serve(Vec::new(), Some(1)).await;
    let transport = GeminiLiveTransport::new("test-key", "models/test-live").with_endpoint(endpoint);

    let result = transport.connect(setup()).await;
    assert!(matches!(result, Err(LiveError::Transport(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport =
        GeminiLiveTransport::new("test-key", "models/test-live").with_endpoint(format!("ws://{addr}"));
    let result = transport.connect(setup()).await;
    assert!(matches!(result, Err(LiveError::Transport(_))));
}
