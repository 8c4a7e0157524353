use futures::StreamExt;
use json_parts_dataflow::{ChannelSource, ChatCompletionDecoder, ParserConfig, PartsStream};
use tokio::time::{sleep, Duration};

/// Replays a chat-completion response body, split into small network-sized
/// pieces, and prints the streamed text as it is decoded.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let body = r#"[{"candidates":[{"content":{"role":"model","parts":[{"text":"Streaming "}]},"index":0}]}
,{"candidates":[{"content":{"role":"model","parts":[{"text":"JSON is fün 😊"}]},"index":0}]}
,{"candidates":[{"content":{"role":"model","parts":[{"text":"."}]},"finishReason":"STOP","index":0}],"usageMetadata":{"promptTokenCount":5,"candidatesTokenCount":6,"totalTokenCount":11}}
]"#;

    let (tx, source) = ChannelSource::channel(8);
    tokio::spawn(async move {
        for piece in body.as_bytes().chunks(17) {
            if tx.send(Some(piece.to_vec())).await.is_err() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    });

    let config = ParserConfig {
        max_buffer_size: Some(64 * 1024),
        ..Default::default()
    };
    let mut chunks = PartsStream::with_config(source, ChatCompletionDecoder, &config);
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        for choice in &chunk.choices {
            if let Some(text) = &choice.delta.content {
                print!("{}", text);
            }
        }
        if let Some(usage) = chunk.usage {
            println!("\n[tokens: {} total]", usage.total_tokens);
        }
    }
    Ok(())
}
