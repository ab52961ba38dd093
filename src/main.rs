use std::future::Future;
use std::io::Write;

use anyhow::Context;
use clap::Parser;
use claude_messages::metrics::STREAM_METRICS;
use claude_messages::{Client, ClientConfig, ClientError, MessageStream, StreamChunk};
use futures::{Stream, StreamExt};
use tracing_subscriber::EnvFilter;

/// Send a prompt to the Messages API and stream the answer
#[derive(Debug, Parser)]
#[command(name = "claude-messages", version)]
struct Args {
    /// Prompt sent as the user message
    prompt: String,

    /// TOML config file; environment variables are used otherwise
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured model
    #[arg(short, long)]
    model: Option<String>,

    #[arg(long)]
    max_tokens: Option<u32>,

    #[arg(short, long)]
    system: Option<String>,

    /// Wait for the full response instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Print the final aggregate as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(model) = &args.model {
        config.defaults.model = model.clone();
    }
    if let Some(max_tokens) = args.max_tokens {
        config.defaults.max_tokens = max_tokens;
    }

    let client = Client::from_config(&config).context("failed to create client")?;

    let mut builder = client.request().user(&args.prompt);
    if let Some(system) = &args.system {
        builder = builder.system(system);
    }
    let request = builder.build()?;

    if args.no_stream {
        let message = client.create(&request).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&message)?);
        } else {
            println!("{}", message.text());
        }
        return Ok(());
    }

    let mut stream = client.stream(&request).await?;
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let end = print_stream(&mut stream, &mut std::io::stdout(), interrupt).await?;
    println!();

    match &end {
        StreamEnd::Drained => {}
        StreamEnd::Interrupted => eprintln!("[interrupted]"),
        StreamEnd::Failed(e) => eprintln!("[stream error] {}", e),
    }

    let response = stream.final_response();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        for call in &response.tool_calls {
            eprintln!("tool call {} {}: {}", call.id, call.name, call.raw_arguments);
        }
        let status = if response.completed {
            "complete"
        } else if response.failed {
            "failed"
        } else {
            "truncated"
        };
        eprintln!(
            "[{}] stop_reason={} input_tokens={} output_tokens={}",
            status,
            response.stop_reason.as_deref().unwrap_or("-"),
            response.usage.input_tokens,
            response.usage.output_tokens
        );
        if let Some(failure) = &response.failure {
            eprintln!("failure: {}", failure);
        }
    }
    tracing::info!("{}", STREAM_METRICS.snapshot());

    if let Some(failure) = response.failure {
        anyhow::bail!("stream failed: {}", failure);
    }
    Ok(())
}

/// How the printing loop ended
#[derive(Debug)]
enum StreamEnd {
    Drained,
    Interrupted,
    Failed(ClientError),
}

/// Write text deltas as they arrive until the stream ends, fails or `cancel` resolves
async fn print_stream<S, W, C>(
    stream: &mut MessageStream<S>,
    out: &mut W,
    cancel: C,
) -> std::io::Result<StreamEnd>
where
    S: Stream<Item = claude_messages::Result<StreamChunk>> + Unpin,
    W: Write,
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);

    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(Ok(chunk)) => {
                    if let Some(text) = chunk.as_text_delta() {
                        write!(out, "{}", text)?;
                        out.flush()?;
                    }
                }
                Some(Err(e)) => return Ok(StreamEnd::Failed(e)),
                None => return Ok(StreamEnd::Drained),
            },
            _ = &mut cancel => return Ok(StreamEnd::Interrupted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claude_messages::models::{BlockDelta, BlockKind};

    fn partial_chunks() -> Vec<claude_messages::Result<StreamChunk>> {
        vec![
            Ok(StreamChunk::MessageStart {
                id: "msg_1".to_string(),
                model: "claude-sonnet-4-5".to_string(),
                input_tokens: 7,
            }),
            Ok(StreamChunk::ContentBlockStart {
                index: 0,
                block: BlockKind::Text,
            }),
            Ok(StreamChunk::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::Text("Hel".to_string()),
            }),
        ]
    }

    #[tokio::test]
    async fn test_transport_error_keeps_partial_output() {
        let mut chunks = partial_chunks();
        chunks.push(Err(ClientError::connection("connection reset")));
        let mut stream = MessageStream::attach(futures::stream::iter(chunks));
        let mut out = Vec::new();

        let end = print_stream(&mut stream, &mut out, std::future::pending::<()>())
            .await
            .unwrap();

        assert!(matches!(end, StreamEnd::Failed(ClientError::Transport { .. })));
        assert_eq!(out, b"Hel");

        let response = stream.final_response();
        assert!(response.failed);
        assert_eq!(response.text(), "Hel");
        assert!(response.failure.unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_protocol_error_reported_as_failure() {
        let mut chunks = partial_chunks();
        chunks.push(Ok(StreamChunk::ContentBlockDelta {
            index: 4,
            delta: BlockDelta::Text("lost".to_string()),
        }));
        let mut stream = MessageStream::attach(futures::stream::iter(chunks));
        let mut out = Vec::new();

        let end = print_stream(&mut stream, &mut out, std::future::pending::<()>())
            .await
            .unwrap();

        assert!(matches!(
            end,
            StreamEnd::Failed(ClientError::ProtocolSequence { index: 4, .. })
        ));
        assert_eq!(out, b"Hel");
        assert!(stream.final_response().failure.is_some());
    }

    #[tokio::test]
    async fn test_drained_stream() {
        let mut chunks = partial_chunks();
        chunks.push(Ok(StreamChunk::MessageStop));
        let mut stream = MessageStream::attach(futures::stream::iter(chunks));
        let mut out = Vec::new();

        let end = print_stream(&mut stream, &mut out, std::future::pending::<()>())
            .await
            .unwrap();

        assert!(matches!(end, StreamEnd::Drained));
        assert!(stream.is_completed());
    }
}
