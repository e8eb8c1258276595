//! Echo Example: one client multiplexing requests over real TCP.
//!
//! Run as two separate processes:
//!
//! ```bash
//! # Terminal 1 - Start the server
//! cargo run --example echo -- server
//!
//! # Terminal 2 - Run the client
//! cargo run --example echo -- client
//! ```
//!
//! The server answers every request with two replies (the request value,
//! then its length as a string) followed by FINISHED. The client submits
//! several requests at once and prints events as they arrive.

use std::env;
use std::error::Error;

use reqlink_transport::{
    ChannelClientHandler, ChannelRequestHandler, Client, ClientConfig, ClientEvent, Frame,
    FrameKind, JsonCodec, RequestEvent, ServerAddress, TokioProviders, Value, ValueCodec,
    try_deserialize_frame,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const SERVER_ADDR: &str = "127.0.0.1:4600";

// ============================================================================
// Server
// ============================================================================

async fn run_server() -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(SERVER_ADDR).await?;
    println!("Server listening on {}", SERVER_ADDR);

    loop {
        let (stream, peer) = listener.accept().await?;
        println!("Accepted connection from {}", peer);
        tokio::task::spawn_local(async move {
            if let Err(e) = serve_connection(stream).await {
                eprintln!("Connection error: {}", e);
            }
        });
    }
}

async fn serve_connection(mut stream: TcpStream) -> Result<(), Box<dyn Error>> {
    let mut buffer = Vec::new();
    let mut chunk = vec![0u8; 4096];

    loop {
        while let Some((frame, consumed)) = try_deserialize_frame(&buffer)? {
            buffer.drain(..consumed);
            match frame.kind {
                FrameKind::Request => {
                    let value = JsonCodec.decode(&frame.payload)?;
                    println!("  request {} -> {}", frame.request_id, value);

                    let length = Value::from(value.to_string().len().to_string());
                    for reply in [value, length] {
                        let payload = JsonCodec.encode(&reply)?;
                        let bytes =
                            Frame::new(frame.request_id, FrameKind::Reply, payload).to_bytes()?;
                        stream.write_all(&bytes).await?;
                    }
                    stream
                        .write_all(&Frame::finished(frame.request_id, false).to_bytes()?)
                        .await?;
                }
                FrameKind::Abort => println!("  request {} aborted", frame.request_id),
                other => return Err(format!("unexpected {} frame from client", other).into()),
            }
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            println!("Client disconnected");
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}

// ============================================================================
// Client
// ============================================================================

async fn run_client() -> Result<(), Box<dyn Error>> {
    let address: ServerAddress = SERVER_ADDR.parse()?;
    let (client_handler, mut client_events) = ChannelClientHandler::new();
    let client = Client::connect(
        &TokioProviders::new(),
        address,
        ClientConfig::local(),
        client_handler,
    )?;

    match client_events.recv().await {
        Some(ClientEvent::Connected) => println!("Connected to {}", client.address()),
        Some(ClientEvent::Error(e)) => return Err(e.into()),
        None => return Err("client handler dropped".into()),
    }

    let mut pending = Vec::new();
    for word in ["alpha", "beta", "gamma"] {
        let (handler, events) = ChannelRequestHandler::new();
        let request = client.submit(&Value::from(word), handler)?;
        pending.push((request, events));
    }

    for (request, mut events) in pending {
        while let Some(event) = events.recv().await {
            println!("  request {}: {:?}", request.id(), event);
            if matches!(event, RequestEvent::Finished { .. }) {
                break;
            }
        }
    }

    println!("Metrics: {:?}", client.metrics());
    client.close()?;
    Ok(())
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    // Current-thread runtime plus LocalSet: the client spawns with spawn_local
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .expect("Failed to create Tokio runtime");
    let local = tokio::task::LocalSet::new();

    let result = match mode {
        "server" => local.block_on(&runtime, run_server()),
        "client" => local.block_on(&runtime, run_client()),
        _ => {
            eprintln!("Usage: echo <server|client>");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
