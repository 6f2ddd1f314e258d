//! Edge node example: relay one stream to a local viewer
//!
//! Run with: cargo run --example edge_node [ORIGIN_ADDR] [STREAM_ID]
//!
//! Examples:
//!   cargo run --example edge_node                        # origin 127.0.0.1:8080, stream "live"
//!   cargo run --example edge_node 10.0.0.1:8080 camera1
//!
//! The node asks the origin to forward the stream over
//! `POST /forward/{stream}` and prints the ports it listens on. Packets
//! can also be pushed by hand, for example with
//!   echo -n rtp | nc -u -w0 127.0.0.1 <audio port>

use edge_relay::{EdgeNode, NodeConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let origin = args.get(1).map(String::as_str).unwrap_or("127.0.0.1:8080");
    let stream_id = args.get(2).map(String::as_str).unwrap_or("live");

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("edge_relay=debug".parse()?)
                .add_directive("edge_node=debug".parse()?),
        )
        .init();

    let config = NodeConfig::with_origin(origin);
    let node = EdgeNode::new(config)?;

    let mut viewer = node.view(stream_id, "demo-viewer").await?;
    if let Some(endpoint) = node.endpoint(stream_id).await {
        let desc = endpoint.description();
        println!("Relaying stream '{}' from {}", stream_id, origin);
        println!(
            "Listening on {}: audio {}, video {}, video2 {}",
            desc.host, desc.audio_port, desc.video_port, desc.video_port2
        );
        println!("Press Ctrl+C to stop");
    }

    let mut audio_packets = 0u64;
    let mut video_packets = 0u64;

    loop {
        tokio::select! {
            packet = viewer.audio.recv() => match packet {
                Some(_) => audio_packets += 1,
                None => break,
            },
            packet = viewer.video.recv() => match packet {
                Some(_) => video_packets += 1,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Shutting down...");
                break;
            }
        }
    }

    println!(
        "Received {} audio and {} video packets",
        audio_packets, video_packets
    );

    node.leave("demo-viewer").await;
    node.shutdown().await;
    Ok(())
}
