//! Minimal TCP echo server to stand in for a container during local testing.
//!
//! ```text
//! cargo run --example echo_backend -- 127.0.0.1:8001 web1
//! ```
//!
//! Each reply line is prefixed with the backend's label so it is easy to see
//! which backend the proxy picked.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:8001".to_string());
    let label = args.next().unwrap_or_else(|| "echo".to_string());

    let listener = TcpListener::bind(&addr).await?;
    println!("{label} listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let label = label.clone();
        tokio::spawn(async move {
            let (rd, mut wr) = stream.into_split();
            let mut lines = BufReader::new(rd).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if wr.write_all(format!("[{label}] {line}\n").as_bytes()).await.is_err() {
                    break;
                }
            }
            println!("{label}: {peer} disconnected");
        });
    }
}
