//! Shared test client speaking Content-Length frames over an in-memory
//! duplex stream, mirroring what an editor process would send.

use serde_json::{Value, json};
use tokio::io::{
    AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};

pub struct TestClient {
    read: BufReader<ReadHalf<DuplexStream>>,
    write: WriteHalf<DuplexStream>,
}

impl TestClient {
    pub fn new(stream: DuplexStream) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            read: BufReader::new(read),
            write,
        }
    }

    pub async fn send_raw(&mut self, body: &[u8]) {
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.write.write_all(header.as_bytes()).await.unwrap();
        self.write.write_all(body).await.unwrap();
        self.write.flush().await.unwrap();
    }

    pub async fn send(&mut self, message: Value) {
        self.send_raw(&serde_json::to_vec(&message).unwrap()).await;
    }

    pub async fn request(&mut self, id: i64, method: &str, params: Value) {
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        self.send(json!({"jsonrpc": "2.0", "method": method, "params": params}))
            .await;
    }

    pub async fn cancel(&mut self, id: i64) {
        self.notify("$/cancelRequest", json!({"id": id})).await;
    }

    /// Reads the next frame from the server; `None` once the wire closes.
    pub async fn recv(&mut self) -> Option<Value> {
        let mut line = String::new();
        let mut content_length = None;
        loop {
            line.clear();
            if self.read.read_line(&mut line).await.unwrap() == 0 {
                return None;
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                break;
            }
            if let Some((name, value)) = trimmed.split_once(':')
                && name.eq_ignore_ascii_case("Content-Length")
            {
                content_length = Some(value.trim().parse::<usize>().unwrap());
            }
        }
        let mut body = vec![0u8; content_length.expect("Content-Length header")];
        self.read.read_exact(&mut body).await.unwrap();
        Some(serde_json::from_slice(&body).unwrap())
    }

    /// Performs the handshake a well-behaved editor performs first.
    pub async fn initialize(&mut self) -> Value {
        self.request(
            0,
            "initialize",
            json!({
                "processId": 1234,
                "clientInfo": {"name": "test-editor", "version": "1.0"},
                "rootUri": "file:///workspace",
                "initializationOptions": {"telemetry": false}
            }),
        )
        .await;
        self.recv().await.expect("initialize response")
    }
}
