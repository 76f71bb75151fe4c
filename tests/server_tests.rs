mod common;

use quillpost::{ServerConfig, db::Database, password::PasswordHasher, start_server};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_serves_over_tcp() {
    let db = Database::open(":memory:").await.unwrap();
    let mut config = ServerConfig::new(db, common::JWT_SECRET.to_vec());
    config.password_hasher = PasswordHasher::new(64, 1, 1).unwrap();

    let (handle, addr) = start_server(config, 0).await.unwrap();

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/articles HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("\"total_elements\":0"));

    handle.abort();
}
