use nix::{
    sys::signal::{self, Signal::SIGTERM},
    unistd::Pid,
};
use provisioner_daemon::daemon::DaemonBuilder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

#[tokio::test]
#[ignore]
async fn sig_term_shutdown() {
    let app = DaemonBuilder::build(common::create_example_cli()).await.unwrap();
    let handle = app.run().await.unwrap();
    signal::kill(Pid::this(), SIGTERM).unwrap();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
#[ignore]
async fn sig_int_shutdown() {
    let app = DaemonBuilder::build(common::create_example_cli()).await.unwrap();
    let handle = app.run().await.unwrap();
    common::request_shutdown();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
#[ignore]
async fn health_over_tcp() {
    let app = DaemonBuilder::build(common::create_example_cli()).await.unwrap();
    let address = app.local_addr().unwrap();
    let handle = app.run().await.unwrap();

    let mut stream = TcpStream::connect(address).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with("\r\n\r\nOK"));

    common::request_shutdown();
    assert!(handle.await.unwrap().is_ok());
}
