//! End-to-end client/server tests over real TCP connections

use bytekv::{Client, Port, Server, ServerConfig, ShutdownHandle};
use std::net::SocketAddr;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    serving: JoinHandle<bytekv::Result<()>>,
}

async fn start_server() -> TestServer {
    let config = ServerConfig {
        port: Port::Auto,
        ..ServerConfig::default()
    };
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    let serving = tokio::spawn(server.serve());
    TestServer {
        addr,
        shutdown,
        serving,
    }
}

async fn start_client_server() -> (TestServer, Client) {
    let server = start_server().await;
    let client = Client::connect(server.addr).await.unwrap();
    (server, client)
}

#[tokio::test]
async fn test_connect_and_close() {
    let (server, client) = start_client_server().await;
    client.close().await.unwrap();
    server.shutdown.shutdown();
    server.serving.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stop_command_shuts_server_down() {
    let (server, mut client) = start_client_server().await;

    client.shutdown_server().await.unwrap();
    server.serving.await.unwrap().unwrap();

    // the listener is gone; a new connection must be refused
    assert!(Client::connect(server.addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_handle_drains_server() {
    let (server, client) = start_client_server().await;

    server.shutdown.shutdown();
    // the idle worker exits at its next command boundary
    server.serving.await.unwrap().unwrap();

    drop(client);
    assert!(Client::connect(server.addr).await.is_err());
}

#[tokio::test]
async fn test_no_key() {
    let (server, mut client) = start_client_server().await;

    assert!(client.get_bytes("foo").await.unwrap_err().is_not_found());
    assert!(client.get_bytes("bar").await.unwrap_err().is_not_found());

    let mut recv = [0u8; 20];
    assert!(client
        .get_bytes_into("foo", &mut recv)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(client
        .get_bytes_range("foo", 0, 20)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(client
        .get_bytes_range_into("foo", 0, 20, &mut recv)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(client
        .truncate_bytes("foo", 3)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(client.get_uint("foo").await.unwrap_err().is_not_found());
    assert!(client.del_uint("foo").await.unwrap_err().is_not_found());

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_set_get_bytes() {
    let (server, mut client) = start_client_server().await;

    for (key, data) in [
        ("foo", b"0123456789".repeat(100)),
        ("bar", b"9876543210".repeat(10)),
        ("empty", Vec::new()),
    ] {
        client.set_bytes(key, &data).await.unwrap();
        assert_eq!(client.get_bytes(key).await.unwrap(), data);
    }

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_del_bytes() {
    let (server, mut client) = start_client_server().await;

    client.set_bytes("foo", b"bar").await.unwrap();
    client.get_bytes("foo").await.unwrap();

    client.del_bytes("foo").await.unwrap();
    assert!(client.get_bytes("foo").await.unwrap_err().is_not_found());

    assert!(client.del_bytes("baz").await.unwrap_err().is_not_found());

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_get_bytes_into() {
    let (server, mut client) = start_client_server().await;

    let sent = b"0123456789";
    client.set_bytes("foo", sent).await.unwrap();

    // buffer sized exactly to the value
    let mut recv = [0u8; 10];
    let filled = client.get_bytes_into("foo", &mut recv).await.unwrap();
    assert_eq!(filled.len, 10);
    assert!(!filled.short);
    assert_eq!(&recv, sent);

    // smaller buffer gets the leading bytes, completely filled
    let mut recv = [0u8; 5];
    let filled = client.get_bytes_into("foo", &mut recv).await.unwrap();
    assert_eq!(filled.len, 5);
    assert!(!filled.short);
    assert_eq!(&recv, b"01234");

    // larger buffer is only partially filled
    let mut recv = [0u8; 13];
    let filled = client.get_bytes_into("foo", &mut recv).await.unwrap();
    assert_eq!(filled.len, 10);
    assert!(filled.short);
    assert_eq!(&recv, b"0123456789\0\0\0");

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_get_bytes_range() {
    let (server, mut client) = start_client_server().await;

    let sent = b"0123456789".repeat(10);
    let len = sent.len() as u32;
    client.set_bytes("foo", &sent).await.unwrap();

    // whole value; the end index clamps
    assert_eq!(client.get_bytes_range("foo", 0, len).await.unwrap(), sent);
    // first and last item
    assert_eq!(client.get_bytes_range("foo", 0, 0).await.unwrap(), b"0");
    assert_eq!(
        client.get_bytes_range("foo", len - 1, len - 1).await.unwrap(),
        b"9"
    );
    // one item past the value
    assert_eq!(client.get_bytes_range("foo", len, len).await.unwrap(), b"");
    // a range fully outside the value
    assert_eq!(
        client
            .get_bytes_range("foo", len + 3, len + 100)
            .await
            .unwrap(),
        b""
    );
    // interior range, end inclusive
    assert_eq!(
        client.get_bytes_range("foo", 10, 20).await.unwrap(),
        b"01234567890"
    );
    // starting inside and ending outside
    assert_eq!(
        client
            .get_bytes_range("foo", len - 3, len + 4)
            .await
            .unwrap(),
        b"789"
    );

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_get_bytes_range_into() {
    let (server, mut client) = start_client_server().await;

    let sent = b"0123456789";
    let len = sent.len() as u32;
    client.set_bytes("foo", sent).await.unwrap();

    // range = value = buffer
    let mut recv = [0u8; 10];
    let filled = client
        .get_bytes_range_into("foo", 0, len, &mut recv)
        .await
        .unwrap();
    assert_eq!(filled.len, 10);
    assert!(!filled.short);
    assert_eq!(&recv, sent);

    // range entirely past the value: nothing arrives
    let mut recv = [0u8; 10];
    let filled = client
        .get_bytes_range_into("foo", len + 2, len + 5, &mut recv)
        .await
        .unwrap();
    assert_eq!(filled.len, 0);
    assert!(filled.short);
    assert_eq!(&recv, &[0u8; 10]);

    // range smaller than the buffer
    let mut recv = [0u8; 10];
    let filled = client
        .get_bytes_range_into("foo", 0, 5, &mut recv)
        .await
        .unwrap();
    assert_eq!(filled.len, 6);
    assert!(filled.short);
    assert_eq!(&recv, b"012345\0\0\0\0");

    // range larger than the buffer: clamped to capacity
    let mut recv = [0u8; 4];
    let filled = client
        .get_bytes_range_into("foo", 0, len, &mut recv)
        .await
        .unwrap();
    assert_eq!(filled.len, 4);
    assert!(!filled.short);
    assert_eq!(&recv, b"0123");

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_set_bytes_range() {
    let (server, mut client) = start_client_server().await;

    client.set_bytes_range("foo", 3, b"3456789").await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"\0\0\x003456789");

    client.set_bytes_range("foo", 0, b"012").await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"0123456789");

    // first item
    client.set_bytes_range("foo", 0, b"a").await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"a123456789");

    // last item
    client.set_bytes_range("foo", 9, b"j").await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"a12345678j");

    // inside the existing value
    client.set_bytes_range("foo", 3, b"def").await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"a12def678j");

    // just past the existing value
    client.set_bytes_range("foo", 10, b"klm").await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"a12def678jklm");

    // past the end with zero-byte padding
    client.set_bytes_range("foo", 15, b"pqr").await.unwrap();
    assert_eq!(
        client.get_bytes("foo").await.unwrap(),
        b"a12def678jklm\0\0pqr"
    );

    // starting inside and ending outside the existing value
    client.set_bytes_range("foo", 16, b"QRSTU").await.unwrap();
    assert_eq!(
        client.get_bytes("foo").await.unwrap(),
        b"a12def678jklm\0\0pQRSTU"
    );

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_truncate_bytes() {
    let (server, mut client) = start_client_server().await;

    client.set_bytes("foo", b"0123456789").await.unwrap();

    client.truncate_bytes("foo", 3).await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"012");

    // truncating past the current length is an acknowledged no-op
    client.truncate_bytes("foo", 6).await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"012");

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_set_get_del_uint() {
    let (server, mut client) = start_client_server().await;

    client.set_uint("foo", 4).await.unwrap();
    assert_eq!(client.get_uint("foo").await.unwrap(), 4);

    client.del_uint("foo").await.unwrap();
    assert!(client.get_uint("foo").await.unwrap_err().is_not_found());

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_set_uint_if_max() {
    let (server, mut client) = start_client_server().await;

    client.set_uint_if_max("foo", 4).await.unwrap();
    assert_eq!(client.get_uint("foo").await.unwrap(), 4);

    // lower value leaves the stored maximum alone
    client.set_uint_if_max("foo", 2).await.unwrap();
    assert_eq!(client.get_uint("foo").await.unwrap(), 4);

    client.set_uint_if_max("foo", 100).await.unwrap();
    assert_eq!(client.get_uint("foo").await.unwrap(), 100);

    server.shutdown.shutdown();
}

#[tokio::test]
async fn test_byte_and_uint_namespaces_coexist() {
    let (server, mut client) = start_client_server().await;

    client.set_bytes("foo", b"value").await.unwrap();
    client.set_uint("foo", 42).await.unwrap();

    assert_eq!(client.get_bytes("foo").await.unwrap(), b"value");
    assert_eq!(client.get_uint("foo").await.unwrap(), 42);

    client.del_uint("foo").await.unwrap();
    assert_eq!(client.get_bytes("foo").await.unwrap(), b"value");

    server.shutdown.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients() {
    let server = start_server().await;

    let mut tasks = Vec::new();
    for worker in 0..8u32 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await.unwrap();
            for i in 0..50u32 {
                let key = format!("worker-{}-key-{}", worker, i);
                client.set_bytes(&key, key.as_bytes()).await.unwrap();
                assert_eq!(client.get_bytes(&key).await.unwrap(), key.as_bytes());
                client.set_uint_if_max("high-water", worker * 100 + i).await.unwrap();
            }
            client.close().await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut client = Client::connect(server.addr).await.unwrap();
    assert_eq!(client.get_uint("high-water").await.unwrap(), 749);

    client.shutdown_server().await.unwrap();
    server.serving.await.unwrap().unwrap();
}
