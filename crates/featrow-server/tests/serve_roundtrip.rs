//! Client/server round-trip over a real TCP socket

use featrow_core::FeatureRow;
use featrow_server::{
    BoundedExecutor, FeatureServer, InMemoryRowStore, Request, Response, ServeConfig,
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn send_request(stream: &mut TcpStream, request: &Request) -> Response {
    let bytes = request.to_bytes().expect("serialize request");
    let len = bytes.len() as u32;
    stream.write_all(&len.to_be_bytes()).await.unwrap();
    stream.write_all(&bytes).await.unwrap();
    stream.flush().await.unwrap();

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.unwrap();
    let msg_len = u32::from_be_bytes(len_buf) as usize;

    let mut buffer = vec![0u8; msg_len];
    stream.read_exact(&mut buffer).await.unwrap();
    Response::from_bytes(&buffer).expect("deserialize response")
}

#[tokio::test]
async fn server_answers_ping_and_row_lookups() {
    let store = InMemoryRowStore::new();
    store.insert(
        FeatureRow::new("driver", "driver-42", 1_700_000_000_000)
            .with_field("trips", b"7".to_vec())
            .with_field("rating", b"4.9".to_vec()),
    );

    let config = ServeConfig {
        bind_addr: "127.0.0.1:0".to_string(),
    };
    let server = FeatureServer::new(config, BoundedExecutor::new(4), Arc::new(store))
        .await
        .expect("bind server");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.start());

    let mut stream = TcpStream::connect(addr).await.expect("connect");

    assert_eq!(send_request(&mut stream, &Request::Ping).await, Response::Pong);

    let response = send_request(
        &mut stream,
        &Request::GetRow {
            entity_name: "driver".to_string(),
            entity_key: "driver-42".to_string(),
        },
    )
    .await;
    match response {
        Response::Row(Some(row)) => {
            assert_eq!(row.entity_key, "driver-42");
            assert_eq!(row.field("trips").map(|b| b.as_ref()), Some(&b"7"[..]));
        }
        other => panic!("expected a row, got {:?}", other),
    }

    let response = send_request(
        &mut stream,
        &Request::GetRow {
            entity_name: "driver".to_string(),
            entity_key: "driver-404".to_string(),
        },
    )
    .await;
    assert_eq!(response, Response::Row(None));
}

#[tokio::test]
async fn multiple_connections_share_one_executor() {
    let store = InMemoryRowStore::new();
    store.insert(FeatureRow::new("driver", "d-1", 0).with_field("trips", b"1".to_vec()));

    let config = ServeConfig {
        bind_addr: "127.0.0.1:0".to_string(),
    };
    let executor = BoundedExecutor::new(8);
    let server = FeatureServer::new(config, executor.clone(), Arc::new(store))
        .await
        .expect("bind server");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.start());

    let mut handles = Vec::new();
    for _ in 0..4 {
        handles.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.expect("connect");
            send_request(&mut stream, &Request::Ping).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Response::Pong);
    }

    // Handlers release their permits once the clients hang up.
    for _ in 0..100 {
        if executor.available() == 8 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(executor.available(), 8);
}
