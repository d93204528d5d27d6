//! Tests for the IPFS backend against an in-process HTTP node.
//!
//! Verifies:
//! - A node that accepts connections but never answers yields RequestTimeout
//! - block/put carries the store's codec and Kubo's hash function name
//! - A key returned by the node that differs from the local hash is rejected
//! - Blocks read back are re-hashed before they are decoded
//! - Missing blocks read as None, other node errors surface as Backend

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use evees_cas::*;
use evees_cid::{canonicalize, encode, hash_object, CidConfig, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Request {
    method: String,
    target: String,
    body: Vec<u8>,
}

type Requests = Arc<Mutex<Vec<Request>>>;

/// Serve one HTTP/1.1 request per connection with the response `respond`
/// picks. Every request is recorded.
async fn stub_node<F>(respond: F) -> (IpfsConfig, Requests)
where
    F: Fn(&Request) -> (u16, Vec<u8>) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let log = requests.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let respond = respond.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let _ = answer(socket, |request| {
                    log.lock().unwrap().push(request.clone());
                    (*respond)(request)
                })
                .await;
            });
        }
    });

    (config_for(port, 1_000), requests)
}

async fn answer<F>(mut socket: TcpStream, respond: F) -> std::io::Result<()>
where
    F: FnOnce(&Request) -> (u16, Vec<u8>),
{
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);

    let mut line = String::new();
    reader.read_line(&mut line).await?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0;
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await?;

    let (status, payload) = respond(&Request {
        method,
        target,
        body,
    });
    let head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        payload.len()
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.shutdown().await
}

fn config_for(port: u16, timeout_ms: u64) -> IpfsConfig {
    IpfsConfig {
        host: "127.0.0.1".into(),
        port,
        timeout_ms,
        ..IpfsConfig::default()
    }
}

fn is(request: &Request, endpoint: &str) -> bool {
    request.target.starts_with(&format!("/api/v0/{}", endpoint))
}

fn version() -> (u16, Vec<u8>) {
    (200, br#"{"Version":"0.29.0"}"#.to_vec())
}

fn key(id: &str) -> (u16, Vec<u8>) {
    (200, format!(r#"{{"Key":"{}"}}"#, id).into_bytes())
}

fn block(object: &Value) -> Vec<u8> {
    encode(&canonicalize(object)).unwrap()
}

// ═══════════════════════════════════════════════════════════════
// Timeouts
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn silent_node_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let store = IpfsStore::new(&config_for(port, 100), CidConfig::default()).unwrap();
    let id = store.hash(&Value::from("never answered")).unwrap();

    let start = Instant::now();
    let result = store.get(&id).await;
    assert!(
        matches!(result, Err(CasError::RequestTimeout { timeout_ms: 100, .. })),
        "got {:?}",
        result
    );
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(store.connection_state(), ConnectionState::Disconnected);
}

// ═══════════════════════════════════════════════════════════════
// block/put
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn create_stores_block_with_config_params() {
    let object = Value::from_json_str(r#"{"b":2,"a":1}"#).unwrap();
    let id = hash_object(&object, &CidConfig::default()).unwrap();
    let returned = id.clone();
    let (config, requests) = stub_node(move |request| {
        if is(request, "block/put") {
            key(&returned)
        } else {
            version()
        }
    })
    .await;

    let store = IpfsStore::new(&config, CidConfig::default()).unwrap();
    assert_eq!(store.create(&object).await.unwrap(), id);
    assert_eq!(store.connection_state(), ConnectionState::Ready);

    let requests = requests.lock().unwrap();
    assert!(requests.iter().all(|r| r.method == "POST"));
    let put = requests.iter().find(|r| is(r, "block/put")).unwrap();
    assert!(put.target.contains("cid-codec=raw"), "{}", put.target);
    assert!(put.target.contains("mhtype=sha2-256"), "{}", put.target);
    assert!(put.target.contains("pin=false"), "{}", put.target);

    let expected = block(&object);
    assert!(
        put.body.windows(expected.len()).any(|w| w == expected.as_slice()),
        "multipart body carries the canonical block"
    );
}

#[tokio::test]
async fn create_uses_kubo_name_for_blake3() {
    let cid_config = CidConfig {
        hash_type: "blake3-256".into(),
        ..CidConfig::default()
    };
    let object = Value::from("blake");
    let id = hash_object(&object, &cid_config).unwrap();
    let returned = id.clone();
    let (config, requests) = stub_node(move |request| {
        if is(request, "block/put") {
            key(&returned)
        } else {
            version()
        }
    })
    .await;

    let store = IpfsStore::new(&config, cid_config).unwrap();
    assert_eq!(store.create(&object).await.unwrap(), id);

    let requests = requests.lock().unwrap();
    let put = requests.iter().find(|r| is(r, "block/put")).unwrap();
    assert!(put.target.contains("mhtype=blake3&"), "{}", put.target);
}

#[tokio::test]
async fn create_rejects_mismatched_key() {
    let other = hash_object(&Value::from("something else"), &CidConfig::default()).unwrap();
    let (config, _) = stub_node(move |request| {
        if is(request, "block/put") {
            key(&other)
        } else {
            version()
        }
    })
    .await;

    let store = IpfsStore::new(&config, CidConfig::default()).unwrap();
    assert!(matches!(
        store.create(&Value::from("mine")).await,
        Err(CasError::HashMismatch { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════
// block/get
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn get_verifies_block_bytes() {
    let genuine = Value::from_json_str(r#"{"title":"genuine"}"#).unwrap();
    let id = hash_object(&genuine, &CidConfig::default()).unwrap();
    let served = block(&genuine);
    let (config, requests) = stub_node(move |request| {
        if is(request, "block/get") {
            (200, served.clone())
        } else {
            version()
        }
    })
    .await;

    let store = IpfsStore::new(&config, CidConfig::default()).unwrap();
    assert_eq!(store.get(&id).await.unwrap(), Some(genuine));

    let requests = requests.lock().unwrap();
    let get = requests.iter().find(|r| is(r, "block/get")).unwrap();
    assert_eq!(get.target, format!("/api/v0/block/get?arg={}", id));
}

#[tokio::test]
async fn get_rejects_tampered_block() {
    let id = hash_object(&Value::from("genuine"), &CidConfig::default()).unwrap();
    let forged = block(&Value::from("forged"));
    let (config, _) = stub_node(move |request| {
        if is(request, "block/get") {
            (200, forged.clone())
        } else {
            version()
        }
    })
    .await;

    let store = IpfsStore::new(&config, CidConfig::default()).unwrap();
    assert!(matches!(
        store.get(&id).await,
        Err(CasError::HashMismatch { returned, .. }) if returned == id
    ));
}

#[tokio::test]
async fn missing_block_is_none_and_other_errors_surface() {
    let missing = hash_object(&Value::from("missing"), &CidConfig::default()).unwrap();
    let broken = hash_object(&Value::from("broken"), &CidConfig::default()).unwrap();
    let missing_arg = format!("arg={}", missing);
    let (config, _) = stub_node(move |request| {
        if !is(request, "block/get") {
            version()
        } else if request.target.ends_with(&missing_arg) {
            (
                500,
                br#"{"Message":"block was not found locally (offline)","Code":0}"#.to_vec(),
            )
        } else {
            (500, br#"{"Message":"repo is locked","Code":0}"#.to_vec())
        }
    })
    .await;

    let store = IpfsStore::new(&config, CidConfig::default()).unwrap();
    assert_eq!(store.get(&missing).await.unwrap(), None);
    assert!(matches!(
        store.get(&broken).await,
        Err(CasError::Backend { reason, .. }) if reason.contains("repo is locked")
    ));
}
