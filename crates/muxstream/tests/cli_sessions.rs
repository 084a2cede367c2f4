#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Output};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use muxstream::frame::{encode, FrameReader};
use muxstream::session::{Datagram, Identifier};

/// Accepts one client, completes the server half of the handshake with
/// `reply`, then hands the socket to `script`. Yields the token received.
fn fake_node<F>(reply: u8, script: F) -> (u16, JoinHandle<Vec<u8>>)
where
    F: FnOnce(&mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let port = listener.local_addr().expect("local addr").port();
    let handle = thread::spawn(move || {
        let (mut socket, _) = listener.accept().expect("client should connect");
        socket
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("read timeout");
        let mut version = [0u8; 1];
        socket.read_exact(&mut version).expect("version byte");
        assert_eq!(version[0], 0x01);
        socket.write_all(&[reply]).expect("version reply");
        if reply != 0x01 {
            return Vec::new();
        }

        let token = match read_datagram(&mut socket) {
            Datagram::TokenAuth { token } => token.to_vec(),
            other => panic!("expected token datagram, got {other:?}"),
        };
        script(&mut socket);
        token
    });
    (port, handle)
}

fn read_datagram(socket: &mut TcpStream) -> Datagram {
    let payload = FrameReader::new(socket).read_frame().expect("frame");
    Datagram::decode(payload).expect("datagram")
}

fn write_datagram(socket: &mut TcpStream, datagram: &Datagram) {
    let wire = encode(&datagram.encode()).expect("encode");
    socket.write_all(&wire).expect("write frame");
}

/// Wait for the client to hang up, skipping anything it still sends.
fn drain(socket: &mut TcpStream) {
    let mut buf = [0u8; 512];
    while matches!(socket.read(&mut buf), Ok(n) if n > 0) {}
}

fn payload(bytes: &[u8]) -> Datagram {
    let id = Identifier::new("sub00001").expect("identifier");
    Datagram::payload_with_identifier(id, 0x02, bytes.to_vec())
}

fn muxstream(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_muxstream"))
        .args(args)
        .env_remove("STREAMING_API_TLC_TOKEN")
        .env_remove("STREAMING_API_BROKER_TOKEN")
        .env_remove("STREAMING_API_SECURITY_MODE")
        .output()
        .expect("muxstream should run")
}

fn connect_args(port: u16, role: &str) -> Vec<String> {
    [
        "--format",
        "json",
        "--log-level",
        "debug",
        "connect",
        "--host",
        "127.0.0.1",
        "--port",
        &port.to_string(),
        "--token",
        "session-token",
        "--security-mode",
        "NONE",
        "--role",
        role,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn run_connect(port: u16, role: &str, extra: &[&str]) -> Output {
    let mut args = connect_args(port, role);
    args.extend(extra.iter().map(|s| s.to_string()));
    let refs: Vec<&str> = args.iter().map(String::as_str).collect();
    muxstream(&refs)
}

#[test]
fn consumer_prints_payloads_and_stops_at_count() {
    let (port, node) = fake_node(0x01, |socket| {
        write_datagram(socket, &payload(&[1, 2, 3]));
        write_datagram(socket, &Datagram::timestamp_request(1000));
        write_datagram(socket, &payload(&[4, 5]));
        drain(socket);
    });

    let output = run_connect(port, "consumer", &["--count", "2"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["identifier"], "sub00001");
    assert_eq!(lines[0]["payload"], "0x010203");
    assert_eq!(lines[1]["payload_size"], 2);
    assert_eq!(node.join().expect("node thread"), b"session-token");
}

#[test]
fn producer_writes_identified_payloads_until_bye() {
    let (port, node) = fake_node(0x01, |socket| {
        let first = loop {
            match read_datagram(socket) {
                Datagram::PayloadWithIdentifier(p) => break p,
                Datagram::Keepalive => continue,
                other => panic!("unexpected datagram: {other:?}"),
            }
        };
        assert_eq!(first.identifier.as_str(), "sub00001");
        assert_eq!(first.payload_type, 0x02);
        assert_eq!(first.payload.len(), 16);
        write_datagram(socket, &Datagram::bye("enough"));
        drain(socket);
    });

    let output = run_connect(
        port,
        "producer",
        &["--interval", "20ms", "--payload-size", "16"],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("enough"));
    assert!(!stderr.contains("session-token"));
    node.join().expect("node thread");
}

#[test]
fn bad_frame_prefix_exits_60() {
    let (port, node) = fake_node(0x01, |socket| {
        socket
            .write_all(&[0xAA, 0xCC, 0x00, 0x01, 0x00])
            .expect("write garbage");
        drain(socket);
    });

    let output = run_connect(port, "consumer", &[]);

    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("0xAACC"));
    node.join().expect("node thread");
}

#[test]
fn version_rejection_exits_1() {
    let (port, node) = fake_node(0x02, |_socket| {});

    let output = run_connect(port, "consumer", &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("handshake failed"));
    node.join().expect("node thread");
}

#[test]
fn refused_connection_exits_3() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let output = run_connect(port, "consumer", &[]);

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn produce_without_token_exits_64() {
    let output = muxstream(&["produce", "--security-mode", "NONE"]);

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("STREAMING_API_TLC_TOKEN"));
}

/// One-shot REST API that grants a session on `node_port`.
fn fake_api(node_port: u16) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}/api", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let (socket, _) = listener.accept().expect("api client");
        let mut reader = BufReader::new(socket);
        let mut head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("request line");
            if line.trim_end().is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().expect("length");
                }
            }
            head.push_str(&line);
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).expect("body");

        let grant = format!(
            r#"{{"token":"granted-token","details":{{"listener":{{"host":"127.0.0.1","port":{node_port}}}}}}}"#
        );
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{grant}",
            grant.len()
        );
        reader
            .get_mut()
            .write_all(response.as_bytes())
            .expect("response");
        head + &String::from_utf8_lossy(&body)
    });
    (base, handle)
}

#[test]
fn consume_bootstraps_then_streams() {
    let (node_port, node) = fake_node(0x01, |socket| {
        write_datagram(socket, &payload(b"hi"));
        drain(socket);
    });
    let (base_url, api) = fake_api(node_port);

    let output = Command::new(env!("CARGO_BIN_EXE_muxstream"))
        .args(["--format", "pretty", "consume", "--count", "1"])
        .env("STREAMING_API_BASEURL", &base_url)
        .env("STREAMING_API_BROKER_TOKEN", "broker-api-key")
        .env("STREAMING_API_SECURITY_MODE", "NONE")
        .env("STREAMING_API_DOMAIN", "test_domain")
        .output()
        .expect("muxstream should run");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("identifier=sub00001"));
    assert_eq!(node.join().expect("node thread"), b"granted-token");

    let request = api.join().expect("api thread");
    assert!(request.starts_with("POST /api/v1/sessions"));
    assert!(request.to_ascii_lowercase().contains("x-authorization: broker-api-key"));
    assert!(request.contains("\"type\":\"Broker\""));
    assert!(request.contains("\"domain\":\"test_domain\""));
    assert!(request.contains("\"securityMode\":\"NONE\""));
}

#[test]
fn version_prints_package_version() {
    let output = muxstream(&["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("muxstream {}", env!("CARGO_PKG_VERSION")));
}
