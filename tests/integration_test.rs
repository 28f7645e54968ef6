//! End-to-end tests over real sockets: each test spawns a server on an
//! ephemeral port and talks to it with a minimal binary-protocol client.

use bytes::BytesMut;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use zedis::config::Config;
use zedis::protocol::{self, ErrorCode, Reply};
use zedis::server::Server;

fn start_server(idle_timeout_ms: u64) -> SocketAddr {
    let config = Config {
        bind: "127.0.0.1".to_string(),
        port: 0,
        workers: 2,
        idle_timeout_ms,
        ..Default::default()
    };
    let mut server = Server::bind(config).expect("failed to bind test server");
    let addr = server.local_addr().expect("listener has an address");
    std::thread::spawn(move || {
        let _ = server.run();
    });
    addr
}

struct Client {
    stream: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        for i in 0..50 {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(Duration::from_secs(5)))
                        .expect("set read timeout");
                    return Client { stream };
                }
                Err(_) if i < 49 => std::thread::sleep(Duration::from_millis(20)),
                Err(e) => panic!("failed to connect: {e}"),
            }
        }
        unreachable!()
    }

    fn send(&mut self, parts: &[&str]) {
        let args: Vec<&[u8]> = parts.iter().map(|p| p.as_bytes()).collect();
        let mut buf = BytesMut::new();
        protocol::write_request(&mut buf, &args);
        self.stream.write_all(&buf).expect("request write");
    }

    fn recv(&mut self) -> Reply {
        let mut len_bytes = [0u8; 4];
        self.stream.read_exact(&mut len_bytes).expect("response length");
        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).expect("response body");
        protocol::parse_reply(&body).expect("well-formed reply")
    }

    fn cmd(&mut self, parts: &[&str]) -> Reply {
        self.send(parts);
        self.recv()
    }
}

#[test]
fn test_string_round_trip() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    assert_eq!(client.cmd(&["SET", "foo", "bar"]), Reply::Nil);
    assert_eq!(client.cmd(&["GET", "foo"]), Reply::String(b"bar".to_vec()));
    assert_eq!(client.cmd(&["GET", "missing"]), Reply::Nil);
}

#[test]
fn test_type_error_preserves_value() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    assert_eq!(client.cmd(&["SET", "k", "v"]), Reply::Nil);
    assert!(matches!(
        client.cmd(&["ZADD", "k", "1", "m"]),
        Reply::Error(ErrorCode::Type, _)
    ));
    assert_eq!(client.cmd(&["GET", "k"]), Reply::String(b"v".to_vec()));
}

#[test]
fn test_sorted_set_rank_window() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    for (score, name) in [("1", "a"), ("2", "b"), ("2", "c"), ("3", "d")] {
        assert_eq!(client.cmd(&["ZADD", "s", score, name]), Reply::Integer(1));
    }
    assert_eq!(
        client.cmd(&["ZQUERY", "s", "2", "", "0", "10"]),
        Reply::Array(vec![
            Reply::String(b"b".to_vec()),
            Reply::Double(2.0),
            Reply::String(b"c".to_vec()),
            Reply::Double(2.0),
            Reply::String(b"d".to_vec()),
            Reply::Double(3.0),
        ])
    );
}

#[test]
fn test_zadd_update_vs_insert() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    assert_eq!(client.cmd(&["ZADD", "s", "2", "b"]), Reply::Integer(1));
    assert_eq!(client.cmd(&["ZADD", "s", "2", "b"]), Reply::Integer(0));
    assert_eq!(client.cmd(&["ZSCORE", "s", "b"]), Reply::Double(2.0));
}

#[test]
fn test_ttl_lifecycle() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    assert_eq!(client.cmd(&["SET", "k", "v"]), Reply::Nil);
    assert_eq!(client.cmd(&["PEXPIRE", "k", "50"]), Reply::Integer(1));
    let Reply::Integer(ttl) = client.cmd(&["PTTL", "k"]) else {
        panic!("PTTL must return an integer");
    };
    assert!((0..=50).contains(&ttl), "fresh TTL reads back, got {ttl}");

    // Past the deadline the expirer has removed the entry, with no client
    // traffic needed to nudge it.
    std::thread::sleep(Duration::from_millis(120));
    assert_eq!(client.cmd(&["GET", "k"]), Reply::Nil);
    assert_eq!(client.cmd(&["PTTL", "k"]), Reply::Integer(-2));
}

#[test]
fn test_ttl_cancel_keeps_key() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    client.cmd(&["SET", "k", "v"]);
    client.cmd(&["PEXPIRE", "k", "40"]);
    assert_eq!(client.cmd(&["PEXPIRE", "k", "0"]), Reply::Integer(1));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(client.cmd(&["GET", "k"]), Reply::String(b"v".to_vec()));
    assert_eq!(client.cmd(&["PTTL", "k"]), Reply::Integer(-1));
}

#[test]
fn test_idle_connection_is_reaped() {
    let addr = start_server(150);
    let mut client = Client::connect(addr);
    // Stay silent past the idle budget; the server closes the socket and a
    // read on our side observes EOF.
    std::thread::sleep(Duration::from_millis(600));
    let mut buf = [0u8; 1];
    match client.stream.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("unexpected {n} bytes from an idle connection"),
        Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
        Err(e) => panic!("expected EOF, got {e}"),
    }
}

#[test]
fn test_active_connection_survives_reaper() {
    let addr = start_server(200);
    let mut client = Client::connect(addr);
    for _ in 0..5 {
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(client.cmd(&["GET", "nothing"]), Reply::Nil);
    }
}

#[test]
fn test_pipelined_requests_answered_in_order() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    let mut buf = BytesMut::new();
    protocol::write_request(&mut buf, &[b"set", b"a", b"1"]);
    protocol::write_request(&mut buf, &[b"set", b"b", b"2"]);
    protocol::write_request(&mut buf, &[b"get", b"a"]);
    protocol::write_request(&mut buf, &[b"get", b"b"]);
    client.stream.write_all(&buf).expect("pipelined write");
    assert_eq!(client.recv(), Reply::Nil);
    assert_eq!(client.recv(), Reply::Nil);
    assert_eq!(client.recv(), Reply::String(b"1".to_vec()));
    assert_eq!(client.recv(), Reply::String(b"2".to_vec()));
}

#[test]
fn test_oversized_frame_closes_connection() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    client
        .stream
        .write_all(&8192u32.to_le_bytes())
        .expect("bogus header write");
    let mut buf = [0u8; 1];
    match client.stream.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("unexpected {n} bytes after protocol error"),
        Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
        Err(e) => panic!("expected EOF, got {e}"),
    }
    // The server is still healthy for other clients.
    let mut other = Client::connect(addr);
    assert_eq!(other.cmd(&["SET", "x", "y"]), Reply::Nil);
}

#[test]
fn test_unknown_command_reply() {
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    assert!(matches!(
        client.cmd(&["NOSUCH", "a"]),
        Reply::Error(ErrorCode::Unknown, _)
    ));
}

#[test]
fn test_keys_across_many_inserts() {
    // Enough keys to push the key index through several incremental
    // resizes while the server keeps answering.
    let addr = start_server(5000);
    let mut client = Client::connect(addr);
    for i in 0..500 {
        let key = format!("key-{i}");
        let value = format!("value-{i}");
        assert_eq!(client.cmd(&["SET", &key, &value]), Reply::Nil);
    }
    for i in (0..500).step_by(97) {
        let key = format!("key-{i}");
        let value = format!("value-{i}");
        assert_eq!(
            client.cmd(&["GET", &key]),
            Reply::String(value.into_bytes())
        );
    }
    let Reply::Array(items) = client.cmd(&["KEYS"]) else {
        panic!("KEYS must return an array");
    };
    assert_eq!(items.len(), 500);
    assert_eq!(client.cmd(&["DEL", "key-0"]), Reply::Integer(1));
    assert_eq!(client.cmd(&["DEL", "key-0"]), Reply::Integer(0));
}

#[test]
fn test_two_clients_share_the_key_space() {
    let addr = start_server(5000);
    let mut writer = Client::connect(addr);
    let mut reader = Client::connect(addr);
    assert_eq!(writer.cmd(&["SET", "shared", "v"]), Reply::Nil);
    assert_eq!(reader.cmd(&["GET", "shared"]), Reply::String(b"v".to_vec()));
}
