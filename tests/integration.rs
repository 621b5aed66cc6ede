use litedb::{Client, Config, Response, Server, ShutdownHandle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    connections: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(config: Config) -> Self {
        let mut server = Server::new(config).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let connections = server.connection_counter();
        let thread = thread::spawn(move || server.run().unwrap());
        Self {
            addr,
            shutdown,
            connections,
            thread: Some(thread),
        }
    }

    fn client(&self) -> Client {
        let mut client = Client::connect(self.addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        client
    }

    fn stop(&mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn temp_path() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("litedb_it_{}_{}.aof", std::process::id(), n))
}

fn memory_config() -> Config {
    Config {
        port: 0,
        aof_enabled: false,
        poll_timeout_ms: 10,
        ..Default::default()
    }
}

fn aof_config(path: &PathBuf) -> Config {
    Config {
        port: 0,
        aof_path: path.display().to_string(),
        aof_flush_interval_ms: 20,
        poll_timeout_ms: 10,
        ..Default::default()
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_set_and_get() {
    let server = TestServer::start(memory_config());
    let mut client = server.client();

    assert_eq!(client.send("SET key value").unwrap(), Response::ok());
    let reply = client.send("GET key").unwrap();
    assert_eq!(reply, Response::str("value"));
    let encoded = litedb::protocol::encode_response(&reply);
    assert_eq!(&encoded[1..5], &5u32.to_le_bytes()[..]);

    assert_eq!(client.send("GET nothing").unwrap(), Response::Nil);
    assert_eq!(client.send("SET n 17").unwrap(), Response::ok());
    assert_eq!(client.send("GET n").unwrap(), Response::Int(17));
}

#[test]
fn test_hash_commands() {
    let server = TestServer::start(memory_config());
    let mut client = server.client();

    assert_eq!(client.send("HSET user name alice").unwrap(), Response::Int(1));
    assert_eq!(client.send("HGET user name").unwrap(), Response::str("alice"));
    assert_eq!(client.send("HDEL user name").unwrap(), Response::Int(1));
    assert!(client.send("HGET user name").unwrap().is_error());
    assert_eq!(client.send("KEYS").unwrap(), Response::Arr(vec![]));
}

#[test]
fn test_list_commands() {
    let server = TestServer::start(memory_config());
    let mut client = server.client();

    assert_eq!(client.send("LPUSH l 2").unwrap(), Response::Int(1));
    assert_eq!(client.send("LPUSH l 1").unwrap(), Response::Int(2));
    assert_eq!(client.send("RPUSH l 3").unwrap(), Response::Int(3));

    for (index, expected) in ["1", "2", "3"].iter().enumerate() {
        assert_eq!(
            client.send(&format!("LGET l {}", index)).unwrap(),
            Response::str(*expected)
        );
    }
    assert!(client.send("LGET l 3").unwrap().is_error());
    assert_eq!(client.send("RPOP l").unwrap(), Response::str("3"));
}

#[test]
fn test_sorted_set_ordering() {
    let server = TestServer::start(memory_config());
    let mut client = server.client();

    client.send("ZADD z 1 a").unwrap();
    client.send("ZADD z 3 b").unwrap();
    client.send("ZADD z 2 c").unwrap();

    assert_eq!(
        client.send("ZRANGE z 0 10").unwrap(),
        Response::Arr(vec![
            Response::str("a"),
            Response::Float(1.0),
            Response::str("c"),
            Response::Float(2.0),
            Response::str("b"),
            Response::Float(3.0),
        ])
    );
    assert_eq!(client.send("ZSCORE z c").unwrap(), Response::Float(2.0));
    assert_eq!(client.send("ZRANK z b").unwrap(), Response::Int(2));
}

#[test]
fn test_keys_and_flushall() {
    let server = TestServer::start(memory_config());
    let mut client = server.client();

    client.send("SET s v").unwrap();
    client.send("HSET h f v").unwrap();
    client.send("RPUSH l v").unwrap();
    client.send("ZADD z 1 v").unwrap();

    match client.send("KEYS").unwrap() {
        Response::Arr(keys) => assert_eq!(keys.len(), 4),
        other => panic!("expected array, got {:?}", other),
    }
    assert_eq!(client.send("FLUSHALL").unwrap(), Response::ok());
    assert_eq!(client.send("KEYS").unwrap(), Response::Arr(vec![]));
}

#[test]
fn test_errors_keep_connection_open() {
    let server = TestServer::start(memory_config());
    let mut client = server.client();

    assert!(client.send("BOGUS").unwrap().is_error());
    assert!(client.send("GET").unwrap().is_error());
    client.send("RPUSH l x").unwrap();
    match client.send("GET l").unwrap() {
        Response::Err(msg) => assert!(msg.starts_with("WRONGTYPE"), "{}", msg),
        other => panic!("expected WRONGTYPE, got {:?}", other),
    }
    assert_eq!(client.send("PING").unwrap(), Response::str("PONG"));
}

#[test]
fn test_pipelined_requests() {
    let server = TestServer::start(memory_config());
    let mut client = server.client();

    let lines: Vec<String> = (0..100).map(|i| format!("RPUSH l {}", i)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let replies = client.pipeline(&refs).unwrap();

    let expected: Vec<Response> = (1..=100).map(Response::Int).collect();
    assert_eq!(replies, expected);
    assert_eq!(client.send("LLEN l").unwrap(), Response::Int(100));
}

#[test]
fn test_oversized_frame_closes_connection() {
    let server = TestServer::start(memory_config());
    let mut client = server.client();

    client.send_raw(&5000u32.to_le_bytes()).unwrap();
    assert!(client.read_response().unwrap().is_error());
    assert!(client.read_response().is_err());

    // Other clients are unaffected
    let mut other = server.client();
    assert_eq!(other.send("PING").unwrap(), Response::str("PONG"));
}

#[test]
fn test_clients_share_the_key_space() {
    let server = TestServer::start(memory_config());
    let mut writer = server.client();
    let mut reader = server.client();

    writer.send("SET shared 1").unwrap();
    assert_eq!(reader.send("GET shared").unwrap(), Response::Int(1));
    assert!(wait_for(|| server.connections.load(Ordering::Acquire) == 2));

    drop(writer);
    assert!(wait_for(|| server.connections.load(Ordering::Acquire) == 1));
}

#[test]
fn test_max_clients_rejects_extra_connections() {
    let server = TestServer::start(Config {
        max_clients: 1,
        ..memory_config()
    });

    let mut first = server.client();
    assert_eq!(first.send("PING").unwrap(), Response::str("PONG"));

    let mut second = server.client();
    assert!(second.send("PING").is_err());

    assert_eq!(first.send("PING").unwrap(), Response::str("PONG"));
}

#[test]
fn test_aof_restores_state_after_restart() {
    let path = temp_path();

    {
        let server = TestServer::start(aof_config(&path));
        let mut client = server.client();
        client.send("SET name litedb").unwrap();
        client.send("HSET h f v").unwrap();
        client.send("RPUSH l a").unwrap();
        client.send("RPUSH l b").unwrap();
        client.send("LPOP l").unwrap();
        client.send("ZADD z 2.5 m").unwrap();
        client.send("GET name").unwrap();
        assert!(client.send("HGET h missing").unwrap().is_error());
    }

    let logged = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        logged.lines().collect::<Vec<_>>(),
        vec![
            "SET name litedb",
            "HSET h f v",
            "RPUSH l a",
            "RPUSH l b",
            "LPOP l",
            "ZADD z 2.5 m",
        ]
    );

    {
        let server = TestServer::start(aof_config(&path));
        let mut client = server.client();
        assert_eq!(client.send("GET name").unwrap(), Response::str("litedb"));
        assert_eq!(client.send("HGET h f").unwrap(), Response::str("v"));
        assert_eq!(client.send("LLEN l").unwrap(), Response::Int(1));
        assert_eq!(client.send("LGET l 0").unwrap(), Response::str("b"));
        assert_eq!(client.send("ZSCORE z m").unwrap(), Response::Float(2.5));
    }

    // Replaying did not log the records a second time
    assert_eq!(std::fs::read_to_string(&path).unwrap(), logged);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_aof_is_flushed_while_running() {
    let path = temp_path();
    let server = TestServer::start(aof_config(&path));
    let mut client = server.client();
    client.send("SET k v").unwrap();

    assert!(wait_for(|| {
        std::fs::read_to_string(&path).map_or(false, |contents| contents == "SET k v\n")
    }));

    drop(client);
    drop(server);
    std::fs::remove_file(&path).ok();
}
