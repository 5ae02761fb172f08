//! Sentinel Query Client
//!
//! Connects to one sentinel and runs SENTINEL subcommands against it.
//! Transport failures of any kind surface as `Error::SentinelConnection`;
//! retrying is the orchestrator's job, never the client's.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::BytesMut;

use crate::config::{DiscoveryConfig, SentinelEndpoint};
use crate::error::{Error, Result};
use crate::protocol::{Parser, RespValue, SentinelCommand, encode_command};

/// Read chunk size
const READ_CHUNK_SIZE: usize = 4096;

/// Opens connections to sentinels
pub trait SentinelConnector {
    type Connection: SentinelConnection;

    fn connect(&self, endpoint: &SentinelEndpoint) -> Result<Self::Connection>;
}

/// An established connection to a single sentinel
pub trait SentinelConnection {
    /// Send one command and return its raw reply
    fn query(&mut self, command: &SentinelCommand) -> Result<RespValue>;
}

/// Blocking TCP connector with connect/read/write timeouts
#[derive(Debug, Clone)]
pub struct TcpSentinelConnector {
    connect_timeout: Duration,
    read_timeout: Duration,
    auth_user: Option<String>,
    auth_pass: Option<String>,
}

impl TcpSentinelConnector {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            auth_user: None,
            auth_pass: None,
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        let mut connector = Self::new(
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.read_timeout_ms),
        );
        if let Some(pass) = &config.sentinel_pass {
            connector = connector.with_auth(config.sentinel_user.clone(), pass.clone());
        }
        connector
    }

    pub fn with_auth(mut self, user: Option<String>, pass: String) -> Self {
        self.auth_user = user;
        self.auth_pass = Some(pass);
        self
    }

    fn open_stream(&self, endpoint: &SentinelEndpoint) -> Result<TcpStream> {
        let addrs = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| Error::connection(endpoint, format!("resolve failed: {}", e)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) if e.kind() == ErrorKind::TimedOut => {
                Error::connection(endpoint, "connect timeout")
            }
            Some(e) => Error::connection(endpoint, e),
            None => Error::connection(endpoint, "no addresses resolved"),
        })
    }

    fn authenticate(&self, conn: &mut TcpSentinelConnection) -> Result<()> {
        let Some(pass) = &self.auth_pass else {
            return Ok(());
        };

        let request = match &self.auth_user {
            Some(user) => encode_command(&["AUTH", user, pass]),
            None => encode_command(&["AUTH", pass]),
        };

        match conn.roundtrip(&request)? {
            RespValue::SimpleString(_) => Ok(()),
            RespValue::Error(e) => Err(Error::connection(
                &conn.endpoint,
                format!("authentication rejected: {}", String::from_utf8_lossy(&e)),
            )),
            other => Err(Error::connection(
                &conn.endpoint,
                format!("unexpected authentication reply ({})", other.kind()),
            )),
        }
    }
}

impl Default for TcpSentinelConnector {
    fn default() -> Self {
        Self::from_config(&DiscoveryConfig::default())
    }
}

impl SentinelConnector for TcpSentinelConnector {
    type Connection = TcpSentinelConnection;

    fn connect(&self, endpoint: &SentinelEndpoint) -> Result<TcpSentinelConnection> {
        let stream = self.open_stream(endpoint)?;

        let setup = stream
            .set_nodelay(true)
            .and_then(|_| stream.set_read_timeout(Some(self.read_timeout)))
            .and_then(|_| stream.set_write_timeout(Some(self.read_timeout)));
        if let Err(e) = setup {
            return Err(Error::connection(endpoint, e));
        }

        log::debug!("Connected to sentinel {}", endpoint);

        let mut conn = TcpSentinelConnection {
            endpoint: endpoint.clone(),
            stream,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
        };
        self.authenticate(&mut conn)?;
        Ok(conn)
    }
}

/// Blocking TCP connection to one sentinel
#[derive(Debug)]
pub struct TcpSentinelConnection {
    endpoint: SentinelEndpoint,
    stream: TcpStream,
    buf: BytesMut,
}

impl TcpSentinelConnection {
    pub fn endpoint(&self) -> &SentinelEndpoint {
        &self.endpoint
    }

    fn roundtrip(&mut self, request: &[u8]) -> Result<RespValue> {
        self.stream
            .write_all(request)
            .map_err(|e| self.io_error(e))?;
        self.read_reply()
    }

    /// Read until one complete reply is buffered
    fn read_reply(&mut self) -> Result<RespValue> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(value) = Parser::parse(&mut self.buf)? {
                return Ok(value);
            }

            let n = self.stream.read(&mut chunk).map_err(|e| self.io_error(e))?;
            if n == 0 {
                return Err(Error::connection(&self.endpoint, "connection closed"));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn io_error(&self, e: std::io::Error) -> Error {
        match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                Error::connection(&self.endpoint, "read timeout")
            }
            _ => Error::connection(&self.endpoint, e),
        }
    }
}

impl SentinelConnection for TcpSentinelConnection {
    fn query(&mut self, command: &SentinelCommand) -> Result<RespValue> {
        log::debug!("{} -> {}", self.endpoint, command);
        self.roundtrip(&command.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn connector() -> TcpSentinelConnector {
        TcpSentinelConnector::new(Duration::from_millis(500), Duration::from_millis(500))
    }

    /// Serve one connection: for each (request, reply) pair, expect the exact
    /// request bytes and answer with the raw reply bytes.
    fn serve(script: Vec<(Vec<u8>, Vec<u8>)>) -> (SentinelEndpoint, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            for (request, reply) in script {
                let mut received = vec![0u8; request.len()];
                socket.read_exact(&mut received).unwrap();
                assert_eq!(received, request);
                socket.write_all(&reply).unwrap();
            }
        });

        (SentinelEndpoint::new("127.0.0.1", port), handle)
    }

    #[test]
    fn test_query_master_addr() {
        let cmd = SentinelCommand::get_master_addr_by_name("mymaster");
        let reply = RespValue::array(vec![
            RespValue::bulk_string("10.0.0.1"),
            RespValue::bulk_string("6379"),
        ]);
        let (endpoint, server) = serve(vec![(cmd.encode().to_vec(), reply.serialize().to_vec())]);

        let mut conn = connector().connect(&endpoint).unwrap();
        assert_eq!(conn.query(&cmd).unwrap(), reply);
        server.join().unwrap();
    }

    #[test]
    fn test_reply_split_across_reads() {
        let cmd = SentinelCommand::slaves("mymaster");
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = SentinelEndpoint::new("127.0.0.1", listener.local_addr().unwrap().port());
        let expected = cmd.encode().to_vec();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut received = vec![0u8; expected.len()];
            socket.read_exact(&mut received).unwrap();
            socket.write_all(b"*1\r\n*2\r\n$2\r\nip").unwrap();
            socket.flush().unwrap();
            thread::sleep(Duration::from_millis(20));
            socket.write_all(b"\r\n$8\r\n10.0.0.2\r\n").unwrap();
        });

        let mut conn = connector().connect(&endpoint).unwrap();
        let reply = conn.query(&cmd).unwrap();
        let record = reply.as_array().unwrap()[0].as_array().unwrap();
        assert_eq!(record[1], RespValue::bulk_string("10.0.0.2"));
        server.join().unwrap();
    }

    #[test]
    fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connector()
            .connect(&SentinelEndpoint::new("127.0.0.1", port))
            .unwrap_err();
        assert!(matches!(err, Error::SentinelConnection { .. }));
    }

    #[test]
    fn test_connection_dropped_mid_request() {
        let cmd = SentinelCommand::get_master_addr_by_name("mymaster");
        let (endpoint, server) = serve(vec![(cmd.encode().to_vec(), b"*2\r\n$8\r\n10.0".to_vec())]);

        let mut conn = connector().connect(&endpoint).unwrap();
        let err = conn.query(&cmd).unwrap_err();
        assert!(matches!(err, Error::SentinelConnection { .. }));
        server.join().unwrap();
    }

    #[test]
    fn test_garbage_reply_is_protocol_error() {
        let cmd = SentinelCommand::get_master_addr_by_name("mymaster");
        let (endpoint, server) = serve(vec![(cmd.encode().to_vec(), b"?what\r\n".to_vec())]);

        let mut conn = connector().connect(&endpoint).unwrap();
        let err = conn.query(&cmd).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        server.join().unwrap();
    }

    #[test]
    fn test_silent_sentinel_times_out() {
        let cmd = SentinelCommand::get_master_addr_by_name("mymaster");
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = SentinelEndpoint::new("127.0.0.1", listener.local_addr().unwrap().port());
        let expected = cmd.encode().to_vec();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut received = vec![0u8; expected.len()];
            socket.read_exact(&mut received).unwrap();
            // hold the socket open without answering until the client gives up
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest);
        });

        let mut conn = TcpSentinelConnector::new(Duration::from_millis(500), Duration::from_millis(50))
            .connect(&endpoint)
            .unwrap();
        match conn.query(&cmd).unwrap_err() {
            Error::SentinelConnection { message, .. } => assert_eq!(message, "read timeout"),
            other => panic!("expected connection error, got {:?}", other),
        }
        drop(conn);
        server.join().unwrap();
    }

    #[test]
    fn test_auth_sent_before_queries() {
        let auth = encode_command(&["AUTH", "secret"]).to_vec();
        let (endpoint, server) = serve(vec![(auth, b"+OK\r\n".to_vec())]);

        let conn = connector()
            .with_auth(None, "secret".to_string())
            .connect(&endpoint);
        assert!(conn.is_ok());
        server.join().unwrap();
    }

    #[test]
    fn test_auth_rejected_is_connection_error() {
        let auth = encode_command(&["AUTH", "admin", "wrong"]).to_vec();
        let (endpoint, server) = serve(vec![(auth, b"-WRONGPASS invalid username-password pair\r\n".to_vec())]);

        let err = connector()
            .with_auth(Some("admin".to_string()), "wrong".to_string())
            .connect(&endpoint)
            .unwrap_err();
        match err {
            Error::SentinelConnection { message, .. } => {
                assert!(message.starts_with("authentication rejected: WRONGPASS"));
                assert!(!message.contains("AUTH"));
            },
            other => panic!("expected connection error, got {:?}", other),
        }
        server.join().unwrap();
    }
}
