use std::fs;
use std::io::{ErrorKind, Read};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use brick::{Control, LimitsConfig, Server, ServerConfig, Transport};

/// Size of `big.bin` in [`docroot`]
pub(crate) const BIG_LEN: usize = 100_000;

/// Byte `i` of a generated body file
pub(crate) fn body_byte(i: usize) -> u8 {
    (i % 251) as u8
}

/// Writes `len` generated bytes to `path`.
pub(crate) fn write_body(path: &Path, len: usize) {
    fs::write(path, (0..len).map(body_byte).collect::<Vec<_>>()).unwrap();
}

/// Creates a temporary document root:
///
/// - `hello.txt`: `hello world`
/// - `docs/index.html`
/// - `bare/`: directory without index
/// - `big.bin`: [`BIG_LEN`] generated bytes
pub(crate) fn docroot() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/index.html"), "<h1>docs</h1>\n").unwrap();
    fs::create_dir(dir.path().join("bare")).unwrap();
    write_body(&dir.path().join("big.bin"), BIG_LEN);
    dir
}

/// Server running on a background thread, shut down on drop
pub(crate) struct TestServer {
    pub(crate) addr: SocketAddr,
    pub(crate) control: Control,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl TestServer {
    /// Stops the server and returns what [`Server::run`] returned.
    pub(crate) fn shutdown(mut self) -> std::io::Result<()> {
        self.control.request_shutdown();
        self.handle.take().unwrap().join().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.control.request_shutdown();
            let _ = handle.join();
        }
    }
}

/// Starts `server` on a background thread.
pub(crate) fn spawn<T>(server: Server<T>) -> TestServer
where
    T: Transport + Send + 'static,
    T::Session: Send,
{
    let addr = server.local_addr().unwrap();
    let control = server.control();
    let handle = thread::spawn(move || server.run());
    TestServer {
        addr,
        control,
        handle: Some(handle),
    }
}

/// Starts a plaintext server serving `root` with the given table size.
pub(crate) fn serve(root: &Path, max_conns: usize) -> TestServer {
    spawn(
        Server::http(&ServerConfig {
            root: root.to_owned(),
            limits: LimitsConfig {
                max_conns,
                ..LimitsConfig::default()
            },
            ..ServerConfig::default()
        })
        .unwrap(),
    )
}

/// Creates a [`TcpStream`] client connected to `addr` with a 10s timeout
pub(crate) fn create_client(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_nodelay(true).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    stream
        .set_write_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    stream
}

/// Creates a client bound to the local address `from` before connecting.
#[cfg(target_os = "linux")]
pub(crate) fn create_client_from(from: IpAddr, addr: SocketAddr) -> TcpStream {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        None,
    )
    .unwrap();
    socket.bind(&SocketAddr::new(from, 0).into()).unwrap();
    socket.connect(&addr.into()).unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    socket.into()
}

/// Reads one response: the head up to the blank line and a body of
/// `Content-Length` bytes.
pub(crate) fn read_response<R: Read>(stream: &mut R) -> (String, Vec<u8>) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).unwrap();
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();

    let len: usize = header(&head, "Content-Length").unwrap().parse().unwrap();
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).unwrap();
    (head, body)
}

/// Value of header `name` in `head`
pub(crate) fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.split("\r\n")
        .find_map(|line| line.strip_prefix(name)?.strip_prefix(": "))
}

/// Reads until the peer closes and returns everything read. A reset
/// counts as close.
pub(crate) fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return data,
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) if err.kind() == ErrorKind::ConnectionReset => return data,
            Err(err) => panic!("connection not closed: {err}"),
        }
    }
}

/// Gives the server loop time to handle what was just sent.
pub(crate) fn settle() {
    thread::sleep(Duration::from_millis(150));
}
