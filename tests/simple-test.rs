#![allow(unused_crate_dependencies)]

use std::io::Write;

use support::{body_byte, create_client, header, read_response, read_until_closed, BIG_LEN};

#[allow(dead_code)]
mod support;

#[test]
fn basic_handling() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut stream = create_client(server.addr);

    write!(
        stream,
        "GET /hello.txt HTTP/1.1\r\nHost: localhost\r\nUser-Agent: test\r\n\r\n"
    )
    .unwrap();

    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(header(&head, "Server"), Some("brick"));
    assert!(header(&head, "Date").unwrap().ends_with(" GMT"));
    assert_eq!(header(&head, "Content-Type"), Some("text/plain; charset=utf-8"));
    assert_eq!(header(&head, "Content-Length"), Some("11"));
    assert_eq!(body, b"hello world");
}

#[test]
fn sequential_requests_on_one_connection() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut stream = create_client(server.addr);

    for _ in 0..3 {
        write!(stream, "GET /hello.txt HTTP/1.1\r\n\r\n").unwrap();
        let (head, body) = read_response(&mut stream);
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert_eq!(body, b"hello world");
    }

    write!(stream, "GET /missing HTTP/1.1\r\n\r\n").unwrap();
    let (head, _) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 404 File Not Found\r\n"));

    write!(stream, "GET /hello.txt HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(read_response(&mut stream).1, b"hello world");
}

#[test]
fn request_split_across_writes() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut stream = create_client(server.addr);

    for part in ["GET /hel", "lo.txt HTTP/1.1\r\n", "Host: x\r\n", "\r\n"] {
        stream.write_all(part.as_bytes()).unwrap();
        stream.flush().unwrap();
        support::settle();
    }
    assert_eq!(read_response(&mut stream).1, b"hello world");
}

#[test]
fn missing_file_is_404() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut stream = create_client(server.addr);

    write!(stream, "GET /no/such/file.html HTTP/1.1\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 404 File Not Found\r\n"));
    assert_eq!(header(&head, "Content-Type"), Some("text/plain"));
    assert_eq!(body, b"404 File Not Found");
}

#[test]
fn dot_segments_are_400() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut stream = create_client(server.addr);

    for path in ["/../etc/passwd", "//docs/..//hello.txt", "/.hidden"] {
        write!(stream, "GET {path} HTTP/1.1\r\n\r\n").unwrap();
        let (head, body) = read_response(&mut stream);
        assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{path}");
        assert_eq!(body, b"400 Bad Request");
    }
}

#[test]
fn unsupported_requests_are_closed_silently() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);

    for request in [
        "POST /hello.txt HTTP/1.1\r\n\r\n",
        "GET /hello.txt HTTP/1.0\r\n\r\n",
        "GET /hello.txt\r\n\r\n",
        "GET  HTTP/1.1\r\n\r\n",
    ] {
        let mut stream = create_client(server.addr);
        stream.write_all(request.as_bytes()).unwrap();
        assert!(read_until_closed(&mut stream).is_empty(), "{request:?}");
    }

    // the server is still serving
    let mut stream = create_client(server.addr);
    write!(stream, "GET /hello.txt HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(read_response(&mut stream).1, b"hello world");
}

#[test]
fn oversized_request_is_closed() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut stream = create_client(server.addr);

    let filler = "x".repeat(4096);
    let _ = write!(stream, "GET /hello.txt HTTP/1.1\r\nX-Filler: {filler}\r\n\r\n");
    assert!(read_until_closed(&mut stream).is_empty());
}

#[test]
fn directory_serves_index() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut stream = create_client(server.addr);

    write!(stream, "GET /docs/ HTTP/1.1\r\n\r\n").unwrap();
    let (dir_head, dir_body) = read_response(&mut stream);
    write!(stream, "GET /docs/index.html HTTP/1.1\r\n\r\n").unwrap();
    let (direct_head, direct_body) = read_response(&mut stream);

    assert!(dir_head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(direct_head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(dir_body, direct_body);
    assert_eq!(header(&dir_head, "Content-Type"), Some("text/html;charset=UTF-8"));

    write!(stream, "GET /bare/ HTTP/1.1\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);
    assert!(head.starts_with("HTTP/1.1 404 File Not Found\r\n"));
    assert_eq!(body, b"404 File Not Found");
}

#[test]
fn file_larger_than_scratch_buffer() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut stream = create_client(server.addr);

    write!(stream, "GET /big.bin HTTP/1.1\r\n\r\n").unwrap();
    let (head, body) = read_response(&mut stream);
    assert_eq!(header(&head, "Content-Type"), Some("application/octet-stream"));
    assert_eq!(body.len(), BIG_LEN);
    assert!(body.iter().enumerate().all(|(i, &b)| b == body_byte(i)));
}

#[test]
fn many_clients_interleaved() {
    let root = support::docroot();
    let server = support::serve(root.path(), 64);

    let mut clients: Vec<_> = (0..20).map(|_| create_client(server.addr)).collect();
    for client in &mut clients {
        write!(client, "GET /big.bin HTTP/1.1\r\n\r\n").unwrap();
    }
    for client in &mut clients {
        let (_, body) = read_response(client);
        assert_eq!(body.len(), BIG_LEN);
    }
}

#[test]
fn shutdown_closes_connections() {
    let root = support::docroot();
    let server = support::serve(root.path(), 16);
    let mut idle = create_client(server.addr);
    let mut busy = create_client(server.addr);
    write!(busy, "GET /hello.txt HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(read_response(&mut busy).1, b"hello world");

    server.shutdown().unwrap();

    assert!(read_until_closed(&mut idle).is_empty());
    assert!(read_until_closed(&mut busy).is_empty());
}
