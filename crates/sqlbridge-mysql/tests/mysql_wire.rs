//! Wire-level tests against a scripted in-process server.
//!
//! Each test binds a localhost listener, plays the server side of the
//! exchange with canned packets, and asserts on what `MySqlConnection`
//! does. No real MySQL server is involved.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use sqlbridge_core::{ConnectionParams, Value};
use sqlbridge_mysql::MySqlConnection;
use sqlbridge_mysql::auth::native_password_response;

const SCRAMBLE: [u8; 20] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20];

const MAX_PACKET: usize = 0xFF_FF_FF;

// ==================== Server Scripting Helpers ====================

fn spawn_server<F>(script: F) -> (u16, thread::JoinHandle<()>)
where
    F: FnOnce(&mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        script(&mut stream);
        // Consume whatever the client still sends (COM_QUIT, close).
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink);
    });
    (port, handle)
}

fn test_params(port: u16) -> ConnectionParams {
    ConnectionParams::mysql_defaults()
        .host("127.0.0.1")
        .port(port)
        .database("demo")
        .user("alice")
        .password("secret")
}

fn send_packet(stream: &mut TcpStream, sequence: u8, payload: &[u8]) {
    let len = payload.len();
    let header = [
        (len & 0xFF) as u8,
        ((len >> 8) & 0xFF) as u8,
        ((len >> 16) & 0xFF) as u8,
        sequence,
    ];
    stream.write_all(&header).unwrap();
    stream.write_all(payload).unwrap();
}

fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).unwrap();
    let len =
        usize::from(header[0]) | (usize::from(header[1]) << 8) | (usize::from(header[2]) << 16);
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).unwrap();
    (header[3], payload)
}

/// Read a logical payload, joining continuation packets.
fn read_full_payload(stream: &mut TcpStream) -> Vec<u8> {
    let (_, mut payload) = read_packet(stream);
    let mut last = payload.len();
    while last == MAX_PACKET {
        let (_, next) = read_packet(stream);
        last = next.len();
        payload.extend_from_slice(&next);
    }
    payload
}

/// Send a logical payload, splitting at the packet cap.
fn send_full_payload(stream: &mut TcpStream, first_sequence: u8, payload: &[u8]) {
    let mut sequence = first_sequence;
    let mut offset = 0;
    loop {
        let end = usize::min(offset + MAX_PACKET, payload.len());
        send_packet(stream, sequence, &payload[offset..end]);
        sequence = sequence.wrapping_add(1);
        let sent = end - offset;
        offset = end;
        if sent < MAX_PACKET {
            break;
        }
    }
}

fn handshake_v10(plugin: &[u8]) -> Vec<u8> {
    let mut p = vec![10];
    p.extend_from_slice(b"8.4.0\0");
    p.extend_from_slice(&99u32.to_le_bytes());
    p.extend_from_slice(&SCRAMBLE[..8]);
    p.push(0);
    // Lower capability bits: long-password, connect-with-db, protocol-41,
    // secure-connection. Upper bits: plugin-auth.
    p.extend_from_slice(&[0x09, 0x82]);
    p.push(33);
    p.extend_from_slice(&2u16.to_le_bytes());
    p.extend_from_slice(&[0x08, 0x00]);
    p.push(21);
    p.extend_from_slice(&[0u8; 10]);
    p.extend_from_slice(&SCRAMBLE[8..]);
    p.push(0);
    p.extend_from_slice(plugin);
    p
}

fn ok_packet(affected_rows: u8) -> Vec<u8> {
    vec![0x00, affected_rows, 0x00, 0x02, 0x00, 0x00, 0x00]
}

fn err_packet(code: u16, sql_state: Option<&str>, message: &str) -> Vec<u8> {
    let mut p = vec![0xFF];
    p.extend_from_slice(&code.to_le_bytes());
    if let Some(state) = sql_state {
        p.push(b'#');
        p.extend_from_slice(state.as_bytes());
    }
    p.extend_from_slice(message.as_bytes());
    p
}

fn eof_packet() -> Vec<u8> {
    vec![0xFE, 0x00, 0x00, 0x02, 0x00]
}

fn column_def(name: &str) -> Vec<u8> {
    let mut p = Vec::new();
    for s in ["def", "demo", "t", "t", name, name] {
        p.push(u8::try_from(s.len()).unwrap());
        p.extend_from_slice(s.as_bytes());
    }
    // Fixed-length tail: charset, column length, type, flags, decimals.
    p.extend_from_slice(&[0x0C, 33, 0, 0, 0, 0, 0, 253, 0, 0, 0, 0, 0]);
    p
}

fn lenenc_push(p: &mut Vec<u8>, n: usize) {
    if n < 0xFB {
        p.push(n as u8);
    } else if n <= 0xFFFF {
        p.push(0xFC);
        p.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= MAX_PACKET {
        p.push(0xFD);
        p.extend_from_slice(&(n as u32).to_le_bytes()[..3]);
    } else {
        p.push(0xFE);
        p.extend_from_slice(&(n as u64).to_le_bytes());
    }
}

fn text_row(cells: &[Option<&str>]) -> Vec<u8> {
    let mut p = Vec::new();
    for cell in cells {
        match cell {
            Some(text) => {
                lenenc_push(&mut p, text.len());
                p.extend_from_slice(text.as_bytes());
            }
            None => p.push(0xFB),
        }
    }
    p
}

/// Parsed client HandshakeResponse41 for assertions.
struct HandshakeResponse {
    caps: u32,
    max_packet: u32,
    charset: u8,
    user: String,
    auth: Vec<u8>,
    database: String,
    plugin: String,
}

fn read_cstr(payload: &[u8], pos: &mut usize) -> String {
    let start = *pos;
    let end = start + payload[start..].iter().position(|&b| b == 0).unwrap();
    *pos = end + 1;
    String::from_utf8_lossy(&payload[start..end]).into_owned()
}

fn parse_handshake_response(payload: &[u8]) -> HandshakeResponse {
    let caps = u32::from_le_bytes(payload[0..4].try_into().unwrap());
    let max_packet = u32::from_le_bytes(payload[4..8].try_into().unwrap());
    let charset = payload[8];
    assert!(payload[9..32].iter().all(|&b| b == 0), "filler must be 23 zero bytes");
    let mut pos = 32;
    let user = read_cstr(payload, &mut pos);
    let auth_len = usize::from(payload[pos]);
    pos += 1;
    let auth = payload[pos..pos + auth_len].to_vec();
    pos += auth_len;
    let database = read_cstr(payload, &mut pos);
    let plugin = read_cstr(payload, &mut pos);
    HandshakeResponse {
        caps,
        max_packet,
        charset,
        user,
        auth,
        database,
        plugin,
    }
}

/// Handshake and accept whatever credentials arrive.
fn serve_auth(stream: &mut TcpStream) {
    send_packet(stream, 0, &handshake_v10(b"mysql_native_password\0"));
    let (sequence, _) = read_packet(stream);
    assert_eq!(sequence, 1);
    send_packet(stream, 2, &ok_packet(0));
}

// ==================== Tests ====================

#[test]
fn test_native_auth_and_select_round_trip() {
    let (port, handle) = spawn_server(|stream| {
        send_packet(stream, 0, &handshake_v10(b"mysql_native_password\0"));

        let (sequence, payload) = read_packet(stream);
        assert_eq!(sequence, 1);
        let response = parse_handshake_response(&payload);
        assert_eq!(response.caps, 0x0008_8209);
        assert_eq!(response.max_packet, 0x0100_0000);
        assert_eq!(response.charset, 33);
        assert_eq!(response.user, "alice");
        assert_eq!(response.auth, native_password_response("secret", &SCRAMBLE));
        assert_eq!(response.database, "demo");
        assert_eq!(response.plugin, "mysql_native_password");
        send_packet(stream, 2, &ok_packet(0));

        let (sequence, query) = read_packet(stream);
        assert_eq!(sequence, 0);
        assert_eq!(query[0], 0x03);
        assert_eq!(&query[1..], b"SELECT id, name FROM users");

        send_packet(stream, 1, &[2]);
        send_packet(stream, 2, &column_def("id"));
        send_packet(stream, 3, &column_def("name"));
        send_packet(stream, 4, &eof_packet());
        send_packet(stream, 5, &text_row(&[Some("1"), Some("Alice")]));
        send_packet(stream, 6, &text_row(&[Some("2"), None]));
        send_packet(stream, 7, &eof_packet());
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();
    assert!(conn.is_open());
    assert_eq!(conn.server_version(), "8.4.0");
    assert_eq!(conn.connection_id(), 99);

    let rs = conn.execute("SELECT id, name FROM users").unwrap();
    assert_eq!(rs.column_names(), &["id".to_string(), "name".to_string()]);
    assert_eq!(rs.len(), 2);

    let first = rs.get(0).unwrap();
    assert_eq!(first.get_named::<i64>("id").unwrap(), 1);
    assert_eq!(first.get_by_name("name"), Some(&Value::Text("Alice".into())));
    let second = rs.get(1).unwrap();
    assert_eq!(second.get_by_name("name"), Some(&Value::Null));

    conn.close();
    conn.close();
    handle.join().unwrap();
}

#[test]
fn test_empty_password_sends_empty_auth_response() {
    let (port, handle) = spawn_server(|stream| {
        send_packet(stream, 0, &handshake_v10(b"mysql_native_password\0"));
        let (_, payload) = read_packet(stream);
        let response = parse_handshake_response(&payload);
        assert!(response.auth.is_empty());
        send_packet(stream, 2, &ok_packet(0));
    });

    let conn = MySqlConnection::connect(test_params(port).password("")).unwrap();
    assert!(conn.is_open());
    drop(conn);
    handle.join().unwrap();
}

#[test]
fn test_unsupported_plugin_is_fallback_eligible() {
    let (port, handle) = spawn_server(|stream| {
        send_packet(stream, 0, &handshake_v10(b"caching_sha2_password\0"));
    });

    let err = MySqlConnection::connect(test_params(port)).unwrap_err();
    assert!(err.is_fallback_eligible());
    assert!(err.to_string().contains("caching_sha2_password"));
    handle.join().unwrap();
}

#[test]
fn test_rejected_credentials_are_terminal() {
    let (port, handle) = spawn_server(|stream| {
        send_packet(stream, 0, &handshake_v10(b"mysql_native_password\0"));
        let _ = read_packet(stream);
        send_packet(
            stream,
            2,
            &err_packet(1045, Some("28000"), "Access denied for user 'alice'@'localhost'"),
        );
    });

    let err = MySqlConnection::connect(test_params(port)).unwrap_err();
    assert!(!err.is_fallback_eligible());
    assert!(err.to_string().contains("Access denied for user 'alice'@'localhost'"));
    assert!(err.to_string().contains("1045"));
    handle.join().unwrap();
}

#[test]
fn test_auth_switch_is_fallback_eligible() {
    let (port, handle) = spawn_server(|stream| {
        send_packet(stream, 0, &handshake_v10(b"mysql_native_password\0"));
        let _ = read_packet(stream);
        // AuthSwitchRequest: 0xFE, plugin name, fresh auth data.
        let mut switch = vec![0xFE];
        switch.extend_from_slice(b"mysql_old_password\0");
        switch.extend_from_slice(&[9, 9, 9, 9, 9, 9, 9, 9]);
        send_packet(stream, 2, &switch);
    });

    let err = MySqlConnection::connect(test_params(port)).unwrap_err();
    assert!(err.is_fallback_eligible());
    assert!(err.to_string().contains("0xFE"));
    handle.join().unwrap();
}

#[test]
fn test_query_error_is_verbatim_and_session_survives() {
    let (port, handle) = spawn_server(|stream| {
        serve_auth(stream);

        let (_, query) = read_packet(stream);
        assert_eq!(&query[1..], b"SELECT * FROM missing");
        send_packet(
            stream,
            1,
            &err_packet(1146, Some("42S02"), "Table 'demo.missing' doesn't exist"),
        );

        // The session must survive: the next packet is a fresh statement,
        // not a retry of the failed one.
        let (sequence, query) = read_packet(stream);
        assert_eq!(sequence, 0);
        assert_eq!(&query[1..], b"SELECT 1");
        send_packet(stream, 1, &[1]);
        send_packet(stream, 2, &column_def("1"));
        send_packet(stream, 3, &eof_packet());
        send_packet(stream, 4, &text_row(&[Some("1")]));
        send_packet(stream, 5, &eof_packet());
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();

    let err = conn.execute("SELECT * FROM missing").unwrap_err();
    assert!(!err.is_fallback_eligible());
    assert_eq!(err.code(), Some("1146"));
    assert_eq!(err.sql(), Some("SELECT * FROM missing"));
    assert!(err.to_string().contains("Table 'demo.missing' doesn't exist"));

    let rs = conn.execute("SELECT 1").unwrap();
    assert_eq!(rs.len(), 1);
    drop(conn);
    handle.join().unwrap();
}

#[test]
fn test_error_packet_without_sql_state_marker() {
    let (port, handle) = spawn_server(|stream| {
        serve_auth(stream);
        let _ = read_packet(stream);
        send_packet(stream, 1, &err_packet(1064, None, "You have an error in your SQL syntax"));
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();
    let err = conn.execute("SELEC 1").unwrap_err();
    assert_eq!(err.code(), Some("1064"));
    assert!(err.to_string().contains("You have an error in your SQL syntax"));
    drop(conn);
    handle.join().unwrap();
}

#[test]
fn test_dml_reports_no_result_set() {
    let (port, handle) = spawn_server(|stream| {
        serve_auth(stream);
        let _ = read_packet(stream);
        send_packet(stream, 1, &ok_packet(3));
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();
    let rs = conn.execute("DELETE FROM users WHERE age > 90").unwrap();
    assert!(rs.is_empty());
    assert!(rs.column_names().is_empty());
    drop(conn);
    handle.join().unwrap();
}

#[test]
fn test_long_cell_uses_two_byte_length() {
    let long_value = "x".repeat(300);
    let expected = long_value.clone();
    let (port, handle) = spawn_server(move |stream| {
        serve_auth(stream);
        let _ = read_packet(stream);
        send_packet(stream, 1, &[1]);
        send_packet(stream, 2, &column_def("v"));
        send_packet(stream, 3, &eof_packet());
        let row = text_row(&[Some(&long_value)]);
        assert_eq!(row[0], 0xFC);
        send_packet(stream, 4, &row);
        send_packet(stream, 5, &eof_packet());
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();
    let rs = conn.execute("SELECT v FROM t").unwrap();
    assert_eq!(rs.get(0).unwrap().get_named::<String>("v").unwrap(), expected);
    drop(conn);
    handle.join().unwrap();
}

#[test]
fn test_local_infile_request_is_rejected() {
    let (port, handle) = spawn_server(|stream| {
        serve_auth(stream);
        let _ = read_packet(stream);
        let mut infile = vec![0xFB];
        infile.extend_from_slice(b"/etc/passwd");
        send_packet(stream, 1, &infile);
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();
    let err = conn.execute("LOAD DATA LOCAL INFILE ...").unwrap_err();
    assert!(err.to_string().contains("column count"));
    drop(conn);
    handle.join().unwrap();
}

#[test]
fn test_ping_round_trip() {
    let (port, handle) = spawn_server(|stream| {
        serve_auth(stream);
        let (sequence, payload) = read_packet(stream);
        assert_eq!(sequence, 0);
        assert_eq!(payload, [0x0E]);
        send_packet(stream, 1, &ok_packet(0));
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();
    conn.ping().unwrap();
    drop(conn);
    handle.join().unwrap();
}

#[test]
fn test_quit_sent_on_close() {
    let (port, handle) = spawn_server(|stream| {
        serve_auth(stream);
        let (sequence, payload) = read_packet(stream);
        assert_eq!(sequence, 0);
        assert_eq!(payload, [0x01]);
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();
    conn.close();
    assert!(!conn.is_open());
    handle.join().unwrap();
}

#[test]
fn test_payload_continuation_round_trip() {
    // Both directions: a statement above the packet cap goes out split,
    // and a row above the cap comes back split.
    let cell_len = MAX_PACKET + 500;
    let sql = format!("SELECT '{}'", "x".repeat(MAX_PACKET + 10));
    let expected_query_len = 1 + sql.len();

    let (port, handle) = spawn_server(move |stream| {
        serve_auth(stream);

        let query = read_full_payload(stream);
        assert_eq!(query.len(), expected_query_len);
        assert_eq!(query[0], 0x03);

        send_packet(stream, 1, &[1]);
        send_packet(stream, 2, &column_def("v"));
        send_packet(stream, 3, &eof_packet());

        let mut row = Vec::with_capacity(cell_len + 9);
        lenenc_push(&mut row, cell_len);
        row.resize(row.len() + cell_len, b'y');
        send_full_payload(stream, 4, &row);

        send_packet(stream, 6, &eof_packet());
    });

    let mut conn = MySqlConnection::connect(test_params(port)).unwrap();
    let rs = conn.execute(&sql).unwrap();
    assert_eq!(rs.len(), 1);
    let value = rs.get(0).unwrap().get_named::<String>("v").unwrap();
    assert_eq!(value.len(), cell_len);
    assert!(value.bytes().all(|b| b == b'y'));
    drop(conn);
    handle.join().unwrap();
}
