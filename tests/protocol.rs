//! Line Protocol Engine tests against a scripted board.

mod common;

use mu_link::config::SerialConfig;
use mu_link::port::MockSerialPort;
use mu_link::protocol::{self, read_until, PROMPT};
use mu_link::{LinkError, SerialSession};
use memchr::memmem;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::Duration;

fn link(port: &MockSerialPort) -> SerialSession {
    let config = SerialConfig {
        settle_delay_ms: 0,
        ..SerialConfig::default()
    };
    SerialSession::from_adapter(Box::new(port.clone()), &config)
}

proptest! {
    #[test]
    fn read_until_returns_once_token_arrives(
        noise in prop::collection::vec(0u8..0x3e, 0..600),
        tail in prop::collection::vec(0u8..0x3e, 0..20),
    ) {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(&noise);
        port.enqueue_read(PROMPT);
        port.enqueue_read(&tail);
        let mut link = link(&port);

        let buffer = read_until(&mut link, PROMPT, Duration::from_millis(10)).unwrap();
        prop_assert!(memmem::find(&buffer, PROMPT).is_some());
    }

    #[test]
    fn read_until_times_out_without_token(noise in prop::collection::vec(0u8..0x3e, 0..2000)) {
        let mut port = MockSerialPort::new("MOCK0");
        port.enqueue_read(&noise);
        let mut link = link(&port);

        let err = read_until(&mut link, PROMPT, Duration::from_millis(10)).unwrap_err();
        prop_assert!(err.is_timeout());
    }
}

#[test]
fn test_print_one_plus_one() {
    let mut port = MockSerialPort::new("MOCK0");
    port.reply_to(b"print(1+1)", b"2\n>>> ");
    let mut link = link(&port);

    let result = protocol::execute(&mut link, &["print(1+1)"]).unwrap();

    assert!(result.stdout_text().contains('2'));
    assert!(!result.is_error());
    assert_eq!(port.written(), b"print(1+1)\r\n".to_vec());
}

#[test]
fn test_error_marker_flags_result() {
    let mut port = MockSerialPort::new("MOCK0");
    port.reply_to(b"import bad", b"import bad\r\nError: bad import\r\n>>> ");
    let mut link = link(&port);

    let result = protocol::execute(&mut link, &["import bad"]).unwrap();

    assert!(result.is_error());
    match result.into_result() {
        Err(LinkError::Protocol { output }) => assert!(output.contains("bad import")),
        other => panic!("expected protocol error, got {:?}", other),
    }
}

#[test]
fn test_raw_reply_streams_are_separated() {
    let mut port = MockSerialPort::new("MOCK0");
    common::expect_raw(
        &mut port,
        &[
            common::raw_ok(b"hello\r\n"),
            common::raw_err(
                b"Traceback (most recent call last):\r\nZeroDivisionError: divide by zero\r\n",
            ),
        ],
    );
    let mut link = link(&port);

    let result = protocol::execute_raw(&mut link, &["print('hello')", "1/0"]).unwrap();

    assert_eq!(result.stdout_text(), "hello\r\n");
    assert!(result.stderr_text().contains("ZeroDivisionError"));
    assert!(result.is_error());
}

#[test]
fn test_silent_board_times_out() {
    let port = MockSerialPort::new("MOCK0");
    let mut link = link(&port);

    let err = protocol::execute(&mut link, &["print(1)"]).unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_function_definition_then_call() {
    let mut port = MockSerialPort::new("MOCK0");
    port.reply_to(b"def twice(n):", b"def twice(n):\r\n... ");
    port.reply_to(b"return", b"    return n * 2\r\n... ");
    port.reply_to(b"\r\n", b"\r\n>>> ");
    port.reply_to(b"print(twice(21))", b"print(twice(21))\r\n42\r\n>>> ");
    let mut link = link(&port);

    let lines = ["def twice(n):", "    return n * 2", "", "print(twice(21))"];
    let result = protocol::execute(&mut link, &lines).unwrap();

    assert_eq!(result.stdout_text(), "42\r\n");
    assert!(!result.is_error());
    assert_eq!(port.pending_replies(), 0);
}
