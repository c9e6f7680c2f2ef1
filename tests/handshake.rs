//! Reboot Handshake tests.

mod common;

use mu_link::config::SerialConfig;
use mu_link::handshake::{reboot, reboot_and_prompt, IMPORT_MACHINE, MACHINE_RESET};
use mu_link::mode::STUDUINOBIT_READY;
use mu_link::port::MockSerialPort;
use mu_link::protocol::{self, CTRL_A, CTRL_C, CTRL_D};
use mu_link::{HandshakeStep, LinkError, SerialSession};
use pretty_assertions::assert_eq;

fn link(port: &MockSerialPort) -> SerialSession {
    let config = SerialConfig {
        settle_delay_ms: 0,
        ..SerialConfig::default()
    };
    SerialSession::from_adapter(Box::new(port.clone()), &config)
}

#[test]
fn test_reboot_and_prompt_leaves_board_at_prompt() {
    let mut port = MockSerialPort::new("ttyACM0");
    common::expect_reboot(&mut port);
    common::expect_interrupt(&mut port);
    let mut link = link(&port);

    reboot_and_prompt(&mut link, STUDUINOBIT_READY).unwrap();

    assert_eq!(port.pending_replies(), 0);
    assert_eq!(port.available_bytes(), 0);
    assert_eq!(port.get_write_log().last(), Some(&vec![CTRL_C]));

    // The session is usable for the next batch.
    port.reply_to(b"print(7)", b"7\r\n>>> ");
    let result = protocol::execute(&mut link, &["print(7)"]).unwrap();
    assert_eq!(result.stdout_text(), "7\r\n");
}

#[test]
fn test_missing_ready_marker_times_out_and_stops() {
    let mut port = MockSerialPort::new("ttyACM0");
    port.reply_to(&[CTRL_C], common::PROMPT_REPLY);
    port.reply_to(&[CTRL_D], b"rst:0xc (SW_CPU_RESET)\r\nGuru Meditation Error\r\n");
    let mut link = link(&port);

    let err = reboot_and_prompt(&mut link, STUDUINOBIT_READY).unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(
        err,
        LinkError::Reboot {
            step: HandshakeStep::AwaitReady,
            ..
        }
    ));
    assert_eq!(
        port.get_write_log(),
        vec![
            vec![CTRL_C],
            vec![CTRL_A],
            IMPORT_MACHINE.to_vec(),
            MACHINE_RESET.to_vec(),
            vec![CTRL_D],
        ]
    );
    assert!(link.is_open());
}

#[test]
fn test_reboot_waits_for_the_marker() {
    let mut port = MockSerialPort::new("ttyACM0");
    common::expect_reboot(&mut port);
    let mut link = link(&port);

    reboot(&mut link, STUDUINOBIT_READY).unwrap();
    assert_eq!(port.pending_replies(), 0);
}
