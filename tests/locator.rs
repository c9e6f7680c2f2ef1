//! Device Locator tests: first-match selection and path normalisation.

mod common;

use mu_link::discovery::{
    find_device, BoardDescriptor, FixedPortScanner, Platform, PortInfo, MICROPYTHON_BOARDS,
    STUDUINOBIT_BOARDS,
};
use mu_link::LinkError;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn table() -> Vec<BoardDescriptor> {
    vec![
        BoardDescriptor {
            vendor_id: 0x20A0,
            product_id: Some(0x4269),
            name: "studuino",
        },
        BoardDescriptor {
            vendor_id: 0x303A,
            product_id: None,
            name: "any espressif",
        },
    ]
}

fn port_strategy() -> impl Strategy<Value = PortInfo> {
    (
        prop::sample::select(vec![0x20A0u16, 0x303A, 0x10C4, 0]),
        prop::sample::select(vec![0x4269u16, 0x1001, 0xEA60, 0]),
        0u8..8,
    )
        .prop_map(|(vid, pid, n)| PortInfo::usb(format!("ttyACM{}", n), vid, pid))
}

proptest! {
    #[test]
    fn finds_first_matching_port(ports in prop::collection::vec(port_strategy(), 0..8)) {
        let boards = table();
        let scanner = FixedPortScanner::new(ports.clone());

        let expected = ports.iter().find(|p| {
            (p.vid == 0x20A0 && p.pid == 0x4269) || p.vid == 0x303A
        });
        let found = find_device(&boards, &scanner, Platform::Posix, false).unwrap();

        match expected {
            Some(port) => {
                let handle = found.expect("a matching port should be found");
                prop_assert_eq!(handle.port_path, format!("/dev/{}", port.port_name));
            }
            None => prop_assert!(found.is_none()),
        }
    }
}

#[test]
fn test_studuinobit_on_posix() {
    let scanner = FixedPortScanner::new(vec![common::studuinobit_port()]);

    let handle = find_device(STUDUINOBIT_BOARDS, &scanner, Platform::Posix, true)
        .unwrap()
        .unwrap();

    assert_eq!(handle.port_path, "/dev/ttyACM0");
}

#[test]
fn test_windows_names_pass_through() {
    let scanner = FixedPortScanner::new(vec![PortInfo::usb("COM7", 0x0D28, 0x0204)]);

    let handle = find_device(MICROPYTHON_BOARDS, &scanner, Platform::Windows, false)
        .unwrap()
        .unwrap();

    assert_eq!(handle.port_path, "COM7");
}

#[test]
fn test_absence_is_not_an_error() {
    let scanner = FixedPortScanner::new(vec![PortInfo::usb("ttyUSB0", 0x10C4, 0xEA60)]);
    assert!(find_device(STUDUINOBIT_BOARDS, &scanner, Platform::Posix, true)
        .unwrap()
        .is_none());
}

#[test]
fn test_other_platforms_are_rejected() {
    let scanner = FixedPortScanner::new(vec![common::studuinobit_port()]);
    assert!(matches!(
        find_device(STUDUINOBIT_BOARDS, &scanner, Platform::Other("haiku"), false),
        Err(LinkError::UnsupportedPlatform(_))
    ));
}
