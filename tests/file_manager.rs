//! Async File Manager tests.

mod common;

use common::{expect_raw, next_event, oks, raw_err, raw_ok};
use mu_link::fs::{FileEntry, FileManager, FsEvent, Listing};
use mu_link::port::{MockPortOpener, MockSerialPort};
use pretty_assertions::assert_eq;
use std::sync::mpsc;
use std::sync::Arc;

fn start(port: &MockSerialPort, listing: Listing) -> (FileManager, mpsc::Receiver<FsEvent>) {
    let dir = tempfile::tempdir().unwrap();
    let config = common::test_config(dir.path()).serial;
    let (tx, rx) = mpsc::channel();
    let manager = FileManager::start(
        "/dev/ttyACM0",
        Arc::new(MockPortOpener::new(port.clone())),
        listing,
        &config,
        tx,
    );
    (manager, rx)
}

fn expect_ls(port: &mut MockSerialPort, listing: &[u8]) {
    expect_raw(port, &[raw_ok(b""), raw_ok(listing)]);
}

#[test]
fn test_get_missing_file_reports_failure_with_name() {
    let mut port = MockSerialPort::new("ttyACM0");
    expect_ls(&mut port, b"['main.py']\r\n");
    expect_raw(
        &mut port,
        &[raw_ok(b""), raw_ok(b""), raw_err(b"OSError: [Errno 2] ENOENT\r\n")],
    );
    let (mut manager, events) = start(&port, Listing::Flat);
    assert_eq!(
        next_event(&events),
        FsEvent::ListFiles(vec![FileEntry::file("main.py", None)])
    );

    let target = tempfile::tempdir().unwrap();
    let local = target.path().join("missing.py");
    manager.handle().get("missing.py", &local);

    assert_eq!(next_event(&events), FsEvent::GetFailed("missing.py".to_string()));
    assert!(!local.exists());
    assert!(events.try_recv().is_err());
    manager.stop();
}

#[test]
fn test_worker_survives_a_failed_request() {
    let mut port = MockSerialPort::new("ttyACM0");
    expect_ls(&mut port, b"['main.py', 'boot.py']\r\n");
    expect_raw(&mut port, &[raw_ok(b""), raw_err(b"OSError: [Errno 2] ENOENT\r\n")]);
    expect_raw(&mut port, &oks(2));
    let (mut manager, events) = start(&port, Listing::Flat);
    next_event(&events);

    let handle = manager.handle();
    handle.delete("nothere.py");
    handle.delete("boot.py");

    assert_eq!(next_event(&events), FsEvent::DeleteFailed("nothere.py".to_string()));
    assert_eq!(next_event(&events), FsEvent::DeletedFile("boot.py".to_string()));
    manager.stop();
}

#[test]
fn test_get_writes_local_copy() {
    let mut port = MockSerialPort::new("ttyACM0");
    expect_ls(&mut port, b"['main.py']\r\n");
    expect_raw(
        &mut port,
        &[
            raw_ok(b""),
            raw_ok(b""),
            raw_ok(b""),
            raw_ok(b""),
            raw_ok(b"7072696e74282268692229"),
            raw_ok(b""),
        ],
    );
    let (mut manager, events) = start(&port, Listing::Flat);
    next_event(&events);

    let target = tempfile::tempdir().unwrap();
    let local = target.path().join("main.py");
    manager.handle().get("main.py", &local);

    assert_eq!(next_event(&events), FsEvent::GotFile("main.py".to_string()));
    assert_eq!(std::fs::read_to_string(&local).unwrap(), "print(\"hi\")");
    manager.stop();
}

#[test]
fn test_put_into_directory_on_tree_board() {
    let mut port = MockSerialPort::new("ttyACM0");
    expect_raw(
        &mut port,
        &[raw_ok(b""), raw_ok(b""), raw_ok(b"D usr\r\nF 12 usr/usr0.py\r\n")],
    );
    expect_raw(&mut port, &oks(5));
    let (mut manager, events) = start(&port, Listing::Tree);

    match next_event(&events) {
        FsEvent::ListFiles(tree) => {
            assert_eq!(tree[0].name, "usr");
            assert_eq!(
                tree[0].children.as_deref(),
                Some(&[FileEntry::file("usr0.py", Some(12))][..])
            );
        }
        other => panic!("expected a listing, got {:?}", other),
    }

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("usr1.py");
    std::fs::write(&local, "print(1)\n").unwrap();
    manager.handle().put(&local, Some("usr".to_string()));

    assert_eq!(next_event(&events), FsEvent::PutFile("usr1.py".to_string()));
    let written = String::from_utf8_lossy(&port.written()).into_owned();
    assert!(written.contains("open('usr/usr1.py', 'wb')"));
    manager.stop();
}

#[test]
fn test_unreachable_port_fails_listing() {
    let port = MockSerialPort::new("ttyACM0");
    let opener = MockPortOpener::new(port);
    opener.set_refuse(true);
    let dir = tempfile::tempdir().unwrap();
    let (tx, events) = mpsc::channel();

    let mut manager = FileManager::start(
        "/dev/ttyACM0",
        Arc::new(opener),
        Listing::Flat,
        &common::test_config(dir.path()).serial,
        tx,
    );

    assert_eq!(next_event(&events), FsEvent::ListFailed);
    manager.handle().get("main.py", dir.path().join("main.py"));
    assert_eq!(next_event(&events), FsEvent::GetFailed("main.py".to_string()));
    manager.stop();
}
