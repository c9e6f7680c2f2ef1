//! Mock serial port implementation for testing.
//!
//! `MockSerialPort` simulates a board without hardware. Besides a plain read
//! queue it supports scripted replies: "when a write contains X, queue Y",
//! consumed in order, which is enough to play back a REPL conversation.

use super::error::PortError;
use super::traits::{PortOpener, PortSettings, SerialPortAdapter};
use memchr::memmem;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One scripted reaction to a write.
#[derive(Debug, Clone)]
struct Reply {
    trigger: Vec<u8>,
    response: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes waiting to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Every write, in order.
    write_log: Vec<Vec<u8>>,
    /// Pending scripted replies.
    replies: VecDeque<Reply>,
    /// Fail every write from now on.
    fail_writes: bool,
    /// Whether asserting DTR should be reported as ineffective.
    dtr_stuck: bool,
    dtr: bool,
    baud_rate: u32,
    timeout: Duration,
    buffers_cleared: bool,
}

/// Mock serial port implementation for testing.
///
/// Clones share state, so a test can keep one handle for inspection while
/// another is owned by a session or a worker thread.
///
/// # Example
/// ```
/// use mu_link::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.reply_to(b"\x03", b"\r\n>>> ");
///
/// port.write_bytes(b"\x03").unwrap();
/// let mut buffer = [0u8; 16];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"\r\n>>> ");
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_secs(1),
                baud_rate: 9600,
                ..Default::default()
            })),
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&mut self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Queue `response` the next time a write containing `trigger` occurs.
    ///
    /// Replies are one-shot; the first pending reply whose trigger matches a
    /// write is consumed.
    pub fn reply_to(&mut self, trigger: &[u8], response: &[u8]) {
        self.state.lock().replies.push_back(Reply {
            trigger: trigger.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Number of scripted replies not yet triggered.
    pub fn pending_replies(&self) -> usize {
        self.state.lock().replies.len()
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All writes concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Make every following write fail with an I/O error.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Simulate a host where asserting DTR through the primary API has no effect.
    pub fn set_dtr_stuck(&mut self, stuck: bool) {
        self.state.lock().dtr_stuck = stuck;
    }

    /// Current DTR level as seen by the "device".
    pub fn dtr(&self) -> bool {
        self.state.lock().dtr
    }

    /// Baud rate last configured on the port.
    pub fn baud_rate(&self) -> u32 {
        self.state.lock().baud_rate
    }

    /// Get whether buffers have been cleared.
    pub fn was_cleared(&self) -> bool {
        self.state.lock().buffers_cleared
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    fn raise_dtr_directly(&self) {
        self.state.lock().dtr = true;
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device went away",
            )));
        }

        state.write_log.push(data.to_vec());

        let hit = state
            .replies
            .iter()
            .position(|r| memmem::find(data, &r.trigger).is_some());
        if let Some(index) = hit {
            if let Some(reply) = state.replies.remove(index) {
                state.read_queue.extend(reply.response);
            }
        }

        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            // An empty queue stands for a read window that expired.
            Err(PortError::timeout(state.timeout))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), PortError> {
        self.state.lock().baud_rate = baud_rate;
        Ok(())
    }

    fn set_data_terminal_ready(&mut self, level: bool) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.dtr_stuck {
            return Err(PortError::config("DTR assertion had no effect"));
        }
        state.dtr = level;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_queue.clear();
        state.buffers_cleared = true;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

#[derive(Debug, Default)]
struct OpenerLog {
    opens: Vec<(String, PortSettings)>,
    dtr_raises: Vec<String>,
}

/// `PortOpener` that hands out clones of one `MockSerialPort`.
#[derive(Debug, Clone)]
pub struct MockPortOpener {
    port: MockSerialPort,
    refuse: Arc<Mutex<bool>>,
    log: Arc<Mutex<OpenerLog>>,
}

impl MockPortOpener {
    /// Every successful open returns a handle sharing `port`'s state.
    pub fn new(port: MockSerialPort) -> Self {
        Self {
            port,
            refuse: Arc::new(Mutex::new(false)),
            log: Arc::new(Mutex::new(OpenerLog::default())),
        }
    }

    /// Make subsequent opens fail as if the device were busy or absent.
    pub fn set_refuse(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }

    /// Paths passed to `open`, in order.
    pub fn opened_paths(&self) -> Vec<String> {
        self.log.lock().opens.iter().map(|(p, _)| p.clone()).collect()
    }

    /// Paths passed to `raise_dtr`, in order.
    pub fn dtr_raises(&self) -> Vec<String> {
        self.log.lock().dtr_raises.clone()
    }

    /// The shared port handle.
    pub fn port(&self) -> MockSerialPort {
        self.port.clone()
    }
}

impl PortOpener for MockPortOpener {
    fn open(
        &self,
        path: &str,
        settings: PortSettings,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        if *self.refuse.lock() {
            return Err(PortError::not_found(path));
        }
        self.log.lock().opens.push((path.to_string(), settings));
        let mut port = self.port.clone();
        port.set_timeout(settings.timeout)?;
        Ok(Box::new(port))
    }

    fn raise_dtr(&self, path: &str) -> Result<(), PortError> {
        if *self.refuse.lock() {
            return Err(PortError::not_found(path));
        }
        self.log.lock().dtr_raises.push(path.to_string());
        self.port.raise_dtr_directly();
        Ok(())
    }
}
