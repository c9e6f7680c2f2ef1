//! Async File Manager.
//!
//! A worker thread owns its own [`SerialSession`] and serves one request at
//! a time. Results come back as [`FsEvent`]s on a channel; every request
//! yields exactly one success or failure event. A failed request leaves the
//! worker usable, a failed start does not.

use super::{commands, FileEntry, Listing};
use crate::config::SerialConfig;
use crate::error::LinkResult;
use crate::port::PortOpener;
use crate::session::SerialSession;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// Work for the file manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsRequest {
    List,
    Get { device: String, local: PathBuf },
    Put { local: PathBuf, dest: Option<String> },
    Delete { device: String },
}

/// Outcome notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    ListFiles(Vec<FileEntry>),
    ListFailed,
    /// Device filename that was downloaded.
    GotFile(String),
    /// Device filename that could not be downloaded.
    GetFailed(String),
    /// Name of the uploaded file, without its device directory.
    PutFile(String),
    /// Local path that could not be uploaded.
    PutFailed(String),
    DeletedFile(String),
    DeleteFailed(String),
}

impl FsRequest {
    /// The failure event for this request.
    fn failure(&self) -> FsEvent {
        match self {
            Self::List => FsEvent::ListFailed,
            Self::Get { device, .. } => FsEvent::GetFailed(device.clone()),
            Self::Put { local, .. } => FsEvent::PutFailed(local.display().to_string()),
            Self::Delete { device } => FsEvent::DeleteFailed(device.clone()),
        }
    }
}

enum Job {
    Run(FsRequest),
    Stop,
}

/// Cloneable front end handed to the view.
#[derive(Debug, Clone)]
pub struct FileManagerHandle {
    jobs: Sender<Job>,
    events: Sender<FsEvent>,
}

impl FileManagerHandle {
    /// Queue `request`. If the worker is gone the failure event is emitted here.
    pub fn submit(&self, request: FsRequest) {
        if let Err(mpsc::SendError(Job::Run(request))) = self.jobs.send(Job::Run(request)) {
            warn!("File manager stopped; failing {:?}", request);
            let _ = self.events.send(request.failure());
        }
    }

    pub fn list(&self) {
        self.submit(FsRequest::List);
    }

    pub fn get(&self, device: impl Into<String>, local: impl Into<PathBuf>) {
        self.submit(FsRequest::Get {
            device: device.into(),
            local: local.into(),
        });
    }

    pub fn put(&self, local: impl Into<PathBuf>, dest: Option<String>) {
        self.submit(FsRequest::Put {
            local: local.into(),
            dest,
        });
    }

    pub fn delete(&self, device: impl Into<String>) {
        self.submit(FsRequest::Delete {
            device: device.into(),
        });
    }
}

/// The worker thread and its job queue.
#[derive(Debug)]
pub struct FileManager {
    handle: FileManagerHandle,
    worker: Option<thread::JoinHandle<()>>,
}

impl FileManager {
    /// Spawn the worker. It opens `port_path` and lists files straight away.
    pub fn start(
        port_path: &str,
        opener: Arc<dyn PortOpener>,
        listing: Listing,
        config: &SerialConfig,
        events: Sender<FsEvent>,
    ) -> Self {
        let (jobs, queue) = mpsc::channel();
        let handle = FileManagerHandle {
            jobs,
            events: events.clone(),
        };

        let mut worker = Worker {
            port_path: port_path.to_string(),
            opener,
            listing,
            config: config.clone(),
            link: None,
            events,
        };
        let join = thread::Builder::new()
            .name("mu-link-fs".to_string())
            .spawn(move || worker.run(queue));

        let worker = match join {
            Ok(join) => Some(join),
            Err(e) => {
                error!("Could not spawn file manager thread: {}", e);
                let _ = handle.events.send(FsEvent::ListFailed);
                None
            }
        };
        Self { handle, worker }
    }

    pub fn handle(&self) -> FileManagerHandle {
        self.handle.clone()
    }

    /// Finish the current request, close the session and join the worker.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.handle.jobs.send(Job::Stop);
            if worker.join().is_err() {
                error!("File manager thread panicked");
            }
        }
    }
}

impl Drop for FileManager {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    port_path: String,
    opener: Arc<dyn PortOpener>,
    listing: Listing,
    config: SerialConfig,
    link: Option<SerialSession>,
    events: Sender<FsEvent>,
}

impl Worker {
    fn run(&mut self, queue: Receiver<Job>) {
        self.on_start();
        while let Ok(Job::Run(request)) = queue.recv() {
            let event = self.handle(&request);
            if self.events.send(event).is_err() {
                debug!("Event receiver dropped; file manager exiting");
                break;
            }
        }
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        debug!("File manager for {} stopped", self.port_path);
    }

    fn on_start(&mut self) {
        match SerialSession::open(self.opener.as_ref(), &self.port_path, &self.config) {
            Ok(link) => {
                self.link = Some(link);
                let event = self.handle(&FsRequest::List);
                let _ = self.events.send(event);
            }
            Err(e) => {
                error!("File manager could not open {}: {}", self.port_path, e);
                let _ = self.events.send(FsEvent::ListFailed);
            }
        }
    }

    fn handle(&mut self, request: &FsRequest) -> FsEvent {
        match self.perform(request) {
            Ok(event) => {
                info!("{:?}", event);
                event
            }
            Err(e) => {
                error!("{:?} failed: {}", request, e);
                request.failure()
            }
        }
    }

    fn perform(&mut self, request: &FsRequest) -> LinkResult<FsEvent> {
        let listing = self.listing;
        let link = self
            .link
            .as_mut()
            .ok_or(crate::port::PortError::NotOpen)?;

        match request {
            FsRequest::List => {
                let files = match listing {
                    Listing::Flat => commands::ls(link)?,
                    Listing::Tree => commands::tree(link)?,
                };
                Ok(FsEvent::ListFiles(files))
            }
            FsRequest::Get { device, local } => {
                let data = commands::get(link, device)?;
                std::fs::write(local, data)?;
                Ok(FsEvent::GotFile(device.clone()))
            }
            FsRequest::Put { local, dest } => {
                let target = put_target(listing, local, dest.as_deref())?;
                let data = std::fs::read(local)?;
                commands::put(link, &data, &target)?;
                let name = target.rsplit('/').next().unwrap_or(&target);
                Ok(FsEvent::PutFile(name.to_string()))
            }
            FsRequest::Delete { device } => {
                commands::delete(link, device)?;
                Ok(FsEvent::DeletedFile(device.clone()))
            }
        }
    }
}

fn put_target(listing: Listing, local: &Path, dest: Option<&str>) -> LinkResult<String> {
    let invalid = |reason: &str| {
        crate::error::LinkError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{}: {}", reason, local.display()),
        ))
    };
    if listing == Listing::Flat && dest.is_some() {
        return Err(invalid("flat filesystem has no directories"));
    }
    commands::upload_target(local, dest).ok_or_else(|| invalid("not a file name"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockPortOpener, MockSerialPort};
    use crate::protocol::raw::RAW_BANNER;
    use crate::protocol::{CTRL_A, CTRL_D};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn config() -> SerialConfig {
        SerialConfig {
            settle_delay_ms: 0,
            write_chunk_size: 256,
            ..SerialConfig::default()
        }
    }

    fn script_ls(port: &mut MockSerialPort, reply: &[u8]) {
        port.reply_to(&[CTRL_A], RAW_BANNER);
        port.reply_to(&[CTRL_D], b"OK\x04\x04>");
        port.reply_to(&[CTRL_D], reply);
    }

    fn next(events: &Receiver<FsEvent>) -> FsEvent {
        events.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_start_lists_files() {
        let mut port = MockSerialPort::new("ttyACM0");
        script_ls(&mut port, b"OK['main.py', 'boot.py']\r\n\x04\x04>");
        let opener = Arc::new(MockPortOpener::new(port));
        let (tx, rx) = mpsc::channel();

        let mut manager = FileManager::start("/dev/ttyACM0", opener, Listing::Flat, &config(), tx);

        assert_eq!(
            next(&rx),
            FsEvent::ListFiles(vec![
                FileEntry::file("main.py", None),
                FileEntry::file("boot.py", None),
            ])
        );
        manager.stop();
    }

    #[test]
    fn test_failed_start_fails_every_request() {
        let opener = MockPortOpener::new(MockSerialPort::new("ttyACM0"));
        opener.set_refuse(true);
        let (tx, rx) = mpsc::channel();

        let mut manager = FileManager::start(
            "/dev/ttyACM0",
            Arc::new(opener),
            Listing::Flat,
            &config(),
            tx,
        );
        assert_eq!(next(&rx), FsEvent::ListFailed);

        manager.handle().delete("main.py");
        assert_eq!(next(&rx), FsEvent::DeleteFailed("main.py".to_string()));
        manager.stop();
    }

    #[test]
    fn test_flat_put_with_destination_fails() {
        let mut port = MockSerialPort::new("ttyACM0");
        script_ls(&mut port, b"OK[]\r\n\x04\x04>");
        let (tx, rx) = mpsc::channel();
        let mut manager = FileManager::start(
            "/dev/ttyACM0",
            Arc::new(MockPortOpener::new(port)),
            Listing::Flat,
            &config(),
            tx,
        );
        assert_eq!(next(&rx), FsEvent::ListFiles(Vec::new()));

        manager.handle().put("/tmp/main.py", Some("usr".to_string()));
        assert_eq!(next(&rx), FsEvent::PutFailed("/tmp/main.py".to_string()));
        manager.stop();
    }

    #[test]
    fn test_requests_after_stop_still_get_an_answer() {
        let opener = MockPortOpener::new(MockSerialPort::new("ttyACM0"));
        opener.set_refuse(true);
        let (tx, rx) = mpsc::channel();

        let mut manager = FileManager::start(
            "/dev/ttyACM0",
            Arc::new(opener),
            Listing::Tree,
            &config(),
            tx,
        );
        assert_eq!(next(&rx), FsEvent::ListFailed);
        let handle = manager.handle();
        manager.stop();

        handle.list();
        assert_eq!(next(&rx), FsEvent::ListFailed);
    }
}
