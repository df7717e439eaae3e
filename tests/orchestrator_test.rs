use async_trait::async_trait;
use datatransfer::core::{QueueParams, StorageParams};
use datatransfer::{
    process_files, BackendConnector, BackendKind, QueuePublisher, Result, Storage,
    TransferConfig, TransferError, TransferMode,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct BackendState {
    files: Vec<(String, Vec<u8>)>,
    /// Overrides what `list_dir` returns, e.g. to inject a blank entry.
    listing: Option<Vec<String>>,
    fail_read: Option<String>,
    lists: usize,
    reads: Vec<String>,
    writes: Vec<String>,
    deletes: Vec<String>,
    move_calls: usize,
    exit_calls: usize,
}

type Shared = Arc<Mutex<BackendState>>;

fn backend_with(names: &[&str]) -> Shared {
    let state = BackendState {
        files: names
            .iter()
            .map(|name| (name.to_string(), format!("contents of {}", name).into_bytes()))
            .collect(),
        ..BackendState::default()
    };
    Arc::new(Mutex::new(state))
}

struct MemoryStorage {
    state: Shared,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_dir(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.lists += 1;
        Ok(match &state.listing {
            Some(listing) => listing.clone(),
            None => state.files.iter().map(|(name, _)| name.clone()).collect(),
        })
    }

    async fn read_file(&self, id: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.reads.push(id.to_string());
        if state.fail_read.as_deref() == Some(id) {
            return Err(TransferError::transport(format!("read '{}'", id), "connection reset"));
        }
        state
            .files
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| TransferError::not_found(id))
    }

    async fn write_file(&self, id: &str, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(id.to_string());
        state.files.retain(|(name, _)| name != id);
        state.files.push((id.to_string(), data.to_vec()));
        Ok(())
    }

    async fn delete_file(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.files.len();
        state.files.retain(|(name, _)| name != id);
        if state.files.len() == before {
            return Err(TransferError::not_found(id));
        }
        state.deletes.push(id.to_string());
        Ok(())
    }

    async fn move_files(&self) -> Result<()> {
        self.state.lock().unwrap().move_calls += 1;
        Ok(())
    }

    async fn exit(&mut self) -> Result<()> {
        self.state.lock().unwrap().exit_calls += 1;
        Ok(())
    }
}

struct RecordingPublisher {
    events: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<usize>>,
    /// Identifier the broker refuses.
    reject: Option<String>,
}

#[async_trait]
impl QueuePublisher for RecordingPublisher {
    async fn publish_event(&self, id: &str) -> Result<()> {
        if self.reject.as_deref() == Some(id) {
            return Err(TransferError::transport(format!("confirm '{}'", id), "broker rejected the message"));
        }
        self.events.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        *self.closes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Hands out the read backend on the first open and the write backend on the second.
struct FakeConnector {
    read: Shared,
    write: Shared,
    opened: Mutex<Vec<StorageParams>>,
    events: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<usize>>,
    fail_write_open: bool,
    fail_queue_open: bool,
    reject_event: Option<String>,
}

impl FakeConnector {
    fn new(read: Shared, write: Shared) -> Self {
        Self {
            read,
            write,
            opened: Mutex::new(Vec::new()),
            events: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(Mutex::new(0)),
            fail_write_open: false,
            fail_queue_open: false,
            reject_event: None,
        }
    }

    fn closes(&self) -> usize {
        *self.closes.lock().unwrap()
    }

    fn opened(&self) -> Vec<StorageParams> {
        self.opened.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendConnector for FakeConnector {
    async fn open_storage(&self, params: StorageParams) -> Result<Box<dyn Storage>> {
        let mut opened = self.opened.lock().unwrap();
        let state = if opened.is_empty() {
            self.read.clone()
        } else if self.fail_write_open {
            return Err(TransferError::transport("connect", "destination unreachable"));
        } else {
            self.write.clone()
        };
        opened.push(params);
        Ok(Box::new(MemoryStorage { state }))
    }

    async fn open_queue(&self, _params: QueueParams) -> Result<Box<dyn QueuePublisher>> {
        if self.fail_queue_open {
            return Err(TransferError::transport("connect to broker", "connection refused"));
        }
        Ok(Box::new(RecordingPublisher {
            events: self.events.clone(),
            closes: self.closes.clone(),
            reject: self.reject_event.clone(),
        }))
    }
}

fn folder_to_folder(transfer_extra: &str) -> TransferConfig {
    TransferConfig::from_toml_str(&format!(
        r#"
[transfer]
source_path = "/data/in"
dest_path = "/data/out"
{}

[read]
type = "datatransfer.storage.FolderStorage"

[write]
type = "datatransfer.storage.FolderStorage"
"#,
        transfer_extra
    ))
    .unwrap()
}

fn folder_to_s3(transfer_extra: &str) -> TransferConfig {
    TransferConfig::from_toml_str(&format!(
        r#"
[transfer]
source_path = "/data/in"
dest_path = "/uploads"
{}

[read]
type = "datatransfer.storage.FolderStorage"

[write]
type = "datatransfer.storage.S3Storage"

[write.s3]
bucket_name = "landing"
region = "eu-west-2"
access_key_id = "AKIA"
secret_access_key = "secret"
"#,
        transfer_extra
    ))
    .unwrap()
}

fn publish_config(queue: &str) -> TransferConfig {
    TransferConfig::from_toml_str(&format!(
        r#"
[transfer]
source_path = "/data/in"
dest_path = "/data/out"
publish_to_queue = true

[read]
type = "FolderStorage"

[write]
type = "FolderStorage"
{}
"#,
        queue
    ))
    .unwrap()
}

const QUEUE_SECTION: &str = r#"
[queue]
host = "broker"
queue_name = "incoming"
"#;

fn names(state: &Shared) -> Vec<String> {
    state
        .lock()
        .unwrap()
        .files
        .iter()
        .map(|(name, _)| name.clone())
        .collect()
}

#[tokio::test]
async fn test_folder_to_folder_copy_keeps_sources_and_archives_each_file() {
    let read = backend_with(&["a.csv", "b.csv", "c.csv"]);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    let config = folder_to_folder("copy_files = true\nmax_files_batch = 10");

    let report = process_files(&config, &connector).await.unwrap();

    assert_eq!(report.mode, TransferMode::DirectCopy);
    assert_eq!(report.transferred, 3);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.archived, 3);
    assert_eq!(names(&write), vec!["a.csv", "b.csv", "c.csv"]);
    assert_eq!(names(&read), vec!["a.csv", "b.csv", "c.csv"]);
    assert_eq!(write.lock().unwrap().move_calls, 3);
    assert!(read.lock().unwrap().deletes.is_empty());
    assert_eq!(read.lock().unwrap().exit_calls, 1);
    assert_eq!(write.lock().unwrap().exit_calls, 1);

    let written = write.lock().unwrap().files[1].1.clone();
    assert_eq!(written, b"contents of b.csv");
}

#[tokio::test]
async fn test_folder_to_object_store_move_deletes_sources_without_archival() {
    let read = backend_with(&["x.json", "y.json"]);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    let config = folder_to_s3("copy_files = false");

    let report = process_files(&config, &connector).await.unwrap();

    assert_eq!(report.transferred, 2);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.archived, 0);
    assert_eq!(names(&write), vec!["x.json", "y.json"]);
    assert!(names(&read).is_empty());
    assert_eq!(read.lock().unwrap().deletes, vec!["x.json", "y.json"]);
    assert_eq!(write.lock().unwrap().move_calls, 0);
}

#[tokio::test]
async fn test_publish_mode_announces_every_file_in_order() {
    let files = ["1.csv", "2.csv", "3.csv", "4.csv", "5.csv"];
    let read = backend_with(&files);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    // the batch limit only applies to direct copy
    let config = TransferConfig::from_toml_str(
        r#"
[transfer]
source_path = "/data/in"
dest_path = "/data/out"
publish_to_queue = "true"
max_files_batch = 2

[read]
type = "FolderStorage"

[write]
type = "FolderStorage"

[queue]
host = "broker"
queue_name = "incoming"
"#,
    )
    .unwrap();

    let report = process_files(&config, &connector).await.unwrap();

    assert_eq!(report.mode, TransferMode::Publish);
    assert_eq!(report.published, 5);
    assert_eq!(connector.events(), files.to_vec());
    assert_eq!(connector.closes(), 1);
    assert!(read.lock().unwrap().reads.is_empty());
    assert!(write.lock().unwrap().writes.is_empty());
    assert_eq!(read.lock().unwrap().exit_calls, 1);
    assert_eq!(write.lock().unwrap().exit_calls, 1);
}

#[tokio::test]
async fn test_batch_is_truncated_in_enumeration_order() {
    let read = backend_with(&["e.csv", "d.csv", "c.csv", "b.csv", "a.csv"]);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    let config = folder_to_folder("max_files_batch = 2");

    let report = process_files(&config, &connector).await.unwrap();

    assert_eq!(report.listed, 2);
    assert_eq!(report.transferred, 2);
    assert_eq!(write.lock().unwrap().writes, vec!["e.csv", "d.csv"]);
}

#[tokio::test]
async fn test_fewer_files_than_batch_limit_processes_all() {
    let read = backend_with(&["only.csv"]);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    let config = folder_to_folder("max_files_batch = 50");

    let report = process_files(&config, &connector).await.unwrap();

    assert_eq!(report.transferred, 1);
}

#[tokio::test]
async fn test_blank_identifier_is_skipped() {
    let read = backend_with(&["a.csv", "b.csv"]);
    read.lock().unwrap().listing = Some(vec![
        "a.csv".to_string(),
        String::new(),
        "b.csv".to_string(),
    ]);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    let config = folder_to_folder("");

    let report = process_files(&config, &connector).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.transferred, 2);
    assert_eq!(read.lock().unwrap().reads, vec!["a.csv", "b.csv"]);
    assert_eq!(write.lock().unwrap().move_calls, 2);
}

#[tokio::test]
async fn test_read_failure_aborts_batch_and_still_releases_handles() {
    let read = backend_with(&["a.csv", "b.csv", "c.csv"]);
    read.lock().unwrap().fail_read = Some("b.csv".to_string());
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    let config = folder_to_folder("copy_files = false");

    let err = process_files(&config, &connector).await.unwrap_err();

    assert!(matches!(err, TransferError::TransportError { .. }));
    assert_eq!(read.lock().unwrap().reads, vec!["a.csv", "b.csv"]);
    assert_eq!(write.lock().unwrap().writes, vec!["a.csv"]);
    // the file transferred before the failure is not rolled back
    assert_eq!(read.lock().unwrap().deletes, vec!["a.csv"]);
    assert_eq!(read.lock().unwrap().exit_calls, 1);
    assert_eq!(write.lock().unwrap().exit_calls, 1);
}

#[tokio::test]
async fn test_missing_source_file_is_not_found() {
    let read = backend_with(&["a.csv"]);
    read.lock().unwrap().listing = Some(vec!["ghost.csv".to_string(), "a.csv".to_string()]);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    let config = folder_to_folder("");

    let err = process_files(&config, &connector).await.unwrap_err();

    assert!(matches!(err, TransferError::NotFound { ref id } if id == "ghost.csv"));
    assert!(write.lock().unwrap().writes.is_empty());
}

#[tokio::test]
async fn test_setup_failure_stops_before_listing() {
    let read = backend_with(&["a.csv"]);
    let write = backend_with(&[]);
    let mut connector = FakeConnector::new(read.clone(), write.clone());
    connector.fail_write_open = true;
    let config = folder_to_folder("");

    let err = process_files(&config, &connector).await.unwrap_err();

    assert!(matches!(err, TransferError::TransportError { .. }));
    assert_eq!(read.lock().unwrap().lists, 0);
    assert_eq!(read.lock().unwrap().exit_calls, 0);
}

#[tokio::test]
async fn test_copy_flag_controls_deletion() {
    for (flag, expect_delete) in [
        ("copy_files = \"FALSE\"", true),
        ("copy_files = \"false\"", true),
        ("copy_files = \"True\"", false),
        ("copy_files = true", false),
        ("", false),
    ] {
        let read = backend_with(&["a.csv"]);
        let write = backend_with(&[]);
        let connector = FakeConnector::new(read.clone(), write.clone());
        let config = folder_to_folder(flag);

        process_files(&config, &connector).await.unwrap();

        assert_eq!(
            names(&read).is_empty(),
            expect_delete,
            "unexpected source state for {:?}",
            flag
        );
    }
}

#[tokio::test]
async fn test_handles_are_resolved_per_role_with_normalized_destination() {
    let read = backend_with(&[]);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read, write);
    let config = folder_to_s3("");

    process_files(&config, &connector).await.unwrap();

    let opened = connector.opened();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0].kind(), BackendKind::Folder);
    assert_eq!(opened[0].path(), "/data/in");
    assert_eq!(opened[1].kind(), BackendKind::ObjectStore);
    assert_eq!(opened[1].path(), "uploads/");
}

#[tokio::test]
async fn test_publish_failure_stops_closes_publisher_and_releases_handles() {
    let read = backend_with(&["1.csv", "2.csv", "3.csv"]);
    let write = backend_with(&[]);
    let mut connector = FakeConnector::new(read.clone(), write.clone());
    connector.reject_event = Some("2.csv".to_string());
    let config = publish_config(QUEUE_SECTION);

    let err = process_files(&config, &connector).await.unwrap_err();

    assert!(matches!(err, TransferError::TransportError { ref operation, .. } if operation == "confirm '2.csv'"));
    assert_eq!(connector.events(), vec!["1.csv"]);
    assert_eq!(connector.closes(), 1);
    assert_eq!(read.lock().unwrap().exit_calls, 1);
    assert_eq!(write.lock().unwrap().exit_calls, 1);
}

#[tokio::test]
async fn test_publish_without_queue_section_fails_before_listing() {
    let read = backend_with(&["1.csv"]);
    let write = backend_with(&[]);
    let connector = FakeConnector::new(read.clone(), write.clone());
    let config = publish_config("");

    let err = process_files(&config, &connector).await.unwrap_err();

    assert!(matches!(err, TransferError::MissingConfigError { ref field } if field == "queue"));
    assert_eq!(read.lock().unwrap().lists, 0);
    assert!(connector.events().is_empty());
    assert_eq!(read.lock().unwrap().exit_calls, 1);
    assert_eq!(write.lock().unwrap().exit_calls, 1);
}

#[tokio::test]
async fn test_queue_connect_failure_releases_storage_handles() {
    let read = backend_with(&["1.csv"]);
    let write = backend_with(&[]);
    let mut connector = FakeConnector::new(read.clone(), write.clone());
    connector.fail_queue_open = true;
    let config = publish_config(QUEUE_SECTION);

    let err = process_files(&config, &connector).await.unwrap_err();

    assert!(matches!(err, TransferError::TransportError { .. }));
    assert_eq!(read.lock().unwrap().lists, 0);
    assert_eq!(connector.closes(), 0);
    assert_eq!(read.lock().unwrap().exit_calls, 1);
    assert_eq!(write.lock().unwrap().exit_calls, 1);
}
