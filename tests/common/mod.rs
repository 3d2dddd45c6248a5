#![allow(dead_code)]

use async_trait::async_trait;
use sheet_trimmer::config::WorkerConfig;
use sheet_trimmer::models::QueueMessage;
use sheet_trimmer::services::queue::{QueueError, QueueService};
use sheet_trimmer::services::spreadsheet::{CellValue, Sheet, writer};
use sheet_trimmer::services::storage::{StorageError, StorageService};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const INPUT_BUCKET: &str = "newfiles";
pub const OUTPUT_BUCKET: &str = "output";

pub fn test_config() -> WorkerConfig {
    WorkerConfig {
        input_bucket: INPUT_BUCKET.to_string(),
        output_bucket: OUTPUT_BUCKET.to_string(),
        queue_url: "http://localhost/queue/fileprocessor".to_string(),
        wait_time_seconds: 0,
        ..WorkerConfig::default()
    }
}

pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("sheet_trimmer=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Workbook with a header row and `data_rows` numbered rows.
pub fn workbook_with_rows(data_rows: usize) -> Vec<u8> {
    let mut rows = vec![vec![
        Some(CellValue::Text("id".into())),
        Some(CellValue::Text("customer".into())),
        Some(CellValue::Text("amount".into())),
    ]];
    for i in 1..=data_rows {
        rows.push(vec![
            Some(CellValue::Number(i.to_string())),
            Some(CellValue::Text(format!("customer {}", i))),
            Some(CellValue::Number(format!("{}.5", i * 10))),
        ]);
    }
    writer::write_workbook(&Sheet { rows }, "Uploads").unwrap()
}

pub struct MockStorageService {
    files: Mutex<HashMap<(String, String), Vec<u8>>>,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub fail_uploads: AtomicBool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data);
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys_in(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn get_file(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.get(bucket, key).ok_or_else(|| StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Request {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "connection reset".to_string(),
            });
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.insert(bucket, key, data);
        Ok(())
    }
}

/// In-memory queue. A received message stays leased, and invisible to
/// further receives, until it is deleted or `expire_leases` is called.
pub struct MockQueueService {
    messages: Mutex<Vec<(QueueMessage, bool)>>,
    next_id: AtomicUsize,
    pub received_batch_sizes: Mutex<Vec<i32>>,
    pub fail_receives: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl MockQueueService {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            received_batch_sizes: Mutex::new(Vec::new()),
            fail_receives: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn send(&self, body: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let receipt_handle = format!("receipt-{}", id);
        self.push(QueueMessage {
            message_id: Some(format!("msg-{}", id)),
            body: body.to_string(),
            receipt_handle: Some(receipt_handle.clone()),
        });
        receipt_handle
    }

    pub fn push(&self, message: QueueMessage) {
        self.messages.lock().unwrap().push((message, false));
    }

    /// Make every leased message visible again, as after a visibility timeout.
    pub fn expire_leases(&self) {
        for (_, leased) in self.messages.lock().unwrap().iter_mut() {
            *leased = false;
        }
    }

    /// Messages still on the queue, leased or not.
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl QueueService for MockQueueService {
    async fn receive_messages(
        &self,
        max_messages: i32,
        _wait_time_seconds: i32,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        self.received_batch_sizes.lock().unwrap().push(max_messages);
        if self.fail_receives.load(Ordering::SeqCst) {
            return Err(QueueError::Receive("queue unavailable".to_string()));
        }
        let mut messages = self.messages.lock().unwrap();
        Ok(messages
            .iter_mut()
            .filter(|(_, leased)| !*leased)
            .take(max_messages.max(0) as usize)
            .map(|(message, leased)| {
                *leased = true;
                message.clone()
            })
            .collect())
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(QueueError::Delete("receipt handle expired".to_string()));
        }
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|(m, _)| m.receipt_handle.as_deref() != Some(receipt_handle));
        if messages.len() == before {
            return Err(QueueError::Delete(format!("unknown receipt handle {}", receipt_handle)));
        }
        Ok(())
    }
}
