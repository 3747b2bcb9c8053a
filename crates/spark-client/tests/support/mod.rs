//! In-memory collaborators for scenario tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, Semaphore};

use spark_client::{ChatCore, Collaborators, CoreConfig, CoreUpdate};
use spark_net::{ChannelTransport, ChatApi, OutboundFrame, ProgressFn, UploadClient, UserLookup};
use spark_shared::protocol::{ConversationRecord, OutgoingMessage};
use spark_shared::{
    ApiError, FileAttachment, Message, MessageBody, MessageId, MessageKind, OutgoingFile, UploadError,
    UploadProgress, UserId, UserProfile,
};

pub const ALICE: &str = "aaaaaaaaaaaaaaaaaaaaaaaa";
pub const BOB: &str = "bbbbbbbbbbbbbbbbbbbbbbbb";
pub const CAROL: &str = "cccccccccccccccccccccccc";

pub fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

pub fn message_id(n: u64) -> MessageId {
    MessageId::parse(&format!("{n:024x}")).unwrap()
}

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap()
}

/// A stored text message with server id `id`.
pub fn text(id: u64, from: &str, to: &str, body: &str, minute: u32) -> Message {
    Message {
        id: Some(message_id(id)),
        client_token: None,
        sender: user(from),
        recipient: user(to),
        kind: MessageKind::Text,
        body: MessageBody::Text(body.to_string()),
        created_at: at(minute),
        read: false,
    }
}

// ---------------------------------------------------------------------------
// Push transport driver
// ---------------------------------------------------------------------------

/// What the fake socket answers to an outbound frame.  `None` never answers.
pub type Reply = Box<dyn Fn(&str, &Value) -> Option<Result<Value, String>> + Send + Sync>;

pub type Frames = Arc<Mutex<Vec<(String, Value)>>>;

pub fn ack_everything() -> Reply {
    Box::new(|_, _| Some(Ok(serde_json::json!({ "success": true }))))
}

pub fn never_answer() -> Reply {
    Box::new(|_, _| None)
}

/// Acknowledges `send-message` authoritatively, echoing the stored copy.
pub fn store_and_ack(next_id: u64) -> Reply {
    let counter = AtomicUsize::new(0);
    Box::new(move |event, payload| {
        if event != "send-message" {
            return Some(Ok(serde_json::json!({ "success": true })));
        }
        let n = next_id + counter.fetch_add(1, Ordering::SeqCst) as u64;
        let stored = serde_json::json!({
            "_id": format!("{n:024x}"),
            "clientToken": payload["clientToken"],
            "sender": ALICE,
            "recipient": payload["recipient"],
            "type": payload["type"],
            "body": payload["body"],
            "createdAt": Utc::now(),
        });
        Some(Ok(serde_json::json!({ "success": true, "message": stored })))
    })
}

fn spawn_driver(mut rx: tokio::sync::mpsc::Receiver<OutboundFrame>, reply: Reply) -> Frames {
    let frames: Frames = Arc::new(Mutex::new(Vec::new()));
    let seen = frames.clone();
    tokio::spawn(async move {
        let mut unanswered = Vec::new();
        while let Some(frame) = rx.recv().await {
            seen.lock()
                .unwrap()
                .push((frame.event.clone(), frame.payload.clone()));
            match reply(&frame.event, &frame.payload) {
                Some(answer) => {
                    let _ = frame.ack.send(answer);
                }
                None => unanswered.push(frame.ack),
            }
        }
    });
    frames
}

// ---------------------------------------------------------------------------
// REST fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeApi {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub fail_sends: AtomicBool,
    pub histories: Mutex<HashMap<UserId, Vec<Message>>>,
    pub conversations: Mutex<Vec<ConversationRecord>>,
    pub receipts: Mutex<Vec<(UserId, Vec<MessageId>)>>,
    pub fail_receipts: AtomicBool,
    pub fail_histories: AtomicBool,
    pub receipt_attempts: AtomicUsize,
    receipt_gate: Mutex<Option<Arc<Semaphore>>>,
    next_id: AtomicUsize,
}

impl FakeApi {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn receipt_count(&self) -> usize {
        self.receipts.lock().unwrap().len()
    }

    /// Every id sent in a successful receipt, in order.
    pub fn receipted_ids(&self) -> Vec<MessageId> {
        self.receipts
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, ids)| ids.clone())
            .collect()
    }

    /// Park receipts until `release_receipts` lets them through.
    pub fn hold_receipts(&self) {
        *self.receipt_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_receipts(&self, receipts: usize) {
        if let Some(gate) = self.receipt_gate.lock().unwrap().as_ref() {
            gate.add_permits(receipts);
        }
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, ApiError> {
        self.sent.lock().unwrap().push(message.clone());
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 503,
                reason: "unavailable".into(),
            });
        }
        let n = 0x9000 + self.next_id.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(Message {
            id: Some(message_id(n)),
            client_token: Some(message.client_token.clone()),
            sender: user(ALICE),
            recipient: message.recipient.clone(),
            kind: message.kind,
            body: message.body.clone(),
            created_at: Utc::now(),
            read: false,
        })
    }

    async fn fetch_messages(&self, counterparty: &UserId) -> Result<Vec<Message>, ApiError> {
        if self.fail_histories.load(Ordering::SeqCst) {
            return Err(ApiError::Request("connection reset".into()));
        }
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(counterparty)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_conversations(&self) -> Result<Vec<ConversationRecord>, ApiError> {
        Ok(self.conversations.lock().unwrap().clone())
    }

    async fn mark_read(&self, counterparty: &UserId, ids: &[MessageId]) -> Result<(), ApiError> {
        self.receipt_attempts.fetch_add(1, Ordering::SeqCst);
        let gate = self.receipt_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail_receipts.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 502,
                reason: "bad gateway".into(),
            });
        }
        self.receipts
            .lock()
            .unwrap()
            .push((counterparty.clone(), ids.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeUploads {
    pub calls: AtomicUsize,
}

#[async_trait]
impl UploadClient for FakeUploads {
    async fn upload(&self, file: OutgoingFile, progress: ProgressFn) -> Result<FileAttachment, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let total = file.size() as u64;
        progress(UploadProgress { sent: total / 2, total });
        progress(UploadProgress { sent: total, total });
        Ok(FileAttachment {
            url: format!("https://cdn.example.com/{}", file.file_name),
            file_name: file.file_name,
            file_size: total,
            mime_type: file.mime_type,
        })
    }
}

/// Profile lookup that can be held until the test releases it.
pub struct FakeLookup {
    pub calls: AtomicUsize,
    gate: Option<Semaphore>,
    unknown: Mutex<Vec<UserId>>,
}

impl FakeLookup {
    pub fn open() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate: None,
            unknown: Mutex::new(Vec::new()),
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::open()
        }
    }

    pub fn release(&self, lookups: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(lookups);
        }
    }

    pub fn forget(&self, id: &str) {
        self.unknown.lock().unwrap().push(user(id));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserLookup for FakeLookup {
    async fn resolve(&self, id: &UserId) -> Result<UserProfile, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.unknown.lock().unwrap().contains(id) {
            return Err(ApiError::Status {
                status: 404,
                reason: "no such user".into(),
            });
        }
        Ok(UserProfile::new(id.clone(), format!("user-{}", id.short())))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub core: ChatCore,
    pub transport: Arc<ChannelTransport>,
    pub frames: Frames,
    pub api: Arc<FakeApi>,
    pub uploads: Arc<FakeUploads>,
    pub lookup: Arc<FakeLookup>,
}

impl Harness {
    pub fn new(reply: Reply) -> Self {
        Self::build(reply, FakeLookup::open(), test_config())
    }

    pub fn build(reply: Reply, lookup: FakeLookup, config: CoreConfig) -> Self {
        let (transport, rx) = ChannelTransport::new(32);
        let frames = spawn_driver(rx, reply);
        let api = Arc::new(FakeApi::default());
        let uploads = Arc::new(FakeUploads::default());
        let lookup = Arc::new(lookup);
        let core = ChatCore::new(
            user(ALICE),
            config,
            Collaborators {
                transport: transport.clone(),
                api: api.clone(),
                uploads: uploads.clone(),
                lookup: lookup.clone(),
            },
        );
        Self {
            core,
            transport,
            frames,
            api,
            uploads,
            lookup,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|(event, _)| event.clone())
            .collect()
    }

    pub fn last_frame(&self, event: &str) -> Option<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
    }
}

pub fn test_config() -> CoreConfig {
    CoreConfig {
        push_timeout: Duration::from_millis(100),
        ..CoreConfig::default()
    }
}

/// Wait until `check` holds, polling the runtime.  Panics after two seconds.
pub async fn eventually<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Next update matching `want`, skipping others.
pub async fn next_update<F>(rx: &mut broadcast::Receiver<CoreUpdate>, want: F) -> CoreUpdate
where
    F: Fn(&CoreUpdate) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(update) if want(&update) => return update,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("update stream closed"),
            }
        }
    })
    .await
    .expect("no matching update")
}
