//! Outbound messages, attachments, typing signals and read receipts.
//!
//! A send tries the push transport first and falls back to the REST API.
//! The push attempt counts as delivered only when the server acknowledges
//! it with the stored message; anything else (disconnected, rejected, timed
//! out, queued as pending, unreadable ack) goes through the API with the same
//! client token, so whichever copy arrives later reconciles with the first.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use spark_shared::constants::{ALLOWED_MIME_TYPES, METADATA_CLIENT_TOKEN};
use spark_shared::protocol::{OutgoingMessage, PushAck, EMIT_SEND_MESSAGE, EMIT_TYPING};
use spark_shared::{
    ApiError, ClientToken, Message, MessageBody, MessageKind, OutgoingFile, SendError, TransportError, UploadError,
    UserId, ValidationError,
};
use spark_net::ProgressFn;

use crate::chat::{parse_user, ChatCore};
use crate::events::CoreUpdate;

impl ChatCore {
    /// Send a message to `recipient` and return the server's copy.
    ///
    /// Nothing is stored unless the server accepted the message.
    pub async fn send(
        &self,
        recipient: &str,
        kind: MessageKind,
        body: MessageBody,
        metadata: Map<String, Value>,
    ) -> Result<Message, SendError> {
        let recipient = parse_user(recipient, "send")?;
        validate_outgoing(kind, &body).map_err(|e| {
            warn!(kind = %kind, error = %e, "Rejected outgoing message");
            e
        })?;

        let token = ClientToken::generate();
        let mut metadata = metadata;
        metadata.insert(
            METADATA_CLIENT_TOKEN.to_string(),
            Value::String(token.as_str().to_string()),
        );
        let outgoing = OutgoingMessage {
            recipient,
            kind,
            body,
            client_token: token,
            metadata,
        };

        let mut message = match self.push_message(&outgoing).await {
            Ok(message) => message,
            Err(e) => {
                debug!(token = %outgoing.client_token, reason = %e, "Falling back to API send");
                self.inner
                    .services
                    .api
                    .send_message(&outgoing)
                    .await
                    .map_err(|e| {
                        warn!(token = %outgoing.client_token, error = %e, "Send failed");
                        e
                    })?
            }
        };
        // The server may omit the token; it is ours either way.
        if message.client_token.is_none() {
            message.client_token = Some(outgoing.client_token.clone());
        }

        info!(
            to = %outgoing.recipient.short(),
            kind = %kind,
            token = %outgoing.client_token,
            "Message sent"
        );
        self.record_message(message.clone()).await;
        Ok(message)
    }

    /// Upload `file`, then send it as a file message.
    ///
    /// Size and type are checked before anything touches the network.
    /// `on_progress` receives the uploader's progress reports unchanged.
    pub async fn send_file(
        &self,
        recipient: &str,
        file: OutgoingFile,
        on_progress: ProgressFn,
    ) -> Result<Message, SendError> {
        let recipient = parse_user(recipient, "send_file")?;
        check_attachment(&file, self.inner.config.max_upload_bytes).map_err(|e| {
            warn!(name = %file.file_name, error = %e, "Rejected attachment");
            e
        })?;

        let attachment = self
            .inner
            .services
            .uploads
            .upload(file, on_progress)
            .await
            .map_err(|e| {
                warn!(error = %e, "Attachment upload failed");
                e
            })?;

        let mut metadata = Map::new();
        metadata.insert("fileName".into(), attachment.file_name.clone().into());
        metadata.insert("fileSize".into(), attachment.file_size.into());
        metadata.insert("mimeType".into(), attachment.mime_type.clone().into());
        metadata.insert("url".into(), attachment.url.clone().into());

        self.send(
            &recipient.to_hex(),
            MessageKind::File,
            MessageBody::File(attachment),
            metadata,
        )
        .await
    }

    /// Tell `counterparty` we are typing.  Fire-and-forget: returns `false`
    /// only for an invalid id, a disconnected transport or no runtime to
    /// emit from.
    pub fn send_typing(&self, counterparty: &str) -> bool {
        let Ok(counterparty) = parse_user(counterparty, "send_typing") else {
            return false;
        };
        if !self.inner.services.transport.is_connected() {
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("send_typing called outside a tokio runtime");
            return false;
        };

        let payload = serde_json::json!({ "to": counterparty, "from": self.local_user() });
        let core = self.clone();
        runtime.spawn(async move {
            if let Err(e) = core.emit_bounded(EMIT_TYPING, payload).await {
                debug!(error = %e, "Typing signal not delivered");
            }
        });
        true
    }

    /// Mark the conversation with `counterparty` read: reset its unread
    /// counter, flag its inbound messages and send a read receipt.
    ///
    /// Local state is updated first and is not rolled back if the receipt
    /// fails; the unsent ids stay queued and go out with the next mark.
    pub async fn mark_conversation_read(&self, counterparty: &str) -> bool {
        let Ok(counterparty) = parse_user(counterparty, "mark_conversation_read") else {
            return false;
        };
        self.mark_read(&counterparty).await;
        true
    }

    pub(crate) async fn mark_read(&self, counterparty: &UserId) {
        let (newly_read, unread_changed, total) = {
            let mut state = self.state();
            let had_unread = state.unread.count(counterparty) > 0;
            state.unread.mark_all_read(counterparty);
            let ids = state.messages.mark_conversation_read(counterparty);
            let newly_read = !ids.is_empty();
            state.queue_receipt(counterparty, ids);
            (newly_read, had_unread, state.unread.total())
        };

        if unread_changed {
            self.emit(CoreUpdate::UnreadChanged {
                counterparty: counterparty.clone(),
                count: 0,
                total,
            });
        }
        if newly_read {
            self.emit(CoreUpdate::MessagesChanged {
                counterparty: counterparty.clone(),
            });
        }
        self.flush_receipts(counterparty).await;
    }

    /// Send queued receipts for `counterparty` until none are left.
    ///
    /// Concurrent callers share the request in flight.  Ids queued while it
    /// was out go in a follow-up request; a failed request puts its ids
    /// back for the next attempt.
    async fn flush_receipts(&self, counterparty: &UserId) {
        loop {
            let due = self.state().receipts_due.contains_key(counterparty);
            if !due {
                return;
            }
            let core = self.clone();
            let key = counterparty.clone();
            let result = self
                .inner
                .receipts
                .run(counterparty.clone(), move || async move { core.send_receipt(&key).await })
                .await;
            if let Err(e) = result {
                warn!(counterparty = %counterparty.short(), error = %e, "Read receipt failed");
                return;
            }
        }
    }

    async fn send_receipt(&self, counterparty: &UserId) -> Result<(), ApiError> {
        let due = self.state().receipts_due.remove(counterparty);
        let Some(ids) = due else {
            return Ok(());
        };
        match self.inner.services.api.mark_read(counterparty, &ids).await {
            Ok(()) => {
                debug!(counterparty = %counterparty.short(), count = ids.len(), "Read receipt sent");
                Ok(())
            }
            Err(e) => {
                self.state().queue_receipt(counterparty, ids);
                Err(e)
            }
        }
    }

    /// Try to deliver over the push transport.  `Ok` only for an
    /// authoritative acknowledgement.
    async fn push_message(&self, outgoing: &OutgoingMessage) -> Result<Message, TransportError> {
        let payload =
            serde_json::to_value(outgoing).map_err(|e| TransportError::Malformed(e.to_string()))?;
        let ack = self.emit_bounded(EMIT_SEND_MESSAGE, payload).await?;
        let ack: PushAck =
            serde_json::from_value(ack).map_err(|e| TransportError::Malformed(e.to_string()))?;
        if let Some(reason) = ack.error.clone().filter(|_| !ack.success) {
            return Err(TransportError::Rejected(reason));
        }
        ack.into_accepted()
            .ok_or_else(|| TransportError::Malformed("acknowledgement is not authoritative".to_string()))
    }

    /// Store a message we sent and move its conversation forward.
    pub(crate) async fn record_message(&self, message: Message) {
        let (counterparty, changed) = {
            let mut state = self.state();
            let counterparty = message.counterparty(state.local_user()).clone();
            (counterparty, state.messages.ingest(message.clone()).changed())
        };
        if changed {
            self.emit(CoreUpdate::MessagesChanged { counterparty });
        }
        self.touch(&message).await;
    }
}

/// Kind and body checks for an outbound message.
fn validate_outgoing(kind: MessageKind, body: &MessageBody) -> Result<(), ValidationError> {
    if !kind.is_sendable() {
        return Err(ValidationError::UnsupportedKind(kind));
    }
    match (kind, body) {
        (MessageKind::File, MessageBody::File(_)) => Ok(()),
        (MessageKind::File, MessageBody::Text(_)) => Err(ValidationError::BodyMismatch(kind)),
        (_, MessageBody::File(_)) => Err(ValidationError::BodyMismatch(kind)),
        (MessageKind::Text, MessageBody::Text(text)) if text.trim().is_empty() => {
            Err(ValidationError::EmptyBody)
        }
        _ => Ok(()),
    }
}

/// Size and type checks for an attachment, run before the upload starts.
fn check_attachment(file: &OutgoingFile, max_size: usize) -> Result<(), UploadError> {
    let size = file.size();
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > max_size {
        return Err(UploadError::TooLarge { size, max: max_size });
    }
    let mime = file.mime_type.trim().to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(UploadError::UnsupportedType(file.mime_type.clone()));
    }
    Ok(())
}
