/// Length of a textual object id (12 bytes, hex encoded)
pub const OBJECT_ID_HEX_LEN: usize = 24;

/// Object id size in bytes
pub const OBJECT_ID_SIZE: usize = 12;

/// Window during which a typing signal counts as active, in milliseconds
pub const TYPING_WINDOW_MS: u64 = 3_000;

/// Bounded wait for a push-transport acknowledgement before falling back
/// to the request/response API, in milliseconds
pub const PUSH_TIMEOUT_MS: u64 = 4_000;

/// Default per-request timeout for the HTTP API, in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Maximum attachment size in bytes (5 MiB)
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Upload body chunk size in bytes (64 KiB)
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// MIME types accepted for attachments
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "audio/mpeg",
    "audio/wav",
    "video/mp4",
    "video/quicktime",
];

/// Metadata key carrying the idempotency token on the API fallback path
pub const METADATA_CLIENT_TOKEN: &str = "clientToken";

/// Length of the random suffix of a client token
pub const CLIENT_TOKEN_SUFFIX_LEN: usize = 10;
