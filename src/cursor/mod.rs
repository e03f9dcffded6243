//! Resumable pagination state and its token codec.
//!
//! A [`Cursor`] carries everything needed to resume a references request on
//! the next page: which phase is active, the offsets within each phase, and
//! data cached on the first page (adjusted uploads, ordered monikers,
//! definition uploads) so later pages see exactly the same inputs.
//!
//! Tokens are URL-safe base64 of a versioned JSON envelope. Tokens written by
//! a different schema version are rejected instead of being misread.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::types::{Moniker, Position, UploadId};

/// Schema version written into every token.
pub const CURSOR_VERSION: u32 = 1;

/// Search phase. Transitions are one-way: `Local -> Remote -> Done`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Local,
    Remote,
    Done,
}

/// Offset into the candidate upload scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOffset {
    /// Resume the scan at this record
    Next(usize),
    /// Every candidate record has been scanned
    Exhausted,
}

impl Default for ScanOffset {
    fn default() -> Self {
        Self::Next(0)
    }
}

impl ScanOffset {
    pub fn is_exhausted(self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// An adjusted upload as stashed on the cursor; the upload record itself is
/// re-hydrated by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorAdjustedUpload {
    pub upload_id: UploadId,
    pub adjusted_path: String,
    pub adjusted_position: Position,
    pub adjusted_path_in_bundle: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub phase: Phase,
    pub adjusted_uploads: Option<Vec<CursorAdjustedUpload>>,
    pub ordered_monikers: Option<Vec<Moniker>>,
    /// `None` until computed; `Some(vec![])` once computed and empty
    pub definition_upload_ids: Option<Vec<UploadId>>,
    /// Index into the adjusted uploads currently being drained
    pub local_batch_offset: usize,
    /// Offset within that upload's local result set
    pub local_offset: usize,
    pub remote_batch_offset: ScanOffset,
    /// Offset within the current batch's moniker search
    pub remote_offset: usize,
    /// Candidate uploads still to be searched in the current batch
    pub batch_ids: Vec<UploadId>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    cursor: &'a Cursor,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    cursor: serde_json::Value,
}

/// Decode a continuation token. An empty token starts a fresh request.
pub fn decode_cursor(token: &str) -> Result<Cursor, ResolveError> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(Cursor::default());
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| ResolveError::MalformedCursor(format!("invalid encoding: {e}")))?;

    let envelope: Envelope = serde_json::from_slice(&bytes)
        .map_err(|e| ResolveError::MalformedCursor(format!("invalid envelope: {e}")))?;

    if envelope.version != CURSOR_VERSION {
        return Err(ResolveError::MalformedCursor(format!(
            "unsupported cursor version {} (expected {})",
            envelope.version, CURSOR_VERSION
        )));
    }

    let cursor: Cursor = serde_json::from_value(envelope.cursor)
        .map_err(|e| ResolveError::MalformedCursor(format!("invalid cursor body: {e}")))?;

    Ok(cursor)
}

/// Encode a cursor as a continuation token. The result is never empty, so it
/// cannot be mistaken for the end of a result set.
pub fn encode_cursor(cursor: &Cursor) -> Result<String, ResolveError> {
    let envelope = EnvelopeRef {
        version: CURSOR_VERSION,
        cursor,
    };
    let json = serde_json::to_vec(&envelope)
        .map_err(|e| ResolveError::MalformedCursor(format!("cannot encode cursor: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}
