use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global request ID counter for correlation
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Maximum message size for IPC (256KB, a submission carries canvas hashes and font lists)
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

/// Maximum capture name length
pub const MAX_CAPTURE_NAME_LENGTH: usize = 64;

/// Label the browser client sends when no capture name was given
pub const NAME_NOT_AVAILABLE: &str = "Not available";

/// Generate a unique request ID for correlation
pub fn generate_request_id() -> u64 {
    REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation and debugging
    pub id: u64,
    /// The actual request
    #[serde(flatten)]
    pub request: Request,
}

impl RequestEnvelope {
    pub fn new(request: Request) -> Self {
        Self {
            id: generate_request_id(),
            request,
        }
    }

    pub fn with_id(request: Request, id: u64) -> Self {
        Self { id, request }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum Request {
    Ping,
    Version,
    /// Run one fingerprint submission through the identity engine
    Check { submission: Value },
    /// Store a submission as a named capture without matching it
    SaveCapture { name: String, submission: Value },
    /// Counts over the known-identity store
    Stats,
}

impl Request {
    /// Validate request parameters before sending to daemon
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::Ping | Request::Version | Request::Stats => Ok(()),
            Request::Check { submission } => validate_submission_shape(submission),
            Request::SaveCapture { name, submission } => {
                validate_capture_name(name)?;
                validate_submission_shape(submission)
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Ping => "Ping",
            Request::Version => "Version",
            Request::Check { .. } => "Check",
            Request::SaveCapture { .. } => "SaveCapture",
            Request::Stats => "Stats",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to
    pub id: u64,
    /// The actual response
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseEnvelope {
    pub fn new(id: u64, response: Response) -> Self {
        Self { id, response }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    #[serde(rename = "ok")]
    Ok(ResponseData),
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StoreStats>,
}

impl ResponseData {
    pub fn none() -> Self { Self::default() }
    pub fn string(v: String) -> Self { Self { value: Some(v), ..Self::default() } }
    pub fn checked(c: CheckReport) -> Self { Self { check: Some(c), ..Self::default() } }
    pub fn store_stats(s: StoreStats) -> Self { Self { stats: Some(s), ..Self::default() } }
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(ResponseData::none())
    }

    pub fn ok_string(s: impl Into<String>) -> Self {
        Response::Ok(ResponseData::string(s.into()))
    }

    pub fn ok_check(c: CheckReport) -> Self {
        Response::Ok(ResponseData::checked(c))
    }

    pub fn ok_stats(s: StoreStats) -> Self {
        Response::Ok(ResponseData::store_stats(s))
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error { message: msg.into() }
    }
}

// ============================================================================
// Engine reports
// ============================================================================

/// Resolution part of a farbling report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionCheck {
    pub detected: bool,
    /// Closest catalog resolution, or the reported one when nothing closer exists.
    /// `None` when the reported values were unusable.
    pub matched_resolution: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarblingReport {
    pub overall_detected: bool,
    pub resolution: ResolutionCheck,
    pub cpu_detected: bool,
    pub memory_detected: bool,
}

/// Result of one matching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub matched: bool,
    pub score: u32,
    /// Matched identity, -1 when nothing matched
    pub identity_id: i64,
    pub log_index: u64,
}

impl MatchOutcome {
    pub fn found(identity_id: u64, log_index: u64, score: u32) -> Self {
        Self {
            matched: true,
            score,
            identity_id: identity_id as i64,
            log_index,
        }
    }

    pub fn no_match(score: u32) -> Self {
        Self {
            matched: false,
            score,
            identity_id: -1,
            log_index: 0,
        }
    }

    pub fn identity(&self) -> Option<u64> {
        if self.matched && self.identity_id >= 0 {
            Some(self.identity_id as u64)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    /// No existing identity matched
    New,
    /// Every compared column matched an existing record
    ExactRevisit,
    /// Both strategies matched the same identity
    Agree,
    /// Strategies matched different identities
    Conflict,
    NaiveOnly,
    ComplexOnly,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::New => "new",
            Decision::ExactRevisit => "exact-revisit",
            Decision::Agree => "agree",
            Decision::Conflict => "conflict",
            Decision::NaiveOnly => "naive-only",
            Decision::ComplexOnly => "complex-only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub decision: Decision,
    pub identity_id: u64,
    pub log_index: u64,
    /// Whether the submission is written to the store
    pub append: bool,
}

/// Compact summary returned to the browser client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub success: bool,
    pub naive: bool,
    pub complex: bool,
    pub resolution_modified: bool,
    pub cpu_modified: bool,
    pub memory_modified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub summary: CheckSummary,
    pub resolution: Resolution,
    pub naive: MatchOutcome,
    pub complex: MatchOutcome,
    pub farbling: FarblingReport,
    /// Capture file written for a named submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub path: String,
    pub records: usize,
    pub identities: usize,
    /// Rows whose attributes could not be parsed
    pub malformed: usize,
}

// ============================================================================
// Validation
// ============================================================================

pub fn validate_submission_shape(submission: &Value) -> Result<(), String> {
    let obj = submission
        .as_object()
        .ok_or_else(|| "Submission must be a JSON object".to_string())?;
    match obj.get("Attributes") {
        Some(Value::Object(_)) => Ok(()),
        Some(_) => Err("Attributes must be a JSON object".into()),
        None => Err("Submission has no Attributes".into()),
    }
}

/// Capture names become file names, so only a conservative character set is allowed
pub fn validate_capture_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Capture name cannot be empty".into());
    }

    if name.len() > MAX_CAPTURE_NAME_LENGTH {
        return Err(format!(
            "Capture name too long: {} > {} chars",
            name.len(),
            MAX_CAPTURE_NAME_LENGTH
        ));
    }

    if name.contains("..") || name.starts_with('.') {
        return Err("Capture name cannot start with a dot or contain '..'".into());
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' && c != ' ' {
            return Err(format!("Capture name contains invalid character: {:?}", c));
        }
    }

    Ok(())
}
