/// Bulk folder encrypt/decrypt serializer
///
/// Validates input before anything reaches the engine and lets at most one
/// folder operation run at a time. A request made while one is running is
/// ignored, not queued. Engine messages are passed through untouched.

use thiserror::Error;
use tracing::info;

use crate::bridge::{BridgeError, SharedEngine};

/// Labels used for the first two encrypt passwords
const PASSWORD_LABELS: &[&str] = &["primary password", "backup password"];

/// Why a request was refused before reaching the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("choose a folder first")]
    MissingFolder,

    #[error("at least {min} passwords are required, got {given}")]
    TooFewPasswords { min: usize, given: usize },

    #[error("{label} must be at least {min} characters")]
    PasswordTooShort { label: String, min: usize },

    #[error("{label} repeats an earlier password")]
    DuplicatePassword { label: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderOpKind {
    Encrypt,
    Decrypt,
}

/// Terminal result of one operation, message verbatim from the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderOpResult {
    pub kind: FolderOpKind,
    pub folder: String,
    /// Success or failure text, exactly as the engine produced it
    pub outcome: Result<String, String>,
}

impl FolderOpResult {
    pub fn message(&self) -> &str {
        match &self.outcome {
            Ok(message) | Err(message) => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FolderOpStatus {
    #[default]
    Idle,
    /// Busy; only the completion of `job` clears it
    InFlight {
        job: u64,
        kind: FolderOpKind,
    },
    /// Last operation ended; a new one may start
    Done(FolderOpResult),
}

/// Whether a request was taken
pub enum Admission {
    Accepted(FolderOpJob),
    /// Another operation is in flight
    Ignored,
}

enum Operation {
    Encrypt { passwords: Vec<String> },
    Decrypt { password: String },
}

/// An accepted operation, ready to run
pub struct FolderOpJob {
    id: u64,
    folder: String,
    operation: Operation,
}

impl FolderOpJob {
    pub fn kind(&self) -> FolderOpKind {
        match self.operation {
            Operation::Encrypt { .. } => FolderOpKind::Encrypt,
            Operation::Decrypt { .. } => FolderOpKind::Decrypt,
        }
    }

    pub async fn run(self, engine: SharedEngine) -> FolderOpCompletion {
        let kind = self.kind();
        let result = match self.operation {
            Operation::Encrypt { passwords } => engine.encrypt_folder(self.folder.clone(), passwords).await,
            Operation::Decrypt { password } => engine.decrypt_folder(self.folder.clone(), password).await,
        };

        FolderOpCompletion {
            job: self.id,
            kind,
            folder: self.folder,
            result,
        }
    }
}

/// Raw result of a finished job, handed back to `FolderOpSerializer::finish`
#[derive(Debug, Clone)]
pub struct FolderOpCompletion {
    job: u64,
    kind: FolderOpKind,
    folder: String,
    result: Result<String, BridgeError>,
}

/// Check an encrypt request: a folder and at least two distinct passwords,
/// each at least `min_len` characters
pub fn validate_encrypt(folder: &str, passwords: &[String], min_len: usize) -> Result<(), ValidationFailure> {
    if folder.trim().is_empty() {
        return Err(ValidationFailure::MissingFolder);
    }

    for (i, password) in passwords.iter().enumerate() {
        let label = password_label(i);
        if password.chars().count() < min_len {
            return Err(ValidationFailure::PasswordTooShort { label, min: min_len });
        }
        if passwords[..i].contains(password) {
            return Err(ValidationFailure::DuplicatePassword { label });
        }
    }

    if passwords.len() < PASSWORD_LABELS.len() {
        return Err(ValidationFailure::TooFewPasswords {
            min: PASSWORD_LABELS.len(),
            given: passwords.len(),
        });
    }
    Ok(())
}

/// Check a decrypt request: a folder and one password of at least `min_len`
pub fn validate_decrypt(folder: &str, password: &str, min_len: usize) -> Result<(), ValidationFailure> {
    if folder.trim().is_empty() {
        return Err(ValidationFailure::MissingFolder);
    }
    if password.chars().count() < min_len {
        return Err(ValidationFailure::PasswordTooShort {
            label: "password".to_string(),
            min: min_len,
        });
    }
    Ok(())
}

fn password_label(index: usize) -> String {
    PASSWORD_LABELS
        .get(index)
        .map(|label| label.to_string())
        .unwrap_or_else(|| format!("password #{}", index + 1))
}

/// Single-flight gate for folder operations
#[derive(Debug)]
pub struct FolderOpSerializer {
    /// Minimum length of every password, in characters
    min_password_len: usize,
    status: FolderOpStatus,
    /// Jobs admitted so far; the next job id is one more
    jobs: u64,
}

impl FolderOpSerializer {
    pub fn new(min_password_len: usize) -> Self {
        Self {
            min_password_len,
            status: FolderOpStatus::Idle,
            jobs: 0,
        }
    }

    pub fn min_password_len(&self) -> usize {
        self.min_password_len
    }

    pub fn status(&self) -> &FolderOpStatus {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.status, FolderOpStatus::InFlight { .. })
    }

    /// Start an encrypt unless busy or invalid. Busy wins over invalid.
    pub fn request_encrypt(&mut self, folder: &str, passwords: &[String]) -> Result<Admission, ValidationFailure> {
        if self.is_busy() {
            info!("⏳ Encrypt request ignored, an operation is running");
            return Ok(Admission::Ignored);
        }
        validate_encrypt(folder, passwords, self.min_password_len)?;

        Ok(Admission::Accepted(self.admit(
            folder,
            Operation::Encrypt {
                passwords: passwords.to_vec(),
            },
        )))
    }

    /// Start a decrypt with one password; same gating as `request_encrypt`
    pub fn request_decrypt(&mut self, folder: &str, password: &str) -> Result<Admission, ValidationFailure> {
        if self.is_busy() {
            info!("⏳ Decrypt request ignored, an operation is running");
            return Ok(Admission::Ignored);
        }
        validate_decrypt(folder, password, self.min_password_len)?;

        Ok(Admission::Accepted(self.admit(
            folder,
            Operation::Decrypt {
                password: password.to_string(),
            },
        )))
    }

    fn admit(&mut self, folder: &str, operation: Operation) -> FolderOpJob {
        self.jobs += 1;
        let job = FolderOpJob {
            id: self.jobs,
            folder: folder.trim().to_string(),
            operation,
        };
        info!("🔐 Folder operation {} ({:?}) started on {}", job.id, job.kind(), job.folder);
        self.status = FolderOpStatus::InFlight {
            job: job.id,
            kind: job.kind(),
        };
        job
    }

    /// Record the end of the running operation. Clears the busy flag once;
    /// completions for anything else are ignored.
    pub fn finish(&mut self, completion: FolderOpCompletion) -> Option<&FolderOpResult> {
        match self.status {
            FolderOpStatus::InFlight { job, .. } if job == completion.job => {}
            _ => return None,
        }

        // Engine errors display as their own text
        let outcome = completion.result.map_err(|e| e.to_string());
        info!("🏁 Folder operation {} finished (ok: {})", completion.job, outcome.is_ok());
        self.status = FolderOpStatus::Done(FolderOpResult {
            kind: completion.kind,
            folder: completion.folder,
            outcome,
        });

        match &self.status {
            FolderOpStatus::Done(result) => Some(result),
            _ => None,
        }
    }
}
