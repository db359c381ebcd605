//! Stored authentication metadata.
//!
//! The browser keeps whether a passcode is set, whether biometrics are
//! enrolled, how long a validation stays fresh and when the user last
//! validated. The guard only reads it to decide whether a returning user
//! must be challenged, and writes back the validation timestamp.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthMethod;
use crate::error::{GuardError, Result};

/// How long a successful validation spares the user a new prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasscodeInterval {
    #[default]
    Immediately,
    OneMinute,
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    OneHour,
}

impl PasscodeInterval {
    pub fn duration(self) -> Duration {
        let secs = match self {
            Self::Immediately => 0,
            Self::OneMinute => 60,
            Self::FiveMinutes => 5 * 60,
            Self::TenMinutes => 10 * 60,
            Self::FifteenMinutes => 15 * 60,
            Self::OneHour => 60 * 60,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationInfo {
    pub passcode_enabled: bool,
    pub use_biometrics: bool,
    pub required_interval: PasscodeInterval,
    /// Unix seconds of the last successful validation.
    pub last_validated_at: Option<u64>,
}

impl AuthenticationInfo {
    /// Passcode protection with an immediate re-prompt.
    pub fn with_passcode() -> Self {
        Self {
            passcode_enabled: true,
            ..Self::default()
        }
    }

    pub fn requires_validation(&self, now: SystemTime) -> bool {
        if !self.passcode_enabled {
            return false;
        }
        let Some(last) = self.last_validated_at else {
            return true;
        };
        let interval = self.required_interval.duration();
        if interval.is_zero() {
            return true;
        }
        // Clock moved backwards: do not trust the stored timestamp.
        let now = unix_secs(now);
        if now < last {
            return true;
        }
        Duration::from_secs(now - last) >= interval
    }

    pub fn record_validation(&mut self, now: SystemTime) {
        self.last_validated_at = Some(unix_secs(now));
    }

    /// Methods offered to the user, strongest convenience first. Biometrics
    /// are only offered when both enrolled and allowed by the config.
    pub fn methods(&self, allow_biometrics: bool) -> Vec<AuthMethod> {
        let mut methods = Vec::with_capacity(2);
        if self.use_biometrics && allow_biometrics {
            methods.push(AuthMethod::Biometric);
        }
        methods.push(AuthMethod::Passcode);
        methods
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Where [`AuthenticationInfo`] lives.
pub trait AuthInfoStore {
    /// `Ok(None)` when nothing was ever stored.
    fn load(&self) -> Result<Option<AuthenticationInfo>>;
    fn save(&self, info: &AuthenticationInfo) -> Result<()>;
}

/// In-memory store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthStore {
    slot: Rc<RefCell<Option<AuthenticationInfo>>>,
}

impl MemoryAuthStore {
    pub fn new(info: Option<AuthenticationInfo>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(info)),
        }
    }

    pub fn get(&self) -> Option<AuthenticationInfo> {
        self.slot.borrow().clone()
    }
}

impl AuthInfoStore for MemoryAuthStore {
    fn load(&self) -> Result<Option<AuthenticationInfo>> {
        Ok(self.get())
    }

    fn save(&self, info: &AuthenticationInfo) -> Result<()> {
        *self.slot.borrow_mut() = Some(info.clone());
        Ok(())
    }
}

/// TOML file store.
#[derive(Debug, Clone)]
pub struct FileAuthStore {
    path: PathBuf,
}

impl FileAuthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuthInfoStore for FileAuthStore {
    fn load(&self) -> Result<Option<AuthenticationInfo>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GuardError::AuthStore(e)),
        };
        Ok(Some(toml::from_str(&content)?))
    }

    fn save(&self, info: &AuthenticationInfo) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(GuardError::AuthStore)?;
        }
        let content = toml::to_string_pretty(info)?;
        fs::write(&self.path, content).map_err(GuardError::AuthStore)?;
        info!(path = %self.path.display(), "Authentication metadata saved");
        Ok(())
    }
}
