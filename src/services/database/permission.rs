//! Process-wide permission mode.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Statement classes the process is allowed to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionMode {
    ReadOnly,
    ReadWrite,
}

impl Default for PermissionMode {
    fn default() -> Self {
        PermissionMode::ReadOnly
    }
}

impl PermissionMode {
    /// Parse a wire-level mode string. Accepts exactly READ_ONLY and
    /// READ_WRITE, case-insensitively.
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "READ_ONLY" => Ok(PermissionMode::ReadOnly),
            "READ_WRITE" => Ok(PermissionMode::ReadWrite),
            other => Err(CoreError::validation(format!(
                "Unknown permission mode '{}', expected READ_ONLY or READ_WRITE",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::ReadOnly => "READ_ONLY",
            PermissionMode::ReadWrite => "READ_WRITE",
        }
    }
}

/// Single owner of the process-wide [`PermissionMode`].
///
/// `set` is atomic with respect to concurrent `get` calls; an execution
/// request uses the mode it observed when validation began, so a flip never
/// lands mid-request.
#[derive(Debug)]
pub struct PermissionStore {
    read_only: AtomicBool,
}

impl PermissionStore {
    pub fn new(initial: PermissionMode) -> Self {
        Self {
            read_only: AtomicBool::new(initial == PermissionMode::ReadOnly),
        }
    }

    pub fn get(&self) -> PermissionMode {
        if self.read_only.load(Ordering::SeqCst) {
            PermissionMode::ReadOnly
        } else {
            PermissionMode::ReadWrite
        }
    }

    pub fn set(&self, mode: PermissionMode) {
        self.read_only
            .store(mode == PermissionMode::ReadOnly, Ordering::SeqCst);
        tracing::info!("Permission mode set to {}", mode.as_str());
    }
}
