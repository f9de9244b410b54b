//! Scripted replays against a real controller.

use std::path::Path;

use applock_core::{AppLockController, AppState, LockSnapshot};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::host::{ManualLifecycle, PromptOutcome, ScriptedPrompt};

/// A replay: the stored preference at start plus the steps to run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Whether the biometrics flag is already persisted when the app starts.
    #[serde(default)]
    pub enabled: bool,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read script {}", path.display()))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).wrap_err("malformed script")
    }
}

fn default_reason() -> String {
    "Unlock to continue".to_string()
}

/// One host event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Initialize,
    Session {
        active: bool,
    },
    SetEnabled {
        enabled: bool,
    },
    LockNow,
    Unlock {
        #[serde(default = "default_reason")]
        reason: String,
        #[serde(default)]
        outcome: PromptOutcome,
    },
    EnsureUnlocked {
        #[serde(default = "default_reason")]
        reason: String,
        #[serde(default)]
        outcome: PromptOutcome,
    },
    Transition {
        previous: AppState,
        next: AppState,
    },
}

impl Step {
    const fn name(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Session { .. } => "session",
            Self::SetEnabled { .. } => "set_enabled",
            Self::LockNow => "lock_now",
            Self::Unlock { .. } => "unlock",
            Self::EnsureUnlocked { .. } => "ensure_unlocked",
            Self::Transition { .. } => "transition",
        }
    }
}

/// State after one step, printed as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
    pub state: LockSnapshot,
}

/// Runs every step in order. Stops at the first step that returns an error.
pub async fn run(
    controller: &AppLockController,
    prompt: &ScriptedPrompt,
    lifecycle: &ManualLifecycle,
    steps: &[Step],
) -> Result<Vec<StepReport>> {
    let mut reports = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        tracing::debug!(step = index, op = step.name(), "running step");
        let result = match step {
            Step::Initialize => {
                controller.initialize().await;
                None
            }
            Step::Session { active } => {
                controller.set_session_active(*active);
                None
            }
            Step::SetEnabled { enabled } => {
                controller
                    .set_enabled(*enabled)
                    .await
                    .wrap_err_with(|| format!("step {index}: set_enabled failed"))?;
                None
            }
            Step::LockNow => {
                controller.lock_now();
                None
            }
            Step::Unlock { reason, outcome } => {
                prompt.prepare(Some(*outcome));
                Some(controller.unlock(reason.clone()).await)
            }
            Step::EnsureUnlocked { reason, outcome } => {
                prompt.prepare(Some(*outcome));
                Some(controller.ensure_unlocked(reason.clone()).await)
            }
            Step::Transition { previous, next } => {
                lifecycle.emit(*previous, *next);
                None
            }
        };
        // an unused outcome must not leak into a later step
        prompt.prepare(None);

        reports.push(StepReport {
            step: index,
            op: step.name(),
            result,
            state: controller.snapshot(),
        });
    }
    Ok(reports)
}
