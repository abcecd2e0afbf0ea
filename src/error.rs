use thiserror::Error;

use crate::input_hooks::HookType;

/// Failure of a hook lifecycle transition.
///
/// Neither variant is fatal: after `Install` the manager is still uninstalled
/// and may be retried, after `Uninstall` it is uninstalled regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("installing the {hook_type} hook failed with code {code}")]
    Install { hook_type: HookType, code: u32 },

    #[error("removing the {hook_type} hook failed with code {code}")]
    Uninstall { hook_type: HookType, code: u32 },
}

impl HookError {
    pub fn hook_type(&self) -> HookType {
        match self {
            HookError::Install { hook_type, .. } | HookError::Uninstall { hook_type, .. } => {
                *hook_type
            }
        }
    }

    /// Platform error code reported by the binding.
    pub fn code(&self) -> u32 {
        match self {
            HookError::Install { code, .. } | HookError::Uninstall { code, .. } => *code,
        }
    }
}

/// A hook invocation whose payload could not be turned into an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("hook payload is missing or belongs to another hook type")]
    MissingPayload,

    #[error("unrecognised message {0:#06x}")]
    UnknownMessage(u32),

    #[error("malformed payload for message {0:#06x}")]
    Malformed(u32),
}
