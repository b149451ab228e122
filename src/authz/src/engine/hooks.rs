//! Rule-set update hooks
//!
//! Hooks run synchronously inside `replace_rules`, while the writer guard is
//! held. A failing or panicking hook is logged and skipped; it never stops
//! other hooks or the swap itself.

use parking_lot::RwLock;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use super::PermissionEngine;
use crate::rule::Rule;

/// When a hook runs relative to the snapshot swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    /// New index is built; readers still see the previous rules
    Before,
    /// New index is installed
    After,
}

/// Handle returned by `PermissionEngine::on_update`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Error type hooks may return
pub type HookError = Box<dyn Error + Send + Sync>;

/// What a hook receives
pub struct UpdateEvent<'a> {
    pub phase: UpdatePhase,
    /// The incoming rule list
    pub rules: &'a [Rule],
    pub engine: &'a PermissionEngine,
}

impl fmt::Debug for UpdateEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateEvent")
            .field("phase", &self.phase)
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

pub(crate) type UpdateHook =
    Arc<dyn Fn(&UpdateEvent<'_>) -> Result<(), HookError> + Send + Sync>;

#[derive(Default)]
pub(crate) struct HookRegistry {
    next_id: AtomicU64,
    hooks: RwLock<Vec<(HookId, UpdatePhase, UpdateHook)>>,
}

impl HookRegistry {
    pub(crate) fn register(&self, phase: UpdatePhase, hook: UpdateHook) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks.write().push((id, phase, hook));
        id
    }

    pub(crate) fn remove(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|(hook_id, _, _)| *hook_id != id);
        hooks.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// Run every hook registered for the event's phase, in registration order
    pub(crate) fn run(&self, event: &UpdateEvent<'_>) {
        // Hooks may register or remove hooks; run from a copy.
        let hooks: Vec<(HookId, UpdateHook)> = self
            .hooks
            .read()
            .iter()
            .filter(|(_, phase, _)| *phase == event.phase)
            .map(|(id, _, hook)| (*id, Arc::clone(hook)))
            .collect();

        for (id, hook) in hooks {
            match panic::catch_unwind(AssertUnwindSafe(|| hook(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(hook = id.0, phase = ?event.phase, error = %e, "Update hook failed");
                }
                Err(_) => {
                    warn!(hook = id.0, phase = ?event.phase, "Update hook panicked");
                }
            }
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.len())
            .finish()
    }
}
