/*
 * Cross-platform fallback backend.
 *
 * Installs nothing into the OS. The host toolkit removes its own decorations
 * and forwards pointer events through `FramelessManager::dispatch`; moves and
 * resizes are either delegated to the toolkit or performed by the engine from
 * pointer deltas.
 */

use super::{InstalledHook, PlatformBackend};
use crate::error::Result;
use crate::interceptor::MessageRouter;
use crate::registry::HookGuard;
use crate::types::WindowHandle;

use std::sync::Weak;

#[derive(Debug, Default)]
pub struct FallbackBackend;

impl FallbackBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn install_hook(&self, window: WindowHandle, _router: Weak<dyn MessageRouter>) -> Result<InstalledHook> {
        log::debug!("fallback: {window} is driven by host events");
        Ok(InstalledHook {
            original_proc: 0,
            guard: HookGuard::noop(window),
        })
    }
}
