// SPDX-License-Identifier: CEPL-1.0
//! Bring-up state machine and the release stack that backs teardown.
//!
//! Every owning handle gets its release action pushed at the moment it is
//! acquired. Teardown pops the stack, so handles are released in exactly the
//! reverse of acquisition order, whether bring-up completed or aborted part
//! way through.
use tracing::{debug, warn};

use crate::error::{InitError, InitErrorKind, InitStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Uninit,
    WindowUp,
    InstanceUp,
    DebugUp,
    SurfaceUp,
    DeviceUp,
    SwapUp,
    Running,
    TearingDown,
    Done,
}

impl InitStage {
    /// State reached once this stage's handle is held. Physical devices are
    /// borrowed from the instance and do not advance the machine.
    fn acquired_state(self) -> Option<LifecycleState> {
        match self {
            InitStage::Window => Some(LifecycleState::WindowUp),
            InitStage::Instance => Some(LifecycleState::InstanceUp),
            InitStage::DebugMessenger => Some(LifecycleState::DebugUp),
            InitStage::Surface => Some(LifecycleState::SurfaceUp),
            InitStage::PhysicalDevice => None,
            InitStage::Device => Some(LifecycleState::DeviceUp),
            InitStage::SwapChain => Some(LifecycleState::SwapUp),
        }
    }
}

type Release = Box<dyn FnOnce()>;

pub struct Lifecycle {
    state: LifecycleState,
    releases: Vec<(InitStage, Release)>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Uninit,
            releases: Vec::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Stages whose release actions are still pending, oldest first.
    pub fn held(&self) -> impl Iterator<Item = InitStage> + '_ {
        self.releases.iter().map(|(stage, _)| *stage)
    }

    /// Records a stage whose handle is released by its owner rather than by
    /// this stack (the window outlives every graphics object).
    pub fn note_acquired(&mut self, stage: InitStage) {
        self.advance(stage);
    }

    /// Runs a stage that acquires nothing to release. On failure everything
    /// held so far is torn down before the error is returned.
    pub fn step<T>(
        &mut self,
        stage: InitStage,
        run: impl FnOnce() -> Result<T, InitErrorKind>,
    ) -> Result<T, InitError> {
        run().map_err(|kind| self.fail(kind.at(stage)))
    }

    /// Acquires an owning handle and pushes its release action.
    ///
    /// `release` is handed the freshly acquired value and must return a
    /// closure owning whatever it needs to destroy it.
    pub fn acquire<T, R>(
        &mut self,
        stage: InitStage,
        acquire: impl FnOnce() -> Result<T, InitErrorKind>,
        release: impl FnOnce(&T) -> R,
    ) -> Result<T, InitError>
    where
        R: FnOnce() + 'static,
    {
        let value = self.step(stage, acquire)?;
        self.releases.push((stage, Box::new(release(&value))));
        self.advance(stage);
        Ok(value)
    }

    pub fn enter_running(&mut self) {
        if self.state != LifecycleState::SwapUp {
            warn!(state = ?self.state, "entering main loop before swap chain is up");
        }
        self.transition(LifecycleState::Running);
    }

    /// Releases every held handle in reverse acquisition order. Idempotent.
    pub fn teardown(&mut self) {
        if self.state == LifecycleState::Done {
            return;
        }
        self.transition(LifecycleState::TearingDown);
        while let Some((stage, release)) = self.releases.pop() {
            debug!(%stage, "releasing");
            release();
        }
        self.transition(LifecycleState::Done);
    }

    fn fail(&mut self, err: InitError) -> InitError {
        warn!(state = ?self.state, "{err}; tearing down");
        self.teardown();
        err
    }

    fn advance(&mut self, stage: InitStage) {
        if let Some(next) = stage.acquired_state() {
            self.transition(next);
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!(from = ?self.state, to = ?next, "lifecycle");
        self.state = next;
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.teardown();
    }
}
