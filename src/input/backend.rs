//! Backend trait for executing action commands

use tracing::info;

use super::command::ActionCommand;
use crate::pointer::ScreenSize;

/// Errors raised while executing an action
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to create event source - check Accessibility permissions")]
    EventSource,

    #[error("failed to create {0} event")]
    EventCreation(&'static str),

    #[error("synthetic input unavailable: {0}")]
    Unavailable(String),
}

/// Something that can perform pointer and keyboard actions
pub trait InputBackend {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Execute a single command, blocking until it has been issued
    fn execute(&mut self, command: &ActionCommand) -> Result<(), InputError>;

    /// Size of the target display in pixels
    fn screen_size(&self) -> ScreenSize;
}

impl<B: InputBackend + ?Sized> InputBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(&mut self, command: &ActionCommand) -> Result<(), InputError> {
        (**self).execute(command)
    }

    fn screen_size(&self) -> ScreenSize {
        (**self).screen_size()
    }
}

/// Backend that only logs what it would have done
#[derive(Debug)]
pub struct DryRunBackend {
    screen: ScreenSize,
}

impl DryRunBackend {
    pub fn new(screen: ScreenSize) -> Self {
        Self { screen }
    }
}

impl InputBackend for DryRunBackend {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn execute(&mut self, command: &ActionCommand) -> Result<(), InputError> {
        info!(%command, "dry-run action");
        Ok(())
    }

    fn screen_size(&self) -> ScreenSize {
        self.screen
    }
}
