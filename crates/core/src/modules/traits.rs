use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Error type returned by module lifecycle methods.
pub type ModuleError = Box<dyn std::error::Error + Send + Sync>;

/// Unique identifier for a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub &'static str);

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Events delivered to a running module
#[derive(Debug, Clone)]
pub enum ModuleEvent<C> {
    /// Module-specific command
    Command(C),
    /// System events
    Shutdown,
}

/// Messages passed from a module back to its host
#[derive(Debug)]
pub enum ModuleMessage<E> {
    Event(E),
    Status(String),
    Error(String),
}

/// Trait that all async modules must implement
#[async_trait]
pub trait AsyncModule: Send {
    /// Commands accepted by the module
    type Command: Send + 'static;
    /// Events produced by the module
    type Event: Send + 'static;

    /// Get the unique identifier for this module
    fn id(&self) -> ModuleId;

    /// Initialize the module (called once at startup)
    async fn initialize(&mut self) -> Result<(), ModuleError>;

    /// Start the module's main loop
    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent<Self::Command>>,
        tx: mpsc::Sender<ModuleMessage<Self::Event>>,
    ) -> Result<(), ModuleError>;

    /// Shutdown the module gracefully
    async fn shutdown(&mut self) -> Result<(), ModuleError>;

    /// Get the module's status
    fn status(&self) -> HashMap<String, String>;
}
