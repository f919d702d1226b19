use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{AsyncModule, ModuleError, ModuleEvent, ModuleId, ModuleMessage};

const CHANNEL_CAPACITY: usize = 1000;

/// Runs one module in its own task and routes commands and messages.
pub struct ModuleHost<C, E> {
    id: ModuleId,
    sender: mpsc::Sender<ModuleEvent<C>>,
    message_receiver: Option<mpsc::Receiver<ModuleMessage<E>>>,
    handle: Option<JoinHandle<()>>,
}

impl<C, E> ModuleHost<C, E>
where
    C: Send + 'static,
    E: Send + 'static,
{
    /// Initialize the module and spawn its main loop.
    pub async fn start<M>(mut module: M) -> Result<Self, ModuleError>
    where
        M: AsyncModule<Command = C, Event = E> + 'static,
    {
        let id = module.id();
        match module.initialize().await {
            Ok(()) => log::info!("Module {} initialized successfully", id),
            Err(e) => {
                log::error!("Failed to initialize module {}: {}", id, e);
                return Err(format!("{} module error: {}", id, e).into());
            }
        }

        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (message_tx, message_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            if let Err(e) = module.run(event_rx, message_tx.clone()).await {
                let _ = message_tx
                    .send(ModuleMessage::Error(format!("Module {} error: {}", id, e)))
                    .await;
            }
            if let Err(e) = module.shutdown().await {
                log::error!("Module {} shutdown error: {}", id, e);
            }
        });

        Ok(Self {
            id,
            sender: event_tx,
            message_receiver: Some(message_rx),
            handle: Some(handle),
        })
    }

    /// Identifier of the hosted module.
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Send a command to the module
    pub async fn send(&self, command: C) -> Result<(), String> {
        self.sender
            .send(ModuleEvent::Command(command))
            .await
            .map_err(|e| format!("Failed to send command to module {}: {}", self.id, e))
    }

    /// Get the message receiver (should only be called once)
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<ModuleMessage<E>>> {
        self.message_receiver.take()
    }

    /// Check if the module task is still running
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Ask the module to stop and wait for its task to finish
    pub async fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        log::info!("Shutting down module {}...", self.id);
        if let Err(e) = self.sender.send(ModuleEvent::Shutdown).await {
            log::warn!("Failed to send shutdown to module {}: {}", self.id, e);
        }
        if let Err(e) = handle.await {
            log::error!("Module {} shutdown error: {}", self.id, e);
        }
        log::info!("Module {} shutdown complete", self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;

    /// Echoes every command back as an event.
    struct EchoModule;

    #[async_trait]
    impl AsyncModule for EchoModule {
        type Command = u32;
        type Event = u32;

        fn id(&self) -> ModuleId {
            ModuleId("echo")
        }

        async fn initialize(&mut self) -> Result<(), ModuleError> {
            Ok(())
        }

        async fn run(
            &mut self,
            mut rx: mpsc::Receiver<ModuleEvent<u32>>,
            tx: mpsc::Sender<ModuleMessage<u32>>,
        ) -> Result<(), ModuleError> {
            while let Some(event) = rx.recv().await {
                match event {
                    ModuleEvent::Command(value) => {
                        let _ = tx.send(ModuleMessage::Event(value * 2)).await;
                    }
                    ModuleEvent::Shutdown => break,
                }
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), ModuleError> {
            Ok(())
        }

        fn status(&self) -> HashMap<String, String> {
            HashMap::new()
        }
    }

    #[tokio::test]
    async fn test_host_routes_commands_and_shuts_down() {
        let mut host = ModuleHost::start(EchoModule).await.unwrap();
        let mut messages = host.take_message_receiver().unwrap();
        assert!(host.take_message_receiver().is_none());

        host.send(21).await.unwrap();
        match messages.recv().await {
            Some(ModuleMessage::Event(value)) => assert_eq!(value, 42),
            other => panic!("unexpected message: {:?}", other),
        }

        host.shutdown().await;
        assert!(!host.is_running());
        assert!(host.send(1).await.is_err());
    }
}
