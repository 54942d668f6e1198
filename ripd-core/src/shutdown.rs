use tokio::sync::broadcast::{self, error::RecvError};

/// A struct which can be used to stop a running router.
/// You can create multiple connected shutdowns by cloning.
#[derive(Debug)]
pub struct Shutdown {
    /// This channel can be used tell the router to shut down.
    notify: broadcast::Sender<ExitStatus>,
    /// Subscribed on creation so a shutdown sent before anyone waits is not
    /// missed
    receiver: broadcast::Receiver<ExitStatus>,
    /// Keeps track of the last status received
    /// So users can call `wait_for_shutdown` multiple times
    last_status: Option<ExitStatus>,
}

impl Shutdown {
    /// Creates a new active shutdown.
    pub fn new() -> Self {
        let (notify, receiver) = broadcast::channel(1);
        Self {
            notify,
            receiver,
            last_status: None,
        }
    }

    /// Sends `ExitStatus::Exited` to all `Shutdowns` cloned from this one.
    pub fn shut_down(&self) {
        self.shut_down_with_status(ExitStatus::Exited)
    }

    /// Sends `status` to all `Shutdowns` cloned from this one.
    pub fn shut_down_with_status(&self, status: ExitStatus) {
        if let Err(e) = self.notify.send(status) {
            tracing::error!("Failed to initiate shutdown: {}", e);
        }
    }

    /// Waits to receive a shutdown status.
    pub async fn wait_for_shutdown(&mut self) -> ExitStatus {
        if let Some(status) = self.last_status {
            return status;
        }
        let status = loop {
            match self.receiver.recv().await {
                Ok(status) => break status,
                // Every sender is owned by a Shutdown, including this one
                Err(RecvError::Closed) => break ExitStatus::Exited,
                Err(RecvError::Lagged(_)) => (),
            }
        };
        self.last_status = Some(status);
        status
    }
}

impl Clone for Shutdown {
    fn clone(&self) -> Self {
        Self {
            notify: self.notify.clone(),
            receiver: self.notify.subscribe(),
            last_status: self.last_status,
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// How a router stopped running.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExitStatus {
    Status(u32),
    /// Asked to stop
    Exited,
    /// The links closed
    EndOfStream,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_clone_hears_the_status() {
        let status = ExitStatus::Status(22);
        let shut0 = Shutdown::new();
        let mut shuts = [shut0.clone(), shut0.clone(), shut0.clone()];

        shuts[0].shut_down_with_status(status);

        for shut in shuts.iter_mut() {
            assert_eq!(shut.wait_for_shutdown().await, status);
        }
    }

    #[tokio::test]
    async fn status_is_remembered() {
        let mut shutdown = Shutdown::new();
        shutdown.shut_down();
        assert_eq!(shutdown.wait_for_shutdown().await, ExitStatus::Exited);
        assert_eq!(shutdown.wait_for_shutdown().await, ExitStatus::Exited);
        assert_eq!(shutdown.clone().wait_for_shutdown().await, ExitStatus::Exited);
    }
}
