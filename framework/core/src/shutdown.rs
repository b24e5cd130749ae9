use tokio::sync::watch::{Receiver, Sender};

/// Signals a stop to every listener created from it.
///
/// The runner holds one handle for the whole run and one per virtual user, which is used to
/// retire that user when the ramp target drops. Once fired the signal stays set, so late
/// listeners and repeated checks all observe it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::watch::channel(false).0,
        }
    }

    pub fn shutdown(&self) {
        // `send_replace` succeeds even when nobody is listening yet.
        let previous = self.sender.send_replace(true);
        if !previous {
            log::trace!("Shutdown signal sent");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check if the shutdown signal has been received. If this returns true then work
    /// should be stopped at the next safe point, which for a virtual user is the end of the current
    /// iteration.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown signal to be received. It is safe to race this with another future,
    /// such as a think time delay, so that the wait ends early when the signal fires.
    pub async fn wait_for_shutdown(&mut self) {
        // An error means the handle was dropped, which is treated the same as a shutdown.
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }
}
