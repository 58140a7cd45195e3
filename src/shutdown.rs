use tokio::sync::broadcast;

/// Cooperative cancellation signal, shared by the dispatcher loop and every transfer
///  task. Cloning subscribes a fresh receiver, so a clone taken before [`trigger`] is
///  called observes the signal exactly once.
///
/// [`trigger`]: ShutdownSignal::trigger
pub struct ShutdownSignal {
    observed: bool,
    sender: broadcast::Sender<()>,
    receiver: broadcast::Receiver<()>,
}

impl ShutdownSignal {
    pub fn new() -> ShutdownSignal {
        let (sender, receiver) = broadcast::channel(1);
        ShutdownSignal {
            observed: false,
            sender,
            receiver,
        }
    }

    pub fn trigger(&self) {
        // no receivers left is fine: everybody already observed the signal
        let _ = self.sender.send(());
    }

    /// Completes when the signal is triggered; immediately if it was already observed.
    pub async fn recv(&mut self) {
        if self.observed {
            return;
        }
        let _ = self.receiver.recv().await;
        self.observed = true;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ShutdownSignal {
    fn clone(&self) -> ShutdownSignal {
        ShutdownSignal {
            observed: false,
            sender: self.sender.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_all_clones() {
        let signal = ShutdownSignal::new();
        let mut first = signal.clone();
        let mut second = signal.clone();

        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), first.recv()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), second.recv()).await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_is_idempotent_after_observation() {
        let signal = ShutdownSignal::new();
        let mut clone = signal.clone();

        signal.trigger();
        clone.recv().await;
        // already observed: completes without waiting for another send
        tokio::time::timeout(Duration::from_secs(1), clone.recv()).await.unwrap();
    }
}
