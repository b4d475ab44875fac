use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy)]
pub enum ShutdownEvent {
    Graceful,
    Immediate,
}

/// First CTRL+C asks for a graceful stop; any further one forces an exit.
pub fn spawn_ctrl_c_handler(tx: mpsc::UnboundedSender<ShutdownEvent>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if tx.send(ShutdownEvent::Graceful).is_err() {
            return;
        }
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        let _ = tx.send(ShutdownEvent::Immediate);
    });
}
