//! OS signal delivery for the supervisor wait loop.
//!
//! [`listen`] registers tokio signal streams and forwards every delivery
//! into a channel. Only [`SignalKind::Interrupt`] and
//! [`SignalKind::Terminate`] trigger shutdown; the rest are logged and ignored
//! by the supervisor.

use std::fmt;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Interrupt,
    Terminate,
    Hangup,
    Quit,
    User1,
    User2,
}

impl SignalKind {
    /// Whether this signal requests a graceful stop of the node.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, SignalKind::Interrupt | SignalKind::Terminate)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Interrupt => "interrupt",
            SignalKind::Terminate => "terminated",
            SignalKind::Hangup => "hangup",
            SignalKind::Quit => "quit",
            SignalKind::User1 => "user defined signal 1",
            SignalKind::User2 => "user defined signal 2",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Start forwarding process signals into the returned channel.
///
/// Must be called from within a tokio runtime.
#[cfg(unix)]
pub fn listen() -> std::io::Result<mpsc::Receiver<SignalKind>> {
    use tokio::signal::unix::{SignalKind as UnixKind, signal};

    let kinds = [
        (UnixKind::interrupt(), SignalKind::Interrupt),
        (UnixKind::terminate(), SignalKind::Terminate),
        (UnixKind::hangup(), SignalKind::Hangup),
        (UnixKind::quit(), SignalKind::Quit),
        (UnixKind::user_defined1(), SignalKind::User1),
        (UnixKind::user_defined2(), SignalKind::User2),
    ];

    let (tx, rx) = mpsc::channel(16);
    for (unix_kind, kind) in kinds {
        let mut stream = signal(unix_kind)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(kind).await.is_err() {
                    break;
                }
            }
        });
    }
    Ok(rx)
}

#[cfg(not(unix))]
pub fn listen() -> std::io::Result<mpsc::Receiver<SignalKind>> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(SignalKind::Interrupt).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}
