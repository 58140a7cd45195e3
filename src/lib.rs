//! A peer-discoverable network file store.
//!
//! The server joins a multicast group and answers control commands over UDP; file bytes
//!  travel over a short-lived TCP connection negotiated per transfer. Clients discover
//!  servers by multicasting a `HELLO` and picking one from the replies.
//!
//! ## Design
//!
//! * A single dispatcher task owns the UDP control socket and handles commands strictly
//!   one at a time, so catalog and ledger mutations from command handling need no
//!   locking discipline beyond the shared-state mutex
//! * Every admitted transfer (fetch or upload) runs in a task of its own with its own
//!   TCP listener on an ephemeral port, announced to the client in the UDP reply; a
//!   slow, hung or failed transfer cannot block the dispatcher or other transfers
//! * Waiting for the client's TCP connection is bounded by the configured timeout; the
//!   byte-copy loop itself may block for as long as the connection lives, which is
//!   acceptable because each transfer is isolated in its task
//! * Storage capacity is tracked by a ledger that distinguishes available space from
//!   *debt*: pre-existing files may exceed the quota at startup, and that debt must be
//!   repaid by removals before usable space reappears
//! * Upload admission commits the declared size and reserves the filename before any
//!   byte arrives; on transfer failure the partial file is deleted, the name delisted
//!   and the charge refunded
//! * Shutdown is a broadcast cancellation signal: the dispatcher stops receiving,
//!   in-flight transfers get a bounded grace period, the multicast membership is
//!   dropped exactly once and partially written upload files are deleted
//!
//! ## Control commands
//!
//! ```ascii
//! HELLO      -> GOOD_DAY     identity + currently available space
//! LIST       -> MY_LIST      substring search, paginated into max-size datagrams
//! DEL        -> (no reply)   remove a file, repaying ledger debt first
//! GET        -> CONNECT_ME   fetch: TCP port to pull the file bytes from
//! ADD        -> CAN_ADD      upload: TCP port to push the file bytes to
//!            -> NO_WAY       upload rejected (space, duplicate or bad name)
//! (other)    -> INVALID      recognized-but-invalid usage or unknown command
//! ```
//!
//! See [`wire`] for the datagram layout.

pub mod catalog;
pub mod config;
pub mod index;
pub mod ledger;
pub mod listing;
pub mod reply;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod transfer;
pub mod wire;

#[cfg(test)]
mod tests {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::DEBUG)
            .try_init()
            .ok();
    }
}
