use anyhow::bail;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// 50 MiB
pub const DEFAULT_MAX_SPACE: u64 = 52_428_800;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Multicast group the control socket joins; also the address advertised in
    ///  discover replies.
    pub multicast_addr: Ipv4Addr,
    /// UDP control port.
    pub cmd_port: u16,
    /// Storage quota in bytes.
    pub max_space: u64,
    /// Directory holding the served files. Flat namespace, no subdirectories.
    pub shared_dir: PathBuf,
    /// How long a transfer waits for the client's TCP connection.
    pub timeout: Duration,
}

impl ServerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.multicast_addr.is_multicast() {
            bail!("{} is not a multicast address", self.multicast_addr);
        }
        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            bail!(
                "timeout must be between 1 and {} seconds",
                MAX_TIMEOUT.as_secs()
            );
        }
        if !self.shared_dir.is_dir() {
            bail!("shared folder {:?} does not exist or is not a directory", self.shared_dir);
        }
        Ok(())
    }
}
