use crate::wire::{ComplexRecord, SimpleRecord};
use async_trait::async_trait;
use bytes::BytesMut;
#[cfg(test)] use mockall::automock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{error, trace};

/// This is an abstraction for sending a single reply datagram on the control socket,
///  introduced to facilitate mocking the I/O part away for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReplySocket: Send + Sync + 'static {
    async fn send_datagram(&self, to: SocketAddr, datagram: &[u8]);
}

#[async_trait]
impl ReplySocket for Arc<UdpSocket> {
    async fn send_datagram(&self, to: SocketAddr, datagram: &[u8]) {
        trace!("UDP socket: sending reply to {:?}", to);

        if let Err(e) = self.send_to(datagram, to).await {
            error!("error sending UDP reply to {:?}: {}", to, e);
        }
    }
}

/// Reply sends are single datagrams and best-effort: a lost reply looks to the client
///  like a lost packet, which it has to handle anyway.
pub async fn send_simple(socket: &dyn ReplySocket, to: SocketAddr, command: &str, seq: u64, payload: &str) {
    let mut buf = BytesMut::new();
    SimpleRecord::new(command, seq, payload).ser(&mut buf);
    socket.send_datagram(to, &buf).await;
}

pub async fn send_complex(socket: &dyn ReplySocket, to: SocketAddr, command: &str, seq: u64, param: u64, payload: &str) {
    let mut buf = BytesMut::new();
    ComplexRecord::new(command, seq, param, payload).ser(&mut buf);
    socket.send_datagram(to, &buf).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::commands;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_send_simple_serializes_record() {
        let mut expected = BytesMut::new();
        SimpleRecord::new(commands::UPLOAD_REJECTED, 3, "f.txt").ser(&mut expected);

        let mut socket = MockReplySocket::new();
        socket
            .expect_send_datagram()
            .with(eq(SocketAddr::from(([127, 0, 0, 1], 9000))), eq(expected.to_vec()))
            .return_const(());

        send_simple(&socket, SocketAddr::from(([127, 0, 0, 1], 9000)), commands::UPLOAD_REJECTED, 3, "f.txt").await;
    }

    #[tokio::test]
    async fn test_send_complex_serializes_record() {
        let mut expected = BytesMut::new();
        ComplexRecord::new(commands::UPLOAD_REPLY, 8, 40000, "").ser(&mut expected);

        let mut socket = MockReplySocket::new();
        socket
            .expect_send_datagram()
            .with(eq(SocketAddr::from(([127, 0, 0, 1], 9000))), eq(expected.to_vec()))
            .return_const(());

        send_complex(&socket, SocketAddr::from(([127, 0, 0, 1], 9000)), commands::UPLOAD_REPLY, 8, 40000, "").await;
    }
}
