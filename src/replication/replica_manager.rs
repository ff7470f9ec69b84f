use std::{
    collections::HashMap,
    io::Write,
    net::{SocketAddr, TcpStream},
};

/// One connected replica, as seen from the primary: the socket it registered
/// on via `REPLCONF listening-port`.
pub struct Replica {
    stream: TcpStream,
}

impl Replica {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }
}

/// The primary's registry of outbound replica sinks. Entries are appended on
/// `REPLCONF listening-port`, before the handshake's subsequent `PSYNC`
/// response is written, and pruned both on an explicitly detected disconnect
/// and lazily whenever a fan-out write fails.
#[derive(Default)]
pub struct ReplicaManager {
    replicas: HashMap<SocketAddr, Replica>,
}

impl ReplicaManager {
    pub fn new() -> Self {
        Self {
            replicas: HashMap::new(),
        }
    }

    pub fn add_replica(&mut self, replica: Replica) -> std::io::Result<()> {
        let addr = replica.stream.peer_addr()?;
        self.replicas.insert(addr, replica);
        Ok(())
    }

    pub fn remove_replica(&mut self, addr: SocketAddr) -> Option<Replica> {
        self.replicas.remove(&addr)
    }

    pub fn connected_replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Writes `message` to every registered replica, in registration-
    /// agnostic iteration order but strictly sequentially per spec's
    /// best-effort fan-out guarantee. A replica whose write fails is assumed
    /// gone and is dropped from the registry instead of being retried.
    pub fn propagate_message_to_replicas(&mut self, message: &[u8]) {
        let dead: Vec<SocketAddr> = self
            .replicas
            .iter_mut()
            .filter_map(|(addr, replica)| {
                replica.stream.write_all(message).err().map(|_| *addr)
            })
            .collect();

        for addr in dead {
            self.replicas.remove(&addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn propagate_prunes_replica_whose_peer_disconnected() {
        let mut manager = ReplicaManager::new();
        let (client_side, server_side) = connected_pair();
        manager.add_replica(Replica::new(server_side)).unwrap();
        assert_eq!(manager.connected_replica_count(), 1);

        drop(client_side);

        // The first write after the peer disconnects may or may not observe
        // the failure immediately depending on OS buffering, so drive a few
        // writes to force the broken-pipe error to surface.
        for _ in 0..50 {
            manager.propagate_message_to_replicas(b"*1\r\n$4\r\nPING\r\n");
            if manager.connected_replica_count() == 0 {
                break;
            }
        }
        assert_eq!(manager.connected_replica_count(), 0);
    }
}
