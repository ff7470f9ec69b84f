use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Instant;

use crate::keyspace::Keyspace;
use crate::parser::command::Command;
use crate::replication::replica_manager::{Replica, ReplicaManager};

use super::metadata::{ReplicaInfo, ServerMetadata};

pub struct MasterLiveData {
    pub replica_manager: ReplicaManager,
}

pub struct SlaveLiveData {
    pub heartbeat_recv_time: Option<Instant>,
}

pub enum LiveData {
    Master(MasterLiveData),
    Slave(SlaveLiveData),
}

impl LiveData {
    fn new(info: &ReplicaInfo) -> LiveData {
        match info {
            ReplicaInfo::Master(..) => LiveData::Master(MasterLiveData {
                replica_manager: ReplicaManager::new(),
            }),
            ReplicaInfo::Slave(..) => LiveData::Slave(SlaveLiveData {
                heartbeat_recv_time: None,
            }),
        }
    }
}

/// All shared, mutable server state: the keyspace itself plus whatever a
/// master or a replica separately needs to track about replication.
///
/// `write_lock` serializes every local mutation together with its replica
/// fan-out, so two concurrent SETs from different connections can never
/// commit to the keyspace in one order and propagate to replicas in the
/// other.
pub struct Server {
    pub metadata: ServerMetadata,
    live_data: Mutex<LiveData>,
    write_lock: Mutex<()>,
    store: Keyspace,
}

impl Server {
    pub fn new(metadata: ServerMetadata) -> Server {
        let live_data = Mutex::new(LiveData::new(&metadata.replica_info));
        Server {
            metadata,
            live_data,
            write_lock: Mutex::new(()),
            store: Keyspace::new(),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(key)
    }

    /// Applies a SET to the local keyspace and fans it out to replicas as one
    /// atomic step, so ordering is the same on both sides for every writer.
    pub fn apply_set(&self, key: &[u8], value: &[u8], expiry_ms: Option<u64>) {
        let _guard = self.write_lock.lock().unwrap();
        self.store.set(key, value, expiry_ms);
        let command = Command::Set {
            key: key.to_vec(),
            value: value.to_vec(),
            expiry_ms,
        };
        self.propagate_command(&command);
    }

    pub fn add_replica(&self, replica: Replica) -> std::io::Result<()> {
        if let LiveData::Master(data) = &mut *self.live_data.lock().unwrap() {
            data.replica_manager.add_replica(replica)?;
            log::info!(
                "replica connected, {} total",
                data.replica_manager.connected_replica_count()
            );
        }
        Ok(())
    }

    pub fn remove_replica(&self, addr: SocketAddr) {
        if let LiveData::Master(data) = &mut *self.live_data.lock().unwrap() {
            if data.replica_manager.remove_replica(addr).is_some() {
                log::info!(
                    "replica disconnected, {} remaining",
                    data.replica_manager.connected_replica_count()
                );
            }
        }
    }

    /// Fans `command` out to every connected replica. No-op on a replica.
    /// Callers that also mutate the keyspace must hold `write_lock` for the
    /// duration of both steps; `apply_set` is the only such caller.
    fn propagate_command(&self, command: &Command) {
        let encoded = command.to_resp_token().serialize();
        if let LiveData::Master(data) = &mut *self.live_data.lock().unwrap() {
            data.replica_manager.propagate_message_to_replicas(&encoded);
        }
    }

    pub fn record_heartbeat(&self) {
        if let LiveData::Slave(data) = &mut *self.live_data.lock().unwrap() {
            data.heartbeat_recv_time = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};

    use super::*;
    use crate::server::metadata::{MasterInfo, ServerMetadata};

    fn master_server() -> Server {
        let metadata = ServerMetadata {
            listening_port: 6379,
            replica_info: ReplicaInfo::Master(MasterInfo {
                replication_id: "0".repeat(40),
            }),
            rdb_config: None,
        };
        Server::new(metadata)
    }

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn apply_set_updates_keyspace_and_fans_out_to_replicas() {
        let server = master_server();
        let (mut client_side, server_side) = connected_pair();
        server.add_replica(Replica::new(server_side)).unwrap();

        server.apply_set(b"foo", b"bar", None);

        assert_eq!(server.get(b"foo"), Some(b"bar".to_vec()));

        let mut buf = [0u8; 64];
        client_side.set_read_timeout(Some(std::time::Duration::from_secs(1))).unwrap();
        let n = client_side.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn apply_set_is_a_noop_fanout_with_no_replicas() {
        let server = master_server();
        server.apply_set(b"foo", b"bar", None);
        assert_eq!(server.get(b"foo"), Some(b"bar".to_vec()));
    }
}
