use super::config::Config;

#[derive(Debug)]
pub struct MasterInfo {
    pub replication_id: String,
}

#[derive(Debug)]
pub struct SlaveInfo {
    pub master_host: String,
    pub master_port: u16,
}

#[derive(Debug)]
pub enum ReplicaInfo {
    Master(MasterInfo),
    Slave(SlaveInfo),
}

#[derive(Debug)]
pub struct RdbConfig {
    pub dir: String,
    pub dbfilename: String,
}

/// Static, config-derived facts about this server instance. Anything that
/// changes at runtime (replication offset, connected replica count) lives in
/// `server::data::Server` instead.
#[derive(Debug)]
pub struct ServerMetadata {
    pub listening_port: u16,
    pub replica_info: ReplicaInfo,
    pub rdb_config: Option<RdbConfig>,
}

impl ServerMetadata {
    pub fn generate(config: &Config) -> Self {
        let replica_info = match config.master_address() {
            Some((master_host, master_port)) => {
                log::info!("starting as replica of {master_host}:{master_port}");
                ReplicaInfo::Slave(SlaveInfo {
                    master_host,
                    master_port,
                })
            }
            None => {
                log::info!("starting as master");
                ReplicaInfo::Master(MasterInfo {
                    replication_id: "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb".to_string(),
                })
            }
        };
        let rdb_config = match (config.data_dir(), config.dbfilename()) {
            (Some(dir), Some(dbfilename)) => Some(RdbConfig {
                dir: dir.to_string(),
                dbfilename: dbfilename.to_string(),
            }),
            _ => None,
        };
        ServerMetadata {
            listening_port: config.listening_port(),
            replica_info,
            rdb_config,
        }
    }

    /// Renders the `INFO replication` section body. `master_repl_offset` is a
    /// fixed value of the master, so it is always reported as `0`.
    pub fn get_replica_info(&self) -> Vec<u8> {
        match &self.replica_info {
            ReplicaInfo::Master(master_info) => format!(
                "role:master\nmaster_replid:{}\nmaster_repl_offset:0",
                master_info.replication_id,
            )
            .into_bytes(),
            ReplicaInfo::Slave(_) => "role:slave\nmaster_repl_offset:0".to_string().into_bytes(),
        }
    }
}
