use clap::Parser;

/// Command-line configuration. `--dir`/`--dbfilename` are accepted for
/// interface compatibility with tooling that always passes them, but no RDB
/// file is ever read from disk.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[arg(short, long, default_value_t = 6379)]
    port: u16,
    #[arg(long, num_args = 2, value_names = ["HOST", "PORT"])]
    replicaof: Option<Vec<String>>,
    #[arg(long)]
    dir: Option<String>,
    #[arg(long)]
    dbfilename: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Config::parse()
    }

    pub fn listening_port(&self) -> u16 {
        self.port
    }

    pub fn master_address(&self) -> Option<(String, u16)> {
        match self.replicaof.as_deref() {
            Some([host, port]) => match port.parse() {
                Ok(port) => Some((host.clone(), port)),
                Err(_) => {
                    log::error!("invalid --replicaof port: {port}");
                    None
                }
            },
            _ => None,
        }
    }

    pub fn is_master(&self) -> bool {
        self.replicaof.is_none()
    }

    pub fn data_dir(&self) -> Option<&str> {
        self.dir.as_deref()
    }

    pub fn dbfilename(&self) -> Option<&str> {
        self.dbfilename.as_deref()
    }
}
