/// Server configuration, filled from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// Worker threads in the destructor pool.
    pub workers: usize,
    /// Connections idle for longer than this are closed by the reaper.
    pub idle_timeout_ms: u64,
    pub loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "0.0.0.0".to_string(),
            port: 1234,
            workers: 4,
            idle_timeout_ms: 5000,
            loglevel: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_args(args: &[String]) -> Self {
        let mut config = Config::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" => {
                    if i + 1 < args.len() {
                        config.bind = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--port" => {
                    if i + 1 < args.len() {
                        if let Ok(p) = args[i + 1].parse() {
                            config.port = p;
                        }
                        i += 1;
                    }
                }
                "--workers" => {
                    if i + 1 < args.len() {
                        if let Ok(w) = args[i + 1].parse() {
                            config.workers = w;
                        }
                        i += 1;
                    }
                }
                "--idle-timeout-ms" => {
                    if i + 1 < args.len() {
                        if let Ok(t) = args[i + 1].parse() {
                            config.idle_timeout_ms = t;
                        }
                        i += 1;
                    }
                }
                "--loglevel" => {
                    if i + 1 < args.len() {
                        config.loglevel = args[i + 1].clone();
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        config
    }
}
