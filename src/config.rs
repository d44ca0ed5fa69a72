use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct DatastoreConfig {
    #[arg(long = "db-host", env = "DB_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(long = "db-user", env = "DB_USER", default_value = "nestvm")]
    pub user: String,

    #[arg(long = "db-password", env = "DB_PSWD", default_value = "", hide_env_values = true)]
    pub password: String,

    #[arg(long = "db-base", env = "DB_BASE", default_value = "nestvm")]
    pub database: String,

    /// SQLite file; defaults to `<database>.db`.
    #[arg(long)]
    pub store: Option<PathBuf>,
}

impl DatastoreConfig {
    pub fn table_path(&self) -> PathBuf {
        self.store
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.db", self.database)))
    }

    /// Connection description safe to log.
    pub fn describe(&self) -> String {
        let credential = if self.password.is_empty() {
            "no password"
        } else {
            "password set"
        };
        format!(
            "{}@{}/{} ({})",
            self.user, self.host, self.database, credential
        )
    }
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            user: "nestvm".to_string(),
            password: String::new(),
            database: "nestvm".to_string(),
            store: None,
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    #[arg(long, env = "IP", default_value = "127.0.0.1")]
    pub ip: String,

    #[arg(long, env = "PORT", default_value_t = 12345)]
    pub port: u16,

    /// Directory served for `.css`, `.png` and `.js` requests.
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 12345,
            static_dir: PathBuf::from("static"),
        }
    }
}
