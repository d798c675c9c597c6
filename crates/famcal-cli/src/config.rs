use famcal_core::models::RecurrenceConfig;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding the calendar
    pub database_path: PathBuf,
    /// Family used when a command gets no `--family`
    pub default_family: Option<Uuid>,
    /// Member used when a command gets no `--member`
    pub default_member: Option<Uuid>,
    /// Generator and range limits
    pub recurrence: RecurrenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("famcal.db"),
            default_family: None,
            default_member: None,
            recurrence: RecurrenceConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, overridden by `famcal.toml` in the working directory, then by
    /// `FAMCAL_*` environment variables.
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("famcal.toml"))
            .merge(Env::prefixed("FAMCAL_").split("__"))
    }
}
