use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub authorizer: AuthorizerSettings,
    pub application: ApplicationSettings,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizerSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    pub log_level: String,
    pub log_format: String,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
