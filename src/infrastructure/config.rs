use std::{env, time::Duration};

use anyhow::{anyhow, Context};
use chrono::Locale;
use chrono_tz::Tz;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub thingsboard: ThingsBoardSettings,
    pub server: ServerSettings,
    pub dashboard: DashboardSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThingsBoardSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Total attempts of an authenticated fetch when the platform answers 401/403
    pub auth_attempts: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub static_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    /// Asset whose history feeds the charts; the refresh worker is off without it
    pub asset_id: Option<String>,
    pub refresh_interval_secs: u64,
    pub refresh_retries: u32,
    pub refresh_retry_delay_ms: u64,
    pub timezone: String,
    pub locale: String,
}

impl ThingsBoardSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DashboardSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn refresh_retry_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_retry_delay_ms)
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid dashboard.timezone '{}': {}", self.timezone, e))
    }

    pub fn locale(&self) -> anyhow::Result<Locale> {
        Locale::try_from(self.locale.as_str())
            .map_err(|_| anyhow!("Invalid dashboard.locale '{}'", self.locale))
    }
}

/// Defaults, then `config/dashboard.toml` if present, then the environment.
///
/// Environment overrides:
/// - `THINGSBOARD_URL`, `THINGSBOARD_USERNAME`, `THINGSBOARD_PASSWORD`
/// - `PORT`
/// - `DASHBOARD_ASSET_ID`
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    build_config(
        config::File::with_name("config/dashboard").required(false),
        |name| env::var(name).ok(),
    )
}

fn build_config<S, F>(file: S, lookup: F) -> anyhow::Result<DashboardConfig>
where
    S: config::Source + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    let settings = config::Config::builder()
        .set_default("thingsboard.url", "")?
        .set_default("thingsboard.username", "")?
        .set_default("thingsboard.password", "")?
        .set_default("thingsboard.auth_attempts", 3)?
        .set_default("thingsboard.request_timeout_secs", 30)?
        .set_default("server.port", 3000)?
        .set_default("server.static_dir", "public")?
        .set_default("dashboard.refresh_interval_secs", 300)?
        .set_default("dashboard.refresh_retries", 5)?
        .set_default("dashboard.refresh_retry_delay_ms", 1000)?
        .set_default("dashboard.timezone", "Europe/Lisbon")?
        .set_default("dashboard.locale", "pt_PT")?
        .add_source(file)
        .set_override_option("thingsboard.url", lookup("THINGSBOARD_URL"))?
        .set_override_option("thingsboard.username", lookup("THINGSBOARD_USERNAME"))?
        .set_override_option("thingsboard.password", lookup("THINGSBOARD_PASSWORD"))?
        .set_override_option("server.port", lookup("PORT"))?
        .set_override_option("dashboard.asset_id", lookup("DASHBOARD_ASSET_ID"))?
        .build()?;

    let mut cfg: DashboardConfig = settings
        .try_deserialize()
        .context("Failed to parse dashboard configuration")?;

    if cfg.thingsboard.url.trim().is_empty() {
        anyhow::bail!("THINGSBOARD_URL must be set in .env, config/dashboard.toml or environment");
    }
    cfg.thingsboard.url = cfg.thingsboard.url.trim_end_matches('/').to_string();
    cfg.dashboard.asset_id = cfg
        .dashboard
        .asset_id
        .filter(|id| !id.trim().is_empty());

    // Surface bad values at startup rather than on the first refresh
    cfg.dashboard.timezone()?;
    cfg.dashboard.locale()?;

    Ok(cfg)
}

impl DashboardConfig {
    /// Log the loaded configuration with the password masked.
    pub fn log_config(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  THINGSBOARD_URL      : {}", self.thingsboard.url);
        tracing::info!("  THINGSBOARD_USERNAME : {}", self.thingsboard.username);
        tracing::info!("  THINGSBOARD_PASSWORD : ****");
        tracing::info!("  PORT                 : {}", self.server.port);
        tracing::info!("  STATIC_DIR           : {}", self.server.static_dir);
        tracing::info!(
            "  DASHBOARD_ASSET_ID   : {}",
            self.dashboard.asset_id.as_deref().unwrap_or("<unset>")
        );
        tracing::info!(
            "  REFRESH              : every {}s, {} retries at {}ms",
            self.dashboard.refresh_interval_secs,
            self.dashboard.refresh_retries,
            self.dashboard.refresh_retry_delay_ms
        );
    }
}
