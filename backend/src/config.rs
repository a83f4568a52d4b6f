use std::net::SocketAddr;

use clap::Parser;

use crate::stats::DEFAULT_MAX_PHOTO_DISTANCE_KM;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Trail tracker backend")]
pub struct Settings {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// PostgreSQL connection string; routes are kept in memory when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Photos farther than this from every activity track stay unmatched
    #[arg(long, env = "MAX_PHOTO_DISTANCE_KM", default_value_t = DEFAULT_MAX_PHOTO_DISTANCE_KM)]
    pub max_photo_distance_km: f64,

    #[arg(long, env = "APP_NAME", default_value = "Trail Tracker")]
    pub app_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            max_photo_distance_km: DEFAULT_MAX_PHOTO_DISTANCE_KM,
            app_name: "Trail Tracker".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let settings = Settings::parse_from([
            "trail_tracker",
            "--bind-addr",
            "127.0.0.1:9000",
            "--max-photo-distance-km",
            "2.5",
        ]);
        assert_eq!(settings.bind_addr.port(), 9000);
        assert_eq!(settings.max_photo_distance_km, 2.5);
    }
}
