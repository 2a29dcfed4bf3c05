use std::path::PathBuf;

/// Where and how verbosely to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub production: bool,
    /// Level for this crate when `RUST_LOG` is not set.
    pub level: String,
    pub directory: PathBuf,
}

impl LogSettings {
    /// `ENVIRONMENT`, `LOG_LEVEL` and `LOG_DIR`, with production defaulting
    /// to `info` and everything else to `debug`.
    pub fn from_env() -> Self {
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let production = environment == "production";

        let level = std::env::var("LOG_LEVEL")
            .ok()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| if production { "info" } else { "debug" }.to_string());

        let directory = std::env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs"));

        Self {
            production,
            level,
            directory,
        }
    }

    pub fn environment(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "development"
        }
    }

    /// Default directive set: this crate at `level`, HTTP internals at debug.
    pub fn filter_directives(&self) -> String {
        format!(
            "eqostack_backend={},tower_http=debug,axum=debug,sqlx=warn",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_target_this_crate() {
        let settings = LogSettings {
            production: true,
            level: "info".to_string(),
            directory: PathBuf::from("logs"),
        };
        assert!(settings
            .filter_directives()
            .starts_with("eqostack_backend=info,"));
        assert_eq!(settings.environment(), "production");
    }
}
