use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub json_logs: bool,
    /// Directive used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str, default_service_version: &str) -> Self {
        Self::from_lookup(default_service_name, default_service_version, |key| {
            env::var(key).ok()
        })
    }

    pub fn from_lookup<F>(
        default_service_name: &str,
        default_service_version: &str,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name =
            lookup("SERVICE_NAME").unwrap_or_else(|| default_service_name.to_string());
        let service_version =
            lookup("SERVICE_VERSION").unwrap_or_else(|| default_service_version.to_string());
        let environment = lookup("DEPLOYMENT_ENV").unwrap_or_else(|| "dev".into());
        let json_logs = lookup("LOG_FORMAT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "text" | "pretty" | "plain"))
            .unwrap_or(true);

        Self {
            service_name,
            service_version,
            environment,
            json_logs,
            default_filter: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_json_logs() {
        let cfg = TelemetryConfig::from_lookup("linkbot", "0.1.0", lookup(&[]));
        assert_eq!(cfg.service_name, "linkbot");
        assert_eq!(cfg.service_version, "0.1.0");
        assert_eq!(cfg.environment, "dev");
        assert!(cfg.json_logs);
        assert_eq!(cfg.default_filter, "info");
    }

    #[test]
    fn text_formats_disable_json() {
        for format in ["text", "Pretty", "PLAIN"] {
            let cfg =
                TelemetryConfig::from_lookup("linkbot", "0.1.0", lookup(&[("LOG_FORMAT", format)]));
            assert!(!cfg.json_logs, "{format} should select text output");
        }
        let cfg = TelemetryConfig::from_lookup("linkbot", "0.1.0", lookup(&[("LOG_FORMAT", "json")]));
        assert!(cfg.json_logs);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = TelemetryConfig::from_lookup(
            "linkbot",
            "0.1.0",
            lookup(&[
                ("SERVICE_NAME", "bot-a"),
                ("SERVICE_VERSION", "9.9.9"),
                ("DEPLOYMENT_ENV", "prod"),
            ]),
        );
        assert_eq!(cfg.service_name, "bot-a");
        assert_eq!(cfg.service_version, "9.9.9");
        assert_eq!(cfg.environment, "prod");
    }
}
