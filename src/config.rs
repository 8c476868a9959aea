use std::env;
use std::path::PathBuf;

use image::imageops::FilterType;

use crate::error::ConfigError;
use crate::preprocess::PreprocessConfig;
use crate::solution::RemoteConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub model_paths: Vec<PathBuf>,
    pub model_url: Option<String>,
    pub model_download_token: Option<String>,
    pub model_input_op: String,
    pub model_output_op: String,
    pub eager_load: bool,
    pub preprocess: PreprocessConfig,
    pub upload_dir: PathBuf,
    /// Present only when an API key is configured.
    pub remote_solutions: Option<RemoteConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(get("PORT"), "PORT", "a valid number between 0 and 65535", 5000u16)?;

        let body_limit_bytes = {
            let mb = parse_or(get("BODY_LIMIT_MB"), "BODY_LIMIT_MB", "a valid integer", 10usize)?;
            mb.checked_mul(1024 * 1024).ok_or(ConfigError::Invalid {
                name: "BODY_LIMIT_MB",
                expected: "a size in megabytes that fits in memory",
                value: mb.to_string(),
            })?
        };

        let model_paths = vec![
            PathBuf::from(get("MODEL_PATH").unwrap_or_else(|| "models/potato_model.pb".into())),
            PathBuf::from(get("MODEL_FALLBACK_PATH").unwrap_or_else(|| "potato_model.pb".into())),
        ];

        let image_size = parse_or(get("IMAGE_SIZE"), "IMAGE_SIZE", "a positive integer", 256u32)?;
        if image_size == 0 {
            return Err(ConfigError::Invalid {
                name: "IMAGE_SIZE",
                expected: "a positive integer",
                value: image_size.to_string(),
            });
        }

        let filter = match get("RESIZE_FILTER") {
            None => FilterType::Lanczos3,
            Some(name) => parse_filter(&name).ok_or(ConfigError::Invalid {
                name: "RESIZE_FILTER",
                expected: "one of nearest, triangle, catmullrom, gaussian, lanczos3",
                value: name,
            })?,
        };

        let preprocess = PreprocessConfig {
            width: image_size,
            height: image_size,
            filter,
            normalize: parse_bool(get("NORMALIZE_PIXELS"), "NORMALIZE_PIXELS", false)?,
        };

        let remote_solutions = get("OPENAI_API_KEY").map(|api_key| RemoteConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".into()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
        });

        Ok(Config {
            port,
            body_limit_bytes,
            model_paths,
            model_url: get("MODEL_URL"),
            model_download_token: get("MODEL_DOWNLOAD_TOKEN"),
            model_input_op: get("MODEL_INPUT_OP").unwrap_or_else(|| "x".into()),
            model_output_op: get("MODEL_OUTPUT_OP").unwrap_or_else(|| "Identity".into()),
            eager_load: parse_bool(get("MODEL_EAGER_LOAD"), "MODEL_EAGER_LOAD", true)?,
            preprocess,
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "uploads".into())),
            remote_solutions,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value: raw,
        }),
    }
}

fn parse_bool(
    value: Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                expected: "a boolean",
                value: v,
            }),
        },
    }
}

fn parse_filter(name: &str) -> Option<FilterType> {
    match name.trim().to_ascii_lowercase().as_str() {
        "nearest" => Some(FilterType::Nearest),
        "triangle" => Some(FilterType::Triangle),
        "catmullrom" => Some(FilterType::CatmullRom),
        "gaussian" => Some(FilterType::Gaussian),
        "lanczos3" => Some(FilterType::Lanczos3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.body_limit_bytes, 10 * 1024 * 1024);
        assert_eq!(
            config.model_paths,
            vec![
                PathBuf::from("models/potato_model.pb"),
                PathBuf::from("potato_model.pb")
            ]
        );
        assert_eq!(config.model_input_op, "x");
        assert_eq!(config.model_output_op, "Identity");
        assert!(config.eager_load);
        assert_eq!(config.preprocess, PreprocessConfig::default());
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert!(config.remote_solutions.is_none());
        assert!(config.model_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("PORT", "8081"),
            ("BODY_LIMIT_MB", "2"),
            ("IMAGE_SIZE", "224"),
            ("RESIZE_FILTER", "Triangle"),
            ("NORMALIZE_PIXELS", "true"),
            ("MODEL_EAGER_LOAD", "0"),
            ("MODEL_PATH", "/srv/model.pb"),
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.body_limit_bytes, 2 * 1024 * 1024);
        assert_eq!(config.preprocess.width, 224);
        assert_eq!(config.preprocess.height, 224);
        assert_eq!(config.preprocess.filter, FilterType::Triangle);
        assert!(config.preprocess.normalize);
        assert!(!config.eager_load);
        assert_eq!(config.model_paths[0], PathBuf::from("/srv/model.pb"));
    }

    #[test]
    fn test_api_key_enables_remote_solutions() {
        let config = config_with(&[("OPENAI_API_KEY", "sk-test")]).unwrap();

        let remote = config.remote_solutions.unwrap();
        assert_eq!(remote.api_key, "sk-test");
        assert_eq!(remote.base_url, "https://api.openai.com/v1");
        assert_eq!(remote.model, "gpt-4o-mini");
    }

    #[test]
    fn test_blank_api_key_keeps_static_solutions() {
        let config = config_with(&[("OPENAI_API_KEY", "  ")]).unwrap();

        assert!(config.remote_solutions.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(matches!(
            config_with(&[("PORT", "70000")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(matches!(
            config_with(&[("RESIZE_FILTER", "bicubic")]),
            Err(ConfigError::Invalid { name: "RESIZE_FILTER", .. })
        ));
        assert!(matches!(
            config_with(&[("NORMALIZE_PIXELS", "maybe")]),
            Err(ConfigError::Invalid { name: "NORMALIZE_PIXELS", .. })
        ));
        assert!(matches!(
            config_with(&[("BODY_LIMIT_MB", "18446744073709551615")]),
            Err(ConfigError::Invalid { name: "BODY_LIMIT_MB", .. })
        ));
        assert!(matches!(
            config_with(&[("IMAGE_SIZE", "0")]),
            Err(ConfigError::Invalid { name: "IMAGE_SIZE", .. })
        ));
    }
}
