//! 拦截引擎配置
//!
//! 支持从 TOML（字符串或文件）以及 `CHIMERA_AOP_*` 环境变量加载。
//! TOML 中的配置项既可以写在顶层，也可以写在 `[aop]` 表中。

use crate::advised::ProxyConfig;
use crate::error::{AopError, AopResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CHIMERA_AOP_";

/// AOP 配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AopConfig {
    /// 是否启用自动代理
    pub enabled: bool,

    /// 生成的代理是否冻结（不允许再修改通知器）
    pub frozen: bool,

    /// 通知器是否已按目标类型预先筛选
    pub pre_filtered: bool,
}

impl Default for AopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frozen: false,
            pre_filtered: false,
        }
    }
}

impl AopConfig {
    /// 从 TOML 字符串解析
    pub fn from_toml_str(content: &str) -> AopResult<Self> {
        let value: toml::Value = toml::from_str(content)
            .map_err(|e| AopError::configuration(format!("Failed to parse TOML: {}", e)))?;

        let section = match value {
            toml::Value::Table(mut table) => match table.remove("aop") {
                Some(aop) => aop,
                None => toml::Value::Table(table),
            },
            other => other,
        };
        section
            .try_into::<AopConfig>()
            .map_err(|e| AopError::configuration(format!("Invalid AOP configuration: {}", e)))
    }

    /// 从 TOML 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> AopResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AopError::configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        tracing::debug!("Loading AOP configuration from {:?}", path);
        Self::from_toml_str(&content)
    }

    /// 从环境变量加载（未设置的项使用默认值）
    pub fn from_env() -> AopResult<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// 用环境变量覆盖已有配置
    ///
    /// `lookup` 接收完整的环境变量名，例如 `CHIMERA_AOP_FROZEN`。
    pub fn with_env_overrides<F>(mut self, lookup: F) -> AopResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut bool); 3] = [
            ("ENABLED", &mut self.enabled),
            ("FROZEN", &mut self.frozen),
            ("PRE_FILTERED", &mut self.pre_filtered),
        ];
        for (name, slot) in fields {
            let key = format!("{}{}", ENV_PREFIX, name);
            if let Some(raw) = lookup(&key) {
                *slot = parse_bool(&raw).ok_or_else(|| {
                    AopError::configuration(format!("{} must be a boolean, got '{}'", key, raw))
                })?;
            }
        }
        Ok(self)
    }

    /// 生成代理时使用的配置
    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            frozen: self.frozen,
            pre_filtered: self.pre_filtered,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AopConfig::from_toml_str("").unwrap();
        assert_eq!(config, AopConfig::default());
        assert!(config.enabled);
    }

    #[test]
    fn test_aop_section() {
        let config = AopConfig::from_toml_str(
            r#"
            [aop]
            frozen = true
            pre_filtered = true
            "#,
        )
        .unwrap();
        assert!(config.frozen);
        assert!(config.pre_filtered);
        assert!(config.enabled);
        assert_eq!(
            config.proxy_config(),
            ProxyConfig {
                frozen: true,
                pre_filtered: true
            }
        );
    }

    #[test]
    fn test_top_level_and_invalid() {
        let config = AopConfig::from_toml_str("enabled = false").unwrap();
        assert!(!config.enabled);

        assert!(AopConfig::from_toml_str("frozen = \"maybe\"").is_err());
        assert!(AopConfig::from_toml_str("[aop").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [("CHIMERA_AOP_FROZEN", "yes"), ("CHIMERA_AOP_ENABLED", "0")]
            .into_iter()
            .collect();
        let config = AopConfig::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert!(config.frozen);
        assert!(!config.enabled);
        assert!(!config.pre_filtered);

        let err = AopConfig::default()
            .with_env_overrides(|_| Some("sometimes".to_string()))
            .unwrap_err();
        assert!(matches!(err, AopError::Configuration(_)));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("chimera-aop-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[aop]\npre_filtered = true").unwrap();
        drop(file);

        let config = AopConfig::from_file(&path).unwrap();
        assert!(config.pre_filtered);
        fs::remove_file(&path).unwrap();

        assert!(AopConfig::from_file(&path).is_err());
    }
}
