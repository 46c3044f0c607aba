//! 错误信息结构
//!
//! 提供结构化的错误信息传递给切面

use crate::error::AopError;

/// 结构化的错误信息
///
/// 用于在 after_throwing 通知中传递更丰富的错误信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// 错误消息
    pub message: String,

    /// 错误分类（Configuration / Dispatch / Target / AdviceBuild）
    pub error_type: String,

    /// 错误源链（cause chain）
    pub source_chain: Vec<String>,
}

impl ErrorInfo {
    /// 从引擎错误创建 ErrorInfo
    pub fn from_error(error: &AopError) -> Self {
        let error_type = match error {
            AopError::Configuration(_) => "Configuration",
            AopError::Dispatch { .. } => "Dispatch",
            AopError::Target(_) => "Target",
            AopError::AdviceBuild { .. } => "AdviceBuild",
        };

        let source_chain = match error {
            // anyhow 的 chain() 第一项是错误本身
            AopError::Target(inner) => inner.chain().skip(1).map(|e| e.to_string()).collect(),
            other => {
                let mut chain = Vec::new();
                let mut current = std::error::Error::source(other);
                while let Some(source) = current {
                    chain.push(source.to_string());
                    current = source.source();
                }
                chain
            }
        };

        Self {
            message: error.to_string(),
            error_type: error_type.to_string(),
            source_chain,
        }
    }

    /// 获取完整的错误描述（包含源链）
    pub fn full_description(&self) -> String {
        if self.source_chain.is_empty() {
            self.message.clone()
        } else {
            format!(
                "{}\nCaused by:\n  {}",
                self.message,
                self.source_chain.join("\n  ")
            )
        }
    }
}

impl From<&AopError> for ErrorInfo {
    fn from(error: &AopError) -> Self {
        Self::from_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_target_error_chain() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("connection refused"));
        let err = AopError::Target(inner.context("failed to load user").unwrap_err());

        let info = ErrorInfo::from_error(&err);
        assert_eq!(info.error_type, "Target");
        assert_eq!(info.message, "failed to load user");
        assert_eq!(info.source_chain, vec!["connection refused"]);
        assert_eq!(
            info.full_description(),
            "failed to load user\nCaused by:\n  connection refused"
        );
    }

    #[test]
    fn test_advice_build_has_cause() {
        let err = AopError::advice_build("AuditAspect", anyhow::anyhow!("missing sink"));
        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_type, "AdviceBuild");
        assert_eq!(info.source_chain, vec!["missing sink"]);
    }

    #[test]
    fn test_configuration_has_no_chain() {
        let info = ErrorInfo::from_error(&AopError::configuration("frozen"));
        assert_eq!(info.error_type, "Configuration");
        assert!(info.source_chain.is_empty());
        assert_eq!(info.full_description(), info.message);
    }
}
