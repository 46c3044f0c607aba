//! 拦截引擎错误类型
//!
//! 区分四类错误：配置错误、调度错误、目标方法错误、通知构建错误。
//! 目标方法自身产生的错误以 `Target` 原样透传，不做二次包装。

use thiserror::Error;

/// 引擎统一结果类型
pub type AopResult<T> = Result<T, AopError>;

/// 拦截引擎错误
#[derive(Debug, Error)]
pub enum AopError {
    /// 通知器列表或调用链在结构上无效（例如冻结配置被修改、缺少目标对象）
    #[error("AOP configuration error: {0}")]
    Configuration(String),

    /// 底层调度机制无法完成真实调用（参数不匹配、方法不存在等），与业务逻辑无关
    #[error("failed to dispatch '{method}': {reason}")]
    Dispatch { method: String, reason: String },

    /// 目标方法（或替换它的通知）产生的错误，原样透传
    #[error(transparent)]
    Target(#[from] anyhow::Error),

    /// 切面实例无法生成通知器
    #[error("failed to build advisors for aspect '{aspect}': {source}")]
    AdviceBuild {
        aspect: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl AopError {
    /// 创建配置错误
    pub fn configuration(message: impl Into<String>) -> Self {
        AopError::Configuration(message.into())
    }

    /// 创建调度错误
    pub fn dispatch(method: impl Into<String>, reason: impl Into<String>) -> Self {
        AopError::Dispatch {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// 将任意错误视为目标方法抛出的错误
    pub fn target<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        AopError::Target(error.into())
    }

    /// 创建通知构建错误
    pub fn advice_build(aspect: impl Into<String>, source: anyhow::Error) -> Self {
        AopError::AdviceBuild {
            aspect: aspect.into(),
            source: source.into(),
        }
    }

    /// 是否为目标方法错误
    pub fn is_target(&self) -> bool {
        matches!(self, AopError::Target(_))
    }

    /// 获取目标方法错误（如果是）
    pub fn target_error(&self) -> Option<&anyhow::Error> {
        match self {
            AopError::Target(error) => Some(error),
            _ => None,
        }
    }

    /// 尝试将目标方法错误还原为具体类型
    pub fn downcast_target_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        self.target_error()?.downcast_ref::<E>()
    }
}
