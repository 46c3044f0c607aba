//! 目标后置处理器 - 在对象创建后为其应用通知器
//!
//! 外部的对象创建层在每个对象初始化完成后调用 `post_process`，
//! 处理器决定是否用代理替换该对象。

use crate::advised::ProxyConfig;
use crate::advisor::Advisor;
use crate::eligibility::EligibilityCache;
use crate::error::AopResult;
use crate::proxy::ProxyFactory;
use crate::target::Target;
use std::sync::Arc;

/// 目标后置处理器 Trait
pub trait TargetPostProcessor: Send + Sync {
    /// 处理器名称
    fn name(&self) -> &str;

    /// 执行顺序，值越小越先执行
    fn order(&self) -> i32 {
        0
    }

    /// 对象初始化完成后调用，返回原对象或其代理
    fn post_process(&self, target: Arc<dyn Target>) -> AopResult<Arc<dyn Target>>;
}

/// 单通知器的后置处理器
///
/// 持有一个通知器，对每个新对象判定一次是否适用（结果按具体类型缓存），
/// 适用时把对象包装为代理。对象已经是未冻结的代理时，直接把通知器加入
/// 该代理，不再嵌套一层。
///
/// ## 使用示例
///
/// ```ignore
/// let processor = AdvisingPostProcessor::new(Advisor::pointcut(
///     "async-execution",
///     Pointcut::for_methods(MethodFilter::Pattern("*_async".into())),
///     Advice::around(run_on_executor),
/// ));
/// let service = processor.post_process(service)?;
/// ```
pub struct AdvisingPostProcessor {
    eligibility: EligibilityCache,
    config: ProxyConfig,
    enabled: bool,
}

impl AdvisingPostProcessor {
    /// 创建新的后置处理器
    pub fn new(advisor: Advisor) -> Self {
        Self {
            eligibility: EligibilityCache::new(advisor),
            config: ProxyConfig::default(),
            enabled: true,
        }
    }

    /// 创建禁用的后置处理器
    pub fn disabled(advisor: Advisor) -> Self {
        Self {
            enabled: false,
            ..Self::new(advisor)
        }
    }

    /// 设置生成代理时使用的配置
    pub fn with_config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn advisor(&self) -> &Advisor {
        self.eligibility.advisor()
    }

    /// 通知器是否适用于目标对象（代理按其用户类型判定）
    pub fn is_eligible(&self, target: &dyn Target) -> bool {
        self.enabled && self.eligibility.is_eligible(target.target_type().user_type())
    }
}

impl TargetPostProcessor for AdvisingPostProcessor {
    fn name(&self) -> &str {
        "AdvisingPostProcessor"
    }

    fn order(&self) -> i32 {
        // 在其他处理器之后执行，确保对象已经完全初始化
        2000
    }

    fn post_process(&self, target: Arc<dyn Target>) -> AopResult<Arc<dyn Target>> {
        if !self.is_eligible(target.as_ref()) {
            tracing::trace!(
                "Advisor '{}' does not apply to {}, skipping",
                self.advisor().name(),
                target.target_type().name()
            );
            return Ok(target);
        }

        if let Some(advised) = target.as_advised() {
            if !advised.is_frozen() {
                tracing::debug!(
                    "Adding advisor '{}' to existing proxy for {}",
                    self.advisor().name(),
                    target.target_type().user_type().name()
                );
                advised.add_advisor(self.advisor().clone())?;
                return Ok(target);
            }
        }

        tracing::debug!(
            "Wrapping {} with advisor '{}'",
            target.target_type().name(),
            self.advisor().name()
        );
        let proxy = ProxyFactory::new(target)
            .advisor(self.advisor().clone())
            .config(self.config)
            .get_proxy()?;
        Ok(proxy.into_target())
    }
}
