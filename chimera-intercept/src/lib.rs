//! Chimera Intercept - 方法拦截引擎
//!
//! 提供类似 Spring AOP 的方法拦截能力，支持：
//! - 切点（类型过滤器 × 方法过滤器），包括需要按参数判定的运行时匹配器
//! - 多种通知类型（Around、Before、After、AfterReturning、AfterThrowing）与引入（Introduction）
//! - 按具体类型判定通知器资格，按方法解析并缓存调用链
//! - 声明式切面定义，单例与按解析两种实例化模型
//! - 通过后置处理器与自动代理创建器为对象透明地包装代理
//!
//! 使用示例：
//! ```ignore
//! use chimera_intercept::prelude::*;
//!
//! let proxy = ProxyFactory::new(target)
//!     .advisor(Advisor::pointcut(
//!         "timing",
//!         Pointcut::execution("*Service", "get_*"),
//!         Advice::around(|pjp| {
//!             let started = std::time::Instant::now();
//!             let result = pjp.proceed();
//!             tracing::info!("{} took {:?}", pjp.join_point(), started.elapsed());
//!             result
//!         }),
//!     ))
//!     .get_proxy()?;
//! let user = proxy.invoke_by_name("get_user", vec![value(42u32)])?;
//! ```

pub mod adapter;
pub mod advice;
pub mod advised;
pub mod advisor;
pub mod advisor_factory;
pub mod aspect;
pub mod auto_proxy;
pub mod chain;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod error_info;
pub mod interceptor;
pub mod joinpoint;
pub mod metadata;
pub mod pointcut;
pub mod post_processor;
pub mod proxy;
pub mod registry;
pub mod target;

// 重新导出核心类型
pub use adapter::{AdvisorAdapter, AdvisorAdapterRegistry, DefaultAdvisorAdapterRegistry};
pub use advice::{
    Advice, AdviceType, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, BeforeAdvice,
};
pub use advised::{AdvisedSupport, ProxyConfig};
pub use advisor::{sort_advisors, Advisor, IntroductionAdvisor, PlainAdvisor, PointcutAdvisor};
pub use advisor_factory::{AspectAdvisorFactory, DefaultAspectAdvisorFactory};
pub use aspect::{
    get_all_aspect_registrations, AdviceMethod, Aspect, AspectDefinition, AspectRegistration,
    InstantiationModel,
};
pub use auto_proxy::AutoProxyCreator;
pub use chain::{build_chain, ChainCache, ChainEntry, MethodCacheKey};
pub use config::AopConfig;
pub use eligibility::{
    can_apply, can_apply_with_introductions, find_applicable_advisors, pointcut_applies,
    EligibilityCache,
};
pub use error::{AopError, AopResult};
pub use error_info::ErrorInfo;
pub use interceptor::{DelegatingIntroductionInterceptor, IntroductionInterceptor, MethodInterceptor};
pub use joinpoint::{JoinPoint, ProceedingJoinPoint};
pub use metadata::{Method, MethodRef, TypeInfo, TypeKind, TypeRef};
pub use pointcut::{MethodFilter, MethodMatcher, Pointcut, TypeFilter};
pub use post_processor::{AdvisingPostProcessor, TargetPostProcessor};
pub use proxy::{AopProxy, ProxyFactory};
pub use registry::AspectInstanceRegistry;
pub use target::{unit, value, ArgumentMismatch, Arguments, ReflectiveTarget, Target, Value};

// 导出 inventory 供宏使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::*;
    pub use crate::advisor::Advisor;
    pub use crate::aspect::{AdviceMethod, Aspect, AspectDefinition, AspectRegistration, InstantiationModel};
    pub use crate::auto_proxy::AutoProxyCreator;
    pub use crate::config::AopConfig;
    pub use crate::error::{AopError, AopResult};
    pub use crate::error_info::ErrorInfo;
    pub use crate::interceptor::{MethodInterceptor, IntroductionInterceptor, DelegatingIntroductionInterceptor};
    pub use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
    pub use crate::metadata::{Method, TypeInfo, TypeRef};
    pub use crate::pointcut::{MethodFilter, MethodMatcher, Pointcut, TypeFilter};
    pub use crate::post_processor::{AdvisingPostProcessor, TargetPostProcessor};
    pub use crate::proxy::{AopProxy, ProxyFactory};
    pub use crate::target::{unit, value, Arguments, ReflectiveTarget, Target, Value};
}
