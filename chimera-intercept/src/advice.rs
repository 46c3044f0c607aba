//! 通知（Advice）定义
//!
//! 定义了在连接点执行的各种动作。前置、后置、返回后、异常通知都会被
//! 适配器转换为统一的 `MethodInterceptor`（见 `adapter` 模块），
//! 环绕通知本身就是拦截器。

use crate::error::{AopError, AopResult};
use crate::interceptor::{IntroductionInterceptor, MethodInterceptor};
use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
use crate::target::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceType {
    /// 环绕通知（可以控制方法执行）
    Around,
    /// 前置通知
    Before,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 异常通知（抛出异常时执行）
    AfterThrowing,
    /// 引入（为类型整体增加能力）
    Introduction,
    /// 由自定义适配器处理的通知
    Custom,
}

impl AdviceType {
    /// 同一切面内通知的排列优先级
    pub(crate) fn precedence(self) -> u8 {
        match self {
            AdviceType::Around => 0,
            AdviceType::Before => 1,
            AdviceType::After => 2,
            AdviceType::AfterReturning => 3,
            AdviceType::AfterThrowing => 4,
            AdviceType::Introduction => 5,
            AdviceType::Custom => 6,
        }
    }
}

/// 前置通知 Trait
///
/// 在目标方法执行前调用，返回错误将阻止后续执行
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, join_point: &JoinPoint) -> AopResult<()>;
}

/// 后置通知 Trait
///
/// 在目标方法执行后调用（无论成功还是失败）
pub trait AfterAdvice: Send + Sync {
    fn after(&self, join_point: &JoinPoint) -> AopResult<()>;
}

/// 返回后通知 Trait
///
/// 在目标方法成功返回后调用
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(&self, join_point: &JoinPoint, result: &Value) -> AopResult<()>;
}

/// 异常通知 Trait
///
/// 在目标方法返回错误时调用。返回 `Ok(())` 时原错误继续传播，
/// 返回错误时该错误替换原错误。
pub trait AfterThrowingAdvice: Send + Sync {
    fn after_throwing(&self, join_point: &JoinPoint, error: &AopError) -> AopResult<()>;
}

impl<F> BeforeAdvice for F
where
    F: Fn(&JoinPoint) -> AopResult<()> + Send + Sync,
{
    fn before(&self, join_point: &JoinPoint) -> AopResult<()> {
        self(join_point)
    }
}

impl<F> AfterAdvice for F
where
    F: Fn(&JoinPoint) -> AopResult<()> + Send + Sync,
{
    fn after(&self, join_point: &JoinPoint) -> AopResult<()> {
        self(join_point)
    }
}

impl<F> AfterReturningAdvice for F
where
    F: Fn(&JoinPoint, &Value) -> AopResult<()> + Send + Sync,
{
    fn after_returning(&self, join_point: &JoinPoint, result: &Value) -> AopResult<()> {
        self(join_point, result)
    }
}

impl<F> AfterThrowingAdvice for F
where
    F: Fn(&JoinPoint, &AopError) -> AopResult<()> + Send + Sync,
{
    fn after_throwing(&self, join_point: &JoinPoint, error: &AopError) -> AopResult<()> {
        self(join_point, error)
    }
}

/// 通知
///
/// 所有通知类型的封闭集合，`Custom` 留给自定义适配器
#[derive(Clone)]
pub enum Advice {
    Around(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn BeforeAdvice>),
    After(Arc<dyn AfterAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn AfterThrowingAdvice>),
    Introduction(Arc<dyn IntroductionInterceptor>),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Advice {
    /// 获取通知类型
    pub fn advice_type(&self) -> AdviceType {
        match self {
            Advice::Around(_) => AdviceType::Around,
            Advice::Before(_) => AdviceType::Before,
            Advice::After(_) => AdviceType::After,
            Advice::AfterReturning(_) => AdviceType::AfterReturning,
            Advice::AfterThrowing(_) => AdviceType::AfterThrowing,
            Advice::Introduction(_) => AdviceType::Introduction,
            Advice::Custom(_) => AdviceType::Custom,
        }
    }

    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut ProceedingJoinPoint) -> AopResult<Value> + Send + Sync + 'static,
    {
        Advice::Around(Arc::new(f))
    }

    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint) -> AopResult<()> + Send + Sync + 'static,
    {
        Advice::Before(Arc::new(f))
    }

    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint) -> AopResult<()> + Send + Sync + 'static,
    {
        Advice::After(Arc::new(f))
    }

    pub fn after_returning<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint, &Value) -> AopResult<()> + Send + Sync + 'static,
    {
        Advice::AfterReturning(Arc::new(f))
    }

    pub fn after_throwing<F>(f: F) -> Self
    where
        F: Fn(&JoinPoint, &AopError) -> AopResult<()> + Send + Sync + 'static,
    {
        Advice::AfterThrowing(Arc::new(f))
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice::{:?}", self.advice_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advice_type() {
        assert_eq!(Advice::before(|_| Ok(())).advice_type(), AdviceType::Before);
        assert_eq!(Advice::after(|_| Ok(())).advice_type(), AdviceType::After);
        assert_eq!(
            Advice::after_returning(|_, _| Ok(())).advice_type(),
            AdviceType::AfterReturning
        );
        assert_eq!(
            Advice::after_throwing(|_, _| Ok(())).advice_type(),
            AdviceType::AfterThrowing
        );
        assert_eq!(Advice::around(|pjp| pjp.proceed()).advice_type(), AdviceType::Around);
        assert_eq!(Advice::Custom(Arc::new(42u8)).advice_type(), AdviceType::Custom);
    }

    #[test]
    fn test_precedence_within_aspect() {
        let mut kinds = vec![
            AdviceType::AfterThrowing,
            AdviceType::Before,
            AdviceType::Around,
            AdviceType::AfterReturning,
            AdviceType::After,
        ];
        kinds.sort_by_key(|k| k.precedence());
        assert_eq!(
            kinds,
            vec![
                AdviceType::Around,
                AdviceType::Before,
                AdviceType::After,
                AdviceType::AfterReturning,
                AdviceType::AfterThrowing,
            ]
        );
    }
}
