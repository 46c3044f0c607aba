//! 通知适配器
//!
//! 把通知器上的通知翻译成调用链可执行的 `MethodInterceptor`。
//! 环绕通知与引入拦截器直接使用；其他通知类型由内置适配器包装；
//! 自定义通知可以注册额外的适配器。

use crate::advice::{Advice, AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, BeforeAdvice};
use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};
use crate::error_info::ErrorInfo;
use crate::interceptor::{IntroductionInterceptor, MethodInterceptor};
use crate::joinpoint::ProceedingJoinPoint;
use crate::target::Value;
use parking_lot::RwLock;
use std::sync::Arc;

/// 通知适配器 Trait
pub trait AdvisorAdapter: Send + Sync {
    /// 是否支持该通知
    fn supports_advice(&self, advice: &Advice) -> bool;

    /// 为通知器创建拦截器
    fn interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>>;
}

/// 通知适配器注册表 Trait
///
/// "给定一个通知器，产生它的拦截器"的注入点
pub trait AdvisorAdapterRegistry: Send + Sync {
    fn interceptors(&self, advisor: &Advisor) -> AopResult<Vec<Arc<dyn MethodInterceptor>>>;
}

/// 默认的通知适配器注册表
pub struct DefaultAdvisorAdapterRegistry {
    adapters: RwLock<Vec<Arc<dyn AdvisorAdapter>>>,
}

impl DefaultAdvisorAdapterRegistry {
    /// 创建包含内置适配器的注册表
    pub fn new() -> Self {
        let adapters: Vec<Arc<dyn AdvisorAdapter>> = vec![
            Arc::new(BeforeAdviceAdapter),
            Arc::new(AfterAdviceAdapter),
            Arc::new(AfterReturningAdviceAdapter),
            Arc::new(AfterThrowingAdviceAdapter),
        ];
        Self {
            adapters: RwLock::new(adapters),
        }
    }

    /// 注册自定义适配器
    pub fn register_adapter(&self, adapter: Arc<dyn AdvisorAdapter>) {
        self.adapters.write().push(adapter);
    }
}

impl Default for DefaultAdvisorAdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorAdapterRegistry for DefaultAdvisorAdapterRegistry {
    fn interceptors(&self, advisor: &Advisor) -> AopResult<Vec<Arc<dyn MethodInterceptor>>> {
        let advice = advisor.advice();
        let mut interceptors: Vec<Arc<dyn MethodInterceptor>> = Vec::with_capacity(1);

        match &advice {
            Advice::Around(interceptor) => interceptors.push(Arc::clone(interceptor)),
            Advice::Introduction(interceptor) => {
                interceptors.push(Arc::new(IntroductionAdapter(Arc::clone(interceptor))))
            }
            _ => {}
        }

        for adapter in self.adapters.read().iter() {
            if adapter.supports_advice(&advice) {
                interceptors.push(adapter.interceptor(advisor)?);
            }
        }

        if interceptors.is_empty() {
            return Err(AopError::configuration(format!(
                "advisor '{}': no adapter supports advice {:?}",
                advisor.name(),
                advice
            )));
        }
        Ok(interceptors)
    }
}

/// 引入拦截器到方法拦截器的桥接
struct IntroductionAdapter(Arc<dyn IntroductionInterceptor>);

impl MethodInterceptor for IntroductionAdapter {
    fn invoke(&self, pjp: &mut ProceedingJoinPoint) -> AopResult<Value> {
        self.0.invoke(pjp)
    }
}

// ============================================================================
// 内置适配器
// ============================================================================

struct BeforeAdviceAdapter;

impl AdvisorAdapter for BeforeAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::Before(_))
    }

    fn interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::Before(advice) => Ok(Arc::new(BeforeAdviceInterceptor { advice })),
            other => Err(unsupported(advisor, &other)),
        }
    }
}

struct AfterAdviceAdapter;

impl AdvisorAdapter for AfterAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::After(_))
    }

    fn interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::After(advice) => Ok(Arc::new(AfterAdviceInterceptor { advice })),
            other => Err(unsupported(advisor, &other)),
        }
    }
}

struct AfterReturningAdviceAdapter;

impl AdvisorAdapter for AfterReturningAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterReturning(_))
    }

    fn interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::AfterReturning(advice) => {
                Ok(Arc::new(AfterReturningAdviceInterceptor { advice }))
            }
            other => Err(unsupported(advisor, &other)),
        }
    }
}

struct AfterThrowingAdviceAdapter;

impl AdvisorAdapter for AfterThrowingAdviceAdapter {
    fn supports_advice(&self, advice: &Advice) -> bool {
        matches!(advice, Advice::AfterThrowing(_))
    }

    fn interceptor(&self, advisor: &Advisor) -> AopResult<Arc<dyn MethodInterceptor>> {
        match advisor.advice() {
            Advice::AfterThrowing(advice) => Ok(Arc::new(AfterThrowingAdviceInterceptor { advice })),
            other => Err(unsupported(advisor, &other)),
        }
    }
}

fn unsupported(advisor: &Advisor, advice: &Advice) -> AopError {
    AopError::configuration(format!(
        "advisor '{}': adapter cannot handle {:?}",
        advisor.name(),
        advice
    ))
}

// ============================================================================
// 内置拦截器
// ============================================================================

/// 前置通知拦截器
pub struct BeforeAdviceInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl MethodInterceptor for BeforeAdviceInterceptor {
    fn invoke(&self, pjp: &mut ProceedingJoinPoint) -> AopResult<Value> {
        self.advice.before(pjp.join_point())?;
        pjp.proceed()
    }
}

/// 后置通知拦截器（finally 语义：后置通知自身的错误会覆盖原结果）
pub struct AfterAdviceInterceptor {
    advice: Arc<dyn AfterAdvice>,
}

impl MethodInterceptor for AfterAdviceInterceptor {
    fn invoke(&self, pjp: &mut ProceedingJoinPoint) -> AopResult<Value> {
        let result = pjp.proceed();
        self.advice.after(pjp.join_point())?;
        result
    }
}

/// 返回后通知拦截器
pub struct AfterReturningAdviceInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, pjp: &mut ProceedingJoinPoint) -> AopResult<Value> {
        let result = pjp.proceed()?;
        self.advice.after_returning(pjp.join_point(), &result)?;
        Ok(result)
    }
}

/// 异常通知拦截器
pub struct AfterThrowingAdviceInterceptor {
    advice: Arc<dyn AfterThrowingAdvice>,
}

impl MethodInterceptor for AfterThrowingAdviceInterceptor {
    fn invoke(&self, pjp: &mut ProceedingJoinPoint) -> AopResult<Value> {
        match pjp.proceed() {
            Ok(result) => Ok(result),
            Err(error) => {
                let info = ErrorInfo::from_error(&error);
                tracing::debug!(
                    "{} error escaped {}: {}",
                    info.error_type,
                    pjp.join_point(),
                    info.full_description()
                );
                self.advice.after_throwing(pjp.join_point(), &error)?;
                Err(error)
            }
        }
    }
}
