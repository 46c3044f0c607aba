//! 拦截器（行为单元）
//!
//! 通知的运行时形态：接收正在进行的连接点，自行决定是否、何时、
//! 以何种参数调用 `proceed()`。

use crate::error::AopResult;
use crate::joinpoint::ProceedingJoinPoint;
use crate::metadata::{TypeInfo, TypeRef};
use crate::target::{Target, Value};
use std::sync::Arc;

/// 方法拦截器 Trait
///
/// 前置、后置、环绕等风格都是同一协议的不同用法：
/// - 只在 `proceed()` 之前做事：前置
/// - 只在 `proceed()` 之后做事：后置 / 返回后 / 异常
/// - 两边都做，或者根本不调用 `proceed()`：环绕 / 短路
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, pjp: &mut ProceedingJoinPoint) -> AopResult<Value>;
}

impl<F> MethodInterceptor for F
where
    F: Fn(&mut ProceedingJoinPoint) -> AopResult<Value> + Send + Sync,
{
    fn invoke(&self, pjp: &mut ProceedingJoinPoint) -> AopResult<Value> {
        self(pjp)
    }
}

/// 引入拦截器 Trait
///
/// 为目标类型整体增加新接口的拦截器
pub trait IntroductionInterceptor: MethodInterceptor {
    /// 是否实现了指定接口
    fn implements_interface(&self, iface: &TypeInfo) -> bool;
}

/// 委托式引入拦截器
///
/// 对声明在被引入接口上的方法，直接分派给委托对象；其余方法继续执行调用链。
pub struct DelegatingIntroductionInterceptor {
    interfaces: Vec<TypeRef>,
    delegate: Arc<dyn Target>,
}

impl DelegatingIntroductionInterceptor {
    pub fn new(delegate: Arc<dyn Target>, interfaces: Vec<TypeRef>) -> Self {
        Self {
            interfaces,
            delegate,
        }
    }

    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    fn is_introduced(&self, declaring_type: &str) -> bool {
        self.interfaces
            .iter()
            .any(|iface| iface.name() == declaring_type)
    }
}

impl MethodInterceptor for DelegatingIntroductionInterceptor {
    fn invoke(&self, pjp: &mut ProceedingJoinPoint) -> AopResult<Value> {
        let method = Arc::clone(pjp.method());
        if self.is_introduced(method.declaring_type()) {
            tracing::trace!(
                "Dispatching introduced method {} to delegate {}",
                method,
                self.delegate.target_type().name()
            );
            return self.delegate.invoke(&method, pjp.arguments());
        }
        pjp.proceed()
    }
}

impl IntroductionInterceptor for DelegatingIntroductionInterceptor {
    fn implements_interface(&self, iface: &TypeInfo) -> bool {
        self.interfaces
            .iter()
            .any(|introduced| introduced.is_assignable_to(iface.name()))
    }
}
