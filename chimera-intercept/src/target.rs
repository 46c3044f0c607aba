//! 目标对象与真实调用
//!
//! `Target` 是引擎调用真实方法的唯一途径。`ReflectiveTarget` 用方法表
//! 模拟反射调用：按方法名分派到闭包，并把参数绑定失败与业务错误区分开。

use crate::advised::AdvisedSupport;
use crate::error::{AopError, AopResult};
use crate::metadata::{Method, TypeRef};
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 调用参数与返回值的动态表示
pub type Value = Arc<dyn Any + Send + Sync>;

/// 将任意值包装为 `Value`
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

/// 无返回值方法的返回值
pub fn unit() -> Value {
    Arc::new(())
}

/// 参数绑定失败
///
/// 由 `Arguments` 产生；调度时会被转换为 `AopError::Dispatch`，
/// 而不是当作目标方法错误。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgumentMismatch {
    #[error("missing argument at index {index} (got {len} argument(s))")]
    Missing { index: usize, len: usize },

    #[error("argument {index} is not of type {expected}")]
    WrongType { index: usize, expected: &'static str },
}

/// 调用参数的只读视图
pub struct Arguments<'a> {
    args: &'a [Value],
}

impl<'a> Arguments<'a> {
    pub fn new(args: &'a [Value]) -> Self {
        Self { args }
    }

    /// 按索引获取参数并还原为具体类型
    pub fn get<T: Any>(&self, index: usize) -> Result<&'a T, ArgumentMismatch> {
        let arg = self.args.get(index).ok_or(ArgumentMismatch::Missing {
            index,
            len: self.args.len(),
        })?;
        arg.downcast_ref::<T>().ok_or(ArgumentMismatch::WrongType {
            index,
            expected: type_name::<T>(),
        })
    }

    /// 克隆参数值
    pub fn cloned<T: Any + Clone>(&self, index: usize) -> Result<T, ArgumentMismatch> {
        self.get::<T>(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn as_slice(&self) -> &'a [Value] {
        self.args
    }
}

/// 目标对象 Trait
///
/// 实现方式不限：直接调用、方法表、代码生成的跳板均可。
pub trait Target: Send + Sync {
    /// 目标对象的具体运行时类型
    fn target_type(&self) -> TypeRef;

    /// 执行真实调用
    ///
    /// 目标方法自身的错误应以 `AopError::Target` 返回；
    /// 调度失败（方法不存在、参数不匹配）应以 `AopError::Dispatch` 返回。
    fn invoke(&self, method: &Method, args: &[Value]) -> AopResult<Value>;

    /// 若自身是代理，返回其代理配置
    fn as_advised(&self) -> Option<&Arc<AdvisedSupport>> {
        None
    }
}

/// 方法处理函数
type Handler<T> = Arc<dyn Fn(&T, &Arguments<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// 基于方法表的目标对象
///
/// 使用示例：
/// ```ignore
/// let target = ReflectiveTarget::new(Arc::new(UserService::default()), user_type)
///     .method("get_user", |svc, args| {
///         let id = args.get::<u32>(0)?;
///         Ok(value(svc.get_user(*id)?))
///     });
/// ```
pub struct ReflectiveTarget<T> {
    instance: Arc<T>,
    target_type: TypeRef,
    handlers: HashMap<String, Handler<T>>,
}

impl<T: Send + Sync + 'static> ReflectiveTarget<T> {
    pub fn new(instance: Arc<T>, target_type: TypeRef) -> Self {
        Self {
            instance,
            target_type,
            handlers: HashMap::new(),
        }
    }

    /// 注册方法处理函数
    pub fn method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&T, &Arguments<'_>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// 获取被包装的实例
    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    pub fn into_arc(self) -> Arc<dyn Target> {
        Arc::new(self)
    }
}

impl<T: Send + Sync + 'static> Target for ReflectiveTarget<T> {
    fn target_type(&self) -> TypeRef {
        Arc::clone(&self.target_type)
    }

    fn invoke(&self, method: &Method, args: &[Value]) -> AopResult<Value> {
        let handler = self.handlers.get(method.name()).ok_or_else(|| {
            AopError::dispatch(
                method.qualified_name(),
                format!("no such method on target type {}", self.target_type.name()),
            )
        })?;

        match handler(&self.instance, &Arguments::new(args)) {
            Ok(result) => Ok(result),
            Err(error) => match error.downcast::<ArgumentMismatch>() {
                Ok(mismatch) => Err(AopError::dispatch(method.qualified_name(), mismatch.to_string())),
                Err(error) => Err(AopError::Target(error)),
            },
        }
    }
}

impl<T> fmt::Debug for ReflectiveTarget<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.handlers.keys().collect();
        methods.sort();
        f.debug_struct("ReflectiveTarget")
            .field("target_type", &self.target_type.name())
            .field("methods", &methods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TypeInfo;

    #[derive(Default)]
    struct Calculator;

    impl Calculator {
        fn divide(&self, a: i64, b: i64) -> anyhow::Result<i64> {
            if b == 0 {
                anyhow::bail!("division by zero");
            }
            Ok(a / b)
        }
    }

    fn target() -> ReflectiveTarget<Calculator> {
        let ty = TypeInfo::class("Calculator")
            .method_with_params("divide", &["i64", "i64"])
            .build();
        ReflectiveTarget::new(Arc::new(Calculator), ty).method("divide", |calc, args| {
            let a = args.cloned::<i64>(0)?;
            let b = args.cloned::<i64>(1)?;
            Ok(value(calc.divide(a, b)?))
        })
    }

    #[test]
    fn test_dispatch_success() {
        let target = target();
        let method = target.target_type().find_method("divide").unwrap();
        let result = target.invoke(&method, &[value(10i64), value(2i64)]).unwrap();
        assert_eq!(result.downcast_ref::<i64>(), Some(&5));
    }

    #[test]
    fn test_business_error_is_target() {
        let target = target();
        let method = target.target_type().find_method("divide").unwrap();
        let err = target.invoke(&method, &[value(1i64), value(0i64)]).unwrap_err();
        assert!(err.is_target());
        assert_eq!(err.to_string(), "division by zero");
    }

    #[test]
    fn test_argument_mismatch_is_dispatch() {
        let target = target();
        let method = target.target_type().find_method("divide").unwrap();

        let err = target.invoke(&method, &[value(1i64), value("two")]).unwrap_err();
        assert!(matches!(err, AopError::Dispatch { .. }));

        let err = target.invoke(&method, &[value(1i64)]).unwrap_err();
        assert!(matches!(err, AopError::Dispatch { .. }));
    }

    #[test]
    fn test_unknown_method_is_dispatch() {
        let target = target();
        let err = target
            .invoke(&Method::new("Calculator", "multiply"), &[])
            .unwrap_err();
        assert!(matches!(err, AopError::Dispatch { .. }));
    }
}
