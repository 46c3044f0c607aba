//! 连接点（JoinPoint）定义
//!
//! 连接点表示程序执行的特定点，比如方法调用。
//! `ProceedingJoinPoint` 是单次调用的执行器：沿解析好的调用链逐个调用拦截器，
//! 链尾执行真实方法。

use crate::chain::ChainEntry;
use crate::error::AopResult;
use crate::metadata::{MethodRef, TypeRef};
use crate::target::{Arguments, Target, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// 连接点信息
///
/// 包含方法调用时的上下文信息
#[derive(Clone)]
pub struct JoinPoint {
    /// 被调用的方法
    pub method: MethodRef,

    /// 目标对象的具体类型
    pub target_type: TypeRef,

    /// 方法参数
    pub args: Vec<Value>,

    /// 调用时间戳
    pub timestamp: Instant,
}

impl JoinPoint {
    /// 创建新的连接点
    pub fn new(method: MethodRef, target_type: TypeRef, args: Vec<Value>) -> Self {
        Self {
            method,
            target_type,
            args,
            timestamp: Instant::now(),
        }
    }

    /// 获取完整的方法签名
    pub fn signature(&self) -> String {
        format!("{}::{}", self.target_type.name(), self.method.name())
    }

    /// 获取方法名称
    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    /// 获取目标类型名称
    pub fn target_type_name(&self) -> &str {
        self.target_type.name()
    }

    /// 尝试按索引获取参数
    pub fn arg<T: Any>(&self, index: usize) -> Option<&T> {
        self.args.get(index)?.downcast_ref::<T>()
    }

    /// 参数的类型化视图
    pub fn arguments(&self) -> Arguments<'_> {
        Arguments::new(&self.args)
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("target_type", &self.target_type.name())
            .field("method", &self.method.signature())
            .field("signature", &self.signature())
            .field("arg_count", &self.args.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// 正在进行的方法调用
///
/// 每次调用独占自己的游标，调用链本身不可变，可被并发调用共享。
/// `proceed()` 返回后游标会恢复，因此拦截器可以多次调用 `proceed()`（例如重试）。
pub struct ProceedingJoinPoint {
    /// 连接点信息
    join_point: JoinPoint,

    target: Arc<dyn Target>,
    chain: Arc<[ChainEntry]>,
    cursor: usize,
    attributes: HashMap<String, Value>,
}

impl ProceedingJoinPoint {
    /// 创建新的调用
    pub fn new(
        target: Arc<dyn Target>,
        method: MethodRef,
        args: Vec<Value>,
        target_type: TypeRef,
        chain: Arc<[ChainEntry]>,
    ) -> Self {
        Self {
            join_point: JoinPoint::new(method, target_type, args),
            target,
            chain,
            cursor: 0,
            attributes: HashMap::new(),
        }
    }

    /// 继续执行调用链中的下一个拦截器，链尾执行目标方法
    pub fn proceed(&mut self) -> AopResult<Value> {
        let index = self.cursor;
        let chain = Arc::clone(&self.chain);

        let Some(entry) = chain.get(index) else {
            return self.invoke_joinpoint();
        };

        self.cursor = index + 1;
        let result = match entry.deferred_matcher() {
            Some(matcher) => {
                let jp = &self.join_point;
                if matcher.matches_runtime(&jp.method, &jp.target_type, &jp.args) {
                    entry.interceptor().invoke(self)
                } else {
                    tracing::trace!(
                        "Deferred matcher of advisor '{}' rejected {}",
                        entry.advisor_name(),
                        jp
                    );
                    self.proceed()
                }
            }
            None => entry.interceptor().invoke(self),
        };
        self.cursor = index;

        result
    }

    /// 调用真实方法，目标方法的错误原样返回
    fn invoke_joinpoint(&self) -> AopResult<Value> {
        let jp = &self.join_point;
        self.target.invoke(&jp.method, &jp.args)
    }

    /// 获取连接点信息
    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    pub fn method(&self) -> &MethodRef {
        &self.join_point.method
    }

    pub fn target_type(&self) -> &TypeRef {
        &self.join_point.target_type
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    pub fn arguments(&self) -> &[Value] {
        &self.join_point.args
    }

    /// 替换后续拦截器与目标方法看到的参数
    pub fn set_arguments(&mut self, args: Vec<Value>) {
        self.join_point.args = args;
    }

    /// 替换单个参数
    pub fn set_argument(&mut self, index: usize, arg: Value) -> bool {
        match self.join_point.args.get_mut(index) {
            Some(slot) => {
                *slot = arg;
                true
            }
            None => false,
        }
    }

    /// 当前游标位置（下一个要执行的调用链下标）
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// 调用链长度
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// 在拦截器之间传递的调用级属性
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }
}

impl fmt::Debug for ProceedingJoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProceedingJoinPoint")
            .field("join_point", &self.join_point)
            .field("position", &self.cursor)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}
