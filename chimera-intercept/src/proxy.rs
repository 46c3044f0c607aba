//! 代理与代理工厂
//!
//! `AopProxy` 是调用入口：为每次调用取出（或解析）调用链，然后沿链执行。
//! 代理本身也实现了 `Target`，因此可以再被代理。

use crate::adapter::AdvisorAdapterRegistry;
use crate::advice::Advice;
use crate::advised::{AdvisedSupport, ProxyConfig};
use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};
use crate::joinpoint::ProceedingJoinPoint;
use crate::metadata::{Method, MethodRef, TypeInfo, TypeRef};
use crate::target::{Target, Value};
use std::fmt;
use std::sync::Arc;

/// AOP 代理
#[derive(Clone)]
pub struct AopProxy {
    advised: Arc<AdvisedSupport>,
}

impl AopProxy {
    pub fn new(advised: Arc<AdvisedSupport>) -> Self {
        Self { advised }
    }

    /// 代理配置
    pub fn advised(&self) -> &Arc<AdvisedSupport> {
        &self.advised
    }

    /// 调用方法
    pub fn invoke_method(&self, method: &MethodRef, args: Vec<Value>) -> AopResult<Value> {
        let target = self
            .advised
            .target()
            .ok_or_else(|| AopError::configuration("cannot invoke proxy: no target set"))?;
        let target_type = target.target_type();
        let chain = self.advised.interceptor_chain(method, &target_type)?;

        // 没有任何拦截器时直接调用目标
        if chain.is_empty() {
            return target.invoke(method, &args);
        }

        ProceedingJoinPoint::new(
            Arc::clone(target),
            Arc::clone(method),
            args,
            target_type,
            chain,
        )
        .proceed()
    }

    /// 按方法名调用：先在目标类型上查找，再在代理接口上查找
    pub fn invoke_by_name(&self, name: &str, args: Vec<Value>) -> AopResult<Value> {
        let method = self.resolve_method(name)?;
        self.invoke_method(&method, args)
    }

    fn resolve_method(&self, name: &str) -> AopResult<MethodRef> {
        let target_type = self.advised.target_type()?;
        if let Some(method) = target_type.find_method(name) {
            return Ok(method);
        }
        self.advised
            .proxied_interfaces()
            .iter()
            .find_map(|iface| iface.find_method(name))
            .ok_or_else(|| {
                AopError::dispatch(
                    format!("{}.{}", target_type.name(), name),
                    "method not found on target type or proxied interfaces",
                )
            })
    }

    /// 代理是否实现了指定接口（目标类型自身或引入的接口）
    pub fn implements(&self, type_name: &str) -> bool {
        if self.advised.is_interface_proxied(type_name) {
            return true;
        }
        self.advised
            .target_type()
            .map(|ty| ty.is_assignable_to(type_name))
            .unwrap_or(false)
    }

    pub fn into_target(self) -> Arc<dyn Target> {
        Arc::new(self)
    }
}

impl Target for AopProxy {
    /// 合成的代理类型：父类型为目标类型，并实现所有引入的接口
    fn target_type(&self) -> TypeRef {
        let (name, parent) = match self.advised.target_type() {
            Ok(ty) => (format!("{}$Proxy", ty.name()), Some(ty)),
            Err(_) => ("$Proxy".to_string(), None),
        };
        let mut builder = TypeInfo::class(name).proxy();
        if let Some(parent) = parent {
            builder = builder.extends(parent);
        }
        self.advised
            .proxied_interfaces()
            .into_iter()
            .fold(builder, |b, iface| b.implements(iface))
            .build()
    }

    fn invoke(&self, method: &Method, args: &[Value]) -> AopResult<Value> {
        self.invoke_method(&Arc::new(method.clone()), args.to_vec())
    }

    fn as_advised(&self) -> Option<&Arc<AdvisedSupport>> {
        Some(&self.advised)
    }
}

impl fmt::Debug for AopProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AopProxy")
            .field("advised", &self.advised)
            .finish()
    }
}

/// 代理工厂
///
/// 使用示例：
/// ```ignore
/// let proxy = ProxyFactory::new(target)
///     .advisor(Advisor::pointcut("log", Pointcut::execution("*", "get_*"), advice))
///     .frozen(true)
///     .get_proxy()?;
/// let user = proxy.invoke_by_name("get_user", vec![value(1u32)])?;
/// ```
pub struct ProxyFactory {
    target: Option<Arc<dyn Target>>,
    advisors: Vec<Advisor>,
    interfaces: Vec<TypeRef>,
    config: ProxyConfig,
    adapters: Option<Arc<dyn AdvisorAdapterRegistry>>,
}

impl ProxyFactory {
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self {
            target: Some(target),
            ..Self::without_target()
        }
    }

    /// 没有目标对象的工厂，调用前必须设置目标
    pub fn without_target() -> Self {
        Self {
            target: None,
            advisors: Vec::new(),
            interfaces: Vec::new(),
            config: ProxyConfig::default(),
            adapters: None,
        }
    }

    pub fn target(mut self, target: Arc<dyn Target>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn advisor(mut self, advisor: Advisor) -> Self {
        self.advisors.push(advisor);
        self
    }

    pub fn advisors(mut self, advisors: impl IntoIterator<Item = Advisor>) -> Self {
        self.advisors.extend(advisors);
        self
    }

    /// 添加无切点通知（对所有方法生效）
    pub fn advice(self, name: impl Into<String>, advice: Advice) -> Self {
        self.advisor(Advisor::plain(name, advice))
    }

    /// 额外暴露的接口
    pub fn interface(mut self, iface: TypeRef) -> Self {
        self.interfaces.push(iface);
        self
    }

    pub fn config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn frozen(mut self, frozen: bool) -> Self {
        self.config.frozen = frozen;
        self
    }

    pub fn pre_filtered(mut self, pre_filtered: bool) -> Self {
        self.config.pre_filtered = pre_filtered;
        self
    }

    /// 使用自定义的通知适配器注册表
    pub fn adapters(mut self, adapters: Arc<dyn AdvisorAdapterRegistry>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    /// 构建代理配置；冻结标志在所有通知器加入之后才生效
    pub fn build_advised(self) -> AopResult<AdvisedSupport> {
        let advised = match self.adapters {
            Some(adapters) => AdvisedSupport::with_adapters(self.target, adapters),
            None => match self.target {
                Some(target) => AdvisedSupport::new(target),
                None => AdvisedSupport::without_target(),
            },
        };
        advised.set_pre_filtered(self.config.pre_filtered);

        for iface in self.interfaces {
            advised.add_interface(iface)?;
        }
        for advisor in self.advisors {
            advised.add_advisor(advisor)?;
        }
        advised.set_frozen(self.config.frozen);
        Ok(advised)
    }

    pub fn get_proxy(self) -> AopResult<AopProxy> {
        let advised = self.build_advised()?;
        tracing::debug!(
            "Created proxy with {} advisor(s) for {}",
            advised.advisor_count(),
            advised
                .target_type()
                .map(|ty| ty.name().to_string())
                .unwrap_or_else(|_| "<no target>".to_string())
        );
        Ok(AopProxy::new(Arc::new(advised)))
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("advisors", &self.advisors.len())
            .field("interfaces", &self.interfaces.len())
            .field("config", &self.config)
            .finish()
    }
}
