//! 自动代理创建器
//!
//! 汇总切面定义与普通通知器，为每个新对象筛选出适用的通知器，
//! 存在适用通知器时用代理替换该对象。

use crate::adapter::{AdvisorAdapterRegistry, DefaultAdvisorAdapterRegistry};
use crate::advisor::{sort_advisors, Advisor};
use crate::advisor_factory::{AspectAdvisorFactory, DefaultAspectAdvisorFactory};
use crate::aspect::{get_all_aspect_registrations, AspectDefinition, InstantiationModel};
use crate::config::AopConfig;
use crate::eligibility::find_applicable_advisors;
use crate::error::AopResult;
use crate::metadata::TypeInfo;
use crate::post_processor::TargetPostProcessor;
use crate::proxy::ProxyFactory;
use crate::registry::AspectInstanceRegistry;
use crate::target::Target;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 自动代理创建器
///
/// ## 使用示例
///
/// ```ignore
/// let creator = AutoProxyCreator::new().with_config(AopConfig::from_env()?);
/// creator.auto_register();
/// let service = creator.wrap_if_necessary(service)?;
/// ```
pub struct AutoProxyCreator {
    definitions: RwLock<Vec<AspectDefinition>>,
    advisors: RwLock<Vec<Advisor>>,
    /// 单例切面生成的通知器，按切面名称缓存
    singleton_advisors: RwLock<HashMap<String, Vec<Advisor>>>,
    instances: Arc<AspectInstanceRegistry>,
    factory: Arc<dyn AspectAdvisorFactory>,
    adapters: Arc<dyn AdvisorAdapterRegistry>,
    config: AopConfig,
}

impl AutoProxyCreator {
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(Vec::new()),
            advisors: RwLock::new(Vec::new()),
            singleton_advisors: RwLock::new(HashMap::new()),
            instances: Arc::new(AspectInstanceRegistry::new()),
            factory: Arc::new(DefaultAspectAdvisorFactory),
            adapters: Arc::new(DefaultAdvisorAdapterRegistry::new()),
            config: AopConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AopConfig) -> Self {
        self.config = config;
        self
    }

    /// 共享的切面实例注册表
    pub fn with_instances(mut self, instances: Arc<AspectInstanceRegistry>) -> Self {
        self.instances = instances;
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn AspectAdvisorFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_adapters(mut self, adapters: Arc<dyn AdvisorAdapterRegistry>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn config(&self) -> &AopConfig {
        &self.config
    }

    pub fn instances(&self) -> &Arc<AspectInstanceRegistry> {
        &self.instances
    }

    /// 注册切面定义；同名定义会被替换
    ///
    /// 替换时丢弃旧定义的单例实例与缓存的通知器。
    pub fn register_aspect(&self, definition: AspectDefinition) {
        tracing::debug!("Registering aspect: {}", definition.name());
        let mut definitions = self.definitions.write();
        self.singleton_advisors.write().remove(definition.name());
        match definitions.iter_mut().find(|d| d.name() == definition.name()) {
            Some(existing) => {
                self.instances.remove_singleton(existing);
                *existing = definition;
            }
            None => definitions.push(definition),
        }
    }

    /// 注册普通通知器
    pub fn add_advisor(&self, advisor: Advisor) {
        tracing::debug!("Registering advisor: {}", advisor.name());
        self.advisors.write().push(advisor);
    }

    /// 注册所有通过 `#[derive(Aspect)]` 声明的切面，返回新注册的数量
    pub fn auto_register(&self) -> usize {
        let mut registered = 0;
        for registration in get_all_aspect_registrations() {
            let exists = self
                .definitions
                .read()
                .iter()
                .any(|d| d.name() == registration.name);
            if !exists {
                self.register_aspect(registration.definition());
                registered += 1;
            }
        }
        tracing::info!("Auto-registered {} aspect(s)", registered);
        registered
    }

    pub fn aspect_count(&self) -> usize {
        self.definitions.read().len()
    }

    /// 所有候选通知器：普通通知器在前，随后是各切面生成的通知器
    ///
    /// 单例切面的通知器只生成一次；按解析模型的切面每次都会重新创建实例。
    pub fn find_candidate_advisors(&self) -> AopResult<Vec<Advisor>> {
        let mut candidates = self.advisors.read().clone();
        let definitions = self.definitions.read().clone();

        for definition in &definitions {
            candidates.extend(self.aspect_advisors(definition)?);
        }
        Ok(candidates)
    }

    fn aspect_advisors(&self, definition: &AspectDefinition) -> AopResult<Vec<Advisor>> {
        let singleton = definition.model() == InstantiationModel::Singleton;
        if singleton {
            if let Some(advisors) = self.singleton_advisors.read().get(definition.name()) {
                return Ok(advisors.clone());
            }
        }

        let source = self.instances.get_source(definition)?;
        let advisors = self.factory.advisors(definition, source)?;

        if singleton {
            // 持有定义列表的读锁，替换与缓存写入不会交错
            let definitions = self.definitions.read();
            if definitions.iter().any(|d| d.is_same(definition)) {
                self.singleton_advisors
                    .write()
                    .entry(definition.name().to_string())
                    .or_insert_with(|| advisors.clone());
            } else {
                tracing::debug!(
                    "Aspect '{}' was replaced while building advisors, not caching",
                    definition.name()
                );
                self.instances.remove_singleton(definition);
            }
        }
        Ok(advisors)
    }

    /// 适用于类型的通知器（已排序）
    pub fn find_eligible_advisors(&self, ty: &TypeInfo) -> AopResult<Vec<Advisor>> {
        let candidates = self.find_candidate_advisors()?;
        let mut eligible = find_applicable_advisors(&candidates, ty);
        sort_advisors(&mut eligible);
        Ok(eligible)
    }

    /// 存在适用通知器时返回代理，否则原样返回
    pub fn wrap_if_necessary(&self, target: Arc<dyn Target>) -> AopResult<Arc<dyn Target>> {
        if !self.config.enabled {
            return Ok(target);
        }

        let ty = target.target_type();
        let eligible = self.find_eligible_advisors(&ty)?;
        if eligible.is_empty() {
            tracing::trace!("No advisors apply to {}, skipping proxy creation", ty.name());
            return Ok(target);
        }

        tracing::debug!(
            "Creating proxy for {} with {} advisor(s)",
            ty.name(),
            eligible.len()
        );
        let proxy = ProxyFactory::new(target)
            .adapters(Arc::clone(&self.adapters))
            .advisors(eligible)
            .config(self.config.proxy_config())
            .get_proxy()?;
        Ok(proxy.into_target())
    }

    /// 关闭：销毁单例切面并清空通知器缓存
    pub fn destroy(&self) {
        self.singleton_advisors.write().clear();
        self.instances.destroy_singletons();
    }
}

impl Default for AutoProxyCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetPostProcessor for AutoProxyCreator {
    fn name(&self) -> &str {
        "AutoProxyCreator"
    }

    fn order(&self) -> i32 {
        2000
    }

    fn post_process(&self, target: Arc<dyn Target>) -> AopResult<Arc<dyn Target>> {
        self.wrap_if_necessary(target)
    }
}

impl fmt::Debug for AutoProxyCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoProxyCreator")
            .field("aspects", &self.definitions.read().len())
            .field("advisors", &self.advisors.read().len())
            .field("config", &self.config)
            .finish()
    }
}
