//! 代理配置（AdvisedSupport）
//!
//! 持有目标对象、通知器列表与调用链缓存。通知器列表的任何变化都会在
//! 同一把写锁内整体清空调用链缓存，之后的读取不会看到混合了新旧通知器的调用链。

use crate::adapter::{AdvisorAdapterRegistry, DefaultAdvisorAdapterRegistry};
use crate::advice::Advice;
use crate::advisor::{sort_advisors, Advisor};
use crate::chain::{build_chain, ChainCache, ChainEntry, MethodCacheKey};
use crate::error::{AopError, AopResult};
use crate::metadata::{MethodRef, TypeInfo, TypeRef};
use crate::target::Target;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// 代理行为开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// 冻结后不允许再修改通知器列表
    pub frozen: bool,

    /// 通知器已按目标类型预先筛选，解析调用链时跳过类型过滤
    pub pre_filtered: bool,
}

struct AdvisorState {
    advisors: Vec<Advisor>,
    interfaces: Vec<TypeRef>,
}

/// 代理配置
pub struct AdvisedSupport {
    target: Option<Arc<dyn Target>>,
    config: RwLock<ProxyConfig>,
    state: RwLock<AdvisorState>,
    chain_cache: ChainCache,
    adapters: Arc<dyn AdvisorAdapterRegistry>,
}

impl AdvisedSupport {
    /// 创建针对目标对象的配置
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self::with_adapters(Some(target), Arc::new(DefaultAdvisorAdapterRegistry::new()))
    }

    /// 创建没有目标对象的配置（例如只有引入的代理）
    pub fn without_target() -> Self {
        Self::with_adapters(None, Arc::new(DefaultAdvisorAdapterRegistry::new()))
    }

    /// 使用指定的适配器注册表
    pub fn with_adapters(
        target: Option<Arc<dyn Target>>,
        adapters: Arc<dyn AdvisorAdapterRegistry>,
    ) -> Self {
        Self {
            target,
            config: RwLock::new(ProxyConfig::default()),
            state: RwLock::new(AdvisorState {
                advisors: Vec::new(),
                interfaces: Vec::new(),
            }),
            chain_cache: ChainCache::new(),
            adapters,
        }
    }

    pub fn target(&self) -> Option<&Arc<dyn Target>> {
        self.target.as_ref()
    }

    /// 目标对象的具体类型；没有目标对象时为配置错误
    pub fn target_type(&self) -> AopResult<TypeRef> {
        self.target
            .as_ref()
            .map(|target| target.target_type())
            .ok_or_else(|| AopError::configuration("no target available to determine target type"))
    }

    pub fn proxy_config(&self) -> ProxyConfig {
        *self.config.read()
    }

    // 配置写入与通知器修改使用同一把写锁串行化（先 state 后 config）

    pub fn set_proxy_config(&self, config: ProxyConfig) {
        let _state = self.state.write();
        *self.config.write() = config;
        self.chain_cache.invalidate();
    }

    pub fn set_frozen(&self, frozen: bool) {
        let _state = self.state.write();
        self.config.write().frozen = frozen;
    }

    pub fn is_frozen(&self) -> bool {
        self.config.read().frozen
    }

    pub fn set_pre_filtered(&self, pre_filtered: bool) {
        let _state = self.state.write();
        self.config.write().pre_filtered = pre_filtered;
        self.chain_cache.invalidate();
    }

    pub fn is_pre_filtered(&self) -> bool {
        self.config.read().pre_filtered
    }

    /// 当前通知器列表快照（已排序）
    pub fn advisors(&self) -> Vec<Advisor> {
        self.state.read().advisors.clone()
    }

    pub fn advisor_count(&self) -> usize {
        self.state.read().advisors.len()
    }

    /// 代理额外暴露的接口（由引入通知器或手动添加）
    pub fn proxied_interfaces(&self) -> Vec<TypeRef> {
        self.state.read().interfaces.clone()
    }

    /// 手动添加代理接口
    pub fn add_interface(&self, iface: TypeRef) -> AopResult<()> {
        self.mutate(|state| {
            if !state.interfaces.iter().any(|i| i.name() == iface.name()) {
                state.interfaces.push(iface);
            }
            Ok(())
        })
    }

    /// 代理是否暴露指定接口
    pub fn is_interface_proxied(&self, name: &str) -> bool {
        self.state.read().interfaces.iter().any(|i| i.name() == name)
    }

    /// 添加通知器
    pub fn add_advisor(&self, advisor: Advisor) -> AopResult<()> {
        let position = self.advisor_count();
        self.add_advisor_at(position, advisor)
    }

    /// 在指定位置添加通知器
    ///
    /// 列表始终按排序值稳定排序，位置只在排序值相同的通知器之间起作用。
    pub fn add_advisor_at(&self, position: usize, advisor: Advisor) -> AopResult<()> {
        if let Advisor::Introduction(introduction) = &advisor {
            introduction.validate_interfaces()?;
        }

        self.mutate(|state| {
            if position > state.advisors.len() {
                return Err(AopError::configuration(format!(
                    "illegal advisor position {}: only {} advisor(s) registered",
                    position,
                    state.advisors.len()
                )));
            }
            if let Advisor::Introduction(introduction) = &advisor {
                for iface in &introduction.interfaces {
                    if !state.interfaces.iter().any(|i| i.name() == iface.name()) {
                        state.interfaces.push(Arc::clone(iface));
                    }
                }
            }
            tracing::debug!("Adding advisor '{}' at position {}", advisor.name(), position);
            state.advisors.insert(position, advisor);
            sort_advisors(&mut state.advisors);
            Ok(())
        })
    }

    /// 把通知包装为无切点通知器后添加
    pub fn add_advice(&self, name: impl Into<String>, advice: Advice) -> AopResult<()> {
        self.add_advisor(Advisor::plain(name, advice))
    }

    /// 移除指定位置的通知器
    pub fn remove_advisor(&self, index: usize) -> AopResult<Advisor> {
        self.mutate(|state| {
            if index >= state.advisors.len() {
                return Err(AopError::configuration(format!(
                    "advisor index {} is out of bounds: only {} advisor(s) registered",
                    index,
                    state.advisors.len()
                )));
            }
            let removed = state.advisors.remove(index);
            if let Advisor::Introduction(introduction) = &removed {
                state.interfaces.retain(|iface| {
                    !introduction.interfaces.iter().any(|i| i.name() == iface.name())
                });
            }
            tracing::debug!("Removed advisor '{}'", removed.name());
            Ok(removed)
        })
    }

    /// 按名称移除通知器，返回是否存在
    pub fn remove_advisor_named(&self, name: &str) -> AopResult<bool> {
        match self.index_of(name) {
            Some(index) => self.remove_advisor(index).map(|_| true),
            None => Ok(false),
        }
    }

    /// 替换同名通知器，返回是否发生替换
    pub fn replace_advisor(&self, name: &str, replacement: Advisor) -> AopResult<bool> {
        let Some(index) = self.index_of(name) else {
            return Ok(false);
        };
        if let Advisor::Introduction(introduction) = &replacement {
            introduction.validate_interfaces()?;
        }
        self.remove_advisor(index)?;
        self.add_advisor_at(index, replacement)?;
        Ok(true)
    }

    /// 通知器在列表中的位置
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.state
            .read()
            .advisors
            .iter()
            .position(|advisor| advisor.name() == name)
    }

    /// 获取调用链（优先读缓存）
    pub fn interceptor_chain(
        &self,
        method: &MethodRef,
        target_type: &TypeInfo,
    ) -> AopResult<Arc<[ChainEntry]>> {
        let key = MethodCacheKey::new(Arc::clone(method), target_type);
        if let Some(chain) = self.chain_cache.get(&key) {
            return Ok(chain);
        }

        // 在读锁内解析，保证通知器列表与代次一致
        let state = self.state.read();
        let generation = self.chain_cache.generation();
        let pre_filtered = self.is_pre_filtered();
        let chain: Arc<[ChainEntry]> = build_chain(
            &state.advisors,
            method,
            target_type,
            pre_filtered,
            self.adapters.as_ref(),
        )?
        .into();
        drop(state);

        tracing::debug!(
            "Resolved chain of {} interceptor(s) for {} on {}",
            chain.len(),
            method.qualified_name(),
            target_type.name()
        );
        Ok(self.chain_cache.publish(key, chain, generation))
    }

    /// 已缓存的调用链数量
    pub fn cached_chain_count(&self) -> usize {
        self.chain_cache.len()
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut AdvisorState) -> AopResult<R>) -> AopResult<R> {
        let mut state = self.state.write();
        if self.is_frozen() {
            return Err(AopError::configuration(
                "cannot modify advisors: configuration is frozen",
            ));
        }
        let result = f(&mut state)?;
        self.chain_cache.invalidate();
        Ok(result)
    }
}

impl fmt::Debug for AdvisedSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        let advisors: Vec<_> = state.advisors.iter().map(|a| a.name().to_string()).collect();
        f.debug_struct("AdvisedSupport")
            .field("target_type", &self.target.as_ref().map(|t| t.target_type().name().to_string()))
            .field("config", &*self.config.read())
            .field("advisors", &advisors)
            .field("cached_chains", &self.chain_cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TypeInfo;
    use crate::pointcut::Pointcut;
    use crate::target::{unit, ReflectiveTarget};

    fn advised() -> (AdvisedSupport, MethodRef, TypeRef) {
        let ty = TypeInfo::class("UserService").method("get_user").build();
        let method = ty.find_method("get_user").unwrap();
        let target = ReflectiveTarget::new(Arc::new(()), Arc::clone(&ty))
            .method("get_user", |_, _| Ok(unit()))
            .into_arc();
        (AdvisedSupport::new(target), method, ty)
    }

    fn before(name: &str) -> Advisor {
        Advisor::pointcut(name, Pointcut::execution("*", "get_*"), Advice::before(|_| Ok(())))
    }

    fn chain_names(chain: &[ChainEntry]) -> Vec<String> {
        chain.iter().map(|e| e.advisor_name().to_string()).collect()
    }

    #[test]
    fn test_chain_cached_until_advisors_change() {
        let (advised, method, ty) = advised();
        advised.add_advisor(before("a")).unwrap();
        advised.add_advisor(before("b")).unwrap();

        let first = advised.interceptor_chain(&method, &ty).unwrap();
        let second = advised.interceptor_chain(&method, &ty).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(chain_names(&first), vec!["a", "b"]);
        assert_eq!(advised.cached_chain_count(), 1);

        advised.remove_advisor_named("a").unwrap();
        advised.add_advisor(before("c")).unwrap();
        assert_eq!(advised.cached_chain_count(), 0);

        let third = advised.interceptor_chain(&method, &ty).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(chain_names(&third), vec!["b", "c"]);
    }

    #[test]
    fn test_advisors_kept_sorted() {
        let (advised, _, _) = advised();
        advised.add_advisor(before("unordered")).unwrap();
        advised.add_advisor(before("late").with_order(10)).unwrap();
        advised.add_advisor(before("early").with_order(1)).unwrap();

        let names: Vec<_> = advised.advisors().iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["early", "late", "unordered"]);
        assert_eq!(advised.index_of("late"), Some(1));
    }

    #[test]
    fn test_frozen_rejects_mutation() {
        let (advised, _, _) = advised();
        advised.add_advisor(before("a")).unwrap();
        advised.set_frozen(true);

        assert!(matches!(
            advised.add_advisor(before("b")),
            Err(AopError::Configuration(_))
        ));
        assert!(matches!(advised.remove_advisor(0), Err(AopError::Configuration(_))));
        assert_eq!(advised.advisor_count(), 1);
    }

    #[test]
    fn test_replace_and_bounds() {
        let (advised, _, _) = advised();
        advised.add_advisor(before("a")).unwrap();

        assert!(advised.replace_advisor("a", before("z")).unwrap());
        assert!(!advised.replace_advisor("missing", before("y")).unwrap());
        assert_eq!(advised.index_of("z"), Some(0));

        assert!(advised.remove_advisor(5).is_err());
        assert!(advised.add_advisor_at(9, before("x")).is_err());
    }

    #[test]
    fn test_failed_resolution_not_cached() {
        let (advised, method, ty) = advised();
        advised
            .add_advisor(Advisor::plain("broken", Advice::Custom(Arc::new(()))))
            .unwrap();

        assert!(advised.interceptor_chain(&method, &ty).is_err());
        assert_eq!(advised.cached_chain_count(), 0);

        advised.remove_advisor_named("broken").unwrap();
        assert!(advised.interceptor_chain(&method, &ty).unwrap().is_empty());
    }

    #[test]
    fn test_target_type_requires_target() {
        let advised = AdvisedSupport::without_target();
        assert!(matches!(advised.target_type(), Err(AopError::Configuration(_))));
    }
}
