//! 调用链解析与缓存
//!
//! 为一次具体的方法调用（方法 × 具体类型）解析出有序的拦截器列表：
//! 静态可判定的通知器立即展开，需要运行时判定的通知器以延迟形式保留。

use crate::adapter::AdvisorAdapterRegistry;
use crate::advisor::Advisor;
use crate::eligibility::can_apply;
use crate::error::AopResult;
use crate::interceptor::MethodInterceptor;
use crate::metadata::{Method, MethodRef, TypeInfo};
use crate::pointcut::MethodFilter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 调用链中的一项
#[derive(Clone)]
pub struct ChainEntry {
    interceptor: Arc<dyn MethodInterceptor>,
    deferred: Option<MethodFilter>,
    advisor: Arc<str>,
}

impl ChainEntry {
    /// 静态匹配成功的拦截器，每次调用都执行
    pub fn eager(interceptor: Arc<dyn MethodInterceptor>, advisor: impl Into<Arc<str>>) -> Self {
        Self {
            interceptor,
            deferred: None,
            advisor: advisor.into(),
        }
    }

    /// 需要在每次调用时结合参数重新判定的拦截器
    pub fn deferred(
        interceptor: Arc<dyn MethodInterceptor>,
        matcher: MethodFilter,
        advisor: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            interceptor,
            deferred: Some(matcher),
            advisor: advisor.into(),
        }
    }

    pub fn interceptor(&self) -> &Arc<dyn MethodInterceptor> {
        &self.interceptor
    }

    pub fn deferred_matcher(&self) -> Option<&MethodFilter> {
        self.deferred.as_ref()
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// 产生该项的通知器名称
    pub fn advisor_name(&self) -> &str {
        &self.advisor
    }
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEntry")
            .field("advisor", &self.advisor)
            .field("deferred", &self.deferred.is_some())
            .finish()
    }
}

/// 解析调用链
///
/// `advisors` 应当已经排好序。`pre_filtered` 为 true 时调用方保证所有通知器
/// 都适用于 `target_type`，因此跳过类型过滤。
pub fn build_chain(
    advisors: &[Advisor],
    method: &Method,
    target_type: &TypeInfo,
    pre_filtered: bool,
    adapters: &dyn AdvisorAdapterRegistry,
) -> AopResult<Vec<ChainEntry>> {
    let mut chain = Vec::with_capacity(advisors.len());
    let mut has_introductions: Option<bool> = None;

    for advisor in advisors {
        match advisor {
            Advisor::Introduction(introduction) => {
                if pre_filtered || introduction.type_filter.matches(target_type) {
                    for interceptor in adapters.interceptors(advisor)? {
                        chain.push(ChainEntry::eager(interceptor, advisor.name()));
                    }
                }
            }
            Advisor::Pointcut(pointcut_advisor) => {
                let pointcut = &pointcut_advisor.pointcut;
                if !pre_filtered && !pointcut.type_filter().matches(target_type) {
                    continue;
                }

                let method_filter = pointcut.method_filter();
                let flag = *has_introductions
                    .get_or_insert_with(|| has_matching_introductions(advisors, target_type));
                if !method_filter.matches_with_introductions(method, target_type, flag) {
                    tracing::trace!(
                        "Advisor '{}' does not match {}",
                        advisor.name(),
                        method.qualified_name()
                    );
                    continue;
                }

                let interceptors = adapters.interceptors(advisor)?;
                if method_filter.is_runtime() {
                    for interceptor in interceptors {
                        chain.push(ChainEntry::deferred(
                            interceptor,
                            method_filter.clone(),
                            advisor.name(),
                        ));
                    }
                } else {
                    for interceptor in interceptors {
                        chain.push(ChainEntry::eager(interceptor, advisor.name()));
                    }
                }
            }
            Advisor::Plain(_) => {
                for interceptor in adapters.interceptors(advisor)? {
                    chain.push(ChainEntry::eager(interceptor, advisor.name()));
                }
            }
        }
    }

    Ok(chain)
}

/// 通知器列表中是否存在适用于类型的引入通知器
fn has_matching_introductions(advisors: &[Advisor], target_type: &TypeInfo) -> bool {
    advisors
        .iter()
        .any(|advisor| advisor.is_introduction() && can_apply(advisor, target_type))
}

/// 调用链缓存键：方法 × 具体类型名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodCacheKey {
    method: MethodRef,
    target_type: String,
}

impl MethodCacheKey {
    pub fn new(method: MethodRef, target_type: &TypeInfo) -> Self {
        Self {
            method,
            target_type: target_type.name().to_string(),
        }
    }
}

struct CacheState {
    generation: u64,
    chains: HashMap<MethodCacheKey, Arc<[ChainEntry]>>,
}

/// 调用链缓存
///
/// 每个代理配置一份。读不阻塞读；条目在完整解析后才发布；
/// 通知器列表变化时整体清空（代次递增），用旧代次解析出的调用链不会被发布。
pub struct ChainCache {
    state: RwLock<CacheState>,
}

impl ChainCache {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState {
                generation: 0,
                chains: HashMap::new(),
            }),
        }
    }

    /// 当前代次
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn get(&self, key: &MethodCacheKey) -> Option<Arc<[ChainEntry]>> {
        self.state.read().chains.get(key).cloned()
    }

    /// 发布解析好的调用链
    ///
    /// 仅当缓存仍处于解析时的代次才写入；若同一键已被其他线程写入，返回先写入者。
    pub fn publish(
        &self,
        key: MethodCacheKey,
        chain: Arc<[ChainEntry]>,
        generation: u64,
    ) -> Arc<[ChainEntry]> {
        let mut state = self.state.write();
        if state.generation != generation {
            tracing::debug!(
                "Discarding chain for {} resolved against stale advisor generation {}",
                key.method,
                generation
            );
            return chain;
        }
        Arc::clone(state.chains.entry(key).or_insert(chain))
    }

    /// 清空整个缓存并推进代次
    pub fn invalidate(&self) -> u64 {
        let mut state = self.state.write();
        state.generation += 1;
        state.chains = HashMap::new();
        state.generation
    }

    pub fn len(&self) -> usize {
        self.state.read().chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().chains.is_empty()
    }
}

impl Default for ChainCache {
    fn default() -> Self {
        Self::new()
    }
}
