//! 切面实例注册表
//!
//! 负责按实例化模型提供切面实例：单例模型每个切面定义只构造一次，
//! 按解析模型每次调用都构造新实例。

use crate::aspect::{Aspect, AspectDefinition, InstantiationModel};
use crate::error::{AopError, AopResult};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type SingletonSlot = Arc<OnceCell<Arc<dyn Aspect>>>;

/// 切面实例注册表
///
/// 单例映射采用双重检查：先在读锁下查找槽位，未命中再在写锁下插入空槽位；
/// 实际构造在槽位自身的 `OnceCell` 内完成，不持有映射锁。
/// 同一定义的并发首次访问只会执行一次构造函数。
///
/// 槽位按定义身份（`AspectDefinition::id`）区分，而不是按切面类型：
/// 同一类型的两个定义拥有各自的单例。
#[derive(Default)]
pub struct AspectInstanceRegistry {
    singletons: RwLock<HashMap<u64, SingletonSlot>>,
}

impl AspectInstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取切面实例
    ///
    /// 构造失败以 `AdviceBuild` 返回，且不会缓存任何东西。
    pub fn get_source(&self, definition: &AspectDefinition) -> AopResult<Arc<dyn Aspect>> {
        match definition.model() {
            InstantiationModel::PerResolution => definition
                .instantiate()
                .map_err(|e| AopError::advice_build(definition.name(), e)),
            InstantiationModel::Singleton => self.get_singleton(definition),
        }
    }

    fn get_singleton(&self, definition: &AspectDefinition) -> AopResult<Arc<dyn Aspect>> {
        let slot = self.slot(definition.id());
        slot.get_or_try_init(|| {
            tracing::debug!("Creating singleton aspect: {}", definition.name());
            definition.instantiate()
        })
        .map(Arc::clone)
        .map_err(|e| AopError::advice_build(definition.name(), e))
    }

    fn slot(&self, id: u64) -> SingletonSlot {
        if let Some(slot) = self.singletons.read().get(&id) {
            return Arc::clone(slot);
        }
        let mut singletons = self.singletons.write();
        Arc::clone(singletons.entry(id).or_default())
    }

    /// 该定义的单例是否已经构造
    pub fn contains_singleton(&self, definition: &AspectDefinition) -> bool {
        self.singletons
            .read()
            .get(&definition.id())
            .map(|slot| slot.get().is_some())
            .unwrap_or(false)
    }

    /// 移除某个定义的单例，返回是否存在过
    pub fn remove_singleton(&self, definition: &AspectDefinition) -> bool {
        let removed = self.singletons.write().remove(&definition.id());
        if removed.is_some() {
            tracing::debug!("Removed singleton aspect: {}", definition.name());
        }
        removed.map(|slot| slot.get().is_some()).unwrap_or(false)
    }

    /// 已构造的单例数量
    pub fn singleton_count(&self) -> usize {
        self.singletons
            .read()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    /// 销毁所有单例（关闭时调用）
    pub fn destroy_singletons(&self) {
        let mut singletons = self.singletons.write();
        let count = singletons.values().filter(|slot| slot.get().is_some()).count();
        singletons.clear();
        tracing::debug!("Destroyed {} singleton aspect(s)", count);
    }
}

impl std::fmt::Debug for AspectInstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AspectInstanceRegistry")
            .field("singletons", &self.singleton_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspect::AdviceMethod;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAspect;

    impl Aspect for CountingAspect {
        fn advice_methods(self: Arc<Self>) -> anyhow::Result<Vec<AdviceMethod>> {
            Ok(Vec::new())
        }
    }

    fn counting_definition(model: InstantiationModel) -> (AspectDefinition, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let def = AspectDefinition::new("CountingAspect", model, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CountingAspect)
        });
        (def, created)
    }

    #[test]
    fn test_singleton_constructed_once() {
        let registry = AspectInstanceRegistry::new();
        let (def, created) = counting_definition(InstantiationModel::Singleton);

        let first = registry.get_source(&def).unwrap();
        let second = registry.get_source(&def).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.singleton_count(), 1);
        assert!(registry.contains_singleton(&def));
    }

    #[test]
    fn test_per_resolution_constructs_each_time() {
        let registry = AspectInstanceRegistry::new();
        let (def, created) = counting_definition(InstantiationModel::PerResolution);

        let first = registry.get_source(&def).unwrap();
        let second = registry.get_source(&def).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(registry.singleton_count(), 0);
    }

    #[test]
    fn test_failed_constructor_not_cached() {
        let registry = AspectInstanceRegistry::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let def = AspectDefinition::new("Flaky", InstantiationModel::Singleton, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("first attempt fails");
            }
            Ok(CountingAspect)
        });

        let err = registry.get_source(&def).err().unwrap();
        assert!(matches!(err, AopError::AdviceBuild { .. }));
        assert_eq!(registry.singleton_count(), 0);

        assert!(registry.get_source(&def).is_ok());
        assert_eq!(registry.singleton_count(), 1);
    }

    #[test]
    fn test_destroy_singletons() {
        let registry = AspectInstanceRegistry::new();
        let (def, created) = counting_definition(InstantiationModel::Singleton);

        registry.get_source(&def).unwrap();
        registry.destroy_singletons();
        assert_eq!(registry.singleton_count(), 0);

        registry.get_source(&def).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_definitions_of_same_type_are_separate() {
        let registry = AspectInstanceRegistry::new();
        let (users, _) = counting_definition(InstantiationModel::Singleton);
        let (orders, _) = counting_definition(InstantiationModel::Singleton);

        let a = registry.get_source(&users).unwrap();
        let b = registry.get_source(&orders).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.singleton_count(), 2);

        let again = registry.get_source(&users.clone()).unwrap();
        assert!(Arc::ptr_eq(&a, &again));
    }

    #[test]
    fn test_remove_singleton() {
        let registry = AspectInstanceRegistry::new();
        let (def, created) = counting_definition(InstantiationModel::Singleton);

        assert!(!registry.remove_singleton(&def));
        registry.get_source(&def).unwrap();
        assert!(registry.remove_singleton(&def));
        assert!(!registry.contains_singleton(&def));

        registry.get_source(&def).unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }
}
