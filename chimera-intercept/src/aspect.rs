//! 切面（Aspect）定义
//!
//! 切面是横切关注点的模块化：一个切面实例提供一组通知方法，
//! 每个通知方法带有自己的切点。切面由 `AspectAdvisorFactory` 转换为通知器。

use crate::advice::Advice;
use crate::pointcut::Pointcut;
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 切面 Trait
///
/// 实现此 trait 以定义切面逻辑
pub trait Aspect: Send + Sync + 'static {
    /// 切面名称
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// 切面提供的通知方法
    ///
    /// 接收 `Arc<Self>`，通知闭包可以持有切面实例本身。
    fn advice_methods(self: Arc<Self>) -> anyhow::Result<Vec<AdviceMethod>>;
}

/// 切面上的一个通知方法
#[derive(Clone)]
pub struct AdviceMethod {
    /// 方法名称
    pub name: String,

    /// 切点
    pub pointcut: Pointcut,

    /// 通知
    pub advice: Advice,
}

impl AdviceMethod {
    pub fn new(name: impl Into<String>, pointcut: Pointcut, advice: Advice) -> Self {
        Self {
            name: name.into(),
            pointcut,
            advice,
        }
    }
}

impl fmt::Debug for AdviceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceMethod")
            .field("name", &self.name)
            .field("pointcut", &self.pointcut)
            .field("advice", &self.advice)
            .finish()
    }
}

/// 切面实例化模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstantiationModel {
    /// 全局唯一实例
    #[default]
    Singleton,

    /// 每次解析通知器时创建新实例
    PerResolution,
}

impl InstantiationModel {
    /// 从字符串解析实例化模型
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "singleton" => Some(InstantiationModel::Singleton),
            "per_resolution" | "prototype" => Some(InstantiationModel::PerResolution),
            _ => None,
        }
    }
}

type AspectConstructor = Arc<dyn Fn() -> anyhow::Result<Arc<dyn Aspect>> + Send + Sync>;

static NEXT_DEFINITION_ID: AtomicU64 = AtomicU64::new(1);

fn next_definition_id() -> u64 {
    NEXT_DEFINITION_ID.fetch_add(1, Ordering::Relaxed)
}

/// 切面定义
///
/// 描述如何创建一个切面：类型身份、实例化模型、排序值以及构造函数。
///
/// 每个定义在创建时获得唯一的 `id`，克隆共享同一个 `id`。单例实例按 `id`
/// 存放，因此同一切面类型的两个定义各自拥有独立的实例。
#[derive(Clone)]
pub struct AspectDefinition {
    id: u64,
    name: String,
    type_id: TypeId,
    model: InstantiationModel,
    order: Option<i32>,
    constructor: AspectConstructor,
}

impl AspectDefinition {
    /// 通过构造函数创建切面定义
    pub fn new<A, F>(name: impl Into<String>, model: InstantiationModel, constructor: F) -> Self
    where
        A: Aspect,
        F: Fn() -> anyhow::Result<A> + Send + Sync + 'static,
    {
        Self {
            id: next_definition_id(),
            name: name.into(),
            type_id: TypeId::of::<A>(),
            model,
            order: None,
            constructor: Arc::new(move || {
                let aspect: Arc<dyn Aspect> = Arc::new(constructor()?);
                Ok(aspect)
            }),
        }
    }

    /// 使用 `Default` 构造的切面
    pub fn of<A: Aspect + Default>(model: InstantiationModel) -> Self {
        Self::new(short_type_name::<A>(), model, || Ok(A::default()))
    }

    /// 从编译时注册信息创建
    pub fn from_registration(registration: &'static AspectRegistration) -> Self {
        let creator = registration.creator;
        Self {
            id: next_definition_id(),
            name: registration.name.to_string(),
            type_id: (registration.type_id)(),
            model: registration.model,
            order: registration.order,
            constructor: Arc::new(move || Ok(creator())),
        }
    }

    /// 设置排序值
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// 定义身份
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否为同一个定义（或其克隆）
    pub fn is_same(&self, other: &AspectDefinition) -> bool {
        self.id == other.id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn model(&self) -> InstantiationModel {
        self.model
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    /// 调用构造函数创建新实例
    pub fn instantiate(&self) -> anyhow::Result<Arc<dyn Aspect>> {
        (self.constructor)()
    }
}

impl fmt::Debug for AspectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("model", &self.model)
            .field("order", &self.order)
            .finish()
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// 切面注册器
///
/// 用于 inventory 自动收集和注册切面，由 `#[derive(Aspect)]` 生成
pub struct AspectRegistration {
    /// 切面名称
    pub name: &'static str,

    /// 实例化模型
    pub model: InstantiationModel,

    /// 排序值
    pub order: Option<i32>,

    /// 切面类型标识
    pub type_id: fn() -> TypeId,

    /// 创建切面实例的函数
    pub creator: fn() -> Arc<dyn Aspect>,
}

impl AspectRegistration {
    /// 创建新的切面注册器
    pub const fn new(
        name: &'static str,
        model: InstantiationModel,
        order: Option<i32>,
        type_id: fn() -> TypeId,
        creator: fn() -> Arc<dyn Aspect>,
    ) -> Self {
        Self {
            name,
            model,
            order,
            type_id,
            creator,
        }
    }

    /// 转换为切面定义
    pub fn definition(&'static self) -> AspectDefinition {
        AspectDefinition::from_registration(self)
    }
}

// 使用 inventory 收集所有切面注册器
inventory::collect!(AspectRegistration);

/// 获取所有注册的切面注册器
pub fn get_all_aspect_registrations() -> impl Iterator<Item = &'static AspectRegistration> {
    inventory::iter::<AspectRegistration>()
}
