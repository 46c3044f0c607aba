//! 切点（Pointcut）模型
//!
//! 切点是一对结构化谓词：类型过滤器 × 方法过滤器。
//! 方法过滤器分为静态匹配（仅依赖签名与类型，可缓存）和
//! 运行时匹配（需要实际调用参数，每次调用都要重新判定）。

use crate::metadata::{Method, TypeInfo};
use crate::target::Value;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// 类型过滤器
#[derive(Clone)]
pub enum TypeFilter {
    /// 匹配所有类型（快速路径哨兵）
    Any,

    /// 按类型名称匹配，支持 `*` 通配符
    /// 例如：Pattern("*Service")
    Pattern(String),

    /// 使用正则表达式匹配类型名称
    Regex(Regex),

    /// 类型可赋值给指定类型（自身、父类型或接口）
    AssignableTo(String),

    /// 自定义匹配函数
    Custom(Arc<dyn Fn(&TypeInfo) -> bool + Send + Sync>),

    /// 与运算（AND）
    And(Box<TypeFilter>, Box<TypeFilter>),

    /// 或运算（OR）
    Or(Box<TypeFilter>, Box<TypeFilter>),

    /// 非运算（NOT）
    Not(Box<TypeFilter>),
}

impl TypeFilter {
    /// 检查类型是否匹配
    ///
    /// 名称匹配使用用户可见类型的名称，代理类型与其目标类型匹配结果相同。
    pub fn matches(&self, ty: &TypeInfo) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::Pattern(pattern) => simple_match(pattern, ty.user_type().name()),
            TypeFilter::Regex(regex) => regex.is_match(ty.user_type().name()),
            TypeFilter::AssignableTo(name) => ty.is_assignable_to(name),
            TypeFilter::Custom(func) => func(ty),
            TypeFilter::And(left, right) => left.matches(ty) && right.matches(ty),
            TypeFilter::Or(left, right) => left.matches(ty) || right.matches(ty),
            TypeFilter::Not(filter) => !filter.matches(ty),
        }
    }

    /// 是否为"匹配所有类型"哨兵
    pub fn is_any(&self) -> bool {
        matches!(self, TypeFilter::Any)
    }

    pub fn custom<F>(func: F) -> Self
    where
        F: Fn(&TypeInfo) -> bool + Send + Sync + 'static,
    {
        TypeFilter::Custom(Arc::new(func))
    }

    /// 与运算，`Any` 作为单位元被折叠
    pub fn and(self, other: TypeFilter) -> Self {
        match (self, other) {
            (TypeFilter::Any, other) => other,
            (this, TypeFilter::Any) => this,
            (this, other) => TypeFilter::And(Box::new(this), Box::new(other)),
        }
    }

    /// 或运算，任一侧为 `Any` 时结果为 `Any`
    pub fn or(self, other: TypeFilter) -> Self {
        match (self, other) {
            (TypeFilter::Any, _) | (_, TypeFilter::Any) => TypeFilter::Any,
            (this, other) => TypeFilter::Or(Box::new(this), Box::new(other)),
        }
    }

    /// 非运算
    pub fn not(self) -> Self {
        TypeFilter::Not(Box::new(self))
    }
}

impl fmt::Debug for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::Any => write!(f, "Any"),
            TypeFilter::Pattern(p) => write!(f, "Pattern({})", p),
            TypeFilter::Regex(r) => write!(f, "Regex({})", r.as_str()),
            TypeFilter::AssignableTo(n) => write!(f, "AssignableTo({})", n),
            TypeFilter::Custom(_) => write!(f, "Custom(...)"),
            TypeFilter::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            TypeFilter::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            TypeFilter::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}

/// 方法匹配器 Trait
///
/// 自定义方法匹配逻辑的扩展点。`is_runtime()` 返回 false 的匹配器
/// 永远不会收到调用参数。
pub trait MethodMatcher: Send + Sync {
    /// 静态匹配：仅依据方法签名与目标类型
    fn matches(&self, method: &Method, target_type: &TypeInfo) -> bool;

    /// 引入感知的静态匹配
    ///
    /// `has_introductions` 表示目标类型上是否存在适用的引入（Introduction）。
    /// 默认忽略该标志。
    fn matches_with_introductions(
        &self,
        method: &Method,
        target_type: &TypeInfo,
        _has_introductions: bool,
    ) -> bool {
        self.matches(method, target_type)
    }

    /// 是否需要在每次调用时结合参数重新判定
    fn is_runtime(&self) -> bool {
        false
    }

    /// 运行时匹配，仅在静态匹配成功且 `is_runtime()` 为 true 时调用
    fn matches_runtime(&self, method: &Method, target_type: &TypeInfo, _args: &[Value]) -> bool {
        self.matches(method, target_type)
    }
}

/// 方法过滤器
#[derive(Clone)]
pub enum MethodFilter {
    /// 匹配所有方法（快速路径哨兵）
    Any,

    /// 按方法名匹配，支持 `*` 通配符
    /// 例如：Pattern("get_*")
    Pattern(String),

    /// 使用正则表达式匹配 `类型.方法` 限定名
    Regex(Regex),

    /// 自定义匹配器（可为静态或运行时）
    Matcher(Arc<dyn MethodMatcher>),

    /// 仅当目标类型匹配时才参与方法匹配（用于切点并集）
    Scoped(TypeFilter, Box<MethodFilter>),

    /// 与运算（AND）
    And(Box<MethodFilter>, Box<MethodFilter>),

    /// 或运算（OR）
    Or(Box<MethodFilter>, Box<MethodFilter>),

    /// 非运算（NOT）
    Not(Box<MethodFilter>),
}

impl MethodFilter {
    /// 静态匹配
    pub fn matches(&self, method: &Method, target_type: &TypeInfo) -> bool {
        self.matches_with_introductions(method, target_type, false)
    }

    /// 引入感知的静态匹配
    pub fn matches_with_introductions(
        &self,
        method: &Method,
        target_type: &TypeInfo,
        has_introductions: bool,
    ) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Pattern(pattern) => simple_match(pattern, method.name()),
            MethodFilter::Regex(regex) => regex.is_match(&method.qualified_name()),
            MethodFilter::Matcher(matcher) => {
                matcher.matches_with_introductions(method, target_type, has_introductions)
            }
            MethodFilter::Scoped(type_filter, inner) => {
                type_filter.matches(target_type)
                    && inner.matches_with_introductions(method, target_type, has_introductions)
            }
            MethodFilter::And(left, right) => {
                left.matches_with_introductions(method, target_type, has_introductions)
                    && right.matches_with_introductions(method, target_type, has_introductions)
            }
            MethodFilter::Or(left, right) => {
                left.matches_with_introductions(method, target_type, has_introductions)
                    || right.matches_with_introductions(method, target_type, has_introductions)
            }
            MethodFilter::Not(inner) => {
                !inner.matches_with_introductions(method, target_type, has_introductions)
            }
        }
    }

    /// 是否需要运行时判定（任一组成部分为运行时即为运行时）
    pub fn is_runtime(&self) -> bool {
        match self {
            MethodFilter::Any | MethodFilter::Pattern(_) | MethodFilter::Regex(_) => false,
            MethodFilter::Matcher(matcher) => matcher.is_runtime(),
            MethodFilter::Scoped(_, inner) | MethodFilter::Not(inner) => inner.is_runtime(),
            MethodFilter::And(left, right) | MethodFilter::Or(left, right) => {
                left.is_runtime() || right.is_runtime()
            }
        }
    }

    /// 运行时匹配
    ///
    /// 静态组成部分沿用其静态结果，只有运行时组成部分会看到参数。
    pub fn matches_runtime(&self, method: &Method, target_type: &TypeInfo, args: &[Value]) -> bool {
        if !self.is_runtime() {
            return self.matches(method, target_type);
        }
        match self {
            MethodFilter::Matcher(matcher) => matcher.matches_runtime(method, target_type, args),
            MethodFilter::Scoped(type_filter, inner) => {
                type_filter.matches(target_type) && inner.matches_runtime(method, target_type, args)
            }
            MethodFilter::And(left, right) => {
                left.matches_runtime(method, target_type, args)
                    && right.matches_runtime(method, target_type, args)
            }
            MethodFilter::Or(left, right) => {
                left.matches_runtime(method, target_type, args)
                    || right.matches_runtime(method, target_type, args)
            }
            MethodFilter::Not(inner) => !inner.matches_runtime(method, target_type, args),
            MethodFilter::Any | MethodFilter::Pattern(_) | MethodFilter::Regex(_) => {
                self.matches(method, target_type)
            }
        }
    }

    /// 是否为"匹配所有方法"哨兵
    pub fn is_any(&self) -> bool {
        matches!(self, MethodFilter::Any)
    }

    pub fn matcher<M>(matcher: M) -> Self
    where
        M: MethodMatcher + 'static,
    {
        MethodFilter::Matcher(Arc::new(matcher))
    }

    /// 与运算，`Any` 作为单位元被折叠
    pub fn and(self, other: MethodFilter) -> Self {
        match (self, other) {
            (MethodFilter::Any, other) => other,
            (this, MethodFilter::Any) => this,
            (this, other) => MethodFilter::And(Box::new(this), Box::new(other)),
        }
    }

    /// 或运算
    pub fn or(self, other: MethodFilter) -> Self {
        MethodFilter::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    pub fn not(self) -> Self {
        MethodFilter::Not(Box::new(self))
    }
}

impl fmt::Debug for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => write!(f, "Any"),
            MethodFilter::Pattern(p) => write!(f, "Pattern({})", p),
            MethodFilter::Regex(r) => write!(f, "Regex({})", r.as_str()),
            MethodFilter::Matcher(m) => {
                write!(f, "Matcher(runtime={})", m.is_runtime())
            }
            MethodFilter::Scoped(t, m) => write!(f, "Scoped({:?}, {:?})", t, m),
            MethodFilter::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            MethodFilter::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            MethodFilter::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}

/// 切点：类型过滤器 × 方法过滤器
#[derive(Clone, Debug)]
pub struct Pointcut {
    type_filter: TypeFilter,
    method_filter: MethodFilter,
}

impl Pointcut {
    pub fn new(type_filter: TypeFilter, method_filter: MethodFilter) -> Self {
        Self {
            type_filter,
            method_filter,
        }
    }

    /// 匹配所有类型的所有方法
    pub fn any() -> Self {
        Self::new(TypeFilter::Any, MethodFilter::Any)
    }

    /// 仅按类型过滤，方法全部匹配
    pub fn for_types(type_filter: TypeFilter) -> Self {
        Self::new(type_filter, MethodFilter::Any)
    }

    /// 仅按方法过滤，类型全部匹配
    pub fn for_methods(method_filter: MethodFilter) -> Self {
        Self::new(TypeFilter::Any, method_filter)
    }

    /// 按类型名模式与方法名模式匹配，例如 `("*Service", "get_*")`
    pub fn execution(type_pattern: &str, method_pattern: &str) -> Self {
        let type_filter = if type_pattern == "*" {
            TypeFilter::Any
        } else {
            TypeFilter::Pattern(type_pattern.to_string())
        };
        let method_filter = if method_pattern == "*" {
            MethodFilter::Any
        } else {
            MethodFilter::Pattern(method_pattern.to_string())
        };
        Self::new(type_filter, method_filter)
    }

    pub fn type_filter(&self) -> &TypeFilter {
        &self.type_filter
    }

    pub fn method_filter(&self) -> &MethodFilter {
        &self.method_filter
    }

    /// 是否为"匹配一切"切点
    pub fn is_any(&self) -> bool {
        self.type_filter.is_any() && self.method_filter.is_any()
    }

    /// 对单个方法的静态匹配（类型 + 方法）
    pub fn matches(&self, method: &Method, target_type: &TypeInfo) -> bool {
        self.type_filter.matches(target_type) && self.method_filter.matches(method, target_type)
    }

    /// 并集
    ///
    /// 方法过滤器按各自的类型过滤器限定作用域：某一侧的方法过滤器
    /// 只有在该侧类型过滤器匹配时才生效。
    pub fn union(self, other: Pointcut) -> Self {
        if self.is_any() || other.is_any() {
            return Pointcut::any();
        }
        let method_filter = MethodFilter::Or(
            Box::new(scope(self.type_filter.clone(), self.method_filter)),
            Box::new(scope(other.type_filter.clone(), other.method_filter)),
        );
        Self::new(self.type_filter.or(other.type_filter), method_filter)
    }

    /// 交集
    pub fn intersection(self, other: Pointcut) -> Self {
        Self::new(
            self.type_filter.and(other.type_filter),
            self.method_filter.and(other.method_filter),
        )
    }
}

impl Default for Pointcut {
    fn default() -> Self {
        Self::any()
    }
}

fn scope(type_filter: TypeFilter, method_filter: MethodFilter) -> MethodFilter {
    if type_filter.is_any() {
        method_filter
    } else {
        MethodFilter::Scoped(type_filter, Box::new(method_filter))
    }
}

/// 简单的模式匹配（支持 * 通配符）
///
/// 支持的模式：
/// - `*` - 匹配任意字符串
/// - `User*` - 以 User 开头
/// - `*Service` - 以 Service 结尾
/// - `*Service*` - 包含 Service
/// - `get_*_by_*` - 多段通配
pub fn simple_match(pattern: &str, target: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if !pattern.contains('*') {
        return pattern == target;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return false,
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return pattern == target,
    };

    if !target.starts_with(first) {
        return false;
    }
    let mut remaining = &target[first.len()..];
    for segment in middle {
        if segment.is_empty() {
            continue;
        }
        match remaining.find(segment) {
            Some(pos) => remaining = &remaining[pos + segment.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TypeRef;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user_service() -> TypeRef {
        TypeInfo::class("UserService")
            .method("get_user")
            .method("save_user")
            .build()
    }

    fn order_service() -> TypeRef {
        TypeInfo::class("OrderService").method("get_order").build()
    }

    struct ArgEquals(u32);

    impl MethodMatcher for ArgEquals {
        fn matches(&self, _method: &Method, _target_type: &TypeInfo) -> bool {
            true
        }

        fn is_runtime(&self) -> bool {
            true
        }

        fn matches_runtime(&self, _method: &Method, _target_type: &TypeInfo, args: &[Value]) -> bool {
            args.first()
                .and_then(|a| a.downcast_ref::<u32>())
                .map(|v| *v == self.0)
                .unwrap_or(false)
        }
    }

    #[test]
    fn test_simple_match() {
        assert!(simple_match("*", "anything"));
        assert!(simple_match("User*", "UserService"));
        assert!(simple_match("*Service", "UserService"));
        assert!(simple_match("*Serv*", "UserService"));
        assert!(simple_match("get_*_by_*", "get_user_by_id"));
        assert!(!simple_match("get_*_by_*", "get_user"));
        assert!(!simple_match("*Service", "UserController"));
        assert!(!simple_match("ab*ba", "aba"));
        assert!(simple_match("UserService", "UserService"));
    }

    #[test]
    fn test_execution_pointcut() {
        let pc = Pointcut::execution("*Service", "get_*");
        let user = user_service();
        let get_user = user.find_method("get_user").unwrap();
        let save_user = user.find_method("save_user").unwrap();

        assert!(pc.matches(&get_user, &user));
        assert!(!pc.matches(&save_user, &user));
        assert!(Pointcut::execution("*", "*").is_any());
    }

    #[test]
    fn test_type_filter_composition() {
        let filter = TypeFilter::Pattern("*Service".into())
            .and(TypeFilter::Pattern("Order*".into()).not());

        assert!(filter.matches(&user_service()));
        assert!(!filter.matches(&order_service()));
        assert!(TypeFilter::Any.and(TypeFilter::Pattern("X".into())).matches(&TypeInfo::class("X").build()));
        assert!(TypeFilter::Pattern("X".into()).or(TypeFilter::Any).is_any());
    }

    #[test]
    fn test_union_is_type_scoped() {
        let left = Pointcut::execution("UserService", "get_*");
        let right = Pointcut::execution("OrderService", "save_*");
        let union = left.union(right);

        let user = user_service();
        let order = order_service();
        let get_user = user.find_method("get_user").unwrap();
        let get_order = order.find_method("get_order").unwrap();

        assert!(union.type_filter().matches(&user));
        assert!(union.type_filter().matches(&order));
        assert!(union.matches(&get_user, &user));
        // get_order 虽然匹配 get_*，但 get_* 只作用于 UserService
        assert!(!union.matches(&get_order, &order));
    }

    #[test]
    fn test_intersection() {
        let pc = Pointcut::for_types(TypeFilter::Pattern("*Service".into()))
            .intersection(Pointcut::for_methods(MethodFilter::Pattern("save_*".into())));
        let user = user_service();

        assert!(pc.matches(&user.find_method("save_user").unwrap(), &user));
        assert!(!pc.matches(&user.find_method("get_user").unwrap(), &user));
    }

    #[test]
    fn test_runtime_composition() {
        let filter = MethodFilter::Pattern("get_*".into()).and(MethodFilter::matcher(ArgEquals(7)));
        let user = user_service();
        let get_user = user.find_method("get_user").unwrap();

        assert!(filter.is_runtime());
        assert!(filter.matches(&get_user, &user));

        let seven: Vec<Value> = vec![Arc::new(7u32)];
        let eight: Vec<Value> = vec![Arc::new(8u32)];
        assert!(filter.matches_runtime(&get_user, &user, &seven));
        assert!(!filter.matches_runtime(&get_user, &user, &eight));
        assert!(!MethodFilter::Pattern("get_*".into()).is_runtime());
    }

    #[test]
    fn test_regex_filters() {
        let filter = MethodFilter::Regex(Regex::new(r"^UserService\.get_.*$").unwrap());
        let user = user_service();
        assert!(filter.matches(&user.find_method("get_user").unwrap(), &user));
        assert!(!filter.matches(&user.find_method("save_user").unwrap(), &user));

        let type_filter = TypeFilter::Regex(Regex::new("^(User|Order)Service$").unwrap());
        assert!(type_filter.matches(&order_service()));
    }

    #[test]
    fn test_custom_matcher_invocations_counted() {
        struct Counting(AtomicUsize);
        impl MethodMatcher for Counting {
            fn matches(&self, _method: &Method, _target_type: &TypeInfo) -> bool {
                self.0.fetch_add(1, Ordering::SeqCst);
                false
            }
        }

        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let filter = MethodFilter::Matcher(counting.clone());
        let user = user_service();
        assert!(!filter.matches(&user.find_method("get_user").unwrap(), &user));
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_name_filters_see_through_proxy() {
        let proxy = TypeInfo::class("UserService$Proxy")
            .extends(user_service())
            .proxy()
            .build();
        assert!(TypeFilter::Pattern("*Service".into()).matches(&proxy));
        assert!(TypeFilter::Regex(Regex::new("^User").unwrap()).matches(&proxy));
        assert!(TypeFilter::AssignableTo("UserService".into()).matches(&proxy));
    }
}
