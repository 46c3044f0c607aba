//! 资格判定
//!
//! 判断通知器是否适用于某个具体类型，并从候选列表中筛选适用的通知器。
//! 类型级判定只是粗筛：允许误报（调用链解析时会按方法再次过滤），不允许漏报。

use crate::advisor::Advisor;
use crate::metadata::{MethodRef, TypeInfo};
use crate::pointcut::Pointcut;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// 通知器是否适用于类型（不考虑引入）
pub fn can_apply(advisor: &Advisor, ty: &TypeInfo) -> bool {
    can_apply_with_introductions(advisor, ty, false)
}

/// 通知器是否适用于类型
///
/// `has_introductions` 会传递给引入感知的方法匹配器。
pub fn can_apply_with_introductions(advisor: &Advisor, ty: &TypeInfo, has_introductions: bool) -> bool {
    match advisor {
        Advisor::Introduction(introduction) => introduction.type_filter.matches(ty),
        Advisor::Pointcut(pointcut_advisor) => {
            pointcut_applies(&pointcut_advisor.pointcut, ty, has_introductions)
        }
        Advisor::Plain(_) => true,
    }
}

/// 切点是否可能适用于类型：任一方法匹配即视为适用
pub fn pointcut_applies(pointcut: &Pointcut, ty: &TypeInfo, has_introductions: bool) -> bool {
    if !pointcut.type_filter().matches(ty) {
        return false;
    }

    let method_filter = pointcut.method_filter();
    if method_filter.is_any() {
        return true;
    }

    candidate_methods(ty).iter().any(|method| {
        method_filter.matches_with_introductions(method, ty, has_introductions)
    })
}

/// 用户可见类型上声明的方法（跳过代理生成的合成方法）以及所有接口上的方法，按身份去重
fn candidate_methods(ty: &TypeInfo) -> Vec<MethodRef> {
    let user_type = ty.user_type();
    let mut seen = HashSet::new();

    user_type
        .all_declared_methods()
        .into_iter()
        .filter(|method| !method.is_synthetic())
        .chain(
            ty.all_interfaces()
                .iter()
                .flat_map(|iface| iface.declared_methods().to_vec()),
        )
        .filter(|method| seen.insert(method.clone()))
        .collect()
}

/// 从候选通知器中筛选适用于类型的通知器，保持原有相对顺序
///
/// 先解析引入通知器，再以"是否存在引入"为条件判定其余通知器。
pub fn find_applicable_advisors(candidates: &[Advisor], ty: &TypeInfo) -> Vec<Advisor> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut applicable = vec![false; candidates.len()];
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.is_introduction() && can_apply(candidate, ty) {
            applicable[index] = true;
        }
    }

    let has_introductions = applicable.iter().any(|a| *a);
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.is_introduction() {
            continue;
        }
        if can_apply_with_introductions(candidate, ty, has_introductions) {
            applicable[index] = true;
        }
    }

    let result: Vec<Advisor> = candidates
        .iter()
        .zip(applicable)
        .filter_map(|(advisor, keep)| keep.then(|| advisor.clone()))
        .collect();

    tracing::trace!(
        "{} of {} candidate advisor(s) apply to {} (introductions: {})",
        result.len(),
        candidates.len(),
        ty.name(),
        has_introductions
    );
    result
}

/// 单个通知器的资格缓存
///
/// 每个具体类型只做一次完整判定，之后 O(1) 查询。并发填充时先写者胜出，
/// 判定是纯函数，竞争中的重复计算可以接受。
pub struct EligibilityCache {
    advisor: Advisor,
    eligible: RwLock<HashMap<String, bool>>,
}

impl EligibilityCache {
    pub fn new(advisor: Advisor) -> Self {
        Self {
            advisor,
            eligible: RwLock::new(HashMap::new()),
        }
    }

    pub fn advisor(&self) -> &Advisor {
        &self.advisor
    }

    /// 通知器是否适用于类型
    pub fn is_eligible(&self, ty: &TypeInfo) -> bool {
        if let Some(eligible) = self.eligible.read().get(ty.name()) {
            return *eligible;
        }

        let eligible = can_apply(&self.advisor, ty);
        *self
            .eligible
            .write()
            .entry(ty.name().to_string())
            .or_insert(eligible)
    }

    /// 已缓存的类型数量
    pub fn len(&self) -> usize {
        self.eligible.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.eligible.read().is_empty()
    }

    pub fn clear(&self) {
        self.eligible.write().clear();
    }
}
