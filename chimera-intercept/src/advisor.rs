//! 通知器（Advisor）模型
//!
//! 通知器把"在哪里"（切点或引入过滤器）和"做什么"（通知）绑定在一起。
//! 三种结构形态构成封闭的和类型，资格判定与调用链解析都对其做穷尽匹配。

use crate::advice::Advice;
use crate::error::{AopError, AopResult};
use crate::interceptor::IntroductionInterceptor;
use crate::metadata::TypeRef;
use crate::pointcut::{Pointcut, TypeFilter};
use std::fmt;
use std::sync::Arc;

/// 切点通知器：仅在切点匹配处生效
#[derive(Clone, Debug)]
pub struct PointcutAdvisor {
    pub name: String,
    pub pointcut: Pointcut,
    pub advice: Advice,
    pub order: Option<i32>,
}

/// 引入通知器：为匹配的类型整体增加接口，不做方法级过滤
#[derive(Clone)]
pub struct IntroductionAdvisor {
    pub name: String,
    pub type_filter: TypeFilter,
    pub interfaces: Vec<TypeRef>,
    pub interceptor: Arc<dyn IntroductionInterceptor>,
    pub order: Option<i32>,
}

impl IntroductionAdvisor {
    /// 校验拦截器确实实现了所有被引入的接口
    pub fn validate_interfaces(&self) -> AopResult<()> {
        for iface in &self.interfaces {
            if !iface.is_interface() {
                return Err(AopError::configuration(format!(
                    "introduction advisor '{}': {} is not an interface",
                    self.name,
                    iface.name()
                )));
            }
            if !self.interceptor.implements_interface(iface) {
                return Err(AopError::configuration(format!(
                    "introduction advisor '{}': interceptor does not implement {}",
                    self.name,
                    iface.name()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for IntroductionAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interfaces: Vec<_> = self.interfaces.iter().map(|i| i.name().to_string()).collect();
        f.debug_struct("IntroductionAdvisor")
            .field("name", &self.name)
            .field("type_filter", &self.type_filter)
            .field("interfaces", &interfaces)
            .field("order", &self.order)
            .finish()
    }
}

/// 无切点通知器：对所有调用无条件生效
#[derive(Clone, Debug)]
pub struct PlainAdvisor {
    pub name: String,
    pub advice: Advice,
    pub order: Option<i32>,
}

/// 通知器
#[derive(Clone, Debug)]
pub enum Advisor {
    Pointcut(PointcutAdvisor),
    Introduction(IntroductionAdvisor),
    Plain(PlainAdvisor),
}

impl Advisor {
    /// 创建切点通知器
    pub fn pointcut(name: impl Into<String>, pointcut: Pointcut, advice: Advice) -> Self {
        Advisor::Pointcut(PointcutAdvisor {
            name: name.into(),
            pointcut,
            advice,
            order: None,
        })
    }

    /// 创建引入通知器
    pub fn introduction(
        name: impl Into<String>,
        type_filter: TypeFilter,
        interfaces: Vec<TypeRef>,
        interceptor: Arc<dyn IntroductionInterceptor>,
    ) -> Self {
        Advisor::Introduction(IntroductionAdvisor {
            name: name.into(),
            type_filter,
            interfaces,
            interceptor,
            order: None,
        })
    }

    /// 创建无切点通知器
    pub fn plain(name: impl Into<String>, advice: Advice) -> Self {
        Advisor::Plain(PlainAdvisor {
            name: name.into(),
            advice,
            order: None,
        })
    }

    /// 设置排序值（越小越靠外层）
    pub fn with_order(mut self, order: i32) -> Self {
        match &mut self {
            Advisor::Pointcut(a) => a.order = Some(order),
            Advisor::Introduction(a) => a.order = Some(order),
            Advisor::Plain(a) => a.order = Some(order),
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Advisor::Pointcut(a) => &a.name,
            Advisor::Introduction(a) => &a.name,
            Advisor::Plain(a) => &a.name,
        }
    }

    pub fn order(&self) -> Option<i32> {
        match self {
            Advisor::Pointcut(a) => a.order,
            Advisor::Introduction(a) => a.order,
            Advisor::Plain(a) => a.order,
        }
    }

    /// 获取通知；引入通知器的通知即其引入拦截器
    pub fn advice(&self) -> Advice {
        match self {
            Advisor::Pointcut(a) => a.advice.clone(),
            Advisor::Introduction(a) => Advice::Introduction(Arc::clone(&a.interceptor)),
            Advisor::Plain(a) => a.advice.clone(),
        }
    }

    pub fn is_introduction(&self) -> bool {
        matches!(self, Advisor::Introduction(_))
    }
}

/// 按排序值稳定排序
///
/// 有排序值的通知器按升序排在前面，没有排序值的排在后面并保持注册顺序。
pub fn sort_advisors(advisors: &mut [Advisor]) {
    advisors.sort_by_key(|advisor| match advisor.order() {
        Some(order) => (0u8, order),
        None => (1u8, 0),
    });
}
