//! 切面通知器工厂
//!
//! 把一个切面实例转换为一组有序的切点通知器。

use crate::advisor::Advisor;
use crate::aspect::{Aspect, AspectDefinition};
use crate::error::{AopError, AopResult};
use std::sync::Arc;

/// 切面通知器工厂 Trait
pub trait AspectAdvisorFactory: Send + Sync {
    /// 检查切面实例上的通知方法并生成通知器
    fn advisors(&self, definition: &AspectDefinition, aspect: Arc<dyn Aspect>) -> AopResult<Vec<Advisor>>;
}

/// 默认的切面通知器工厂
///
/// 同一切面内的通知按类型排列：环绕、前置、后置、返回后、异常；
/// 同类型的通知保持声明顺序。所有通知器继承切面定义的排序值，
/// 名称为 `切面名.通知方法名`。
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAspectAdvisorFactory;

impl AspectAdvisorFactory for DefaultAspectAdvisorFactory {
    fn advisors(&self, definition: &AspectDefinition, aspect: Arc<dyn Aspect>) -> AopResult<Vec<Advisor>> {
        let aspect_name = definition.name().to_string();
        let mut methods = aspect.advice_methods().map_err(|e| {
            tracing::warn!("Aspect '{}' failed to produce advisors: {}", aspect_name, e);
            AopError::advice_build(aspect_name.as_str(), e)
        })?;

        methods.sort_by_key(|method| method.advice.advice_type().precedence());

        let advisors = methods
            .into_iter()
            .map(|method| {
                let advisor = Advisor::pointcut(
                    format!("{}.{}", aspect_name, method.name),
                    method.pointcut,
                    method.advice,
                );
                match definition.order() {
                    Some(order) => advisor.with_order(order),
                    None => advisor,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "Built {} advisor(s) from aspect '{}'",
            advisors.len(),
            aspect_name
        );
        Ok(advisors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::Advice;
    use crate::aspect::{AdviceMethod, InstantiationModel};
    use crate::pointcut::Pointcut;

    #[derive(Default)]
    struct TxAspect;

    impl Aspect for TxAspect {
        fn advice_methods(self: Arc<Self>) -> anyhow::Result<Vec<AdviceMethod>> {
            Ok(vec![
                AdviceMethod::new("log_failure", Pointcut::any(), Advice::after_throwing(|_, _| Ok(()))),
                AdviceMethod::new("commit", Pointcut::any(), Advice::after_returning(|_, _| Ok(()))),
                AdviceMethod::new("check", Pointcut::any(), Advice::before(|_| Ok(()))),
                AdviceMethod::new("cleanup", Pointcut::any(), Advice::after(|_| Ok(()))),
                AdviceMethod::new("audit", Pointcut::any(), Advice::before(|_| Ok(()))),
                AdviceMethod::new("transaction", Pointcut::any(), Advice::around(|pjp| pjp.proceed())),
            ])
        }
    }

    #[test]
    fn test_advice_kind_then_declaration_order() {
        let def = AspectDefinition::of::<TxAspect>(InstantiationModel::Singleton).with_order(5);
        let advisors = DefaultAspectAdvisorFactory
            .advisors(&def, def.instantiate().unwrap())
            .unwrap();

        let names: Vec<_> = advisors.iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec![
                "TxAspect.transaction",
                "TxAspect.check",
                "TxAspect.audit",
                "TxAspect.cleanup",
                "TxAspect.commit",
                "TxAspect.log_failure",
            ]
        );
        assert!(advisors.iter().all(|a| a.order() == Some(5)));
    }

    struct BrokenAspect;

    impl Aspect for BrokenAspect {
        fn advice_methods(self: Arc<Self>) -> anyhow::Result<Vec<AdviceMethod>> {
            anyhow::bail!("pointcut expression is invalid")
        }
    }

    #[test]
    fn test_failure_is_advice_build_error() {
        let def = AspectDefinition::new("BrokenAspect", InstantiationModel::Singleton, || {
            Ok(BrokenAspect)
        });
        let err = DefaultAspectAdvisorFactory
            .advisors(&def, def.instantiate().unwrap())
            .unwrap_err();
        match err {
            AopError::AdviceBuild { aspect, .. } => assert_eq!(aspect, "BrokenAspect"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
