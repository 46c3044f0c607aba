#![allow(dead_code)]

use chimera_intercept::prelude::*;
use parking_lot::Mutex;
use std::sync::{Arc, Once};
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// 初始化测试日志（RUST_LOG 控制级别）
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub type Trace = Arc<Mutex<Vec<String>>>;

pub fn trace() -> Trace {
    Arc::default()
}

pub struct UserService {
    trace: Trace,
}

/// `UserService`：`get_user(u32)` 返回 `user-{id}`，id 为 0 时返回业务错误
pub fn user_service_type() -> TypeRef {
    TypeInfo::class("UserService")
        .method_with_params("get_user", &["u32"])
        .method_with_params("delete_user", &["u32"])
        .build()
}

pub fn user_service(trace: &Trace) -> Arc<dyn Target> {
    ReflectiveTarget::new(
        Arc::new(UserService {
            trace: Arc::clone(trace),
        }),
        user_service_type(),
    )
    .method("get_user", |svc, args| {
        let id = args.cloned::<u32>(0)?;
        svc.trace.lock().push("target".to_string());
        if id == 0 {
            anyhow::bail!("user 0 does not exist");
        }
        Ok(value(format!("user-{}", id)))
    })
    .method("delete_user", |svc, args| {
        let id = args.cloned::<u32>(0)?;
        svc.trace.lock().push(format!("delete({})", id));
        Ok(unit())
    })
    .into_arc()
}

/// 在 `proceed()` 前后各记录一次的环绕通知
pub fn around(name: &'static str, trace: &Trace) -> Advice {
    let trace = Arc::clone(trace);
    Advice::around(move |pjp| {
        trace.lock().push(format!("{}-before", name));
        let result = pjp.proceed();
        trace.lock().push(format!("{}-after", name));
        result
    })
}

pub fn as_string(v: Value) -> String {
    v.downcast_ref::<String>().cloned().unwrap_or_default()
}
