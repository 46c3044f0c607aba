//! Chimera Intercept 过程宏
//!
//! 提供 `#[derive(Aspect)]`：在编译时把切面注册到 inventory，
//! 运行时由 `AutoProxyCreator::auto_register()` 统一收集。

extern crate proc_macro;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod aspect;

/// `#[derive(Aspect)]` 宏
///
/// 为结构体生成 `AspectRegistration` 并通过 inventory 提交。
/// 结构体需要实现 `Default` 与 `chimera_intercept::Aspect`。
///
/// 支持的属性：
/// - `name = "..."` 切面名称，默认为结构体名
/// - `scope = "singleton" | "per_resolution"` 实例化模型，默认为单例
/// - `order = N` 排序值，越小越靠外层
///
/// 使用示例：
/// ```ignore
/// use chimera_intercept::prelude::*;
/// use chimera_intercept_macros::Aspect;
///
/// #[derive(Aspect, Default)]
/// #[aspect(scope = "singleton", order = 10)]
/// pub struct AuditAspect;
///
/// impl Aspect for AuditAspect {
///     fn advice_methods(self: Arc<Self>) -> anyhow::Result<Vec<AdviceMethod>> {
///         Ok(vec![AdviceMethod::new(
///             "audit",
///             Pointcut::execution("*Service", "delete_*"),
///             Advice::before(|jp| {
///                 tracing::info!("audit: {}", jp);
///                 Ok(())
///             }),
///         )])
///     }
/// }
/// ```
#[proc_macro_derive(Aspect, attributes(aspect))]
pub fn derive_aspect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    aspect::impl_aspect_derive(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
