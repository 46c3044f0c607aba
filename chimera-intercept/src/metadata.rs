//! 类型元数据
//!
//! Rust 没有运行时反射，因此由调用方（或代码生成）描述目标类型：
//! 声明的方法、父类型以及实现的接口（能力集合）。
//! 资格判定只依赖这里提供的内省能力。

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 方法引用
pub type MethodRef = Arc<Method>;

/// 类型引用
pub type TypeRef = Arc<TypeInfo>;

/// 方法描述
///
/// 方法的身份由签名决定：声明类型、方法名、参数类型。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    name: String,
    declaring_type: String,
    param_types: Vec<String>,
    synthetic: bool,
}

impl Method {
    /// 创建方法描述
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: declaring_type.into(),
            param_types: Vec::new(),
            synthetic: false,
        }
    }

    /// 追加参数类型
    pub fn param(mut self, type_name: impl Into<String>) -> Self {
        self.param_types.push(type_name.into());
        self
    }

    /// 标记为代理生成的合成方法
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn param_types(&self) -> &[String] {
        &self.param_types
    }

    pub fn param_count(&self) -> usize {
        self.param_types.len()
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// 完整签名，例如 `UserService.get_user(u32)`
    pub fn signature(&self) -> String {
        format!(
            "{}.{}({})",
            self.declaring_type,
            self.name,
            self.param_types.join(", ")
        )
    }

    /// 限定名，例如 `UserService.get_user`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// 具体类型
    Class,
    /// 接口（能力集合）
    Interface,
}

/// 类型描述
#[derive(Debug)]
pub struct TypeInfo {
    name: String,
    kind: TypeKind,
    superclass: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    methods: Vec<MethodRef>,
    proxy: bool,
}

impl TypeInfo {
    /// 开始描述一个具体类型
    pub fn class(name: impl Into<String>) -> TypeInfoBuilder {
        TypeInfoBuilder::new(name.into(), TypeKind::Class)
    }

    /// 开始描述一个接口
    pub fn interface(name: impl Into<String>) -> TypeInfoBuilder {
        TypeInfoBuilder::new(name.into(), TypeKind::Interface)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn superclass(&self) -> Option<&TypeRef> {
        self.superclass.as_ref()
    }

    /// 直接实现的接口
    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    /// 本类型新声明的方法
    pub fn declared_methods(&self) -> &[MethodRef] {
        &self.methods
    }

    /// 是否为代理生成的合成类型
    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    /// 用户可见的类型：代理类型返回其父类型，否则返回自身
    pub fn user_type(&self) -> &TypeInfo {
        match (&self.superclass, self.proxy) {
            (Some(parent), true) => parent.user_type(),
            _ => self,
        }
    }

    /// 本类型及所有父类型声明的方法
    pub fn all_declared_methods(&self) -> Vec<MethodRef> {
        let mut methods: Vec<MethodRef> = self.methods.clone();
        let mut current = self.superclass.as_ref();
        while let Some(parent) = current {
            methods.extend(parent.methods.iter().cloned());
            current = parent.superclass.as_ref();
        }
        methods
    }

    /// 传递闭包上的全部接口（含父类型与接口继承），按首次出现去重
    pub fn all_interfaces(&self) -> Vec<TypeRef> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        self.collect_interfaces(&mut seen, &mut result);
        result
    }

    fn collect_interfaces(&self, seen: &mut HashSet<String>, result: &mut Vec<TypeRef>) {
        for iface in &self.interfaces {
            if seen.insert(iface.name.clone()) {
                result.push(Arc::clone(iface));
            }
            iface.collect_interfaces(seen, result);
        }
        if let Some(parent) = &self.superclass {
            parent.collect_interfaces(seen, result);
        }
    }

    /// 是否可赋值给指定名称的类型（自身、父类型或任一接口）
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        if self.name == type_name {
            return true;
        }
        if self.interfaces.iter().any(|i| i.is_assignable_to(type_name)) {
            return true;
        }
        self.superclass
            .as_ref()
            .map(|parent| parent.is_assignable_to(type_name))
            .unwrap_or(false)
    }

    /// 在类型层次与接口中按名称查找方法
    pub fn find_method(&self, name: &str) -> Option<MethodRef> {
        self.all_declared_methods()
            .into_iter()
            .chain(
                self.all_interfaces()
                    .iter()
                    .flat_map(|i| i.methods.clone()),
            )
            .find(|m| m.name() == name)
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeInfo {}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 类型描述构建器
pub struct TypeInfoBuilder {
    name: String,
    kind: TypeKind,
    superclass: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    methods: Vec<MethodRef>,
    proxy: bool,
}

impl TypeInfoBuilder {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            proxy: false,
        }
    }

    /// 声明一个无参方法
    pub fn method(self, name: &str) -> Self {
        let method = Method::new(self.name.clone(), name);
        self.with_method(method)
    }

    /// 声明一个带参数类型的方法
    pub fn method_with_params(self, name: &str, params: &[&str]) -> Self {
        let method = params
            .iter()
            .fold(Method::new(self.name.clone(), name), |m, p| m.param(*p));
        self.with_method(method)
    }

    /// 直接追加方法描述
    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    pub fn extends(mut self, parent: TypeRef) -> Self {
        self.superclass = Some(parent);
        self
    }

    pub fn implements(mut self, iface: TypeRef) -> Self {
        self.interfaces.push(iface);
        self
    }

    /// 标记为代理生成的类型
    pub fn proxy(mut self) -> Self {
        self.proxy = true;
        self
    }

    pub fn build(self) -> TypeRef {
        Arc::new(TypeInfo {
            name: self.name,
            kind: self.kind,
            superclass: self.superclass,
            interfaces: self.interfaces,
            methods: self.methods,
            proxy: self.proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> TypeRef {
        TypeInfo::interface("Repository").method("save").build()
    }

    #[test]
    fn test_method_identity_is_signature() {
        let a = Method::new("UserService", "get_user").param("u32");
        let b = Method::new("UserService", "get_user").param("u32");
        let c = Method::new("UserService", "get_user").param("String");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.signature(), "UserService.get_user(u32)");
    }

    #[test]
    fn test_assignable_through_hierarchy() {
        let base = TypeInfo::class("BaseService").implements(repository()).build();
        let user = TypeInfo::class("UserService").extends(base).build();

        assert!(user.is_assignable_to("UserService"));
        assert!(user.is_assignable_to("BaseService"));
        assert!(user.is_assignable_to("Repository"));
        assert!(!user.is_assignable_to("OrderService"));
    }

    #[test]
    fn test_all_interfaces_deduplicated() {
        let repo = repository();
        let base = TypeInfo::class("BaseService")
            .implements(Arc::clone(&repo))
            .build();
        let user = TypeInfo::class("UserService")
            .extends(base)
            .implements(repo)
            .build();

        let names: Vec<_> = user.all_interfaces().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["Repository"]);
    }

    #[test]
    fn test_user_type_skips_proxy() {
        let user = TypeInfo::class("UserService").method("get_user").build();
        let proxy = TypeInfo::class("UserService$Proxy")
            .extends(Arc::clone(&user))
            .proxy()
            .build();

        assert_eq!(proxy.user_type().name(), "UserService");
        assert_eq!(user.user_type().name(), "UserService");
    }

    #[test]
    fn test_find_method_includes_interfaces() {
        let user = TypeInfo::class("UserService")
            .method("get_user")
            .implements(repository())
            .build();

        assert_eq!(user.find_method("get_user").unwrap().declaring_type(), "UserService");
        assert_eq!(user.find_method("save").unwrap().declaring_type(), "Repository");
        assert!(user.find_method("delete").is_none());
    }
}
