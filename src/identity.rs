//! 访问者身份和客户端地址
//!
//! 中间件本身不做认证，只读取认证层已经挂到请求上的信息。

use std::net::SocketAddr;

use http::Extensions;
use hyper::header::{HeaderMap, AUTHORIZATION};

/// 已认证但拿不到用户名时的占位名
pub const AUTHENTICATED_PLACEHOLDER: &str = "authenticated";
/// 未认证时的占位名
pub const UNKNOWN_USER: &str = "unknown";
/// 拿不到客户端地址时的占位值
pub const UNKNOWN_IP: &str = "unknown";

/// 认证层放入请求扩展中的用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

/// 宿主放入请求扩展中的对端地址
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// 用户名解析
///
/// 不同部署的身份来源不同，这里做成可替换的能力。实现不允许失败，
/// 拿不到身份时返回占位名。
pub trait IdentityResolver: Send + Sync {
    fn username(&self, headers: &HeaderMap, extensions: &Extensions) -> String;
}

/// 默认的用户名解析：先看 [`Principal`]，再看 `Authorization` 头
#[derive(Debug, Clone, Copy, Default)]
pub struct PrincipalIdentity;

impl IdentityResolver for PrincipalIdentity {
    fn username(&self, headers: &HeaderMap, extensions: &Extensions) -> String {
        if let Some(Principal(name)) = extensions.get::<Principal>() {
            if !name.is_empty() {
                return name.clone();
            }
        }

        let has_credential = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map_or(false, |value| !value.trim().is_empty());
        if has_credential {
            AUTHENTICATED_PLACEHOLDER.to_string()
        } else {
            UNKNOWN_USER.to_string()
        }
    }
}

/// 客户端 IP：`X-Forwarded-For` 第一个地址 > `X-Real-IP` > [`RemoteAddr`]
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(ip) = forwarded_ip(headers) {
        return ip;
    }
    match extensions.get::<RemoteAddr>() {
        Some(RemoteAddr(addr)) => addr.ip().to_string(),
        None => UNKNOWN_IP.to_string(),
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
