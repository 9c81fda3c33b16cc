//! Async callables reachable from templates.
//!
//! * [`TemplateFunction`] backs bare calls: `{{name(arg1, "lit", path)}}`.
//! * [`Resolver`] backs custom resolvers: `{{@name(args)|transformers}}`.
//!
//! Closures returning futures implement both traits, so registration is
//! usually `engine.register_function("name", |args| async move { ... })`.

use crate::context::TemplateContext;
use crate::date::format_datetime;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::future::Future;

#[async_trait]
pub trait TemplateFunction: Send + Sync {
    async fn call(&self, args: Vec<Value>) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> TemplateFunction for F
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(&self, args: Vec<Value>) -> Result<Value> {
        (self)(args).await
    }
}

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Produces a value from the active context and the call arguments.
    async fn resolve(&self, context: &TemplateContext, args: Vec<Value>) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> Resolver for F
where
    F: Fn(TemplateContext, Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn resolve(&self, context: &TemplateContext, args: Vec<Value>) -> Result<Value> {
        (self)(context.clone(), args).await
    }
}

/// `@now`: current UTC time as RFC 3339, or in the token format given as
/// the first argument.
pub struct NowResolver;

#[async_trait]
impl Resolver for NowResolver {
    async fn resolve(&self, _context: &TemplateContext, args: Vec<Value>) -> Result<Value> {
        let now = Utc::now();
        Ok(Value::String(match args.first().and_then(Value::as_str) {
            Some(format) => format_datetime(&now, format),
            None => now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }))
    }
}

/// `@timestamp`: milliseconds since the Unix epoch.
pub struct TimestampResolver;

#[async_trait]
impl Resolver for TimestampResolver {
    async fn resolve(&self, _context: &TemplateContext, _args: Vec<Value>) -> Result<Value> {
        Ok(Value::from(Utc::now().timestamp_millis()))
    }
}

/// `@env(NAME, default)`: an environment variable, or the default (or
/// `null`) when it is unset.
pub struct EnvResolver;

#[async_trait]
impl Resolver for EnvResolver {
    async fn resolve(&self, _context: &TemplateContext, args: Vec<Value>) -> Result<Value> {
        let Some(name) = args.first().and_then(Value::as_str) else {
            return Ok(Value::Null);
        };
        Ok(match std::env::var(name) {
            Ok(value) => Value::String(value),
            Err(_) => args.get(1).cloned().unwrap_or(Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closures_are_functions() {
        let add = |args: Vec<Value>| async move {
            Ok::<_, crate::Error>(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))
        };
        assert_eq!(add.call(vec![json!(1), json!(2)]).await.unwrap(), json!(3));
    }

    #[tokio::test]
    async fn closures_are_resolvers() {
        let greet = |ctx: TemplateContext, _args: Vec<Value>| async move {
            let name = ctx.get("name").and_then(Value::as_str).unwrap_or("?").to_string();
            Ok::<_, crate::Error>(json!(format!("hi {name}")))
        };
        let ctx: TemplateContext = [("name", json!("ann"))].into_iter().collect();
        assert_eq!(greet.resolve(&ctx, vec![]).await.unwrap(), json!("hi ann"));
    }

    #[tokio::test]
    async fn env_resolver_falls_back() {
        let ctx = TemplateContext::new();
        let value = EnvResolver
            .resolve(&ctx, vec![json!("STENCIL_SURELY_UNSET_VAR"), json!("fallback")])
            .await
            .unwrap();
        assert_eq!(value, json!("fallback"));
    }

    #[tokio::test]
    async fn now_resolver_formats() {
        let ctx = TemplateContext::new();
        let year = NowResolver.resolve(&ctx, vec![json!("YYYY")]).await.unwrap();
        assert_eq!(year.as_str().map(str::len), Some(4));
    }
}
