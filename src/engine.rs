//! The template engine: registries, global context and the renderer.
//!
//! A template is parsed into blocks (see [`crate::parser`]) and rendered by
//! walking the tree. Every `{{...}}` site fails on its own terms:
//!
//! | site | on failure |
//! |---|---|
//! | placeholder | error if `throwOnError`, raw tag if `keepUnresolved`, else `defaultValue` or empty |
//! | `#if` | the block is emitted as written |
//! | `#each` | the block is emitted as written |
//! | function call | an inline `<!-- error in name(): ... -->` marker |
//! | include | error, or a marker comment with `ignoreIncludeErrors` |
//!
//! Errors that reach the caller are wrapped in [`Error::Render`].

use crate::ast::Node;
use crate::cache::{CacheConfig, TemplateCache};
use crate::constants::{loop_vars, markers, MAX_INCLUDE_DEPTH, TAG_CLOSE, TAG_OPEN};
use crate::context::{parse_path, Scope, TemplateContext};
use crate::error::{Error, Result};
use crate::expression;
use crate::ext::ValueExt;
use crate::format;
use crate::functions::{EnvResolver, NowResolver, Resolver, TemplateFunction, TimestampResolver};
use crate::loader::{FsIncludeLoader, IncludeLoader};
use crate::options::{EngineConfig, PlaceholderOptions, RenderOptions};
use crate::parser;
use crate::placeholder::{Arg, ParsedExpression};
use crate::transformers::{to_json_string, TransformerRegistry};
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use log::{debug, warn};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Per-render state threaded through the tree walk.
#[derive(Clone, Copy)]
struct Pass<'a> {
    options: &'a RenderOptions,
    include_depth: usize,
}

pub struct TemplateEngine {
    transformers: TransformerRegistry,
    resolvers: IndexMap<String, Arc<dyn Resolver>>,
    functions: IndexMap<String, Arc<dyn TemplateFunction>>,
    loader: Arc<dyn IncludeLoader>,
    global_context: RwLock<TemplateContext>,
    cache: Arc<TemplateCache>,
    defaults: RenderOptions,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// An engine with the built-in transformers and resolvers, default cache
    /// bounds and includes read relative to the working directory.
    pub fn new() -> Self {
        Self::build(CacheConfig::default(), RenderOptions::default(), FsIncludeLoader::current_dir())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let loader = match config.include_root {
            Some(root) => FsIncludeLoader::new(root),
            None => FsIncludeLoader::current_dir(),
        };
        Self::build(config.cache, config.render, loader)
    }

    fn build(cache: CacheConfig, defaults: RenderOptions, loader: FsIncludeLoader) -> Self {
        let mut engine = Self {
            transformers: TransformerRegistry::new(),
            resolvers: IndexMap::new(),
            functions: IndexMap::new(),
            loader: Arc::new(loader),
            global_context: RwLock::new(TemplateContext::new()),
            cache: Arc::new(TemplateCache::new(cache)),
            defaults,
        };
        engine.register_resolver("now", NowResolver);
        engine.register_resolver("timestamp", TimestampResolver);
        engine.register_resolver("env", EnvResolver);
        engine
    }

    pub fn register_transformer<F>(&mut self, name: impl Into<String>, transformer: F)
    where
        F: Fn(&Value, &[String]) -> Result<Value> + Send + Sync + 'static,
    {
        self.transformers.register(name, transformer);
    }

    /// Registers a resolver addressed as `{{@name(...)}}`.
    pub fn register_resolver<R: Resolver + 'static>(&mut self, name: impl Into<String>, resolver: R) {
        self.resolvers.insert(name.into(), Arc::new(resolver));
    }

    /// Registers a function callable as `{{name(...)}}`.
    pub fn register_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: TemplateFunction + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn set_include_loader<L: IncludeLoader + 'static>(&mut self, loader: L) {
        self.loader = Arc::new(loader);
    }

    pub fn default_options(&self) -> &RenderOptions {
        &self.defaults
    }

    /// Replaces the global context merged under every render's context.
    pub fn set_global_context(&self, context: TemplateContext) {
        *self.global_context.write() = context;
    }

    pub fn set_global(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.global_context.write().insert(key, value);
    }

    pub fn global_context(&self) -> TemplateContext {
        self.global_context.read().clone()
    }

    pub fn clear_global_context(&self) {
        self.global_context.write().clear();
    }

    pub fn cache(&self) -> &Arc<TemplateCache> {
        &self.cache
    }

    /// Starts the periodic sweep of expired cache entries.
    pub fn spawn_cache_cleanup(&self) -> JoinHandle<()> {
        self.cache.spawn_cleanup()
    }

    /// Whether `text` contains at least one `{{...}}` tag.
    pub fn has_templates(text: &str) -> bool {
        text.find(TAG_OPEN)
            .is_some_and(|open| text[open + TAG_OPEN.len()..].contains(TAG_CLOSE))
    }

    /// Renders with the engine's default options.
    pub async fn render(&self, template: &str, context: &TemplateContext) -> Result<String> {
        self.process_template(template, context, &self.defaults).await
    }

    /// Renders `template` against `context` layered over the global context.
    pub async fn process_template(
        &self,
        template: &str,
        context: &TemplateContext,
        options: &RenderOptions,
    ) -> Result<String> {
        let merged = self.global_context().merged_with(context);
        let pass = Pass { options, include_depth: 0 };
        self.render_source(template, &merged, pass)
            .await
            .map_err(|source| wrap(template, &merged, source))
    }

    /// Resolves placeholders only; blocks, includes and calls are left as
    /// written. The output is cached when `options.use_cache` is set.
    pub async fn resolve_placeholders(
        &self,
        text: &str,
        context: &TemplateContext,
        options: &PlaceholderOptions,
    ) -> Result<String> {
        let merged = self.global_context().merged_with(context);
        let key = match options.use_cache {
            true => Some(cache_key("placeholders", text, &merged, options)?),
            false => None,
        };
        if let Some(hit) = key.as_deref().and_then(|key| self.cache.get(key)) {
            return Ok(hit);
        }

        let render_options = RenderOptions { placeholder: options.clone(), ..RenderOptions::default() };
        let pass = Pass { options: &render_options, include_depth: 0 };
        let nodes = parser::parse_placeholders(text);
        let scope = Scope::new(&merged);
        let output = self
            .render_nodes(&nodes, &scope, pass)
            .await
            .map_err(|source| wrap(text, &merged, source))?;

        if let Some(key) = key {
            self.cache.set(key, output.clone(), None);
        }
        Ok(output)
    }

    /// Evaluates an `#if` condition against `context` and the global context.
    pub fn evaluate_condition(&self, condition: &str, context: &TemplateContext) -> Result<bool> {
        let merged = self.global_context().merged_with(context);
        expression::evaluate(condition, &Scope::new(&merged))
    }

    /// Checks block pairing, `#if` conditions and `#each` targets without
    /// rendering anything.
    pub fn validate_template(&self, template: &str) -> Result<()> {
        parser::check_balance(template)?;
        let mut first_error = None;
        parser::parse(template).walk(&mut |node| {
            if first_error.is_some() {
                return;
            }
            first_error = match node {
                Node::If { condition, .. } => expression::parse(condition).err(),
                Node::Each { expression, .. } if parse_path(expression).is_none() => Some(
                    Error::Syntax(format!("invalid loop target '{expression}'")),
                ),
                _ => None,
            };
        });
        first_error.map_or(Ok(()), Err)
    }

    /// Parses, renders, post-formats and caches one template source.
    fn render_source<'a>(
        &'a self,
        template: &'a str,
        context: &'a TemplateContext,
        pass: Pass<'a>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let options = pass.options;
            let key = match options.use_cache {
                true => Some(cache_key("template", template, context, options)?),
                false => None,
            };
            if let Some(hit) = key.as_deref().and_then(|key| self.cache.get(key)) {
                debug!("Template cache hit ({} bytes)", hit.len());
                return Ok(hit);
            }

            let parsed = parser::parse(template);
            let scope = Scope::new(context);
            let mut output = self.render_nodes(&parsed.nodes, &scope, pass).await?;

            if let Some(output_format) = options.format {
                output = format::apply(output, output_format, options.placeholder.json_indent);
            }
            if options.trim_whitespace {
                output = format::trim_whitespace(&output);
            }
            if let Some(key) = key {
                self.cache.set(key, output.clone(), options.cache_ttl);
            }
            Ok(output)
        })
    }

    fn render_nodes<'a>(
        &'a self,
        nodes: &'a [Node],
        scope: &'a Scope<'a>,
        pass: Pass<'a>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let mut output = String::new();
            for node in nodes {
                match node {
                    Node::Text(text) => output.push_str(text),
                    Node::Placeholder { expression, raw } => {
                        let text = self
                            .render_placeholder(expression, raw, scope, &pass.options.placeholder)
                            .await?;
                        output.push_str(&text);
                    }
                    Node::If { condition, then_branch, else_branch, raw } => {
                        match expression::evaluate(condition, scope) {
                            Ok(true) => {
                                output.push_str(&self.render_nodes(then_branch, scope, pass).await?)
                            }
                            Ok(false) => {
                                output.push_str(&self.render_nodes(else_branch, scope, pass).await?)
                            }
                            Err(e) => {
                                warn!("Failed to evaluate condition '{condition}': {e}");
                                output.push_str(raw);
                            }
                        }
                    }
                    Node::Each { var, expression, body, raw } => match scope.resolve(expression) {
                        Some(Value::Array(items)) => {
                            let count = items.len();
                            for (index, item) in items.into_iter().enumerate() {
                                let child = scope.child(loop_locals(var, item, index, count));
                                output.push_str(&self.render_nodes(body, &child, pass).await?);
                            }
                        }
                        other => {
                            let e = Error::LoopTarget {
                                expression: expression.clone(),
                                found: other.as_ref().map_or("undefined", ValueExt::type_name).into(),
                            };
                            warn!("Skipping loop: {e}");
                            output.push_str(raw);
                        }
                    },
                    Node::Include { path, .. } => {
                        output.push_str(&self.render_include(path, scope, pass).await?)
                    }
                    Node::Call { name, args, .. } => {
                        output.push_str(&self.render_call(name, args, scope, pass).await)
                    }
                }
            }
            Ok(output)
        })
    }

    async fn render_placeholder(
        &self,
        expression: &str,
        raw: &str,
        scope: &Scope<'_>,
        options: &PlaceholderOptions,
    ) -> Result<String> {
        match self.resolve_expression(expression, scope, options).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("Failed to resolve placeholder {raw}: {e}");
                if options.throw_on_error {
                    Err(e)
                } else if options.keep_unresolved {
                    Ok(raw.to_string())
                } else {
                    Ok(options.default_value.clone().unwrap_or_default())
                }
            }
        }
    }

    async fn resolve_expression(
        &self,
        expression: &str,
        scope: &Scope<'_>,
        options: &PlaceholderOptions,
    ) -> Result<String> {
        let parsed = ParsedExpression::parse(expression);
        if let Some(unknown) = parsed.transformers.iter().find(|t| !self.transformers.contains(&t.name)) {
            return Err(Error::UnknownTransformer(unknown.name.clone()));
        }

        let value = match parsed.resolver_name() {
            Some(name) => {
                let resolver = self
                    .resolvers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownResolver(name.to_string()))?;
                let args = evaluate_args(&parsed.args, scope);
                let context = TemplateContext::from(scope.flatten());
                Some(resolver.resolve(&context, args).await?)
            }
            None => scope.resolve(&parsed.path),
        };

        let value = match value {
            Some(mut value) => {
                for transformer in &parsed.transformers {
                    value = self.transformers.apply(&transformer.name, &value, &transformer.args)?;
                }
                Some(value)
            }
            None => None,
        };

        if let Some(default) = &parsed.default_value {
            if is_blank(value.as_ref()) {
                return Ok(default.clone());
            }
        }
        Ok(stringify(value, options))
    }

    async fn render_include(&self, path: &str, scope: &Scope<'_>, pass: Pass<'_>) -> Result<String> {
        let result = async {
            if pass.include_depth >= MAX_INCLUDE_DEPTH {
                return Err(Error::IncludeLoad {
                    path: path.to_string(),
                    message: format!("includes nested deeper than {MAX_INCLUDE_DEPTH} levels"),
                });
            }
            let source = self.loader.load(path).await?;
            let context = TemplateContext::from(scope.flatten());
            let options = RenderOptions {
                use_cache: true,
                trim_whitespace: false,
                format: None,
                ..pass.options.clone()
            };
            let inner = Pass { options: &options, include_depth: pass.include_depth + 1 };
            self.render_source(&source, &context, inner).await
        }
        .await;

        match result {
            Err(e) if pass.options.ignore_include_errors => {
                warn!("Ignoring failed include '{path}': {e}");
                Ok(markers::include_failed(path))
            }
            other => other,
        }
    }

    async fn render_call(&self, name: &str, args: &[Arg], scope: &Scope<'_>, pass: Pass<'_>) -> String {
        let result = match self.functions.get(name).cloned() {
            Some(function) => function.call(evaluate_args(args, scope)).await,
            None => Err(Error::UnknownFunction(name.to_string())),
        };
        match result {
            Ok(value) => stringify(Some(value), &pass.options.placeholder),
            Err(e) => {
                warn!("Function call {name}() failed: {e}");
                markers::function_failed(name, &e.to_string())
            }
        }
    }
}

fn wrap(template: &str, context: &TemplateContext, source: Error) -> Error {
    Error::Render {
        template_length: template.len(),
        context_keys: context.keys().cloned().collect(),
        source: Box::new(source),
    }
}

fn evaluate_args(args: &[Arg], scope: &Scope<'_>) -> Vec<Value> {
    args.iter().map(|arg| arg.evaluate(scope)).collect()
}

fn loop_locals(var: &str, item: Value, index: usize, count: usize) -> Map<String, Value> {
    let mut locals = Map::new();
    locals.insert(var.to_string(), item);
    locals.insert(format!("{var}{}", loop_vars::INDEX), Value::from(index));
    locals.insert(format!("{var}{}", loop_vars::COUNT), Value::from(count));
    locals.insert(format!("{var}{}", loop_vars::FIRST), Value::Bool(index == 0));
    locals.insert(format!("{var}{}", loop_vars::LAST), Value::Bool(index + 1 == count));
    locals
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Converts a resolved value to output text.
fn stringify(value: Option<Value>, options: &PlaceholderOptions) -> String {
    match value {
        None => options.undefined_value.clone(),
        Some(Value::Null) => options.null_value.clone(),
        Some(value @ (Value::Array(_) | Value::Object(_))) => {
            if options.stringify_objects {
                to_json_string(&value, options.json_indent)
            } else {
                value.to_display_string()
            }
        }
        Some(value) => value.to_display_string(),
    }
}

/// Hex SHA-256 over everything that shapes a render's output.
fn cache_key(kind: &str, template: &str, context: &TemplateContext, options: &impl Serialize) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0]);
    hasher.update(template.as_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_vec(context)?);
    hasher.update([0]);
    hasher.update(serde_json::to_vec(options)?);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryIncludeLoader;
    use serde_json::json;

    fn context(value: Value) -> TemplateContext {
        TemplateContext::from_value(value).unwrap()
    }

    async fn render(engine: &TemplateEngine, template: &str, value: Value) -> String {
        let options = RenderOptions::default().without_cache();
        engine.process_template(template, &context(value), &options).await.unwrap()
    }

    #[tokio::test]
    async fn stringifies_by_type() {
        let engine = TemplateEngine::new();
        let ctx = json!({"n": null, "f": 60.0, "b": false, "list": [1, 2], "s": "x"});
        assert_eq!(render(&engine, "{{n}}|{{missing}}|{{f}}|{{b}}|{{s}}", ctx.clone()).await, "null||60|false|x");
        assert_eq!(render(&engine, "{{list}}", ctx).await, "[\n  1,\n  2\n]");
    }

    #[tokio::test]
    async fn configured_null_and_undefined_text() {
        let engine = TemplateEngine::new();
        let options = RenderOptions {
            use_cache: false,
            placeholder: PlaceholderOptions {
                null_value: "NULL".into(),
                undefined_value: "?".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = context(json!({"n": null}));
        let out = engine
            .process_template("{{n}}|{{missing}}|{{missing|default:x}}|{{n|default:y}}", &ctx, &options)
            .await
            .unwrap();
        assert_eq!(out, "NULL|?|x|y");
    }

    #[tokio::test]
    async fn objects_without_json() {
        let engine = TemplateEngine::new();
        let options = RenderOptions {
            use_cache: false,
            placeholder: PlaceholderOptions { stringify_objects: false, ..Default::default() },
            ..Default::default()
        };
        let out = engine
            .process_template("{{list}} {{obj}}", &context(json!({"list": [1, 2], "obj": {}})), &options)
            .await
            .unwrap();
        assert_eq!(out, "1,2 [object Object]");
    }

    #[tokio::test]
    async fn default_applies_to_blank_values() {
        let engine = TemplateEngine::new();
        let ctx = json!({"empty": "", "zero": 0});
        assert_eq!(
            render(&engine, "{{empty|default:E}} {{zero|default:Z}} {{nope|upper|default:N}}", ctx).await,
            "E 0 N"
        );
    }

    #[tokio::test]
    async fn failed_placeholder_falls_back_to_default_option() {
        let engine = TemplateEngine::new();
        let options = RenderOptions {
            use_cache: false,
            placeholder: PlaceholderOptions { default_value: Some("?".into()), ..Default::default() },
            ..Default::default()
        };
        let out = engine
            .process_template("[{{x|bogus}}]", &context(json!({"x": 1})), &options)
            .await
            .unwrap();
        assert_eq!(out, "[?]");
    }

    #[tokio::test]
    async fn resolvers_receive_scope_and_args() {
        let mut engine = TemplateEngine::new();
        engine.register_resolver("greet", |ctx: TemplateContext, args: Vec<Value>| async move {
            let who = args.first().and_then(Value::as_str).unwrap_or("?").to_string();
            let count = ctx.get("itemsCount").cloned().unwrap_or(Value::Null);
            Ok::<_, Error>(json!(format!("{who}/{count}")))
        });
        let out = render(
            &engine,
            "{{#each i in items}}{{@greet(i)|upper}} {{/each}}",
            json!({"items": ["a", "b"]}),
        )
        .await;
        assert_eq!(out, "A/NULL B/NULL ");

        let out = render(&engine, "{{@greet('x')}}", json!({"itemsCount": 3})).await;
        assert_eq!(out, "x/3");
    }

    #[tokio::test]
    async fn unknown_resolver_is_error_with_throw() {
        let engine = TemplateEngine::new();
        let options = RenderOptions {
            use_cache: false,
            placeholder: PlaceholderOptions { throw_on_error: true, ..Default::default() },
            ..Default::default()
        };
        let err = engine.process_template("{{@nope()}}", &TemplateContext::new(), &options).await.unwrap_err();
        assert!(matches!(err.root_cause(), Error::UnknownResolver(name) if name == "nope"));
    }

    #[tokio::test]
    async fn deeply_nested_blocks_render_without_overflow() {
        let engine = TemplateEngine::new();
        let n = 3000;
        let extra = n - crate::constants::MAX_BLOCK_DEPTH;
        let template = format!("{}x{}", "{{#if a}}".repeat(n), "{{/if}}".repeat(n));
        let out = render(&engine, &template, json!({"a": true})).await;
        assert_eq!(out, format!("{}x{}", "{{#if a}}".repeat(extra), "{{/if}}".repeat(extra)));
        assert!(engine.validate_template(&template).is_err());
    }

    #[tokio::test]
    async fn failed_condition_keeps_block() {
        let engine = TemplateEngine::new();
        let template = "a{{#if x ~ 1}}b{{/if}}c";
        assert_eq!(render(&engine, template, json!({})).await, template);
    }

    #[tokio::test]
    async fn non_array_loop_keeps_block() {
        let engine = TemplateEngine::new();
        let template = "{{#each x in items}}{{x}}{{/each}}";
        assert_eq!(render(&engine, template, json!({"items": "abc"})).await, template);
    }

    #[tokio::test]
    async fn loop_scope_does_not_leak() {
        let engine = TemplateEngine::new();
        let out = render(
            &engine,
            "{{x}}:{{#each x in xs}}{{x}}{{xLast}},{{/each}}:{{x}}{{xIndex}}",
            json!({"x": "outer", "xs": [1, 2]}),
        )
        .await;
        assert_eq!(out, "outer:1false,2true,:outer");
    }

    #[tokio::test]
    async fn includes_see_loop_variables() {
        let mut engine = TemplateEngine::new();
        engine.set_include_loader(MemoryIncludeLoader::new().with("row", "<{{r}}>"));
        let out = render(&engine, r#"{{#each r in rows}}{{include "row"}}{{/each}}"#, json!({"rows": [1, 2]})).await;
        assert_eq!(out, "<1><2>");
    }

    #[tokio::test]
    async fn self_include_stops_at_depth_limit() {
        let mut engine = TemplateEngine::new();
        engine.set_include_loader(MemoryIncludeLoader::new().with("loop", r#"x{{include "loop"}}"#));
        let err = engine
            .process_template(r#"{{include "loop"}}"#, &TemplateContext::new(), &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err.root_cause(), Error::IncludeLoad { .. }));
    }

    #[tokio::test]
    async fn calls_use_loop_scope() {
        let mut engine = TemplateEngine::new();
        engine.register_function("double", |args: Vec<Value>| async move {
            let n = args.first().and_then(Value::as_i64).unwrap_or(0);
            Ok::<_, Error>(json!(n * 2))
        });
        let out = render(&engine, "{{#each n in ns}}{{double(n)}} {{/each}}", json!({"ns": [1, 5]})).await;
        assert_eq!(out, "2 10 ");
    }

    #[tokio::test]
    async fn global_context_is_layered_under_render_context() {
        let engine = TemplateEngine::new();
        engine.set_global("env", "prod");
        engine.set_global("name", "global");
        assert_eq!(render(&engine, "{{env}} {{name}}", json!({"name": "local"})).await, "prod local");
        assert!(engine.evaluate_condition("env == 'prod'", &TemplateContext::new()).unwrap());

        engine.clear_global_context();
        assert!(engine.global_context().is_empty());
        assert_eq!(render(&engine, "{{env}}", json!({})).await, "");
    }

    #[tokio::test]
    async fn renders_are_cached_per_context() {
        let engine = TemplateEngine::new();
        let options = RenderOptions::default();
        let a = context(json!({"v": 1}));
        let b = context(json!({"v": 2}));
        assert_eq!(engine.process_template("{{v}}", &a, &options).await.unwrap(), "1");
        assert_eq!(engine.process_template("{{v}}", &b, &options).await.unwrap(), "2");
        assert_eq!(engine.process_template("{{v}}", &a, &options).await.unwrap(), "1");
        let stats = engine.cache().stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn resolve_placeholders_leaves_blocks() {
        let engine = TemplateEngine::new();
        let options = PlaceholderOptions { use_cache: true, ..Default::default() };
        let ctx = context(json!({"a": "A"}));
        let out = engine.resolve_placeholders("{{#if a}}{{a}}{{/if}}", &ctx, &options).await.unwrap();
        assert_eq!(out, "{{#if a}}A{{/if}}");
        assert_eq!(engine.cache().len(), 1);
    }

    #[test]
    fn validation() {
        let engine = TemplateEngine::new();
        assert!(engine.validate_template("{{#if a && (b > 1)}}x{{/if}}").is_ok());
        assert!(matches!(engine.validate_template("{{#if a > }}x{{/if}}"), Err(Error::Syntax(_))));
        assert!(matches!(engine.validate_template("{{#if a # b}}x{{/if}}"), Err(Error::Lexical { .. })));
        assert!(engine.validate_template("{{#each x in items}}").is_err());
    }

    #[test]
    fn detects_templates() {
        assert!(TemplateEngine::has_templates("a {{b}} c"));
        assert!(!TemplateEngine::has_templates("a {{b c"));
        assert!(!TemplateEngine::has_templates("plain"));
    }
}
