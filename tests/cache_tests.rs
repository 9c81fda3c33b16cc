use std::sync::Arc;
use std::time::Duration;
use stencil::{
    CacheConfig, EngineConfig, RenderOptions, TemplateCache, TemplateContext, TemplateEngine,
};

fn small_cache(max_size: usize, max_memory: usize) -> TemplateCache {
    TemplateCache::new(CacheConfig {
        max_size,
        max_memory,
        default_ttl: Duration::from_secs(60),
        cleanup_interval: Duration::from_secs(60),
    })
}

#[test_log::test]
fn test_memory_usage_stays_bounded() {
    let cache = small_cache(1000, 500);
    for i in 0..100 {
        cache.set(format!("key-{i}"), "v".repeat(i % 40), None);
        assert!(cache.memory_usage() <= 500, "over budget after insert {i}");
    }
    let stats = cache.stats();
    assert!(stats.evictions > 0);
    assert_eq!(stats.memory_usage, cache.memory_usage());
}

#[test_log::test]
fn test_entry_count_stays_bounded() {
    let cache = small_cache(5, 1 << 20);
    for i in 0..20 {
        cache.set(format!("k{i}"), "v", None);
    }
    assert_eq!(cache.len(), 5);
    assert!(cache.has("k19"));
    assert_eq!(cache.stats().evictions, 15);
}

#[test_log::test]
fn test_clear_resets_memory() {
    let cache = small_cache(10, 1024);
    cache.set("a", "1", None);
    cache.set("b", "2", None);
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.memory_usage(), 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_entries_expire_after_ttl() {
    let cache = small_cache(10, 1024);
    cache.set("short", "v", Some(Duration::from_secs(5)));
    cache.set("long", "v", None);

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(cache.get("short"), None);
    assert_eq!(cache.get("long").as_deref(), Some("v"));

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(cache.cleanup(), 1);
    assert!(cache.is_empty());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_render_cache_honours_ttl_option() {
    let engine = TemplateEngine::new();
    let mut ctx = TemplateContext::new();
    ctx.insert("v", 1);
    let options = RenderOptions { cache_ttl: Some(Duration::from_secs(1)), ..Default::default() };

    engine.process_template("{{v}}", &ctx, &options).await.unwrap();
    assert_eq!(engine.cache().len(), 1);

    let sweeper = engine.spawn_cache_cleanup();
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(engine.cache().is_empty());
    sweeper.abort();
}

#[test_log::test]
fn test_engine_uses_configured_cache_bounds() {
    let config = EngineConfig {
        cache: CacheConfig { max_size: 3, ..CacheConfig::default() },
        ..EngineConfig::default()
    };
    let engine = TemplateEngine::with_config(config);
    assert_eq!(engine.cache().config().max_size, 3);
    let shared: Arc<TemplateCache> = Arc::clone(engine.cache());
    assert!(shared.is_empty());
}
