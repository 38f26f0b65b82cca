#![allow(dead_code)]

use mnemo::{MemoryEngine, MnemoConfig, Tier};

/// Surface engine traces under RUST_LOG; safe to call repeatedly.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine on the deterministic FAST tier with an in-memory store.
pub fn fast_engine() -> MemoryEngine {
    init_tracing();
    MemoryEngine::open_in_memory(MnemoConfig::default()).unwrap()
}

/// Engine on the HYBRID tier (synthetic vectors + BM25 side-channel).
pub fn hybrid_engine() -> MemoryEngine {
    engine_with(|c| c.engine.tier = Tier::Hybrid)
}

/// Engine with a caller-tweaked config.
pub fn engine_with(tweak: impl FnOnce(&mut MnemoConfig)) -> MemoryEngine {
    init_tracing();
    let mut config = MnemoConfig::default();
    tweak(&mut config);
    MemoryEngine::open_in_memory(config).unwrap()
}

/// Add one memory and return its id.
pub async fn add(engine: &MemoryEngine, content: &str, user: Option<&str>) -> String {
    engine
        .add(mnemo::AddRequest {
            content: content.to_string(),
            user_id: user.map(str::to_string),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

/// Query with defaults: K results, no filters.
pub async fn query(engine: &MemoryEngine, text: &str, user: Option<&str>, limit: usize) -> Vec<mnemo::Recall> {
    engine
        .query(mnemo::QueryRequest {
            text: text.to_string(),
            user_id: user.map(str::to_string),
            limit,
            ..Default::default()
        })
        .await
        .unwrap()
}
