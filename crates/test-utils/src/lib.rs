pub mod builders;
pub mod probe;

use std::sync::{Arc, Once};

use hashmake::engine::Engine;
use hashmake::fs::FileSystem;
use hashmake::fs::mock::MockFileSystem;
use hashmake::registry::TaskRegistry;
use hashmake::store::CacheStore;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// An engine over an in-memory file system and an in-memory store.
pub fn mock_engine(registry: TaskRegistry) -> (Arc<MockFileSystem>, Engine) {
    let mock = Arc::new(MockFileSystem::new());
    let fs: Arc<dyn FileSystem> = mock.clone();
    let engine = Engine::new(registry, CacheStore::in_memory(fs));
    (mock, engine)
}

/// An engine over the in-memory file system `mock`, persisting its store
/// to `path` on that file system.
pub fn persistent_mock_engine(
    mock: &Arc<MockFileSystem>,
    registry: TaskRegistry,
    path: &str,
) -> Engine {
    let fs: Arc<dyn FileSystem> = mock.clone();
    Engine::new(registry, CacheStore::open(fs, path))
}
