//! Integration-style tests exercising the full `DirectoryEngine` stack,
//! mirroring the scenario/property split used by the buffer test suite this
//! crate is modeled on.

mod scenarios;

use std::sync::{Arc, Once};

use tempfile::TempDir;

use crate::{
    error::NullErrorSink, CompositeKey, CompositeKeyStrategy, DirectoryConfig, DirectoryEngine,
    FixedRecordCodec,
};

type TestEngine = DirectoryEngine<FixedRecordCodec, CompositeKeyStrategy>;

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing_subscriber` fmt layer for this test binary, gated by
/// `RUST_LOG` so the suite stays quiet by default. Idempotent: safe to call
/// at the top of every test, the way the buffer suite this crate is modeled
/// on calls its own `install_tracing_helpers()` per test.
fn install_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::FULL)
            .with_test_writer()
            .init();
    });
}

/// Builds an engine over a fresh temp file with a small capacity, handy for
/// exercising out-of-space and multi-sector behavior without huge files.
fn open_engine(capacity: u64, sector_size: usize) -> (TempDir, TestEngine) {
    install_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sessions.dat");
    let config = DirectoryConfig::from_path(&path)
        .capacity(capacity)
        .sector_size(sector_size)
        .build();
    let engine = TestEngine::open(config, CompositeKeyStrategy, Arc::new(NullErrorSink)).unwrap();
    (dir, engine)
}

fn key(sender: &str, target: &str, qualifier: &str) -> CompositeKey {
    CompositeKey::new(sender, target, qualifier)
}
