use crate::models::{Attachment, Circle, Customer, Invoice, Seat, Shape, Square};
use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera::errors::TesseraResult;
use tessera::filter::all;
use tessera::store::memory::{InMemoryStore, InMemoryStoreConfig};
use tessera::store::{DocumentStore, StoreEventListener, StoreEvents};
use tessera::{Tessera, TesseraBuilder};

/// Runs `test` between `before` and `after`.
///
/// `after` runs even when the test fails, so every store opened by
/// `before` gets closed. A failure is reported with the captured
/// backtrace and then fails the calling test.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> TesseraResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> TesseraResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> TesseraResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let result = std::panic::catch_unwind(|| {
        let backtrace = Backtrace::capture();
        let ctx = match before() {
            Ok(ctx) => ctx,
            Err(e) => return Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
        };

        match test(ctx.clone()) {
            Ok(_) => after(ctx)
                .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
            Err(e) => {
                let _ = after(ctx);
                Err((format!("Test failed: {:?}", e), backtrace.to_string()))
            }
        }
    });

    match result {
        Ok(Ok(_)) => {}
        Ok(Err((error, backtrace))) => {
            eprintln!("\n==================== TEST FAILED ====================");
            eprintln!("{}", error);
            if !backtrace.is_empty() && !backtrace.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", backtrace);
            }
            eprintln!("=====================================================\n");
            panic!("{}", error);
        }
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[derive(Clone)]
pub struct TestContext {
    db: Tessera,
    insert_calls: Arc<AtomicU64>,
}

impl TestContext {
    pub fn new(db: Tessera, insert_calls: Arc<AtomicU64>) -> Self {
        Self { db, insert_calls }
    }

    pub fn db(&self) -> Tessera {
        self.db.clone()
    }

    /// Bulk insert calls the store has received so far.
    pub fn insert_calls(&self) -> u64 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Number of documents in `collection`.
    pub fn stored(&self, collection: &str) -> TesseraResult<u64> {
        self.db.store().count(collection, &all())
    }
}

/// Registers every model entity with `builder`.
pub fn register_models(builder: TesseraBuilder) -> TesseraBuilder {
    builder
        .register::<Customer>()
        .register::<Invoice>()
        .register::<Shape>()
        .register::<Circle>()
        .register::<Square>()
        .register::<Attachment>()
        .register::<Seat>()
}

pub fn create_test_context() -> TesseraResult<TestContext> {
    create_test_context_with(|builder| builder)
}

/// Opens an in-memory instance with every model registered, letting
/// `configure` adjust the builder first.
pub fn create_test_context_with<F>(configure: F) -> TesseraResult<TestContext>
where
    F: FnOnce(TesseraBuilder) -> TesseraBuilder,
{
    let insert_calls = Arc::new(AtomicU64::new(0));
    let counter = insert_calls.clone();

    let store_config = InMemoryStoreConfig::new();
    store_config.add_store_listener(StoreEventListener::new(move |info| {
        if info.event() == StoreEvents::Inserted {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }));
    let store = DocumentStore::new(InMemoryStore::new(store_config));

    let db = register_models(configure(Tessera::builder().store(store))).build()?;
    log::debug!("Opened test instance {:?}", db);
    Ok(TestContext::new(db, insert_calls))
}

pub fn cleanup(ctx: TestContext) -> TesseraResult<()> {
    ctx.db.close()
}
