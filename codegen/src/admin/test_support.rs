use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::response::Response;
use migration::MigratorTrait as _;
use sea_orm::{Database, DatabaseConnection};

use super::{AdminState, jwt};
use crate::artifact::FsArtifactStore;
use crate::catalog::Introspector;
use crate::catalog::fixtures::{audit_log, orders};
use crate::catalog::memory::MemoryCatalog;
use crate::generator::Generator;
use crate::record::RecordStore;
use crate::render::Renderer;
use crate::sql::executor::fake::FakeRunner;
use crate::sql::synth::fake::FakeCompletion;
use crate::sql::{SqlExecutor, Synthesizer};

pub const JWT_SECRET: &str = "test-jwt-secret-key-32-chars-pad";

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub struct TestApp {
    pub state: AdminState,
    pub catalog: Arc<MemoryCatalog>,
    pub runner: FakeRunner,
    pub completion: FakeCompletion,
    pub out_dir: tempfile::TempDir,
}

pub async fn make_app() -> TestApp {
    make_app_with(FakeCompletion::answering("```sql\nSELECT * FROM orders\n```")).await
}

pub async fn make_app_with(completion: FakeCompletion) -> TestApp {
    let catalog = Arc::new(MemoryCatalog::new(vec![orders(), audit_log()]));
    let introspector = Arc::new(Introspector::new(catalog.clone()));
    let store = Arc::new(RecordStore::new(setup_db().await));
    let out_dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(Generator::new(
        introspector.clone(),
        store.clone(),
        Arc::new(Renderer::new().unwrap()),
        Arc::new(FsArtifactStore::new(out_dir.path())),
    ));
    let runner = FakeRunner::affecting(0);
    let executor = Arc::new(SqlExecutor::new(
        Arc::new(runner.clone()),
        Duration::from_secs(5),
    ));
    let synthesizer = Arc::new(Synthesizer::new(
        Arc::new(completion.clone()),
        introspector.clone(),
        Duration::from_secs(5),
    ));

    TestApp {
        state: AdminState {
            introspector,
            store,
            generator,
            executor,
            synthesizer: Some(synthesizer),
            jwt_secret: JWT_SECRET.to_string(),
        },
        catalog,
        runner,
        completion,
        out_dir,
    }
}

pub fn token(operator: &str) -> String {
    jwt::encode_jwt(&jwt::Claims::for_operator(operator, 1), JWT_SECRET).unwrap()
}

pub fn json_body(value: serde_json::Value) -> Body {
    Body::from(serde_json::to_string(&value).unwrap())
}

pub async fn body_json(resp: Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
