use kakomon_core::model::{AppSettings, FontSize, LastSession, QualificationId, SubjectId, Theme};
use kakomon_core::time::fixed_now;
use storage::documents::{LAST_SESSION_KEY, SETTINGS_KEY, load_json, save_json};
use storage::repository::KeyValueStore;
use storage::sqlite::SqliteRepository;
use storage::{Storage, StorageConfig};

#[tokio::test]
async fn sqlite_round_trips_raw_documents() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_documents?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    // Migrations are re-runnable.
    repo.migrate().await.expect("migrate twice");

    assert_eq!(repo.get("missing").await.unwrap(), None);

    repo.set("doc", "first").await.unwrap();
    repo.set("doc", "second").await.unwrap();
    assert_eq!(repo.get("doc").await.unwrap().as_deref(), Some("second"));

    repo.remove("doc").await.unwrap();
    assert_eq!(repo.get("doc").await.unwrap(), None);
    repo.remove("doc").await.unwrap();
}

#[tokio::test]
async fn sqlite_storage_persists_typed_documents() {
    let storage = Storage::sqlite("sqlite:file:memdb_typed?mode=memory&cache=shared")
        .await
        .expect("open storage");

    let settings = AppSettings {
        theme: Theme::Light,
        font_size: FontSize::Large,
        ..AppSettings::default()
    };
    save_json(storage.documents.as_ref(), SETTINGS_KEY, &settings)
        .await
        .unwrap();

    let last = LastSession {
        qualification_id: QualificationId::new("B1"),
        subject_id: SubjectId::new("first"),
        year: "2024".into(),
        question_index: 3,
        timestamp: fixed_now(),
    };
    save_json(storage.documents.as_ref(), LAST_SESSION_KEY, &last)
        .await
        .unwrap();

    let loaded: AppSettings = load_json(storage.documents.as_ref(), SETTINGS_KEY)
        .await
        .unwrap()
        .expect("settings stored");
    assert_eq!(loaded, settings);

    let loaded: LastSession = load_json(storage.documents.as_ref(), LAST_SESSION_KEY)
        .await
        .unwrap()
        .expect("pointer stored");
    assert_eq!(loaded, last);
}

#[tokio::test]
async fn memory_config_builds_in_memory_storage() {
    let storage = Storage::from_config(&StorageConfig::memory())
        .await
        .expect("memory storage");
    storage.documents.set("k", "v").await.unwrap();
    assert_eq!(storage.documents.get("k").await.unwrap().as_deref(), Some("v"));
}
