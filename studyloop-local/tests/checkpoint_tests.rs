use chrono::Utc;
use studyloop_core::store::CheckpointStore;
use studyloop_core::Checkpoint;
use studyloop_local::LocalCheckpoints;
use uuid::Uuid;

fn checkpoint(position: usize, known: usize) -> Checkpoint {
    Checkpoint {
        position,
        known: (0..known).map(|_| Uuid::new_v4()).collect(),
        saved_at: Utc::now(),
    }
}

#[tokio::test]
async fn save_load_clear_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalCheckpoints::open_at(dir.path().join("checkpoints.json"))
        .await
        .unwrap();
    let list = Uuid::new_v4();

    assert!(store.load(list).await.unwrap().is_none());

    let cp = checkpoint(3, 2);
    store.save(list, &cp).await.unwrap();
    let loaded = store.load(list).await.unwrap().unwrap();
    assert_eq!(loaded.position, 3);
    assert_eq!(loaded.known, cp.known);

    store.clear(list).await.unwrap();
    assert!(store.load(list).await.unwrap().is_none());
}

#[tokio::test]
async fn checkpoints_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoints.json");
    let list = Uuid::new_v4();
    let cp = checkpoint(5, 3);

    {
        let store = LocalCheckpoints::open_at(path.clone()).await.unwrap();
        store.save(list, &cp).await.unwrap();
    }

    let reopened = LocalCheckpoints::open_at(path).await.unwrap();
    let loaded = reopened.load(list).await.unwrap().unwrap();
    assert_eq!(loaded.position, 5);
    assert_eq!(loaded.known, cp.known);
}

#[tokio::test]
async fn lists_do_not_interfere() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalCheckpoints::open_at(dir.path().join("checkpoints.json"))
        .await
        .unwrap();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

    store.save(a, &checkpoint(1, 0)).await.unwrap();
    store.save(b, &checkpoint(7, 1)).await.unwrap();
    store.clear(a).await.unwrap();

    assert!(store.load(a).await.unwrap().is_none());
    assert_eq!(store.load(b).await.unwrap().unwrap().position, 7);
}

#[tokio::test]
async fn clearing_a_missing_list_is_fine() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalCheckpoints::open_at(dir.path().join("checkpoints.json"))
        .await
        .unwrap();
    store.clear(Uuid::new_v4()).await.unwrap();
}

#[tokio::test]
async fn corrupt_file_is_an_error_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoints.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(LocalCheckpoints::open_at(path).await.is_err());
}
