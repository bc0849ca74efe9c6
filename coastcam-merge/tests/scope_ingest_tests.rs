//! Scope planning and upload ingest against a bucket mounted on disk

mod helpers;

use coastcam_common::config::{DuplicatePolicy, TargetGrid};
use coastcam_merge::paths;
use coastcam_merge::services::{
    classify_location, plan, run_days, run_timestamp, CameraRegistry, DayMerger, DayUnit,
    MergeDispatcher, PlannedWork, Scope, UploadIngestor,
};
use coastcam_merge::storage::{LocalStore, ObjectStore};
use coastcam_merge::MergeError;
use helpers::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn touch(root: &Path, key: &str) {
    let path = root.join(key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, key.as_bytes()).unwrap();
}

/// c1 in 2019 only, c2 in 2019 and 2020, plus the cx product folder
fn seed_station(root: &Path) {
    touch(root, "cameras/caco-01/c1/2019/347_Dec.13/raw/1576270800.c1.timex.jpg");
    touch(root, "cameras/caco-01/c1/2019/348_Dec.14/raw/1576357200.c1.timex.jpg");
    touch(root, "cameras/caco-01/c1/2019/notes/readme.txt");
    touch(root, "cameras/caco-01/c2/2019/347_Dec.13/raw/1576270800.c2.timex.jpg");
    touch(root, "cameras/caco-01/c2/2020/001_Jan.01/raw/1577912400.c2.timex.jpg");
    touch(root, "cameras/caco-01/cx/merge/2019/347_Dec.13/1576270800.timex.merge.jpg");
}

fn local_store(root: &Path) -> Arc<dyn ObjectStore> {
    Arc::new(LocalStore::new(root))
}

#[tokio::test]
async fn test_station_scope_expands_to_every_day() {
    let temp_dir = TempDir::new().unwrap();
    seed_station(temp_dir.path());
    let store = local_store(temp_dir.path());
    let registry = CameraRegistry::new(store);

    let cameras = registry.discover_cameras(STATION).await.unwrap();
    assert_eq!(
        cameras.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        vec!["C1", "C2"]
    );

    let scope = classify_location("s3://cmgp-coastcam/cameras/caco-01").unwrap();
    let planned = plan(&registry, &cameras, &scope).await.unwrap();

    assert_eq!(
        planned.work,
        PlannedWork::Days(vec![
            DayUnit::new(STATION, "2019", "347_Dec.13"),
            DayUnit::new(STATION, "2019", "348_Dec.14"),
            DayUnit::new(STATION, "2020", "001_Jan.01"),
        ])
    );
    assert!(planned.presence.has_year("C1", "2019"));
    assert!(!planned.presence.has_year("C1", "2020"));
    assert!(planned.presence.has_year("C2", "2020"));
}

#[tokio::test]
async fn test_year_scope_only_lists_that_year() {
    let temp_dir = TempDir::new().unwrap();
    seed_station(temp_dir.path());
    let registry = CameraRegistry::new(local_store(temp_dir.path()));
    let cameras = registry.discover_cameras(STATION).await.unwrap();

    let scope = classify_location("s3://cmgp-coastcam/cameras/caco-01/c2/2020").unwrap();
    assert_eq!(
        scope,
        Scope::Year {
            station: STATION.to_string(),
            year: "2020".to_string()
        }
    );

    let planned = plan(&registry, &cameras, &scope).await.unwrap();
    assert_eq!(
        planned.work,
        PlannedWork::Days(vec![DayUnit::new(STATION, "2020", "001_Jan.01")])
    );
}

#[tokio::test]
async fn test_day_scope_merges_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    seed_station(temp_dir.path());
    let store = local_store(temp_dir.path());
    let registry = CameraRegistry::new(store.clone());
    let cameras = registry.discover_cameras(STATION).await.unwrap();

    let scope = classify_location("s3://cmgp-coastcam/cameras/caco-01/c1/2019/347_Dec.13").unwrap();
    let planned = plan(&registry, &cameras, &scope).await.unwrap();
    let PlannedWork::Days(days) = planned.work else {
        panic!("expected day work");
    };

    let rectifier = RecordingRectifier::new();
    let dispatcher = MergeDispatcher::new(store.clone(), rectifier.clone(), TargetGrid::default());
    let merger = DayMerger::new(
        store,
        dispatcher,
        Arc::new(roster(&["C1", "C2"])),
        Arc::new(planned.presence),
        DuplicatePolicy::LastWins,
    );

    let outcome = merger.merge_day(&days[0]).await.unwrap();
    assert_eq!(outcome.merged.len(), 1);
    assert_eq!(outcome.merged[0].cameras, 2);
    assert!(temp_dir.path().join(&outcome.merged[0].key).exists());
}

#[tokio::test]
async fn test_ingest_copies_upload_and_merges_its_timestamp() {
    let temp_dir = TempDir::new().unwrap();
    let upload = paths::build_upload_key(STATION, "1576270801.c1.timex.jpg");
    touch(temp_dir.path(), &upload);
    touch(temp_dir.path(), "cameras/caco-01/c2/2019/347_Dec.13/raw/1576270801.c2.timex.jpg");
    let store = local_store(temp_dir.path());

    let ingested = UploadIngestor::new(store.clone()).ingest(&upload).await.unwrap();
    assert_eq!(
        ingested.raw_key,
        "cameras/caco-01/c1/2019/347_Dec.13/raw/1576270801.c1.timex.jpg"
    );
    assert!(store.exists(&upload).await.unwrap());
    assert!(store.exists(&ingested.raw_key).await.unwrap());

    let Some(Scope::SingleTimestamp {
        year,
        day,
        timestamp,
        ..
    }) = ingested.merge_scope
    else {
        panic!("expected a single-timestamp scope");
    };

    let rectifier = RecordingRectifier::new();
    let roster = roster(&["C1", "C2"]);
    let presence = coastcam_merge::models::YearPresence::assume_all(roster.plain_cameras().iter(), &year);
    let merger = DayMerger::new(
        store.clone(),
        MergeDispatcher::new(store.clone(), rectifier.clone(), TargetGrid::default()),
        Arc::new(roster),
        Arc::new(presence),
        DuplicatePolicy::LastWins,
    );

    let summary = run_timestamp(&merger, &DayUnit::new(STATION, year, day), timestamp).await;
    assert!(summary.is_clean());
    assert_eq!(summary.units_merged, 1);
    assert_eq!(rectifier.jobs()[0].image_refs.len(), 2);
    assert!(store
        .exists("cameras/caco-01/cx/merge/2019/347_Dec.13/1576270801.timex.merge.jpg")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_ingest_snapshot_has_no_merge_scope() {
    let temp_dir = TempDir::new().unwrap();
    let upload = paths::build_upload_key(STATION, "1576270801.c1.snap.jpg");
    touch(temp_dir.path(), &upload);

    let ingested = UploadIngestor::new(local_store(temp_dir.path()))
        .ingest(&upload)
        .await
        .unwrap();
    assert!(ingested.merge_scope.is_none());
}

#[tokio::test]
async fn test_ingest_rejects_non_images_without_copying() {
    let temp_dir = TempDir::new().unwrap();
    let upload = paths::build_upload_key(STATION, "1576270801.c1.timex.txt");
    touch(temp_dir.path(), &upload);
    let store = local_store(temp_dir.path());

    let result = UploadIngestor::new(store).ingest(&upload).await;
    assert!(matches!(result, Err(MergeError::MalformedFilename(_))));
    assert!(!temp_dir.path().join("cameras/caco-01/c1").exists());
}

#[tokio::test]
async fn test_normalize_copies_unpadded_day_folders() {
    let temp_dir = TempDir::new().unwrap();
    touch(temp_dir.path(), "cameras/caco-01/c1/2019/7_Jan.7/raw/1546894800.c1.timex.jpg");
    touch(temp_dir.path(), "cameras/caco-01/c1/2019/347_Dec.13/raw/1576270800.c1.timex.jpg");
    touch(temp_dir.path(), "cameras/caco-01/c1/2019/notes/readme.txt");

    let report = UploadIngestor::new(local_store(temp_dir.path()))
        .normalize_station_days(STATION)
        .await
        .unwrap();

    assert_eq!(report.folders_normalized, 1);
    assert_eq!(report.objects_copied, 1);
    assert_eq!(report.folders_ignored, 1);
    assert!(temp_dir
        .path()
        .join("cameras/caco-01/c1/2019/007_Jan.07/raw/1546894800.c1.timex.jpg")
        .exists());
    // Copy, not move
    assert!(temp_dir
        .path()
        .join("cameras/caco-01/c1/2019/7_Jan.7/raw/1546894800.c1.timex.jpg")
        .exists());
}

async fn merge_year_2020(store: Arc<dyn ObjectStore>) -> (Vec<DayUnit>, Arc<RecordingRectifier>) {
    let registry = CameraRegistry::new(store.clone());
    let cameras = registry.discover_cameras(STATION).await.unwrap();
    let scope = classify_location("s3://cmgp-coastcam/cameras/caco-01/c1/2020").unwrap();
    let planned = plan(&registry, &cameras, &scope).await.unwrap();
    let PlannedWork::Days(days) = planned.work else {
        panic!("expected day work");
    };

    let rectifier = RecordingRectifier::new();
    let merger = Arc::new(DayMerger::new(
        store.clone(),
        MergeDispatcher::new(store, rectifier.clone(), TargetGrid::default()),
        Arc::new(roster(&["C1"])),
        Arc::new(planned.presence),
        DuplicatePolicy::LastWins,
    ));
    let summary = run_days(merger, days.clone(), 2).await;
    assert!(summary.is_clean());
    (days, rectifier)
}

#[tokio::test]
async fn test_normalized_day_merges_once_under_padded_token() {
    let temp_dir = TempDir::new().unwrap();
    touch(temp_dir.path(), "cameras/caco-01/c1/2020/5_Jan.05/raw/1578225600.c1.timex.jpg");
    let store = local_store(temp_dir.path());

    UploadIngestor::new(store.clone())
        .normalize_station_days(STATION)
        .await
        .unwrap();
    let (days, rectifier) = merge_year_2020(store).await;

    assert_eq!(days.len(), 1);
    assert_eq!(days[0].day, "005_Jan.05");
    assert_eq!(rectifier.jobs().len(), 1);
    let merge_dir = temp_dir.path().join("cameras/caco-01/cx/merge/2020");
    assert!(merge_dir.join("005_Jan.05/1578225600.timex.merge.jpg").exists());
    assert!(!merge_dir.join("5_Jan.05").exists());
}

#[tokio::test]
async fn test_legacy_day_folder_merges_under_padded_token() {
    let temp_dir = TempDir::new().unwrap();
    touch(temp_dir.path(), "cameras/caco-01/c1/2020/5_Jan.5/raw/1578225600.c1.timex.jpg");

    let (days, rectifier) = merge_year_2020(local_store(temp_dir.path())).await;

    assert_eq!(days, vec![DayUnit::new(STATION, "2020", "5_Jan.5")]);
    assert_eq!(days[0].day, "005_Jan.05");
    assert_eq!(
        rectifier.jobs()[0].image_refs,
        vec!["cameras/caco-01/c1/2020/5_Jan.5/raw/1578225600.c1.timex.jpg"]
    );
    assert!(temp_dir
        .path()
        .join("cameras/caco-01/cx/merge/2020/005_Jan.05/1578225600.timex.merge.jpg")
        .exists());
}

#[tokio::test]
async fn test_census_counts_variants() {
    let temp_dir = TempDir::new().unwrap();
    for name in [
        "1576270800.c1.timex.jpg",
        "1576270801.c1.snap.jpg",
        "1576270802.c1.snap.jpg",
        "1576270803.c1.var.jpg",
        "thumbs.db",
    ] {
        touch(
            temp_dir.path(),
            &paths::build_raw_key(STATION, "C1", YEAR, DAY, name),
        );
    }

    let census = UploadIngestor::new(local_store(temp_dir.path()))
        .census(STATION, "C1", YEAR, DAY)
        .await
        .unwrap();

    assert_eq!(census.count(coastcam_merge::paths::CaptureVariant::Snapshot), 2);
    assert_eq!(census.count(coastcam_merge::paths::CaptureVariant::TimeExposure), 1);
    assert_eq!(census.unparseable, 1);
    assert_eq!(census.total(), 5);
}
