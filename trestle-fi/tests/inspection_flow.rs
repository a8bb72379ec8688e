//! End-to-end tests for the inspection flow: browse, rate, persist,
//! restore, and submit against a mock remote API.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use trestle_common::db::{open_store, ImageStore, SnapshotStore};
use trestle_common::events::TrestleEvent;
use trestle_common::model::{
    ConditionSpread, ElementId, InspectionMeta, MaintenanceAction, PhotoRef, PriorRating,
    RawElement,
};

use trestle_fi::client::{PreviousInspection, RemoteAsset, StructureApi, StructurePayload};
use trestle_fi::submit::{assemble_and_submit, InspectionEntity};
use trestle_fi::sync::{restore_session, save_now, SnapshotSaver};
use trestle_fi::viewer::{handle_viewer_pick, ViewerPort};
use trestle_fi::{Error, Result, SharedState};

fn raw_leaf(id: i64, name: &str) -> RawElement {
    RawElement {
        express_id: Some(id),
        tag: None,
        name: Some(name.to_string()),
        type_name: Some("IfcBeam".to_string()),
        element_code: None,
        children: Vec::new(),
    }
}

fn raw_branch(id: i64, name: &str, children: Vec<RawElement>) -> RawElement {
    RawElement {
        express_id: Some(id),
        tag: None,
        name: Some(name.to_string()),
        type_name: Some("IfcElementAssembly".to_string()),
        element_code: None,
        children,
    }
}

/// A{ B, C }: the minimal drill/rate/go-back scenario tree
fn minimal_structure() -> Vec<RawElement> {
    vec![raw_branch(
        1,
        "A",
        vec![raw_leaf(2, "B"), raw_leaf(3, "C")],
    )]
}

async fn loaded_shared() -> Arc<SharedState> {
    let shared = Arc::new(SharedState::new(InspectionMeta::new("BRG-042", "j.doe")));
    shared.load_structure(&minimal_structure(), &[]).await;
    shared
}

/// In-memory StructureApi with scriptable failures
#[derive(Default)]
struct MockApi {
    fail_uploads: HashSet<String>,
    fail_submit: bool,
    submitted: Mutex<Vec<InspectionEntity>>,
}

#[async_trait]
impl StructureApi for MockApi {
    async fn fetch_structure(&self, _structure_id: &str) -> Result<StructurePayload> {
        Ok(StructurePayload {
            element_metadata: minimal_structure(),
        })
    }

    async fn fetch_previous_inspection(
        &self,
        _structure_id: &str,
    ) -> Result<Option<PreviousInspection>> {
        Ok(Some(PreviousInspection {
            condition_ratings: vec![PriorRating {
                element_id: ElementId::from(3),
                ratings: ConditionSpread([0, 1, 0, 0]),
            }],
        }))
    }

    async fn submit_inspection(&self, entity: &InspectionEntity) -> Result<Uuid> {
        if self.fail_submit {
            return Err(Error::Api("503 Service Unavailable".to_string()));
        }
        self.submitted.lock().unwrap().push(entity.clone());
        Ok(Uuid::new_v4())
    }

    async fn upload_image(&self, _data: Vec<u8>, file_name: &str) -> Result<RemoteAsset> {
        if self.fail_uploads.contains(file_name) {
            return Err(Error::Api(format!("upload of {file_name} refused")));
        }
        Ok(RemoteAsset {
            id: format!("asset-{file_name}"),
            name: file_name.to_string(),
        })
    }
}

#[tokio::test]
async fn test_drill_rate_go_back_scenario() {
    let shared = loaded_shared().await;

    // DrillIn(A)
    assert!(shared.drill_in(&ElementId::from(1)).await);
    let displayed = shared.displayed().await;
    assert_eq!(displayed.len(), 2);
    assert_eq!(shared.depth().await, 1);

    // Rate B
    let b = ElementId::from(2);
    assert!(shared.apply_rating(&b, ConditionSpread([1, 0, 0, 0])).await);

    let on_display = shared
        .displayed()
        .await
        .into_iter()
        .find(|n| n.identity == b)
        .unwrap();
    assert!(on_display.is_saved);
    assert_eq!(on_display.condition, ConditionSpread([1, 0, 0, 0]));

    // GoBack: A itself carries no condition
    assert!(shared.go_back().await);
    let root_view = shared.displayed().await;
    assert_eq!(root_view.len(), 1);
    assert_eq!(root_view[0].label, "A");
    assert_eq!(root_view[0].condition, ConditionSpread::zero());
    // ...but its child B reflects the rating inside the canonical tree
    assert_eq!(root_view[0].children[0].condition, ConditionSpread([1, 0, 0, 0]));

    let rated = shared.rated().await;
    assert_eq!(rated.len(), 1);
    assert_eq!(rated[0].identity, b);
}

#[tokio::test]
async fn test_structure_load_merges_previous_inspection() {
    let api = MockApi::default();
    let payload = api.fetch_structure("BRG-042").await.unwrap();
    let previous = api
        .fetch_previous_inspection("BRG-042")
        .await
        .unwrap()
        .unwrap();

    let shared = Arc::new(SharedState::new(InspectionMeta::new("BRG-042", "j.doe")));
    shared
        .load_structure(&payload.element_metadata, &previous.condition_ratings)
        .await;

    shared.drill_in(&ElementId::from(1)).await;
    let displayed = shared.displayed().await;
    let c = displayed.iter().find(|n| n.label == "C").unwrap();
    assert_eq!(c.condition, ConditionSpread([0, 1, 0, 0]));
    let b = displayed.iter().find(|n| n.label == "B").unwrap();
    assert_eq!(b.condition, ConditionSpread::zero());
}

#[tokio::test]
async fn test_saver_debounces_and_restore_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_store(&dir.path().join("trestle.db")).await.unwrap();
    let store = SnapshotStore::new(pool);

    let shared = loaded_shared().await;
    let mut rx = shared.events().subscribe();
    let _saver = SnapshotSaver::spawn(shared.clone(), store.clone(), Duration::from_millis(50));

    // A burst of edits inside one quiet window
    shared.drill_in(&ElementId::from(1)).await;
    shared
        .apply_rating(&ElementId::from(2), ConditionSpread([1, 0, 0, 0]))
        .await;
    shared
        .add_maintenance_action(MaintenanceAction::new(
            Some(ElementId::from(2)),
            "Seal hairline crack",
            "concrete-repair",
        ))
        .await;

    // Exactly one write for the burst
    let mut saves = 0;
    let counting = async {
        loop {
            match rx.recv().await {
                Ok(TrestleEvent::SnapshotSaved { .. }) => saves += 1,
                Ok(_) => {}
                Err(_) => break,
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_millis(600), counting).await;
    assert_eq!(saves, 1, "burst should coalesce into one snapshot write");

    // A fresh session detects and restores the saved state
    let fresh = Arc::new(SharedState::new(InspectionMeta::new("", "")));
    assert!(store.exists().await.unwrap());
    assert!(restore_session(&fresh, &store).await.unwrap());

    assert_eq!(fresh.depth().await, 1);
    assert_eq!(fresh.rated().await.len(), 1);
    assert_eq!(fresh.actions().await.len(), 1);
    assert_eq!(fresh.state().await.meta.structure_id, "BRG-042");
}

#[tokio::test]
async fn test_restore_without_snapshot_is_fresh_start() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_store(&dir.path().join("trestle.db")).await.unwrap();
    let store = SnapshotStore::new(pool);

    let shared = Arc::new(SharedState::new(InspectionMeta::new("BRG-042", "j.doe")));
    assert!(!restore_session(&shared, &store).await.unwrap());
}

#[tokio::test]
async fn test_submission_success_clears_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_store(&dir.path().join("trestle.db")).await.unwrap();
    let snapshots = SnapshotStore::new(pool.clone());
    let images = ImageStore::new(pool);

    let shared = loaded_shared().await;
    shared
        .apply_rating(&ElementId::from(2), ConditionSpread([1, 0, 0, 0]))
        .await;
    save_now(&shared, &snapshots).await.unwrap();
    assert!(snapshots.exists().await.unwrap());

    let api = MockApi::default();
    let inspection_id = assemble_and_submit(&shared, &api, &snapshots, &images)
        .await
        .unwrap();

    assert!(!snapshots.exists().await.unwrap(), "snapshot must be cleared");
    assert_eq!(
        shared.state().await.meta.inspection_id,
        Some(inspection_id)
    );

    let submitted = api.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].condition_ratings.len(), 1);
    assert_eq!(submitted[0].condition_ratings[0].element_id, ElementId::from(2));
    assert_eq!(
        submitted[0].condition_ratings[0].ratings,
        ConditionSpread([1, 0, 0, 0])
    );
}

#[tokio::test]
async fn test_submission_failure_preserves_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_store(&dir.path().join("trestle.db")).await.unwrap();
    let snapshots = SnapshotStore::new(pool.clone());
    let images = ImageStore::new(pool);

    let shared = loaded_shared().await;
    shared
        .apply_rating(&ElementId::from(2), ConditionSpread([0, 0, 0, 1]))
        .await;
    save_now(&shared, &snapshots).await.unwrap();

    let api = MockApi {
        fail_submit: true,
        ..Default::default()
    };
    let result = assemble_and_submit(&shared, &api, &snapshots, &images).await;

    assert!(matches!(result, Err(Error::Submission(_))));
    assert!(
        snapshots.exists().await.unwrap(),
        "failed submission must keep the snapshot for retry"
    );
    assert!(!shared.is_submitting(), "guard must be released after failure");
}

#[tokio::test]
async fn test_partial_upload_failure_is_reported_per_image() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_store(&dir.path().join("trestle.db")).await.unwrap();
    let snapshots = SnapshotStore::new(pool.clone());
    let images = ImageStore::new(pool);

    let shared = loaded_shared().await;

    let good_action = MaintenanceAction::new(Some(ElementId::from(2)), "Repaint", "coating");
    let bad_action = MaintenanceAction::new(Some(ElementId::from(3)), "Regrout", "masonry");
    let good_image = images.put(good_action.id, "good.jpg", vec![1, 2]).await.unwrap();
    let bad_image = images.put(bad_action.id, "bad.jpg", vec![3, 4]).await.unwrap();

    let mut good_action = good_action;
    good_action.photos.push(PhotoRef::Local { image_id: good_image });
    let mut bad_action = bad_action;
    bad_action.photos.push(PhotoRef::Local { image_id: bad_image });

    shared.add_maintenance_action(good_action.clone()).await;
    shared.add_maintenance_action(bad_action.clone()).await;
    save_now(&shared, &snapshots).await.unwrap();

    let api = MockApi {
        fail_uploads: HashSet::from(["bad.jpg".to_string()]),
        ..Default::default()
    };
    let result = assemble_and_submit(&shared, &api, &snapshots, &images).await;

    let Err(Error::Upload { failures }) = result else {
        panic!("expected upload failure report");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].maintenance_id, bad_action.id);
    assert_eq!(failures[0].image_id, bad_image);

    // The successful upload stuck: its ref went remote, its blob is flagged
    let actions = shared.actions().await;
    let good = actions.iter().find(|a| a.id == good_action.id).unwrap();
    assert!(matches!(good.photos[0], PhotoRef::Remote { .. }));
    assert!(images.pending_for(good_action.id).await.unwrap().is_empty());

    // The failed one stayed local and pending, ready for retry
    let bad = actions.iter().find(|a| a.id == bad_action.id).unwrap();
    assert!(bad.photos[0].is_local());
    assert_eq!(images.pending_for(bad_action.id).await.unwrap().len(), 1);

    // Nothing was submitted and the snapshot survives
    assert!(api.submitted.lock().unwrap().is_empty());
    assert!(snapshots.exists().await.unwrap());
}

#[tokio::test]
async fn test_second_submission_attempt_is_refused_while_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let pool = open_store(&dir.path().join("trestle.db")).await.unwrap();
    let snapshots = SnapshotStore::new(pool.clone());
    let images = ImageStore::new(pool);

    let shared = loaded_shared().await;
    let api = MockApi::default();

    // Simulate an in-flight submission holding the guard
    assert!(shared.try_begin_submission());
    let result = assemble_and_submit(&shared, &api, &snapshots, &images).await;
    assert!(matches!(result, Err(Error::SubmissionInFlight)));
    shared.end_submission();
}

#[derive(Default)]
struct RecordingViewer {
    highlighted: Mutex<Vec<ElementId>>,
}

impl ViewerPort for RecordingViewer {
    fn highlight(&self, identity: &ElementId) {
        self.highlighted.lock().unwrap().push(identity.clone());
    }

    fn isolate(&self, _identities: &[ElementId]) {}

    fn reset(&self) {}
}

#[tokio::test]
async fn test_viewer_pick_navigates_and_highlights() {
    let shared = loaded_shared().await;
    let viewer = RecordingViewer::default();
    let target = ElementId::from(2);

    let ok = handle_viewer_pick(&shared, &viewer, &target, Duration::ZERO).await;

    assert!(ok);
    assert_eq!(shared.depth().await, 1);
    assert_eq!(shared.selected().await.unwrap().identity, target);
    assert_eq!(*viewer.highlighted.lock().unwrap(), vec![target]);
}

#[tokio::test]
async fn test_viewer_pick_with_unknown_identity_is_dropped() {
    let shared = loaded_shared().await;
    let viewer = RecordingViewer::default();

    let ok = handle_viewer_pick(&shared, &viewer, &ElementId::from(404), Duration::ZERO).await;

    assert!(!ok);
    assert_eq!(shared.depth().await, 0);
    assert!(viewer.highlighted.lock().unwrap().is_empty());
}
