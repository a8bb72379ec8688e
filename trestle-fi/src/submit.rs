//! Submission assembly
//!
//! Converts the rated-element set plus maintenance actions into the wire
//! entity and sends it: pending images first (independently, so one failed
//! upload never silently drops the rest), then the assembled inspection.
//! The durable snapshot is cleared only after the remote confirms success;
//! any failure leaves it in place for retry without data loss.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use trestle_common::db::{ImageStore, SnapshotStore};
use trestle_common::events::TrestleEvent;
use trestle_common::model::{
    ConditionSpread, ElementId, InspectionMeta, MaintenanceAction, PhotoRef,
};

use crate::client::{RemoteAsset, StructureApi};
use crate::error::{Error, Result, UploadFailure};
use crate::state::SharedState;

/// One leaf rating in wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRatingRecord {
    pub condition_rating_id: Uuid,
    pub element_id: ElementId,
    pub ratings: ConditionSpread,
}

/// One maintenance action in wire format; photos are remote references
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceActionEntity {
    pub id: Uuid,
    pub element_id: Option<ElementId>,
    pub description: String,
    pub category: String,
    pub photos: Vec<RemoteAsset>,
}

/// The assembled inspection submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionEntity {
    pub inspection: InspectionMeta,
    pub condition_ratings: Vec<ConditionRatingRecord>,
    pub maintenance_actions: Vec<MaintenanceActionEntity>,
}

/// Assemble and submit the inspection.
///
/// Guarded against concurrent calls: a second attempt while one is in
/// flight fails fast with [`Error::SubmissionInFlight`].
pub async fn assemble_and_submit(
    shared: &SharedState,
    api: &dyn StructureApi,
    snapshots: &SnapshotStore,
    images: &ImageStore,
) -> Result<Uuid> {
    if !shared.try_begin_submission() {
        return Err(Error::SubmissionInFlight);
    }
    let result = run_submission(shared, api, snapshots, images).await;
    shared.end_submission();
    result
}

async fn run_submission(
    shared: &SharedState,
    api: &dyn StructureApi,
    snapshots: &SnapshotStore,
    images: &ImageStore,
) -> Result<Uuid> {
    shared.events().emit_lossy(TrestleEvent::SubmissionStarted {
        timestamp: trestle_common::time::now(),
    });

    let (actions, failures) = upload_pending_images(shared, api, images).await;

    // Keep the successful replacements even when some uploads failed, so a
    // retry only re-sends what is still pending.
    shared.set_actions(actions.clone()).await;

    if !failures.is_empty() {
        shared.events().emit_lossy(TrestleEvent::SubmissionFailed {
            reason: format!("{} image upload(s) failed", failures.len()),
            timestamp: trestle_common::time::now(),
        });
        return Err(Error::Upload { failures });
    }

    let state = shared.state().await;
    let condition_ratings = state
        .rated
        .iter()
        .map(|leaf| ConditionRatingRecord {
            condition_rating_id: Uuid::new_v4(),
            element_id: leaf.identity.clone(),
            ratings: leaf.condition,
        })
        .collect();

    let entity = InspectionEntity {
        inspection: state.meta.clone(),
        condition_ratings,
        maintenance_actions: actions.iter().map(to_action_entity).collect(),
    };

    match api.submit_inspection(&entity).await {
        Ok(inspection_id) => {
            shared.set_inspection_id(inspection_id).await;
            // Prevents resubmission of stale local state; failure to clear
            // degrades persistence but the submission itself succeeded
            if let Err(e) = snapshots.clear().await {
                warn!(error = %e, "Failed to clear snapshot after submission");
            }
            info!(%inspection_id, "Inspection submitted");
            shared.events().emit_lossy(TrestleEvent::SubmissionCompleted {
                inspection_id,
                timestamp: trestle_common::time::now(),
            });
            Ok(inspection_id)
        }
        Err(e) => {
            let reason = e.to_string();
            warn!(error = %reason, "Inspection submission failed, snapshot preserved");
            shared.events().emit_lossy(TrestleEvent::SubmissionFailed {
                reason: reason.clone(),
                timestamp: trestle_common::time::now(),
            });
            Err(Error::Submission(reason))
        }
    }
}

/// Upload every still-local photo, independently per image.
///
/// Returns the actions with successful uploads swapped to remote
/// references, plus the per-image failures.
async fn upload_pending_images(
    shared: &SharedState,
    api: &dyn StructureApi,
    images: &ImageStore,
) -> (Vec<MaintenanceAction>, Vec<UploadFailure>) {
    let mut actions = shared.actions().await;
    let mut failures = Vec::new();

    for action in &mut actions {
        for photo in &mut action.photos {
            let PhotoRef::Local { image_id } = photo else {
                continue;
            };
            let image_id = *image_id;

            let row = match images.get(image_id).await {
                Ok(Some(row)) => row,
                Ok(None) => {
                    failures.push(UploadFailure {
                        maintenance_id: action.id,
                        image_id,
                        reason: "image blob missing from local store".to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    failures.push(UploadFailure {
                        maintenance_id: action.id,
                        image_id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match api.upload_image(row.data, &row.file_name).await {
                Ok(asset) => {
                    if let Err(e) = images.mark_uploaded(image_id).await {
                        warn!(%image_id, error = %e, "Uploaded image could not be flagged");
                    }
                    *photo = PhotoRef::Remote {
                        id: asset.id,
                        name: asset.name,
                    };
                }
                Err(e) => {
                    failures.push(UploadFailure {
                        maintenance_id: action.id,
                        image_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    (actions, failures)
}

fn to_action_entity(action: &MaintenanceAction) -> MaintenanceActionEntity {
    MaintenanceActionEntity {
        id: action.id,
        element_id: action.element_id.clone(),
        description: action.description.clone(),
        category: action.category.clone(),
        photos: action
            .photos
            .iter()
            .filter_map(|photo| match photo {
                PhotoRef::Remote { id, name } => Some(RemoteAsset {
                    id: id.clone(),
                    name: name.clone(),
                }),
                PhotoRef::Local { .. } => None,
            })
            .collect(),
    }
}
