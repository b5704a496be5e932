//! Gallery replacement, reference counting and trash relocation.

mod common;

use common::{Mutation, TestEnv, jpeg_bytes, user};
use encore_assets::{
    AssetError, GalleryItem, ImageChange, OwnerGallery, ProfileSlot, ReclaimReport, UsageCounter,
};
use encore_core::ImageId;
use encore_core::UserId;
use encore_core::variant::{ARTIST_PRESET, EVENT_PRESET, REVIEW_PRESET};
use encore_metadata::{GalleryRepo, GalleryRow, GallerySite, ProfileSite};
use uuid::Uuid;

fn item(key: &str, position: u32) -> GalleryItem {
    GalleryItem {
        key: key.to_string(),
        position,
    }
}

/// Attach `keys` as the gallery of a fresh event and commit.
async fn event_gallery(env: &TestEnv, owner: UserId, keys: &[&str]) -> (OwnerGallery, Vec<GalleryRow>) {
    for key in keys {
        env.seed(key, jpeg_bytes(800, 600)).await;
    }
    let slot = OwnerGallery {
        site: GallerySite::Event,
        owner_id: Uuid::new_v4(),
    };
    let items: Vec<GalleryItem> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| item(key, i as u32))
        .collect();

    let mut uow = env.metadata.begin().await.unwrap();
    let rows = env
        .pipeline
        .attachments
        .replace_gallery(&mut uow, &slot, &items, owner, &EVENT_PRESET)
        .await
        .unwrap();
    uow.commit().await.unwrap();
    (slot, rows)
}

#[tokio::test]
async fn new_gallery_images_are_promoted_in_order() {
    let env = TestEnv::new().await;
    let (slot, rows) = event_gallery(
        &env,
        user(),
        &[
            "tmp/event/2025/07/a-one.jpg",
            "tmp/event/2025/07/b-two.jpg",
        ],
    )
    .await;
    assert_eq!(rows.len(), 2);

    let mut conn = env.metadata.acquire().await.unwrap();
    let entries = conn.gallery_images(slot.site, slot.owner_id).await.unwrap();
    let keys: Vec<&str> = entries.iter().map(|e| e.object_key.as_str()).collect();
    assert_eq!(
        keys,
        ["inline/event/2025/07/a-one.jpg", "inline/event/2025/07/b-two.jpg"]
    );
    assert!(env.exists("inline/event/2025/07/b-two/card_640x360.jpg").await);
}

#[tokio::test]
async fn duplicate_gallery_input_is_rejected_before_any_write() {
    let env = TestEnv::new().await;
    env.seed("tmp/review/2025/07/a-dish.jpg", jpeg_bytes(16, 16))
        .await;
    let slot = OwnerGallery {
        site: GallerySite::Review,
        owner_id: Uuid::new_v4(),
    };

    let mut uow = env.metadata.begin().await.unwrap();
    let err = env
        .pipeline
        .attachments
        .replace_gallery(
            &mut uow,
            &slot,
            &[
                item("tmp/review/2025/07/a-dish.jpg", 0),
                item("tmp/review/2025/07/a-dish.jpg", 1),
            ],
            user(),
            &REVIEW_PRESET,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::DuplicateKey(_)));

    let err = env
        .pipeline
        .attachments
        .replace_gallery(
            &mut uow,
            &slot,
            &[
                item("tmp/review/2025/07/a-dish.jpg", 2),
                item("tmp/review/2025/07/b-dish.jpg", 2),
            ],
            user(),
            &REVIEW_PRESET,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::DuplicatePosition(2)));

    assert_eq!(uow.pending_tasks(), 0);
    assert!(
        slot_is_empty(&mut uow, &slot).await,
        "no mapping row may be written"
    );
    uow.rollback().await.unwrap();
    assert!(env.recorder.mutations().is_empty());
}

async fn slot_is_empty(uow: &mut encore_metadata::UnitOfWork, slot: &OwnerGallery) -> bool {
    uow.conn()
        .gallery_images(slot.site, slot.owner_id)
        .await
        .unwrap()
        .is_empty()
}

#[tokio::test]
async fn dropped_gallery_image_is_moved_to_trash() {
    let env = TestEnv::new().await;
    let owner = user();
    let (slot, rows) = event_gallery(
        &env,
        owner,
        &["tmp/event/2025/08/a-keep.jpg", "tmp/event/2025/08/b-drop.jpg"],
    )
    .await;
    let kept = rows[0].image_id;
    let dropped = rows[1].image_id;
    env.seed("tmp/event/2025/08/c-new.jpg", jpeg_bytes(400, 300))
        .await;
    env.recorder.clear();

    // Resubmit the kept image by its current key, add a new one, leave one out.
    let mut uow = env.metadata.begin().await.unwrap();
    let rows = env
        .pipeline
        .attachments
        .replace_gallery(
            &mut uow,
            &slot,
            &[
                item("tmp/event/2025/08/c-new.jpg", 0),
                item("inline/event/2025/08/a-keep.jpg", 1),
            ],
            owner,
            &EVENT_PRESET,
        )
        .await
        .unwrap();
    assert_eq!(rows[1].image_id, kept);
    assert!(env.recorder.mutations().is_empty());
    uow.commit().await.unwrap();

    let row = env.image(dropped).await;
    assert!(row.deleted_at.is_some());
    assert_eq!(row.object_key, "trash/inline/event/2025/08/b-drop.jpg");
    assert_eq!(
        row.public_url,
        "https://cdn.test/trash/inline/event/2025/08/b-drop.jpg"
    );
    assert!(!env.exists("inline/event/2025/08/b-drop.jpg").await);
    assert!(env.exists("trash/inline/event/2025/08/b-drop.jpg").await);
    for spec in EVENT_PRESET.specs {
        assert!(
            env.exists(&format!(
                "trash/inline/event/2025/08/b-drop/{}",
                spec.filename
            ))
            .await
        );
        assert!(
            !env.exists(&format!("inline/event/2025/08/b-drop/{}", spec.filename))
                .await
        );
    }

    assert!(env.image(kept).await.deleted_at.is_none());
    assert!(env.exists("inline/event/2025/08/a-keep.jpg").await);
    assert!(env.exists("inline/event/2025/08/c-new.jpg").await);
}

#[tokio::test]
async fn image_with_a_remaining_reference_is_retained() {
    let env = TestEnv::new().await;
    let (first, rows) = event_gallery(&env, user(), &["tmp/event/2025/09/a-shared.jpg"]).await;
    let image_id = rows[0].image_id;

    // A second event references the same image.
    let second = Uuid::new_v4();
    let mut uow = env.metadata.begin().await.unwrap();
    uow.conn()
        .replace_gallery(
            GallerySite::Event,
            second,
            &[GalleryRow {
                image_id,
                position: 0,
            }],
        )
        .await
        .unwrap();
    assert!(
        uow.conn()
            .remove_gallery_image(first.site, first.owner_id, image_id)
            .await
            .unwrap()
    );
    uow.commit().await.unwrap();
    env.recorder.clear();

    let usage = env.pipeline.usage.clone();
    let report = env
        .pipeline
        .attachments
        .reclaim(&[image_id], usage.as_ref())
        .await
        .unwrap();
    assert_eq!(
        report,
        ReclaimReport {
            retained: vec![image_id],
            ..ReclaimReport::default()
        }
    );
    assert!(env.image(image_id).await.deleted_at.is_none());
    assert!(env.recorder.mutations().is_empty());
}

#[tokio::test]
async fn image_whose_only_reference_is_removed_is_reclaimed() {
    let env = TestEnv::new().await;
    let (slot, rows) = event_gallery(&env, user(), &["tmp/event/2025/09/a-solo.jpg"]).await;
    let image_id = rows[0].image_id;

    let mut uow = env.metadata.begin().await.unwrap();
    uow.conn()
        .remove_gallery_image(slot.site, slot.owner_id, image_id)
        .await
        .unwrap();
    uow.commit().await.unwrap();
    env.recorder.clear();

    let usage = env.pipeline.usage.clone();
    let report = env
        .pipeline
        .attachments
        .reclaim(&[image_id, image_id], usage.as_ref())
        .await
        .unwrap();
    assert_eq!(report.reclaimed, vec![image_id]);

    let row = env.image(image_id).await;
    assert!(row.deleted_at.is_some());
    assert!(env.exists("trash/inline/event/2025/09/a-solo.jpg").await);
    assert!(env.exists("trash/inline/event/2025/09/a-solo/thumb_320.webp").await);
    let mutations = env.recorder.mutations();
    assert!(mutations.contains(&Mutation::Delete(
        "inline/event/2025/09/a-solo.jpg".to_string()
    )));
    assert!(!mutations.iter().any(|m| matches!(m, Mutation::Put(_))));

    // A second run reports it as already deleted and moves nothing.
    env.recorder.clear();
    let missing = ImageId::new();
    let report = env
        .pipeline
        .reclaimer
        .reclaim(&[image_id, missing], usage.as_ref())
        .await
        .unwrap();
    assert_eq!(report.already_deleted, vec![image_id]);
    assert_eq!(report.missing, vec![missing]);
    assert!(env.recorder.mutations().is_empty());
}

#[tokio::test]
async fn tmp_orphan_is_marked_deleted_without_moving_storage() {
    let env = TestEnv::new().await;
    let key = "tmp/group/2025/10/abc-band.jpg";
    env.seed(key, jpeg_bytes(32, 32)).await;

    let mut uow = env.metadata.begin().await.unwrap();
    let image_id = env
        .pipeline
        .attachments
        .create_tmp_image(&mut uow, key, Some(user()))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let usage = env.pipeline.usage.clone();
    let report = env
        .pipeline
        .reclaimer
        .reclaim(&[image_id], usage.as_ref())
        .await
        .unwrap();
    assert_eq!(report.reclaimed, vec![image_id]);

    let row = env.image(image_id).await;
    assert!(row.deleted_at.is_some());
    assert_eq!(row.object_key, key);
    assert!(env.recorder.mutations().is_empty());
}

#[tokio::test]
async fn replacing_a_profile_image_reclaims_the_previous_one() {
    let env = TestEnv::new().await;
    let owner = user();
    let slot = ProfileSlot {
        site: ProfileSite::Group,
        owner_id: Uuid::new_v4(),
    };
    env.seed("tmp/group/2025/10/a-old.jpg", jpeg_bytes(500, 500))
        .await;
    env.seed("tmp/group/2025/10/b-new.jpg", jpeg_bytes(500, 500))
        .await;
    let attachments = &env.pipeline.attachments;

    let mut uow = env.metadata.begin().await.unwrap();
    let old = attachments
        .update_single_image(
            &mut uow,
            None,
            ImageChange::Replace("tmp/group/2025/10/a-old.jpg".to_string()),
            owner,
            &ARTIST_PRESET,
            &slot,
        )
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut uow = env.metadata.begin().await.unwrap();
    let kept = attachments
        .update_single_image(&mut uow, old, ImageChange::Keep, owner, &ARTIST_PRESET, &slot)
        .await
        .unwrap();
    assert_eq!(kept, old);
    assert_eq!(uow.pending_tasks(), 0);

    let new = attachments
        .update_single_image(
            &mut uow,
            old,
            ImageChange::Replace("tmp/group/2025/10/b-new.jpg".to_string()),
            owner,
            &ARTIST_PRESET,
            &slot,
        )
        .await
        .unwrap();
    assert_eq!(uow.pending_tasks(), 2);
    uow.commit().await.unwrap();

    let old_row = env.image(old.unwrap()).await;
    assert!(old_row.deleted_at.is_some());
    assert_eq!(old_row.object_key, "trash/inline/group/2025/10/a-old.jpg");
    assert!(env.exists("trash/inline/group/2025/10/a-old/thumb_160x160.jpg").await);

    let new_row = env.image(new.unwrap()).await;
    assert!(new_row.deleted_at.is_none());
    assert_eq!(new_row.object_key, "inline/group/2025/10/b-new.jpg");

    // Removing the image leaves the slot empty and reclaims it too.
    let mut uow = env.metadata.begin().await.unwrap();
    let after = attachments
        .update_single_image(&mut uow, new, ImageChange::Remove, owner, &ARTIST_PRESET, &slot)
        .await
        .unwrap();
    assert_eq!(after, None);
    uow.commit().await.unwrap();
    assert!(env.image(new.unwrap()).await.deleted_at.is_some());
}

struct AlwaysReferenced;

#[async_trait::async_trait]
impl UsageCounter for AlwaysReferenced {
    async fn count_usages(&self, _image_id: ImageId) -> encore_assets::AssetResult<u64> {
        Ok(1)
    }
}

#[tokio::test]
async fn caller_supplied_counter_is_respected() {
    let env = TestEnv::new().await;
    let (slot, rows) = event_gallery(&env, user(), &["tmp/event/2025/11/a-pinned.jpg"]).await;
    let image_id = rows[0].image_id;
    let mut uow = env.metadata.begin().await.unwrap();
    uow.conn()
        .remove_gallery_image(slot.site, slot.owner_id, image_id)
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let report = env
        .pipeline
        .attachments
        .reclaim(&[image_id], &AlwaysReferenced)
        .await
        .unwrap();
    assert_eq!(report.retained, vec![image_id]);
}
