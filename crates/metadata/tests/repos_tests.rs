//! Repository behaviour on a real SQLite database.

mod common;

use common::{TestMetadata, tmp_row};
use encore_core::{ImageId, ImageStatus};
use encore_metadata::{
    GalleryRepo, GalleryRow, GallerySite, ImageRepo, MetadataError, ProfileImageRepo,
    ProfileSite, ReferenceRepo, ReferenceSite,
};
use time::OffsetDateTime;
use uuid::Uuid;

#[tokio::test]
async fn insert_find_and_save_image() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();
    let mut row = tmp_row("tmp/artist/2025/05/abc-photo.jpg");

    conn.insert_image(&row).await.unwrap();
    assert!(conn.image_exists(row.id()).await.unwrap());
    assert!(!conn.image_exists(ImageId::new()).await.unwrap());

    row.object_key = "inline/artist/2025/05/abc-photo.jpg".to_string();
    row.set_status(ImageStatus::Committed);
    conn.save_image(&row).await.unwrap();

    let found = conn.find_image(row.id()).await.unwrap().unwrap();
    assert_eq!(found.object_key, "inline/artist/2025/05/abc-photo.jpg");
    assert_eq!(found.status().unwrap(), ImageStatus::Committed);
    assert_eq!(found.owner(), row.owner());
}

#[tokio::test]
async fn duplicate_keys_are_rejected() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();

    conn.insert_image(&tmp_row("tmp/user/2025/01/a-me.png"))
        .await
        .unwrap();
    let err = conn
        .insert_image(&tmp_row("tmp/user/2025/01/a-me.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)));
}

#[tokio::test]
async fn saving_a_missing_image_is_not_found() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();
    let err = conn
        .save_image(&tmp_row("tmp/user/2025/01/a-none.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::NotFound(_)));
}

#[tokio::test]
async fn commit_promotion_flips_a_live_tmp_row_once() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();
    let row = tmp_row("tmp/artist/2025/05/abc-photo.jpg");
    conn.insert_image(&row).await.unwrap();

    // Wrong staging key: nothing changes.
    assert!(
        !conn
            .commit_promotion(
                row.id(),
                "tmp/artist/2025/05/other.jpg",
                "inline/artist/2025/05/other.jpg",
                "http://cdn.test/inline/artist/2025/05/other.jpg",
            )
            .await
            .unwrap()
    );

    assert!(
        conn.commit_promotion(
            row.id(),
            "tmp/artist/2025/05/abc-photo.jpg",
            "inline/artist/2025/05/abc-photo.jpg",
            "http://cdn.test/inline/artist/2025/05/abc-photo.jpg",
        )
        .await
        .unwrap()
    );
    let found = conn.find_image(row.id()).await.unwrap().unwrap();
    assert_eq!(found.status().unwrap(), ImageStatus::Committed);
    assert_eq!(found.object_key, "inline/artist/2025/05/abc-photo.jpg");
    assert_eq!(
        found.public_url,
        "http://cdn.test/inline/artist/2025/05/abc-photo.jpg"
    );

    // Already committed.
    assert!(
        !conn
            .commit_promotion(
                row.id(),
                "tmp/artist/2025/05/abc-photo.jpg",
                "inline/artist/2025/05/abc-photo.jpg",
                "http://cdn.test/inline/artist/2025/05/abc-photo.jpg",
            )
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn commit_promotion_skips_soft_deleted_rows() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();
    let mut row = tmp_row("tmp/review/2025/03/a-dish.jpg");
    conn.insert_image(&row).await.unwrap();

    row.deleted_at = Some(OffsetDateTime::now_utc());
    conn.save_image(&row).await.unwrap();

    assert!(
        !conn
            .commit_promotion(
                row.id(),
                "tmp/review/2025/03/a-dish.jpg",
                "inline/review/2025/03/a-dish.jpg",
                "http://cdn.test/inline/review/2025/03/a-dish.jpg",
            )
            .await
            .unwrap()
    );
    let found = conn.find_image(row.id()).await.unwrap().unwrap();
    assert!(found.is_deleted());
    assert_eq!(found.status().unwrap(), ImageStatus::Tmp);
}

#[tokio::test]
async fn profile_images_upsert_and_count() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();
    let first = tmp_row("inline/artist/2025/05/a-one.jpg");
    let second = tmp_row("inline/artist/2025/05/b-two.jpg");
    conn.insert_image(&first).await.unwrap();
    conn.insert_image(&second).await.unwrap();

    let artist = Uuid::new_v4();
    assert_eq!(
        conn.profile_image(ProfileSite::Artist, artist).await.unwrap(),
        None
    );

    conn.set_profile_image(ProfileSite::Artist, artist, Some(first.id()))
        .await
        .unwrap();
    conn.set_profile_image(ProfileSite::Group, Uuid::new_v4(), Some(first.id()))
        .await
        .unwrap();
    assert_eq!(
        conn.count_references(ReferenceSite::ArtistProfile, first.id())
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        conn.count_references(ReferenceSite::GroupProfile, first.id())
            .await
            .unwrap(),
        1
    );

    conn.set_profile_image(ProfileSite::Artist, artist, Some(second.id()))
        .await
        .unwrap();
    assert_eq!(
        conn.profile_image(ProfileSite::Artist, artist).await.unwrap(),
        Some(second.id())
    );
    assert_eq!(
        conn.count_references(ReferenceSite::ArtistProfile, first.id())
            .await
            .unwrap(),
        0
    );

    conn.set_profile_image(ProfileSite::Artist, artist, None)
        .await
        .unwrap();
    assert_eq!(
        conn.profile_image(ProfileSite::Artist, artist).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn profile_image_must_reference_an_existing_image() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();
    let result = conn
        .set_profile_image(ProfileSite::User, Uuid::new_v4(), Some(ImageId::new()))
        .await;
    assert!(matches!(result, Err(MetadataError::Database(_))));
}

#[tokio::test]
async fn galleries_replace_order_and_remove() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();
    let a = tmp_row("inline/event/2025/06/a-1.jpg");
    let b = tmp_row("inline/event/2025/06/b-2.jpg");
    conn.insert_image(&a).await.unwrap();
    conn.insert_image(&b).await.unwrap();

    let event = Uuid::new_v4();
    let other_event = Uuid::new_v4();
    conn.replace_gallery(
        GallerySite::Event,
        event,
        &[
            GalleryRow {
                image_id: b.id(),
                position: 1,
            },
            GalleryRow {
                image_id: a.id(),
                position: 0,
            },
        ],
    )
    .await
    .unwrap();
    conn.replace_gallery(
        GallerySite::Event,
        other_event,
        &[GalleryRow {
            image_id: a.id(),
            position: 0,
        }],
    )
    .await
    .unwrap();

    let entries = conn.gallery_images(GallerySite::Event, event).await.unwrap();
    let keys: Vec<_> = entries.iter().map(|e| e.object_key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["inline/event/2025/06/a-1.jpg", "inline/event/2025/06/b-2.jpg"]
    );
    assert_eq!(
        conn.count_references(ReferenceSite::EventGallery, a.id())
            .await
            .unwrap(),
        2
    );

    assert!(
        conn.remove_gallery_image(GallerySite::Event, event, a.id())
            .await
            .unwrap()
    );
    assert!(
        !conn
            .remove_gallery_image(GallerySite::Event, event, a.id())
            .await
            .unwrap()
    );
    assert_eq!(
        conn.count_references(ReferenceSite::EventGallery, a.id())
            .await
            .unwrap(),
        1
    );

    conn.replace_gallery(GallerySite::Event, event, &[])
        .await
        .unwrap();
    assert!(
        conn.gallery_images(GallerySite::Event, event)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        conn.count_references(ReferenceSite::ReviewGallery, a.id())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn duplicate_gallery_positions_are_rejected() {
    let meta = TestMetadata::new().await.unwrap();
    let mut conn = meta.store.acquire().await.unwrap();
    let a = tmp_row("inline/review/2025/06/a-1.jpg");
    conn.insert_image(&a).await.unwrap();

    let err = conn
        .replace_gallery(
            GallerySite::Review,
            Uuid::new_v4(),
            &[
                GalleryRow {
                    image_id: a.id(),
                    position: 0,
                },
                GalleryRow {
                    image_id: a.id(),
                    position: 0,
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::AlreadyExists(_)));
}
