//! Profile edits, avatars and the public view.

mod support;

use anyhow::Result;
use custodian_core::{
    Field, IdentityError, IdentityId, ProfileUpdate, repositories::IdentityStore,
    serializer::to_public_view,
};
use support::harness::TestHarness;

#[tokio::test]
async fn negative_age_is_rejected_without_writing() -> Result<()> {
    let harness = TestHarness::new()?;
    let ada = harness.register("Ada", "ada@example.com").await?;
    harness.service.set_age(ada.id, 36).await?;
    let before = harness.identities.find_by_id(ada.id).await?.unwrap();

    let err = harness.service.set_age(ada.id, -1).await.unwrap_err();

    assert_eq!(err.field(), Some(Field::Age));
    let after = harness.identities.find_by_id(ada.id).await?.unwrap();
    assert_eq!(after, before);
    assert_eq!(after.age().value(), 36);
    Ok(())
}

#[tokio::test]
async fn partial_updates_touch_only_named_fields() -> Result<()> {
    let harness = TestHarness::new()?;
    let ada = harness.register("Ada", "ada@example.com").await?;

    let updated = harness
        .service
        .update_profile(ada.id, &ProfileUpdate::default().name("  Countess  "))
        .await?;

    assert_eq!(updated.name, "Countess");
    assert_eq!(updated.email, ada.email);
    assert_eq!(updated.created_at, ada.created_at);
    assert!(updated.updated_at >= ada.updated_at);
    Ok(())
}

#[tokio::test]
async fn one_bad_field_rejects_the_whole_update() -> Result<()> {
    let harness = TestHarness::new()?;
    let ada = harness.register("Ada", "ada@example.com").await?;

    let update = ProfileUpdate::default()
        .name("Renamed")
        .email("not an email");
    let err = harness
        .service
        .update_profile(ada.id, &update)
        .await
        .unwrap_err();

    assert_eq!(err.field(), Some(Field::Email));
    assert_eq!(harness.service.find(ada.id).await?, Some(ada));
    Ok(())
}

#[tokio::test]
async fn email_change_respects_uniqueness() -> Result<()> {
    let harness = TestHarness::new()?;
    let ada = harness.register("Ada", "ada@example.com").await?;
    harness.register("Grace", "grace@example.com").await?;

    let taken = ProfileUpdate::default().email("GRACE@example.com");
    assert!(matches!(
        harness.service.update_profile(ada.id, &taken).await,
        Err(IdentityError::DuplicateEmail)
    ));

    let free = ProfileUpdate::default().email("lovelace@example.com");
    harness.service.update_profile(ada.id, &free).await?;
    assert!(harness.service.find_by_email("ada@example.com").await?.is_none());
    assert_eq!(
        harness
            .service
            .find_by_email("Lovelace@example.com")
            .await?
            .map(|view| view.id),
        Some(ada.id)
    );
    Ok(())
}

#[tokio::test]
async fn avatar_round_trip_stays_out_of_public_view() -> Result<()> {
    let harness = TestHarness::new()?;
    let ada = harness.register("Ada", "ada@example.com").await?;
    let avatar = vec![0x89, 0x50, 0x4e, 0x47];

    harness.service.set_avatar(ada.id, avatar.clone()).await?;
    assert_eq!(harness.service.avatar(ada.id).await?, Some(avatar));

    harness.service.clear_avatar(ada.id).await?;
    assert_eq!(harness.service.avatar(ada.id).await?, None);
    Ok(())
}

#[tokio::test]
async fn public_view_never_carries_secrets() -> Result<()> {
    let harness = TestHarness::new()?;
    let ada = harness.register("Ada", "ada@example.com").await?;
    let token = harness.service.issue_token(ada.id).await?;
    harness
        .service
        .set_avatar(ada.id, b"avatar-bytes-marker".to_vec())
        .await?;

    let record = harness.identities.find_by_id(ada.id).await?.unwrap();
    let view = to_public_view(&record);
    let json = serde_json::to_string(&view)?;

    for rendered in [json, format!("{view:?}"), format!("{record:?}")] {
        assert!(!rendered.contains(&token));
        assert!(!rendered.contains(record.password_hash()));
        assert!(!rendered.contains("avatar-bytes-marker"));
    }
    assert_eq!(to_public_view(&view), view);
    Ok(())
}

#[tokio::test]
async fn operations_on_missing_identities_fail() -> Result<()> {
    let harness = TestHarness::new()?;
    let ghost = IdentityId::new();

    assert!(matches!(
        harness.service.set_age(ghost, 3).await,
        Err(IdentityError::IdentityNotFound(id)) if id == ghost
    ));
    assert!(matches!(
        harness.service.issue_token(ghost).await,
        Err(IdentityError::IdentityNotFound(_))
    ));
    assert!(harness.service.find(ghost).await?.is_none());
    Ok(())
}
