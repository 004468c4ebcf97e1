//! Credential checks at login time.

mod support;

use anyhow::Result;
use custodian_core::{IdentityError, repositories::IdentityStore};
use support::harness::{TEST_PASSWORD, TestHarness};

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() -> Result<()> {
    let harness = TestHarness::new()?;
    harness.register("Ada", "ada@example.com").await?;
    let auth = harness.service.authenticator();

    let ghost = auth
        .check_credentials("ghost@example.com", "whatever")
        .await
        .unwrap_err();
    let wrong = auth
        .check_credentials("ada@example.com", "definitely-not-it")
        .await
        .unwrap_err();

    assert!(matches!(ghost, IdentityError::Authentication));
    assert!(matches!(wrong, IdentityError::Authentication));
    assert_eq!(ghost.to_string(), "invalid operation");
    assert_eq!(ghost.to_string(), wrong.to_string());
    assert_eq!(format!("{ghost:?}"), format!("{wrong:?}"));
    Ok(())
}

#[tokio::test]
async fn failed_login_issues_no_token() -> Result<()> {
    let harness = TestHarness::new()?;
    let ada = harness.register("Ada", "ada@example.com").await?;

    assert!(matches!(
        harness.service.login("ada@example.com", "nope-nope-nope").await,
        Err(IdentityError::Authentication)
    ));

    let stored = harness.identities.find_by_id(ada.id).await?.unwrap();
    assert!(stored.tokens().is_empty());
    Ok(())
}

#[tokio::test]
async fn login_normalizes_email() -> Result<()> {
    let harness = TestHarness::new()?;
    let ada = harness.register("Ada", "ada@example.com").await?;

    let session = harness
        .service
        .login("  ADA@Example.Com\t", TEST_PASSWORD)
        .await?;
    assert_eq!(session.identity.id, ada.id);
    assert!(!format!("{session:?}").contains(&session.token));
    Ok(())
}
