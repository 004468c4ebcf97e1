//! Registration, credential hashing and email uniqueness.

mod support;

use std::sync::Arc;

use anyhow::Result;
use argon2::ParamsBuilder;
use custodian_core::{
    Field, IdentityError,
    credentials::CredentialStore,
    identity::{NewIdentityRequest, Password},
    repositories::IdentityStore,
};
use futures::future::join_all;
use support::harness::{TEST_PASSWORD, TestHarness};

fn cheap_credentials() -> CredentialStore {
    let params = ParamsBuilder::new()
        .m_cost(8)
        .t_cost(1)
        .p_cost(1)
        .build()
        .expect("valid params");
    CredentialStore::with_params(params)
}

#[test]
fn hashes_verify_and_never_equal_plaintext() {
    let credentials = cheap_credentials();

    for plaintext in ["a-valid-pw", "seven77", "  padded secret  ", "ünïcödé-pw"] {
        let password = Password::parse(plaintext).unwrap();
        let hash = credentials.hash(&password).unwrap();

        assert_ne!(hash, plaintext);
        assert!(!hash.contains(password.expose()));
        assert!(credentials.verify(password.expose(), &hash));
        assert!(!credentials.verify("something-else", &hash));
    }
}

#[test]
fn shape_rules() {
    assert!(CredentialStore::validate_shape("Password123").is_err());
    assert!(CredentialStore::validate_shape("short").is_err());
    assert!(CredentialStore::validate_shape("a-valid-pw").is_ok());
    assert!(CredentialStore::validate_shape("   six6   ").is_err());
}

#[tokio::test]
async fn registered_record_stores_only_the_hash() -> Result<()> {
    let harness = TestHarness::new()?;
    let view = harness.register("  Ada  ", " Ada@Example.com ").await?;

    assert_eq!(view.name, "Ada");
    assert_eq!(view.email, "ada@example.com");
    assert_eq!(view.age, 0);

    let stored = harness.identities.find_by_id(view.id).await?.unwrap();
    assert!(!stored.password_hash().is_empty());
    assert_ne!(stored.password_hash(), TEST_PASSWORD);
    assert!(stored.password_hash().starts_with("$argon2id$"));
    assert!(stored.tokens().is_empty());
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_rejected_case_insensitively() -> Result<()> {
    let harness = TestHarness::new()?;
    harness.register("First", "dup@example.com").await?;

    let err = harness
        .register("Second", "  DUP@example.COM")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IdentityError>(),
        Some(IdentityError::DuplicateEmail)
    ));
    assert_eq!(harness.identities.len().await, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_claim_an_email_once() -> Result<()> {
    let harness = Arc::new(TestHarness::new()?);

    let attempts = (0..8).map(|n| {
        let harness = Arc::clone(&harness);
        async move {
            let request = NewIdentityRequest::new(
                format!("Racer {n}"),
                "race@example.com",
                TEST_PASSWORD,
            );
            harness.service.register(&request).await
        }
    });
    let results = join_all(attempts).await;

    let created = results.iter().filter(|result| result.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|result| matches!(result, Err(IdentityError::DuplicateEmail)))
        .count();

    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);
    Ok(())
}

#[tokio::test]
async fn invalid_fields_are_reported_per_field() -> Result<()> {
    let harness = TestHarness::new()?;

    let cases = [
        (NewIdentityRequest::new("   ", "a@example.com", TEST_PASSWORD), Field::Name),
        (NewIdentityRequest::new("Ada", "not-an-email", TEST_PASSWORD), Field::Email),
        (NewIdentityRequest::new("Ada", "a@example.com", "MyPassWord!"), Field::Password),
        (NewIdentityRequest::new("Ada", "a@example.com", "tiny"), Field::Password),
        (
            NewIdentityRequest::new("Ada", "a@example.com", TEST_PASSWORD).with_age(-1),
            Field::Age,
        ),
    ];

    for (request, field) in cases {
        let err = harness.service.register(&request).await.unwrap_err();
        assert_eq!(err.field(), Some(field), "{request:?}");
    }
    assert!(harness.identities.is_empty().await);
    Ok(())
}
