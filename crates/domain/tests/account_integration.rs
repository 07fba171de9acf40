//! Integration tests for account provisioning and deprovisioning.

use std::sync::Arc;

use chrono::Duration;
use common::{
    Comment, LineItem, Money, Order, PriceBreakdown, Product, ProductId, Reply, ShippingAddress,
    UserId,
};
use domain::{
    AccountError, AccountService, AuthError, CredentialHasher, ErrorKind, HmacTokenIssuer,
    OrderService, PlaceOrder, RegisterAccount, TokenIssuer, TokenKind,
};
use secrecy::SecretString;
use store::{InMemoryStore, Store, Transaction, TransactionCoordinator};

/// Reversible stand-in for a real hasher so tests stay fast.
struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, AuthError> {
        Ok(hash.strip_prefix("plain:") == Some(password))
    }
}

fn issuer() -> Arc<HmacTokenIssuer> {
    Arc::new(HmacTokenIssuer::new(
        SecretString::from("access-secret".to_string()),
        SecretString::from("refresh-secret".to_string()),
        Duration::hours(1),
        Duration::days(30),
    ))
}

fn create_service(store: InMemoryStore) -> AccountService<InMemoryStore> {
    AccountService::new(store, Arc::new(PlainHasher), issuer())
}

async fn register(service: &AccountService<InMemoryStore>, name: &str, email: &str) -> UserId {
    service
        .register(RegisterAccount::new(name, email, "pw"))
        .await
        .unwrap()
        .profile
        .id
}

async fn place_order(store: &InMemoryStore, user_id: UserId) {
    let product = Product::new("Widget", Money::from_cents(100), 10);
    store.save_product(&product).await.unwrap();
    OrderService::new(store.clone())
        .create_order(PlaceOrder::new(
            user_id,
            vec![LineItem::new(product.id, "Widget", 1, product.price)],
            ShippingAddress {
                address: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                postal_code: "12345".to_string(),
                country: "US".to_string(),
            },
            "PayPal",
            PriceBreakdown::default(),
        ))
        .await
        .unwrap();
}

/// Stores an order that was already disabled, bypassing placement.
async fn insert_disabled_order(store: &InMemoryStore, user_id: UserId) {
    let mut order = Order::new(
        user_id,
        vec![LineItem::new(ProductId::new(), "Widget", 1, Money::from_cents(100))],
        ShippingAddress {
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
        },
        "PayPal",
        PriceBreakdown::default(),
    );
    order.is_disabled = true;

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    tx.commit().await.unwrap();
}

mod registration {
    use super::*;

    #[tokio::test]
    async fn creates_user_cart_and_refresh_token() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());

        let session = service
            .register(RegisterAccount::new("A", "a@x.com", "pw"))
            .await
            .unwrap();

        let user_id = session.profile.id;
        assert_eq!(session.profile.avatar_url, common::DEFAULT_AVATAR_URL);
        assert_eq!(
            issuer().verify_access(&session.tokens.access_token).unwrap(),
            user_id
        );
        assert_eq!(
            issuer()
                .verify(&session.tokens.refresh_token, TokenKind::Refresh)
                .unwrap(),
            user_id
        );

        let user = store.get_user(user_id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "plain:pw");
        let cart = store.get_cart_for_user(user_id).await.unwrap().unwrap();
        assert!(cart.items.is_empty());
        let tokens = store.get_refresh_tokens_for_user(user_id).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_value, session.tokens.refresh_token);
    }

    #[tokio::test]
    async fn second_registration_with_same_email_fails() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());

        register(&service, "A", "a@x.com").await;
        let err = service
            .register(RegisterAccount::new("B", "a@x.com", "pw2"))
            .await
            .unwrap_err();

        assert!(matches!(err, AccountError::DuplicateEmail));
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.cart_count().await, 1);
    }

    #[tokio::test]
    async fn email_comparison_is_case_sensitive() {
        let service = create_service(InMemoryStore::new());

        register(&service, "A", "a@x.com").await;
        register(&service, "B", "A@x.com").await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_at_most_one_succeeds() {
        let store = InMemoryStore::new();
        let service = Arc::new(create_service(store.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .register(RegisterAccount::new(format!("U{i}"), "same@x.com", "pw"))
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::DuplicateEmail),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(store.user_count().await, 1);
        assert_eq!(store.cart_count().await, 1);
    }

    #[tokio::test]
    async fn failed_cart_insert_leaves_no_user() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        store.set_fail_on_cart_insert(true);

        let err = service
            .register(RegisterAccount::new("A", "a@x.com", "pw"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(store.user_count().await, 0);
        assert_eq!(store.cart_count().await, 0);
        assert!(store.find_active_user_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());

        let err = service
            .register(RegisterAccount::new("A", "no-at-sign", "pw"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.user_count().await, 0);
    }
}

mod login {
    use super::*;

    #[tokio::test]
    async fn replaces_previous_refresh_tokens() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;

        let session = service.login("a@x.com", "pw").await.unwrap();

        assert_eq!(session.profile.id, user_id);
        let tokens = store.get_refresh_tokens_for_user(user_id).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_value, session.tokens.refresh_token);
    }

    #[tokio::test]
    async fn wrong_password_or_unknown_email_is_unauthorized() {
        let service = create_service(InMemoryStore::new());
        register(&service, "A", "a@x.com").await;

        for (email, password) in [("a@x.com", "wrong"), ("nobody@x.com", "pw")] {
            let err = service.login(email, password).await.unwrap_err();
            assert!(matches!(err, AccountError::InvalidCredentials));
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }
    }

    #[tokio::test]
    async fn disabled_user_cannot_sign_in() {
        let service = create_service(InMemoryStore::new());
        let user_id = register(&service, "A", "a@x.com").await;
        service.disable_user(user_id).await.unwrap();

        assert!(matches!(
            service.login("a@x.com", "pw").await,
            Err(AccountError::InvalidCredentials)
        ));
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn removes_user_cart_comments_and_tokens() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;
        let other = register(&service, "B", "b@x.com").await;

        let product_id = ProductId::new();
        let own = Comment::new(user_id, product_id, "Great", 5);
        let replied = Comment::new(other, product_id, "Meh", 2)
            .with_reply(Reply::new(user_id, product_id, "Disagree"));
        store.save_comment(&own).await.unwrap();
        store.save_comment(&replied).await.unwrap();

        service.delete_user(user_id).await.unwrap();

        assert!(store.get_user(user_id).await.unwrap().is_none());
        assert!(store.get_cart_for_user(user_id).await.unwrap().is_none());
        assert!(store.get_comment(own.id).await.unwrap().is_none());
        assert!(
            store
                .get_comment(replied.id)
                .await
                .unwrap()
                .unwrap()
                .replies
                .is_empty()
        );
        assert!(
            store
                .get_refresh_tokens_for_user(user_id)
                .await
                .unwrap()
                .is_empty()
        );
        // The other account is untouched.
        assert!(store.get_cart_for_user(other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let service = create_service(InMemoryStore::new());
        let err = service.delete_user(UserId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn user_with_orders_is_kept() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;
        place_order(&store, user_id).await;

        let err = service.delete_user(user_id).await.unwrap_err();

        assert!(matches!(err, AccountError::HasOrders(id) if id == user_id));
        let user = store.get_user(user_id).await.unwrap().unwrap();
        assert!(user.is_active());
        assert!(store.get_cart_for_user(user_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn disabled_orders_do_not_block_deletion() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;
        insert_disabled_order(&store, user_id).await;

        service.delete_user(user_id).await.unwrap();

        assert!(store.get_user(user_id).await.unwrap().is_none());
        assert!(store.get_cart_for_user(user_id).await.unwrap().is_none());
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn missing_cart_is_an_internal_consistency_error() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;

        let mut tx = store.begin().await.unwrap();
        tx.delete_cart_for_user(user_id).await.unwrap();
        tx.commit().await.unwrap();

        let err = service.delete_user(user_id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InternalConsistency);
        // The aborted transaction kept the user.
        assert!(store.get_user(user_id).await.unwrap().is_some());
    }
}

mod soft_delete {
    use super::*;

    async fn seeded_product(store: &InMemoryStore, disabled: bool) -> ProductId {
        let mut product = Product::new("Widget", Money::from_cents(100), 1);
        product.is_disabled = disabled;
        store.save_product(&product).await.unwrap();
        product.id
    }

    #[tokio::test]
    async fn disable_hides_comments_and_restore_rederives() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;
        let other = register(&service, "B", "b@x.com").await;

        let live = seeded_product(&store, false).await;
        let dead = seeded_product(&store, true).await;
        let on_live = Comment::new(user_id, live, "Great", 5);
        let on_dead = Comment::new(user_id, dead, "Gone", 1);
        let thread = Comment::new(other, live, "Hmm", 3)
            .with_reply(Reply::new(user_id, live, "Yes"));
        for comment in [&on_live, &on_dead, &thread] {
            store.save_comment(comment).await.unwrap();
        }

        let profile = service.disable_user(user_id).await.unwrap();
        assert!(profile.is_disabled);
        assert!(store.get_comment(on_live.id).await.unwrap().unwrap().is_disabled);
        assert!(store.get_comment(on_dead.id).await.unwrap().unwrap().is_disabled);
        let reloaded = store.get_comment(thread.id).await.unwrap().unwrap();
        assert!(!reloaded.is_disabled);
        assert!(reloaded.replies[0].is_disabled);

        let profile = service.restore_user(user_id).await.unwrap();
        assert!(!profile.is_disabled);
        assert!(!store.get_comment(on_live.id).await.unwrap().unwrap().is_disabled);
        assert!(store.get_comment(on_dead.id).await.unwrap().unwrap().is_disabled);
        let reloaded = store.get_comment(thread.id).await.unwrap().unwrap();
        assert!(!reloaded.replies[0].is_disabled);
    }

    #[tokio::test]
    async fn disable_is_guarded_by_orders() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;
        place_order(&store, user_id).await;

        let err = service.disable_user(user_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HasOrders);
        assert!(store.get_user(user_id).await.unwrap().unwrap().is_active());
    }

    #[tokio::test]
    async fn disabled_orders_do_not_block_disable() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;
        insert_disabled_order(&store, user_id).await;

        let profile = service.disable_user(user_id).await.unwrap();

        assert!(profile.is_disabled);
    }

    #[tokio::test]
    async fn restore_leaves_visible_comments_visible() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());
        let user_id = register(&service, "A", "a@x.com").await;
        service.disable_user(user_id).await.unwrap();

        let live = seeded_product(&store, false).await;
        let dead = seeded_product(&store, true).await;
        // Saved after the disable, so the comment is visible and only the reply hidden.
        let mut reply = Reply::new(user_id, live, "Still true");
        reply.is_disabled = true;
        let comment = Comment::new(user_id, dead, "Great", 5).with_reply(reply);
        store.save_comment(&comment).await.unwrap();

        service.restore_user(user_id).await.unwrap();

        let reloaded = store.get_comment(comment.id).await.unwrap().unwrap();
        assert!(!reloaded.is_disabled);
        assert!(!reloaded.replies[0].is_disabled);
    }

    #[tokio::test]
    async fn disable_twice_and_restore_active_are_not_found() {
        let service = create_service(InMemoryStore::new());
        let user_id = register(&service, "A", "a@x.com").await;

        assert_eq!(
            service.restore_user(user_id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        service.disable_user(user_id).await.unwrap();
        assert_eq!(
            service.disable_user(user_id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn restore_refuses_taken_email_and_name() {
        let service = create_service(InMemoryStore::new());

        let first = register(&service, "A", "a@x.com").await;
        service.disable_user(first).await.unwrap();
        register(&service, "B", "a@x.com").await;
        assert!(matches!(
            service.restore_user(first).await,
            Err(AccountError::DuplicateEmail)
        ));

        let second = register(&service, "C", "c@x.com").await;
        service.disable_user(second).await.unwrap();
        register(&service, "C", "other@x.com").await;
        assert!(matches!(
            service.restore_user(second).await,
            Err(AccountError::DuplicateName)
        ));
    }

    #[tokio::test]
    async fn disabled_email_can_be_registered_again() {
        let store = InMemoryStore::new();
        let service = create_service(store.clone());

        let first = register(&service, "A", "a@x.com").await;
        service.disable_user(first).await.unwrap();
        let second = register(&service, "A2", "a@x.com").await;

        assert_ne!(first, second);
        assert_eq!(store.user_count().await, 2);
    }
}
