mod common;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use common::{
    actor, post_request, seed_category, seed_post, seed_user, state_with, test_repo_file,
    test_state,
};
use rentx_api::{
    errors::AppError,
    handlers::{self, PostFilter},
    lifecycle::{LifecycleError, PostStatus},
    models::{
        CategoryRequest, CreateOrderRequest, CreateReviewRequest, EmailAuthRequest, OAuthRequest,
        PhoneAuthRequest, PostStatusRequest, RefreshTokenRequest, UpdatePostRequest,
        UpdateReviewRequest, UpdateRoleRequest,
    },
    policy::{PolicyError, Role},
    repository::RepositoryState,
};

// --- Auth flows ---

#[tokio::test]
async fn test_email_auth_signs_up_then_logs_in() {
    let state = test_state().await;

    let Json(signup) = handlers::email_auth(
        State(state.clone()),
        Json(EmailAuthRequest {
            email: "Sam@Example.com".to_string(),
            password: "hunter22".to_string(),
            name: Some("Sam".to_string()),
            ..Default::default()
        }),
    )
    .await
    .expect("signup succeeds");

    assert_eq!(signup.role, Role::User);
    assert_eq!(signup.email.as_deref(), Some("sam@example.com"));
    assert!(!signup.token.is_empty());
    assert!(!signup.refresh_token.is_empty());

    let Json(login) = handlers::email_auth(
        State(state.clone()),
        Json(EmailAuthRequest {
            email: "sam@example.com".to_string(),
            password: "hunter22".to_string(),
            ..Default::default()
        }),
    )
    .await
    .expect("login succeeds");
    assert_eq!(login.id, signup.id);
    assert_ne!(login.refresh_token, signup.refresh_token);

    let wrong = handlers::email_auth(
        State(state),
        Json(EmailAuthRequest {
            email: "sam@example.com".to_string(),
            password: "wrong".to_string(),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(wrong, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_email_auth_rejects_blank_fields() {
    let state = test_state().await;
    let result = handlers::email_auth(
        State(state),
        Json(EmailAuthRequest {
            email: "   ".to_string(),
            password: "secret".to_string(),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_phone_auth_verifies_password_on_login() {
    let state = test_state().await;
    let request = |password: &str| PhoneAuthRequest {
        phone: "+353870000000".to_string(),
        password: password.to_string(),
        ..Default::default()
    };

    let Json(signup) = handlers::phone_auth(State(state.clone()), Json(request("pin-1234")))
        .await
        .expect("signup succeeds");
    assert_eq!(signup.name, "+353870000000");
    assert_eq!(signup.email, None);

    let again = handlers::phone_auth(State(state.clone()), Json(request("pin-1234"))).await;
    assert!(again.is_ok());

    let wrong = handlers::phone_auth(State(state), Json(request("pin-0000"))).await;
    assert!(matches!(wrong, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_oauth_account_cannot_log_in_with_password() {
    let state = test_state().await;

    let Json(first) = handlers::oauth_auth(
        State(state.clone()),
        Json(OAuthRequest {
            email: "olga@example.com".to_string(),
            ..Default::default()
        }),
    )
    .await
    .expect("oauth signup succeeds");
    assert_eq!(first.name, "olga");

    let Json(second) = handlers::oauth_auth(
        State(state.clone()),
        Json(OAuthRequest {
            email: "olga@example.com".to_string(),
            ..Default::default()
        }),
    )
    .await
    .expect("oauth login succeeds");
    assert_eq!(first.id, second.id);

    let password_login = handlers::email_auth(
        State(state),
        Json(EmailAuthRequest {
            email: "olga@example.com".to_string(),
            password: "anything".to_string(),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(password_login, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_refresh_and_logout() {
    let state = test_state().await;
    let Json(session) = handlers::oauth_auth(
        State(state.clone()),
        Json(OAuthRequest {
            email: "rita@example.com".to_string(),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    let Json(refreshed) = handlers::refresh_token(
        State(state.clone()),
        Json(RefreshTokenRequest {
            refresh_token: session.refresh_token.clone(),
        }),
    )
    .await
    .expect("refresh succeeds");
    assert_eq!(refreshed.id, session.id);
    assert_eq!(refreshed.refresh_token, session.refresh_token);

    handlers::logout(
        State(state.clone()),
        Json(RefreshTokenRequest {
            refresh_token: session.refresh_token.clone(),
        }),
    )
    .await
    .unwrap();

    let revoked = handlers::refresh_token(
        State(state),
        Json(RefreshTokenRequest {
            refresh_token: session.refresh_token,
        }),
    )
    .await;
    assert!(matches!(revoked, Err(AppError::Unauthorized(_))));
}

// --- Posts & moderation ---

#[tokio::test]
async fn test_create_post_status_depends_on_role() {
    let state = test_state().await;
    let user = seed_user(state.repo.as_ref(), "uma", Role::User).await;
    let admin = seed_user(state.repo.as_ref(), "adam", Role::Admin).await;
    let category = seed_category(state.repo.as_ref(), &user, "Flats").await;

    let (code, Json(pending)) = handlers::create_post(
        actor(&user),
        State(state.clone()),
        Json(post_request(category.id, "Studio")),
    )
    .await
    .unwrap();
    assert_eq!(code, StatusCode::CREATED);
    assert_eq!(pending.status, PostStatus::Pending);

    let (_, Json(approved)) = handlers::create_post(
        actor(&admin),
        State(state),
        Json(post_request(category.id, "Penthouse")),
    )
    .await
    .unwrap();
    assert_eq!(approved.status, PostStatus::Approved);
}

#[tokio::test]
async fn test_create_post_validates_payload() {
    let state = test_state().await;
    let user = seed_user(state.repo.as_ref(), "vic", Role::User).await;
    let category = seed_category(state.repo.as_ref(), &user, "Flats").await;

    let blank_name = post_request(category.id, "  ");
    let result = handlers::create_post(actor(&user), State(state.clone()), Json(blank_name)).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let mut negative = post_request(category.id, "Cheap");
    negative.daily_price = -1.0;
    let result = handlers::create_post(actor(&user), State(state.clone()), Json(negative)).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let result = handlers::create_post(
        actor(&user),
        State(state),
        Json(post_request(category.id + 100, "Nowhere")),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_public_reads_only_see_approved_posts() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "walt", Role::User).await;
    let category = seed_category(state.repo.as_ref(), &owner, "Cars").await;
    let live = seed_post(state.repo.as_ref(), &owner, category.id, "Coupe", PostStatus::Approved).await;
    let queued = seed_post(state.repo.as_ref(), &owner, category.id, "Sedan", PostStatus::Pending).await;
    let refused = seed_post(state.repo.as_ref(), &owner, category.id, "Wreck", PostStatus::Rejected).await;

    let Json(listed) = handlers::list_posts(State(state.clone()), Query(PostFilter::default()))
        .await
        .unwrap();
    assert_eq!(listed.iter().map(|p| p.id).collect::<Vec<_>>(), vec![live.id]);

    assert!(handlers::get_post(State(state.clone()), Path(live.id)).await.is_ok());
    for hidden in [queued.id, refused.id] {
        let result = handlers::get_post(State(state.clone()), Path(hidden)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        let reviews = handlers::list_post_reviews(State(state.clone()), Path(hidden)).await;
        assert!(matches!(reviews, Err(AppError::NotFound(_))));
    }

    // The owner still sees every status.
    let Json(mine) = handlers::get_my_posts(actor(&owner), State(state)).await.unwrap();
    assert_eq!(mine.len(), 3);
}

#[tokio::test]
async fn test_list_posts_applies_query_filters() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "xena", Role::User).await;
    let flats = seed_category(state.repo.as_ref(), &owner, "Flats").await;
    let boats = seed_category(state.repo.as_ref(), &owner, "Boats").await;
    seed_post(state.repo.as_ref(), &owner, flats.id, "Harbour Flat", PostStatus::Approved).await;
    seed_post(state.repo.as_ref(), &owner, boats.id, "Harbour Yacht", PostStatus::Approved).await;

    let Json(boats_only) = handlers::list_posts(
        State(state.clone()),
        Query(PostFilter {
            category_id: Some(boats.id),
            search: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(boats_only.len(), 1);
    assert_eq!(boats_only[0].name, "Harbour Yacht");

    let Json(harbour) = handlers::list_posts(
        State(state),
        Query(PostFilter {
            category_id: None,
            search: Some("HARBOUR".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(harbour.len(), 2);
}

#[tokio::test]
async fn test_review_post_requires_moderator_and_happens_once() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "yuri", Role::User).await;
    let admin = seed_user(state.repo.as_ref(), "zoe", Role::Admin).await;
    let category = seed_category(state.repo.as_ref(), &owner, "Tools").await;
    let post = seed_post(state.repo.as_ref(), &owner, category.id, "Saw", PostStatus::Pending).await;

    let status = |s: &str| {
        Json(PostStatusRequest {
            status: s.to_string(),
        })
    };

    let denied =
        handlers::review_post(actor(&owner), State(state.clone()), Path(post.id), status("approved"))
            .await;
    assert!(matches!(
        denied,
        Err(AppError::Forbidden(PolicyError::ModeratorRequired))
    ));

    let invalid =
        handlers::review_post(actor(&admin), State(state.clone()), Path(post.id), status("pending"))
            .await;
    assert!(matches!(
        invalid,
        Err(AppError::Lifecycle(LifecycleError::InvalidTarget(_)))
    ));

    let garbage =
        handlers::review_post(actor(&admin), State(state.clone()), Path(post.id), status("maybe"))
            .await;
    assert!(matches!(garbage, Err(AppError::BadRequest(_))));

    let Json(decided) =
        handlers::review_post(actor(&admin), State(state.clone()), Path(post.id), status("Rejected"))
            .await
            .unwrap();
    assert_eq!(decided.status, PostStatus::Rejected);

    let again =
        handlers::review_post(actor(&admin), State(state), Path(post.id), status("approved")).await;
    let err = again.expect_err("second decision must fail");
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_post_ownership_and_status_untouched() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "amy", Role::User).await;
    let stranger = seed_user(state.repo.as_ref(), "ben", Role::User).await;
    let admin = seed_user(state.repo.as_ref(), "cleo", Role::Admin).await;
    let category = seed_category(state.repo.as_ref(), &owner, "Flats").await;
    let post = seed_post(state.repo.as_ref(), &owner, category.id, "Attic", PostStatus::Pending).await;

    let change = || {
        Json(UpdatePostRequest {
            monthly_price: Some(1500.0),
            ..Default::default()
        })
    };

    let denied =
        handlers::update_post(actor(&stranger), State(state.clone()), Path(post.id), change()).await;
    assert!(matches!(denied, Err(AppError::Forbidden(PolicyError::NotOwner))));

    let Json(by_owner) =
        handlers::update_post(actor(&owner), State(state.clone()), Path(post.id), change())
            .await
            .unwrap();
    assert_eq!(by_owner.monthly_price, 1500.0);
    assert_eq!(by_owner.status, PostStatus::Pending);

    let by_admin =
        handlers::update_post(actor(&admin), State(state.clone()), Path(post.id), change()).await;
    assert!(by_admin.is_ok());

    let missing = handlers::update_post(actor(&owner), State(state), Path(9_999), change()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_update_post_stores_trimmed_text() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "gus", Role::User).await;
    let category = seed_category(state.repo.as_ref(), &owner, "Flats").await;
    let post = seed_post(state.repo.as_ref(), &owner, category.id, "Loft", PostStatus::Pending).await;

    let Json(updated) = handlers::update_post(
        actor(&owner),
        State(state.clone()),
        Path(post.id),
        Json(UpdatePostRequest {
            name: Some("  Flat  ".to_string()),
            address: Some(" 3 Quay Street\n".to_string()),
            description: Some("  Bright  ".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "Flat");
    assert_eq!(updated.address, "3 Quay Street");
    assert_eq!(updated.description, "Bright");

    let stored = state.repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Flat");

    let blank = handlers::update_post(
        actor(&owner),
        State(state),
        Path(post.id),
        Json(UpdatePostRequest {
            name: Some("   ".to_string()),
            ..Default::default()
        }),
    )
    .await;
    assert!(matches!(blank, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_delete_post_owner_or_admin() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "dina", Role::User).await;
    let stranger = seed_user(state.repo.as_ref(), "eli", Role::User).await;
    let admin = seed_user(state.repo.as_ref(), "fay", Role::Admin).await;
    let category = seed_category(state.repo.as_ref(), &owner, "Flats").await;
    let first = seed_post(state.repo.as_ref(), &owner, category.id, "One", PostStatus::Approved).await;
    let second = seed_post(state.repo.as_ref(), &owner, category.id, "Two", PostStatus::Approved).await;

    let denied = handlers::delete_post(actor(&stranger), State(state.clone()), Path(first.id)).await;
    assert!(denied.is_err());

    let code = handlers::delete_post(actor(&owner), State(state.clone()), Path(first.id))
        .await
        .unwrap();
    assert_eq!(code, StatusCode::NO_CONTENT);

    let code = handlers::delete_post(actor(&admin), State(state), Path(second.id))
        .await
        .unwrap();
    assert_eq!(code, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_pending_queue_is_moderator_only() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "gus", Role::User).await;
    let admin = seed_user(state.repo.as_ref(), "hal", Role::Superadmin).await;
    let category = seed_category(state.repo.as_ref(), &owner, "Flats").await;
    seed_post(state.repo.as_ref(), &owner, category.id, "Queued", PostStatus::Pending).await;
    seed_post(state.repo.as_ref(), &owner, category.id, "Live", PostStatus::Approved).await;

    assert!(
        handlers::list_pending_posts(actor(&owner), State(state.clone()))
            .await
            .is_err()
    );

    let Json(queue) = handlers::list_pending_posts(actor(&admin), State(state))
        .await
        .unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].name, "Queued");
}

// --- Categories ---

#[tokio::test]
async fn test_category_ownership() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "ida", Role::User).await;
    let stranger = seed_user(state.repo.as_ref(), "joe", Role::User).await;
    let admin = seed_user(state.repo.as_ref(), "kai", Role::Admin).await;

    let (code, Json(category)) = handlers::create_category(
        actor(&owner),
        State(state.clone()),
        Json(CategoryRequest {
            name: " Kayaks ".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(code, StatusCode::CREATED);
    assert_eq!(category.name, "Kayaks");

    let rename = |name: &str| {
        Json(CategoryRequest {
            name: name.to_string(),
        })
    };

    let denied = handlers::update_category(
        actor(&stranger),
        State(state.clone()),
        Path(category.id),
        rename("Canoes"),
    )
    .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let Json(renamed) = handlers::update_category(
        actor(&owner),
        State(state.clone()),
        Path(category.id),
        rename("Canoes"),
    )
    .await
    .unwrap();
    assert_eq!(renamed.name, "Canoes");

    let code = handlers::delete_category(actor(&admin), State(state.clone()), Path(category.id))
        .await
        .unwrap();
    assert_eq!(code, StatusCode::NO_CONTENT);

    let Json(all) = handlers::list_categories(State(state)).await.unwrap();
    assert!(all.is_empty());
}

// --- Orders & Reviews ---

#[tokio::test]
async fn test_orders_require_approved_post_and_ownership() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "lou", Role::User).await;
    let renter = seed_user(state.repo.as_ref(), "max", Role::User).await;
    let admin = seed_user(state.repo.as_ref(), "ned", Role::Admin).await;
    let category = seed_category(state.repo.as_ref(), &owner, "Bikes").await;
    let live = seed_post(state.repo.as_ref(), &owner, category.id, "BMX", PostStatus::Approved).await;
    let queued = seed_post(state.repo.as_ref(), &owner, category.id, "Fixie", PostStatus::Pending).await;

    let on_pending = handlers::create_order(
        actor(&renter),
        State(state.clone()),
        Json(CreateOrderRequest { post_id: queued.id }),
    )
    .await;
    assert!(matches!(on_pending, Err(AppError::NotFound(_))));

    let (code, Json(order)) = handlers::create_order(
        actor(&renter),
        State(state.clone()),
        Json(CreateOrderRequest { post_id: live.id }),
    )
    .await
    .unwrap();
    assert_eq!(code, StatusCode::CREATED);
    assert_eq!(order.user_id, renter.id);

    // The post owner is not the order owner.
    let peek = handlers::get_order(actor(&owner), State(state.clone()), Path(order.id)).await;
    assert!(matches!(peek, Err(AppError::Forbidden(_))));

    let Json(mine) = handlers::list_orders(actor(&renter), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    let Json(theirs) = handlers::list_orders(actor(&owner), State(state.clone()))
        .await
        .unwrap();
    assert!(theirs.is_empty());
    let Json(all) = handlers::list_orders(actor(&admin), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    let code = handlers::delete_order(actor(&admin), State(state), Path(order.id))
        .await
        .unwrap();
    assert_eq!(code, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_reviews_flow() {
    let state = test_state().await;
    let owner = seed_user(state.repo.as_ref(), "ola", Role::User).await;
    let guest = seed_user(state.repo.as_ref(), "pat", Role::User).await;
    let category = seed_category(state.repo.as_ref(), &owner, "Tents").await;
    let post = seed_post(state.repo.as_ref(), &owner, category.id, "Tipi", PostStatus::Approved).await;

    let empty = handlers::create_review(
        actor(&guest),
        State(state.clone()),
        Json(CreateReviewRequest {
            post_id: post.id,
            review: " ".to_string(),
        }),
    )
    .await;
    assert!(matches!(empty, Err(AppError::BadRequest(_))));

    let (_, Json(review)) = handlers::create_review(
        actor(&guest),
        State(state.clone()),
        Json(CreateReviewRequest {
            post_id: post.id,
            review: "Roomy".to_string(),
        }),
    )
    .await
    .unwrap();

    let hijack = handlers::update_review(
        actor(&owner),
        State(state.clone()),
        Path(review.id),
        Json(UpdateReviewRequest {
            review: "Terrible".to_string(),
        }),
    )
    .await;
    assert!(matches!(hijack, Err(AppError::Forbidden(_))));

    let Json(listed) = handlers::list_post_reviews(State(state.clone()), Path(post.id))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].review, "Roomy");

    let code = handlers::delete_review(actor(&guest), State(state), Path(review.id))
        .await
        .unwrap();
    assert_eq!(code, StatusCode::NO_CONTENT);
}

// --- Users ---

#[tokio::test]
async fn test_role_changes_are_superadmin_only() {
    let state = test_state().await;
    let superadmin = seed_user(state.repo.as_ref(), "root", Role::Superadmin).await;
    let admin = seed_user(state.repo.as_ref(), "mod", Role::Admin).await;
    let user = seed_user(state.repo.as_ref(), "quin", Role::User).await;

    let promote = || Json(UpdateRoleRequest { role: Role::Admin });

    let by_admin =
        handlers::update_user_role(actor(&admin), State(state.clone()), Path(user.id), promote())
            .await;
    assert!(matches!(
        by_admin,
        Err(AppError::Forbidden(PolicyError::SuperadminRequired))
    ));

    let demote_root = handlers::update_user_role(
        actor(&admin),
        State(state.clone()),
        Path(superadmin.id),
        Json(UpdateRoleRequest { role: Role::User }),
    )
    .await;
    assert!(demote_root.is_err());

    let Json(promoted) = handlers::update_user_role(
        actor(&superadmin),
        State(state.clone()),
        Path(user.id),
        promote(),
    )
    .await
    .unwrap();
    assert_eq!(promoted.role, Role::Admin);

    let own = handlers::update_user_role(
        actor(&superadmin),
        State(state),
        Path(superadmin.id),
        Json(UpdateRoleRequest { role: Role::User }),
    )
    .await;
    assert!(matches!(
        own,
        Err(AppError::Forbidden(PolicyError::SelfRoleChange))
    ));
}

#[tokio::test]
async fn test_delete_user_rules() {
    let state = test_state().await;
    let superadmin = seed_user(state.repo.as_ref(), "root", Role::Superadmin).await;
    let admin = seed_user(state.repo.as_ref(), "mod", Role::Admin).await;
    let user = seed_user(state.repo.as_ref(), "rex", Role::User).await;
    let other = seed_user(state.repo.as_ref(), "sue", Role::User).await;

    let by_user = handlers::delete_user(actor(&user), State(state.clone()), Path(other.id)).await;
    assert!(matches!(by_user, Err(AppError::Forbidden(_))));

    let on_root =
        handlers::delete_user(actor(&admin), State(state.clone()), Path(superadmin.id)).await;
    assert!(matches!(
        on_root,
        Err(AppError::Forbidden(PolicyError::SuperadminProtected))
    ));

    // The only superadmin cannot remove themself.
    let last = handlers::delete_user(actor(&superadmin), State(state.clone()), Path(superadmin.id))
        .await;
    assert!(matches!(last, Err(AppError::Conflict(_))));

    let code = handlers::delete_user(actor(&admin), State(state.clone()), Path(other.id))
        .await
        .unwrap();
    assert_eq!(code, StatusCode::NO_CONTENT);

    let code = handlers::delete_user(actor(&user), State(state.clone()), Path(user.id))
        .await
        .unwrap();
    assert_eq!(code, StatusCode::NO_CONTENT);

    assert!(state.repo.get_user(user.id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_superadmins_deleting_each_other_leave_one() {
    for round in 0..10 {
        let state = state_with(test_repo_file().await as RepositoryState);
        let left = seed_user(state.repo.as_ref(), "left", Role::Superadmin).await;
        let right = seed_user(state.repo.as_ref(), "right", Role::Superadmin).await;

        let (a, b) = tokio::join!(
            tokio::spawn(handlers::delete_user(
                actor(&left),
                State(state.clone()),
                Path(right.id),
            )),
            tokio::spawn(handlers::delete_user(
                actor(&right),
                State(state.clone()),
                Path(left.id),
            )),
        );

        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1, "round {round}");
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(AppError::Conflict(_))))
        );
        assert_eq!(state.repo.count_superadmins().await.unwrap(), 1);
    }
}

#[tokio::test]
async fn test_view_and_list_users() {
    let state = test_state().await;
    let admin = seed_user(state.repo.as_ref(), "tess", Role::Admin).await;
    let user = seed_user(state.repo.as_ref(), "ugo", Role::User).await;

    let Json(me) = handlers::get_me(actor(&user), State(state.clone())).await.unwrap();
    assert_eq!(me.id, user.id);

    let peek = handlers::get_user(actor(&user), State(state.clone()), Path(admin.id)).await;
    assert!(matches!(peek, Err(AppError::Forbidden(_))));

    let Json(viewed) = handlers::get_user(actor(&admin), State(state.clone()), Path(user.id))
        .await
        .unwrap();
    assert_eq!(viewed.email.as_deref(), Some("ugo@rentx.test"));

    assert!(handlers::list_users(actor(&user), State(state.clone())).await.is_err());
    let Json(everyone) = handlers::list_users(actor(&admin), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(everyone.len(), 2);

    let Json(stats) = handlers::get_admin_stats(actor(&admin), State(state))
        .await
        .unwrap();
    assert_eq!(stats.total_users, 2);
}
