//! End-to-end tests over HTTP
//!
//! Each test starts its own server on an ephemeral port, backed by the
//! in-process store and scripted collaborators.

use std::time::Duration;

use anyhow::Result;
use integration_tests::*;
use market_core::RuleVerdict;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn submit(server: &TestServer, buyer: i64) -> Result<SubmissionBody> {
    let response = server
        .post_as(buyer, "/api/v1/requests", &part_request("+234 803 000 0000"))
        .await?;
    assert_json(response, StatusCode::CREATED).await
}

async fn make_offer(server: &TestServer, seller: i64, request_id: &str, price: i64, fee: i64) -> Result<OfferBody> {
    let response = server
        .post_as(seller, &format!("/api/v1/requests/{request_id}/offers"), &offer(price, fee))
        .await?;
    assert_json(response, StatusCode::CREATED).await
}

async fn wait_for_event(server: &TestServer, event_type: &str) -> bool {
    for _ in 0..200 {
        if server.sink.count_of(event_type) > 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() -> Result<()> {
    let server = TestServer::start().await?;

    let health: Value = assert_json(server.get("/health").await?, StatusCode::OK).await?;
    assert_eq!(health["status"], "healthy");

    let ready: Value = assert_json(server.get("/health/ready").await?, StatusCode::OK).await?;
    assert_eq!(ready["status"], "ready");
    assert_eq!(ready["checks"]["store"], "healthy");
    Ok(())
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_requests_require_a_valid_token() -> Result<()> {
    let server = TestServer::start().await?;

    let missing = server.get("/api/v1/requests").await?;
    assert_eq!(assert_error(missing, StatusCode::UNAUTHORIZED).await?, "MISSING_AUTHORIZATION");

    let forged = server
        .client
        .get(server.url("/api/v1/requests"))
        .bearer_auth("not-a-token")
        .send()
        .await?;
    assert_eq!(assert_error(forged, StatusCode::UNAUTHORIZED).await?, "INVALID_TOKEN");
    Ok(())
}

// ============================================================================
// Submission and moderation
// ============================================================================

#[tokio::test]
async fn test_clean_submission_is_admitted() -> Result<()> {
    let server = TestServer::start().await?;

    let submission = submit(&server, BUYER).await?;
    assert_eq!(submission.request.status, "pending");
    assert_eq!(submission.moderation.verdict, "allow");
    assert!(!submission.moderation.requires_review);
    assert_eq!(submission.request.buyer_id, BUYER.to_string());
    server.settle().await;
    assert_eq!(server.sink.count_of("request_admitted"), 1);

    // Sellers see the open request but not the phone number
    let open: Vec<RequestBody> = assert_json(server.get_as(SELLER, "/api/v1/requests").await?, StatusCode::OK).await?;
    assert_eq!(open.len(), 1);
    assert!(open[0].phone.is_none());

    let own: RequestBody = assert_json(
        server
            .get_as(BUYER, &format!("/api/v1/requests/{}", submission.request.id))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert!(own.phone.is_some());
    Ok(())
}

#[tokio::test]
async fn test_invalid_submission_reports_fields() -> Result<()> {
    let server = TestServer::start().await?;

    let mut body = part_request("+234 803 000 0000");
    body["car_year"] = json!(1800);
    body["car_make"] = json!("");

    let response = server.post_as(BUYER, "/api/v1/requests", &body).await?;
    let error: Value = assert_json(response, StatusCode::BAD_REQUEST).await?;
    assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    assert!(error["error"]["details"]["car_year"].is_array());
    assert!(error["error"]["details"]["car_make"].is_array());
    Ok(())
}

#[tokio::test]
async fn test_blocked_phone_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;

    let response = server
        .post_as(BUYER, "/api/v1/requests", &part_request(BLOCKED_PHONE))
        .await?;
    assert_eq!(
        assert_error(response, StatusCode::UNPROCESSABLE_ENTITY).await?,
        "MODERATION_BLOCKED"
    );
    server.settle().await;
    assert_eq!(server.sink.count_of("request_admitted"), 0);
    Ok(())
}

#[tokio::test]
async fn test_spam_rules_outage_fails_closed() -> Result<()> {
    let server = TestServer::start().await?;
    server.collaborators.spam.go_down();

    let response = server
        .post_as(BUYER, "/api/v1/requests", &part_request("+234 803 000 0000"))
        .await?;
    assert_eq!(
        assert_error(response, StatusCode::SERVICE_UNAVAILABLE).await?,
        "DEPENDENCY_UNAVAILABLE"
    );

    let mine: Vec<RequestBody> =
        assert_json(server.get_as(BUYER, "/api/v1/users/@me/requests").await?, StatusCode::OK).await?;
    assert!(mine.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_flagged_request_goes_through_admin_review() -> Result<()> {
    let server = TestServer::start().await?;
    server
        .collaborators
        .spam
        .answer(RuleVerdict::Uncertain("velocity".into()));
    server.collaborators.reviewer.always(None);

    let submission = submit(&server, BUYER).await?;
    assert_eq!(submission.request.status, "pending_review");
    assert_eq!(submission.moderation.verdict, "flag_for_review");
    assert!(submission.moderation.requires_review);

    // Reviewer never answers, so the review stalls and admins hear about it
    assert!(wait_for_event(&server, "review_stalled").await);
    assert!(server.collaborators.reviewer.calls() >= 3);

    // Flagged requests are not open to sellers
    let open: Vec<RequestBody> = assert_json(server.get_as(SELLER, "/api/v1/requests").await?, StatusCode::OK).await?;
    assert!(open.is_empty());

    let denied = server.get_as(SELLER, "/api/v1/admin/requests/review").await?;
    assert_eq!(assert_error(denied, StatusCode::FORBIDDEN).await?, "FORBIDDEN");

    let queue: Vec<RequestBody> =
        assert_json(server.get_as(ADMIN_ID, "/api/v1/admin/requests/review").await?, StatusCode::OK).await?;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, submission.request.id);

    let path = format!("/api/v1/admin/requests/{}/review", submission.request.id);
    let resolved: ResolutionBody = assert_json(
        server.post_as(ADMIN_ID, &path, &json!({ "approve": true })).await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(resolved.outcome, "approved");
    assert_eq!(resolved.request.status, "pending");
    assert!(resolved.request.phone.is_none());

    // A second resolution finds nothing left to review
    let again = server.post_as(ADMIN_ID, &path, &json!({ "approve": false })).await?;
    assert_eq!(assert_error(again, StatusCode::CONFLICT).await?, "INVALID_STATE");
    Ok(())
}

// ============================================================================
// Offers, completion, ratings and payments
// ============================================================================

#[tokio::test]
async fn test_accepting_an_offer_rejects_the_rest() -> Result<()> {
    let server = TestServer::start().await?;
    let request = submit(&server, BUYER).await?.request;

    let first = make_offer(&server, SELLER, &request.id, 100, 0).await?;
    let second = make_offer(&server, OTHER_SELLER, &request.id, 80, 0).await?;
    assert_eq!(first.status, "pending");
    assert_eq!(first.request_id, request.id);
    server.settle().await;
    assert_eq!(server.sink.count_of("offer_submitted"), 2);

    // Buyers cannot offer on their own request
    let own = server
        .post_as(BUYER, &format!("/api/v1/requests/{}/offers", request.id), &offer(50, 0))
        .await?;
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);

    // Only the buyer accepts
    let hijack = server
        .post_empty_as(SELLER, &format!("/api/v1/offers/{}/accept", first.id))
        .await?;
    assert_eq!(hijack.status(), StatusCode::FORBIDDEN);

    let acceptance: AcceptanceBody = assert_json(
        server
            .post_empty_as(BUYER, &format!("/api/v1/offers/{}/accept", first.id))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(acceptance.offer.status, "accepted");
    assert_eq!(acceptance.rejected_offer_ids, vec![second.id.clone()]);

    let offers: Vec<OfferBody> = assert_json(
        server
            .get_as(BUYER, &format!("/api/v1/requests/{}/offers", request.id))
            .await?,
        StatusCode::OK,
    )
    .await?;
    let status_of = |id: &str| {
        offers
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.status.clone())
            .unwrap_or_default()
    };
    assert_eq!(status_of(&first.id), "accepted");
    assert_eq!(status_of(&second.id), "rejected");

    let matched: RequestBody = assert_json(
        server
            .get_as(BUYER, &format!("/api/v1/requests/{}", request.id))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(matched.status, "matched");

    // The losing offer cannot be accepted afterwards
    let late = server
        .post_empty_as(BUYER, &format!("/api/v1/offers/{}/accept", second.id))
        .await?;
    assert_eq!(late.status(), StatusCode::CONFLICT);

    // Matched requests are visible to offerers only
    let seller_view = server
        .get_as(OTHER_SELLER, &format!("/api/v1/requests/{}", request.id))
        .await?;
    assert_eq!(seller_view.status(), StatusCode::OK);
    let stranger_view = server
        .get_as(STRANGER, &format!("/api/v1/requests/{}", request.id))
        .await?;
    assert_eq!(stranger_view.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_completion_then_rating() -> Result<()> {
    let server = TestServer::start().await?;
    let request = submit(&server, BUYER).await?.request;
    let accepted = make_offer(&server, SELLER, &request.id, 120, 0).await?;
    server
        .post_empty_as(BUYER, &format!("/api/v1/offers/{}/accept", accepted.id))
        .await?;

    let rating_path = format!("/api/v1/offers/{}/ratings", accepted.id);

    // Not completed yet
    let early = server
        .post_as(BUYER, &rating_path, &json!({ "rating": 5 }))
        .await?;
    assert_eq!(early.status(), StatusCode::CONFLICT);

    let completed: RequestBody = assert_json(
        server
            .post_empty_as(BUYER, &format!("/api/v1/requests/{}/complete", request.id))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(completed.status, "completed");
    server.settle().await;
    assert_eq!(server.sink.count_of("request_completed"), 1);

    let twice = server
        .post_empty_as(BUYER, &format!("/api/v1/requests/{}/complete", request.id))
        .await?;
    assert_eq!(assert_error(twice, StatusCode::CONFLICT).await?, "INVALID_STATE");

    let out_of_range = server
        .post_as(BUYER, &rating_path, &json!({ "rating": 6 }))
        .await?;
    assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);

    let rating: RatingBody = assert_json(
        server
            .post_as(BUYER, &rating_path, &json!({ "rating": 4, "comment": "fast delivery" }))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    assert_eq!(rating.rating, 4);
    assert_eq!(rating.offer_id, accepted.id);

    let duplicate = server
        .post_as(BUYER, &rating_path, &json!({ "rating": 2 }))
        .await?;
    assert_eq!(assert_error(duplicate, StatusCode::CONFLICT).await?, "RATING_EXISTS");

    let ratings: Vec<RatingBody> = assert_json(server.get_as(SELLER, &rating_path).await?, StatusCode::OK).await?;
    assert_eq!(ratings.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_contact_unlock_payment() -> Result<()> {
    let server = TestServer::start().await?;
    let request = submit(&server, BUYER).await?.request;
    let accepted = make_offer(&server, SELLER, &request.id, 300, 500).await?;
    assert_eq!(accepted.contact_unlock_fee, 500);
    let payment_path = format!("/api/v1/offers/{}/payments", accepted.id);

    // Paying before acceptance is refused
    let early = server
        .post_as(BUYER, &payment_path, &json!({ "reference": "pay-1", "amount": 500 }))
        .await?;
    assert_eq!(early.status(), StatusCode::CONFLICT);

    server
        .post_empty_as(BUYER, &format!("/api/v1/offers/{}/accept", accepted.id))
        .await?;

    let wrong_amount = server
        .post_as(BUYER, &payment_path, &json!({ "reference": "pay-1", "amount": 499 }))
        .await?;
    assert_eq!(wrong_amount.status(), StatusCode::BAD_REQUEST);

    server.collaborators.verifier.answer(false);
    let unverified = server
        .post_as(BUYER, &payment_path, &json!({ "reference": "pay-1", "amount": 500 }))
        .await?;
    assert_eq!(
        assert_error(unverified, StatusCode::UNPROCESSABLE_ENTITY).await?,
        "PAYMENT_REJECTED"
    );

    server.collaborators.verifier.answer(true);
    let payment: PaymentBody = assert_json(
        server
            .post_as(BUYER, &payment_path, &json!({ "reference": "pay-1", "amount": 500 }))
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    assert_eq!(payment.status, "confirmed");
    assert_eq!(payment.amount, 500);
    assert_eq!(payment.reference, "pay-1");
    server.settle().await;
    assert_eq!(server.sink.count_of("payment_confirmed"), 1);

    let replay = server
        .post_as(BUYER, &payment_path, &json!({ "reference": "pay-2", "amount": 500 }))
        .await?;
    assert_eq!(replay.status(), StatusCode::CONFLICT);

    let payments: Vec<PaymentBody> =
        assert_json(server.get_as(SELLER, &payment_path).await?, StatusCode::OK).await?;
    assert_eq!(payments.len(), 1);

    let outsider = server.get_as(STRANGER, &payment_path).await?;
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);
    Ok(())
}

// ============================================================================
// Chat
// ============================================================================

#[tokio::test]
async fn test_chat_unread_and_mark_read() -> Result<()> {
    let server = TestServer::start().await?;
    let request = submit(&server, BUYER).await?.request;

    let first: SentBody = assert_json(
        server
            .post_as(
                BUYER,
                "/api/v1/chats/messages",
                &json!({
                    "recipient_id": SELLER.to_string(),
                    "part_id": request.id,
                    "content": "Is it original?",
                    "client_id": "777001"
                }),
            )
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    assert!(!first.duplicate);
    assert_eq!(first.chat.buyer_id, BUYER.to_string());
    assert_eq!(first.chat.seller_id, SELLER.to_string());
    assert_eq!(first.chat.part_id.as_deref(), Some(request.id.as_str()));
    assert_eq!(first.message.id, "777001");

    // Retrying with the same client id does not post twice
    let retry: SentBody = assert_json(
        server
            .post_as(
                BUYER,
                "/api/v1/chats/messages",
                &json!({
                    "recipient_id": SELLER.to_string(),
                    "part_id": request.id,
                    "content": "Is it original?",
                    "client_id": "777001"
                }),
            )
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    assert!(retry.duplicate);
    assert_eq!(retry.chat.id, first.chat.id);

    // A reply from the seller lands in the same chat
    let reply: SentBody = assert_json(
        server
            .post_as(
                SELLER,
                "/api/v1/chats/messages",
                &json!({
                    "recipient_id": BUYER.to_string(),
                    "part_id": request.id,
                    "content": "Yes, genuine part"
                }),
            )
            .await?,
        StatusCode::CREATED,
    )
    .await?;
    assert_eq!(reply.chat.id, first.chat.id);
    assert_eq!(reply.message.sender_id, SELLER.to_string());
    server.settle().await;
    assert_eq!(server.sink.count_of("message_received"), 2);

    let buyer_chats: Vec<ChatBody> = assert_json(server.get_as(BUYER, "/api/v1/chats").await?, StatusCode::OK).await?;
    assert_eq!(buyer_chats.len(), 1);
    assert_eq!(buyer_chats[0].unread_count, 1);
    assert_eq!(buyer_chats[0].last_message.as_deref(), Some("Yes, genuine part"));

    let messages_path = format!("/api/v1/chats/{}/messages", first.chat.id);
    let messages: Vec<MessageBody> = assert_json(server.get_as(BUYER, &messages_path).await?, StatusCode::OK).await?;
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().any(|m| m.content == "Is it original?"));

    let outsider = server.get_as(STRANGER, &messages_path).await?;
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);

    let marked: MarkReadBody = assert_json(
        server
            .post_empty_as(BUYER, &format!("/api/v1/chats/{}/read", first.chat.id))
            .await?,
        StatusCode::OK,
    )
    .await?;
    assert_eq!(marked.marked, 1);

    let buyer_chats: Vec<ChatBody> = assert_json(server.get_as(BUYER, "/api/v1/chats").await?, StatusCode::OK).await?;
    assert_eq!(buyer_chats[0].unread_count, 0);

    let seller_chats: Vec<ChatBody> = assert_json(server.get_as(SELLER, "/api/v1/chats").await?, StatusCode::OK).await?;
    assert_eq!(seller_chats[0].unread_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_cannot_message_yourself() -> Result<()> {
    let server = TestServer::start().await?;

    let response = server
        .post_as(
            BUYER,
            "/api/v1/chats/messages",
            &json!({ "recipient_id": BUYER.to_string(), "content": "hello me" }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

// ============================================================================
// Dashboard
// ============================================================================

#[tokio::test]
async fn test_dashboard_stats() -> Result<()> {
    let server = TestServer::start().await?;
    let first = submit(&server, BUYER).await?.request;
    submit(&server, BUYER).await?;
    let accepted = make_offer(&server, SELLER, &first.id, 90, 0).await?;
    server
        .post_empty_as(BUYER, &format!("/api/v1/offers/{}/accept", accepted.id))
        .await?;

    let buyer: StatsBody =
        assert_json(server.get_as(BUYER, "/api/v1/users/@me/stats").await?, StatusCode::OK).await?;
    assert!(!buyer.stale);
    assert_eq!(buyer.requests_by_status.get("pending").copied(), Some(1));
    assert_eq!(buyer.requests_by_status.get("matched").copied(), Some(1));
    assert_eq!(buyer.unread_messages, 0);

    let seller: StatsBody =
        assert_json(server.get_as(SELLER, "/api/v1/users/@me/stats").await?, StatusCode::OK).await?;
    assert_eq!(seller.offers_by_status.get("accepted").copied(), Some(1));

    let mine: Vec<OfferBody> =
        assert_json(server.get_as(SELLER, "/api/v1/users/@me/offers").await?, StatusCode::OK).await?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].supplier_id, SELLER.to_string());
    assert_eq!(mine[0].price, 90);

    // With the store down the last snapshot is still served
    server.store.set_offline(true);
    let cached: StatsBody =
        assert_json(server.get_as(BUYER, "/api/v1/users/@me/stats").await?, StatusCode::OK).await?;
    assert!(cached.stale);
    assert_eq!(cached.requests_by_status.get("pending").copied(), Some(1));
    Ok(())
}
