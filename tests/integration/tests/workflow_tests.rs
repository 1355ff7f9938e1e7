//! Service-level workflows that need concurrency or live views

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use integration_tests::*;
use market_core::{OfferStatus, RequestDraft, RequestStatus, Snowflake};
use market_service::services::{
    ChatService, LiveDashboard, LiveTimeline, MatchingService, NewMessage, RecordingSink, RequestService,
};
use market_service::ServiceContext;

const BUYER_ID: Snowflake = Snowflake::new(BUYER);
const SELLER_ID: Snowflake = Snowflake::new(SELLER);
const OTHER_SELLER_ID: Snowflake = Snowflake::new(OTHER_SELLER);

fn draft() -> RequestDraft {
    RequestDraft {
        car_make: "Honda".into(),
        car_model: "Civic".into(),
        car_year: 2015,
        part_needed: "Radiator".into(),
        description: None,
        phone: "+254 700 000 000".into(),
        location: "Nairobi".into(),
    }
}

fn context() -> Result<(ServiceContext, Arc<RecordingSink>)> {
    let sink = Arc::new(RecordingSink::new());
    let (ctx, _store) = build_context(&Collaborators::default(), sink.clone())?;
    Ok((ctx, sink))
}

#[tokio::test]
async fn test_concurrent_accepts_match_exactly_once() -> Result<()> {
    let (ctx, sink) = context()?;
    let request = RequestService::new(&ctx).submit_request(BUYER_ID, draft()).await?.request;
    let matching = MatchingService::new(&ctx);
    let first = matching
        .submit_offer(request.id, SELLER_ID, 100, "new".into(), 0)
        .await?;
    let second = matching
        .submit_offer(request.id, OTHER_SELLER_ID, 90, "used".into(), 0)
        .await?;

    let matching_a = MatchingService::new(&ctx);
    let matching_b = MatchingService::new(&ctx);
    let (a, b) = tokio::join!(
        matching_a.accept_offer(first.id, BUYER_ID),
        matching_b.accept_offer(second.id, BUYER_ID),
    );
    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    let loser = a.err().or(b.err()).map(|e| e.status_code());
    assert_eq!(loser, Some(409));

    let offers = ctx.offer_repo().find_by_request(request.id).await?;
    assert_eq!(offers.iter().filter(|o| o.status == OfferStatus::Accepted).count(), 1);
    assert_eq!(offers.iter().filter(|o| o.status == OfferStatus::Rejected).count(), 1);

    let stored = matching.get_request(request.id, BUYER_ID).await?;
    assert_eq!(stored.status, RequestStatus::Matched);
    ctx.notifications_settled().await;
    assert_eq!(sink.count_of("offer_accepted"), 1);
    Ok(())
}

#[tokio::test]
async fn test_expiry_sweep_closes_stale_rows() -> Result<()> {
    let (ctx, _sink) = context()?;
    let request = RequestService::new(&ctx).submit_request(BUYER_ID, draft()).await?.request;
    let matching = MatchingService::new(&ctx);
    matching
        .submit_offer(request.id, SELLER_ID, 100, String::new(), 0)
        .await?;

    let nothing = matching.expire_stale(Utc::now()).await?;
    assert_eq!(nothing.requests, 0);
    assert_eq!(nothing.offers, 0);

    let later = Utc::now() + chrono::Duration::days(365);
    let report = matching.expire_stale(later).await?;
    assert_eq!(report.requests, 1);
    assert_eq!(report.offers, 1);

    let expired = matching.get_request(request.id, BUYER_ID).await?;
    assert_eq!(expired.status, RequestStatus::Expired);
    Ok(())
}

#[tokio::test]
async fn test_live_timeline_follows_both_parties() -> Result<()> {
    let (ctx, _sink) = context()?;
    let chats = ChatService::new(&ctx);
    let opened = chats
        .send_message(BUYER_ID, SELLER_ID, None, NewMessage::text("still available?"))
        .await?;

    let mut timeline = LiveTimeline::open(&ctx, opened.chat.id, SELLER_ID).await?;
    assert_eq!(timeline.messages().len(), 1);

    chats
        .send_message(SELLER_ID, BUYER_ID, None, NewMessage::text("yes"))
        .await?;
    chats
        .send_message(BUYER_ID, SELLER_ID, None, NewMessage::text("great"))
        .await?;

    let converged = tokio::time::timeout(Duration::from_secs(2), async {
        while timeline.messages().len() < 3 {
            if !timeline.changed().await {
                break;
            }
        }
    })
    .await;
    assert!(converged.is_ok());

    let contents: Vec<String> = timeline.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["still available?", "yes", "great"]);
    assert_eq!(timeline.unread_for(SELLER_ID), 2);

    // Outsiders cannot follow the chat
    assert!(LiveTimeline::open(&ctx, opened.chat.id, Snowflake::new(STRANGER)).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_live_dashboard_refreshes_on_new_offers() -> Result<()> {
    let (ctx, _sink) = context()?;
    let request = RequestService::new(&ctx).submit_request(BUYER_ID, draft()).await?.request;

    let mut dashboard = LiveDashboard::open(&ctx, SELLER_ID).await?;
    assert_eq!(dashboard.snapshot().offers_in(OfferStatus::Pending), 0);

    MatchingService::new(&ctx)
        .submit_offer(request.id, SELLER_ID, 75, String::new(), 0)
        .await?;

    let refreshed = tokio::time::timeout(Duration::from_secs(2), async {
        while dashboard.snapshot().offers_in(OfferStatus::Pending) < 1 {
            if !dashboard.changed().await {
                break;
            }
        }
    })
    .await;
    assert!(refreshed.is_ok());
    assert_eq!(dashboard.snapshot().offers_in(OfferStatus::Pending), 1);
    Ok(())
}
