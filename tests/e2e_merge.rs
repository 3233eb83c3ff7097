//! E2E tests for merging remote payloads into the store

mod common;

use chrono::Duration;
use common::*;
use fedisync::data::{EntityKey, EntityKind, FeedKind, InteractionKind, StatusQuery};
use fedisync::remote::{AuthContext, RemoteRelationship};
use fedisync::service::{MergeContext, MergeResolver};

#[tokio::test]
async fn test_merging_the_same_payload_twice_changes_nothing() {
    let t = TestEngine::new().await;
    let status = remote_status("100", bob(), 10);

    let first = t.ingest_statuses(&[status.clone()]).await;
    let mut receiver = t.db().subscribe();

    let second = t.ingest_statuses(&[status]).await;
    assert_eq!(first[0].id, second[0].id);
    assert!(
        receiver.try_recv().is_err(),
        "identical payload must not publish a change"
    );
}

#[tokio::test]
async fn test_one_record_per_remote_identity() {
    let t = TestEngine::new().await;
    let original = remote_status("100", bob(), 10);
    let wrapper = remote_reblog("101", me(), original.clone(), 20);

    t.ingest_statuses(&[original.clone()]).await;
    t.ingest_statuses(&[wrapper, original]).await;

    let bob_id = t.account(BOB).await.id;
    let bobs = t
        .db()
        .statuses(&StatusQuery::by_account(&bob_id))
        .await
        .unwrap();
    assert_eq!(bobs.len(), 1);

    let reblogs = t
        .db()
        .statuses(&StatusQuery::reblogs_of(&bobs[0].id))
        .await
        .unwrap();
    assert_eq!(reblogs.len(), 1);
    assert_eq!(reblogs[0].account_id, t.account(ME).await.id);
}

#[tokio::test]
async fn test_domain_spelling_does_not_split_identity() {
    let t = TestEngine::new().await;
    let loud = MergeContext::anonymous("https://Social.Example/", t.server.now());

    let merged = MergeResolver::ingest_accounts(t.db(), &loud, &[bob()])
        .await
        .unwrap();

    assert_eq!(merged[0].id, t.account(BOB).await.id);
}

#[tokio::test]
async fn test_changed_fields_are_updated_in_place() {
    let t = TestEngine::new().await;
    let mut status = remote_status("100", bob(), 10);
    let before = t.ingest_statuses(&[status.clone()]).await.remove(0);

    status.content = "<p>edited</p>".to_string();
    status.edited_at = Some(base_time() + Duration::minutes(15));
    status.favourites_count = 4;
    let mut receiver = t.db().subscribe();
    let ctx = MergeContext::for_actor(&t.auth, t.server.now() + Duration::seconds(5));
    let after = MergeResolver::ingest_statuses(t.db(), &ctx, &[status])
        .await
        .unwrap()
        .remove(0);

    assert_eq!(before.id, after.id);
    let stored = t.db().status(&before.id).await.unwrap().unwrap();
    assert_eq!(stored.content, "<p>edited</p>");
    assert_eq!(stored.favourites_count, 4);
    assert_eq!(stored.created_at, before.created_at);

    let published = receiver.try_recv().unwrap();
    assert!(published.touches(EntityKind::Status, &before.id));
    assert!(!published.touches(EntityKind::Account, &t.account(BOB).await.id));
}

#[tokio::test]
async fn test_stale_payload_is_ignored() {
    let t = TestEngine::new().await;
    let mut status = remote_status("100", bob(), 10);
    status.favourites_count = 7;
    status.favourited = Some(true);
    let stored = t.ingest_statuses(&[status.clone()]).await.remove(0);

    let mut older = status;
    older.favourites_count = 2;
    older.favourited = Some(false);
    let stale = MergeContext::for_actor(&t.auth, t.server.now() - Duration::minutes(10));
    MergeResolver::ingest_statuses(t.db(), &stale, &[older])
        .await
        .unwrap();

    let current = t.db().status(&stored.id).await.unwrap().unwrap();
    assert_eq!(current.favourites_count, 7);
    let me_id = t.account(ME).await.id;
    let flags = t
        .db()
        .status_interactions(&stored.id, &me_id)
        .await
        .unwrap();
    assert!(flags.contains(&InteractionKind::Favourited));
}

#[tokio::test]
async fn test_actor_flags_follow_the_payload() {
    let t = TestEngine::new().await;
    let mut status = remote_status("100", bob(), 10);
    status.favourited = Some(true);
    status.bookmarked = Some(true);
    status.reblogged = Some(false);
    let stored = t.ingest_statuses(&[status]).await.remove(0);

    let me_id = t.account(ME).await.id;
    let flags = t
        .db()
        .status_interactions(&stored.id, &me_id)
        .await
        .unwrap();
    assert!(flags.contains(&InteractionKind::Favourited));
    assert!(flags.contains(&InteractionKind::Bookmarked));
    assert!(!flags.contains(&InteractionKind::Reblogged));

    let bob_id = t.account(BOB).await.id;
    assert!(
        t.db()
            .status_interactions(&stored.id, &bob_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_payload_for_unknown_actor_is_skipped() {
    let t = TestEngine::new().await;
    let stranger = AuthContext::new(DOMAIN, "999");
    let ctx = MergeContext::for_actor(&stranger, t.server.now());

    let merged = MergeResolver::ingest_statuses(t.db(), &ctx, &[remote_status("100", bob(), 10)])
        .await
        .unwrap();

    assert!(merged.is_empty());
    assert!(
        t.db()
            .status_by_key(&EntityKey::new(DOMAIN, "100"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_poll_merges_with_its_status() {
    let t = TestEngine::new().await;
    let mut status = remote_status("100", bob(), 10);
    let mut poll = remote_poll("50", &["yes", "no", "maybe"], false);
    poll.own_votes = Some(vec![1]);
    poll.voted = Some(true);
    status.poll = Some(poll);

    let stored = t.ingest_statuses(&[status]).await.remove(0);

    let poll = t.db().poll_for_status(&stored.id).await.unwrap().unwrap();
    let options = t.db().poll_options(&poll.id).await.unwrap();
    let titles: Vec<_> = options.iter().map(|option| option.title.as_str()).collect();
    assert_eq!(titles, vec!["yes", "no", "maybe"]);

    let me_id = t.account(ME).await.id;
    assert_eq!(t.db().voted_options(&poll.id, &me_id).await.unwrap(), vec![1]);
    assert!(t.db().vote_confirmed(&poll.id, &me_id).await.unwrap());
}

#[tokio::test]
async fn test_relationship_merges_both_directions() {
    let t = TestEngine::new().await;
    let relationships = [RemoteRelationship {
        id: BOB.to_string(),
        following: true,
        followed_by: true,
        muting: true,
        muting_notifications: true,
        ..RemoteRelationship::default()
    }];

    MergeResolver::ingest_relationships(t.db(), &t.ctx(), &relationships)
        .await
        .unwrap();

    let me_id = t.account(ME).await.id;
    let bob_id = t.account(BOB).await.id;
    let mine = t.db().relationship(&me_id, &bob_id).await.unwrap();
    assert!(mine.following && mine.followed_by && mine.muting);
    assert!(mine.muting_notifications);
    assert!(!mine.blocking);

    let theirs = t.db().relationship(&bob_id, &me_id).await.unwrap();
    assert!(theirs.following && theirs.followed_by);
    assert!(theirs.muted_by);

    let cleared = [RemoteRelationship {
        id: BOB.to_string(),
        ..RemoteRelationship::default()
    }];
    MergeResolver::ingest_relationships(t.db(), &t.ctx(), &cleared)
        .await
        .unwrap();
    let mine = t.db().relationship(&me_id, &bob_id).await.unwrap();
    assert!(!mine.following && !mine.followed_by && !mine.muting);
    assert!(!mine.muting_notifications);
}

#[tokio::test]
async fn test_notifications_are_scoped_to_their_owner() {
    let t = TestEngine::new().await;
    let mention = remote_status("100", bob(), 10);
    let page = [remote_notification("7", "mention", bob(), Some(mention), 11)];

    let ingested = t
        .engine
        .feeds()
        .ingest_notifications(FeedKind::NotificationsAll, &t.auth, &page, None, t.server.now())
        .await
        .unwrap();
    assert_eq!(ingested.record_ids.len(), 1);

    let me_id = t.account(ME).await.id;
    let bob_id = t.account(BOB).await.id;
    let key = EntityKey::new(DOMAIN, "7");
    let notification = t
        .db()
        .notification_by_key(&me_id, &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notification.account_id, bob_id);
    assert!(notification.status_id.is_some());
    assert!(t.db().notification_by_key(&bob_id, &key).await.unwrap().is_none());
}
