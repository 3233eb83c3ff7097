//! E2E tests for poll voting

mod common;

use chrono::{Duration, Utc};
use common::*;
use fedisync::error::AppError;
use fedisync::remote::{RemoteError, RemotePoll};
use fedisync::service::VoteState;

/// Store a status by bob carrying `poll`; returns the local poll id
async fn poll_fixture(t: &TestEngine, poll: RemotePoll) -> String {
    let mut status = remote_status("100", bob(), 10);
    status.poll = Some(poll);
    let status = t.ingest_statuses(&[status]).await.remove(0);
    t.db()
        .poll_for_status(&status.id)
        .await
        .unwrap()
        .unwrap()
        .id
}

#[tokio::test]
async fn test_vote_is_recorded_and_confirmed() {
    let t = TestEngine::new().await;
    let poll_id = poll_fixture(&t, remote_poll("50", &["tea", "coffee"], false)).await;
    assert_eq!(
        t.engine.polls().state(&poll_id).await.unwrap(),
        VoteState::Eligible
    );

    let outcome = t.engine.polls().vote(&poll_id, &[1]).await.unwrap();
    assert_eq!(outcome.state, VoteState::Submitted);
    assert_eq!(outcome.poll.id, poll_id);
    assert_eq!(outcome.poll.votes_count, 1);

    let me_id = t.account(ME).await.id;
    assert_eq!(t.db().voted_options(&poll_id, &me_id).await.unwrap(), vec![1]);
    assert!(t.db().vote_confirmed(&poll_id, &me_id).await.unwrap());
    let options = t.db().poll_options(&poll_id).await.unwrap();
    assert_eq!(options[1].votes_count, Some(1));
    assert_eq!(t.server.calls(), vec!["vote:50"]);
    assert_eq!(
        t.engine.polls().state(&poll_id).await.unwrap(),
        VoteState::Submitted
    );
}

#[tokio::test]
async fn test_second_vote_is_rejected_locally() {
    let t = TestEngine::new().await;
    let poll_id = poll_fixture(&t, remote_poll("50", &["tea", "coffee"], false)).await;

    t.engine.polls().vote(&poll_id, &[0]).await.unwrap();
    let votes_before = t.db().poll(&poll_id).await.unwrap().unwrap().votes_count;
    let option_votes = |options: Vec<fedisync::data::PollOption>| {
        options
            .into_iter()
            .map(|option| option.votes_count)
            .collect::<Vec<_>>()
    };
    let options_before = option_votes(t.db().poll_options(&poll_id).await.unwrap());

    let again = t.engine.polls().vote(&poll_id, &[1]).await;

    assert!(matches!(again, Err(AppError::AlreadyVoted)));
    assert_eq!(t.server.calls(), vec!["vote:50"]);
    assert_eq!(
        t.db().poll(&poll_id).await.unwrap().unwrap().votes_count,
        votes_before
    );
    assert_eq!(
        option_votes(t.db().poll_options(&poll_id).await.unwrap()),
        options_before
    );
    assert_eq!(options_before, vec![Some(1), Some(0)]);
    assert_eq!(
        t.engine.polls().state(&poll_id).await.unwrap(),
        VoteState::Submitted
    );
}

#[tokio::test]
async fn test_vote_on_closed_poll_marks_it_expired() {
    let t = TestEngine::new().await;
    let mut poll = remote_poll("50", &["tea", "coffee"], false);
    poll.expires_at = Some(Utc::now() - Duration::minutes(5));
    let poll_id = poll_fixture(&t, poll).await;

    let result = t.engine.polls().vote(&poll_id, &[0]).await;

    assert!(matches!(result, Err(AppError::PollExpired)));
    assert!(t.db().poll(&poll_id).await.unwrap().unwrap().expired);
    assert!(t.server.calls().is_empty());
    assert_eq!(
        t.engine.polls().state(&poll_id).await.unwrap(),
        VoteState::Expired
    );
}

#[tokio::test]
async fn test_failed_submission_keeps_the_local_vote() {
    let t = TestEngine::new().await;
    let poll_id = poll_fixture(&t, remote_poll("50", &["tea", "coffee"], false)).await;
    t.server.fail_next(RemoteError::Server {
        status: 503,
        message: "maintenance".to_string(),
    });

    let result = t.engine.polls().vote(&poll_id, &[0]).await;
    assert!(matches!(result, Err(AppError::Remote(_))));

    let me_id = t.account(ME).await.id;
    assert_eq!(t.db().voted_options(&poll_id, &me_id).await.unwrap(), vec![0]);
    assert!(!t.db().vote_confirmed(&poll_id, &me_id).await.unwrap());
    assert_eq!(
        t.engine.polls().state(&poll_id).await.unwrap(),
        VoteState::AlreadyVotedLocally
    );
    assert!(matches!(
        t.engine.polls().vote(&poll_id, &[0]).await,
        Err(AppError::AlreadyVoted)
    ));
}

#[tokio::test]
async fn test_choices_are_validated_before_anything_is_stored() {
    let t = TestEngine::new().await;
    let poll_id = poll_fixture(&t, remote_poll("50", &["tea", "coffee"], false)).await;

    let out_of_range = t.engine.polls().vote(&poll_id, &[2]).await;
    assert!(matches!(out_of_range, Err(AppError::BadRequest(_))));

    let too_many = t.engine.polls().vote(&poll_id, &[0, 1]).await;
    assert!(matches!(too_many, Err(AppError::BadRequest(_))));

    let me_id = t.account(ME).await.id;
    assert!(t.db().voted_options(&poll_id, &me_id).await.unwrap().is_empty());
    assert!(t.server.calls().is_empty());
}

#[tokio::test]
async fn test_multiple_choice_poll_accepts_several_options() {
    let t = TestEngine::new().await;
    let poll_id = poll_fixture(&t, remote_poll("50", &["a", "b", "c"], true)).await;

    t.engine.polls().vote(&poll_id, &[0, 2]).await.unwrap();

    let me_id = t.account(ME).await.id;
    assert_eq!(
        t.db().voted_options(&poll_id, &me_id).await.unwrap(),
        vec![0, 2]
    );
}

#[tokio::test]
async fn test_local_cast_does_not_call_the_server() {
    let t = TestEngine::new().await;
    let poll_id = poll_fixture(&t, remote_poll("50", &["tea", "coffee"], false)).await;

    let state = t
        .engine
        .polls()
        .cast_vote_locally(&poll_id, &[1])
        .await
        .unwrap();

    assert_eq!(state, VoteState::AlreadyVotedLocally);
    assert!(t.server.calls().is_empty());
}
