mod common;

use common::{options, Call, ScriptedPlatform, ADMIN, CHAT, MEMBER};
use oxide_purge_core::platform::MemberRank;
use oxide_purge_core::purge::PurgeOptions;
use oxide_purge_core::{run_bulk_deletion, MessageId, PlatformError, PurgeError, TerminalState};
use std::time::Duration;
use tokio::time::Instant;

fn edits(platform: &ScriptedPlatform) -> Vec<String> {
    platform
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Edit(_, text) => Some(text),
            _ => None,
        })
        .collect()
}

fn sends(platform: &ScriptedPlatform) -> Vec<String> {
    platform
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Send(_, text) => Some(text),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn bot_without_admin_rank_fails_before_touching_messages() {
    let platform = ScriptedPlatform::new()
        .bot_rank(MemberRank::Member, false)
        .messages(1..=100, MEMBER);

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(101), &options(20)).await;

    assert!(
        matches!(
            outcome.state,
            TerminalState::Failed(PurgeError::PermissionDenied(_))
        ),
        "unexpected state: {:?}",
        outcome.state
    );
    assert_eq!(outcome.counts.deleted, 0);
    assert!(platform.delete_attempts().is_empty());
    assert_eq!(sends(&platform).len(), 1, "exactly one explanatory message");
    assert!(edits(&platform).is_empty(), "no progress message expected");
    assert_eq!(platform.remaining(), 100);
}

#[tokio::test]
async fn fifty_messages_report_every_twenty() {
    let platform = ScriptedPlatform::new().messages(2..=51, MEMBER);

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(52), &options(20)).await;

    assert_eq!(outcome.state, TerminalState::Done);
    assert_eq!(outcome.counts.deleted, 50);
    assert_eq!(outcome.counts.skipped, 0);
    assert_eq!(outcome.counts.errors, 0);

    let edits = edits(&platform);
    assert_eq!(edits.len(), 3, "edits: {edits:?}");
    assert!(edits[0].contains("<b>20</b>"));
    assert!(edits[1].contains("<b>40</b>"));
    assert!(edits[2].starts_with("✅"));
    assert!(edits[2].contains("<b>50</b>"));
}

#[tokio::test]
async fn admin_messages_survive_interleaved_purge() {
    let admin_ids: Vec<i32> = (2..=41).filter(|id| id % 4 == 0).collect();
    let member_ids: Vec<i32> = (2..=41).filter(|id| id % 4 != 0).collect();
    assert_eq!(admin_ids.len(), 10);
    assert_eq!(member_ids.len(), 30);

    let platform = ScriptedPlatform::new()
        .messages(member_ids, MEMBER)
        .messages(admin_ids.clone(), ADMIN);

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(42), &options(30)).await;

    assert_eq!(outcome.state, TerminalState::Done);
    assert_eq!(outcome.counts.deleted, 30);
    assert_eq!(outcome.counts.skipped, 10);
    assert_eq!(outcome.counts.errors, 0);

    let deleted: Vec<i32> = platform
        .delete_attempts()
        .into_iter()
        .map(|(id, _)| id.0)
        .collect();
    assert!(admin_ids.iter().all(|id| !deleted.contains(id)));
    assert_eq!(platform.remaining(), 10);
}

#[tokio::test]
async fn channel_posts_are_kept() {
    let platform = ScriptedPlatform::new()
        .messages(2..=9, MEMBER)
        .channel_post(10);

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(11), &options(30)).await;

    assert_eq!(outcome.counts.deleted, 8);
    assert_eq!(outcome.counts.skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_delete_waits_and_retries() {
    let platform = ScriptedPlatform::new()
        .messages(50..=60, MEMBER)
        .delete_failures(55, [PlatformError::RateLimited(Duration::from_secs(3))]);

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(61), &options(100)).await;

    assert_eq!(outcome.state, TerminalState::Done);
    assert_eq!(outcome.counts.deleted, 11);
    assert_eq!(outcome.counts.errors, 0);

    let attempts: Vec<_> = platform
        .delete_attempts()
        .into_iter()
        .filter(|(id, _)| *id == MessageId(55))
        .collect();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1].1 - attempts[0].1 >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn throttled_lookup_waits_and_still_spares_admin() {
    let platform = ScriptedPlatform::new()
        .messages(2..=9, MEMBER)
        .messages([5], ADMIN)
        .fetch_failures(5, [PlatformError::RateLimited(Duration::from_secs(3))]);

    let started = Instant::now();
    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(10), &options(100)).await;

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(platform.lookups(5), 2);
    assert_eq!(outcome.counts.deleted, 7);
    assert_eq!(outcome.counts.skipped, 1);
    assert_eq!(outcome.counts.errors, 0);
    assert!(platform
        .delete_attempts()
        .iter()
        .all(|(id, _)| *id != MessageId(5)));
}

#[tokio::test(start_paused = true)]
async fn persistently_throttled_lookup_is_an_error_not_a_delete() {
    let platform = ScriptedPlatform::new()
        .messages(2..=9, MEMBER)
        .messages([5], ADMIN)
        .fetch_error(5, PlatformError::RateLimited(Duration::from_secs(3)));

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(10), &options(100)).await;

    assert_eq!(outcome.state, TerminalState::Done);
    assert_eq!(platform.lookups(5), 2);
    assert_eq!(outcome.counts.deleted, 7);
    assert_eq!(outcome.counts.errors, 1);
    assert!(platform
        .delete_attempts()
        .iter()
        .all(|(id, _)| *id != MessageId(5)));
    assert_eq!(platform.remaining(), 1);
}

#[tokio::test]
async fn vanished_message_is_skipped_without_delete() {
    let platform = ScriptedPlatform::new()
        .messages(60..=80, MEMBER)
        .fetch_error(70, PlatformError::NotFound);

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(81), &options(100)).await;

    assert!(platform.fetched(70));
    assert!(platform
        .delete_attempts()
        .iter()
        .all(|(id, _)| *id != MessageId(70)));
    assert_eq!(outcome.counts.deleted, 20);
    // 70 plus the 58 empty slots below 60
    assert_eq!(outcome.counts.skipped, 1 + 58);
}

#[tokio::test]
async fn unresolved_author_falls_through_to_delete() {
    let platform = ScriptedPlatform::new()
        .messages(2..=5, MEMBER)
        .fetch_error(4, PlatformError::Transport("lookup failed".to_string()));

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(6), &options(10)).await;

    assert_eq!(outcome.counts.deleted, 4);
}

#[tokio::test]
async fn roster_failure_issues_no_deletes() {
    let platform = ScriptedPlatform::new()
        .admins_unavailable()
        .messages(2..=30, MEMBER);

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(31), &options(10)).await;

    assert!(matches!(
        outcome.state,
        TerminalState::Failed(PurgeError::RosterUnavailable(_))
    ));
    assert!(platform.delete_attempts().is_empty());
    let sends = sends(&platform);
    assert_eq!(sends.len(), 1);
    assert!(sends[0].contains("admin list"));
}

#[tokio::test(start_paused = true)]
async fn status_message_outlives_the_walk() {
    let platform = ScriptedPlatform::new()
        .status_id(30)
        .messages((2..=40).filter(|id| *id != 30), MEMBER);
    let options = PurgeOptions {
        status_grace: Some(Duration::from_secs(5)),
        ..options(10)
    };

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(41), &options).await;

    assert_eq!(outcome.counts.examined, 38);
    assert_eq!(outcome.counts.deleted, 38);

    let calls = platform.calls();
    let status_delete = calls
        .iter()
        .position(|call| matches!(call, Call::Delete(id, _) if *id == MessageId(30)));
    let summary = calls
        .iter()
        .position(|call| matches!(call, Call::Edit(_, text) if text.starts_with("✅")));
    let (Some(status_delete), Some(summary)) = (status_delete, summary) else {
        panic!("expected a summary and a status cleanup, got {calls:?}");
    };
    assert!(summary < status_delete);
    assert_eq!(status_delete, calls.len() - 1);
}

#[tokio::test]
async fn consecutive_failures_abort_and_keep_status() {
    let failing = 2..=60;
    let mut platform = ScriptedPlatform::new().messages(failing.clone(), MEMBER);
    for id in failing {
        platform = platform.delete_failures(id, [PlatformError::Transport("502".to_string())]);
    }
    let options = PurgeOptions {
        max_consecutive_errors: 5,
        status_grace: Some(Duration::ZERO),
        ..options(100)
    };

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(61), &options).await;

    assert_eq!(
        outcome.state,
        TerminalState::Failed(PurgeError::TooManyErrors { consecutive: 5 })
    );
    assert_eq!(outcome.counts.errors, 5);
    assert_eq!(outcome.counts.examined, 5);
    assert!(platform
        .delete_attempts()
        .iter()
        .all(|(id, _)| *id != MessageId(10_000)));
    assert!(edits(&platform)
        .last()
        .is_some_and(|text| text.contains("consecutive")));
}

#[tokio::test(start_paused = true)]
async fn time_budget_stops_slow_jobs() {
    let throttled = || [PlatformError::RateLimited(Duration::from_secs(4))];
    let platform = ScriptedPlatform::new()
        .messages(10..=20, MEMBER)
        .delete_failures(20, throttled())
        .delete_failures(19, throttled())
        .delete_failures(18, throttled());
    let options = PurgeOptions {
        time_budget: Some(Duration::from_secs(10)),
        ..options(100)
    };

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(21), &options).await;

    assert!(
        matches!(
            outcome.state,
            TerminalState::Failed(PurgeError::BudgetExhausted { .. })
        ),
        "unexpected state: {:?}",
        outcome.state
    );
    assert_eq!(outcome.counts.deleted, 2);
    assert_eq!(platform.remaining(), 9);
}

#[tokio::test]
async fn capped_job_examines_at_most_max_count() {
    let platform = ScriptedPlatform::new().messages(2..=200, MEMBER);
    let options = PurgeOptions {
        max_count: Some(25),
        ..options(10)
    };

    let outcome = run_bulk_deletion(&platform, CHAT, MessageId(201), &options).await;

    assert_eq!(outcome.start, MessageId(200));
    assert_eq!(outcome.floor, MessageId(175));
    assert_eq!(outcome.counts.examined, 25);
    assert_eq!(outcome.counts.deleted, 25);
    assert_eq!(platform.remaining(), 199 - 25);
}
