//! Lifecycle tests: init, membership changes, reconfigure, stop/restart and
//! deinit.

mod common;

use common::Rig;
use std::time::Duration;
use twdt::prelude::*;
use twdt::{ABORT_LINE, TRIGGER_HEADER};
use twdt_test_helpers::prelude::*;

#[test]
fn test_single_task_scenario_reports_and_tears_down() -> TestResult {
    let rig = Rig::new(2);
    rig.watchdog.init(
        WdtConfig::builder()
            .timeout_ms(100)
            .trigger_panic(false)
            .build()?,
    )?;

    rig.watchdog.add(None)?;
    assert!(matches!(
        rig.watchdog.add(None),
        Err(TwdtError::InvalidArgument(_))
    ));

    rig.watchdog.reset()?;
    assert_eq!(rig.watchdog.subscribed_count(), 1);
    assert!(rig.watchdog.is_running());

    // 150ms without a further reset.
    rig.clock.advance(Duration::from_millis(150));

    let name = rig.current_task_name();
    assert!(rig.lines.contains_line(TRIGGER_HEADER));
    assert!(rig.lines.contains_line(&format!(" - {name} (CPU 0/1)")));
    assert_eq!(rig.aborts.count(), 0);
    assert!(!rig.lines.contains_line(ABORT_LINE));

    rig.watchdog.delete(None)?;
    rig.watchdog.deinit()?;
    assert!(!rig.watchdog.is_initialized());
    Ok(())
}

#[test]
fn test_timer_starts_with_first_subscription_and_stops_with_last() -> TestResult {
    let rig = Rig::started(1, 100)?;
    assert_eq!(rig.watchdog.run_state(), Some(RunState::Stopped));
    assert!(!rig.clock.is_running());

    let first = rig.watchdog.add_user("first")?;
    let second = rig.watchdog.add_user("second")?;
    assert!(rig.clock.is_running());

    rig.watchdog.delete_user(first)?;
    assert!(rig.watchdog.is_running());
    rig.watchdog.delete_user(second)?;
    assert_eq!(rig.watchdog.run_state(), Some(RunState::Stopped));
    assert!(!rig.clock.is_running());
    Ok(())
}

#[test]
fn test_init_with_idle_cores_starts_immediately() -> TestResult {
    let rig = Rig::new(2);
    let config = WdtConfig::builder()
        .timeout_ms(100)
        .idle_core_mask(0b11)
        .build()?;
    rig.watchdog.init(config)?;

    assert_eq!(rig.watchdog.subscribed_count(), 2);
    assert!(rig.watchdog.is_running());
    for core in 0..2 {
        let idle = must_some(rig.platform.idle_task(core), "idle task");
        assert!(rig.watchdog.status(Some(idle))?.is_subscribed());
    }
    Ok(())
}

#[test]
fn test_misuse_leaves_state_unchanged() -> TestResult {
    let rig = Rig::started(1, 100)?;
    let user = rig.watchdog.add_user("net")?;

    assert!(matches!(
        rig.watchdog.delete(None),
        Err(TwdtError::InvalidArgument(_))
    ));
    assert!(matches!(rig.watchdog.reset(), Err(TwdtError::NotFound(_))));

    rig.watchdog.delete_user(user)?;
    assert!(matches!(
        rig.watchdog.delete_user(user),
        Err(TwdtError::InvalidArgument(_))
    ));
    assert!(matches!(
        rig.watchdog.reset_user(user),
        Err(TwdtError::NotFound(_))
    ));
    assert_eq!(
        rig.watchdog.status_user(user)?,
        SubscriptionStatus::NotSubscribed
    );
    assert_eq!(rig.watchdog.subscribed_count(), 0);
    Ok(())
}

#[test]
fn test_status_of_another_task() -> TestResult {
    let rig = Rig::started(1, 100)?;
    let worker = std::thread::spawn({
        let platform = std::sync::Arc::clone(&rig.platform);
        move || platform.current_task()
    })
    .join()
    .map_err(|_| "worker panicked")?;

    assert_eq!(
        rig.watchdog.status(Some(worker))?,
        SubscriptionStatus::NotSubscribed
    );
    rig.watchdog.add(Some(worker))?;
    assert!(rig.watchdog.status(Some(worker))?.is_subscribed());
    assert_eq!(
        rig.watchdog.status(None)?,
        SubscriptionStatus::NotSubscribed
    );
    rig.watchdog.delete(Some(worker))?;
    Ok(())
}

#[test]
fn test_deleting_a_late_entity_rearms_when_the_rest_reset() -> TestResult {
    let rig = Rig::started(1, 100)?;
    let a = rig.watchdog.add_user("a")?;
    let b = rig.watchdog.add_user("b")?;
    // Complete the period both joined in.
    rig.watchdog.reset_user(a)?;

    rig.watchdog.reset_user(b)?;
    rig.clock.advance(Duration::from_millis(60));
    let feeds = rig.watchdog.metrics().feeds;

    rig.watchdog.delete_user(a)?;
    assert_eq!(rig.watchdog.metrics().feeds, feeds + 1);
    assert_eq!(rig.clock.elapsed(), Some(Duration::ZERO));
    Ok(())
}

#[test]
fn test_reconfigure_requires_stopped_timer() -> TestResult {
    let rig = Rig::started(1, 100)?;
    let user = rig.watchdog.add_user("worker")?;
    assert!(rig.watchdog.is_running());

    let faster = WdtConfig::new(50)?;
    assert!(matches!(
        rig.watchdog.reconfigure(faster),
        Err(TwdtError::InvalidState(_))
    ));
    assert_eq!(rig.watchdog.config().map(|c| c.timeout_ms), Some(100));

    rig.watchdog.stop()?;
    assert_eq!(rig.watchdog.run_state(), Some(RunState::Suspended));
    rig.watchdog.reconfigure(faster)?;
    assert_eq!(rig.watchdog.config(), Some(faster));
    assert!(!rig.clock.is_running(), "reconfigure must not arm the timer");

    rig.watchdog.restart()?;
    assert!(rig.watchdog.is_running());
    assert_eq!(rig.clock.period(), Some(Duration::from_millis(50)));

    rig.watchdog.delete_user(user)?;
    Ok(())
}

#[test]
fn test_reconfigure_moves_idle_subscriptions() -> TestResult {
    let rig = Rig::new(2);
    rig.watchdog.init(
        WdtConfig::builder()
            .timeout_ms(100)
            .idle_core(0)
            .build()?,
    )?;
    rig.watchdog.stop()?;

    rig.watchdog.reconfigure(
        WdtConfig::builder()
            .timeout_ms(100)
            .idle_core(1)
            .build()?,
    )?;

    let idle0 = must_some(rig.platform.idle_task(0), "idle task 0");
    let idle1 = must_some(rig.platform.idle_task(1), "idle task 1");
    assert_eq!(
        rig.watchdog.status(Some(idle0))?,
        SubscriptionStatus::NotSubscribed
    );
    assert!(rig.watchdog.status(Some(idle1))?.is_subscribed());
    assert!(!rig.platform.idle_tick(0));
    assert!(rig.platform.idle_tick(1));
    Ok(())
}

#[test]
fn test_reconfigure_rejects_invalid_config() -> TestResult {
    let rig = Rig::started(2, 100)?;
    let bad = WdtConfig {
        timeout_ms: 0,
        ..WdtConfig::default()
    };
    assert!(matches!(
        rig.watchdog.reconfigure(bad),
        Err(TwdtError::InvalidArgument(_))
    ));
    let beyond = WdtConfig::builder().idle_core(5).build()?;
    assert!(matches!(
        rig.watchdog.reconfigure(beyond),
        Err(TwdtError::InvalidArgument(_))
    ));
    assert_eq!(rig.watchdog.config().map(|c| c.timeout_ms), Some(100));
    Ok(())
}

#[test]
fn test_stop_suspends_until_restart() -> TestResult {
    let rig = Rig::started(1, 100)?;
    let user = rig.watchdog.add_user("worker")?;

    rig.watchdog.stop()?;
    assert!(!rig.clock.is_running());
    let feeds = rig.watchdog.metrics().feeds;

    rig.watchdog.reset_user(user)?;
    let late = rig.watchdog.add_user("late")?;
    assert_eq!(rig.watchdog.metrics().feeds, feeds, "suspended: no re-arm");
    assert_eq!(rig.watchdog.run_state(), Some(RunState::Suspended));
    assert_eq!(rig.clock.advance(Duration::from_secs(1)), 0);
    assert!(rig.lines.is_empty());

    rig.watchdog.restart()?;
    assert!(rig.watchdog.is_running());
    rig.clock.advance(Duration::from_millis(100));
    assert!(rig.lines.contains_line(" - worker"));
    assert!(rig.lines.contains_line(" - late"));

    rig.watchdog.delete_user(user)?;
    rig.watchdog.delete_user(late)?;
    Ok(())
}

#[test]
fn test_restart_with_nothing_subscribed_stays_stopped() -> TestResult {
    let rig = Rig::started(1, 100)?;
    rig.watchdog.stop()?;
    rig.watchdog.restart()?;
    assert_eq!(rig.watchdog.run_state(), Some(RunState::Stopped));
    assert!(!rig.clock.is_running());
    Ok(())
}

#[test]
fn test_deinit_refuses_while_users_remain() -> TestResult {
    let rig = Rig::new(2);
    rig.watchdog.init(
        WdtConfig::builder()
            .timeout_ms(100)
            .idle_core(0)
            .build()?,
    )?;
    let user = rig.watchdog.add_user("still here")?;

    assert!(matches!(
        rig.watchdog.deinit(),
        Err(TwdtError::InvalidState(_))
    ));
    assert!(rig.watchdog.is_initialized());
    assert_eq!(rig.watchdog.subscribed_count(), 2);
    assert!(rig.platform.idle_tick(0), "idle hook must survive a refused deinit");

    rig.watchdog.delete_user(user)?;
    rig.watchdog.deinit()?;
    assert!(!rig.watchdog.is_initialized());
    assert!(!rig.platform.idle_tick(0));
    assert!(!rig.clock.has_live_timer());
    Ok(())
}

#[test]
fn test_deinit_refuses_while_tasks_remain() -> TestResult {
    let rig = Rig::started(1, 100)?;
    rig.watchdog.add(None)?;
    assert!(matches!(
        rig.watchdog.deinit(),
        Err(TwdtError::InvalidState(_))
    ));
    rig.watchdog.delete(None)?;
    rig.watchdog.deinit()?;
    Ok(())
}

#[test]
fn test_reinit_after_deinit() -> TestResult {
    let rig = Rig::started(1, 100)?;
    rig.watchdog.deinit()?;
    assert!(matches!(
        rig.watchdog.add_user("too early"),
        Err(TwdtError::InvalidState(_))
    ));

    rig.watchdog.init(WdtConfig::new(30)?)?;
    let user = rig.watchdog.add_user("second life")?;
    assert_eq!(rig.clock.period(), Some(Duration::from_millis(30)));
    rig.watchdog.delete_user(user)?;
    rig.watchdog.deinit()?;
    Ok(())
}

#[test]
fn test_feed_subscribes_the_calling_task() -> TestResult {
    let rig = Rig::started(1, 100)?;
    rig.watchdog.feed()?;
    assert!(rig.watchdog.status(None)?.is_subscribed());
    assert!(rig.watchdog.is_running());

    rig.watchdog.feed()?;
    assert_eq!(rig.watchdog.subscribed_count(), 1);
    rig.watchdog.delete(None)?;
    Ok(())
}
