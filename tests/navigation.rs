//! Navigation controller tests: guard phases, cancellation, redirects and
//! history pops.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use nav_router::history::RouterHistory;
use nav_router::navigation::state::{GuardPhase, NavigationState};
use nav_router::routing::record::DEFAULT_VIEW;
use nav_router::{
    guard_fn, GuardError, GuardOutcome, NavigationFailureType, RouteLocation, RouteLocationRaw, RouteRecordRaw,
    RouterError, View,
};

mod common;

#[tokio::test]
async fn test_abort_stops_before_later_phases() {
    let (router, history) = common::started_router().await;
    let log = common::CallLog::new();

    router
        .add_route(
            RouteRecordRaw::view("/guarded", View::new("Guarded"))
                .before_enter(log.guard("before_enter", GuardOutcome::Continue)),
        )
        .unwrap();
    let _g1 = router.before_each(log.guard("each 1", GuardOutcome::Continue));
    let _g2 = router.before_each(log.guard("each 2", GuardOutcome::Continue));
    let _g3 = router.before_each(log.guard("each 3", GuardOutcome::Abort));
    let _g4 = router.before_each(log.guard("each 4", GuardOutcome::Continue));
    let _r = router.before_resolve(log.guard("resolve", GuardOutcome::Continue));

    let failure = router.push("/guarded").await.unwrap().expect("navigation should fail");
    assert_eq!(failure.kind, NavigationFailureType::Aborted);
    assert_eq!(failure.to.path, "/guarded");
    assert_eq!(log.entries(), vec!["each 1", "each 2", "each 3"]);
    assert_eq!(router.current_route().path, "/");
    assert_eq!(history.entries(), vec!["/"]);
}

#[tokio::test]
async fn test_guard_phase_order() {
    let (router, _history) = common::router();
    let log = common::CallLog::new();

    let parent_view = View::new("Parent").before_route_update(log.guard("view update", GuardOutcome::Continue));
    let leaving_view = View::new("One").before_route_leave(log.guard("view leave", GuardOutcome::Continue));
    let entering_view = View::new("Two").before_route_enter(log.guard("view enter", GuardOutcome::Continue));

    router
        .add_route(
            RouteRecordRaw::nested(
                "/p",
                vec![
                    RouteRecordRaw::view("one", leaving_view).name("one"),
                    RouteRecordRaw::view("two", entering_view)
                        .name("two")
                        .before_enter(log.guard("record enter", GuardOutcome::Continue)),
                ],
            )
            .layout(parent_view),
        )
        .unwrap();
    router.push("/p/one").await.unwrap();
    log.clear();

    let _each = router.before_each(log.guard("each", GuardOutcome::Continue));
    let _resolve = router.before_resolve(log.guard("resolve", GuardOutcome::Continue));
    let log_after = log.clone();
    let _after = router.after_each(move |_, _, _| log_after.push("after"));

    assert!(router.push("/p/two").await.unwrap().is_none());
    assert_eq!(
        log.entries(),
        vec!["view leave", "each", "view update", "record enter", "view enter", "resolve", "after"]
    );
}

#[tokio::test]
async fn test_newer_navigation_cancels_pending_one() {
    let (router, history) = common::started_router().await;
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (entered_guard, release_guard) = (entered.clone(), release.clone());
    let _gate = router.before_each(move |to: Arc<RouteLocation>, _from: Arc<RouteLocation>| {
        let entered = entered_guard.clone();
        let release = release_guard.clone();
        async move {
            if to.path == "/a" {
                entered.notify_one();
                release.notified().await;
            }
            Ok::<_, GuardError>(GuardOutcome::Continue)
        }
    });

    let slow = router.clone();
    let first = tokio::spawn(async move { slow.push("/a").await });
    entered.notified().await;

    assert!(router.push("/b").await.unwrap().is_none());
    release.notify_one();

    let failure = first.await.unwrap().unwrap().expect("first navigation should be cancelled");
    assert_eq!(failure.kind, NavigationFailureType::Cancelled);
    assert_eq!(router.current_route().path, "/b");
    assert_eq!(history.entries(), vec!["/", "/b"]);
}

#[tokio::test]
async fn test_redirect_chain_bound() {
    let (router, _history) = common::started_router().await;
    for i in 0..11 {
        router
            .add_route(RouteRecordRaw::redirect(format!("/r{i}"), format!("/r{}", i + 1)))
            .unwrap();
    }
    router
        .add_route(RouteRecordRaw::view("/r11", View::new("End")))
        .unwrap();
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    let _handler = router.on_error(move |error, _, _| {
        assert!(matches!(error, RouterError::InfiniteRedirect { .. }));
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // ten redirects are allowed
    assert!(router.push("/r1").await.unwrap().is_none());
    let current = router.current_route();
    assert_eq!(current.path, "/r11");
    assert_eq!(current.redirected_from.as_ref().unwrap().path, "/r1");

    // the eleventh is not
    let error = router.push("/r0").await.unwrap_err();
    assert!(matches!(error, RouterError::InfiniteRedirect { count: 11, .. }));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(router.current_route().path, "/r11");
}

#[tokio::test]
async fn test_guard_redirect_loop_is_bounded() {
    let (router, _history) = common::started_router().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let _loop = router.before_each(guard_fn(move |to, _from| {
        if to.path == "/a" {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("/a".into())
        } else {
            Ok(GuardOutcome::Continue)
        }
    }));

    let error = router.push("/a").await.unwrap_err();
    assert!(matches!(error, RouterError::InfiniteRedirect { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 11);
    assert_eq!(router.current_route().path, "/");
}

#[tokio::test]
async fn test_guard_redirect_reaches_target() {
    let (router, history) = common::started_router().await;
    let _login = router.before_each(guard_fn(|to, _from| {
        if to.path == "/c" {
            Ok(GuardOutcome::Redirect(RouteLocationRaw::name("a")))
        } else {
            Ok(GuardOutcome::Continue)
        }
    }));

    assert!(router.push("/c?x=1").await.unwrap().is_none());
    let current = router.current_route();
    assert_eq!(current.path, "/a");
    assert_eq!(current.redirected_from.as_ref().unwrap().full_path, "/c?x=1");
    assert_eq!(history.entries(), vec!["/", "/a"]);
}

#[tokio::test]
async fn test_duplicated_navigation_runs_no_guards() {
    let (router, history) = common::started_router().await;
    router.push("/a").await.unwrap();

    let log = common::CallLog::new();
    let _each = router.before_each(log.guard("each", GuardOutcome::Continue));
    let failures = Arc::new(Mutex::new(Vec::new()));
    let seen = failures.clone();
    let _after = router.after_each(move |_to, _from, failure| {
        seen.lock().push(failure.map(|f| f.kind));
    });

    let failure = router.push("/a").await.unwrap().expect("should be duplicated");
    assert_eq!(failure.kind, NavigationFailureType::Duplicated);
    assert!(log.entries().is_empty());
    assert_eq!(*failures.lock(), vec![Some(NavigationFailureType::Duplicated)]);
    assert_eq!(history.entries(), vec!["/", "/a"]);

    // a different query is a different location
    assert!(router.push("/a?page=2").await.unwrap().is_none());
    assert_eq!(log.entries(), vec!["each"]);

    // force navigates anyway
    assert!(router
        .push(RouteLocationRaw::path("/a?page=2").force(true))
        .await
        .unwrap()
        .is_none());
    assert_eq!(log.entries(), vec!["each", "each"]);
}

#[tokio::test]
async fn test_guard_error_reaches_error_handlers() {
    let (router, _history) = common::started_router().await;
    let _broken = router.before_each(|_to: Arc<RouteLocation>, _from: Arc<RouteLocation>| async {
        Err::<GuardOutcome, GuardError>("boom".into())
    });
    let handled = Arc::new(Mutex::new(Vec::new()));
    let seen = handled.clone();
    let _handler = router.on_error(move |error, to, _from| {
        seen.lock().push((error.to_string(), to.path.clone()));
    });
    let after_calls = Arc::new(AtomicUsize::new(0));
    let counter = after_calls.clone();
    let _after = router.after_each(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let error = router.push("/b").await.unwrap_err();
    assert!(matches!(error, RouterError::Guard(_)));
    assert_eq!(
        *handled.lock(),
        vec![("Navigation guard failed: boom".to_string(), "/b".to_string())]
    );
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    assert_eq!(router.current_route().path, "/");
}

#[tokio::test]
async fn test_removed_guard_no_longer_runs() {
    let (router, _history) = common::started_router().await;
    let log = common::CallLog::new();
    let handle = router.before_each(log.guard("each", GuardOutcome::Abort));

    let failure = router.push("/a").await.unwrap();
    assert!(failure.is_some_and(|f| f.is(NavigationFailureType::Aborted)));

    handle.remove();
    assert!(router.push("/a").await.unwrap().is_none());
    assert_eq!(log.entries(), vec!["each"]);
}

#[tokio::test]
async fn test_back_and_forward() {
    let (router, history) = common::started_router().await;
    router.push("/a").await.unwrap();
    router.push("/b").await.unwrap();

    assert!(router.back().await.unwrap().is_none());
    assert_eq!(router.current_route().path, "/a");
    assert_eq!(history.position(), 1);
    assert_eq!(history.entries(), vec!["/", "/a", "/b"]);

    assert!(router.forward().await.unwrap().is_none());
    assert_eq!(router.current_route().path, "/b");
    assert_eq!(history.position(), 2);
}

#[tokio::test]
async fn test_aborted_pop_restores_history() {
    let (router, history) = common::started_router().await;
    router.push("/a").await.unwrap();
    router.push("/b").await.unwrap();

    let _block = router.before_each(guard_fn(|to, _from| Ok((to.path != "/a").into())));
    let failure = router.back().await.unwrap().expect("pop should be aborted");
    assert_eq!(failure.kind, NavigationFailureType::Aborted);
    assert_eq!(router.current_route().path, "/b");
    assert_eq!(history.location(), "/b");
    assert_eq!(history.position(), 2);
}

#[tokio::test]
async fn test_go_without_listening_only_moves_history() {
    let (router, history) = common::started_router().await;
    router.push("/a").await.unwrap();
    router.set_listening(false);

    assert!(router.go(-1).await.unwrap().is_none());
    assert_eq!(history.location(), "/");
    assert_eq!(router.current_route().path, "/a");
}

#[tokio::test]
async fn test_is_ready_waits_for_first_navigation() {
    let (router, _history) = common::router();
    router
        .add_route(RouteRecordRaw::view("/", View::new("Home")))
        .unwrap();

    let waiting = router.clone();
    let ready = tokio::spawn(async move { waiting.is_ready().await });
    tokio::task::yield_now().await;
    assert!(!ready.is_finished());

    router.start().await.unwrap();
    ready.await.unwrap().unwrap();
    // already ready
    router.is_ready().await.unwrap();
}

#[tokio::test]
async fn test_is_ready_rejects_on_error() {
    let (router, _history) = common::router();
    router
        .add_route(RouteRecordRaw::view("/", View::new("Home")))
        .unwrap();
    let _broken = router.before_each(|_to: Arc<RouteLocation>, _from: Arc<RouteLocation>| async {
        Err::<GuardOutcome, GuardError>("offline".into())
    });

    let waiting = router.clone();
    let ready = tokio::spawn(async move { waiting.is_ready().await });
    tokio::task::yield_now().await;

    assert!(router.start().await.is_err());
    assert!(matches!(ready.await.unwrap(), Err(RouterError::Guard(_))));
}

#[tokio::test]
async fn test_alias_keeps_records_alive() {
    let (router, _history) = common::router();
    let log = common::CallLog::new();
    router
        .add_route(
            RouteRecordRaw::nested(
                "/users",
                vec![RouteRecordRaw::view(":id", View::new("User")).name("user")],
            )
            .layout(View::new("Users"))
            .alias("/people")
            .before_enter(log.guard("enter users", GuardOutcome::Continue)),
        )
        .unwrap();

    router.push("/users/1").await.unwrap();
    assert_eq!(log.entries(), vec!["enter users"]);

    assert!(router.push("/people/2").await.unwrap().is_none());
    let current = router.current_route();
    assert_eq!(current.path, "/people/2");
    assert_eq!(current.param("id"), Some("2"));
    assert!(current.leaf().unwrap().is_alias());
    // same records under another path: nothing is entered again
    assert_eq!(log.entries(), vec!["enter users"]);
}

#[tokio::test]
async fn test_record_redirect_keeps_query_and_hash() {
    let (router, history) = common::started_router().await;
    router
        .add_route(RouteRecordRaw::redirect("/old", "/b"))
        .unwrap();
    router
        .add_route(RouteRecordRaw::redirect_with("/legacy/:id", |to: &RouteLocation| {
            RouteLocationRaw::name("user").param("id", to.param("id").unwrap_or_default())
        }))
        .unwrap();

    assert!(router.push("/old?x=1#top").await.unwrap().is_none());
    let current = router.current_route();
    assert_eq!(current.full_path, "/b?x=1#top");
    assert_eq!(current.redirected_from.as_ref().unwrap().path, "/old");
    assert_eq!(history.location(), "/b?x=1#top");

    assert!(router.push("/legacy/9").await.unwrap().is_none());
    assert_eq!(router.current_route().path, "/users/9");
}

#[tokio::test]
async fn test_replace_does_not_add_entry() {
    let (router, history) = common::started_router().await;
    router.push("/a").await.unwrap();
    router.replace("/b").await.unwrap();
    assert_eq!(history.entries(), vec!["/", "/b"]);
    assert_eq!(router.current_route().path, "/b");
}

#[tokio::test]
async fn test_navigation_events() {
    let (router, _history) = common::started_router().await;
    let mut events = router.navigation_events();

    router.push("/a").await.unwrap();

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.to, "/a");
        states.push(event.state);
    }
    let mut expected = vec![NavigationState::Resolving];
    expected.extend(GuardPhase::ALL.iter().map(|phase| NavigationState::Guarding(*phase)));
    expected.extend([NavigationState::Confirmed, NavigationState::Idle]);
    assert_eq!(states, expected);
}

#[tokio::test]
async fn test_unmatched_path_still_navigates() {
    let (router, _history) = common::started_router().await;
    assert!(router.push("/nowhere").await.unwrap().is_none());
    let current = router.current_route();
    assert_eq!(current.path, "/nowhere");
    assert!(!current.is_matched());
}

#[tokio::test]
async fn test_failed_pop_undoes_the_clamped_move() {
    let (router, history) = common::started_router().await;
    router.push("/a").await.unwrap();
    router.push("/b").await.unwrap();
    router.back().await.unwrap();
    assert_eq!(history.position(), 1);

    let _block = router.before_each(guard_fn(|_to, _from| Ok(GuardOutcome::Abort)));
    // only one entry lies behind /a
    let failure = router.go(-5).await.unwrap().expect("pop should be aborted");
    assert_eq!(failure.kind, NavigationFailureType::Aborted);
    assert_eq!(failure.to.path, "/");
    assert_eq!(router.current_route().path, "/a");
    assert_eq!(history.location(), "/a");
    assert_eq!(history.position(), 1);
}

#[tokio::test]
async fn test_go_past_the_end_settles_immediately() {
    let (router, history) = common::started_router().await;
    router.push("/a").await.unwrap();

    assert!(router.forward().await.unwrap().is_none());
    assert_eq!(router.current_route().path, "/a");
    assert_eq!(history.position(), 1);
}

#[tokio::test]
async fn test_runtime_guards_run_during_navigation() {
    let (router, _history) = common::router();
    let log = common::CallLog::new();
    router
        .add_route(
            RouteRecordRaw::nested(
                "/p",
                vec![
                    RouteRecordRaw::view("one", View::new("One")).name("one"),
                    RouteRecordRaw::view("two", View::new("Two")).name("two"),
                ],
            )
            .layout(View::new("Parent")),
        )
        .unwrap();
    router.push("/p/one").await.unwrap();

    let current = router.current_route();
    let _leave = current.matched[1].add_leave_guard(log.guard("leave one", GuardOutcome::Continue));
    let _update = current.matched[0].add_update_guard(log.guard("update parent", GuardOutcome::Continue));

    assert!(router.push("/p/two").await.unwrap().is_none());
    assert_eq!(log.entries(), vec!["leave one", "update parent"]);

    // a runtime guard can refuse too
    let _stay = router.current_route().matched[1].add_leave_guard(log.guard("stay on two", GuardOutcome::Abort));
    let failure = router.push("/p/one").await.unwrap().expect("leave guard should abort");
    assert_eq!(failure.kind, NavigationFailureType::Aborted);
    assert_eq!(router.current_route().path, "/p/two");
}

#[tokio::test]
async fn test_leave_guards_run_from_leaf_to_root() {
    let (router, _history) = common::router();
    let log = common::CallLog::new();
    router
        .add_route(
            RouteRecordRaw::nested(
                "/outer",
                vec![RouteRecordRaw::nested(
                    "inner",
                    vec![RouteRecordRaw::view(
                        "leaf",
                        View::new("Leaf").before_route_leave(log.guard("view leaf", GuardOutcome::Continue)),
                    )],
                )
                .layout(View::new("Inner").before_route_leave(log.guard("view inner", GuardOutcome::Continue)))],
            )
            .layout(View::new("Outer").before_route_leave(log.guard("view outer", GuardOutcome::Continue))),
        )
        .unwrap();
    router
        .add_route(RouteRecordRaw::view("/elsewhere", View::new("Elsewhere")))
        .unwrap();
    router.push("/outer/inner/leaf").await.unwrap();

    let current = router.current_route();
    let _handles: Vec<_> = current
        .matched
        .iter()
        .zip(["outer", "inner", "leaf"])
        .map(|(record, label)| record.add_leave_guard(log.guard(label, GuardOutcome::Continue)))
        .collect();

    assert!(router.push("/elsewhere").await.unwrap().is_none());
    assert_eq!(
        log.entries(),
        vec!["view leaf", "view inner", "view outer", "leaf", "inner", "outer"]
    );
}

#[tokio::test]
async fn test_runtime_guards_shared_with_alias() {
    let (router, _history) = common::started_router().await;
    let log = common::CallLog::new();
    router
        .add_route(
            RouteRecordRaw::nested(
                "/members",
                vec![RouteRecordRaw::view(":id", View::new("Member")).name("member")],
            )
            .layout(View::new("Members"))
            .alias("/people"),
        )
        .unwrap();
    router.push("/members/1").await.unwrap();

    let _leave = router.current_route().matched[0].add_leave_guard(log.guard("leave members", GuardOutcome::Continue));

    assert!(router.push("/people/2").await.unwrap().is_none());
    assert!(log.entries().is_empty());

    // leaving through the alias runs the guard registered on the canonical record
    assert!(router.push("/a").await.unwrap().is_none());
    assert_eq!(log.entries(), vec!["leave members"]);
}

#[tokio::test]
async fn test_removing_a_route_drops_its_runtime_guards() {
    let (router, _history) = common::started_router().await;
    let log = common::CallLog::new();
    router.push("/a").await.unwrap();

    let record = router.current_route().leaf().unwrap().clone();
    let _leave = record.add_leave_guard(log.guard("leave a", GuardOutcome::Abort));
    assert!(router.remove_route("a"));
    assert!(record.leave_guards().is_empty());

    assert!(router.push("/b").await.unwrap().is_none());
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn test_enter_callbacks_queued_by_enter_guard() {
    let (router, _history) = common::started_router().await;
    let log = common::CallLog::new();
    let queued = log.clone();
    router
        .add_route(RouteRecordRaw::view(
            "/profile",
            View::new("Profile").before_route_enter(guard_fn(move |to, _from| {
                let log = queued.clone();
                if let Some(record) = to.matched.last() {
                    record.on_enter(DEFAULT_VIEW, move || log.push("mounted"));
                }
                Ok(GuardOutcome::Continue)
            })),
        ))
        .unwrap();

    assert!(router.push("/profile").await.unwrap().is_none());
    assert!(log.entries().is_empty());

    let record = router.current_route().leaf().unwrap().clone();
    let callbacks = record.take_enter_callbacks(DEFAULT_VIEW);
    assert_eq!(callbacks.len(), 1);
    callbacks.into_iter().for_each(|callback| callback());
    assert_eq!(log.entries(), vec!["mounted"]);
    assert!(record.take_enter_callbacks(DEFAULT_VIEW).is_empty());
}

#[tokio::test]
async fn test_pop_onto_broken_redirect_settles_with_error() {
    let (router, history) = common::started_router().await;
    router
        .add_route(RouteRecordRaw::redirect("/moved", RouteLocationRaw::name("gone")))
        .unwrap();
    // an entry left behind by an earlier version of the route table
    history.push("/moved", None);
    router.push("/a").await.unwrap();

    let error = router.back().await.unwrap_err();
    assert!(matches!(error, RouterError::MatcherNotFound { .. }));
    assert_eq!(router.current_route().path, "/a");
}
