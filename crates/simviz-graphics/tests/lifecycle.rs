//! Window lifecycle tests against the headless toolkit.
//!
//! Every scenario runs twice: inline (toolkit driven from the test thread)
//! and window mode (toolkit owned by the rendering thread).

use simviz_graphics::{
    renders_inline, DrawableKind, DrawableRef, ErrorCode, GraphicsConfig, GraphicsError,
    GraphicsObject, HeadlessProbe, HeadlessToolkit, HostEnvironment, ModePreference,
    PresentationMode, SessionId, WindowEvent, WindowEventKind, WindowId, WindowManager,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const MODES: [PresentationMode; 2] = [PresentationMode::Inline, PresentationMode::Window];

struct Harness {
    manager: WindowManager<HeadlessToolkit>,
    probe: HeadlessProbe,
    dir: TempDir,
}

fn harness_with(
    mode: PresentationMode,
    toolkit: HeadlessToolkit,
    mut config: GraphicsConfig,
) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    config.export_dir = Some(dir.path().join("exports"));
    config.animation_dir = Some(dir.path().join("frames"));
    config.pump_interval_ms = 2;
    let probe = toolkit.probe();
    let manager = WindowManager::with_mode(toolkit, config, mode).expect("manager starts");
    Harness {
        manager,
        probe,
        dir,
    }
}

fn harness(mode: PresentationMode) -> Harness {
    harness_with(mode, HeadlessToolkit::new(), GraphicsConfig::default())
}

fn object(kind: DrawableKind, name: &str) -> DrawableRef {
    GraphicsObject::new(kind, name).into_ref()
}

fn mesh(name: &str) -> DrawableRef {
    object(DrawableKind::Mesh, name)
}

fn id(raw: &str) -> WindowId {
    WindowId::from(raw)
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_open_window_generates_monotonic_ids() {
    for mode in MODES {
        let h = harness(mode);
        assert_eq!(h.manager.open_window(None).unwrap(), id("window-0"), "{mode}");
        assert_eq!(h.manager.open_window(None).unwrap(), id("window-1"), "{mode}");
        assert_eq!(h.manager.window_ids(), vec![id("window-0"), id("window-1")]);
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_open_window_is_idempotent() {
    for mode in MODES {
        let h = harness(mode);
        let w1 = id("w1");
        h.manager.open_window(Some(w1.clone())).unwrap();
        h.manager.open_window(Some(w1.clone())).unwrap();
        assert_eq!(h.probe.counters(&w1).created, 1, "{mode}");
        assert!(h.manager.window_info(&w1).unwrap().has_handle);
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_open_window_recreates_closed_handle() {
    for mode in MODES {
        let h = harness(mode);
        let w1 = id("w1");
        h.manager.open_window(Some(w1.clone())).unwrap();
        assert!(h.probe.kill(&w1));
        h.manager.open_window(Some(w1.clone())).unwrap();
        assert_eq!(h.probe.counters(&w1).created, 2, "{mode}");
        assert!(h.probe.is_open(&w1));
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_plot_after_close_recreates_window() {
    for mode in MODES {
        let h = harness(mode);
        let w1 = id("w1");
        h.manager.plot(mesh("wing"), Some(w1.clone())).unwrap();
        let closed = h.manager.close_windows(None, Some(&[w1.clone()])).unwrap();
        assert_eq!(closed, vec![w1.clone()]);
        h.manager.flush().unwrap();
        assert!(h.manager.window_ids().is_empty(), "{mode}");
        assert_eq!(h.probe.counters(&w1).closes, 1);

        assert_eq!(h.manager.plot(mesh("wing"), Some(w1.clone())).unwrap(), w1);
        let counters = h.probe.counters(&w1);
        assert_eq!(counters.created, 2, "{mode}");
        assert_eq!(counters.draws, 2, "{mode}");
        assert!(h.probe.is_open(&w1));
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_close_all_empties_registry() {
    for mode in MODES {
        let h = harness(mode);
        for name in ["a", "b", "c"] {
            h.manager.plot(mesh(name), Some(id(name))).unwrap();
        }
        let closed = h.manager.close_windows(None, None).unwrap();
        assert_eq!(closed.len(), 3);
        h.manager.flush().unwrap();
        assert!(h.manager.window_ids().is_empty(), "{mode}");
        for name in ["a", "b", "c"] {
            assert!(h.manager.window_info(&id(name)).is_none());
            assert!(!h.probe.is_open(&id(name)));
        }
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_refresh_of_missing_window_is_noop() {
    for mode in MODES {
        let h = harness(mode);
        let refreshed = h.manager.refresh_windows(None, Some(&[id("w1")])).unwrap();
        assert!(refreshed.is_empty());
        assert!(h.manager.window_ids().is_empty(), "{mode}");
        assert!(h.manager.window_info(&id("w1")).is_none());
        assert_eq!(h.probe.total_created(), 0);
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_shutdown_without_windows_does_not_block() {
    for mode in MODES {
        let h = harness(mode);
        assert!(h.manager.close_windows(None, None).unwrap().is_empty());
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_non_graphics_objects_are_rejected_before_any_mutation() {
    for mode in MODES {
        let h = harness(mode);
        let table = object(DrawableKind::Other("table".into()), "residuals");
        let err = h.manager.plot(table.clone(), Some(id("w1"))).unwrap_err();
        assert!(matches!(err, GraphicsError::UnsupportedObjectKind { .. }));
        assert_eq!(err.code(), ErrorCode::InvalidObject);
        let err = h.manager.set_object_for_window(table, &id("w1")).unwrap_err();
        assert!(matches!(err, GraphicsError::UnsupportedObjectKind { .. }));
        assert!(h.manager.window_info(&id("w1")).is_none(), "{mode}");
        assert_eq!(h.probe.total_created(), 0);
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_save_graphic_writes_png_and_svg() {
    for mode in MODES {
        let h = harness(mode);
        let w = h.manager.plot(mesh("wing"), None).unwrap();

        let png = h.manager.save_graphic(&w, "PNG").unwrap();
        assert_eq!(png, h.dir.path().join("exports").join("window-0.png"));
        assert!(std::fs::metadata(&png).unwrap().len() > 0, "{mode}");

        let svg = h.manager.save_graphic(&w, ".svg").unwrap();
        let text = std::fs::read_to_string(svg).unwrap();
        assert!(text.contains("wing (mesh)"));
        assert_eq!(h.probe.counters(&w).saves, 2);
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_unsupported_format_fails_without_writing() {
    for mode in MODES {
        let h = harness(mode);
        let w = h.manager.plot(mesh("wing"), None).unwrap();
        let err = h.manager.save_graphic(&w, "tiff").unwrap_err();
        assert!(matches!(err, GraphicsError::UnsupportedFormat { ref format } if format == "tiff"));
        assert_eq!(h.probe.counters(&w).saves, 0, "{mode}");
        assert!(!h.dir.path().join("exports").join("window-0.tiff").exists());
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_save_of_unknown_window_is_an_error() {
    for mode in MODES {
        let h = harness(mode);
        let err = h.manager.save_graphic(&id("nope"), "png").unwrap_err();
        assert!(matches!(err, GraphicsError::UnknownWindow(_)), "{mode}: {err}");
        assert!(err.is_recoverable());
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_animate_without_frame_capture_is_not_supported() {
    for mode in MODES {
        let h = harness_with(
            mode,
            HeadlessToolkit::new().without_frame_capture(),
            GraphicsConfig::default(),
        );
        let w = h.manager.plot(mesh("wing"), None).unwrap();
        let err = h.manager.animate_windows(None, None).unwrap_err();
        assert!(matches!(err, GraphicsError::NotSupported { .. }), "{mode}");
        assert!(!h.manager.window_info(&w).unwrap().animate);
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_animation_captures_a_frame_per_draw() {
    for mode in MODES {
        let h = harness(mode);
        let w = h.manager.plot(mesh("step-0"), None).unwrap();
        assert_eq!(h.manager.animate_windows(None, None).unwrap(), vec![w.clone()]);
        let info = h.manager.window_info(&w).unwrap();
        assert!(info.animate && info.capturing, "{mode}: {info:?}");

        h.manager.plot(mesh("step-1"), Some(w.clone())).unwrap();
        h.manager.plot(mesh("step-2"), Some(w.clone())).unwrap();
        assert_eq!(h.probe.counters(&w).frames, 2, "{mode}");
        let frames = h.dir.path().join("frames").join(w.as_str());
        assert!(frames.join("frame-00000.png").exists());
        assert!(frames.join("frame-00001.png").exists());
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_session_filter_limits_selection() {
    for mode in MODES {
        let h = harness(mode);
        let s1 = SessionId::new("solver-1");
        let a = GraphicsObject::new(DrawableKind::Contour, "pressure")
            .with_session(s1.clone())
            .into_ref();
        let b = GraphicsObject::new(DrawableKind::Vector, "velocity")
            .with_session(SessionId::new("solver-2"))
            .into_ref();
        h.manager.plot(a, Some(id("a"))).unwrap();
        h.manager.plot(b, Some(id("b"))).unwrap();

        let closed = h.manager.close_windows(Some(&s1), None).unwrap();
        assert_eq!(closed, vec![id("a")]);
        h.manager.flush().unwrap();
        assert_eq!(h.manager.window_ids(), vec![id("b")], "{mode}");
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_stale_handle_is_recreated_and_retried() {
    for mode in MODES {
        let h = harness(mode);
        let w = h.manager.plot(mesh("wing"), None).unwrap();
        h.probe.fail_next_draw(&w);
        assert_eq!(h.manager.plot(mesh("wing"), Some(w.clone())).unwrap(), w);

        let counters = h.probe.counters(&w);
        assert_eq!(counters.created, 2, "{mode}");
        assert_eq!(counters.draws, 2, "{mode}");
        let health = h.manager.health();
        assert_eq!(health.errors, 1);
        assert!(health.is_healthy());
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_refresh_does_not_resurrect_user_closed_window() {
    for mode in MODES {
        let h = harness(mode);
        let w = h.manager.plot(mesh("wing"), None).unwrap();
        h.probe.kill(&w);
        assert!(h.manager.refresh_windows(None, None).unwrap().is_empty(), "{mode}");
        assert!(h.manager.window_info(&w).unwrap().handle_closed);
        assert_eq!(h.probe.counters(&w).created, 1, "{mode}");
        assert_eq!(h.probe.counters(&w).draws, 1, "{mode}");
        assert!(!h.probe.is_open(&w));

        h.manager.plot(mesh("wing"), Some(w.clone())).unwrap();
        assert_eq!(h.probe.counters(&w).created, 2, "{mode}");
        assert!(h.probe.is_open(&w));
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_user_closed_window_is_not_selected() {
    for mode in MODES {
        let h = harness(mode);
        let a = h.manager.plot(mesh("a"), Some(id("a"))).unwrap();
        let b = h.manager.plot(mesh("b"), Some(id("b"))).unwrap();
        h.probe.kill(&a);

        assert_eq!(h.manager.refresh_windows(None, None).unwrap(), vec![b.clone()], "{mode}");
        assert_eq!(h.manager.animate_windows(None, None).unwrap(), vec![b.clone()], "{mode}");
        assert!(!h.manager.window_info(&a).unwrap().animate);
        assert!(h.manager.window_info(&b).unwrap().capturing);
        assert_eq!(h.manager.window_ids(), vec![b.clone()]);

        // Closing still cleans up the record of a window the user closed
        let closed = h.manager.close_windows(None, None).unwrap();
        assert_eq!(closed, vec![a.clone(), b]);
        h.manager.flush().unwrap();
        assert!(h.manager.window_info(&a).is_none(), "{mode}");
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_save_recreates_stale_handle_and_retries() {
    for mode in MODES {
        let h = harness(mode);
        let w = h.manager.plot(mesh("wing"), None).unwrap();
        h.probe.fail_next_save(&w);

        let png = h.manager.save_graphic(&w, "png").unwrap();
        assert!(std::fs::metadata(&png).unwrap().len() > 0, "{mode}");
        let counters = h.probe.counters(&w);
        assert_eq!(counters.created, 2, "{mode}");
        assert_eq!(counters.draws, 2, "{mode}");
        assert_eq!(counters.saves, 1, "{mode}");
        assert!(h.probe.is_open(&w));
        assert!(!h.manager.window_info(&w).unwrap().handle_closed);
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_failed_inline_open_leaves_no_record() {
    let h = harness(PresentationMode::Inline);
    h.probe.fail_next_create();
    let err = h.manager.open_window(None).unwrap_err();
    assert!(matches!(err, GraphicsError::Toolkit(_)));
    assert_eq!(err.code(), ErrorCode::PlatformError);
    assert!(h.manager.window_ids().is_empty());
    assert!(h.manager.window_info(&id("window-0")).is_none());

    assert_eq!(h.manager.open_window(None).unwrap(), id("window-0"));
    assert_eq!(h.probe.counters(&id("window-0")).created, 1);
    h.manager.shutdown().unwrap();
}

#[test]
fn test_refresh_redraws_rebound_object() {
    for mode in MODES {
        let h = harness(mode);
        let w = h.manager.plot(mesh("wing"), None).unwrap();
        h.manager
            .set_object_for_window(object(DrawableKind::Contour, "pressure"), &w)
            .unwrap();
        let info = h.manager.window_info(&w).unwrap();
        assert!(info.update);
        assert_eq!(info.drawable_kind, Some(DrawableKind::Contour));

        h.manager.refresh_windows(None, Some(&[w.clone()])).unwrap();
        assert_eq!(h.probe.counters(&w).draws, 2, "{mode}");
        assert_eq!(h.probe.counters(&w).created, 1);
        let info = h.manager.window_info(&w).unwrap();
        assert!(!info.update && !info.refresh, "{mode}: {info:?}");
        assert_eq!(info.drawable_kind, Some(DrawableKind::Contour));
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_bound_object_on_new_window_is_drawn_by_refresh() {
    for mode in MODES {
        let h = harness(mode);
        let late = id("late");
        h.manager
            .set_object_for_window(object(DrawableKind::Surface, "hull"), &late)
            .unwrap();
        let info = h.manager.window_info(&late).unwrap();
        assert!(!info.has_handle && info.update);
        assert_eq!(h.probe.total_created(), 0);

        h.manager.refresh_windows(None, None).unwrap();
        assert!(h.manager.window_info(&late).unwrap().has_handle, "{mode}");
        assert_eq!(h.probe.counters(&late).draws, 1);
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_observers_see_lifecycle_events_in_order() {
    for mode in MODES {
        let h = harness(mode);
        let seen: Arc<Mutex<Vec<WindowEventKind>>> = Arc::default();
        {
            let seen = Arc::clone(&seen);
            h.manager.add_observer(move |event: &WindowEvent| {
                seen.lock().unwrap().push(event.kind);
            });
        }
        let w = h.manager.plot(mesh("wing"), None).unwrap();
        h.manager.save_graphic(&w, "png").unwrap();
        h.manager.close_windows(None, None).unwrap();
        h.manager.flush().unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                WindowEventKind::Created,
                WindowEventKind::Drawn,
                WindowEventKind::Saved,
                WindowEventKind::Closed,
            ],
            "{mode}"
        );
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_health_counts_draws() {
    for mode in MODES {
        let h = harness(mode);
        h.manager.plot(mesh("a"), None).unwrap();
        h.manager.plot(mesh("b"), None).unwrap();
        let health = h.manager.health();
        assert!(health.running, "{mode}");
        assert!(health.passes >= 1);
        assert_eq!(health.draws, 2);
        assert_eq!(health.coalesced, 0);
        assert!(!health.pending_request);
        assert!(health.is_healthy());
        h.manager.shutdown().unwrap();
    }
}

#[test]
fn test_dropping_manager_releases_windows() {
    for mode in MODES {
        let h = harness(mode);
        let w = h.manager.plot(mesh("wing"), None).unwrap();
        let probe = h.probe.clone();
        drop(h);
        assert_eq!(probe.counters(&w).closes, 1, "{mode}");
        assert!(!probe.is_open(&w));
    }
}

#[test]
fn test_live_refresh_redraws_rebound_window() {
    let config = GraphicsConfig {
        live_refresh_ms: Some(5),
        ..GraphicsConfig::default()
    };
    let h = harness_with(PresentationMode::Window, HeadlessToolkit::new(), config);
    let w = h.manager.plot(mesh("step-0"), None).unwrap();
    h.manager.set_object_for_window(mesh("step-1"), &w).unwrap();
    wait_until("live refresh", || h.probe.counters(&w).draws == 2);
    wait_until("update flag cleared", || {
        !h.manager.window_info(&w).unwrap().update
    });
    assert_eq!(h.probe.counters(&w).created, 1);
    h.manager.shutdown().unwrap();
}

/// The mode predicate is evaluated once, when the manager is built. A host
/// that later looks embedded does not move existing windows inline.
#[test]
fn test_mode_is_fixed_at_construction() {
    let notebook = HostEnvironment {
        embedded: true,
        forced: None,
    };
    assert!(renders_inline(&notebook, ModePreference::Auto, false));

    let h = harness(PresentationMode::Window);
    let w = h.manager.plot(mesh("wing"), None).unwrap();
    assert_eq!(h.manager.mode(), PresentationMode::Window);
    h.manager.plot(mesh("wing"), Some(w)).unwrap();
    assert_eq!(h.manager.mode(), PresentationMode::Window);
    h.manager.shutdown().unwrap();
}

#[test]
fn test_blocking_config_selects_inline() {
    let config = GraphicsConfig {
        blocking: true,
        ..GraphicsConfig::default()
    };
    let manager = WindowManager::new(HeadlessToolkit::new(), config).unwrap();
    assert_eq!(manager.mode(), PresentationMode::Inline);
    manager.shutdown().unwrap();
}
