use simviz_logging::{init_logging, set_log_hook, LogRecord, LoggingOptions};
use std::sync::{Arc, Mutex};

#[test]
fn log_facade_records_reach_hook() {
    let captured: Arc<Mutex<Vec<LogRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let hook = {
        let c = captured.clone();
        move |rec: &LogRecord| {
            c.lock().unwrap().push(rec.clone());
        }
    };
    set_log_hook(hook);
    let _guard = init_logging(LoggingOptions {
        stderr: false,
        default_filter: Some("debug".to_string()),
    });

    log::info!("window window-3 created");
    tracing::info!(window = "window-4", "window drawn");

    let items = captured.lock().unwrap();
    assert!(items
        .iter()
        .any(|r| r.message.contains("window window-3 created")));
    let drawn = items
        .iter()
        .find(|r| r.message.contains("window drawn"))
        .expect("tracing event captured");
    assert_eq!(
        drawn.field("window").and_then(|v| v.as_str()),
        Some("window-4")
    );
}
