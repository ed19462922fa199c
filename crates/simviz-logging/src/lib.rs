//! Logging bootstrap for SimViz hosts.
//!
//! Library crates log through the `log` facade. Hosts call [`init_logging`]
//! once to route those records into a `tracing` subscriber, optionally echo
//! them to stderr, and optionally receive every record as a structured
//! [`LogRecord`] through a process-wide hook (used by notebook kernels and
//! dashboards to surface rendering-thread diagnostics next to their output).

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

/// Environment variable consulted when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "SIMVIZ_LOG";

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub ts: String,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<JsonValue>,
}

impl LogRecord {
    /// Value of a structured field attached to the event, if any.
    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.fields.as_ref()?.as_object()?.get(name)
    }
}

type LogHook = Arc<dyn Fn(&LogRecord) + Send + Sync>;

static LOG_HOOK: OnceCell<LogHook> = OnceCell::new();

pub struct LoggingGuard {
    _guard: Option<DefaultGuard>,
}

#[derive(Clone, Default)]
pub struct LoggingOptions {
    /// Echo formatted records to stderr.
    pub stderr: bool,
    /// Filter directive used when neither `RUST_LOG` nor `SIMVIZ_LOG` is set.
    pub default_filter: Option<String>,
}

/// Install the hook receiving every record. Only the first call wins.
pub fn set_log_hook<F>(hook: F)
where
    F: Fn(&LogRecord) + Send + Sync + 'static,
{
    let _ = LOG_HOOK.set(Arc::new(hook));
}

pub fn init_logging(opts: LoggingOptions) -> LoggingGuard {
    // Route log:: macros into tracing
    let _ = LogTracer::init();

    let fallback = opts.default_filter.clone().unwrap_or_else(|| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let build_subscriber = || {
        let stderr_layer = opts.stderr.then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
        });
        tracing_subscriber::registry()
            .with(env_filter.clone())
            .with(LogBridgeLayer)
            .with(stderr_layer)
    };

    let guard = match tracing::subscriber::set_global_default(build_subscriber()) {
        Ok(()) => None,
        Err(_) => Some(tracing::subscriber::set_default(build_subscriber())),
    };

    LoggingGuard { _guard: guard }
}

struct LogBridgeLayer;

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl<S> Layer<S> for LogBridgeLayer
where
    S: Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let hook = match LOG_HOOK.get() {
            Some(hook) => hook,
            None => return,
        };

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        // Records bridged from `log` carry their origin in `log.*` fields.
        let target = visitor
            .log_target
            .take()
            .unwrap_or_else(|| event.metadata().target().to_string());

        let record = LogRecord {
            ts: now_rfc3339(),
            level: event.metadata().level().to_string(),
            target,
            message: visitor
                .message
                .unwrap_or_else(|| event.metadata().name().to_string()),
            fields: visitor
                .fields
                .filter(|obj| obj.as_object().map(|m| !m.is_empty()).unwrap_or(false)),
        };

        hook(&record);
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    log_target: Option<String>,
    fields: Option<JsonValue>,
}

impl JsonVisitor {
    fn insert(&mut self, name: &str, entry: JsonValue) {
        if name.starts_with("log.") {
            if name == "log.target" {
                self.log_target = entry.as_str().map(str::to_string);
            }
            return;
        }
        let obj = self
            .fields
            .get_or_insert_with(|| JsonValue::Object(Default::default()));
        if let JsonValue::Object(map) = obj {
            map.insert(name.to_string(), entry);
        }
    }
}

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.insert(field.name(), JsonValue::String(text));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field.name(), JsonValue::String(value.to_string()));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.insert(field.name(), JsonValue::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.insert(field.name(), JsonValue::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.insert(field.name(), JsonValue::from(value));
    }
}
