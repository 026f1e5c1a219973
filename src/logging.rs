use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

#[cfg(not(target_arch = "wasm32"))]
use crate::config::LoggingConfig;
#[cfg(not(target_arch = "wasm32"))]
use crate::error::{ConverterError, Result};

/// Installs the global subscriber for the CLI and server builds.
///
/// `RUST_LOG` takes precedence over `config.level`.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConverterError::config(format!("invalid log level '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if config.json {
        registry.with(fmt_layer.json()).try_init()
    } else {
        registry.with(fmt_layer.compact()).try_init()
    };

    installed.map_err(|e| ConverterError::config(format!("logger already initialised: {}", e)))
}

/// Browser build: routes events to the devtools console.
#[cfg(target_arch = "wasm32")]
pub fn init_console_logging(max_level: Level) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // A second call (module re-init) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(ConsoleLayer::new(max_level))
        .try_init();
}

pub type ConsoleSink = fn(&Level, &str);

/// `tracing` layer that hands each formatted event to a sink, by default the
/// browser console.
pub struct ConsoleLayer {
    max_level: Level,
    sink: ConsoleSink,
}

impl ConsoleLayer {
    #[cfg(target_arch = "wasm32")]
    pub fn new(max_level: Level) -> Self {
        Self::with_sink(max_level, write_to_console)
    }

    pub fn with_sink(max_level: Level, sink: ConsoleSink) -> Self {
        ConsoleLayer { max_level, sink }
    }
}

impl<S: Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = event.metadata().level();
        if *level > self.max_level {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        (self.sink)(level, &visitor.finish());
    }
}

#[cfg(target_arch = "wasm32")]
fn write_to_console(level: &Level, line: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let value = JsValue::from_str(line);
    match *level {
        Level::ERROR => console::error_1(&value),
        Level::WARN => console::warn_1(&value),
        Level::INFO => console::log_1(&value),
        _ => console::debug_1(&value),
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
