use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "info,chat_bridge=debug";
const LOG_DIR: &str = "logs";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Anything other than "json" falls back to pretty output
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }

    fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|v| Self::parse(&v))
            .unwrap_or(Self::Pretty)
    }

    fn stdout_layer(self) -> BoxedLayer {
        match self {
            Self::Json => fmt::layer().json().with_target(true).with_thread_ids(true).boxed(),
            Self::Pretty => fmt::layer().pretty().with_target(true).boxed(),
        }
    }

    fn file_layer(self, writer: tracing_appender::non_blocking::NonBlocking) -> BoxedLayer {
        match self {
            Self::Json => fmt::layer().json().with_writer(writer).with_thread_ids(true).boxed(),
            Self::Pretty => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
        }
    }
}

/// Install the global subscriber: stdout plus a daily `logs/bridge.*.log`.
///
/// The returned guard flushes the file writer on drop; keep it alive in `main`.
pub fn init_logger() -> Result<WorkerGuard> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };
    let format = LogFormat::from_env();

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("bridge")
        .filename_suffix("log")
        .build(LOG_DIR)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layers: Vec<BoxedLayer> = vec![format.stdout_layer(), format.file_layer(writer)];

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;

    Ok(guard)
}
