pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogFormat {
    Compact,
    Full,
    Pretty,
    Json,
}

pub fn initialize_tracing(log_format: LogFormat) {
    let log_filter =
        std::env::var("TRICKLE_LOG_FILTER").unwrap_or_else(|_| "warn,trickle=debug".to_owned());

    let tsub = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_env_filter(log_filter);

    // the first test in the binary installs the subscriber; later calls
    // keep it
    match log_format {
        LogFormat::Compact => tsub.compact().try_init(),
        LogFormat::Full => tsub.try_init(),
        LogFormat::Pretty => tsub.pretty().try_init(),
        LogFormat::Json => tsub.json().try_init(),
    }
    .ok();
}

pub fn initialize(log_format: LogFormat) -> Result<tokio::runtime::Runtime, BoxError> {
    initialize_tracing(log_format);
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(From::from)
}
