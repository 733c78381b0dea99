/// Log tags identify the subsystem a message originates from
///
/// Each tag can have debug logging enabled individually via
/// `logger::enable_debug_tag`, so one facade can be traced without
/// drowning the console in output from the others.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    Config,
    Auth,
    Db,
    Dashboard,
    Realtime,
    Http,
}

impl LogTag {
    /// Fixed-width label used in console output
    pub fn label(&self) -> &'static str {
        match self {
            LogTag::Config => "CONFIG",
            LogTag::Auth => "AUTH",
            LogTag::Db => "DB",
            LogTag::Dashboard => "DASHBOARD",
            LogTag::Realtime => "REALTIME",
            LogTag::Http => "HTTP",
        }
    }

    /// Key used for per-tag debug gating
    pub fn to_debug_key(&self) -> String {
        self.label().to_lowercase()
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
