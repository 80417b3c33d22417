//! ---
//! inv_section: "05-logging"
//! inv_subsection: "module"
//! inv_type: "source"
//! inv_scope: "code"
//! inv_description: "Structured logging adapters and sinks."
//! inv_version: "v0.0.0-prealpha"
//! inv_owner: "tbd"
//! ---
/// Emit an informational log enriched with R-INV context.
#[macro_export]
macro_rules! inv_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::inv_event!(tracing::Level::INFO, context = $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::inv_event!(tracing::Level::INFO, context = $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with R-INV context.
#[macro_export]
macro_rules! inv_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::inv_event!(tracing::Level::DEBUG, context = $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::inv_event!(tracing::Level::DEBUG, context = $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with R-INV context.
#[macro_export]
macro_rules! inv_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::inv_event!(tracing::Level::WARN, context = $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::inv_event!(tracing::Level::WARN, context = $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with R-INV context.
#[macro_export]
macro_rules! inv_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::inv_event!(tracing::Level::ERROR, context = $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::inv_event!(tracing::Level::ERROR, context = $crate::LogContext::default(), $($arg)+)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! inv_event {
    ($level:expr, context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            object = ctx.object.unwrap_or(""),
            collector = ctx.collector.unwrap_or(""),
            cursor = ctx.cursor.unwrap_or(""),
            round = ctx.round.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}
