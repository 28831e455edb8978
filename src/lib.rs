pub mod server;
pub mod config;
pub mod security;
pub mod identity;
pub mod store;
pub mod fields;
pub mod booking;
pub mod reviews;
pub mod sitemap;
pub mod error;

// Debug-build trace helper: prints to stderr in tests and debug builds.
// Usage: tprintln!("session issued uid={}", uid);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds tprintln! is a no-op that still type-checks its arguments.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
