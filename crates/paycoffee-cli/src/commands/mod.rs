pub mod config;
pub mod feed;
pub mod session;
pub mod timer;

/// Current-thread runtime: a session is cooperative and single-threaded.
pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
