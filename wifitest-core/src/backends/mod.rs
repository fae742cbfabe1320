pub mod nmcli;
pub mod utils;

#[cfg(feature = "backend_mock")]
pub mod mock;
