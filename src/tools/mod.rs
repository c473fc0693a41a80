pub mod system;
pub mod watch;
