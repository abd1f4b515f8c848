//! scriptline-exec: Script execution abstraction
//!
//! Runs a rendered shell script either locally or on a remote host over
//! SSH, returning stdout or an error carrying both captured streams.

pub mod error;
pub mod keys;
pub mod local;
pub mod remote;
pub mod result;
pub mod retry;
pub mod runner;
pub mod ssh;
pub mod traits;
pub mod transport;

pub use error::ExecError;
pub use local::LocalRunner;
pub use remote::RemoteRunner;
pub use result::{ExecutionTarget, RemoteTarget};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper, connect_with_retry};
pub use runner::Runner;
pub use traits::ScriptRunner;
