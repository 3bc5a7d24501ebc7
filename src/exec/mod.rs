//! External process invocation

pub mod invoker;

pub use invoker::{Invocation, InvokeError, ProcessInvoker, ToolInvoker};
