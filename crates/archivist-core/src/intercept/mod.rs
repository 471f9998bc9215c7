//! Delete interception.
//!
//! Every deletion that reaches the store goes through [`Interceptor`]. It
//! looks up the bindings whose source table the deletion targets and copies
//! the doomed rows into their destinations in the same transaction as the
//! deletion itself.

mod interceptor;
mod statement;

pub use interceptor::Interceptor;
pub use statement::DeleteRequest;
