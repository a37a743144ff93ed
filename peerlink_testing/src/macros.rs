//! Assertion macros shared by integration tests.

/// Await a send future and panic with contextual diagnostics on failure.
#[macro_export]
macro_rules! send_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("send failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

/// Await a receive future and panic with contextual diagnostics if the
/// stream has ended.
#[macro_export]
macro_rules! recv_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("recv failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

pub use crate::{recv_expect, send_expect};
