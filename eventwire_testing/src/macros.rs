//! Assertion macros shared by integration tests.

/// Await a client `recv` and panic unless a message arrived.
#[macro_export]
macro_rules! recv_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("recv failed at ", file!(), ":", line!()))
            .expect(concat!("connection closed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m).expect(&m)
    }};
}

pub use crate::recv_expect;
