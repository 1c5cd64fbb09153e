//! An in-process network fabric: bidirectional byte-stream connections over
//! user-space ring buffers, with listen/dial/accept semantics modelled on
//! ordinary sockets but without a socket, a kernel, or a network in sight.
//!
//! ```
//! use std::thread;
//! use memnet::listen;
//!
//! let listener = listen(1, 0, "example:0").unwrap();
//!
//! let acceptor = listener.clone();
//! let server = thread::spawn(move || {
//!   let conn = acceptor.accept().unwrap();
//!   let mut buf = [0u8; 5];
//!   conn.read(&mut buf).unwrap();
//!   assert_eq!(&buf, b"hello");
//! });
//!
//! let client = listener.dial().unwrap();
//! client.write(b"hello").unwrap();
//! server.join().unwrap();
//! ```

#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod listener;
mod ring;
mod util;
mod waiter;

pub use connection::Connection;
pub use error::{NetError, NetResult};
pub use listener::{listen, Listener, ListenerBuilder};
