//! # Summary
//!
//! This module abstracts over external connections to clients and peer servers.
//!
//! Currently uses `tokio-serde`'s bincode format to wrap around `tokio-util`'s
//! length-delimited codec, which in turn wraps around each half of `tokio`'s
//! TCP stream. This allows us to serialize and deserialize Rust structs through
//! a TCP connection with minimal boilerplate on the sending and receiving ends.

use tokio::net;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_serde::SymmetricallyFramed;
use tokio_serde::formats::SymmetricalBincode;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// Stream of length-delimited, bincode-encoded `T` read from TCP.
pub type Rx<T> = SymmetricallyFramed<FramedRead<OwnedReadHalf, LengthDelimitedCodec>, T, SymmetricalBincode<T>>;

/// Sink of length-delimited, bincode-encoded `T` written to TCP.
pub type Tx<T> = SymmetricallyFramed<FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>, T, SymmetricalBincode<T>>;

/// Split a `tokio::net::TcpStream` into a pair of receiving and transmitting
/// channels capable of reading and writing bincode-encoded data.
pub fn split<T, R>(stream: net::TcpStream) -> (Rx<R>, Tx<T>)
where T: serde::Serialize,
      R: serde::de::DeserializeOwned,
{
    let (rx, tx) = stream.into_split();
    let rx = FramedRead::new(rx, LengthDelimitedCodec::new());
    let tx = FramedWrite::new(tx, LengthDelimitedCodec::new());
    (
        SymmetricallyFramed::new(rx, SymmetricalBincode::default()),
        SymmetricallyFramed::new(tx, SymmetricalBincode::default()),
    )
}
