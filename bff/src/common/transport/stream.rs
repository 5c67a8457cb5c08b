// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::{
  future::Future,
  io::Error as IOError,
  pin::Pin,
  task::{Context, Poll},
};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// A QUIC bidirectional stream presented as a single duplex byte stream
///
/// Owns a handle to its connection; dropping the stream closes the connection.
pub struct QuicStream {
  connection: quinn::Connection,
  send: quinn::SendStream,
  recv: quinn::RecvStream,
}

impl QuicStream {
  pub fn new(
    connection: quinn::Connection,
    streams: (quinn::SendStream, quinn::RecvStream),
  ) -> Self {
    Self {
      connection,
      send: streams.0,
      recv: streams.1,
    }
  }
}

impl Drop for QuicStream {
  fn drop(&mut self) {
    self.connection.close(0u32.into(), b"stream dropped");
  }
}

impl AsyncWrite for QuicStream {
  fn poll_write(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
    buf: &[u8],
  ) -> Poll<Result<usize, IOError>> {
    AsyncWrite::poll_write(Pin::new(&mut self.send), cx, buf)
  }

  fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), IOError>> {
    AsyncWrite::poll_flush(Pin::new(&mut self.send), cx)
  }

  fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), IOError>> {
    AsyncWrite::poll_shutdown(Pin::new(&mut self.send), cx)
  }
}

impl AsyncRead for QuicStream {
  fn poll_read(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
  ) -> Poll<Result<(), IOError>> {
    AsyncRead::poll_read(Pin::new(&mut self.recv), cx, buf)
  }
}

pin_project! {
  /// A byte stream that ends as soon as its owner closes it
  ///
  /// Once the token is cancelled, reads report end-of-stream and writes fail,
  /// including reads and writes already parked waiting on the inner stream.
  pub struct ClosableStream<S> {
    #[pin]
    inner: S,
    token: CancellationToken,
    closed: Pin<Box<WaitForCancellationFutureOwned>>,
  }
}

impl<S> ClosableStream<S> {
  pub fn new(inner: S, token: CancellationToken) -> Self {
    let closed = Box::pin(token.clone().cancelled_owned());
    Self {
      inner,
      token,
      closed,
    }
  }
}

fn poll_closed(
  token: &CancellationToken,
  closed: &mut Pin<Box<WaitForCancellationFutureOwned>>,
  cx: &mut Context<'_>,
) -> bool {
  token.is_cancelled() || closed.as_mut().poll(cx).is_ready()
}

fn closed_error() -> IOError {
  IOError::new(std::io::ErrorKind::NotConnected, "downstream connection closed")
}

impl<S: AsyncRead> AsyncRead for ClosableStream<S> {
  fn poll_read(
    self: Pin<&mut Self>,
    cx: &mut Context<'_>,
    buf: &mut ReadBuf<'_>,
  ) -> Poll<Result<(), IOError>> {
    let this = self.project();
    if poll_closed(this.token, this.closed, cx) {
      return Poll::Ready(Ok(()));
    }
    this.inner.poll_read(cx, buf)
  }
}

impl<S: AsyncWrite> AsyncWrite for ClosableStream<S> {
  fn poll_write(
    self: Pin<&mut Self>,
    cx: &mut Context<'_>,
    buf: &[u8],
  ) -> Poll<Result<usize, IOError>> {
    let this = self.project();
    if poll_closed(this.token, this.closed, cx) {
      return Poll::Ready(Err(closed_error()));
    }
    this.inner.poll_write(cx, buf)
  }

  fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), IOError>> {
    let this = self.project();
    if poll_closed(this.token, this.closed, cx) {
      return Poll::Ready(Err(closed_error()));
    }
    this.inner.poll_flush(cx)
  }

  fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), IOError>> {
    self.project().inner.poll_shutdown(cx)
  }
}
