// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use super::{CloseError, Dialer, Downstream, DownstreamConnection};
use crate::common::transport::{
  quic::QuicConnector, select_transport, stream::ClosableStream, DialError, QuicSettings,
  TransportKind,
};

/// Observable lifecycle of a [DownstreamChannel]
///
/// There is no unconnected state to observe: a channel value only exists once dialed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Connected,
  Closed,
}

/// An established HTTP/2 channel to one downstream service
///
/// Every byte stream under the channel is bound to a shutdown token. Closing the channel
/// cancels the token, which ends those streams and stops the channel from opening new
/// ones; tunneled channels also close their QUIC endpoint.
pub struct DownstreamChannel {
  service: Downstream,
  address: String,
  kind: TransportKind,
  channel: Channel,
  shutdown: CancellationToken,
  quic: Option<Arc<QuicConnector>>,
}

impl DownstreamChannel {
  #[tracing::instrument(level = "debug", skip(settings), fields(kind = tracing::field::Empty), err)]
  pub async fn dial(
    service: Downstream,
    address: &str,
    settings: &QuicSettings,
  ) -> Result<Self, DialError> {
    let (target, kind) = select_transport(address);
    tracing::Span::current().record("kind", tracing::field::display(kind));
    let shutdown = CancellationToken::new();
    let (channel, quic) = match kind {
      TransportKind::Standard => (dial_standard(target, shutdown.clone()).await?, None),
      TransportKind::Tunneled => {
        let connector = Arc::new(QuicConnector::bind(target, settings).await?);
        match dial_tunneled(target, connector.clone(), shutdown.clone()).await {
          Ok(channel) => (channel, Some(connector)),
          Err(e) => {
            connector.close();
            return Err(e);
          }
        }
      }
    };
    tracing::debug!(%service, address, %kind, "downstream channel established");
    Ok(Self {
      service,
      address: address.to_owned(),
      kind,
      channel,
      shutdown,
      quic,
    })
  }

  /// A handle to the underlying channel; clones share the same connection
  pub fn channel(&self) -> Channel {
    self.channel.clone()
  }

  pub fn service(&self) -> Downstream {
    self.service
  }

  pub fn address(&self) -> &str {
    &self.address
  }

  pub fn kind(&self) -> TransportKind {
    self.kind
  }

  /// A dialed channel starts out connected; there is no way back from closed
  pub fn state(&self) -> ConnectionState {
    if self.shutdown.is_cancelled() {
      ConnectionState::Closed
    } else {
      ConnectionState::Connected
    }
  }
}

impl DownstreamConnection for DownstreamChannel {
  fn close(&self) -> Result<(), CloseError> {
    if self.shutdown.is_cancelled() {
      return Err(CloseError::AlreadyClosed);
    }
    self.shutdown.cancel();
    if let Some(quic) = &self.quic {
      quic.close();
    }
    Ok(())
  }
}

impl std::fmt::Debug for DownstreamChannel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DownstreamChannel")
      .field("service", &self.service)
      .field("address", &self.address)
      .field("kind", &self.kind)
      .field("state", &self.state())
      .finish()
  }
}

/// Endpoint for `target`, which may already carry a scheme
fn endpoint(target: &str) -> Result<Endpoint, DialError> {
  let uri = if target.contains("://") {
    target.to_owned()
  } else {
    format!("http://{}", target)
  };
  Endpoint::from_shared(uri).map_err(|_| DialError::InvalidAddress(target.to_owned()))
}

/// `host:port` to open a TCP connection to, taken from the URI tonic asks for
fn tcp_target(uri: &Uri) -> Result<String, DialError> {
  let host = uri
    .host()
    .ok_or_else(|| DialError::InvalidAddress(uri.to_string()))?;
  let host = host.trim_start_matches('[').trim_end_matches(']');
  let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
    Some("https") => 443,
    _ => 80,
  });
  Ok(if host.contains(':') {
    format!("[{}]:{}", host, port)
  } else {
    format!("{}:{}", host, port)
  })
}

async fn dial_standard(target: &str, shutdown: CancellationToken) -> Result<Channel, DialError> {
  let connector = service_fn(move |uri: Uri| {
    let shutdown = shutdown.clone();
    async move {
      if shutdown.is_cancelled() {
        return Err(DialError::Closed);
      }
      let stream = tokio::net::TcpStream::connect(tcp_target(&uri)?).await?;
      stream.set_nodelay(true)?;
      Ok::<_, DialError>(ClosableStream::new(stream, shutdown))
    }
  });
  Ok(endpoint(target)?.connect_with_connector(connector).await?)
}

async fn dial_tunneled(
  target: &str,
  quic: Arc<QuicConnector>,
  shutdown: CancellationToken,
) -> Result<Channel, DialError> {
  // The URI only supplies the :authority of each request; bytes always flow to the connector's target.
  let connector = service_fn(move |_: Uri| {
    let shutdown = shutdown.clone();
    let quic = quic.clone();
    async move {
      if shutdown.is_cancelled() {
        return Err(DialError::Closed);
      }
      let stream = quic.open().await?;
      Ok::<_, DialError>(ClosableStream::new(stream, shutdown))
    }
  });
  Ok(endpoint(target)?.connect_with_connector(connector).await?)
}

/// Dials channels over whichever transport each address selects
#[derive(Debug, Clone, Default)]
pub struct ChannelDialer {
  settings: QuicSettings,
}

impl ChannelDialer {
  pub fn new(settings: QuicSettings) -> Self {
    Self { settings }
  }
}

impl Dialer for ChannelDialer {
  type Connection = DownstreamChannel;

  fn dial<'a>(
    &'a self,
    service: Downstream,
    address: &'a str,
  ) -> BoxFuture<'a, Result<DownstreamChannel, DialError>> {
    DownstreamChannel::dial(service, address, &self.settings).boxed()
  }
}
