// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use tonic::{transport::Channel, Request, Response, Status};

use super::{connect_pair, ChannelDialer, ConnectError, DownstreamChannel};
use crate::{
  common::transport::QuicSettings,
  config::DownstreamConfig,
  proto::service::{
    resource::v1::{
      resource_service_client::ResourceServiceClient, ListResourcesReply, ListResourcesReq,
    },
    user::v1::{
      user_service_client::UserServiceClient, GetUserReply, GetUserRequest, LoginReply, LoginReq,
      RegisterReply, RegisterReq,
    },
  },
  util::release::Release,
};

pub type DownstreamResult<T> = BoxFuture<'static, Result<Response<T>, Status>>;

/// Calls made against the downstream user service
#[cfg_attr(test, mockall::automock)]
pub trait UserDownstream: Send + Sync + 'static {
  fn register(&self, request: Request<RegisterReq>) -> DownstreamResult<RegisterReply>;
  fn login(&self, request: Request<LoginReq>) -> DownstreamResult<LoginReply>;
  fn get_user(&self, request: Request<GetUserRequest>) -> DownstreamResult<GetUserReply>;
}

/// Calls made against the downstream resource service
#[cfg_attr(test, mockall::automock)]
pub trait ResourceDownstream: Send + Sync + 'static {
  fn list_resources(
    &self,
    request: Request<ListResourcesReq>,
  ) -> DownstreamResult<ListResourcesReply>;
}

#[derive(Debug, Clone)]
pub struct GrpcUserClient {
  inner: UserServiceClient<Channel>,
}

impl GrpcUserClient {
  pub fn new(channel: Channel) -> Self {
    Self {
      inner: UserServiceClient::new(channel),
    }
  }
}

impl UserDownstream for GrpcUserClient {
  fn register(&self, request: Request<RegisterReq>) -> DownstreamResult<RegisterReply> {
    let mut client = self.inner.clone();
    async move { client.register(request).await }.boxed()
  }

  fn login(&self, request: Request<LoginReq>) -> DownstreamResult<LoginReply> {
    let mut client = self.inner.clone();
    async move { client.login(request).await }.boxed()
  }

  fn get_user(&self, request: Request<GetUserRequest>) -> DownstreamResult<GetUserReply> {
    let mut client = self.inner.clone();
    async move { client.get_user(request).await }.boxed()
  }
}

#[derive(Debug, Clone)]
pub struct GrpcResourceClient {
  inner: ResourceServiceClient<Channel>,
}

impl GrpcResourceClient {
  pub fn new(channel: Channel) -> Self {
    Self {
      inner: ResourceServiceClient::new(channel),
    }
  }
}

impl ResourceDownstream for GrpcResourceClient {
  fn list_resources(
    &self,
    request: Request<ListResourcesReq>,
  ) -> DownstreamResult<ListResourcesReply> {
    let mut client = self.inner.clone();
    async move { client.list_resources(request).await }.boxed()
  }
}

/// Client handles for both downstream services
///
/// Holds exactly one client per service; a value only exists once both were connected.
#[derive(Clone)]
pub struct ServiceClients {
  user: Arc<dyn UserDownstream>,
  resource: Arc<dyn ResourceDownstream>,
}

impl ServiceClients {
  pub fn new(user: Arc<dyn UserDownstream>, resource: Arc<dyn ResourceDownstream>) -> Self {
    Self { user, resource }
  }

  /// Dials both services; the returned [Release] closes their channels
  #[tracing::instrument(level = "info", skip_all, err)]
  pub async fn connect(
    config: &DownstreamConfig,
    settings: &QuicSettings,
  ) -> Result<(Self, Release), ConnectError> {
    let dialer = ChannelDialer::new(settings.clone());
    let (pair, release) = connect_pair(&dialer, config).await?;
    let clients = Self::from_channels(&pair.user, &pair.resource);
    Ok((clients, release))
  }

  fn from_channels(user: &DownstreamChannel, resource: &DownstreamChannel) -> Self {
    Self::new(
      Arc::new(GrpcUserClient::new(user.channel())),
      Arc::new(GrpcResourceClient::new(resource.channel())),
    )
  }

  pub fn user(&self) -> &dyn UserDownstream {
    self.user.as_ref()
  }

  pub fn resource(&self) -> &dyn ResourceDownstream {
    self.resource.as_ref()
  }
}

impl std::fmt::Debug for ServiceClients {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ServiceClients").finish_non_exhaustive()
  }
}
