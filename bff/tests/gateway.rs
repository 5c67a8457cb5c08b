// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use bff::{
  common::{
    auth::{Claims, CredentialCodec, SigningKey},
    downstream::{ConnectError, Downstream, ServiceClients},
    transport::QuicSettings,
  },
  config::DownstreamConfig,
  proto::{
    bff::user::v1::{user_server::User, ListResourcesReq, RegisterReq},
    service::{
      resource::v1::{
        resource_service_server::{ResourceService, ResourceServiceServer},
        ListResourcesReply, ListResourcesReq as DownstreamListReq, Resource,
      },
      user::v1::{
        user_service_server::{UserService, UserServiceServer},
        GetUserReply, GetUserRequest, LoginReply, LoginReq, RegisterReply,
        RegisterReq as DownstreamRegisterReq,
      },
    },
  },
  service::UserFacade,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Code, Request, Response, Status};

struct FakeUsers;

#[tonic::async_trait]
impl UserService for FakeUsers {
  async fn register(
    &self,
    request: Request<DownstreamRegisterReq>,
  ) -> Result<Response<RegisterReply>, Status> {
    Ok(Response::new(RegisterReply {
      user_id: format!("id-{}", request.into_inner().nickname),
    }))
  }

  async fn login(&self, _: Request<LoginReq>) -> Result<Response<LoginReply>, Status> {
    Err(Status::unimplemented("login"))
  }

  async fn get_user(&self, _: Request<GetUserRequest>) -> Result<Response<GetUserReply>, Status> {
    Err(Status::not_found("no such user"))
  }
}

struct FakeResources;

#[tonic::async_trait]
impl ResourceService for FakeResources {
  async fn list_resources(
    &self,
    request: Request<DownstreamListReq>,
  ) -> Result<Response<ListResourcesReply>, Status> {
    let owner = request.into_inner().user_id.unwrap_or_default();
    Ok(Response::new(ListResourcesReply {
      resources: vec![Resource {
        instance_id: format!("{}-vm", owner),
        name: "vm".into(),
        user_id: String::new(),
        r#type: "cpu".into(),
        created_at: 1,
        updated_at: 1,
      }],
      specs: HashMap::new(),
    }))
  }
}

async fn listener() -> (TcpListener, SocketAddr) {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let address = listener.local_addr().unwrap();
  (listener, address)
}

async fn spawn_users() -> SocketAddr {
  let (listener, address) = listener().await;
  tokio::spawn(
    Server::builder()
      .add_service(UserServiceServer::new(FakeUsers))
      .serve_with_incoming(TcpListenerStream::new(listener)),
  );
  address
}

async fn spawn_resources() -> SocketAddr {
  let (listener, address) = listener().await;
  tokio::spawn(
    Server::builder()
      .add_service(ResourceServiceServer::new(FakeResources))
      .serve_with_incoming(TcpListenerStream::new(listener)),
  );
  address
}

fn bearer<T>(message: T, codec: &CredentialCodec, user_id: &str) -> Request<T> {
  let token = codec
    .issue(&Claims {
      user_id: user_id.to_owned(),
      ..Default::default()
    })
    .unwrap();
  let mut request = Request::new(message);
  request
    .metadata_mut()
    .insert("authorization", format!("Bearer {}", token).parse().unwrap());
  request
}

#[tokio::test]
async fn gateway_forwards_over_standard_channels_until_released() {
  let config = DownstreamConfig {
    user_addr: spawn_users().await.to_string(),
    resource_addr: spawn_resources().await.to_string(),
  };
  let (clients, release) = ServiceClients::connect(&config, &QuicSettings::default())
    .await
    .unwrap();
  let codec = Arc::new(CredentialCodec::new(&SigningKey::new("e2e-key")));
  let facade = UserFacade::new(clients, codec.clone());

  let registered = facade
    .register(Request::new(RegisterReq {
      email: "a@example.com".into(),
      password: "pw".into(),
      nickname: "alice".into(),
    }))
    .await
    .unwrap()
    .into_inner();
  assert_eq!(registered.user_id, "id-alice");

  let listed = facade
    .list_resources(bearer(ListResourcesReq::default(), &codec, "u1"))
    .await
    .unwrap()
    .into_inner();
  assert_eq!(listed.resources.len(), 1);
  assert_eq!(listed.resources[0].instance_id, "u1-vm");
  assert_eq!(listed.resources[0].user_id, "u1");

  let missing = facade
    .get_user(bearer(Default::default(), &codec, "u1"))
    .await
    .unwrap_err();
  assert_eq!(missing.code(), Code::NotFound);

  release.release();
  release.release();
  assert!(facade
    .register(Request::new(RegisterReq::default()))
    .await
    .is_err());
}

#[tokio::test]
async fn unreachable_resource_service_fails_setup() {
  let (refused, address) = listener().await;
  drop(refused);
  let config = DownstreamConfig {
    user_addr: spawn_users().await.to_string(),
    resource_addr: address.to_string(),
  };
  match ServiceClients::connect(&config, &QuicSettings::default()).await {
    Err(ConnectError::Dial { service, .. }) => assert_eq!(service, Downstream::Resource),
    Err(other) => panic!("expected a dial error, got {}", other),
    Ok(_) => panic!("setup must fail when the resource service is unreachable"),
  }
}

#[tokio::test]
async fn missing_address_fails_before_dialing() {
  let config = DownstreamConfig {
    user_addr: String::new(),
    resource_addr: "127.0.0.1:1".into(),
  };
  let error = ServiceClients::connect(&config, &QuicSettings::default())
    .await
    .err()
    .unwrap();
  assert_eq!(error.to_string(), "service.user.addr is required");
}
