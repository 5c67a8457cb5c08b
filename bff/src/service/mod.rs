// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
//! The gateway's public RPC surface, authorizing each call and forwarding it downstream
use std::sync::Arc;

use tonic::{metadata::MetadataMap, Request, Response, Status};

use crate::{
  common::{
    auth::{authorize, bearer_from_headers, Claims, CredentialCodec, EffectiveIdentity},
    downstream::ServiceClients,
  },
  proto::{
    bff::user::v1::{
      user_server::{User, UserServer},
      GetUserReply, GetUserReq, ListResourcesReply, ListResourcesReq, LoginReply, LoginReq,
      RegisterReply, RegisterReq, Resource, ResourceSpec,
    },
    service::{resource::v1 as resource_v1, user::v1 as user_v1},
  },
};

mod error;
pub use error::{ContractViolation, FacadeError, ERROR_REASON_KEY};

/// Metadata key of the inbound deadline, copied onto every downstream call
pub const GRPC_TIMEOUT_KEY: &str = "grpc-timeout";

/// Serves `bff.user.v1.User` on top of the downstream service clients
#[derive(Clone)]
pub struct UserFacade {
  clients: ServiceClients,
  codec: Arc<CredentialCodec>,
}

impl UserFacade {
  pub fn new(clients: ServiceClients, codec: Arc<CredentialCodec>) -> Self {
    Self { clients, codec }
  }

  pub fn into_server(self) -> UserServer<Self> {
    UserServer::new(self)
  }

  fn authenticate(&self, metadata: &MetadataMap) -> Result<Claims, FacadeError> {
    let token = bearer_from_headers(metadata)
      .ok_or(FacadeError::Unauthenticated("missing bearer token"))?;
    self
      .codec
      .validate(token)
      .map_err(|_| FacadeError::Unauthenticated("invalid token"))
  }

  /// Resolves the identity a call acts on behalf of
  ///
  /// An empty `requested` identity means the caller itself; anything else must match one
  /// of the caller's claim identities.
  fn authenticate_and_authorize(
    &self,
    metadata: &MetadataMap,
    requested: &str,
  ) -> Result<EffectiveIdentity, FacadeError> {
    let claims = self.authenticate(metadata)?;
    let identity = authorize(&claims, requested).ok_or_else(|| {
      tracing::debug!(requested, "token identity mismatch");
      FacadeError::Unauthorized
    })?;
    if identity.is_empty() {
      return Err(FacadeError::UpstreamContractViolation(
        ContractViolation::EmptyUserId,
      ));
    }
    Ok(identity)
  }

  async fn login_checked(&self, request: Request<LoginReq>) -> Result<LoginReply, FacadeError> {
    let (metadata, _, req) = request.into_parts();
    let reply = self
      .clients
      .user()
      .login(outbound(
        &metadata,
        user_v1::LoginReq {
          email: req.email,
          password: req.password,
        },
      ))
      .await?
      .into_inner();
    if reply.token.is_empty() {
      return Err(FacadeError::UpstreamContractViolation(
        ContractViolation::EmptyLoginToken,
      ));
    }
    if let Err(error) = self.codec.validate(&reply.token) {
      tracing::error!(%error, "downstream login returned invalid token");
      return Err(FacadeError::UpstreamContractViolation(
        ContractViolation::InvalidLoginToken,
      ));
    }
    Ok(LoginReply { token: reply.token })
  }

  async fn get_user_scoped(&self, request: Request<GetUserReq>) -> Result<GetUserReply, FacadeError> {
    let identity = self.authenticate_and_authorize(request.metadata(), &request.get_ref().user_id)?;
    let reply = self
      .clients
      .user()
      .get_user(outbound(
        request.metadata(),
        user_v1::GetUserRequest {
          user_id: identity.into_string(),
        },
      ))
      .await?
      .into_inner();
    Ok(GetUserReply {
      user_id: reply.user_id,
      email: reply.email,
      nickname: reply.nickname,
      user_status: reply.user_status,
    })
  }

  async fn list_resources_scoped(
    &self,
    request: Request<ListResourcesReq>,
  ) -> Result<ListResourcesReply, FacadeError> {
    let (metadata, _, req) = request.into_parts();
    let identity = self.authenticate_and_authorize(&metadata, &req.user_id)?;
    let user_id = identity.into_string();
    let reply = self
      .clients
      .resource()
      .list_resources(outbound(
        &metadata,
        resource_v1::ListResourcesReq {
          user_id: Some(user_id.clone()),
          start: req.start,
          end: req.end,
          r#type: req.r#type,
          field_mask: req.field_mask,
        },
      ))
      .await?
      .into_inner();

    let resources = reply
      .resources
      .into_iter()
      .map(|resource| Resource {
        instance_id: resource.instance_id,
        name: resource.name,
        user_id: user_id.clone(),
        r#type: resource.r#type,
        created_at: resource.created_at,
        updated_at: resource.updated_at,
      })
      .collect();
    let specs = reply
      .specs
      .into_iter()
      .map(|(instance, spec)| {
        (
          instance,
          ResourceSpec {
            instance_id: spec.instance_id,
            cpu_cores: spec.cpu_cores,
            memory_size: spec.memory_size,
            gpu: spec.gpu,
            image: spec.image,
            custom_config: spec.custom_config,
          },
        )
      })
      .collect();
    Ok(ListResourcesReply { resources, specs })
  }
}

impl std::fmt::Debug for UserFacade {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UserFacade")
      .field("clients", &self.clients)
      .finish_non_exhaustive()
  }
}

/// Builds a downstream request, carrying over the caller's deadline
fn outbound<T>(inbound: &MetadataMap, message: T) -> Request<T> {
  let mut request = Request::new(message);
  if let Some(timeout) = inbound.get(GRPC_TIMEOUT_KEY) {
    request
      .metadata_mut()
      .insert(GRPC_TIMEOUT_KEY, timeout.clone());
  }
  request
}

#[tonic::async_trait]
impl User for UserFacade {
  #[tracing::instrument(level = "debug", skip_all)]
  async fn register(
    &self,
    request: Request<RegisterReq>,
  ) -> Result<Response<RegisterReply>, Status> {
    let (metadata, _, req) = request.into_parts();
    let reply = self
      .clients
      .user()
      .register(outbound(
        &metadata,
        user_v1::RegisterReq {
          email: req.email,
          password: req.password,
          nickname: req.nickname,
        },
      ))
      .await?
      .into_inner();
    Ok(Response::new(RegisterReply {
      user_id: reply.user_id,
    }))
  }

  #[tracing::instrument(level = "debug", skip_all)]
  async fn login(&self, request: Request<LoginReq>) -> Result<Response<LoginReply>, Status> {
    Ok(Response::new(self.login_checked(request).await?))
  }

  #[tracing::instrument(level = "debug", skip_all)]
  async fn get_user(&self, request: Request<GetUserReq>) -> Result<Response<GetUserReply>, Status> {
    Ok(Response::new(self.get_user_scoped(request).await?))
  }

  #[tracing::instrument(level = "debug", skip_all)]
  async fn list_resources(
    &self,
    request: Request<ListResourcesReq>,
  ) -> Result<Response<ListResourcesReply>, Status> {
    Ok(Response::new(self.list_resources_scoped(request).await?))
  }
}

#[cfg(test)]
mod tests {
  use std::{collections::HashMap, sync::Arc};

  use futures::FutureExt;
  use tonic::{Code, Request, Response, Status};

  use super::*;
  use crate::{
    common::{
      auth::{Claims, CredentialCodec, SigningKey},
      downstream::{MockResourceDownstream, MockUserDownstream, ServiceClients},
    },
    proto::service::{resource::v1 as resource_v1, user::v1 as user_v1},
  };

  const KEY: &str = "facade-test-key";

  fn codec() -> Arc<CredentialCodec> {
    Arc::new(CredentialCodec::new(&SigningKey::new(KEY)))
  }

  fn facade(user: MockUserDownstream, resource: MockResourceDownstream) -> UserFacade {
    UserFacade::new(
      ServiceClients::new(Arc::new(user), Arc::new(resource)),
      codec(),
    )
  }

  fn token_for(user_id: &str) -> String {
    let claims = Claims {
      user_id: user_id.to_owned(),
      ..Default::default()
    };
    codec().issue(&claims).unwrap()
  }

  fn with_bearer<T>(message: T, token: &str) -> Request<T> {
    let mut request = Request::new(message);
    request
      .metadata_mut()
      .insert("authorization", format!("Bearer {}", token).parse().unwrap());
    request
  }

  fn list_request(user_id: &str) -> ListResourcesReq {
    ListResourcesReq {
      user_id: user_id.to_owned(),
      start: Some(10),
      end: None,
      r#type: Some("gpu".to_owned()),
      field_mask: vec!["name".to_owned()],
    }
  }

  #[tokio::test]
  async fn list_resources_queries_with_the_effective_identity() {
    let mut resource = MockResourceDownstream::new();
    resource
      .expect_list_resources()
      .withf(|request| {
        let req = request.get_ref();
        req.user_id.as_deref() == Some("u1")
          && req.start == Some(10)
          && req.r#type.as_deref() == Some("gpu")
          && req.field_mask == vec!["name".to_owned()]
      })
      .times(1)
      .returning(|_| {
        let reply = resource_v1::ListResourcesReply {
          resources: vec![resource_v1::Resource {
            instance_id: "i-1".into(),
            name: "box".into(),
            user_id: "someone-else".into(),
            r#type: "gpu".into(),
            created_at: 1,
            updated_at: 2,
          }],
          specs: HashMap::from([(
            "i-1".to_owned(),
            resource_v1::ResourceSpec {
              instance_id: "i-1".into(),
              cpu_cores: 4,
              memory_size: 8192,
              gpu: 1,
              image: "ubuntu".into(),
              custom_config: String::new(),
            },
          )]),
        };
        async move { Ok(Response::new(reply)) }.boxed()
      });
    let facade = facade(MockUserDownstream::new(), resource);

    let reply = facade
      .list_resources(with_bearer(list_request(""), &token_for("u1")))
      .await
      .unwrap()
      .into_inner();
    assert_eq!(reply.resources.len(), 1);
    assert_eq!(reply.resources[0].user_id, "u1");
    assert_eq!(reply.resources[0].name, "box");
    assert_eq!(reply.specs["i-1"].cpu_cores, 4);
    assert_eq!(reply.specs["i-1"].memory_size, 8192);
  }

  #[tokio::test]
  async fn mismatched_identity_is_denied_without_downstream_calls() {
    let mut resource = MockResourceDownstream::new();
    resource.expect_list_resources().never();
    let mut user = MockUserDownstream::new();
    user.expect_get_user().never();
    let facade = facade(user, resource);

    let status = facade
      .list_resources(with_bearer(list_request("u2"), &token_for("u1")))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    let status = facade
      .get_user(with_bearer(
        GetUserReq {
          user_id: "u2".into(),
        },
        &token_for("u1"),
      ))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);
  }

  #[tokio::test]
  async fn missing_or_invalid_credentials_are_unauthenticated() {
    let facade = facade(MockUserDownstream::new(), MockResourceDownstream::new());

    let status = facade
      .list_resources(Request::new(list_request("")))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    let status = facade
      .list_resources(with_bearer(list_request(""), "not.a.token"))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    let foreign = CredentialCodec::new(&SigningKey::new("some-other-key"))
      .issue(&Claims {
        user_id: "u1".into(),
        ..Default::default()
      })
      .unwrap();
    let status = facade
      .get_user(with_bearer(GetUserReq::default(), &foreign))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
  }

  #[tokio::test]
  async fn claims_without_identity_cannot_scope_calls() {
    let facade = facade(MockUserDownstream::new(), MockResourceDownstream::new());
    let token = codec().issue(&Claims::default()).unwrap();
    let status = facade
      .list_resources(with_bearer(list_request(""), &token))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(
      status
        .metadata()
        .get(ERROR_REASON_KEY)
        .and_then(|v| v.to_str().ok()),
      Some("EMPTY_USER_ID")
    );
  }

  #[tokio::test]
  async fn get_user_accepts_subject_match_and_forwards_deadline() {
    let mut user = MockUserDownstream::new();
    user
      .expect_get_user()
      .withf(|request| {
        request.get_ref().user_id == "sub-7"
          && request
            .metadata()
            .get(GRPC_TIMEOUT_KEY)
            .and_then(|v| v.to_str().ok())
            == Some("5S")
      })
      .times(1)
      .returning(|_| {
        let reply = user_v1::GetUserReply {
          user_id: "sub-7".into(),
          email: "a@example.com".into(),
          nickname: "a".into(),
          user_status: user_v1::UserStatus::Active as i32,
        };
        async move { Ok(Response::new(reply)) }.boxed()
      });
    let facade = facade(user, MockResourceDownstream::new());

    let mut claims = Claims::default();
    claims.registered.subject = "sub-7".into();
    let token = codec().issue(&claims).unwrap();
    let mut request = with_bearer(
      GetUserReq {
        user_id: "sub-7".into(),
      },
      &token,
    );
    request
      .metadata_mut()
      .insert(GRPC_TIMEOUT_KEY, "5S".parse().unwrap());

    let reply = facade.get_user(request).await.unwrap().into_inner();
    assert_eq!(reply.email, "a@example.com");
    assert_eq!(reply.user_status, user_v1::UserStatus::Active as i32);
  }

  #[tokio::test]
  async fn empty_login_token_is_an_internal_error() {
    let mut user = MockUserDownstream::new();
    user.expect_login().times(1).returning(|_| {
      async {
        Ok(Response::new(user_v1::LoginReply {
          token: String::new(),
        }))
      }
      .boxed()
    });
    let facade = facade(user, MockResourceDownstream::new());

    let status = facade
      .login(Request::new(LoginReq {
        email: "a@example.com".into(),
        password: "pw".into(),
      }))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(
      status
        .metadata()
        .get(ERROR_REASON_KEY)
        .and_then(|v| v.to_str().ok()),
      Some("EMPTY_LOGIN_TOKEN")
    );
  }

  #[tokio::test]
  async fn unparsable_login_token_is_an_internal_error() {
    let mut user = MockUserDownstream::new();
    user.expect_login().returning(|_| {
      async {
        Ok(Response::new(user_v1::LoginReply {
          token: "garbage".into(),
        }))
      }
      .boxed()
    });
    let facade = facade(user, MockResourceDownstream::new());

    let status = facade
      .login(Request::new(LoginReq::default()))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
    assert_eq!(
      status
        .metadata()
        .get(ERROR_REASON_KEY)
        .and_then(|v| v.to_str().ok()),
      Some("INVALID_LOGIN_TOKEN")
    );
  }

  #[tokio::test]
  async fn valid_login_token_is_returned() {
    let token = token_for("u1");
    let issued = token.clone();
    let mut user = MockUserDownstream::new();
    user
      .expect_login()
      .withf(|request| request.get_ref().email == "a@example.com")
      .returning(move |_| {
        let token = issued.clone();
        async move { Ok(Response::new(user_v1::LoginReply { token })) }.boxed()
      });
    let facade = facade(user, MockResourceDownstream::new());

    let reply = facade
      .login(Request::new(LoginReq {
        email: "a@example.com".into(),
        password: "pw".into(),
      }))
      .await
      .unwrap()
      .into_inner();
    assert_eq!(reply.token, token);
  }

  #[tokio::test]
  async fn downstream_failures_pass_through_unchanged() {
    let mut user = MockUserDownstream::new();
    user
      .expect_register()
      .withf(|request| request.get_ref().nickname == "nick")
      .returning(|_| async { Err(Status::already_exists("email taken")) }.boxed());
    let facade = facade(user, MockResourceDownstream::new());

    let status = facade
      .register(Request::new(RegisterReq {
        email: "a@example.com".into(),
        password: "pw".into(),
        nickname: "nick".into(),
      }))
      .await
      .unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);
    assert_eq!(status.message(), "email taken");
  }
}
