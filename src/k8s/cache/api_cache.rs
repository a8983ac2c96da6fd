/**
 * Object cache answering list queries straight from the API server.
 *
 * Only partial object metadata is requested, so object bodies never cross the
 * wire. Kinds are resolved once through discovery and memoised.
 */
use super::{ListQuery, ObjectCache};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, ListParams};
use kube::core::GroupVersionKind;
use kube::discovery::{self, Scope};
use kube::Client;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

pub struct ApiServerCache {
    client: Client,
    resources: RwLock<HashMap<String, (ApiResource, Scope)>>,
}

impl ApiServerCache {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: RwLock::new(HashMap::new()),
        }
    }

    async fn resolve(&self, query: &ListQuery) -> Result<(ApiResource, Scope)> {
        let gvk = GroupVersionKind::gvk(&query.group, &query.version, query.kind());
        let memo_key = format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind);

        if let Some(found) = self.resources.read().await.get(&memo_key) {
            return Ok(found.clone());
        }

        debug!("🔍 Discovering {}", memo_key);
        let (resource, capabilities) = discovery::pinned_kind(&self.client, &gvk)
            .await
            .map_err(|source| Error::Probe {
                query: query.to_string(),
                source,
            })?;

        let resolved = (resource, capabilities.scope);
        self.resources
            .write()
            .await
            .insert(memo_key, resolved.clone());
        Ok(resolved)
    }
}

#[async_trait]
impl ObjectCache for ApiServerCache {
    async fn list_names(&self, query: &ListQuery) -> Result<HashSet<String>> {
        let (resource, scope) = self.resolve(query).await?;

        // cluster-scoped kinds ignore a namespace a chart may have set anyway
        let api: Api<DynamicObject> = match (scope, query.namespace.as_deref()) {
            (Scope::Namespaced, Some(namespace)) => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        };

        let list = api
            .list_metadata(&ListParams::default())
            .await
            .map_err(|source| Error::Probe {
                query: query.to_string(),
                source,
            })?;

        debug!("📋 Listed {} objects for {}", list.items.len(), query);
        Ok(list
            .items
            .into_iter()
            .filter_map(|object| object.metadata.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ResourceKey;
    use hyper::http::{Request, Response, StatusCode};
    use k8s_openapi::serde_json::{self, json, Value};
    use kube::client::Body;

    fn respond(status: StatusCode, body: &Value) -> Response<Body> {
        Response::builder()
            .status(status)
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn resource_list(group_version: &str, name: &str, kind: &str, namespaced: bool) -> Value {
        json!({
            "kind": "APIResourceList",
            "apiVersion": "v1",
            "groupVersion": group_version,
            "resources": [{
                "name": name,
                "singularName": "",
                "namespaced": namespaced,
                "kind": kind,
                "verbs": ["get", "list", "watch"]
            }]
        })
    }

    fn metadata_list(names: &[&str]) -> Value {
        let items: Vec<Value> = names
            .iter()
            .map(|name| {
                json!({
                    "apiVersion": "meta.k8s.io/v1",
                    "kind": "PartialObjectMetadata",
                    "metadata": { "name": name }
                })
            })
            .collect();
        json!({
            "apiVersion": "meta.k8s.io/v1",
            "kind": "PartialObjectMetadataList",
            "metadata": { "resourceVersion": "1" },
            "items": items
        })
    }

    #[tokio::test]
    async fn test_lists_namespaced_metadata() {
        let (service, mut handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let server = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("discovery request");
            assert_eq!(request.uri().path(), "/apis/apps/v1");
            send.send_response(respond(
                StatusCode::OK,
                &resource_list("apps/v1", "deployments", "Deployment", true),
            ));

            let (request, send) = handle.next_request().await.expect("list request");
            assert_eq!(request.uri().path(), "/apis/apps/v1/namespaces/ns1/deployments");
            send.send_response(respond(StatusCode::OK, &metadata_list(&["api", "worker"])));

            // discovery is memoised: the second list goes straight to the collection
            let (request, send) = handle.next_request().await.expect("second list request");
            assert_eq!(request.uri().path(), "/apis/apps/v1/namespaces/ns1/deployments");
            send.send_response(respond(StatusCode::OK, &metadata_list(&["api"])));
        });

        let cache = ApiServerCache::new(Client::new(service, "default"));
        let query = ListQuery::for_key(&ResourceKey::new("apps", "v1", "Deployment", "ns1"));

        let names = cache.list_names(&query).await.unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("worker"));

        let names = cache.list_names(&query).await.unwrap();
        assert_eq!(names.len(), 1);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_cluster_scoped_kind_ignores_namespace() {
        let (service, mut handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let server = tokio::spawn(async move {
            let (request, send) = handle.next_request().await.expect("discovery request");
            assert_eq!(request.uri().path(), "/apis/rbac.authorization.k8s.io/v1");
            send.send_response(respond(
                StatusCode::OK,
                &resource_list("rbac.authorization.k8s.io/v1", "clusterroles", "ClusterRole", false),
            ));

            let (request, send) = handle.next_request().await.expect("list request");
            assert_eq!(request.uri().path(), "/apis/rbac.authorization.k8s.io/v1/clusterroles");
            send.send_response(respond(StatusCode::OK, &metadata_list(&["reader"])));
        });

        let cache = ApiServerCache::new(Client::new(service, "default"));
        let query = ListQuery::for_key(&ResourceKey::new(
            "rbac.authorization.k8s.io",
            "v1",
            "ClusterRole",
            "ns1",
        ));

        let names = cache.list_names(&query).await.unwrap();
        assert!(names.contains("reader"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_api_failure_maps_to_probe_error() {
        let (service, mut handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let server = tokio::spawn(async move {
            let (_request, send) = handle.next_request().await.expect("discovery request");
            send.send_response(respond(
                StatusCode::OK,
                &resource_list("v1", "configmaps", "ConfigMap", true),
            ));

            let (_request, send) = handle.next_request().await.expect("list request");
            send.send_response(respond(
                StatusCode::FORBIDDEN,
                &json!({
                    "kind": "Status",
                    "apiVersion": "v1",
                    "metadata": {},
                    "status": "Failure",
                    "message": "configmaps is forbidden",
                    "reason": "Forbidden",
                    "code": 403
                }),
            ));
        });

        let cache = ApiServerCache::new(Client::new(service, "default"));
        let query = ListQuery::for_key(&ResourceKey::new("", "v1", "ConfigMap", "ns1"));

        let err = cache.list_names(&query).await.unwrap_err();
        assert!(matches!(err, Error::Probe { .. }));
        assert!(!err.is_absent_manifest());
        server.await.unwrap();
    }
}
