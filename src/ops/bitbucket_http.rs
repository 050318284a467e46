use std::time::Duration;

use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use reqwest::header;
use serde::Serialize;
use tracing::debug;

use crate::auth::AuthContext;
use crate::error::Error;
use crate::error::HttpFailure;
use crate::error::Result;

const USER_AGENT: &str = concat!("bbpub/", env!("CARGO_PKG_VERSION"));

/// HTTP client for making Bitbucket Server API requests.
///
/// Every request carries the invocation's `Authorization` header and a JSON
/// content type. Status codes are returned as-is; deciding which ones count as
/// success is left to the caller.
pub struct BitbucketHttpClient {
    http: reqwest::Client,
    authorization: String,
}

/// A response whose body has been read.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn into_failure(self) -> HttpFailure {
        HttpFailure::Status {
            status: self.status,
            body: self.body,
        }
    }
}

impl BitbucketHttpClient {
    pub fn new(auth: &AuthContext, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            authorization: auth.authorization_header_value().to_string(),
        })
    }

    /// Make a GET request
    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<HttpResponse, HttpFailure> {
        self.send(self.request(Method::GET, url).query(query)).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> std::result::Result<HttpResponse, HttpFailure> {
        self.send(self.request(Method::POST, url).json(body)).await
    }

    /// Make a PUT request without a body
    pub async fn put(&self, url: &str) -> std::result::Result<HttpResponse, HttpFailure> {
        self.send(self.request(Method::PUT, url)).await
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(header::AUTHORIZATION, &self.authorization)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<HttpResponse, HttpFailure> {
        let response = request.send().await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "bitbucket response");
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::header;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::matchers::query_param;

    use super::*;
    use crate::auth::Credential;

    fn client() -> BitbucketHttpClient {
        let auth = AuthContext::new(Credential::Token {
            token: "secret".to_string(),
        });
        BitbucketHttpClient::new(&auth, Some(Duration::from_secs(5))).unwrap()
    }

    #[tokio::test]
    async fn test_requests_carry_auth_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/1.0/projects/TEAM/repos/svc"))
            .and(query_param("at", "main"))
            .and(header("Authorization", "Bearer secret"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .get(
                &format!("{}/rest/api/1.0/projects/TEAM/repos/svc", server.uri()),
                &[("at", "main")],
            )
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, "{}");
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let response = client().put(&server.uri()).await.unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(
            response.into_failure().to_string(),
            "403 Forbidden, forbidden"
        );
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // Nothing listens on the discard port.
        let failure = client().get("http://127.0.0.1:9/", &[]).await.unwrap_err();
        assert!(failure.status().is_none());
    }
}
