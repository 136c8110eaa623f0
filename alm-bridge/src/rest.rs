// Copyright (c) The alm-bridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity services and the ALM REST client.
//!
//! The uploader talks to an [`EntityService`]. [`AlmRestClient`] is the production
//! implementation: a blocking HTTP client that keeps the ALM session cookies and exchanges
//! entities as XML.

mod xml;

use crate::{
    entity::{EntityFields, common},
    errors::RestError,
};
use std::time::Duration;
use tracing::debug;

/// Creates and updates ALM entities.
///
/// `collection` is the REST collection name, e.g. `runs`. Implementations must not retry: errors
/// are returned to the caller as they occurred.
pub trait EntityService {
    /// Creates an entity and returns the fields the server stored, including its `id`.
    fn create(&self, collection: &str, fields: &EntityFields) -> Result<EntityFields, RestError>;

    /// Updates the entity identified by the `id` field in `fields` with the remaining fields.
    fn update(&self, collection: &str, fields: &EntityFields) -> Result<EntityFields, RestError>;
}

impl<T: EntityService + ?Sized> EntityService for &T {
    fn create(&self, collection: &str, fields: &EntityFields) -> Result<EntityFields, RestError> {
        (**self).create(collection, fields)
    }

    fn update(&self, collection: &str, fields: &EntityFields) -> Result<EntityFields, RestError> {
        (**self).update(collection, fields)
    }
}

/// The ALM project a client talks to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlmProject {
    /// The server URL up to and including the context root, e.g. `https://alm.example.com/qcbin`.
    pub server_url: String,
    /// The ALM domain.
    pub domain: String,
    /// The ALM project.
    pub project: String,
}

impl AlmProject {
    fn server(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    fn entity_url(&self, collection: &str, id: Option<&str>) -> String {
        let mut url = format!(
            "{}/rest/domains/{}/projects/{}/{collection}",
            self.server(),
            self.domain,
            self.project,
        );
        if let Some(id) = id {
            url.push('/');
            url.push_str(id);
        }
        url
    }
}

/// A blocking ALM REST client.
#[derive(Debug)]
pub struct AlmRestClient {
    project: AlmProject,
    session: HttpSession,
}

impl AlmRestClient {
    /// Creates a client. Call [`login`](Self::login) before creating entities.
    pub fn new(project: AlmProject, timeout: Duration) -> Self {
        Self {
            project,
            session: HttpSession::new(timeout),
        }
    }

    /// Authenticates and opens a site session.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), RestError> {
        let auth_url = format!(
            "{}/authentication-point/alm-authenticate",
            self.project.server()
        );
        let body = xml::write_authentication(username, password).map_err(|err| {
            RestError::EntityXml {
                url: auth_url.clone(),
                err,
            }
        })?;
        self.session
            .execute(Method::Post, &auth_url, XML_CONTENT, Some(body.as_slice()))?
            .into_success(Method::Post, &auth_url)?;

        let session_url = format!("{}/rest/site-session", self.project.server());
        self.session
            .execute(Method::Post, &session_url, XML_CONTENT, None)?
            .into_success(Method::Post, &session_url)?;

        debug!("logged in to {} as {username}", self.project.server());
        Ok(())
    }

    /// Closes the session.
    pub fn logout(&mut self) -> Result<(), RestError> {
        let url = format!("{}/authentication-point/logout", self.project.server());
        self.session
            .execute(Method::Get, &url, XML_CONTENT, None)?
            .into_success(Method::Get, &url)?;
        self.session.clear_cookies();
        Ok(())
    }

    fn send_entity(
        &self,
        method: Method,
        collection: &str,
        id: Option<&str>,
        fields: &EntityFields,
    ) -> Result<EntityFields, RestError> {
        let url = self.project.entity_url(collection, id);
        let body = xml::write_entity(entity_type(collection), fields).map_err(|err| {
            RestError::EntityXml {
                url: url.clone(),
                err,
            }
        })?;
        let response = self
            .session
            .execute(method, &url, XML_CONTENT, Some(body.as_slice()))?
            .into_success(method, &url)?;
        xml::read_entity(&response.body).map_err(|err| RestError::EntityXml { url, err })
    }
}

impl EntityService for AlmRestClient {
    fn create(&self, collection: &str, fields: &EntityFields) -> Result<EntityFields, RestError> {
        self.send_entity(Method::Post, collection, None, fields)
    }

    fn update(&self, collection: &str, fields: &EntityFields) -> Result<EntityFields, RestError> {
        let id = fields.id().ok_or_else(|| RestError::MissingId {
            collection: collection.to_owned(),
            context: "update",
        })?;
        let mut rest = fields.clone();
        rest.remove(common::ID);
        self.send_entity(Method::Put, collection, Some(id), &rest)
    }
}

/// Returns the entity type for a collection: `runs` → `run`, `test-instances` → `test-instance`.
fn entity_type(collection: &str) -> &str {
    collection.strip_suffix('s').unwrap_or(collection)
}

pub(crate) const XML_CONTENT: &str = "application/xml";
pub(crate) const JSON_CONTENT: &str = "application/json";

/// HTTP methods used by the clients in this crate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

/// A blocking HTTP agent that carries session cookies between requests.
///
/// Cookies set by any response are kept in the agent's cookie jar and sent with later requests
/// to the same host.
#[derive(Debug)]
pub(crate) struct HttpSession {
    agent: ureq::Agent,
}

impl HttpSession {
    pub(crate) fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    pub(crate) fn clear_cookies(&self) {
        self.agent.cookie_jar_lock().clear();
    }

    /// Sends a request.
    ///
    /// Non-success statuses are returned as responses, not errors.
    pub(crate) fn execute(
        &self,
        method: Method,
        url: &str,
        content_type: &str,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, RestError> {
        debug!("{} {url}", method.as_str());

        let result = match method {
            Method::Get => with_headers(self.agent.get(url), content_type).call(),
            Method::Post => {
                let request = with_headers(self.agent.post(url), content_type);
                match body {
                    Some(body) => request.send(body),
                    None => request.send_empty(),
                }
            }
            Method::Put => {
                let request = with_headers(self.agent.put(url), content_type);
                match body {
                    Some(body) => request.send(body),
                    None => request.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|err| RestError::Transport {
            method: method.as_str(),
            url: url.to_owned(),
            err: Box::new(err),
        })?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| RestError::ReadBody {
                url: url.to_owned(),
                err: Box::new(err),
            })?;
        debug!("{} {url} -> {status}", method.as_str());

        Ok(HttpResponse { status, body })
    }
}

fn with_headers<B>(
    request: ureq::RequestBuilder<B>,
    content_type: &str,
) -> ureq::RequestBuilder<B> {
    request
        .header("Content-Type", content_type)
        .header("Accept", content_type)
}

/// A response read to completion.
#[derive(Clone, Debug)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
}

impl HttpResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns self if the status is 2xx, and a [`RestError::Status`] otherwise.
    pub(crate) fn into_success(self, method: Method, url: &str) -> Result<Self, RestError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RestError::Status {
                method: method.as_str(),
                url: url.to_owned(),
                status: self.status,
                body: self.body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread::JoinHandle,
    };
    use test_case::test_case;

    #[test_case("runs", "run")]
    #[test_case("test-instances", "test-instance")]
    #[test_case("test-sets", "test-set")]
    fn entity_types(collection: &str, expected: &str) {
        assert_eq!(entity_type(collection), expected);
    }

    #[test]
    fn entity_urls() {
        let project = AlmProject {
            server_url: "https://alm.example.com/qcbin/".to_owned(),
            domain: "DEFAULT".to_owned(),
            project: "demo".to_owned(),
        };
        assert_eq!(
            project.entity_url("runs", None),
            "https://alm.example.com/qcbin/rest/domains/DEFAULT/projects/demo/runs"
        );
        assert_eq!(
            project.entity_url("runs", Some("17")),
            "https://alm.example.com/qcbin/rest/domains/DEFAULT/projects/demo/runs/17"
        );
    }

    /// Serves one canned response per connection and returns the request heads it saw.
    fn serve(responses: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bound listener");
        let base = format!("http://{}", listener.local_addr().expect("local addr"));
        let handle = std::thread::spawn(move || {
            let mut heads = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().expect("accepted connection");
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.ends_with(b"\r\n\r\n") {
                    let n = stream.read(&mut buf).expect("read request");
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buf[..n]);
                }
                heads.push(String::from_utf8_lossy(&head).to_lowercase());
                stream
                    .write_all(response.as_bytes())
                    .expect("wrote response");
            }
            heads
        });
        (base, handle)
    }

    #[test]
    fn session_replays_cookies_until_cleared() {
        let (base, server) = serve(vec![
            "HTTP/1.1 200 OK\r\nSet-Cookie: QCSession=abc; Path=/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ]);
        let session = HttpSession::new(Duration::from_secs(5));
        for path in ["/login", "/runs", "/after-logout"] {
            if path == "/after-logout" {
                session.clear_cookies();
            }
            let response = session
                .execute(Method::Get, &format!("{base}{path}"), XML_CONTENT, None)
                .expect("request succeeds");
            assert!(response.is_success());
        }

        let heads = server.join().expect("server thread finished");
        assert!(!heads[0].contains("cookie:"), "{}", heads[0]);
        assert!(heads[1].contains("cookie: qcsession=abc"), "{}", heads[1]);
        assert!(!heads[2].contains("cookie:"), "{}", heads[2]);
    }

    #[test]
    fn into_success_keeps_body_on_failure() {
        let response = HttpResponse {
            status: 400,
            body: "<QCRestException/>".to_owned(),
        };
        let err = response
            .into_success(Method::Post, "https://alm/runs")
            .expect_err("400 is not success");
        assert!(
            matches!(&err, RestError::Status { status: 400, body, .. } if body == "<QCRestException/>"),
            "{err:?}"
        );
    }
}
