use crate::{ClientConfig, ClientError};
use machinist_schema::{Machine, MachineDraft, MachineId, MachinePatch, Machines};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;

/// Characters left unescaped in a path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Status and body of a response, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Client for the machinist REST API:
/// - `POST /machine/add`      create
/// - `GET  /machine/<id>`     fetch by id
/// - `GET  /machines/<name>`  fetch by name
/// - `GET  /machines`         list all
/// - `PUT  /machine/<id>`     upsert
/// - `POST /machine/<id>`     partial update
pub struct MachineClient {
    config: ClientConfig,
    agent: ureq::Agent,
}

impl MachineClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        let agent = ureq::Agent::new_with_config(agent_config);
        Self { config, agent }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.url)
    }

    /// Send a request and return the response regardless of its status.
    pub fn send_raw(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<RawResponse, ClientError> {
        let url = self.url(path);
        tracing::debug!("{method} {url}");
        let result = match (method, body) {
            ("GET", _) => self.agent.get(&url).call(),
            ("DELETE", _) => self.agent.delete(&url).call(),
            ("POST", body) => self
                .agent
                .post(&url)
                .header("Content-Type", "application/json")
                .send(body.unwrap_or_default().as_bytes()),
            ("PUT", body) => self
                .agent
                .put(&url)
                .header("Content-Type", "application/json")
                .send(body.unwrap_or_default().as_bytes()),
            (other, _) => {
                return Err(ClientError::Http(format!("unsupported method {other}")));
            }
        };
        let mut resp = result.map_err(|e| ClientError::Http(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .body_mut()
            .read_to_string()
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Ok(RawResponse { status, body })
    }

    fn expect<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
        ok: &[u16],
    ) -> Result<(u16, T), ClientError> {
        let resp = self.send_raw(method, path, body)?;
        if ok.contains(&resp.status) {
            let value = serde_json::from_str(&resp.body)?;
            return Ok((resp.status, value));
        }
        if resp.status == 404 {
            return Err(ClientError::NotFound(format!("{path}: {}", resp.body)));
        }
        Err(ClientError::Status {
            code: resp.status,
            body: resp.body,
        })
    }

    pub fn create(&self, draft: &MachineDraft) -> Result<Machine, ClientError> {
        let body = serde_json::to_string(draft)?;
        let (_, machine) = self.expect("POST", "/machine/add", Some(&body), &[201])?;
        Ok(machine)
    }

    pub fn get(&self, id: MachineId) -> Result<Machine, ClientError> {
        let (_, machine) = self.expect("GET", &format!("/machine/{id}"), None, &[200])?;
        Ok(machine)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Vec<Machine>, ClientError> {
        let path = format!("/machines/{}", utf8_percent_encode(name, PATH_SEGMENT));
        let (_, list): (_, Machines) = self.expect("GET", &path, None, &[200])?;
        Ok(list.machines)
    }

    pub fn list(&self) -> Result<Vec<Machine>, ClientError> {
        let (_, list): (_, Machines) = self.expect("GET", "/machines", None, &[200])?;
        Ok(list.machines)
    }

    /// Upsert at `id`. The flag is `true` when the server created the record.
    pub fn upsert(
        &self,
        id: MachineId,
        draft: &MachineDraft,
    ) -> Result<(Machine, bool), ClientError> {
        let body = serde_json::to_string(draft)?;
        let (status, machine) =
            self.expect("PUT", &format!("/machine/{id}"), Some(&body), &[200, 201])?;
        Ok((machine, status == 201))
    }

    pub fn update(&self, id: MachineId, patch: &MachinePatch) -> Result<Machine, ClientError> {
        let body = serde_json::to_string(patch)?;
        self.update_raw(id, &body)
    }

    /// Partial update with a caller-supplied JSON body.
    pub fn update_raw(&self, id: MachineId, json: &str) -> Result<Machine, ClientError> {
        let (_, machine) = self.expect("POST", &format!("/machine/{id}"), Some(json), &[200])?;
        Ok(machine)
    }

    pub fn health(&self) -> Result<(), ClientError> {
        let (_, _status): (_, serde_json::Value) = self.expect("GET", "/health", None, &[200])?;
        Ok(())
    }
}
