use chrono::{DateTime, Utc};
use isy_parser::responses::{
    merge_variables, parse_config, parse_network_resources, parse_nodes, parse_programs,
    parse_variable_definitions, parse_variable_values,
};
use isy_parser::{
    CommandFrame, HubInfo, NetworkResource, NodeTree, ProgramList, VariableDescriptor,
    VariableType,
};
use rest_client::{Credentials, HubEndpoint, RestClient, RestError};
use tracing::{debug, warn};

use crate::error::{ApiError, Result};

/// Acknowledgement of a command the hub accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Status code reported by the hub
    pub status: u16,
    /// The path that was sent
    pub path: String,
}

/// Everything the hub knows, fetched in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct HubSnapshot {
    pub nodes: NodeTree,
    pub programs: ProgramList,
    /// Empty when variables were not requested
    pub variables: Vec<VariableDescriptor>,
    pub network_resources: Vec<NetworkResource>,
    pub fetched_at: DateTime<Utc>,
}

/// Value of one Z-Wave configuration parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZWaveParameterValue {
    pub parameter: u16,
    pub value: i64,
    pub size: u8,
}

/// Typed access to one hub's REST interface
///
/// Wraps a [`RestClient`] and turns its bodies into parsed records.
#[derive(Debug, Clone)]
pub struct HubClient {
    rest: RestClient,
}

impl HubClient {
    pub fn new(endpoint: HubEndpoint, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(endpoint, credentials)?,
        })
    }

    pub fn with_rest_client(rest: RestClient) -> Self {
        Self { rest }
    }

    pub fn endpoint(&self) -> &HubEndpoint {
        self.rest.endpoint()
    }

    pub fn credentials(&self) -> &Credentials {
        self.rest.credentials()
    }

    pub async fn fetch_config(&self) -> Result<HubInfo> {
        let body = self.rest.get("/rest/config").await?;
        Ok(parse_config(&body)?)
    }

    pub async fn fetch_nodes(&self) -> Result<NodeTree> {
        let body = self.rest.get("/rest/nodes").await?;
        let tree = parse_nodes(&body)?;
        if tree.skipped > 0 {
            warn!(skipped = tree.skipped, "Node listing contained entries without an address");
        }
        Ok(tree)
    }

    pub async fn fetch_programs(&self) -> Result<ProgramList> {
        let body = self.rest.get("/rest/programs?subfolders=true").await?;
        Ok(parse_programs(&body)?)
    }

    /// Both variable types, names joined with values.
    ///
    /// A hub without variables answers 404; that is an empty list.
    pub async fn fetch_variables(&self) -> Result<Vec<VariableDescriptor>> {
        let mut all = Vec::new();
        for var_type in VariableType::ALL {
            let definitions = match self
                .rest
                .get(&format!("/rest/vars/definitions/{}", var_type.code()))
                .await
            {
                Ok(body) => parse_variable_definitions(&body)?,
                Err(RestError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            if definitions.is_empty() {
                continue;
            }
            let values = match self
                .rest
                .get(&format!("/rest/vars/get/{}", var_type.code()))
                .await
            {
                Ok(body) => parse_variable_values(&body)?,
                Err(RestError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            all.extend(merge_variables(var_type, definitions, values));
        }
        debug!(count = all.len(), "Fetched variables");
        Ok(all)
    }

    /// Network resources; hubs without the networking module answer 404.
    pub async fn fetch_network_resources(&self) -> Result<Vec<NetworkResource>> {
        match self.rest.get("/rest/networking/resources").await {
            Ok(body) => Ok(parse_network_resources(&body)?),
            Err(RestError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Full-state query: nodes, programs, variables (when asked for) and
    /// network resources.
    pub async fn fetch_snapshot(&self, include_variables: bool) -> Result<HubSnapshot> {
        let nodes = self.fetch_nodes().await?;
        let programs = self.fetch_programs().await?;
        let variables = if include_variables {
            self.fetch_variables().await?
        } else {
            Vec::new()
        };
        let network_resources = self.fetch_network_resources().await?;

        Ok(HubSnapshot {
            nodes,
            programs,
            variables,
            network_resources,
            fetched_at: Utc::now(),
        })
    }

    /// Send a command frame and return the hub's acknowledgement
    pub async fn execute(&self, frame: &CommandFrame) -> Result<Ack> {
        let path = frame.encode();
        debug!(path = %path, "Executing command");
        let ack = self.rest.command(&path).await?;
        Ok(Ack {
            status: ack.status,
            path,
        })
    }

    /// Read a Z-Wave configuration parameter
    pub async fn query_zwave_parameter(
        &self,
        address: &str,
        parameter: u16,
    ) -> Result<ZWaveParameterValue> {
        let path = crate::commands::zwave_query_frame(address, parameter).encode();
        let ack = self.rest.command(&path).await?;
        let body = ack
            .body
            .ok_or_else(|| ApiError::ParseError("empty parameter response".to_string()))?;

        let attr = |name: &str| -> Result<i64> {
            body.attributes
                .get(name)
                .and_then(|v| v.trim().parse().ok())
                .ok_or_else(|| ApiError::ParseError(format!("config@{} missing or invalid", name)))
        };

        Ok(ZWaveParameterValue {
            parameter: u16::try_from(attr("paramNum")?)
                .map_err(|_| ApiError::ParseError("config@paramNum out of range".to_string()))?,
            value: attr("value")?,
            size: u8::try_from(attr("size")?)
                .map_err(|_| ApiError::ParseError("config@size out of range".to_string()))?,
        })
    }
}
