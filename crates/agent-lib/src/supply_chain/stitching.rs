//! Stitching between cluster nodes and externally discovered VMs
//!
//! A node discovered by this agent is a partial view of a VM that an
//! infrastructure probe also discovers. The stitching property decides how
//! the two are matched: by the node's system UUID or by its IP addresses.

use crate::error::{DiscoveryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Probe-side property holding the node UUID
pub const PROXY_VM_UUID: &str = "Proxy_VM_UUID";
/// Probe-side property holding the node IP list
pub const PROXY_VM_IP: &str = "Proxy_VM_IP";

/// Field of the external VM holding its UUID
pub const VM_UUID_FIELD: &str = "id";
/// Field of the external VM holding its IP addresses
pub const VM_IP_FIELD: &str = "ipAddress";
/// Message path leading to `VM_IP_FIELD`
pub const VIRTUAL_MACHINE_DATA_PATH: &str = "virtualMachineData";

/// Delimiter of list-valued matching properties
pub const LIST_DELIMITER: &str = ",";

/// Entity properties named by external links
pub const UUID_PROPERTY: &str = "UUID";
pub const IP_ADDRESS_PROPERTY: &str = "IpAddress";
pub const VM_UUID_SERVER_PROPERTY: &str = "VM_UUID";
pub const VM_IP_SERVER_PROPERTY: &str = "VM_IP";

/// Node property used to find its external counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StitchingPropertyType {
    #[serde(rename = "UUID")]
    Uuid,
    #[default]
    #[serde(rename = "IP")]
    Ip,
}

impl StitchingPropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StitchingPropertyType::Uuid => "UUID",
            StitchingPropertyType::Ip => "IP",
        }
    }

    /// Internal side of the merge: the property this agent publishes
    pub fn internal_matching(&self) -> StitchingLink {
        match self {
            StitchingPropertyType::Uuid => StitchingLink {
                direction: MatchDirection::Internal,
                match_type: MatchingType::String,
                property: PROXY_VM_UUID.to_string(),
                paths: Vec::new(),
                delimiter: None,
            },
            StitchingPropertyType::Ip => StitchingLink {
                direction: MatchDirection::Internal,
                match_type: MatchingType::ListString,
                property: PROXY_VM_IP.to_string(),
                paths: Vec::new(),
                delimiter: Some(LIST_DELIMITER.to_string()),
            },
        }
    }

    /// External side of the merge: the VM field the property is matched to
    pub fn external_matching(&self) -> StitchingLink {
        match self {
            StitchingPropertyType::Uuid => StitchingLink {
                direction: MatchDirection::External,
                match_type: MatchingType::String,
                property: VM_UUID_FIELD.to_string(),
                paths: Vec::new(),
                delimiter: None,
            },
            StitchingPropertyType::Ip => StitchingLink {
                direction: MatchDirection::External,
                match_type: MatchingType::ListString,
                property: VM_IP_FIELD.to_string(),
                paths: vec![VIRTUAL_MACHINE_DATA_PATH.to_string()],
                delimiter: Some(LIST_DELIMITER.to_string()),
            },
        }
    }

    /// Probe entity property definition used by external links
    pub fn probe_entity_property(&self) -> EntityPropertyDef {
        match self {
            StitchingPropertyType::Uuid => EntityPropertyDef {
                name: UUID_PROPERTY.to_string(),
                description: "UUID of the Node".to_string(),
            },
            StitchingPropertyType::Ip => EntityPropertyDef {
                name: IP_ADDRESS_PROPERTY.to_string(),
                description: "IP of the Node".to_string(),
            },
        }
    }

    /// Server entity property used by external links
    pub fn external_entity_property(&self) -> &'static str {
        match self {
            StitchingPropertyType::Uuid => VM_UUID_SERVER_PROPERTY,
            StitchingPropertyType::Ip => VM_IP_SERVER_PROPERTY,
        }
    }
}

impl fmt::Display for StitchingPropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StitchingPropertyType {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "UUID" => Ok(StitchingPropertyType::Uuid),
            "IP" => Ok(StitchingPropertyType::Ip),
            other => Err(DiscoveryError::UnsupportedStitchingProperty(other.to_string())),
        }
    }
}

/// Side of a merge a matching property belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchDirection {
    Internal,
    External,
}

/// Shape of a matching value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchingType {
    /// A single string
    String,
    /// A delimited list of strings
    ListString,
}

/// One side of a merge: which property is matched and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchingLink {
    pub direction: MatchDirection,
    pub match_type: MatchingType,
    pub property: String,
    /// Message path to the property; empty for top-level fields
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

/// Named entity property with a description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPropertyDef {
    pub name: String,
    pub description: String,
}
