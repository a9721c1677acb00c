//! Supply chain topology
//!
//! The supply chain declares, per entity kind, the commodities it sells, the
//! commodities it buys from each provider kind, and how it links to entities
//! discovered outside the cluster. It is built once per configuration and
//! handed to the analysis engine alongside discovered entities.

mod builder;
mod factory;
mod metadata;
mod stitching;
mod validation;

#[cfg(test)]
mod tests;

pub use builder::{ExternalEntityLinkBuilder, SupplyChainNodeBuilder};
pub use factory::{build_topology, SupplyChainFactory};
pub use metadata::{
    CommoditySoldMetadata, EntityField, MergedEntityMetadata, MergedEntityMetadataBuilder,
    PROPERTY_CAPACITY, PROPERTY_PEAK, PROPERTY_RESIZABLE, PROPERTY_USED,
};
pub use stitching::{
    EntityPropertyDef, MatchDirection, MatchingType, StitchingLink, StitchingPropertyType,
};
pub use validation::{roots, terminals, validate_supply_chain};

use crate::models::{CommodityType, EntityType};
use serde::Serialize;

/// Placeholder key for commodities that are keyed per entity at discovery
pub const FAKE_KEY: &str = "fake";

/// Commodity as declared in a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateCommodity {
    pub commodity_type: CommodityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl TemplateCommodity {
    pub fn new(commodity_type: CommodityType) -> Self {
        Self {
            commodity_type,
            key: None,
        }
    }

    pub fn with_key(commodity_type: CommodityType) -> Self {
        Self {
            commodity_type,
            key: Some(FAKE_KEY.to_string()),
        }
    }
}

/// How a consumer relates to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderRelationship {
    Hosting,
    LayeredOver,
}

/// Commodities bought from one provider kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderEdge {
    pub provider: EntityType,
    pub relationship: ProviderRelationship,
    pub commodities: Vec<TemplateCommodity>,
}

/// Commodity carried by an external link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkCommodity {
    pub commodity_type: CommodityType,
    pub has_key: bool,
}

/// Link from an entity discovered here to one discovered by another probe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalEntityLink {
    pub buyer: EntityType,
    pub seller: EntityType,
    pub relationship: ProviderRelationship,
    pub commodities: Vec<LinkCommodity>,
    pub probe_entity_property: EntityPropertyDef,
    pub external_entity_property: String,
}

/// Non-commodity relationship between two entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    ControlledBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectedEntity {
    pub entity: EntityType,
    pub connection: ConnectionType,
}

/// Whether a template defines an entity or extends one from another probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateType {
    #[default]
    Base,
    Extension,
}

/// Supply chain node for one entity kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityTemplate {
    pub entity_type: EntityType,
    pub template_type: TemplateType,
    pub priority: i32,
    pub sells: Vec<TemplateCommodity>,
    pub buys: Vec<ProviderEdge>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_links: Vec<ExternalEntityLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<ConnectedEntity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_entity_metadata: Option<MergedEntityMetadata>,
}

impl EntityTemplate {
    pub fn sells_commodity(&self, commodity: &TemplateCommodity) -> bool {
        self.sells.iter().any(|c| c == commodity)
    }

    /// Commodity types sold by this template, in declaration order
    pub fn sold_types(&self) -> Vec<CommodityType> {
        self.sells.iter().map(|c| c.commodity_type).collect()
    }

    /// Provider kinds this template buys from
    pub fn providers(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.buys.iter().map(|edge| edge.provider)
    }

    /// Provider kinds this template both buys from and links to externally.
    /// Entities of these kinds are merged with their external counterparts.
    pub fn merge_points(&self) -> Vec<EntityType> {
        self.providers()
            .filter(|provider| self.external_links.iter().any(|l| l.seller == *provider))
            .collect()
    }
}
