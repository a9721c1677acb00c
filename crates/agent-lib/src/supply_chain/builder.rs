//! Builders for supply chain nodes and external links

use super::{
    ConnectedEntity, ConnectionType, EntityTemplate, ExternalEntityLink, LinkCommodity,
    MergedEntityMetadata, ProviderEdge, ProviderRelationship, StitchingPropertyType,
    TemplateCommodity, TemplateType,
};
use crate::error::{DiscoveryError, Result};
use crate::models::{CommodityType, EntityType};

/// Builder for one `EntityTemplate`
pub struct SupplyChainNodeBuilder {
    entity_type: EntityType,
    template_type: TemplateType,
    priority: i32,
    sells: Vec<TemplateCommodity>,
    buys: Vec<ProviderEdge>,
    external_links: Vec<ExternalEntityLink>,
    connections: Vec<ConnectedEntity>,
    merged_entity_metadata: Option<MergedEntityMetadata>,
}

impl SupplyChainNodeBuilder {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            template_type: TemplateType::Base,
            priority: 0,
            sells: Vec::new(),
            buys: Vec::new(),
            external_links: Vec::new(),
            connections: Vec::new(),
            merged_entity_metadata: None,
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn template_type(mut self, template_type: TemplateType) -> Self {
        self.template_type = template_type;
        self
    }

    pub fn sells(mut self, commodity: TemplateCommodity) -> Self {
        self.sells.push(commodity);
        self
    }

    /// Declare a provider and the commodities bought from it. Repeated calls
    /// for the same provider extend its edge.
    pub fn buys_from(
        mut self,
        provider: EntityType,
        relationship: ProviderRelationship,
        commodities: impl IntoIterator<Item = TemplateCommodity>,
    ) -> Self {
        let commodities = commodities.into_iter();
        match self.buys.iter_mut().find(|edge| edge.provider == provider) {
            Some(edge) => edge.commodities.extend(commodities),
            None => self.buys.push(ProviderEdge {
                provider,
                relationship,
                commodities: commodities.collect(),
            }),
        }
        self
    }

    pub fn connects_to(mut self, link: ExternalEntityLink) -> Self {
        self.external_links.push(link);
        self
    }

    pub fn controlled_by(mut self, entity: EntityType) -> Self {
        self.connections.push(ConnectedEntity {
            entity,
            connection: ConnectionType::ControlledBy,
        });
        self
    }

    pub fn merged_entity_metadata(mut self, metadata: MergedEntityMetadata) -> Self {
        self.merged_entity_metadata = Some(metadata);
        self
    }

    pub fn create(self) -> Result<EntityTemplate> {
        for edge in &self.buys {
            if edge.provider == self.entity_type {
                return Err(DiscoveryError::InvalidSupplyChain(format!(
                    "{} cannot buy from itself",
                    self.entity_type
                )));
            }
            if edge.commodities.is_empty() {
                return Err(DiscoveryError::InvalidSupplyChain(format!(
                    "{} buys nothing from {}",
                    self.entity_type, edge.provider
                )));
            }
        }
        for link in &self.external_links {
            if link.buyer != self.entity_type {
                return Err(DiscoveryError::InvalidSupplyChain(format!(
                    "external link buyer {} does not match template {}",
                    link.buyer, self.entity_type
                )));
            }
        }

        Ok(EntityTemplate {
            entity_type: self.entity_type,
            template_type: self.template_type,
            priority: self.priority,
            sells: self.sells,
            buys: self.buys,
            external_links: self.external_links,
            connections: self.connections,
            merged_entity_metadata: self.merged_entity_metadata,
        })
    }
}

/// Builder for an `ExternalEntityLink`
pub struct ExternalEntityLinkBuilder {
    buyer: EntityType,
    seller: EntityType,
    relationship: ProviderRelationship,
    commodities: Vec<LinkCommodity>,
    stitching: Option<StitchingPropertyType>,
}

impl ExternalEntityLinkBuilder {
    pub fn link(buyer: EntityType, seller: EntityType, relationship: ProviderRelationship) -> Self {
        Self {
            buyer,
            seller,
            relationship,
            commodities: Vec::new(),
            stitching: None,
        }
    }

    pub fn commodity(mut self, commodity_type: CommodityType, has_key: bool) -> Self {
        self.commodities.push(LinkCommodity {
            commodity_type,
            has_key,
        });
        self
    }

    /// Use the probe and server properties of `stitching` to match entities
    pub fn stitching_property(mut self, stitching: StitchingPropertyType) -> Self {
        self.stitching = Some(stitching);
        self
    }

    pub fn build(self) -> Result<ExternalEntityLink> {
        let stitching = self.stitching.ok_or_else(|| {
            DiscoveryError::InvalidSupplyChain(format!(
                "link {} -> {} has no stitching property",
                self.buyer, self.seller
            ))
        })?;
        if self.commodities.is_empty() {
            return Err(DiscoveryError::InvalidSupplyChain(format!(
                "link {} -> {} carries no commodities",
                self.buyer, self.seller
            )));
        }

        Ok(ExternalEntityLink {
            buyer: self.buyer,
            seller: self.seller,
            relationship: self.relationship,
            commodities: self.commodities,
            probe_entity_property: stitching.probe_entity_property(),
            external_entity_property: stitching.external_entity_property().to_string(),
        })
    }
}
