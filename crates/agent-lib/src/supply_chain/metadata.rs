//! Merged entity metadata
//!
//! Describes how a node fragment discovered here is reconciled with the VM
//! discovered by an infrastructure probe: which properties are matched, and
//! which fields of each sold commodity the cluster view contributes.

use super::{StitchingLink, StitchingPropertyType};
use crate::error::{DiscoveryError, Result};
use crate::models::CommodityType;
use serde::Serialize;

pub const PROPERTY_USED: &str = "used";
pub const PROPERTY_CAPACITY: &str = "capacity";
pub const PROPERTY_PEAK: &str = "peak";
pub const PROPERTY_RESIZABLE: &str = "resizable";

/// A field of the entity message, addressed by name and message path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityField {
    pub field_name: String,
    pub message_path: Vec<String>,
}

impl EntityField {
    pub fn top_level(field_name: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            message_path: Vec::new(),
        }
    }
}

/// Commodity fields patched onto the merged entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommoditySoldMetadata {
    pub commodity_type: CommodityType,
    pub fields: Vec<EntityField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedEntityMetadata {
    pub patched_fields: Vec<EntityField>,
    pub internal_matching: StitchingLink,
    pub external_matching: StitchingLink,
    pub commodities_sold: Vec<CommoditySoldMetadata>,
}

impl MergedEntityMetadata {
    /// Patched field names of `commodity_type`, if it is merged at all
    pub fn sold_fields(&self, commodity_type: CommodityType) -> Option<Vec<&str>> {
        self.commodities_sold
            .iter()
            .find(|c| c.commodity_type == commodity_type)
            .map(|c| c.fields.iter().map(|f| f.field_name.as_str()).collect())
    }
}

#[derive(Default)]
pub struct MergedEntityMetadataBuilder {
    patched_fields: Vec<EntityField>,
    internal_matching: Option<StitchingLink>,
    external_matching: Option<StitchingLink>,
    commodities_sold: Vec<CommoditySoldMetadata>,
}

impl MergedEntityMetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patch_field(mut self, field_name: &str, message_path: &[&str]) -> Self {
        self.patched_fields.push(EntityField {
            field_name: field_name.to_string(),
            message_path: message_path.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    /// Match on both sides using the links of `stitching`
    pub fn matching(mut self, stitching: StitchingPropertyType) -> Self {
        self.internal_matching = Some(stitching.internal_matching());
        self.external_matching = Some(stitching.external_matching());
        self
    }

    pub fn patch_sold_metadata(mut self, commodity_type: CommodityType, fields: &[&str]) -> Self {
        self.commodities_sold.push(CommoditySoldMetadata {
            commodity_type,
            fields: fields.iter().map(|f| EntityField::top_level(f)).collect(),
        });
        self
    }

    pub fn build(self) -> Result<MergedEntityMetadata> {
        match (self.internal_matching, self.external_matching) {
            (Some(internal_matching), Some(external_matching)) => Ok(MergedEntityMetadata {
                patched_fields: self.patched_fields,
                internal_matching,
                external_matching,
                commodities_sold: self.commodities_sold,
            }),
            _ => Err(DiscoveryError::InvalidSupplyChain(
                "merged entity metadata needs internal and external matching".to_string(),
            )),
        }
    }
}
