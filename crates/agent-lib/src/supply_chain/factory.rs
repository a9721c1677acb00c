//! Supply chain factory
//!
//! Builds the templates of every entity kind discovered in the cluster:
//!
//! ```text
//! Service -> ApplicationComponent -> Container -> ContainerPod -> VirtualMachine
//!                                        |             \              ^
//!                                  (controlled by)      -> VirtualDatacenter
//!                                        v
//!                                  ContainerSpec
//! ```

use super::builder::{ExternalEntityLinkBuilder, SupplyChainNodeBuilder};
use super::metadata::{
    MergedEntityMetadata, MergedEntityMetadataBuilder, PROPERTY_CAPACITY, PROPERTY_PEAK,
    PROPERTY_RESIZABLE, PROPERTY_USED,
};
use super::validation::validate_supply_chain;
use super::{
    EntityTemplate, ProviderRelationship, StitchingPropertyType, TemplateCommodity, TemplateType,
};
use crate::error::Result;
use crate::models::{CommodityType, EntityType};
use tracing::debug;

/// Patched on merged nodes so action eligibility follows this probe
pub const ACTION_ELIGIBILITY_FIELD: &str = "actionEligibility";

const FIELDS_CAPACITY: &[&str] = &[PROPERTY_CAPACITY];
const FIELDS_USED_CAPACITY: &[&str] = &[PROPERTY_USED, PROPERTY_CAPACITY];
const FIELDS_USED_CAPACITY_PEAK: &[&str] = &[
    PROPERTY_USED,
    PROPERTY_CAPACITY,
    PROPERTY_PEAK,
    PROPERTY_RESIZABLE,
];

fn vcpu() -> TemplateCommodity {
    TemplateCommodity::new(CommodityType::Vcpu)
}

fn vmem() -> TemplateCommodity {
    TemplateCommodity::new(CommodityType::Vmem)
}

fn vcpu_request() -> TemplateCommodity {
    TemplateCommodity::new(CommodityType::VcpuRequest)
}

fn vmem_request() -> TemplateCommodity {
    TemplateCommodity::new(CommodityType::VmemRequest)
}

fn number_consumers() -> TemplateCommodity {
    TemplateCommodity::new(CommodityType::NumberConsumers)
}

fn vstorage() -> TemplateCommodity {
    TemplateCommodity::new(CommodityType::Vstorage)
}

fn vmpm_access() -> TemplateCommodity {
    TemplateCommodity::with_key(CommodityType::VmpmAccess)
}

fn application() -> TemplateCommodity {
    TemplateCommodity::with_key(CommodityType::Application)
}

/// Keyed quota commodities, sold by nodes and quotas
fn quota_commodities() -> [TemplateCommodity; 4] {
    [
        TemplateCommodity::with_key(CommodityType::VcpuLimitQuota),
        TemplateCommodity::with_key(CommodityType::VmemLimitQuota),
        TemplateCommodity::with_key(CommodityType::VcpuRequestQuota),
        TemplateCommodity::with_key(CommodityType::VmemRequestQuota),
    ]
}

/// Produces the supply chain for one stitching configuration
#[derive(Debug, Clone)]
pub struct SupplyChainFactory {
    stitching: StitchingPropertyType,
    vm_priority: i32,
    vm_template_type: TemplateType,
}

impl SupplyChainFactory {
    pub fn new(stitching: StitchingPropertyType, vm_priority: i32, base: bool) -> Self {
        let vm_template_type = if base {
            TemplateType::Base
        } else {
            TemplateType::Extension
        };
        Self {
            stitching,
            vm_priority,
            vm_template_type,
        }
    }

    /// Create a factory from a configured stitching property name
    pub fn from_property_name(name: &str, vm_priority: i32, base: bool) -> Result<Self> {
        Ok(Self::new(name.parse()?, vm_priority, base))
    }

    pub fn stitching(&self) -> StitchingPropertyType {
        self.stitching
    }

    /// Build and validate all templates, top of the chain first
    pub fn create_supply_chain(&self) -> Result<Vec<EntityTemplate>> {
        let templates = vec![
            self.build_service()?,
            self.build_application()?,
            self.build_container()?,
            self.build_container_spec()?,
            self.build_pod()?,
            self.build_quota()?,
            self.build_node()?,
        ];
        validate_supply_chain(&templates)?;

        for template in &templates {
            debug!(
                entity = %template.entity_type,
                sells = template.sells.len(),
                providers = template.buys.len(),
                "Supply chain node"
            );
        }
        Ok(templates)
    }

    /// Merge rules applied when a node meets its external VM
    pub fn node_merged_entity_metadata(&self) -> Result<MergedEntityMetadata> {
        MergedEntityMetadataBuilder::new()
            .patch_field(ACTION_ELIGIBILITY_FIELD, &[])
            .matching(self.stitching)
            .patch_sold_metadata(CommodityType::Cluster, FIELDS_CAPACITY)
            .patch_sold_metadata(CommodityType::VmpmAccess, FIELDS_CAPACITY)
            .patch_sold_metadata(CommodityType::Vcpu, FIELDS_USED_CAPACITY_PEAK)
            .patch_sold_metadata(CommodityType::Vmem, FIELDS_USED_CAPACITY_PEAK)
            .patch_sold_metadata(CommodityType::VcpuRequest, FIELDS_USED_CAPACITY)
            .patch_sold_metadata(CommodityType::VmemRequest, FIELDS_USED_CAPACITY)
            .patch_sold_metadata(CommodityType::VcpuLimitQuota, FIELDS_USED_CAPACITY)
            .patch_sold_metadata(CommodityType::VmemLimitQuota, FIELDS_USED_CAPACITY)
            .patch_sold_metadata(CommodityType::VcpuRequestQuota, FIELDS_USED_CAPACITY)
            .patch_sold_metadata(CommodityType::VmemRequestQuota, FIELDS_USED_CAPACITY)
            .patch_sold_metadata(CommodityType::NumberConsumers, FIELDS_USED_CAPACITY)
            .patch_sold_metadata(CommodityType::Vstorage, FIELDS_USED_CAPACITY)
            .build()
    }

    fn build_node(&self) -> Result<EntityTemplate> {
        let mut builder = SupplyChainNodeBuilder::new(EntityType::VirtualMachine)
            .priority(self.vm_priority)
            .template_type(self.vm_template_type)
            // sold to pods
            .sells(vcpu())
            .sells(vmem())
            .sells(vcpu_request())
            .sells(vmem_request())
            .sells(vmpm_access())
            .sells(number_consumers())
            .sells(vstorage());
        // sold to quotas
        for commodity in quota_commodities() {
            builder = builder.sells(commodity);
        }

        builder
            .merged_entity_metadata(self.node_merged_entity_metadata()?)
            .create()
    }

    fn build_quota(&self) -> Result<EntityTemplate> {
        let mut builder = SupplyChainNodeBuilder::new(EntityType::VirtualDatacenter);
        for commodity in quota_commodities() {
            builder = builder.sells(commodity);
        }

        let link = ExternalEntityLinkBuilder::link(
            EntityType::VirtualDatacenter,
            EntityType::VirtualMachine,
            ProviderRelationship::LayeredOver,
        )
        .commodity(CommodityType::VcpuLimitQuota, true)
        .commodity(CommodityType::VmemLimitQuota, true)
        .commodity(CommodityType::VcpuRequestQuota, true)
        .commodity(CommodityType::VmemRequestQuota, true)
        .stitching_property(self.stitching)
        .build()?;

        builder
            .buys_from(
                EntityType::VirtualMachine,
                ProviderRelationship::LayeredOver,
                quota_commodities(),
            )
            .connects_to(link)
            .create()
    }

    fn build_pod(&self) -> Result<EntityTemplate> {
        let link = ExternalEntityLinkBuilder::link(
            EntityType::ContainerPod,
            EntityType::VirtualMachine,
            ProviderRelationship::Hosting,
        )
        .commodity(CommodityType::Vcpu, false)
        .commodity(CommodityType::Vmem, false)
        .commodity(CommodityType::VcpuRequest, false)
        .commodity(CommodityType::VmemRequest, false)
        .commodity(CommodityType::NumberConsumers, false)
        .commodity(CommodityType::VmpmAccess, true)
        .commodity(CommodityType::Cluster, true)
        .stitching_property(self.stitching)
        .build()?;

        SupplyChainNodeBuilder::new(EntityType::ContainerPod)
            // sold to containers
            .sells(vcpu())
            .sells(vmem())
            .sells(vmpm_access())
            .buys_from(
                EntityType::VirtualMachine,
                ProviderRelationship::Hosting,
                [
                    vcpu(),
                    vmem(),
                    vcpu_request(),
                    vmem_request(),
                    number_consumers(),
                    vstorage(),
                ],
            )
            .buys_from(
                EntityType::VirtualDatacenter,
                ProviderRelationship::LayeredOver,
                quota_commodities(),
            )
            .connects_to(link)
            .create()
    }

    fn build_container(&self) -> Result<EntityTemplate> {
        SupplyChainNodeBuilder::new(EntityType::Container)
            .sells(vcpu())
            .sells(vmem())
            .sells(application())
            .buys_from(
                EntityType::ContainerPod,
                ProviderRelationship::Hosting,
                [vcpu(), vmem(), vmpm_access()],
            )
            .controlled_by(EntityType::ContainerSpec)
            .create()
    }

    fn build_container_spec(&self) -> Result<EntityTemplate> {
        SupplyChainNodeBuilder::new(EntityType::ContainerSpec)
            .sells(vcpu())
            .sells(vmem())
            .sells(vcpu_request())
            .sells(vmem_request())
            .create()
    }

    fn build_application(&self) -> Result<EntityTemplate> {
        SupplyChainNodeBuilder::new(EntityType::ApplicationComponent)
            // keyed to sell to services
            .sells(application())
            .buys_from(
                EntityType::Container,
                ProviderRelationship::Hosting,
                [vcpu(), vmem(), application()],
            )
            .create()
    }

    fn build_service(&self) -> Result<EntityTemplate> {
        SupplyChainNodeBuilder::new(EntityType::Service)
            .buys_from(
                EntityType::ApplicationComponent,
                ProviderRelationship::LayeredOver,
                [application()],
            )
            .create()
    }
}

/// Build the supply chain for a configured stitching property name with the
/// default node template settings
pub fn build_topology(stitching_property: &str) -> Result<Vec<EntityTemplate>> {
    SupplyChainFactory::from_property_name(stitching_property, -1, false)?.create_supply_chain()
}
