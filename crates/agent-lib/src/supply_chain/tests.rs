//! Tests for the supply chain factory and graph validation

use super::*;
use crate::error::ErrorKind;
use crate::models::{CommodityType, EntityType};

fn supply_chain(stitching: StitchingPropertyType) -> Vec<EntityTemplate> {
    SupplyChainFactory::new(stitching, -1, false)
        .create_supply_chain()
        .unwrap()
}

fn template(templates: &[EntityTemplate], entity: EntityType) -> &EntityTemplate {
    templates
        .iter()
        .find(|t| t.entity_type == entity)
        .unwrap()
}

#[test]
fn test_one_template_per_kind() {
    let templates = supply_chain(StitchingPropertyType::Ip);
    let kinds: Vec<EntityType> = templates.iter().map(|t| t.entity_type).collect();

    assert_eq!(
        kinds,
        vec![
            EntityType::Service,
            EntityType::ApplicationComponent,
            EntityType::Container,
            EntityType::ContainerSpec,
            EntityType::ContainerPod,
            EntityType::VirtualDatacenter,
            EntityType::VirtualMachine,
        ]
    );
}

#[test]
fn test_single_root_and_terminal() {
    let templates = supply_chain(StitchingPropertyType::Uuid);

    assert_eq!(roots(&templates), vec![EntityType::Service]);
    assert_eq!(terminals(&templates), vec![EntityType::VirtualMachine]);
    assert!(validate_supply_chain(&templates).is_ok());
}

#[test]
fn test_build_is_deterministic() {
    assert_eq!(
        supply_chain(StitchingPropertyType::Ip),
        supply_chain(StitchingPropertyType::Ip)
    );
    assert_ne!(
        supply_chain(StitchingPropertyType::Ip),
        supply_chain(StitchingPropertyType::Uuid)
    );
}

#[test]
fn test_unsupported_stitching_property_fails_build() {
    let err = build_topology("HOSTNAME").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(
        err.to_string(),
        "stitching property type HOSTNAME is not supported"
    );
}

#[test]
fn test_build_topology_by_name() {
    let templates = build_topology("UUID").unwrap();
    let node = template(&templates, EntityType::VirtualMachine);
    assert_eq!(node.priority, -1);
    assert_eq!(node.template_type, TemplateType::Extension);
}

#[test]
fn test_node_template_settings() {
    let templates = SupplyChainFactory::new(StitchingPropertyType::Ip, 5, true)
        .create_supply_chain()
        .unwrap();
    let node = template(&templates, EntityType::VirtualMachine);

    assert_eq!(node.priority, 5);
    assert_eq!(node.template_type, TemplateType::Base);
    assert_eq!(
        node.sold_types(),
        vec![
            CommodityType::Vcpu,
            CommodityType::Vmem,
            CommodityType::VcpuRequest,
            CommodityType::VmemRequest,
            CommodityType::VmpmAccess,
            CommodityType::NumberConsumers,
            CommodityType::Vstorage,
            CommodityType::VcpuLimitQuota,
            CommodityType::VmemLimitQuota,
            CommodityType::VcpuRequestQuota,
            CommodityType::VmemRequestQuota,
        ]
    );
    assert!(node.buys.is_empty());
}

#[test]
fn test_keyed_commodities() {
    let templates = supply_chain(StitchingPropertyType::Ip);
    let node = template(&templates, EntityType::VirtualMachine);

    for commodity in &node.sells {
        let keyed = matches!(
            commodity.commodity_type,
            CommodityType::VmpmAccess
                | CommodityType::VcpuLimitQuota
                | CommodityType::VmemLimitQuota
                | CommodityType::VcpuRequestQuota
                | CommodityType::VmemRequestQuota
        );
        assert_eq!(commodity.key.is_some(), keyed, "{}", commodity.commodity_type);
    }

    let app = template(&templates, EntityType::ApplicationComponent);
    assert_eq!(app.sells[0].key.as_deref(), Some(FAKE_KEY));
}

#[test]
fn test_pod_buys_and_links_to_node() {
    let templates = supply_chain(StitchingPropertyType::Ip);
    let pod = template(&templates, EntityType::ContainerPod);

    assert_eq!(pod.buys.len(), 2);
    let hosting = &pod.buys[0];
    assert_eq!(hosting.provider, EntityType::VirtualMachine);
    assert_eq!(hosting.relationship, ProviderRelationship::Hosting);
    assert_eq!(hosting.commodities.len(), 6);

    let quota = &pod.buys[1];
    assert_eq!(quota.provider, EntityType::VirtualDatacenter);
    assert_eq!(quota.relationship, ProviderRelationship::LayeredOver);

    assert_eq!(pod.merge_points(), vec![EntityType::VirtualMachine]);

    let link = &pod.external_links[0];
    assert_eq!(link.relationship, ProviderRelationship::Hosting);
    let keyed: Vec<CommodityType> = link
        .commodities
        .iter()
        .filter(|c| c.has_key)
        .map(|c| c.commodity_type)
        .collect();
    assert_eq!(keyed, vec![CommodityType::VmpmAccess, CommodityType::Cluster]);
    assert_eq!(link.probe_entity_property.name, "IpAddress");
    assert_eq!(link.external_entity_property, "VM_IP");
}

#[test]
fn test_quota_links_to_node_by_uuid() {
    let templates = supply_chain(StitchingPropertyType::Uuid);
    let quota = template(&templates, EntityType::VirtualDatacenter);

    assert_eq!(quota.merge_points(), vec![EntityType::VirtualMachine]);
    let link = &quota.external_links[0];
    assert_eq!(link.relationship, ProviderRelationship::LayeredOver);
    assert!(link.commodities.iter().all(|c| c.has_key));
    assert_eq!(link.probe_entity_property.name, "UUID");
    assert_eq!(link.probe_entity_property.description, "UUID of the Node");
    assert_eq!(link.external_entity_property, "VM_UUID");
}

#[test]
fn test_container_spec_is_controller_of_containers() {
    let templates = supply_chain(StitchingPropertyType::Ip);

    let container = template(&templates, EntityType::Container);
    assert_eq!(
        container.connections,
        vec![ConnectedEntity {
            entity: EntityType::ContainerSpec,
            connection: ConnectionType::ControlledBy,
        }]
    );

    let spec = template(&templates, EntityType::ContainerSpec);
    assert!(spec.buys.is_empty());
    assert_eq!(
        spec.sold_types(),
        vec![
            CommodityType::Vcpu,
            CommodityType::Vmem,
            CommodityType::VcpuRequest,
            CommodityType::VmemRequest,
        ]
    );
}

#[test]
fn test_uuid_merged_entity_metadata() {
    let templates = supply_chain(StitchingPropertyType::Uuid);
    let metadata = template(&templates, EntityType::VirtualMachine)
        .merged_entity_metadata
        .as_ref()
        .unwrap();

    assert_eq!(metadata.patched_fields[0].field_name, "actionEligibility");
    assert!(metadata.patched_fields[0].message_path.is_empty());

    assert_eq!(metadata.internal_matching.match_type, MatchingType::String);
    assert_eq!(metadata.internal_matching.property, "Proxy_VM_UUID");
    assert_eq!(metadata.external_matching.match_type, MatchingType::String);
    assert_eq!(metadata.external_matching.property, "id");
    assert!(metadata.external_matching.paths.is_empty());
}

#[test]
fn test_ip_merged_entity_metadata() {
    let templates = supply_chain(StitchingPropertyType::Ip);
    let metadata = template(&templates, EntityType::VirtualMachine)
        .merged_entity_metadata
        .as_ref()
        .unwrap();

    assert_eq!(metadata.internal_matching.match_type, MatchingType::ListString);
    assert_eq!(metadata.internal_matching.property, "Proxy_VM_IP");
    assert_eq!(metadata.internal_matching.delimiter.as_deref(), Some(","));
    assert_eq!(metadata.external_matching.property, "ipAddress");
    assert_eq!(
        metadata.external_matching.paths,
        vec!["virtualMachineData".to_string()]
    );
    assert_eq!(metadata.external_matching.delimiter.as_deref(), Some(","));
}

#[test]
fn test_merged_sold_fields() {
    let templates = supply_chain(StitchingPropertyType::Ip);
    let metadata = template(&templates, EntityType::VirtualMachine)
        .merged_entity_metadata
        .as_ref()
        .unwrap();

    assert_eq!(metadata.commodities_sold.len(), 12);
    assert_eq!(
        metadata.sold_fields(CommodityType::Cluster),
        Some(vec![PROPERTY_CAPACITY])
    );
    assert_eq!(
        metadata.sold_fields(CommodityType::VmpmAccess),
        Some(vec![PROPERTY_CAPACITY])
    );
    assert_eq!(
        metadata.sold_fields(CommodityType::Vmem),
        Some(vec![
            PROPERTY_USED,
            PROPERTY_CAPACITY,
            PROPERTY_PEAK,
            PROPERTY_RESIZABLE
        ])
    );
    for commodity in [
        CommodityType::VcpuRequest,
        CommodityType::VmemRequestQuota,
        CommodityType::NumberConsumers,
        CommodityType::Vstorage,
    ] {
        assert_eq!(
            metadata.sold_fields(commodity),
            Some(vec![PROPERTY_USED, PROPERTY_CAPACITY])
        );
    }
    assert_eq!(metadata.sold_fields(CommodityType::Application), None);
}

#[test]
fn test_cycle_is_rejected() {
    let mut templates = supply_chain(StitchingPropertyType::Ip);
    let node = templates
        .iter_mut()
        .find(|t| t.entity_type == EntityType::VirtualMachine)
        .unwrap();
    node.sells.push(TemplateCommodity::new(CommodityType::Application));
    node.buys.push(ProviderEdge {
        provider: EntityType::Container,
        relationship: ProviderRelationship::Hosting,
        commodities: vec![TemplateCommodity::new(CommodityType::Vcpu)],
    });

    let err = validate_supply_chain(&templates).unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn test_unsold_commodity_is_rejected() {
    let mut templates = supply_chain(StitchingPropertyType::Ip);
    let service = templates
        .iter_mut()
        .find(|t| t.entity_type == EntityType::Service)
        .unwrap();
    service.buys[0]
        .commodities
        .push(TemplateCommodity::new(CommodityType::Vstorage));

    let err = validate_supply_chain(&templates).unwrap_err();
    assert!(err.to_string().contains("does not sell"));
}

#[test]
fn test_orphan_kind_is_rejected() {
    let mut templates = supply_chain(StitchingPropertyType::Ip);
    let container = templates
        .iter_mut()
        .find(|t| t.entity_type == EntityType::Container)
        .unwrap();
    container.connections.clear();

    let err = validate_supply_chain(&templates).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("CONTAINER_SPEC"));
}

#[test]
fn test_duplicate_kind_is_rejected() {
    let mut templates = supply_chain(StitchingPropertyType::Ip);
    templates.push(
        SupplyChainNodeBuilder::new(EntityType::ApplicationComponent)
            .buys_from(
                EntityType::Container,
                ProviderRelationship::Hosting,
                [TemplateCommodity::new(CommodityType::Vcpu)],
            )
            .create()
            .unwrap(),
    );

    let err = validate_supply_chain(&templates).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn test_templates_serialize_for_export() {
    let templates = supply_chain(StitchingPropertyType::Ip);
    let json = serde_json::to_value(&templates).unwrap();

    assert_eq!(json[0]["entity_type"], "SERVICE");
    assert_eq!(json[0]["buys"][0]["relationship"], "LAYERED_OVER");
    assert_eq!(json[6]["template_type"], "EXTENSION");
    assert_eq!(
        json[6]["merged_entity_metadata"]["internal_matching"]["match_type"],
        "LIST_STRING"
    );
}
