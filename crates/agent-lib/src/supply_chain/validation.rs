//! Structural checks over a set of templates
//!
//! Buy edges point from consumer to provider. A valid supply chain is
//! acyclic and connected, has exactly one root (bought from by nobody) and
//! exactly one terminal (buys from nobody), and every bought commodity is
//! sold by its provider.

use super::EntityTemplate;
use crate::error::{DiscoveryError, Result};
use crate::models::EntityType;
use std::collections::{BTreeSet, HashMap, HashSet};

fn invalid(message: String) -> DiscoveryError {
    DiscoveryError::InvalidSupplyChain(message)
}

fn bought_from(templates: &[EntityTemplate]) -> HashSet<EntityType> {
    templates.iter().flat_map(|t| t.providers()).collect()
}

/// Kinds that buy from a provider but are bought from by nobody
pub fn roots(templates: &[EntityTemplate]) -> Vec<EntityType> {
    let providers = bought_from(templates);
    templates
        .iter()
        .filter(|t| !t.buys.is_empty() && !providers.contains(&t.entity_type))
        .map(|t| t.entity_type)
        .collect()
}

/// Kinds that are bought from but buy from nobody
pub fn terminals(templates: &[EntityTemplate]) -> Vec<EntityType> {
    let providers = bought_from(templates);
    templates
        .iter()
        .filter(|t| t.buys.is_empty() && providers.contains(&t.entity_type))
        .map(|t| t.entity_type)
        .collect()
}

pub fn validate_supply_chain(templates: &[EntityTemplate]) -> Result<()> {
    let by_type = index(templates)?;
    check_edges(templates, &by_type)?;
    check_acyclic(templates, &by_type)?;
    check_connected(templates)?;

    let roots = roots(templates);
    if roots.len() != 1 {
        return Err(invalid(format!("expected one root, found {:?}", roots)));
    }
    let terminals = terminals(templates);
    if terminals.len() != 1 {
        return Err(invalid(format!(
            "expected one terminal, found {:?}",
            terminals
        )));
    }
    Ok(())
}

fn index(templates: &[EntityTemplate]) -> Result<HashMap<EntityType, &EntityTemplate>> {
    let mut by_type = HashMap::new();
    for template in templates {
        if by_type.insert(template.entity_type, template).is_some() {
            return Err(invalid(format!(
                "duplicate template for {}",
                template.entity_type
            )));
        }
    }
    Ok(by_type)
}

fn check_edges(
    templates: &[EntityTemplate],
    by_type: &HashMap<EntityType, &EntityTemplate>,
) -> Result<()> {
    for template in templates {
        for edge in &template.buys {
            let provider = by_type.get(&edge.provider).ok_or_else(|| {
                invalid(format!(
                    "{} buys from {} which has no template",
                    template.entity_type, edge.provider
                ))
            })?;
            for commodity in &edge.commodities {
                if !provider.sells_commodity(commodity) {
                    return Err(invalid(format!(
                        "{} buys {} from {} which does not sell it",
                        template.entity_type, commodity.commodity_type, edge.provider
                    )));
                }
            }
        }
        for connection in &template.connections {
            if !by_type.contains_key(&connection.entity) {
                return Err(invalid(format!(
                    "{} is connected to {} which has no template",
                    template.entity_type, connection.entity
                )));
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    InProgress,
    Done,
}

fn check_acyclic(
    templates: &[EntityTemplate],
    by_type: &HashMap<EntityType, &EntityTemplate>,
) -> Result<()> {
    let mut state: HashMap<EntityType, Visit> = HashMap::new();
    for template in templates {
        visit(template.entity_type, by_type, &mut state)?;
    }
    Ok(())
}

fn visit(
    entity: EntityType,
    by_type: &HashMap<EntityType, &EntityTemplate>,
    state: &mut HashMap<EntityType, Visit>,
) -> Result<()> {
    match state.get(&entity) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::InProgress) => {
            return Err(invalid(format!("cycle through {}", entity)));
        }
        None => {}
    }

    state.insert(entity, Visit::InProgress);
    if let Some(template) = by_type.get(&entity) {
        for provider in template.providers() {
            visit(provider, by_type, state)?;
        }
    }
    state.insert(entity, Visit::Done);
    Ok(())
}

/// Every kind must be reachable from every other over buy edges and
/// connections, ignoring direction
fn check_connected(templates: &[EntityTemplate]) -> Result<()> {
    let mut neighbours: HashMap<EntityType, BTreeSet<EntityType>> = templates
        .iter()
        .map(|t| (t.entity_type, BTreeSet::new()))
        .collect();
    for template in templates {
        let linked = template
            .providers()
            .chain(template.connections.iter().map(|c| c.entity));
        for other in linked {
            neighbours
                .entry(template.entity_type)
                .or_default()
                .insert(other);
            neighbours.entry(other).or_default().insert(template.entity_type);
        }
    }

    for (entity, adjacent) in &neighbours {
        if adjacent.is_empty() && templates.len() > 1 {
            return Err(invalid(format!("{} is not connected to any kind", entity)));
        }
    }

    let Some(start) = templates.first().map(|t| t.entity_type) else {
        return Ok(());
    };
    let mut seen = HashSet::from([start]);
    let mut stack = vec![start];
    while let Some(entity) = stack.pop() {
        for next in neighbours.get(&entity).into_iter().flatten() {
            if seen.insert(*next) {
                stack.push(*next);
            }
        }
    }

    if seen.len() != neighbours.len() {
        return Err(invalid("supply chain is not connected".to_string()));
    }
    Ok(())
}
