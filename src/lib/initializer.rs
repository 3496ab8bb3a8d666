//! # initializer.rs
//!
//! Loads the sample lab locations and their sensor nodes into an empty
//! deployment. Runs through the registry so the same validation and
//! uniqueness rules apply as for dashboard requests, which also makes a
//! second run harmless.

use log::{error, info, warn};
use crate::lib::registry;
use crate::lib::store::HiveStore;
use crate::structs::location::{Level, LocationInput};
use crate::structs::node::NodeInput;


struct SampleSite {
    location: &'static str,
    room: &'static str,
    description: &'static str,
    node: &'static str,
    ip_address: &'static str,
    mac_address: &'static str,
    storage_size: i32,
}

const BUILDING: &str = "245";
const LEVEL: &str = "3";

const SAMPLE_SITES: [SampleSite; 3] = [
    SampleSite {
        location: "LOC001",
        room: "3.064",
        description: "Cyber Security and Networking Lab A",
        node: "Lab A - Mehlam",
        ip_address: "10.51.33.101",
        mac_address: "B8:27:EB:12:34:56",
        storage_size: 16,
    },
    SampleSite {
        location: "LOC002",
        room: "3.063",
        description: "Cyber Security and Networking Lab B",
        node: "Lab B - Cameron",
        ip_address: "100.64.0.2",
        mac_address: "00:e0:4c:36:05:dc",
        storage_size: 16,
    },
    SampleSite {
        location: "LOC003",
        room: "3.062",
        description: "Mixed and Augmented Reality Studio Lab G",
        node: "Lab G - Nasrin",
        ip_address: "134.115.149.49",
        mac_address: "00:e0:4c:36:05:cf",
        storage_size: 32,
    },
];

impl SampleSite {
    fn location_input(&self) -> LocationInput {
        LocationInput {
            name: Some(self.location.into()),
            building: Some(BUILDING.into()),
            level: Some(Level::Text(LEVEL.into())),
            room: Some(self.room.into()),
            description: Some(self.description.into()),
        }
    }

    fn node_input(&self, location_id: Option<String>) -> NodeInput {
        NodeInput {
            name: Some(self.node.into()),
            ip_address: Some(self.ip_address.into()),
            mac_address: Some(self.mac_address.into()),
            model: Some("Raspberry Pi Zero W".into()),
            brand: Some("Raspberry Pi Foundation".into()),
            ram_size: Some(512),
            ram_unit: Some("MB".into()),
            storage_size: Some(self.storage_size),
            storage_unit: Some("GB".into()),
            storage_type: Some("microSD".into()),
            is_poe_compatible: Some(true),
            is_wireless_connectivity: Some(true),
            location_id,
            location: None,
        }
    }
}


/// Seeds the sample sites. Conflicting nodes (already seeded, or edited on
/// the dashboard since) are skipped with a warning; store failures abort.
pub async fn seed_sample_data(store: &dyn HiveStore) -> anyhow::Result<()> {
    let mut created = 0;
    for site in &SAMPLE_SITES {
        let location = registry::create_location(store, site.location_input()).await?;
        let location_id = location.location().id.map(|id| id.to_hex());

        match registry::create_node(store, site.node_input(location_id)).await {
            Ok(node) => {
                created += 1;
                info!("Seeded node '{}' at {}", node.name, site.location);
            }
            Err(e) if e.is_conflict() => warn!("Skipping sample node '{}': {}", site.node, e),
            Err(e) => {
                error!("Failed to seed sample node '{}': {}", site.node, e);
                return Err(e.into());
            }
        }
    }
    info!("Sample data ready ({} new nodes)", created);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::lib::memory_store::MemoryStore;

    #[tokio::test]
    async fn seeding_twice_leaves_three_sites() {
        let store = MemoryStore::new();
        seed_sample_data(&store).await.unwrap();
        seed_sample_data(&store).await.unwrap();

        assert_eq!(registry::list_locations(&store).await.unwrap().len(), 3);
        let nodes = registry::list_nodes(&store, Utc::now()).await.unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| n.location_id.is_some()));
        assert!(nodes.iter().any(|n| n.mac_address == "00:E0:4C:36:05:DC"));
    }
}
