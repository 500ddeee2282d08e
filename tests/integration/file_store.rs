use chrono::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;
use topology_sync::constants::{GROUP_ALL, collections};
use topology_sync::core::TopologyError;
use topology_sync::deployment::DeploymentTopologyService;
use topology_sync::models::PropertyValue;
use topology_sync::store::{DeploymentTopologyRepository, FileStore, LocationCatalog};
use topology_sync::test_utils::fixtures::{ENVIRONMENT_ID, ORCHESTRATOR_ID, TOPOLOGY_ID};

use crate::common::{TestStore, read_json};

fn on(location: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(GROUP_ALL.to_string(), location.to_string())])
}

fn service(store: FileStore) -> DeploymentTopologyService<FileStore> {
    DeploymentTopologyService::new(Arc::new(store))
}

#[tokio::test]
async fn test_deployment_topology_is_persisted_as_json() {
    let env = TestStore::seeded().await.unwrap();
    let service = service(env.open());

    let configuration = service.get_deployment_configuration(ENVIRONMENT_ID).await.unwrap();
    let id = &configuration.deployment_topology.id;
    assert_eq!(id, "deployment-v1-prod");

    let document = read_json(&env.document(collections::DEPLOYMENT_TOPOLOGIES, id));
    assert_eq!(document["initial_topology_id"], TOPOLOGY_ID);
    assert_eq!(document["revision"], 1);
    assert!(document["node_templates"]["server"].is_object());
}

#[tokio::test]
async fn test_placement_and_override_survive_reopening() {
    let env = TestStore::seeded().await.unwrap();
    let mut derived = service(env.open())
        .set_location_policies(ENVIRONMENT_ID, ORCHESTRATOR_ID, &on("aws"))
        .await
        .unwrap()
        .deployment_topology;
    let bound = derived.substituted_nodes["server"].clone();

    service(env.open())
        .update_substitution_property(
            &mut derived,
            "server",
            "size",
            Some(PropertyValue::scalar("M")),
        )
        .await
        .unwrap();

    // a new handle on the same directory sees both writes
    let reopened = service(env.open());
    let configuration = reopened.get_deployment_configuration(ENVIRONMENT_ID).await.unwrap();
    assert_eq!(configuration.deployment_topology, derived);
    assert_eq!(configuration.deployment_topology.substituted_nodes["server"], bound);

    let resource = reopened.store().find_resource_template(&bound).await.unwrap().unwrap();
    assert_eq!(resource.template.properties["size"], Some(PropertyValue::scalar("M")));

    let document = read_json(&env.document(collections::RESOURCES, &bound));
    assert_eq!(document["template"]["properties"]["size"]["value"], "M");
}

#[tokio::test]
async fn test_stale_handle_cannot_overwrite_newer_save() {
    let env = TestStore::seeded().await.unwrap();
    let first = service(env.open());
    let second = service(env.open());

    let mut current = first
        .set_location_policies(ENVIRONMENT_ID, ORCHESTRATOR_ID, &on("aws"))
        .await
        .unwrap()
        .deployment_topology;
    let mut stale = current.clone();

    first.update_substitution(&mut current, "server", "aws-medium").await.unwrap();

    let err = second
        .update_substitution_property(&mut stale, "server", "size", Some(PropertyValue::scalar("S")))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TopologyError>(),
        Some(TopologyError::ConcurrentModification { .. })
    ));

    let stored = second.store().find_deployment_topology(&current.id).await.unwrap().unwrap();
    assert_eq!(stored.revision, current.revision);
    assert_eq!(stored.substituted_nodes["server"], "aws-medium");
}

#[tokio::test]
async fn test_concurrent_synchronizations_agree() {
    let env = TestStore::seeded().await.unwrap();
    service(env.open())
        .set_location_policies(ENVIRONMENT_ID, ORCHESTRATOR_ID, &on("gcp"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = env.open();
        handles.push(tokio::spawn(async move {
            service(store).get_deployment_configuration(ENVIRONMENT_ID).await
        }));
    }

    let mut revisions = Vec::new();
    for handle in handles {
        let configuration = handle.await.unwrap().unwrap();
        assert_eq!(configuration.deployment_topology.substituted_nodes["server"], "gcp-small");
        revisions.push(configuration.deployment_topology.revision);
    }
    // nothing changed since placement, so no handle saved a new revision
    assert!(revisions.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_location_change_on_disk_is_picked_up() {
    let env = TestStore::seeded().await.unwrap();
    let placed = service(env.open())
        .set_location_policies(ENVIRONMENT_ID, ORCHESTRATOR_ID, &on("aws"))
        .await
        .unwrap()
        .deployment_topology;

    let store = env.open();
    let mut aws = env.fixture.locations[0].clone();
    aws.last_modified += Duration::days(1);
    store.put(collections::LOCATIONS, &aws.id, &aws).await.unwrap();

    let mut disabled = store.find_resource_template("aws-large").await.unwrap().unwrap();
    disabled.enabled = false;
    store.save_resource_template(&disabled).await.unwrap();

    let configuration = service(store).get_deployment_configuration(ENVIRONMENT_ID).await.unwrap();
    let derived = configuration.deployment_topology;
    assert_eq!(derived.revision, placed.revision + 1);
    assert_eq!(derived.location_sync_timestamp, Some(aws.last_modified));
    assert_eq!(derived.substituted_nodes["server"], "aws-medium");
    assert!(!configuration.availability.available_substitutions["server"].contains("aws-large"));
}

#[tokio::test]
async fn test_delete_removes_documents() {
    let env = TestStore::seeded().await.unwrap();
    let service = service(env.open());
    let derived = service.get_deployment_configuration(ENVIRONMENT_ID).await.unwrap();
    let path = env.document(collections::DEPLOYMENT_TOPOLOGIES, &derived.deployment_topology.id);
    assert!(path.exists());

    assert_eq!(service.delete_by_environment_id(ENVIRONMENT_ID).await.unwrap(), 1);
    assert!(!path.exists());

    // listing recreates the deployment topology of every environment
    let listed = service.list_by_topology_id(TOPOLOGY_ID).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].revision, 1);
    assert!(path.exists());
}

#[tokio::test]
async fn test_override_marks_location_modified_on_disk() {
    let env = TestStore::seeded().await.unwrap();
    let service = service(env.open());
    let mut derived = service
        .set_location_policies(ENVIRONMENT_ID, ORCHESTRATOR_ID, &on("aws"))
        .await
        .unwrap()
        .deployment_topology;

    service
        .update_substitution_property(&mut derived, "server", "size", Some(PropertyValue::scalar("M")))
        .await
        .unwrap();

    let aws = env.open().find_location("aws").await.unwrap().unwrap();
    assert!(aws.last_modified > env.fixture.locations[0].last_modified);
    assert_eq!(derived.location_sync_timestamp, Some(aws.last_modified));
}
