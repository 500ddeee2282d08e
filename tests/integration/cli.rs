use predicates::prelude::*;
use topology_sync::constants::collections;

use crate::common::{TestStore, read_json};

fn placed_store() -> TestStore {
    let env = TestStore::seeded_blocking().unwrap();
    env.command()
        .args(["set-location", "prod", "aws", "--orchestrator", "cloudify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Placed 'prod'"))
        .stdout(predicate::str::contains("server -> aws-large"));
    env
}

#[test]
fn test_sync_creates_deployment_topology() {
    let env = TestStore::seeded_blocking().unwrap();

    env.command()
        .args(["sync", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployment topology deployment-v1-prod"))
        .stdout(predicate::str::contains("webapp"))
        .stdout(predicate::str::contains("Locations:"))
        .stdout(predicate::str::contains("Substitutions:none"));

    assert!(env.document(collections::DEPLOYMENT_TOPOLOGIES, "deployment-v1-prod").exists());
}

#[test]
fn test_sync_json_output() {
    let env = placed_store();

    let output = env.command().args(["--format", "json", "sync", "prod"]).output().unwrap();
    assert!(output.status.success());

    let configuration: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(configuration["deployment_topology"]["substituted_nodes"]["server"], "aws-large");
    let candidates = configuration["availability"]["available_substitutions"]["server"]
        .as_array()
        .unwrap();
    assert_eq!(candidates.len(), 2);
}

#[test]
fn test_unknown_environment_fails() {
    let env = TestStore::seeded_blocking().unwrap();

    env.command()
        .args(["sync", "staging"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Environment [staging] doesn't exist"));
}

#[test]
fn test_multiple_location_groups_are_rejected() {
    let env = TestStore::seeded_blocking().unwrap();

    env.command()
        .args(["set-location", "prod", "web=aws", "db=gcp", "--orchestrator", "cloudify"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Multiple Location policies not yet supported"));

    // nothing was written
    assert!(!env.document(collections::DEPLOYMENT_TOPOLOGIES, "deployment-v1-prod").exists());
}

#[test]
fn test_unknown_location_is_reported() {
    let env = TestStore::seeded_blocking().unwrap();

    env.command()
        .args(["set-location", "prod", "azure", "--orchestrator", "cloudify"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Location [azure] doesn't exist"));
}

#[test]
fn test_removing_placement() {
    let env = placed_store();

    env.command()
        .args(["set-location", "prod", "--orchestrator", "cloudify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed placement of 'prod'"))
        .stdout(predicate::str::contains("server -> aws-large").not());
}

#[test]
fn test_set_property_updates_node_and_resource() {
    let env = placed_store();

    env.command()
        .args(["set-property", "prod", "server", "size", "M"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated server.size"));

    let resource = read_json(&env.document(collections::RESOURCES, "aws-large"));
    assert_eq!(resource["template"]["properties"]["size"]["value"], "M");

    let derived = read_json(&env.document(collections::DEPLOYMENT_TOPOLOGIES, "deployment-v1-prod"));
    assert_eq!(derived["node_templates"]["server"]["properties"]["size"]["value"], "M");
}

#[test]
fn test_set_property_rejects_invalid_value() {
    let env = placed_store();
    let before = read_json(&env.document(collections::RESOURCES, "aws-large"));

    env.command()
        .args(["set-property", "prod", "server", "size", "XXL"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Property 'size' violates constraint"));

    assert_eq!(read_json(&env.document(collections::RESOURCES, "aws-large")), before);
}

#[test]
fn test_set_capability_property() {
    let env = placed_store();

    env.command()
        .args(["set-property", "prod", "server", "num_cpus", "4", "--capability", "host"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated server.host.num_cpus"));

    let resource = read_json(&env.document(collections::RESOURCES, "aws-large"));
    assert_eq!(resource["template"]["capabilities"]["host"]["properties"]["num_cpus"]["value"], "4");
}

#[test]
fn test_set_property_on_unknown_node_suggests() {
    let env = placed_store();

    env.command()
        .args(["set-property", "prod", "servr", "size", "M"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Did you mean 'server'?"));
}

#[test]
fn test_substitute_binds_another_candidate() {
    let env = placed_store();

    env.command()
        .args(["substitute", "prod", "server", "aws-medium"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Substituted server by aws-medium"))
        .stdout(predicate::str::contains("server -> aws-medium"));

    env.command()
        .args(["substitute", "prod", "server", "gcp-small"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Location resource template [gcp-small] doesn't exist"));
}

#[test]
fn test_set_input() {
    let env = placed_store();

    env.command().args(["set-input", "prod", "flavor=large"]).assert().success();
    let derived = read_json(&env.document(collections::DEPLOYMENT_TOPOLOGIES, "deployment-v1-prod"));
    assert_eq!(derived["input_properties"]["flavor"]["value"], "large");

    env.command()
        .args(["set-input", "prod", "flavour=large"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Did you mean 'flavor'?"));

    env.command()
        .args(["set-input", "prod", "flavor=medium"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("violates constraint"));

    env.command().args(["set-input", "prod", "--unset", "flavor"]).assert().success();
    let derived = read_json(&env.document(collections::DEPLOYMENT_TOPOLOGIES, "deployment-v1-prod"));
    assert!(derived.get("input_properties").is_none());
}

#[test]
fn test_list_and_delete() {
    let env = placed_store();
    let document = env.document(collections::DEPLOYMENT_TOPOLOGIES, "deployment-v1-prod");

    env.command()
        .args(["list", "webapp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deployment-v1-prod"))
        .stdout(predicate::str::contains("locations=[aws]"))
        .stdout(predicate::str::contains("Total: 1"));

    env.command()
        .args(["delete", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 deployment topologies of 'prod'"));
    assert!(!document.exists());

    // listing creates the deployment topology again, without a placement
    env.command()
        .args(["list", "webapp"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deployment-v1-prod"))
        .stdout(predicate::str::contains("locations=[]"));
    assert!(document.exists());

    env.command()
        .args(["list", "catalog"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No deployment topologies derived from 'catalog'"));
}

#[test]
fn test_finalize_prints_resolved_topology() {
    let env = placed_store();

    let output = env.command().args(["finalize", "prod"]).output().unwrap();
    assert!(output.status.success());

    let finalized: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(finalized["id"], "deployment-v1-prod");
    assert_eq!(finalized["node_templates"]["server"]["type"], "aws.Compute");
    assert_eq!(finalized["provider_deployment_properties"]["region"], "us-east-1");
}

#[test]
fn test_configured_user_needs_location_role() {
    let env = TestStore::seeded_blocking().unwrap();
    std::fs::write(env.config_path(), "user = \"mallory\"\n").unwrap();

    env.command()
        .args(["set-location", "prod", "aws", "--orchestrator", "cloudify"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Access denied to location 'aws'"));

    std::fs::write(env.config_path(), "user = \"alice\"\n").unwrap();
    env.command()
        .args(["set-location", "prod", "aws", "--orchestrator", "cloudify"])
        .assert()
        .success();
}
