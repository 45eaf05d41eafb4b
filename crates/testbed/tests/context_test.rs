//! Integration tests for the [`Testbed`] context assembled from scripted parts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use testbed::test_utils::{FakeProvider, ScriptedRunner, StubHttpServer};
use testbed::{
    CommandOutput, DeploymentConfig, Error, Inventory, Settings, TestDecl, Testbed, Timings,
    Vagrant, reachability,
};

const INVENTORY: &str = "\
# Generated by Vagrant
internet ansible_host=127.0.0.1 ansible_port=2200
pi1 ansible_host=127.0.0.1 ansible_port=2201
pi2 ansible_host=127.0.0.1 ansible_port=2202
router1 ansible_host=127.0.0.1 ansible_port=2203
";

const CONFIG: &str = r#"{
  "addrs": {
    "internet": "127.0.0.1",
    "pi1": "10.0.1.10",
    "router1_lan": "10.0.1.1"
  },
  "masks": {
    "router1_lan": "10.0.1.0/24"
  }
}"#;

struct Fixture {
    testbed: Testbed,
    provider: FakeProvider,
    runners: BTreeMap<String, Arc<ScriptedRunner>>,
    _dir: tempfile::TempDir,
}

async fn fixture(settings: Settings, running: &[(&str, bool)]) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let inventory_path = dir.path().join("inventory");
    let config_path = dir.path().join("config.json");
    std::fs::write(&inventory_path, INVENTORY).unwrap();
    std::fs::write(&config_path, CONFIG).unwrap();

    let inventory = Inventory::load(&inventory_path).unwrap();
    let config = DeploymentConfig::load(&config_path).unwrap();

    let runners: BTreeMap<String, Arc<ScriptedRunner>> = inventory
        .hostnames()
        .into_iter()
        .map(|name| (name.clone(), Arc::new(ScriptedRunner::new(name))))
        .collect();
    let hosts = runners
        .iter()
        .map(|(name, runner)| (name.clone(), runner.session()))
        .collect();

    let provider = FakeProvider::new(running);
    let vagrant = Vagrant::new(Box::new(provider.clone()), Duration::ZERO)
        .await
        .unwrap();

    Fixture {
        testbed: Testbed::from_parts(settings, inventory, hosts, config, vagrant),
        provider,
        runners,
        _dir: dir,
    }
}

fn quiet_settings() -> Settings {
    Settings::default().with_timings(Timings::none())
}

fn all_up() -> Vec<(&'static str, bool)> {
    vec![("internet", true), ("pi1", true), ("pi2", true), ("router1", true)]
}

#[tokio::test]
async fn registry_lookups() {
    let fx = fixture(quiet_settings(), &all_up()).await;
    let testbed = &fx.testbed;

    assert_eq!(testbed.addr("router1_lan").unwrap().to_string(), "10.0.1.1");
    assert_eq!(testbed.mask("router1_lan").unwrap().to_string(), "10.0.1.0/24");
    assert!(matches!(testbed.addr("pi9"), Err(Error::UnknownAddr(_))));
    assert!(matches!(testbed.mask("pi1"), Err(Error::UnknownMask(_))));
    assert!(matches!(testbed.host("nas1"), Err(Error::UnknownHost(_))));
    assert_eq!(testbed.hosts().len(), 4);
}

#[tokio::test]
async fn hosts_pick_up_settings_timings() {
    let fx = fixture(quiet_settings(), &all_up()).await;

    assert_eq!(*fx.testbed.host("pi1").unwrap().timings(), Timings::none());
}

#[tokio::test]
async fn hosts_grouped_by_type() {
    let fx = fixture(quiet_settings(), &all_up()).await;

    let by_type = fx.testbed.hosts_by_type().unwrap();
    let names: BTreeMap<&str, Vec<&str>> = by_type
        .iter()
        .map(|(host_type, hosts)| {
            (
                host_type.as_str(),
                hosts.iter().map(|(name, _)| name.as_str()).collect(),
            )
        })
        .collect();
    assert_eq!(names["pi"], vec!["pi1", "pi2"]);
    assert_eq!(names["router"], vec!["router1"]);
    assert_eq!(names["internet"], vec!["internet"]);
}

#[tokio::test]
async fn prepare_converges_fleet_for_each_case() {
    let fx = fixture(quiet_settings(), &all_up()).await;

    let cases = TestDecl::new("test_firewall")
        .for_hosts(&["pi1"])
        .unwrap()
        .vms_down(&["pi2"])
        .expand();
    fx.testbed.prepare(&cases[0]).await.unwrap();

    assert_eq!(fx.provider.halt_calls(), vec!["pi2"]);
    assert_eq!(fx.testbed.vagrant().running_vms(), vec!["internet", "pi1", "router1"]);
    assert!(!fx.testbed.ensure_vm_state(&["pi2"]).await.unwrap());
    assert!(fx.testbed.ensure_vm_state::<&str>(&[]).await.unwrap());
    assert_eq!(fx.provider.up_calls(), vec!["pi2"]);
}

#[tokio::test]
async fn net_probes_through_host_sessions() {
    let fx = fixture(quiet_settings(), &[("pi1", true), ("internet", false)]).await;
    fx.runners["pi1"].add_rule("ping -W 1 -c 1 10.0.1.10", CommandOutput::success(""));
    fx.runners["pi1"].add_rule("ping -W 1 -c 1 10.0.1.1", CommandOutput::success(""));
    fx.runners["pi1"].add_rule("ping", CommandOutput::failure(1, ""));

    fx.testbed
        .net()
        .assert_reachability(&reachability([("pi1", &["pi1", "router1_lan"][..])]))
        .await
        .unwrap();

    assert_eq!(fx.runners["pi1"].count("ping"), 3);
    assert!(fx.runners["internet"].commands().is_empty());
}

#[tokio::test]
async fn email_is_handed_out_cleared() {
    let server = StubHttpServer::start().await.unwrap();
    server.respond("DELETE", "/api/emails", 200, "");
    let mut settings = quiet_settings();
    settings.email_port = server.port();
    let fx = fixture(settings, &all_up()).await;

    let email = fx.testbed.email().await.unwrap();

    assert_eq!(email.base_url(), format!("http://127.0.0.1:{}", server.port()));
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "DELETE");
}

#[tokio::test]
async fn mockserver_is_handed_out_reset() {
    let server = StubHttpServer::start().await.unwrap();
    server.respond("PUT", "/reset", 200, "");
    server.respond("PUT", "/expectation", 201, "[]");
    let mut settings = quiet_settings();
    settings.mockserver_port = server.port();
    let fx = fixture(settings, &all_up()).await;

    fx.testbed.mockserver().await.unwrap();

    let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/reset", "/expectation"]);
}
