//! Integration tests for the VM state cache over an in-memory fleet.

use std::time::Duration;
use testbed::test_utils::FakeProvider;
use testbed::{Error, Vagrant};

async fn vagrant_over(provider: &FakeProvider) -> Vagrant {
    Vagrant::new(Box::new(provider.clone()), Duration::ZERO)
        .await
        .expect("Failed to create Vagrant")
}

#[tokio::test]
async fn loads_state_once_on_creation() {
    let provider = FakeProvider::new(&[("internet", true), ("pi1", false), ("router1", true)]);
    let vagrant = vagrant_over(&provider).await;

    assert_eq!(provider.status_calls(), 1);
    assert_eq!(vagrant.provider_name(), "fake");
    assert_eq!(vagrant.all_vms(), vec!["internet", "pi1", "router1"]);
    assert_eq!(vagrant.running_vms(), vec!["internet", "router1"]);
    assert!(!vagrant.is_running("pi1").unwrap());
}

#[tokio::test]
async fn up_twice_starts_once() {
    let provider = FakeProvider::new(&[("pi1", false)]);
    let vagrant = vagrant_over(&provider).await;

    vagrant.up("pi1").await.unwrap();
    vagrant.up("pi1").await.unwrap();

    assert_eq!(provider.up_calls(), vec!["pi1"]);
    assert!(vagrant.is_running("pi1").unwrap());
    assert!(provider.is_running("pi1"));
}

#[tokio::test]
async fn down_on_stopped_vm_does_nothing() {
    let provider = FakeProvider::new(&[("pi1", false)]);
    let vagrant = vagrant_over(&provider).await;

    vagrant.down("pi1").await.unwrap();

    assert!(provider.halt_calls().is_empty());
}

#[tokio::test]
async fn cache_only_changes_on_rescan() {
    let provider = FakeProvider::new(&[("pi1", false)]);
    let vagrant = vagrant_over(&provider).await;

    provider.set_running("pi1", true);
    assert!(!vagrant.is_running("pi1").unwrap());

    vagrant.rescan_state().await.unwrap();
    assert!(vagrant.is_running("pi1").unwrap());
    assert_eq!(provider.status_calls(), 2);
}

#[tokio::test]
async fn unknown_vm_is_an_error() {
    let provider = FakeProvider::new(&[("pi1", true)]);
    let vagrant = vagrant_over(&provider).await;

    assert!(matches!(vagrant.is_running("nas1"), Err(Error::UnknownVm(vm)) if vm == "nas1"));
    assert!(matches!(vagrant.up("nas1").await, Err(Error::UnknownVm(_))));
    assert!(provider.up_calls().is_empty());
}

#[tokio::test]
async fn reboot_halts_then_starts_each_vm() {
    let provider = FakeProvider::new(&[("pi1", true), ("pi2", true), ("router1", true)]);
    let vagrant = vagrant_over(&provider).await;

    vagrant.reboot(&["pi1", "pi2"]).await.unwrap();

    assert_eq!(provider.halt_calls(), vec!["pi1", "pi2"]);
    assert_eq!(provider.up_calls(), vec!["pi1", "pi2"]);
    assert_eq!(vagrant.running_vms(), vec!["pi1", "pi2", "router1"]);
}

mod set_states {
    use super::*;

    #[tokio::test]
    async fn brings_everything_else_up() {
        let provider = FakeProvider::new(&[("internet", false), ("pi1", true), ("pi2", true)]);
        let vagrant = vagrant_over(&provider).await;

        assert!(vagrant.set_states(&["pi2"]).await.unwrap());

        assert_eq!(provider.up_calls(), vec!["internet"]);
        assert_eq!(provider.halt_calls(), vec!["pi2"]);
        assert_eq!(vagrant.running_vms(), vec!["internet", "pi1"]);
    }

    #[tokio::test]
    async fn reports_no_change_when_converged() {
        let provider = FakeProvider::new(&[("pi1", true), ("pi2", false)]);
        let vagrant = vagrant_over(&provider).await;

        assert!(!vagrant.set_states(&["pi2"]).await.unwrap());
        assert!(provider.up_calls().is_empty());
        assert!(provider.halt_calls().is_empty());
    }

    #[tokio::test]
    async fn empty_down_list_starts_all() {
        let provider = FakeProvider::new(&[("pi1", false), ("pi2", false)]);
        let vagrant = vagrant_over(&provider).await;

        assert!(vagrant.set_states(&[]).await.unwrap());
        assert_eq!(vagrant.running_vms(), vec!["pi1", "pi2"]);
    }

    #[tokio::test]
    async fn unknown_down_vm_changes_nothing() {
        let provider = FakeProvider::new(&[("pi1", false)]);
        let vagrant = vagrant_over(&provider).await;

        let err = vagrant.set_states(&["pi9"]).await.unwrap_err();
        assert!(matches!(err, Error::UnknownVm(vm) if vm == "pi9"));
        assert!(provider.up_calls().is_empty());
    }
}
