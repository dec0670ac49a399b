/// Integration tests for the provisioning flow
/// These tests verify:
/// - Model and software selection, including explicit no-match errors
/// - State polling until the target state, with exact call counts
/// - Abort on a reported `error` state before any further API call
/// - Firmware install over created and reused instances
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use labctl::api::{ImageKind, Instance, InstanceState, LabClient};
use labctl::error::LabError;
use labctl::provision::{Provisioner, SoftwareSelector};
use uuid::Uuid;

use crate::fixtures::mock_responses::*;

/// Mock lab API server for provisioning tests
struct LabMockServer {
    server: mockito::ServerGuard,
}

impl LabMockServer {
    async fn new() -> Self {
        Self {
            server: mockito::Server::new_async().await,
        }
    }

    async fn logged_in_client(&mut self) -> LabClient {
        self.server
            .mock("POST", "/v1/auth/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_RESPONSE)
            .create_async()
            .await;

        let mut client = LabClient::new(&self.server.url()).unwrap();
        client.login("api-token").await.unwrap();
        client
    }

    /// Answers every state query from the scripted sequence; the
    /// last entry repeats once the script runs out.
    async fn mock_state_sequence(
        &mut self,
        id: &str,
        states: &'static [&'static str],
        expected_hits: usize,
    ) -> (mockito::Mock, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let mock = self
            .server
            .mock("GET", format!("/v1/instances/{id}/state").as_str())
            .with_status(200)
            .with_body_from_request(move |_request| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                states[n.min(states.len() - 1)].as_bytes().to_vec()
            })
            .expect(expected_hits)
            .create_async()
            .await;
        (mock, counter)
    }
}

fn firmware_fixture() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("firmware.elf");
    std::fs::write(&path, b"\x7fELF-test-image").unwrap();
    (dir, path)
}

fn instance_fixture(state: InstanceState) -> Instance {
    Instance {
        id: INSTANCE_ID.parse().unwrap(),
        name: "fw-smoke-test".to_string(),
        state,
        flavor: "stm32u5-b-u585i-iot02a".to_string(),
        os: Some("1.1.0".to_string()),
    }
}

#[tokio::test]
async fn selects_first_model_matching_flavor_prefix() {
    let mut lab = LabMockServer::new().await;
    let client = lab.logged_in_client().await;
    lab.server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(MODELS_RESPONSE)
        .create_async()
        .await;

    let provisioner = Provisioner::new(&client);
    let model = provisioner.select_model("stm32u5").await.unwrap();
    assert_eq!(model.flavor, "stm32u5-b-u585i-iot02a");
    assert_eq!(model.model, "stm32u5-iot02a");
}

#[tokio::test]
async fn unmatched_flavor_prefix_is_an_explicit_error() {
    let mut lab = LabMockServer::new().await;
    let client = lab.logged_in_client().await;
    lab.server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(MODELS_RESPONSE)
        .create_async()
        .await;

    let provisioner = Provisioner::new(&client);
    let result = provisioner.select_model("imx8").await;
    match result {
        Err(LabError::NoMatchingModel(prefix)) => assert_eq!(prefix, "imx8"),
        other => panic!("expected NoMatchingModel, got {other:?}"),
    }
}

#[tokio::test]
async fn software_prefix_selector_reports_no_match() {
    let mut lab = LabMockServer::new().await;
    let client = lab.logged_in_client().await;
    lab.server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(MODELS_RESPONSE)
        .create_async()
        .await;
    lab.server
        .mock("GET", "/v1/models/stm32u5-iot02a/software")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(SOFTWARE_RESPONSE)
        .create_async()
        .await;

    let provisioner = Provisioner::new(&client);
    let model = provisioner.select_model("stm32u5").await.unwrap();

    let selector = SoftwareSelector::FilenamePrefix("STM32U5-WiFiBasics".to_string());
    let software = provisioner.select_software(&model, &selector).await.unwrap();
    assert_eq!(software.version, "1.1.0");

    let selector = SoftwareSelector::FilenamePrefix("STM32U5-Motor".to_string());
    let result = provisioner.select_software(&model, &selector).await;
    assert!(matches!(result, Err(LabError::NoMatchingSoftware(_))));
}

#[tokio::test]
async fn poll_queries_three_times_for_two_creating_states() {
    let mut lab = LabMockServer::new().await;
    let client = lab.logged_in_client().await;
    let (state_mock, counter) = lab
        .mock_state_sequence(INSTANCE_ID, &["creating", "creating", "on"], 3)
        .await;

    let interval = Duration::from_millis(25);
    let provisioner = Provisioner::new(&client).with_poll_interval(interval);

    let started = Instant::now();
    provisioner
        .wait_for_state(INSTANCE_ID.parse().unwrap(), InstanceState::On)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    state_mock.assert_async().await;
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    // Two waits between the three queries, none before the first
    assert!(elapsed >= interval * 2, "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn error_state_aborts_before_any_further_call() {
    let mut lab = LabMockServer::new().await;
    let client = lab.logged_in_client().await;
    let (state_mock, _) = lab.mock_state_sequence(INSTANCE_ID, &["error"], 1).await;
    let upload_mock = lab
        .server
        .mock("POST", "/v1/images")
        .expect(0)
        .create_async()
        .await;
    let reboot_mock = lab
        .server
        .mock("POST", format!("/v1/instances/{INSTANCE_ID}/reboot").as_str())
        .expect(0)
        .create_async()
        .await;

    let (_dir, firmware) = firmware_fixture();
    let provisioner = Provisioner::new(&client).with_poll_interval(Duration::from_millis(5));
    let result = provisioner
        .install_firmware(
            &instance_fixture(InstanceState::Creating),
            ImageKind::IotFirmware,
            &firmware,
        )
        .await;

    assert!(matches!(result, Err(LabError::InstanceError)));
    state_mock.assert_async().await;
    upload_mock.assert_async().await;
    reboot_mock.assert_async().await;
}

#[tokio::test]
async fn full_flow_creates_instance_and_installs_firmware() {
    let mut lab = LabMockServer::new().await;
    let client = lab.logged_in_client().await;

    lab.server
        .mock("GET", "/v1/projects")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PROJECTS_RESPONSE)
        .create_async()
        .await;
    lab.server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(MODELS_RESPONSE)
        .create_async()
        .await;
    lab.server
        .mock("GET", "/v1/models/stm32u5-iot02a/software")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(SOFTWARE_RESPONSE)
        .create_async()
        .await;
    lab.server
        .mock("GET", "/v1/instances")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(INSTANCES_EMPTY_RESPONSE)
        .create_async()
        .await;
    let create_mock = lab
        .server
        .mock("POST", "/v1/instances")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "name": "fw-smoke-test",
            "project": PROJECT_ID,
            "flavor": "stm32u5-b-u585i-iot02a",
            "os": "1.1.0",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CREATED_INSTANCE_RESPONSE)
        .expect(1)
        .create_async()
        .await;
    // install_firmware: pre-check, wait, post-upload check, reboot wait
    let (state_mock, _) = lab
        .mock_state_sequence(
            INSTANCE_ID,
            &["creating", "creating", "on", "on", "rebooting", "on"],
            6,
        )
        .await;
    let upload_mock = lab
        .server
        .mock("POST", "/v1/images")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let reboot_mock = lab
        .server
        .mock("POST", format!("/v1/instances/{INSTANCE_ID}/reboot").as_str())
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let provisioner = Provisioner::new(&client).with_poll_interval(Duration::from_millis(5));
    let project = provisioner.default_project().await.unwrap();
    assert_eq!(project, PROJECT_ID.parse::<Uuid>().unwrap());

    let model = provisioner.select_model("stm32u5").await.unwrap();
    let software = provisioner
        .select_software(
            &model,
            &SoftwareSelector::FilenamePrefix("STM32U5-WiFiBasics".to_string()),
        )
        .await
        .unwrap();

    let instance = provisioner
        .obtain_instance("fw-smoke-test", project, &model, &software)
        .await
        .unwrap();
    assert_eq!(instance.state, InstanceState::Creating);

    let (_dir, firmware) = firmware_fixture();
    provisioner
        .install_firmware(&instance, ImageKind::IotFirmware, &firmware)
        .await
        .unwrap();

    create_mock.assert_async().await;
    state_mock.assert_async().await;
    upload_mock.assert_async().await;
    reboot_mock.assert_async().await;
}

#[tokio::test]
async fn reused_powered_off_instance_is_started_not_rebooted() {
    let mut lab = LabMockServer::new().await;
    let client = lab.logged_in_client().await;

    let existing = serde_json::json!([{
        "id": INSTANCE_ID,
        "name": "fw-smoke-test",
        "state": "off",
        "flavor": "stm32u5-b-u585i-iot02a",
        "os": "1.0.0",
    }]);
    lab.server
        .mock("GET", "/v1/instances")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(existing.to_string())
        .create_async()
        .await;
    let create_mock = lab
        .server
        .mock("POST", "/v1/instances")
        .expect(0)
        .create_async()
        .await;
    let (state_mock, _) = lab
        .mock_state_sequence(INSTANCE_ID, &["off", "off", "creating", "on"], 4)
        .await;
    let upload_mock = lab
        .server
        .mock("POST", "/v1/images")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let start_mock = lab
        .server
        .mock("POST", format!("/v1/instances/{INSTANCE_ID}/start").as_str())
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let reboot_mock = lab
        .server
        .mock("POST", format!("/v1/instances/{INSTANCE_ID}/reboot").as_str())
        .expect(0)
        .create_async()
        .await;

    let provisioner = Provisioner::new(&client).with_poll_interval(Duration::from_millis(5));

    let model = labctl::api::HardwareModel {
        name: "B-U585I-IOT02A Discovery kit".to_string(),
        model: "stm32u5-iot02a".to_string(),
        flavor: "stm32u5-b-u585i-iot02a".to_string(),
    };
    let software = labctl::api::Software {
        version: "1.1.0".to_string(),
        buildid: None,
        filename: None,
    };
    let instance = provisioner
        .obtain_instance(
            "fw-smoke-test",
            PROJECT_ID.parse().unwrap(),
            &model,
            &software,
        )
        .await
        .unwrap();
    assert_eq!(instance.state, InstanceState::Off);

    let (_dir, firmware) = firmware_fixture();
    provisioner
        .install_firmware(&instance, ImageKind::IotFirmware, &firmware)
        .await
        .unwrap();

    create_mock.assert_async().await;
    state_mock.assert_async().await;
    upload_mock.assert_async().await;
    start_mock.assert_async().await;
    reboot_mock.assert_async().await;
}
