mod helpers;

use assert_cmd::Command;
use fanout::core::{ChannelType, NotificationAction};
use helpers::scenario_file::ScenarioFile;
use helpers::Org;
use predicates::prelude::*;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fanout() -> Command {
    let mut cmd = Command::cargo_bin("fanout").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_resolve_prints_sorted_email_addresses() {
    let org = Org::new();
    let action = NotificationAction {
        references: vec![org.carol.entity_ref()],
        notify_owners: true,
        ..Default::default()
    };
    let scenario = ScenarioFile::write(&org, action, Vec::new(), None);

    fanout()
        .arg("resolve")
        .arg(scenario.file.path())
        .args(["--channel", "email"])
        .assert()
        .success()
        .stdout("alice@example.com\ncarol@example.com\ndata@example.com\n");
}

#[test]
fn test_resolve_webhook_channel() {
    let org = Org::new();
    let action = NotificationAction {
        notify_followers: true,
        ..Default::default()
    };
    let scenario = ScenarioFile::write(&org, action, Vec::new(), None);

    fanout()
        .arg("resolve")
        .arg(scenario.file.path())
        .args(["--channel", "slack"])
        .assert()
        .success()
        .stdout("https://hooks.slack.com/bob\n");
}

#[test]
fn test_assignees_expands_teams() {
    let org = Org::new();
    let assignees = vec![org.data_team.entity_ref(), org.carol.entity_ref()];
    let mut expected = vec![org.bob.id, org.carol.id];
    expected.sort();
    let scenario = ScenarioFile::write(&org, NotificationAction::default(), assignees, None);

    fanout()
        .arg("assignees")
        .arg(scenario.file.path())
        .assert()
        .success()
        .stdout(format!("{}\n{}\n", expected[0], expected[1]));
}

#[test]
fn test_missing_scenario_fails() {
    fanout()
        .args(["resolve", "/nonexistent/scenario.json", "--channel", "email"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read scenario"));
}

#[test]
fn test_dispatch_rejects_email_channel() {
    let org = Org::new();
    let scenario = ScenarioFile::write(&org, NotificationAction::default(), Vec::new(), None);

    fanout()
        .arg("dispatch")
        .arg(scenario.file.path())
        .args(["--channel", "email"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not deliver to webhooks"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dispatch_reports_health() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generic/carol"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut org = Org::new();
    let endpoint = format!("{}/generic/carol", server.uri());
    org.carol = org.carol.clone().with_webhook(ChannelType::Generic, &endpoint);
    org.directory.insert_identity(org.carol.clone());
    let action = NotificationAction {
        references: vec![org.carol.entity_ref()],
        ..Default::default()
    };
    let destination = Uuid::new_v4();
    let scenario = ScenarioFile::write(&org, action, Vec::new(), Some(destination));

    let output = fanout()
        .arg("dispatch")
        .arg(scenario.file.path())
        .args(["--channel", "generic"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["report"]["destination"], destination.to_string());
    assert_eq!(value["report"]["event"], scenario.scenario.event.id.to_string());
    assert_eq!(value["report"]["targets"][0]["outcome"], "awaitingRetry");
    assert_eq!(value["report"]["targets"][0]["statusCode"], 503);
    assert_eq!(value["health"]["status"], "awaitingRetry");
}
