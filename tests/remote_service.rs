mod support;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;

use btfix::{
    DeviceCatalog, DeviceOrigin, DeviceType, DiagnosisOrigin, DiagnosticsOrchestrator,
    NotificationKind, NotificationQueue, RemoteError, RiskLevel, ServiceClient,
};
use support::{Route, closed_url, serve};

fn weak_speaker() -> btfix::Device {
    btfix::Device::simulated(
        "JBL Flip 5",
        "AA:BB:CC:00:00:01",
        -78,
        DeviceType::Speaker,
        true,
        Some(12),
    )
}

fn remote_diagnosis() -> serde_json::Value {
    json!({
        "success": true,
        "diagnosis": {
            "confidence_score": 0.92,
            "risk_level": "high",
            "estimated_time": "10-15 minutes",
            "detected_issues": [{
                "type": "connection_issues",
                "description": "Very weak Bluetooth signal",
                "confidence": 0.95,
                "severity": "high"
            }],
            "suggested_fixes": [{
                "action": "move_closer",
                "description": "Move the device closer to the host",
                "success_rate": 0.9
            }]
        }
    })
}

async fn orchestrator_for(server_url: &str) -> anyhow::Result<DiagnosticsOrchestrator> {
    let client = ServiceClient::new(server_url)?;
    Ok(DiagnosticsOrchestrator::new(Arc::new(client)).with_timeout(Duration::from_secs(5)))
}

#[tokio::test]
async fn successful_remote_diagnosis_is_tagged_remote() -> anyhow::Result<()> {
    let server_url = serve(vec![Route::new(
        "/api/diagnose",
        200,
        remote_diagnosis().to_string(),
    )])
    .await?;

    let result = orchestrator_for(&server_url)
        .await?
        .diagnose(&weak_speaker())
        .await;

    assert_eq!(DiagnosisOrigin::Remote, result.origin());
    assert_eq!(false, result.is_fallback());
    assert_eq!(RiskLevel::High, result.risk_level());
    assert_eq!(Some("move_closer"), result.suggested_fixes()[0].action());
    Ok(())
}

#[tokio::test]
async fn server_error_degrades_to_the_fallback_diagnosis() -> anyhow::Result<()> {
    let server_url = serve(vec![Route::new(
        "/api/diagnose",
        500,
        json!({ "success": false, "error": "analysis crashed" }).to_string(),
    )])
    .await?;

    let result = orchestrator_for(&server_url)
        .await?
        .diagnose(&weak_speaker())
        .await;

    assert_eq!(true, result.is_fallback());
    assert_eq!(RiskLevel::Low, result.risk_level());
    assert_eq!(0.855, result.confidence_score());
    assert_eq!(DiagnosisOrigin::Fallback, result.origin());
    Ok(())
}

#[tokio::test]
async fn undecodable_body_degrades_to_the_fallback_diagnosis() -> anyhow::Result<()> {
    let server_url = serve(vec![Route::new("/api/diagnose", 200, "<html>oops</html>")]).await?;

    let result = orchestrator_for(&server_url)
        .await?
        .diagnose(&weak_speaker())
        .await;

    assert_eq!(true, result.is_fallback());
    Ok(())
}

#[tokio::test]
async fn out_of_range_confidence_is_a_schema_error() -> anyhow::Result<()> {
    let mut payload = remote_diagnosis();
    payload["diagnosis"]["confidence_score"] = json!(1.5);
    let server_url = serve(vec![Route::new("/api/diagnose", 200, payload.to_string())]).await?;
    let client = ServiceClient::new(&server_url)?;

    let result = client.diagnose(&weak_speaker()).await;

    assert_matches!(result, Err(RemoteError::Schema(_)));
    Ok(())
}

#[tokio::test]
async fn server_error_message_is_surfaced() -> anyhow::Result<()> {
    let server_url = serve(vec![Route::new(
        "/api/diagnose",
        500,
        json!({ "success": false, "error": "analysis crashed" }).to_string(),
    )])
    .await?;
    let client = ServiceClient::new(&server_url)?;

    let result = client.diagnose(&weak_speaker()).await;

    assert_matches!(
        result,
        Err(RemoteError::Status { status: 500, message }) if message == "analysis crashed"
    );
    Ok(())
}

#[tokio::test]
async fn remote_catalog_tags_devices_and_posts_success() -> anyhow::Result<()> {
    let server_url = serve(vec![Route::new(
        "/api/devices",
        200,
        json!({
            "success": true,
            "devices": [{
                "id": "bt_007",
                "name": "Pixel Buds",
                "mac_address": "F8:0F:F9:00:00:07",
                "signal_strength": -60,
                "device_type": "earbuds",
                "connected": false,
                "battery_level": 70
            }]
        })
        .to_string(),
    )])
    .await?;
    let client = ServiceClient::new(&server_url)?;
    let notifications = NotificationQueue::default();
    let catalog = DeviceCatalog::simulated(notifications.clone());

    let devices = catalog.discover_remote(&client).await;

    assert_eq!(1, devices.len());
    assert_eq!("bt_007", devices[0].identity());
    assert_eq!(DeviceOrigin::Remote, devices[0].origin());
    let posted = notifications.list();
    assert_eq!(NotificationKind::Success, posted[0].kind());
    assert_eq!("Found 1 devices", posted[0].message());
    Ok(())
}

#[tokio::test]
async fn rejected_device_listing_serves_the_demo_catalog() -> anyhow::Result<()> {
    let server_url = serve(vec![Route::new(
        "/api/devices",
        200,
        json!({ "success": false, "error": "scanner busy" }).to_string(),
    )])
    .await?;
    let client = ServiceClient::new(&server_url)?;
    let notifications = NotificationQueue::default();
    let catalog = DeviceCatalog::simulated(notifications.clone());

    let devices = catalog.discover_remote(&client).await;

    assert_eq!(btfix::simulated_catalog(), devices);
    assert_eq!(NotificationKind::Error, notifications.list()[0].kind());
    Ok(())
}

#[tokio::test]
async fn translations_are_fetched_for_other_languages() -> anyhow::Result<()> {
    let server_url = serve(vec![Route::new(
        "/api/translations/he",
        200,
        json!({
            "success": true,
            "language": "he",
            "is_rtl": true,
            "translations": { "found_devices": "מכשירים שנמצאו" }
        })
        .to_string(),
    )])
    .await?;
    let client = ServiceClient::new(&server_url)?;

    let table = client.translations("he").await?;

    assert_eq!("he", table.language());
    assert_eq!(true, table.is_rtl());
    assert_eq!("מכשירים שנמצאו", table.text("found_devices", None));
    assert_eq!("Scan", table.text("scan", Some("Scan")));
    Ok(())
}

#[tokio::test]
async fn unreachable_service_is_not_reachable() -> anyhow::Result<()> {
    let client = ServiceClient::new(&closed_url().await?)?;

    let result = client.status().await;

    assert_matches!(result, Err(RemoteError::NotReachable { .. }));
    Ok(())
}
