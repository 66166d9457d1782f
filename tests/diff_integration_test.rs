//! End-to-end diff of two in-memory deployments

mod common;

use common::{provinces, streets, Deployment};
use georef::config::{OutputExtension, RetryConfig};
use georef::core::diff::{write_layer, DiffPipeline};
use georef::core::fetch::FetchSettings;
use georef::core::rate::RateGovernor;
use georef::domain::{EntityId, EntityType};
use serde_json::json;
use tempfile::TempDir;

fn settings() -> FetchSettings {
    FetchSettings {
        retry: RetryConfig {
            max_retries: 0,
            ..Default::default()
        },
        ..FetchSettings::default()
    }
}

#[tokio::test]
async fn test_identical_deployments_have_no_differences() {
    let source = Deployment::new("http://source/").with_records(EntityType::Provinces, provinces(10, -34.61));
    let target = Deployment::new("http://target/").with_records(EntityType::Provinces, provinces(10, -34.61));
    let governor = RateGovernor::unthrottled(4);

    let layer = DiffPipeline::new(&source, &target, settings(), &governor)
        .diff_layer(EntityType::Provinces)
        .await
        .unwrap();

    assert_eq!(layer.source.collection.len(), 10);
    assert!(layer.result.is_empty());
    assert!(layer.is_complete());
    assert_eq!(serde_json::to_value(&layer.result).unwrap(), json!({}));
}

#[tokio::test]
async fn test_missing_province_is_removed() {
    let mut records = provinces(24, -34.61);
    records.retain(|p| p["id"] != "94");
    let all = provinces(24, -34.61);

    let source = Deployment::new("http://source/").with_records(EntityType::Provinces, all);
    let target = Deployment::new("http://target/").with_records(EntityType::Provinces, records);
    let governor = RateGovernor::unthrottled(4);

    let layer = DiffPipeline::new(&source, &target, settings(), &governor)
        .diff_layer(EntityType::Provinces)
        .await
        .unwrap();

    assert_eq!(layer.result.removed, vec![EntityId::new("94").unwrap()]);
    assert!(layer.result.added.is_empty());
    assert!(layer.result.values_changed.is_empty());
    assert!(layer.result.changed_ids().is_empty());
}

#[tokio::test]
async fn test_centroid_jitter_is_within_tolerance() {
    let source = Deployment::new("http://source/").with_records(EntityType::Provinces, provinces(10, -34.61));
    let jitter = Deployment::new("http://target/").with_records(EntityType::Provinces, provinces(10, -34.614));
    let moved = Deployment::new("http://moved/").with_records(EntityType::Provinces, provinces(10, -34.81));
    let governor = RateGovernor::unthrottled(4);

    let within = DiffPipeline::new(&source, &jitter, settings(), &governor)
        .diff_layer(EntityType::Provinces)
        .await
        .unwrap();
    assert!(within.result.is_empty());

    let beyond = DiffPipeline::new(&source, &moved, settings(), &governor)
        .diff_layer(EntityType::Provinces)
        .await
        .unwrap();
    assert_eq!(beyond.result.values_changed.len(), 10);
    let change = &beyond.result.values_changed[&EntityId::new("02").unwrap()]["centroide.lat"];
    assert_eq!(change.old_value, json!(-34.61));
    assert_eq!(change.new_value, json!(-34.81));
}

#[tokio::test]
async fn test_partitioned_layer_diff_and_reports() {
    let mut changed = streets("06", 12);
    changed[3]["nombre"] = json!("CALLE RENOMBRADA");
    let departments = vec![json!({"id": "06007", "nombre": "Adolfo Alsina", "provincia": {"id": "06"}})];

    let source = Deployment::new("http://source/")
        .with_records(EntityType::Departments, departments.clone())
        .with_records(EntityType::Streets, streets("06", 12));
    let target = Deployment::new("http://target/")
        .with_records(EntityType::Departments, departments)
        .with_records(EntityType::Streets, changed);
    let governor = RateGovernor::unthrottled(4);
    let settings = FetchSettings {
        page_cap: 5,
        ..settings()
    };

    let layer = DiffPipeline::new(&source, &target, settings, &governor)
        .diff_layer(EntityType::Streets)
        .await
        .unwrap();

    assert_eq!(layer.source.collection.len(), 12);
    assert_eq!(layer.target.collection.len(), 12);
    assert!(layer.is_complete());
    let renamed = EntityId::new("06007000003").unwrap();
    assert_eq!(
        layer.result.values_changed[&renamed]["nombre"].new_value,
        json!("CALLE RENOMBRADA")
    );

    let dir = TempDir::new().unwrap();
    let written = write_layer(&layer, dir.path(), OutputExtension::Both).unwrap();
    assert_eq!(written.len(), 2);

    let report: serde_json::Value =
        serde_json::from_reader(std::fs::File::open(dir.path().join("diff_calles.json")).unwrap())
            .unwrap();
    assert_eq!(report["source_registers"], 12);

    let table = std::fs::read_to_string(dir.path().join("diff_calles.csv")).unwrap();
    let mut lines = table.lines();
    assert_eq!(lines.next(), Some("id,added,removed,nombre(old),nombre(new)"));
    assert_eq!(
        lines.next(),
        Some("06007000003,false,false,CALLE 3,CALLE RENOMBRADA")
    );
}

#[tokio::test]
async fn test_failed_province_is_withheld_from_report() {
    let mut source_streets = streets("02", 3);
    source_streets.extend(streets("06", 4));
    let mut target_streets = streets("02", 2);
    target_streets.extend(streets("06", 4));

    let source = Deployment::new("http://source/").with_records(EntityType::Streets, source_streets);
    let target = Deployment::new("http://target/")
        .with_records(EntityType::Streets, target_streets)
        .failing_province("06");
    let governor = RateGovernor::unthrottled(4);

    let layer = DiffPipeline::new(&source, &target, settings(), &governor)
        .diff_layer(EntityType::Streets)
        .await
        .unwrap();

    assert!(!layer.is_complete());
    assert_eq!(layer.result.removed, vec![EntityId::new("02007000002").unwrap()]);
    assert!(layer.result.added.is_empty());
    assert_eq!(layer.withheld, 4);

    let dir = TempDir::new().unwrap();
    write_layer(&layer, dir.path(), OutputExtension::Json).unwrap();
    let report: serde_json::Value =
        serde_json::from_reader(std::fs::File::open(dir.path().join("diff_calles.json")).unwrap())
            .unwrap();
    assert_eq!(report["withheld"], 4);
    assert_eq!(report["failures"][0]["partition"], "provincia[06]");
    assert_eq!(report["failures"][0]["status"], 500);
    assert_eq!(report["diff"]["removed"], json!(["02007000002"]));
}
