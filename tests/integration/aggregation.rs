//! Full batch runs through `BatchRunner`: skipped rows, summary accounting, reports.

use crate::integration::test_utils::{failure, product, registry, MockProvider, Outcome};
use adbatch::batch::BatchRunner;
use adbatch::config::{AdConfig, OutputConfig};
use adbatch::output::{OutputWriter, BRAND_SUMMARY_FILE, RESULTS_FILE};
use adbatch::product::ProductRecord;
use adbatch::types::{ProcessingStatus, ProviderKind};
use std::sync::Arc;
use tempfile::TempDir;

fn feed() -> Vec<ProductRecord> {
    let mut missing_prompt = product(5, "Nord");
    missing_prompt.prompt = "  ".to_string();
    vec![
        product(2, "Acme"),
        product(3, "Acme"),
        product(4, "Nord"),
        missing_prompt,
        product(6, "Nord"),
    ]
}

fn runner(provider: &Arc<MockProvider>) -> BatchRunner {
    let mut config = AdConfig::default();
    config.dispatch.concurrency = 1;
    config.dispatch.max_retries = 1;
    BatchRunner::new(Arc::new(config), registry(&[Arc::clone(provider)]))
}

fn scripted() -> Arc<MockProvider> {
    Arc::new(MockProvider::new(ProviderKind::SeedreamKie).script([
        Outcome::Succeed,
        Outcome::Succeed,
        Outcome::Succeed,
        failure("content policy"),
    ]))
}

#[tokio::test]
async fn every_row_is_accounted_for() {
    let provider = scripted();
    let runner = runner(&provider);
    let prepared = runner.prepare(&feed()).unwrap();
    assert_eq!(prepared.admitted.len(), 4);
    assert_eq!(prepared.skipped.len(), 1);
    assert!(prepared.restored.is_none());

    let report = runner.execute(prepared).await;

    assert_eq!(provider.calls(), vec![2, 3, 4, 6]);
    let summary = &report.summary;
    assert_eq!(summary.total_rows, 5);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(
        summary.successful + summary.failed + summary.skipped,
        summary.total_rows
    );
    assert!((summary.success_rate - 60.0).abs() < 1e-9);
    let spent: f64 = report.results.successful.iter().map(|r| r.cost()).sum();
    assert!((summary.total_cost - spent).abs() < 1e-12);
    assert!(summary.total_cost > 0.0);
    assert!(!report.paused);

    let skipped = &report.results.skipped[0];
    assert_eq!(skipped.status, ProcessingStatus::Skipped);
    assert!(skipped
        .error_message
        .as_deref()
        .unwrap()
        .contains("Required field 'prompt' cannot be empty"));

    let failed = &report.results.failed[0];
    assert_eq!(failed.product_name, "Product 6");
    assert_eq!(
        failed.error_message.as_deref(),
        Some("Generation failed: content policy")
    );

    assert!(summary.render().contains("Skipped:      1"));
}

#[tokio::test]
async fn brand_breakdown_counts_skipped_rows_but_not_their_cost() {
    let provider = scripted();
    let runner = runner(&provider);
    let report = runner.execute(runner.prepare(&feed()).unwrap()).await;

    let acme = &report.brands["Acme"];
    assert_eq!(acme.count, 2);
    assert_eq!(acme.successful, 2);
    assert_eq!(acme.failed, 0);

    let nord = &report.brands["Nord"];
    assert_eq!(nord.count, 3);
    assert_eq!(nord.successful, 1);
    assert_eq!(nord.failed, 1);

    let total: f64 = report.brands.values().map(|b| b.cost).sum();
    assert!((total - report.summary.total_cost).abs() < 1e-12);
}

#[tokio::test]
async fn dry_run_plan_never_reserves_rate_limit_slots() {
    let provider = scripted();
    provider.set_rate_limited(true);
    let runner = runner(&provider);

    let plan = runner.plan(&feed());

    assert_eq!(plan.len(), 5);
    assert_eq!(plan.iter().filter(|p| p.skip_reason.is_none()).count(), 4);
    assert_eq!(plan[0].provider.as_deref(), Some("seedream_kie"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn reports_and_images_land_in_the_output_tree() {
    let dir = TempDir::new().unwrap();
    let provider = scripted();
    let runner = runner(&provider);
    let mut report = runner.execute(runner.prepare(&feed()).unwrap()).await;

    let writer = OutputWriter::new(&OutputConfig {
        dir: dir.path().to_path_buf(),
        organize_by_brand: true,
        download_images: true,
    });
    writer.prepare().unwrap();
    let saved = writer
        .download_results(&mut report.results, runner.registry())
        .await;
    assert_eq!(saved, 3);

    for result in &report.results.successful {
        let local = result.local_image_path.as_deref().unwrap();
        assert!(std::path::Path::new(local).exists());
        assert!(local.contains("original"));
    }
    assert!(dir.path().join("brands").join("Acme").join("original").is_dir());

    writer
        .write_reports(&report.results, &report.summary, &report.brands)
        .unwrap();
    let results: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(RESULTS_FILE)).unwrap())
            .unwrap();
    assert_eq!(results["summary"]["total_rows"], 5);
    assert_eq!(results["results"].as_array().unwrap().len(), 5);

    let brands: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join(BRAND_SUMMARY_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(brands["Nord"]["count"], 3);
}
