// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::test_settings;
use async_trait::async_trait;
use scrapemaster::application::scraper::Scraper;
use scrapemaster::application::usecases::export_prospects::ExportProspectsUseCase;
use scrapemaster::config::settings::ValidatorSettings;
use scrapemaster::domain::models::prospect::ProspectRecord;
use scrapemaster::domain::models::selector::Selector;
use scrapemaster::domain::models::task::RequestTask;
use scrapemaster::domain::models::validation::ValidationReport;
use scrapemaster::domain::repositories::export_repository::ExportRepository;
use scrapemaster::domain::services::validation_service::ValidationService;
use scrapemaster::utils::errors::ExportError;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn prospect(company: &str, email: &str) -> ProspectRecord {
    let slug = company.to_lowercase().replace(' ', "");
    let mut record = ProspectRecord::default();
    record
        .set("company_name", company)
        .set("website", format!("https://{}.com", slug))
        .set("email", email)
        .set("contact_name", "Jordan Lee")
        .set("contact_email", format!("jordan@{}.com", slug))
        .set("contact_title", "Owner")
        .set("data_source", "Google Places API")
        .set("verified_date", chrono::Utc::now().date_naive().to_string());
    record.verified_website = true;
    record.verification_confidence = 90;
    record
}

fn dataset() -> Vec<ProspectRecord> {
    vec![
        prospect("Riverside Dental", "office@riversidedental.com"),
        prospect("Harbor Bakery", "orders@example.com"),
        prospect("Maple Street Clinic", "hello@maplestreetclinic.com"),
        prospect("Oak Hill Vets", "contact@test.com"),
        prospect("Lakeview Optometry", "info@lakeviewoptometry.com"),
    ]
}

#[derive(Default)]
struct RecordingExporter {
    exported: parking_lot::Mutex<Vec<(usize, usize)>>,
}

#[async_trait]
impl ExportRepository for RecordingExporter {
    async fn export(
        &self,
        records: &[ProspectRecord],
        report: &ValidationReport,
    ) -> Result<(), ExportError> {
        self.exported.lock().push((records.len(), report.invalid));
        Ok(())
    }
}

#[test]
fn test_placeholder_emails_are_reported_per_record() {
    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let report = scraper.validate_dataset(&dataset());

    assert_eq!(report.total, 5);
    assert_eq!(report.valid, 3);
    assert_eq!(report.invalid, 2);
    assert!(report.blocks_export());

    let invalid: Vec<&str> = report.invalid_records().map(|r| r.company.as_str()).collect();
    assert_eq!(invalid, vec!["Harbor Bakery", "Oak Hill Vets"]);
    for record in report.invalid_records() {
        assert_eq!(record.confidence, 0);
        assert!(record
            .violations
            .iter()
            .any(|v| v.contains("placeholder_email")));
    }
}

#[tokio::test]
async fn test_strict_mode_blocks_export() {
    let validator = Arc::new(ValidationService::new(&ValidatorSettings::default()).unwrap());
    let exporter = Arc::new(RecordingExporter::default());
    let usecase = ExportProspectsUseCase::new(validator, exporter.clone());

    let err = usecase.execute(&dataset()).await.unwrap_err();

    assert!(matches!(err, ExportError::Blocked { invalid: 2, total: 5 }));
    assert!(exporter.exported.lock().is_empty());
}

#[tokio::test]
async fn test_advisory_mode_exports_with_report() {
    let settings = ValidatorSettings {
        strict_mode: false,
        ..ValidatorSettings::default()
    };
    let validator = Arc::new(ValidationService::new(&settings).unwrap());
    let exporter = Arc::new(RecordingExporter::default());
    let usecase = ExportProspectsUseCase::new(validator, exporter.clone());

    let report = usecase.execute(&dataset()).await.unwrap();

    assert_eq!(report.invalid, 2);
    assert!(!report.strict_mode);
    assert_eq!(*exporter.exported.lock(), vec![(5, 2)]);
}

#[tokio::test]
async fn test_scraped_fields_feed_the_validator() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    r#"<html><body>
<h2 class="name">Apex Solutions Inc</h2>
<a class="site" href="https://www.example.com">site</a>
<span class="mail">sales@example.com</span>
</body></html>"#,
                ),
        )
        .mount(&server)
        .await;

    let scraper = Scraper::from_settings(&test_settings()).unwrap();
    let result = scraper
        .scrape(
            RequestTask::new(format!("{}/listing", server.uri()))
                .with_selector("company_name", Selector::css("h2.name"))
                .with_selector("website", Selector::attribute("a.site", "href"))
                .with_selector("email", Selector::css(".mail")),
        )
        .await;
    assert!(result.success);

    let mut record = ProspectRecord::from_extracted(&result);
    record.set("data_source", "Mock Data Generator");

    let (valid, violations) = scraper.validator().validate(&record);

    assert!(!valid);
    let has = |needle: &str| violations.iter().any(|v| v.contains(needle));
    assert!(has("templated_company_name"));
    assert!(has("placeholder_website"));
    assert!(has("placeholder_email"));
    assert!(has("prohibited data_source"));
    assert!(has("missing required field: verified_date"));
}
