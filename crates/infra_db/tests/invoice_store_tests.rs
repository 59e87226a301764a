//! PostgreSQL invoice store tests
//!
//! Each test starts its own PostgreSQL container and applies the embedded
//! migrations. Run with `cargo test -p infra_db -- --ignored`.

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use core_kernel::{InvoiceId, Money, ProjectId};
use domain_billing::{
    BillingError, ClientSnapshot, FixedClock, InvoiceFilter, InvoiceItem, InvoiceItemInput,
    InvoiceNumber, InvoicePrefix, InvoiceService, InvoiceStatus, InvoiceStore, InvoiceType,
    NewInvoice, PaymentMode, ProjectContext, StoreError, UpdateInvoiceRequest,
};
use infra_db::{run_migrations, PostgresInvoiceStore};
use test_utils::{
    assert_gapless, assert_rejected_field, ClientFixtures, RecordingNotifier, TemporalFixtures,
    TestClientBuilder, TestDatabase, TestInvoiceRequestBuilder,
};

const ACTOR: &str = "staff@example.com";

struct Harness {
    db: TestDatabase,
    store: Arc<PostgresInvoiceStore>,
    clock: Arc<FixedClock>,
    service: Arc<InvoiceService>,
    context: ProjectContext,
}

impl Harness {
    async fn start(max_connections: u32) -> Self {
        let db = TestDatabase::start(max_connections)
            .await
            .expect("Failed to start PostgreSQL container");
        run_migrations(db.pool()).await.expect("Failed to run migrations");

        let store = Arc::new(PostgresInvoiceStore::new(db.pool().clone()));
        let clock = Arc::new(FixedClock::new(TemporalFixtures::now_2025()));
        let service = Arc::new(
            InvoiceService::new(store.clone(), Arc::new(RecordingNotifier::new()))
                .with_clock(clock.clone()),
        );

        let client = ClientFixtures::moussa();
        let project = ClientFixtures::project_for(&client);
        store.register_client(&client).await.expect("Failed to register client");
        store.register_project(&project).await.expect("Failed to register project");

        Self {
            db,
            store,
            clock,
            service,
            context: ProjectContext { project, client },
        }
    }

    async fn create(&self) -> InvoiceNumber {
        let request = TestInvoiceRequestBuilder::new(self.context.project.id).build();
        self.service
            .create_invoice(ACTOR, request)
            .await
            .expect("Failed to create invoice")
            .invoice
            .invoice_number
    }

    /// Inserts an invoice row directly, bypassing numbering
    async fn import_raw(&self, number: &str) -> Uuid {
        let id = Uuid::now_v7();
        let now = TemporalFixtures::now_2025();
        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, project_id, client_id, subject,
                issue_date, due_date, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 'Imported', $5, $6, $7, $7)
            "#,
        )
        .bind(id)
        .bind(number)
        .bind(self.context.project.id.as_uuid())
        .bind(self.context.client.id.as_uuid())
        .bind(now.date_naive())
        .bind(TemporalFixtures::due_date())
        .bind(now)
        .execute(self.db.pool())
        .await
        .expect("Failed to import invoice row");
        id
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires docker"]
async fn test_concurrent_creations_receive_gapless_numbers() {
    let harness = Harness::start(32).await;

    let mut handles = Vec::new();
    for _ in 0..24 {
        let service = harness.service.clone();
        let project_id = harness.context.project.id;
        handles.push(tokio::spawn(async move {
            let request = TestInvoiceRequestBuilder::new(project_id).build();
            service.create_invoice(ACTOR, request).await
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        let view = handle.await.expect("task panicked").expect("creation failed");
        numbers.push(view.invoice.invoice_number);
    }

    assert!(numbers.iter().all(|n| n.year() == 2025 && n.prefix().as_str() == "BH"));
    assert_gapless(&numbers);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_counter_is_seeded_from_existing_numbers() {
    let harness = Harness::start(5).await;
    harness.import_raw("BH/2025/7").await;
    harness.import_raw("BH/2025/12").await;
    harness.import_raw("BH/2025/abc").await;
    harness.import_raw("BH/2024/99").await;

    assert_eq!(harness.create().await.to_string(), "BH/2025/13");
    assert_eq!(harness.create().await.to_string(), "BH/2025/14");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_counter_advances_past_numbers_stored_around_it() {
    let harness = Harness::start(5).await;
    assert_eq!(harness.create().await.to_string(), "BH/2025/1");

    harness.import_raw("BH/2025/2").await;

    assert_eq!(harness.create().await.to_string(), "BH/2025/3");
    assert_eq!(harness.create().await.to_string(), "BH/2025/4");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_update_based_on_stale_read_is_refused() {
    let harness = Harness::start(5).await;
    let view = harness
        .service
        .create_invoice(ACTOR, TestInvoiceRequestBuilder::new(harness.context.project.id).build())
        .await
        .expect("create failed");
    let id = view.invoice.id;

    let mut stale = harness.store.get(id).await.expect("get failed").expect("missing invoice");
    harness.service.mark_paid(ACTOR, id).await.expect("mark paid failed");

    stale.items = vec![InvoiceItem::new("Reprise", dec!(1), Money::new(dec!(5000)), 0)];
    let result = harness.store.update(&stale).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))), "got {result:?}");

    let reread = harness.service.read_invoice(id).await.expect("read failed");
    assert_eq!(reread.invoice.status, InvoiceStatus::Paid);
    assert_eq!(reread.invoice.version, 2);
    assert_eq!(reread.totals.rounded().total_ttc.amount(), dec!(8500000.00));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_search_and_ordering() {
    let harness = Harness::start(5).await;
    let other_client = TestClientBuilder::new().build();
    let other_project = ClientFixtures::project_for(&other_client);
    harness.store.register_client(&other_client).await.expect("client failed");
    harness.store.register_project(&other_project).await.expect("project failed");

    let mine = harness
        .service
        .create_invoice(ACTOR, TestInvoiceRequestBuilder::new(harness.context.project.id).build())
        .await
        .expect("create failed");
    let theirs = harness
        .service
        .create_invoice(
            ACTOR,
            TestInvoiceRequestBuilder::new(other_project.id)
                .with_issue_date(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
                .with_item(InvoiceItemInput::new("Plans", dec!(1), dec!(100)))
                .build(),
        )
        .await
        .expect("create failed");

    let search = |term: &str| InvoiceFilter {
        search: Some(term.to_string()),
        ..Default::default()
    };
    let ids = |views: Vec<domain_billing::InvoiceView>| -> Vec<InvoiceId> {
        views.into_iter().map(|v| v.invoice.id).collect()
    };

    let found = harness.service.list_invoices(&search(&other_client.full_name)).await.expect("list failed");
    assert_eq!(ids(found), vec![theirs.invoice.id]);

    let found = harness.service.list_invoices(&search("bh/2025/1")).await.expect("list failed");
    assert_eq!(ids(found), vec![mine.invoice.id]);

    let found = harness.service.list_invoices(&search("almadies")).await.expect("list failed");
    assert_eq!(found.len(), 2);

    let found = harness.service.list_invoices(&search("100%")).await.expect("list failed");
    assert!(found.is_empty());

    let by_total = InvoiceFilter {
        ordering: "-total_ttc".parse().expect("valid ordering"),
        ..Default::default()
    };
    // the extra item puts theirs above the sample total
    let found = harness.service.list_invoices(&by_total).await.expect("list failed");
    assert_eq!(ids(found), vec![theirs.invoice.id, mine.invoice.id]);

    let found = harness.service.list_invoices(&InvoiceFilter::default()).await.expect("list failed");
    assert_eq!(ids(found), vec![mine.invoice.id, theirs.invoice.id]);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_unreadable_rows_are_skipped_in_listings() {
    let harness = Harness::start(5).await;
    harness.create().await;
    let broken = harness.import_raw("legacy-0042").await;

    let listed = harness
        .service
        .list_invoices(&InvoiceFilter::default())
        .await
        .expect("list failed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].invoice.invoice_number.to_string(), "BH/2025/1");

    test_utils::assert_err_variant!(
        harness.service.read_invoice(InvoiceId::from(broken)).await,
        BillingError::Store(StoreError::Corrupt(_))
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_deleted_numbers_are_never_reused() {
    let harness = Harness::start(5).await;
    harness.create().await;
    let second = harness
        .service
        .create_invoice(ACTOR, TestInvoiceRequestBuilder::new(harness.context.project.id).build())
        .await
        .expect("create failed");

    harness.service.hard_delete(second.invoice.id).await.expect("delete failed");

    assert_eq!(harness.create().await.sequence(), 3);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_year_rollover_starts_a_new_sequence() {
    let harness = Harness::start(5).await;
    harness.clock.set(TemporalFixtures::end_of_2025());
    harness.create().await;
    harness.create().await;

    harness.clock.set(TemporalFixtures::start_of_2026());
    assert_eq!(harness.create().await.to_string(), "BH/2026/1");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_rejected_creation_consumes_no_number() {
    let harness = Harness::start(5).await;
    let request = TestInvoiceRequestBuilder::new(ProjectId::new_v7()).build();

    let error = harness
        .service
        .create_invoice(ACTOR, request)
        .await
        .expect_err("unknown project must be rejected");
    assert_rejected_field(&error, "project_id");

    assert_eq!(harness.create().await.to_string(), "BH/2025/1");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_failed_insert_rolls_back_the_counter() {
    let harness = Harness::start(5).await;
    let prefix = InvoicePrefix::default();
    let now = TemporalFixtures::now_2025();

    // Zero quantity violates the item check constraint after the counter moved.
    let rejected = NewInvoice {
        id: InvoiceId::new_v7(),
        project_id: harness.context.project.id,
        client_id: harness.context.client.id,
        invoice_type: InvoiceType::Invoice,
        subject: "Rejected".to_string(),
        issue_date: now.date_naive(),
        due_date: TemporalFixtures::due_date(),
        tax_percentage: dec!(18),
        advance_payment: Money::zero(),
        payment_mode: PaymentMode::Transfer,
        client: ClientSnapshot::from(&harness.context.client),
        notes: String::new(),
        items: vec![InvoiceItem::new("Broken", dec!(0), Money::new(dec!(10)), 0)],
        created_by: Some(ACTOR.to_string()),
        created_at: now,
    };

    let result = harness.store.insert_numbered(&prefix, 2025, rejected.clone()).await;
    assert!(result.is_err());
    assert!(harness.store.get(rejected.id).await.expect("get failed").is_none());

    assert_eq!(harness.create().await.to_string(), "BH/2025/1");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_snapshot_survives_client_profile_changes() {
    let harness = Harness::start(5).await;
    let view = harness
        .service
        .create_invoice(ACTOR, TestInvoiceRequestBuilder::new(harness.context.project.id).build())
        .await
        .expect("create failed");

    harness
        .store
        .update_client_address(harness.context.client.id, "Route de Ouakam, Dakar")
        .await
        .expect("address update failed");

    let reread = harness.service.read_invoice(view.invoice.id).await.expect("read failed");
    assert_eq!(reread.invoice.client.address, "12 rue Carnot, Dakar");

    let context = harness
        .store
        .project_context(harness.context.project.id)
        .await
        .expect("context failed")
        .expect("project missing");
    assert_eq!(context.client.address, "Route de Ouakam, Dakar");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_snapshot_override_and_overdue_at_read() {
    let harness = Harness::start(5).await;
    let request = TestInvoiceRequestBuilder::new(harness.context.project.id)
        .with_client_name("SCI Les Almadies")
        .with_tax_percentage(dec!(0))
        .with_advance_payment(dec!(500000))
        .build();
    let view = harness.service.create_invoice(ACTOR, request).await.expect("create failed");

    assert_eq!(view.invoice.client.name, "SCI Les Almadies");
    assert_eq!(view.invoice.client.address, "");
    assert_eq!(view.totals.rounded().net_to_pay.amount(), dec!(6703389.83));

    harness.clock.set(TemporalFixtures::after_due_date());
    let reread = harness.service.read_invoice(view.invoice.id).await.expect("read failed");
    assert_eq!(reread.status, InvoiceStatus::Overdue);
    assert_eq!(reread.invoice.status, InvoiceStatus::Draft);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_update_replaces_items_and_recomputes_totals() {
    let harness = Harness::start(5).await;
    let view = harness
        .service
        .create_invoice(ACTOR, TestInvoiceRequestBuilder::new(harness.context.project.id).build())
        .await
        .expect("create failed");
    assert_eq!(view.totals.rounded().total_ttc.amount(), dec!(8500000.00));

    let patch = UpdateInvoiceRequest {
        tax_percentage: Some(dec!(0)),
        items: Some(vec![
            InvoiceItemInput::new("Finitions", dec!(2), dec!(1500.50)).with_display_order(2),
            InvoiceItemInput::new("Terrassement", dec!(1), dec!(900)).with_display_order(1),
        ]),
        ..Default::default()
    };
    harness
        .service
        .update_invoice(ACTOR, view.invoice.id, patch)
        .await
        .expect("update failed");

    let reread = harness.service.read_invoice(view.invoice.id).await.expect("read failed");
    let descriptions: Vec<&str> = reread.invoice.items.iter().map(|i| i.description.as_str()).collect();
    assert_eq!(descriptions, vec!["Terrassement", "Finitions"]);
    assert_eq!(reread.totals.rounded().total_ttc.amount(), dec!(3901.00));
    assert_eq!(reread.invoice.invoice_number, view.invoice.invoice_number);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_list_filters_and_soft_delete() {
    let harness = Harness::start(5).await;
    let other_client = TestClientBuilder::new().build();
    let other_project = ClientFixtures::project_for(&other_client);
    harness.store.register_client(&other_client).await.expect("client failed");
    harness.store.register_project(&other_project).await.expect("project failed");

    let mine = harness
        .service
        .create_invoice(
            ACTOR,
            TestInvoiceRequestBuilder::new(harness.context.project.id)
                .with_issue_date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
                .build(),
        )
        .await
        .expect("create failed");
    let theirs = harness
        .service
        .create_invoice(ACTOR, TestInvoiceRequestBuilder::new(other_project.id).build())
        .await
        .expect("create failed");

    let all = harness.service.list_invoices(&InvoiceFilter::default()).await.expect("list failed");
    let ids: Vec<InvoiceId> = all.iter().map(|v| v.invoice.id).collect();
    assert_eq!(ids, vec![theirs.invoice.id, mine.invoice.id]);

    let by_project = harness
        .service
        .list_invoices(&InvoiceFilter::by_project(other_project.id))
        .await
        .expect("list failed");
    assert_eq!(by_project.len(), 1);
    assert_eq!(by_project[0].invoice.client.name, other_client.full_name);

    harness.service.soft_delete(ACTOR, mine.invoice.id).await.expect("delete failed");
    let live = harness.service.list_invoices(&InvoiceFilter::default()).await.expect("list failed");
    assert_eq!(live.len(), 1);

    let with_deleted = InvoiceFilter {
        include_deleted: true,
        ..Default::default()
    };
    let everything = harness.service.list_invoices(&with_deleted).await.expect("list failed");
    assert_eq!(everything.len(), 2);

    let restored = harness.service.restore(ACTOR, mine.invoice.id).await.expect("restore failed");
    assert!(!restored.invoice.is_deleted);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_ping() {
    let harness = Harness::start(2).await;
    assert!(harness.store.ping().await.is_ok());
}
