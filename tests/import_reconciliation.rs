use donorhub::db;
use donorhub::import::{self, normalize::NormalizedDonor};
use donorhub::progress::ProgressTracker;
use uuid::Uuid;

fn test_db_env() {
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();
    INIT.get_or_init(|| {
        let path = std::env::temp_dir().join(format!("donorhub-import-test-{}.db", Uuid::new_v4()));
        std::env::set_var("DONORHUB_DB", path.display().to_string());
    });
}

#[tokio::test]
async fn importing_the_same_file_twice_is_idempotent() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let tag = Uuid::new_v4().simple().to_string();
    let csv = format!(
        "First_Name,LAST_NAME,total_donations,city\n\
         Mei{t},Lee{t},100,Springfield\n\
         Ann{t},Wu{t},250.5,Shelbyville\n\
         ,,0,\nOrgless{t},Only{t},75,",
        t = tag
    );
    // row 4 has no identity fields at all
    let rows = import::parse_csv(csv.as_bytes()).expect("parse csv");

    let first = import::run_import(&pool, &rows, None).await.expect("first run");
    assert_eq!(first.imported, 3);
    assert_eq!(first.updated, 0);
    assert_eq!(first.skipped, 1);
    assert_eq!(first.errors.len(), 1);
    // header is row 1, so the third data row is file row 4
    assert_eq!(first.errors[0].row, 4);

    let second = import::run_import(&pool, &rows, None).await.expect("second run");
    assert_eq!(second.imported, 0);
    assert_eq!(second.updated, 3);
    assert_eq!(second.skipped, 1);

    // final field values equal the file's values
    let donors = db::list_donors(&pool).await.expect("list donors");
    let mei = donors
        .iter()
        .find(|d| d.first_name.as_deref() == Some(&format!("Mei{}", tag)))
        .expect("Mei exists");
    assert_eq!(mei.total_donations, 100.0);
    assert_eq!(mei.city.as_deref(), Some("Springfield"));
}

#[tokio::test]
async fn matching_is_case_insensitive_against_existing_donors() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let tag = Uuid::new_v4().simple().to_string();
    let existing = NormalizedDonor {
        first_name: Some(format!("MEI{}", tag)),
        last_name: Some(format!("LEE{}", tag)),
        total_donations: 10.0,
        ..Default::default()
    };
    let existing_id = db::create_donor_from_import(&pool, &existing)
        .await
        .expect("create donor");

    let csv = format!("first_name,last_name,total_donations\nmei{t},lee{t},999\n", t = tag);
    let rows = import::parse_csv(csv.as_bytes()).expect("parse csv");
    let summary = import::run_import(&pool, &rows, None).await.expect("run import");
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.updated, 1);

    let donor = db::get_donor(&pool, &existing_id)
        .await
        .expect("get donor")
        .expect("donor still exists");
    assert_eq!(donor.total_donations, 999.0);
}

#[tokio::test]
async fn later_rows_match_donors_created_earlier_in_the_same_file() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let org = format!("Acme Corp {}", Uuid::new_v4().simple());
    let csv = format!(
        "organization_name,total_donations\n{org},100\n{org},350\n",
        org = org
    );
    let rows = import::parse_csv(csv.as_bytes()).expect("parse csv");
    let summary = import::run_import(&pool, &rows, None).await.expect("run import");
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.updated, 1);

    let donors = db::list_donors(&pool).await.expect("list donors");
    let matches: Vec<_> = donors
        .iter()
        .filter(|d| d.organization_name.as_deref() == Some(org.as_str()))
        .collect();
    assert_eq!(matches.len(), 1, "second row must update, not duplicate");
    assert_eq!(matches[0].total_donations, 350.0);
}

#[tokio::test]
async fn malformed_rows_are_isolated_with_one_based_row_numbers() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let tag = Uuid::new_v4().simple().to_string();
    let mut csv = String::from("first_name,last_name\n");
    for i in 0..3 {
        csv.push_str(&format!("P{i}{t},Q{i}{t}\n", i = i, t = tag));
    }
    csv.push_str(",\n"); // 4th data row: no identity
    for i in 3..5 {
        csv.push_str(&format!("P{i}{t},Q{i}{t}\n", i = i, t = tag));
    }

    let rows = import::parse_csv(csv.as_bytes()).expect("parse csv");
    let summary = import::run_import(&pool, &rows, None).await.expect("run import");
    assert_eq!(summary.imported + summary.updated, 5);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors.len(), 1);
    // 4th data row lives at file row 5
    assert_eq!(summary.errors[0].row, 5);
}

#[tokio::test]
async fn ragged_rows_are_row_errors_not_request_failures() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let tag = Uuid::new_v4().simple().to_string();
    // second data row is short: two fields against three headers
    let csv = format!(
        "first_name,last_name,city\nMay{t},Chen{t},Springfield\n,\nJo{t},Ito{t},Kyoto\n",
        t = tag
    );
    let rows = import::parse_csv(csv.as_bytes()).expect("ragged rows still parse");

    let summary = import::run_import(&pool, &rows, None).await.expect("run import");
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].row, 3);
}

#[tokio::test]
async fn cancelled_operation_stops_the_import_loop() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let org = format!("Cancelled Org {}", Uuid::new_v4().simple());
    let csv = format!("organization_name\n{org} A\n{org} B\n");
    let rows = import::parse_csv(csv.as_bytes()).expect("parse csv");

    let tracker = ProgressTracker::new();
    let (_, op_id) = tracker.create_operation("donor_import", "u1", rows.len());
    tracker.cancel_operation(&op_id, "u1");

    let summary = import::run_import(&pool, &rows, Some((&tracker, op_id.as_str())))
        .await
        .expect("run import");
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.updated, 0);

    let donors = db::list_donors(&pool).await.expect("list donors");
    assert!(donors
        .iter()
        .all(|d| d.organization_name.as_deref() != Some(&format!("{} A", org))));
}
