use chrono::Utc;
use donorhub::db::models::{DonorStatus, Event, EventStatus, ReviewStatus};
use donorhub::db::{self, DbPool};
use donorhub::import::normalize::NormalizedDonor;
use uuid::Uuid;

fn test_db_env() {
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();
    INIT.get_or_init(|| {
        let path = std::env::temp_dir().join(format!("donorhub-event-test-{}.db", Uuid::new_v4()));
        std::env::set_var("DONORHUB_DB", path.display().to_string());
    });
}

async fn make_event(pool: &DbPool, name: &str) -> Event {
    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        event_type: Some("Gala".to_string()),
        event_date: None,
        location: None,
        capacity: 100,
        focus: None,
        criteria_min_giving_level: None,
        list_generation_date: None,
        review_deadline: None,
        invitation_date: None,
        status: EventStatus::Planning,
        deleted: false,
        created_by: "u1".to_string(),
        created_at: now,
        updated_at: now,
    };
    db::create_event(pool, &event).await.expect("create event");
    event
}

async fn make_donor(pool: &DbPool, first: &str, last: &str) -> String {
    let donor = NormalizedDonor {
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        ..Default::default()
    };
    db::create_donor_from_import(pool, &donor).await.expect("create donor")
}

fn assert_consistent(list: &donorhub::db::models::EventDonorList) {
    assert_eq!(
        list.total_donors,
        list.approved + list.excluded + list.pending + list.auto_excluded,
        "counter sum must equal total"
    );
    let expected = if list.pending == 0 {
        ReviewStatus::Completed
    } else {
        ReviewStatus::Pending
    };
    assert_eq!(list.review_status, expected);
}

#[tokio::test]
async fn event_creation_review_scenario() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let event = make_event(&pool, &format!("Spring Gala {}", Uuid::new_v4())).await;
    let list = db::get_list_by_event(&pool, &event.id)
        .await
        .expect("get list")
        .expect("list created with event");
    assert_eq!(list.total_donors, 0);
    assert_consistent(&list);

    let donor_id = make_donor(&pool, "Mei", "Lee").await;
    let added = db::add_event_donors(&pool, &list.id, &[(donor_id.clone(), DonorStatus::Pending)])
        .await
        .expect("add donor");
    assert_eq!(added, 1);

    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    assert_eq!(list.total_donors, 1);
    assert_eq!(list.pending, 1);
    assert_eq!(list.review_status, ReviewStatus::Pending);
    assert_consistent(&list);

    let entry = db::set_event_donor_status(
        &pool,
        &list.id,
        &donor_id,
        DonorStatus::Approved,
        None,
        None,
        "reviewer-1",
    )
    .await
    .expect("status change")
    .expect("entry exists");
    assert_eq!(entry.status, DonorStatus::Approved);
    assert_eq!(entry.reviewer_id.as_deref(), Some("reviewer-1"));
    assert!(entry.review_date.is_some());

    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    assert_eq!(list.approved, 1);
    assert_eq!(list.pending, 0);
    assert_eq!(list.review_status, ReviewStatus::Completed);
    assert_consistent(&list);
}

#[tokio::test]
async fn excluding_without_reason_fills_placeholder() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let event = make_event(&pool, &format!("Exclusion Test {}", Uuid::new_v4())).await;
    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    let donor_id = make_donor(&pool, "Sam", "Park").await;
    db::add_event_donors(&pool, &list.id, &[(donor_id.clone(), DonorStatus::Pending)])
        .await
        .unwrap();

    let entry = db::set_event_donor_status(
        &pool,
        &list.id,
        &donor_id,
        DonorStatus::Excluded,
        None,
        None,
        "reviewer-1",
    )
    .await
    .unwrap()
    .expect("entry exists");
    assert_eq!(entry.exclude_reason.as_deref(), Some(db::DEFAULT_EXCLUDE_REASON));

    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    assert_eq!(list.excluded, 1);
    assert_consistent(&list);
}

#[tokio::test]
async fn bulk_add_counts_statuses_and_ignores_duplicates() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let event = make_event(&pool, &format!("Bulk Test {}", Uuid::new_v4())).await;
    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    let d1 = make_donor(&pool, "A", "One").await;
    let d2 = make_donor(&pool, "B", "Two").await;
    let d3 = make_donor(&pool, "C", "Three").await;

    let batch = vec![
        (d1.clone(), DonorStatus::Pending),
        (d2, DonorStatus::Approved),
        (d3, DonorStatus::AutoExcluded),
    ];
    let added = db::add_event_donors(&pool, &list.id, &batch).await.unwrap();
    assert_eq!(added, 3);

    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    assert_eq!(list.total_donors, 3);
    assert_eq!(list.pending, 1);
    assert_eq!(list.approved, 1);
    assert_eq!(list.auto_excluded, 1);
    assert_consistent(&list);

    // re-adding an existing member is a no-op
    let added = db::add_event_donors(&pool, &list.id, &[(d1, DonorStatus::Pending)])
        .await
        .unwrap();
    assert_eq!(added, 0);
    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    assert_eq!(list.total_donors, 3);
    assert_consistent(&list);
}

#[tokio::test]
async fn removing_a_member_decrements_its_bucket() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let event = make_event(&pool, &format!("Remove Test {}", Uuid::new_v4())).await;
    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    let donor_id = make_donor(&pool, "Rem", "Oved").await;
    db::add_event_donors(&pool, &list.id, &[(donor_id.clone(), DonorStatus::Pending)])
        .await
        .unwrap();

    let removed = db::remove_event_donor(&pool, &list.id, &donor_id).await.unwrap();
    assert!(removed);
    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    assert_eq!(list.total_donors, 0);
    assert_eq!(list.pending, 0);
    assert_eq!(list.review_status, ReviewStatus::Completed);
    assert_consistent(&list);

    let removed_again = db::remove_event_donor(&pool, &list.id, &donor_id).await.unwrap();
    assert!(!removed_again);
}

#[tokio::test]
async fn deleting_a_donor_cascades_across_lists() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let event_a = make_event(&pool, &format!("Cascade A {}", Uuid::new_v4())).await;
    let event_b = make_event(&pool, &format!("Cascade B {}", Uuid::new_v4())).await;
    let list_a = db::get_list_by_event(&pool, &event_a.id).await.unwrap().unwrap();
    let list_b = db::get_list_by_event(&pool, &event_b.id).await.unwrap().unwrap();
    let donor_id = make_donor(&pool, "Cas", "Cade").await;

    db::add_event_donors(&pool, &list_a.id, &[(donor_id.clone(), DonorStatus::Pending)])
        .await
        .unwrap();
    db::add_event_donors(&pool, &list_b.id, &[(donor_id.clone(), DonorStatus::Approved)])
        .await
        .unwrap();

    let deleted = db::delete_donor(&pool, &donor_id).await.unwrap();
    assert!(deleted);

    for (event, list) in [(&event_a, &list_a), (&event_b, &list_b)] {
        let list_after = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
        assert_eq!(list_after.total_donors, 0, "list {} not decremented", list.id);
        assert_consistent(&list_after);
        let members = db::list_event_donors(&pool, &list.id).await.unwrap();
        assert!(members.is_empty());
    }
    assert!(db::get_donor(&pool, &donor_id).await.unwrap().is_none());
}

#[tokio::test]
async fn recompute_corrects_an_overridden_review_status() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let event = make_event(&pool, &format!("Recompute Test {}", Uuid::new_v4())).await;
    let list = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    let donor_id = make_donor(&pool, "Re", "Count").await;
    db::add_event_donors(&pool, &list.id, &[(donor_id.clone(), DonorStatus::Approved)])
        .await
        .unwrap();

    // admin override is not validated against the member rows
    db::override_review_status(&pool, &list.id, ReviewStatus::Pending)
        .await
        .unwrap();
    let list_after = db::get_list_by_event(&pool, &event.id).await.unwrap().unwrap();
    assert_eq!(list_after.review_status, ReviewStatus::Pending);

    let recomputed = db::recompute_list_stats(&pool, &list.id).await.unwrap();
    assert_eq!(recomputed.total_donors, 1);
    assert_eq!(recomputed.approved, 1);
    assert_eq!(recomputed.review_status, ReviewStatus::Completed);
    assert_consistent(&recomputed);
}

#[tokio::test]
async fn soft_deleted_events_disappear_from_reads() {
    test_db_env();
    let pool = db::init_pool().await.expect("init pool");

    let event = make_event(&pool, &format!("Soft Delete {}", Uuid::new_v4())).await;
    assert!(db::get_event(&pool, &event.id).await.unwrap().is_some());

    let deleted = db::soft_delete_event(&pool, &event.id).await.unwrap();
    assert!(deleted);
    assert!(db::get_event(&pool, &event.id).await.unwrap().is_none());
    // a second soft delete is a no-op
    assert!(!db::soft_delete_event(&pool, &event.id).await.unwrap());
}
