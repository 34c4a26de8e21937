mod common;

use std::sync::atomic::Ordering;

use common::{org_user, FakePortal};
use weft_core::{OrgDirectory, Session};

#[tokio::test]
async fn anonymous_sessions_get_an_empty_directory() {
    let portal = FakePortal::new().with_user(org_user("alice", "Alice Able", "alice@acme.example"));
    let session = Session::establish(&portal).await.unwrap();
    assert!(!session.is_signed_in());

    let directory = OrgDirectory::load(&portal, &session).await.unwrap();
    assert!(directory.is_empty());
    assert_eq!(portal.user_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn signed_in_sessions_load_org_users() {
    let portal = FakePortal::new()
        .signed_in("dana")
        .with_user(org_user("carol", "Carol Cole", "carol@acme.example"))
        .with_user(org_user("alice", "Alice Able", "alice@acme.example"));
    let session = Session::establish(&portal).await.unwrap();

    let directory = OrgDirectory::load(&portal, &session).await.unwrap();
    assert_eq!(portal.user_calls.load(Ordering::SeqCst), 1);
    assert_eq!(directory.len(), 2);
    assert!(directory.contains("alice"));
    assert_eq!(directory.find("carol").unwrap().email, "carol@acme.example");
    assert!(directory.find("zed").is_none());

    let names: Vec<String> = directory.all().into_iter().map(|u| u.username).collect();
    assert_eq!(names, vec!["alice", "carol"]);
}

#[tokio::test]
async fn owner_options_split_members_from_outside_owners() {
    let portal = FakePortal::new()
        .signed_in("dana")
        .with_user(org_user("alice", "Alice Able", "alice@acme.example"));
    let session = Session::establish(&portal).await.unwrap();
    let directory = OrgDirectory::load(&portal, &session).await.unwrap();

    let options = directory.owner_options(["zed_partner", "alice", "esri_basemaps", "zed_partner"]);
    assert_eq!(options.organization, "Acme GIS");
    assert_eq!(options.in_org.len(), 1);
    assert_eq!(options.in_org[0].username, "alice");
    assert_eq!(options.outside, vec!["esri_basemaps", "zed_partner"]);
}

#[test]
fn users_can_be_registered_directly() {
    let directory = OrgDirectory::new();
    directory.register(org_user("bob", "Bob Burr", ""));
    directory.register(org_user("bob", "Robert Burr", "bob@acme.example"));
    assert_eq!(directory.len(), 1);
    assert_eq!(directory.find("bob").unwrap().full_name, "Robert Burr");
}
