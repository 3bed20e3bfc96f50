use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;

use clinic_portal::models::{
    AppointmentUpdate, CheckIn, NewAccount, NewRequest, RequestDecision, RequestStatus, Role,
};
use clinic_portal::{FileStorage, PortalError, RecordStore};

fn open(dir: &std::path::Path) -> RecordStore<FileStorage> {
    RecordStore::new(FileStorage::open(dir).unwrap())
}

#[test]
fn records_and_session_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let manager_id = {
        let store = open(dir.path());
        let manager = store
            .register(NewAccount::manager("Gestora", "gestor@urgetrauma.com.br"))
            .unwrap();
        store.login("gestor@urgetrauma.com.br", Role::Manager).unwrap();
        store
            .save_request(NewRequest::new("Carlos Eduardo Souza", "Ressonância", "RM Coluna Lombar"))
            .unwrap();
        store
            .update_appointment("apt_demo_1", AppointmentUpdate::check_in(CheckIn::completed("UNI-5555")))
            .unwrap();
        manager.id
    };

    let store = open(dir.path());
    assert_eq!(store.current_session().unwrap().unwrap().id, manager_id);
    assert_eq!(store.list_requests().unwrap().len(), 1);
    assert_eq!(
        store.list_appointments().unwrap()[0].validation_token(),
        Some("UNI-5555")
    );

    store.logout().unwrap();
    assert!(open(dir.path()).current_session().unwrap().is_none());
}

#[test]
fn many_generated_accounts_keep_identifiers_unique() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let accounts: Vec<NewAccount> = (0..20)
        .map(|i| {
            let name: String = Name().fake();
            let email: String = SafeEmail().fake();
            NewAccount::patient(name, format!("{}.{}", i, email), format!("0032{:04}", i), "Unimed")
        })
        .collect();

    for account in accounts.iter().cloned() {
        store.register(account).unwrap();
    }
    for account in accounts {
        let err = store.register(account).unwrap_err();
        assert!(matches!(err, PortalError::DuplicateAccount));
    }
    assert_eq!(store.list_accounts().unwrap().len(), 20);

    let ids: std::collections::HashSet<_> =
        store.list_accounts().unwrap().into_iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), 20);
}

#[test]
fn manager_review_flow() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path());

    let lab = store
        .save_request(NewRequest::new("João Silva Oliveira", "Exame Laboratorial", "Hemograma completo"))
        .unwrap();
    let mri = store
        .save_request(NewRequest::new("Carlos Eduardo Souza", "Ressonância", "RM Coluna Lombar"))
        .unwrap();

    store.review_request(&lab.id, RequestDecision::Approve).unwrap();
    store.review_request(&mri.id, RequestDecision::Reject).unwrap();

    let statuses: Vec<_> = store.list_requests().unwrap().into_iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![RequestStatus::Approved, RequestStatus::Rejected]);
    assert!(store.pending_requests().unwrap().is_empty());
    assert_eq!(store.requests_for_patient("João Silva Oliveira").unwrap().len(), 1);

    store.update_request_status("unknown", RequestStatus::Completed).unwrap();
    assert_eq!(store.list_requests().unwrap().len(), 2);
}
