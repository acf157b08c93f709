use lablog_core::{
    AssociationRepository, EntityKind, LabService, NewProcess, NewReagent, NewUser,
    ProcessPatch, ProcessRepository, ProcessType, ReagentPatch, ReagentRepository, RepoError,
    SqliteLabStore, UserRepository,
};

fn service() -> LabService<SqliteLabStore> {
    LabService::new(SqliteLabStore::open_in_memory().unwrap())
}

#[test]
fn end_to_end_ids_links_and_stamps() {
    let mut store = SqliteLabStore::open_in_memory().unwrap();

    let ada = store.insert_user(&NewUser::new("Ada")).unwrap();
    assert_eq!(ada.id, 1);
    let reagent = store
        .insert_reagent(&NewReagent::new("Acetone", "L1", 1, 1))
        .unwrap();
    assert_eq!(reagent.id, 1);
    let created_at = reagent.created_at;
    assert_eq!(reagent.updated_at, created_at);
    let process = store
        .insert_process(&NewProcess::new("Prep", ProcessType::Pre, 1, 1))
        .unwrap();
    assert_eq!(process.id, 1);

    store.link(1, 1).unwrap();
    assert_eq!(store.processes_of(1).unwrap(), vec![1]);

    let renamed = store
        .update_reagent(1, &ReagentPatch::default().with_name("Acetone HPLC"))
        .unwrap();
    assert!(renamed.updated_at > created_at);
    assert_eq!(renamed.created_at, created_at);
    assert_eq!(store.get_process(1).unwrap(), Some(process));
}

#[test]
fn register_edit_and_link_flow() {
    let mut service = service();
    let ada = service.register_user("Ada").unwrap();
    let reagent = service.register_reagent("Acetone", "L1", ada.id).unwrap();
    let process = service.register_process("Prep", "pre", ada.id).unwrap();

    assert!(service.attach(reagent.id, process.id).unwrap());

    let detail = service.reagent_detail(reagent.id).unwrap();
    assert_eq!(detail.reagent, reagent);
    assert_eq!(detail.created_by_user, ada);
    assert_eq!(detail.updated_by_user, ada);
    assert_eq!(detail.processes, vec![process.clone()]);

    let process_view = service.process_detail(process.id).unwrap();
    assert_eq!(process_view.process.process_type, ProcessType::Pre);
    assert_eq!(process_view.reagents, vec![reagent.clone()]);

    assert!(service.detach(reagent.id, process.id).unwrap());
    assert!(service.store().list_associations().unwrap().is_empty());
}

#[test]
fn edits_record_the_editor() {
    let mut service = service();
    let ada = service.register_user("Ada").unwrap();
    let bob = service.register_user("Bob").unwrap();
    let reagent = service.register_reagent("Acetone", "L1", ada.id).unwrap();
    let process = service.register_process("Prep", "post", ada.id).unwrap();

    let edited = service
        .edit_reagent(reagent.id, ReagentPatch::default().with_lot("L1-b"), bob.id)
        .unwrap();
    assert_eq!(edited.lot, "L1-b");
    assert_eq!(edited.created_by, ada.id);
    assert_eq!(edited.updated_by, bob.id);

    let edited_process = service
        .edit_process(process.id, ProcessPatch::default().with_name("Rinse"), bob.id)
        .unwrap();
    assert_eq!(edited_process.name, "Rinse");
    assert_eq!(edited_process.process_type, ProcessType::Post);
    assert_eq!(edited_process.updated_by, bob.id);

    let detail = service.reagent_detail(reagent.id).unwrap();
    assert_eq!(detail.created_by_user, ada);
    assert_eq!(detail.updated_by_user, bob);
}

#[test]
fn user_footprint_includes_created_and_edited_records() {
    let mut service = service();
    let ada = service.register_user("Ada").unwrap();
    let bob = service.register_user("Bob").unwrap();
    let acetone = service.register_reagent("Acetone", "L1", ada.id).unwrap();
    let ethanol = service.register_reagent("Ethanol", "L2", bob.id).unwrap();
    let prep = service.register_process("Prep", "pre", bob.id).unwrap();
    let acetone = service
        .edit_reagent(acetone.id, ReagentPatch::default(), bob.id)
        .unwrap();

    let ada_footprint = service.user_footprint(ada.id).unwrap();
    assert_eq!(ada_footprint.user, ada);
    assert_eq!(ada_footprint.reagents, vec![acetone.clone()]);
    assert!(ada_footprint.processes.is_empty());

    let bob_footprint = service.user_footprint(bob.id).unwrap();
    assert_eq!(bob_footprint.reagents, vec![acetone, ethanol]);
    assert_eq!(bob_footprint.processes, vec![prep]);
}

#[test]
fn rename_user_goes_through_uniqueness_check() {
    let mut service = service();
    let ada = service.register_user("Ada").unwrap();
    service.register_user("Bob").unwrap();

    assert!(matches!(
        service.rename_user(ada.id, "Bob").unwrap_err(),
        RepoError::ConstraintViolation {
            column: "full_name",
            ..
        }
    ));
    assert_eq!(service.rename_user(ada.id, "Ada L.").unwrap().full_name, "Ada L.");
}

#[test]
fn details_of_missing_records_are_not_found() {
    let service = service();

    assert!(matches!(
        service.reagent_detail(1).unwrap_err(),
        RepoError::NotFound {
            entity: EntityKind::Reagent,
            id: 1
        }
    ));
    assert!(matches!(
        service.process_detail(2).unwrap_err(),
        RepoError::NotFound {
            entity: EntityKind::Process,
            id: 2
        }
    ));
    assert!(matches!(
        service.user_footprint(3).unwrap_err(),
        RepoError::NotFound {
            entity: EntityKind::User,
            id: 3
        }
    ));
}

#[test]
fn reagent_detail_serializes_nested_records() {
    let mut service = service();
    let ada = service.register_user("Ada").unwrap();
    let reagent = service.register_reagent("Acetone", "L1", ada.id).unwrap();
    let process = service.register_process("Prep", "pre", ada.id).unwrap();
    service.attach(reagent.id, process.id).unwrap();

    let json = serde_json::to_value(service.reagent_detail(reagent.id).unwrap()).unwrap();

    assert_eq!(json["reagent"]["lot"], "L1");
    assert_eq!(json["created_by_user"]["full_name"], "Ada");
    assert_eq!(json["processes"][0]["process_type"], "pre");
}
