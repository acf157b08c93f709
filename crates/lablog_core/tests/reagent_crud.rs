use lablog_core::{
    AssociationRepository, EntityKind, NewReagent, NewUser, ReagentListQuery, ReagentPatch,
    ReagentRepository, RepoError, SqliteLabStore, User, UserRepository,
};

fn store_with_user(full_name: &str) -> (SqliteLabStore, User) {
    let mut store = SqliteLabStore::open_in_memory().unwrap();
    let user = store.insert_user(&NewUser::new(full_name)).unwrap();
    (store, user)
}

#[test]
fn create_reagent_stamps_and_stores_all_fields() {
    let (mut store, user) = store_with_user("User 1");

    let reagent = store
        .insert_reagent(&NewReagent::new("Test", "1234", user.id, user.id))
        .unwrap();

    assert_eq!(reagent.id, 1);
    assert_eq!(reagent.name, "Test");
    assert_eq!(reagent.lot, "1234");
    assert_eq!(reagent.created_by, user.id);
    assert_eq!(reagent.updated_by, user.id);
    assert_eq!(reagent.created_at, reagent.updated_at);
    assert_eq!(store.get_reagent(reagent.id).unwrap(), Some(reagent.clone()));
    assert!(store.processes_of(reagent.id).unwrap().is_empty());
}

#[test]
fn update_reagent_changes_patched_fields_only() {
    let (mut store, creator) = store_with_user("User 1");
    let editor = store.insert_user(&NewUser::new("User 2")).unwrap();
    let reagent = store
        .insert_reagent(&NewReagent::new("Test", "1234", creator.id, creator.id))
        .unwrap();

    let patch = ReagentPatch::default()
        .with_name("Update")
        .with_lot("4321")
        .with_updated_by(editor.id);
    let updated = store.update_reagent(reagent.id, &patch).unwrap();

    assert_eq!(updated.name, "Update");
    assert_eq!(updated.lot, "4321");
    assert_eq!(updated.updated_by, editor.id);
    assert_eq!(updated.created_by, creator.id);
    assert_eq!(updated.created_at, reagent.created_at);
    assert!(updated.updated_at > reagent.updated_at);
    assert_eq!(store.get_reagent(reagent.id).unwrap(), Some(updated));
}

#[test]
fn delete_reagent_removes_row() {
    let (mut store, user) = store_with_user("User 1");
    let reagent = store
        .insert_reagent(&NewReagent::new("Test", "1234", user.id, user.id))
        .unwrap();

    store.delete_reagent(reagent.id).unwrap();

    assert!(store.get_reagent(reagent.id).unwrap().is_none());
    assert!(store.find_reagent_by_lot("1234").unwrap().is_none());
}

#[test]
fn delete_missing_reagent_is_not_found() {
    let (mut store, _) = store_with_user("User 1");

    let err = store.delete_reagent(5).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: EntityKind::Reagent,
            id: 5
        }
    ));
}

#[test]
fn duplicate_lot_is_rejected_and_nothing_is_written() {
    let (mut store, user) = store_with_user("Ada");
    store
        .insert_reagent(&NewReagent::new("Acetone", "L1", user.id, user.id))
        .unwrap();

    let err = store
        .insert_reagent(&NewReagent::new("Ethanol", "L1", user.id, user.id))
        .unwrap_err();

    assert!(matches!(
        err,
        RepoError::ConstraintViolation {
            table: "reagents",
            column: "lot",
            ..
        }
    ));
    assert_eq!(
        store.list_reagents(&ReagentListQuery::default()).unwrap().len(),
        1
    );
}

#[test]
fn update_lot_to_own_value_succeeds_but_to_foreign_value_fails() {
    let (mut store, user) = store_with_user("Ada");
    let acetone = store
        .insert_reagent(&NewReagent::new("Acetone", "L1", user.id, user.id))
        .unwrap();
    let ethanol = store
        .insert_reagent(&NewReagent::new("Ethanol", "L2", user.id, user.id))
        .unwrap();

    let same_lot = store
        .update_reagent(acetone.id, &ReagentPatch::default().with_lot("L1"))
        .unwrap();
    assert_eq!(same_lot.lot, "L1");

    let err = store
        .update_reagent(ethanol.id, &ReagentPatch::default().with_lot("L1"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::ConstraintViolation { column: "lot", .. }
    ));
    assert_eq!(store.get_reagent(ethanol.id).unwrap(), Some(ethanol));
}

#[test]
fn insert_with_missing_user_is_a_foreign_key_violation() {
    let (mut store, user) = store_with_user("Ada");

    let missing_creator = store
        .insert_reagent(&NewReagent::new("Acetone", "L1", 99, user.id))
        .unwrap_err();
    assert!(matches!(
        missing_creator,
        RepoError::ForeignKeyViolation {
            table: "reagents",
            column: "created_by",
            missing_id: Some(99)
        }
    ));

    let missing_editor = store
        .insert_reagent(&NewReagent::new("Acetone", "L1", user.id, 42))
        .unwrap_err();
    assert!(matches!(
        missing_editor,
        RepoError::ForeignKeyViolation {
            column: "updated_by",
            missing_id: Some(42),
            ..
        }
    ));

    assert!(store
        .list_reagents(&ReagentListQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn failed_update_leaves_row_unchanged() {
    let (mut store, user) = store_with_user("Ada");
    let reagent = store
        .insert_reagent(&NewReagent::new("Acetone", "L1", user.id, user.id))
        .unwrap();

    let patch = ReagentPatch::default()
        .with_name("Renamed")
        .with_updated_by(404);
    let err = store.update_reagent(reagent.id, &patch).unwrap_err();

    assert!(matches!(err, RepoError::ForeignKeyViolation { .. }));
    assert_eq!(store.get_reagent(reagent.id).unwrap(), Some(reagent));
}

#[test]
fn update_missing_reagent_is_not_found() {
    let (mut store, _) = store_with_user("Ada");

    let err = store
        .update_reagent(3, &ReagentPatch::default().with_name("x"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: EntityKind::Reagent,
            id: 3
        }
    ));
}

#[test]
fn list_reagents_filters_by_lot_and_users() {
    let (mut store, ada) = store_with_user("Ada");
    let bob = store.insert_user(&NewUser::new("Bob")).unwrap();
    let acetone = store
        .insert_reagent(&NewReagent::new("Acetone", "L1", ada.id, ada.id))
        .unwrap();
    let ethanol = store
        .insert_reagent(&NewReagent::new("Ethanol", "L2", ada.id, bob.id))
        .unwrap();
    let water = store
        .insert_reagent(&NewReagent::new("Water", "L3", bob.id, bob.id))
        .unwrap();

    let by_lot = store
        .list_reagents(&ReagentListQuery {
            lot: Some("L2".to_string()),
            ..ReagentListQuery::default()
        })
        .unwrap();
    assert_eq!(by_lot, vec![ethanol.clone()]);

    let created_by_ada = store
        .list_reagents(&ReagentListQuery {
            created_by: Some(ada.id),
            ..ReagentListQuery::default()
        })
        .unwrap();
    assert_eq!(created_by_ada, vec![acetone.clone(), ethanol.clone()]);

    let touched_by_bob = store
        .list_reagents(&ReagentListQuery {
            touched_by: Some(bob.id),
            ..ReagentListQuery::default()
        })
        .unwrap();
    assert_eq!(touched_by_bob, vec![ethanol.clone(), water.clone()]);

    let second_page = store
        .list_reagents(&ReagentListQuery {
            limit: Some(1),
            offset: 1,
            ..ReagentListQuery::default()
        })
        .unwrap();
    assert_eq!(second_page, vec![ethanol]);
}

#[test]
fn reagent_serializes_with_plain_field_names() {
    let (mut store, user) = store_with_user("Ada");
    let reagent = store
        .insert_reagent(&NewReagent::new("Acetone", "L1", user.id, user.id))
        .unwrap();

    let json = serde_json::to_value(&reagent).unwrap();
    assert_eq!(json["lot"], "L1");
    assert_eq!(json["created_by"], user.id);
    assert_eq!(json["updated_at"], reagent.updated_at);
}
