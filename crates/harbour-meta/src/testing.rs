//! Test helpers shared by the backend and ledger tests.

use harbour_types::{ObjectRecord, ObjectState, Oid, UserRecord};

use crate::traits::MetadataStore;

/// A deterministic oid whose every byte is `n`.
pub(crate) fn oid(n: u8) -> Oid {
    Oid::from_digest([n; 32])
}

/// Exercise every primitive of a fresh, empty [`MetadataStore`].
pub(crate) fn store_contract(store: &dyn MetadataStore) {
    assert!(!store.backend_name().is_empty());

    // ---- objects ----

    let a = oid(0xaa);
    let b = oid(0x0b);
    assert!(store.read_object(&a).unwrap().is_none());
    assert_eq!(store.count_objects().unwrap(), 0);

    assert!(store.insert_object(&ObjectRecord::pending(a, 12, "p1")).unwrap());
    assert!(!store.insert_object(&ObjectRecord::pending(a, 99, "p2")).unwrap());
    let stored = store.read_object(&a).unwrap().unwrap();
    assert_eq!(stored.size, 12, "insert-if-absent must not overwrite");
    assert_eq!(stored.state, ObjectState::Pending);
    assert!(!stored.existing);
    assert_eq!(stored.projects.iter().collect::<Vec<_>>(), vec!["p1"]);

    assert!(store.set_object_state(&a, ObjectState::Committed).unwrap());
    assert!(store.read_object(&a).unwrap().unwrap().is_committed());
    assert!(!store.set_object_state(&b, ObjectState::Committed).unwrap());

    assert!(store.add_object_project(&a, "p2").unwrap());
    assert!(store.add_object_project(&a, "p2").unwrap());
    assert!(!store.add_object_project(&b, "p2").unwrap());
    let stored = store.read_object(&a).unwrap().unwrap();
    assert_eq!(stored.projects.len(), 2);

    assert!(store.remove_object_project(&a, "p1").unwrap());
    assert!(!store.remove_object_project(&a, "p1").unwrap());
    assert!(!store.remove_object_project(&b, "p1").unwrap());

    assert!(store.insert_object(&ObjectRecord::pending(b, 1, "")).unwrap());
    let listed = store.list_objects().unwrap();
    assert_eq!(
        listed.iter().map(|r| r.oid).collect::<Vec<_>>(),
        vec![b, a],
        "objects are listed in oid order"
    );
    assert!(listed[0].projects.is_empty());
    assert_eq!(store.count_objects().unwrap(), 2);

    assert!(store.delete_object(&b).unwrap());
    assert!(!store.delete_object(&b).unwrap());
    assert!(store.read_object(&b).unwrap().is_none());

    // A deleted object can be claimed afresh without stale references.
    assert!(store.insert_object(&ObjectRecord::pending(b, 2, "")).unwrap());
    assert!(store.read_object(&b).unwrap().unwrap().projects.is_empty());

    // ---- projects ----

    assert!(store.read_project("alpha").unwrap().is_none());
    assert!(store.create_project("alpha").unwrap());
    assert!(!store.create_project("alpha").unwrap());
    assert!(store.read_project("alpha").unwrap().unwrap().oids.is_empty());

    store.add_project_member("beta", &a).unwrap();
    store.add_project_member("beta", &a).unwrap();
    store.add_project_member("beta", &b).unwrap();
    let beta = store.read_project("beta").unwrap().unwrap();
    assert_eq!(beta.oids.len(), 2);
    assert!(beta.contains(&a));

    assert!(store.read_project("Beta").unwrap().is_none(), "names are case-sensitive");

    assert!(store.remove_project_member("beta", &a).unwrap());
    assert!(!store.remove_project_member("beta", &a).unwrap());
    assert!(!store.remove_project_member("gamma", &a).unwrap());

    let projects = store.list_projects().unwrap();
    assert_eq!(
        projects.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["alpha", "beta"]
    );
    assert_eq!(projects[1].oids.len(), 1);

    // ---- users ----

    let alice = UserRecord {
        username: "alice".into(),
        password_hash: "h1".into(),
    };
    assert!(store.read_user("alice").unwrap().is_none());
    assert!(store.insert_user(&alice).unwrap());
    assert!(!store
        .insert_user(&UserRecord {
            username: "alice".into(),
            password_hash: "h2".into(),
        })
        .unwrap());
    assert_eq!(store.read_user("alice").unwrap().unwrap().password_hash, "h1");

    store
        .insert_user(&UserRecord {
            username: "bob".into(),
            password_hash: "h3".into(),
        })
        .unwrap();
    assert_eq!(store.list_usernames().unwrap(), vec!["alice", "bob"]);

    assert!(store.delete_user("alice").unwrap());
    assert!(!store.delete_user("alice").unwrap());
    assert_eq!(store.list_usernames().unwrap(), vec!["bob"]);
}
