mod common;

use common::{fixture, Artist, Customer, Genre, Track};
use sqlsession_core::{
    lock_session, CallScope, Criteria, EntityRepository, Field, PersistError, PersistenceSession,
    Sort, SortList, StatelessRepository, TransactionScope, WorkContext,
};

#[test]
fn stateless_writes_reach_the_database_immediately() {
    let fx = fixture(TransactionScope::Statement);
    let scope = CallScope::begin();
    let ctx = WorkContext::call(&scope);
    let repo = StatelessRepository::<Genre>::new(&fx.stateless, ctx).unwrap();

    let mut genre = Genre::named("Grunge");
    repo.save(&mut genre).unwrap();
    let id = genre.id.unwrap();

    genre.name = Some("Post-Grunge".to_string());
    repo.update(&genre).unwrap();

    let other = CallScope::begin();
    let reader = StatelessRepository::<Genre>::new(&fx.stateless, WorkContext::call(&other)).unwrap();
    assert_eq!(
        reader.get(id).unwrap().unwrap().name.as_deref(),
        Some("Post-Grunge")
    );

    repo.delete(&genre).unwrap();
    assert_eq!(reader.get(id).unwrap(), None);
}

#[test]
fn stateless_update_of_missing_row_is_not_found() {
    let fx = fixture(TransactionScope::Statement);
    let scope = CallScope::begin();
    let ctx = WorkContext::call(&scope);
    let repo = StatelessRepository::<Genre>::new(&fx.stateless, ctx).unwrap();

    let ghost = Genre {
        id: Some(777),
        name: Some("Ghost".to_string()),
    };
    let err = repo.update(&ghost).unwrap_err();
    assert!(matches!(err, PersistError::NotFound { entity: "Genre", .. }));
    assert!(fx.stateless.current_session(&ctx).is_none());
}

#[test]
fn identity_map_operations_are_unsupported() {
    let fx = fixture(TransactionScope::Statement);
    let scope = CallScope::begin();
    let ctx = WorkContext::call(&scope);
    let repo = StatelessRepository::<Artist>::new(&fx.stateless, ctx).unwrap();
    let mut artist = Artist::named("Probot");

    assert!(matches!(
        repo.save_or_update(&mut artist),
        Err(PersistError::UnsupportedOperation("save_or_update"))
    ));
    assert!(matches!(
        repo.merge(&mut artist),
        Err(PersistError::UnsupportedOperation("merge"))
    ));
    assert!(matches!(
        repo.evict(&artist),
        Err(PersistError::UnsupportedOperation("evict"))
    ));
    assert!(matches!(
        repo.save_and_evict(&mut artist),
        Err(PersistError::UnsupportedOperation("save_and_evict"))
    ));

    assert!(!fx.stateless.has_open_transaction(&ctx));
    let session = fx.stateless.current_session(&ctx).unwrap();
    assert!(lock_session(&session).is_open());
    assert_eq!(artist.id, None);
}

#[test]
fn stateless_queries_match_stateful_results() {
    let fx = fixture(TransactionScope::Statement);
    let scope = CallScope::begin();
    let ctx = WorkContext::call(&scope);
    let stateless = StatelessRepository::<Track>::new(&fx.stateless, ctx).unwrap();
    let stateful = sqlsession_core::Repository::<Track>::new(&fx.manager, ctx).unwrap();

    let album = Criteria::new().eq(Field::new("AlbumId").unwrap(), 81);
    let by_name = SortList::from(Sort::asc(Field::new("Name").unwrap()));
    let left = stateless.find(&album, Some(&by_name), Some(1), Some(4)).unwrap();
    let right = stateful.find(&album, Some(&by_name), Some(1), Some(4)).unwrap();

    assert_eq!(left, right);
    assert_eq!(left.total_count, 11);
    let names: Vec<&str> = left.items.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Halo", "Have It All", "Lonely As You", "Low"]);
}

#[test]
fn stateless_get_by_property_and_projection() {
    let fx = fixture(TransactionScope::Statement);
    let scope = CallScope::begin();
    let repo = StatelessRepository::<Customer>::new(&fx.stateless, WorkContext::call(&scope)).unwrap();

    let email = Field::new("Email").unwrap();
    let customer = repo
        .get_by_property(email, "jubarnett@gmail.com".to_string())
        .unwrap()
        .unwrap();
    assert_eq!(customer.id, Some(28));

    let state: Option<String> = repo
        .get_property(Field::new("State").unwrap(), email, "jubarnett@gmail.com".to_string())
        .unwrap();
    assert_eq!(state.as_deref(), Some("UT"));
}
